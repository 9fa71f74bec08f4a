// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for imgflow.

use thiserror::Error;

use crate::types::ErrorClass;

/// Top-level error type for all imgflow operations.
#[derive(Debug, Error)]
pub enum ImgflowError {
    // -- Request errors (caller's fault) --
    #[error("image decode failed: {0}")]
    Decode(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("missing secondary image: params.{0}")]
    MissingLayer(String),

    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    // -- Processing errors (system's fault) --
    #[error("image encode failed: {0}")]
    Encode(String),

    #[error("transform failed: {0}")]
    Transform(String),

    #[error("server error: {0}")]
    Server(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ImgflowError {
    /// Shorthand for [`ImgflowError::InvalidParameter`].
    pub fn invalid_parameter(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Who is to blame. Decided by variant only, never by message text.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Decode(_)
            | Self::InvalidRequest(_)
            | Self::UnsupportedOperation(_)
            | Self::MissingLayer(_)
            | Self::InvalidParameter { .. }
            | Self::PayloadTooLarge { .. } => ErrorClass::Client,
            Self::Encode(_)
            | Self::Transform(_)
            | Self::Server(_)
            | Self::Config(_)
            | Self::Io(_)
            | Self::Serialization(_) => ErrorClass::Server,
        }
    }

    /// HTTP status code used when this error crosses the transport boundary.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::PayloadTooLarge { .. } => 413,
            _ => match self.class() {
                ErrorClass::Client => 400,
                ErrorClass::Server => 500,
            },
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ImgflowError>;
