// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Server configuration: JSON file with environment overrides.

use std::net::IpAddr;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ImgflowError, Result};

/// Environment variable naming an optional JSON config file.
pub const ENV_CONFIG_PATH: &str = "IMGFLOW_CONFIG";
pub const ENV_BIND: &str = "IMGFLOW_BIND";
pub const ENV_PORT: &str = "IMGFLOW_PORT";
pub const ENV_MAX_BODY_BYTES: &str = "IMGFLOW_MAX_BODY_BYTES";
pub const ENV_CORS_ORIGIN: &str = "IMGFLOW_CORS_ORIGIN";

/// Settings for the HTTP binding. The engine itself has no configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the listener binds to.
    pub bind_address: IpAddr,
    /// TCP port (default 8000). Port 0 asks the OS for a free one.
    pub port: u16,
    /// Largest accepted request (headers + body), in bytes.
    pub max_body_bytes: usize,
    /// Value of `Access-Control-Allow-Origin` on every response.
    pub cors_allow_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::from([0, 0, 0, 0]),
            port: 8000,
            max_body_bytes: 64 * 1024 * 1024,
            cors_allow_origin: "*".into(),
        }
    }
}

impl ServerConfig {
    /// Read a JSON config file. Missing keys take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data)?;
        info!(path = %path.display(), "config file loaded");
        Ok(config)
    }

    /// Resolve the effective config: file (if any), then process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let base = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        base.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `IMGFLOW_*` overrides from an arbitrary lookup. Split out from
    /// [`load`](Self::load) so tests need not mutate the process environment.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = lookup(ENV_BIND) {
            self.bind_address = bind.trim().parse().map_err(|e| {
                ImgflowError::Config(format!("{ENV_BIND}={bind}: {e}"))
            })?;
        }
        if let Some(port) = lookup(ENV_PORT) {
            self.port = port.trim().parse().map_err(|e| {
                ImgflowError::Config(format!("{ENV_PORT}={port}: {e}"))
            })?;
        }
        if let Some(limit) = lookup(ENV_MAX_BODY_BYTES) {
            self.max_body_bytes = limit.trim().parse().map_err(|e| {
                ImgflowError::Config(format!("{ENV_MAX_BODY_BYTES}={limit}: {e}"))
            })?;
        }
        if let Some(origin) = lookup(ENV_CORS_ORIGIN) {
            self.cors_allow_origin = origin;
        }
        debug!(config = ?self, "effective server config");
        Ok(self)
    }
}
