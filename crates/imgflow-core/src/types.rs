// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain and wire types for imgflow.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ImgflowError;

/// Unique identifier attached to each served request for log correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Operation names
// ---------------------------------------------------------------------------

/// The closed set of operations the engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    Binary,
    Grayscale,
    Blank,
    Contour,
    Blur,
    Erode,
    Dilate,
    Edge,
    DrawRect,
    DrawCircle,
    DrawLine,
    Multiply,
    Screen,
    Overlay,
    Blend,
    Mask,
    InvertMask,
}

impl OperationKind {
    /// Every operation, in wire-name order.
    pub const ALL: [OperationKind; 17] = [
        Self::Binary,
        Self::Grayscale,
        Self::Blank,
        Self::Contour,
        Self::Blur,
        Self::Erode,
        Self::Dilate,
        Self::Edge,
        Self::DrawRect,
        Self::DrawCircle,
        Self::DrawLine,
        Self::Multiply,
        Self::Screen,
        Self::Overlay,
        Self::Blend,
        Self::Mask,
        Self::InvertMask,
    ];

    /// Wire name as sent in the request's `type` field.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Binary => "binary",
            Self::Grayscale => "grayscale",
            Self::Blank => "blank",
            Self::Contour => "contour",
            Self::Blur => "blur",
            Self::Erode => "erode",
            Self::Dilate => "dilate",
            Self::Edge => "edge",
            Self::DrawRect => "draw-rect",
            Self::DrawCircle => "draw-circle",
            Self::DrawLine => "draw-line",
            Self::Multiply => "multiply",
            Self::Screen => "screen",
            Self::Overlay => "overlay",
            Self::Blend => "blend",
            Self::Mask => "mask",
            Self::InvertMask => "invert-mask",
        }
    }

    /// Operations that combine the primary image with `params.image2`.
    pub fn needs_layer(&self) -> bool {
        matches!(
            self,
            Self::Multiply | Self::Screen | Self::Overlay | Self::Blend
        )
    }
}

impl FromStr for OperationKind {
    type Err = ImgflowError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == name)
            .ok_or_else(|| ImgflowError::UnsupportedOperation(name.to_string()))
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Parameter bag
// ---------------------------------------------------------------------------

/// A single loosely-typed parameter value as it arrives on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<f64>),
    Point { x: f64, y: f64 },
}

impl ParamValue {
    /// Short type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::Text(_) => "string",
            Self::List(_) => "list",
            Self::Point { .. } => "point",
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Vec<f64>> for ParamValue {
    fn from(v: Vec<f64>) -> Self {
        Self::List(v)
    }
}

/// The `params` object of a request: string key to loosely-typed value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(BTreeMap<String, ParamValue>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, handy for tests and programmatic callers.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Look up a key. An explicit JSON `null` reads the same as a missing key.
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key).filter(|v| !matches!(v, ParamValue::Null))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Request / response wire shapes
// ---------------------------------------------------------------------------

/// Body of `POST /process`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationRequest {
    /// Operation name, one of [`OperationKind::name`].
    #[serde(rename = "type")]
    pub operation: String,
    /// Base64 image, optionally with a `data:image/...;base64,` prefix.
    pub image: String,
    #[serde(default)]
    pub params: Params,
}

impl OperationRequest {
    pub fn new(operation: impl Into<String>, image: impl Into<String>, params: Params) -> Self {
        Self {
            operation: operation.into(),
            image: image.into(),
            params,
        }
    }
}

/// Successful reply. For `contour`, `result` holds a JSON-encoded
/// [`ContourPayload`] rather than a data URI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessResponse {
    pub result: String,
}

impl ProcessResponse {
    /// Parse the nested document a `contour` operation returns.
    ///
    /// The response carries no discriminant; only call this when the request
    /// was a contour operation.
    pub fn contour_payload(&self) -> serde_json::Result<ContourPayload> {
        serde_json::from_str(&self.result)
    }
}

/// One surviving contour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContourRecord {
    /// Polygon vertices as `[x, y]` pairs.
    pub points: Vec<[i32; 2]>,
    pub area: f64,
    pub perimeter: f64,
}

/// Composite result of the `contour` operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContourPayload {
    /// Rendered contours as a PNG data URI.
    pub image: String,
    pub contours_count: usize,
    pub contours: Vec<ContourRecord>,
}

/// Failure reply body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}

/// Who caused a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorClass {
    /// Bad input, unknown operation, missing layer. Maps to 4xx.
    Client,
    /// Encode fault or unexpected internal failure. Maps to 5xx.
    Server,
}

/// Lifecycle state of the HTTP binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerStatus {
    Stopped,
    Starting,
    Running,
    Error,
}
