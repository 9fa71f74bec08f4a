// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Parameter normalizer. Turns the loosely-typed request bag into explicit,
// validated per-operation structs.
//
// Coercion is lenient in the same places for every operation: floats
// truncate into integer keys, numeric strings parse, `null` reads as
// "absent", and an unrecognised keyword falls back to its default with a
// warning. Structurally wrong values (a list where a number belongs, an
// anchor outside its kernel) are rejected with `InvalidParameter`.

use imgflow_core::error::{ImgflowError, Result};
use imgflow_core::types::{ParamValue, Params};
use tracing::warn;

use crate::buffer::PixelBuffer;
use crate::codec;
use crate::transform::blur::BorderMode;
use crate::transform::contours::{ApproxMethod, RetrievalMode};
use crate::transform::drawing::{LineType, Thickness};
use crate::transform::morphology::KernelShape;
use crate::transform::threshold::ThresholdMethod;

/// Largest kernel edge accepted for blur and morphology.
pub const MAX_KERNEL_SIZE: u32 = 255;
/// Upper bound on repeated morphology passes.
pub const MAX_ITERATIONS: u32 = 1000;
/// Upper bound on either side of a synthesised blank canvas.
pub const MAX_CANVAS_SIDE: u32 = 16384;

/// A closed set of named constants selected by a string parameter.
pub trait Keyword: Sized + Copy + std::fmt::Debug {
    /// Value used when the key is absent or the string is unrecognised.
    const DEFAULT: Self;

    fn from_keyword(word: &str) -> Option<Self>;
}

/// Odd, positive kernel edge length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelSize(u32);

impl KernelSize {
    /// Smallest odd integer `>= max(k, 1)`.
    pub fn normalized(k: i64) -> Self {
        let k = k.clamp(1, i64::from(u32::MAX - 1)) as u32;
        Self(if k % 2 == 0 { k + 1 } else { k })
    }

    pub fn get(self) -> u32 {
        self.0
    }

    /// Index of the centre cell.
    pub fn centre(self) -> usize {
        (self.0 / 2) as usize
    }
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Typed accessors over a [`Params`] bag.
#[derive(Debug, Clone, Copy)]
pub struct ParamReader<'a> {
    params: &'a Params,
}

fn wrong_type(key: &str, expected: &str, got: &ParamValue) -> ImgflowError {
    ImgflowError::invalid_parameter(key, format!("expected {expected}, got {}", got.type_name()))
}

impl<'a> ParamReader<'a> {
    pub fn new(params: &'a Params) -> Self {
        Self { params }
    }

    /// Integer key. Floats truncate toward zero.
    pub fn int(&self, key: &str, default: i64) -> Result<i64> {
        Ok(self.optional_int(key)?.unwrap_or(default))
    }

    pub fn optional_int(&self, key: &str) -> Result<Option<i64>> {
        let Some(value) = self.params.get(key) else {
            return Ok(None);
        };
        let n = match value {
            ParamValue::Int(n) => *n,
            ParamValue::Bool(b) => i64::from(*b),
            ParamValue::Float(f) => truncate(key, *f)?,
            ParamValue::Text(s) => {
                let s = s.trim();
                match s.parse::<i64>() {
                    Ok(n) => n,
                    Err(_) => {
                        let f = s.parse::<f64>().map_err(|_| {
                            ImgflowError::invalid_parameter(key, format!("'{s}' is not a number"))
                        })?;
                        truncate(key, f)?
                    }
                }
            }
            other => return Err(wrong_type(key, "an integer", other)),
        };
        Ok(Some(n))
    }

    /// Integer key narrowed to `i32` (pixel coordinates, sizes).
    pub fn coord(&self, key: &str, default: i32) -> Result<i32> {
        let n = self.int(key, i64::from(default))?;
        Ok(n.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32)
    }

    pub fn float(&self, key: &str, default: f64) -> Result<f64> {
        let Some(value) = self.params.get(key) else {
            return Ok(default);
        };
        let f = match value {
            ParamValue::Int(n) => *n as f64,
            ParamValue::Float(f) => *f,
            ParamValue::Bool(b) => f64::from(u8::from(*b)),
            ParamValue::Text(s) => s.trim().parse::<f64>().map_err(|_| {
                ImgflowError::invalid_parameter(key, format!("'{s}' is not a number"))
            })?,
            other => return Err(wrong_type(key, "a number", other)),
        };
        if f.is_nan() {
            return Err(ImgflowError::invalid_parameter(key, "NaN is not allowed"));
        }
        Ok(f)
    }

    pub fn flag(&self, key: &str, default: bool) -> Result<bool> {
        let Some(value) = self.params.get(key) else {
            return Ok(default);
        };
        match value {
            ParamValue::Bool(b) => Ok(*b),
            ParamValue::Int(n) => Ok(*n != 0),
            ParamValue::Float(f) => Ok(*f != 0.0),
            ParamValue::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(true),
                "false" | "0" | "no" | "" => Ok(false),
                _ => Err(ImgflowError::invalid_parameter(
                    key,
                    format!("'{s}' is not a boolean"),
                )),
            },
            other => Err(wrong_type(key, "a boolean", other)),
        }
    }

    /// Keyword key. Unknown strings degrade to `K::DEFAULT`.
    pub fn keyword<K: Keyword>(&self, key: &str) -> Result<K> {
        match self.params.get(key) {
            None => Ok(K::DEFAULT),
            Some(ParamValue::Text(word)) => Ok(K::from_keyword(word.trim()).unwrap_or_else(|| {
                warn!(key, word = %word, fallback = ?K::DEFAULT, "Unrecognised keyword, using default");
                K::DEFAULT
            })),
            Some(other) => Err(wrong_type(key, "a keyword string", other)),
        }
    }

    /// `[b, g, r]` colour from a list of one to four numbers.
    pub fn color(&self, key: &str, default: [f64; 3]) -> Result<[f64; 3]> {
        let Some(value) = self.params.get(key) else {
            return Ok(default);
        };
        match value {
            ParamValue::List(items) if (1..=4).contains(&items.len()) => {
                if items.iter().any(|v| v.is_nan()) {
                    return Err(ImgflowError::invalid_parameter(key, "NaN is not allowed"));
                }
                let mut out = [0.0; 3];
                for (slot, v) in out.iter_mut().zip(items) {
                    *slot = *v;
                }
                Ok(out)
            }
            ParamValue::List(items) => Err(ImgflowError::invalid_parameter(
                key,
                format!("expected 1 to 4 channels, got {}", items.len()),
            )),
            other => Err(wrong_type(key, "a colour list", other)),
        }
    }

    /// `{x, y}` or `[x, y]`.
    pub fn point(&self, key: &str, default: (f64, f64)) -> Result<(f64, f64)> {
        match self.params.get(key) {
            None => Ok(default),
            Some(ParamValue::Point { x, y }) => Ok((*x, *y)),
            Some(ParamValue::List(items)) if items.len() == 2 => Ok((items[0], items[1])),
            Some(other) => Err(wrong_type(key, "an {x, y} point", other)),
        }
    }

    /// Secondary image text. Absence is a `MissingLayer` error.
    pub fn layer(&self, key: &str) -> Result<&'a str> {
        match self.params.get(key) {
            Some(ParamValue::Text(s)) if !s.trim().is_empty() => Ok(s.as_str()),
            Some(ParamValue::Text(_)) | None => Err(ImgflowError::MissingLayer(key.to_string())),
            Some(other) => Err(wrong_type(key, "a base64 image", other)),
        }
    }

    /// Kernel edge, normalised to odd and bounded by [`MAX_KERNEL_SIZE`].
    pub fn kernel_size(&self, key: &str, default: i64) -> Result<KernelSize> {
        let size = KernelSize::normalized(self.int(key, default)?);
        if size.get() > MAX_KERNEL_SIZE {
            return Err(ImgflowError::invalid_parameter(
                key,
                format!("{} exceeds the maximum of {MAX_KERNEL_SIZE}", size.get()),
            ));
        }
        Ok(size)
    }

    /// Opacity-like factor clamped into `[0, 1]`.
    pub fn unit(&self, key: &str, default: f64) -> Result<f64> {
        Ok(self.float(key, default)?.clamp(0.0, 1.0))
    }

    /// Stroke width plus line style for the drawing operations.
    pub fn stroke(&self, default_thickness: i64) -> Result<Stroke> {
        let filled = self.flag("filled", false)?;
        let thickness = if filled {
            Thickness::Filled
        } else {
            Thickness::from_signed(self.int("thickness", default_thickness)?)
        };
        Ok(Stroke {
            thickness,
            line_type: self.keyword("lineType")?,
        })
    }
}

fn truncate(key: &str, f: f64) -> Result<i64> {
    if !f.is_finite() {
        return Err(ImgflowError::invalid_parameter(key, format!("{f} is not finite")));
    }
    Ok(f.trunc() as i64)
}

// ---------------------------------------------------------------------------
// Per-operation structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdParams {
    pub threshold: f64,
    pub max_value: f64,
    pub method: ThresholdMethod,
    pub use_otsu: bool,
}

impl ThresholdParams {
    pub fn from_params(params: &Params) -> Result<Self> {
        let r = ParamReader::new(params);
        Ok(Self {
            threshold: r.int("threshold", 128)? as f64,
            max_value: r.int("maxValue", 255)? as f64,
            method: r.keyword("method")?,
            use_otsu: r.flag("useOtsu", false)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaskParams {
    pub threshold: f64,
    pub max_value: f64,
    pub method: ThresholdMethod,
}

impl MaskParams {
    pub fn from_params(params: &Params) -> Result<Self> {
        let r = ParamReader::new(params);
        Ok(Self {
            threshold: r.int("threshold", 128)? as f64,
            max_value: r.int("maxValue", 255)? as f64,
            method: r.keyword("method")?,
        })
    }
}

/// Size / fill of the `blank` canvas. `None` sizes follow the input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlankParams {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub color: [f64; 3],
    pub grayscale: bool,
}

impl BlankParams {
    pub fn from_params(params: &Params) -> Result<Self> {
        let r = ParamReader::new(params);
        Ok(Self {
            width: canvas_side(&r, "width")?,
            height: canvas_side(&r, "height")?,
            color: r.color("color", [0.0, 0.0, 0.0])?,
            grayscale: r.flag("isGrayscale", false)?,
        })
    }
}

fn canvas_side(r: &ParamReader<'_>, key: &str) -> Result<Option<u32>> {
    match r.optional_int(key)? {
        None => Ok(None),
        Some(n) if (1..=i64::from(MAX_CANVAS_SIDE)).contains(&n) => Ok(Some(n as u32)),
        Some(n) => Err(ImgflowError::invalid_parameter(
            key,
            format!("{n} is outside 1..={MAX_CANVAS_SIDE}"),
        )),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlurParams {
    pub kernel_size: KernelSize,
    pub sigma_x: f64,
    pub sigma_y: f64,
    pub border: BorderMode,
}

impl BlurParams {
    pub fn from_params(params: &Params) -> Result<Self> {
        let r = ParamReader::new(params);
        Ok(Self {
            kernel_size: r.kernel_size("kernelSize", 5)?,
            sigma_x: r.float("sigmaX", 0.0)?,
            sigma_y: r.float("sigmaY", 0.0)?,
            border: r.keyword("borderType")?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MorphParams {
    pub kernel_size: KernelSize,
    pub iterations: u32,
    pub shape: KernelShape,
    /// `(x, y)` inside the kernel square.
    pub anchor: (usize, usize),
}

impl MorphParams {
    pub fn from_params(params: &Params) -> Result<Self> {
        let r = ParamReader::new(params);
        let kernel_size = r.kernel_size("kernelSize", 3)?;

        let iterations = r.int("iterations", 1)?.max(0);
        if iterations > i64::from(MAX_ITERATIONS) {
            return Err(ImgflowError::invalid_parameter(
                "iterations",
                format!("{iterations} exceeds the maximum of {MAX_ITERATIONS}"),
            ));
        }

        let (ax, ay) = r.point("anchor", (-1.0, -1.0))?;
        let anchor = (
            anchor_axis(ax, kernel_size)?,
            anchor_axis(ay, kernel_size)?,
        );

        Ok(Self {
            kernel_size,
            iterations: iterations as u32,
            shape: r.keyword("kernelShape")?,
            anchor,
        })
    }
}

/// `-1` selects the centre; anything else must index into the kernel.
fn anchor_axis(v: f64, size: KernelSize) -> Result<usize> {
    let v = v.trunc();
    if v == -1.0 {
        return Ok(size.centre());
    }
    if v >= 0.0 && v < f64::from(size.get()) {
        return Ok(v as usize);
    }
    Err(ImgflowError::invalid_parameter(
        "anchor",
        format!("{v} lies outside a {0}x{0} kernel", size.get()),
    ))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeParams {
    pub low: f64,
    pub high: f64,
    pub aperture: u32,
    pub l2_gradient: bool,
}

impl EdgeParams {
    pub fn from_params(params: &Params) -> Result<Self> {
        let r = ParamReader::new(params);
        let aperture = r.int("apertureSize", 3)?;
        let aperture = crate::transform::edges::SUPPORTED_APERTURES
            .into_iter()
            .find(|&a| i64::from(a) == aperture)
            .ok_or_else(|| {
                ImgflowError::invalid_parameter("apertureSize", format!("{aperture} is not 3, 5 or 7"))
            })?;
        Ok(Self {
            low: r.int("threshold1", 100)? as f64,
            high: r.int("threshold2", 200)? as f64,
            aperture,
            l2_gradient: r.flag("l2gradient", false)?,
        })
    }
}

/// Outline width and line style shared by the drawing operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stroke {
    pub thickness: Thickness,
    pub line_type: LineType,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RectParams {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub color: [f64; 3],
    pub stroke: Stroke,
}

impl RectParams {
    pub fn from_params(params: &Params) -> Result<Self> {
        let r = ParamReader::new(params);
        Ok(Self {
            x: r.coord("x", 0)?,
            y: r.coord("y", 0)?,
            width: r.coord("width", 100)?,
            height: r.coord("height", 100)?,
            color: r.color("color", [255.0, 0.0, 0.0])?,
            stroke: r.stroke(2)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircleParams {
    pub x: i32,
    pub y: i32,
    pub radius: i32,
    pub color: [f64; 3],
    pub stroke: Stroke,
}

impl CircleParams {
    pub fn from_params(params: &Params) -> Result<Self> {
        let r = ParamReader::new(params);
        let radius = r.coord("radius", 25)?;
        if radius < 0 {
            return Err(ImgflowError::invalid_parameter(
                "radius",
                format!("{radius} is negative"),
            ));
        }
        Ok(Self {
            x: r.coord("x", 50)?,
            y: r.coord("y", 50)?,
            radius,
            color: r.color("color", [0.0, 255.0, 0.0])?,
            stroke: r.stroke(2)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineParams {
    pub from: (i32, i32),
    pub to: (i32, i32),
    pub color: [f64; 3],
    pub stroke: Stroke,
}

impl LineParams {
    pub fn from_params(params: &Params) -> Result<Self> {
        let r = ParamReader::new(params);
        Ok(Self {
            from: (r.coord("x1", 0)?, r.coord("y1", 0)?),
            to: (r.coord("x2", 100)?, r.coord("y2", 100)?),
            color: r.color("color", [0.0, 0.0, 255.0])?,
            stroke: Stroke {
                thickness: Thickness::from_signed(r.int("thickness", 2)?),
                line_type: r.keyword("lineType")?,
            },
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContourParams {
    pub mode: RetrievalMode,
    pub method: ApproxMethod,
    pub min_area: f64,
    pub max_area: f64,
}

impl ContourParams {
    pub fn from_params(params: &Params) -> Result<Self> {
        let r = ParamReader::new(params);
        Ok(Self {
            mode: r.keyword("mode")?,
            method: r.keyword("contourMethod")?,
            min_area: r.float("minArea", 100.0)?,
            max_area: r.float("maxArea", 10000.0)?,
        })
    }
}

/// Key holding the secondary image for the compositing operations.
pub const LAYER_KEY: &str = "image2";

/// Multiply / screen / overlay: decoded secondary plus opacity in `[0, 1]`.
#[derive(Clone, PartialEq)]
pub struct CompositeParams {
    pub layer: PixelBuffer,
    pub opacity: f64,
}

impl CompositeParams {
    pub fn from_params(params: &Params) -> Result<Self> {
        let r = ParamReader::new(params);
        let layer = codec::decode(r.layer(LAYER_KEY)?)?;
        Ok(Self {
            layer,
            opacity: r.unit("opacity", 1.0)?,
        })
    }
}

/// Layer pixels stay out of log output.
impl std::fmt::Debug for CompositeParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeParams")
            .field("layer", &self.layer.shape())
            .field("opacity", &self.opacity)
            .finish()
    }
}

/// Linear cross-fade: decoded secondary plus mix ratio in `[0, 1]`.
#[derive(Clone, PartialEq)]
pub struct BlendParams {
    pub layer: PixelBuffer,
    pub ratio: f64,
}

impl BlendParams {
    pub fn from_params(params: &Params) -> Result<Self> {
        let r = ParamReader::new(params);
        let layer = codec::decode(r.layer(LAYER_KEY)?)?;
        Ok(Self {
            layer,
            ratio: r.unit("ratio", 0.5)?,
        })
    }
}

impl std::fmt::Debug for BlendParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlendParams")
            .field("layer", &self.layer.shape())
            .field("ratio", &self.ratio)
            .finish()
    }
}
