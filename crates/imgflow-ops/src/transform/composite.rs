// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Two-layer compositing: blend modes mixed by opacity, and a linear
// cross-fade.

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use tracing::{debug, instrument};

use crate::buffer::{PixelBuffer, saturate_u8};
use crate::params::{BlendParams, CompositeParams};

/// Per-channel blend function on normalised samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendMode {
    Multiply,
    Screen,
    Overlay,
}

impl BlendMode {
    /// `a` is the primary (base) sample, `b` the layer sample, both in `[0, 1]`.
    pub fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            Self::Multiply => a * b,
            Self::Screen => 1.0 - (1.0 - a) * (1.0 - b),
            Self::Overlay => {
                if a <= 0.5 {
                    2.0 * a * b
                } else {
                    1.0 - 2.0 * (1.0 - a) * (1.0 - b)
                }
            }
        }
    }
}

/// Bring the layer to the primary's size and channel layout.
fn conform(primary: &RgbImage, layer: &PixelBuffer) -> RgbImage {
    let layer = layer.to_color();
    if layer.dimensions() == primary.dimensions() {
        return layer;
    }
    debug!(
        from = ?layer.dimensions(),
        to = ?primary.dimensions(),
        "Resizing layer to match primary"
    );
    imageops::resize(&layer, primary.width(), primary.height(), FilterType::Triangle)
}

fn zip_pixels<F>(primary: &RgbImage, layer: &RgbImage, f: F) -> RgbImage
where
    F: Fn(u8, u8) -> u8,
{
    RgbImage::from_fn(primary.width(), primary.height(), |x, y| {
        let Rgb(p) = *primary.get_pixel(x, y);
        let Rgb(s) = *layer.get_pixel(x, y);
        Rgb([f(p[0], s[0]), f(p[1], s[1]), f(p[2], s[2])])
    })
}

/// The `multiply` / `screen` / `overlay` operations.
#[instrument(skip(input, params), fields(opacity = params.opacity))]
pub fn composite(input: &PixelBuffer, params: &CompositeParams, mode: BlendMode) -> PixelBuffer {
    let primary = input.to_color();
    let layer = conform(&primary, &params.layer);
    let opacity = params.opacity;

    PixelBuffer::Color(zip_pixels(&primary, &layer, |p, s| {
        let a = f64::from(p) / 255.0;
        let b = f64::from(s) / 255.0;
        let mixed = a * (1.0 - opacity) + mode.apply(a, b) * opacity;
        saturate_u8(mixed * 255.0)
    }))
}

/// The `blend` operation: `primary * (1 - ratio) + layer * ratio`.
#[instrument(skip(input, params), fields(ratio = params.ratio))]
pub fn blend(input: &PixelBuffer, params: &BlendParams) -> PixelBuffer {
    let primary = input.to_color();
    let layer = conform(&primary, &params.layer);
    let r = params.ratio;

    PixelBuffer::Color(zip_pixels(&primary, &layer, |p, s| {
        saturate_u8(f64::from(p) * (1.0 - r) + f64::from(s) * r)
    }))
}
