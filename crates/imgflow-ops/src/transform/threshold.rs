// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Global thresholding, Otsu level selection, and the mask / invert-mask
// keep-masks built on top of them.

use image::{GrayImage, Luma, Rgb, RgbImage};
use tracing::{debug, info, instrument};

use crate::buffer::PixelBuffer;
use crate::params::{Keyword, MaskParams, ThresholdParams};

/// Per-pixel threshold function. Every method splits on `src > thresh`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdMethod {
    /// `src > t ? max : 0`
    Binary,
    /// `src > t ? 0 : max`
    BinaryInverse,
    /// `src > t ? t : src`
    Truncate,
    /// `src > t ? src : 0`
    ToZero,
    /// `src > t ? 0 : src`
    ToZeroInverse,
}

impl Keyword for ThresholdMethod {
    const DEFAULT: Self = Self::Binary;

    fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "THRESH_BINARY" => Some(Self::Binary),
            "THRESH_BINARY_INV" => Some(Self::BinaryInverse),
            "THRESH_TRUNC" => Some(Self::Truncate),
            "THRESH_TOZERO" => Some(Self::ToZero),
            "THRESH_TOZERO_INV" => Some(Self::ToZeroInverse),
            _ => None,
        }
    }
}

/// Apply a global threshold to a single-channel image.
///
/// `thresh` is floored to an integer cut and `max_value` is rounded and
/// saturated into `0..=255`, matching how 8-bit thresholding is normally
/// specified.
pub fn threshold(
    gray: &GrayImage,
    thresh: f64,
    max_value: f64,
    method: ThresholdMethod,
) -> GrayImage {
    let cut = thresh.floor().clamp(-1.0, 255.0) as i32;
    let max = crate::buffer::saturate_u8(max_value);
    // Truncation writes the cut itself, so it must be representable.
    let trunc = cut.clamp(0, 255) as u8;

    let mut out = gray.clone();
    for px in out.pixels_mut() {
        let src = px.0[0];
        let above = i32::from(src) > cut;
        px.0[0] = match method {
            ThresholdMethod::Binary => {
                if above { max } else { 0 }
            }
            ThresholdMethod::BinaryInverse => {
                if above { 0 } else { max }
            }
            ThresholdMethod::Truncate => {
                if above { trunc } else { src }
            }
            ThresholdMethod::ToZero => {
                if above { src } else { 0 }
            }
            ThresholdMethod::ToZeroInverse => {
                if above { 0 } else { src }
            }
        };
    }
    out
}

/// Otsu's method: the cut that maximises between-class variance of the
/// histogram, where the lower class is every value `<= cut`.
pub fn otsu_level(gray: &GrayImage) -> u8 {
    let mut histogram = [0u64; 256];
    for px in gray.pixels() {
        histogram[px.0[0] as usize] += 1;
    }

    let total = gray.width() as u64 * gray.height() as u64;
    if total == 0 {
        return 0;
    }

    let sum_total: f64 = histogram
        .iter()
        .enumerate()
        .map(|(i, &n)| i as f64 * n as f64)
        .sum();

    let mut sum_low = 0.0f64;
    let mut weight_low = 0u64;
    let mut best_variance = 0.0f64;
    let mut best = 0u8;

    for (t, &count) in histogram.iter().enumerate() {
        weight_low += count;
        if weight_low == 0 {
            continue;
        }
        let weight_high = total - weight_low;
        if weight_high == 0 {
            break;
        }

        sum_low += t as f64 * count as f64;
        let mean_low = sum_low / weight_low as f64;
        let mean_high = (sum_total - sum_low) / weight_high as f64;
        let variance = weight_low as f64 * weight_high as f64 * (mean_low - mean_high).powi(2);

        if variance > best_variance {
            best_variance = variance;
            best = t as u8;
        }
    }

    best
}

/// The `binary` operation: luma reduction followed by [`threshold`], with
/// Otsu overriding the supplied cut when requested.
#[instrument(skip(input))]
pub fn binary(input: &PixelBuffer, params: &ThresholdParams) -> PixelBuffer {
    let gray = input.to_gray();
    let cut = if params.use_otsu {
        let level = otsu_level(&gray);
        debug!(level, "Otsu level selected");
        f64::from(level)
    } else {
        params.threshold
    };
    info!(cut, method = ?params.method, "Applying threshold");
    PixelBuffer::Gray(threshold(&gray, cut, params.max_value, params.method))
}

/// The `mask` / `invert-mask` operations.
///
/// The luma is thresholded into a mask (complemented when `invert` is set);
/// colour survives wherever the mask is non-zero and becomes black elsewhere.
#[instrument(skip(input))]
pub fn keep_mask(input: &PixelBuffer, params: &MaskParams, invert: bool) -> PixelBuffer {
    let mut mask = threshold(
        &input.to_gray(),
        params.threshold,
        params.max_value,
        params.method,
    );
    if invert {
        for px in mask.pixels_mut() {
            px.0[0] = !px.0[0];
        }
    }

    let color = input.to_color();
    let out = RgbImage::from_fn(color.width(), color.height(), |x, y| {
        let Luma([m]) = *mask.get_pixel(x, y);
        if m != 0 {
            *color.get_pixel(x, y)
        } else {
            Rgb([0, 0, 0])
        }
    });
    PixelBuffer::Color(out)
}
