// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pixel algorithms behind every operation.

pub mod blur;
pub mod composite;
pub mod contours;
pub mod drawing;
pub mod edges;
pub mod morphology;
pub mod threshold;

use image::{GrayImage, Luma, RgbImage};
use tracing::instrument;

use crate::buffer::{PixelBuffer, bgr, luma};
use crate::params::BlankParams;

/// The `grayscale` operation.
#[instrument(skip(input))]
pub fn grayscale(input: &PixelBuffer) -> PixelBuffer {
    PixelBuffer::Gray(input.to_gray())
}

/// The `blank` operation: a canvas of the input's size (unless overridden)
/// filled with one colour, black by default.
#[instrument(skip(input))]
pub fn blank(input: &PixelBuffer, params: &BlankParams) -> PixelBuffer {
    let width = params.width.unwrap_or(input.width());
    let height = params.height.unwrap_or(input.height());
    let fill = bgr(params.color);

    if params.grayscale {
        PixelBuffer::Gray(GrayImage::from_pixel(width, height, Luma([luma(&fill)])))
    } else {
        PixelBuffer::Color(RgbImage::from_pixel(width, height, fill))
    }
}

#[cfg(test)]
mod tests {
    use image::Rgb;

    use super::*;

    #[test]
    fn blank_defaults_to_black_with_input_shape() {
        let input = PixelBuffer::Color(RgbImage::from_pixel(7, 4, Rgb([9, 9, 9])));
        let params = BlankParams {
            width: None,
            height: None,
            color: [0.0; 3],
            grayscale: false,
        };
        assert_eq!(blank(&input, &params), PixelBuffer::zeros(7, 4, 3));
    }

    #[test]
    fn blank_overrides_size_colour_and_channels() {
        let input = PixelBuffer::zeros(7, 4, 3);
        let params = BlankParams {
            width: Some(3),
            height: Some(2),
            color: [255.0, 255.0, 255.0],
            grayscale: true,
        };
        let out = blank(&input, &params);
        assert_eq!(out.shape(), (2, 3, 1));
        assert!(out.as_raw().iter().all(|&v| v == 255));
    }

    #[test]
    fn grayscale_collapses_to_one_channel() {
        let input = PixelBuffer::Color(RgbImage::from_pixel(2, 2, Rgb([255, 0, 0])));
        let out = grayscale(&input);
        assert_eq!(out.channels(), 1);
        assert_eq!(out.as_raw(), &[76, 76, 76, 76]);
    }
}
