// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Morphological erosion and dilation with rectangle, cross and ellipse
// structuring elements.

use image::{GrayImage, Luma};
use imageproc::morphology::{Mask, grayscale_dilate, grayscale_erode};
use tracing::{debug, instrument};

use crate::buffer::PixelBuffer;
use crate::params::{Keyword, MorphParams};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelShape {
    Rect,
    Cross,
    Ellipse,
}

impl Keyword for KernelShape {
    const DEFAULT: Self = Self::Rect;

    fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "MORPH_RECT" => Some(Self::Rect),
            "MORPH_CROSS" => Some(Self::Cross),
            "MORPH_ELLIPSE" => Some(Self::Ellipse),
            _ => None,
        }
    }
}

/// Square binary footprint, always symmetric about its centre cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuringElement {
    size: usize,
    cells: Vec<bool>,
}

impl StructuringElement {
    /// Build a `size x size` element centred on `size / 2`.
    pub fn new(shape: KernelShape, size: usize) -> Self {
        let size = size.max(1);
        let c = size / 2;
        let mut cells = vec![false; size * size];

        match shape {
            KernelShape::Rect => cells.fill(true),
            KernelShape::Cross => {
                for i in 0..size {
                    cells[c * size + i] = true;
                    cells[i * size + c] = true;
                }
            }
            KernelShape::Ellipse => {
                let r = c as f64;
                for row in 0..size {
                    let dy = row as f64 - r;
                    let (j1, j2) = if r > 0.0 {
                        let dx = (r * ((r * r - dy * dy) / (r * r)).max(0.0).sqrt()).round();
                        let j1 = (r - dx).max(0.0) as usize;
                        let j2 = ((r + dx + 1.0) as usize).min(size);
                        (j1, j2)
                    } else {
                        (0, size)
                    };
                    for j in j1..j2 {
                        cells[row * size + j] = true;
                    }
                }
            }
        }

        Self { size, cells }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn contains(&self, x: usize, y: usize) -> bool {
        self.cells[y * self.size + x]
    }

    /// The footprint as a 0/255 image, the form imageproc masks are built from.
    pub fn to_image(&self) -> GrayImage {
        let side = self.size as u32;
        GrayImage::from_fn(side, side, |x, y| {
            Luma([if self.contains(x as usize, y as usize) { 255 } else { 0 }])
        })
    }

    /// Mask whose origin sits on `anchor`. Kernel sizes are capped well
    /// below 256, so the anchor always fits the mask's `u8` centre.
    fn mask(&self, (ax, ay): (usize, usize)) -> Mask {
        let centre = |v: usize| u8::try_from(v).unwrap_or(u8::MAX);
        Mask::from_image(&self.to_image(), centre(ax), centre(ay))
    }
}

/// Local minimum under the element, repeated `iterations` times.
#[instrument(skip(input))]
pub fn erode(input: &PixelBuffer, params: &MorphParams) -> PixelBuffer {
    morph(input, params, grayscale_erode)
}

/// Local maximum under the element, repeated `iterations` times.
#[instrument(skip(input))]
pub fn dilate(input: &PixelBuffer, params: &MorphParams) -> PixelBuffer {
    morph(input, params, grayscale_dilate)
}

/// Samples outside the image never take part, so the border does not pull
/// values towards black or white.
fn morph(
    input: &PixelBuffer,
    params: &MorphParams,
    reduce: fn(&GrayImage, &Mask) -> GrayImage,
) -> PixelBuffer {
    if params.iterations == 0 {
        return input.clone();
    }

    let element = StructuringElement::new(params.shape, params.kernel_size.get() as usize);
    let mask = element.mask(params.anchor);
    debug!(
        size = element.size(),
        anchor = ?params.anchor,
        iterations = params.iterations,
        "Structuring element built"
    );

    let mut current = input.clone();
    for _ in 0..params.iterations {
        current = current.map_planes(|plane| reduce(plane, &mask));
    }
    current
}
