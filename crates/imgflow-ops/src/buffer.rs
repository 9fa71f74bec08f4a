// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The single in-memory image type that flows between the codec
// and the transforms.

use image::{DynamicImage, GrayImage, ImageBuffer, Luma, Pixel, Rgb, RgbImage};

/// Dense 8-bit image with either one (mask / intensity) or three (colour)
/// channels.
///
/// Colour samples are stored R, G, B in memory. Callers that speak in B, G, R
/// triples (colour parameters) go through [`bgr`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PixelBuffer {
    Gray(GrayImage),
    Color(RgbImage),
}

impl PixelBuffer {
    /// Zero-filled buffer of the given size and channel count (1 or 3).
    pub fn zeros(width: u32, height: u32, channels: u8) -> Self {
        if channels == 1 {
            Self::Gray(GrayImage::new(width, height))
        } else {
            Self::Color(RgbImage::new(width, height))
        }
    }

    pub fn width(&self) -> u32 {
        match self {
            Self::Gray(img) => img.width(),
            Self::Color(img) => img.width(),
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            Self::Gray(img) => img.height(),
            Self::Color(img) => img.height(),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    pub fn channels(&self) -> u8 {
        match self {
            Self::Gray(_) => 1,
            Self::Color(_) => 3,
        }
    }

    /// `(height, width, channels)`, the way array-shaped images are usually
    /// described.
    pub fn shape(&self) -> (u32, u32, u8) {
        (self.height(), self.width(), self.channels())
    }

    /// True when either dimension is zero.
    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Interleaved samples, row-major.
    pub fn as_raw(&self) -> &[u8] {
        match self {
            Self::Gray(img) => img.as_raw(),
            Self::Color(img) => img.as_raw(),
        }
    }

    /// Luma reduction (`0.299 R + 0.587 G + 0.114 B`, 14-bit fixed point).
    /// A gray buffer is returned as a copy.
    pub fn to_gray(&self) -> GrayImage {
        match self {
            Self::Gray(img) => img.clone(),
            Self::Color(img) => {
                GrayImage::from_fn(img.width(), img.height(), |x, y| {
                    Luma([luma(img.get_pixel(x, y))])
                })
            }
        }
    }

    /// Expand to three channels. A colour buffer is returned as a copy.
    pub fn to_color(&self) -> RgbImage {
        match self {
            Self::Color(img) => img.clone(),
            Self::Gray(img) => RgbImage::from_fn(img.width(), img.height(), |x, y| {
                img.get_pixel(x, y).to_rgb()
            }),
        }
    }

    /// Rebuild a buffer of the same kind and size from processed raw samples.
    ///
    /// `f` receives `(samples, width, height, channels)` and must return a
    /// vector of exactly `width * height * channels` samples.
    pub fn map_raw<F>(&self, f: F) -> Self
    where
        F: FnOnce(&[u8], usize, usize, usize) -> Vec<u8>,
    {
        let (w, h) = self.dimensions();
        let c = self.channels() as usize;
        let out = f(self.as_raw(), w as usize, h as usize, c);
        match self {
            Self::Gray(_) => Self::Gray(
                ImageBuffer::from_raw(w, h, out).unwrap_or_else(|| GrayImage::new(w, h)),
            ),
            Self::Color(_) => Self::Color(
                ImageBuffer::from_raw(w, h, out).unwrap_or_else(|| RgbImage::new(w, h)),
            ),
        }
    }

    /// Apply a single-channel filter to each channel independently.
    pub fn map_planes<F>(&self, f: F) -> Self
    where
        F: Fn(&GrayImage) -> GrayImage,
    {
        match self {
            Self::Gray(img) => Self::Gray(f(img)),
            Self::Color(img) => {
                let (w, h) = img.dimensions();
                let planes: Vec<GrayImage> = (0..3)
                    .map(|c| f(&GrayImage::from_fn(w, h, |x, y| Luma([img.get_pixel(x, y).0[c]]))))
                    .collect();
                Self::Color(RgbImage::from_fn(w, h, |x, y| {
                    Rgb([
                        planes[0].get_pixel(x, y).0[0],
                        planes[1].get_pixel(x, y).0[0],
                        planes[2].get_pixel(x, y).0[0],
                    ])
                }))
            }
        }
    }

    pub fn into_dynamic(self) -> DynamicImage {
        match self {
            Self::Gray(img) => DynamicImage::ImageLuma8(img),
            Self::Color(img) => DynamicImage::ImageRgb8(img),
        }
    }
}

impl From<GrayImage> for PixelBuffer {
    fn from(img: GrayImage) -> Self {
        Self::Gray(img)
    }
}

impl From<RgbImage> for PixelBuffer {
    fn from(img: RgbImage) -> Self {
        Self::Color(img)
    }
}

/// Fixed-point luma of one colour pixel.
pub fn luma(px: &Rgb<u8>) -> u8 {
    const R: u32 = 4899;
    const G: u32 = 9617;
    const B: u32 = 1868;
    let [r, g, b] = px.0;
    ((r as u32 * R + g as u32 * G + b as u32 * B + (1 << 13)) >> 14) as u8
}

/// Turn a caller-supplied `[b, g, r]` triple into a stored pixel, saturating
/// each channel into `0..=255`.
pub fn bgr(color: [f64; 3]) -> Rgb<u8> {
    let [b, g, r] = color.map(saturate_u8);
    Rgb([r, g, b])
}

/// Round to nearest and clamp into the 8-bit range.
pub fn saturate_u8(v: f64) -> u8 {
    if v.is_nan() {
        return 0;
    }
    v.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn luma_weights_favour_green() {
        assert_eq!(luma(&Rgb([255, 255, 255])), 255);
        assert_eq!(luma(&Rgb([0, 0, 0])), 0);
        assert_eq!(luma(&Rgb([255, 0, 0])), 76);
        assert_eq!(luma(&Rgb([0, 255, 0])), 150);
        assert_eq!(luma(&Rgb([0, 0, 255])), 29);
    }

    #[test]
    fn bgr_reorders_and_saturates() {
        assert_eq!(bgr([255.0, 0.0, 0.0]), Rgb([0, 0, 255]));
        assert_eq!(bgr([-20.0, 300.0, 12.4]), Rgb([12, 255, 0]));
    }

    #[test]
    fn shape_reports_height_width_channels() {
        let buf = PixelBuffer::zeros(7, 5, 3);
        assert_eq!(buf.shape(), (5, 7, 3));
        assert_eq!(PixelBuffer::zeros(7, 5, 1).channels(), 1);
    }

    #[test]
    fn map_raw_preserves_kind() {
        let buf = PixelBuffer::Gray(GrayImage::from_pixel(3, 2, Luma([10])));
        let inverted = buf.map_raw(|raw, _, _, _| raw.iter().map(|v| 255 - v).collect());
        assert_eq!(inverted, PixelBuffer::Gray(GrayImage::from_pixel(3, 2, Luma([245]))));
    }

    #[test]
    fn map_planes_filters_each_channel_alone() {
        let buf = PixelBuffer::Color(RgbImage::from_pixel(2, 2, Rgb([10, 20, 30])));
        let out = buf.map_planes(|plane| {
            let first = plane.get_pixel(0, 0).0[0];
            GrayImage::from_pixel(2, 2, Luma([first + 1]))
        });
        assert_eq!(out, PixelBuffer::Color(RgbImage::from_pixel(2, 2, Rgb([11, 21, 31]))));
    }

    #[test]
    fn gray_to_color_replicates_channel() {
        let buf = PixelBuffer::Gray(GrayImage::from_pixel(1, 1, Luma([42])));
        assert_eq!(*buf.to_color().get_pixel(0, 0), Rgb([42, 42, 42]));
    }
}
