// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Separable Gaussian blur with selectable border extrapolation.

use tracing::{debug, instrument};

use crate::buffer::{PixelBuffer, saturate_u8};
use crate::params::{BlurParams, Keyword};

/// How samples outside the image are synthesised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorderMode {
    /// Mirror without repeating the edge sample: `gfedcb|abcdefgh|gfedcba`.
    Reflect101,
    /// Outside samples are zero.
    Constant,
    /// Repeat the edge sample: `aaaaaa|abcdefgh|hhhhhhh`.
    Replicate,
}

impl Keyword for BorderMode {
    const DEFAULT: Self = Self::Reflect101;

    fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "BORDER_DEFAULT" | "BORDER_REFLECT_101" | "BORDER_REFLECT101" => {
                Some(Self::Reflect101)
            }
            "BORDER_CONSTANT" => Some(Self::Constant),
            "BORDER_REPLICATE" => Some(Self::Replicate),
            _ => None,
        }
    }
}

impl BorderMode {
    /// Map a possibly out-of-range index into `0..len`. `None` means "use
    /// zero" (constant border).
    pub fn resolve(self, index: isize, len: usize) -> Option<usize> {
        let n = len as isize;
        if (0..n).contains(&index) {
            return Some(index as usize);
        }
        match self {
            Self::Constant => None,
            Self::Replicate => Some(index.clamp(0, n - 1) as usize),
            Self::Reflect101 => {
                if n == 1 {
                    return Some(0);
                }
                let period = 2 * (n - 1);
                let mut i = index.rem_euclid(period);
                if i >= n {
                    i = period - i;
                }
                Some(i as usize)
            }
        }
    }
}

/// Sigma derived from the kernel size when the caller passes `<= 0`.
pub fn auto_sigma(ksize: u32) -> f64 {
    0.3 * ((ksize as f64 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Fixed binomial taps used for small kernels when no sigma is given.
const SMALL_KERNELS: [&[f64]; 4] = [
    &[1.0],
    &[0.25, 0.5, 0.25],
    &[0.0625, 0.25, 0.375, 0.25, 0.0625],
    &[0.03125, 0.109375, 0.21875, 0.28125, 0.21875, 0.109375, 0.03125],
];

/// Normalised 1-D Gaussian of odd length `ksize`.
///
/// With `sigma <= 0` sizes up to 7 use the binomial tables; larger sizes
/// sample a Gaussian at [`auto_sigma`].
pub fn gaussian_kernel(ksize: u32, sigma: f64) -> Vec<f64> {
    if sigma <= 0.0 && ksize % 2 == 1 && ksize <= 7 {
        return SMALL_KERNELS[(ksize / 2) as usize].to_vec();
    }
    let sigma = if sigma > 0.0 { sigma } else { auto_sigma(ksize) };
    let center = (ksize / 2) as f64;
    let scale = -0.5 / (sigma * sigma);
    let mut kernel: Vec<f64> = (0..ksize)
        .map(|i| {
            let x = i as f64 - center;
            (scale * x * x).exp()
        })
        .collect();
    let sum: f64 = kernel.iter().sum();
    for k in &mut kernel {
        *k /= sum;
    }
    kernel
}

/// Blur every channel with a `ksize x ksize` Gaussian.
#[instrument(skip(input))]
pub fn gaussian_blur(input: &PixelBuffer, params: &BlurParams) -> PixelBuffer {
    let ksize = params.kernel_size.get();
    let sigma_y = if params.sigma_y > 0.0 {
        params.sigma_y
    } else {
        params.sigma_x
    };
    let kx = gaussian_kernel(ksize, params.sigma_x);
    let ky = gaussian_kernel(ksize, sigma_y);
    debug!(ksize, sigma_x = params.sigma_x, sigma_y, "Gaussian kernels built");

    input.map_raw(|raw, w, h, c| separable_filter(raw, w, h, c, &kx, &ky, params.border))
}

/// Convolve rows with `kx`, then columns with `ky`, per channel.
pub fn separable_filter(
    raw: &[u8],
    w: usize,
    h: usize,
    c: usize,
    kx: &[f64],
    ky: &[f64],
    border: BorderMode,
) -> Vec<u8> {
    let rx = (kx.len() / 2) as isize;
    let ry = (ky.len() / 2) as isize;

    let mut horizontal = vec![0.0f64; raw.len()];
    for y in 0..h {
        let row = y * w * c;
        for x in 0..w {
            for ch in 0..c {
                let mut acc = 0.0;
                for (k, weight) in kx.iter().enumerate() {
                    let sx = x as isize + k as isize - rx;
                    if let Some(sx) = border.resolve(sx, w) {
                        acc += weight * f64::from(raw[row + sx * c + ch]);
                    }
                }
                horizontal[row + x * c + ch] = acc;
            }
        }
    }

    let mut out = vec![0u8; raw.len()];
    for y in 0..h {
        for x in 0..w {
            for ch in 0..c {
                let mut acc = 0.0;
                for (k, weight) in ky.iter().enumerate() {
                    let sy = y as isize + k as isize - ry;
                    if let Some(sy) = border.resolve(sy, h) {
                        acc += weight * horizontal[(sy * w + x) * c + ch];
                    }
                }
                out[(y * w + x) * c + ch] = saturate_u8(acc);
            }
        }
    }
    out
}
