// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Canny edge detection: Sobel gradients, non-maximum suppression and
// hysteresis thresholding.

use image::GrayImage;
use tracing::{debug, info, instrument};

use crate::buffer::PixelBuffer;
use crate::params::EdgeParams;
use crate::transform::blur::BorderMode;

/// Sobel apertures that have a defined derivative kernel.
pub const SUPPORTED_APERTURES: [u32; 3] = [3, 5, 7];

/// Binomial smoothing row of length `n + 1`.
fn binomial(n: usize) -> Vec<i32> {
    let mut row = vec![1i32];
    for _ in 0..n {
        let mut next = vec![1i32; row.len() + 1];
        for i in 1..row.len() {
            next[i] = row[i - 1] + row[i];
        }
        row = next;
    }
    row
}

/// `(smoothing, derivative)` 1-D kernels for a Sobel aperture.
pub fn sobel_kernels(aperture: u32) -> (Vec<i32>, Vec<i32>) {
    let n = aperture as usize;
    let smooth = binomial(n - 1);
    let base = binomial(n - 3);
    let mut deriv = vec![0i32; n];
    for (i, b) in base.iter().enumerate() {
        deriv[i] -= b;
        deriv[i + 2] += b;
    }
    (smooth, deriv)
}

/// Apply `kx` along rows and `ky` along columns with replicated borders.
fn correlate(gray: &GrayImage, kx: &[i32], ky: &[i32]) -> Vec<i32> {
    let (w, h) = (gray.width() as usize, gray.height() as usize);
    let raw = gray.as_raw();
    let r = (kx.len() / 2) as isize;
    let border = BorderMode::Replicate;

    let mut rows = vec![0i32; w * h];
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0;
            for (k, weight) in kx.iter().enumerate() {
                let sx = border.resolve(x as isize + k as isize - r, w).unwrap_or(0);
                acc += weight * i32::from(raw[y * w + sx]);
            }
            rows[y * w + x] = acc;
        }
    }

    let mut out = vec![0i32; w * h];
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0;
            for (k, weight) in ky.iter().enumerate() {
                let sy = border.resolve(y as isize + k as isize - r, h).unwrap_or(0);
                acc += weight * rows[sy * w + x];
            }
            out[y * w + x] = acc;
        }
    }
    out
}

/// Binary edge map (0 / 255) of a single-channel image.
pub fn canny(gray: &GrayImage, low: f64, high: f64, aperture: u32, l2: bool) -> GrayImage {
    let (low, high) = if low > high { (high, low) } else { (low, high) };
    let (w, h) = (gray.width() as usize, gray.height() as usize);

    let (smooth, deriv) = sobel_kernels(aperture);
    let dx = correlate(gray, &deriv, &smooth);
    let dy = correlate(gray, &smooth, &deriv);

    let magnitude: Vec<f64> = dx
        .iter()
        .zip(&dy)
        .map(|(&gx, &gy)| {
            let (gx, gy) = (f64::from(gx), f64::from(gy));
            if l2 {
                (gx * gx + gy * gy).sqrt()
            } else {
                gx.abs() + gy.abs()
            }
        })
        .collect();

    let mag_at = |x: isize, y: isize| -> f64 {
        if x < 0 || y < 0 || x >= w as isize || y >= h as isize {
            0.0
        } else {
            magnitude[y as usize * w + x as usize]
        }
    };

    // 0 = suppressed, 1 = weak candidate, 2 = strong
    let mut state = vec![0u8; w * h];
    let mut stack = Vec::new();
    // tan(22.5°) and tan(67.5°)
    const TAN_22_5: f64 = 0.414_213_562_373_095;
    const TAN_67_5: f64 = 2.414_213_562_373_095;

    for y in 0..h {
        for x in 0..w {
            let i = y * w + x;
            let m = magnitude[i];
            if m <= low {
                continue;
            }
            let gx = f64::from(dx[i]);
            let gy = f64::from(dy[i]);
            let (ax, ay) = (gx.abs(), gy.abs());
            let (xi, yi) = (x as isize, y as isize);

            let (before, after) = if ay <= ax * TAN_22_5 {
                (mag_at(xi - 1, yi), mag_at(xi + 1, yi))
            } else if ay >= ax * TAN_67_5 {
                (mag_at(xi, yi - 1), mag_at(xi, yi + 1))
            } else if (gx < 0.0) != (gy < 0.0) {
                (mag_at(xi + 1, yi - 1), mag_at(xi - 1, yi + 1))
            } else {
                (mag_at(xi - 1, yi - 1), mag_at(xi + 1, yi + 1))
            };

            if m > before && m >= after {
                if m > high {
                    state[i] = 2;
                    stack.push(i);
                } else {
                    state[i] = 1;
                }
            }
        }
    }

    let strong = stack.len();
    while let Some(i) = stack.pop() {
        let (x, y) = ((i % w) as isize, (i / w) as isize);
        for ny in y - 1..=y + 1 {
            for nx in x - 1..=x + 1 {
                if nx < 0 || ny < 0 || nx >= w as isize || ny >= h as isize {
                    continue;
                }
                let j = ny as usize * w + nx as usize;
                if state[j] == 1 {
                    state[j] = 2;
                    stack.push(j);
                }
            }
        }
    }
    debug!(strong, "Hysteresis seeded");

    let pixels = state
        .into_iter()
        .map(|s| if s == 2 { 255 } else { 0 })
        .collect();
    GrayImage::from_raw(w as u32, h as u32, pixels).unwrap_or_else(|| GrayImage::new(w as u32, h as u32))
}

/// The `edge` operation.
#[instrument(skip(input))]
pub fn detect_edges(input: &PixelBuffer, params: &EdgeParams) -> PixelBuffer {
    info!(
        low = params.low,
        high = params.high,
        aperture = params.aperture,
        l2 = params.l2_gradient,
        "Running Canny edge detection"
    );
    PixelBuffer::Gray(canny(
        &input.to_gray(),
        params.low,
        params.high,
        params.aperture,
        params.l2_gradient,
    ))
}

#[cfg(test)]
mod tests {
    use image::Luma;

    use super::*;

    fn step(width: u32, height: u32, at: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, _| Luma([if x < at { 0 } else { 255 }]))
    }

    #[test]
    fn sobel_kernels_match_standard_apertures() {
        assert_eq!(sobel_kernels(3), (vec![1, 2, 1], vec![-1, 0, 1]));
        assert_eq!(sobel_kernels(5), (vec![1, 4, 6, 4, 1], vec![-1, -2, 0, 2, 1]));
        assert_eq!(
            sobel_kernels(7),
            (vec![1, 6, 15, 20, 15, 6, 1], vec![-1, -4, -5, 0, 5, 4, 1])
        );
    }

    #[test]
    fn vertical_step_yields_a_thin_vertical_edge() {
        let edges = canny(&step(20, 10, 10), 100.0, 200.0, 3, false);
        for y in 0..10 {
            let row: Vec<u32> = (0..20).filter(|&x| edges.get_pixel(x, y).0[0] == 255).collect();
            assert_eq!(row.len(), 1, "row {y}: {row:?}");
            assert!(row[0] == 9 || row[0] == 10, "row {y}: {row:?}");
        }
    }

    #[test]
    fn flat_image_has_no_edges() {
        let flat = GrayImage::from_pixel(16, 16, Luma([90]));
        let edges = canny(&flat, 10.0, 20.0, 5, true);
        assert!(edges.pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn thresholds_given_in_reverse_are_swapped() {
        let img = step(20, 10, 10);
        assert_eq!(
            canny(&img, 200.0, 100.0, 3, false),
            canny(&img, 100.0, 200.0, 3, false)
        );
    }

    #[test]
    fn high_cut_above_every_gradient_suppresses_everything() {
        // A 0 -> 255 step with aperture 3 peaks at 4 * 255 = 1020 (L1).
        let edges = canny(&step(20, 10, 10), 100.0, 5000.0, 3, false);
        assert!(edges.pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn l1_and_l2_magnitudes_differ_on_a_diagonal_step() {
        // Beside the edge |gx| = |gy| = 765: L1 gives 1530, L2 about 1082.
        let diagonal = GrayImage::from_fn(20, 20, |x, y| Luma([if x + y >= 20 { 255 } else { 0 }]));
        let l1 = canny(&diagonal, 1300.0, 1300.0, 3, false);
        let l2 = canny(&diagonal, 1300.0, 1300.0, 3, true);
        assert!(l1.pixels().any(|p| p.0[0] == 255));
        assert!(l2.pixels().all(|p| p.0[0] == 0));
        assert!(canny(&diagonal, 1000.0, 1000.0, 3, true).pixels().any(|p| p.0[0] == 255));
    }

    #[test]
    fn output_is_binary() {
        let img = GrayImage::from_fn(32, 32, |x, y| Luma([((x * 7 + y * 13) % 256) as u8]));
        let edges = canny(&img, 50.0, 150.0, 3, true);
        assert!(edges.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
    }
}
