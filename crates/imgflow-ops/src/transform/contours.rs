// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Contour extraction. Borders are traced, approximated, filtered by area and
// the survivors drawn onto a fresh canvas.

use image::{GrayImage, Rgb, RgbImage};
use imageproc::contours::{BorderType, Contour, find_contours};
use imgflow_core::types::ContourRecord;
use tracing::{debug, info, instrument};

use crate::buffer::{PixelBuffer, bgr};
use crate::params::{ContourParams, Keyword, Stroke};
use crate::transform::drawing::{LineType, Thickness, draw_polygon_outline};
use crate::transform::threshold::{ThresholdMethod, threshold};

/// Foreground is every luma sample above this level.
pub const BINARIZE_LEVEL: f64 = 127.0;

/// Survivors are drawn in this `[b, g, r]` colour.
pub const OUTLINE_BGR: [f64; 3] = [0.0, 255.0, 0.0];

/// Which traced borders are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalMode {
    /// Top-level outer borders only.
    External,
    /// Every border, flattened.
    List,
    /// Every border, organised as outer / hole pairs.
    ConnectedComponents,
    /// Every border with full nesting.
    Tree,
}

impl Keyword for RetrievalMode {
    const DEFAULT: Self = Self::External;

    fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "RETR_EXTERNAL" => Some(Self::External),
            "RETR_LIST" => Some(Self::List),
            "RETR_CCOMP" => Some(Self::ConnectedComponents),
            "RETR_TREE" => Some(Self::Tree),
            _ => None,
        }
    }
}

/// How a traced border is reduced to polygon vertices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApproxMethod {
    /// Every border pixel.
    None,
    /// Drop interior points of straight horizontal, vertical and diagonal runs.
    Simple,
    /// Polyline approximation at a tight tolerance.
    Tc89L1,
    /// Polyline approximation at a looser tolerance.
    Tc89Kcos,
}

impl Keyword for ApproxMethod {
    const DEFAULT: Self = Self::Simple;

    fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "CHAIN_APPROX_NONE" => Some(Self::None),
            "CHAIN_APPROX_SIMPLE" => Some(Self::Simple),
            "CHAIN_APPROX_TC89_L1" => Some(Self::Tc89L1),
            "CHAIN_APPROX_TC89_KCOS" => Some(Self::Tc89Kcos),
            _ => None,
        }
    }
}

impl ApproxMethod {
    fn tolerance(self) -> Option<f64> {
        match self {
            Self::None | Self::Simple => None,
            Self::Tc89L1 => Some(1.0),
            Self::Tc89Kcos => Some(2.0),
        }
    }
}

type Vertex = (i32, i32);

/// Output of the `contour` operation.
#[derive(Debug, Clone, PartialEq)]
pub struct ContourSet {
    /// Survivors drawn on a black canvas of the input's size.
    pub canvas: PixelBuffer,
    pub contours: Vec<ContourRecord>,
}

/// The `contour` operation.
#[instrument(skip(input))]
pub fn extract(input: &PixelBuffer, params: &ContourParams) -> ContourSet {
    let binary = threshold(&input.to_gray(), BINARIZE_LEVEL, 255.0, ThresholdMethod::Binary);
    let traced = trace(&binary, params.mode);
    let total = traced.len();

    let contours: Vec<ContourRecord> = traced
        .into_iter()
        .map(|points| approximate(&points, params.method))
        .map(|points| ContourRecord {
            area: polygon_area(&points),
            perimeter: arc_length(&points),
            points: points.into_iter().map(|(x, y)| [x, y]).collect(),
        })
        .filter(|c| params.min_area <= c.area && c.area <= params.max_area)
        .collect();
    info!(traced = total, kept = contours.len(), "Contours filtered by area");

    let (w, h) = input.dimensions();
    let mut canvas = RgbImage::new(w, h);
    render(&mut canvas, &contours, bgr(OUTLINE_BGR));

    ContourSet {
        canvas: PixelBuffer::Color(canvas),
        contours,
    }
}

/// Trace borders of the non-zero regions and keep those the mode asks for.
pub fn trace(binary: &GrayImage, mode: RetrievalMode) -> Vec<Vec<Vertex>> {
    let found: Vec<Contour<i32>> = find_contours(binary);
    debug!(borders = found.len(), ?mode, "Borders traced");
    found
        .into_iter()
        .filter(|c| match mode {
            RetrievalMode::External => matches!(c.border_type, BorderType::Outer) && c.parent.is_none(),
            RetrievalMode::List | RetrievalMode::ConnectedComponents | RetrievalMode::Tree => true,
        })
        .map(|c| c.points.into_iter().map(|p| (p.x, p.y)).collect())
        .collect()
}

/// Reduce a closed border to polygon vertices.
pub fn approximate(points: &[Vertex], method: ApproxMethod) -> Vec<Vertex> {
    if method == ApproxMethod::None {
        return points.to_vec();
    }
    let simple = drop_collinear(points);
    match method.tolerance() {
        Some(epsilon) => douglas_peucker_closed(&simple, epsilon),
        None => simple,
    }
}

fn drop_collinear(points: &[Vertex]) -> Vec<Vertex> {
    let n = points.len();
    if n < 3 {
        return points.to_vec();
    }
    let dir = |a: Vertex, b: Vertex| ((b.0 - a.0).signum(), (b.1 - a.1).signum());
    (0..n)
        .filter(|&i| {
            let prev = points[(i + n - 1) % n];
            let next = points[(i + 1) % n];
            dir(prev, points[i]) != dir(points[i], next)
        })
        .map(|i| points[i])
        .collect()
}

fn perpendicular_distance(p: Vertex, a: Vertex, b: Vertex) -> f64 {
    let (px, py) = (f64::from(p.0), f64::from(p.1));
    let (ax, ay) = (f64::from(a.0), f64::from(a.1));
    let (bx, by) = (f64::from(b.0), f64::from(b.1));
    let (dx, dy) = (bx - ax, by - ay);
    let len = dx.hypot(dy);
    if len == 0.0 {
        return (px - ax).hypot(py - ay);
    }
    ((px - ax) * dy - (py - ay) * dx).abs() / len
}

/// Douglas-Peucker on a closed curve: split at the vertex farthest from the
/// first one, then simplify both halves.
fn douglas_peucker_closed(points: &[Vertex], epsilon: f64) -> Vec<Vertex> {
    let n = points.len();
    if n < 4 {
        return points.to_vec();
    }
    let origin = points[0];
    let far = (1..n)
        .max_by_key(|&i| {
            let (dx, dy) = (i64::from(points[i].0 - origin.0), i64::from(points[i].1 - origin.1));
            dx * dx + dy * dy
        })
        .unwrap_or(n / 2);

    // Closing vertex appended so the second half ends back at the origin.
    let mut ring = points.to_vec();
    ring.push(origin);
    let mut keep = vec![false; ring.len()];
    keep[0] = true;
    keep[far] = true;

    let mut stack = vec![(0usize, far), (far, n)];
    while let Some((start, end)) = stack.pop() {
        if end <= start + 1 {
            continue;
        }
        let (mut worst, mut worst_at) = (0.0f64, start);
        for i in start + 1..end {
            let d = perpendicular_distance(ring[i], ring[start], ring[end]);
            if d > worst {
                worst = d;
                worst_at = i;
            }
        }
        if worst > epsilon {
            keep[worst_at] = true;
            stack.push((start, worst_at));
            stack.push((worst_at, end));
        }
    }

    (0..n).filter(|&i| keep[i]).map(|i| ring[i]).collect()
}

/// Shoelace area of the closed polygon.
pub fn polygon_area(points: &[Vertex]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let twice: i64 = (0..n)
        .map(|i| {
            let (x0, y0) = points[i];
            let (x1, y1) = points[(i + 1) % n];
            i64::from(x0) * i64::from(y1) - i64::from(x1) * i64::from(y0)
        })
        .sum();
    twice.abs() as f64 / 2.0
}

/// Length of the closed polyline.
pub fn arc_length(points: &[Vertex]) -> f64 {
    let n = points.len();
    if n < 2 {
        return 0.0;
    }
    (0..n)
        .map(|i| {
            let (x0, y0) = points[i];
            let (x1, y1) = points[(i + 1) % n];
            f64::from(x1 - x0).hypot(f64::from(y1 - y0))
        })
        .sum()
}

fn render(canvas: &mut RgbImage, contours: &[ContourRecord], color: Rgb<u8>) {
    let stroke = Stroke {
        thickness: Thickness::Width(2),
        line_type: LineType::Eight,
    };
    for contour in contours {
        let vertices: Vec<Vertex> = contour.points.iter().map(|&[x, y]| (x, y)).collect();
        draw_polygon_outline(canvas, &vertices, color, stroke);
    }
}

#[cfg(test)]
mod tests {
    use image::Luma;

    use super::*;

    fn square(canvas: u32, from: u32, side: u32) -> GrayImage {
        GrayImage::from_fn(canvas, canvas, |x, y| {
            let inside = (from..from + side).contains(&x) && (from..from + side).contains(&y);
            Luma([if inside { 255 } else { 0 }])
        })
    }

    fn params(mode: RetrievalMode, method: ApproxMethod) -> ContourParams {
        ContourParams {
            mode,
            method,
            min_area: 0.0,
            max_area: 1e9,
        }
    }

    #[test]
    fn square_simplifies_to_its_corners() {
        let traced = trace(&square(40, 10, 21), RetrievalMode::External);
        assert_eq!(traced.len(), 1);
        let corners = approximate(&traced[0], ApproxMethod::Simple);
        assert_eq!(corners.len(), 4);
        for corner in [(10, 10), (30, 10), (30, 30), (10, 30)] {
            assert!(corners.contains(&corner), "{corner:?} missing from {corners:?}");
        }
        assert_eq!(polygon_area(&corners), 400.0);
        assert_eq!(arc_length(&corners), 80.0);
    }

    #[test]
    fn no_approximation_keeps_every_border_pixel() {
        let traced = trace(&square(40, 10, 21), RetrievalMode::External);
        assert_eq!(approximate(&traced[0], ApproxMethod::None).len(), 80);
    }

    #[test]
    fn polyline_approximation_keeps_square_corners() {
        let traced = trace(&square(40, 10, 21), RetrievalMode::External);
        for method in [ApproxMethod::Tc89L1, ApproxMethod::Tc89Kcos] {
            let poly = approximate(&traced[0], method);
            assert_eq!(poly.len(), 4, "{method:?}: {poly:?}");
            assert_eq!(polygon_area(&poly), 400.0);
        }
    }

    #[test]
    fn external_mode_skips_holes() {
        let mut ring = square(50, 5, 41);
        for y in 15..36 {
            for x in 15..36 {
                ring.put_pixel(x, y, Luma([0]));
            }
        }
        assert_eq!(trace(&ring, RetrievalMode::External).len(), 1);
        assert_eq!(trace(&ring, RetrievalMode::List).len(), 2);
        assert_eq!(trace(&ring, RetrievalMode::Tree).len(), 2);
    }

    #[test]
    fn area_filter_is_inclusive() {
        let input = PixelBuffer::Gray(square(40, 10, 21));
        let mut p = params(RetrievalMode::External, ApproxMethod::Simple);
        p.min_area = 400.0;
        p.max_area = 400.0;
        assert_eq!(extract(&input, &p).contours.len(), 1);
        p.min_area = 401.0;
        assert!(extract(&input, &p).contours.is_empty());
    }

    #[test]
    fn survivors_are_drawn_green_on_black() {
        let input = PixelBuffer::Gray(square(40, 10, 21));
        let set = extract(&input, &params(RetrievalMode::External, ApproxMethod::Simple));
        let PixelBuffer::Color(canvas) = set.canvas else {
            panic!("contour canvas must be colour");
        };
        assert_eq!(canvas.dimensions(), (40, 40));
        assert_eq!(canvas.get_pixel(20, 10), &Rgb([0, 255, 0]));
        assert_eq!(canvas.get_pixel(20, 20), &Rgb([0, 0, 0]));
        assert!(canvas.pixels().all(|p| p.0[0] == 0 && p.0[2] == 0));
    }

    #[test]
    fn blank_input_has_no_contours() {
        let input = PixelBuffer::zeros(16, 16, 3);
        let set = extract(&input, &params(RetrievalMode::List, ApproxMethod::None));
        assert!(set.contours.is_empty());
    }

    #[test]
    fn degenerate_polygons_have_zero_area() {
        assert_eq!(polygon_area(&[(1, 1)]), 0.0);
        assert_eq!(polygon_area(&[(1, 1), (5, 1)]), 0.0);
        assert_eq!(arc_length(&[(1, 1)]), 0.0);
    }
}
