// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Drawing primitives rendered onto a copy of the input.

use image::{Rgb, RgbImage};
use imageproc::drawing::{
    draw_antialiased_line_segment_mut, draw_filled_rect_mut, draw_hollow_circle_mut,
};
use imageproc::pixelops::interpolate;
use imageproc::rect::Rect;
use tracing::{debug, instrument};

use crate::buffer::{PixelBuffer, bgr};
use crate::params::{CircleParams, Keyword, LineParams, RectParams, Stroke};

/// Largest stroke width accepted; wider requests are clamped.
pub const MAX_THICKNESS: u32 = 32767;

/// Pixel connectivity / smoothing of rendered lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineType {
    /// Consecutive pixels share an edge.
    Four,
    /// Consecutive pixels share an edge or a corner.
    Eight,
    /// Coverage-weighted (Wu) line.
    AntiAliased,
}

impl Keyword for LineType {
    const DEFAULT: Self = Self::Eight;

    fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "LINE_4" => Some(Self::Four),
            "LINE_8" => Some(Self::Eight),
            "LINE_AA" => Some(Self::AntiAliased),
            _ => None,
        }
    }
}

/// Outline width or solid fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Thickness {
    Width(u32),
    Filled,
}

impl Thickness {
    /// Negative widths mean "fill"; zero is widened to one pixel.
    pub fn from_signed(width: i64) -> Self {
        if width < 0 {
            Self::Filled
        } else {
            Self::Width(width.clamp(1, i64::from(MAX_THICKNESS)) as u32)
        }
    }
}

/// Pixels of the segment `from -> to`, endpoints included.
///
/// Allocates one entry per step, so callers drawing request geometry clip
/// with [`clip_segment`] first.
pub fn line_points(from: (i32, i32), to: (i32, i32), connectivity: LineType) -> Vec<(i32, i32)> {
    let (mut x, mut y) = (i64::from(from.0), i64::from(from.1));
    let (x1, y1) = (i64::from(to.0), i64::from(to.1));
    let dx = (x1 - x).abs();
    let dy = (y1 - y).abs();
    let sx = if x1 >= x { 1 } else { -1 };
    let sy = if y1 >= y { 1 } else { -1 };

    let mut points = Vec::with_capacity((dx + dy + 1) as usize);
    points.push((x as i32, y as i32));

    match connectivity {
        LineType::Four => {
            let mut err = 0i64;
            for _ in 0..(dx + dy) {
                let step_x = err + dy;
                let step_y = err - dx;
                if step_x.abs() <= step_y.abs() {
                    x += sx;
                    err = step_x;
                } else {
                    y += sy;
                    err = step_y;
                }
                points.push((x as i32, y as i32));
            }
        }
        LineType::Eight | LineType::AntiAliased => {
            let mut err = dx - dy;
            while x != x1 || y != y1 {
                let e2 = 2 * err;
                if e2 >= -dy {
                    err -= dy;
                    x += sx;
                }
                if e2 <= dx {
                    err += dx;
                    y += sy;
                }
                points.push((x as i32, y as i32));
            }
        }
    }
    points
}

/// Liang-Barsky clip of `from -> to` against the canvas grown by `margin`
/// pixels on every side. `None` when nothing of the segment remains.
pub fn clip_segment(
    from: (i32, i32),
    to: (i32, i32),
    (width, height): (u32, u32),
    margin: i64,
) -> Option<((i32, i32), (i32, i32))> {
    if width == 0 || height == 0 {
        return None;
    }
    let (lo_x, lo_y) = (-margin as f64, -margin as f64);
    let hi_x = (i64::from(width) - 1 + margin) as f64;
    let hi_y = (i64::from(height) - 1 + margin) as f64;

    let (x0, y0) = (f64::from(from.0), f64::from(from.1));
    let (dx, dy) = (f64::from(to.0) - x0, f64::from(to.1) - y0);
    let (mut t0, mut t1) = (0.0_f64, 1.0_f64);

    for (p, q) in [(-dx, x0 - lo_x), (dx, hi_x - x0), (-dy, y0 - lo_y), (dy, hi_y - y0)] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            if r > t1 {
                return None;
            }
            t0 = t0.max(r);
        } else {
            if r < t0 {
                return None;
            }
            t1 = t1.min(r);
        }
    }

    let at = |t: f64| {
        (
            (x0 + t * dx).round().clamp(lo_x, hi_x) as i32,
            (y0 + t * dy).round().clamp(lo_y, hi_y) as i32,
        )
    };
    Some((at(t0), at(t1)))
}

/// Fill every pixel whose centre lies within `radius` of `centre`. Only rows
/// and columns inside the canvas are visited.
fn fill_disc(canvas: &mut RgbImage, (cx, cy): (f64, f64), radius: f64, color: Rgb<u8>) {
    let (w, h) = (f64::from(canvas.width()), f64::from(canvas.height()));
    let top = (cy - radius).ceil().max(0.0);
    let bottom = (cy + radius).floor().min(h - 1.0);
    if top > bottom {
        return;
    }
    for y in top as u32..=bottom as u32 {
        let dy = f64::from(y) - cy;
        let half = (radius * radius - dy * dy).max(0.0).sqrt();
        let left = (cx - half).ceil().max(0.0);
        let right = (cx + half).floor().min(w - 1.0);
        if left > right {
            continue;
        }
        for x in left as u32..=right as u32 {
            canvas.put_pixel(x, y, color);
        }
    }
}

fn put_clipped(canvas: &mut RgbImage, (x, y): (i32, i32), color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < canvas.width() && (y as u32) < canvas.height() {
        canvas.put_pixel(x as u32, y as u32, color);
    }
}

/// Render one segment with the given stroke. Wide strokes are built by
/// stamping discs of diameter `width` along the centre line, which also
/// rounds the caps. Even widths centre the disc between pixels so the
/// stroke covers exactly `width` rows or columns.
fn stroke_segment(
    canvas: &mut RgbImage,
    from: (i32, i32),
    to: (i32, i32),
    color: Rgb<u8>,
    width: u32,
    line_type: LineType,
) {
    let margin = i64::from(width / 2 + 2);
    let Some((from, to)) = clip_segment(from, to, canvas.dimensions(), margin) else {
        return;
    };

    if width <= 1 {
        match line_type {
            LineType::AntiAliased => {
                draw_antialiased_line_segment_mut(canvas, from, to, color, interpolate);
            }
            LineType::Four | LineType::Eight => {
                for p in line_points(from, to, line_type) {
                    put_clipped(canvas, p, color);
                }
            }
        }
        return;
    }

    let radius = f64::from(width) / 2.0;
    let shift = if width % 2 == 0 { 0.5 } else { 0.0 };
    for (x, y) in line_points(from, to, LineType::Eight) {
        fill_disc(canvas, (f64::from(x) + shift, f64::from(y) + shift), radius, color);
    }
}

/// The `draw-rect` operation. Both corners are inclusive.
#[instrument(skip(input))]
pub fn draw_rect(input: &PixelBuffer, params: &RectParams) -> PixelBuffer {
    let mut canvas = input.to_color();
    let color = bgr(params.color);
    let (x0, y0) = (params.x, params.y);
    let (x1, y1) = (
        params.x.saturating_add(params.width),
        params.y.saturating_add(params.height),
    );

    match params.stroke.thickness {
        Thickness::Filled => {
            let (w, h) = (i64::from(canvas.width()), i64::from(canvas.height()));
            let left = i64::from(x0.min(x1)).max(0);
            let right = i64::from(x0.max(x1)).min(w - 1);
            let top = i64::from(y0.min(y1)).max(0);
            let bottom = i64::from(y0.max(y1)).min(h - 1);
            if left <= right && top <= bottom {
                let rect = Rect::at(left as i32, top as i32)
                    .of_size((right - left + 1) as u32, (bottom - top + 1) as u32);
                draw_filled_rect_mut(&mut canvas, rect, color);
            }
        }
        Thickness::Width(width) => {
            let corners = [(x0, y0), (x1, y0), (x1, y1), (x0, y1)];
            for i in 0..corners.len() {
                let next = corners[(i + 1) % corners.len()];
                stroke_segment(
                    &mut canvas,
                    corners[i],
                    next,
                    color,
                    width,
                    params.stroke.line_type,
                );
            }
        }
    }
    debug!("Rectangle drawn");
    PixelBuffer::Color(canvas)
}

/// The `draw-circle` operation.
#[instrument(skip(input))]
pub fn draw_circle(input: &PixelBuffer, params: &CircleParams) -> PixelBuffer {
    let mut canvas = input.to_color();
    let color = bgr(params.color);
    let center = (params.x, params.y);
    let radius = params.radius;

    // imageproc walks the whole circumference, so it only gets circles
    // whose size is on the order of the canvas.
    let walkable = i64::from(radius) <= i64::from(canvas.width()) + i64::from(canvas.height());

    match params.stroke.thickness {
        Thickness::Filled => fill_disc(
            &mut canvas,
            (f64::from(center.0), f64::from(center.1)),
            f64::from(radius),
            color,
        ),
        Thickness::Width(width) if width <= 1 && walkable => {
            draw_hollow_circle_mut(&mut canvas, center, radius, color)
        }
        Thickness::Width(width) => draw_ring(&mut canvas, center, radius, width, color),
    }
    debug!("Circle drawn");
    PixelBuffer::Color(canvas)
}

/// Annulus of `width` pixels centred on the circle of `radius`.
fn draw_ring(canvas: &mut RgbImage, (cx, cy): (i32, i32), radius: i32, width: u32, color: Rgb<u8>) {
    let half = f64::from(width) / 2.0;
    let outer = (f64::from(radius) + half).ceil() as i64;
    let (cx, cy) = (i64::from(cx), i64::from(cy));

    let x_min = (cx - outer).max(0);
    let y_min = (cy - outer).max(0);
    let x_max = (cx + outer).min(i64::from(canvas.width()) - 1);
    let y_max = (cy + outer).min(i64::from(canvas.height()) - 1);

    for y in y_min..=y_max {
        for x in x_min..=x_max {
            let d = ((x - cx) as f64).hypot((y - cy) as f64);
            if (d - f64::from(radius)).abs() <= half {
                canvas.put_pixel(x as u32, y as u32, color);
            }
        }
    }
}

/// The `draw-line` operation.
#[instrument(skip(input))]
pub fn draw_line(input: &PixelBuffer, params: &LineParams) -> PixelBuffer {
    let mut canvas = input.to_color();
    let width = match params.stroke.thickness {
        Thickness::Width(w) => w,
        // A line has no interior; "fill" degrades to a hairline.
        Thickness::Filled => 1,
    };
    stroke_segment(
        &mut canvas,
        params.from,
        params.to,
        bgr(params.color),
        width,
        params.stroke.line_type,
    );
    debug!("Line drawn");
    PixelBuffer::Color(canvas)
}

/// Closed polyline through `points`, used by the contour renderer.
pub fn draw_polygon_outline(canvas: &mut RgbImage, points: &[(i32, i32)], color: Rgb<u8>, stroke: Stroke) {
    let width = match stroke.thickness {
        Thickness::Width(w) => w,
        Thickness::Filled => 1,
    };
    match points {
        [] => {}
        [only] => stroke_segment(canvas, *only, *only, color, width, stroke.line_type),
        _ => {
            for i in 0..points.len() {
                let next = points[(i + 1) % points.len()];
                stroke_segment(canvas, points[i], next, color, width, stroke.line_type);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED_BGR: [f64; 3] = [0.0, 0.0, 255.0];
    const RED: Rgb<u8> = Rgb([255, 0, 0]);

    fn blank(w: u32, h: u32) -> PixelBuffer {
        PixelBuffer::zeros(w, h, 3)
    }

    fn colour(buf: PixelBuffer) -> RgbImage {
        match buf {
            PixelBuffer::Color(img) => img,
            PixelBuffer::Gray(_) => panic!("drawing must produce colour"),
        }
    }

    fn stroke(thickness: Thickness, line_type: LineType) -> Stroke {
        Stroke {
            thickness,
            line_type,
        }
    }

    #[test]
    fn eight_connected_diagonal_steps_corner_to_corner() {
        let pts = line_points((0, 0), (3, 3), LineType::Eight);
        assert_eq!(pts, vec![(0, 0), (1, 1), (2, 2), (3, 3)]);
    }

    #[test]
    fn four_connected_line_never_steps_diagonally() {
        let pts = line_points((0, 0), (5, 3), LineType::Four);
        assert_eq!(pts.first(), Some(&(0, 0)));
        assert_eq!(pts.last(), Some(&(5, 3)));
        assert_eq!(pts.len(), 9);
        for pair in pts.windows(2) {
            let d = (pair[1].0 - pair[0].0).abs() + (pair[1].1 - pair[0].1).abs();
            assert_eq!(d, 1, "{pair:?}");
        }
    }

    #[test]
    fn reversed_endpoints_cover_the_same_length() {
        let forward = line_points((2, 9), (11, 1), LineType::Eight);
        let backward = line_points((11, 1), (2, 9), LineType::Eight);
        assert_eq!(forward.len(), backward.len());
        assert_eq!(backward.last(), Some(&(2, 9)));
    }

    #[test]
    fn thickness_from_signed() {
        assert_eq!(Thickness::from_signed(-1), Thickness::Filled);
        assert_eq!(Thickness::from_signed(0), Thickness::Width(1));
        assert_eq!(Thickness::from_signed(3), Thickness::Width(3));
        assert_eq!(Thickness::from_signed(1 << 40), Thickness::Width(MAX_THICKNESS));
    }

    #[test]
    fn hairline_uses_bgr_colour() {
        let params = LineParams {
            from: (1, 4),
            to: (8, 4),
            color: RED_BGR,
            stroke: stroke(Thickness::Width(1), LineType::Eight),
        };
        let img = colour(draw_line(&blank(10, 10), &params));
        for x in 1..=8 {
            assert_eq!(img.get_pixel(x, 4), &RED);
        }
        assert_eq!(img.get_pixel(1, 5), &Rgb([0, 0, 0]));
    }

    #[test]
    fn thick_line_covers_neighbouring_rows() {
        let params = LineParams {
            from: (2, 10),
            to: (17, 10),
            color: RED_BGR,
            stroke: stroke(Thickness::Width(4), LineType::Eight),
        };
        let img = colour(draw_line(&blank(20, 20), &params));
        let column: Vec<bool> = (0..20).map(|y| *img.get_pixel(10, y) == RED).collect();
        let lit: Vec<usize> = (0..20).filter(|&y| column[y]).collect();
        assert_eq!(lit, vec![9, 10, 11, 12]);
    }

    #[test]
    fn stroke_width_matches_thickness() {
        for width in 2..=7u32 {
            let params = LineParams {
                from: (3, 15),
                to: (26, 15),
                color: RED_BGR,
                stroke: stroke(Thickness::Width(width), LineType::Eight),
            };
            let img = colour(draw_line(&blank(30, 30), &params));
            let rows = (0..30).filter(|&y| *img.get_pixel(14, y) == RED).count();
            assert_eq!(rows, width as usize, "thickness {width}");
        }
    }

    #[test]
    fn segment_is_clipped_to_the_grown_canvas() {
        assert_eq!(
            clip_segment((-100, 5), (100, 5), (10, 10), 0),
            Some(((0, 5), (9, 5)))
        );
        assert_eq!(
            clip_segment((-100, -100), (200, 200), (10, 10), 2),
            Some(((-2, -2), (11, 11)))
        );
        assert_eq!(clip_segment((2, 3), (7, 8), (10, 10), 0), Some(((2, 3), (7, 8))));
        assert_eq!(clip_segment((-50, 20), (50, 20), (10, 10), 1), None);
        assert_eq!(clip_segment((4, 4), (4, 4), (0, 10), 1), None);
    }

    #[test]
    fn extreme_coordinates_only_touch_the_canvas() {
        let across = LineParams {
            from: (-2_000_000_000, 5),
            to: (2_000_000_000, 5),
            color: RED_BGR,
            stroke: stroke(Thickness::Width(1), LineType::Eight),
        };
        let img = colour(draw_line(&blank(10, 10), &across));
        let lit = img.pixels().filter(|p| **p == RED).count();
        assert_eq!(lit, 10);
        assert!((0..10).all(|x| *img.get_pixel(x, 5) == RED));

        for line_type in [LineType::Four, LineType::AntiAliased] {
            let diagonal = LineParams {
                from: (i32::MIN, i32::MIN),
                to: (i32::MAX, i32::MAX),
                stroke: stroke(Thickness::Width(1), line_type),
                ..across
            };
            let img = colour(draw_line(&blank(10, 10), &diagonal));
            assert!(img.get_pixel(5, 5).0[0] > 0, "{line_type:?}");
        }

        let wide = LineParams {
            stroke: stroke(Thickness::Width(MAX_THICKNESS), LineType::Eight),
            ..across
        };
        let img = colour(draw_line(&blank(10, 10), &wide));
        assert!(img.pixels().all(|p| *p == RED));
    }

    #[test]
    fn huge_filled_circle_covers_a_tiny_canvas_quickly() {
        let started = std::time::Instant::now();
        for radius in [100_000, i32::MAX] {
            let params = CircleParams {
                x: 5,
                y: 5,
                radius,
                color: RED_BGR,
                stroke: stroke(Thickness::Filled, LineType::Eight),
            };
            let img = colour(draw_circle(&blank(10, 10), &params));
            assert!(img.pixels().all(|p| *p == RED), "radius {radius}");
        }
        assert!(started.elapsed() < std::time::Duration::from_secs(2));
    }

    #[test]
    fn huge_hairline_circle_crosses_the_canvas() {
        let params = CircleParams {
            x: -1_000_000,
            y: 5,
            radius: 1_000_005,
            color: RED_BGR,
            stroke: stroke(Thickness::Width(1), LineType::Eight),
        };
        let img = colour(draw_circle(&blank(10, 10), &params));
        assert_eq!(img.get_pixel(5, 5), &RED);
        assert_eq!(img.get_pixel(0, 5), &Rgb([0, 0, 0]));
    }

    #[test]
    fn filled_rect_with_extreme_extent_is_clipped() {
        let params = RectParams {
            x: i32::MAX,
            y: 0,
            width: i32::MIN,
            height: 3,
            color: RED_BGR,
            stroke: stroke(Thickness::Filled, LineType::Eight),
        };
        let img = colour(draw_rect(&blank(10, 10), &params));
        assert_eq!(img.pixels().filter(|p| **p == RED).count(), 10 * 4);
        assert_eq!(img.get_pixel(9, 3), &RED);
        assert_eq!(img.get_pixel(0, 4), &Rgb([0, 0, 0]));
    }

    #[test]
    fn antialiased_line_draws_something() {
        let params = LineParams {
            from: (0, 0),
            to: (9, 4),
            color: RED_BGR,
            stroke: stroke(Thickness::Width(1), LineType::AntiAliased),
        };
        let img = colour(draw_line(&blank(10, 10), &params));
        assert!(img.pixels().filter(|p| p.0[0] > 0).count() >= 9);
        assert!(img.pixels().all(|p| p.0[1] == 0 && p.0[2] == 0));
    }

    #[test]
    fn off_canvas_geometry_is_clipped() {
        let params = LineParams {
            from: (-50, -50),
            to: (500, 500),
            color: RED_BGR,
            stroke: stroke(Thickness::Width(3), LineType::Four),
        };
        let img = colour(draw_line(&blank(10, 10), &params));
        assert_eq!(img.get_pixel(5, 5), &RED);
    }

    #[test]
    fn filled_rect_includes_both_corners() {
        let params = RectParams {
            x: 2,
            y: 3,
            width: 4,
            height: 2,
            color: RED_BGR,
            stroke: stroke(Thickness::Filled, LineType::Eight),
        };
        let img = colour(draw_rect(&blank(10, 10), &params));
        let lit = img.pixels().filter(|p| **p == RED).count();
        assert_eq!(lit, 5 * 3);
        assert_eq!(img.get_pixel(6, 5), &RED);
        assert_eq!(img.get_pixel(7, 5), &Rgb([0, 0, 0]));
    }

    #[test]
    fn hollow_rect_leaves_interior_alone() {
        let params = RectParams {
            x: 1,
            y: 1,
            width: 6,
            height: 6,
            color: RED_BGR,
            stroke: stroke(Thickness::Width(1), LineType::Eight),
        };
        let img = colour(draw_rect(&blank(10, 10), &params));
        assert_eq!(img.get_pixel(1, 1), &RED);
        assert_eq!(img.get_pixel(7, 4), &RED);
        assert_eq!(img.get_pixel(4, 4), &Rgb([0, 0, 0]));
    }

    #[test]
    fn filled_and_ring_circles() {
        let filled = CircleParams {
            x: 10,
            y: 10,
            radius: 5,
            color: RED_BGR,
            stroke: stroke(Thickness::Filled, LineType::Eight),
        };
        let img = colour(draw_circle(&blank(21, 21), &filled));
        assert_eq!(img.get_pixel(10, 10), &RED);
        assert_eq!(img.get_pixel(18, 10), &Rgb([0, 0, 0]));

        let ring = CircleParams {
            stroke: stroke(Thickness::Width(2), LineType::Eight),
            ..filled
        };
        let img = colour(draw_circle(&blank(21, 21), &ring));
        assert_eq!(img.get_pixel(15, 10), &RED);
        assert_eq!(img.get_pixel(10, 10), &Rgb([0, 0, 0]));
    }

    #[test]
    fn drawing_leaves_input_untouched() {
        let input = blank(8, 8);
        let params = CircleParams {
            x: 4,
            y: 4,
            radius: 2,
            color: RED_BGR,
            stroke: stroke(Thickness::Filled, LineType::Eight),
        };
        let _ = draw_circle(&input, &params);
        assert_eq!(input, blank(8, 8));
    }
}
