// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Geometric helpers for skew estimation and rotation.
//
// Rotation samples out-of-bounds pixels from the nearest edge; imageproc's
// rotations fill them with a constant, which draws a border on scans.

use image::{GrayImage, ImageBuffer, Pixel};
use imageproc::geometry::{convex_hull, min_area_rect};
use imageproc::point::Point;

use super::threshold::INK;

/// Foreground points reduced to the leftmost and rightmost ink pixel of each
/// row. The convex hull of these equals the hull of the whole ink set.
pub fn ink_row_extremes(mask: &GrayImage) -> Vec<Point<i32>> {
    let mut points = Vec::new();
    for y in 0..mask.height() {
        let mut first = None;
        let mut last = None;
        for x in 0..mask.width() {
            if mask.get_pixel(x, y).0[0] == INK {
                first.get_or_insert(x);
                last = Some(x);
            }
        }
        if let (Some(a), Some(b)) = (first, last) {
            points.push(Point::new(a as i32, y as i32));
            if b != a {
                points.push(Point::new(b as i32, y as i32));
            }
        }
    }
    points
}

/// Orientation (degrees, in `(-45, 45]`) of the minimum-area rectangle
/// enclosing `points`, taken along its longer side.
///
/// `None` when the points do not span an area.
pub fn min_area_rect_angle(points: &[Point<i32>]) -> Option<f64> {
    let hull = convex_hull(points);
    if hull.len() < 3 {
        return None;
    }
    let [a, b, c, _] = min_area_rect(&hull);
    let edge = |p: Point<i32>, q: Point<i32>| (f64::from(q.x - p.x), f64::from(q.y - p.y));
    let (first, second) = (edge(a, b), edge(b, c));
    let (dx, dy) = if first.0.hypot(first.1) >= second.0.hypot(second.1) {
        first
    } else {
        second
    };
    if dx == 0.0 && dy == 0.0 {
        return None;
    }
    Some(normalize_quarter(dy.atan2(dx).to_degrees()))
}

/// Fold an angle into `(-45, 45]`; rectangle orientations repeat every 90°.
fn normalize_quarter(angle: f64) -> f64 {
    let folded = angle.rem_euclid(90.0);
    if folded > 45.0 { folded - 90.0 } else { folded }
}

/// Rotate `image` by `degrees` about its centre (positive turns content
/// clockwise on screen). Bilinear sampling; samples that fall outside the
/// source repeat the nearest edge pixel. Dimensions are preserved.
pub fn rotate_replicate<P>(image: &ImageBuffer<P, Vec<u8>>, degrees: f64) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8>,
{
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }
    let (sin, cos) = degrees.to_radians().sin_cos();
    let cx = (width as f64 - 1.0) / 2.0;
    let cy = (height as f64 - 1.0) / 2.0;
    let max_x = (width - 1) as f64;
    let max_y = (height - 1) as f64;
    let channels = P::CHANNEL_COUNT as usize;

    ImageBuffer::from_fn(width, height, |x, y| {
        let dx = x as f64 - cx;
        let dy = y as f64 - cy;
        let sx = (cos * dx + sin * dy + cx).clamp(0.0, max_x);
        let sy = (-sin * dx + cos * dy + cy).clamp(0.0, max_y);

        let x0 = sx.floor() as u32;
        let y0 = sy.floor() as u32;
        let x1 = (x0 + 1).min(width - 1);
        let y1 = (y0 + 1).min(height - 1);
        let ax = sx - x0 as f64;
        let ay = sy - y0 as f64;

        let p00 = image.get_pixel(x0, y0).channels();
        let p10 = image.get_pixel(x1, y0).channels();
        let p01 = image.get_pixel(x0, y1).channels();
        let p11 = image.get_pixel(x1, y1).channels();

        let mut out = [0u8; 4];
        for c in 0..channels {
            let top = p00[c] as f64 * (1.0 - ax) + p10[c] as f64 * ax;
            let bottom = p01[c] as f64 * (1.0 - ax) + p11[c] as f64 * ax;
            out[c] = (top * (1.0 - ay) + bottom * ay).round().clamp(0.0, 255.0) as u8;
        }
        *P::from_slice(&out[..channels])
    })
}
