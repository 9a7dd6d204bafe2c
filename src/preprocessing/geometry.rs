//! Geometric primitives shared by the geometric correction steps.
//!
//! Contour extraction, convex hull, minimum-area rectangles, corner ordering
//! and the resampling used by every warp (bicubic with replicated borders).

use image::{GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType};
use std::cmp::Ordering;

/// A 2D point with floating-point coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    #[inline]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Outer borders of foreground (non-zero) regions that are not nested in
/// another region, with enclosed area of at least `min_area`.
pub fn external_contours(binary: &GrayImage, min_area: f32) -> Vec<Vec<Point>> {
    find_contours::<u32>(binary)
        .into_iter()
        .filter(|contour| contour.border_type == BorderType::Outer && contour.parent.is_none())
        .map(|contour| {
            contour
                .points
                .iter()
                .map(|p| Point::new(p.x as f32, p.y as f32))
                .collect::<Vec<_>>()
        })
        .filter(|points| polygon_area(points) >= min_area)
        .collect()
}

/// Area enclosed by a closed polygon (shoelace formula).
pub fn polygon_area(points: &[Point]) -> f32 {
    if points.len() < 3 {
        return 0.0;
    }
    let n = points.len();
    let twice: f32 = (0..n)
        .map(|i| {
            let j = (i + 1) % n;
            points[i].x * points[j].y - points[j].x * points[i].y
        })
        .sum();
    twice.abs() / 2.0
}

fn cross(o: &Point, a: &Point, b: &Point) -> f32 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// Convex hull in counter-clockwise order (monotone chain).
pub fn convex_hull(points: &[Point]) -> Vec<Point> {
    let mut pts = points.to_vec();
    pts.sort_by(|a, b| {
        a.x.partial_cmp(&b.x)
            .unwrap_or(Ordering::Equal)
            .then(a.y.partial_cmp(&b.y).unwrap_or(Ordering::Equal))
    });
    pts.dedup();
    if pts.len() < 3 {
        return pts;
    }

    let mut lower: Vec<Point> = Vec::with_capacity(pts.len());
    for p in &pts {
        while lower.len() >= 2 && cross(&lower[lower.len() - 2], &lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(*p);
    }
    let mut upper: Vec<Point> = Vec::with_capacity(pts.len());
    for p in pts.iter().rev() {
        while upper.len() >= 2 && cross(&upper[upper.len() - 2], &upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(*p);
    }
    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

/// Smallest-area rotated rectangle enclosing a point set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinAreaRect {
    pub center: Point,
    /// Extent along the direction given by `angle`
    pub width: f32,
    pub height: f32,
    /// Direction of the `width` side, in degrees, image coordinates (y down)
    pub angle: f32,
}

impl MinAreaRect {
    /// Rotating calipers over the convex hull.
    pub fn from_points(points: &[Point]) -> Option<Self> {
        let hull = convex_hull(points);
        match hull.len() {
            0 => return None,
            1 => {
                return Some(Self {
                    center: hull[0],
                    width: 0.0,
                    height: 0.0,
                    angle: 0.0,
                })
            }
            _ => {}
        }

        let mut best: Option<(f32, Self)> = None;
        let n = hull.len();
        for i in 0..n {
            let origin = hull[i];
            let next = hull[(i + 1) % n];
            let (ex, ey) = (next.x - origin.x, next.y - origin.y);
            let len = (ex * ex + ey * ey).sqrt();
            if len < f32::EPSILON {
                continue;
            }
            let (ux, uy) = (ex / len, ey / len);
            let (px, py) = (-uy, ux);

            let (mut min_u, mut max_u, mut min_p, mut max_p) = (f32::MAX, f32::MIN, f32::MAX, f32::MIN);
            for q in &hull {
                let (dx, dy) = (q.x - origin.x, q.y - origin.y);
                let along = dx * ux + dy * uy;
                let across = dx * px + dy * py;
                min_u = min_u.min(along);
                max_u = max_u.max(along);
                min_p = min_p.min(across);
                max_p = max_p.max(across);
            }

            let width = max_u - min_u;
            let height = max_p - min_p;
            let area = width * height;
            if best.as_ref().map_or(true, |(best_area, _)| area < *best_area) {
                let cu = (min_u + max_u) / 2.0;
                let cp = (min_p + max_p) / 2.0;
                let center = Point::new(origin.x + cu * ux + cp * px, origin.y + cu * uy + cp * py);
                best = Some((
                    area,
                    Self {
                        center,
                        width,
                        height,
                        angle: uy.atan2(ux).to_degrees(),
                    },
                ));
            }
        }

        best.map(|(_, rect)| rect)
    }

    /// The four corners, in no particular order.
    pub fn corners(&self) -> [Point; 4] {
        let (sin, cos) = self.angle.to_radians().sin_cos();
        let (hw, hh) = (self.width / 2.0, self.height / 2.0);
        [(-hw, -hh), (hw, -hh), (hw, hh), (-hw, hh)].map(|(u, v)| {
            Point::new(
                self.center.x + u * cos - v * sin,
                self.center.y + u * sin + v * cos,
            )
        })
    }

    /// Angle folded into (-45, 45]
    pub fn skew_angle(&self) -> f32 {
        let mut angle = self.angle;
        while angle > 45.0 {
            angle -= 90.0;
        }
        while angle <= -45.0 {
            angle += 90.0;
        }
        angle
    }
}

/// Order corners as `[top_left, top_right, bottom_right, bottom_left]`.
///
/// Top-left has the smallest `x + y`, bottom-right the largest; top-right has
/// the smallest `y - x`, bottom-left the largest.
pub fn order_corners(corners: &[Point; 4]) -> [Point; 4] {
    let pick = |key: &dyn Fn(&Point) -> f32, largest: bool| -> Point {
        let cmp = |a: &&Point, b: &&Point| key(a).partial_cmp(&key(b)).unwrap_or(Ordering::Equal);
        let found = if largest {
            corners.iter().max_by(cmp)
        } else {
            corners.iter().min_by(cmp)
        };
        found.copied().unwrap_or(corners[0])
    };
    let sum = |p: &Point| p.x + p.y;
    let diff = |p: &Point| p.y - p.x;
    [
        pick(&sum, false),
        pick(&diff, false),
        pick(&sum, true),
        pick(&diff, true),
    ]
}

/// Median of a non-empty sample; `None` when empty.
pub fn median(values: &mut [f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

const CUBIC_A: f32 = -0.75;

fn cubic_weights(t: f32) -> [f32; 4] {
    let near = |d: f32| ((CUBIC_A + 2.0) * d - (CUBIC_A + 3.0)) * d * d + 1.0;
    let far = |d: f32| ((CUBIC_A * d - 5.0 * CUBIC_A) * d + 8.0 * CUBIC_A) * d - 4.0 * CUBIC_A;
    [far(1.0 + t), near(t), near(1.0 - t), far(2.0 - t)]
}

/// Bicubic sample at a sub-pixel position; coordinates outside the image
/// replicate the nearest edge pixel.
pub fn sample_cubic(plane: &GrayImage, x: f32, y: f32) -> f32 {
    let (w, h) = plane.dimensions();
    if w == 0 || h == 0 {
        return 0.0;
    }
    let x = if x.is_finite() { x } else { 0.0 };
    let y = if y.is_finite() { y } else { 0.0 };
    let (x0, y0) = (x.floor(), y.floor());
    let wx = cubic_weights(x - x0);
    let wy = cubic_weights(y - y0);
    let raw = plane.as_raw();
    let clamp = |v: f32, max: u32| (v.max(0.0) as u32).min(max - 1) as usize;

    let mut acc = 0.0;
    for (j, wyj) in wy.iter().enumerate() {
        let sy = clamp(y0 - 1.0 + j as f32, h);
        let row = sy * w as usize;
        let mut line = 0.0;
        for (i, wxi) in wx.iter().enumerate() {
            let sx = clamp(x0 - 1.0 + i as f32, w);
            line += wxi * raw[row + sx] as f32;
        }
        acc += wyj * line;
    }
    acc
}

/// Build an `out_w` x `out_h` plane by inverse mapping each output pixel to a
/// source position.
pub fn warp_plane<F>(src: &GrayImage, out_w: u32, out_h: u32, inverse: F) -> GrayImage
where
    F: Fn(f32, f32) -> (f32, f32),
{
    GrayImage::from_fn(out_w, out_h, |x, y| {
        let (sx, sy) = inverse(x as f32, y as f32);
        Luma([sample_cubic(src, sx, sy).round().clamp(0.0, 255.0) as u8])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polygon_area_rectangle() {
        let square = [
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 5.0),
            Point::new(0.0, 5.0),
        ];
        assert!((polygon_area(&square) - 50.0).abs() < 1e-3);
    }

    #[test]
    fn test_convex_hull_drops_interior_points() {
        let points = [
            Point::new(0.0, 0.0),
            Point::new(4.0, 0.0),
            Point::new(4.0, 4.0),
            Point::new(0.0, 4.0),
            Point::new(2.0, 2.0),
            Point::new(1.0, 3.0),
        ];
        assert_eq!(convex_hull(&points).len(), 4);
    }

    #[test]
    fn test_min_area_rect_axis_aligned() {
        let points = [
            Point::new(0.0, 0.0),
            Point::new(20.0, 0.0),
            Point::new(20.0, 10.0),
            Point::new(0.0, 10.0),
        ];
        let rect = MinAreaRect::from_points(&points).unwrap();
        let (long, short) = (rect.width.max(rect.height), rect.width.min(rect.height));
        assert!((long - 20.0).abs() < 1e-3);
        assert!((short - 10.0).abs() < 1e-3);
        assert!(rect.skew_angle().abs() < 1e-3);
        assert!((rect.center.x - 10.0).abs() < 1e-3 && (rect.center.y - 5.0).abs() < 1e-3);
    }

    #[test]
    fn test_min_area_rect_rotated() {
        let (sin, cos) = 10.0_f32.to_radians().sin_cos();
        let points: Vec<Point> = [(0.0, 0.0), (40.0, 0.0), (40.0, 10.0), (0.0, 10.0)]
            .iter()
            .map(|&(x, y)| Point::new(x * cos - y * sin, x * sin + y * cos))
            .collect();
        let rect = MinAreaRect::from_points(&points).unwrap();
        assert!((rect.skew_angle() - 10.0).abs() < 0.1, "got {}", rect.skew_angle());
        assert!((rect.width * rect.height - 400.0).abs() < 1.0);
    }

    #[test]
    fn test_order_corners() {
        let shuffled = [
            Point::new(10.0, 8.0),
            Point::new(0.0, 0.0),
            Point::new(0.0, 8.0),
            Point::new(10.0, 0.0),
        ];
        let [tl, tr, br, bl] = order_corners(&shuffled);
        assert_eq!(tl, Point::new(0.0, 0.0));
        assert_eq!(tr, Point::new(10.0, 0.0));
        assert_eq!(br, Point::new(10.0, 8.0));
        assert_eq!(bl, Point::new(0.0, 8.0));
    }

    #[test]
    fn test_external_contours_filters_small_regions() {
        let mut img = GrayImage::new(60, 60);
        for y in 10..30 {
            for x in 10..40 {
                img.put_pixel(x, y, Luma([255]));
            }
        }
        img.put_pixel(50, 50, Luma([255]));

        let contours = external_contours(&img, 100.0);
        assert_eq!(contours.len(), 1);
    }

    #[test]
    fn test_median_even_and_odd() {
        assert_eq!(median(&mut [3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&mut [4.0, 1.0, 2.0, 3.0]), Some(2.5));
        assert_eq!(median(&mut []), None);
    }

    #[test]
    fn test_sample_cubic_is_exact_on_grid_and_replicates_edges() {
        let img = GrayImage::from_fn(5, 5, |x, _| Luma([(x * 40) as u8]));
        assert!((sample_cubic(&img, 2.0, 2.0) - 80.0).abs() < 1e-3);
        assert!((sample_cubic(&img, -10.0, 2.0) - 0.0).abs() < 1e-3);
        assert!((sample_cubic(&img, 50.0, 2.0) - 160.0).abs() < 1e-3);
    }
}
