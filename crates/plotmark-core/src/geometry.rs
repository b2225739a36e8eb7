//! Small planar geometry helpers.

use nalgebra::Point2;

/// Arithmetic mean of a point set.
pub fn centroid(points: &[Point2<f32>]) -> Option<Point2<f32>> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let (sx, sy) = points
        .iter()
        .fold((0.0f64, 0.0f64), |(sx, sy), p| (sx + p.x as f64, sy + p.y as f64));
    Some(Point2::new((sx / n) as f32, (sy / n) as f32))
}

#[inline]
fn cross(o: &Point2<f32>, a: &Point2<f32>, b: &Point2<f32>) -> f64 {
    let (ox, oy) = (o.x as f64, o.y as f64);
    (a.x as f64 - ox) * (b.y as f64 - oy) - (a.y as f64 - oy) * (b.x as f64 - ox)
}

/// Shoelace area. Positive for counter-clockwise order in an x-right, y-up frame,
/// which appears clockwise on screen where y grows downward.
pub fn signed_area(poly: &[Point2<f32>]) -> f64 {
    let n = poly.len();
    if n < 3 {
        return 0.0;
    }
    let mut acc = 0.0f64;
    for i in 0..n {
        let a = &poly[i];
        let b = &poly[(i + 1) % n];
        acc += a.x as f64 * b.y as f64 - b.x as f64 * a.y as f64;
    }
    0.5 * acc
}

/// Convex hull by Andrew's monotone chain.
///
/// The result is counter-clockwise (positive [`signed_area`]) and starts at the
/// lowest-x, then lowest-y point. Collinear and duplicate points are dropped.
pub fn convex_hull(points: &[Point2<f32>]) -> Vec<Point2<f32>> {
    let mut pts: Vec<Point2<f32>> = points.to_vec();
    pts.sort_by(|a, b| {
        a.x.partial_cmp(&b.x)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.y.partial_cmp(&b.y).unwrap_or(std::cmp::Ordering::Equal))
    });
    pts.dedup();
    if pts.len() < 3 {
        return pts;
    }

    let mut lower: Vec<Point2<f32>> = Vec::with_capacity(pts.len());
    for p in &pts {
        while lower.len() >= 2 && cross(&lower[lower.len() - 2], &lower[lower.len() - 1], p) <= 0.0
        {
            lower.pop();
        }
        lower.push(*p);
    }

    let mut upper: Vec<Point2<f32>> = Vec::with_capacity(pts.len());
    for p in pts.iter().rev() {
        while upper.len() >= 2 && cross(&upper[upper.len() - 2], &upper[upper.len() - 1], p) <= 0.0
        {
            upper.pop();
        }
        upper.push(*p);
    }

    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

/// Rotate `poly` in place so that `first` sits at index 0. Returns `false` if
/// `first` is not one of the vertices.
pub fn rotate_to_front(poly: &mut [Point2<f32>], first: &Point2<f32>) -> bool {
    match poly.iter().position(|p| p == first) {
        Some(idx) => {
            poly.rotate_left(idx);
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centroid_of_square() {
        let pts = [
            Point2::new(0.0_f32, 0.0),
            Point2::new(4.0, 0.0),
            Point2::new(4.0, 2.0),
            Point2::new(0.0, 2.0),
        ];
        assert_eq!(centroid(&pts), Some(Point2::new(2.0, 1.0)));
        assert_eq!(centroid(&[]), None);
    }

    #[test]
    fn hull_drops_interior_points_and_is_positive() {
        let pts = [
            Point2::new(0.0_f32, 0.0),
            Point2::new(10.0, 10.0),
            Point2::new(5.0, 5.0),
            Point2::new(10.0, 0.0),
            Point2::new(0.0, 10.0),
            Point2::new(5.0, 0.0),
        ];
        let hull = convex_hull(&pts);
        assert_eq!(hull.len(), 4);
        assert!(signed_area(&hull) > 0.0);
        assert_eq!(hull[0], Point2::new(0.0, 0.0));
        assert_eq!(hull[1], Point2::new(10.0, 0.0));
        assert_eq!(hull[2], Point2::new(10.0, 10.0));
        assert_eq!(hull[3], Point2::new(0.0, 10.0));
    }

    #[test]
    fn rotation_brings_vertex_first_and_keeps_cycle() {
        let mut poly = vec![
            Point2::new(0.0_f32, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ];
        assert!(rotate_to_front(&mut poly, &Point2::new(1.0, 1.0)));
        assert_eq!(poly[0], Point2::new(1.0, 1.0));
        assert_eq!(poly[1], Point2::new(0.0, 1.0));
        assert_eq!(poly[3], Point2::new(1.0, 0.0));
        assert!(!rotate_to_front(&mut poly, &Point2::new(7.0, 7.0)));
    }
}
