use serde::{Deserialize, Serialize};

use crate::{ArcLengths, Curve, Pt3D};

/// A centripetal Catmull-Rom spline passing through every control point. Centripetal knot
/// spacing avoids cusps and self-intersections for uneven control points. The end tangents are
/// derived from points extrapolated past the first and last control points.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawCatmullRom", into = "RawCatmullRom")]
pub struct CatmullRom {
    points: Vec<Pt3D>,
    lengths: ArcLengths,
}

#[derive(Clone, Serialize, Deserialize)]
struct RawCatmullRom {
    points: Vec<Pt3D>,
}

impl From<RawCatmullRom> for CatmullRom {
    fn from(raw: RawCatmullRom) -> CatmullRom {
        CatmullRom::centripetal(raw.points)
    }
}

impl From<CatmullRom> for RawCatmullRom {
    fn from(curve: CatmullRom) -> RawCatmullRom {
        RawCatmullRom {
            points: curve.points,
        }
    }
}

impl CatmullRom {
    pub fn centripetal(points: Vec<Pt3D>) -> CatmullRom {
        let lengths = ArcLengths::new(|t| evaluate(&points, t));
        CatmullRom { points, lengths }
    }

    pub fn points(&self) -> &Vec<Pt3D> {
        &self.points
    }

    /// The raw parameter at which the curve passes through control point `idx`.
    pub fn t_of_control_point(&self, idx: usize) -> f64 {
        if self.points.len() < 2 {
            return 0.0;
        }
        idx as f64 / (self.points.len() - 1) as f64
    }

    /// The fraction of arc length at which the curve passes through control point `idx`.
    pub fn percent_of_control_point(&self, idx: usize) -> f64 {
        let total = self.lengths.total();
        if total == 0.0 {
            return 0.0;
        }
        self.length_to_t(self.t_of_control_point(idx)) / total
    }

    // Arc length from the start up to raw parameter t
    fn length_to_t(&self, t: f64) -> f64 {
        // ArcLengths only samples evenly spaced t; walk the remainder directly.
        let divisions = 200;
        let mut sum = 0.0;
        let mut last = self.point(0.0);
        for i in 1..=divisions {
            let current = self.point(t * i as f64 / divisions as f64);
            sum += (current - last).length();
            last = current;
        }
        sum
    }
}

impl Curve for CatmullRom {
    fn point(&self, t: f64) -> Pt3D {
        evaluate(&self.points, t)
    }

    fn arc_lengths(&self) -> &ArcLengths {
        &self.lengths
    }
}

/// Adds one point before the first and one after the last, mirroring the neighboring segment.
/// Renderers that draw Catmull-Rom splines through `points` use these to keep the end tangents.
pub fn with_virtual_points(points: &[Pt3D]) -> Vec<Pt3D> {
    if points.len() < 2 {
        return points.to_vec();
    }
    let first = points[0];
    let second = points[1];
    let last = points[points.len() - 1];
    let before_last = points[points.len() - 2];

    let mut result = Vec::with_capacity(points.len() + 2);
    result.push(first + (first - second));
    result.extend_from_slice(points);
    result.push(last + (last - before_last));
    result
}

fn evaluate(points: &[Pt3D], t: f64) -> Pt3D {
    match points.len() {
        0 => return Pt3D::ORIGIN,
        1 => return points[0],
        _ => {}
    }
    let len = points.len();
    let t = t.clamp(0.0, 1.0);

    let p = (len - 1) as f64 * t;
    let mut segment = p.floor() as usize;
    let mut weight = p - segment as f64;
    if segment >= len - 1 {
        segment = len - 2;
        weight = 1.0;
    }

    let p1 = points[segment];
    let p2 = points[segment + 1];
    let p0 = if segment > 0 {
        points[segment - 1]
    } else {
        p1 + (p1 - p2)
    };
    let p3 = if segment + 2 < len {
        points[segment + 2]
    } else {
        p2 + (p2 - p1)
    };

    let knot = |a: Pt3D, b: Pt3D| (b - a).dot(b - a).powf(0.25);
    let mut dt0 = knot(p0, p1);
    let mut dt1 = knot(p1, p2);
    let mut dt2 = knot(p2, p3);
    // Safety check for repeated points
    if dt1 < 1e-4 {
        dt1 = 1.0;
    }
    if dt0 < 1e-4 {
        dt0 = dt1;
    }
    if dt2 < 1e-4 {
        dt2 = dt1;
    }

    let axis = |x0: f64, x1: f64, x2: f64, x3: f64| {
        let mut t1 = (x1 - x0) / dt0 - (x2 - x0) / (dt0 + dt1) + (x2 - x1) / dt1;
        let mut t2 = (x2 - x1) / dt1 - (x3 - x1) / (dt1 + dt2) + (x3 - x2) / dt2;
        t1 *= dt1;
        t2 *= dt1;
        cubic_hermite(x1, x2, t1, t2, weight)
    };
    Pt3D::new(
        axis(p0.x(), p1.x(), p2.x(), p3.x()),
        axis(p0.y(), p1.y(), p2.y(), p3.y()),
        axis(p0.z(), p1.z(), p2.z(), p3.z()),
    )
}

fn cubic_hermite(x0: f64, x1: f64, t0: f64, t1: f64, t: f64) -> f64 {
    let c0 = x0;
    let c1 = t0;
    let c2 = -3.0 * x0 + 3.0 * x1 - 2.0 * t0 - t1;
    let c3 = 2.0 * x0 - 2.0 * x1 + t0 + t1;
    let t2 = t * t;
    c0 + c1 * t + c2 * t2 + c3 * t2 * t
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_through_control_points() {
        let pts = vec![
            Pt3D::new(0.0, 0.0, 0.0),
            Pt3D::new(10.0, 5.0, 0.0),
            Pt3D::new(20.0, 0.0, 1.0),
            Pt3D::new(35.0, -3.0, 0.0),
        ];
        let curve = CatmullRom::centripetal(pts.clone());
        for (idx, pt) in pts.iter().enumerate() {
            let on_curve = curve.point(curve.t_of_control_point(idx));
            assert!((on_curve - *pt).length() < 1e-9, "{} vs {}", on_curve, pt);
        }
        assert!(curve.percent_of_control_point(1) > 0.0);
        assert!(curve.percent_of_control_point(1) < curve.percent_of_control_point(2));
        assert!((curve.percent_of_control_point(3) - 1.0).abs() < 1e-3);
    }

    #[test]
    fn two_points_make_a_straight_line() {
        let curve = CatmullRom::centripetal(vec![Pt3D::ORIGIN, Pt3D::new(10.0, 0.0, 0.0)]);
        assert!((curve.length().inner_meters() - 10.0).abs() < 1e-6);
        let mid = curve.point_at(0.5);
        assert!((mid - Pt3D::new(5.0, 0.0, 0.0)).length() < 1e-6);
        assert!((curve.tangent_at(0.0) - Pt3D::new(1.0, 0.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn serde_recomputes_lengths() {
        let curve = CatmullRom::centripetal(vec![
            Pt3D::ORIGIN,
            Pt3D::new(5.0, 5.0, 0.0),
            Pt3D::new(10.0, 0.0, 0.0),
        ]);
        let json = serde_json::to_string(&curve).unwrap();
        let back: CatmullRom = serde_json::from_str(&json).unwrap();
        assert_eq!(back, curve);
    }

    #[test]
    fn virtual_points_mirror_the_ends() {
        let pts = with_virtual_points(&[Pt3D::ORIGIN, Pt3D::new(1.0, 2.0, 0.0)]);
        assert_eq!(pts.len(), 4);
        assert_eq!(pts[0], Pt3D::new(-1.0, -2.0, 0.0));
        assert_eq!(pts[3], Pt3D::new(2.0, 4.0, 0.0));
    }
}
