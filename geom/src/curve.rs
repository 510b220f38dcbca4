use std::cmp::Ordering;

use ordered_float::OrderedFloat;

use crate::{Distance, Pt3D};

/// How finely curves are walked to build their arc-length lookup table.
const ARC_LENGTH_DIVISIONS: usize = 200;
/// Half-width of the finite difference used for tangents, in raw curve parameter units.
const TANGENT_DELTA: f64 = 0.0001;

/// Cumulative arc length at evenly spaced raw parameters. Lets a curve be walked at constant
/// speed.
#[derive(Clone, Debug, PartialEq)]
pub struct ArcLengths(Vec<f64>);

impl ArcLengths {
    pub fn new<F: Fn(f64) -> Pt3D>(point: F) -> ArcLengths {
        let mut lengths = Vec::with_capacity(ARC_LENGTH_DIVISIONS + 1);
        lengths.push(0.0);
        let mut last = point(0.0);
        let mut sum = 0.0;
        for i in 1..=ARC_LENGTH_DIVISIONS {
            let current = point(i as f64 / ARC_LENGTH_DIVISIONS as f64);
            sum += (current - last).length();
            lengths.push(sum);
            last = current;
        }
        ArcLengths(lengths)
    }

    pub fn total(&self) -> f64 {
        self.0.last().cloned().unwrap_or(0.0)
    }

    /// Maps a fraction of arc length `u` to the raw parameter `t`.
    pub fn u_to_t(&self, u: f64) -> f64 {
        let u = u.clamp(0.0, 1.0);
        let total = self.total();
        if total == 0.0 || self.0.len() < 2 {
            return u;
        }
        let target = u * total;

        // The last index whose length doesn't exceed the target
        let idx = match self
            .0
            .binary_search_by(|len| len.partial_cmp(&target).unwrap_or(Ordering::Less))
        {
            Ok(idx) => return idx as f64 / (self.0.len() - 1) as f64,
            Err(0) => 0,
            Err(idx) => idx - 1,
        };
        if idx >= self.0.len() - 1 {
            return 1.0;
        }
        let before = self.0[idx];
        let after = self.0[idx + 1];
        let fraction = if after > before {
            (target - before) / (after - before)
        } else {
            0.0
        };
        (idx as f64 + fraction) / (self.0.len() - 1) as f64
    }
}

/// A parametric curve over `t` in [0, 1]. Methods named `*_at` take a fraction of arc length
/// instead of the raw parameter.
pub trait Curve {
    /// Position at the raw parameter.
    fn point(&self, t: f64) -> Pt3D;

    fn arc_lengths(&self) -> &ArcLengths;

    fn length(&self) -> Distance {
        Distance::meters(self.arc_lengths().total())
    }

    fn point_at(&self, u: f64) -> Pt3D {
        self.point(self.arc_lengths().u_to_t(u))
    }

    /// Unit tangent at the raw parameter. Zero if the curve doesn't move there.
    fn tangent(&self, t: f64) -> Pt3D {
        let t1 = (t - TANGENT_DELTA).max(0.0);
        let t2 = (t + TANGENT_DELTA).min(1.0);
        (self.point(t2) - self.point(t1)).normalize()
    }

    fn tangent_at(&self, u: f64) -> Pt3D {
        self.tangent(self.arc_lengths().u_to_t(u))
    }

    /// `divisions + 1` points evenly spaced by arc length, including both ends.
    fn spaced_points(&self, divisions: usize) -> Vec<Pt3D> {
        let divisions = divisions.max(1);
        (0..=divisions)
            .map(|i| self.point_at(i as f64 / divisions as f64))
            .collect()
    }

    /// Projects `pt` onto the curve, returning the fraction of arc length of the closest sample
    /// among `divisions + 1` evenly spaced ones.
    fn closest_percent(&self, pt: Pt3D, divisions: usize) -> f64 {
        let divisions = divisions.max(1);
        (0..=divisions)
            .map(|i| i as f64 / divisions as f64)
            .min_by_key(|u| OrderedFloat((self.point_at(*u) - pt).length()))
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Line(Pt3D, Pt3D, ArcLengths);

    impl Line {
        fn new(a: Pt3D, b: Pt3D) -> Line {
            Line(a, b, ArcLengths::new(|t| a.lerp(b, t * t)))
        }
    }

    impl Curve for Line {
        // Deliberately not constant speed
        fn point(&self, t: f64) -> Pt3D {
            self.0.lerp(self.1, t * t)
        }

        fn arc_lengths(&self) -> &ArcLengths {
            &self.2
        }
    }

    #[test]
    fn arc_length_reparameterization() {
        let line = Line::new(Pt3D::ORIGIN, Pt3D::new(10.0, 0.0, 0.0));
        assert_eq!(line.length(), Distance::meters(10.0));
        let mid = line.point_at(0.5);
        assert!((mid.x() - 5.0).abs() < 0.01);
        let pts = line.spaced_points(4);
        assert_eq!(pts.len(), 5);
        assert_eq!(pts[0], Pt3D::ORIGIN);
        assert!((pts[4].x() - 10.0).abs() < 1e-9);
        assert!((line.closest_percent(Pt3D::new(7.4, 3.0, 0.0), 100) - 0.74).abs() < 1e-9);
    }
}
