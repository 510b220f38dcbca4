use serde::{Deserialize, Serialize};

use crate::{Curve, Pt3D};

/// Which side of a curve an offset is applied to, relative to the direction of travel along it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Side {
    /// The right-hand side
    Forward,
    /// The left-hand side
    Reverse,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Forward => Side::Reverse,
            Side::Reverse => Side::Forward,
        }
    }

    /// The unit vector pointing away from a curve with the given tangent, towards this side.
    pub fn normal(self, tangent: Pt3D) -> Pt3D {
        match self {
            Side::Forward => tangent.right_normal(),
            Side::Reverse => tangent.left_normal(),
        }
    }
}

/// `n + 1` points evenly spaced by arc length over the whole curve.
pub fn sample_curve<C: Curve + ?Sized>(curve: &C, n: usize) -> Vec<Pt3D> {
    sample_curve_range(curve, 0.0, 1.0, n)
}

/// `n + 1` points evenly spaced over the `[p_start, p_end]` fraction of the curve. Asking for 0
/// segments still yields both endpoints.
pub fn sample_curve_range<C: Curve + ?Sized>(
    curve: &C,
    p_start: f64,
    p_end: f64,
    n: usize,
) -> Vec<Pt3D> {
    offset_curve_range(curve, 0.0, Side::Forward, p_start, p_end, n)
}

/// Walks the curve at `segments + 1` evenly spaced parameters, stepping `offset` along the normal
/// towards `side` at each one. This approximates the true offset curve; tight curvature with
/// large offsets can fold the result, and that isn't detected here.
pub fn offset_curve<C: Curve + ?Sized>(
    curve: &C,
    offset: f64,
    side: Side,
    segments: usize,
) -> Vec<Pt3D> {
    offset_curve_range(curve, offset, side, 0.0, 1.0, segments)
}

pub fn offset_curve_range<C: Curve + ?Sized>(
    curve: &C,
    offset: f64,
    side: Side,
    p_start: f64,
    p_end: f64,
    segments: usize,
) -> Vec<Pt3D> {
    let segments = segments.max(1);
    (0..=segments)
        .map(|i| {
            let u = p_start + (p_end - p_start) * i as f64 / segments as f64;
            let pt = curve.point_at(u);
            if offset == 0.0 {
                return pt;
            }
            pt + side.normal(curve.tangent_at(u)) * offset
        })
        .collect()
}

/// How many segments to sample a stretch of road with, depending on its length in meters.
pub fn segment_count_for_length(length: f64) -> usize {
    if length <= 50.0 {
        20
    } else if length <= 100.0 {
        30
    } else if length <= 300.0 {
        40
    } else {
        (length / 10.0).floor() as usize + 1
    }
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng};
    use rand_xorshift::XorShiftRng;

    use super::*;
    use crate::{CatmullRom, EPSILON_DIST};

    #[test]
    fn zero_offset_matches_plain_sampling() {
        let mut rng = XorShiftRng::seed_from_u64(42);
        for _ in 0..20 {
            let pts: Vec<Pt3D> = (0..rng.gen_range(2..6))
                .map(|i| {
                    Pt3D::new(
                        i as f64 * 15.0 + rng.gen_range(-5.0..5.0),
                        rng.gen_range(-20.0..20.0),
                        rng.gen_range(0.0..3.0),
                    )
                })
                .collect();
            let curve = CatmullRom::centripetal(pts);
            let n = rng.gen_range(1..40);
            let plain = sample_curve(&curve, n);
            for side in [Side::Forward, Side::Reverse] {
                let offset = offset_curve(&curve, 0.0, side, n);
                assert_eq!(offset.len(), plain.len());
                for (a, b) in offset.iter().zip(plain.iter()) {
                    assert!(a.approx_eq(*b, EPSILON_DIST));
                }
            }
        }
    }

    #[test]
    fn offsets_land_on_the_requested_side() {
        let curve = CatmullRom::centripetal(vec![Pt3D::ORIGIN, Pt3D::new(30.0, 0.0, 0.0)]);
        let right = offset_curve(&curve, 3.5, Side::Forward, 10);
        let left = offset_curve(&curve, 3.5, Side::Reverse, 10);
        assert_eq!(right.len(), 11);
        for (r, l) in right.iter().zip(left.iter()) {
            assert!((r.y() + 3.5).abs() < 1e-6);
            assert!((l.y() - 3.5).abs() < 1e-6);
        }
        let partial = sample_curve_range(&curve, 0.5, 1.0, 5);
        assert!((partial[0].x() - 15.0).abs() < 1e-6);
        assert!((partial[5].x() - 30.0).abs() < 1e-6);
    }

    #[test]
    fn segment_counts() {
        assert_eq!(segment_count_for_length(10.0), 20);
        assert_eq!(segment_count_for_length(80.0), 30);
        assert_eq!(segment_count_for_length(300.0), 40);
        assert_eq!(segment_count_for_length(456.0), 46);
    }
}
