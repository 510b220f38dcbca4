use crate::{Angle, Pt3D};

/// Samples a circular arc from `start` to `end`, stepping by `step`. The point at angle `a` is
/// `center + radius * (cos a, sin a)`, at the center's elevation. Clockwise arcs walk towards
/// decreasing angles. The first and last points always sit exactly at `start` and `end`, even
/// if `step` doesn't divide the sweep.
///
/// Angles aren't wrapped: a counter-clockwise arc needs `end >= start` and a clockwise one needs
/// `end <= start`. Otherwise, or with a non-positive step, just the two endpoints are returned.
pub fn arc_points(
    center: Pt3D,
    radius: f64,
    start: Angle,
    end: Angle,
    step: Angle,
    clockwise: bool,
) -> Vec<Pt3D> {
    let at = |a: f64| {
        Pt3D::new(
            center.x() + radius * a.cos(),
            center.y() + radius * a.sin(),
            center.z(),
        )
    };
    let (a0, a1) = (start.radians(), end.radians());
    let step = step.radians();

    let wrong_way = if clockwise { a1 > a0 } else { a1 < a0 };
    if step <= 0.0 || wrong_way {
        return vec![at(a0), at(a1)];
    }

    let sweep = (a1 - a0).abs();
    let sign = if clockwise { -1.0 } else { 1.0 };
    let mut pts = vec![at(a0)];
    let mut i = 1;
    loop {
        let travelled = step * i as f64;
        // Don't emit a sliver right before the exact endpoint
        if travelled >= sweep - 1e-9 {
            break;
        }
        pts.push(at(a0 + sign * travelled));
        i += 1;
    }
    pts.push(at(a1));
    pts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn angle_of(center: Pt3D, pt: Pt3D) -> f64 {
        (pt.y() - center.y()).atan2(pt.x() - center.x())
    }

    #[test]
    fn endpoints_are_exact() {
        let center = Pt3D::new(5.0, -2.0, 1.0);
        for clockwise in [false, true] {
            for step_degs in [1.0, 2.0, 7.0, 13.3, 90.0, 400.0] {
                let (start, end) = if clockwise {
                    (Angle::degrees(170.0), Angle::degrees(-35.0))
                } else {
                    (Angle::degrees(-35.0), Angle::degrees(170.0))
                };
                let step = Angle::degrees(step_degs);
                let pts = arc_points(center, 20.0, start, end, step, clockwise);
                assert!(pts.len() >= 2);
                let first = pts[0];
                let last = pts[pts.len() - 1];
                assert_eq!(first.x(), center.x() + 20.0 * start.radians().cos());
                assert_eq!(first.y(), center.y() + 20.0 * start.radians().sin());
                assert_eq!(last.x(), center.x() + 20.0 * end.radians().cos());
                assert_eq!(last.y(), center.y() + 20.0 * end.radians().sin());
                assert!((angle_of(center, first) - start.radians()).abs() < 1e-9);
                assert!((angle_of(center, last) - end.radians()).abs() < 1e-9);
                for pt in &pts {
                    assert_eq!(pt.z(), 1.0);
                }
            }
        }
    }

    #[test]
    fn step_count() {
        let pts = arc_points(
            Pt3D::ORIGIN,
            1.0,
            Angle::ZERO,
            Angle::degrees(90.0),
            Angle::degrees(30.0),
            false,
        );
        assert_eq!(pts.len(), 4);
        let pts = arc_points(
            Pt3D::ORIGIN,
            1.0,
            Angle::ZERO,
            Angle::degrees(90.0),
            Angle::degrees(-1.0),
            false,
        );
        assert_eq!(pts.len(), 2);
    }
}
