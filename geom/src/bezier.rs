use serde::{Deserialize, Serialize};

use crate::{ArcLengths, Curve, Pt3D};

/// How far the inner control points sit from the endpoints, as a fraction of the chord length.
pub const BEZIER_CONTROL_RATIO: f64 = 0.5;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "[Pt3D; 4]", into = "[Pt3D; 4]")]
pub struct CubicBezier {
    pts: [Pt3D; 4],
    lengths: ArcLengths,
}

impl From<[Pt3D; 4]> for CubicBezier {
    fn from(pts: [Pt3D; 4]) -> CubicBezier {
        CubicBezier::new(pts[0], pts[1], pts[2], pts[3])
    }
}

impl From<CubicBezier> for [Pt3D; 4] {
    fn from(curve: CubicBezier) -> [Pt3D; 4] {
        curve.pts
    }
}

impl CubicBezier {
    pub fn new(start: Pt3D, ctrl1: Pt3D, ctrl2: Pt3D, end: Pt3D) -> CubicBezier {
        let pts = [start, ctrl1, ctrl2, end];
        let lengths = ArcLengths::new(|t| evaluate(&pts, t));
        CubicBezier { pts, lengths }
    }

    pub fn start(&self) -> Pt3D {
        self.pts[0]
    }

    pub fn end(&self) -> Pt3D {
        self.pts[3]
    }

    pub fn control_points(&self) -> (Pt3D, Pt3D) {
        (self.pts[1], self.pts[2])
    }
}

impl Curve for CubicBezier {
    fn point(&self, t: f64) -> Pt3D {
        evaluate(&self.pts, t)
    }

    fn arc_lengths(&self) -> &ArcLengths {
        &self.lengths
    }
}

fn evaluate(pts: &[Pt3D; 4], t: f64) -> Pt3D {
    let t = t.clamp(0.0, 1.0);
    let k = 1.0 - t;
    pts[0] * (k * k * k)
        + pts[1] * (3.0 * k * k * t)
        + pts[2] * (3.0 * k * t * t)
        + pts[3] * (t * t * t)
}

/// Fits a cubic Bezier from `p1` to `p2`. Both tangents point into the curve: the curve leaves
/// `p1` heading along `t1` and arrives at `p2` heading against `t2`. Zero tangents are tolerated
/// and collapse the matching control point onto its endpoint.
pub fn bezier_with_endpoint_tangents(p1: Pt3D, t1: Pt3D, p2: Pt3D, t2: Pt3D) -> CubicBezier {
    let reach = (p2 - p1).length() * BEZIER_CONTROL_RATIO;
    CubicBezier::new(
        p1,
        p1 + t1.normalize() * reach,
        p2 + t2.normalize() * reach,
        p2,
    )
}
