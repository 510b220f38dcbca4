//! Geometry primitives for road synthesis: points, units, parametric curves and the sampling
//! routines that turn a reference curve into offset boundaries.

#[macro_use]
extern crate anyhow;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub use crate::angle::Angle;
pub use crate::arc::arc_points;
pub use crate::bezier::{bezier_with_endpoint_tangents, CubicBezier, BEZIER_CONTROL_RATIO};
pub use crate::catmull_rom::{with_virtual_points, CatmullRom};
pub use crate::curve::{ArcLengths, Curve};
pub use crate::distance::Distance;
pub use crate::pt::{Pt2D, Pt3D};
pub use crate::sampling::{
    offset_curve, offset_curve_range, sample_curve, sample_curve_range, segment_count_for_length,
    Side,
};
pub use crate::tessellation::Tessellation;

mod angle;
mod arc;
mod bezier;
mod catmull_rom;
mod curve;
mod distance;
mod pt;
mod sampling;
mod tessellation;

// About 1mm
pub const EPSILON_DIST: Distance = Distance::const_meters(0.001);

/// Reduce the precision of an f64. This helps ensure serialization is idempotent (everything is
/// exactly the same before and after saving/loading).
pub fn trim_f64(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

/// Round to a fixed number of decimal places.
pub fn round_to(x: f64, decimals: i32) -> f64 {
    let factor = 10_f64.powi(decimals);
    (x * factor).round() / factor
}

/// Serializes a trimmed `f64` as an `i32` to save space.
fn serialize_f64<S: Serializer>(x: &f64, s: S) -> Result<S::Ok, S::Error> {
    // So a trimmed f64's range becomes 2**31 / 10,000 =~ 214,000, which is plenty
    // We MUST round here, the same as trim_f64. The unit test demonstrates why.
    let int = (x * 10_000.0).round() as i32;
    int.serialize(s)
}

/// Deserializes a trimmed `f64` from an `i32`.
fn deserialize_f64<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    let x = <i32>::deserialize(d)?;
    Ok(x as f64 / 10_000.0)
}
