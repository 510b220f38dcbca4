use std::f64::consts::PI;
use std::fmt;

use serde::{Deserialize, Serialize};

/// An angle, stored in radians.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Angle(f64);

impl Angle {
    pub const ZERO: Angle = Angle(0.0);

    pub fn new_rads(rads: f64) -> Angle {
        Angle(rads)
    }

    pub fn degrees(degs: f64) -> Angle {
        Angle(degs.to_radians())
    }

    pub fn opposite(self) -> Angle {
        Angle(self.0 + PI)
    }

    pub fn rotate_degs(self, degrees: f64) -> Angle {
        Angle(self.0 + degrees.to_radians())
    }

    /// The raw value, not normalized.
    pub fn radians(self) -> f64 {
        self.0
    }

    /// Returns [0, 2pi)
    pub fn normalized_radians(self) -> f64 {
        let rads = self.0 % (2.0 * PI);
        if rads < 0.0 {
            rads + 2.0 * PI
        } else {
            rads
        }
    }

    pub fn normalized_degrees(self) -> f64 {
        self.normalized_radians().to_degrees()
    }

    /// How far to sweep from `self` to `other`, moving clockwise (decreasing angle) if requested.
    /// Always in [0, 2pi).
    pub fn sweep_to(self, other: Angle, clockwise: bool) -> Angle {
        let delta = if clockwise {
            self.0 - other.0
        } else {
            other.0 - self.0
        };
        Angle(delta).normalized()
    }

    pub fn normalized(self) -> Angle {
        Angle(self.normalized_radians())
    }

    pub fn approx_eq(self, other: Angle, within_degrees: f64) -> bool {
        let diff = (self.normalized_degrees() - other.normalized_degrees()).abs();
        diff.min(360.0 - diff) < within_degrees
    }
}

impl fmt::Display for Angle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Angle({} degrees)", self.normalized_degrees())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep() {
        let a = Angle::degrees(10.0);
        let b = Angle::degrees(350.0);
        assert!(a.sweep_to(b, false).approx_eq(Angle::degrees(340.0), 1e-9));
        assert!(a.sweep_to(b, true).approx_eq(Angle::degrees(20.0), 1e-9));
        assert!(Angle::degrees(-90.0).approx_eq(Angle::degrees(270.0), 1e-9));
    }
}
