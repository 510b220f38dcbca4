use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

use crate::{Angle, Distance};

/// A point on the ground plane, in meters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pt2D {
    x: f64,
    y: f64,
}

impl Pt2D {
    pub fn new(x: f64, y: f64) -> Pt2D {
        if !x.is_finite() || !y.is_finite() {
            panic!("Bad Pt2D {}, {}", x, y);
        }
        Pt2D { x, y }
    }

    pub fn x(self) -> f64 {
        self.x
    }

    pub fn y(self) -> f64 {
        self.y
    }

    pub fn dist_to(self, to: Pt2D) -> Distance {
        Distance::meters(((self.x - to.x).powi(2) + (self.y - to.y).powi(2)).sqrt())
    }

    pub fn angle_to(self, to: Pt2D) -> Angle {
        Angle::new_rads((to.y - self.y).atan2(to.x - self.x))
    }

    pub fn offset(self, dx: f64, dy: f64) -> Pt2D {
        Pt2D::new(self.x + dx, self.y + dy)
    }

    pub fn to_3d(self, z: f64) -> Pt3D {
        Pt3D::new(self.x, self.y, z)
    }

    /// The average of all the points. Returns the origin for an empty list.
    pub fn center(pts: &[Pt2D]) -> Pt2D {
        if pts.is_empty() {
            return Pt2D::new(0.0, 0.0);
        }
        let mut x = 0.0;
        let mut y = 0.0;
        for pt in pts {
            x += pt.x;
            y += pt.y;
        }
        let len = pts.len() as f64;
        Pt2D::new(x / len, y / len)
    }
}

impl fmt::Display for Pt2D {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Pt2D({0}, {1})", self.x, self.y)
    }
}

/// A point (or a displacement) in world space. `x` and `y` span the ground plane, `z` is
/// elevation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pt3D {
    x: f64,
    y: f64,
    z: f64,
}

impl Pt3D {
    pub const ORIGIN: Pt3D = Pt3D {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Pt3D {
        if !x.is_finite() || !y.is_finite() || !z.is_finite() {
            panic!("Bad Pt3D {}, {}, {}", x, y, z);
        }
        Pt3D { x, y, z }
    }

    pub fn x(self) -> f64 {
        self.x
    }

    pub fn y(self) -> f64 {
        self.y
    }

    pub fn z(self) -> f64 {
        self.z
    }

    pub fn to_2d(self) -> Pt2D {
        Pt2D::new(self.x, self.y)
    }

    pub fn with_z(self, z: f64) -> Pt3D {
        Pt3D::new(self.x, self.y, z)
    }

    pub fn dot(self, other: Pt3D) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn length(self) -> f64 {
        self.dot(self).sqrt()
    }

    pub fn dist_to(self, to: Pt3D) -> Distance {
        Distance::meters((to - self).length())
    }

    /// Unit vector in the same direction. The zero vector stays zero.
    pub fn normalize(self) -> Pt3D {
        let len = self.length();
        if len == 0.0 {
            return Pt3D::ORIGIN;
        }
        Pt3D::new(self.x / len, self.y / len, self.z / len)
    }

    /// Drops the elevation component and normalizes.
    pub fn ground_normalize(self) -> Pt3D {
        Pt3D::new(self.x, self.y, 0.0).normalize()
    }

    /// The ground-plane vector rotated 90 degrees clockwise, which is the right-hand side when
    /// travelling along `self`.
    pub fn right_normal(self) -> Pt3D {
        Pt3D::new(self.y, -self.x, 0.0).normalize()
    }

    pub fn left_normal(self) -> Pt3D {
        -self.right_normal()
    }

    pub fn lerp(self, to: Pt3D, pct: f64) -> Pt3D {
        self + (to - self) * pct
    }

    pub fn midpoint(self, to: Pt3D) -> Pt3D {
        self.lerp(to, 0.5)
    }

    /// Heading of this vector on the ground plane.
    pub fn heading(self) -> Angle {
        Angle::new_rads(self.y.atan2(self.x))
    }

    pub fn approx_eq(self, other: Pt3D, threshold: Distance) -> bool {
        self.dist_to(other) <= threshold
    }

    pub fn center(pts: &[Pt3D]) -> Pt3D {
        if pts.is_empty() {
            return Pt3D::ORIGIN;
        }
        let mut sum = Pt3D::ORIGIN;
        for pt in pts {
            sum = sum + *pt;
        }
        sum * (1.0 / pts.len() as f64)
    }
}

impl fmt::Display for Pt3D {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Pt3D({0}, {1}, {2})", self.x, self.y, self.z)
    }
}

impl Add for Pt3D {
    type Output = Pt3D;

    fn add(self, other: Pt3D) -> Pt3D {
        Pt3D::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

impl Sub for Pt3D {
    type Output = Pt3D;

    fn sub(self, other: Pt3D) -> Pt3D {
        Pt3D::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

impl Mul<f64> for Pt3D {
    type Output = Pt3D;

    fn mul(self, scalar: f64) -> Pt3D {
        Pt3D::new(self.x * scalar, self.y * scalar, self.z * scalar)
    }
}

impl Neg for Pt3D {
    type Output = Pt3D;

    fn neg(self) -> Pt3D {
        Pt3D::new(-self.x, -self.y, -self.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normals() {
        let east = Pt3D::new(2.0, 0.0, 0.0);
        assert_eq!(east.right_normal(), Pt3D::new(0.0, -1.0, 0.0));
        assert_eq!(east.left_normal(), Pt3D::new(0.0, 1.0, 0.0));
        assert_eq!(Pt3D::ORIGIN.normalize(), Pt3D::ORIGIN);
        assert_eq!(
            Pt3D::new(3.0, 4.0, 5.0).ground_normalize(),
            Pt3D::new(0.6, 0.8, 0.0)
        );
    }
}
