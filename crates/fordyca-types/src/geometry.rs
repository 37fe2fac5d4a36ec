//! Real-valued and discrete arena coordinates.
//!
//! The arena is a rectangle with its origin at the lower-left corner. Real
//! positions ([`Vec2`]) are in metres; discrete positions ([`DiscreteCoord`])
//! index the arena grid at a fixed resolution.

use core::f64::consts::PI;
use core::ops::{Add, AddAssign, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

/// A 2D vector in real (metre) coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    /// X component.
    pub x: f64,
    /// Y component.
    pub y: f64,
}

impl Vec2 {
    /// The zero vector.
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    /// Create a vector from components.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Create a unit-length vector pointing at `angle` radians.
    pub fn from_angle(angle: f64) -> Self {
        Self::new(angle.cos(), angle.sin())
    }

    /// Euclidean length.
    pub fn length(self) -> f64 {
        self.x.hypot(self.y)
    }

    /// Euclidean distance to `other`.
    pub fn distance(self, other: Self) -> f64 {
        (self - other).length()
    }

    /// Angle of the vector in radians, in `(-pi, pi]`.
    pub fn angle(self) -> f64 {
        self.y.atan2(self.x)
    }

    /// Return the unit vector in the same direction, or zero for a zero vector.
    pub fn normalized(self) -> Self {
        let len = self.length();
        if len <= f64::EPSILON {
            Self::ZERO
        } else {
            Self::new(self.x / len, self.y / len)
        }
    }

    /// Dot product.
    pub fn dot(self, other: Self) -> f64 {
        self.x.mul_add(other.x, self.y * other.y)
    }
}

impl Add for Vec2 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Vec2 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Vec2 {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

impl Neg for Vec2 {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.x, -self.y)
    }
}

impl core::fmt::Display for Vec2 {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "({:.3}, {:.3})", self.x, self.y)
    }
}

/// Normalize an angle to the range `(-pi, pi]`.
pub fn normalize_angle(angle: f64) -> f64 {
    let mut a = angle % (2.0 * PI);
    if a <= -PI {
        a += 2.0 * PI;
    } else if a > PI {
        a -= 2.0 * PI;
    }
    a
}

/// A discrete grid coordinate.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct DiscreteCoord {
    /// Column index.
    pub x: u32,
    /// Row index.
    pub y: u32,
}

impl DiscreteCoord {
    /// Create a coordinate from components.
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Map a real position to the grid at `resolution` metres per cell.
    ///
    /// Negative or non-finite components clamp to zero.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_real(pos: Vec2, resolution: f64) -> Self {
        let to_index = |v: f64| -> u32 {
            let scaled = (v / resolution).floor();
            if scaled.is_finite() && scaled > 0.0 {
                scaled.min(f64::from(u32::MAX)) as u32
            } else {
                0
            }
        };
        Self::new(to_index(pos.x), to_index(pos.y))
    }

    /// Return the real position of the centre of this cell.
    pub fn to_real(self, resolution: f64) -> Vec2 {
        Vec2::new(
            (f64::from(self.x) + 0.5) * resolution,
            (f64::from(self.y) + 0.5) * resolution,
        )
    }

    /// Chebyshev (king-move) distance to `other`.
    pub const fn chebyshev(self, other: Self) -> u32 {
        let dx = self.x.abs_diff(other.x);
        let dy = self.y.abs_diff(other.y);
        if dx > dy { dx } else { dy }
    }
}

impl core::fmt::Display for DiscreteCoord {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn vector_length_and_distance() {
        let a = Vec2::new(3.0, 4.0);
        assert!((a.length() - 5.0).abs() < EPS);
        assert!((a.distance(Vec2::ZERO) - 5.0).abs() < EPS);
    }

    #[test]
    fn normalized_zero_vector_is_zero() {
        assert_eq!(Vec2::ZERO.normalized(), Vec2::ZERO);
        let n = Vec2::new(0.0, 2.0).normalized();
        assert!((n.y - 1.0).abs() < EPS);
    }

    #[test]
    fn normalize_angle_wraps_into_range() {
        assert!((normalize_angle(2.5 * PI) - PI / 2.0).abs() < EPS);
        assert!((normalize_angle(-2.5 * PI) + PI / 2.0).abs() < EPS);
        assert!((normalize_angle(PI / 2.0) - PI / 2.0).abs() < EPS);
        assert!((normalize_angle(1.5 * PI) + PI / 2.0).abs() < EPS);
    }

    #[test]
    fn discretization_floors_to_cell() {
        let c = DiscreteCoord::from_real(Vec2::new(1.05, 0.19), 0.2);
        assert_eq!(c, DiscreteCoord::new(5, 0));
        let negative = DiscreteCoord::from_real(Vec2::new(-1.0, f64::NAN), 0.2);
        assert_eq!(negative, DiscreteCoord::new(0, 0));
    }

    #[test]
    fn cell_centre_roundtrip() {
        let c = DiscreteCoord::new(3, 4);
        let centre = c.to_real(0.2);
        assert!((centre.x - 0.7).abs() < EPS);
        assert!((centre.y - 0.9).abs() < EPS);
        assert_eq!(DiscreteCoord::from_real(centre, 0.2), c);
    }

    #[test]
    fn chebyshev_distance() {
        let a = DiscreteCoord::new(2, 2);
        assert_eq!(a.chebyshev(DiscreteCoord::new(5, 3)), 3);
        assert_eq!(a.chebyshev(DiscreteCoord::new(0, 6)), 4);
    }
}
