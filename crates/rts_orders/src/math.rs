//! Fixed-point math utilities for deterministic simulation.
//!
//! All simulation math uses fixed-point arithmetic so that every client
//! computes bit-identical positions. World coordinates are measured in
//! leptons (1/256 of a tile edge).

use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

/// Fixed-point number type for all simulation math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
pub type Fixed = I32F32;

/// Serde support for fixed-point numbers.
///
/// Serializes fixed-point numbers as their raw bit representation (i64)
/// to preserve exact precision across serialization boundaries.
pub mod fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as its raw bit representation.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_bits().serialize(serializer)
    }

    /// Deserialize a fixed-point number from its raw bit representation.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = i64::deserialize(deserializer)?;
        Ok(Fixed::from_bits(bits))
    }
}

/// Fixed-point 3D vector in leptons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Vec3Fixed {
    /// X coordinate (east).
    #[serde(with = "fixed_serde")]
    pub x: Fixed,
    /// Y coordinate (south).
    #[serde(with = "fixed_serde")]
    pub y: Fixed,
    /// Z coordinate (height).
    #[serde(with = "fixed_serde")]
    pub z: Fixed,
}

impl Vec3Fixed {
    /// Zero vector.
    pub const ZERO: Self = Self {
        x: Fixed::ZERO,
        y: Fixed::ZERO,
        z: Fixed::ZERO,
    };

    /// Create a new fixed-point vector.
    #[must_use]
    pub const fn new(x: Fixed, y: Fixed, z: Fixed) -> Self {
        Self { x, y, z }
    }

    /// Create a vector from integer lepton coordinates.
    #[must_use]
    pub fn from_ints(x: i32, y: i32, z: i32) -> Self {
        Self::new(Fixed::from_num(x), Fixed::from_num(y), Fixed::from_num(z))
    }

    /// The same vector with the height component dropped.
    #[must_use]
    pub const fn planar(self) -> Self {
        Self {
            x: self.x,
            y: self.y,
            z: Fixed::ZERO,
        }
    }

    /// Whether every component is zero.
    #[must_use]
    pub fn is_zero(self) -> bool {
        self == Self::ZERO
    }

    /// Euclidean length.
    ///
    /// Exact for perfect squares, so axis-aligned distances carry no
    /// rounding error.
    #[must_use]
    pub fn length(self) -> Fixed {
        let sum = i128::from(self.x.to_bits()).pow(2)
            + i128::from(self.y.to_bits()).pow(2)
            + i128::from(self.z.to_bits()).pow(2);
        // sum is length² scaled by 2^64, so its root is length scaled by 2^32.
        Fixed::from_bits(isqrt(sum as u128) as i64)
    }

    /// Clamp the vector to at most `max` in length.
    ///
    /// Vectors already within `max` are returned unchanged; longer ones are
    /// scaled with multiply-before-divide so that exact ratios stay exact.
    #[must_use]
    pub fn clamp_length(self, max: Fixed) -> Self {
        let length = self.length();
        if length <= max {
            return self;
        }
        if length == Fixed::ZERO {
            return Self::ZERO;
        }
        Self {
            x: mul_div(self.x, max, length),
            y: mul_div(self.y, max, length),
            z: mul_div(self.z, max, length),
        }
    }
}

/// Computes `a * b / c` without intermediate overflow or rounding.
///
/// Returns zero when `c` is zero.
#[must_use]
pub fn mul_div(a: Fixed, b: Fixed, c: Fixed) -> Fixed {
    if c == Fixed::ZERO {
        return Fixed::ZERO;
    }
    let product = i128::from(a.to_bits()) * i128::from(b.to_bits());
    Fixed::from_bits((product / i128::from(c.to_bits())) as i64)
}

/// Square root of a fixed-point number, floored to the last fractional bit.
#[must_use]
pub fn fixed_sqrt(value: Fixed) -> Fixed {
    if value <= Fixed::ZERO {
        return Fixed::ZERO;
    }
    let scaled = (value.to_bits() as u128) << 32;
    Fixed::from_bits(isqrt(scaled) as i64)
}

/// Integer square root (Newton's method).
fn isqrt(n: u128) -> u128 {
    if n < 2 {
        return n;
    }
    let mut x = n;
    let mut y = (x + 1) / 2;
    while y < x {
        x = y;
        y = (x + n / x) / 2;
    }
    x
}

impl std::ops::Add for Vec3Fixed {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
            z: self.z + rhs.z,
        }
    }
}

impl std::ops::AddAssign for Vec3Fixed {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl std::ops::Sub for Vec3Fixed {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
            z: self.z - rhs.z,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed(n: i32) -> Fixed {
        Fixed::from_num(n)
    }

    #[test]
    fn test_length_is_exact_for_pythagorean_triples() {
        let v = Vec3Fixed::from_ints(3, 4, 0);
        assert_eq!(v.length(), fixed(5));
        let v = Vec3Fixed::from_ints(0, 0, -25);
        assert_eq!(v.length(), fixed(25));
    }

    #[test]
    fn test_fixed_sqrt() {
        assert_eq!(fixed_sqrt(fixed(625)), fixed(25));
        assert_eq!(fixed_sqrt(fixed(-4)), Fixed::ZERO);
        let root_two = fixed_sqrt(fixed(2));
        let epsilon = Fixed::ONE / fixed(10000);
        assert!((root_two * root_two - fixed(2)).abs() < epsilon);
    }

    #[test]
    fn test_clamp_length_keeps_short_vectors() {
        let v = Vec3Fixed::from_ints(5, 0, 0);
        assert_eq!(v.clamp_length(fixed(10)), v);
    }

    #[test]
    fn test_clamp_length_scales_exactly() {
        let v = Vec3Fixed::from_ints(25, 0, 0);
        assert_eq!(v.clamp_length(fixed(10)), Vec3Fixed::from_ints(10, 0, 0));

        let v = Vec3Fixed::from_ints(30, 40, 0);
        assert_eq!(v.clamp_length(fixed(10)), Vec3Fixed::from_ints(6, 8, 0));
    }

    #[test]
    fn test_clamped_length_never_exceeds_max() {
        let v = Vec3Fixed::from_ints(17, -23, 9);
        let clamped = v.clamp_length(fixed(7));
        assert!(clamped.length() <= fixed(7));
    }

    #[test]
    fn test_mul_div_zero_divisor() {
        assert_eq!(mul_div(fixed(3), fixed(4), Fixed::ZERO), Fixed::ZERO);
        assert_eq!(mul_div(fixed(3), fixed(4), fixed(6)), fixed(2));
    }
}
