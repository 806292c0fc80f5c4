//! Fixed-point math utilities for deterministic simulation.
//!
//! All pen simulation uses fixed-point arithmetic so that a seeded run
//! produces bit-identical results on every platform. Floating-point
//! only appears at the host boundary (JSON output).

use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

/// Fixed-point number type for all simulation math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
pub type Fixed = I32F32;

/// Build a fixed-point fraction from an integer percentage.
///
/// `percent(16)` is `0.16`. Used for tunables so no float literal ever
/// enters the simulation.
#[must_use]
pub fn percent(value: i32) -> Fixed {
    Fixed::from_num(value) / Fixed::from_num(100)
}

/// Fixed-point 2D vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Vec2Fixed {
    /// X coordinate.
    pub x: Fixed,
    /// Y coordinate.
    pub y: Fixed,
}

impl Vec2Fixed {
    /// Create a new fixed-point vector.
    #[must_use]
    pub const fn new(x: Fixed, y: Fixed) -> Self {
        Self { x, y }
    }

    /// Create a vector from integer coordinates.
    #[must_use]
    pub fn from_ints(x: i32, y: i32) -> Self {
        Self::new(Fixed::from_num(x), Fixed::from_num(y))
    }

    /// Zero vector.
    pub const ZERO: Self = Self {
        x: Fixed::ZERO,
        y: Fixed::ZERO,
    };

    /// True if both components are zero.
    #[must_use]
    pub fn is_zero(self) -> bool {
        self.x == Fixed::ZERO && self.y == Fixed::ZERO
    }

    /// Calculate squared distance (avoids sqrt for comparisons).
    #[must_use]
    pub fn distance_squared(self, other: Self) -> Fixed {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.saturating_mul(dx).saturating_add(dy.saturating_mul(dy))
    }

    /// Euclidean distance.
    #[must_use]
    pub fn distance(self, other: Self) -> Fixed {
        fixed_sqrt(self.distance_squared(other))
    }

    /// Dot product of two vectors.
    #[must_use]
    pub fn dot(self, other: Self) -> Fixed {
        self.x * other.x + self.y * other.y
    }

    /// Vector length.
    #[must_use]
    pub fn length(self) -> Fixed {
        fixed_sqrt(self.dot(self))
    }

    /// Multiply both components by a scalar.
    #[must_use]
    pub fn scale(self, factor: Fixed) -> Self {
        Self::new(self.x * factor, self.y * factor)
    }

    /// Rotate 90° counter-clockwise.
    #[must_use]
    pub fn perpendicular(self) -> Self {
        Self::new(-self.y, self.x)
    }

    /// Linearly interpolate between two vectors.
    #[must_use]
    pub fn lerp(self, other: Self, t: Fixed) -> Self {
        Self {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }

    /// Normalize vector using fixed-point math.
    ///
    /// Returns `None` for a zero-length vector instead of a meaningless
    /// direction.
    #[must_use]
    pub fn try_normalize(self) -> Option<Self> {
        let len_sq = self.dot(self);
        if len_sq == Fixed::ZERO {
            return None;
        }

        let len = fixed_sqrt(len_sq);
        if len == Fixed::ZERO {
            return None;
        }

        Some(Self::new(self.x / len, self.y / len))
    }

    /// Normalize vector, mapping the zero vector to zero.
    #[must_use]
    pub fn normalize(self) -> Self {
        self.try_normalize().unwrap_or(Self::ZERO)
    }
}

/// Computes the square root of a fixed-point number using binary search.
#[must_use]
pub fn fixed_sqrt(value: Fixed) -> Fixed {
    if value <= Fixed::ZERO {
        return Fixed::ZERO;
    }

    let mut low = Fixed::ZERO;
    let mut high = if value > Fixed::from_num(1) {
        value
    } else {
        Fixed::from_num(1)
    };

    for _ in 0..48 {
        let mid = (low + high) / Fixed::from_num(2);
        let mid_sq = mid.saturating_mul(mid);

        if mid_sq <= value {
            low = mid;
        } else {
            high = mid;
        }
    }

    low
}

impl std::ops::Add for Vec2Fixed {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl std::ops::Sub for Vec2Fixed {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

impl std::ops::Neg for Vec2Fixed {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self::new(-self.x, -self.y)
    }
}

/// Axis-aligned bounding box described by its center and half extents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Aabb {
    /// Box center.
    pub center: Vec2Fixed,
    /// Half width and half height.
    pub half_extents: Vec2Fixed,
}

impl Aabb {
    /// Create a box from center and half extents.
    #[must_use]
    pub const fn new(center: Vec2Fixed, half_extents: Vec2Fixed) -> Self {
        Self {
            center,
            half_extents,
        }
    }

    /// Create a box from its top-left corner and full size.
    #[must_use]
    pub fn from_corner(corner: Vec2Fixed, size: Vec2Fixed) -> Self {
        let half = size.scale(Fixed::from_num(1) / Fixed::from_num(2));
        Self::new(corner + half, half)
    }

    /// Same extents, moved to a new center.
    #[must_use]
    pub fn at(self, center: Vec2Fixed) -> Self {
        Self::new(center, self.half_extents)
    }

    /// Minimum corner.
    #[must_use]
    pub fn min(&self) -> Vec2Fixed {
        self.center - self.half_extents
    }

    /// Maximum corner.
    #[must_use]
    pub fn max(&self) -> Vec2Fixed {
        self.center + self.half_extents
    }

    /// Strict overlap test; touching edges do not count.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        let (a_min, a_max) = (self.min(), self.max());
        let (b_min, b_max) = (other.min(), other.max());
        a_min.x < b_max.x && a_max.x > b_min.x && a_min.y < b_max.y && a_max.y > b_min.y
    }

    /// True if the point lies inside or on the boundary.
    #[must_use]
    pub fn contains_point(&self, point: Vec2Fixed) -> bool {
        let (min, max) = (self.min(), self.max());
        point.x >= min.x && point.x <= max.x && point.y >= min.y && point.y <= max.y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec2_distance_squared() {
        let a = Vec2Fixed::new(Fixed::from_num(3), Fixed::from_num(0));
        let b = Vec2Fixed::new(Fixed::from_num(0), Fixed::from_num(4));
        // 3² + 4² = 25
        assert_eq!(a.distance_squared(b), Fixed::from_num(25));
    }

    #[test]
    fn test_distance_uses_fixed_sqrt() {
        let a = Vec2Fixed::from_ints(0, 0);
        let b = Vec2Fixed::from_ints(30, 40);
        let dist = a.distance(b);
        let epsilon = Fixed::from_num(1) / Fixed::from_num(1000);
        assert!((dist - Fixed::from_num(50)).abs() < epsilon, "got {dist}");
    }

    #[test]
    fn test_zero_vector_does_not_normalize() {
        assert_eq!(Vec2Fixed::ZERO.try_normalize(), None);
        assert_eq!(Vec2Fixed::ZERO.normalize(), Vec2Fixed::ZERO);
    }

    #[test]
    fn test_vec2_normalize() {
        let v = Vec2Fixed::new(Fixed::from_num(3), Fixed::from_num(4));
        let norm = v.normalize();

        let len_sq = norm.dot(norm);
        let one = Fixed::from_num(1);
        let epsilon = one / Fixed::from_num(10000);
        assert!(
            (len_sq - one).abs() < epsilon,
            "normalized vector length² should be ~1, got {:?}",
            len_sq
        );

        // Direction preserved: norm.x * 4 == norm.y * 3
        let ratio_diff = (norm.x * Fixed::from_num(4)) - (norm.y * Fixed::from_num(3));
        assert!(ratio_diff.abs() < epsilon, "direction not preserved: {:?}", ratio_diff);
    }

    #[test]
    fn test_perpendicular_is_orthogonal() {
        let v = Vec2Fixed::from_ints(2, 5);
        assert_eq!(v.dot(v.perpendicular()), Fixed::ZERO);
    }

    #[test]
    fn test_percent() {
        assert_eq!(percent(50), Fixed::from_num(1) / Fixed::from_num(2));
        assert_eq!(percent(100), Fixed::from_num(1));
    }

    #[test]
    fn test_aabb_overlap_excludes_touching_edges() {
        let a = Aabb::new(Vec2Fixed::from_ints(0, 0), Vec2Fixed::from_ints(5, 5));
        let touching = Aabb::new(Vec2Fixed::from_ints(10, 0), Vec2Fixed::from_ints(5, 5));
        let overlapping = Aabb::new(Vec2Fixed::from_ints(9, 0), Vec2Fixed::from_ints(5, 5));
        assert!(!a.intersects(&touching));
        assert!(a.intersects(&overlapping));
        assert!(overlapping.intersects(&a));
    }

    #[test]
    fn test_aabb_from_corner() {
        let b = Aabb::from_corner(Vec2Fixed::from_ints(20, 30), Vec2Fixed::from_ints(10, 10));
        assert_eq!(b.center, Vec2Fixed::from_ints(25, 35));
        assert_eq!(b.min(), Vec2Fixed::from_ints(20, 30));
    }

    #[test]
    fn test_fixed_reads_decimal_string_from_ron() {
        #[derive(Deserialize)]
        struct Wrapper {
            value: Fixed,
        }
        let parsed: Wrapper = ron::from_str("(value: \"0.5\")").unwrap();
        assert_eq!(parsed.value, percent(50));
    }
}
