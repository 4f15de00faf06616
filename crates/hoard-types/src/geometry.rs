//! Grid cells and distance helpers.

use serde::{Deserialize, Serialize};

/// A cell on a region's 2D grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Cell {
    /// Column.
    pub x: i32,
    /// Row.
    pub z: i32,
}

impl Cell {
    /// Construct a cell.
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Squared Euclidean distance to `other`. Saturates instead of
    /// overflowing on extreme coordinates.
    pub fn distance_squared(self, other: Self) -> u64 {
        let dx = i64::from(self.x).abs_diff(i64::from(other.x));
        let dz = i64::from(self.z).abs_diff(i64::from(other.z));
        dx.saturating_mul(dx).saturating_add(dz.saturating_mul(dz))
    }

    /// Whether `other` lies within `radius` of this cell (inclusive).
    #[allow(clippy::cast_precision_loss)] // Grid distances stay well inside f64's exact range.
    pub fn within_radius(self, other: Self, radius: f32) -> bool {
        if radius < 0.0 {
            return false;
        }
        let r = f64::from(radius);
        self.distance_squared(other) as f64 <= r * r
    }

    /// The four orthogonally adjacent cells (east, west, north, south).
    pub const fn orthogonal_neighbours(self) -> [Self; 4] {
        [
            Self::new(self.x.saturating_add(1), self.z),
            Self::new(self.x.saturating_sub(1), self.z),
            Self::new(self.x, self.z.saturating_add(1)),
            Self::new(self.x, self.z.saturating_sub(1)),
        ]
    }
}

impl core::fmt::Display for Cell {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_squared_is_symmetric() {
        let a = Cell::new(1, 2);
        let b = Cell::new(4, 6);
        assert_eq!(a.distance_squared(b), 25);
        assert_eq!(b.distance_squared(a), 25);
    }

    #[test]
    fn radius_is_inclusive() {
        let a = Cell::new(0, 0);
        assert!(a.within_radius(Cell::new(3, 4), 5.0));
        assert!(!a.within_radius(Cell::new(3, 5), 5.0));
        assert!(!a.within_radius(a, -1.0));
    }

    #[test]
    fn extreme_coordinates_saturate() {
        let a = Cell::new(i32::MIN, i32::MIN);
        let b = Cell::new(i32::MAX, i32::MAX);
        assert!(a.distance_squared(b) > 0);
    }

    #[test]
    fn neighbours_are_adjacent() {
        let c = Cell::new(5, 5);
        for n in c.orthogonal_neighbours() {
            assert_eq!(c.distance_squared(n), 1);
        }
    }
}
