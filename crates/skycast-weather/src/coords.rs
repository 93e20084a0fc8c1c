//! Approximate coordinate comparison and exact coordinate keys.

use crate::types::Coordinates;

/// About 1.1 km of latitude, 0.9 km of longitude at the equator.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.01;

/// True when both axes differ by at most `threshold` degrees.
///
/// Only used to decide whether a cached location can be reused.
pub fn are_coords_similar(a: Coordinates, b: Coordinates, threshold: f64) -> bool {
    (a.latitude - b.latitude).abs() <= threshold && (a.longitude - b.longitude).abs() <= threshold
}

impl Coordinates {
    pub fn is_similar_to(&self, other: &Coordinates, threshold: f64) -> bool {
        are_coords_similar(*self, *other, threshold)
    }
}

/// Hashable key for a coordinate pair (exact bit pattern).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CoordKey {
    latitude_bits: u64,
    longitude_bits: u64,
}

impl CoordKey {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(
            f64::from_bits(self.latitude_bits),
            f64::from_bits(self.longitude_bits),
        )
    }
}

impl From<Coordinates> for CoordKey {
    fn from(c: Coordinates) -> Self {
        // Fold -0.0 into 0.0 so equal coordinates hash equally
        let normalize = |v: f64| if v == 0.0 { 0.0f64.to_bits() } else { v.to_bits() };
        Self {
            latitude_bits: normalize(c.latitude),
            longitude_bits: normalize(c.longitude),
        }
    }
}
