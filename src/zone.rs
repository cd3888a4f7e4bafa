//! Ordered zone classification.

use crate::geometry::{Point, Rect};

/// Ordered, immutable list of zones.
///
/// A zone's id is its index. Declaration order is match priority: when zones
/// overlap, the lowest index wins.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ZoneSet {
    zones: Vec<Rect>,
}

impl ZoneSet {
    pub fn new(zones: Vec<Rect>) -> Self {
        Self { zones }
    }

    /// Index of the first zone containing `point`, or `None`.
    pub fn classify(&self, point: Point) -> Option<usize> {
        self.zones.iter().position(|zone| zone.contains(point))
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rect> {
        self.zones.iter()
    }
}

impl From<Vec<Rect>> for ZoneSet {
    fn from(zones: Vec<Rect>) -> Self {
        Self::new(zones)
    }
}
