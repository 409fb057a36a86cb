//! Fixed zone placement slots
//!
//! Zones are assigned to slots by their index in the backend zone list. The
//! backend stores no layout, so the index is the placement contract.

use serde::{Deserialize, Serialize};

/// Slot origins on the greenhouse floor (x, y, z), Y up
pub const DEFAULT_SLOTS: [[f32; 3]; 4] = [
    [-3.5, 0.0, -4.0],
    [3.5, 0.0, -4.0],
    [-3.5, 0.0, 4.0],
    [3.5, 0.0, 4.0],
];

pub const DEFAULT_FOOTPRINT: Footprint = Footprint {
    width: 3.0,
    depth: 6.0,
};

/// Planter footprint on the floor plane
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Footprint {
    /// Extent along X
    pub width: f32,
    /// Extent along Z
    pub depth: f32,
}

/// Where a zone sits in the scene and how large it is
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub position: [f32; 3],
    pub footprint: Footprint,
}

/// Placement for the zone at `index`; indices wrap around the four slots
pub fn slot_for_index(index: usize) -> Placement {
    Placement {
        position: DEFAULT_SLOTS[index % DEFAULT_SLOTS.len()],
        footprint: DEFAULT_FOOTPRINT,
    }
}
