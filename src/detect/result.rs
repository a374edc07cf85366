use serde::Serialize;

/// Bounding box of one candidate motion region, in pixels of the normalized frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Result of running extraction on a single frame.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DetectionResult {
    /// At least one region survived the area filter.
    pub occupied: bool,
    /// Surviving regions in raster discovery order.
    pub regions: Vec<Region>,
}

impl DetectionResult {
    pub fn from_regions(regions: Vec<Region>) -> Self {
        Self {
            occupied: !regions.is_empty(),
            regions,
        }
    }

    pub fn status(&self) -> RoomStatus {
        if self.occupied {
            RoomStatus::Occupied
        } else {
            RoomStatus::Unoccupied
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum RoomStatus {
    Occupied,
    Unoccupied,
}

impl std::fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoomStatus::Occupied => f.write_str("Occupied"),
            RoomStatus::Unoccupied => f.write_str("Unoccupied"),
        }
    }
}
