use serde::{Deserialize, Serialize};

/// One accepted write of a color to a cell. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementEvent {
    pub x: u32,
    pub y: u32,
    pub color_index: u8,
    pub user_id: String,
    /// Unix milliseconds.
    pub timestamp: i64,
}

/// Read view of a single cell: current color plus the time of the most
/// recent placement there (0 when never placed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellInfo {
    pub x: u32,
    pub y: u32,
    pub color_index: u8,
    pub timestamp: i64,
}

/// Snapshot listing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotInfo {
    pub snapshot_id: String,
    /// Unix milliseconds.
    pub timestamp: i64,
}
