use serde::{Deserialize, Serialize};

use crate::event::PlacementEvent;

/// Body of `POST /board/pixel`.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacePixel {
    pub x: u32,
    pub y: u32,
    pub color_index: u16,
}

/// Query string of `GET /board/pixel`.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PixelQuery {
    pub x: u32,
    pub y: u32,
}

/// Body of `POST /admin/set-area`. The rectangle is clamped to the board;
/// cells outside it are skipped.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetArea {
    pub start_x: u32,
    pub start_y: u32,
    pub width: u32,
    pub height: u32,
}

/// Body of `POST /admin/cooldown`, milliseconds.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetCooldown {
    pub cooldown_period: u64,
}

/// Query string of `GET /admin/pixel-history`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    pub x: u32,
    pub y: u32,
    #[serde(default = "default_history_limit")]
    pub limit: usize,
    pub user_id: Option<String>,
    pub cursor: Option<String>,
}

fn default_history_limit() -> usize {
    100
}

/// Query string of `GET /admin/pixel-history-all`.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct LimitQuery {
    #[serde(default = "default_history_limit")]
    pub limit: usize,
}

/// Query string of `GET /admin/pixel-history-user`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
    pub user_id: String,
}

/// One page of history results, most recent first.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage {
    pub events: Vec<PlacementEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}
