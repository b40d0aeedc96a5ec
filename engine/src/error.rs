use thiserror::Error;

/// Everything a canvas operation can fail with. The server maps these onto
/// response statuses; `CooldownActive` is expected traffic, not a fault.
#[derive(Debug, Error)]
pub enum CanvasError {
    #[error("coordinates ({x}, {y}) are outside the board")]
    OutOfBounds { x: u32, y: u32 },

    #[error("color index {0} is outside the palette")]
    InvalidColor(u16),

    #[error("user is banned")]
    Forbidden,

    #[error("you can place a tile in {remaining_secs} seconds")]
    CooldownActive { remaining_secs: u64 },

    #[error("snapshot not found: {0}")]
    NotFound(String),

    #[error("backing store unavailable: {0}")]
    StoreUnavailable(String),
}

impl From<std::io::Error> for CanvasError {
    fn from(e: std::io::Error) -> CanvasError {
        CanvasError::StoreUnavailable(e.to_string())
    }
}
