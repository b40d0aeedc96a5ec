use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BOARD_SIZE: u32 = 610;
pub const DEFAULT_PALETTE_SIZE: u16 = 16;
pub const DEFAULT_COOLDOWN_MS: u64 = 5 * 60 * 1000;

/// Engine-wide settings. `cooldown_ms` is only the starting value; the live
/// window can be changed at runtime through [`crate::Canvas::set_cooldown_ms`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Board edge length; the board holds `board_size²` cells.
    pub board_size: u32,
    /// Number of valid color indices (`0..palette_size`).
    pub palette_size: u16,
    pub cooldown_ms: u64,
    pub snapshot_interval: Duration,
    pub batch_tick: Duration,
    pub board_cache_ttl: Duration,
    pub cell_cache_ttl: Duration,
    /// Root for the snapshot directory and the history log file.
    pub data_dir: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> EngineConfig {
        EngineConfig {
            board_size: DEFAULT_BOARD_SIZE,
            palette_size: DEFAULT_PALETTE_SIZE,
            cooldown_ms: DEFAULT_COOLDOWN_MS,
            snapshot_interval: Duration::from_secs(60),
            batch_tick: Duration::from_millis(100),
            board_cache_ttl: Duration::from_secs(60),
            cell_cache_ttl: Duration::from_secs(300),
            data_dir: PathBuf::from("data"),
        }
    }
}
