pub mod ban;
pub mod board;
pub mod broadcast;
pub mod cache;
pub mod canvas;
pub mod config;
pub mod cooldown;
pub mod error;
pub mod history;
pub mod snapshot;

pub use ban::BanList;
pub use broadcast::{spawn_batcher_process, BroadcastHandle};
pub use canvas::{spawn_snapshot_sync_process, Canvas};
pub use config::EngineConfig;
pub use error::CanvasError;
