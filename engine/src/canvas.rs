use std::fs;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use msgs::event::{CellInfo, PlacementEvent, SnapshotInfo};
use parking_lot::Mutex;

use crate::ban::BanList;
use crate::board::BoardStore;
use crate::broadcast::BroadcastHandle;
use crate::cache::ReadCache;
use crate::config::EngineConfig;
use crate::cooldown::CooldownLedger;
use crate::error::CanvasError;
use crate::history::HistoryLog;
use crate::snapshot::SnapshotStore;

/// Actor recorded on synthetic events from admin bulk mutations.
pub const ADMIN_USER: &str = "admin";

const HISTORY_FILE: &str = "history.jsonl";
const SNAPSHOT_DIR: &str = "snapshots";

/// The canvas engine: live board, cooldown ledger, history log, snapshot
/// store, read cache and broadcast handle behind one shared value.
///
/// All methods take `&self`; the engine is meant to live in an `Arc` shared
/// by every request handler.
pub struct Canvas {
    board: BoardStore,
    cooldowns: CooldownLedger,
    bans: BanList,
    history: HistoryLog,
    snapshots: SnapshotStore,
    cache: ReadCache,
    broadcast: BroadcastHandle,
    cooldown_ms: AtomicU64,
    rollback_lock: Mutex<()>,
}

impl Canvas {
    /// Open the engine against `config.data_dir`. The board starts cold;
    /// call [`Canvas::initialize`] to warm-start it from the latest
    /// snapshot (or zero-fill when there is none).
    pub fn open(config: &EngineConfig, broadcast: BroadcastHandle) -> Result<Canvas, CanvasError> {
        fs::create_dir_all(&config.data_dir)?;
        Ok(Canvas {
            board: BoardStore::new(config.board_size, config.palette_size),
            cooldowns: CooldownLedger::new(),
            bans: BanList::new(),
            history: HistoryLog::open(config.data_dir.join(HISTORY_FILE))?,
            snapshots: SnapshotStore::open(config.data_dir.join(SNAPSHOT_DIR))?,
            cache: ReadCache::new(config.board_cache_ttl, config.cell_cache_ttl),
            broadcast,
            cooldown_ms: AtomicU64::new(config.cooldown_ms),
            rollback_lock: Mutex::new(()),
        })
    }

    /// Restore the live board from the most recent snapshot, zero-filling
    /// when none fits. No-op once the board is populated.
    pub fn initialize(&self) -> Result<(), CanvasError> {
        if self.board.is_populated() {
            return Ok(());
        }
        match self.snapshots.latest()? {
            Some((info, bytes)) if bytes.len() == self.board.len() => {
                self.board.replace(&bytes)?;
                tracing::info!(snapshot_id = %info.snapshot_id, "board restored from snapshot");
            }
            Some((info, bytes)) => {
                tracing::warn!(
                    snapshot_id = %info.snapshot_id,
                    "latest snapshot is {} bytes, expected {}; starting from an empty board",
                    bytes.len(),
                    self.board.len()
                );
                self.board.fill(0);
            }
            None => {
                self.board.fill(0);
                tracing::info!("board initialized");
            }
        }
        self.cache.clear();
        Ok(())
    }

    /// Place one pixel as `user_id`, stamped with the current time.
    pub fn place(
        &self,
        x: u32,
        y: u32,
        color_index: u16,
        user_id: &str,
    ) -> Result<PlacementEvent, CanvasError> {
        self.place_at(x, y, color_index, user_id, Utc::now().timestamp_millis())
    }

    /// The placement transaction. Short-circuits in order: bounds/palette
    /// validation, ban check, then the cooldown check and the cell write as
    /// one linearizable commit. History and broadcast run after the commit
    /// and never unwind it.
    pub fn place_at(
        &self,
        x: u32,
        y: u32,
        color_index: u16,
        user_id: &str,
        now_ms: i64,
    ) -> Result<PlacementEvent, CanvasError> {
        let offset = self.board.offset(x, y)?;
        let color = self.board.check_color(color_index)?;

        if self.bans.is_banned(user_id) {
            return Err(CanvasError::Forbidden);
        }

        let window_ms = self.cooldown_ms.load(Ordering::Relaxed);
        self.cooldowns
            .compare_and_commit(user_id, now_ms, window_ms, || self.board.store(offset, color))
            .map_err(|remaining_ms| CanvasError::CooldownActive {
                remaining_secs: remaining_ms.div_ceil(1000),
            })?;

        self.cache.invalidate_board();
        self.cache.invalidate_cell(offset);

        let event = PlacementEvent {
            x,
            y,
            color_index: color,
            user_id: user_id.to_string(),
            timestamp: now_ms,
        };

        // The board is authoritative; a failing audit append must not undo
        // the committed write.
        if let Err(e) = self.history.append(event.clone()) {
            tracing::warn!("error while appending placement history: {e}");
        }
        self.broadcast.publish(vec![event.clone()]);

        Ok(event)
    }

    /// Full board bytes through the tiered chain: cache, then the live
    /// board (refreshing the cache), then the latest snapshot (warm-starting
    /// board and cache), then empty.
    pub fn board_bytes(&self) -> Result<Vec<u8>, CanvasError> {
        if let Some(bytes) = self.cache.board() {
            return Ok(bytes);
        }
        if let Some(bytes) = self.board.bytes() {
            self.cache.put_board(bytes.clone());
            return Ok(bytes);
        }
        if let Some((info, bytes)) = self.snapshots.latest()? {
            if bytes.len() == self.board.len() {
                self.board.replace(&bytes)?;
                self.cache.put_board(bytes.clone());
                return Ok(bytes);
            }
            tracing::warn!(
                snapshot_id = %info.snapshot_id,
                "ignoring size-mismatched snapshot on cold read"
            );
        }
        Ok(Vec::new())
    }

    /// Single-cell view: current color plus the latest placement time there.
    pub fn cell_details(&self, x: u32, y: u32) -> Result<CellInfo, CanvasError> {
        let offset = self.board.offset(x, y)?;
        if let Some(info) = self.cache.cell(offset) {
            return Ok(info);
        }
        if !self.board.is_populated() {
            // same fallback chain as the whole-board read
            self.board_bytes()?;
        }
        let info = CellInfo {
            x,
            y,
            color_index: self.board.cell(x, y)?,
            timestamp: self.history.last_timestamp_at(x, y),
        };
        self.cache.put_cell(offset, info.clone());
        Ok(info)
    }

    /// Admin bulk fill of a rectangle. Emits one synthetic event per
    /// affected cell, recorded to history and queued for the next batch.
    pub fn set_area(
        &self,
        start_x: u32,
        start_y: u32,
        width: u32,
        height: u32,
        color_index: u16,
    ) -> Result<Vec<PlacementEvent>, CanvasError> {
        let affected = self
            .board
            .set_area(start_x, start_y, width, height, color_index)?;
        self.cache.clear();

        let now_ms = Utc::now().timestamp_millis();
        let events: Vec<PlacementEvent> = affected
            .into_iter()
            .map(|(x, y)| PlacementEvent {
                x,
                y,
                color_index: color_index as u8,
                user_id: ADMIN_USER.to_string(),
                timestamp: now_ms,
            })
            .collect();

        if let Err(e) = self.history.append_batch(&events) {
            tracing::warn!("error while appending bulk history: {e}");
        }
        self.broadcast.publish(events.clone());

        Ok(events)
    }

    /// Zero the whole board. Viewers refetch; no per-cell events.
    pub fn reset(&self) {
        self.board.fill(0);
        self.cache.clear();
    }

    /// Randomize every cell within the palette. Viewers refetch.
    pub fn randomize(&self) {
        self.board.randomize();
        self.cache.clear();
    }

    /// Copy the live board into a new snapshot (the periodic durability
    /// bridge; also useful on demand).
    pub fn sync_snapshot(&self) -> Result<SnapshotInfo, CanvasError> {
        let Some(bytes) = self.board.bytes() else {
            return Err(CanvasError::StoreUnavailable(
                "board is not initialized".to_string(),
            ));
        };
        self.snapshots.save(&bytes)
    }

    /// Restore `snapshot_id` as the live board. The current live board is
    /// checkpointed as a new snapshot *before* the swap, so a rollback never
    /// loses state; an unknown id aborts before any mutation. Rollbacks are
    /// serialized among themselves.
    pub fn rollback(&self, snapshot_id: &str) -> Result<SnapshotInfo, CanvasError> {
        let _guard = self.rollback_lock.lock();

        let target = self.snapshots.get(snapshot_id)?;
        if target.len() != self.board.len() {
            return Err(CanvasError::StoreUnavailable(format!(
                "snapshot {snapshot_id} is {} bytes, expected {}",
                target.len(),
                self.board.len()
            )));
        }

        let live = self.board.bytes().unwrap_or_else(|| vec![0; self.board.len()]);
        let checkpoint = self.snapshots.save(&live)?;
        self.board.replace(&target)?;
        self.cache.clear();

        tracing::info!(
            snapshot_id,
            checkpoint_id = %checkpoint.snapshot_id,
            "board rolled back"
        );
        Ok(checkpoint)
    }

    pub fn set_cooldown_ms(&self, cooldown_ms: u64) {
        self.cooldown_ms.store(cooldown_ms, Ordering::Relaxed);
        tracing::info!(cooldown_ms, "cooldown period updated");
    }

    pub fn cooldown_ms(&self) -> u64 {
        self.cooldown_ms.load(Ordering::Relaxed)
    }

    pub fn prune_cooldowns(&self) {
        self.cooldowns
            .prune(Utc::now().timestamp_millis(), self.cooldown_ms());
    }

    pub fn board_size(&self) -> u32 {
        self.board.size()
    }

    pub fn bans(&self) -> &BanList {
        &self.bans
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    pub fn snapshots(&self) -> &SnapshotStore {
        &self.snapshots
    }

    pub fn broadcast(&self) -> &BroadcastHandle {
        &self.broadcast
    }
}

/// Periodically copy the live board into the snapshot store. Failures are
/// logged and retried on the next tick; live traffic never notices.
pub fn spawn_snapshot_sync_process(canvas: Arc<Canvas>, interval: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(interval);
        // the first tick completes immediately; nothing to save yet
        interval.tick().await;
        loop {
            interval.tick().await;
            match canvas.sync_snapshot() {
                Ok(info) => {
                    tracing::debug!(snapshot_id = %info.snapshot_id, "periodic snapshot saved")
                }
                Err(e) => tracing::warn!("error while saving periodic snapshot: {e}"),
            }
            canvas.prune_cooldowns();
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::spawn_batcher_process;
    use msgs::server_msg::ServerMsg;
    use std::path::Path;

    const WINDOW: u64 = 1_000;

    fn test_config(dir: &Path) -> EngineConfig {
        EngineConfig {
            board_size: 4,
            cooldown_ms: WINDOW,
            batch_tick: Duration::from_millis(10),
            data_dir: dir.to_path_buf(),
            ..EngineConfig::default()
        }
    }

    fn open_canvas(dir: &Path) -> Canvas {
        let broadcast = spawn_batcher_process(Duration::from_millis(10));
        let canvas = Canvas::open(&test_config(dir), broadcast).unwrap();
        canvas.initialize().unwrap();
        canvas
    }

    #[tokio::test]
    async fn place_respects_cooldown_and_wins_once() {
        let dir = tempfile::tempdir().unwrap();
        let canvas = open_canvas(dir.path());

        canvas.place_at(0, 0, 5, "u1", 10_000).unwrap();
        assert_eq!(canvas.cell_details(0, 0).unwrap().color_index, 5);

        let err = canvas.place_at(0, 0, 7, "u1", 10_050).unwrap_err();
        match err {
            CanvasError::CooldownActive { remaining_secs } => {
                assert!(remaining_secs >= 1);
                assert!(remaining_secs <= WINDOW.div_ceil(1000));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(canvas.cell_details(0, 0).unwrap().color_index, 5);

        canvas
            .place_at(0, 0, 7, "u1", 10_000 + WINDOW as i64)
            .unwrap();
        assert_eq!(canvas.cell_details(0, 0).unwrap().color_index, 7);
    }

    #[tokio::test]
    async fn banned_user_is_forbidden_regardless_of_cooldown() {
        let dir = tempfile::tempdir().unwrap();
        let canvas = open_canvas(dir.path());

        canvas.bans().ban("u2");
        assert!(matches!(
            canvas.place_at(0, 0, 1, "u2", 10_000),
            Err(CanvasError::Forbidden)
        ));
        assert!(matches!(
            canvas.place_at(1, 1, 1, "u2", 10_000 + WINDOW as i64 * 2),
            Err(CanvasError::Forbidden)
        ));
        assert_eq!(canvas.history().count(), 0);
    }

    #[tokio::test]
    async fn validation_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        let canvas = open_canvas(dir.path());

        assert!(matches!(
            canvas.place_at(4, 0, 1, "u1", 10_000),
            Err(CanvasError::OutOfBounds { .. })
        ));
        assert!(matches!(
            canvas.place_at(0, 0, 99, "u1", 10_000),
            Err(CanvasError::InvalidColor(99))
        ));
        // failed validation must not arm the cooldown
        canvas.place_at(0, 0, 1, "u1", 10_001).unwrap();
    }

    #[tokio::test]
    async fn rollback_is_never_lossy() {
        let dir = tempfile::tempdir().unwrap();
        let canvas = open_canvas(dir.path());

        canvas.place_at(0, 0, 5, "u1", 10_000).unwrap();
        let snap = canvas.sync_snapshot().unwrap();

        canvas.place_at(1, 1, 6, "u2", 11_000).unwrap();
        let live_before = canvas.board_bytes().unwrap();
        let count_before = canvas.snapshots().count().unwrap();

        let checkpoint = canvas.rollback(&snap.snapshot_id).unwrap();

        assert_eq!(canvas.snapshots().count().unwrap(), count_before + 1);
        let newest = canvas.snapshots().list().unwrap().pop().unwrap();
        assert_eq!(newest.snapshot_id, checkpoint.snapshot_id);
        assert_eq!(
            canvas.snapshots().get(&checkpoint.snapshot_id).unwrap(),
            live_before
        );
        assert_eq!(
            canvas.board_bytes().unwrap(),
            canvas.snapshots().get(&snap.snapshot_id).unwrap()
        );
    }

    #[tokio::test]
    async fn rollback_unknown_id_mutates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let canvas = open_canvas(dir.path());

        canvas.place_at(2, 2, 9, "u1", 10_000).unwrap();
        let before = canvas.board_bytes().unwrap();
        let count_before = canvas.snapshots().count().unwrap();

        assert!(matches!(
            canvas.rollback("00000000-0000-7000-8000-000000000000"),
            Err(CanvasError::NotFound(_))
        ));
        assert_eq!(canvas.board_bytes().unwrap(), before);
        assert_eq!(canvas.snapshots().count().unwrap(), count_before);
    }

    #[tokio::test]
    async fn bulk_area_set_emits_one_event_per_cell() {
        let dir = tempfile::tempdir().unwrap();
        let canvas = open_canvas(dir.path());
        let mut rx = canvas.broadcast().subscribe();

        let events = canvas.set_area(1, 1, 2, 2, 3).unwrap();
        assert_eq!(events.len(), 4);
        for (x, y) in [(1, 1), (1, 2), (2, 1), (2, 2)] {
            assert_eq!(canvas.cell_details(x, y).unwrap().color_index, 3);
        }
        assert_eq!(canvas.history().count(), 4);

        let json = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("frame before timeout")
            .unwrap();
        match serde_json::from_str::<ServerMsg>(&json).unwrap() {
            ServerMsg::PlacementBatch { events } => {
                assert_eq!(events.len(), 4);
                assert!(events.iter().all(|e| e.user_id == ADMIN_USER));
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[tokio::test]
    async fn warm_start_restores_latest_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let bytes_before = {
            let canvas = open_canvas(dir.path());
            canvas.place_at(3, 0, 8, "u1", 10_000).unwrap();
            canvas.sync_snapshot().unwrap();
            canvas.board_bytes().unwrap()
        };

        let canvas = open_canvas(dir.path());
        assert_eq!(canvas.board_bytes().unwrap(), bytes_before);
    }

    #[tokio::test]
    async fn cold_read_falls_through_to_snapshot_tier() {
        let dir = tempfile::tempdir().unwrap();
        let bytes_before = {
            let canvas = open_canvas(dir.path());
            canvas.place_at(1, 3, 4, "u1", 10_000).unwrap();
            canvas.sync_snapshot().unwrap();
            canvas.board_bytes().unwrap()
        };

        // cold: opened but never initialized
        let broadcast = spawn_batcher_process(Duration::from_millis(10));
        let canvas = Canvas::open(&test_config(dir.path()), broadcast).unwrap();
        assert_eq!(canvas.board_bytes().unwrap(), bytes_before);
        // the hit warm-started the live board
        assert_eq!(canvas.cell_details(1, 3).unwrap().color_index, 4);
    }

    #[tokio::test]
    async fn reads_within_ttl_are_stable_and_writes_invalidate() {
        let dir = tempfile::tempdir().unwrap();
        let canvas = open_canvas(dir.path());

        canvas.place_at(0, 0, 2, "u1", 10_000).unwrap();
        let first = canvas.board_bytes().unwrap();
        assert_eq!(canvas.board_bytes().unwrap(), first);

        canvas.place_at(1, 0, 3, "u2", 10_001).unwrap();
        let second = canvas.board_bytes().unwrap();
        assert_ne!(second, first);
        assert_eq!(second[1], 3);
    }

    #[tokio::test]
    async fn cooldown_window_update_takes_effect_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let canvas = open_canvas(dir.path());

        canvas.place_at(0, 0, 1, "u1", 10_000).unwrap();
        assert!(canvas.place_at(0, 0, 2, "u1", 10_001).is_err());

        canvas.set_cooldown_ms(0);
        canvas.place_at(0, 0, 2, "u1", 10_002).unwrap();
        assert_eq!(canvas.cooldown_ms(), 0);
    }

    #[tokio::test]
    async fn empty_store_reads_empty_board() {
        let dir = tempfile::tempdir().unwrap();
        let broadcast = spawn_batcher_process(Duration::from_millis(10));
        let canvas = Canvas::open(&test_config(dir.path()), broadcast).unwrap();
        assert!(canvas.board_bytes().unwrap().is_empty());
    }
}
