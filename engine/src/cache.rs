use std::collections::HashMap;
use std::time::{Duration, Instant};

use msgs::event::CellInfo;
use parking_lot::Mutex;

struct Entry<T> {
    value: T,
    expires_at: Instant,
}

impl<T: Clone> Entry<T> {
    fn new(value: T, ttl: Duration) -> Entry<T> {
        Entry {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    fn live(&self) -> Option<T> {
        (Instant::now() < self.expires_at).then(|| self.value.clone())
    }
}

/// Short-TTL materialized views of the board and of single cells, refreshed
/// on miss and invalidated explicitly by every mutation that touches them.
/// The whole-board and per-cell entries expire independently.
pub struct ReadCache {
    board: Mutex<Option<Entry<Vec<u8>>>>,
    cells: Mutex<HashMap<usize, Entry<CellInfo>>>,
    board_ttl: Duration,
    cell_ttl: Duration,
}

impl ReadCache {
    pub fn new(board_ttl: Duration, cell_ttl: Duration) -> ReadCache {
        ReadCache {
            board: Mutex::new(None),
            cells: Mutex::new(HashMap::new()),
            board_ttl,
            cell_ttl,
        }
    }

    pub fn board(&self) -> Option<Vec<u8>> {
        let mut slot = self.board.lock();
        match slot.as_ref().and_then(Entry::live) {
            Some(bytes) => Some(bytes),
            None => {
                *slot = None;
                None
            }
        }
    }

    pub fn put_board(&self, bytes: Vec<u8>) {
        *self.board.lock() = Some(Entry::new(bytes, self.board_ttl));
    }

    pub fn cell(&self, offset: usize) -> Option<CellInfo> {
        let mut cells = self.cells.lock();
        match cells.get(&offset).and_then(Entry::live) {
            Some(info) => Some(info),
            None => {
                cells.remove(&offset);
                None
            }
        }
    }

    pub fn put_cell(&self, offset: usize, info: CellInfo) {
        self.cells
            .lock()
            .insert(offset, Entry::new(info, self.cell_ttl));
    }

    pub fn invalidate_board(&self) {
        *self.board.lock() = None;
    }

    pub fn invalidate_cell(&self, offset: usize) {
        self.cells.lock().remove(&offset);
    }

    /// Drop everything (admin bulk mutations, rollback).
    pub fn clear(&self) {
        *self.board.lock() = None;
        self.cells.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(color: u8) -> CellInfo {
        CellInfo {
            x: 0,
            y: 0,
            color_index: color,
            timestamp: 1,
        }
    }

    #[test]
    fn board_hits_within_ttl() {
        let cache = ReadCache::new(Duration::from_secs(60), Duration::from_secs(60));
        assert!(cache.board().is_none());
        cache.put_board(vec![1, 2, 3]);
        assert_eq!(cache.board().unwrap(), vec![1, 2, 3]);
        assert_eq!(cache.board().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn entries_expire() {
        let cache = ReadCache::new(Duration::from_millis(0), Duration::from_millis(0));
        cache.put_board(vec![1]);
        cache.put_cell(0, info(1));
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.board().is_none());
        assert!(cache.cell(0).is_none());
    }

    #[test]
    fn invalidation_is_per_cell() {
        let cache = ReadCache::new(Duration::from_secs(60), Duration::from_secs(60));
        cache.put_cell(0, info(1));
        cache.put_cell(1, info(2));
        cache.invalidate_cell(0);
        assert!(cache.cell(0).is_none());
        assert_eq!(cache.cell(1).unwrap().color_index, 2);
    }

    #[test]
    fn clear_drops_both_tiers() {
        let cache = ReadCache::new(Duration::from_secs(60), Duration::from_secs(60));
        cache.put_board(vec![1]);
        cache.put_cell(0, info(1));
        cache.clear();
        assert!(cache.board().is_none());
        assert!(cache.cell(0).is_none());
    }
}
