use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use msgs::dto::HistoryPage;
use msgs::event::PlacementEvent;
use parking_lot::RwLock;

/// Append-only record of every placement.
///
/// The in-memory sequence (insertion order = commit order) is the query
/// source; every append is also written as one JSON line to a sidecar file
/// that is replayed at startup. The board commit never waits on the sidecar:
/// a disk failure here surfaces as an error the caller may log and ignore,
/// the audit trail legitimately lags the board under store outages.
pub struct HistoryLog {
    path: Option<PathBuf>,
    events: RwLock<Vec<PlacementEvent>>,
}

impl HistoryLog {
    pub fn in_memory() -> HistoryLog {
        HistoryLog {
            path: None,
            events: RwLock::new(Vec::new()),
        }
    }

    /// Open the log at `path`, replaying any existing lines. Lines that fail
    /// to parse are skipped with a warning rather than poisoning the log.
    pub fn open(path: PathBuf) -> Result<HistoryLog, std::io::Error> {
        let mut events = Vec::new();
        match fs::read_to_string(&path) {
            Ok(contents) => {
                for line in contents.lines() {
                    match serde_json::from_str::<PlacementEvent>(line) {
                        Ok(event) => events.push(event),
                        Err(e) => tracing::warn!("skipping bad history line: {e}"),
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        Ok(HistoryLog {
            path: Some(path),
            events: RwLock::new(events),
        })
    }

    pub fn append(&self, event: PlacementEvent) -> Result<(), std::io::Error> {
        self.append_batch(std::slice::from_ref(&event))
    }

    /// Append several events at once (admin bulk mutations). The in-memory
    /// sequence is extended even when the sidecar write fails.
    pub fn append_batch(&self, events: &[PlacementEvent]) -> Result<(), std::io::Error> {
        self.events.write().extend_from_slice(events);
        let Some(path) = &self.path else { return Ok(()) };
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut lines = String::new();
        for event in events {
            match serde_json::to_string(event) {
                Ok(line) => {
                    lines.push_str(&line);
                    lines.push('\n');
                }
                Err(e) => tracing::warn!("skipping unencodable history event: {e}"),
            }
        }
        file.write_all(lines.as_bytes())
    }

    pub fn count(&self) -> usize {
        self.events.read().len()
    }

    /// Placements at one cell, most recent first. Timestamp ties break by
    /// userId ascending, then by insertion order (latest insert first).
    /// `cursor` is the opaque offset returned by a previous page.
    pub fn query_by_cell(
        &self,
        x: u32,
        y: u32,
        limit: usize,
        user: Option<&str>,
        cursor: Option<&str>,
    ) -> HistoryPage {
        let events = self.events.read();
        let mut rows: Vec<(usize, &PlacementEvent)> = events
            .iter()
            .enumerate()
            .filter(|(_, e)| e.x == x && e.y == y && user.map_or(true, |u| e.user_id == u))
            .collect();
        rows.sort_by(|(a_seq, a), (b_seq, b)| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| a.user_id.cmp(&b.user_id))
                .then(b_seq.cmp(a_seq))
        });

        let start = cursor.and_then(|c| c.parse::<usize>().ok()).unwrap_or(0);
        let page: Vec<PlacementEvent> = rows
            .iter()
            .skip(start)
            .take(limit)
            .map(|(_, e)| (*e).clone())
            .collect();
        let consumed = start + page.len();
        HistoryPage {
            events: page,
            next_cursor: (consumed < rows.len()).then(|| consumed.to_string()),
        }
    }

    /// Most recent placements across the whole board.
    pub fn query_all(&self, limit: usize) -> Vec<PlacementEvent> {
        let events = self.events.read();
        events.iter().rev().take(limit).cloned().collect()
    }

    /// Every placement by one user, most recent first.
    pub fn query_by_user(&self, user: &str) -> Vec<PlacementEvent> {
        let events = self.events.read();
        events
            .iter()
            .rev()
            .filter(|e| e.user_id == user)
            .cloned()
            .collect()
    }

    /// Commit time of the latest placement at a cell, 0 when never placed.
    pub fn last_timestamp_at(&self, x: u32, y: u32) -> i64 {
        let events = self.events.read();
        events
            .iter()
            .rev()
            .find(|e| e.x == x && e.y == y)
            .map(|e| e.timestamp)
            .unwrap_or(0)
    }
}
