use std::fs;
use std::path::PathBuf;

use msgs::event::SnapshotInfo;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::error::CanvasError;

const SNAPSHOT_EXT: &str = "bin";

/// Durable, append-only board captures: one `<uuid>.bin` file per snapshot.
///
/// Ids are UUIDv7, so they are unique, sort in creation order, and carry
/// their own timestamp; the listing needs nothing but the directory entries.
/// Snapshots are never overwritten or deleted here.
pub struct SnapshotStore {
    dir: PathBuf,
    last_id: Mutex<Option<Uuid>>,
}

impl SnapshotStore {
    pub fn open(dir: PathBuf) -> Result<SnapshotStore, CanvasError> {
        fs::create_dir_all(&dir)?;
        Ok(SnapshotStore {
            dir,
            last_id: Mutex::new(None),
        })
    }

    // Ids must stay strictly increasing even when two saves land in the
    // same millisecond.
    fn next_id(&self) -> Uuid {
        let mut last = self.last_id.lock();
        loop {
            let id = Uuid::now_v7();
            if last.map_or(true, |l| id > l) {
                *last = Some(id);
                return id;
            }
        }
    }

    /// Store a full board copy, returning the new snapshot's identity.
    pub fn save(&self, board: &[u8]) -> Result<SnapshotInfo, CanvasError> {
        let id = self.next_id();
        fs::write(self.dir.join(format!("{id}.{SNAPSHOT_EXT}")), board)?;
        Ok(SnapshotInfo {
            snapshot_id: id.to_string(),
            timestamp: uuid_timestamp_ms(&id),
        })
    }

    /// All snapshots, ascending (oldest first).
    pub fn list(&self) -> Result<Vec<SnapshotInfo>, CanvasError> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(SNAPSHOT_EXT) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if let Ok(id) = stem.parse::<Uuid>() {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids
            .into_iter()
            .map(|id| SnapshotInfo {
                snapshot_id: id.to_string(),
                timestamp: uuid_timestamp_ms(&id),
            })
            .collect())
    }

    pub fn count(&self) -> Result<usize, CanvasError> {
        Ok(self.list()?.len())
    }

    pub fn get(&self, snapshot_id: &str) -> Result<Vec<u8>, CanvasError> {
        let id: Uuid = snapshot_id
            .parse()
            .map_err(|_| CanvasError::NotFound(snapshot_id.to_string()))?;
        match fs::read(self.dir.join(format!("{id}.{SNAPSHOT_EXT}"))) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(CanvasError::NotFound(snapshot_id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// The most recent snapshot, if any.
    pub fn latest(&self) -> Result<Option<(SnapshotInfo, Vec<u8>)>, CanvasError> {
        let Some(info) = self.list()?.pop() else {
            return Ok(None);
        };
        let bytes = self.get(&info.snapshot_id)?;
        Ok(Some((info, bytes)))
    }
}

fn uuid_timestamp_ms(id: &Uuid) -> i64 {
    id.get_timestamp()
        .map(|ts| {
            let (secs, nanos) = ts.to_unix();
            secs as i64 * 1000 + (nanos / 1_000_000) as i64
        })
        .unwrap_or(0)
}
