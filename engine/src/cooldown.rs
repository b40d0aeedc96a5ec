use std::collections::HashMap;

use parking_lot::Mutex;

/// Per-user last-placement timestamps (unix ms).
///
/// Entries older than the cooldown window are as good as absent (both read
/// as 0), so expiry is lazy: stale entries are dropped when touched, and
/// [`CooldownLedger::prune`] sweeps the rest on the snapshot tick.
pub struct CooldownLedger {
    entries: Mutex<HashMap<String, i64>>,
}

impl CooldownLedger {
    pub fn new() -> CooldownLedger {
        CooldownLedger {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Last accepted placement for `user`, 0 when absent or expired.
    pub fn last_placement(&self, user: &str, now_ms: i64, window_ms: u64) -> i64 {
        let mut entries = self.entries.lock();
        match entries.get(user) {
            Some(&last) if now_ms - last < window_ms as i64 => last,
            Some(_) => {
                entries.remove(user);
                0
            }
            None => 0,
        }
    }

    /// Unconditionally stamp `user`'s last placement. Prefer
    /// [`CooldownLedger::compare_and_commit`] when the stamp must be paired
    /// with a write.
    pub fn record_placement(&self, user: &str, now_ms: i64) {
        self.entries.lock().insert(user.to_string(), now_ms);
    }

    /// The compare-timestamp-and-write primitive: one lock acquisition covers
    /// the cooldown read, the conditional timestamp write and the `write`
    /// closure (the board commit). Two concurrent requests from the same user
    /// inside one window can therefore admit at most one committed write.
    ///
    /// Returns the remaining wait in milliseconds when the window is still
    /// open.
    pub fn compare_and_commit(
        &self,
        user: &str,
        now_ms: i64,
        window_ms: u64,
        write: impl FnOnce(),
    ) -> Result<(), u64> {
        let mut entries = self.entries.lock();
        if let Some(&last) = entries.get(user) {
            let elapsed = now_ms - last;
            if last > 0 && elapsed < window_ms as i64 {
                return Err((window_ms as i64 - elapsed) as u64);
            }
        }
        entries.insert(user.to_string(), now_ms);
        write();
        Ok(())
    }

    /// Drop every expired entry.
    pub fn prune(&self, now_ms: i64, window_ms: u64) {
        self.entries
            .lock()
            .retain(|_, last| now_ms - *last < window_ms as i64);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Default for CooldownLedger {
    fn default() -> CooldownLedger {
        CooldownLedger::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: u64 = 1_000;

    #[test]
    fn never_placed_reads_zero() {
        let ledger = CooldownLedger::new();
        assert_eq!(ledger.last_placement("u1", 50_000, WINDOW), 0);
    }

    #[test]
    fn recorded_placement_is_visible_within_window() {
        let ledger = CooldownLedger::new();
        ledger.record_placement("u1", 10_000);
        assert_eq!(ledger.last_placement("u1", 10_500, WINDOW), 10_000);
    }

    #[test]
    fn second_commit_within_window_is_rejected() {
        let ledger = CooldownLedger::new();
        let mut writes = 0;
        ledger
            .compare_and_commit("u1", 10_000, WINDOW, || writes += 1)
            .unwrap();
        let remaining = ledger
            .compare_and_commit("u1", 10_400, WINDOW, || writes += 1)
            .unwrap_err();
        assert_eq!(remaining, 600);
        assert!(remaining <= WINDOW);
        assert_eq!(writes, 1);
    }

    #[test]
    fn commit_allowed_after_window() {
        let ledger = CooldownLedger::new();
        ledger.compare_and_commit("u1", 10_000, WINDOW, || {}).unwrap();
        ledger
            .compare_and_commit("u1", 10_000 + WINDOW as i64, WINDOW, || {})
            .unwrap();
    }

    #[test]
    fn users_do_not_share_windows() {
        let ledger = CooldownLedger::new();
        ledger.compare_and_commit("u1", 10_000, WINDOW, || {}).unwrap();
        ledger.compare_and_commit("u2", 10_001, WINDOW, || {}).unwrap();
    }

    #[test]
    fn expired_entries_are_dropped_on_read() {
        let ledger = CooldownLedger::new();
        ledger.compare_and_commit("u1", 10_000, WINDOW, || {}).unwrap();
        assert_eq!(ledger.last_placement("u1", 10_000 + WINDOW as i64, WINDOW), 0);
        assert!(ledger.is_empty());
    }

    #[test]
    fn prune_sweeps_expired_entries() {
        let ledger = CooldownLedger::new();
        ledger.compare_and_commit("u1", 10_000, WINDOW, || {}).unwrap();
        ledger.compare_and_commit("u2", 10_900, WINDOW, || {}).unwrap();
        ledger.prune(11_100, WINDOW);
        assert_eq!(ledger.len(), 1);
        assert_ne!(ledger.last_placement("u2", 11_100, WINDOW), 0);
    }
}
