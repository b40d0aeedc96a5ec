use std::collections::HashSet;

use parking_lot::RwLock;

/// The ban predicate consulted by the placement transaction. Management of
/// the list itself lives outside the engine; only membership matters here.
#[derive(Default)]
pub struct BanList {
    banned: RwLock<HashSet<String>>,
}

impl BanList {
    pub fn new() -> BanList {
        BanList::default()
    }

    pub fn is_banned(&self, user: &str) -> bool {
        self.banned.read().contains(user)
    }

    pub fn ban(&self, user: &str) -> bool {
        self.banned.write().insert(user.to_string())
    }

    pub fn unban(&self, user: &str) -> bool {
        self.banned.write().remove(user)
    }

    pub fn all(&self) -> Vec<String> {
        let mut users: Vec<String> = self.banned.read().iter().cloned().collect();
        users.sort();
        users
    }
}
