//! Store trait and the bounded per-user history store.
//!
//! [`BoundedStore`] keeps the most recent `cap` turns for every user in an
//! append-only [`VecDeque`].  Eviction runs inside `append`, under the same
//! lock as the push, so no reader ever sees more than `cap` entries or a
//! half-trimmed sequence.
//!
//! Entries are never keyed by timestamp: two appends in the same millisecond
//! both survive, in append order.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock};

use chrono::Utc;

use crate::error::GatewayError;
use crate::message::{Role, StoredMessage};

/// Default number of turns retained per user.
pub const DEFAULT_HISTORY_CAP: usize = 20;

/// Pluggable recent-history store.
///
/// Operations are synchronous and hold locks only for in-memory work, so
/// they are safe to call from async stages without `spawn_blocking`.
pub trait Store: Send + Sync {
    /// Short type name used in log messages (e.g. `"bounded"`).
    fn store_type(&self) -> &str;

    /// Record `message` for `user_id`, stamped with the current time.
    fn append(&self, user_id: &str, message: &str, role: Role) -> Result<(), GatewayError>;

    /// Full retained history for `user_id`, oldest first.  Unknown users
    /// yield an empty list.
    fn read(&self, user_id: &str) -> Result<Vec<StoredMessage>, GatewayError>;

    /// Number of entries currently held for `user_id`.
    fn len(&self, user_id: &str) -> Result<usize, GatewayError> {
        Ok(self.read(user_id)?.len())
    }
}

type History = Arc<Mutex<VecDeque<StoredMessage>>>;

/// Source of epoch-millisecond timestamps.
pub type Clock = fn() -> i64;

fn wall_clock() -> i64 {
    Utc::now().timestamp_millis()
}

/// Fixed-capacity, per-user ordered log of recent messages.
///
/// The outer map lock is held only long enough to find or create a user's
/// history; each user's sequence then has its own mutex, so traffic from
/// different users does not contend.
pub struct BoundedStore {
    cap: usize,
    clock: Clock,
    users: RwLock<HashMap<String, History>>,
}

impl BoundedStore {
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            clock: wall_clock,
            users: RwLock::new(HashMap::new()),
        }
    }

    /// Replace the wall clock used to stamp appends.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    fn history(&self, user_id: &str) -> Result<Option<History>, GatewayError> {
        let users = self.users.read().map_err(|_| poisoned())?;
        Ok(users.get(user_id).cloned())
    }

    fn history_or_insert(&self, user_id: &str) -> Result<History, GatewayError> {
        if let Some(history) = self.history(user_id)? {
            return Ok(history);
        }
        let mut users = self.users.write().map_err(|_| poisoned())?;
        Ok(users.entry(user_id.to_string()).or_default().clone())
    }
}

impl Default for BoundedStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAP)
    }
}

impl Store for BoundedStore {
    fn store_type(&self) -> &str {
        "bounded"
    }

    fn append(&self, user_id: &str, message: &str, role: Role) -> Result<(), GatewayError> {
        let history = self.history_or_insert(user_id)?;
        let mut entries = history.lock().map_err(|_| poisoned())?;

        // Keep the sequence non-decreasing even if the wall clock steps back.
        let now = (self.clock)();
        let timestamp = entries.back().map_or(now, |last| now.max(last.timestamp));

        entries.push_back(StoredMessage {
            role,
            message: message.to_string(),
            timestamp,
        });
        while entries.len() > self.cap {
            entries.pop_front();
        }
        Ok(())
    }

    fn read(&self, user_id: &str) -> Result<Vec<StoredMessage>, GatewayError> {
        match self.history(user_id)? {
            None => Ok(Vec::new()),
            Some(history) => {
                let entries = history.lock().map_err(|_| poisoned())?;
                Ok(entries.iter().cloned().collect())
            }
        }
    }

    fn len(&self, user_id: &str) -> Result<usize, GatewayError> {
        match self.history(user_id)? {
            None => Ok(0),
            Some(history) => Ok(history.lock().map_err(|_| poisoned())?.len()),
        }
    }
}

fn poisoned() -> GatewayError {
    GatewayError::StoreUnavailable("history lock poisoned".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};

    const USER: &str = "test_user";

    fn fill(store: &BoundedStore, user: &str, n: usize) {
        for i in 0..n {
            store
                .append(user, &format!("test message {i}"), Role::User)
                .unwrap();
        }
    }

    #[test]
    fn only_returns_last_20_when_more_than_20() {
        let store = BoundedStore::default();
        fill(&store, USER, 100);

        let messages = store.read(USER).unwrap();
        assert_eq!(messages.len(), 20);
        assert_eq!(messages[0].message, "test message 80");
        assert_eq!(messages[19].message, "test message 99");
    }

    #[test]
    fn returns_all_when_fewer_than_20() {
        let store = BoundedStore::default();
        fill(&store, USER, 10);

        let messages = store.read(USER).unwrap();
        assert_eq!(messages.len(), 10);
        for (i, m) in messages.iter().enumerate() {
            assert_eq!(m.message, format!("test message {i}"));
        }
    }

    #[test]
    fn eviction_happens_on_write() {
        let store = BoundedStore::default();
        fill(&store, USER, 20);
        assert_eq!(store.len(USER).unwrap(), 20);

        store.append(USER, "twenty-first", Role::User).unwrap();
        // Checked without a read in between.
        assert_eq!(store.len(USER).unwrap(), 20);
    }

    #[test]
    fn same_millisecond_appends_are_all_kept() {
        // No sleeping between appends: most land in the same millisecond.
        let store = BoundedStore::default();
        fill(&store, USER, 5);

        let messages = store.read(USER).unwrap();
        assert_eq!(messages.len(), 5);
        assert!(
            messages
                .windows(2)
                .all(|w| w[0].timestamp <= w[1].timestamp)
        );
    }

    #[test]
    fn clock_stepping_back_keeps_timestamps_ascending() {
        static NOW: AtomicI64 = AtomicI64::new(0);
        fn fake_clock() -> i64 {
            NOW.load(Ordering::SeqCst)
        }

        let store = BoundedStore::default().with_clock(fake_clock);
        for now in [1_000, 2_000, 1_500, 900, 2_500] {
            NOW.store(now, Ordering::SeqCst);
            store.append(USER, &format!("at {now}"), Role::User).unwrap();
        }

        let stamps: Vec<i64> = store.read(USER).unwrap().iter().map(|m| m.timestamp).collect();
        assert_eq!(stamps, [1_000, 2_000, 2_000, 2_000, 2_500]);
    }

    #[test]
    fn unknown_user_reads_empty() {
        let store = BoundedStore::default();
        assert!(store.read("nobody").unwrap().is_empty());
        assert_eq!(store.len("nobody").unwrap(), 0);
    }

    #[test]
    fn users_are_isolated() {
        let store = BoundedStore::default();
        fill(&store, "user_a", 30);
        fill(&store, "user_b", 3);

        let b = store.read("user_b").unwrap();
        assert_eq!(b.len(), 3);
        assert!(b.iter().all(|m| m.message.starts_with("test message")));
        assert_eq!(b[0].message, "test message 0");
        assert_eq!(store.len("user_a").unwrap(), 20);
    }

    #[test]
    fn custom_cap_is_honoured() {
        let store = BoundedStore::new(3);
        fill(&store, USER, 5);
        let messages: Vec<String> = store
            .read(USER)
            .unwrap()
            .into_iter()
            .map(|m| m.message)
            .collect();
        assert_eq!(messages, ["test message 2", "test message 3", "test message 4"]);
    }

    #[test]
    fn role_is_recorded() {
        let store = BoundedStore::default();
        store.append(USER, "hi", Role::User).unwrap();
        store.append(USER, "hello", Role::Assistant).unwrap();
        let roles: Vec<Role> = store.read(USER).unwrap().iter().map(|m| m.role).collect();
        assert_eq!(roles, [Role::User, Role::Assistant]);
    }

    #[test]
    fn concurrent_appends_never_exceed_cap() {
        let store = Arc::new(BoundedStore::default());
        let writers: Vec<_> = (0..8)
            .map(|t| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        store.append(USER, &format!("t{t}-{i}"), Role::User).unwrap();
                        assert!(store.read(USER).unwrap().len() <= 20);
                    }
                })
            })
            .collect();
        for w in writers {
            w.join().unwrap();
        }

        let messages = store.read(USER).unwrap();
        assert_eq!(messages.len(), 20);
        assert!(
            messages
                .windows(2)
                .all(|w| w[0].timestamp <= w[1].timestamp)
        );
    }
}
