//! Repository: the long-term memory collaborator.
//!
//! Capabilities that need durable memory (dump, wipe, diagnostics) and the
//! memory layer's mirror writes go through [`Repository`].  The storage
//! format behind it belongs to the implementation; [`InMemoryRepository`]
//! is the process-local backend used by default and in tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use chrono::Utc;

use crate::error::GatewayError;
use crate::message::{Role, StoredMessage};

/// Partition of a user's long-term memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    User,
    Assistant,
}

impl Scope {
    pub fn role(&self) -> Role {
        match self {
            Scope::User => Role::User,
            Scope::Assistant => Role::Assistant,
        }
    }
}

pub trait Repository: Send + Sync {
    fn remember(&self, scope: Scope, user_id: &str, message: &str) -> Result<(), GatewayError>;

    /// Everything remembered under `scope` for `user_id`, oldest first.
    fn recall(&self, scope: Scope, user_id: &str) -> Result<Vec<StoredMessage>, GatewayError>;

    /// Drop everything under `scope` for `user_id`; returns how many entries
    /// were removed.
    fn forget(&self, scope: Scope, user_id: &str) -> Result<usize, GatewayError>;
}

/// Default number of entries kept per scope and user.
pub const DEFAULT_REPOSITORY_CAP: usize = 1000;

/// Process-local repository holding at most `cap` entries per scope and
/// user; the oldest entry goes first.  Data is lost on exit.
pub struct InMemoryRepository {
    cap: usize,
    data: Mutex<HashMap<(Scope, String), VecDeque<StoredMessage>>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::with_cap(DEFAULT_REPOSITORY_CAP)
    }

    pub fn with_cap(cap: usize) -> Self {
        Self {
            cap: cap.max(1),
            data: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl Repository for InMemoryRepository {
    fn remember(&self, scope: Scope, user_id: &str, message: &str) -> Result<(), GatewayError> {
        let mut data = self.data.lock().map_err(|_| poisoned())?;
        let entries = data.entry((scope, user_id.to_string())).or_default();
        entries.push_back(StoredMessage {
            role: scope.role(),
            message: message.to_string(),
            timestamp: Utc::now().timestamp_millis(),
        });
        while entries.len() > self.cap {
            entries.pop_front();
        }
        Ok(())
    }

    fn recall(&self, scope: Scope, user_id: &str) -> Result<Vec<StoredMessage>, GatewayError> {
        let data = self.data.lock().map_err(|_| poisoned())?;
        Ok(data
            .get(&(scope, user_id.to_string()))
            .map(|entries| entries.iter().cloned().collect())
            .unwrap_or_default())
    }

    fn forget(&self, scope: Scope, user_id: &str) -> Result<usize, GatewayError> {
        let mut data = self.data.lock().map_err(|_| poisoned())?;
        Ok(data
            .remove(&(scope, user_id.to_string()))
            .map(|v| v.len())
            .unwrap_or(0))
    }
}

fn poisoned() -> GatewayError {
    GatewayError::StoreUnavailable("repository lock poisoned".into())
}
