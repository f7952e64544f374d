//! Memory: bounded recent history plus the long-term repository seam.
//!
//! ```text
//! MemoryLayer ──owns──▶ Arc<dyn Store>        (recent turns, capped per user)
//!      │
//!      └──mirrors──▶ Arc<dyn Repository>      (long-term, shared with capabilities)
//! ```

pub mod repo;
pub mod store;

pub use repo::{DEFAULT_REPOSITORY_CAP, InMemoryRepository, Repository, Scope};
pub use store::{BoundedStore, DEFAULT_HISTORY_CAP, Store};
