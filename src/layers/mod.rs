//! Pipeline layers: the chain every request travels through.
//!
//! ```text
//! SecurityLayer ──▶ MemoryLayer ──▶ CapabilitySelector ──▶ Capability
//!       ◀──────────────── Response (unchanged) ◀──────────────┘
//! ```
//!
//! Each stage implements [`Layer`].  A stage either answers the request
//! itself or does its local side effects and forwards to the stage it owns.
//! The chain is assembled once at startup by
//! [`Gateway::build`](crate::gateway::Gateway::build) and never changes.

pub mod memory;
pub mod security;
pub mod selector;

pub use memory::MemoryLayer;
pub use security::SecurityLayer;
pub use selector::CapabilitySelector;

use std::future::Future;
use std::pin::Pin;

use crate::error::GatewayError;
use crate::message::{Request, Response};

/// A boxed, borrowed future returned by [`Layer::pass_through`].
pub type LayerFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Response, GatewayError>> + Send + 'a>>;

/// One stage of the pipeline.
///
/// Implementations must be `Send + Sync`: the gateway is shared across all
/// concurrently running channel tasks, each carrying its own [`Request`].
pub trait Layer: Send + Sync {
    /// Stage name for log messages.
    fn name(&self) -> &str;

    /// Handle `request`, forwarding to the next stage if appropriate.
    fn pass_through<'a>(&'a self, request: &'a Request) -> LayerFuture<'a>;
}
