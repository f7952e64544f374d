//! Capabilities: pluggable handlers scored against each request.
//!
//! [`Capability`] is the extension trait: a capability reports how well it
//! fits a request via [`Capability::check`] and, if selected, does the work
//! in [`Capability::execute`].  The
//! [`CapabilitySelector`](crate::layers::selector::CapabilitySelector) owns
//! the registry and picks exactly one per request.
//!
//! Registration order is priority order: on equal scores the capability
//! registered first wins.  [`default_registry`] lists the built-ins with the
//! narrow command matchers first and the unconditional completion fallback
//! last.

pub mod completion;
pub mod diagnostic;
pub mod memory_dump;
pub mod memory_wipe;

pub use completion::CompletionCapability;
pub use diagnostic::DiagnosticCapability;
pub use memory_dump::MemoryDumpCapability;
pub use memory_wipe::MemoryWipeCapability;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::config::CapabilitiesConfig;
use crate::error::GatewayError;
use crate::llm::LlmProvider;
use crate::memory::Repository;
use crate::message::{Request, Response};

/// Unconditional match.
pub const MATCH: f32 = 1.0;
/// Cannot handle.
pub const NO_MATCH: f32 = 0.0;

/// A boxed, borrowed future returned by [`Capability::execute`].
pub type CapabilityFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Response, GatewayError>> + Send + 'a>>;

/// A unit of work the gateway can route a request to.
pub trait Capability: Send + Sync {
    /// Stable identifier used in logs and error messages.
    fn id(&self) -> &str;

    /// Affinity for `request` in `[0, 1]`.
    ///
    /// Must be pure and deterministic: the selector may call it on every
    /// request and expects the same answer for the same input.
    fn check(&self, request: &Request) -> f32;

    /// Do the work.  Failures surface as [`GatewayError::Execution`] (or
    /// [`GatewayError::StoreUnavailable`] for memory reads) and are never
    /// retried.
    fn execute<'a>(&'a self, request: &'a Request) -> CapabilityFuture<'a>;
}

/// Built-in capabilities in priority order.
pub fn default_registry(
    config: &CapabilitiesConfig,
    provider: LlmProvider,
    repo: Arc<dyn Repository>,
) -> Vec<Box<dyn Capability>> {
    vec![
        Box::new(MemoryDumpCapability::new(repo.clone())),
        Box::new(MemoryWipeCapability::new(repo.clone())),
        Box::new(DiagnosticCapability::new(repo)),
        Box::new(CompletionCapability::new(provider, config.system_prompt.clone())),
    ]
}

/// `true` when `text` is one of `commands`, ignoring case and surrounding
/// whitespace.
pub(crate) fn is_command(text: &str, commands: &[&str]) -> bool {
    let text = text.trim();
    commands.iter().any(|c| text.eq_ignore_ascii_case(c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::providers::dummy::DummyProvider;
    use crate::memory::InMemoryRepository;

    #[test]
    fn command_matching_ignores_case_and_whitespace() {
        assert!(is_command("  Memory Dump ", &["memory dump"]));
        assert!(!is_command("memory dumps", &["memory dump"]));
        assert!(is_command("PING", &["ping", "test memory"]));
    }

    #[test]
    fn default_registry_ends_with_fallback() {
        let registry = default_registry(
            &CapabilitiesConfig::default(),
            LlmProvider::Dummy(DummyProvider),
            Arc::new(InMemoryRepository::new()),
        );
        let ids: Vec<&str> = registry.iter().map(|c| c.id()).collect();
        assert_eq!(ids, ["memory_dump", "memory_wipe", "diagnostic", "completion"]);
    }
}
