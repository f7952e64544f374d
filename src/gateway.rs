//! Gateway: the assembled pipeline and the error-to-reply policy.
//!
//! Channels hand every inbound message to [`Gateway::handle`], which always
//! produces a reply: pipeline errors are logged and turned into a short
//! user-facing message here, not inside the stages.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::capabilities::{self, Capability};
use crate::config::Config;
use crate::error::GatewayError;
use crate::layers::{CapabilitySelector, Layer, MemoryLayer, SecurityLayer};
use crate::llm::LlmProvider;
use crate::memory::{BoundedStore, InMemoryRepository, Repository, Store};
use crate::message::{Request, Response};

pub const NO_MATCH_REPLY: &str = "Sorry, I don't understand that yet.";
pub const ERROR_REPLY: &str = "Error while processing message";

pub struct Gateway {
    root: Box<dyn Layer>,
}

impl Gateway {
    /// Wrap an already-assembled chain.
    pub fn new(root: Box<dyn Layer>) -> Self {
        Self { root }
    }

    /// Production wiring: bounded store sized from config, process-local
    /// repository, built-in capabilities.
    pub fn build(config: &Config, provider: LlmProvider) -> Self {
        let store = Arc::new(BoundedStore::new(config.memory.history_cap));
        let repo: Arc<dyn Repository> = Arc::new(InMemoryRepository::with_cap(config.memory.repository_cap));
        let registry = capabilities::default_registry(&config.capabilities, provider, repo.clone());
        Self::assemble(config, store, repo, registry)
    }

    /// Security → Memory → Selector over the given parts.
    pub fn assemble(
        config: &Config,
        store: Arc<dyn Store>,
        repo: Arc<dyn Repository>,
        capabilities: Vec<Box<dyn Capability>>,
    ) -> Self {
        let capability_ids: Vec<String> = capabilities.iter().map(|c| c.id().to_string()).collect();

        let selector = CapabilitySelector::new(capabilities);
        if selector.is_empty() {
            warn!("no capabilities registered, every request will go unanswered");
        }
        let mut stages = vec![selector.name().to_string()];

        let memory = MemoryLayer::new(store, Box::new(selector))
            .with_repository(repo)
            .with_policy(&config.memory);
        stages.push(memory.name().to_string());

        let security = SecurityLayer::new(config.security.allowed_users.clone(), Box::new(memory));
        stages.push(security.name().to_string());
        stages.reverse();

        info!(
            stages = ?stages,
            capabilities = ?capability_ids,
            history_cap = config.memory.history_cap,
            repository_cap = config.memory.repository_cap,
            inject_context = config.memory.inject_context,
            allow_list = config.security.allowed_users.len(),
            "gateway assembled"
        );
        Self::new(Box::new(security))
    }

    /// Name of the first stage every request enters.
    pub fn entry_stage(&self) -> &str {
        self.root.name()
    }

    /// Run the chain and return its raw result.
    pub async fn pass_through(&self, request: &Request) -> Result<Response, GatewayError> {
        self.root.pass_through(request).await
    }

    /// Run the chain; never fails.  Errors become a fallback text reply.
    pub async fn handle(&self, request: Request) -> Response {
        match self.root.pass_through(&request).await {
            Ok(response) => response,
            Err(GatewayError::NoCapabilityMatched) => {
                warn!(request_id = %request.request_id, "no capability matched");
                Response::text(request.chat_id, NO_MATCH_REPLY)
            }
            Err(e) => {
                error!(request_id = %request.request_id, stage = self.entry_stage(), error = %e, "request failed");
                Response::text(request.chat_id, ERROR_REPLY)
            }
        }
    }
}
