//! `memory_wipe` capability: forgets a user's long-term memory.

use std::sync::Arc;

use tracing::info;

use super::{Capability, CapabilityFuture, MATCH, NO_MATCH, is_command};
use crate::memory::{Repository, Scope};
use crate::message::{Request, Response};

const COMMANDS: &[&str] = &["clear memory"];

pub struct MemoryWipeCapability {
    repo: Arc<dyn Repository>,
}

impl MemoryWipeCapability {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }
}

impl Capability for MemoryWipeCapability {
    fn id(&self) -> &str {
        "memory_wipe"
    }

    fn check(&self, request: &Request) -> f32 {
        if is_command(&request.text, COMMANDS) { MATCH } else { NO_MATCH }
    }

    fn execute<'a>(&'a self, request: &'a Request) -> CapabilityFuture<'a> {
        Box::pin(async move {
            let removed = self.repo.forget(Scope::User, &request.user_id)?
                + self.repo.forget(Scope::Assistant, &request.user_id)?;
            info!(request_id = %request.request_id, user_id = %request.user_id, removed, "memory wiped");
            Ok(Response::text(
                request.chat_id,
                format!("Memory cleared ({removed} entries removed)."),
            ))
        })
    }
}
