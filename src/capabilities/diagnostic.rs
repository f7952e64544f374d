//! `diagnostic` capability: writes a ping through the repository and reports the time.

use std::sync::Arc;

use chrono::Utc;

use super::{Capability, CapabilityFuture, MATCH, NO_MATCH, is_command};
use crate::memory::{Repository, Scope};
use crate::message::{Request, Response};

const COMMANDS: &[&str] = &["ping", "test memory"];

pub struct DiagnosticCapability {
    repo: Arc<dyn Repository>,
}

impl DiagnosticCapability {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }
}

impl Capability for DiagnosticCapability {
    fn id(&self) -> &str {
        "diagnostic"
    }

    fn check(&self, request: &Request) -> f32 {
        if is_command(&request.text, COMMANDS) { MATCH } else { NO_MATCH }
    }

    fn execute<'a>(&'a self, request: &'a Request) -> CapabilityFuture<'a> {
        Box::pin(async move {
            let stamp = Utc::now().timestamp_millis();
            self.repo.remember(Scope::User, &request.user_id, &request.text)?;
            Ok(Response::text(request.chat_id, format!("Memory is working: {stamp}")))
        })
    }
}
