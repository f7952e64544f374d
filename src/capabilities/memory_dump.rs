//! `memory_dump` capability: exports a user's long-term memory as CSV.
//!
//! The reply carries the CSV as a binary payload; transports deliver it as a
//! file attachment.

use std::sync::Arc;

use super::{Capability, CapabilityFuture, MATCH, NO_MATCH, is_command};
use crate::memory::{Repository, Scope};
use crate::message::{Request, Response, StoredMessage};

const COMMANDS: &[&str] = &["memory dump"];
const CSV_HEADER: &str = "timestamp,role,message";

pub struct MemoryDumpCapability {
    repo: Arc<dyn Repository>,
}

impl MemoryDumpCapability {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }
}

impl Capability for MemoryDumpCapability {
    fn id(&self) -> &str {
        "memory_dump"
    }

    fn check(&self, request: &Request) -> f32 {
        if is_command(&request.text, COMMANDS) { MATCH } else { NO_MATCH }
    }

    fn execute<'a>(&'a self, request: &'a Request) -> CapabilityFuture<'a> {
        Box::pin(async move {
            let mut entries = self.repo.recall(Scope::User, &request.user_id)?;
            entries.extend(self.repo.recall(Scope::Assistant, &request.user_id)?);
            // Stable: equal timestamps keep user-before-assistant order.
            entries.sort_by_key(|m| m.timestamp);
            Ok(Response::attachment(request.chat_id, to_csv(&entries).into_bytes()))
        })
    }
}

fn to_csv(entries: &[StoredMessage]) -> String {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');
    for m in entries {
        out.push_str(&format!("{},{},{}\n", m.timestamp, m.role, escape_field(&m.message)));
    }
    out
}

/// RFC 4180 quoting: wrap in quotes when the field contains a delimiter,
/// quote or line break, doubling embedded quotes.
fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
