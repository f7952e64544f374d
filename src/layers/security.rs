//! Security layer: the gate in front of memory and capabilities.
//!
//! Requests from users outside the allow-list, and requests with no text,
//! are answered here and never forwarded.  An empty allow-list admits
//! everyone.

use std::collections::HashSet;

use tracing::{debug, info};

use super::{Layer, LayerFuture};
use crate::message::{Request, Response};

pub const DENIED_REPLY: &str = "Sorry, you are not allowed to use this bot.";
pub const EMPTY_REPLY: &str = "Send me a text message and I'll do my best.";

pub struct SecurityLayer {
    allowed_users: HashSet<String>,
    next: Box<dyn Layer>,
}

impl SecurityLayer {
    pub fn new(allowed_users: impl IntoIterator<Item = String>, next: Box<dyn Layer>) -> Self {
        Self {
            allowed_users: allowed_users.into_iter().collect(),
            next,
        }
    }

    pub fn is_allowed(&self, user_id: &str) -> bool {
        self.allowed_users.is_empty() || self.allowed_users.contains(user_id)
    }
}

impl Layer for SecurityLayer {
    fn name(&self) -> &str {
        "security"
    }

    fn pass_through<'a>(&'a self, request: &'a Request) -> LayerFuture<'a> {
        Box::pin(async move {
            if !self.is_allowed(&request.user_id) {
                info!(request_id = %request.request_id, user_id = %request.user_id, "request denied");
                return Ok(Response::text(request.chat_id, DENIED_REPLY));
            }
            if request.text.trim().is_empty() {
                return Ok(Response::text(request.chat_id, EMPTY_REPLY));
            }
            debug!(request_id = %request.request_id, next = self.next.name(), "request admitted");
            self.next.pass_through(request).await
        })
    }
}
