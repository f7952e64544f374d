//! Shared state for the comms subsystem: the boundary channels talk through.
//!
//! Channels receive an `Arc<CommsState>` and only see
//! [`CommsState::send_message`]; the gateway itself stays private.

use std::sync::Arc;

use tracing::debug;

use crate::gateway::Gateway;
use crate::message::{Request, Response};

pub struct CommsState {
    gateway: Arc<Gateway>,
}

impl CommsState {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }

    /// Build a request from an inbound message and run it through the
    /// gateway.  Always yields a reply.
    pub async fn send_message(
        &self,
        channel_id: &str,
        user_id: &str,
        chat_id: i64,
        content: String,
    ) -> Response {
        let request = Request::new(user_id, chat_id, content);
        debug!(%channel_id, request_id = %request.request_id, %user_id, chat_id, "inbound message");
        self.gateway.handle(request).await
    }
}
