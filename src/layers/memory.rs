//! Memory layer: records each inbound message, then forwards.
//!
//! Recording is best-effort: a failed append is logged and the request is
//! forwarded regardless.  The bounded [`Store`] is owned here; nothing else
//! in the gateway writes to it.  The optional [`Repository`] receives the
//! same writes as a long-term mirror.
//!
//! Two policy switches (see `[memory]` in the config):
//! - `inject_context`: read the user's history *before* recording the new
//!   message and forward an enriched copy of the request carrying it.
//! - `record_replies`: after the chain returns, record a text reply as an
//!   `assistant` turn.

use std::sync::Arc;

use tracing::{debug, warn};

use super::{Layer, LayerFuture};
use crate::config::MemoryConfig;
use crate::memory::{Repository, Scope, Store};
use crate::message::{Request, Role, StoredMessage};

pub struct MemoryLayer {
    store: Arc<dyn Store>,
    repo: Option<Arc<dyn Repository>>,
    inject_context: bool,
    record_replies: bool,
    next: Box<dyn Layer>,
}

impl MemoryLayer {
    pub fn new(store: Arc<dyn Store>, next: Box<dyn Layer>) -> Self {
        Self {
            store,
            repo: None,
            inject_context: false,
            record_replies: false,
            next,
        }
    }

    pub fn with_repository(mut self, repo: Arc<dyn Repository>) -> Self {
        self.repo = Some(repo);
        self
    }

    pub fn with_policy(mut self, policy: &MemoryConfig) -> Self {
        self.inject_context = policy.inject_context;
        self.record_replies = policy.record_replies;
        self
    }

    fn record(&self, request: &Request, role: Role, text: &str) {
        if let Err(e) = self.store.append(&request.user_id, text, role) {
            warn!(
                request_id = %request.request_id,
                user_id = %request.user_id,
                store = self.store.store_type(),
                error = %e,
                "memory append failed, continuing"
            );
        }

        let Some(repo) = &self.repo else { return };
        let scope = match role {
            Role::Assistant => Scope::Assistant,
            Role::User | Role::System => Scope::User,
        };
        if let Err(e) = repo.remember(scope, &request.user_id, text) {
            warn!(
                request_id = %request.request_id,
                user_id = %request.user_id,
                error = %e,
                "repository write failed, continuing"
            );
        }
    }

    fn recall_context(&self, request: &Request) -> Option<Vec<StoredMessage>> {
        if !self.inject_context {
            return None;
        }
        match self.store.read(&request.user_id) {
            Ok(history) => Some(history),
            Err(e) => {
                warn!(request_id = %request.request_id, error = %e, "history read failed, forwarding without context");
                None
            }
        }
    }
}

impl Layer for MemoryLayer {
    fn name(&self) -> &str {
        "memory"
    }

    fn pass_through<'a>(&'a self, request: &'a Request) -> LayerFuture<'a> {
        Box::pin(async move {
            let context = self.recall_context(request);
            self.record(request, Role::User, &request.text);

            let response = match context {
                Some(history) => {
                    debug!(request_id = %request.request_id, turns = history.len(), "attaching context");
                    let enriched = request.with_context(history);
                    self.next.pass_through(&enriched).await?
                }
                None => {
                    debug!(request_id = %request.request_id, next = self.next.name(), "forwarding");
                    self.next.pass_through(request).await?
                }
            };

            if self.record_replies && !response.is_attachment() && !response.text.is_empty() {
                self.record(request, Role::Assistant, &response.text);
            }
            Ok(response)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::error::GatewayError;
    use crate::memory::{BoundedStore, InMemoryRepository};
    use crate::message::Response;

    /// Terminal stage that remembers what it was handed.
    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<Request>>,
    }

    impl Layer for Arc<Recorder> {
        fn name(&self) -> &str {
            "recorder"
        }
        fn pass_through<'a>(&'a self, request: &'a Request) -> LayerFuture<'a> {
            self.seen.lock().unwrap().push(request.clone());
            Box::pin(async move { Ok(Response::text(request.chat_id, format!("re: {}", request.text))) })
        }
    }

    struct FailingStore;

    impl Store for FailingStore {
        fn store_type(&self) -> &str {
            "failing"
        }
        fn append(&self, _: &str, _: &str, _: Role) -> Result<(), GatewayError> {
            Err(GatewayError::StoreUnavailable("disk full".into()))
        }
        fn read(&self, _: &str) -> Result<Vec<StoredMessage>, GatewayError> {
            Err(GatewayError::StoreUnavailable("disk full".into()))
        }
    }

    fn layer(store: Arc<dyn Store>) -> (MemoryLayer, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        (MemoryLayer::new(store, Box::new(recorder.clone())), recorder)
    }

    #[tokio::test]
    async fn records_user_message_and_returns_next_response() {
        let store = Arc::new(BoundedStore::default());
        let (layer, _) = layer(store.clone());

        let res = layer.pass_through(&Request::new("hank", 3, "hello")).await.unwrap();
        assert_eq!(res, Response::text(3, "re: hello"));

        let history = store.read("hank").unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[0].message, "hello");
    }

    #[tokio::test]
    async fn does_not_inject_context_by_default() {
        let store = Arc::new(BoundedStore::default());
        let (layer, recorder) = layer(store);

        layer.pass_through(&Request::new("ivy", 1, "one")).await.unwrap();
        layer.pass_through(&Request::new("ivy", 1, "two")).await.unwrap();

        let seen = recorder.seen.lock().unwrap();
        assert!(seen.iter().all(|r| r.context.is_empty()));
    }

    #[tokio::test]
    async fn injects_prior_history_when_enabled() {
        let store = Arc::new(BoundedStore::default());
        let (layer, recorder) = layer(store);
        let policy = MemoryConfig { inject_context: true, ..MemoryConfig::default() };
        let layer = layer.with_policy(&policy);

        layer.pass_through(&Request::new("jack", 1, "one")).await.unwrap();
        let original = Request::new("jack", 1, "two");
        layer.pass_through(&original).await.unwrap();

        let seen = recorder.seen.lock().unwrap();
        assert!(seen[0].context.is_empty());
        let context: Vec<&str> = seen[1].context.iter().map(|m| m.message.as_str()).collect();
        assert_eq!(context, ["one"]);
        // Copy-on-enrich: the caller's request is untouched.
        assert!(original.context.is_empty());
    }

    #[tokio::test]
    async fn records_replies_when_enabled() {
        let store = Arc::new(BoundedStore::default());
        let repo = Arc::new(InMemoryRepository::new());
        let policy = MemoryConfig { record_replies: true, ..MemoryConfig::default() };
        let (layer, _) = layer(store.clone());
        let layer = layer.with_repository(repo.clone()).with_policy(&policy);

        layer.pass_through(&Request::new("kim", 1, "hi")).await.unwrap();

        let roles: Vec<Role> = store.read("kim").unwrap().iter().map(|m| m.role).collect();
        assert_eq!(roles, [Role::User, Role::Assistant]);
        assert_eq!(repo.recall(Scope::User, "kim").unwrap()[0].message, "hi");
        assert_eq!(repo.recall(Scope::Assistant, "kim").unwrap()[0].message, "re: hi");
    }

    #[tokio::test]
    async fn store_failure_does_not_block_forwarding() {
        let policy = MemoryConfig {
            inject_context: true,
            record_replies: true,
            ..MemoryConfig::default()
        };
        let (layer, recorder) = layer(Arc::new(FailingStore));
        let layer = layer.with_policy(&policy);

        let res = layer.pass_through(&Request::new("liz", 8, "still there?")).await.unwrap();
        assert_eq!(res.text, "re: still there?");
        assert_eq!(recorder.seen.lock().unwrap().len(), 1);
    }
}
