//! `completion` capability: the unconditional LLM fallback.

use tracing::debug;

use super::{Capability, CapabilityFuture, MATCH};
use crate::error::GatewayError;
use crate::llm::LlmProvider;
use crate::message::{Request, Response};

pub struct CompletionCapability {
    provider: LlmProvider,
    system_prompt: String,
}

impl CompletionCapability {
    pub fn new(provider: LlmProvider, system_prompt: String) -> Self {
        Self { provider, system_prompt }
    }
}

impl Capability for CompletionCapability {
    fn id(&self) -> &str {
        "completion"
    }

    fn check(&self, _request: &Request) -> f32 {
        MATCH
    }

    fn execute<'a>(&'a self, request: &'a Request) -> CapabilityFuture<'a> {
        Box::pin(async move {
            debug!(
                request_id = %request.request_id,
                provider = self.provider.name(),
                context = request.context.len(),
                "requesting completion"
            );
            let system = Some(self.system_prompt.as_str()).filter(|s| !s.trim().is_empty());
            let text = self
                .provider
                .complete(system, &request.context, &request.text)
                .await
                .map_err(|e| GatewayError::execution(self.id(), e.to_string()))?;
            Ok(Response::text(request.chat_id, text))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::providers::dummy::DummyProvider;
    use crate::llm::providers::openai_compatible::OpenAiCompatibleProvider;

    #[test]
    fn always_matches() {
        let cap = CompletionCapability::new(LlmProvider::Dummy(DummyProvider), String::new());
        assert_eq!(cap.check(&Request::new("u", 1, "anything")), MATCH);
        assert_eq!(cap.check(&Request::new("u", 1, "")), MATCH);
    }

    #[tokio::test]
    async fn replies_with_provider_text() {
        let cap = CompletionCapability::new(LlmProvider::Dummy(DummyProvider), "sys".into());
        let res = cap.execute(&Request::new("u", 42, "hello")).await.unwrap();
        assert_eq!(res.chat_id, 42);
        assert_eq!(res.text, "[echo] hello");
    }

    #[tokio::test]
    async fn provider_failure_is_execution_error() {
        // Port 9 (discard) on localhost is not an HTTP server.
        let provider = OpenAiCompatibleProvider::new(
            "http://127.0.0.1:9/v1/chat/completions".into(),
            "test-model".into(),
            0.0,
            1,
            None,
        )
        .unwrap();
        let cap = CompletionCapability::new(LlmProvider::OpenAiCompatible(provider), "sys".into());

        let err = cap.execute(&Request::new("u", 1, "hi")).await.unwrap_err();
        assert!(matches!(err, GatewayError::Execution { ref capability, .. } if capability == "completion"));
    }
}
