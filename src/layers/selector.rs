//! Capability selector: scores every registered capability and runs the
//! winner.  Terminates the chain.

use tracing::{debug, error};

use super::{Layer, LayerFuture};
use crate::capabilities::Capability;
use crate::error::GatewayError;
use crate::message::Request;

/// Owns the capability registry.
///
/// Registration order is a priority order: the first capability reaching the
/// maximum score wins, so fallbacks that always answer [`MATCH`] belong at
/// the end.
///
/// [`MATCH`]: crate::capabilities::MATCH
pub struct CapabilitySelector {
    capabilities: Vec<Box<dyn Capability>>,
}

impl CapabilitySelector {
    pub fn new(capabilities: Vec<Box<dyn Capability>>) -> Self {
        Self { capabilities }
    }

    /// Pick the capability for `request` without executing it.
    pub fn select(&self, request: &Request) -> Result<&dyn Capability, GatewayError> {
        let mut best: Option<(&dyn Capability, f32)> = None;

        for cap in &self.capabilities {
            let score = sanitize(cap.check(request));
            debug!(request_id = %request.request_id, capability = cap.id(), score, "capability scored");
            // Strictly greater: ties keep the earlier registration.
            if best.is_none_or(|(_, top)| score > top) {
                best = Some((cap.as_ref(), score));
            }
        }

        match best {
            Some((cap, score)) if score > 0.0 => Ok(cap),
            _ => Err(GatewayError::NoCapabilityMatched),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }
}

/// Clamp into `[0, 1]`; NaN counts as no affinity.
fn sanitize(score: f32) -> f32 {
    if score.is_nan() { 0.0 } else { score.clamp(0.0, 1.0) }
}

impl Layer for CapabilitySelector {
    fn name(&self) -> &str {
        "selector"
    }

    fn pass_through<'a>(&'a self, request: &'a Request) -> LayerFuture<'a> {
        Box::pin(async move {
            let cap = self.select(request)?;
            debug!(request_id = %request.request_id, capability = cap.id(), "dispatching");
            cap.execute(request).await.inspect_err(|e| {
                error!(request_id = %request.request_id, capability = cap.id(), error = %e, "capability failed");
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::capabilities::CapabilityFuture;
    use crate::message::Response;

    /// Fixed-score capability that counts executions.
    struct Fixed {
        id: &'static str,
        score: f32,
        runs: Arc<AtomicUsize>,
    }

    impl Fixed {
        fn boxed(id: &'static str, score: f32) -> (Box<dyn Capability>, Arc<AtomicUsize>) {
            let runs = Arc::new(AtomicUsize::new(0));
            (Box::new(Self { id, score, runs: runs.clone() }), runs)
        }
    }

    impl Capability for Fixed {
        fn id(&self) -> &str {
            self.id
        }
        fn check(&self, _request: &Request) -> f32 {
            self.score
        }
        fn execute<'a>(&'a self, request: &'a Request) -> CapabilityFuture<'a> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move { Ok(Response::text(request.chat_id, self.id)) })
        }
    }

    fn req() -> Request {
        Request::new("user", 1, "hello")
    }

    #[test]
    fn highest_score_wins() {
        let (a, _) = Fixed::boxed("a", 0.2);
        let (b, _) = Fixed::boxed("b", 0.9);
        let (c, _) = Fixed::boxed("c", 0.5);
        let selector = CapabilitySelector::new(vec![a, b, c]);
        assert_eq!(selector.select(&req()).unwrap().id(), "b");
    }

    #[test]
    fn ties_go_to_first_registered() {
        let (a, _) = Fixed::boxed("a", 0.1);
        let (b, _) = Fixed::boxed("b", 1.0);
        let (c, _) = Fixed::boxed("c", 1.0);
        let selector = CapabilitySelector::new(vec![a, b, c]);
        assert_eq!(selector.select(&req()).unwrap().id(), "b");
    }

    #[test]
    fn selection_is_deterministic() {
        let (a, _) = Fixed::boxed("a", 0.7);
        let (b, _) = Fixed::boxed("b", 0.7);
        let selector = CapabilitySelector::new(vec![a, b]);
        let request = req();
        for _ in 0..50 {
            assert_eq!(selector.select(&request).unwrap().id(), "a");
        }
    }

    #[test]
    fn out_of_range_scores_are_clamped() {
        let (a, _) = Fixed::boxed("a", f32::NAN);
        let (b, _) = Fixed::boxed("b", 7.0);
        let (c, _) = Fixed::boxed("c", 1.0);
        let selector = CapabilitySelector::new(vec![a, b, c]);
        // 7.0 clamps to 1.0 and, registered first, wins the tie with c.
        assert_eq!(selector.select(&req()).unwrap().id(), "b");
    }

    #[tokio::test]
    async fn all_zero_is_no_match_and_nothing_runs() {
        let (a, a_runs) = Fixed::boxed("a", 0.0);
        let (b, b_runs) = Fixed::boxed("b", -1.0);
        let selector = CapabilitySelector::new(vec![a, b]);

        let err = selector.pass_through(&req()).await.unwrap_err();
        assert!(matches!(err, GatewayError::NoCapabilityMatched));
        assert_eq!(a_runs.load(Ordering::SeqCst), 0);
        assert_eq!(b_runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_registry_is_no_match() {
        let selector = CapabilitySelector::new(Vec::new());
        assert!(selector.is_empty());
        let err = selector.pass_through(&req()).await.unwrap_err();
        assert!(matches!(err, GatewayError::NoCapabilityMatched));
    }

    #[tokio::test]
    async fn only_winner_executes() {
        let (a, a_runs) = Fixed::boxed("a", 0.3);
        let (b, b_runs) = Fixed::boxed("b", 0.8);
        let selector = CapabilitySelector::new(vec![a, b]);

        let res = selector.pass_through(&req()).await.unwrap();
        assert_eq!(res.text, "b");
        assert_eq!(a_runs.load(Ordering::SeqCst), 0);
        assert_eq!(b_runs.load(Ordering::SeqCst), 1);
    }
}
