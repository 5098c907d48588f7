use std::sync::Mutex;

use tracing::{debug, warn};

use crate::llm::{CostTracker, LlmProvider};
use crate::throttle::Throttle;
use crate::types::StoreCandidate;

use super::prompt::{ParsedExtraction, build_prompt, parse_model_response};
use super::traits::StoreExtractor;

/// Characters of a bad response kept in the warning line.
const RESPONSE_PREVIEW_CHARS: usize = 200;

/// [`StoreExtractor`] backed by an [`LlmProvider`], throttled between calls.
#[derive(Debug)]
pub struct LlmStoreExtractor {
    provider: Box<dyn LlmProvider>,
    throttle: Throttle,
    temperature: f64,
    costs: Mutex<CostTracker>,
}

impl LlmStoreExtractor {
    pub fn new(provider: Box<dyn LlmProvider>, throttle: Throttle, temperature: f64) -> Self {
        Self {
            provider,
            throttle,
            temperature,
            costs: Mutex::new(CostTracker::default()),
        }
    }

    fn with_costs(&self, f: impl FnOnce(&mut CostTracker)) {
        if let Ok(mut costs) = self.costs.lock() {
            f(&mut costs);
        }
    }
}

#[async_trait::async_trait]
impl StoreExtractor for LlmStoreExtractor {
    fn name(&self) -> &str {
        self.provider.name()
    }

    async fn extract(&self, caption: &str) -> crate::error::Result<StoreCandidate> {
        self.throttle.wait().await;

        let prompt = build_prompt(caption);
        let (text, usage) = match self.provider.call(&prompt, self.temperature).await {
            Ok(answer) => answer,
            Err(e) => {
                self.with_costs(CostTracker::record_failure);
                return Err(e);
            }
        };
        let (cost_in, cost_out) = (
            self.provider.cost_per_1k_input(),
            self.provider.cost_per_1k_output(),
        );
        self.with_costs(|c| c.record_call(&usage, cost_in, cost_out));

        match parse_model_response(&text) {
            ParsedExtraction::Parsed(candidate) => {
                debug!(
                    store_name = ?candidate.store_name,
                    address = ?candidate.address,
                    "Model extraction parsed"
                );
                Ok(candidate)
            }
            ParsedExtraction::Malformed { reason } => {
                let preview: String = text.chars().take(RESPONSE_PREVIEW_CHARS).collect();
                warn!(%reason, response = %preview, "Model response is not a store-info object");
                self.with_costs(CostTracker::record_malformed);
                Ok(StoreCandidate::empty())
            }
        }
    }

    fn usage(&self) -> CostTracker {
        self.costs.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::error::{CafeError, LlmError};
    use crate::llm::TokenUsage;

    #[derive(Debug)]
    struct CannedProvider {
        answer: Result<String, u16>,
        calls: AtomicUsize,
    }

    impl CannedProvider {
        fn ok(text: &str) -> Self {
            Self {
                answer: Ok(text.to_string()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    #[allow(clippy::unnecessary_literal_bound)]
    impl LlmProvider for CannedProvider {
        fn name(&self) -> &str {
            "canned"
        }

        fn model_id(&self) -> &str {
            "canned-1"
        }

        async fn call(
            &self,
            prompt: &str,
            _temperature: f64,
        ) -> crate::error::Result<(String, TokenUsage)> {
            assert!(prompt.contains("出力形式"));
            self.calls.fetch_add(1, Ordering::Relaxed);
            match &self.answer {
                Ok(text) => Ok((
                    text.clone(),
                    TokenUsage {
                        input_tokens: 100,
                        output_tokens: 10,
                    },
                )),
                Err(status) => Err(CafeError::Llm(LlmError::ApiError {
                    status: *status,
                    body: "quota".into(),
                })),
            }
        }

        fn cost_per_1k_input(&self) -> f64 {
            0.001
        }

        fn cost_per_1k_output(&self) -> f64 {
            0.002
        }
    }

    #[tokio::test]
    async fn extracts_and_tracks_usage() {
        let extractor = LlmStoreExtractor::new(
            Box::new(CannedProvider::ok(
                "```json\n{\"store_name\": \"Cafe X\", \"address\": \"Tokyo\"}\n```",
            )),
            Throttle::unlimited(),
            0.0,
        );
        let candidate = extractor.extract("caption").await.unwrap();
        assert_eq!(candidate, StoreCandidate::new("Cafe X", "Tokyo"));

        let usage = extractor.usage();
        assert_eq!(usage.total_requests, 1);
        assert_eq!(usage.total_input_tokens, 100);
        assert_eq!(extractor.name(), "canned");
    }

    #[tokio::test]
    async fn malformed_answer_is_null_pair() {
        let extractor = LlmStoreExtractor::new(
            Box::new(CannedProvider::ok("I think this is a bakery.")),
            Throttle::unlimited(),
            0.0,
        );
        let candidate = extractor.extract("caption").await.unwrap();
        assert!(candidate.is_empty());
        assert_eq!(extractor.usage().malformed_responses, 1);
    }

    #[tokio::test]
    async fn provider_failure_propagates() {
        let extractor = LlmStoreExtractor::new(
            Box::new(CannedProvider {
                answer: Err(429),
                calls: AtomicUsize::new(0),
            }),
            Throttle::unlimited(),
            0.0,
        );
        let err = extractor.extract("caption").await.unwrap_err();
        assert!(matches!(err, CafeError::Llm(LlmError::ApiError { status: 429, .. })));
        assert_eq!(extractor.usage().failed_requests, 1);
    }
}
