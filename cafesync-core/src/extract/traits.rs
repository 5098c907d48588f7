use crate::llm::CostTracker;
use crate::types::StoreCandidate;

/// Extracts a `{store_name, address}` candidate from free caption text.
///
/// Implementations return the null/null pair for answers they cannot
/// interpret. `Err` is reserved for transport or provider failures, which
/// the synchronizer downgrades to a skip for that one record.
#[async_trait::async_trait]
pub trait StoreExtractor: Send + Sync {
    /// Short name for log lines.
    fn name(&self) -> &str;

    async fn extract(&self, caption: &str) -> crate::error::Result<StoreCandidate>;

    /// Accumulated model usage, if the extractor tracks it.
    fn usage(&self) -> CostTracker {
        CostTracker::default()
    }
}
