use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::domain::turn::GenerationPath;

/// Increment-only counters for experimentation and satisfaction tracking.
/// There is deliberately no reset surface.
#[derive(Debug, Default)]
pub struct ConversationMetrics {
    turns_processed: AtomicU64,
    refusals: AtomicU64,
    quota_blocks: AtomicU64,
    generation_fallbacks: AtomicU64,
    actions_rejected: AtomicU64,
    rules_responses: AtomicU64,
    hybrid_responses: AtomicU64,
    llm_responses: AtomicU64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub turns_processed: u64,
    pub refusals: u64,
    pub quota_blocks: u64,
    pub generation_fallbacks: u64,
    pub actions_rejected: u64,
    pub rules_responses: u64,
    pub hybrid_responses: u64,
    pub llm_responses: u64,
}

impl ConversationMetrics {
    pub fn record_turn(&self, path: GenerationPath) {
        self.turns_processed.fetch_add(1, Ordering::Relaxed);
        match path {
            GenerationPath::Rules => self.rules_responses.fetch_add(1, Ordering::Relaxed),
            GenerationPath::Hybrid => self.hybrid_responses.fetch_add(1, Ordering::Relaxed),
            GenerationPath::Llm => self.llm_responses.fetch_add(1, Ordering::Relaxed),
        };
    }

    pub fn record_refusal(&self) {
        self.refusals.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_quota_block(&self) {
        self.quota_blocks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_generation_fallback(&self) {
        self.generation_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_actions_rejected(&self, count: u64) {
        self.actions_rejected.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            turns_processed: self.turns_processed.load(Ordering::Relaxed),
            refusals: self.refusals.load(Ordering::Relaxed),
            quota_blocks: self.quota_blocks.load(Ordering::Relaxed),
            generation_fallbacks: self.generation_fallbacks.load(Ordering::Relaxed),
            actions_rejected: self.actions_rejected.load(Ordering::Relaxed),
            rules_responses: self.rules_responses.load(Ordering::Relaxed),
            hybrid_responses: self.hybrid_responses.load(Ordering::Relaxed),
            llm_responses: self.llm_responses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::turn::GenerationPath;

    use super::ConversationMetrics;

    #[test]
    fn counters_accumulate_per_generation_path() {
        let metrics = ConversationMetrics::default();
        metrics.record_turn(GenerationPath::Rules);
        metrics.record_turn(GenerationPath::Rules);
        metrics.record_turn(GenerationPath::Llm);
        metrics.record_generation_fallback();
        metrics.record_actions_rejected(3);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.turns_processed, 3);
        assert_eq!(snapshot.rules_responses, 2);
        assert_eq!(snapshot.llm_responses, 1);
        assert_eq!(snapshot.hybrid_responses, 0);
        assert_eq!(snapshot.generation_fallbacks, 1);
        assert_eq!(snapshot.actions_rejected, 3);
    }
}
