use thiserror::Error;

use crate::domain::tier::{QuotaKind, SubscriptionTier};
use crate::flows::TurnTransitionError;

/// Failure classes of the turn pipeline. Every variant has a defined,
/// tested recovery; none of them propagates out of the engine as a crash.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum TurnError {
    /// Daily tier budget exhausted. Recovered by the caller with an
    /// upgrade-prompt (message quota) or rules-path (generator quota)
    /// response.
    #[error("daily {kind:?} budget exhausted for tier {tier:?}")]
    QuotaExceeded { tier: SubscriptionTier, kind: QuotaKind },
    /// The generation orchestrator returned an error. Recovered by the
    /// rules fallback.
    #[error("generation failed: {0}")]
    GenerationFailure(String),
    /// The generation orchestrator exceeded its deadline. Treated as a
    /// generation failure, not a hang.
    #[error("generation exceeded the {deadline_ms} ms deadline")]
    GenerationTimeout { deadline_ms: u64 },
    /// The client abandoned the turn before the orchestrator responded.
    /// Nothing is assembled or persisted; consumed quota is not refunded.
    #[error("turn cancelled by the client before completion")]
    Cancelled,
    #[error(transparent)]
    Transition(#[from] TurnTransitionError),
}

impl TurnError {
    /// True for outcomes the pipeline absorbs into a degraded-but-valid
    /// response instead of surfacing to the caller.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, TurnError::Cancelled | TurnError::Transition(_))
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::tier::{QuotaKind, SubscriptionTier};
    use crate::flows::TurnTransitionError;
    use crate::flows::{TurnEvent, TurnState};

    use super::TurnError;

    #[test]
    fn quota_and_generation_failures_are_recoverable() {
        assert!(TurnError::QuotaExceeded {
            tier: SubscriptionTier::Free,
            kind: QuotaKind::GeneratorCall
        }
        .is_recoverable());
        assert!(TurnError::GenerationFailure("upstream 500".to_string()).is_recoverable());
        assert!(TurnError::GenerationTimeout { deadline_ms: 8000 }.is_recoverable());
    }

    #[test]
    fn cancellation_and_flow_bugs_are_not_recoverable() {
        assert!(!TurnError::Cancelled.is_recoverable());
        assert!(!TurnError::Transition(TurnTransitionError::InvalidTransition {
            state: TurnState::Received,
            event: TurnEvent::ActionsGated,
        })
        .is_recoverable());
    }

    #[test]
    fn errors_render_actionable_messages() {
        let error = TurnError::QuotaExceeded {
            tier: SubscriptionTier::Free,
            kind: QuotaKind::Message,
        };
        assert!(error.to_string().contains("Message"));
        assert!(error.to_string().contains("Free"));
    }
}
