use serde::{Deserialize, Serialize};

use crate::domain::safety::SafetyAction;

/// Lifecycle states of a single conversation turn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnState {
    Received,
    Extracted,
    SafetyChecked,
    Refused,
    QuotaBlocked,
    Generating,
    Gated,
    Assembled,
}

impl TurnState {
    /// Terminal short-circuits skip generation and gating entirely but
    /// still produce a minimal response.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnState::Refused | TurnState::QuotaBlocked | TurnState::Assembled)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnEvent {
    IntentExtracted,
    SafetyEvaluated,
    RefusalIssued,
    QuotaExhausted,
    GenerationStarted,
    ActionsGated,
    ResponseAssembled,
}

/// Guard inputs for transitions that depend on the safety decision.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnFlowContext {
    pub safety_action: Option<SafetyAction>,
}

/// Side effects the orchestrator must run after a transition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnFlowAction {
    EvaluateSafety,
    CheckQuota,
    CompactContext,
    CallGenerator,
    GateActions,
    AssembleResponse,
    AssembleRefusal,
    AssembleQuotaNotice,
    PersistTurn,
    RecordMetrics,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnTransitionOutcome {
    pub from: TurnState,
    pub to: TurnState,
    pub event: TurnEvent,
    pub actions: Vec<TurnFlowAction>,
}
