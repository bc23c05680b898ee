use thiserror::Error;

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::domain::safety::SafetyAction;
use crate::flows::states::{
    TurnEvent, TurnFlowAction, TurnFlowContext, TurnState, TurnTransitionOutcome,
};

pub trait TurnFlowDefinition {
    fn initial_state(&self) -> TurnState;
    fn transition(
        &self,
        current: &TurnState,
        event: &TurnEvent,
        context: &TurnFlowContext,
    ) -> Result<TurnTransitionOutcome, TurnTransitionError>;
}

/// The standard coaching-turn lifecycle:
/// `Received → Extracted → SafetyChecked → {Refused | QuotaBlocked |
/// Generating} → Gated → Assembled`.
#[derive(Clone, Debug, Default)]
pub struct StandardTurnFlow;

impl TurnFlowDefinition for StandardTurnFlow {
    fn initial_state(&self) -> TurnState {
        TurnState::Received
    }

    fn transition(
        &self,
        current: &TurnState,
        event: &TurnEvent,
        context: &TurnFlowContext,
    ) -> Result<TurnTransitionOutcome, TurnTransitionError> {
        transition_standard(current, event, context)
    }
}

pub struct TurnFlowEngine<F> {
    flow: F,
}

impl<F> TurnFlowEngine<F>
where
    F: TurnFlowDefinition,
{
    pub fn new(flow: F) -> Self {
        Self { flow }
    }

    pub fn initial_state(&self) -> TurnState {
        self.flow.initial_state()
    }

    pub fn apply(
        &self,
        current: &TurnState,
        event: &TurnEvent,
        context: &TurnFlowContext,
    ) -> Result<TurnTransitionOutcome, TurnTransitionError> {
        self.flow.transition(current, event, context)
    }

    pub fn apply_with_audit<S>(
        &self,
        current: &TurnState,
        event: &TurnEvent,
        context: &TurnFlowContext,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<TurnTransitionOutcome, TurnTransitionError>
    where
        S: AuditSink + ?Sized,
    {
        let result = self.apply(current, event, context);
        match &result {
            Ok(outcome) => {
                sink.emit(
                    AuditEvent::new(
                        audit.session_id.clone(),
                        audit.turn_id.clone(),
                        audit.correlation_id.clone(),
                        "turn.transition_applied",
                        AuditCategory::Flow,
                        audit.actor.clone(),
                        AuditOutcome::Success,
                    )
                    .with_metadata("from", format!("{:?}", outcome.from))
                    .with_metadata("to", format!("{:?}", outcome.to))
                    .with_metadata("event", format!("{:?}", outcome.event)),
                );
            }
            Err(error) => {
                sink.emit(
                    AuditEvent::new(
                        audit.session_id.clone(),
                        audit.turn_id.clone(),
                        audit.correlation_id.clone(),
                        "turn.transition_rejected",
                        AuditCategory::Flow,
                        audit.actor.clone(),
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("error", error.to_string()),
                );
            }
        }
        result
    }
}

impl Default for TurnFlowEngine<StandardTurnFlow> {
    fn default() -> Self {
        Self::new(StandardTurnFlow)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TurnTransitionError {
    #[error("invalid transition from {state:?} using event {event:?}")]
    InvalidTransition { state: TurnState, event: TurnEvent },
    #[error("refusal requires a refuse_redirect safety decision, got {decision:?}")]
    RefusalWithoutMandate { decision: Option<SafetyAction> },
}

fn transition_standard(
    current: &TurnState,
    event: &TurnEvent,
    context: &TurnFlowContext,
) -> Result<TurnTransitionOutcome, TurnTransitionError> {
    use TurnEvent::{
        ActionsGated, GenerationStarted, IntentExtracted, QuotaExhausted, RefusalIssued,
        ResponseAssembled, SafetyEvaluated,
    };
    use TurnFlowAction::{
        AssembleQuotaNotice, AssembleRefusal, AssembleResponse, CallGenerator, CheckQuota,
        CompactContext, EvaluateSafety, GateActions, PersistTurn, RecordMetrics,
    };
    use TurnState::{
        Assembled, Extracted, Gated, Generating, QuotaBlocked, Received, Refused, SafetyChecked,
    };

    let (to, actions) = match (current, event) {
        (Received, IntentExtracted) => (Extracted, vec![EvaluateSafety]),
        (Extracted, SafetyEvaluated) => (SafetyChecked, vec![CheckQuota]),
        (SafetyChecked, RefusalIssued) => {
            if context.safety_action != Some(SafetyAction::RefuseRedirect) {
                return Err(TurnTransitionError::RefusalWithoutMandate {
                    decision: context.safety_action,
                });
            }
            (Refused, vec![AssembleRefusal, RecordMetrics])
        }
        (SafetyChecked, QuotaExhausted) => (QuotaBlocked, vec![AssembleQuotaNotice, RecordMetrics]),
        (SafetyChecked, GenerationStarted) => (Generating, vec![CompactContext, CallGenerator]),
        (Generating, ActionsGated) => (Gated, vec![GateActions, AssembleResponse]),
        (Gated, ResponseAssembled) => (Assembled, vec![PersistTurn, RecordMetrics]),
        _ => {
            return Err(TurnTransitionError::InvalidTransition {
                state: current.clone(),
                event: event.clone(),
            });
        }
    };

    Ok(TurnTransitionOutcome { from: current.clone(), to, event: event.clone(), actions })
}

#[cfg(test)]
mod tests {
    use crate::audit::{AuditContext, InMemoryAuditSink};
    use crate::domain::safety::SafetyAction;
    use crate::domain::turn::{SessionId, TurnId};
    use crate::flows::engine::{StandardTurnFlow, TurnFlowEngine, TurnTransitionError};
    use crate::flows::states::{TurnEvent, TurnFlowAction, TurnFlowContext, TurnState};

    #[test]
    fn full_turn_happy_path_reaches_assembled() {
        let engine = TurnFlowEngine::new(StandardTurnFlow);
        let context = TurnFlowContext { safety_action: Some(SafetyAction::Allow) };
        let mut state = engine.initial_state();

        for event in [
            TurnEvent::IntentExtracted,
            TurnEvent::SafetyEvaluated,
            TurnEvent::GenerationStarted,
            TurnEvent::ActionsGated,
            TurnEvent::ResponseAssembled,
        ] {
            state = engine.apply(&state, &event, &context).expect("valid transition").to;
        }

        assert_eq!(state, TurnState::Assembled);
        assert!(state.is_terminal());
    }

    #[test]
    fn refusal_is_terminal_and_requires_the_safety_mandate() {
        let engine = TurnFlowEngine::default();
        let refusing =
            TurnFlowContext { safety_action: Some(SafetyAction::RefuseRedirect) };

        let outcome = engine
            .apply(&TurnState::SafetyChecked, &TurnEvent::RefusalIssued, &refusing)
            .expect("refusal transition");
        assert_eq!(outcome.to, TurnState::Refused);
        assert!(outcome.to.is_terminal());
        assert!(outcome.actions.contains(&TurnFlowAction::AssembleRefusal));

        let error = engine
            .apply(
                &TurnState::SafetyChecked,
                &TurnEvent::RefusalIssued,
                &TurnFlowContext { safety_action: Some(SafetyAction::Allow) },
            )
            .expect_err("refusal without mandate must fail");
        assert!(matches!(error, TurnTransitionError::RefusalWithoutMandate { .. }));
    }

    #[test]
    fn quota_block_short_circuits_generation() {
        let engine = TurnFlowEngine::default();
        let outcome = engine
            .apply(
                &TurnState::SafetyChecked,
                &TurnEvent::QuotaExhausted,
                &TurnFlowContext::default(),
            )
            .expect("quota block transition");

        assert_eq!(outcome.to, TurnState::QuotaBlocked);
        assert!(outcome.to.is_terminal());
        assert!(outcome.actions.contains(&TurnFlowAction::AssembleQuotaNotice));
    }

    #[test]
    fn generation_cannot_start_before_safety_check() {
        let engine = TurnFlowEngine::default();
        let error = engine
            .apply(
                &TurnState::Received,
                &TurnEvent::GenerationStarted,
                &TurnFlowContext::default(),
            )
            .expect_err("must reject skipping extraction and safety");

        assert!(matches!(
            error,
            TurnTransitionError::InvalidTransition {
                state: TurnState::Received,
                event: TurnEvent::GenerationStarted
            }
        ));
    }

    #[test]
    fn replay_is_deterministic_for_same_event_sequence() {
        let engine = TurnFlowEngine::default();
        let context = TurnFlowContext { safety_action: Some(SafetyAction::Allow) };
        let events = [
            TurnEvent::IntentExtracted,
            TurnEvent::SafetyEvaluated,
            TurnEvent::GenerationStarted,
            TurnEvent::ActionsGated,
            TurnEvent::ResponseAssembled,
        ];

        let run = |engine: &TurnFlowEngine<StandardTurnFlow>| {
            let mut state = engine.initial_state();
            let mut actions = Vec::new();
            for event in &events {
                let outcome = engine.apply(&state, event, &context).expect("deterministic run");
                actions.push(outcome.actions);
                state = outcome.to;
            }
            (state, actions)
        };

        assert_eq!(run(&engine), run(&engine));
    }

    #[test]
    fn transitions_emit_audit_events() {
        let engine = TurnFlowEngine::default();
        let sink = InMemoryAuditSink::default();

        let _ = engine
            .apply_with_audit(
                &TurnState::Received,
                &TurnEvent::IntentExtracted,
                &TurnFlowContext::default(),
                &sink,
                &AuditContext::new(
                    SessionId("session-7".to_string()),
                    Some(TurnId("turn-1".to_string())),
                    "req-42",
                    "turn-flow",
                ),
            )
            .expect("transition should succeed");

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "turn.transition_applied");
        assert_eq!(events[0].correlation_id, "req-42");
        assert_eq!(events[0].session_id.0, "session-7");
    }
}
