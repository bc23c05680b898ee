pub mod engine;
pub mod states;

pub use engine::{StandardTurnFlow, TurnFlowDefinition, TurnFlowEngine, TurnTransitionError};
pub use states::{TurnEvent, TurnFlowAction, TurnFlowContext, TurnState, TurnTransitionOutcome};
