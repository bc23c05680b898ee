//! Conversational coaching pipeline.
//!
//! This crate turns a free-text user message into a safe, tier-appropriate,
//! whitelisted response. The pipeline is a fixed sequence per turn:
//!
//! 1. **Extraction** (`extractor`) - ranked intents, span entities,
//!    sentiment and urgency.
//! 2. **Safety** (`safety`) - per-flag detectors and a strict precedence
//!    table; may short-circuit the turn into a refusal.
//! 3. **Quota** (`quota`) - atomic per-tier daily budgets for messages and
//!    generator calls.
//! 4. **Compaction** (`compactor`) - size-bounded projection of the session
//!    context for generator input.
//! 5. **Generation** (`generation`) - orchestrator boundary behind a trait,
//!    with a deterministic rules fallback and a hard deadline.
//! 6. **Gating** (`gate`) - whitelist/tier/risk validation of every
//!    candidate action.
//! 7. **Assembly** (`assembler`) - final response with disclaimers, UI
//!    hints, and metadata.
//!
//! `session` drives a turn through these stages with the turn-flow state
//! machine from `nutricoach-core`; `memory` regenerates the conversation
//! summary out-of-band.
//!
//! # Safety principle
//!
//! The generator is strictly a drafter. It never decides what the user may
//! do: the action vocabulary it receives is pre-filtered, and everything it
//! proposes is re-validated by the gate before assembly.

pub mod assembler;
pub mod compactor;
pub mod extractor;
pub mod gate;
pub mod generation;
pub mod memory;
pub mod quota;
pub mod safety;
pub mod session;
mod text;

pub use assembler::ResponseAssembler;
pub use compactor::{CompactionDrop, CompactionOutcome, ContextCompactor};
pub use extractor::IntentExtractor;
pub use gate::{ActionGate, GateOutcome, RejectedAction};
pub use generation::{DeadlineGenerator, DraftResponse, ResponseGenerator, RulesGenerator};
pub use memory::{MemorySummarizer, SharedMemory};
pub use quota::QuotaLedger;
pub use safety::SafetyGuard;
pub use session::{CoachEngine, CoachSession};
