pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod metrics;

pub use audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink};
pub use domain::action::{
    ActionPermission, ActionRejectReason, ActionRisk, ActionType, ActionWhitelist,
    ConversationAction,
};
pub use domain::context::{
    AgeBracket, CompactSignal, CompactTurn, ConversationContextCompact, ConversationContextFull,
    Correlation, DayPart, Goal, NutritionSnapshot, ProgramState, TemporalContext, UserInfo,
    WellnessSnapshot,
};
pub use domain::intent::{
    Entity, EntityKind, IntentDetectionResult, ScoredIntent, Sentiment, Span, Urgency, UserIntent,
};
pub use domain::memory::{ConversationMemory, ConversationStats};
pub use domain::safety::{SafetyAction, SafetyCheckResult, SafetyFlag, SafetyTier};
pub use domain::tier::{QuotaKind, SubscriptionTier, TierConfig, TierTable};
pub use domain::turn::{
    ConversationLog, ConversationResponse, ConversationTurn, GenerationPath, ResponseMeta,
    ResponseTone, Role, SessionId, TurnId, UiHints,
};
pub use errors::TurnError;
pub use metrics::{ConversationMetrics, MetricsSnapshot};
