use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::action::ConversationAction;
use crate::domain::intent::IntentDetectionResult;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TurnId(pub String);

impl TurnId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// Which generation path produced a response.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationPath {
    Rules,
    Hybrid,
    Llm,
}

impl GenerationPath {
    pub fn label(&self) -> &'static str {
        match self {
            GenerationPath::Rules => "rules",
            GenerationPath::Hybrid => "hybrid",
            GenerationPath::Llm => "llm",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseTone {
    Supportive,
    Celebratory,
    Informative,
    Alert,
}

/// Presentation hints for the UI layer. Advisory only; the UI may ignore
/// them but never receives anything stronger through this channel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiHints {
    pub tone: ResponseTone,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub quick_replies: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResponseMeta {
    pub response_id: String,
    pub generated_at: DateTime<Utc>,
    pub path: GenerationPath,
    pub processing_ms: u64,
    /// True when the turn fell back after a generation failure or timeout.
    pub degraded: bool,
}

impl ResponseMeta {
    pub fn new(path: GenerationPath, processing_ms: u64, degraded: bool) -> Self {
        Self {
            response_id: Uuid::new_v4().to_string(),
            generated_at: Utc::now(),
            path,
            processing_ms,
            degraded,
        }
    }
}

/// The single structured output handed to the presentation layer. `actions`
/// is guaranteed by construction to contain only gated, whitelisted actions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationResponse {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnosis: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub short_term_plan: Vec<String>,
    pub actions: Vec<ConversationAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui: Option<UiHints>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disclaimer: Option<String>,
    pub meta: ResponseMeta,
}

/// One immutable record in the conversation history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub id: TurnId,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_intent: Option<IntentDetectionResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ConversationResponse>,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>, detected_intent: IntentDetectionResult) -> Self {
        Self {
            id: TurnId::generate(),
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
            detected_intent: Some(detected_intent),
            response: None,
        }
    }

    pub fn assistant(response: ConversationResponse) -> Self {
        Self {
            id: TurnId::generate(),
            role: Role::Assistant,
            content: response.message.clone(),
            timestamp: Utc::now(),
            detected_intent: None,
            response: Some(response),
        }
    }
}

/// Append-only turn log. The only mutations are appending at the tail and
/// trimming whole turns oldest-first; records are never edited in place.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationLog {
    turns: Vec<ConversationTurn>,
}

impl ConversationLog {
    pub fn append(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
    }

    /// Drops oldest turns until at most `max_turns` remain.
    pub fn truncate_oldest(&mut self, max_turns: usize) {
        if self.turns.len() > max_turns {
            let excess = self.turns.len() - max_turns;
            self.turns.drain(0..excess);
        }
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn recent(&self, window: usize) -> &[ConversationTurn] {
        let start = self.turns.len().saturating_sub(window);
        &self.turns[start..]
    }

    pub fn last(&self) -> Option<&ConversationTurn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn user_turn_count(&self) -> usize {
        self.turns.iter().filter(|turn| turn.role == Role::User).count()
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::intent::{IntentDetectionResult, Sentiment, Urgency};

    use super::{ConversationLog, ConversationTurn, Role};

    fn user_turn(content: &str) -> ConversationTurn {
        ConversationTurn::user(
            content,
            IntentDetectionResult::ranked(
                Vec::new(),
                Vec::new(),
                Sentiment::Neutral,
                Urgency::Normal,
                Vec::new(),
            ),
        )
    }

    #[test]
    fn log_appends_in_order_and_trims_oldest_first() {
        let mut log = ConversationLog::default();
        for content in ["a", "b", "c", "d"] {
            log.append(user_turn(content));
        }

        log.truncate_oldest(2);
        let contents =
            log.turns().iter().map(|turn| turn.content.as_str()).collect::<Vec<_>>();
        assert_eq!(contents, vec!["c", "d"]);
    }

    #[test]
    fn recent_window_never_exceeds_log_length() {
        let mut log = ConversationLog::default();
        log.append(user_turn("seule"));
        assert_eq!(log.recent(3).len(), 1);
        assert_eq!(log.recent(0).len(), 0);
    }

    #[test]
    fn user_turns_carry_detected_intent() {
        let turn = user_turn("bonjour");
        assert_eq!(turn.role, Role::User);
        assert!(turn.detected_intent.is_some());
        assert!(turn.response.is_none());
    }
}
