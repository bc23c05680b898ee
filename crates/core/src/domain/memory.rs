use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationStats {
    pub total_turns: u32,
    pub user_turns: u32,
    pub assistant_turns: u32,
}

/// Periodically regenerated summary of the conversation, produced by the
/// background summarizer. Eventually consistent with the history it covers;
/// the turn path only ever reads it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMemory {
    pub user_preferences: Vec<String>,
    pub patterns: Vec<String>,
    pub conversation_stats: ConversationStats,
    pub learned_facts: Vec<String>,
    pub last_updated: DateTime<Utc>,
}

impl ConversationMemory {
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            user_preferences: Vec::new(),
            patterns: Vec::new(),
            conversation_stats: ConversationStats::default(),
            learned_facts: Vec::new(),
            last_updated: now,
        }
    }

    /// One-line rendering for the compact context, clamped to `max_chars`.
    pub fn summary_line(&self, max_chars: usize) -> String {
        let mut parts = Vec::new();
        if !self.user_preferences.is_empty() {
            parts.push(format!("préférences: {}", self.user_preferences.join(", ")));
        }
        if !self.patterns.is_empty() {
            parts.push(format!("habitudes: {}", self.patterns.join(", ")));
        }
        if !self.learned_facts.is_empty() {
            parts.push(format!("notes: {}", self.learned_facts.join(", ")));
        }
        let line = parts.join(" · ");
        line.chars().take(max_chars).collect()
    }
}
