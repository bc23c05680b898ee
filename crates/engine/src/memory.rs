use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use nutricoach_core::{
    ConversationMemory, ConversationStats, ConversationTurn, EntityKind, Role, SafetyFlag,
    SafetyTier, UserIntent,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Memory cell shared between the session (reader) and the background
/// summarizer (writer). Eventually consistent with the turn history.
pub type SharedMemory = Arc<RwLock<Option<ConversationMemory>>>;

pub fn shared_memory() -> SharedMemory {
    Arc::new(RwLock::new(None))
}

pub fn read_memory(cell: &SharedMemory) -> Option<ConversationMemory> {
    match cell.read() {
        Ok(guard) => guard.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

fn write_memory(cell: &SharedMemory, memory: ConversationMemory) {
    match cell.write() {
        Ok(mut guard) => *guard = Some(memory),
        Err(poisoned) => *poisoned.into_inner() = Some(memory),
    }
}

/// Derives a [`ConversationMemory`] from recent turns. Pure and
/// deterministic; the async plumbing lives in [`spawn_summarizer`].
#[derive(Clone, Debug)]
pub struct MemorySummarizer {
    /// Regenerate after this many new user turns.
    every_user_turns: u32,
}

/// Turns kept in the summarizer's rolling buffer.
const BUFFER_CAP: usize = 50;
/// A signal must repeat this often before it becomes part of the memory.
const RECURRENCE_THRESHOLD: usize = 2;

impl MemorySummarizer {
    pub fn new(every_user_turns: u32) -> Self {
        Self { every_user_turns: every_user_turns.max(1) }
    }

    pub fn summarize(
        &self,
        turns: &[ConversationTurn],
        now: DateTime<Utc>,
    ) -> ConversationMemory {
        let mut intent_counts: BTreeMap<&'static str, usize> = BTreeMap::new();
        let mut food_counts: BTreeMap<String, usize> = BTreeMap::new();
        let mut stats = ConversationStats::default();
        let mut learned_facts = Vec::new();

        for turn in turns {
            stats.total_turns += 1;
            match turn.role {
                Role::User => stats.user_turns += 1,
                Role::Assistant => stats.assistant_turns += 1,
            }

            let Some(detected) = &turn.detected_intent else {
                continue;
            };

            for scored in &detected.top_intents {
                if scored.intent != UserIntent::Unknown {
                    *intent_counts.entry(scored.intent.label()).or_insert(0) += 1;
                }
            }

            for entity in &detected.entities {
                if entity.kind == EntityKind::Food {
                    *food_counts.entry(entity.value.clone()).or_insert(0) += 1;
                }
            }

            for flag in &detected.safety_flags {
                if flag.tier() == SafetyTier::Sensitive {
                    let fact = fact_for_flag(*flag);
                    if !learned_facts.contains(&fact) {
                        learned_facts.push(fact);
                    }
                }
            }
        }

        let patterns = intent_counts
            .into_iter()
            .filter(|(_, count)| *count >= RECURRENCE_THRESHOLD)
            .map(|(label, _)| format!("sujet récurrent : {label}"))
            .collect();

        let user_preferences = food_counts
            .into_iter()
            .filter(|(_, count)| *count >= RECURRENCE_THRESHOLD)
            .map(|(food, _)| format!("mentionne souvent : {food}"))
            .collect();

        ConversationMemory {
            user_preferences,
            patterns,
            conversation_stats: stats,
            learned_facts,
            last_updated: now,
        }
    }
}

fn fact_for_flag(flag: SafetyFlag) -> String {
    match flag {
        SafetyFlag::MinorUser => "utilisateur mineur".to_string(),
        SafetyFlag::PregnancyMention => "grossesse mentionnée".to_string(),
        SafetyFlag::DiabetesMention => "diabète mentionné".to_string(),
        SafetyFlag::AllergyMention => "allergie mentionnée".to_string(),
        other => other.label().to_string(),
    }
}

/// Background summarization task, fed by the session through a queue of
/// completed turns. Keeps the synchronous turn path free of summarization
/// latency; its writes to the shared cell are eventually consistent.
pub fn spawn_summarizer(
    mut queue: mpsc::Receiver<ConversationTurn>,
    cell: SharedMemory,
    summarizer: MemorySummarizer,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut buffer: Vec<ConversationTurn> = Vec::new();
        let mut user_turns_since_summary = 0u32;

        while let Some(turn) = queue.recv().await {
            if turn.role == Role::User {
                user_turns_since_summary += 1;
            }
            buffer.push(turn);
            if buffer.len() > BUFFER_CAP {
                let excess = buffer.len() - BUFFER_CAP;
                buffer.drain(0..excess);
            }

            if user_turns_since_summary >= summarizer.every_user_turns {
                let memory = summarizer.summarize(&buffer, Utc::now());
                debug!(
                    event_name = "memory.summary_regenerated",
                    turns = buffer.len(),
                    "conversation memory regenerated"
                );
                write_memory(&cell, memory);
                user_turns_since_summary = 0;
            }
        }
    })
}
