use nutricoach_core::{
    CompactSignal, CompactTurn, ConversationContextCompact, ConversationContextFull,
    IntentDetectionResult, SafetyCheckResult,
};

/// What the compactor had to sacrifice to fit the budget, oldest and least
/// essential first. Recorded for the audit trail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompactionDrop {
    HistoryTurn,
    Correlation,
    ProgramState,
    MemorySummary,
    CurrentMessageTail,
}

#[derive(Clone, Debug)]
pub struct CompactionOutcome {
    pub context: ConversationContextCompact,
    pub dropped: Vec<CompactionDrop>,
    /// True when the budget could not be met even after maximal truncation.
    pub overflow: bool,
}

/// Projects the full session context into the size-bounded generator input.
///
/// Deterministic and pure: the same full context, message, and safety result
/// always produce the same compact form. Truncation order is fixed: oldest
/// history, then correlations, then program state, then the memory summary,
/// and only then the tail of the current message. The safety note and the
/// current-turn signal are never dropped.
#[derive(Clone, Debug)]
pub struct ContextCompactor {
    budget_chars: usize,
    history_window: usize,
    memory_summary_max_chars: usize,
}

/// Each projected history line is clamped so one verbose turn cannot starve
/// the rest of the projection.
const TURN_TEXT_MAX_CHARS: usize = 160;
/// Floor kept when the current message itself must be cut.
const CURRENT_MESSAGE_MIN_CHARS: usize = 280;

impl ContextCompactor {
    pub fn new(
        budget_chars: usize,
        history_window: usize,
        memory_summary_max_chars: usize,
    ) -> Self {
        Self { budget_chars, history_window, memory_summary_max_chars }
    }

    pub fn budget_chars(&self) -> usize {
        self.budget_chars
    }

    pub fn compact(
        &self,
        full: &ConversationContextFull,
        current_message: &str,
        detected: &IntentDetectionResult,
        safety: &SafetyCheckResult,
    ) -> CompactionOutcome {
        let mut context = self.project(full, current_message, detected, safety);
        let mut dropped = Vec::new();

        while context.char_len() > self.budget_chars && !context.recent_turns.is_empty() {
            context.recent_turns.remove(0);
            dropped.push(CompactionDrop::HistoryTurn);
        }

        while context.char_len() > self.budget_chars && !context.correlations.is_empty() {
            context.correlations.remove(0);
            dropped.push(CompactionDrop::Correlation);
        }

        if context.char_len() > self.budget_chars && context.program_line.is_some() {
            context.program_line = None;
            dropped.push(CompactionDrop::ProgramState);
        }

        if context.char_len() > self.budget_chars && context.memory_summary.is_some() {
            context.memory_summary = None;
            dropped.push(CompactionDrop::MemorySummary);
        }

        if context.char_len() > self.budget_chars {
            let over = context.char_len() - self.budget_chars;
            let message_chars = context.current_message.chars().count();
            let keep = message_chars
                .saturating_sub(over)
                .max(CURRENT_MESSAGE_MIN_CHARS.min(message_chars));
            if keep < message_chars {
                context.current_message =
                    context.current_message.chars().take(keep).collect();
                dropped.push(CompactionDrop::CurrentMessageTail);
            }
        }

        let overflow = context.char_len() > self.budget_chars;
        CompactionOutcome { context, dropped, overflow }
    }

    fn project(
        &self,
        full: &ConversationContextFull,
        current_message: &str,
        detected: &IntentDetectionResult,
        safety: &SafetyCheckResult,
    ) -> ConversationContextCompact {
        let user_line = format!(
            "objectif {} · {:?} · offre {}",
            full.user.goal.label_fr(),
            full.user.age_bracket,
            full.user.tier.label()
        );

        let nutrition_line = format!(
            "{}/{} kcal · {}/{} g protéines · {} repas",
            full.nutrition.calories_today,
            full.nutrition.calorie_target,
            full.nutrition.protein_today_g,
            full.nutrition.protein_target_g,
            full.nutrition.meals_logged_today
        );

        let mut wellness_parts = Vec::new();
        if let Some(sleep) = full.wellness.sleep_hours_last_night {
            wellness_parts.push(format!("sommeil {sleep:.1} h"));
        }
        if let Some(stress) = full.wellness.stress_level {
            wellness_parts.push(format!("stress {stress}/10"));
        }
        let wellness_line = if wellness_parts.is_empty() {
            "bien-être non renseigné".to_string()
        } else {
            wellness_parts.join(" · ")
        };

        let start = full.history.len().saturating_sub(self.history_window);
        let recent_turns = full.history[start..]
            .iter()
            .map(|turn| CompactTurn {
                role: turn.role,
                text: turn.content.chars().take(TURN_TEXT_MAX_CHARS).collect(),
            })
            .collect();

        let correlations = full
            .correlations
            .iter()
            .map(|correlation| correlation.description.clone())
            .collect();

        let program_line = full.program.as_ref().map(|program| {
            format!(
                "programme {} · série {} j · {} pts",
                program.active_program.as_deref().unwrap_or("libre"),
                program.streak_days,
                program.points
            )
        });

        let memory_summary = full
            .memory
            .as_ref()
            .map(|memory| memory.summary_line(self.memory_summary_max_chars))
            .filter(|line| !line.is_empty());

        let safety_note = if safety.flags.is_empty() {
            None
        } else {
            let labels =
                safety.flags.iter().map(|flag| flag.label()).collect::<Vec<_>>().join(", ");
            Some(format!("précautions: {labels}"))
        };

        ConversationContextCompact {
            user_line,
            nutrition_line,
            wellness_line,
            recent_turns,
            correlations,
            program_line,
            memory_summary,
            current_message: current_message.to_string(),
            signal: CompactSignal {
                primary_intent: detected.primary().intent,
                sentiment: detected.sentiment,
                urgency: detected.urgency,
                day_part: full.temporal.day_part,
            },
            safety_note,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use nutricoach_core::{
        AgeBracket, ConversationContextFull, ConversationMemory, ConversationTurn, Correlation,
        Goal, IntentDetectionResult, NutritionSnapshot, ProgramState, SafetyCheckResult,
        ScoredIntent, Sentiment, SubscriptionTier, TemporalContext, Urgency, UserInfo, UserIntent,
        WellnessSnapshot, DayPart,
    };

    use super::{CompactionDrop, ContextCompactor};

    fn detection() -> IntentDetectionResult {
        IntentDetectionResult::ranked(
            vec![ScoredIntent::new(UserIntent::Hunger, 0.8)],
            Vec::new(),
            Sentiment::Negative,
            Urgency::Normal,
            Vec::new(),
        )
    }

    fn full_context(history_turns: usize) -> ConversationContextFull {
        let mut memory = ConversationMemory::empty(Utc::now());
        memory.patterns = vec!["faim récurrente en soirée".to_string()];
        memory.user_preferences = vec!["repas rapides".to_string()];

        ConversationContextFull {
            user: UserInfo {
                user_id: "user-1".to_string(),
                first_name: Some("Camille".to_string()),
                goal: Goal::WeightLoss,
                age_bracket: AgeBracket::Adult,
                tier: SubscriptionTier::Premium,
                utc_offset_minutes: 60,
            },
            nutrition: NutritionSnapshot {
                calories_today: 1450,
                calorie_target: 1800,
                protein_today_g: 62,
                protein_target_g: 90,
                last_meal_hours_ago: Some(4.5),
                meals_logged_today: 3,
            },
            wellness: WellnessSnapshot {
                sleep_hours_last_night: Some(5.0),
                stress_level: Some(8),
                mood: Some(Sentiment::Negative),
            },
            correlations: vec![
                Correlation {
                    description: "les nuits courtes précèdent les fringales".to_string(),
                    strength: 0.7,
                },
                Correlation {
                    description: "le stress du soir augmente le grignotage".to_string(),
                    strength: 0.6,
                },
            ],
            program: Some(ProgramState {
                active_program: Some("équilibre 30 jours".to_string()),
                streak_days: 12,
                points: 340,
            }),
            history: (0..history_turns)
                .map(|index| {
                    ConversationTurn::user(format!("message numéro {index}"), detection())
                })
                .collect(),
            temporal: TemporalContext {
                local_hour: 21,
                day_part: DayPart::Evening,
                is_weekend: false,
            },
            memory: Some(memory),
        }
    }

    #[test]
    fn compact_projection_stays_within_budget() {
        let compactor = ContextCompactor::new(2800, 3, 240);
        let outcome = compactor.compact(
            &full_context(10),
            "j'ai super faim ce soir",
            &detection(),
            &SafetyCheckResult::allow(),
        );

        assert!(!outcome.overflow);
        assert!(outcome.context.char_len() <= 2800);
        assert_eq!(outcome.context.recent_turns.len(), 3);
        assert!(outcome.context.memory_summary.is_some());
    }

    #[test]
    fn truncation_drops_history_before_optional_fields() {
        let compactor = ContextCompactor::new(350, 6, 240);
        let outcome = compactor.compact(
            &full_context(6),
            "j'ai faim",
            &detection(),
            &SafetyCheckResult::allow(),
        );

        assert!(outcome.context.char_len() <= 350);
        assert!(outcome.dropped.contains(&CompactionDrop::HistoryTurn));
        // History goes first: if optional fields were dropped, every
        // history turn must already be gone.
        if outcome.dropped.contains(&CompactionDrop::MemorySummary) {
            assert!(outcome.context.recent_turns.is_empty());
        }
    }

    #[test]
    fn safety_note_survives_maximal_truncation() {
        let mut safety = SafetyCheckResult::allow();
        safety.flags = vec![nutricoach_core::SafetyFlag::PregnancyMention];

        let compactor = ContextCompactor::new(600, 3, 240);
        let outcome =
            compactor.compact(&full_context(8), "je suis enceinte", &detection(), &safety);

        let note = outcome.context.safety_note.expect("safety note kept");
        assert!(note.contains("pregnancy_mention"));
    }

    #[test]
    fn compaction_is_deterministic_and_idempotent_on_size() {
        let compactor = ContextCompactor::new(900, 3, 240);
        let full = full_context(8);
        let detected = detection();
        let safety = SafetyCheckResult::allow();

        let first = compactor.compact(&full, "j'ai faim", &detected, &safety);
        let second = compactor.compact(&full, "j'ai faim", &detected, &safety);

        assert_eq!(first.context, second.context);
        assert!(second.context.char_len() <= first.context.char_len());
    }

    #[test]
    fn current_message_is_cut_last_and_only_to_its_floor() {
        let long_message = "faim ".repeat(400);
        let compactor = ContextCompactor::new(600, 3, 240);
        let outcome = compactor.compact(
            &full_context(2),
            &long_message,
            &detection(),
            &SafetyCheckResult::allow(),
        );

        assert!(outcome.dropped.contains(&CompactionDrop::CurrentMessageTail));
        assert!(outcome.context.current_message.chars().count() >= 280);
        assert!(outcome.context.recent_turns.is_empty());
        assert!(outcome.context.memory_summary.is_none());
    }
}
