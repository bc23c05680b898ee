use serde::{Deserialize, Serialize};

use crate::domain::intent::{Sentiment, Urgency, UserIntent};
use crate::domain::memory::ConversationMemory;
use crate::domain::tier::SubscriptionTier;
use crate::domain::turn::{ConversationTurn, Role};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Goal {
    WeightLoss,
    Maintain,
    MuscleGain,
}

impl Goal {
    pub fn label_fr(&self) -> &'static str {
        match self {
            Goal::WeightLoss => "perte de poids",
            Goal::Maintain => "maintien",
            Goal::MuscleGain => "prise de muscle",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgeBracket {
    Under18,
    Adult,
    Senior,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub user_id: String,
    pub first_name: Option<String>,
    pub goal: Goal,
    pub age_bracket: AgeBracket,
    pub tier: SubscriptionTier,
    /// Fixed offset of the account's local timezone, used for the daily
    /// quota boundary. The caller refreshes it on DST changes.
    pub utc_offset_minutes: i32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NutritionSnapshot {
    pub calories_today: u32,
    pub calorie_target: u32,
    pub protein_today_g: u32,
    pub protein_target_g: u32,
    pub last_meal_hours_ago: Option<f32>,
    pub meals_logged_today: u8,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WellnessSnapshot {
    pub sleep_hours_last_night: Option<f32>,
    /// 1..=10 as reported by the user.
    pub stress_level: Option<u8>,
    pub mood: Option<Sentiment>,
}

/// A cross-signal correlation surfaced by the insight store, already
/// phrased for display.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Correlation {
    pub description: String,
    /// 0..=1, strength of the observed association.
    pub strength: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProgramState {
    pub active_program: Option<String>,
    pub streak_days: u32,
    pub points: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayPart {
    Morning,
    Midday,
    Afternoon,
    Evening,
    Night,
}

impl DayPart {
    pub fn from_local_hour(hour: u8) -> Self {
        match hour {
            5..=10 => DayPart::Morning,
            11..=13 => DayPart::Midday,
            14..=17 => DayPart::Afternoon,
            18..=22 => DayPart::Evening,
            _ => DayPart::Night,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TemporalContext {
    pub local_hour: u8,
    pub day_part: DayPart,
    pub is_weekend: bool,
}

/// The complete locally-held state for one session. Assembled by the caller
/// from the profile/nutrition/wellness stores; read-only to the engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationContextFull {
    pub user: UserInfo,
    pub nutrition: NutritionSnapshot,
    pub wellness: WellnessSnapshot,
    pub correlations: Vec<Correlation>,
    pub program: Option<ProgramState>,
    pub history: Vec<ConversationTurn>,
    pub temporal: TemporalContext,
    pub memory: Option<ConversationMemory>,
}

/// One history line in the compact projection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactTurn {
    pub role: Role,
    pub text: String,
}

/// Current-turn signal the generator needs. Safety-relevant: never truncated
/// by the compactor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompactSignal {
    pub primary_intent: UserIntent,
    pub sentiment: Sentiment,
    pub urgency: Urgency,
    pub day_part: DayPart,
}

/// Size-bounded projection of [`ConversationContextFull`] used only as
/// generator input. Recomputed every turn; never persisted; contains nothing
/// that is not derivable from the full context and the current message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationContextCompact {
    pub user_line: String,
    pub nutrition_line: String,
    pub wellness_line: String,
    pub recent_turns: Vec<CompactTurn>,
    pub correlations: Vec<String>,
    pub program_line: Option<String>,
    pub memory_summary: Option<String>,
    pub current_message: String,
    pub signal: CompactSignal,
    pub safety_note: Option<String>,
}

impl ConversationContextCompact {
    /// Total character count used against the compaction budget.
    pub fn char_len(&self) -> usize {
        let mut total = self.user_line.chars().count()
            + self.nutrition_line.chars().count()
            + self.wellness_line.chars().count()
            + self.current_message.chars().count();
        total += self
            .recent_turns
            .iter()
            .map(|turn| turn.text.chars().count())
            .sum::<usize>();
        total += self.correlations.iter().map(|line| line.chars().count()).sum::<usize>();
        if let Some(line) = &self.program_line {
            total += line.chars().count();
        }
        if let Some(summary) = &self.memory_summary {
            total += summary.chars().count();
        }
        if let Some(note) = &self.safety_note {
            total += note.chars().count();
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::DayPart;

    #[test]
    fn day_part_buckets_cover_all_hours() {
        assert_eq!(DayPart::from_local_hour(7), DayPart::Morning);
        assert_eq!(DayPart::from_local_hour(12), DayPart::Midday);
        assert_eq!(DayPart::from_local_hour(16), DayPart::Afternoon);
        assert_eq!(DayPart::from_local_hour(20), DayPart::Evening);
        assert_eq!(DayPart::from_local_hour(2), DayPart::Night);
        assert_eq!(DayPart::from_local_hour(23), DayPart::Night);
    }
}
