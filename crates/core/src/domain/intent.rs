use serde::{Deserialize, Serialize};

use crate::domain::safety::SafetyFlag;

/// Closed set of purposes a user message can be classified as.
///
/// Declaration order is the fixed priority order used to break confidence
/// ties: distress outranks everything, day-to-day coaching intents outrank
/// informational ones, `Unknown` always loses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserIntent {
    EmotionalDistress,
    Hunger,
    Craving,
    Stress,
    Sleep,
    Energy,
    PlanAdjustment,
    ProgressCheck,
    MealIdea,
    NutritionQuestion,
    Motivation,
    Greeting,
    Unknown,
}

impl UserIntent {
    /// Tie-break priority. Higher wins when confidences are equal.
    pub fn priority(&self) -> u8 {
        match self {
            UserIntent::EmotionalDistress => 120,
            UserIntent::Hunger => 90,
            UserIntent::Craving => 85,
            UserIntent::Stress => 80,
            UserIntent::Sleep => 75,
            UserIntent::Energy => 70,
            UserIntent::PlanAdjustment => 60,
            UserIntent::ProgressCheck => 55,
            UserIntent::MealIdea => 50,
            UserIntent::NutritionQuestion => 45,
            UserIntent::Motivation => 40,
            UserIntent::Greeting => 20,
            UserIntent::Unknown => 0,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            UserIntent::EmotionalDistress => "emotional_distress",
            UserIntent::Hunger => "hunger",
            UserIntent::Craving => "craving",
            UserIntent::Stress => "stress",
            UserIntent::Sleep => "sleep",
            UserIntent::Energy => "energy",
            UserIntent::PlanAdjustment => "plan_adjustment",
            UserIntent::ProgressCheck => "progress_check",
            UserIntent::MealIdea => "meal_idea",
            UserIntent::NutritionQuestion => "nutrition_question",
            UserIntent::Motivation => "motivation",
            UserIntent::Greeting => "greeting",
            UserIntent::Unknown => "unknown",
        }
    }
}

/// One ranked intent candidate. Confidence is clamped to `[0, 1]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoredIntent {
    pub intent: UserIntent,
    pub confidence: f32,
}

impl ScoredIntent {
    pub fn new(intent: UserIntent, confidence: f32) -> Self {
        Self { intent, confidence: confidence.clamp(0.0, 1.0) }
    }
}

/// Half-open character span `[start, end)` over the normalized message text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Food,
    MealMoment,
    Quantity,
    Duration,
    BodyMetric,
    Emotion,
}

/// An extracted entity with its normalized value and source span.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub kind: EntityKind,
    pub value: String,
    pub span: Span,
}

/// Coarse message sentiment. Discrete on purpose: downstream policy code
/// matches on it, it is not a score.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Negative,
    Neutral,
    Positive,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    Normal,
    High,
}

/// Output of the extractor for one user turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntentDetectionResult {
    /// 1 to 3 intents, sorted by confidence descending, ties broken by
    /// [`UserIntent::priority`]. Never empty.
    pub top_intents: Vec<ScoredIntent>,
    pub entities: Vec<Entity>,
    pub sentiment: Sentiment,
    pub urgency: Urgency,
    pub safety_flags: Vec<SafetyFlag>,
}

pub const MAX_TOP_INTENTS: usize = 3;

impl IntentDetectionResult {
    /// Rank candidates into a valid `top_intents` list. Falls back to a
    /// low-confidence `Unknown` instead of returning an empty list.
    pub fn ranked(
        mut candidates: Vec<ScoredIntent>,
        entities: Vec<Entity>,
        sentiment: Sentiment,
        urgency: Urgency,
        safety_flags: Vec<SafetyFlag>,
    ) -> Self {
        candidates.retain(|scored| scored.confidence > 0.0);
        candidates.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.intent.priority().cmp(&a.intent.priority()))
        });
        candidates.truncate(MAX_TOP_INTENTS);

        if candidates.is_empty() {
            candidates.push(ScoredIntent::new(UserIntent::Unknown, 0.2));
        }

        Self { top_intents: candidates, entities, sentiment, urgency, safety_flags }
    }

    pub fn primary(&self) -> &ScoredIntent {
        // `ranked` guarantees at least one element.
        &self.top_intents[0]
    }

    pub fn mentions(&self, intent: UserIntent) -> bool {
        self.top_intents.iter().any(|scored| scored.intent == intent)
    }
}

#[cfg(test)]
mod tests {
    use super::{
        Entity, EntityKind, IntentDetectionResult, ScoredIntent, Sentiment, Span, Urgency,
        UserIntent,
    };

    #[test]
    fn ranked_sorts_by_confidence_then_priority() {
        let result = IntentDetectionResult::ranked(
            vec![
                ScoredIntent::new(UserIntent::Greeting, 0.5),
                ScoredIntent::new(UserIntent::Hunger, 0.5),
                ScoredIntent::new(UserIntent::Stress, 0.8),
            ],
            Vec::new(),
            Sentiment::Neutral,
            Urgency::Normal,
            Vec::new(),
        );

        let order =
            result.top_intents.iter().map(|scored| scored.intent).collect::<Vec<_>>();
        assert_eq!(order, vec![UserIntent::Stress, UserIntent::Hunger, UserIntent::Greeting]);
    }

    #[test]
    fn ranked_truncates_to_three_and_never_returns_empty() {
        let full = IntentDetectionResult::ranked(
            vec![
                ScoredIntent::new(UserIntent::Hunger, 0.9),
                ScoredIntent::new(UserIntent::Stress, 0.8),
                ScoredIntent::new(UserIntent::Sleep, 0.7),
                ScoredIntent::new(UserIntent::Energy, 0.6),
            ],
            Vec::new(),
            Sentiment::Neutral,
            Urgency::Normal,
            Vec::new(),
        );
        assert_eq!(full.top_intents.len(), 3);

        let empty = IntentDetectionResult::ranked(
            Vec::new(),
            Vec::new(),
            Sentiment::Neutral,
            Urgency::Normal,
            Vec::new(),
        );
        assert_eq!(empty.top_intents.len(), 1);
        assert_eq!(empty.primary().intent, UserIntent::Unknown);
        assert!(empty.primary().confidence < 0.5);
    }

    #[test]
    fn zero_confidence_candidates_are_dropped() {
        let result = IntentDetectionResult::ranked(
            vec![
                ScoredIntent::new(UserIntent::Hunger, 0.0),
                ScoredIntent::new(UserIntent::Stress, 0.4),
            ],
            Vec::new(),
            Sentiment::Neutral,
            Urgency::Normal,
            Vec::new(),
        );
        assert_eq!(result.top_intents.len(), 1);
        assert_eq!(result.primary().intent, UserIntent::Stress);
    }

    #[test]
    fn confidence_is_clamped_to_unit_interval() {
        assert_eq!(ScoredIntent::new(UserIntent::Hunger, 1.7).confidence, 1.0);
        assert_eq!(ScoredIntent::new(UserIntent::Hunger, -0.3).confidence, 0.0);
    }

    #[test]
    fn span_overlap_is_strict() {
        let entity = Entity {
            kind: EntityKind::Food,
            value: "chocolat".to_string(),
            span: Span::new(4, 12),
        };
        assert!(entity.span.overlaps(&Span::new(10, 14)));
        assert!(!entity.span.overlaps(&Span::new(12, 14)));
        assert_eq!(entity.span.len(), 8);
    }
}
