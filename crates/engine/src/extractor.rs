use nutricoach_core::{
    ConversationTurn, Entity, EntityKind, IntentDetectionResult, Role, ScoredIntent, Sentiment,
    Span, Urgency, UserIntent,
};

use crate::safety::scan_safety_signals;
use crate::text::{char_match_indices, normalize_text};

/// Turns raw message text into ranked intents, span entities, and coarse
/// sentiment/urgency classifications.
///
/// The extractor never fails: unparseable input degrades to a low-confidence
/// `Unknown` intent instead of an error.
#[derive(Clone, Debug, Default)]
pub struct IntentExtractor;

impl IntentExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(
        &self,
        text: &str,
        prior_turn: Option<&ConversationTurn>,
    ) -> IntentDetectionResult {
        let normalized = normalize_text(text);

        let mut candidates = score_intents(&normalized);
        if candidates.is_empty() {
            if let Some(inherited) = inherit_from_prior_turn(prior_turn) {
                candidates.push(inherited);
            }
        }

        let entities = extract_entities(&normalized);
        let sentiment = classify_sentiment(&normalized);
        let urgency = classify_urgency(&normalized, &candidates);
        let safety_flags = scan_safety_signals(&normalized);

        IntentDetectionResult::ranked(candidates, entities, sentiment, urgency, safety_flags)
    }
}

/// Co-reference fallback: a message with no lexicon signal of its own
/// ("et du coup ?") continues the previous user turn's topic at reduced
/// confidence.
fn inherit_from_prior_turn(prior_turn: Option<&ConversationTurn>) -> Option<ScoredIntent> {
    let turn = prior_turn?;
    if turn.role != Role::User {
        return None;
    }
    let detected = turn.detected_intent.as_ref()?;
    let primary = detected.primary();
    if primary.intent == UserIntent::Unknown {
        return None;
    }
    Some(ScoredIntent::new(primary.intent, primary.confidence * 0.6))
}

fn intent_lexicon(intent: UserIntent) -> &'static [&'static str] {
    match intent {
        UserIntent::EmotionalDistress => &[
            "je craque",
            "je n'en peux plus",
            "j'en peux plus",
            "au bout du rouleau",
            "plus envie de rien",
            "envie de pleurer",
            "je me sens seule",
            "je me sens seul",
        ],
        UserIntent::Hunger => &[
            "faim",
            "creux",
            "envie de manger",
            "ventre vide",
            "affame",
            "hungry",
            "hunger",
        ],
        UserIntent::Craving => &[
            "fringale",
            "envie de sucre",
            "envie de chocolat",
            "craquer sur",
            "grignoter",
            "grignotage",
            "craving",
        ],
        UserIntent::Stress => &[
            "stress",
            "stresse",
            "anxieux",
            "anxieuse",
            "angoisse",
            "tendu",
            "tendue",
            "sous pression",
            "deborde",
            "debordee",
        ],
        UserIntent::Sleep => &[
            "sommeil",
            "mal dormi",
            "insomnie",
            "nuit blanche",
            "je dors mal",
            "me coucher",
            "sleep",
        ],
        UserIntent::Energy => &[
            "fatigue",
            "fatiguee",
            "epuise",
            "epuisee",
            "crevee",
            "creve",
            "coup de barre",
            "sans energie",
            "a plat",
        ],
        UserIntent::PlanAdjustment => &[
            "ajuster",
            "augmenter mes calories",
            "reduire mes calories",
            "baisser mes calories",
            "changer mon objectif",
            "modifier mon plan",
            "recalculer",
        ],
        UserIntent::ProgressCheck => &[
            "progres",
            "resultats",
            "bilan",
            "ou j'en suis",
            "mon poids a",
            "ma courbe",
            "mes stats",
        ],
        UserIntent::MealIdea => &[
            "idee repas",
            "idee de repas",
            "quoi manger",
            "quoi cuisiner",
            "recette",
            "une idee pour ce soir",
            "menu",
        ],
        UserIntent::NutritionQuestion => &[
            "proteine",
            "proteines",
            "calories dans",
            "combien de calories",
            "glucides",
            "lipides",
            "vitamine",
            "est-ce que je peux manger",
            "c'est bon pour",
        ],
        UserIntent::Motivation => &[
            "motivation",
            "demotive",
            "demotivee",
            "abandonner",
            "j'y arrive pas",
            "je n'y arrive pas",
            "tout lacher",
            "a quoi bon",
        ],
        UserIntent::Greeting => &["bonjour", "bonsoir", "salut", "coucou", "hello"],
        UserIntent::Unknown => &[],
    }
}

const SCORED_INTENTS: [UserIntent; 12] = [
    UserIntent::EmotionalDistress,
    UserIntent::Hunger,
    UserIntent::Craving,
    UserIntent::Stress,
    UserIntent::Sleep,
    UserIntent::Energy,
    UserIntent::PlanAdjustment,
    UserIntent::ProgressCheck,
    UserIntent::MealIdea,
    UserIntent::NutritionQuestion,
    UserIntent::Motivation,
    UserIntent::Greeting,
];

fn score_intents(normalized: &str) -> Vec<ScoredIntent> {
    let mut candidates = Vec::new();

    for intent in SCORED_INTENTS {
        let hits = intent_lexicon(intent)
            .iter()
            .filter(|term| normalized.contains(*term))
            .count();
        if hits == 0 {
            continue;
        }

        let confidence = 0.45 + 0.18 * (hits as f32 - 1.0);
        candidates.push(ScoredIntent::new(intent, confidence.min(0.95)));
    }

    candidates
}

struct EntityLexicon {
    kind: EntityKind,
    terms: &'static [&'static str],
}

const ENTITY_LEXICONS: [EntityLexicon; 4] = [
    EntityLexicon {
        kind: EntityKind::Food,
        terms: &[
            "chocolat", "pomme", "banane", "poulet", "oeuf", "oeufs", "pain", "fromage", "yaourt",
            "salade", "pates", "riz", "poisson", "legumes", "soupe", "gateau", "biscuits", "cafe",
        ],
    },
    EntityLexicon {
        kind: EntityKind::MealMoment,
        terms: &[
            "petit dejeuner",
            "petit-dejeuner",
            "dejeuner",
            "diner",
            "gouter",
            "collation",
            "brunch",
        ],
    },
    EntityLexicon {
        kind: EntityKind::BodyMetric,
        terms: &["poids", "balance", "tour de taille", "imc"],
    },
    EntityLexicon {
        kind: EntityKind::Emotion,
        terms: &[
            "stress", "stresse", "triste", "anxieux", "anxieuse", "angoisse", "coupable",
            "fier", "fiere", "contente", "content", "marre",
        ],
    },
];

fn extract_entities(normalized: &str) -> Vec<Entity> {
    let mut candidates = Vec::new();

    for lexicon in &ENTITY_LEXICONS {
        for term in lexicon.terms {
            for start in char_match_indices(normalized, term) {
                candidates.push(Entity {
                    kind: lexicon.kind,
                    value: (*term).to_string(),
                    span: Span::new(start, start + term.chars().count()),
                });
            }
        }
    }

    candidates.extend(extract_measured_entities(normalized));
    resolve_overlaps(candidates)
}

/// Number + unit entities: quantities ("200 g", "1500 kcal") and durations
/// ("30 minutes", "2 jours").
fn extract_measured_entities(normalized: &str) -> Vec<Entity> {
    const QUANTITY_UNITS: [&str; 8] =
        ["g", "kg", "ml", "l", "kcal", "cal", "calories", "grammes"];
    const DURATION_UNITS: [&str; 7] =
        ["min", "minutes", "h", "heures", "jours", "semaines", "mois"];

    let chars = normalized.chars().collect::<Vec<_>>();
    let mut entities = Vec::new();
    let mut index = 0;

    while index < chars.len() {
        if !chars[index].is_ascii_digit() {
            index += 1;
            continue;
        }

        let number_start = index;
        while index < chars.len() && (chars[index].is_ascii_digit() || chars[index] == '.') {
            index += 1;
        }

        let mut unit_start = index;
        while unit_start < chars.len() && chars[unit_start] == ' ' {
            unit_start += 1;
        }
        let mut unit_end = unit_start;
        while unit_end < chars.len() && chars[unit_end].is_ascii_alphabetic() {
            unit_end += 1;
        }

        let unit = chars[unit_start..unit_end].iter().collect::<String>();
        let kind = if QUANTITY_UNITS.contains(&unit.as_str()) {
            Some(EntityKind::Quantity)
        } else if DURATION_UNITS.contains(&unit.as_str()) {
            Some(EntityKind::Duration)
        } else {
            None
        };

        if let Some(kind) = kind {
            let value = chars[number_start..unit_end].iter().collect::<String>();
            entities.push(Entity { kind, value, span: Span::new(number_start, unit_end) });
            index = unit_end;
        }
    }

    entities
}

/// Overlapping spans are resolved by preferring the longer match; equal
/// lengths keep the earliest.
fn resolve_overlaps(mut candidates: Vec<Entity>) -> Vec<Entity> {
    candidates.sort_by(|a, b| {
        b.span
            .len()
            .cmp(&a.span.len())
            .then_with(|| a.span.start.cmp(&b.span.start))
    });

    let mut kept: Vec<Entity> = Vec::new();
    for candidate in candidates {
        if kept.iter().all(|existing| !existing.span.overlaps(&candidate.span)) {
            kept.push(candidate);
        }
    }

    kept.sort_by_key(|entity| entity.span.start);
    kept
}

const NEGATIVE_TERMS: [&str; 16] = [
    "stress", "stresse", "triste", "fatigue", "epuise", "marre", "angoisse", "deprime",
    "coupable", "honte", "mal", "nul", "dur", "difficile", "craque", "decourage",
];

const POSITIVE_TERMS: [&str; 10] = [
    "content", "heureux", "heureuse", "fier", "fiere", "motive", "genial", "top", "reussi",
    "en forme",
];

fn classify_sentiment(normalized: &str) -> Sentiment {
    let negative = NEGATIVE_TERMS.iter().filter(|term| normalized.contains(*term)).count();
    let positive = POSITIVE_TERMS.iter().filter(|term| normalized.contains(*term)).count();

    if negative > positive {
        Sentiment::Negative
    } else if positive > negative {
        Sentiment::Positive
    } else {
        Sentiment::Neutral
    }
}

const URGENCY_TERMS: [&str; 8] = [
    "urgent",
    "urgence",
    "tout de suite",
    "maintenant",
    "vite",
    "immediatement",
    "au secours",
    "help",
];

fn classify_urgency(normalized: &str, candidates: &[ScoredIntent]) -> Urgency {
    if URGENCY_TERMS.iter().any(|term| normalized.contains(term)) {
        return Urgency::High;
    }

    let only_greeting = !candidates.is_empty()
        && candidates.iter().all(|scored| scored.intent == UserIntent::Greeting);
    if only_greeting {
        Urgency::Low
    } else {
        Urgency::Normal
    }
}
