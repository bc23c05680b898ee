//! End-to-end turn scenarios through the public engine API.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use nutricoach_engine::{CoachEngine, CoachSession, DraftResponse, ResponseGenerator};
use nutricoach_core::{
    config::AppConfig, ActionType, AgeBracket, ConversationAction, ConversationContextCompact,
    ConversationContextFull, DayPart, GenerationPath, Goal, InMemoryAuditSink, NutritionSnapshot,
    Role, SafetyFlag, SessionId, SubscriptionTier, TemporalContext, UserInfo, UserIntent,
    WellnessSnapshot,
};

fn context(tier: SubscriptionTier, age_bracket: AgeBracket) -> ConversationContextFull {
    ConversationContextFull {
        user: UserInfo {
            user_id: "user-e2e".to_string(),
            first_name: Some("Alex".to_string()),
            goal: Goal::WeightLoss,
            age_bracket,
            tier,
            utc_offset_minutes: 60,
        },
        nutrition: NutritionSnapshot {
            calories_today: 1450,
            calorie_target: 1800,
            protein_today_g: 62,
            protein_target_g: 90,
            last_meal_hours_ago: Some(5.0),
            meals_logged_today: 3,
        },
        wellness: WellnessSnapshot {
            sleep_hours_last_night: Some(5.5),
            stress_level: Some(8),
            mood: None,
        },
        correlations: Vec::new(),
        program: None,
        history: Vec::new(),
        temporal: TemporalContext { local_hour: 21, day_part: DayPart::Evening, is_weekend: false },
        memory: None,
    }
}

fn rules_session() -> CoachSession {
    let engine = Arc::new(CoachEngine::rules_only(
        AppConfig::default(),
        Arc::new(InMemoryAuditSink::default()),
    ));
    CoachSession::new(engine, SessionId("e2e".to_string()))
}

#[tokio::test]
async fn french_hunger_and_stress_message_is_allowed_with_both_intents() {
    let mut session = rules_session();
    let response = session
        .process_message(
            "j'ai super faim et je stresse énormément",
            context(SubscriptionTier::Free, AgeBracket::Adult),
        )
        .await
        .expect("turn completes");

    // Not a refusal: a real coaching answer with actions.
    assert!(!response.actions.is_empty());
    assert!(response.disclaimer.is_none());

    let user_turn = &session.log().turns()[0];
    assert_eq!(user_turn.role, Role::User);
    let detected = user_turn.detected_intent.as_ref().expect("intent recorded");
    assert!(detected.mentions(UserIntent::Hunger));
    assert!(detected.mentions(UserIntent::Stress));
    assert!(detected.safety_flags.is_empty());
}

#[tokio::test]
async fn minor_with_restrictive_eating_is_refused_with_empty_actions() {
    let mut session = rules_session();
    let response = session
        .process_message(
            "je veux sauter tous les repas pour maigrir",
            context(SubscriptionTier::Free, AgeBracket::Under18),
        )
        .await
        .expect("refusal is a valid outcome");

    assert!(response.actions.is_empty());
    assert!(response.message.contains("professionnel"));

    let detected = session.log().turns()[0].detected_intent.as_ref().expect("intent");
    assert!(detected.safety_flags.contains(&SafetyFlag::ExtremeRestriction));
    // The profile-based minor flag is added by the guard, after extraction:
    // it shows up in the response behavior, not in the per-turn extraction.
    assert!(session.log().turns()[1].response.as_ref().is_some_and(|r| r.actions.is_empty()));
}

struct AdjustProposingGenerator;

#[async_trait]
impl ResponseGenerator for AdjustProposingGenerator {
    async fn generate(
        &self,
        _context: &ConversationContextCompact,
        _allowed_actions: &[ActionType],
    ) -> Result<DraftResponse> {
        let mut action = ConversationAction::new(ActionType::AdjustCalories, "Ajuster");
        action.requires_confirmation = false;

        Ok(DraftResponse {
            message: "Je te propose d'ajuster ton objectif calorique.".to_string(),
            diagnosis: None,
            short_term_plan: Vec::new(),
            candidate_actions: vec![action],
            ui: None,
        })
    }
}

#[tokio::test]
async fn premium_calorie_adjustment_always_requires_confirmation() {
    let engine = Arc::new(CoachEngine::new(
        AppConfig::default(),
        Arc::new(AdjustProposingGenerator),
        Arc::new(InMemoryAuditSink::default()),
    ));
    let mut session = CoachSession::new(engine, SessionId("e2e-premium".to_string()));

    let response = session
        .process_message(
            "je veux ajuster mes calories",
            context(SubscriptionTier::Premium, AgeBracket::Adult),
        )
        .await
        .expect("turn completes");

    let action = response
        .actions
        .iter()
        .find(|action| action.action_type == ActionType::AdjustCalories)
        .expect("calorie adjustment gated through for premium");
    assert!(action.requires_confirmation, "permission entry must override the generator");
    assert!(action.is_premium);
}

#[tokio::test]
async fn free_tier_never_receives_the_calorie_adjustment() {
    let engine = Arc::new(CoachEngine::new(
        AppConfig::default(),
        Arc::new(AdjustProposingGenerator),
        Arc::new(InMemoryAuditSink::default()),
    ));
    let mut session = CoachSession::new(engine, SessionId("e2e-free".to_string()));

    let response = session
        .process_message(
            "je veux ajuster mes calories",
            context(SubscriptionTier::Free, AgeBracket::Adult),
        )
        .await
        .expect("turn completes");

    assert!(response
        .actions
        .iter()
        .all(|action| action.action_type != ActionType::AdjustCalories));
}

#[tokio::test]
async fn sixth_message_of_the_day_is_accepted_on_the_rules_path() {
    let engine = Arc::new(CoachEngine::new(
        AppConfig::default(),
        Arc::new(AdjustProposingGenerator),
        Arc::new(InMemoryAuditSink::default()),
    ));
    let mut session = CoachSession::new(engine, SessionId("e2e-quota".to_string()));

    let mut responses = Vec::new();
    for _ in 0..6 {
        responses.push(
            session
                .process_message(
                    "j'ai faim",
                    context(SubscriptionTier::Free, AgeBracket::Adult),
                )
                .await
                .expect("within the 10-message budget"),
        );
    }

    // First turn used the single free llm call; the rest are rules.
    assert_eq!(responses[0].meta.path, GenerationPath::Hybrid);
    for response in &responses[1..] {
        assert_eq!(response.meta.path, GenerationPath::Rules);
        assert!(!response.meta.degraded);
    }
    assert_eq!(session.log().len(), 12, "all six exchanges are persisted");
}

#[tokio::test]
async fn every_emitted_action_is_whitelisted_and_tier_permitted() {
    let mut session = rules_session();
    let whitelist = nutricoach_core::ActionWhitelist::default();

    for text in [
        "j'ai super faim",
        "je stresse trop",
        "une idée de repas ?",
        "où j'en suis dans mes progres ?",
        "bonjour",
    ] {
        let response = session
            .process_message(text, context(SubscriptionTier::Free, AgeBracket::Adult))
            .await
            .expect("turn completes");

        for action in &response.actions {
            let permission = whitelist
                .lookup(action.action_type)
                .expect("every emitted action is in the closed whitelist");
            assert!(
                permission.allows_tier(SubscriptionTier::Free),
                "{} must be permitted for the free tier",
                action.action_type.key()
            );
        }
    }
}
