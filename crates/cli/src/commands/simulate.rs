use std::sync::Arc;

use nutricoach_core::{
    config::{AppConfig, LoadOptions},
    AgeBracket, ConversationContextFull, ConversationResponse, DayPart, Goal, InMemoryAuditSink,
    NutritionSnapshot, SessionId, SubscriptionTier, TemporalContext, UserInfo, WellnessSnapshot,
};
use nutricoach_engine::{CoachEngine, CoachSession};
use serde::Serialize;

use crate::commands::CommandResult;

#[derive(Debug, Serialize)]
struct SimulationReport {
    command: &'static str,
    tier: String,
    turns: Vec<SimulatedTurn>,
    audit_events: usize,
}

#[derive(Debug, Serialize)]
struct SimulatedTurn {
    message: String,
    response: ConversationResponse,
}

/// Runs messages through a rules-only engine against a deterministic
/// fixture context. No external orchestrator is involved, so output is
/// reproducible across runs.
pub fn run(messages: &[String], tier: SubscriptionTier) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure("simulate", "config", error.to_string(), 1);
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_time().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure("simulate", "runtime", error.to_string(), 1);
        }
    };

    let audit = Arc::new(InMemoryAuditSink::default());
    let engine = Arc::new(CoachEngine::rules_only(config, audit.clone()));
    // The session spawns its summarizer task and must be created inside the
    // runtime context.
    let _runtime_guard = runtime.enter();
    let mut session = CoachSession::new(engine, SessionId("simulate".to_string()));

    let mut turns = Vec::new();
    for message in messages {
        let outcome =
            runtime.block_on(session.process_message(message, fixture_context(tier)));
        match outcome {
            Ok(response) => {
                turns.push(SimulatedTurn { message: message.clone(), response });
            }
            Err(error) => {
                return CommandResult::failure("simulate", "turn", error.to_string(), 1);
            }
        }
    }

    let report = SimulationReport {
        command: "simulate",
        tier: tier.label().to_string(),
        turns,
        audit_events: audit.events().len(),
    };

    match serde_json::to_string_pretty(&report) {
        Ok(output) => CommandResult { exit_code: 0, output },
        Err(error) => CommandResult::failure("simulate", "serialization", error.to_string(), 1),
    }
}

fn fixture_context(tier: SubscriptionTier) -> ConversationContextFull {
    ConversationContextFull {
        user: UserInfo {
            user_id: "simulate-user".to_string(),
            first_name: Some("Camille".to_string()),
            goal: Goal::WeightLoss,
            age_bracket: AgeBracket::Adult,
            tier,
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
            sleep_hours_last_night: Some(6.0),
            stress_level: Some(7),
            mood: None,
        },
        correlations: Vec::new(),
        program: None,
        history: Vec::new(),
        temporal: TemporalContext {
            local_hour: 19,
            day_part: DayPart::Evening,
            is_weekend: false,
        },
        memory: None,
    }
}
