use nutricoach_core::config::{AppConfig, LoadOptions};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct ConfigReport {
    command: &'static str,
    status: &'static str,
    engine: EngineSection,
    generator: GeneratorSection,
    tiers: TiersSection,
    logging: LoggingSection,
}

#[derive(Debug, Serialize)]
struct EngineSection {
    history_window: usize,
    compact_budget_chars: usize,
    memory_summary_every_turns: u32,
    memory_summary_max_chars: usize,
}

#[derive(Debug, Serialize)]
struct GeneratorSection {
    mode: String,
    timeout_ms: u64,
    max_retries: u32,
}

#[derive(Debug, Serialize)]
struct TierSection {
    daily_messages: u32,
    llm_calls_per_day: u32,
    advanced_insights: bool,
}

#[derive(Debug, Serialize)]
struct TiersSection {
    free: TierSection,
    premium: TierSection,
}

#[derive(Debug, Serialize)]
struct LoggingSection {
    level: String,
    format: String,
}

pub fn run() -> String {
    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            let report = ConfigReport {
                command: "config",
                status: "ok",
                engine: EngineSection {
                    history_window: config.engine.history_window,
                    compact_budget_chars: config.engine.compact_budget_chars,
                    memory_summary_every_turns: config.engine.memory_summary_every_turns,
                    memory_summary_max_chars: config.engine.memory_summary_max_chars,
                },
                generator: GeneratorSection {
                    mode: format!("{:?}", config.generator.mode).to_lowercase(),
                    timeout_ms: config.generator.timeout_ms,
                    max_retries: config.generator.max_retries,
                },
                tiers: TiersSection {
                    free: tier_section(&config.tiers.free),
                    premium: tier_section(&config.tiers.premium),
                },
                logging: LoggingSection {
                    level: config.logging.level.clone(),
                    format: format!("{:?}", config.logging.format).to_lowercase(),
                },
            };
            serde_json::to_string_pretty(&report)
                .unwrap_or_else(|error| format!("{{\"status\":\"error\",\"message\":\"{error}\"}}"))
        }
        Err(error) => {
            format!("{{\"command\":\"config\",\"status\":\"error\",\"message\":\"{error}\"}}")
        }
    }
}

fn tier_section(config: &nutricoach_core::TierConfig) -> TierSection {
    TierSection {
        daily_messages: config.daily_messages,
        llm_calls_per_day: config.llm_calls_per_day,
        advanced_insights: config.advanced_insights,
    }
}
