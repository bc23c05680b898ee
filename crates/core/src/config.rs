use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::tier::{TierConfig, TierTable};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub generator: GeneratorConfig,
    pub tiers: TierTable,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Turns of history projected into the compact context.
    pub history_window: usize,
    /// Hard character budget for the compact context.
    pub compact_budget_chars: usize,
    /// Regenerate the conversation memory every N user turns.
    pub memory_summary_every_turns: u32,
    /// Clamp applied to the memory summary line in the compact context.
    pub memory_summary_max_chars: usize,
}

#[derive(Clone, Debug)]
pub struct GeneratorConfig {
    pub mode: GenerationMode,
    pub timeout_ms: u64,
    pub max_retries: u32,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    Rules,
    Hybrid,
    Llm,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub generation_mode: Option<GenerationMode>,
    pub generator_timeout_ms: Option<u64>,
    pub compact_budget_chars: Option<usize>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig {
                history_window: 3,
                compact_budget_chars: 2800,
                memory_summary_every_turns: 10,
                memory_summary_max_chars: 240,
            },
            generator: GeneratorConfig {
                mode: GenerationMode::Hybrid,
                timeout_ms: 8_000,
                max_retries: 1,
            },
            tiers: TierTable::default(),
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for GenerationMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "rules" => Ok(Self::Rules),
            "hybrid" => Ok(Self::Hybrid),
            "llm" => Ok(Self::Llm),
            other => Err(ConfigError::Validation(format!(
                "unsupported generation mode `{other}` (expected rules|hybrid|llm)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("nutricoach.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(engine) = patch.engine {
            if let Some(history_window) = engine.history_window {
                self.engine.history_window = history_window;
            }
            if let Some(compact_budget_chars) = engine.compact_budget_chars {
                self.engine.compact_budget_chars = compact_budget_chars;
            }
            if let Some(every_turns) = engine.memory_summary_every_turns {
                self.engine.memory_summary_every_turns = every_turns;
            }
            if let Some(max_chars) = engine.memory_summary_max_chars {
                self.engine.memory_summary_max_chars = max_chars;
            }
        }

        if let Some(generator) = patch.generator {
            if let Some(mode) = generator.mode {
                self.generator.mode = mode;
            }
            if let Some(timeout_ms) = generator.timeout_ms {
                self.generator.timeout_ms = timeout_ms;
            }
            if let Some(max_retries) = generator.max_retries {
                self.generator.max_retries = max_retries;
            }
        }

        if let Some(tiers) = patch.tiers {
            if let Some(free) = tiers.free {
                apply_tier_patch(&mut self.tiers.free, free);
            }
            if let Some(premium) = tiers.premium {
                apply_tier_patch(&mut self.tiers.premium, premium);
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("NUTRICOACH_ENGINE_HISTORY_WINDOW") {
            self.engine.history_window =
                parse_usize("NUTRICOACH_ENGINE_HISTORY_WINDOW", &value)?;
        }
        if let Some(value) = read_env("NUTRICOACH_ENGINE_COMPACT_BUDGET_CHARS") {
            self.engine.compact_budget_chars =
                parse_usize("NUTRICOACH_ENGINE_COMPACT_BUDGET_CHARS", &value)?;
        }
        if let Some(value) = read_env("NUTRICOACH_GENERATOR_MODE") {
            self.generator.mode = value.parse()?;
        }
        if let Some(value) = read_env("NUTRICOACH_GENERATOR_TIMEOUT_MS") {
            self.generator.timeout_ms = parse_u64("NUTRICOACH_GENERATOR_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = read_env("NUTRICOACH_GENERATOR_MAX_RETRIES") {
            self.generator.max_retries = parse_u32("NUTRICOACH_GENERATOR_MAX_RETRIES", &value)?;
        }

        if let Some(value) = read_env("NUTRICOACH_TIERS_FREE_DAILY_MESSAGES") {
            self.tiers.free.daily_messages =
                parse_u32("NUTRICOACH_TIERS_FREE_DAILY_MESSAGES", &value)?;
        }
        if let Some(value) = read_env("NUTRICOACH_TIERS_FREE_LLM_CALLS_PER_DAY") {
            self.tiers.free.llm_calls_per_day =
                parse_u32("NUTRICOACH_TIERS_FREE_LLM_CALLS_PER_DAY", &value)?;
        }
        if let Some(value) = read_env("NUTRICOACH_TIERS_PREMIUM_DAILY_MESSAGES") {
            self.tiers.premium.daily_messages =
                parse_u32("NUTRICOACH_TIERS_PREMIUM_DAILY_MESSAGES", &value)?;
        }
        if let Some(value) = read_env("NUTRICOACH_TIERS_PREMIUM_LLM_CALLS_PER_DAY") {
            self.tiers.premium.llm_calls_per_day =
                parse_u32("NUTRICOACH_TIERS_PREMIUM_LLM_CALLS_PER_DAY", &value)?;
        }

        let log_level =
            read_env("NUTRICOACH_LOGGING_LEVEL").or_else(|| read_env("NUTRICOACH_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("NUTRICOACH_LOGGING_FORMAT").or_else(|| read_env("NUTRICOACH_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(mode) = overrides.generation_mode {
            self.generator.mode = mode;
        }
        if let Some(timeout_ms) = overrides.generator_timeout_ms {
            self.generator.timeout_ms = timeout_ms;
        }
        if let Some(budget) = overrides.compact_budget_chars {
            self.engine.compact_budget_chars = budget;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_engine(&self.engine)?;
        validate_generator(&self.generator)?;
        validate_tiers(&self.tiers)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn apply_tier_patch(config: &mut TierConfig, patch: TierPatch) {
    if let Some(daily_messages) = patch.daily_messages {
        config.daily_messages = daily_messages;
    }
    if let Some(llm_calls_per_day) = patch.llm_calls_per_day {
        config.llm_calls_per_day = llm_calls_per_day;
    }
    if let Some(advanced_insights) = patch.advanced_insights {
        config.advanced_insights = advanced_insights;
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("nutricoach.toml"), PathBuf::from("config/nutricoach.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_engine(engine: &EngineConfig) -> Result<(), ConfigError> {
    if engine.history_window == 0 || engine.history_window > 20 {
        return Err(ConfigError::Validation(
            "engine.history_window must be in range 1..=20".to_string(),
        ));
    }

    if engine.compact_budget_chars < 600 || engine.compact_budget_chars > 20_000 {
        return Err(ConfigError::Validation(
            "engine.compact_budget_chars must be in range 600..=20000".to_string(),
        ));
    }

    if engine.memory_summary_every_turns == 0 {
        return Err(ConfigError::Validation(
            "engine.memory_summary_every_turns must be greater than zero".to_string(),
        ));
    }

    if engine.memory_summary_max_chars == 0
        || engine.memory_summary_max_chars >= engine.compact_budget_chars
    {
        return Err(ConfigError::Validation(
            "engine.memory_summary_max_chars must be non-zero and below the compact budget"
                .to_string(),
        ));
    }

    Ok(())
}

fn validate_generator(generator: &GeneratorConfig) -> Result<(), ConfigError> {
    if generator.timeout_ms == 0 || generator.timeout_ms > 120_000 {
        return Err(ConfigError::Validation(
            "generator.timeout_ms must be in range 1..=120000".to_string(),
        ));
    }

    if generator.max_retries > 5 {
        return Err(ConfigError::Validation(
            "generator.max_retries must be at most 5".to_string(),
        ));
    }

    Ok(())
}

fn validate_tiers(tiers: &TierTable) -> Result<(), ConfigError> {
    for (name, config) in [("free", &tiers.free), ("premium", &tiers.premium)] {
        if config.daily_messages == 0 {
            return Err(ConfigError::Validation(format!(
                "tiers.{name}.daily_messages must be greater than zero"
            )));
        }
        if config.llm_calls_per_day > config.daily_messages {
            return Err(ConfigError::Validation(format!(
                "tiers.{name}.llm_calls_per_day cannot exceed daily_messages"
            )));
        }
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    engine: Option<EnginePatch>,
    generator: Option<GeneratorPatch>,
    tiers: Option<TiersPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct EnginePatch {
    history_window: Option<usize>,
    compact_budget_chars: Option<usize>,
    memory_summary_every_turns: Option<u32>,
    memory_summary_max_chars: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct GeneratorPatch {
    mode: Option<GenerationMode>,
    timeout_ms: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct TiersPatch {
    free: Option<TierPatch>,
    premium: Option<TierPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct TierPatch {
    daily_messages: Option<u32>,
    llm_calls_per_day: Option<u32>,
    advanced_insights: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
