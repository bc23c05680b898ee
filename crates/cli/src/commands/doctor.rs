use nutricoach_core::{
    config::{AppConfig, LoadOptions},
    ActionRisk, ActionType, ActionWhitelist,
};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                error.to_string().replace('"', "\\\"")
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_tier_budgets(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.push(DoctorCheck {
                name: "tier_budget_sanity",
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            });
        }
    }

    checks.push(check_whitelist_integrity());

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_tier_budgets(config: &AppConfig) -> DoctorCheck {
    let free = &config.tiers.free;
    let premium = &config.tiers.premium;

    if premium.daily_messages < free.daily_messages
        || premium.llm_calls_per_day < free.llm_calls_per_day
    {
        return DoctorCheck {
            name: "tier_budget_sanity",
            status: CheckStatus::Fail,
            details: "premium budgets must not be below free budgets".to_string(),
        };
    }

    DoctorCheck {
        name: "tier_budget_sanity",
        status: CheckStatus::Pass,
        details: format!(
            "free {}/{} · premium {}/{} (messages/llm calls)",
            free.daily_messages,
            free.llm_calls_per_day,
            premium.daily_messages,
            premium.llm_calls_per_day
        ),
    }
}

/// The whitelist is the contract boundary with the action executor: every
/// action type appears exactly once, and high-risk entries always require
/// confirmation.
fn check_whitelist_integrity() -> DoctorCheck {
    let whitelist = ActionWhitelist::default();

    if whitelist.version == 0 {
        return DoctorCheck {
            name: "whitelist_integrity",
            status: CheckStatus::Fail,
            details: "whitelist version must be non-zero".to_string(),
        };
    }

    for action_type in ActionType::ALL {
        let count = whitelist
            .entries
            .iter()
            .filter(|entry| entry.action_type == action_type)
            .count();
        if count != 1 {
            return DoctorCheck {
                name: "whitelist_integrity",
                status: CheckStatus::Fail,
                details: format!(
                    "{} appears {count} times in the whitelist (expected exactly once)",
                    action_type.key()
                ),
            };
        }
    }

    for entry in &whitelist.entries {
        if entry.risk == ActionRisk::High && !entry.requires_confirmation {
            return DoctorCheck {
                name: "whitelist_integrity",
                status: CheckStatus::Fail,
                details: format!(
                    "{} is high risk but does not require confirmation",
                    entry.action_type.key()
                ),
            };
        }
        if entry.allowed_tiers.is_empty() {
            return DoctorCheck {
                name: "whitelist_integrity",
                status: CheckStatus::Fail,
                details: format!("{} allows no tier at all", entry.action_type.key()),
            };
        }
    }

    DoctorCheck {
        name: "whitelist_integrity",
        status: CheckStatus::Pass,
        details: format!(
            "version {} · {} entries validated",
            whitelist.version,
            whitelist.entries.len()
        ),
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = vec![report.summary.clone()];
    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "FAIL",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("  [{marker}] {}: {}", check.name, check.details));
    }
    lines.join("\n")
}
