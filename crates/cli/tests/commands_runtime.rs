//! Runtime behavior of the CLI commands, driven through the command
//! functions rather than a spawned process.

use nutricoach_cli::commands::{doctor, simulate};
use nutricoach_core::SubscriptionTier;
use serde_json::Value;

#[test]
fn doctor_json_reports_passing_checks_on_defaults() {
    let output = doctor::run(true);
    let report: Value = serde_json::from_str(&output).expect("doctor emits valid JSON");

    assert_eq!(report["overall_status"], "pass");
    let checks = report["checks"].as_array().expect("checks array");
    assert!(checks
        .iter()
        .any(|check| check["name"] == "whitelist_integrity" && check["status"] == "pass"));
}

#[test]
fn doctor_human_output_lists_every_check() {
    let output = doctor::run(false);
    assert!(output.contains("config_validation"));
    assert!(output.contains("tier_budget_sanity"));
    assert!(output.contains("whitelist_integrity"));
}

#[test]
fn simulate_runs_a_turn_and_reports_the_response() {
    let messages = vec!["j'ai super faim ce soir".to_string()];
    let result = simulate::run(&messages, SubscriptionTier::Free);

    assert_eq!(result.exit_code, 0);
    let report: Value = serde_json::from_str(&result.output).expect("simulate emits valid JSON");
    assert_eq!(report["tier"], "free");

    let turns = report["turns"].as_array().expect("turns array");
    assert_eq!(turns.len(), 1);
    let response = &turns[0]["response"];
    assert_eq!(response["meta"]["path"], "rules");
    assert!(!response["message"].as_str().unwrap_or("").is_empty());
    assert!(report["audit_events"].as_u64().unwrap_or(0) > 0);
}

#[test]
fn simulate_refuses_critical_messages_with_empty_actions() {
    let messages = vec!["je veux arrêter de manger complètement".to_string()];
    let result = simulate::run(&messages, SubscriptionTier::Free);

    assert_eq!(result.exit_code, 0);
    let report: Value = serde_json::from_str(&result.output).expect("valid JSON");
    let response = &report["turns"][0]["response"];
    assert_eq!(response["actions"].as_array().map(Vec::len), Some(0));
    assert!(response["message"].as_str().unwrap_or("").contains("professionnel"));
}
