use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::tier::SubscriptionTier;

/// Closed set of actions the assistant may ever propose. Nothing outside
/// this enumeration can be emitted; extending it is a whitelist version bump.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    LogMeal,
    LogWater,
    LogWeight,
    ShowProgress,
    SuggestMeal,
    AdjustCalories,
    StartBreathingExercise,
    ScheduleReminder,
    OpenEducationCard,
    SuggestUpgrade,
}

impl ActionType {
    pub fn key(&self) -> &'static str {
        match self {
            ActionType::LogMeal => "log.meal",
            ActionType::LogWater => "log.water",
            ActionType::LogWeight => "log.weight",
            ActionType::ShowProgress => "progress.show",
            ActionType::SuggestMeal => "meal.suggest",
            ActionType::AdjustCalories => "plan.adjust_calories",
            ActionType::StartBreathingExercise => "wellness.breathing",
            ActionType::ScheduleReminder => "reminder.schedule",
            ActionType::OpenEducationCard => "education.open_card",
            ActionType::SuggestUpgrade => "billing.suggest_upgrade",
        }
    }

    pub const ALL: [ActionType; 10] = [
        ActionType::LogMeal,
        ActionType::LogWater,
        ActionType::LogWeight,
        ActionType::ShowProgress,
        ActionType::SuggestMeal,
        ActionType::AdjustCalories,
        ActionType::StartBreathingExercise,
        ActionType::ScheduleReminder,
        ActionType::OpenEducationCard,
        ActionType::SuggestUpgrade,
    ];
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionRisk {
    Low,
    Medium,
    High,
}

/// A concrete action instance proposed for one response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationAction {
    pub action_type: ActionType,
    pub label: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, Value>,
    pub requires_confirmation: bool,
    pub is_premium: bool,
}

impl ConversationAction {
    pub fn new(action_type: ActionType, label: impl Into<String>) -> Self {
        Self {
            action_type,
            label: label.into(),
            params: BTreeMap::new(),
            requires_confirmation: false,
            is_premium: false,
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }
}

/// One whitelist entry: the static contract for an action type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionPermission {
    pub action_type: ActionType,
    pub allowed_tiers: Vec<SubscriptionTier>,
    pub risk: ActionRisk,
    pub requires_confirmation: bool,
    pub max_per_day: Option<u32>,
}

impl ActionPermission {
    pub fn allows_tier(&self, tier: SubscriptionTier) -> bool {
        self.allowed_tiers.contains(&tier)
    }

    pub fn is_premium_only(&self) -> bool {
        !self.allowed_tiers.contains(&SubscriptionTier::Free)
    }
}

/// Reason a candidate action was rejected by the gate. Logged and counted,
/// never shown to the user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionRejectReason {
    NotWhitelisted,
    TierForbidden,
    RiskBlocked,
    DailyLimitReached,
}

impl ActionRejectReason {
    pub fn label(&self) -> &'static str {
        match self {
            ActionRejectReason::NotWhitelisted => "not_whitelisted",
            ActionRejectReason::TierForbidden => "tier_forbidden",
            ActionRejectReason::RiskBlocked => "risk_blocked",
            ActionRejectReason::DailyLimitReached => "daily_limit_reached",
        }
    }
}

/// The versioned permission matrix. This table is the contract boundary with
/// any action executor: the gate performs a plain lookup-and-compare against
/// it and nothing else decides what may be emitted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionWhitelist {
    pub version: u32,
    pub entries: Vec<ActionPermission>,
}

impl ActionWhitelist {
    pub fn lookup(&self, action_type: ActionType) -> Option<&ActionPermission> {
        self.entries.iter().find(|entry| entry.action_type == action_type)
    }
}

impl Default for ActionWhitelist {
    fn default() -> Self {
        use SubscriptionTier::{Free, Premium};

        let both = vec![Free, Premium];
        Self {
            version: 1,
            entries: vec![
                ActionPermission {
                    action_type: ActionType::LogMeal,
                    allowed_tiers: both.clone(),
                    risk: ActionRisk::Low,
                    requires_confirmation: false,
                    max_per_day: None,
                },
                ActionPermission {
                    action_type: ActionType::LogWater,
                    allowed_tiers: both.clone(),
                    risk: ActionRisk::Low,
                    requires_confirmation: false,
                    max_per_day: None,
                },
                ActionPermission {
                    action_type: ActionType::LogWeight,
                    allowed_tiers: both.clone(),
                    risk: ActionRisk::Low,
                    requires_confirmation: false,
                    max_per_day: None,
                },
                ActionPermission {
                    action_type: ActionType::ShowProgress,
                    allowed_tiers: both.clone(),
                    risk: ActionRisk::Low,
                    requires_confirmation: false,
                    max_per_day: None,
                },
                ActionPermission {
                    action_type: ActionType::SuggestMeal,
                    allowed_tiers: both.clone(),
                    risk: ActionRisk::Low,
                    requires_confirmation: false,
                    max_per_day: None,
                },
                ActionPermission {
                    action_type: ActionType::AdjustCalories,
                    allowed_tiers: vec![Premium],
                    risk: ActionRisk::High,
                    requires_confirmation: true,
                    max_per_day: Some(2),
                },
                ActionPermission {
                    action_type: ActionType::StartBreathingExercise,
                    allowed_tiers: both.clone(),
                    risk: ActionRisk::Low,
                    requires_confirmation: false,
                    max_per_day: None,
                },
                ActionPermission {
                    action_type: ActionType::ScheduleReminder,
                    allowed_tiers: both.clone(),
                    risk: ActionRisk::Medium,
                    requires_confirmation: true,
                    max_per_day: Some(5),
                },
                ActionPermission {
                    action_type: ActionType::OpenEducationCard,
                    allowed_tiers: both,
                    risk: ActionRisk::Low,
                    requires_confirmation: false,
                    max_per_day: None,
                },
                ActionPermission {
                    action_type: ActionType::SuggestUpgrade,
                    allowed_tiers: vec![Free],
                    risk: ActionRisk::Low,
                    requires_confirmation: false,
                    max_per_day: None,
                },
            ],
        }
    }
}
