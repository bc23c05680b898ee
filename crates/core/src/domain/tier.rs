use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionTier {
    Free,
    Premium,
}

impl SubscriptionTier {
    pub fn label(&self) -> &'static str {
        match self {
            SubscriptionTier::Free => "free",
            SubscriptionTier::Premium => "premium",
        }
    }
}

/// Which daily budget a consumption attempt draws from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaKind {
    Message,
    GeneratorCall,
}

/// Per-tier daily budgets and feature flags. Consumed by the quota ledger;
/// the UI-facing feature gating reads the same table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierConfig {
    pub daily_messages: u32,
    pub llm_calls_per_day: u32,
    pub advanced_insights: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierTable {
    pub free: TierConfig,
    pub premium: TierConfig,
}

impl Default for TierTable {
    fn default() -> Self {
        Self {
            free: TierConfig { daily_messages: 10, llm_calls_per_day: 1, advanced_insights: false },
            premium: TierConfig {
                daily_messages: 100,
                llm_calls_per_day: 20,
                advanced_insights: true,
            },
        }
    }
}

impl TierTable {
    pub fn config_for(&self, tier: SubscriptionTier) -> &TierConfig {
        match tier {
            SubscriptionTier::Free => &self.free,
            SubscriptionTier::Premium => &self.premium,
        }
    }

    pub fn budget(&self, tier: SubscriptionTier, kind: QuotaKind) -> u32 {
        let config = self.config_for(tier);
        match kind {
            QuotaKind::Message => config.daily_messages,
            QuotaKind::GeneratorCall => config.llm_calls_per_day,
        }
    }
}
