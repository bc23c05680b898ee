use serde::{Deserialize, Serialize};

/// Closed set of health-risk signals a turn can raise.
///
/// Within [`SafetyTier::Sensitive`], declaration order is the precedence
/// order used to pick the disclaimer when several flags are raised at once.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyFlag {
    SelfHarmSignal,
    ExtremeRestriction,
    MinorUser,
    PregnancyMention,
    DiabetesMention,
    AllergyMention,
    MedicalAdviceRequest,
}

/// Severity tiers of the precedence table. Lower tier value = stricter
/// outcome; the strictest tier present always decides the turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyTier {
    /// Generation is refused outright.
    Critical,
    /// Generation proceeds with a mandatory disclaimer and high-risk
    /// actions forced out of the candidate set.
    Sensitive,
    /// Generation proceeds with a disclaimer only.
    Advisory,
}

impl SafetyFlag {
    pub fn tier(&self) -> SafetyTier {
        match self {
            SafetyFlag::SelfHarmSignal | SafetyFlag::ExtremeRestriction => SafetyTier::Critical,
            SafetyFlag::MinorUser
            | SafetyFlag::PregnancyMention
            | SafetyFlag::DiabetesMention
            | SafetyFlag::AllergyMention => SafetyTier::Sensitive,
            SafetyFlag::MedicalAdviceRequest => SafetyTier::Advisory,
        }
    }

    /// Precedence within a tier. Lower wins.
    pub fn rank(&self) -> u8 {
        match self {
            SafetyFlag::SelfHarmSignal => 0,
            SafetyFlag::ExtremeRestriction => 1,
            SafetyFlag::MinorUser => 2,
            SafetyFlag::PregnancyMention => 3,
            SafetyFlag::DiabetesMention => 4,
            SafetyFlag::AllergyMention => 5,
            SafetyFlag::MedicalAdviceRequest => 6,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SafetyFlag::SelfHarmSignal => "self_harm_signal",
            SafetyFlag::ExtremeRestriction => "extreme_restriction",
            SafetyFlag::MinorUser => "minor_user",
            SafetyFlag::PregnancyMention => "pregnancy_mention",
            SafetyFlag::DiabetesMention => "diabetes_mention",
            SafetyFlag::AllergyMention => "allergy_mention",
            SafetyFlag::MedicalAdviceRequest => "medical_advice_request",
        }
    }
}

/// Outcome class of the safety decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyAction {
    Allow,
    SafeRewrite,
    RefuseRedirect,
}

/// Decision produced by the safety guard for a single turn. Never persisted
/// beyond the turn that produced it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SafetyCheckResult {
    pub is_allowed: bool,
    pub flags: Vec<SafetyFlag>,
    pub action: SafetyAction,
    pub redirect_message: Option<String>,
    pub disclaimer: Option<String>,
    /// Forces high-risk actions out of the candidate set regardless of what
    /// the generator proposes.
    pub block_high_risk_actions: bool,
}

impl SafetyCheckResult {
    pub fn allow() -> Self {
        Self {
            is_allowed: true,
            flags: Vec::new(),
            action: SafetyAction::Allow,
            redirect_message: None,
            disclaimer: None,
            block_high_risk_actions: false,
        }
    }

    /// The strictest tier among raised flags, if any.
    pub fn strictest_tier(&self) -> Option<SafetyTier> {
        self.flags.iter().map(SafetyFlag::tier).min()
    }
}

#[cfg(test)]
mod tests {
    use super::{SafetyCheckResult, SafetyFlag, SafetyTier};

    #[test]
    fn tier_ordering_puts_critical_first() {
        assert!(SafetyTier::Critical < SafetyTier::Sensitive);
        assert!(SafetyTier::Sensitive < SafetyTier::Advisory);
    }

    #[test]
    fn every_flag_maps_to_its_precedence_tier() {
        assert_eq!(SafetyFlag::SelfHarmSignal.tier(), SafetyTier::Critical);
        assert_eq!(SafetyFlag::ExtremeRestriction.tier(), SafetyTier::Critical);
        assert_eq!(SafetyFlag::MinorUser.tier(), SafetyTier::Sensitive);
        assert_eq!(SafetyFlag::PregnancyMention.tier(), SafetyTier::Sensitive);
        assert_eq!(SafetyFlag::DiabetesMention.tier(), SafetyTier::Sensitive);
        assert_eq!(SafetyFlag::AllergyMention.tier(), SafetyTier::Sensitive);
        assert_eq!(SafetyFlag::MedicalAdviceRequest.tier(), SafetyTier::Advisory);
    }

    #[test]
    fn strictest_tier_ignores_flag_order() {
        let result = SafetyCheckResult {
            flags: vec![SafetyFlag::MedicalAdviceRequest, SafetyFlag::SelfHarmSignal],
            ..SafetyCheckResult::allow()
        };
        assert_eq!(result.strictest_tier(), Some(SafetyTier::Critical));
        assert_eq!(SafetyCheckResult::allow().strictest_tier(), None);
    }
}
