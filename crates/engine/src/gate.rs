use chrono::{DateTime, Utc};
use nutricoach_core::{
    ActionRejectReason, ActionRisk, ActionWhitelist, ConversationAction, SafetyCheckResult,
    SubscriptionTier,
};
use tracing::debug;

use crate::quota::QuotaLedger;

#[derive(Clone, Debug, PartialEq)]
pub struct RejectedAction {
    pub action: ConversationAction,
    pub reason: ActionRejectReason,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct GateOutcome {
    pub allowed: Vec<ConversationAction>,
    pub rejected: Vec<RejectedAction>,
}

/// Validates every candidate action against the whitelist/tier/risk matrix.
///
/// Gating is a plain lookup-and-compare against the permission table: no
/// candidate outside the closed action enumeration can pass, tier and risk
/// are checked per entry, `requires_confirmation` is forced on from the
/// entry, and per-day caps are charged through the quota ledger. Same
/// inputs (including ledger state) always yield the same filtered set.
#[derive(Clone, Debug)]
pub struct ActionGate {
    whitelist: ActionWhitelist,
}

impl Default for ActionGate {
    fn default() -> Self {
        Self { whitelist: ActionWhitelist::default() }
    }
}

impl ActionGate {
    pub fn new(whitelist: ActionWhitelist) -> Self {
        Self { whitelist }
    }

    pub fn whitelist(&self) -> &ActionWhitelist {
        &self.whitelist
    }

    #[allow(clippy::too_many_arguments)]
    pub fn gate(
        &self,
        candidates: Vec<ConversationAction>,
        tier: SubscriptionTier,
        safety: &SafetyCheckResult,
        ledger: &QuotaLedger,
        user_id: &str,
        now_utc: DateTime<Utc>,
        utc_offset_minutes: i32,
    ) -> GateOutcome {
        let mut outcome = GateOutcome::default();

        for mut candidate in candidates {
            let Some(permission) = self.whitelist.lookup(candidate.action_type) else {
                outcome.rejected.push(RejectedAction {
                    action: candidate,
                    reason: ActionRejectReason::NotWhitelisted,
                });
                continue;
            };

            if !permission.allows_tier(tier) {
                outcome.rejected.push(RejectedAction {
                    action: candidate,
                    reason: ActionRejectReason::TierForbidden,
                });
                continue;
            }

            if safety.block_high_risk_actions && permission.risk == ActionRisk::High {
                outcome.rejected.push(RejectedAction {
                    action: candidate,
                    reason: ActionRejectReason::RiskBlocked,
                });
                continue;
            }

            if let Some(max_per_day) = permission.max_per_day {
                let admitted = ledger.try_consume_action(
                    user_id,
                    candidate.action_type,
                    max_per_day,
                    now_utc,
                    utc_offset_minutes,
                );
                if !admitted {
                    outcome.rejected.push(RejectedAction {
                        action: candidate,
                        reason: ActionRejectReason::DailyLimitReached,
                    });
                    continue;
                }
            }

            // The permission entry wins over whatever the generator set.
            candidate.requires_confirmation =
                permission.requires_confirmation || candidate.requires_confirmation;
            candidate.is_premium = permission.is_premium_only();
            outcome.allowed.push(candidate);
        }

        for rejection in &outcome.rejected {
            debug!(
                event_name = "gate.action_rejected",
                action = rejection.action.action_type.key(),
                reason = rejection.reason.label(),
                "candidate action rejected"
            );
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use nutricoach_core::{
        ActionRejectReason, ActionType, ConversationAction, SafetyCheckResult, SubscriptionTier,
        TierTable,
    };

    use crate::quota::QuotaLedger;

    use super::ActionGate;

    fn now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap()
    }

    fn candidate(action_type: ActionType) -> ConversationAction {
        ConversationAction::new(action_type, "candidate")
    }

    #[test]
    fn tier_forbidden_actions_are_stripped_with_a_reason() {
        let gate = ActionGate::default();
        let ledger = QuotaLedger::new(TierTable::default());

        let outcome = gate.gate(
            vec![candidate(ActionType::AdjustCalories), candidate(ActionType::LogMeal)],
            SubscriptionTier::Free,
            &SafetyCheckResult::allow(),
            &ledger,
            "user-1",
            now(),
            0,
        );

        assert_eq!(outcome.allowed.len(), 1);
        assert_eq!(outcome.allowed[0].action_type, ActionType::LogMeal);
        assert_eq!(outcome.rejected.len(), 1);
        assert_eq!(outcome.rejected[0].reason, ActionRejectReason::TierForbidden);
    }

    #[test]
    fn premium_calorie_adjustment_passes_with_forced_confirmation() {
        let gate = ActionGate::default();
        let ledger = QuotaLedger::new(TierTable::default());

        let mut unconfirmed = candidate(ActionType::AdjustCalories);
        unconfirmed.requires_confirmation = false;

        let outcome = gate.gate(
            vec![unconfirmed],
            SubscriptionTier::Premium,
            &SafetyCheckResult::allow(),
            &ledger,
            "user-1",
            now(),
            0,
        );

        assert_eq!(outcome.allowed.len(), 1);
        let gated = &outcome.allowed[0];
        assert!(gated.requires_confirmation, "entry requirement must override the generator");
        assert!(gated.is_premium);
    }

    #[test]
    fn high_risk_actions_are_blocked_under_a_sensitive_safety_decision() {
        let gate = ActionGate::default();
        let ledger = QuotaLedger::new(TierTable::default());
        let mut safety = SafetyCheckResult::allow();
        safety.block_high_risk_actions = true;

        let outcome = gate.gate(
            vec![candidate(ActionType::AdjustCalories), candidate(ActionType::SuggestMeal)],
            SubscriptionTier::Premium,
            &safety,
            &ledger,
            "user-1",
            now(),
            0,
        );

        assert_eq!(outcome.allowed.len(), 1);
        assert_eq!(outcome.allowed[0].action_type, ActionType::SuggestMeal);
        assert_eq!(outcome.rejected[0].reason, ActionRejectReason::RiskBlocked);
    }

    #[test]
    fn per_day_caps_reject_once_the_ledger_is_drained() {
        let gate = ActionGate::default();
        let ledger = QuotaLedger::new(TierTable::default());

        for _ in 0..2 {
            let outcome = gate.gate(
                vec![candidate(ActionType::AdjustCalories)],
                SubscriptionTier::Premium,
                &SafetyCheckResult::allow(),
                &ledger,
                "user-1",
                now(),
                0,
            );
            assert_eq!(outcome.allowed.len(), 1);
        }

        let third = gate.gate(
            vec![candidate(ActionType::AdjustCalories)],
            SubscriptionTier::Premium,
            &SafetyCheckResult::allow(),
            &ledger,
            "user-1",
            now(),
            0,
        );
        assert!(third.allowed.is_empty());
        assert_eq!(third.rejected[0].reason, ActionRejectReason::DailyLimitReached);
    }

    #[test]
    fn gating_is_deterministic_for_identical_inputs() {
        let gate = ActionGate::default();

        let run = || {
            let ledger = QuotaLedger::new(TierTable::default());
            gate.gate(
                vec![
                    candidate(ActionType::LogMeal),
                    candidate(ActionType::AdjustCalories),
                    candidate(ActionType::SuggestUpgrade),
                ],
                SubscriptionTier::Free,
                &SafetyCheckResult::allow(),
                &ledger,
                "user-1",
                now(),
                0,
            )
        };

        assert_eq!(run(), run());
    }
}
