use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use nutricoach_core::{ActionType, QuotaKind, SubscriptionTier, TierTable, TurnError};

#[derive(Clone, Debug, Default)]
struct AccountUsage {
    local_day: Option<NaiveDate>,
    messages_sent_today: u32,
    generator_calls_today: u32,
    action_counts: BTreeMap<&'static str, u32>,
}

/// Per-user daily budgets. The one piece of state shared between concurrent
/// sessions; every check-and-decrement happens under a single lock so two
/// turns racing a boundary can never both succeed past it.
///
/// Counters reset lazily on the first consumption of a new local day. A turn
/// spanning midnight is charged to the day in which it was initiated, and
/// cancelled turns are never refunded.
pub struct QuotaLedger {
    tiers: TierTable,
    accounts: Mutex<HashMap<String, AccountUsage>>,
}

impl QuotaLedger {
    pub fn new(tiers: TierTable) -> Self {
        Self { tiers, accounts: Mutex::new(HashMap::new()) }
    }

    /// Atomically consumes one unit of the given budget. Returns the
    /// remaining budget on success.
    pub fn try_consume(
        &self,
        user_id: &str,
        tier: SubscriptionTier,
        kind: QuotaKind,
        now_utc: DateTime<Utc>,
        utc_offset_minutes: i32,
    ) -> Result<u32, TurnError> {
        let budget = self.tiers.budget(tier, kind);
        let today = local_day(now_utc, utc_offset_minutes);

        let mut accounts = lock_accounts(&self.accounts);
        let usage = accounts.entry(user_id.to_string()).or_default();
        roll_day(usage, today);

        let counter = match kind {
            QuotaKind::Message => &mut usage.messages_sent_today,
            QuotaKind::GeneratorCall => &mut usage.generator_calls_today,
        };

        if *counter >= budget {
            return Err(TurnError::QuotaExceeded { tier, kind });
        }

        *counter += 1;
        Ok(budget - *counter)
    }

    /// Per-action daily cap used by the gate for whitelist entries that
    /// declare `max_per_day`.
    pub fn try_consume_action(
        &self,
        user_id: &str,
        action_type: ActionType,
        max_per_day: u32,
        now_utc: DateTime<Utc>,
        utc_offset_minutes: i32,
    ) -> bool {
        let today = local_day(now_utc, utc_offset_minutes);

        let mut accounts = lock_accounts(&self.accounts);
        let usage = accounts.entry(user_id.to_string()).or_default();
        roll_day(usage, today);

        let counter = usage.action_counts.entry(action_type.key()).or_insert(0);
        if *counter >= max_per_day {
            return false;
        }

        *counter += 1;
        true
    }

    pub fn remaining(
        &self,
        user_id: &str,
        tier: SubscriptionTier,
        kind: QuotaKind,
        now_utc: DateTime<Utc>,
        utc_offset_minutes: i32,
    ) -> u32 {
        let budget = self.tiers.budget(tier, kind);
        let today = local_day(now_utc, utc_offset_minutes);

        let accounts = lock_accounts(&self.accounts);
        let spent = accounts
            .get(user_id)
            .filter(|usage| usage.local_day == Some(today))
            .map(|usage| match kind {
                QuotaKind::Message => usage.messages_sent_today,
                QuotaKind::GeneratorCall => usage.generator_calls_today,
            })
            .unwrap_or(0);

        budget.saturating_sub(spent)
    }
}

fn roll_day(usage: &mut AccountUsage, today: NaiveDate) {
    if usage.local_day != Some(today) {
        *usage = AccountUsage { local_day: Some(today), ..AccountUsage::default() };
    }
}

fn lock_accounts(
    accounts: &Mutex<HashMap<String, AccountUsage>>,
) -> std::sync::MutexGuard<'_, HashMap<String, AccountUsage>> {
    match accounts.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn local_day(now_utc: DateTime<Utc>, utc_offset_minutes: i32) -> NaiveDate {
    (now_utc + Duration::minutes(i64::from(utc_offset_minutes))).date_naive()
}
