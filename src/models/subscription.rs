use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Free,
    Creator,
    Pro,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanLimits {
    pub monthly_quota: i32,
    pub credits: i32,
}

#[derive(Debug, Error)]
#[error("Unknown plan: {0}")]
pub struct UnknownPlan(String);

impl Plan {
    pub fn limits(self) -> PlanLimits {
        match self {
            Plan::Free => PlanLimits { monthly_quota: 5, credits: 10 },
            Plan::Creator => PlanLimits { monthly_quota: 50, credits: 100 },
            Plan::Pro => PlanLimits { monthly_quota: 200, credits: 500 },
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Creator => "creator",
            Plan::Pro => "pro",
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Plan {
    type Err = UnknownPlan;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "free" => Ok(Plan::Free),
            "creator" => Ok(Plan::Creator),
            "pro" => Ok(Plan::Pro),
            other => Err(UnknownPlan(other.to_string())),
        }
    }
}

/// Why a usage decrement was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageDenied {
    NoCredits,
    QuotaReached,
}

impl UsageDenied {
    pub fn message(self) -> &'static str {
        match self {
            UsageDenied::NoCredits => {
                "You have no credits left. Upgrade your plan or wait for your next renewal to download."
            }
            UsageDenied::QuotaReached => {
                "You have reached your monthly generation quota. Upgrade your plan to keep creating."
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub user_id: Uuid,
    pub plan: Plan,
    pub monthly_quota: i32,
    pub quota_used: i32,
    pub credits_total: i32,
    pub credits_used: i32,
    pub renews_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    pub fn new(user_id: Uuid, plan: Plan, now: DateTime<Utc>) -> Self {
        let limits = plan.limits();
        Self {
            user_id,
            plan,
            monthly_quota: limits.monthly_quota,
            quota_used: 0,
            credits_total: limits.credits,
            credits_used: 0,
            renews_at: add_month(now),
            updated_at: now,
        }
    }

    pub fn credits_remaining(&self) -> i32 {
        (self.credits_total - self.credits_used).max(0)
    }

    pub fn quota_remaining(&self) -> i32 {
        (self.monthly_quota - self.quota_used).max(0)
    }

    /// Resets usage once the renewal date has passed. Returns whether anything changed.
    pub fn roll_over(&mut self, now: DateTime<Utc>) -> bool {
        if now < self.renews_at {
            return false;
        }

        while self.renews_at <= now {
            self.renews_at = add_month(self.renews_at);
        }
        self.quota_used = 0;
        self.credits_used = 0;
        self.updated_at = now;
        true
    }

    pub fn consume_credit(&mut self, now: DateTime<Utc>) -> Result<(), UsageDenied> {
        self.roll_over(now);
        if self.credits_remaining() <= 0 {
            return Err(UsageDenied::NoCredits);
        }
        self.credits_used += 1;
        self.updated_at = now;
        Ok(())
    }

    pub fn consume_quota(&mut self, now: DateTime<Utc>) -> Result<(), UsageDenied> {
        self.roll_over(now);
        if self.quota_remaining() <= 0 {
            return Err(UsageDenied::QuotaReached);
        }
        self.quota_used += 1;
        self.updated_at = now;
        Ok(())
    }

    pub fn usage(&self) -> SubscriptionUsage {
        SubscriptionUsage {
            plan: self.plan,
            monthly_quota: self.monthly_quota,
            quota_used: self.quota_used,
            quota_remaining: self.quota_remaining(),
            credits_total: self.credits_total,
            credits_used: self.credits_used,
            credits_remaining: self.credits_remaining(),
            renews_at: self.renews_at,
        }
    }
}

fn add_month(at: DateTime<Utc>) -> DateTime<Utc> {
    at.checked_add_months(Months::new(1))
        .unwrap_or(at + chrono::Duration::days(30))
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubscriptionUsage {
    pub plan: Plan,
    pub monthly_quota: i32,
    pub quota_used: i32,
    pub quota_remaining: i32,
    pub credits_total: i32,
    pub credits_used: i32,
    pub credits_remaining: i32,
    pub renews_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_credit_consumed_only_while_available() {
        let now = at(2026, 3, 1);
        let mut sub = Subscription::new(Uuid::new_v4(), Plan::Free, now);
        sub.credits_total = 2;

        assert!(sub.consume_credit(now).is_ok());
        assert!(sub.consume_credit(now).is_ok());
        assert_eq!(sub.credits_remaining(), 0);

        assert_eq!(sub.consume_credit(now), Err(UsageDenied::NoCredits));
        assert_eq!(sub.credits_used, 2);
    }

    #[test]
    fn test_quota_gate() {
        let now = at(2026, 3, 1);
        let mut sub = Subscription::new(Uuid::new_v4(), Plan::Free, now);
        for _ in 0..Plan::Free.limits().monthly_quota {
            sub.consume_quota(now).unwrap();
        }
        assert_eq!(sub.consume_quota(now), Err(UsageDenied::QuotaReached));
    }

    #[test]
    fn test_roll_over_resets_usage_and_advances_renewal() {
        let start = at(2026, 1, 31);
        let mut sub = Subscription::new(Uuid::new_v4(), Plan::Creator, start);
        sub.credits_used = sub.credits_total;
        sub.quota_used = 7;

        assert!(!sub.roll_over(at(2026, 2, 1)));

        let later = at(2026, 4, 15);
        assert!(sub.roll_over(later));
        assert_eq!(sub.credits_used, 0);
        assert_eq!(sub.quota_used, 0);
        assert!(sub.renews_at > later);
        assert!(sub.consume_credit(later).is_ok());
    }

    #[test]
    fn test_plan_parsing() {
        assert_eq!("Pro".parse::<Plan>().unwrap(), Plan::Pro);
        assert_eq!(" creator ".parse::<Plan>().unwrap(), Plan::Creator);
        assert!("enterprise".parse::<Plan>().is_err());
    }
}
