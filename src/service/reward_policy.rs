use std::str::FromStr;

use chrono::{DateTime, Months, NaiveDate, Utc};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum PolicyError {
    #[error("At least one reward tier is required")]
    NoTiers,

    #[error("Invalid reward tier '{0}': expected <months>:<amount>")]
    InvalidTier(String),

    #[error("Reward tier months must be positive")]
    ZeroMonths,

    #[error("Reward tiers must have strictly increasing months and amounts")]
    NotIncreasing,
}

/// Reward paid once a referral has been hired for at least `months`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RewardTier {
    pub months: u32,
    pub amount: i64,
}

impl FromStr for RewardTier {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PolicyError::InvalidTier(s.trim().to_string());
        let (months, amount) = s.trim().split_once(':').ok_or_else(invalid)?;

        let months = months.trim().parse::<u32>().map_err(|_| invalid())?;
        let amount = amount.trim().parse::<i64>().map_err(|_| invalid())?;

        if months == 0 {
            return Err(PolicyError::ZeroMonths);
        }

        Ok(RewardTier { months, amount })
    }
}

/// Maps the time since hiring to a reward amount.
///
/// Tiers are kept in ascending order and checked from the longest down, so a
/// referral past several thresholds only earns the highest one. Elapsed time
/// is counted in calendar months from the UTC date of `now`; end-of-month
/// dates clamp to the last day of the shorter month.
#[derive(Debug, Clone, PartialEq)]
pub struct RewardPolicy {
    tiers: Vec<RewardTier>,
}

impl RewardPolicy {
    pub fn new(tiers: Vec<RewardTier>) -> Result<Self, PolicyError> {
        if tiers.is_empty() {
            return Err(PolicyError::NoTiers);
        }

        let increasing = tiers
            .windows(2)
            .all(|pair| pair[0].months < pair[1].months && pair[0].amount < pair[1].amount);
        if !increasing {
            return Err(PolicyError::NotIncreasing);
        }

        Ok(Self { tiers })
    }

    /// Parses `"3:800,6:1200"`.
    pub fn parse(input: &str) -> Result<Self, PolicyError> {
        let tiers = input
            .split(',')
            .filter(|part| !part.trim().is_empty())
            .map(RewardTier::from_str)
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(tiers)
    }

    pub fn tiers(&self) -> &[RewardTier] {
        &self.tiers
    }

    /// The highest tier crossed by a hire on `hired_on`, as seen at `now`.
    pub fn tier_for(&self, hired_on: NaiveDate, now: DateTime<Utc>) -> Option<RewardTier> {
        let today = now.date_naive();

        self.tiers.iter().rev().copied().find(|tier| {
            today
                .checked_sub_months(Months::new(tier.months))
                .map_or(false, |cutoff| hired_on <= cutoff)
        })
    }

    pub fn reward_for(&self, hired_on: NaiveDate, now: DateTime<Utc>) -> Option<i64> {
        self.tier_for(hired_on, now).map(|tier| tier.amount)
    }
}

impl Default for RewardPolicy {
    fn default() -> Self {
        Self {
            tiers: vec![
                RewardTier { months: 3, amount: 800 },
                RewardTier { months: 6, amount: 1200 },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 0, 0, 0).single().unwrap()
    }

    fn months_and_days_ago(months: u32, days: i64) -> NaiveDate {
        now().date_naive().checked_sub_months(Months::new(months)).unwrap() - Duration::days(days)
    }

    #[test]
    fn test_three_months_and_a_day_earns_lower_tier() {
        let policy = RewardPolicy::default();
        assert_eq!(policy.reward_for(months_and_days_ago(3, 1), now()), Some(800));
    }

    #[test]
    fn test_six_months_and_a_day_earns_only_higher_tier() {
        let policy = RewardPolicy::default();
        assert_eq!(policy.reward_for(months_and_days_ago(6, 1), now()), Some(1200));
        assert_eq!(policy.reward_for(months_and_days_ago(30, 0), now()), Some(1200));
    }

    #[test]
    fn test_two_months_earns_nothing() {
        let policy = RewardPolicy::default();
        assert_eq!(policy.reward_for(months_and_days_ago(2, 0), now()), None);
        assert_eq!(policy.reward_for(months_and_days_ago(3, -1), now()), None);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let policy = RewardPolicy::default();
        assert_eq!(policy.reward_for(months_and_days_ago(3, 0), now()), Some(800));
        assert_eq!(policy.reward_for(months_and_days_ago(6, 0), now()), Some(1200));
    }

    #[test]
    fn test_future_hire_earns_nothing() {
        let policy = RewardPolicy::default();
        let tomorrow = now().date_naive() + Duration::days(1);
        assert_eq!(policy.reward_for(tomorrow, now()), None);
    }

    #[test]
    fn test_thresholds_measured_from_single_now() {
        // 5 months back must not qualify for 6 months, whichever tier is checked first.
        let policy = RewardPolicy::default();
        assert_eq!(policy.reward_for(months_and_days_ago(5, 0), now()), Some(800));
    }

    #[test]
    fn test_month_end_clamps() {
        let policy = RewardPolicy::default();
        let now = Utc.with_ymd_and_hms(2026, 5, 31, 12, 0, 0).single().unwrap();
        // 31 May minus 3 months is 28 Feb.
        assert_eq!(policy.reward_for(NaiveDate::from_ymd_opt(2026, 2, 28).unwrap(), now), Some(800));
        assert_eq!(policy.reward_for(NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(), now), None);
    }

    #[test]
    fn test_parse_tiers() {
        let policy = RewardPolicy::parse(" 3:800, 6:1200 ").unwrap();
        assert_eq!(policy, RewardPolicy::default());

        let single = RewardPolicy::parse("12:5000").unwrap();
        assert_eq!(single.tiers(), &[RewardTier { months: 12, amount: 5000 }]);
    }

    #[test]
    fn test_parse_rejects_bad_tiers() {
        assert_eq!(RewardPolicy::parse(""), Err(PolicyError::NoTiers));
        assert_eq!(RewardPolicy::parse("0:800"), Err(PolicyError::ZeroMonths));
        assert_eq!(
            RewardPolicy::parse("3-800"),
            Err(PolicyError::InvalidTier("3-800".to_string()))
        );
        assert_eq!(RewardPolicy::parse("6:1200,3:800"), Err(PolicyError::NotIncreasing));
        assert_eq!(RewardPolicy::parse("3:1200,6:800"), Err(PolicyError::NotIncreasing));
    }
}
