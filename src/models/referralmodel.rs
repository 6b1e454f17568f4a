use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status given to every newly submitted referral.
pub const DEFAULT_REFERRAL_STATUS: &str = "under review";

#[derive(Debug, Clone, Deserialize, Serialize, sqlx::FromRow, PartialEq)]
pub struct Referral {
    pub id: Uuid,
    pub referrer_id: Uuid,
    pub candidate_email: String,
    pub description: String,
    /// `None` until the candidate is hired.
    pub hiring_date: Option<NaiveDate>,
    pub status: String,
    pub reward_code: Option<String>,
    pub reward_amount: Option<i64>,
    pub rewarded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Referral {
    pub fn is_rewarded(&self) -> bool {
        self.reward_code.is_some()
    }

    /// A referral takes part in reward evaluation once it has a hiring date
    /// and its status is not the excluded one.
    pub fn is_eligible(&self, excluded_status: &str) -> bool {
        self.hiring_date.is_some() && !status_matches(&self.status, excluded_status)
    }
}

/// Status labels are free text, so comparisons ignore surrounding
/// whitespace and ASCII case.
pub fn status_matches(status: &str, other: &str) -> bool {
    status.trim().eq_ignore_ascii_case(other.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn referral(hiring_date: Option<NaiveDate>, status: &str) -> Referral {
        Referral {
            id: Uuid::new_v4(),
            referrer_id: Uuid::new_v4(),
            candidate_email: "candidate@example.com".to_string(),
            description: "Strong backend engineer".to_string(),
            hiring_date,
            status: status.to_string(),
            reward_code: None,
            reward_amount: None,
            rewarded_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_not_hired_is_not_eligible() {
        assert!(!referral(None, DEFAULT_REFERRAL_STATUS).is_eligible("stopped"));
    }

    #[test]
    fn test_stopped_is_not_eligible() {
        let hired = NaiveDate::from_ymd_opt(2026, 1, 10);
        assert!(!referral(hired, "stopped").is_eligible("stopped"));
        assert!(!referral(hired, "  Stopped ").is_eligible("stopped"));
        assert!(referral(hired, "hired").is_eligible("stopped"));
    }
}
