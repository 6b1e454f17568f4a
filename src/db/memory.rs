// db/memory.rs
use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    referraldb::{page_offset, AssignOutcome, ReferralExt},
    userdb::UserExt,
    StoreError,
};
use crate::models::{
    referralmodel::{Referral, DEFAULT_REFERRAL_STATUS},
    usermodel::{User, UserRole},
};

/// In-process backend used when no `DATABASE_URL` is configured.
///
/// Every write takes the map's write lock, so conflicting updates to the
/// same referral are serialized just like row locks in Postgres.
#[derive(Debug, Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<Uuid, User>>,
    referrals: RwLock<ReferralTable>,
}

/// Rows plus every code ever issued, guarded by one lock so the uniqueness
/// check and the write happen together.
#[derive(Debug, Default)]
struct ReferralTable {
    rows: HashMap<Uuid, Referral>,
    issued_codes: HashSet<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn insert_referral(&self, referral: Referral) {
        let mut table = self.referrals.write().await;
        if let Some(code) = &referral.reward_code {
            table.issued_codes.insert(code.clone());
        }
        table.rows.insert(referral.id, referral);
    }
}

#[async_trait]
impl UserExt for MemoryStore {
    async fn get_user(
        &self,
        user_id: Option<Uuid>,
        email: Option<&str>,
    ) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;

        if let Some(user_id) = user_id {
            return Ok(users.get(&user_id).cloned());
        }

        Ok(email.and_then(|email| {
            users
                .values()
                .find(|user| user.email.eq_ignore_ascii_case(email))
                .cloned()
        }))
    }

    async fn save_user(
        &self,
        email: String,
        password: String,
        role: UserRole,
    ) -> Result<User, StoreError> {
        let mut users = self.users.write().await;

        if users.values().any(|user| user.email.eq_ignore_ascii_case(&email)) {
            return Err(StoreError::Conflict(format!("user {} already exists", email)));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email,
            password,
            role,
            created_at: now,
            updated_at: now,
        };
        users.insert(user.id, user.clone());

        Ok(user)
    }

    async fn delete_user(
        &self,
        user_id: Uuid,
    ) -> Result<bool, StoreError> {
        Ok(self.users.write().await.remove(&user_id).is_some())
    }
}

#[async_trait]
impl ReferralExt for MemoryStore {
    async fn create_referral(
        &self,
        referrer_id: Uuid,
        candidate_email: String,
        description: String,
    ) -> Result<Referral, StoreError> {
        let now = Utc::now();
        let referral = Referral {
            id: Uuid::new_v4(),
            referrer_id,
            candidate_email,
            description,
            hiring_date: None,
            status: DEFAULT_REFERRAL_STATUS.to_string(),
            reward_code: None,
            reward_amount: None,
            rewarded_at: None,
            created_at: now,
            updated_at: now,
        };
        self.referrals.write().await.rows.insert(referral.id, referral.clone());

        Ok(referral)
    }

    async fn get_referral(
        &self,
        referral_id: Uuid,
    ) -> Result<Option<Referral>, StoreError> {
        Ok(self.referrals.read().await.rows.get(&referral_id).cloned())
    }

    async fn get_referrals(
        &self,
        referrer_id: Option<Uuid>,
        page: u32,
        limit: usize,
    ) -> Result<Vec<Referral>, StoreError> {
        let referrals = self.referrals.read().await;

        let mut matching: Vec<Referral> = referrals
            .rows
            .values()
            .filter(|r| referrer_id.map_or(true, |id| r.referrer_id == id))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));

        Ok(matching
            .into_iter()
            .skip(page_offset(page, limit))
            .take(limit)
            .collect())
    }

    async fn update_referral_details(
        &self,
        referral_id: Uuid,
        candidate_email: Option<String>,
        description: Option<String>,
    ) -> Result<Option<Referral>, StoreError> {
        let mut referrals = self.referrals.write().await;

        Ok(referrals.rows.get_mut(&referral_id).map(|referral| {
            if let Some(candidate_email) = candidate_email {
                referral.candidate_email = candidate_email;
            }
            if let Some(description) = description {
                referral.description = description;
            }
            referral.updated_at = Utc::now();
            referral.clone()
        }))
    }

    async fn update_referral_progress(
        &self,
        referral_id: Uuid,
        hiring_date: Option<NaiveDate>,
        status: Option<String>,
    ) -> Result<Option<Referral>, StoreError> {
        let mut referrals = self.referrals.write().await;

        Ok(referrals.rows.get_mut(&referral_id).map(|referral| {
            if hiring_date.is_some() {
                referral.hiring_date = hiring_date;
            }
            if let Some(status) = status {
                referral.status = status;
            }
            referral.updated_at = Utc::now();
            referral.clone()
        }))
    }

    async fn delete_referral(
        &self,
        referral_id: Uuid,
    ) -> Result<bool, StoreError> {
        Ok(self.referrals.write().await.rows.remove(&referral_id).is_some())
    }

    async fn list_eligible(
        &self,
        now: DateTime<Utc>,
        excluded_status: &str,
    ) -> Result<Vec<Referral>, StoreError> {
        let today = now.date_naive();

        Ok(self
            .referrals
            .read()
            .await
            .rows
            .values()
            .filter(|r| r.is_eligible(excluded_status))
            .filter(|r| r.hiring_date.map_or(false, |hired_on| hired_on <= today))
            .cloned()
            .collect())
    }

    async fn assign_reward(
        &self,
        referral_id: Uuid,
        code: &str,
        amount: i64,
    ) -> Result<AssignOutcome, StoreError> {
        let mut table = self.referrals.write().await;
        let ReferralTable { rows, issued_codes } = &mut *table;

        if issued_codes.contains(code) {
            return Err(StoreError::Conflict(format!("reward code {} already issued", code)));
        }

        let Some(referral) = rows.get_mut(&referral_id) else {
            return Ok(AssignOutcome::NotFound);
        };

        if referral.is_rewarded() {
            return Ok(AssignOutcome::AlreadyRewarded);
        }

        let now = Utc::now();
        issued_codes.insert(code.to_string());
        referral.reward_code = Some(code.to_string());
        referral.reward_amount = Some(amount);
        referral.rewarded_at = Some(now);
        referral.updated_at = now;

        Ok(AssignOutcome::Applied)
    }
}
