// db/referraldb.rs
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::{db::DBClient, StoreError};
use crate::models::referralmodel::{Referral, DEFAULT_REFERRAL_STATUS};

/// Result of the conditional reward write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignOutcome {
    /// Code and amount were written together.
    Applied,
    /// The referral already carried a code; nothing changed.
    AlreadyRewarded,
    /// The referral no longer exists.
    NotFound,
}

#[async_trait]
pub trait ReferralExt: Send + Sync {
    async fn create_referral(
        &self,
        referrer_id: Uuid,
        candidate_email: String,
        description: String,
    ) -> Result<Referral, StoreError>;

    async fn get_referral(
        &self,
        referral_id: Uuid,
    ) -> Result<Option<Referral>, StoreError>;

    /// Newest first. `referrer_id = None` lists every referral.
    async fn get_referrals(
        &self,
        referrer_id: Option<Uuid>,
        page: u32,
        limit: usize,
    ) -> Result<Vec<Referral>, StoreError>;

    async fn update_referral_details(
        &self,
        referral_id: Uuid,
        candidate_email: Option<String>,
        description: Option<String>,
    ) -> Result<Option<Referral>, StoreError>;

    async fn update_referral_progress(
        &self,
        referral_id: Uuid,
        hiring_date: Option<NaiveDate>,
        status: Option<String>,
    ) -> Result<Option<Referral>, StoreError>;

    async fn delete_referral(
        &self,
        referral_id: Uuid,
    ) -> Result<bool, StoreError>;

    /// Referrals hired on or before the UTC date of `now` whose status is not
    /// `excluded_status`. Order is unspecified.
    async fn list_eligible(
        &self,
        now: DateTime<Utc>,
        excluded_status: &str,
    ) -> Result<Vec<Referral>, StoreError>;

    /// Writes code and amount in one step, only if the referral exists and
    /// has no code yet.
    async fn assign_reward(
        &self,
        referral_id: Uuid,
        code: &str,
        amount: i64,
    ) -> Result<AssignOutcome, StoreError>;
}

pub(crate) fn page_offset(page: u32, limit: usize) -> usize {
    (page.max(1) as usize - 1) * limit
}

#[async_trait]
impl ReferralExt for DBClient {
    async fn create_referral(
        &self,
        referrer_id: Uuid,
        candidate_email: String,
        description: String,
    ) -> Result<Referral, StoreError> {
        let referral = sqlx::query_as::<_, Referral>(
            r#"
            INSERT INTO referrals (id, referrer_id, candidate_email, description, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#
        )
        .bind(Uuid::new_v4())
        .bind(referrer_id)
        .bind(candidate_email)
        .bind(description)
        .bind(DEFAULT_REFERRAL_STATUS)
        .fetch_one(&self.pool)
        .await?;

        Ok(referral)
    }

    async fn get_referral(
        &self,
        referral_id: Uuid,
    ) -> Result<Option<Referral>, StoreError> {
        let referral = sqlx::query_as::<_, Referral>("SELECT * FROM referrals WHERE id = $1")
            .bind(referral_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(referral)
    }

    async fn get_referrals(
        &self,
        referrer_id: Option<Uuid>,
        page: u32,
        limit: usize,
    ) -> Result<Vec<Referral>, StoreError> {
        let referrals = sqlx::query_as::<_, Referral>(
            r#"
            SELECT * FROM referrals
            WHERE ($1::uuid IS NULL OR referrer_id = $1)
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#
        )
        .bind(referrer_id)
        .bind(limit as i64)
        .bind(page_offset(page, limit) as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(referrals)
    }

    async fn update_referral_details(
        &self,
        referral_id: Uuid,
        candidate_email: Option<String>,
        description: Option<String>,
    ) -> Result<Option<Referral>, StoreError> {
        let referral = sqlx::query_as::<_, Referral>(
            r#"
            UPDATE referrals
            SET candidate_email = COALESCE($2, candidate_email),
                description = COALESCE($3, description),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#
        )
        .bind(referral_id)
        .bind(candidate_email)
        .bind(description)
        .fetch_optional(&self.pool)
        .await?;

        Ok(referral)
    }

    async fn update_referral_progress(
        &self,
        referral_id: Uuid,
        hiring_date: Option<NaiveDate>,
        status: Option<String>,
    ) -> Result<Option<Referral>, StoreError> {
        let referral = sqlx::query_as::<_, Referral>(
            r#"
            UPDATE referrals
            SET hiring_date = COALESCE($2, hiring_date),
                status = COALESCE($3, status),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#
        )
        .bind(referral_id)
        .bind(hiring_date)
        .bind(status)
        .fetch_optional(&self.pool)
        .await?;

        Ok(referral)
    }

    async fn delete_referral(
        &self,
        referral_id: Uuid,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM referrals WHERE id = $1")
            .bind(referral_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_eligible(
        &self,
        now: DateTime<Utc>,
        excluded_status: &str,
    ) -> Result<Vec<Referral>, StoreError> {
        let referrals = sqlx::query_as::<_, Referral>(
            r#"
            SELECT * FROM referrals
            WHERE hiring_date IS NOT NULL
            AND hiring_date <= $1
            AND lower(trim(status)) <> lower(trim($2))
            "#
        )
        .bind(now.date_naive())
        .bind(excluded_status)
        .fetch_all(&self.pool)
        .await?;

        Ok(referrals)
    }

    async fn assign_reward(
        &self,
        referral_id: Uuid,
        code: &str,
        amount: i64,
    ) -> Result<AssignOutcome, StoreError> {
        // The row lock taken by UPDATE serializes racing writers; the loser
        // re-evaluates `reward_code IS NULL` and matches nothing.
        let result = sqlx::query(
            r#"
            UPDATE referrals
            SET reward_code = $2,
                reward_amount = $3,
                rewarded_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
            AND reward_code IS NULL
            "#
        )
        .bind(referral_id)
        .bind(code)
        .bind(amount)
        .execute(&self.pool)
        .await
        .map_err(|e| match e.as_database_error() {
            Some(db_err) if db_err.is_unique_violation() => {
                StoreError::Conflict(format!("reward code {} already issued", code))
            }
            _ => StoreError::Database(e),
        })?;

        if result.rows_affected() > 0 {
            return Ok(AssignOutcome::Applied);
        }

        let existing = sqlx::query_as::<_, (Option<String>,)>(
            "SELECT reward_code FROM referrals WHERE id = $1"
        )
        .bind(referral_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match existing {
            Some(_) => AssignOutcome::AlreadyRewarded,
            None => AssignOutcome::NotFound,
        })
    }
}
