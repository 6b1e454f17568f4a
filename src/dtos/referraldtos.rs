use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::referralmodel::Referral;

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReferralDto {
    #[validate(
        length(min = 1, message = "Candidate email is required"),
        email(message = "Candidate email is invalid")
    )]
    #[serde(alias = "referralEmail")]
    pub candidate_email: String,

    #[validate(length(min = 1, max = 2000, message = "Description must be between 1 and 2000 characters"))]
    #[serde(alias = "referralDescription")]
    pub description: String,
}

/// Reward fields are not accepted here; only the reward jobs write them.
#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateReferralDto {
    #[validate(email(message = "Candidate email is invalid"))]
    #[serde(alias = "referralEmail")]
    pub candidate_email: Option<String>,

    #[validate(length(min = 1, max = 2000, message = "Description must be between 1 and 2000 characters"))]
    #[serde(alias = "referralDescription")]
    pub description: Option<String>,
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralProgressDto {
    pub hiring_date: Option<NaiveDate>,

    #[validate(length(min = 1, max = 64, message = "Status must be between 1 and 64 characters"))]
    pub status: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterReferralDto {
    pub id: String,
    pub referrer_id: String,
    pub candidate_email: String,
    pub description: String,
    pub hiring_date: Option<NaiveDate>,
    pub status: String,
    pub reward_code: Option<String>,
    pub reward_amount: Option<i64>,
    pub rewarded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FilterReferralDto {
    pub fn filter_referral(referral: &Referral) -> Self {
        FilterReferralDto {
            id: referral.id.to_string(),
            referrer_id: referral.referrer_id.to_string(),
            candidate_email: referral.candidate_email.to_owned(),
            description: referral.description.to_owned(),
            hiring_date: referral.hiring_date,
            status: referral.status.to_owned(),
            reward_code: referral.reward_code.clone(),
            reward_amount: referral.reward_amount,
            rewarded_at: referral.rewarded_at,
            created_at: referral.created_at,
            updated_at: referral.updated_at,
        }
    }

    pub fn filter_referrals(referrals: &[Referral]) -> Vec<FilterReferralDto> {
        referrals.iter().map(FilterReferralDto::filter_referral).collect()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReferralData {
    pub referral: FilterReferralDto,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReferralResponseDto {
    pub status: String,
    pub data: ReferralData,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReferralListResponseDto {
    pub status: String,
    pub referrals: Vec<FilterReferralDto>,
    pub results: usize,
}
