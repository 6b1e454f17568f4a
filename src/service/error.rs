use axum::http::StatusCode;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    db::StoreError,
    error::HttpError,
    service::referral::CodeGenError,
};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Referral {0} not found")]
    ReferralNotFound(Uuid),

    #[error("User {0} is not authorized to perform this action on referral {1}")]
    UnauthorizedReferralAccess(Uuid, Uuid),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Reward code generation failed: {0}")]
    CodeGeneration(#[from] CodeGenError),

    #[error("A reward pass is already running")]
    PassInProgress,

    #[error("Reward scheduler halted: {0}")]
    SchedulerHalted(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl ServiceError {
    /// Errors after which the reward jobs must stop: codes can no longer be
    /// trusted.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ServiceError::CodeGeneration(_))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::ReferralNotFound(_) => StatusCode::NOT_FOUND,

            ServiceError::UnauthorizedReferralAccess(_, _) => StatusCode::FORBIDDEN,

            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,

            ServiceError::PassInProgress => StatusCode::CONFLICT,

            ServiceError::SchedulerHalted(_) => StatusCode::SERVICE_UNAVAILABLE,

            ServiceError::Store(StoreError::Conflict(_)) => StatusCode::CONFLICT,

            ServiceError::Store(StoreError::Timeout(_)) => StatusCode::SERVICE_UNAVAILABLE,

            ServiceError::Store(_) | ServiceError::CodeGeneration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ServiceError> for HttpError {
    fn from(error: ServiceError) -> Self {
        HttpError::new(error.to_string(), error.status_code())
    }
}
