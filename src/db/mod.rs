pub mod db;
pub mod memory;
pub mod query_timeout;
pub mod referraldb;
pub mod userdb;

use std::time::Duration;

use thiserror::Error;

pub use referraldb::{AssignOutcome, ReferralExt};
pub use userdb::UserExt;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Conflict: {0}")]
    Conflict(String),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

/// Everything the HTTP layer and the reward jobs need from a backend.
pub trait Store: UserExt + ReferralExt {}

impl<T: UserExt + ReferralExt + ?Sized> Store for T {}
