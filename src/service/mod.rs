pub mod background_jobs;
pub mod clock;
pub mod error;
pub mod referral;
pub mod reward_evaluator;
pub mod reward_policy;
