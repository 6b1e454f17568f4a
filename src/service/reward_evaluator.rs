use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    config::DEFAULT_EXCLUDED_STATUS,
    db::{query_timeout::QueryTimeout, AssignOutcome, ReferralExt},
    models::referralmodel::Referral,
    service::{
        clock::Clock,
        error::ServiceError,
        referral::CodeGenerator,
        reward_policy::RewardPolicy,
    },
};

#[derive(Debug, Clone, Serialize)]
pub struct ReferralFailure {
    pub referral_id: Uuid,
    pub reason: String,
}

/// What one evaluation pass did. Every referral it fetched lands in exactly
/// one counter unless the pass was cancelled first.
#[derive(Debug, Clone, Serialize)]
pub struct PassSummary {
    pub pass_id: Uuid,
    /// The single "now" every threshold in the pass was measured against.
    pub evaluated_at: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub examined: usize,
    pub applied: usize,
    pub already_rewarded: usize,
    pub not_due: usize,
    pub ineligible: usize,
    pub vanished: usize,
    pub failed: usize,
    pub amount_issued: i64,
    pub cancelled: bool,
    /// Set when a fatal error stopped the pass; counters cover the work done
    /// up to that point.
    pub aborted: bool,
    pub failures: Vec<ReferralFailure>,
}

impl PassSummary {
    fn new(evaluated_at: DateTime<Utc>) -> Self {
        Self {
            pass_id: Uuid::new_v4(),
            evaluated_at,
            started_at: Utc::now(),
            finished_at: Utc::now(),
            examined: 0,
            applied: 0,
            already_rewarded: 0,
            not_due: 0,
            ineligible: 0,
            vanished: 0,
            failed: 0,
            amount_issued: 0,
            cancelled: false,
            aborted: false,
            failures: Vec::new(),
        }
    }

    fn record_failure(&mut self, referral_id: Uuid, reason: String) {
        self.failed += 1;
        self.failures.push(ReferralFailure { referral_id, reason });
    }
}

/// A pass that returned early. `summary` is `None` when it stopped before
/// touching any referral.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct PassAborted {
    pub error: ServiceError,
    pub summary: Option<PassSummary>,
}

impl PassAborted {
    pub fn is_fatal(&self) -> bool {
        self.error.is_fatal()
    }
}

#[derive(Debug, Clone)]
pub struct EvaluatorSettings {
    pub excluded_status: String,
    pub call_timeout: Duration,
}

impl Default for EvaluatorSettings {
    fn default() -> Self {
        Self {
            excluded_status: DEFAULT_EXCLUDED_STATUS.to_string(),
            call_timeout: QueryTimeout::DEFAULT_TIMEOUT,
        }
    }
}

/// Promotes hired referrals through the reward tiers.
///
/// A pass holds no state of its own, so it can be re-run at any time; the
/// store's conditional write keeps a referral from being rewarded twice.
pub struct RewardEvaluator<S: ?Sized> {
    store: Arc<S>,
    policy: RewardPolicy,
    generator: Arc<dyn CodeGenerator>,
    clock: Arc<dyn Clock>,
    settings: EvaluatorSettings,
}

impl<S: ReferralExt + ?Sized> RewardEvaluator<S> {
    pub fn new(
        store: Arc<S>,
        policy: RewardPolicy,
        generator: Arc<dyn CodeGenerator>,
        clock: Arc<dyn Clock>,
        settings: EvaluatorSettings,
    ) -> Self {
        Self {
            store,
            policy,
            generator,
            clock,
            settings,
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Run one pass over every eligible referral.
    ///
    /// Per-referral problems are counted in the summary. Only a failure to
    /// list candidates or a code generator failure (fatal) returns `Err`.
    pub async fn run_pass(&self, cancel: &CancellationToken) -> Result<PassSummary, PassAborted> {
        let now = self.clock.now();
        let mut summary = PassSummary::new(now);

        tracing::info!(pass_id = %summary.pass_id, evaluated_at = %now, "Starting reward pass");

        let candidates = QueryTimeout::execute_with_timeout(
            self.store.list_eligible(now, &self.settings.excluded_status),
            self.settings.call_timeout,
        )
        .await
        .map_err(|e| {
            tracing::error!(pass_id = %summary.pass_id, error = %e, "Failed to list eligible referrals");
            PassAborted {
                error: ServiceError::Store(e),
                summary: None,
            }
        })?;

        for referral in candidates {
            if cancel.is_cancelled() {
                tracing::warn!(pass_id = %summary.pass_id, "Reward pass cancelled");
                summary.cancelled = true;
                break;
            }

            summary.examined += 1;
            if let Err(error) = self.evaluate_referral(&referral, now, &mut summary).await {
                summary.aborted = true;
                summary.finished_at = Utc::now();
                return Err(PassAborted {
                    error,
                    summary: Some(summary),
                });
            }
        }

        summary.finished_at = Utc::now();

        tracing::info!(
            pass_id = %summary.pass_id,
            examined = summary.examined,
            applied = summary.applied,
            already_rewarded = summary.already_rewarded,
            not_due = summary.not_due,
            ineligible = summary.ineligible,
            vanished = summary.vanished,
            failed = summary.failed,
            amount_issued = summary.amount_issued,
            cancelled = summary.cancelled,
            "Reward pass finished"
        );

        Ok(summary)
    }

    async fn evaluate_referral(
        &self,
        referral: &Referral,
        now: DateTime<Utc>,
        summary: &mut PassSummary,
    ) -> Result<(), ServiceError> {
        let hired_on = match referral.hiring_date {
            Some(hired_on) if referral.is_eligible(&self.settings.excluded_status) => hired_on,
            _ => {
                summary.ineligible += 1;
                return Ok(());
            }
        };

        let Some(amount) = self.policy.reward_for(hired_on, now) else {
            summary.not_due += 1;
            return Ok(());
        };

        let code = self.generator.next_code().map_err(|e| {
            tracing::error!(
                pass_id = %summary.pass_id,
                referral_id = %referral.id,
                error = %e,
                "Reward code generation failed, aborting pass"
            );
            ServiceError::CodeGeneration(e)
        })?;

        let outcome = QueryTimeout::execute_with_timeout(
            self.store.assign_reward(referral.id, &code, amount),
            self.settings.call_timeout,
        )
        .await;

        match outcome {
            Ok(AssignOutcome::Applied) => {
                summary.applied += 1;
                summary.amount_issued += amount;
                tracing::info!(
                    pass_id = %summary.pass_id,
                    referral_id = %referral.id,
                    amount,
                    "Reward issued"
                );
            }
            Ok(AssignOutcome::AlreadyRewarded) => {
                summary.already_rewarded += 1;
                tracing::debug!(referral_id = %referral.id, "Referral already rewarded");
            }
            Ok(AssignOutcome::NotFound) => {
                summary.vanished += 1;
                tracing::debug!(referral_id = %referral.id, "Referral deleted during pass");
            }
            Err(e) => {
                tracing::warn!(
                    pass_id = %summary.pass_id,
                    referral_id = %referral.id,
                    error = %e,
                    "Failed to assign reward, will retry next pass"
                );
                summary.record_failure(referral.id, e.to_string());
            }
        }

        Ok(())
    }
}
