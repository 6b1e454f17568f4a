// service/background_jobs.rs
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, RwLock,
};

use chrono::{DateTime, Utc};
use cron::Schedule;
use serde::Serialize;
use tokio::{sync::Mutex, task::JoinHandle, time::Duration};
use tokio_util::sync::CancellationToken;

use crate::{
    db::ReferralExt,
    service::{
        error::ServiceError,
        reward_evaluator::{PassAborted, PassSummary, RewardEvaluator},
    },
};

#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub healthy: bool,
    pub halted_reason: Option<String>,
    pub pass_running: bool,
    pub passes_completed: u64,
    pub passes_skipped: u64,
    pub passes_failed: u64,
    pub next_run_at: Option<DateTime<Utc>>,
    pub last_pass_at: Option<DateTime<Utc>>,
}

/// Runs reward passes on a cron cadence, one at a time.
///
/// A trigger that arrives while a pass is running is skipped, never queued.
/// A fatal pass error halts the scheduler for good and flips its health.
pub struct RewardScheduler<S: ?Sized> {
    evaluator: RewardEvaluator<S>,
    schedule: Schedule,
    pass_lock: Mutex<()>,
    halted: RwLock<Option<String>>,
    last_summary: RwLock<Option<PassSummary>>,
    passes_completed: AtomicU64,
    passes_skipped: AtomicU64,
    passes_failed: AtomicU64,
}

impl<S: ReferralExt + ?Sized> RewardScheduler<S> {
    pub fn new(evaluator: RewardEvaluator<S>, schedule: Schedule) -> Self {
        Self {
            evaluator,
            schedule,
            pass_lock: Mutex::new(()),
            halted: RwLock::new(None),
            last_summary: RwLock::new(None),
            passes_completed: AtomicU64::new(0),
            passes_skipped: AtomicU64::new(0),
            passes_failed: AtomicU64::new(0),
        }
    }

    pub fn halted_reason(&self) -> Option<String> {
        self.halted.read().ok().and_then(|reason| reason.clone())
    }

    pub fn is_healthy(&self) -> bool {
        self.halted_reason().is_none()
    }

    pub fn last_summary(&self) -> Option<PassSummary> {
        self.last_summary.read().ok().and_then(|summary| summary.clone())
    }

    pub fn next_run_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&after).next()
    }

    pub fn status(&self) -> SchedulerStatus {
        let halted_reason = self.halted_reason();
        let next_run_at = if halted_reason.is_none() {
            self.next_run_after(self.evaluator.clock().now())
        } else {
            None
        };

        SchedulerStatus {
            healthy: halted_reason.is_none(),
            halted_reason,
            pass_running: self.pass_lock.try_lock().is_err(),
            passes_completed: self.passes_completed.load(Ordering::Relaxed),
            passes_skipped: self.passes_skipped.load(Ordering::Relaxed),
            passes_failed: self.passes_failed.load(Ordering::Relaxed),
            next_run_at,
            last_pass_at: self.last_summary().map(|summary| summary.finished_at),
        }
    }

    fn halt(&self, reason: String) {
        if let Ok(mut halted) = self.halted.write() {
            *halted = Some(reason);
        }
    }

    fn record_summary(&self, summary: PassSummary) {
        if let Ok(mut last) = self.last_summary.write() {
            *last = Some(summary);
        }
    }

    /// Run one pass now unless one is already running or the scheduler has
    /// halted.
    pub async fn trigger(&self, cancel: &CancellationToken) -> Result<PassSummary, ServiceError> {
        if let Some(reason) = self.halted_reason() {
            return Err(ServiceError::SchedulerHalted(reason));
        }

        let Ok(_guard) = self.pass_lock.try_lock() else {
            self.passes_skipped.fetch_add(1, Ordering::Relaxed);
            tracing::warn!("Reward pass still running, skipping this trigger");
            return Err(ServiceError::PassInProgress);
        };

        match self.evaluator.run_pass(cancel).await {
            Ok(summary) => {
                self.passes_completed.fetch_add(1, Ordering::Relaxed);
                self.record_summary(summary.clone());
                Ok(summary)
            }
            Err(PassAborted { error: e, summary }) => {
                self.passes_failed.fetch_add(1, Ordering::Relaxed);
                if let Some(summary) = summary {
                    self.record_summary(summary);
                }
                if e.is_fatal() {
                    tracing::error!(error = %e, "Reward scheduler halted after fatal error");
                    self.halt(e.to_string());
                } else {
                    tracing::warn!(error = %e, "Reward pass failed, retrying on next run");
                }
                Err(e)
            }
        }
    }

    /// Fire passes on the schedule until `cancel` triggers or a fatal error
    /// halts the scheduler. Ticks missed while a pass runs are dropped.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!("Reward scheduler started");

        let mut last_fire: Option<DateTime<Utc>> = None;

        loop {
            let now = self.evaluator.clock().now();
            // Never fire the same tick twice, even if the wall clock lags the timer.
            let from = last_fire.map_or(now, |fired| fired.max(now));

            let Some(next) = self.next_run_after(from) else {
                tracing::error!("Reward schedule has no upcoming runs, halting scheduler");
                self.halt("schedule has no upcoming runs".to_string());
                break;
            };

            let delay = (next - now).to_std().unwrap_or(Duration::ZERO);
            tracing::debug!(next_run = %next, "Next reward pass scheduled");

            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Reward scheduler shutting down");
                    break;
                }
                _ = tokio::time::sleep(delay) => {}
            }

            last_fire = Some(next);

            tracing::info!("Running reward pass at {}", Utc::now());

            match self.trigger(&cancel).await {
                Err(ServiceError::SchedulerHalted(_)) => break,
                Err(e) if e.is_fatal() => break,
                _ => {}
            }
        }

        tracing::info!("Reward scheduler stopped");
    }
}

pub fn start_reward_scheduler<S>(
    scheduler: Arc<RewardScheduler<S>>,
    cancel: CancellationToken,
) -> JoinHandle<()>
where
    S: ReferralExt + ?Sized + 'static,
{
    tokio::spawn(async move {
        scheduler.run(cancel).await;
    })
}
