// config.rs
use std::{str::FromStr, time::Duration};

use chrono::Utc;
use cron::Schedule;
use thiserror::Error;
use tracing_subscriber::filter::LevelFilter;

use crate::service::reward_policy::{PolicyError, RewardPolicy};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("Invalid REWARD_TIERS: {0}")]
    Tiers(#[from] PolicyError),
}

#[derive(Debug, Clone)]
pub struct RewardConfig {
    pub cadence_expr: String,
    pub cadence: Schedule,
    pub policy: RewardPolicy,
    pub excluded_status: String,
    pub call_timeout: Duration,
    pub scheduler_enabled: bool,
}

pub const DEFAULT_REWARD_CADENCE: &str = "0 0 0 * * *";
pub const DEFAULT_EXCLUDED_STATUS: &str = "stopped";
pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone)]
pub struct Config {
    /// `None` runs on the in-memory store.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub jwt_maxage: i64,
    pub port: u16,
    pub admin_emails: Vec<String>,
    pub log_level: LevelFilter,
    pub rewards: RewardConfig,
}

impl Config {
    pub fn init() -> Result<Config, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from any variable source; `init` uses the process
    /// environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Config, ConfigError> {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let database_url = var("DATABASE_URL");
        let jwt_secret = var("JWT_SECRET_KEY").ok_or(ConfigError::Missing("JWT_SECRET_KEY"))?;
        let jwt_maxage = parse_var(var("JWT_MAXAGE"), "JWT_MAXAGE", 60i64)?;
        let port = parse_var(var("PORT"), "PORT", 8000u16)?;

        let admin_emails = var("ADMIN_EMAILS")
            .map(|emails| {
                emails
                    .split(',')
                    .map(|email| email.trim().to_lowercase())
                    .filter(|email| !email.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let log_level = parse_var(var("LOG_LEVEL"), "LOG_LEVEL", LevelFilter::INFO)?;

        let cadence_expr = var("REWARD_CADENCE").unwrap_or_else(|| DEFAULT_REWARD_CADENCE.to_string());
        let cadence = parse_cadence(&cadence_expr)?;

        let policy = match var("REWARD_TIERS") {
            Some(tiers) => RewardPolicy::parse(&tiers)?,
            None => RewardPolicy::default(),
        };

        let excluded_status = var("REWARD_EXCLUDED_STATUS")
            .map(|status| status.trim().to_string())
            .unwrap_or_else(|| DEFAULT_EXCLUDED_STATUS.to_string());

        let call_timeout = Duration::from_secs(parse_var(
            var("REWARD_CALL_TIMEOUT_SECS"),
            "REWARD_CALL_TIMEOUT_SECS",
            DEFAULT_CALL_TIMEOUT_SECS,
        )?);
        if call_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                name: "REWARD_CALL_TIMEOUT_SECS",
                reason: "must be at least 1 second".to_string(),
            });
        }

        let scheduler_enabled = var("REWARD_SCHEDULER_ENABLED")
            .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "True"))
            .unwrap_or(true);

        Ok(Config {
            database_url,
            jwt_secret,
            jwt_maxage,
            port,
            admin_emails,
            log_level,
            rewards: RewardConfig {
                cadence_expr,
                cadence,
                policy,
                excluded_status,
                call_timeout,
                scheduler_enabled,
            },
        })
    }

    pub fn is_admin_email(&self, email: &str) -> bool {
        self.admin_emails.iter().any(|admin| admin.eq_ignore_ascii_case(email.trim()))
    }
}

fn parse_var<T: FromStr>(value: Option<String>, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match value {
        Some(value) => value.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

/// Accepts 6/7-field cron (with seconds), classic 5-field cron, and the
/// `@daily`-style aliases. Times are UTC.
pub fn parse_cadence(expr: &str) -> Result<Schedule, ConfigError> {
    let expr = expr.trim();

    let normalized = match expr {
        "@yearly" | "@annually" => "0 0 0 1 1 *".to_string(),
        "@monthly" => "0 0 0 1 * *".to_string(),
        "@weekly" => "0 0 0 * * SUN".to_string(),
        "@daily" | "@midnight" => "0 0 0 * * *".to_string(),
        "@hourly" => "0 0 * * * *".to_string(),
        _ if expr.split_whitespace().count() == 5 => format!("0 {}", expr),
        _ => expr.to_string(),
    };

    let schedule = Schedule::from_str(&normalized).map_err(|e| ConfigError::Invalid {
        name: "REWARD_CADENCE",
        reason: format!("'{}': {}", expr, e),
    })?;

    if schedule.upcoming(Utc).next().is_none() {
        return Err(ConfigError::Invalid {
            name: "REWARD_CADENCE",
            reason: format!("'{}' never fires again", expr),
        });
    }

    Ok(schedule)
}
