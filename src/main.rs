mod config;
mod db;
mod dtos;
mod error;
mod handler;
mod middleware;
mod models;
mod routes;
mod service;
mod utils;

use std::sync::Arc;

use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use config::Config;
use db::{db::DBClient, memory::MemoryStore, Store};
use dotenv::dotenv;
use routes::create_router;
use service::{
    background_jobs::{start_reward_scheduler, RewardScheduler},
    clock::{Clock, SystemClock},
    referral::RandomCodeGenerator,
    reward_evaluator::{EvaluatorSettings, RewardEvaluator},
};
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};

pub struct AppState {
    pub env: Config,
    pub db_client: Arc<dyn Store>,
    pub rewards: Arc<RewardScheduler<dyn Store>>,
    pub shutdown: CancellationToken,
}

pub fn build_app_state(config: Config, db_client: Arc<dyn Store>, clock: Arc<dyn Clock>) -> AppState {
    let evaluator = RewardEvaluator::new(
        db_client.clone(),
        config.rewards.policy.clone(),
        Arc::new(RandomCodeGenerator),
        clock,
        EvaluatorSettings {
            excluded_status: config.rewards.excluded_status.clone(),
            call_timeout: config.rewards.call_timeout,
        },
    );
    let rewards = Arc::new(RewardScheduler::new(evaluator, config.rewards.cadence.clone()));

    AppState {
        env: config,
        db_client,
        rewards,
        shutdown: CancellationToken::new(),
    }
}

async fn connect_store(config: &Config) -> Arc<dyn Store> {
    let Some(database_url) = &config.database_url else {
        tracing::warn!("DATABASE_URL not set, using the in-memory store; data is lost on restart");
        return Arc::new(MemoryStore::new());
    };

    let pool = match PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
    {
        Ok(pool) => {
            tracing::info!("Connection to the database is successful");
            pool
        }
        Err(err) => {
            tracing::error!("Failed to connect to the database: {:?}", err);
            std::process::exit(1);
        }
    };

    let db_client = DBClient::new(pool);
    if let Err(err) = db_client.migrate().await {
        tracing::error!("Failed to run migrations: {:?}", err);
        std::process::exit(1);
    }

    Arc::new(db_client)
}

async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {:?}", err);
    }
    tracing::info!("Shutdown signal received");
    shutdown.cancel();
}

#[tokio::main]
async fn main() {
    dotenv().ok();

    let config = match Config::init() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Invalid configuration: {}", err);
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .init();

    let db_client = connect_store(&config).await;
    let app_state = Arc::new(build_app_state(config.clone(), db_client, Arc::new(SystemClock)));

    let scheduler_handle = if config.rewards.scheduler_enabled {
        tracing::info!(
            cadence = %config.rewards.cadence_expr,
            tiers = ?config.rewards.policy.tiers(),
            excluded_status = %config.rewards.excluded_status,
            "Starting reward scheduler"
        );
        Some(start_reward_scheduler(app_state.rewards.clone(), app_state.shutdown.clone()))
    } else {
        tracing::info!("Reward scheduler disabled, passes run only on demand");
        None
    };

    let allowed_origins = [
        HeaderValue::from_static("http://localhost:5173"),
        HeaderValue::from_static("http://localhost:8000"),
    ];

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE])
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE]);

    let app = create_router(app_state.clone()).layer(cors);

    let listener = match tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("Failed to bind port {}: {:?}", config.port, err);
            std::process::exit(1);
        }
    };

    tracing::info!("Server is running on http://localhost:{}", config.port);

    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(app_state.shutdown.clone()))
        .await
    {
        tracing::error!("Server error: {:?}", err);
    }

    if let Some(handle) = scheduler_handle {
        if let Err(err) = handle.await {
            tracing::error!("Reward scheduler task failed: {:?}", err);
        }
    }
}
