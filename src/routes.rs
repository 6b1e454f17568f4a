use std::sync::Arc;

use axum::{http::StatusCode, middleware, response::IntoResponse, routing::get, Extension, Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::{
    handler::{
        auth::auth_handler, referrals::referrals_handler, rewards::rewards_handler,
        users::users_handler,
    },
    middleware::auth,
    AppState,
};

/// 503 once the reward scheduler has halted.
async fn health_check(Extension(app_state): Extension<Arc<AppState>>) -> impl IntoResponse {
    let (status, label) = if app_state.rewards.is_healthy() {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        status,
        Json(json!({
            "status": label,
            "rewards": app_state.rewards.status(),
        })),
    )
}

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api_route = Router::new()
        .nest("/auth", auth_handler())
        .nest("/users", users_handler().layer(middleware::from_fn(auth)))
        .nest("/referrals", referrals_handler().layer(middleware::from_fn(auth)))
        .nest("/rewards", rewards_handler().layer(middleware::from_fn(auth)));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_route)
        .layer(TraceLayer::new_for_http())
        .layer(Extension(app_state))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::{
        build_app_state,
        config::Config,
        db::{memory::MemoryStore, Store},
        service::{clock::FixedClock, reward_evaluator::tests::test_now},
    };

    fn test_router() -> Router {
        let config = Config::from_lookup(|name| match name {
            "JWT_SECRET_KEY" => Some("test-secret".to_string()),
            "ADMIN_EMAILS" => Some("admin@example.com".to_string()),
            _ => None,
        })
        .unwrap();

        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let app_state = build_app_state(config, store, Arc::new(FixedClock::new(test_now())));

        create_router(Arc::new(app_state))
    }

    async fn send(
        router: &Router,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        (status, json)
    }

    async fn register_and_login(router: &Router, email: &str) -> String {
        let (status, _) = send(
            router,
            "POST",
            "/api/auth/register",
            None,
            Some(json!({
                "email": email,
                "password": "password123",
                "passwordConfirm": "password123",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = send(
            router,
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": email, "password": "password123" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        body["token"].as_str().unwrap().to_string()
    }

    async fn create_referral(router: &Router, token: &str) -> String {
        let (status, body) = send(
            router,
            "POST",
            "/api/referrals",
            Some(token),
            Some(json!({
                "candidateEmail": "candidate@example.com",
                "description": "Knows Rust",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        body["data"]["referral"]["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health_reports_ok() {
        let router = test_router();

        let (status, body) = send(&router, "GET", "/health", None, None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_duplicate_registration_conflicts() {
        let router = test_router();
        register_and_login(&router, "user@example.com").await;

        let (status, body) = send(
            &router,
            "POST",
            "/api/auth/register",
            None,
            Some(json!({
                "email": "user@example.com",
                "password": "password123",
                "passwordConfirm": "password123",
            })),
        )
        .await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["message"], "An user with this email already exists");
    }

    #[tokio::test]
    async fn test_wrong_password_rejected() {
        let router = test_router();
        register_and_login(&router, "user@example.com").await;

        let (status, _) = send(
            &router,
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "user@example.com", "password": "nope-nope" })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_routes_require_token() {
        let router = test_router();

        let (status, _) = send(&router, "GET", "/api/referrals", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(&router, "GET", "/api/users/me", Some("garbage"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_referral_access_is_owner_or_admin() {
        let router = test_router();
        let owner = register_and_login(&router, "owner@example.com").await;
        let stranger = register_and_login(&router, "stranger@example.com").await;
        let admin = register_and_login(&router, "admin@example.com").await;
        let referral_id = create_referral(&router, &owner).await;
        let uri = format!("/api/referrals/{}", referral_id);

        let (status, _) = send(&router, "GET", &uri, Some(&stranger), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(&router, "GET", &uri, Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(
            &router,
            "PUT",
            &uri,
            Some(&admin),
            Some(json!({ "description": "admin edit" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (_, body) = send(&router, "GET", "/api/referrals", Some(&stranger), None).await;
        assert_eq!(body["results"], 0);

        let (_, body) = send(&router, "GET", "/api/referrals", Some(&admin), None).await;
        assert_eq!(body["results"], 1);
    }

    #[tokio::test]
    async fn test_owner_edit_cannot_touch_reward_fields() {
        let router = test_router();
        let owner = register_and_login(&router, "owner@example.com").await;
        let referral_id = create_referral(&router, &owner).await;

        let (status, body) = send(
            &router,
            "PUT",
            &format!("/api/referrals/{}", referral_id),
            Some(&owner),
            Some(json!({ "description": "Knows Rust and Go", "rewardCode": "forged", "rewardAmount": 9999 })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["referral"]["description"], "Knows Rust and Go");
        assert!(body["data"]["referral"]["rewardCode"].is_null());
        assert!(body["data"]["referral"]["rewardAmount"].is_null());
    }

    #[tokio::test]
    async fn test_progress_and_reward_endpoints_are_admin_only() {
        let router = test_router();
        let owner = register_and_login(&router, "owner@example.com").await;
        let referral_id = create_referral(&router, &owner).await;

        let (status, _) = send(
            &router,
            "PATCH",
            &format!("/api/referrals/{}/progress", referral_id),
            Some(&owner),
            Some(json!({ "hiringDate": "2026-01-01" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(&router, "POST", "/api/rewards/run", Some(&owner), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_hired_referral_is_rewarded_by_manual_pass() {
        let router = test_router();
        let owner = register_and_login(&router, "owner@example.com").await;
        let admin = register_and_login(&router, "admin@example.com").await;
        let referral_id = create_referral(&router, &owner).await;

        // Four months before the fixed clock.
        let (status, _) = send(
            &router,
            "PATCH",
            &format!("/api/referrals/{}/progress", referral_id),
            Some(&admin),
            Some(json!({ "hiringDate": "2026-06-16", "status": "hired" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&router, "POST", "/api/rewards/run", Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["applied"], 1);
        assert_eq!(body["data"]["amount_issued"], 800);

        let (_, body) = send(
            &router,
            "GET",
            &format!("/api/referrals/{}", referral_id),
            Some(&owner),
            None,
        )
        .await;
        assert_eq!(body["data"]["referral"]["rewardAmount"], 800);
        assert!(body["data"]["referral"]["rewardCode"].is_string());

        let (_, body) = send(&router, "POST", "/api/rewards/run", Some(&admin), None).await;
        assert_eq!(body["data"]["applied"], 0);
        assert_eq!(body["data"]["already_rewarded"], 1);

        let (status, body) = send(&router, "GET", "/api/rewards/last-pass", Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["scheduler"]["passes_completed"], 2);
    }

    #[tokio::test]
    async fn test_referral_survives_account_deletion() {
        let router = test_router();
        let owner = register_and_login(&router, "owner@example.com").await;
        let admin = register_and_login(&router, "admin@example.com").await;
        let referral_id = create_referral(&router, &owner).await;

        let (status, _) = send(&router, "DELETE", "/api/users/me", Some(&owner), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(&router, "GET", "/api/users/me", Some(&owner), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(
            &router,
            "GET",
            &format!("/api/referrals/{}", referral_id),
            Some(&admin),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }
}
