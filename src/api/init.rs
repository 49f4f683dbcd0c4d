use crate::db::DbClient;
use axum::{
    error_handling::HandleErrorLayer,
    http::{header, Method, StatusCode},
    routing::{get, post, put},
    BoxError, Router,
};
use std::time::Duration;
use tower::{buffer::BufferLayer, limit::RateLimitLayer, ServiceBuilder};
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use super::{handlers::*, index::index};

pub fn initialize_router(db: DbClient) -> Router {
    let error_handler = || {
        ServiceBuilder::new().layer(HandleErrorLayer::new(|err: BoxError| async move {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Unhandled error: {}", err),
            )
        }))
    };

    let global_rate_limit = |req_per_sec: u64| {
        ServiceBuilder::new()
            .layer(error_handler())
            .layer(BufferLayer::new(1024))
            .layer(RateLimitLayer::new(req_per_sec, Duration::from_secs(1)))
    };

    let rate_limit_per_ip = |timeout: u64, limit: u32| {
        let config = Box::new(
            GovernorConfigBuilder::default()
                .per_second(timeout)
                .burst_size(limit)
                .use_headers()
                .key_extractor(SmartIpKeyExtractor)
                .finish()
                .unwrap(),
        );

        ServiceBuilder::new()
            .layer(error_handler())
            .layer(GovernorLayer {
                config: Box::leak(config),
            })
    };

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_origin(Any);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().include_headers(false))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    Router::new()
        // Credential routes (stricter per-IP limits)
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .layer(
            global_rate_limit(50)
                .layer(rate_limit_per_ip(2, 10))
                .layer(CompressionLayer::new().zstd(true)),
        )
        // Authenticated and public API routes
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/me", get(get_profile).put(update_profile))
        .route("/api/auth/password", put(change_password))
        .route("/api/admin/users", get(list_users))
        .route("/api/admin/users/:id", get(get_user).delete(delete_user))
        .route("/api/admin/users/:id/role", put(update_user_role))
        .route("/api/admin/users/:id/status", put(update_user_status))
        .route("/api/admin/audit-logs", get(list_audit_logs))
        .route("/api/categories", get(list_categories).post(create_category))
        .route(
            "/api/categories/:id",
            put(update_category).delete(delete_category),
        )
        .route("/api/exams", get(list_exams).post(create_exam))
        .route(
            "/api/exams/:id",
            get(get_exam).put(update_exam).delete(delete_exam),
        )
        .route("/api/exams/:id/publish", post(publish_exam))
        .route("/api/exams/:id/unpublish", post(unpublish_exam))
        .route(
            "/api/exams/:id/questions",
            get(list_exam_questions).post(create_question),
        )
        .route(
            "/api/questions/:id",
            put(update_question).delete(delete_question),
        )
        .route("/api/bookings", get(list_bookings).post(create_booking))
        .route("/api/bookings/:id", get(get_booking))
        .route("/api/bookings/:id/cancel", post(cancel_booking))
        .route("/api/payments", get(list_payments).post(create_payment))
        .route("/api/payments/:id/confirm", post(confirm_payment))
        .route("/api/payments/:id/refund", post(refund_payment))
        .route("/api/billing/:payment_id/invoice", get(download_invoice))
        .route("/api/attempts", get(list_attempts).post(start_attempt))
        .route("/api/attempts/:id", get(get_attempt))
        .route("/api/attempts/:id/submit", post(submit_attempt))
        .route("/api/certificates", get(list_certificates))
        .route("/api/certificates/:id/pdf", get(download_certificate))
        .route(
            "/api/certificates/verify/:number",
            get(verify_certificate),
        )
        .route("/api/analytics/overview", get(get_overview))
        .route("/api/analytics/revenue", get(get_revenue))
        .route("/api/analytics/exams/:id", get(get_exam_analytics))
        .route("/api/analytics/dashboard", get(get_user_dashboard))
        .layer(
            global_rate_limit(1000)
                .layer(rate_limit_per_ip(1, 100))
                .layer(CompressionLayer::new().zstd(true)),
        )
        // Base routes
        .route("/", get(|| async { index() }))
        .route("/health", get(health_check))
        // Apply common middleware
        .layer(cors)
        .layer(trace_layer)
        .with_state(db)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request};
    use tower::ServiceExt;

    fn app() -> Router {
        // The pool connects lazily, so no server is needed for these routes
        initialize_router(DbClient::new(
            "postgres://nobody@127.0.0.1:1/none",
            "redis://127.0.0.1:1",
        ))
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_index_lists_endpoints() {
        let response = app()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        let endpoints = body["endpoints"].as_array().unwrap();
        assert!(endpoints
            .iter()
            .any(|e| e["path"] == "/api/attempts/:id/submit"));
    }

    #[tokio::test]
    async fn test_protected_route_requires_token() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/api/auth/me")
                    .header("x-forwarded-for", "10.0.0.1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(
            body["message"],
            "Authentication required. Provide a bearer token."
        );
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/api/nothing-here")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
