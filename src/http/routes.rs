//! Axum router configuration

use axum::{
    http::{header, Method},
    routing::{any, get},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

use super::convert::convert_playlist;
use super::handlers::{active_relays, health_check, missing_target, version_check};
use super::streams::get_stream;

/// Create the Axum router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    // Relay routes accept any method
    let router = Router::new()
        .route("/health", get(health_check))
        .route("/version", get(version_check))
        .route("/debug/relays", get(active_relays))
        .route("/getStream/{*url}", any(get_stream))
        .route("/convertM3U/{*url}", any(convert_playlist))
        .route("/getStream", any(missing_target))
        .route("/convertM3U", any(missing_target))
        .layer(TraceLayer::new_for_http());

    let router = if state.config.cors_enabled {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
            .allow_headers([header::ACCEPT, header::RANGE, header::ORIGIN])
            .max_age(Duration::from_secs(3600));
        router.layer(cors)
    } else {
        router
    };

    router.with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::util::ServiceExt;

    fn app(config: ServerConfig) -> Router {
        create_router(Arc::new(AppState::new(config).unwrap()))
    }

    async fn get(router: Router, uri: &str) -> axum::response::Response {
        router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = get(app(ServerConfig::default()), "/health").await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_version_reports_fetch_tool() {
        let response = get(app(ServerConfig::default()), "/version").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["fetch_tool"], "yt-dlp");
        assert_eq!(json["grace_period_secs"], 5);
    }

    #[tokio::test]
    async fn test_missing_target_is_bad_request() {
        let response = get(app(ServerConfig::default()), "/getStream").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = get(app(ServerConfig::default()), "/convertM3U").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = get(app(ServerConfig::default()), "/getStream/%20").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_cors_options() {
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/getStream/https%3A%2F%2Fa.test%2Fx.m3u8")
            .header(header::ORIGIN, "http://localhost:8080")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
            .body(Body::empty())
            .unwrap();

        let response = app(ServerConfig::default()).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .unwrap(),
            "*"
        );
    }

    #[tokio::test]
    async fn test_cors_can_be_disabled() {
        let request = Request::builder()
            .uri("/health")
            .header(header::ORIGIN, "http://localhost:8080")
            .body(Body::empty())
            .unwrap();
        let config = ServerConfig {
            cors_enabled: false,
            ..Default::default()
        };

        let response = app(config).oneshot(request).await.unwrap();
        assert!(response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none());
    }

    #[tokio::test]
    async fn test_debug_relays_empty() {
        let response = get(app(ServerConfig::default()), "/debug/relays").await;
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["active_count"], 0);
        assert_eq!(json["outcomes"]["graceful_end"], 0);
    }
}
