//! API Routes
//!
//! Configures the Axum router with all diagnostics endpoints.

use axum::{
    routing::{get, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    delete_record_handler, events_handler, get_resource_handler, health_handler,
    put_record_handler, stats_handler, subscriptions_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /resources/:name` - Cached rows of a watched resource
/// - `PUT /resources/:name/:id` - Insert or update a row
/// - `DELETE /resources/:name/:id` - Delete a row
/// - `GET /events` - Recent bus events
/// - `GET /subscriptions` - Channel status per watched resource
/// - `GET /stats` - Cache statistics
/// - `GET /health` - Health check endpoint
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/resources/:name", get(get_resource_handler))
        .route(
            "/resources/:name/:id",
            put(put_record_handler).delete(delete_record_handler),
        )
        .route("/events", get(events_handler))
        .route("/subscriptions", get(subscriptions_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::feed::InMemoryBackend;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use std::sync::Arc;
    use tower::util::ServiceExt;

    fn create_test_app() -> Router {
        let backend = InMemoryBackend::new();
        let state = AppState::from_config(
            &Config::default(),
            Arc::new(backend.clone()),
            Arc::new(backend),
        )
        .unwrap();
        create_router(state)
    }

    async fn status_of(app: Router, method: &str, uri: &str, body: Body) -> StatusCode {
        app.oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json")
                .body(body)
                .unwrap(),
        )
        .await
        .unwrap()
        .status()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let status = status_of(create_test_app(), "GET", "/health", Body::empty()).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_stats_endpoint() {
        let status = status_of(create_test_app(), "GET", "/stats", Body::empty()).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_put_endpoint() {
        let status = status_of(
            create_test_app(),
            "PUT",
            "/resources/calls/c1",
            Body::from(r#"{"rep":"ana","duration":300}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unwatched_resource_not_found() {
        let status = status_of(create_test_app(), "GET", "/resources/teams", Body::empty()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_events_endpoint() {
        let status = status_of(create_test_app(), "GET", "/events?limit=5", Body::empty()).await;
        assert_eq!(status, StatusCode::OK);
    }
}
