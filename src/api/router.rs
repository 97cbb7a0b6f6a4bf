use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use super::health;
use super::images;
use super::middleware::{logging_middleware, metrics_middleware};
use super::state::AppState;
use super::types::IMAGES_ROUTE;

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Create the full router with application state
pub fn create_router_with_state(state: AppState) -> Router {
    let api = Router::new()
        .route("/generate-image", post(images::generate_image))
        .route("/cache/stats", get(images::cache_stats))
        .layer(cors_layer());

    let artifacts = Router::new()
        .nest_service(IMAGES_ROUTE, ServeDir::new(&state.artifacts_dir))
        .layer(cors_layer());

    Router::new()
        // Health endpoints
        .route("/health", get(health::health_check))
        .route("/ready", get(health::ready_check))
        .route("/live", get(health::live_check))
        .nest("/api", api)
        .merge(artifacts)
        // Add state and middleware
        .with_state(state)
        .layer(middleware::from_fn(logging_middleware))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tempfile::TempDir;
    use tower::ServiceExt;

    use crate::domain::embedding::MockEncoder;
    use crate::domain::generator::mock::MockImageGenerator;
    use crate::domain::{Encoder, SemanticCacheConfig};
    use crate::infrastructure::artifact::FilesystemArtifactStore;
    use crate::infrastructure::semantic_cache::InMemorySimilarityIndex;
    use crate::infrastructure::services::SemanticImageCacheService;

    async fn test_app(dir: &TempDir, generator: MockImageGenerator) -> Router {
        let encoder = MockEncoder::new(4);
        let index = InMemorySimilarityIndex::new(encoder.identity().clone());
        let artifacts = FilesystemArtifactStore::open(dir.path()).await.unwrap();

        let service = SemanticImageCacheService::with_config(
            Arc::new(encoder),
            Arc::new(index),
            Arc::new(generator),
            Arc::new(artifacts),
            SemanticCacheConfig::default(),
        )
        .unwrap();

        create_router_with_state(AppState::new(Arc::new(service), dir.path()))
    }

    fn generate_request(body: &'static str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/generate-image")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoints() {
        let dir = TempDir::new().unwrap();
        let app = test_app(&dir, MockImageGenerator::new()).await;

        let health = app
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let live = app
            .oneshot(Request::builder().uri("/live").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(health.status(), StatusCode::OK);
        assert_eq!(live.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_generate_then_serve_then_hit() {
        let dir = TempDir::new().unwrap();
        let app = test_app(&dir, MockImageGenerator::new()).await;

        let response = app
            .clone()
            .oneshot(generate_request(r#"{"prompt":"a red fox"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let first = json_body(response).await;
        assert_eq!(first["source"], "api");
        assert_eq!(first["cached"], false);
        assert!(first["similarity"].is_null());

        let image_url = first["imageUrl"].as_str().unwrap().to_string();
        assert!(image_url.starts_with("/images/"));

        let image = app
            .clone()
            .oneshot(Request::builder().uri(&image_url).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(image.status(), StatusCode::OK);
        let bytes = image.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(bytes.as_ref(), b"image for a red fox");

        let second = json_body(
            app.oneshot(generate_request(r#"{"prompt":"a red fox"}"#))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(second["source"], "cache");
        assert_eq!(second["cached"], true);
        assert_eq!(second["imageUrl"], image_url.as_str());
    }

    #[tokio::test]
    async fn test_missing_prompt_is_400() {
        let dir = TempDir::new().unwrap();
        let app = test_app(&dir, MockImageGenerator::new()).await;

        let response = app.oneshot(generate_request("{}")).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"]["message"], "Prompt is required");
        assert_eq!(body["error"]["type"], "invalid_request_error");
    }

    #[tokio::test]
    async fn test_empty_prompt_is_400() {
        let dir = TempDir::new().unwrap();
        let app = test_app(&dir, MockImageGenerator::new()).await;

        let response = app.oneshot(generate_request(r#"{"prompt":""}"#)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_json_is_400() {
        let dir = TempDir::new().unwrap();
        let app = test_app(&dir, MockImageGenerator::new()).await;

        let response = app.oneshot(generate_request("{prompt")).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], "json_parse_error");
    }

    #[tokio::test]
    async fn test_non_json_body_is_400() {
        let dir = TempDir::new().unwrap();
        let app = test_app(&dir, MockImageGenerator::new()).await;

        let request = Request::builder()
            .method("POST")
            .uri("/api/generate-image")
            .body(Body::from("prompt=a red fox"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_generation_failure_is_500() {
        let dir = TempDir::new().unwrap();
        let app = test_app(&dir, MockImageGenerator::new().with_error("HTTP 500")).await;

        let response = app
            .oneshot(generate_request(r#"{"prompt":"a red fox"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], "generation_failed");
    }

    #[tokio::test]
    async fn test_missing_image_is_404() {
        let dir = TempDir::new().unwrap();
        let app = test_app(&dir, MockImageGenerator::new()).await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/images/does-not-exist.webp")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_cache_stats() {
        let dir = TempDir::new().unwrap();
        let app = test_app(&dir, MockImageGenerator::new()).await;

        app.clone()
            .oneshot(generate_request(r#"{"prompt":"a red fox"}"#))
            .await
            .unwrap();

        let response = app
            .oneshot(Request::builder().uri("/api/cache/stats").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["totalEntries"], 1);
        assert_eq!(body["misses"], 1);
    }

    #[tokio::test]
    async fn test_ready_reports_index() {
        let dir = TempDir::new().unwrap();
        let app = test_app(&dir, MockImageGenerator::new()).await;

        let response = app
            .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["checks"][0]["name"], "similarity_index");
    }

    #[tokio::test]
    async fn test_cors_on_api() {
        let dir = TempDir::new().unwrap();
        let app = test_app(&dir, MockImageGenerator::new()).await;

        let request = Request::builder()
            .method("OPTIONS")
            .uri("/api/generate-image")
            .header("origin", "http://localhost:3000")
            .header("access-control-request-method", "POST")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(
            response
                .headers()
                .get("access-control-allow-origin")
                .and_then(|v| v.to_str().ok()),
            Some("*")
        );
    }
}
