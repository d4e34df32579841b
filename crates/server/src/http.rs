//! HTTP endpoints
//!
//! REST API for paced question/answer audio generation.

use axum::{
    extract::{Json, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use voxcard_core::{ProviderError, ValidationError, VoiceGender, VoiceSelector};
use voxcard_pipeline::PipelineError;

use crate::state::AppState;

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let audio_dir = state.config.audio.dir.clone();

    let mut router = Router::new()
        // Synthesis endpoints
        .route("/generate-single-tts", post(generate_single_tts))
        .route("/generate-tts", post(generate_paced_tts))
        .route("/generate-paced-tts", post(generate_paced_tts))

        // Finished artifacts
        .nest_service("/static/audio", ServeDir::new(audio_dir))

        // Health check
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))

        // Middleware
        .layer(TraceLayer::new_for_http());

    if state.config.server.cors_enabled {
        router = router.layer(cors_layer(&state.config.server.cors_origins));
    }

    router.with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(parsed))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Single-segment synthesis request
#[derive(Debug, Deserialize)]
struct SingleTtsRequest {
    text: Option<String>,
    gender: Option<VoiceGender>,
    voice_id: Option<String>,
}

/// Paced question/answer synthesis request
#[derive(Debug, Deserialize)]
struct PacedTtsRequest {
    question: Option<String>,
    answer: Option<String>,
    gender: Option<VoiceGender>,
    voice_id: Option<String>,
}

/// Absent fields are a 400, matching empty-text handling, rather than
/// the extractor's default rejection.
fn require(field: Option<String>, name: &'static str) -> Result<String, ApiError> {
    field.ok_or_else(|| ApiError(ValidationError::MissingField(name).into()))
}

/// Successful synthesis response
#[derive(Debug, Serialize)]
struct TtsResponse {
    audio_url: String,
    job_id: String,
}

fn select_voice(voice_id: Option<String>, gender: Option<VoiceGender>) -> VoiceSelector {
    match (voice_id, gender) {
        (Some(id), _) => VoiceSelector::Id(id),
        (None, Some(gender)) => VoiceSelector::Gender(gender),
        (None, None) => VoiceSelector::default(),
    }
}

/// Synthesize a single reading of `text`
async fn generate_single_tts(
    State(state): State<AppState>,
    Json(request): Json<SingleTtsRequest>,
) -> Result<Json<TtsResponse>, ApiError> {
    let text = require(request.text, "text")?;
    let voice = select_voice(request.voice_id, request.gender);
    let artifact = state.pipeline.run_single(&text, voice).await?;

    Ok(Json(TtsResponse {
        audio_url: state.pipeline.store().public_url(&artifact),
        job_id: artifact.id.to_string(),
    }))
}

/// Synthesize a paced question/answer pair into one artifact
async fn generate_paced_tts(
    State(state): State<AppState>,
    Json(request): Json<PacedTtsRequest>,
) -> Result<Json<TtsResponse>, ApiError> {
    let question = require(request.question, "question")?;
    let answer = require(request.answer, "answer")?;
    let voice = select_voice(request.voice_id, request.gender);
    let artifact = state
        .pipeline
        .run_paced(&question, &answer, voice)
        .await?;

    Ok(Json(TtsResponse {
        audio_url: state.pipeline.store().public_url(&artifact),
        job_id: artifact.id.to_string(),
    }))
}

/// Health check
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Readiness check. The service stays reachable even when the model
/// provider is degraded; requests then fail with 503 individually.
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ready",
        "backend": state.config.provider.backend.as_str(),
    }))
}

/// Pipeline failure mapped to an HTTP response. Raw upstream detail is
/// logged inside the pipeline; only a safe summary reaches the caller.
struct ApiError(PipelineError);

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            PipelineError::Validation(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            PipelineError::Job { .. } => match self.0.provider_error() {
                Some(ProviderError::ModelUnavailable(_)) => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "speech model unavailable".to_string(),
                ),
                Some(ProviderError::RateLimited) => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "synthesis backend rate limited".to_string(),
                ),
                Some(ProviderError::AuthMissing) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "synthesis backend misconfigured".to_string(),
                ),
                _ => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "audio generation failed".to_string(),
                ),
            },
        };

        let body = Json(serde_json::json!({ "error": message }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use tower::ServiceExt;
    use voxcard_config::{ProviderBackend, Settings};
    use voxcard_pipeline::{build_provider, PacedSynthesisPipeline};

    async fn stub_state(dir: &std::path::Path) -> AppState {
        let mut settings = Settings::default();
        settings.provider.backend = ProviderBackend::Stub;
        settings.audio.dir = dir.display().to_string();
        let provider = build_provider(&settings).await.unwrap();
        let pipeline = PacedSynthesisPipeline::new(provider, &settings).unwrap();
        AppState::new(settings, pipeline)
    }

    fn json_request(uri: &str, body: serde_json::Value) -> axum::http::Request<axum::body::Body> {
        axum::http::Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(axum::body::Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn paced_endpoint_returns_audio_url() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_router(stub_state(dir.path()).await);

        let response = app
            .oneshot(json_request(
                "/generate-paced-tts",
                serde_json::json!({
                    "question": "What is the capital of France?",
                    "answer": "Paris",
                    "gender": "male",
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        let url = body["audio_url"].as_str().unwrap();
        assert!(url.contains("/static/audio/"));
        assert!(url.ends_with(".wav"));
    }

    #[tokio::test]
    async fn alias_route_matches_paced_route() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_router(stub_state(dir.path()).await);

        let response = app
            .oneshot(json_request(
                "/generate-tts",
                serde_json::json!({ "question": "q", "answer": "a" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn empty_text_maps_to_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_router(stub_state(dir.path()).await);

        let response = app
            .oneshot(json_request(
                "/generate-single-tts",
                serde_json::json!({ "text": "   " }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_answer_maps_to_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_router(stub_state(dir.path()).await);

        let response = app
            .oneshot(json_request(
                "/generate-paced-tts",
                serde_json::json!({ "question": "q" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn generated_artifact_is_served_as_static_file() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_router(stub_state(dir.path()).await);

        let response = app
            .clone()
            .oneshot(json_request(
                "/generate-single-tts",
                serde_json::json!({ "text": "hello" }),
            ))
            .await
            .unwrap();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        let url = body["audio_url"].as_str().unwrap().to_string();

        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri(&url)
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn health_endpoints_respond() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_router(stub_state(dir.path()).await);

        for uri in ["/health", "/ready"] {
            let response = app
                .clone()
                .oneshot(
                    axum::http::Request::builder()
                        .uri(uri)
                        .body(axum::body::Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
    }
}
