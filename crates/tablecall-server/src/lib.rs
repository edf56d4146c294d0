//! Tablecall server library logic.
//!
//! Hosts the inbound call webhook: each provider event becomes one call turn
//! that greets, transcribes, classifies and acts on what the caller said, and
//! always answers with telephony markup.

pub mod api;
pub mod background;
pub mod call;
pub mod config;
pub mod intent_router;
pub mod order_builder;
pub mod pipeline;
pub mod rate_limit;
pub mod replies;
pub mod seed;
pub mod twiml;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Extension, Router,
};
use pipeline::PipelineSettings;
use rate_limit::RateLimiter;
use std::sync::Arc;
use tablecall_db::DbPool;
use tablecall_intent::{IntentClassifier, QuestionAnswerer};
use tablecall_types::voice::VoiceSettings;
use tablecall_voice::{AudioCache, Synthesizer, Transcriber};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: DbPool,
    /// Call turn deadlines and recording parameters.
    pub pipeline: PipelineSettings,
    /// Voice parameters for synthesis and the say fallback.
    pub voice: VoiceSettings,
    pub synthesizer: Arc<dyn Synthesizer>,
    pub transcriber: Arc<dyn Transcriber>,
    pub classifier: IntentClassifier,
    pub answerer: QuestionAnswerer,
    /// Synthesized audio awaiting fetch by the telephony provider.
    pub audio_cache: AudioCache,
    /// Per-caller webhook counters.
    pub rate_limiter: RateLimiter,
    /// Webhook requests per caller per minute.
    pub webhook_rate_limit: u32,
}

/// Maximum request body size (64 KiB). Webhook forms are small.
const MAX_REQUEST_BODY_BYTES: usize = 64 * 1024;

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    let webhook_path = state.pipeline.record.action.clone();

    Router::new()
        .route("/health", get(api::health))
        .route(&webhook_path, post(api::voice_webhook_handler))
        .route("/voice/audio/{key}", get(api::serve_audio_handler))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(Arc::new(state)))
}
