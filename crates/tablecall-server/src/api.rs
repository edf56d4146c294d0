//! API handlers for the tablecall server.

use crate::call::{CallSession, TurnQuery, WebhookForm};
use crate::pipeline;
use crate::replies;
use crate::AppState;
use axum::{
    extract::{rejection::FormRejection, rejection::QueryRejection, Extension, Form, Path, Query},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::Instrument;

/// Errors for the JSON side routes. The webhook itself never fails; it
/// always answers with markup.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Handler for `GET /health`.
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Handler for `POST /voice/webhook`.
///
/// Always answers `200 application/xml`. Unparseable fields are treated as
/// absent, which classifies the event as no-audio. A caller over the webhook
/// rate limit is told to try again and hung up on without running the turn.
pub async fn voice_webhook_handler(
    Extension(state): Extension<Arc<AppState>>,
    query: Result<Query<TurnQuery>, QueryRejection>,
    form: Result<Form<WebhookForm>, FormRejection>,
) -> Response {
    let query = query.map(|Query(q)| q).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "ignoring malformed webhook query");
        TurnQuery::default()
    });
    let form = form.map(|Form(f)| f).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "ignoring malformed webhook form");
        WebhookForm::default()
    });

    let session = CallSession::from_event(&form, query);
    let span = tracing::info_span!(
        "call_turn",
        request_id = %session.request_id,
        stage = session.stage.as_str(),
        caller = %session.caller,
        dialed = %session.dialed,
        call_sid = session.call_sid.as_deref().unwrap_or(""),
        reprompts = session.reprompts,
    );
    let throttled = session
        .rate_limit_key()
        .is_some_and(|key| !state.rate_limiter.check(key, state.webhook_rate_limit));
    let xml = if throttled {
        tracing::warn!(
            parent: &span,
            limit = state.webhook_rate_limit,
            "webhook rate limit exceeded"
        );
        pipeline::say_and_hang_up(&state, replies::RATE_LIMITED)
    } else {
        pipeline::run_call_turn(&state, &session)
            .instrument(span)
            .await
    };

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/xml")],
        xml,
    )
        .into_response()
}

/// Handler for `GET /voice/audio/{key}`: serves published synthesized audio.
pub async fn serve_audio_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Response, ApiError> {
    let clip = state
        .audio_cache
        .get(&key)
        .ok_or_else(|| ApiError::NotFound(format!("audio {}", key)))?;

    tracing::debug!(key = %key, bytes = clip.bytes.len(), "serving audio");
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, clip.content_type)],
        clip.bytes,
    )
        .into_response())
}
