//! HTTP API in front of the translation pipeline.
//!
//! # Endpoints
//!
//! ## POST /translate (also POST /api/translate)
//!
//! ### Request
//! ```json
//! {
//!   "text": "Hello world",
//!   "source_lang": "auto",
//!   "target_lang": "RU",
//!   "tag_handling": "",
//!   "dl_session": "",
//!   "proxy": "",
//!   "alternative_count": 0
//! }
//! ```
//!
//! ### Response
//! ```json
//! {
//!   "code": 200,
//!   "id": 8300123000,
//!   "data": "Привет мир",
//!   "alternatives": ["Привет, мир"],
//!   "source_lang": "EN",
//!   "target_lang": "RU",
//!   "method": "Free"
//! }
//! ```
//!
//! ## GET /health
//!
//! Health check endpoint.

use crate::error::TranslateError;
use crate::normalize::TranslationResult;
use crate::translator::{TranslateRequest, Translator};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{StatusCode, Uri},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

/// Shared state for all route handlers.
pub struct AppState {
    pub translator: Translator,

    /// Session credential applied when the body has none.
    pub default_session: Option<String>,

    /// Proxy applied when the body has none.
    pub default_proxy: Option<String>,
}

/// Request body of the translate endpoint.
#[derive(Debug, Deserialize)]
struct TranslateBody {
    #[serde(default)]
    text: String,

    #[serde(default = "default_source_lang")]
    source_lang: String,

    #[serde(default = "default_target_lang")]
    target_lang: String,

    #[serde(default)]
    tag_handling: String,

    #[serde(default)]
    dl_session: String,

    #[serde(default)]
    proxy: String,

    #[serde(default)]
    alternative_count: u32,
}

fn default_source_lang() -> String {
    "auto".to_string()
}

fn default_target_lang() -> String {
    "RU".to_string()
}

/// Successful translation response.
#[derive(Debug, Serialize)]
struct TranslateResponse {
    code: u16,

    #[serde(flatten)]
    result: TranslationResult,
}

/// Error response.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    code: u16,

    message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Builds the router with permissive CORS.
pub fn router(state: Arc<AppState>) -> Router {
    // Configure CORS to allow requests from any origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/translate", post(translate))
        .route("/api/translate", post(translate))
        .fallback(not_found)
        .layer(cors)
        .with_state(state)
}

impl TranslateBody {
    fn into_request(self, state: &AppState) -> TranslateRequest {
        let non_empty = |s: String| if s.trim().is_empty() { None } else { Some(s) };

        TranslateRequest {
            text: self.text,
            source_lang: non_empty(self.source_lang).unwrap_or_else(default_source_lang),
            target_lang: self.target_lang,
            tag_handling: self.tag_handling.parse().unwrap_or_default(),
            session: non_empty(self.dl_session).or_else(|| state.default_session.clone()),
            proxy: non_empty(self.proxy).or_else(|| state.default_proxy.clone()),
            alternative_count: self.alternative_count,
        }
    }
}

/// Service banner.
async fn index() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "code": 200,
        "message": "Welcome to the translation relay. POST /translate to translate text.",
    }))
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

async fn not_found() -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            code: 404,
            message: "Path not found".to_string(),
            error: None,
        }),
    )
}

/// Translate endpoint.
async fn translate(
    State(state): State<Arc<AppState>>,
    uri: Uri,
    body: Result<Json<TranslateBody>, JsonRejection>,
) -> Result<Json<TranslateResponse>, ApiError> {
    let start = Instant::now();

    let body = match body {
        Ok(Json(body)) if !body.text.is_empty() => body,
        Ok(_) => {
            return Err(log_failure(
                &uri,
                start,
                bad_request("Request body must contain non-empty text".to_string()),
            ))
        }
        Err(rejection) => {
            return Err(log_failure(
                &uri,
                start,
                bad_request(format!("Invalid request body: {}", rejection.body_text())),
            ))
        }
    };

    let request = body.into_request(&state);
    match state.translator.translate(&request).await {
        Ok(result) => {
            info!(
                "200 | {}ms | POST {}",
                start.elapsed().as_millis(),
                uri.path()
            );
            Ok(Json(TranslateResponse { code: 200, result }))
        }
        Err(e) => {
            let status = status_for(&e);
            let elapsed = start.elapsed().as_millis();
            if status.is_server_error() {
                error!("{} | {}ms | POST {} | {}", status.as_u16(), elapsed, uri.path(), e);
            } else {
                warn!("{} | {}ms | POST {} | {}", status.as_u16(), elapsed, uri.path(), e);
            }
            Err((
                status,
                Json(ErrorResponse {
                    code: status.as_u16(),
                    message: message_for(&e).to_string(),
                    error: Some(e.to_string()),
                }),
            ))
        }
    }
}

fn bad_request(message: String) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            code: 400,
            message,
            error: None,
        }),
    )
}

fn log_failure(uri: &Uri, start: Instant, response: ApiError) -> ApiError {
    warn!(
        "{} | {}ms | POST {}",
        response.0.as_u16(),
        start.elapsed().as_millis(),
        uri.path()
    );
    response
}

/// Maps a pipeline error to the HTTP status returned to the caller.
fn status_for(error: &TranslateError) -> StatusCode {
    if error.is_client_error() {
        return StatusCode::BAD_REQUEST;
    }
    match error {
        TranslateError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        TranslateError::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_GATEWAY,
    }
}

fn message_for(error: &TranslateError) -> &'static str {
    match error {
        TranslateError::InvalidInput(_) | TranslateError::InvalidProxy(_) => "Invalid request",
        TranslateError::RateLimited => "Too many requests, try again later",
        _ => "Translation failed",
    }
}
