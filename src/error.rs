//! Error type for the translation pipeline.
//!
//! Every failure inside the pipeline surfaces as one [`TranslateError`] for
//! the whole request. Mapping errors to HTTP statuses is left to the web layer.

use thiserror::Error;

/// Maximum number of characters of an upstream body kept in an error.
const BODY_SNIPPET_CHARS: usize = 200;

/// Errors raised while relaying a translation request.
#[derive(Error, Debug)]
pub enum TranslateError {
    /// The caller sent an empty text or target language.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The proxy setting could not be parsed as `host:port`.
    #[error("invalid proxy address '{0}', expected host:port")]
    InvalidProxy(String),

    /// A request payload could not be serialized.
    #[error("failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),

    /// The split step returned no usable result.
    #[error("text segmentation failed: {0}")]
    SegmentationFailed(String),

    /// The upstream could not be reached.
    #[error("failed to reach translation service: {0}")]
    TransportFailure(#[from] reqwest::Error),

    /// HTTP 429: the client identity is throttled.
    #[error("translation service rate limited the request")]
    RateLimited,

    /// Any other HTTP status >= 400.
    #[error("translation service returned {status}: {body}")]
    UpstreamError { status: u16, body: String },

    /// The response body could not be decoded or parsed.
    #[error("malformed response from translation service: {0}")]
    MalformedResponse(String),

    /// The response carried no translations.
    #[error("translation service returned no translations")]
    EmptyResult,

    /// The translations were present but yielded no text.
    #[error("no translation received")]
    NoTranslation,
}

impl TranslateError {
    /// Builds an [`TranslateError::UpstreamError`], truncating the body.
    pub fn upstream(status: u16, body: &str) -> Self {
        let body = match body.char_indices().nth(BODY_SNIPPET_CHARS) {
            Some((cut, _)) => format!("{}...", &body[..cut]),
            None => body.to_string(),
        };
        TranslateError::UpstreamError { status, body }
    }

    /// Whether the error was caused by the caller rather than the upstream.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            TranslateError::InvalidInput(_) | TranslateError::InvalidProxy(_)
        )
    }
}
