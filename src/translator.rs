//! Translation pipeline: segment, build jobs, encode, send, normalize.
//!
//! Two segmentation strategies are supported. Remote segmentation sends the
//! whole text to `LMT_split_text` first and translates all sentences in one
//! `LMT_handle_jobs` call. Local segmentation splits on newlines and translates
//! every non-blank line in its own call, running a bounded number in parallel.

use crate::error::TranslateError;
use crate::ids::{
    count_marker_letter, derive_timestamp, generate_request_id, Clock, RandomSource, SystemClock,
    ThreadRandom,
};
use crate::jobs::{build_jobs, Sentence};
use crate::normalize::{merge_lines, render_translations, Rendered, Tier, TranslationResult};
use crate::payload::{
    handle_jobs_request, split_request, JobsOptions, SourceLangField, TargetLanguage,
    METHOD_HANDLE_JOBS, METHOD_SPLIT_TEXT,
};
use crate::segment::{parse_split_response, split_lines, text_type_for, TagHandling};
use crate::transport::{session_cookie, Transport, UpstreamConfig};
use futures_util::stream::{self, StreamExt, TryStreamExt};
use reqwest::header::HeaderValue;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tracing::{debug, info};

/// A translation request as accepted by [`Translator::translate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslateRequest {
    pub text: String,

    /// ISO code or `auto`.
    pub source_lang: String,

    /// ISO code, optionally with a region such as `PT-BR`.
    pub target_lang: String,

    pub tag_handling: TagHandling,

    /// Upstream `dl_session` cookie value. Its presence selects the Pro tier.
    pub session: Option<String>,

    /// Outbound proxy as `host:port`.
    pub proxy: Option<String>,

    /// Number of alternatives wanted in addition to the primary translation.
    pub alternative_count: u32,
}

impl Default for TranslateRequest {
    fn default() -> Self {
        Self {
            text: String::new(),
            source_lang: "auto".to_string(),
            target_lang: "RU".to_string(),
            tag_handling: TagHandling::Plaintext,
            session: None,
            proxy: None,
            alternative_count: 0,
        }
    }
}

impl TranslateRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

/// Where text gets split into sentences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SegmentationMode {
    /// Ask the upstream via `LMT_split_text`.
    #[default]
    Remote,
    /// Split on newlines and translate line by line.
    Local,
}

impl FromStr for SegmentationMode {
    type Err = std::convert::Infallible;

    /// Accepts "local" or "lines"; anything else is remote.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "local" | "lines" => SegmentationMode::Local,
            _ => SegmentationMode::Remote,
        })
    }
}

/// Protocol choices that stay fixed for the life of the process.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub segmentation: SegmentationMode,
    pub source_field: SourceLangField,
    pub extended_job_params: bool,
    /// Upper bound on parallel line requests in local mode.
    pub max_concurrent_lines: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            segmentation: SegmentationMode::Remote,
            source_field: SourceLangField::Computed,
            extended_job_params: false,
            max_concurrent_lines: 4,
        }
    }
}

/// Relays translation requests to the upstream JSON-RPC service.
///
/// Cloning is cheap; the HTTP client and entropy sources are shared.
#[derive(Clone)]
pub struct Translator {
    upstream: UpstreamConfig,
    options: PipelineOptions,

    /// Client used when a request names no proxy.
    transport: Transport,

    /// Clients for proxies seen so far, keyed by `host:port`.
    proxied: Arc<Mutex<HashMap<String, Transport>>>,

    rng: Arc<dyn RandomSource>,
    clock: Arc<dyn Clock>,
}

/// Pieces of a finished pipeline run before they become a public result.
struct Outcome {
    id: u64,
    rendered: Rendered,
    source_lang: String,
}

impl Translator {
    /// Creates a translator using the thread RNG and the system clock.
    pub fn new(upstream: UpstreamConfig, options: PipelineOptions) -> Result<Self, TranslateError> {
        Self::with_entropy(
            upstream,
            options,
            Arc::new(ThreadRandom),
            Arc::new(SystemClock),
        )
    }

    /// Creates a translator with explicit randomness and clock sources.
    pub fn with_entropy(
        upstream: UpstreamConfig,
        options: PipelineOptions,
        rng: Arc<dyn RandomSource>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, TranslateError> {
        let transport = Transport::new(&upstream, None)?;
        Ok(Self {
            upstream,
            options,
            transport,
            proxied: Arc::new(Mutex::new(HashMap::new())),
            rng,
            clock,
        })
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Translates a request end to end.
    ///
    /// Input is validated before any network call. Any failing upstream call
    /// fails the whole request; there are no partial results and no retries.
    pub async fn translate(
        &self,
        request: &TranslateRequest,
    ) -> Result<TranslationResult, TranslateError> {
        if request.text.trim().is_empty() {
            return Err(TranslateError::InvalidInput("no text to translate".into()));
        }
        if request.target_lang.trim().is_empty() {
            return Err(TranslateError::InvalidInput("target language is required".into()));
        }

        let session = request.session.as_deref().filter(|s| !s.is_empty());
        let cookie = session.map(session_cookie).transpose()?;
        let proxy = request.proxy.as_deref().filter(|p| !p.trim().is_empty());
        let transport = self.transport_for(proxy)?;

        let start = Instant::now();
        let cookie = cookie.as_ref();
        let outcome = match self.options.segmentation {
            SegmentationMode::Remote => self.translate_remote(&transport, request, cookie).await?,
            SegmentationMode::Local => self.translate_local(&transport, request, cookie).await?,
        };

        if outcome.rendered.text.trim().is_empty() {
            return Err(TranslateError::NoTranslation);
        }

        let tier = Tier::from_session(session);
        info!(
            "Translated {} chars to {} ({:?}, {} alternatives) in {}ms",
            request.text.chars().count(),
            request.target_lang,
            tier,
            outcome.rendered.alternatives.len(),
            start.elapsed().as_millis()
        );

        Ok(TranslationResult {
            id: outcome.id,
            text: outcome.rendered.text,
            alternatives: outcome.rendered.alternatives,
            source_lang: outcome.source_lang,
            target_lang: request.target_lang.clone(),
            tier,
        })
    }

    /// Returns the client for a proxy, building it on first use.
    fn transport_for(&self, proxy: Option<&str>) -> Result<Transport, TranslateError> {
        let Some(proxy) = proxy.map(str::trim) else {
            return Ok(self.transport.clone());
        };

        let mut cache = self.proxied.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(transport) = cache.get(proxy) {
            return Ok(transport.clone());
        }

        debug!("Creating client for proxy {}", proxy);
        let transport = Transport::new(&self.upstream, Some(proxy))?;
        cache.insert(proxy.to_string(), transport.clone());
        Ok(transport)
    }

    /// Split remotely, then translate every sentence in one call.
    async fn translate_remote(
        &self,
        transport: &Transport,
        request: &TranslateRequest,
        cookie: Option<&HeaderValue>,
    ) -> Result<Outcome, TranslateError> {
        let text_type = text_type_for(&request.text, request.tag_handling);

        let split_id = generate_request_id(self.rng.as_ref());
        let body = split_request(split_id, &request.text, text_type).encode()?;
        let reply = transport.call(METHOD_SPLIT_TEXT, body, None).await?;
        let segmentation = parse_split_response(reply)?;

        debug!(
            "Split request {} produced {} sentences (detected {:?})",
            split_id,
            segmentation.sentences.len(),
            segmentation.detected_lang
        );

        let source_lang = resolve_source_lang(&request.source_lang, segmentation.detected_lang);
        let target = TargetLanguage::parse(&request.target_lang);
        let jobs = build_jobs(&segmentation.sentences, request.alternative_count);

        let id = generate_request_id(self.rng.as_ref());
        let opts = JobsOptions {
            source_lang: &source_lang,
            target: &target,
            source_field: self.options.source_field,
            extended: self.options.extended_job_params,
            text_type,
            priority: Some(1),
            timestamp: derive_timestamp(self.clock.as_ref(), count_marker_letter(&request.text)),
        };
        let body = handle_jobs_request(id, jobs, &opts).encode()?;
        let reply = transport.call(METHOD_HANDLE_JOBS, body, cookie).await?;

        Ok(Outcome {
            id,
            rendered: render_translations(reply)?,
            source_lang,
        })
    }

    /// Translate non-blank lines independently and stitch them back together.
    async fn translate_local(
        &self,
        transport: &Transport,
        request: &TranslateRequest,
        cookie: Option<&HeaderValue>,
    ) -> Result<Outcome, TranslateError> {
        let target = TargetLanguage::parse(&request.target_lang);
        let slots = split_lines(&request.text);
        let concurrency = self.options.max_concurrent_lines.max(1);

        debug!(
            "Translating {} lines locally, up to {} at a time",
            slots.len(),
            concurrency
        );

        // `buffered` yields in input order regardless of completion order.
        let lines: Vec<Option<(u64, Rendered)>> = stream::iter(slots.into_iter().map(|slot| {
            let target = &target;
            async move {
                match slot {
                    None => Ok(None),
                    Some(sentence) => self
                        .translate_line(transport, request, target, sentence, cookie)
                        .await
                        .map(Some),
                }
            }
        }))
        .buffered(concurrency)
        .try_collect()
        .await?;

        let id = lines.iter().flatten().map(|(id, _)| *id).last().unwrap_or(0);
        let rendered: Vec<Option<Rendered>> = lines
            .into_iter()
            .map(|line| line.map(|(_, r)| r))
            .collect();

        Ok(Outcome {
            id,
            rendered: merge_lines(&rendered),
            source_lang: request.source_lang.clone(),
        })
    }

    async fn translate_line(
        &self,
        transport: &Transport,
        request: &TranslateRequest,
        target: &TargetLanguage,
        sentence: Sentence,
        cookie: Option<&HeaderValue>,
    ) -> Result<(u64, Rendered), TranslateError> {
        let text_type = text_type_for(&sentence.text, request.tag_handling);
        let timestamp = derive_timestamp(self.clock.as_ref(), count_marker_letter(&sentence.text));
        let jobs = build_jobs(std::slice::from_ref(&sentence), request.alternative_count);

        let id = generate_request_id(self.rng.as_ref());
        let opts = JobsOptions {
            source_lang: &request.source_lang,
            target,
            source_field: self.options.source_field,
            extended: self.options.extended_job_params,
            text_type,
            priority: None,
            timestamp,
        };
        let body = handle_jobs_request(id, jobs, &opts).encode()?;
        let reply = transport.call(METHOD_HANDLE_JOBS, body, cookie).await?;

        Ok((id, render_translations(reply)?))
    }
}

/// Uses the detected language only when the caller asked for auto-detection.
fn resolve_source_lang(requested: &str, detected: Option<String>) -> String {
    let auto = requested.trim().is_empty() || requested.eq_ignore_ascii_case("auto");
    match detected {
        Some(detected) if auto => detected,
        _ => requested.to_string(),
    }
}
