//! HTTP transport to the upstream JSON-RPC endpoint.
//!
//! Requests carry the header set of a real client application. Response bodies
//! are read as raw bytes and decoded here according to `Content-Encoding`,
//! since the upstream may answer with gzip, deflate or brotli.

use crate::error::TranslateError;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_ENCODING, COOKIE};
use reqwest::StatusCode;
use std::io::Read;
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Public JSON-RPC endpoint used by the official clients.
pub const DEFAULT_ENDPOINT: &str = "https://www2.deepl.com/jsonrpc";

/// Client/version pair the browser extension reports in the query string.
const EXTENSION_CLIENT: &str = "chrome-extension,1.28.0";

const EXTENSION_HEADERS: &[(&str, &str)] = &[
    ("accept", "*/*"),
    ("accept-language", "en-US,en;q=0.9"),
    ("accept-encoding", "gzip, deflate, br"),
    ("authorization", "None"),
    ("cache-control", "no-cache"),
    ("content-type", "application/json"),
    ("dnt", "1"),
    ("origin", "chrome-extension://cofdbpoegempjloogbagkncekinflcnj"),
    ("pragma", "no-cache"),
    ("priority", "u=1, i"),
    ("referer", "https://www.deepl.com/"),
    ("sec-fetch-dest", "empty"),
    ("sec-fetch-mode", "cors"),
    ("sec-fetch-site", "none"),
    ("sec-gpc", "1"),
    (
        "user-agent",
        "DeepLBrowserExtension/1.28.0 Mozilla/5.0 (Windows NT 10.0; Win64; x64)",
    ),
];

const MOBILE_HEADERS: &[(&str, &str)] = &[
    ("content-type", "application/json"),
    (
        "user-agent",
        "DeepL/1627620 CFNetwork/3826.500.62.2.1 Darwin/24.4.0",
    ),
    ("accept", "*/*"),
    ("x-app-os-name", "iOS"),
    ("x-app-os-version", "18.4.0"),
    ("accept-language", "en-US,en;q=0.9"),
    ("accept-encoding", "gzip, deflate, br"),
    ("x-app-device", "iPhone16,2"),
    ("referer", "https://www.deepl.com/"),
    ("x-product", "translator"),
    ("x-app-build", "1627620"),
    ("x-app-version", "25.1"),
];

/// The client application the relay presents itself as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientProfile {
    /// Chrome browser extension.
    #[default]
    Extension,
    /// iOS app.
    Mobile,
}

impl FromStr for ClientProfile {
    type Err = std::convert::Infallible;

    /// Accepts "mobile"/"ios"; anything else is the browser extension.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "mobile" | "ios" | "app" => ClientProfile::Mobile,
            _ => ClientProfile::Extension,
        })
    }
}

impl ClientProfile {
    /// Builds the header template for this profile.
    pub fn headers(self) -> HeaderMap {
        let table = match self {
            ClientProfile::Extension => EXTENSION_HEADERS,
            ClientProfile::Mobile => MOBILE_HEADERS,
        };
        table
            .iter()
            .map(|&(name, value)| {
                (
                    HeaderName::from_static(name),
                    HeaderValue::from_static(value),
                )
            })
            .collect()
    }

    /// URL for an RPC method. The extension names itself and the method in the query.
    pub fn request_url(self, endpoint: &str, method: &str) -> String {
        match self {
            ClientProfile::Extension => format!(
                "{}?client={}&method={}",
                endpoint,
                urlencoding::encode(EXTENSION_CLIENT),
                urlencoding::encode(method)
            ),
            ClientProfile::Mobile => endpoint.to_string(),
        }
    }
}

/// Immutable description of the upstream, fixed at startup.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub endpoint: String,
    pub profile: ClientProfile,
    pub timeout: Duration,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            profile: ClientProfile::default(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Splits a `host:port` proxy address.
pub fn parse_proxy(proxy: &str) -> Result<(String, u16), TranslateError> {
    let invalid = || TranslateError::InvalidProxy(proxy.to_string());
    let (host, port) = proxy.trim().rsplit_once(':').ok_or_else(invalid)?;
    if host.is_empty() {
        return Err(invalid());
    }
    let port: u16 = port.parse().map_err(|_| invalid())?;
    Ok((host.to_string(), port))
}

/// Builds the `dl_session` cookie header for a session credential.
pub fn session_cookie(session: &str) -> Result<HeaderValue, TranslateError> {
    HeaderValue::from_str(&format!("dl_session={}", session)).map_err(|_| {
        TranslateError::InvalidInput("session credential contains invalid characters".into())
    })
}

/// HTTP client bound to one upstream and one proxy setting.
#[derive(Debug, Clone)]
pub struct Transport {
    client: reqwest::Client,
    endpoint: String,
    profile: ClientProfile,
    headers: HeaderMap,
}

impl Transport {
    /// Creates a transport. Without a proxy, proxy environment variables are ignored.
    pub fn new(config: &UpstreamConfig, proxy: Option<&str>) -> Result<Self, TranslateError> {
        let mut builder = reqwest::Client::builder().timeout(config.timeout);

        builder = match proxy {
            Some(proxy) => {
                let (host, port) = parse_proxy(proxy)?;
                let proxy = reqwest::Proxy::all(format!("http://{}:{}", host, port))
                    .map_err(|_| TranslateError::InvalidProxy(proxy.to_string()))?;
                builder.proxy(proxy)
            }
            None => builder.no_proxy(),
        };

        Ok(Self {
            client: builder.build()?,
            endpoint: config.endpoint.clone(),
            profile: config.profile,
            headers: config.profile.headers(),
        })
    }

    /// Posts an encoded JSON-RPC body and returns the decoded JSON reply.
    ///
    /// # Errors
    ///
    /// `RateLimited` on 429, `UpstreamError` on any other status >= 400,
    /// `TransportFailure` when the request cannot be completed and
    /// `MalformedResponse` when the body is not decodable JSON.
    pub async fn call(
        &self,
        method: &str,
        body: String,
        cookie: Option<&HeaderValue>,
    ) -> Result<serde_json::Value, TranslateError> {
        let url = self.profile.request_url(&self.endpoint, method);

        let mut headers = self.headers.clone();
        if let Some(cookie) = cookie {
            headers.insert(COOKIE, cookie.clone());
        }

        let start = Instant::now();
        let response = self
            .client
            .post(&url)
            .headers(headers)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let encoding = response
            .headers()
            .get(CONTENT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_ascii_lowercase());
        let bytes = response.bytes().await?;

        debug!(
            "{} -> {} ({} bytes, encoding {:?}) in {}ms",
            method,
            status.as_u16(),
            bytes.len(),
            encoding,
            start.elapsed().as_millis()
        );

        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!("Upstream rate limited {}", method);
            return Err(TranslateError::RateLimited);
        }

        if status.is_client_error() || status.is_server_error() {
            let text = decode_body(encoding.as_deref(), &bytes)
                .unwrap_or_else(|_| String::from_utf8_lossy(&bytes).into_owned());
            warn!("Upstream error for {}: {}", method, status);
            return Err(TranslateError::upstream(status.as_u16(), &text));
        }

        let text = decode_body(encoding.as_deref(), &bytes)?;
        serde_json::from_str(&text)
            .map_err(|e| TranslateError::MalformedResponse(format!("invalid JSON: {}", e)))
    }
}

/// Decodes a response body according to its `Content-Encoding`.
///
/// `deflate` is tried as zlib first and as a raw stream second, since servers
/// disagree on which one the name means. Unknown encodings pass through.
pub fn decode_body(encoding: Option<&str>, bytes: &[u8]) -> Result<String, TranslateError> {
    let decoded = match encoding {
        Some("br") => read_all(brotli::Decompressor::new(bytes, 4096)),
        Some("gzip") | Some("x-gzip") => read_all(flate2::read::GzDecoder::new(bytes)),
        Some("deflate") => read_all(flate2::read::ZlibDecoder::new(bytes))
            .or_else(|_| read_all(flate2::read::DeflateDecoder::new(bytes))),
        _ => Ok(bytes.to_vec()),
    }
    .map_err(|e| {
        TranslateError::MalformedResponse(format!("failed to decode {:?} body: {}", encoding, e))
    })?;

    String::from_utf8(decoded)
        .map_err(|e| TranslateError::MalformedResponse(format!("body is not UTF-8: {}", e)))
}

fn read_all(mut reader: impl Read) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::new();
    reader.read_to_end(&mut out)?;
    Ok(out)
}
