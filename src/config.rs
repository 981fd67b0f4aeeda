//! Configuration module for the relay.
//!
//! Handles loading configuration from environment variables and .env files.

use crate::payload::SourceLangField;
use crate::transport::{ClientProfile, UpstreamConfig, DEFAULT_ENDPOINT};
use crate::translator::{PipelineOptions, SegmentationMode};
use anyhow::{Context, Result};
use std::net::IpAddr;
use std::time::Duration;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server binds to.
    pub host: IpAddr,

    /// Port the HTTP server listens on.
    pub port: u16,

    /// Upstream endpoint and the client identity presented to it.
    pub upstream: UpstreamConfig,

    /// Segmentation strategy and protocol options.
    pub pipeline: PipelineOptions,

    /// Session credential used when a request does not bring its own.
    pub default_session: Option<String>,

    /// Proxy used when a request does not name one.
    pub default_proxy: Option<String>,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// Optional environment variables:
    /// - `HOST`: Bind address (default: 127.0.0.1)
    /// - `PORT`: Bind port (default: 3000)
    /// - `UPSTREAM_URL`: JSON-RPC endpoint (default: https://www2.deepl.com/jsonrpc)
    /// - `CLIENT_PROFILE`: "extension" (default) or "mobile"
    /// - `SEGMENTATION`: "remote" (default) or "local"
    /// - `SOURCE_LANG_FIELD`: "computed" (default) or "user_selected"
    /// - `EXTENDED_JOB_PARAMS`: "true" to send formality/transcription defaults
    /// - `MAX_CONCURRENT_LINES`: Parallel line requests in local mode (default: 4)
    /// - `UPSTREAM_TIMEOUT_SECS`: Per-call timeout (default: 10)
    /// - `DL_SESSION`: Default session credential
    /// - `PROXY`: Default outbound proxy as host:port
    pub fn load() -> Result<Self> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let host: IpAddr = var("HOST")
            .unwrap_or_else(|| "127.0.0.1".to_string())
            .parse()
            .context("HOST must be a valid IP address")?;

        let port: u16 = var("PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse()
            .context("PORT must be a valid number")?;

        let timeout_secs: u64 = var("UPSTREAM_TIMEOUT_SECS")
            .unwrap_or_else(|| "10".to_string())
            .parse()
            .context("UPSTREAM_TIMEOUT_SECS must be a valid positive number")?;

        let max_concurrent_lines: usize = var("MAX_CONCURRENT_LINES")
            .unwrap_or_else(|| "4".to_string())
            .parse()
            .context("MAX_CONCURRENT_LINES must be a valid positive number")?;

        let extended_job_params = match var("EXTENDED_JOB_PARAMS") {
            Some(v) => parse_bool(&v).context("EXTENDED_JOB_PARAMS must be true or false")?,
            None => false,
        };

        // FromStr impls for these enums are infallible and fall back to the default
        let profile: ClientProfile = var("CLIENT_PROFILE")
            .map(|s| s.parse().unwrap_or_default())
            .unwrap_or_default();
        let segmentation: SegmentationMode = var("SEGMENTATION")
            .map(|s| s.parse().unwrap_or_default())
            .unwrap_or_default();
        let source_field: SourceLangField = var("SOURCE_LANG_FIELD")
            .map(|s| s.parse().unwrap_or_default())
            .unwrap_or_default();

        let endpoint = var("UPSTREAM_URL").unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

        Ok(Config {
            host,
            port,
            upstream: UpstreamConfig {
                endpoint,
                profile,
                timeout: Duration::from_secs(timeout_secs.max(1)),
            },
            pipeline: PipelineOptions {
                segmentation,
                source_field,
                extended_job_params,
                max_concurrent_lines: max_concurrent_lines.max(1),
            },
            default_session: var("DL_SESSION"),
            default_proxy: var("PROXY"),
        })
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("not a boolean: {}", other),
    }
}
