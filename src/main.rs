//! Translation relay server.
//!
//! Accepts translation requests over HTTP and relays them to the DeepL
//! JSON-RPC endpoint.
//!
//! # Usage
//!
//! ```bash
//! # Start the server
//! deepl-relay
//!
//! # With a custom port and verbose logs
//! PORT=8080 deepl-relay --debug
//! ```

use anyhow::{Context, Result};
use deepl_relay::config::Config;
use deepl_relay::translator::Translator;
use deepl_relay::web::{self, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let debug = std::env::args().skip(1).any(|a| a == "-d" || a == "--debug");
    let default_filter = if debug {
        "deepl_relay=debug"
    } else {
        "deepl_relay=info"
    };

    // Initialize logging - use RUST_LOG env var, defaulting to info level
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .init();

    // Load configuration
    let config = Config::load()?;

    let translator = Translator::new(config.upstream.clone(), config.pipeline.clone())
        .context("Failed to create HTTP client")?;

    let state = Arc::new(AppState {
        translator,
        default_session: config.default_session.clone(),
        default_proxy: config.default_proxy.clone(),
    });
    let app = web::router(state);

    let addr = SocketAddr::from((config.host, config.port));
    info!("Translation relay starting on http://{}", addr);
    info!(
        "Upstream {} as {:?}, {:?} segmentation",
        config.upstream.endpoint, config.upstream.profile, config.pipeline.segmentation
    );
    if debug {
        info!("Debug mode enabled, verbose logging active");
    }

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
