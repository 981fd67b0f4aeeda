//! Relay for the DeepL JSON-RPC translation endpoint.
//!
//! Builds requests the way the official clients do, sends them with the
//! matching client headers, and reshapes the replies into a stable result.

pub mod config;
pub mod error;
pub mod ids;
pub mod jobs;
pub mod normalize;
pub mod payload;
pub mod segment;
pub mod translator;
pub mod transport;
pub mod web;

pub use error::TranslateError;
pub use normalize::{Tier, TranslationResult};
pub use translator::{PipelineOptions, SegmentationMode, TranslateRequest, Translator};
pub use transport::{ClientProfile, UpstreamConfig};
