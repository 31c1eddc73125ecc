//! Completion provider abstractions for riskgate-runtime.
//!
//! The oracle talks to a text-completion service through the
//! [`CompletionProvider`] trait. The llamafile provider (behind the
//! `llamafile` feature) is the production implementation; tests plug in
//! scripted providers.
//!
//! ## Security
//!
//! API keys are held in [`ApiCredential`], which never prints its value.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub mod secrets;

#[cfg(feature = "llamafile")]
mod llamafile;

#[cfg(test)]
pub(crate) mod mock;

pub use secrets::{ApiCredential, CredentialSource, ORACLE_API_KEY_ENV};

#[cfg(feature = "llamafile")]
pub use llamafile::LlamafileProvider;

/// Errors from completion providers.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    ParseError(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

/// Body of a completion call. Field names follow the llama.cpp server API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,

    /// Maximum tokens to generate
    pub n_predict: u32,

    /// Temperature (0.0 for deterministic)
    pub temperature: f32,

    pub top_p: f32,
    pub min_p: f32,
    pub top_k: u32,

    /// Sequences that end generation
    pub stop: Vec<String>,
}

/// Response from a completion call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletionResponse {
    /// Generated text
    pub content: String,
}

/// Provider abstraction allows swapping completion backends.
///
/// This is the only place where oracle calls leave the process.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Execute a completion.
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError>;

    /// Check if the backend is reachable.
    async fn health_check(&self) -> bool;

    /// Get provider name for logs.
    fn name(&self) -> &str;
}
