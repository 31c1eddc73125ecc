//! llamafile / llama.cpp server provider.
//!
//! Talks to an already-running server's `/completion` endpoint. Process
//! lifecycle (download, launch, shutdown) is handled outside this crate.
//!
//! ## Security
//!
//! The optional bearer key is held in an [`ApiCredential`] and exposed only
//! when the request header is set.

use super::{
    secrets::ApiCredential, CompletionProvider, CompletionRequest, CompletionResponse,
    ProviderError,
};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Completion client for a llamafile server.
pub struct LlamafileProvider {
    endpoint: String,
    credential: Option<ApiCredential>,
    timeout: Duration,
    client: reqwest::Client,
}

impl std::fmt::Debug for LlamafileProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlamafileProvider")
            .field("endpoint", &self.endpoint)
            .field("credential", &self.credential)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl LlamafileProvider {
    /// Create a provider for the server at `endpoint` (scheme, host, port).
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            return Err(ProviderError::NotConfigured(format!(
                "oracle endpoint must start with http:// or https://, got '{}'",
                endpoint
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::NotConfigured(e.to_string()))?;

        Ok(Self {
            endpoint,
            credential: None,
            timeout,
            client,
        })
    }

    /// Send a bearer key with every request.
    pub fn with_credential(mut self, credential: Option<ApiCredential>) -> Self {
        self.credential = credential;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.credential {
            // SECURITY: Only expose the credential here, at the point of use
            Some(credential) => request.bearer_auth(credential.expose()),
            None => request,
        }
    }
}

/// llama.cpp server response; only `content` is used.
#[derive(Debug, Deserialize)]
struct LlamafileResponse {
    content: String,
}

#[async_trait]
impl CompletionProvider for LlamafileProvider {
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        let response = self
            .authorize(self.client.post(format!("{}/completion", self.endpoint)))
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(self.timeout)
                } else {
                    ProviderError::HttpError(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let body: LlamafileResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        Ok(CompletionResponse {
            content: body.content,
        })
    }

    async fn health_check(&self) -> bool {
        self.authorize(self.client.get(format!("{}/health", self.endpoint)))
            .send()
            .await
            .map(|response| response.status().is_success())
            .unwrap_or(false)
    }

    fn name(&self) -> &str {
        "llamafile"
    }
}
