//! Scripted provider for tests.

use async_trait::async_trait;
use std::sync::Mutex;

use super::{CompletionProvider, CompletionRequest, CompletionResponse, ProviderError};

type Script = Box<dyn Fn(&str) -> Result<String, ProviderError> + Send + Sync>;

/// Answers each prompt with a scripted reply and records what it was sent.
pub(crate) struct ScriptedProvider {
    script: Script,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    pub(crate) fn new(
        script: impl Fn(&str) -> Result<String, ProviderError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            script: Box::new(script),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Same reply for every prompt.
    pub(crate) fn always(reply: &str) -> Self {
        let reply = reply.to_string();
        Self::new(move |_| Ok(reply.clone()))
    }

    /// Every call fails as if the endpoint were down.
    pub(crate) fn failing() -> Self {
        Self::new(|_| Err(ProviderError::HttpError("connection refused".to_string())))
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .map(|request| request.prompt)
            .collect()
    }

    pub(crate) fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        let content = (self.script)(&request.prompt)?;
        Ok(CompletionResponse { content })
    }

    async fn health_check(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
