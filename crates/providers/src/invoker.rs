//! Unified LLM invocation with provider auto-selection, conversation-history
//! injection, pre-call abort checks and cross-provider fallback.

use crate::deepseek::DeepseekClient;
use crate::gemini::{GeminiClient, GroundedResponse};
use async_trait::async_trait;
use shared::history::HistoryStore;
use shared::settings::{ProviderChoice, ProviderKeys};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Cheap, non-blocking check polled immediately before each network call so a
/// disconnected client doesn't pay for a completed call it can't use.
pub type AbortCheck = Arc<dyn Fn() -> bool + Send + Sync>;

const FALLBACK_GEMINI_MODEL: &str = "gemini-1.5-flash";
const FALLBACK_DEEPSEEK_MODEL: &str = "deepseek-chat";

/// How many history records get injected, and how much of each response.
const HISTORY_RECORDS: usize = 5;
const HISTORY_RESPONSE_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("no LLM providers available - please set DEEPSEEK_API_KEY or GEMINI_API_KEY")]
    Unavailable,
    #[error("request aborted by client")]
    Cancelled,
    #[error("{provider} call failed: {source}")]
    CallFailed {
        provider: &'static str,
        #[source]
        source: anyhow::Error,
    },
    #[error("both {primary} and {fallback} failed. {primary} error: {primary_error}; {fallback} error: {fallback_error}")]
    Exhausted {
        primary: &'static str,
        fallback: &'static str,
        primary_error: String,
        fallback_error: String,
    },
}

/// A concrete backend after `auto` resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Gemini,
    Deepseek,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Gemini => "gemini",
            Backend::Deepseek => "deepseek",
        }
    }

    pub fn other(&self) -> Backend {
        match self {
            Backend::Gemini => Backend::Deepseek,
            Backend::Deepseek => Backend::Gemini,
        }
    }

    fn default_model(&self) -> &'static str {
        match self {
            Backend::Gemini => FALLBACK_GEMINI_MODEL,
            Backend::Deepseek => FALLBACK_DEEPSEEK_MODEL,
        }
    }
}

/// Plain-text generation seam shared by both backend families; lets the
/// fallback logic run against stubs in tests.
#[async_trait]
pub(crate) trait ChatBackend: Send + Sync {
    async fn generate(&self, model: &str, prompt: &str, temperature: f32)
        -> anyhow::Result<String>;
}

#[async_trait]
impl ChatBackend for GeminiClient {
    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        temperature: f32,
    ) -> anyhow::Result<String> {
        GeminiClient::generate(self, model, prompt, temperature).await
    }
}

#[async_trait]
impl ChatBackend for DeepseekClient {
    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        temperature: f32,
    ) -> anyhow::Result<String> {
        DeepseekClient::generate(self, model, prompt, temperature).await
    }
}

/// One invocation request. History is injected only when `include_history`
/// is set and a session id plus a history store are available.
#[derive(Clone)]
pub struct InvokeRequest {
    pub prompt: String,
    pub provider: ProviderChoice,
    pub temperature: f32,
    pub model_override: Option<String>,
    pub session_id: Option<String>,
    pub include_history: bool,
    pub abort_check: Option<AbortCheck>,
}

impl InvokeRequest {
    pub fn new(prompt: impl Into<String>, provider: ProviderChoice, temperature: f32) -> Self {
        Self {
            prompt: prompt.into(),
            provider,
            temperature,
            model_override: None,
            session_id: None,
            include_history: false,
            abort_check: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Invocation {
    pub text: String,
    pub provider_used: String,
}

/// Seam between the research stages and the LLM backends. The production
/// implementation is `ProviderInvoker`; tests substitute mocks.
#[async_trait]
pub trait LlmInvoker: Send + Sync {
    async fn invoke(&self, req: InvokeRequest) -> Result<Invocation, ProviderError>;

    /// Search-tool-augmented generation. Gemini only.
    async fn invoke_grounded(
        &self,
        model: &str,
        prompt: &str,
        temperature: f32,
        abort_check: Option<AbortCheck>,
    ) -> Result<GroundedResponse, ProviderError>;

    fn gemini_available(&self) -> bool;
    fn deepseek_available(&self) -> bool;
}

pub struct ProviderInvoker {
    gemini: Option<Box<dyn ChatBackend>>,
    deepseek: Option<Box<dyn ChatBackend>>,
    /// Separate handle for the search-tool path; grounding is Gemini-only.
    gemini_grounded: Option<GeminiClient>,
    history: Option<Arc<dyn HistoryStore>>,
}

impl ProviderInvoker {
    /// Construct clients once from resolved credentials. Handles are passed
    /// into the workflow explicitly; there is no global client state.
    pub fn new(
        keys: &ProviderKeys,
        timeout: Duration,
        history: Option<Arc<dyn HistoryStore>>,
    ) -> anyhow::Result<Self> {
        let (gemini, gemini_grounded) = match &keys.gemini_api_key {
            Some(key) => {
                let client = GeminiClient::new(key, timeout)?;
                (
                    Some(Box::new(client.clone()) as Box<dyn ChatBackend>),
                    Some(client),
                )
            }
            None => (None, None),
        };
        let deepseek = match &keys.deepseek_api_key {
            Some(key) => Some(Box::new(DeepseekClient::new(
                key,
                &keys.deepseek_base_url,
                timeout,
            )?) as Box<dyn ChatBackend>),
            None => None,
        };
        Ok(Self {
            gemini,
            deepseek,
            gemini_grounded,
            history,
        })
    }

    #[cfg(test)]
    fn with_backends(
        gemini: Option<Box<dyn ChatBackend>>,
        deepseek: Option<Box<dyn ChatBackend>>,
        history: Option<Arc<dyn HistoryStore>>,
    ) -> Self {
        Self {
            gemini,
            deepseek,
            gemini_grounded: None,
            history,
        }
    }

    /// `auto` prefers DeepSeek (cost), falls back to Gemini; explicit choices
    /// are honored even when unconfigured so the fallback path can catch them.
    fn resolve(&self, provider: ProviderChoice) -> Result<Backend, ProviderError> {
        match provider {
            ProviderChoice::Gemini => Ok(Backend::Gemini),
            ProviderChoice::Deepseek => Ok(Backend::Deepseek),
            ProviderChoice::Auto => {
                if self.deepseek.is_some() {
                    Ok(Backend::Deepseek)
                } else if self.gemini.is_some() {
                    Ok(Backend::Gemini)
                } else {
                    Err(ProviderError::Unavailable)
                }
            }
        }
    }

    fn configured(&self, backend: Backend) -> bool {
        match backend {
            Backend::Gemini => self.gemini.is_some(),
            Backend::Deepseek => self.deepseek.is_some(),
        }
    }

    fn build_context_prompt(&self, req: &InvokeRequest) -> String {
        if !req.include_history {
            return req.prompt.clone();
        }
        let (Some(session_id), Some(store)) = (&req.session_id, &self.history) else {
            return req.prompt.clone();
        };
        let records = store.get_recent(session_id, HISTORY_RECORDS);
        if records.is_empty() {
            return req.prompt.clone();
        }
        let mut context = String::from("Previous conversation history:\n\n");
        for record in &records {
            let truncated: String = record
                .response
                .chars()
                .take(HISTORY_RESPONSE_CHARS)
                .collect();
            context.push_str(&format!(
                "Human: {}\nAssistant: {}...\n\n",
                record.query, truncated
            ));
        }
        debug!(session_id, records = records.len(), "injected history context");
        format!("{}\nCurrent question: {}", context, req.prompt)
    }

    async fn call_backend(
        &self,
        backend: Backend,
        model: &str,
        prompt: &str,
        temperature: f32,
    ) -> anyhow::Result<String> {
        let client = match backend {
            Backend::Gemini => self.gemini.as_ref(),
            Backend::Deepseek => self.deepseek.as_ref(),
        };
        match client {
            Some(client) => client.generate(model, prompt, temperature).await,
            None => Err(anyhow::anyhow!("{} not configured", backend.as_str())),
        }
    }

    fn check_abort(req: &InvokeRequest) -> Result<(), ProviderError> {
        if let Some(check) = &req.abort_check {
            if check() {
                return Err(ProviderError::Cancelled);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl LlmInvoker for ProviderInvoker {
    async fn invoke(&self, req: InvokeRequest) -> Result<Invocation, ProviderError> {
        if self.gemini.is_none() && self.deepseek.is_none() {
            return Err(ProviderError::Unavailable);
        }

        let prompt = self.build_context_prompt(&req);
        let primary = self.resolve(req.provider)?;
        let model = req
            .model_override
            .clone()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| primary.default_model().to_string());

        Self::check_abort(&req)?;
        let primary_err = match self
            .call_backend(primary, &model, &prompt, req.temperature)
            .await
        {
            Ok(text) => {
                debug!(provider = primary.as_str(), model, "invocation succeeded");
                return Ok(Invocation {
                    text,
                    provider_used: primary.as_str().to_string(),
                });
            }
            Err(e) => e,
        };

        warn!(
            provider = primary.as_str(),
            error = %primary_err,
            "provider call failed, trying fallback"
        );

        let fallback = primary.other();
        if !self.configured(fallback) {
            return Err(ProviderError::Exhausted {
                primary: primary.as_str(),
                fallback: fallback.as_str(),
                primary_error: primary_err.to_string(),
                fallback_error: "not configured".to_string(),
            });
        }

        // Re-checked so a disconnect during the failed primary call doesn't
        // still spend quota on the fallback.
        Self::check_abort(&req)?;
        match self
            .call_backend(fallback, fallback.default_model(), &prompt, req.temperature)
            .await
        {
            Ok(text) => {
                info!(
                    provider = fallback.as_str(),
                    model = fallback.default_model(),
                    "fallback successful"
                );
                Ok(Invocation {
                    text,
                    provider_used: fallback.as_str().to_string(),
                })
            }
            Err(fallback_err) => Err(ProviderError::Exhausted {
                primary: primary.as_str(),
                fallback: fallback.as_str(),
                primary_error: primary_err.to_string(),
                fallback_error: fallback_err.to_string(),
            }),
        }
    }

    async fn invoke_grounded(
        &self,
        model: &str,
        prompt: &str,
        temperature: f32,
        abort_check: Option<AbortCheck>,
    ) -> Result<GroundedResponse, ProviderError> {
        let Some(client) = &self.gemini_grounded else {
            return Err(ProviderError::Unavailable);
        };
        if let Some(check) = &abort_check {
            if check() {
                return Err(ProviderError::Cancelled);
            }
        }
        client
            .generate_with_search(model, prompt, temperature)
            .await
            .map_err(|source| ProviderError::CallFailed {
                provider: "gemini",
                source,
            })
    }

    fn gemini_available(&self) -> bool {
        self.gemini.is_some()
    }

    fn deepseek_available(&self) -> bool {
        self.deepseek.is_some()
    }
}
