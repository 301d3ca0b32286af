//! Shared test doubles for the research stages and orchestrator.

use async_trait::async_trait;
use parking_lot::Mutex;
use providers::gemini::GroundedResponse;
use providers::invoker::{AbortCheck, InvokeRequest, Invocation, LlmInvoker, ProviderError};
use std::collections::VecDeque;

/// A scriptable `LlmInvoker`. Replies are served from the script in order;
/// when the script runs out the default reply (if any) repeats forever.
pub struct MockInvoker {
    script: Mutex<VecDeque<Result<String, String>>>,
    default_reply: Option<String>,
    fail_all: bool,
    provider_used: String,
    grounded: Mutex<VecDeque<GroundedResponse>>,
    gemini: bool,
    deepseek: bool,
    requests: Mutex<Vec<InvokeRequest>>,
    grounded_calls: Mutex<Vec<(String, String, f32)>>,
}

impl MockInvoker {
    fn empty() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            default_reply: None,
            fail_all: false,
            provider_used: "gemini".to_string(),
            grounded: Mutex::new(VecDeque::new()),
            gemini: true,
            deepseek: true,
            requests: Mutex::new(Vec::new()),
            grounded_calls: Mutex::new(Vec::new()),
        }
    }

    /// Every `invoke` call returns `text`.
    pub fn returning(text: &str) -> Self {
        Self {
            default_reply: Some(text.to_string()),
            ..Self::empty()
        }
    }

    /// Every `invoke` call fails.
    pub fn failing() -> Self {
        Self {
            fail_all: true,
            ..Self::empty()
        }
    }

    /// Replies served in order; panics in the test if the script runs dry.
    pub fn scripted(replies: Vec<&str>) -> Self {
        Self {
            script: Mutex::new(replies.into_iter().map(|r| Ok(r.to_string())).collect()),
            ..Self::empty()
        }
    }

    pub fn with_provider(mut self, provider: &str) -> Self {
        self.provider_used = provider.to_string();
        self
    }

    pub fn with_availability(mut self, gemini: bool, deepseek: bool) -> Self {
        self.gemini = gemini;
        self.deepseek = deepseek;
        self
    }

    /// Queue a failure at a specific point in the script.
    pub fn push_failure(self, message: &str) -> Self {
        self.script.lock().push_back(Err(message.to_string()));
        self
    }

    pub fn push_reply(self, text: &str) -> Self {
        self.script.lock().push_back(Ok(text.to_string()));
        self
    }

    pub fn push_grounded(self, response: GroundedResponse) -> Self {
        self.grounded.lock().push_back(response);
        self
    }

    pub fn requests(&self) -> Vec<InvokeRequest> {
        self.requests.lock().clone()
    }

    pub fn grounded_calls(&self) -> Vec<(String, String, f32)> {
        self.grounded_calls.lock().clone()
    }
}

#[async_trait]
impl LlmInvoker for MockInvoker {
    async fn invoke(&self, req: InvokeRequest) -> Result<Invocation, ProviderError> {
        self.requests.lock().push(req);
        if self.fail_all {
            return Err(ProviderError::CallFailed {
                provider: "mock",
                source: anyhow::anyhow!("mock invoker configured to fail"),
            });
        }
        let next = self.script.lock().pop_front();
        let text = match next {
            Some(Ok(text)) => text,
            Some(Err(message)) => {
                return Err(ProviderError::CallFailed {
                    provider: "mock",
                    source: anyhow::anyhow!("{message}"),
                })
            }
            None => match &self.default_reply {
                Some(text) => text.clone(),
                None => panic!("mock invoker script exhausted"),
            },
        };
        Ok(Invocation {
            text,
            provider_used: self.provider_used.clone(),
        })
    }

    async fn invoke_grounded(
        &self,
        model: &str,
        prompt: &str,
        temperature: f32,
        _abort_check: Option<AbortCheck>,
    ) -> Result<GroundedResponse, ProviderError> {
        self.grounded_calls
            .lock()
            .push((model.to_string(), prompt.to_string(), temperature));
        match self.grounded.lock().pop_front() {
            Some(response) => Ok(response),
            None => Err(ProviderError::CallFailed {
                provider: "gemini",
                source: anyhow::anyhow!("mock grounded search not configured"),
            }),
        }
    }

    fn gemini_available(&self) -> bool {
        self.gemini
    }

    fn deepseek_available(&self) -> bool {
        self.deepseek
    }
}
