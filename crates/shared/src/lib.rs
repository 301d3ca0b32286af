pub mod history;

pub mod settings {
    use anyhow::{bail, Result};
    use serde::{Deserialize, Serialize};
    use std::env;

    /// Which LLM backend a call should go to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum ProviderChoice {
        /// Pick the first backend with configured credentials (DeepSeek preferred).
        Auto,
        Gemini,
        Deepseek,
    }

    impl ProviderChoice {
        pub fn as_str(&self) -> &'static str {
            match self {
                ProviderChoice::Auto => "auto",
                ProviderChoice::Gemini => "gemini",
                ProviderChoice::Deepseek => "deepseek",
            }
        }
    }

    impl std::fmt::Display for ProviderChoice {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(self.as_str())
        }
    }

    impl std::str::FromStr for ProviderChoice {
        type Err = String;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            match s.to_lowercase().as_str() {
                "auto" => Ok(ProviderChoice::Auto),
                "gemini" => Ok(ProviderChoice::Gemini),
                "deepseek" => Ok(ProviderChoice::Deepseek),
                other => Err(format!(
                    "unknown provider '{}' (expected auto, gemini or deepseek)",
                    other
                )),
            }
        }
    }

    /// Backend credentials, read once at startup.
    #[derive(Debug, Clone, Default)]
    pub struct ProviderKeys {
        pub gemini_api_key: Option<String>,
        pub deepseek_api_key: Option<String>,
        pub deepseek_base_url: String,
    }

    pub const DEFAULT_DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";

    impl ProviderKeys {
        pub fn from_env() -> Self {
            Self {
                gemini_api_key: non_empty(env::var("GEMINI_API_KEY").ok()),
                deepseek_api_key: non_empty(env::var("DEEPSEEK_API_KEY").ok()),
                deepseek_base_url: env::var("DEEPSEEK_BASE_URL")
                    .ok()
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_DEEPSEEK_BASE_URL.to_string()),
            }
        }

        pub fn gemini_configured(&self) -> bool {
            self.gemini_api_key.is_some()
        }

        pub fn deepseek_configured(&self) -> bool {
            self.deepseek_api_key.is_some()
        }

        pub fn any_configured(&self) -> bool {
            self.gemini_configured() || self.deepseek_configured()
        }
    }

    fn non_empty(v: Option<String>) -> Option<String> {
        v.filter(|s| !s.trim().is_empty())
    }

    /// Settings for one research run.
    ///
    /// Precedence, highest first: explicit call parameter (e.g. a model passed
    /// to a stage) > per-session override (`SessionOverrides`) > environment
    /// (`from_env`) > the compiled-in defaults below.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct ResearchSettings {
        pub provider: ProviderChoice,
        pub temperature: f32,
        pub query_generator_model: String,
        pub reflection_model: String,
        pub answer_model: String,
        /// How many search queries to generate from the initial question.
        pub number_of_initial_queries: usize,
        /// Hard cap on reflection passes; bounds the research loop.
        pub max_research_loops: u32,
        /// Route web research through Gemini even when the analysis provider
        /// is DeepSeek (search tooling is Gemini-only).
        pub use_hybrid_architecture: bool,
        /// Permit LLM-only "research" when no search-capable backend is usable.
        pub allow_simulated_research: bool,
        /// Per-request HTTP timeout for backend calls.
        pub request_timeout_secs: u64,
        /// Session whose history may be injected into prompts.
        pub session_id: Option<String>,
    }

    impl Default for ResearchSettings {
        fn default() -> Self {
            Self {
                provider: ProviderChoice::Auto,
                temperature: 0.7,
                query_generator_model: "gemini-1.5-flash".into(),
                reflection_model: "gemini-1.5-flash".into(),
                answer_model: "gemini-1.5-flash".into(),
                number_of_initial_queries: 3,
                max_research_loops: 2,
                use_hybrid_architecture: true,
                allow_simulated_research: false,
                request_timeout_secs: 60,
                session_id: None,
            }
        }
    }

    /// Per-session overrides, typically parsed from a request payload.
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct SessionOverrides {
        pub provider: Option<ProviderChoice>,
        pub temperature: Option<f32>,
        pub reasoning_model: Option<String>,
        pub number_of_initial_queries: Option<usize>,
        pub max_research_loops: Option<u32>,
        pub session_id: Option<String>,
    }

    impl ResearchSettings {
        /// Defaults overlaid with environment variables (uppercase field names,
        /// matching the deployment convention).
        pub fn from_env() -> Self {
            let mut s = Self::default();
            if let Ok(v) = env::var("LLM_PROVIDER") {
                if let Ok(p) = v.parse() {
                    s.provider = p;
                }
            }
            if let Some(v) = parse_env("TEMPERATURE") {
                s.temperature = v;
            }
            if let Ok(v) = env::var("QUERY_GENERATOR_MODEL") {
                if !v.trim().is_empty() {
                    s.query_generator_model = v;
                }
            }
            if let Ok(v) = env::var("REFLECTION_MODEL") {
                if !v.trim().is_empty() {
                    s.reflection_model = v;
                }
            }
            if let Ok(v) = env::var("ANSWER_MODEL") {
                if !v.trim().is_empty() {
                    s.answer_model = v;
                }
            }
            if let Some(v) = parse_env("NUMBER_OF_INITIAL_QUERIES") {
                s.number_of_initial_queries = v;
            }
            if let Some(v) = parse_env("MAX_RESEARCH_LOOPS") {
                s.max_research_loops = v;
            }
            if let Some(v) = parse_env("USE_HYBRID_ARCHITECTURE") {
                s.use_hybrid_architecture = v;
            }
            if let Some(v) = parse_env("ALLOW_SIMULATED_RESEARCH") {
                s.allow_simulated_research = v;
            }
            if let Some(v) = parse_env("REQUEST_TIMEOUT_SECS") {
                s.request_timeout_secs = v;
            }
            s
        }

        /// Apply per-session overrides on top of these settings.
        pub fn with_overrides(mut self, o: &SessionOverrides) -> Self {
            if let Some(p) = o.provider {
                self.provider = p;
            }
            if let Some(t) = o.temperature {
                self.temperature = t;
            }
            if let Some(n) = o.number_of_initial_queries {
                self.number_of_initial_queries = n;
            }
            if let Some(n) = o.max_research_loops {
                self.max_research_loops = n;
            }
            if o.session_id.is_some() {
                self.session_id = o.session_id.clone();
            }
            self
        }

        /// Reject configurations that would misbehave at runtime.
        pub fn validate(&self) -> Result<()> {
            if !(0.0..=1.0).contains(&self.temperature) {
                bail!(
                    "temperature must be between 0.0 and 1.0, got {}",
                    self.temperature
                );
            }
            if self.number_of_initial_queries == 0 {
                bail!("number_of_initial_queries must be at least 1");
            }
            if self.max_research_loops == 0 {
                bail!("max_research_loops must be at least 1");
            }
            if self.request_timeout_secs == 0 {
                bail!("request_timeout_secs must be at least 1");
            }
            Ok(())
        }
    }

    fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
        env::var(name).ok().and_then(|v| v.trim().parse().ok())
    }
}

pub mod agent_api {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct ChatMessage {
        pub role: String, // "system" | "user" | "assistant"
        pub content: String,
    }

    impl ChatMessage {
        pub fn user(content: impl Into<String>) -> Self {
            Self {
                role: "user".into(),
                content: content.into(),
            }
        }

        pub fn assistant(content: impl Into<String>) -> Self {
            Self {
                role: "assistant".into(),
                content: content.into(),
            }
        }

        pub fn system(content: impl Into<String>) -> Self {
            Self {
                role: "system".into(),
                content: content.into(),
            }
        }
    }
}

pub mod profile {
    /// Opaque per-user context rendered into prompts. The workflow treats the
    /// returned text as a black box.
    pub trait ProfileContext: Send + Sync {
        fn render_context(&self, profile_id: &str) -> Option<String>;
    }
}
