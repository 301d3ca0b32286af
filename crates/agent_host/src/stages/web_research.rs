//! One web-research call over a single query.
//!
//! Strategy selection, in order: search-grounded Gemini (hybrid mode or an
//! explicit Gemini preference), LLM-only simulated research on DeepSeek when
//! explicitly allowed, and an inert placeholder otherwise. Any strategy error
//! degrades to explanatory text; this stage never fails the run.

use crate::citations::{extract_citations, insert_citation_markers, resolve_urls};
use crate::prompts;
use crate::state::{QueryTask, Source};
use providers::{AbortCheck, InvokeRequest, LlmInvoker, ProviderError};
use shared::settings::{ProviderChoice, ResearchSettings};
use tracing::{info, warn};

const DEFAULT_SEARCH_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_SIMULATED_MODEL: &str = "deepseek-chat";

#[derive(Debug, Clone)]
pub struct ResearchOutcome {
    pub text: String,
    pub sources: Vec<Source>,
    pub search_query: String,
    pub provider_used: String,
}

/// Search-tool calls are Gemini-only, so a non-Gemini model preference falls
/// back to a Gemini model for this stage while the preference still applies
/// to reflection and finalization.
fn select_search_model(reasoning_model: Option<&str>, settings: &ResearchSettings) -> String {
    if let Some(model) = reasoning_model {
        if model.starts_with("gemini") {
            return model.to_string();
        }
    }
    if settings.query_generator_model.starts_with("gemini") {
        settings.query_generator_model.clone()
    } else {
        DEFAULT_SEARCH_MODEL.to_string()
    }
}

pub async fn web_research(
    invoker: &dyn LlmInvoker,
    task: &QueryTask,
    reasoning_model: Option<&str>,
    settings: &ResearchSettings,
    abort_check: Option<AbortCheck>,
) -> ResearchOutcome {
    let result = if settings.use_hybrid_architecture && invoker.gemini_available() {
        match grounded_research(invoker, task, reasoning_model, settings, abort_check).await {
            Ok(mut outcome) => {
                info!(task_id = task.id, "web research via grounded search (hybrid)");
                if settings.provider == ProviderChoice::Deepseek {
                    outcome.text.push_str(prompts::HYBRID_NOTE);
                }
                Ok(outcome)
            }
            Err(e) => Err(e),
        }
    } else if settings.provider == ProviderChoice::Gemini && invoker.gemini_available() {
        grounded_research(invoker, task, reasoning_model, settings, abort_check).await
    } else if settings.provider == ProviderChoice::Deepseek && settings.allow_simulated_research {
        match simulated_research(invoker, task, reasoning_model, settings, abort_check).await {
            Ok(mut outcome) => {
                info!(task_id = task.id, "web research via simulated search");
                outcome.text.push_str(prompts::SIMULATED_RESEARCH_NOTE);
                Ok(outcome)
            }
            Err(e) => Err(e),
        }
    } else {
        warn!(task_id = task.id, "no usable research strategy, returning placeholder");
        Ok(ResearchOutcome {
            text: prompts::research_fallback_text(&task.search_query),
            sources: Vec::new(),
            search_query: task.search_query.clone(),
            provider_used: "fallback".to_string(),
        })
    };

    result.unwrap_or_else(|e| {
        warn!(task_id = task.id, error = %e, "web research failed");
        ResearchOutcome {
            text: prompts::research_error_text(&task.search_query, &e.to_string()),
            sources: Vec::new(),
            search_query: task.search_query.clone(),
            provider_used: "error_fallback".to_string(),
        }
    })
}

async fn grounded_research(
    invoker: &dyn LlmInvoker,
    task: &QueryTask,
    reasoning_model: Option<&str>,
    settings: &ResearchSettings,
    abort_check: Option<AbortCheck>,
) -> Result<ResearchOutcome, ProviderError> {
    let model = select_search_model(reasoning_model, settings);
    let prompt = prompts::web_searcher_instructions(&prompts::current_date(), &task.search_query);
    // Lower temperature for search accuracy
    let response = invoker
        .invoke_grounded(&model, &prompt, settings.temperature * 0.3, abort_check)
        .await?;

    let chunks = response
        .grounding
        .as_ref()
        .map(|g| g.grounding_chunks.as_slice())
        .unwrap_or(&[]);
    let resolved = resolve_urls(chunks, task.id);
    let citations = extract_citations(&response, &resolved);
    let text = insert_citation_markers(&response.text, &citations);
    let sources = citations
        .into_iter()
        .flat_map(|c| c.segments)
        .collect::<Vec<_>>();

    Ok(ResearchOutcome {
        text,
        sources,
        search_query: task.search_query.clone(),
        provider_used: "gemini".to_string(),
    })
}

/// LLM-only research. The model answers from its training data; sources are
/// synthetic labels with no URL, which the reconciliation pass skips.
async fn simulated_research(
    invoker: &dyn LlmInvoker,
    task: &QueryTask,
    reasoning_model: Option<&str>,
    settings: &ResearchSettings,
    abort_check: Option<AbortCheck>,
) -> Result<ResearchOutcome, ProviderError> {
    let model = match reasoning_model {
        Some(m) if m.starts_with("deepseek") => m.to_string(),
        _ => DEFAULT_SIMULATED_MODEL.to_string(),
    };

    let mut req = InvokeRequest::new(
        prompts::simulated_research_prompt(&task.search_query),
        ProviderChoice::Deepseek,
        settings.temperature * 0.5,
    );
    req.model_override = Some(model);
    req.session_id = settings.session_id.clone();
    req.include_history = true;
    req.abort_check = abort_check;

    let invocation = invoker.invoke(req).await?;
    let sources = vec![
        synthetic_source(format!("Research on: {}", task.search_query)),
        synthetic_source("Generated using DeepSeek analysis".to_string()),
    ];
    Ok(ResearchOutcome {
        text: invocation.text,
        sources,
        search_query: task.search_query.clone(),
        provider_used: invocation.provider_used,
    })
}

fn synthetic_source(label: String) -> Source {
    Source {
        label,
        short_url: String::new(),
        value: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockInvoker;
    use providers::gemini::{
        GroundedResponse, GroundingChunk, GroundingMetadata, GroundingSupport, TextSegment,
        WebSource,
    };

    fn task(query: &str) -> QueryTask {
        QueryTask {
            search_query: query.to_string(),
            id: 0,
        }
    }

    fn grounded_response(text: &str, uri: &str, title: &str) -> GroundedResponse {
        GroundedResponse {
            text: text.to_string(),
            grounding: Some(GroundingMetadata {
                grounding_chunks: vec![GroundingChunk {
                    web: Some(WebSource {
                        uri: uri.to_string(),
                        title: Some(title.to_string()),
                    }),
                }],
                grounding_supports: vec![GroundingSupport {
                    segment: Some(TextSegment {
                        start_index: 0,
                        end_index: Some(text.chars().count()),
                    }),
                    grounding_chunk_indices: vec![0],
                }],
            }),
        }
    }

    #[tokio::test]
    async fn test_hybrid_mode_uses_grounded_search() {
        let invoker = MockInvoker::failing().push_grounded(grounded_response(
            "Rust 1.80 shipped.",
            "https://blog.rust-lang.org/2024/release",
            "rust-lang.org",
        ));
        let settings = ResearchSettings::default();
        let outcome = web_research(&invoker, &task("rust releases"), None, &settings, None).await;

        assert_eq!(outcome.provider_used, "gemini");
        assert!(outcome.text.starts_with("Rust 1.80 shipped."));
        assert!(outcome.text.contains("[rust-lang](https://vertexaisearch.cloud.google.com/id/0-0)"));
        assert_eq!(outcome.sources.len(), 1);
        assert_eq!(outcome.sources[0].value, "https://blog.rust-lang.org/2024/release");
    }

    #[tokio::test]
    async fn test_grounded_search_lowers_temperature() {
        let invoker = MockInvoker::failing().push_grounded(grounded_response(
            "text",
            "https://example.com",
            "example.com",
        ));
        let mut settings = ResearchSettings::default();
        settings.temperature = 1.0;
        web_research(&invoker, &task("q"), None, &settings, None).await;

        let calls = invoker.grounded_calls();
        assert_eq!(calls.len(), 1);
        assert!((calls[0].2 - 0.3).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_hybrid_note_appended_for_deepseek_preference() {
        let invoker = MockInvoker::failing().push_grounded(grounded_response(
            "findings",
            "https://example.com",
            "example.com",
        ));
        let mut settings = ResearchSettings::default();
        settings.provider = ProviderChoice::Deepseek;
        let outcome = web_research(&invoker, &task("q"), None, &settings, None).await;

        assert!(outcome.text.contains("Research Strategy"));
    }

    #[tokio::test]
    async fn test_non_gemini_model_preference_swapped_for_search() {
        let invoker = MockInvoker::failing().push_grounded(grounded_response(
            "t",
            "https://example.com",
            "example.com",
        ));
        let settings = ResearchSettings::default();
        web_research(&invoker, &task("q"), Some("deepseek-reasoner"), &settings, None).await;

        let calls = invoker.grounded_calls();
        assert_eq!(calls[0].0, "gemini-1.5-flash");
    }

    #[tokio::test]
    async fn test_gemini_model_preference_kept_for_search() {
        let invoker = MockInvoker::failing().push_grounded(grounded_response(
            "t",
            "https://example.com",
            "example.com",
        ));
        let settings = ResearchSettings::default();
        web_research(&invoker, &task("q"), Some("gemini-1.5-pro"), &settings, None).await;

        assert_eq!(invoker.grounded_calls()[0].0, "gemini-1.5-pro");
    }

    #[tokio::test]
    async fn test_simulated_research_when_gemini_unavailable() {
        let invoker = MockInvoker::returning("simulated findings")
            .with_provider("deepseek")
            .with_availability(false, true);
        let mut settings = ResearchSettings::default();
        settings.provider = ProviderChoice::Deepseek;
        settings.allow_simulated_research = true;
        settings.session_id = Some("s1".into());
        let outcome = web_research(&invoker, &task("q"), None, &settings, None).await;

        assert_eq!(outcome.provider_used, "deepseek");
        assert!(outcome.text.starts_with("simulated findings"));
        assert!(outcome.text.contains("simulated research without real-time web search"));
        // Synthetic sources carry no URL so finalization can't match them
        assert_eq!(outcome.sources.len(), 2);
        assert!(outcome.sources.iter().all(|s| s.short_url.is_empty()));

        let requests = invoker.requests();
        assert!(requests[0].include_history);
        assert_eq!(requests[0].model_override.as_deref(), Some("deepseek-chat"));
    }

    #[tokio::test]
    async fn test_placeholder_when_no_strategy_usable() {
        let invoker = MockInvoker::failing().with_availability(false, true);
        let mut settings = ResearchSettings::default();
        settings.use_hybrid_architecture = false;
        settings.provider = ProviderChoice::Deepseek;
        settings.allow_simulated_research = false;
        let outcome = web_research(&invoker, &task("my query"), None, &settings, None).await;

        assert_eq!(outcome.provider_used, "fallback");
        assert!(outcome.text.contains("my query"));
        assert!(outcome.sources.is_empty());
    }

    #[tokio::test]
    async fn test_strategy_error_degrades_to_error_text() {
        // No grounded response queued, so the grounded call fails
        let invoker = MockInvoker::failing();
        let settings = ResearchSettings::default();
        let outcome = web_research(&invoker, &task("failing query"), None, &settings, None).await;

        assert_eq!(outcome.provider_used, "error_fallback");
        assert!(outcome.text.contains("Research Error"));
        assert!(outcome.text.contains("failing query"));
        assert!(outcome.sources.is_empty());
    }
}
