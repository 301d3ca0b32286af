//! Initial search-query generation.

use crate::prompts;
use crate::state::ResearchState;
use crate::structured;
use providers::{AbortCheck, InvokeRequest, LlmInvoker};
use shared::settings::ResearchSettings;
use tracing::{info, warn};

pub const FALLBACK_RATIONALE: &str = "Fallback query generation";

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedQueries {
    pub queries: Vec<String>,
    pub rationale: String,
}

/// Turn the research topic into up to N search queries via structured output.
/// Never fails: any provider or parse problem yields the raw topic as the
/// single query so the workflow always makes forward progress.
pub async fn generate_queries(
    invoker: &dyn LlmInvoker,
    state: &ResearchState,
    settings: &ResearchSettings,
    abort_check: Option<AbortCheck>,
) -> GeneratedQueries {
    let topic = state.research_topic();
    let count = state.initial_search_query_count;
    let prompt =
        prompts::query_writer_instructions(&prompts::current_date(), &topic, count);

    // Query generation must not be contaminated by prior conversational turns.
    let mut req = InvokeRequest::new(prompt, settings.provider, settings.temperature);
    req.model_override = Some(settings.query_generator_model.clone());
    req.include_history = false;
    req.session_id = settings.session_id.clone();
    req.abort_check = abort_check;

    let response = match invoker.invoke(req).await {
        Ok(invocation) => {
            info!(provider = %invocation.provider_used, "query generation");
            invocation.text
        }
        Err(e) => {
            warn!(error = %e, "query generation failed, using topic as query");
            return fallback(topic);
        }
    };

    match structured::parse_search_query_list(&response) {
        Some(mut list) if !list.query.is_empty() => {
            list.query.truncate(count);
            GeneratedQueries {
                queries: list.query,
                rationale: list.rationale,
            }
        }
        _ => {
            warn!("could not parse query generation response, using topic as query");
            fallback(topic)
        }
    }
}

fn fallback(topic: String) -> GeneratedQueries {
    GeneratedQueries {
        queries: vec![topic],
        rationale: FALLBACK_RATIONALE.to_string(),
    }
}
