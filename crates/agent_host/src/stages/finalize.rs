//! Final answer synthesis and citation reconciliation.

use crate::citations::reconcile_citations;
use crate::prompts;
use crate::state::{ResearchState, Source};
use providers::{AbortCheck, InvokeRequest, LlmInvoker};
use shared::settings::ResearchSettings;
use tracing::{info, warn};

const APOLOGY_TEXT: &str = "I apologize, but I'm currently unable to provide a detailed response due to API limitations. Please try again later.";

#[derive(Debug, Clone)]
pub struct FinalAnswer {
    pub content: String,
    /// Sources whose short token actually appeared in the answer, long URLs
    /// restored, in gather order.
    pub unique_sources: Vec<Source>,
    pub provider_used: String,
}

/// Synthesize the cited answer from all gathered summaries, then swap short
/// URL tokens back to the originals. Reconciliation runs even over the
/// apology text so a provider failure still yields a well-formed answer.
pub async fn finalize_answer(
    invoker: &dyn LlmInvoker,
    state: &ResearchState,
    settings: &ResearchSettings,
    abort_check: Option<AbortCheck>,
) -> FinalAnswer {
    let model = state
        .reasoning_model
        .clone()
        .unwrap_or_else(|| settings.answer_model.clone());
    let prompt = prompts::answer_instructions(
        &prompts::current_date(),
        &state.research_topic(),
        &state.web_research_result.join("\n---\n\n"),
    );

    // Lower temperature for the final synthesis
    let mut req = InvokeRequest::new(prompt, settings.provider, settings.temperature * 0.5);
    req.model_override = Some(model);
    req.session_id = settings.session_id.clone();
    req.abort_check = abort_check;

    let (content, provider_used) = match invoker.invoke(req).await {
        Ok(invocation) => {
            info!(provider = %invocation.provider_used, "final answer");
            let footer = format!("\n\n---\n*Generated using {}*", invocation.provider_used);
            (invocation.text + &footer, invocation.provider_used)
        }
        Err(e) => {
            warn!(error = %e, "final answer generation failed");
            (APOLOGY_TEXT.to_string(), "error".to_string())
        }
    };

    let (content, unique_sources) = reconcile_citations(&content, &state.sources_gathered);
    FinalAnswer {
        content,
        unique_sources,
        provider_used,
    }
}
