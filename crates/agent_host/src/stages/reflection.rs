//! Sufficiency reflection over accumulated research.

use crate::prompts;
use crate::state::ResearchState;
use crate::structured;
use providers::{AbortCheck, InvokeRequest, LlmInvoker};
use shared::settings::ResearchSettings;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct ReflectionOutcome {
    pub is_sufficient: bool,
    pub knowledge_gap: String,
    pub follow_up_queries: Vec<String>,
    /// Already incremented for this pass.
    pub research_loop_count: u32,
    /// Queries issued so far; follow-up task ids continue from here.
    pub number_of_ran_queries: usize,
}

/// Judge whether the gathered summaries answer the topic, and propose
/// follow-up queries if not. Failures bias toward `is_sufficient = true` so a
/// broken provider or malformed reply can never keep the loop spinning.
pub async fn reflect(
    invoker: &dyn LlmInvoker,
    state: &ResearchState,
    settings: &ResearchSettings,
    abort_check: Option<AbortCheck>,
) -> ReflectionOutcome {
    // The loop count advances whether or not the call succeeds.
    let research_loop_count = state.research_loop_count + 1;
    let number_of_ran_queries = state.search_query.len();

    let model = state
        .reasoning_model
        .clone()
        .unwrap_or_else(|| settings.reflection_model.clone());
    let prompt = prompts::reflection_instructions(
        &prompts::current_date(),
        &state.research_topic(),
        &state.web_research_result.join("\n\n---\n\n"),
    );

    let mut req = InvokeRequest::new(prompt, settings.provider, settings.temperature);
    req.model_override = Some(model);
    req.session_id = settings.session_id.clone();
    req.abort_check = abort_check;

    let verdict = match invoker.invoke(req).await {
        Ok(invocation) => {
            info!(provider = %invocation.provider_used, loop_count = research_loop_count, "reflection");
            match structured::parse_reflection(&invocation.text) {
                Some(reflection) => reflection,
                None => {
                    warn!("could not parse reflection response, treating research as sufficient");
                    structured::Reflection {
                        is_sufficient: true,
                        knowledge_gap: "Could not determine knowledge gap".to_string(),
                        follow_up_queries: Vec::new(),
                    }
                }
            }
        }
        Err(e) => {
            warn!(error = %e, "reflection call failed, treating research as sufficient");
            structured::Reflection {
                is_sufficient: true,
                knowledge_gap: "Error in reflection process".to_string(),
                follow_up_queries: Vec::new(),
            }
        }
    };

    ReflectionOutcome {
        is_sufficient: verdict.is_sufficient,
        knowledge_gap: verdict.knowledge_gap,
        follow_up_queries: verdict.follow_up_queries,
        research_loop_count,
        number_of_ran_queries,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockInvoker;
    use shared::agent_api::ChatMessage;

    fn state_with_results(results: Vec<&str>, queries: Vec<&str>) -> ResearchState {
        let mut state = ResearchState::new(
            vec![ChatMessage::user("topic")],
            &ResearchSettings::default(),
        );
        state.web_research_result = results.into_iter().map(String::from).collect();
        state.search_query = queries.into_iter().map(String::from).collect();
        state
    }

    #[tokio::test]
    async fn test_insufficient_verdict_carries_follow_ups() {
        let invoker = MockInvoker::returning(
            r#"{"is_sufficient": false, "knowledge_gap": "missing benchmarks", "follow_up_queries": ["q4", "q5"]}"#,
        );
        let state = state_with_results(vec!["r1", "r2"], vec!["q1", "q2", "q3"]);
        let outcome = reflect(&invoker, &state, &ResearchSettings::default(), None).await;

        assert!(!outcome.is_sufficient);
        assert_eq!(outcome.knowledge_gap, "missing benchmarks");
        assert_eq!(outcome.follow_up_queries, vec!["q4", "q5"]);
        assert_eq!(outcome.research_loop_count, 1);
        assert_eq!(outcome.number_of_ran_queries, 3);
    }

    #[tokio::test]
    async fn test_loop_count_increments_from_state() {
        let invoker = MockInvoker::returning(
            r#"{"is_sufficient": true, "knowledge_gap": "", "follow_up_queries": []}"#,
        );
        let mut state = state_with_results(vec!["r"], vec!["q"]);
        state.research_loop_count = 1;
        let outcome = reflect(&invoker, &state, &ResearchSettings::default(), None).await;
        assert_eq!(outcome.research_loop_count, 2);
    }

    #[tokio::test]
    async fn test_parse_failure_defaults_to_sufficient() {
        let invoker = MockInvoker::returning("I think more research would help!");
        let state = state_with_results(vec!["r"], vec!["q"]);
        let outcome = reflect(&invoker, &state, &ResearchSettings::default(), None).await;

        assert!(outcome.is_sufficient);
        assert_eq!(outcome.knowledge_gap, "Could not determine knowledge gap");
        assert!(outcome.follow_up_queries.is_empty());
        assert_eq!(outcome.research_loop_count, 1);
    }

    #[tokio::test]
    async fn test_provider_failure_defaults_to_sufficient() {
        let invoker = MockInvoker::failing();
        let state = state_with_results(vec!["r"], vec!["q"]);
        let outcome = reflect(&invoker, &state, &ResearchSettings::default(), None).await;

        assert!(outcome.is_sufficient);
        assert_eq!(outcome.knowledge_gap, "Error in reflection process");
        assert_eq!(outcome.research_loop_count, 1);
    }

    #[tokio::test]
    async fn test_model_preference_overrides_reflection_model() {
        let invoker = MockInvoker::returning(
            r#"{"is_sufficient": true, "knowledge_gap": "", "follow_up_queries": []}"#,
        );
        let mut state = state_with_results(vec!["r"], vec!["q"]);
        state.reasoning_model = Some("deepseek-reasoner".to_string());
        reflect(&invoker, &state, &ResearchSettings::default(), None).await;

        let requests = invoker.requests();
        assert_eq!(requests[0].model_override.as_deref(), Some("deepseek-reasoner"));
    }
}
