//! The research workflow: query generation, parallel web research, a bounded
//! reflection loop, and cited finalization.

use crate::stages::{finalize_answer, generate_queries, reflect, web_research};
use crate::state::{QueryTask, ResearchState, Source};
use futures::future::join_all;
use providers::{AbortCheck, LlmInvoker, ProviderError};
use shared::agent_api::ChatMessage;
use shared::settings::ResearchSettings;
use std::sync::Arc;
use tracing::{debug, info};

/// Routing decision after a reflection pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundOutcome {
    /// Dispatch these follow-up tasks as another parallel research round.
    FanOut(Vec<QueryTask>),
    Finalize,
}

#[derive(Debug, Clone)]
pub struct ResearchReport {
    pub content: String,
    pub unique_sources: Vec<Source>,
    pub provider_used: String,
    pub research_loop_count: u32,
    /// Every query issued, across all rounds, in dispatch order.
    pub queries_ran: Vec<String>,
}

/// Decide whether another research round is warranted. Finalizes when the
/// reflection judged the material sufficient, when the loop budget is spent,
/// or when there are no follow-up queries to dispatch. Follow-up task ids
/// continue after the queries already ran so short-URL namespaces from
/// earlier rounds stay distinct.
pub fn evaluate_research(state: &ResearchState) -> RoundOutcome {
    if state.is_sufficient
        || state.research_loop_count >= state.max_research_loops
        || state.follow_up_queries.is_empty()
    {
        return RoundOutcome::Finalize;
    }
    RoundOutcome::FanOut(
        state
            .follow_up_queries
            .iter()
            .enumerate()
            .map(|(idx, query)| QueryTask {
                search_query: query.clone(),
                id: state.number_of_ran_queries + idx,
            })
            .collect(),
    )
}

pub struct ResearchOrchestrator {
    invoker: Arc<dyn LlmInvoker>,
    settings: ResearchSettings,
}

impl ResearchOrchestrator {
    pub fn new(
        invoker: Arc<dyn LlmInvoker>,
        settings: ResearchSettings,
    ) -> anyhow::Result<Self> {
        settings.validate()?;
        Ok(Self { invoker, settings })
    }

    /// Run the full workflow for one conversation. Individual stages degrade
    /// internally rather than fail, so the only error surfaced here is a
    /// client abort between rounds.
    pub async fn run(
        &self,
        messages: Vec<ChatMessage>,
        reasoning_model: Option<String>,
        abort_check: Option<AbortCheck>,
    ) -> Result<ResearchReport, ProviderError> {
        let mut state = ResearchState::new(messages, &self.settings);
        state.reasoning_model = reasoning_model;

        Self::ensure_not_aborted(&abort_check)?;
        let generated =
            generate_queries(self.invoker.as_ref(), &state, &self.settings, abort_check.clone())
                .await;
        info!(
            queries = generated.queries.len(),
            rationale = %generated.rationale,
            "research plan"
        );

        let mut tasks: Vec<QueryTask> = generated
            .queries
            .into_iter()
            .enumerate()
            .map(|(idx, query)| QueryTask {
                search_query: query,
                id: idx,
            })
            .collect();

        loop {
            Self::ensure_not_aborted(&abort_check)?;
            debug!(round_tasks = tasks.len(), "dispatching research round");
            let outcomes = join_all(tasks.iter().map(|task| {
                web_research(
                    self.invoker.as_ref(),
                    task,
                    state.reasoning_model.as_deref(),
                    &self.settings,
                    abort_check.clone(),
                )
            }))
            .await;

            // Rounds only ever append; nothing from earlier rounds is revised.
            for outcome in outcomes {
                state.search_query.push(outcome.search_query);
                state.web_research_result.push(outcome.text);
                state.sources_gathered.extend(outcome.sources);
            }

            Self::ensure_not_aborted(&abort_check)?;
            let reflection =
                reflect(self.invoker.as_ref(), &state, &self.settings, abort_check.clone()).await;
            state.research_loop_count = reflection.research_loop_count;
            state.is_sufficient = reflection.is_sufficient;
            state.knowledge_gap = reflection.knowledge_gap;
            state.follow_up_queries = reflection.follow_up_queries;
            state.number_of_ran_queries = reflection.number_of_ran_queries;

            match evaluate_research(&state) {
                RoundOutcome::FanOut(next) => {
                    info!(
                        loop_count = state.research_loop_count,
                        gap = %state.knowledge_gap,
                        follow_ups = next.len(),
                        "research continues"
                    );
                    tasks = next;
                }
                RoundOutcome::Finalize => break,
            }
        }

        Self::ensure_not_aborted(&abort_check)?;
        let answer =
            finalize_answer(self.invoker.as_ref(), &state, &self.settings, abort_check).await;
        info!(
            loops = state.research_loop_count,
            sources = answer.unique_sources.len(),
            "research finalized"
        );
        Ok(ResearchReport {
            content: answer.content,
            unique_sources: answer.unique_sources,
            provider_used: answer.provider_used,
            research_loop_count: state.research_loop_count,
            queries_ran: state.search_query,
        })
    }

    fn ensure_not_aborted(abort_check: &Option<AbortCheck>) -> Result<(), ProviderError> {
        if let Some(check) = abort_check {
            if check() {
                return Err(ProviderError::Cancelled);
            }
        }
        Ok(())
    }
}
