//! Mutable state threaded through one research run.

use serde::{Deserialize, Serialize};
use shared::agent_api::ChatMessage;
use shared::settings::ResearchSettings;

/// One gathered source. `short_url` is the compact per-task token substituted
/// into generated text; `value` is the original long URL it stands for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub label: String,
    pub short_url: String,
    pub value: String,
}

/// Unit of parallel dispatch to the web-research stage. The id is unique
/// within a run and scopes the short-URL namespace so repeated queries in
/// later rounds don't collide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryTask {
    pub search_query: String,
    pub id: usize,
}

/// State for one orchestration run. Created per incoming question, discarded
/// after finalization. List fields only ever grow by concatenation.
#[derive(Debug, Clone)]
pub struct ResearchState {
    pub messages: Vec<ChatMessage>,
    /// All queries issued so far, across loops.
    pub search_query: Vec<String>,
    /// One prose block per completed research call.
    pub web_research_result: Vec<String>,
    /// May contain duplicates across loop iterations; deduplicated only by
    /// the finalization reconciliation pass.
    pub sources_gathered: Vec<Source>,
    /// Monotonic; incremented by each reflection pass.
    pub research_loop_count: u32,
    pub is_sufficient: bool,
    pub knowledge_gap: String,
    /// Reset by each reflection pass.
    pub follow_up_queries: Vec<String>,
    /// Total queries issued so far; follow-up task ids continue from here.
    pub number_of_ran_queries: usize,
    /// Caller-selected model override, if any.
    pub reasoning_model: Option<String>,
    pub initial_search_query_count: usize,
    pub max_research_loops: u32,
}

impl ResearchState {
    pub fn new(messages: Vec<ChatMessage>, settings: &ResearchSettings) -> Self {
        Self {
            messages,
            search_query: Vec::new(),
            web_research_result: Vec::new(),
            sources_gathered: Vec::new(),
            research_loop_count: 0,
            is_sufficient: false,
            knowledge_gap: String::new(),
            follow_up_queries: Vec::new(),
            number_of_ran_queries: 0,
            reasoning_model: None,
            initial_search_query_count: settings.number_of_initial_queries,
            max_research_loops: settings.max_research_loops,
        }
    }

    /// The topic under research: the most recent user turn, or the whole
    /// conversation joined as `role: content` lines when no user turn exists.
    pub fn research_topic(&self) -> String {
        if let Some(last_user) = self
            .messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
        {
            return last_user.content.clone();
        }
        self.messages
            .iter()
            .map(|m| format!("{}: {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
