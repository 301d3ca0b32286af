//! Agent Host - the multi-step research workflow.
//!
//! This crate provides the research agent that can:
//! - Turn a question into diverse web search queries
//! - Run research rounds in parallel with citation tracking
//! - Reflect on gathered material and dispatch follow-up rounds
//! - Finalize a cited answer with short URLs reconciled
//! - Answer direct chat turns and run behavior analyses

pub mod analysis;
pub mod chat;
pub mod citations;
pub mod orchestrator;
pub mod prompts;
pub mod stages;
pub mod state;
pub mod structured;

#[cfg(test)]
pub(crate) mod testing;

pub use analysis::{
    analyze_chart_data, analyze_search_query, analyze_user_behavior, ChartDataAnalysis,
    QueryFilter, SearchQueryAnalysis, UserBehaviorAnalysis,
};
pub use chat::{chat, ChatReply};
pub use orchestrator::{evaluate_research, ResearchOrchestrator, ResearchReport, RoundOutcome};
pub use state::{QueryTask, ResearchState, Source};
