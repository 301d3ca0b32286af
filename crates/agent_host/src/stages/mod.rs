//! The four stages of the research workflow. Each stage degrades to a safe
//! default on provider or parse failure; only the orchestrator decides
//! control flow.

pub mod finalize;
pub mod query_gen;
pub mod reflection;
pub mod web_research;

pub use finalize::{finalize_answer, FinalAnswer};
pub use query_gen::{generate_queries, GeneratedQueries};
pub use reflection::{reflect, ReflectionOutcome};
pub use web_research::{web_research, ResearchOutcome};
