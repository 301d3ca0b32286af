//! File-backed stores shared by the research workflow and CLI.

pub mod history;
pub mod profile;

pub use history::{HistoryManager, SessionSummary};
pub use profile::{ProfileDraft, ProfileManager, ProfileSummary, UserProfile};
