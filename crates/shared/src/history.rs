//! Conversation-history collaborator types.
//!
//! The research workflow only reads recent turns of a session to build prompt
//! context; it never owns storage. The file-backed implementation lives in the
//! `services` crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One stored query/response exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: String,
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    /// "ai_chat" or "ai_search"
    pub service_type: String,
    pub query: String,
    pub response: String,
    pub provider_used: String,
    pub model_used: Option<String>,
}

impl HistoryRecord {
    pub fn new(
        session_id: impl Into<String>,
        service_type: impl Into<String>,
        query: impl Into<String>,
        response: impl Into<String>,
        provider_used: impl Into<String>,
        model_used: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            timestamp: Utc::now(),
            service_type: service_type.into(),
            query: query.into(),
            response: response.into(),
            provider_used: provider_used.into(),
            model_used,
        }
    }
}

/// Read side of the history store, as consumed by the workflow.
pub trait HistoryStore: Send + Sync {
    /// The last `n` records of a session, oldest first.
    fn get_recent(&self, session_id: &str, n: usize) -> Vec<HistoryRecord>;
}
