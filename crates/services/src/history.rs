//! File-backed conversation history.
//!
//! A single flat JSON file holds every record; the store caps itself at the
//! newest 1000 records and rewrites the whole file on each mutation. Plenty
//! for a single-user tool, and trivially inspectable.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use shared::history::{HistoryRecord, HistoryStore};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const MAX_RECORDS: usize = 1000;
const FILE_VERSION: &str = "1.0";

#[derive(Debug, Serialize, Deserialize)]
struct HistoryFile {
    version: String,
    last_updated: DateTime<Utc>,
    records: Vec<HistoryRecord>,
}

/// Per-session rollup for listing conversations.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub last_query: String,
    pub last_timestamp: DateTime<Utc>,
    pub total_messages: usize,
    pub service_type: String,
    pub last_provider: String,
}

pub struct HistoryManager {
    path: PathBuf,
    records: Mutex<Vec<HistoryRecord>>,
}

impl HistoryManager {
    /// Open (or start) the history file. A missing file means a fresh store;
    /// an unreadable one is logged and treated as empty rather than blocking
    /// startup.
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let records = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<HistoryFile>(&raw) {
                Ok(file) => {
                    info!(records = file.records.len(), path = %path.display(), "loaded history");
                    file.records
                }
                Err(e) => {
                    warn!(error = %e, path = %path.display(), "history file unreadable, starting fresh");
                    Vec::new()
                }
            },
            Err(_) => Vec::new(),
        };
        Self {
            path,
            records: Mutex::new(records),
        }
    }

    fn save(&self, records: &[HistoryRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating history dir {}", parent.display()))?;
        }
        let file = HistoryFile {
            version: FILE_VERSION.to_string(),
            last_updated: Utc::now(),
            records: records.to_vec(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        fs::write(&self.path, json)
            .with_context(|| format!("writing history file {}", self.path.display()))?;
        Ok(())
    }

    /// Append a record, evicting the oldest beyond the cap. Returns the new
    /// record's id.
    pub fn add_record(
        &self,
        session_id: &str,
        service_type: &str,
        query: &str,
        response: &str,
        provider_used: &str,
        model_used: Option<String>,
    ) -> Result<String> {
        let record = HistoryRecord::new(
            session_id,
            service_type,
            query,
            response,
            provider_used,
            model_used,
        );
        let id = record.id.clone();
        let mut records = self.records.lock();
        records.push(record);
        if records.len() > MAX_RECORDS {
            let excess = records.len() - MAX_RECORDS;
            records.drain(..excess);
        }
        self.save(&records)?;
        Ok(id)
    }

    /// All records for a session, oldest first.
    pub fn session_records(&self, session_id: &str) -> Vec<HistoryRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.session_id == session_id)
            .cloned()
            .collect()
    }

    /// The newest records across all sessions, newest first.
    pub fn recent_records(&self, limit: usize) -> Vec<HistoryRecord> {
        let records = self.records.lock();
        let mut sorted: Vec<HistoryRecord> = records.clone();
        sorted.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        sorted.truncate(limit);
        sorted
    }

    /// Case-insensitive substring search over queries and responses.
    pub fn search_records(&self, needle: &str, limit: usize) -> Vec<HistoryRecord> {
        let needle = needle.to_lowercase();
        let records = self.records.lock();
        let mut matches: Vec<HistoryRecord> = records
            .iter()
            .filter(|r| {
                r.query.to_lowercase().contains(&needle)
                    || r.response.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        matches.truncate(limit);
        matches
    }

    /// One summary per session, most recently active first.
    pub fn sessions_summary(&self) -> Vec<SessionSummary> {
        let records = self.records.lock();
        let mut sessions: Vec<SessionSummary> = Vec::new();
        for record in records.iter() {
            match sessions
                .iter_mut()
                .find(|s| s.session_id == record.session_id)
            {
                Some(summary) => {
                    summary.total_messages += 1;
                    if record.timestamp > summary.last_timestamp {
                        summary.last_query = record.query.clone();
                        summary.last_timestamp = record.timestamp;
                        summary.service_type = record.service_type.clone();
                        summary.last_provider = record.provider_used.clone();
                    }
                }
                None => sessions.push(SessionSummary {
                    session_id: record.session_id.clone(),
                    last_query: record.query.clone(),
                    last_timestamp: record.timestamp,
                    total_messages: 1,
                    service_type: record.service_type.clone(),
                    last_provider: record.provider_used.clone(),
                }),
            }
        }
        sessions.sort_by(|a, b| b.last_timestamp.cmp(&a.last_timestamp));
        sessions
    }

    pub fn delete_record(&self, record_id: &str) -> Result<bool> {
        let mut records = self.records.lock();
        let before = records.len();
        records.retain(|r| r.id != record_id);
        if records.len() < before {
            self.save(&records)?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Remove every record of a session; returns how many were deleted.
    pub fn delete_session(&self, session_id: &str) -> Result<usize> {
        let mut records = self.records.lock();
        let before = records.len();
        records.retain(|r| r.session_id != session_id);
        let deleted = before - records.len();
        if deleted > 0 {
            self.save(&records)?;
            info!(session_id, deleted, "deleted session history");
        }
        Ok(deleted)
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl HistoryStore for HistoryManager {
    fn get_recent(&self, session_id: &str, n: usize) -> Vec<HistoryRecord> {
        let session = self.session_records(session_id);
        let skip = session.len().saturating_sub(n);
        session[skip..].to_vec()
    }
}
