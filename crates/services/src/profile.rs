//! File-backed user profiles, rendered into prompt context.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use shared::profile::ProfileContext;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub background: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub experience_level: String,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub preferred_communication_style: String,
    #[serde(default)]
    pub goals: String,
    #[serde(default)]
    pub current_projects: Vec<String>,
    #[serde(default)]
    pub learning_objectives: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields a caller supplies when creating a profile; everything else is
/// filled with defaults and timestamps.
#[derive(Debug, Clone, Default)]
pub struct ProfileDraft {
    pub name: String,
    pub background: String,
    pub role: String,
    pub experience_level: String,
    pub skills: Vec<String>,
    pub keywords: Vec<String>,
    pub interests: Vec<String>,
    pub preferred_communication_style: String,
    pub goals: String,
    pub current_projects: Vec<String>,
    pub learning_objectives: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileSummary {
    pub id: String,
    pub name: String,
    pub role: String,
    pub experience_level: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const ANONYMOUS_NAME: &str = "Anonymous User";

pub struct ProfileManager {
    path: PathBuf,
    profiles: Mutex<HashMap<String, UserProfile>>,
}

impl ProfileManager {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let profiles = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<HashMap<String, UserProfile>>(&raw) {
                Ok(profiles) => {
                    info!(profiles = profiles.len(), path = %path.display(), "loaded profiles");
                    profiles
                }
                Err(e) => {
                    warn!(error = %e, path = %path.display(), "profiles file unreadable, starting fresh");
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };
        Self {
            path,
            profiles: Mutex::new(profiles),
        }
    }

    fn save(&self, profiles: &HashMap<String, UserProfile>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating profiles dir {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(profiles)?;
        fs::write(&self.path, json)
            .with_context(|| format!("writing profiles file {}", self.path.display()))?;
        Ok(())
    }

    pub fn create_profile(&self, draft: ProfileDraft) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let non_empty = |value: String, default: &str| -> String {
            if value.trim().is_empty() {
                default.to_string()
            } else {
                value
            }
        };
        let profile = UserProfile {
            id: id.clone(),
            name: non_empty(draft.name, ANONYMOUS_NAME),
            background: draft.background,
            role: draft.role,
            experience_level: non_empty(draft.experience_level, "intermediate"),
            skills: draft.skills,
            keywords: draft.keywords,
            interests: draft.interests,
            preferred_communication_style: non_empty(
                draft.preferred_communication_style,
                "detailed",
            ),
            goals: draft.goals,
            current_projects: draft.current_projects,
            learning_objectives: draft.learning_objectives,
            created_at: now,
            updated_at: now,
        };
        let mut profiles = self.profiles.lock();
        profiles.insert(id.clone(), profile);
        self.save(&profiles)?;
        Ok(id)
    }

    pub fn get_profile(&self, profile_id: &str) -> Option<UserProfile> {
        self.profiles.lock().get(profile_id).cloned()
    }

    /// Apply `update` to an existing profile; returns false when unknown.
    pub fn update_profile(
        &self,
        profile_id: &str,
        update: impl FnOnce(&mut UserProfile),
    ) -> Result<bool> {
        let mut profiles = self.profiles.lock();
        let Some(profile) = profiles.get_mut(profile_id) else {
            return Ok(false);
        };
        update(profile);
        profile.updated_at = Utc::now();
        self.save(&profiles)?;
        Ok(true)
    }

    pub fn delete_profile(&self, profile_id: &str) -> Result<bool> {
        let mut profiles = self.profiles.lock();
        if profiles.remove(profile_id).is_none() {
            return Ok(false);
        }
        self.save(&profiles)?;
        Ok(true)
    }

    pub fn list_profiles(&self) -> Vec<ProfileSummary> {
        self.profiles
            .lock()
            .values()
            .map(|p| ProfileSummary {
                id: p.id.clone(),
                name: p.name.clone(),
                role: p.role.clone(),
                experience_level: p.experience_level.clone(),
                created_at: p.created_at,
                updated_at: p.updated_at,
            })
            .collect()
    }

    /// Single-user convenience: any profile, if one exists.
    pub fn default_profile(&self) -> Option<UserProfile> {
        self.profiles.lock().values().next().cloned()
    }
}

impl ProfileContext for ProfileManager {
    fn render_context(&self, profile_id: &str) -> Option<String> {
        let profile = self.get_profile(profile_id)?;
        let mut parts: Vec<String> = Vec::new();
        if !profile.name.is_empty() && profile.name != ANONYMOUS_NAME {
            parts.push(format!("User: {}", profile.name));
        }
        if !profile.role.is_empty() {
            parts.push(format!("Role: {}", profile.role));
        }
        if !profile.experience_level.is_empty() {
            parts.push(format!("Experience Level: {}", profile.experience_level));
        }
        if !profile.background.is_empty() {
            parts.push(format!("Background: {}", profile.background));
        }
        if !profile.skills.is_empty() {
            parts.push(format!("Skills: {}", profile.skills.join(", ")));
        }
        if !profile.interests.is_empty() {
            parts.push(format!("Interests: {}", profile.interests.join(", ")));
        }
        if !profile.current_projects.is_empty() {
            parts.push(format!(
                "Current Projects: {}",
                profile.current_projects.join(", ")
            ));
        }
        if !profile.learning_objectives.is_empty() {
            parts.push(format!(
                "Learning Goals: {}",
                profile.learning_objectives.join(", ")
            ));
        }
        if !profile.goals.is_empty() {
            parts.push(format!("Goals: {}", profile.goals));
        }
        if !profile.preferred_communication_style.is_empty() {
            parts.push(format!(
                "Preferred Communication: {}",
                profile.preferred_communication_style
            ));
        }
        if parts.is_empty() {
            return None;
        }
        let lines: Vec<String> = parts.iter().map(|p| format!("- {p}")).collect();
        Some(format!("User Profile:\n{}\n\n", lines.join("\n")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn manager(dir: &tempfile::TempDir) -> ProfileManager {
        ProfileManager::new(dir.path().join("profiles.json"))
    }

    #[test]
    fn test_create_applies_defaults() {
        let dir = tempdir().unwrap();
        let profiles = manager(&dir);
        let id = profiles.create_profile(ProfileDraft::default()).unwrap();
        let profile = profiles.get_profile(&id).unwrap();

        assert_eq!(profile.name, "Anonymous User");
        assert_eq!(profile.experience_level, "intermediate");
        assert_eq!(profile.preferred_communication_style, "detailed");
    }

    #[test]
    fn test_profiles_persist_across_reopen() {
        let dir = tempdir().unwrap();
        let id = {
            let profiles = manager(&dir);
            profiles
                .create_profile(ProfileDraft {
                    name: "Ada".into(),
                    role: "Engineer".into(),
                    ..Default::default()
                })
                .unwrap()
        };
        let reopened = manager(&dir);
        let profile = reopened.get_profile(&id).unwrap();
        assert_eq!(profile.name, "Ada");
        assert_eq!(profile.role, "Engineer");
    }

    #[test]
    fn test_update_bumps_timestamp() {
        let dir = tempdir().unwrap();
        let profiles = manager(&dir);
        let id = profiles.create_profile(ProfileDraft::default()).unwrap();
        let created = profiles.get_profile(&id).unwrap().updated_at;

        let updated = profiles
            .update_profile(&id, |p| p.goals = "learn Rust".into())
            .unwrap();
        assert!(updated);
        let profile = profiles.get_profile(&id).unwrap();
        assert_eq!(profile.goals, "learn Rust");
        assert!(profile.updated_at >= created);
        assert!(!profiles.update_profile("missing", |_| {}).unwrap());
    }

    #[test]
    fn test_render_context_lists_populated_fields() {
        let dir = tempdir().unwrap();
        let profiles = manager(&dir);
        let id = profiles
            .create_profile(ProfileDraft {
                name: "Ada".into(),
                role: "Engineer".into(),
                skills: vec!["Rust".into(), "SQL".into()],
                goals: "ship".into(),
                ..Default::default()
            })
            .unwrap();

        let context = profiles.render_context(&id).unwrap();
        assert!(context.starts_with("User Profile:\n"));
        assert!(context.contains("- User: Ada"));
        assert!(context.contains("- Skills: Rust, SQL"));
        assert!(context.contains("- Goals: ship"));
        assert!(profiles.render_context("missing").is_none());
    }

    #[test]
    fn test_anonymous_name_omitted_from_context() {
        let dir = tempdir().unwrap();
        let profiles = manager(&dir);
        let id = profiles.create_profile(ProfileDraft::default()).unwrap();
        let context = profiles.render_context(&id).unwrap();
        assert!(!context.contains("Anonymous User"));
    }
}
