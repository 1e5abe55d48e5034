//! Per-session state: prompt triples, the user profile, extracted documents
//! and cached pipeline outputs.
//!
//! No ambient globals — every handler reaches session data through the
//! `SessionStore` held in `AppState`. Cached outputs are plain memoization
//! (no eviction); a session lives until it is deleted or the process exits.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::prompt::AgentPrompts;

/// The free-text fields a user fills in before analysis.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub university: String,
    pub major: String,
    pub target_industry: String,
    pub target_position: String,
}

impl Profile {
    /// At least one of major / industry / position must be present before an
    /// analysis makes sense.
    pub fn has_target(&self) -> bool {
        !self.major.is_empty()
            || !self.target_industry.is_empty()
            || !self.target_position.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractedDocument {
    pub filename: String,
    pub text: String,
}

pub struct SessionContext {
    pub profile: Profile,
    pub prompts: AgentPrompts,
    /// Extracted text keyed by logical slot name, in stable slot order.
    pub documents: BTreeMap<String, ExtractedDocument>,
    pub draft_report: Option<String>,
    pub final_report: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Serializable view of a session for GET responses. Document text is
/// summarized to its length; the upload response already returned it once.
#[derive(Debug, Serialize)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub profile: Profile,
    pub prompts: AgentPrompts,
    pub documents: Vec<DocumentSummary>,
    pub has_draft_report: bool,
    pub has_final_report: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct DocumentSummary {
    pub slot: String,
    pub filename: String,
    pub chars: usize,
}

#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<Uuid, SessionContext>>>,
    default_prompts: AgentPrompts,
}

impl SessionStore {
    pub fn new(default_prompts: AgentPrompts) -> Self {
        SessionStore {
            inner: Arc::new(RwLock::new(HashMap::new())),
            default_prompts,
        }
    }

    pub fn create(&self, profile: Profile) -> Uuid {
        let id = Uuid::new_v4();
        let context = SessionContext {
            profile,
            prompts: self.default_prompts.clone(),
            documents: BTreeMap::new(),
            draft_report: None,
            final_report: None,
            created_at: Utc::now(),
        };
        self.inner
            .write()
            .expect("session store lock poisoned")
            .insert(id, context);
        id
    }

    pub fn remove(&self, id: Uuid) -> bool {
        self.inner
            .write()
            .expect("session store lock poisoned")
            .remove(&id)
            .is_some()
    }

    /// Runs `f` against the session under a read lock.
    pub fn read<R>(&self, id: Uuid, f: impl FnOnce(&SessionContext) -> R) -> Option<R> {
        self.inner
            .read()
            .expect("session store lock poisoned")
            .get(&id)
            .map(f)
    }

    /// Runs `f` against the session under a write lock.
    pub fn update<R>(&self, id: Uuid, f: impl FnOnce(&mut SessionContext) -> R) -> Option<R> {
        self.inner
            .write()
            .expect("session store lock poisoned")
            .get_mut(&id)
            .map(f)
    }

    pub fn snapshot(&self, id: Uuid) -> Option<SessionSnapshot> {
        self.read(id, |context| SessionSnapshot {
            session_id: id,
            profile: context.profile.clone(),
            prompts: context.prompts.clone(),
            documents: context
                .documents
                .iter()
                .map(|(slot, doc)| DocumentSummary {
                    slot: slot.clone(),
                    filename: doc.filename.clone(),
                    chars: doc.text.len(),
                })
                .collect(),
            has_draft_report: context.draft_report.is_some(),
            has_final_report: context.final_report.is_some(),
            created_at: context.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn created_session_starts_with_default_prompts() {
        let store = SessionStore::new(AgentPrompts::default_with_model("qwen/qwen-max"));
        let id = store.create(Profile::default());
        let model = store
            .read(id, |ctx| ctx.prompts.drafter.model_id.clone())
            .unwrap();
        assert_eq!(model, "qwen/qwen-max");
    }

    #[test]
    fn update_persists_and_remove_drops() {
        let store = SessionStore::new(AgentPrompts::default_with_model("m"));
        let id = store.create(Profile::default());

        store.update(id, |ctx| ctx.draft_report = Some("draft".to_string()));
        assert!(store.snapshot(id).unwrap().has_draft_report);

        assert!(store.remove(id));
        assert!(store.snapshot(id).is_none());
        assert!(!store.remove(id));
    }

    #[test]
    fn profile_target_requires_any_of_three_fields() {
        let mut p = Profile::default();
        assert!(!p.has_target());
        p.target_position = "Data Analyst".to_string();
        assert!(p.has_target());
    }
}
