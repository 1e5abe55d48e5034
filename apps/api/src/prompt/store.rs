//! Optional on-disk persistence for the editable prompt triples.
//!
//! Read once at startup if present (absence is not an error — the defaults
//! apply) and written only on an explicit save action.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

use super::AgentPrompts;

pub struct PromptStore {
    path: PathBuf,
}

impl PromptStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        PromptStore { path: path.into() }
    }

    /// Loads saved prompts, or `None` when no file exists yet.
    pub fn load(&self) -> Result<Option<AgentPrompts>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))?;
        let prompts = serde_json::from_str(&raw)
            .with_context(|| format!("parsing {}", self.path.display()))?;
        info!("Loaded saved prompts from {}", self.path.display());
        Ok(Some(prompts))
    }

    pub fn save(&self, prompts: &AgentPrompts) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }
        let raw = serde_json::to_string_pretty(prompts).context("serializing prompts")?;
        std::fs::write(&self.path, raw)
            .with_context(|| format!("writing {}", self.path.display()))?;
        info!("Saved prompts to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = PromptStore::new(dir.path().join("saved_prompts.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn save_then_load_round_trips_and_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = PromptStore::new(dir.path().join("prompts/saved_prompts.json"));

        let mut prompts = AgentPrompts::default_with_model("qwen/qwen-max");
        prompts.drafter.task = "Custom task".to_string();
        store.save(&prompts).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded, prompts);
    }

    #[test]
    fn corrupt_file_is_an_error_not_a_silent_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saved_prompts.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(PromptStore::new(path).load().is_err());
    }
}
