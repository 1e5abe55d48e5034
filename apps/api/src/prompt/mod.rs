//! Prompt Assembler — deterministic concatenation of a persona/task/format
//! triple with labelled content sections.
//!
//! No truncation or token budgeting happens here (or anywhere): very large
//! inputs are sent as-is and may be rejected by the gateway.

use serde::{Deserialize, Serialize};

pub mod defaults;
mod store;

pub use store::PromptStore;

/// A user-editable persona/task/output-format triple plus the model that
/// should answer it. Lives in session state; persisted only on explicit save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptConfig {
    pub role: String,
    pub task: String,
    pub output_format: String,
    pub model_id: String,
}

/// The two agents of the analysis pipeline: the drafter produces the first
/// report, the editor turns the draft into the final deliverable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentPrompts {
    pub drafter: PromptConfig,
    pub editor: PromptConfig,
}

impl AgentPrompts {
    pub fn default_with_model(model_id: &str) -> Self {
        AgentPrompts {
            drafter: PromptConfig {
                role: defaults::DRAFTER_ROLE.to_string(),
                task: defaults::DRAFTER_TASK.to_string(),
                output_format: defaults::DRAFTER_OUTPUT_FORMAT.to_string(),
                model_id: model_id.to_string(),
            },
            editor: PromptConfig {
                role: defaults::EDITOR_ROLE.to_string(),
                task: defaults::EDITOR_TASK.to_string(),
                output_format: defaults::EDITOR_OUTPUT_FORMAT.to_string(),
                model_id: model_id.to_string(),
            },
        }
    }
}

/// Assembles the final prompt string: the triple, then each labelled section
/// in the given order. Deterministic — identical input yields byte-identical
/// output.
pub fn assemble(config: &PromptConfig, sections: &[(&str, &str)]) -> String {
    let mut prompt = format!(
        "{}\n\n{}\n\n{}\n\n",
        config.role, config.task, config.output_format
    );
    for (label, text) in sections {
        prompt.push_str(label);
        prompt.push_str(":\n");
        prompt.push_str(text);
        prompt.push_str("\n\n");
    }
    prompt
}
