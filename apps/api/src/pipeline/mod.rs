//! Analysis pipeline — orchestrates the full document-to-report flow.
//!
//! Flow: gather extracted documents → knowledge lookup → assemble stage-1
//! prompt → gateway call (draft) → assemble stage-2 prompt → gateway call
//! (final) → cache both in the session.
//!
//! Degradation rules: extraction diagnostics are ordinary text and flow into
//! the prompt unchanged (the model is told what went wrong); a failed gateway
//! call substitutes the canned fallback report instead of erroring out. Only
//! a missing API key blocks the action outright.

pub mod handlers;

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::gateway::{ChatMessage, ChatProvider};
use crate::prompt::assemble;
use crate::session::ExtractedDocument;
use crate::state::AppState;
use crate::telemetry::{RunRecord, RunTracer};

/// Deterministic stand-in shown when the gateway cannot produce a report.
/// The UI renders it like any other markdown result.
pub const FALLBACK_REPORT: &str = "## Report unavailable\n\n\
The language model gateway could not be reached or returned an error, so this \
report could not be generated. Your inputs were received and remain in the \
session — please retry the analysis.\n";

const DRAFTER_AGENT: &str = "career_drafter";
const EDITOR_AGENT: &str = "report_editor";

const DOCUMENTS_LABEL: &str = "Uploaded document content";
const KNOWLEDGE_LABEL: &str = "Knowledge base information (important, reference in detail)";

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisOutcome {
    pub draft_report: String,
    pub final_report: String,
    /// True when at least one stage fell back to the canned report.
    pub degraded: bool,
}

/// Runs the two-stage analysis for a session and caches the results.
pub async fn run_analysis(
    state: &AppState,
    session_id: Uuid,
) -> Result<AnalysisOutcome, AppError> {
    let provider = state.provider.clone().ok_or_else(|| {
        AppError::Configuration(
            "No API key is configured for the selected LLM provider; set it and retry"
                .to_string(),
        )
    })?;

    let (profile, prompts, documents_text) = state
        .sessions
        .read(session_id, |ctx| {
            (
                ctx.profile.clone(),
                ctx.prompts.clone(),
                render_documents(&ctx.documents),
            )
        })
        .ok_or_else(|| AppError::NotFound(format!("Session {session_id} not found")))?;

    if !profile.has_target() && documents_text.is_empty() {
        return Err(AppError::Validation(
            "Fill in at least one of major, target industry or target position, \
             or upload a document first"
                .to_string(),
        ));
    }

    let kb_context = state.knowledge.context_for(&profile);
    let user_info = format!(
        "- University: {}\n- Major: {}\n- Target industry: {}\n- Target position: {}",
        profile.university, profile.major, profile.target_industry, profile.target_position
    );

    let main_run_id = Uuid::new_v4();
    let temperature = state.config.temperature;

    // Stage 1: draft report from profile, documents and knowledge context.
    let stage1_prompt = assemble(
        &prompts.drafter,
        &[
            ("User information", user_info.as_str()),
            (DOCUMENTS_LABEL, documents_text.as_str()),
            (KNOWLEDGE_LABEL, kb_context.as_str()),
        ],
    );
    let (draft_report, draft_degraded) = call_stage(
        provider.as_ref(),
        state.tracer.as_ref(),
        DRAFTER_AGENT,
        &prompts.drafter.model_id,
        temperature,
        &stage1_prompt,
        main_run_id,
    )
    .await;

    // Stage 2: the draft goes in ahead of the raw document text, and the raw
    // text is retained as a secondary section — both are kept, not replaced.
    let stage2_prompt = assemble(
        &prompts.editor,
        &[
            ("Draft report", draft_report.as_str()),
            (DOCUMENTS_LABEL, documents_text.as_str()),
        ],
    );
    let (final_report, final_degraded) = call_stage(
        provider.as_ref(),
        state.tracer.as_ref(),
        EDITOR_AGENT,
        &prompts.editor.model_id,
        temperature,
        &stage2_prompt,
        main_run_id,
    )
    .await;

    state.sessions.update(session_id, |ctx| {
        ctx.draft_report = Some(draft_report.clone());
        ctx.final_report = Some(final_report.clone());
    });

    info!(
        "Analysis complete for session {session_id} (degraded: {})",
        draft_degraded || final_degraded
    );

    Ok(AnalysisOutcome {
        draft_report,
        final_report,
        degraded: draft_degraded || final_degraded,
    })
}

/// Renders the session's documents into one labelled text block, in stable
/// slot order.
fn render_documents(documents: &BTreeMap<String, ExtractedDocument>) -> String {
    documents
        .iter()
        .map(|(slot, doc)| format!("--- {slot} ({}) ---\n{}\n", doc.filename, doc.text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// One gateway call wrapped in tracing records. Returns the report text and
/// whether the fallback was substituted.
async fn call_stage(
    provider: &dyn ChatProvider,
    tracer: &dyn RunTracer,
    agent: &str,
    model: &str,
    temperature: f32,
    prompt: &str,
    parent_run_id: Uuid,
) -> (String, bool) {
    let run = RunRecord {
        run_id: Uuid::new_v4(),
        parent_run_id: Some(parent_run_id),
        agent: agent.to_string(),
        model: model.to_string(),
        input: prompt.to_string(),
    };
    tracer.run_started(&run).await;

    let messages = [ChatMessage::user(prompt)];
    match provider.send(&messages, model, temperature).await {
        Ok(content) => {
            info!("{agent} call succeeded ({} chars)", content.len());
            tracer.run_ended(run.run_id, &content).await;
            (content, false)
        }
        Err(e) => {
            warn!("{agent} call failed: {e}; substituting fallback report");
            tracer.run_ended(run.run_id, FALLBACK_REPORT).await;
            (FALLBACK_REPORT.to_string(), true)
        }
    }
}
