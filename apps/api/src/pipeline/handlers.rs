//! HTTP handlers for the session, document and analysis endpoints.

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::extract;
use crate::gateway::ChatMessage;
use crate::knowledge::{QueryKind, QueryOutcome};
use crate::pipeline::{run_analysis, AnalysisOutcome};
use crate::prompt::AgentPrompts;
use crate::session::{ExtractedDocument, Profile, SessionSnapshot};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub profile: Profile,
}

#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    pub session_id: Uuid,
}

pub async fn create_session(
    State(state): State<AppState>,
    body: Option<Json<CreateSessionRequest>>,
) -> Json<CreateSessionResponse> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let session_id = state.sessions.create(request.profile);
    info!("Created session {session_id}");
    Json(CreateSessionResponse { session_id })
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, AppError> {
    state
        .sessions
        .snapshot(id)
        .map(Json)
        .ok_or_else(|| session_not_found(id))
}

pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.sessions.remove(id) {
        info!("Deleted session {id}");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(session_not_found(id))
    }
}

pub async fn update_profile(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(profile): Json<Profile>,
) -> Result<StatusCode, AppError> {
    state
        .sessions
        .update(id, |ctx| ctx.profile = profile)
        .ok_or_else(|| session_not_found(id))?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_prompts(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<AgentPrompts>, AppError> {
    state
        .sessions
        .read(id, |ctx| ctx.prompts.clone())
        .map(Json)
        .ok_or_else(|| session_not_found(id))
}

pub async fn update_prompts(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(prompts): Json<AgentPrompts>,
) -> Result<StatusCode, AppError> {
    state
        .sessions
        .update(id, |ctx| ctx.prompts = prompts)
        .ok_or_else(|| session_not_found(id))?;
    Ok(StatusCode::NO_CONTENT)
}

/// Persists the session's current prompts to disk so they become the
/// defaults for future sessions after a restart.
pub async fn save_prompts(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let prompts = state
        .sessions
        .read(id, |ctx| ctx.prompts.clone())
        .ok_or_else(|| session_not_found(id))?;
    state.prompt_store.save(&prompts)?;
    Ok(Json(json!({"saved": true})))
}

#[derive(Debug, Serialize)]
pub struct UploadedDocument {
    pub slot: String,
    pub filename: String,
    pub chars: usize,
    pub text: String,
}

/// Accepts a multipart upload and runs extraction on each part in turn.
/// Each part's field name becomes the document slot; re-uploading a slot
/// replaces it. Extraction never fails the request — unreadable files
/// produce a diagnostic string that is stored like any other text.
pub async fn upload_documents(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<Vec<UploadedDocument>>, AppError> {
    state
        .sessions
        .read(id, |_| ())
        .ok_or_else(|| session_not_found(id))?;

    let mut uploaded = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {e}")))?
    {
        let slot = field
            .name()
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("document-{}", uploaded.len() + 1));
        let filename = field
            .file_name()
            .map(str::to_string)
            .unwrap_or_else(|| slot.clone());
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Could not read upload '{slot}': {e}")))?;

        let text = extract::extract(&bytes, &filename);
        info!(
            "Extracted {} chars from '{filename}' into slot '{slot}' of session {id}",
            text.len()
        );

        // The session can be deleted while parts are still streaming in;
        // a vanished session must not be reported as a successful upload.
        state
            .sessions
            .update(id, |ctx| {
                ctx.documents.insert(
                    slot.clone(),
                    ExtractedDocument {
                        filename: filename.clone(),
                        text: text.clone(),
                    },
                );
            })
            .ok_or_else(|| session_not_found(id))?;

        uploaded.push(UploadedDocument {
            slot,
            filename,
            chars: text.len(),
            text,
        });
    }

    if uploaded.is_empty() {
        return Err(AppError::Validation(
            "The upload contained no file parts".to_string(),
        ));
    }
    Ok(Json(uploaded))
}

pub async fn analyze(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<AnalysisOutcome>, AppError> {
    run_analysis(&state, id).await.map(Json)
}

#[derive(Debug, Serialize)]
pub struct ReportResponse {
    pub draft_report: Option<String>,
    pub final_report: Option<String>,
}

pub async fn get_report(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ReportResponse>, AppError> {
    state
        .sessions
        .read(id, |ctx| ReportResponse {
            draft_report: ctx.draft_report.clone(),
            final_report: ctx.final_report.clone(),
        })
        .map(Json)
        .ok_or_else(|| session_not_found(id))
}

#[derive(Debug, Deserialize)]
pub struct KnowledgeParams {
    pub kind: String,
    pub key: String,
}

pub async fn query_knowledge(
    State(state): State<AppState>,
    Query(params): Query<KnowledgeParams>,
) -> Result<Json<Value>, AppError> {
    let kind = QueryKind::parse(&params.kind).ok_or_else(|| {
        AppError::Validation(format!(
            "Unknown query kind '{}' (expected 'industry', 'major' or 'position')",
            params.kind
        ))
    })?;

    let body = match state.knowledge.query(kind, &params.key) {
        QueryOutcome::Industry(info) => json!({
            "found": true,
            "kind": "industry",
            "record": info,
        }),
        QueryOutcome::Major { name, info, fuzzy } => json!({
            "found": true,
            "kind": "major",
            "name": name,
            "fuzzy": fuzzy,
            "record": info,
        }),
        QueryOutcome::Position { industry, position } => json!({
            "found": true,
            "kind": "position",
            "industry": industry,
            "record": position,
        }),
        QueryOutcome::NotFound { available } => json!({
            "found": false,
            "available": available,
        }),
    };
    Ok(Json(body))
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub provider: Option<&'static str>,
    pub gateway_reachable: bool,
    pub tracing_configured: bool,
}

/// Best-effort health probe of the configured provider: sends a one-word
/// prompt and reports whether a reply came back.
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let (provider, gateway_reachable) = match &state.provider {
        Some(provider) => {
            let reachable = provider
                .send(
                    &[ChatMessage::user("Hello")],
                    &state.config.default_model,
                    0.0,
                )
                .await
                .is_ok();
            (Some(provider.name()), reachable)
        }
        None => (None, false),
    };

    Json(StatusResponse {
        provider,
        gateway_reachable,
        tracing_configured: state.config.langsmith_api_key.is_some(),
    })
}

fn session_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Session {id} not found"))
}
