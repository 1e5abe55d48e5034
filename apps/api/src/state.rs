use std::sync::Arc;

use crate::config::Config;
use crate::gateway::ChatProvider;
use crate::knowledge::KnowledgeBase;
use crate::prompt::PromptStore;
use crate::session::SessionStore;
use crate::telemetry::RunTracer;

/// Shared application state, cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub knowledge: Arc<KnowledgeBase>,
    /// `None` until an API key for the configured provider is supplied;
    /// gateway-backed actions are blocked while it is.
    pub provider: Option<Arc<dyn ChatProvider>>,
    pub tracer: Arc<dyn RunTracer>,
    pub sessions: SessionStore,
    pub prompt_store: Arc<PromptStore>,
}
