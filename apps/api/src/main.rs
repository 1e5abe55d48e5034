mod config;
mod errors;
mod extract;
mod gateway;
mod knowledge;
mod pipeline;
mod prompt;
mod routes;
mod session;
mod state;
mod telemetry;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::gateway::provider_from_config;
use crate::knowledge::KnowledgeBase;
use crate::prompt::{AgentPrompts, PromptStore};
use crate::routes::build_router;
use crate::session::SessionStore;
use crate::state::AppState;
use crate::telemetry::tracer_from_config;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on malformed env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Pathlight API v{}", env!("CARGO_PKG_VERSION"));

    // Static knowledge table (CSV, or built-in fallback)
    let knowledge = Arc::new(KnowledgeBase::load(&config.knowledge_csv));

    // Saved prompt triples override the built-in defaults for new sessions
    let prompt_store = Arc::new(PromptStore::new(config.prompts_path.clone()));
    let default_prompts = match prompt_store.load() {
        Ok(Some(prompts)) => prompts,
        Ok(None) => AgentPrompts::default_with_model(&config.default_model),
        Err(e) => {
            warn!("Could not load saved prompts: {e:?}. Using defaults.");
            AgentPrompts::default_with_model(&config.default_model)
        }
    };

    // LLM provider: the service still boots without a key, but gateway-backed
    // actions return a configuration error until one is set
    let provider = provider_from_config(&config);
    match &provider {
        Some(p) => info!(
            "LLM provider initialized: {} (model: {})",
            p.name(),
            config.default_model
        ),
        None => warn!("No LLM API key configured; analysis endpoints are disabled"),
    }

    let tracer = tracer_from_config(&config);

    let state = AppState {
        knowledge,
        provider,
        tracer,
        sessions: SessionStore::new(default_prompts),
        prompt_store,
        config: config.clone(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
