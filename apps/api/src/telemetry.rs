//! Run tracing observer — an injected side channel the pipeline calls
//! unconditionally.
//!
//! When tracing is unconfigured a no-op implementation is substituted, so the
//! core stays free of conditional telemetry branches. Failures in this
//! channel are swallowed after a warning and must never alter the main
//! response path.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::Config;

/// Output stored with a run record is capped; full reports can be large.
const OUTPUT_SNIPPET_CHARS: usize = 2000;

#[derive(Debug, Clone)]
pub struct RunRecord {
    pub run_id: Uuid,
    pub parent_run_id: Option<Uuid>,
    pub agent: String,
    pub model: String,
    pub input: String,
}

#[async_trait]
pub trait RunTracer: Send + Sync {
    async fn run_started(&self, run: &RunRecord);
    async fn run_ended(&self, run_id: Uuid, output: &str);
}

pub struct NoopTracer;

#[async_trait]
impl RunTracer for NoopTracer {
    async fn run_started(&self, _run: &RunRecord) {}
    async fn run_ended(&self, _run_id: Uuid, _output: &str) {}
}

/// Posts run records to a LangSmith-compatible endpoint, best-effort.
pub struct LangsmithTracer {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    project: String,
}

impl LangsmithTracer {
    pub fn new(api_key: String, endpoint: String, project: String) -> Self {
        LangsmithTracer {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("Failed to build HTTP client"),
            api_key,
            endpoint,
            project,
        }
    }
}

#[async_trait]
impl RunTracer for LangsmithTracer {
    async fn run_started(&self, run: &RunRecord) {
        let url = format!("{}/runs", self.endpoint.trim_end_matches('/'));
        let body = json!({
            "id": run.run_id,
            "name": run.agent,
            "run_type": "chain",
            "inputs": {"prompt": run.input},
            "session_name": self.project,
            "parent_run_id": run.parent_run_id,
            "start_time": Utc::now(),
            "extra": {"model": run.model},
        });

        let result = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .json(&body)
            .send()
            .await;
        match result {
            Ok(r) if r.status().is_success() => debug!("Trace run {} created", run.run_id),
            Ok(r) => warn!("Trace backend rejected run {}: {}", run.run_id, r.status()),
            Err(e) => warn!("Trace run creation failed for {}: {e}", run.run_id),
        }
    }

    async fn run_ended(&self, run_id: Uuid, output: &str) {
        let url = format!("{}/runs/{run_id}", self.endpoint.trim_end_matches('/'));
        let snippet: String = output.chars().take(OUTPUT_SNIPPET_CHARS).collect();
        let body = json!({
            "outputs": {"response": snippet},
            "end_time": Utc::now(),
        });

        let result = self
            .client
            .patch(&url)
            .header("x-api-key", &self.api_key)
            .json(&body)
            .send()
            .await;
        match result {
            Ok(r) if r.status().is_success() => debug!("Trace run {run_id} closed"),
            Ok(r) => warn!("Trace backend rejected update for {run_id}: {}", r.status()),
            Err(e) => warn!("Trace run update failed for {run_id}: {e}"),
        }
    }
}

/// Picks the tracer implementation based on whether a tracing key is set.
pub fn tracer_from_config(config: &Config) -> Arc<dyn RunTracer> {
    match &config.langsmith_api_key {
        Some(key) => Arc::new(LangsmithTracer::new(
            key.clone(),
            config.langsmith_endpoint.clone(),
            config.langsmith_project.clone(),
        )),
        None => Arc::new(NoopTracer),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_trace_backend_does_not_propagate_errors() {
        let tracer = LangsmithTracer::new(
            "test-key".to_string(),
            "http://127.0.0.1:9".to_string(),
            "pathlight".to_string(),
        );
        let run = RunRecord {
            run_id: Uuid::new_v4(),
            parent_run_id: None,
            agent: "career_drafter".to_string(),
            model: "qwen/qwen-max".to_string(),
            input: "prompt".to_string(),
        };
        // Both calls must return despite the dead endpoint.
        tracer.run_started(&run).await;
        tracer.run_ended(run.run_id, "output").await;
    }
}
