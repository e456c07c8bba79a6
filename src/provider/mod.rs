// AI provider worker
//
// Consumes analysis jobs from the gateway over an mpsc channel, calls the
// configured model with a concurrency cap, and posts results back for the
// pending-request table. Without an API key (or after a failed call) the
// deterministic engine answers instead, so every job completes.

mod claude;
mod parse;
mod prompts;
pub mod retry;

pub use claude::ClaudeClient;
pub use parse::parse_allocation_response;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Semaphore};

use crate::content::{ProcessedFile, UrlContent};
use crate::engine::{self, AllocationData, Language, Metrics, OptimizerScore};

/// Backend that turns a prompt into text. The worker only needs this seam;
/// swapping models means swapping the implementation behind the Arc.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    fn name(&self) -> &str;
    async fn complete(&self, prompt: &str) -> anyhow::Result<String>;
}

/// Free-text note with its detected language annotation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub content: String,
    pub language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationPayload {
    pub request_id: String,
    pub region_id: String,
    pub metrics: Metrics,
    pub optimization: OptimizerScore,
    pub notes: Option<Note>,
    pub files: Vec<ProcessedFile>,
    pub urls: Vec<UrlContent>,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplanationPayload {
    pub request_id: String,
    pub region_id: String,
    pub allocation_data: Value,
    pub context: String,
    pub language: String,
    pub notes: Option<Note>,
    pub files: Vec<ProcessedFile>,
    pub urls: Vec<UrlContent>,
    pub timestamp: String,
}

#[derive(Debug, Clone)]
pub enum AnalysisJob {
    Allocation(AllocationPayload),
    Explanation(ExplanationPayload),
}

impl AnalysisJob {
    pub fn request_id(&self) -> &str {
        match self {
            AnalysisJob::Allocation(p) => &p.request_id,
            AnalysisJob::Explanation(p) => &p.request_id,
        }
    }
}

/// Result posted back to the gateway for status polling.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderResult {
    pub request_id: String,
    pub status: String,
    pub response_type: String,
    pub data: Value,
    pub metadata: Value,
    pub timestamp: String,
    pub processing_time: f64,
}

/// Lock-free request counters, shared with the gateway metrics endpoint.
#[derive(Debug, Default)]
pub struct ProviderStats {
    total: AtomicU64,
    success: AtomicU64,
    error: AtomicU64,
    fallback: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatsSnapshot {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub fallback_requests: u64,
    pub success_rate: f64,
}

impl ProviderStats {
    pub fn record_success(&self) {
        self.total.fetch_add(1, Ordering::Relaxed);
        self.success.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.total.fetch_add(1, Ordering::Relaxed);
        self.error.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fallback(&self) {
        self.fallback.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ProviderStatsSnapshot {
        let total = self.total.load(Ordering::Relaxed);
        let success = self.success.load(Ordering::Relaxed);
        ProviderStatsSnapshot {
            total_requests: total,
            successful_requests: success,
            failed_requests: self.error.load(Ordering::Relaxed),
            fallback_requests: self.fallback.load(Ordering::Relaxed),
            success_rate: if total == 0 {
                0.0
            } else {
                success as f64 / total as f64
            },
        }
    }
}

pub struct ProviderWorker {
    provider: Option<Arc<dyn ModelProvider>>,
    semaphore: Arc<Semaphore>,
    stats: Arc<ProviderStats>,
    results_tx: mpsc::Sender<ProviderResult>,
}

impl ProviderWorker {
    pub fn new(
        provider: Option<Arc<dyn ModelProvider>>,
        max_concurrent: usize,
        results_tx: mpsc::Sender<ProviderResult>,
    ) -> Self {
        Self {
            provider,
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            stats: Arc::new(ProviderStats::default()),
            results_tx,
        }
    }

    pub fn stats(&self) -> Arc<ProviderStats> {
        Arc::clone(&self.stats)
    }

    /// Drain the job channel until the gateway closes it. Each job runs in
    /// its own task, gated by the semaphore.
    pub async fn run(self, mut jobs_rx: mpsc::Receiver<AnalysisJob>) {
        tracing::info!(
            provider = self.provider.as_ref().map(|p| p.name()).unwrap_or("engine-only"),
            "Provider worker started"
        );

        while let Some(job) = jobs_rx.recv().await {
            let provider = self.provider.clone();
            let semaphore = Arc::clone(&self.semaphore);
            let stats = Arc::clone(&self.stats);
            let tx = self.results_tx.clone();

            tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return,
                };

                let request_id = job.request_id().to_string();
                let result = process_job(provider, job, &stats).await;
                if tx.send(result).await.is_err() {
                    tracing::warn!(%request_id, "Result channel closed, dropping provider result");
                }
            });
        }

        tracing::info!("Provider worker shutting down (job channel closed)");
    }
}

async fn process_job(
    provider: Option<Arc<dyn ModelProvider>>,
    job: AnalysisJob,
    stats: &ProviderStats,
) -> ProviderResult {
    let started = Instant::now();
    match job {
        AnalysisJob::Allocation(payload) => {
            process_allocation(provider, payload, stats, started).await
        }
        AnalysisJob::Explanation(payload) => {
            process_explanation(provider, payload, stats, started).await
        }
    }
}

async fn process_allocation(
    provider: Option<Arc<dyn ModelProvider>>,
    payload: AllocationPayload,
    stats: &ProviderStats,
    started: Instant,
) -> ProviderResult {
    tracing::info!(request_id = %payload.request_id, "Allocation request received");

    let (recommendation, model) = match &provider {
        Some(backend) => {
            let prompt = prompts::allocation_prompt(&payload);
            match backend.complete(&prompt).await {
                Ok(text) => (
                    parse_allocation_response(&text, &payload.optimization),
                    backend.name().to_string(),
                ),
                Err(e) => {
                    tracing::warn!(request_id = %payload.request_id, error = %e,
                        "Model call failed, answering with local engine");
                    stats.record_fallback();
                    (engine_recommendation(&payload.metrics), "engine_local".to_string())
                }
            }
        }
        None => {
            stats.record_fallback();
            (engine_recommendation(&payload.metrics), "engine_local".to_string())
        }
    };

    stats.record_success();
    let elapsed = started.elapsed().as_secs_f64();

    ProviderResult {
        request_id: payload.request_id,
        status: "success".to_string(),
        response_type: "allocation_recommendation".to_string(),
        data: json!({ "recommendation": recommendation }),
        metadata: json!({
            "model": model,
            "processing_time": elapsed,
            "processor_stats": stats.snapshot(),
        }),
        timestamp: Utc::now().to_rfc3339(),
        processing_time: elapsed,
    }
}

async fn process_explanation(
    provider: Option<Arc<dyn ModelProvider>>,
    payload: ExplanationPayload,
    stats: &ProviderStats,
    started: Instant,
) -> ProviderResult {
    tracing::info!(request_id = %payload.request_id, "Explanation request received");

    let (explanation, model) = match &provider {
        Some(backend) => {
            let prompt = prompts::explanation_prompt(&payload);
            match backend.complete(&prompt).await {
                Ok(text) => (
                    json!({
                        "text": text,
                        "language": payload.language,
                        "region_id": payload.region_id,
                        "allocation_summary": payload.allocation_data,
                    }),
                    backend.name().to_string(),
                ),
                Err(e) => {
                    tracing::warn!(request_id = %payload.request_id, error = %e,
                        "Model call failed, answering with local engine");
                    stats.record_fallback();
                    (engine_explanation(&payload), "engine_local".to_string())
                }
            }
        }
        None => {
            stats.record_fallback();
            (engine_explanation(&payload), "engine_local".to_string())
        }
    };

    stats.record_success();
    let elapsed = started.elapsed().as_secs_f64();

    ProviderResult {
        request_id: payload.request_id,
        status: "success".to_string(),
        response_type: "explanation".to_string(),
        data: json!({ "explanation": explanation }),
        metadata: json!({
            "model": model,
            "language": payload.language,
            "processing_time": elapsed,
            "processor_stats": stats.snapshot(),
        }),
        timestamp: Utc::now().to_rfc3339(),
        processing_time: elapsed,
    }
}

/// Deterministic engine verdict in provider-result shape.
fn engine_recommendation(metrics: &Metrics) -> Value {
    match engine::calculate(metrics) {
        Ok(result) => json!({
            "priority_score": result.priority_score,
            "priority_level": result.priority_level.as_str(),
            "confidence_score": result.confidence_score,
            "recommended_allocation_percentage": result.allocation_percentage,
            "rationale": result.explanation,
            "key_findings": result.key_findings,
            "recommendations": result.recommendations,
            "engine": "engine_local",
        }),
        // Metrics were validated at intake; an error here still returns a
        // parseable shape instead of poisoning the pipeline.
        Err(e) => json!({
            "priority_level": "medium",
            "confidence_score": 0.5,
            "rationale": format!("engine error: {e}"),
            "engine": "engine_local",
        }),
    }
}

fn engine_explanation(payload: &ExplanationPayload) -> Value {
    let data: AllocationData =
        serde_json::from_value(payload.allocation_data.clone()).unwrap_or_default();

    let result = engine::generate_explanation(
        &payload.region_id,
        &data,
        &payload.context,
        Language::from_code(&payload.language),
    );

    json!({
        "text": result.explanation,
        "key_points": result.key_points,
        "policy_implications": result.recommendations,
        "language": result.language.as_str(),
        "region_id": result.region_id,
        "engine": result.engine,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allocation_payload() -> AllocationPayload {
        let metrics = Metrics {
            poverty_index: 0.8,
            project_impact: 0.7,
            environmental_score: 0.5,
            corruption_risk: 0.2,
        };
        AllocationPayload {
            request_id: "alloc_test".to_string(),
            region_id: "R-1".to_string(),
            metrics,
            optimization: OptimizerScore::from_metrics(&metrics),
            notes: None,
            files: vec![],
            urls: vec![],
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    struct StaticProvider(&'static str);

    #[async_trait]
    impl ModelProvider for StaticProvider {
        fn name(&self) -> &str {
            "static"
        }
        async fn complete(&self, _prompt: &str) -> anyhow::Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl ModelProvider for FailingProvider {
        fn name(&self) -> &str {
            "failing"
        }
        async fn complete(&self, _prompt: &str) -> anyhow::Result<String> {
            anyhow::bail!("model down")
        }
    }

    #[tokio::test]
    async fn test_allocation_without_provider_uses_engine() {
        let stats = ProviderStats::default();
        let result =
            process_allocation(None, allocation_payload(), &stats, Instant::now()).await;

        assert_eq!(result.status, "success");
        assert_eq!(result.response_type, "allocation_recommendation");
        let rec = &result.data["recommendation"];
        assert_eq!(rec["engine"], "engine_local");
        assert!(rec["priority_score"].as_f64().unwrap() > 0.0);
        assert_eq!(stats.snapshot().fallback_requests, 1);
    }

    #[tokio::test]
    async fn test_allocation_with_provider_parses_json() {
        let stats = ProviderStats::default();
        let provider: Arc<dyn ModelProvider> = Arc::new(StaticProvider(
            r#"```json
{"priority_level": "high", "confidence_score": 0.9, "key_findings": ["strong case"]}
```"#,
        ));
        let result =
            process_allocation(Some(provider), allocation_payload(), &stats, Instant::now())
                .await;

        let rec = &result.data["recommendation"];
        assert_eq!(rec["priority_level"], "high");
        assert_eq!(rec["key_findings"][0], "strong case");
        // Optimizer score is grafted onto the parsed response
        assert!(rec["optimization_score"].as_f64().is_some());
    }

    #[tokio::test]
    async fn test_failed_provider_falls_back() {
        let stats = ProviderStats::default();
        let provider: Arc<dyn ModelProvider> = Arc::new(FailingProvider);
        let result =
            process_allocation(Some(provider), allocation_payload(), &stats, Instant::now())
                .await;

        assert_eq!(result.status, "success");
        assert_eq!(result.data["recommendation"]["engine"], "engine_local");
        assert_eq!(stats.snapshot().fallback_requests, 1);
    }

    #[tokio::test]
    async fn test_worker_posts_results() {
        let (jobs_tx, jobs_rx) = mpsc::channel(8);
        let (results_tx, mut results_rx) = mpsc::channel(8);

        let worker = ProviderWorker::new(None, 2, results_tx);
        tokio::spawn(worker.run(jobs_rx));

        jobs_tx
            .send(AnalysisJob::Allocation(allocation_payload()))
            .await
            .unwrap();

        let result = results_rx.recv().await.unwrap();
        assert_eq!(result.request_id, "alloc_test");
        assert_eq!(result.status, "success");
    }

    #[tokio::test]
    async fn test_explanation_fallback_respects_language() {
        let stats = ProviderStats::default();
        let payload = ExplanationPayload {
            request_id: "explain_test".to_string(),
            region_id: "R-9".to_string(),
            allocation_data: json!({"priority_score": 0.8, "allocation_percentage": 80.0}),
            context: String::new(),
            language: "sw".to_string(),
            notes: None,
            files: vec![],
            urls: vec![],
            timestamp: Utc::now().to_rfc3339(),
        };
        let result = process_explanation(None, payload, &stats, Instant::now()).await;
        let explanation = &result.data["explanation"];
        assert_eq!(explanation["language"], "sw");
        assert!(explanation["text"].as_str().unwrap().contains("MUHIMU"));
    }

    #[test]
    fn test_stats_snapshot_rates() {
        let stats = ProviderStats::default();
        stats.record_success();
        stats.record_success();
        stats.record_error();
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total_requests, 3);
        assert!((snapshot.success_rate - 2.0 / 3.0).abs() < 1e-9);
    }
}
