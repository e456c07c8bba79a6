// Analysis gateway
//
// Own axum app: multipart intake, content pipeline, provider dispatch over
// mpsc, and in-memory status polling. The API server talks to this service
// over HTTP via GatewayClient so the process seam (and its fallback
// behavior) is preserved.

mod client;
mod pending;

pub use client::{ForwardFile, GatewayClient};
pub use pending::{PendingRequests, StatusView};

use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::Utc;
use futures::future::join_all;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::config::constants::PENDING_TTL_SECS;
use crate::config::Config;
use crate::content::ContentProcessor;
use crate::engine::{Metrics, OptimizerScore};
use crate::provider::{
    AllocationPayload, AnalysisJob, ClaudeClient, ExplanationPayload, ModelProvider, Note,
    ProviderStats, ProviderWorker,
};

type HandlerError = (StatusCode, Json<Value>);

pub struct GatewayState {
    pending: Arc<PendingRequests>,
    jobs_tx: mpsc::Sender<AnalysisJob>,
    processor: Arc<ContentProcessor>,
    provider_stats: Arc<ProviderStats>,
    provider_name: String,
    started_at: Instant,
}

impl GatewayState {
    pub fn new(
        pending: Arc<PendingRequests>,
        jobs_tx: mpsc::Sender<AnalysisJob>,
        processor: Arc<ContentProcessor>,
        provider_stats: Arc<ProviderStats>,
        provider_name: String,
    ) -> Self {
        Self {
            pending,
            jobs_tx,
            processor,
            provider_stats,
            provider_name,
            started_at: Instant::now(),
        }
    }
}

pub fn create_gateway_router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/allocation/request", post(allocation_request))
        .route("/explanation/request", post(explanation_request))
        .route("/status/:request_id", get(request_status))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/cache/clear", delete(clear_cache))
        .with_state(state)
}

/// Run the gateway service until the listener fails.
pub async fn run_gateway(config: Config) -> anyhow::Result<()> {
    let processor = ContentProcessor::new(
        config.max_file_size,
        Duration::from_secs(config.request_timeout_secs),
    )?;

    let provider: Option<Arc<dyn ModelProvider>> = match &config.anthropic_api_key {
        Some(key) => {
            let client = ClaudeClient::new(
                key.clone(),
                config.chat_model.clone(),
                config.max_tokens,
                config.temperature,
            )?;
            Some(Arc::new(client))
        }
        None => {
            tracing::warn!("No API key configured - all analysis answered by the local engine");
            None
        }
    };
    let provider_name = provider
        .as_ref()
        .map(|p| p.name().to_string())
        .unwrap_or_else(|| "engine_local".to_string());

    let (jobs_tx, jobs_rx) = mpsc::channel(64);
    let (results_tx, mut results_rx) = mpsc::channel(64);

    let worker = ProviderWorker::new(provider, config.max_concurrent_requests, results_tx);
    let provider_stats = worker.stats();
    tokio::spawn(worker.run(jobs_rx));

    let pending = Arc::new(PendingRequests::new(Duration::from_secs(PENDING_TTL_SECS)));

    // Result pump: provider results land in the pending table for polling
    let pending_pump = Arc::clone(&pending);
    tokio::spawn(async move {
        while let Some(result) = results_rx.recv().await {
            let request_id = result.request_id.clone();
            match serde_json::to_value(&result) {
                Ok(value) => pending_pump.complete(&request_id, value),
                Err(e) => tracing::error!(%request_id, error = %e, "Failed to serialize result"),
            }
        }
    });

    // Periodic sweep of expired pending entries, with a stats heartbeat
    let pending_sweep = Arc::clone(&pending);
    let stats_heartbeat = Arc::clone(&provider_stats);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            pending_sweep.purge_expired();
            let snapshot = stats_heartbeat.snapshot();
            tracing::info!(
                total = snapshot.total_requests,
                success = snapshot.successful_requests,
                fallback = snapshot.fallback_requests,
                "Provider stats"
            );
        }
    });

    let state = Arc::new(GatewayState::new(
        pending,
        jobs_tx,
        processor,
        provider_stats,
        provider_name,
    ));

    // Multipart bodies carry whole documents; size the limit off the
    // per-file cap with headroom for several files plus form fields.
    let app = create_gateway_router(state)
        .layer(DefaultBodyLimit::max(config.max_file_size * 4))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: std::net::SocketAddr = config.gateway_bind_address.parse()?;
    tracing::info!("Starting Civica gateway on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn root(State(state): State<Arc<GatewayState>>) -> Json<Value> {
    Json(json!({
        "service": "Civica Gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "provider": state.provider_name,
        "features": [
            "Multi-format file processing (PDF, text, CSV)",
            "URL content extraction",
            "Priority optimization",
            "Smart caching",
            "Async processing",
            "Language annotation",
            "Text summarization",
        ],
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn allocation_request(
    State(state): State<Arc<GatewayState>>,
    multipart: Multipart,
) -> Result<Json<Value>, HandlerError> {
    let (fields, files) = read_multipart(multipart).await?;

    let region_id = required_field(&fields, "region_id")?;
    let metrics = Metrics {
        poverty_index: metric_field(&fields, "poverty_index")?,
        project_impact: metric_field(&fields, "project_impact")?,
        environmental_score: metric_field(&fields, "environmental_score")?,
        corruption_risk: metric_field(&fields, "corruption_risk")?,
    };
    metrics.validate().map_err(bad_request)?;

    let urls = parse_urls(&fields)?;
    let notes = fields.get("notes").filter(|n| !n.is_empty()).map(|n| Note {
        content: n.clone(),
        language: crate::content::detect_language(n).to_string(),
    });

    let processed_files = process_files(&state, &files)?;
    let url_contents = join_all(urls.iter().map(|url| state.processor.process_url(url))).await;

    let optimization = OptimizerScore::from_metrics(&metrics);
    let request_id = new_request_id("alloc");

    let payload = AllocationPayload {
        request_id: request_id.clone(),
        region_id,
        metrics,
        optimization,
        notes,
        files: processed_files.clone(),
        urls: url_contents.clone(),
        timestamp: Utc::now().to_rfc3339(),
    };

    dispatch(&state, &request_id, AnalysisJob::Allocation(payload)).await?;
    tracing::info!(%request_id, "Allocation request dispatched");

    Ok(Json(json!({
        "request_id": request_id,
        "status": "pending",
        "data": {
            "message": "Allocation request submitted successfully",
            "priority_score": optimization.priority_score,
            "processed_files": processed_files.len(),
            "processed_urls": url_contents.len(),
        },
        "timestamp": Utc::now().to_rfc3339(),
    })))
}

async fn explanation_request(
    State(state): State<Arc<GatewayState>>,
    multipart: Multipart,
) -> Result<Json<Value>, HandlerError> {
    let (fields, files) = read_multipart(multipart).await?;

    let region_id = required_field(&fields, "region_id")?;
    let allocation_raw = required_field(&fields, "allocation_data")?;
    let allocation_data: Value = serde_json::from_str(&allocation_raw)
        .map_err(|e| bad_request_msg(format!("allocation_data is not valid JSON: {e}")))?;
    let context = fields.get("context").cloned().unwrap_or_default();
    let language = fields
        .get("language")
        .cloned()
        .unwrap_or_else(|| "en".to_string());

    let urls = parse_urls(&fields)?;
    let notes = fields.get("notes").filter(|n| !n.is_empty()).map(|n| Note {
        content: n.clone(),
        language: crate::content::detect_language(n).to_string(),
    });

    let processed_files = process_files(&state, &files)?;
    let url_contents = join_all(urls.iter().map(|url| state.processor.process_url(url))).await;

    let request_id = new_request_id("explain");

    let payload = ExplanationPayload {
        request_id: request_id.clone(),
        region_id,
        allocation_data,
        context,
        language: language.clone(),
        notes,
        files: processed_files.clone(),
        urls: url_contents.clone(),
        timestamp: Utc::now().to_rfc3339(),
    };

    dispatch(&state, &request_id, AnalysisJob::Explanation(payload)).await?;
    tracing::info!(%request_id, "Explanation request dispatched");

    Ok(Json(json!({
        "request_id": request_id,
        "status": "pending",
        "data": {
            "message": "Explanation request submitted successfully",
            "target_language": language,
            "processed_files": processed_files.len(),
            "processed_urls": url_contents.len(),
        },
        "timestamp": Utc::now().to_rfc3339(),
    })))
}

async fn request_status(
    State(state): State<Arc<GatewayState>>,
    Path(request_id): Path<String>,
) -> Result<Json<StatusView>, HandlerError> {
    match state.pending.get(&request_id) {
        Some(view) => Ok(Json(view)),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(json!({"error": "Request not found", "request_id": request_id})),
        )),
    }
}

async fn health(State(state): State<Arc<GatewayState>>) -> Json<Value> {
    let (content_cache, url_cache) = state.processor.cache_sizes();
    Json(json!({
        "status": "healthy",
        "worker_active": !state.jobs_tx.is_closed(),
        "cache_stats": {
            "content_cache_size": content_cache,
            "url_cache_size": url_cache,
        },
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn metrics(State(state): State<Arc<GatewayState>>) -> Json<Value> {
    let (processing, completed) = state.pending.counts();
    let (content_cache, url_cache) = state.processor.cache_sizes();
    Json(json!({
        "total_requests": state.pending.len(),
        "pending_requests": processing,
        "completed_requests": completed,
        "cache_stats": {
            "content_cache_size": content_cache,
            "url_cache_size": url_cache,
        },
        "processor_stats": state.provider_stats.snapshot(),
        "uptime_secs": state.started_at.elapsed().as_secs(),
    }))
}

async fn clear_cache(State(state): State<Arc<GatewayState>>) -> Json<Value> {
    state.processor.clear_caches();
    tracing::info!("All caches cleared");
    Json(json!({"message": "Caches cleared successfully"}))
}

// ---------------------------------------------------------------------------
// Intake helpers
// ---------------------------------------------------------------------------

type Fields = HashMap<String, String>;
type Files = Vec<(String, Vec<u8>)>;

async fn read_multipart(mut multipart: Multipart) -> Result<(Fields, Files), HandlerError> {
    let mut fields = HashMap::new();
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request_msg(format!("malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "files" {
            let filename = field
                .file_name()
                .unwrap_or("upload")
                .to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| bad_request_msg(format!("failed to read upload: {e}")))?;
            files.push((filename, data.to_vec()));
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| bad_request_msg(format!("failed to read field {name}: {e}")))?;
            fields.insert(name, value);
        }
    }

    Ok((fields, files))
}

fn required_field(fields: &Fields, name: &str) -> Result<String, HandlerError> {
    match fields.get(name) {
        Some(value) if !value.trim().is_empty() => Ok(value.clone()),
        _ => Err(bad_request_msg(format!("{name} is required"))),
    }
}

fn metric_field(fields: &Fields, name: &str) -> Result<f64, HandlerError> {
    let raw = required_field(fields, name)?;
    raw.parse()
        .map_err(|_| bad_request_msg(format!("{name} must be a number, got {raw}")))
}

fn parse_urls(fields: &Fields) -> Result<Vec<String>, HandlerError> {
    let urls: Vec<String> = match fields.get("urls").filter(|u| !u.is_empty()) {
        Some(raw) => serde_json::from_str(raw)
            .map_err(|e| bad_request_msg(format!("urls must be a JSON array: {e}")))?,
        None => Vec::new(),
    };
    crate::content::validate_urls(&urls).map_err(bad_request)?;
    Ok(urls)
}

fn process_files(
    state: &GatewayState,
    files: &Files,
) -> Result<Vec<crate::content::ProcessedFile>, HandlerError> {
    files
        .iter()
        .map(|(filename, data)| {
            state
                .processor
                .process_file(filename, data)
                .map_err(bad_request)
        })
        .collect()
}

async fn dispatch(
    state: &GatewayState,
    request_id: &str,
    job: AnalysisJob,
) -> Result<(), HandlerError> {
    state.pending.insert_processing(request_id);
    state.jobs_tx.send(job).await.map_err(|_| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "Provider worker is not running"})),
        )
    })
}

fn new_request_id(prefix: &str) -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("{prefix}_{}", &hex[..12])
}

fn bad_request(err: crate::error::Error) -> HandlerError {
    bad_request_msg(err.to_string())
}

fn bad_request_msg(message: String) -> HandlerError {
    (StatusCode::BAD_REQUEST, Json(json!({"error": message})))
}
