// System, priority, and orchestrator handlers

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::AppState;
use crate::engine::{self, AllocationData, Language, Metrics, RegionScore};
use crate::error::{Error, Result};
use crate::metrics::{MetricsLogger, RequestMetric};

/// Service health: store reachability plus an engine self-test.
pub async fn health(State(state): State<Arc<AppState>>) -> Result<Json<Value>> {
    state.store.ping().await?;

    // Known-good metrics must produce a score; anything else means the
    // engine is miswired.
    let probe = engine::calculate(&Metrics {
        poverty_index: 0.8,
        project_impact: 0.9,
        environmental_score: 0.4,
        corruption_risk: 0.3,
    })?;

    Ok(Json(json!({
        "status": "healthy",
        "store": "reachable",
        "engine": "operational",
        "test_calculation": probe.priority_score,
        "timestamp": Utc::now().to_rfc3339(),
    })))
}

/// Prometheus text exposition.
pub async fn prometheus_metrics(State(state): State<Arc<AppState>>) -> Response {
    match state.api_metrics.render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to render metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Today's JSONL request-metric summary.
pub async fn metrics_summary(State(state): State<Arc<AppState>>) -> Result<Json<Value>> {
    let summary = state
        .metrics_logger
        .today_summary()
        .map_err(|e| Error::Provider(format!("metrics summary failed: {e}")))?;
    Ok(Json(serde_json::to_value(summary)?))
}

pub async fn dashboard(State(state): State<Arc<AppState>>) -> Result<Json<Value>> {
    let snapshot = state.store.dashboard_snapshot().await?;
    Ok(Json(serde_json::to_value(snapshot)?))
}

// ---------------------------------------------------------------------------
// Priority engine
// ---------------------------------------------------------------------------

pub async fn calculate_priority(
    State(state): State<Arc<AppState>>,
    Json(metrics): Json<Metrics>,
) -> Result<Json<Value>> {
    let started = std::time::Instant::now();
    let result = engine::calculate(&metrics)?;

    let allocation = result.priority_score * state.config.total_budget;
    state
        .api_metrics
        .http_requests
        .with_label_values(&["/api/priority/calculate"])
        .inc();

    let metric = RequestMetric::new(
        MetricsLogger::hash_query(&format!("{metrics:?}")),
        "engine".to_string(),
        None,
        started.elapsed().as_millis() as u64,
    );
    if let Err(e) = state.metrics_logger.log(&metric) {
        tracing::warn!(error = %e, "Failed to log request metric");
    }

    Ok(Json(json!({
        "success": true,
        "priority_score": result.priority_score,
        "priority_level": result.priority_level.as_str(),
        "allocation": allocation,
        "allocation_millions": (allocation / 1_000_000.0 * 100.0).round() / 100.0,
        "allocation_percentage": result.allocation_percentage,
        "confidence_score": result.confidence_score,
        "factors": result.factors,
        "key_findings": result.key_findings,
        "recommendations": result.recommendations,
        "explanation": result.explanation,
        "engine": result.engine,
    })))
}

#[derive(Debug, Deserialize)]
pub struct ExplainBody {
    pub region_id: String,
    #[serde(default)]
    pub allocation_data: AllocationData,
    #[serde(default)]
    pub context: String,
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_language() -> String {
    "en".to_string()
}

pub async fn explain_allocation(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ExplainBody>,
) -> Result<Json<Value>> {
    if body.region_id.trim().is_empty() {
        return Err(Error::validation("region_id is required"));
    }

    state
        .api_metrics
        .http_requests
        .with_label_values(&["/api/priority/explain"])
        .inc();

    let result = engine::generate_explanation(
        &body.region_id,
        &body.allocation_data,
        &body.context,
        Language::from_code(&body.language),
    );
    Ok(Json(serde_json::to_value(result)?))
}

#[derive(Debug, Deserialize)]
pub struct BudgetBody {
    #[serde(default)]
    pub total_budget: Option<f64>,
    /// When omitted, the stored regions and their scores are used.
    #[serde(default)]
    pub regions: Option<Vec<RegionScore>>,
}

pub async fn budget_split(
    State(state): State<Arc<AppState>>,
    Json(body): Json<BudgetBody>,
) -> Result<Json<Value>> {
    let total = body.total_budget.unwrap_or(state.config.total_budget);
    if total <= 0.0 || !total.is_finite() {
        return Err(Error::validation("total_budget must be positive"));
    }

    let regions = match body.regions {
        Some(regions) if !regions.is_empty() => regions,
        _ => state
            .store
            .list_regions()
            .await?
            .into_iter()
            .map(|r| RegionScore {
                region_id: r.region_id,
                priority_score: r.priority_score,
            })
            .collect(),
    };

    if regions.is_empty() {
        return Err(Error::validation("no regions to allocate across"));
    }

    let shares = engine::split_budget(&regions, total);
    Ok(Json(json!({
        "total_budget": total,
        "allocations": shares,
    })))
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct RouteBody {
    pub query: String,
}

pub async fn route_query(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RouteBody>,
) -> Result<Json<Value>> {
    if body.query.trim().is_empty() {
        return Err(Error::validation("query is required"));
    }

    let outcome = state.orchestrator.route(&body.query);
    state
        .api_metrics
        .route_decisions
        .with_label_values(&[outcome.route.as_str()])
        .inc();

    let metric = RequestMetric::new(
        MetricsLogger::hash_query(&body.query),
        outcome.route.as_str().to_string(),
        None,
        0,
    );
    if let Err(e) = state.metrics_logger.log(&metric) {
        tracing::warn!(error = %e, "Failed to log request metric");
    }

    Ok(Json(serde_json::to_value(outcome)?))
}

pub async fn orchestrator_stats(State(state): State<Arc<AppState>>) -> Result<Json<Value>> {
    Ok(Json(serde_json::to_value(state.orchestrator.stats())?))
}
