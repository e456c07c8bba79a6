// Gateway proxy handlers
//
// Forwards multipart submissions to the gateway service, persists the
// request record, and polls the gateway for the result in the background.
// When the gateway cannot be reached at all, the allocation path answers
// with the deterministic engine and the explanation path with the local
// renderer, so a citizen submission never dies with the gateway.

use axum::extract::{Multipart, Path, State};
use axum::Json;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::AppState;
use crate::engine::{self, AllocationData, Language};
use crate::error::{Error, Result};
use crate::gateway::ForwardFile;
use crate::metrics::{MetricsLogger, RequestMetric};
use crate::store::{AllocationSubmission, ExplanationSubmission, Store};

/// Fixed-interval polling for the async gateway result.
const POLL_INTERVAL_SECS: u64 = 2;
const POLL_MAX_ATTEMPTS: u32 = 30;

type Fields = HashMap<String, String>;

pub async fn forward_allocation(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<Value>> {
    let started = std::time::Instant::now();
    let (fields, files) = read_submission(multipart, state.config.max_file_size).await?;

    let submission = AllocationSubmission {
        region_id: required(&fields, "region_id")?,
        region_name: fields.get("region_name").cloned(),
        poverty_index: metric(&fields, "poverty_index")?,
        project_impact: metric(&fields, "project_impact")?,
        environmental_score: metric(&fields, "environmental_score")?,
        corruption_risk: metric(&fields, "corruption_risk")?,
        notes: fields.get("notes").cloned().unwrap_or_default(),
        urls: parse_url_field(&fields)?,
        files_attached: files.len() as i64,
    };
    submission.validate()?;

    let record = state.store.create_allocation_request(&submission).await?;
    state
        .store
        .mark_allocation_request_processing(&record.request_id)
        .await?;

    state
        .api_metrics
        .http_requests
        .with_label_values(&["/api/gateway/allocation"])
        .inc();

    match state
        .gateway
        .forward_allocation(forward_fields(&fields), files)
        .await
    {
        Ok(result) => {
            let gateway_request_id = result
                .get("request_id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();

            if !gateway_request_id.is_empty() {
                spawn_result_poll(
                    state.store.clone(),
                    state.gateway.clone(),
                    record.request_id.clone(),
                    gateway_request_id.clone(),
                    ResultKind::Allocation,
                );
            }

            log_metric(&state, &submission.region_id, "gateway", None, started);

            Ok(Json(json!({
                "success": true,
                "request_id": record.request_id,
                "gateway_request_id": gateway_request_id,
                "status": result.get("status").cloned().unwrap_or(json!("pending")),
                "data": result.get("data").cloned(),
                "message": "Allocation request submitted to gateway",
            })))
        }
        Err(Error::GatewayUnreachable { url, source }) => {
            tracing::warn!(gateway = %url, error = %source,
                "Gateway unreachable, answering with local engine");
            state.api_metrics.gateway_fallbacks.inc();

            let verdict = engine::calculate(&submission.metrics())?;
            state
                .store
                .apply_allocation_engine_result(&record.request_id, &verdict)
                .await?;

            log_metric(
                &state,
                &submission.region_id,
                "engine",
                Some("gateway_unreachable"),
                started,
            );

            Ok(Json(json!({
                "success": true,
                "request_id": record.request_id,
                "status": "completed",
                "data": {
                    "priority_score": verdict.priority_score,
                    "priority_level": verdict.priority_level.as_str(),
                    "recommended_allocation_percentage": verdict.allocation_percentage,
                    "mode": "local_engine",
                },
                "message": "Gateway unavailable - used local engine calculation",
                "warning": format!("Gateway is not running at {url}. Start it with: civica gateway"),
            })))
        }
        Err(e) => Err(e),
    }
}

pub async fn forward_explanation(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<Value>> {
    let started = std::time::Instant::now();
    let (fields, files) = read_submission(multipart, state.config.max_file_size).await?;

    let allocation_raw = required(&fields, "allocation_data")?;
    let allocation_data: Value = serde_json::from_str(&allocation_raw)
        .map_err(|e| Error::validation(format!("allocation_data is not valid JSON: {e}")))?;

    let submission = ExplanationSubmission {
        region_id: required(&fields, "region_id")?,
        region_name: fields.get("region_name").cloned(),
        allocation_data: allocation_data.clone(),
        context: fields.get("context").cloned().unwrap_or_default(),
        language: fields
            .get("language")
            .cloned()
            .unwrap_or_else(|| "en".to_string()),
        notes: fields.get("notes").cloned().unwrap_or_default(),
        files_attached: files.len() as i64,
    };
    submission.validate()?;
    parse_url_field(&fields)?;

    let record = state.store.create_explanation_request(&submission).await?;
    state
        .store
        .mark_explanation_request_processing(&record.request_id)
        .await?;

    state
        .api_metrics
        .http_requests
        .with_label_values(&["/api/gateway/explanation"])
        .inc();

    match state
        .gateway
        .forward_explanation(forward_fields(&fields), files)
        .await
    {
        Ok(result) => {
            let gateway_request_id = result
                .get("request_id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();

            if !gateway_request_id.is_empty() {
                spawn_result_poll(
                    state.store.clone(),
                    state.gateway.clone(),
                    record.request_id.clone(),
                    gateway_request_id.clone(),
                    ResultKind::Explanation,
                );
            }

            log_metric(&state, &submission.region_id, "gateway", None, started);

            Ok(Json(json!({
                "success": true,
                "request_id": record.request_id,
                "gateway_request_id": gateway_request_id,
                "status": result.get("status").cloned().unwrap_or(json!("pending")),
                "data": result.get("data").cloned(),
                "message": "Explanation request submitted to gateway",
            })))
        }
        Err(Error::GatewayUnreachable { url, source }) => {
            tracing::warn!(gateway = %url, error = %source,
                "Gateway unreachable, rendering explanation locally");
            state.api_metrics.gateway_fallbacks.inc();

            let data: AllocationData =
                serde_json::from_value(allocation_data).unwrap_or_default();
            let explanation = engine::generate_explanation(
                &submission.region_id,
                &data,
                &submission.context,
                Language::from_code(&submission.language),
            );
            state
                .store
                .apply_explanation_engine_result(&record.request_id, &explanation)
                .await?;

            log_metric(
                &state,
                &submission.region_id,
                "engine",
                Some("gateway_unreachable"),
                started,
            );

            Ok(Json(json!({
                "success": true,
                "request_id": record.request_id,
                "status": "completed",
                "data": {
                    "explanation": explanation.explanation,
                    "key_points": explanation.key_points,
                    "mode": "local_engine",
                },
                "message": "Gateway unavailable - rendered explanation locally",
                "warning": format!("Gateway is not running at {url}. Start it with: civica gateway"),
            })))
        }
        Err(e) => Err(e),
    }
}

pub async fn gateway_status(
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<String>,
) -> Result<Json<Value>> {
    let result = state.gateway.status(&request_id).await?;
    Ok(Json(json!({
        "success": true,
        "request_id": result.get("request_id").cloned(),
        "status": result.get("status").cloned(),
        "data": result.get("data").cloned(),
        "timestamp": result.get("timestamp").cloned(),
    })))
}

pub async fn gateway_health(State(state): State<Arc<AppState>>) -> Result<Json<Value>> {
    let result = state.gateway.health().await?;
    Ok(Json(json!({
        "success": true,
        "gateway_status": result.get("status").cloned(),
        "worker_active": result.get("worker_active").cloned(),
        "cache_stats": result.get("cache_stats").cloned(),
        "timestamp": result.get("timestamp").cloned(),
    })))
}

pub async fn gateway_metrics(State(state): State<Arc<AppState>>) -> Result<Json<Value>> {
    let result = state.gateway.metrics().await?;
    Ok(Json(json!({"success": true, "metrics": result})))
}

// ---------------------------------------------------------------------------
// Result polling
// ---------------------------------------------------------------------------

#[derive(Clone, Copy)]
enum ResultKind {
    Allocation,
    Explanation,
}

/// Poll the gateway until the provider result lands, then write it onto the
/// stored record. Gives up after the attempt budget; the record stays in
/// processing and can be re-driven through /api/gateway/status.
fn spawn_result_poll(
    store: Store,
    gateway: crate::gateway::GatewayClient,
    record_id: String,
    gateway_request_id: String,
    kind: ResultKind,
) {
    tokio::spawn(async move {
        for _ in 0..POLL_MAX_ATTEMPTS {
            tokio::time::sleep(Duration::from_secs(POLL_INTERVAL_SECS)).await;

            let view = match gateway.status(&gateway_request_id).await {
                Ok(view) => view,
                Err(e) => {
                    tracing::debug!(%gateway_request_id, error = %e, "Status poll failed");
                    continue;
                }
            };

            if view.get("status").and_then(Value::as_str) != Some("completed") {
                continue;
            }

            // StatusView.data carries the full provider result; its inner
            // `data` field holds the recommendation/explanation payload.
            let payload = view
                .get("data")
                .and_then(|result| result.get("data"))
                .cloned()
                .unwrap_or(Value::Null);

            let applied = match kind {
                ResultKind::Allocation => store
                    .apply_allocation_result(&record_id, &payload)
                    .await
                    .map(|_| ()),
                ResultKind::Explanation => store
                    .apply_explanation_result(&record_id, &payload)
                    .await
                    .map(|_| ()),
            };

            match applied {
                Ok(()) => tracing::info!(%record_id, "Gateway result applied"),
                Err(e) => tracing::error!(%record_id, error = %e, "Failed to apply result"),
            }
            return;
        }
        tracing::warn!(%record_id, "Gave up polling gateway result");
    });
}

// ---------------------------------------------------------------------------
// Intake helpers
// ---------------------------------------------------------------------------

async fn read_submission(
    mut multipart: Multipart,
    max_file_size: usize,
) -> Result<(Fields, Vec<ForwardFile>)> {
    let mut fields = HashMap::new();
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::validation(format!("malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "files" {
            let filename = field.file_name().unwrap_or("upload").to_string();
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| Error::validation(format!("failed to read upload: {e}")))?;
            if data.len() > max_file_size {
                return Err(Error::validation(format!(
                    "file {filename} exceeds the {max_file_size} byte upload limit"
                )));
            }
            files.push(ForwardFile {
                filename,
                content_type,
                data: data.to_vec(),
            });
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| Error::validation(format!("failed to read field {name}: {e}")))?;
            fields.insert(name, value);
        }
    }

    Ok((fields, files))
}

fn required(fields: &Fields, name: &str) -> Result<String> {
    match fields.get(name) {
        Some(value) if !value.trim().is_empty() => Ok(value.clone()),
        _ => Err(Error::validation(format!("{name} is required"))),
    }
}

fn metric(fields: &Fields, name: &str) -> Result<f64> {
    let raw = required(fields, name)?;
    raw.parse()
        .map_err(|_| Error::validation(format!("{name} must be a number, got {raw}")))
}

fn parse_url_field(fields: &Fields) -> Result<Vec<String>> {
    match fields.get("urls").filter(|u| !u.is_empty()) {
        Some(raw) => {
            let urls: Vec<String> = serde_json::from_str(raw)
                .map_err(|e| Error::validation(format!("urls must be a JSON array: {e}")))?;
            crate::content::validate_urls(&urls)?;
            Ok(urls)
        }
        None => Ok(Vec::new()),
    }
}

/// Fields forwarded to the gateway verbatim (everything the client sent).
fn forward_fields(fields: &Fields) -> Vec<(String, String)> {
    fields
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn log_metric(
    state: &AppState,
    region_id: &str,
    decision: &str,
    fallback: Option<&str>,
    started: std::time::Instant,
) {
    let metric = RequestMetric::new(
        MetricsLogger::hash_query(region_id),
        decision.to_string(),
        fallback.map(|f| f.to_string()),
        started.elapsed().as_millis() as u64,
    );
    if let Err(e) = state.metrics_logger.log(&metric) {
        tracing::warn!(error = %e, "Failed to log request metric");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_and_metric_helpers() {
        let mut fields = Fields::new();
        fields.insert("region_id".to_string(), "R-1".to_string());
        fields.insert("poverty_index".to_string(), "0.75".to_string());

        assert_eq!(required(&fields, "region_id").unwrap(), "R-1");
        assert!(required(&fields, "missing").is_err());
        assert!((metric(&fields, "poverty_index").unwrap() - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_forward_fields_roundtrip() {
        let mut fields = Fields::new();
        fields.insert("region_id".to_string(), "R-1".to_string());
        fields.insert("notes".to_string(), "drought".to_string());

        let forwarded = forward_fields(&fields);
        assert_eq!(forwarded.len(), 2);
        assert!(forwarded.iter().any(|(k, v)| k == "notes" && v == "drought"));
    }
}
