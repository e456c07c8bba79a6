// Analysis request rows
//
// Allocation requests: pending -> processing -> analyzed -> approved/rejected.
// Explanation requests: pending -> processing -> completed -> approved/rejected.
// Results arrive either from the gateway (provider payload) or from the local
// engine fallback; both land through the apply_* methods.

use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::allocation::guard_transition;
use super::{now_rfc3339, Store};
use crate::engine::{ExplanationResult, Metrics, PriorityResult};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct AllocationSubmission {
    pub region_id: String,
    #[serde(default)]
    pub region_name: Option<String>,
    pub poverty_index: f64,
    pub project_impact: f64,
    pub environmental_score: f64,
    pub corruption_risk: f64,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default)]
    pub files_attached: i64,
}

impl AllocationSubmission {
    pub fn metrics(&self) -> Metrics {
        Metrics {
            poverty_index: self.poverty_index,
            project_impact: self.project_impact,
            environmental_score: self.environmental_score,
            corruption_risk: self.corruption_risk,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.region_id.trim().is_empty() {
            return Err(Error::validation("region_id is required"));
        }
        self.metrics().validate()?;
        crate::content::validate_urls(&self.urls)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AllocationRequestRecord {
    pub request_id: String,
    pub region_id: String,
    pub region_name: String,
    pub poverty_index: f64,
    pub project_impact: f64,
    pub environmental_score: f64,
    pub corruption_risk: f64,
    pub notes: String,
    pub urls: Vec<String>,
    pub status: String,
    pub priority_score: Option<f64>,
    pub priority_level: String,
    pub confidence_score: Option<f64>,
    pub recommended_allocation_percentage: Option<f64>,
    pub ai_recommendation: String,
    pub key_findings: Value,
    pub recommendations: Value,
    pub files_attached: i64,
    pub created_at: String,
    pub updated_at: String,
    pub analyzed_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExplanationSubmission {
    pub region_id: String,
    #[serde(default)]
    pub region_name: Option<String>,
    #[serde(default)]
    pub allocation_data: Value,
    #[serde(default)]
    pub context: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub files_attached: i64,
}

fn default_language() -> String {
    "simple".to_string()
}

impl ExplanationSubmission {
    pub fn validate(&self) -> Result<()> {
        if self.region_id.trim().is_empty() {
            return Err(Error::validation("region_id is required"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExplanationRequestRecord {
    pub request_id: String,
    pub region_id: String,
    pub region_name: String,
    pub allocation_data: Value,
    pub context: String,
    pub language: String,
    pub notes: String,
    pub status: String,
    pub explanation_text: String,
    pub key_points: Value,
    pub policy_implications: Value,
    pub transparency_score: Option<f64>,
    pub files_attached: i64,
    pub created_at: String,
    pub updated_at: String,
    pub completed_at: Option<String>,
}

/// Counts surfaced on the review dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewQueue {
    pub allocation_pending: i64,
    pub allocation_processing: i64,
    pub allocation_analyzed: i64,
    pub explanation_pending: i64,
    pub explanation_processing: i64,
    pub explanation_completed: i64,
}

const ALLOC_REQ_COLUMNS: &str = "request_id, region_id, region_name, poverty_index, \
     project_impact, environmental_score, corruption_risk, notes, urls, status, \
     priority_score, priority_level, confidence_score, \
     recommended_allocation_percentage, ai_recommendation, key_findings, \
     recommendations, files_attached, created_at, updated_at, analyzed_at";

fn alloc_request_from_row(row: &Row) -> rusqlite::Result<AllocationRequestRecord> {
    let urls: String = row.get(8)?;
    let key_findings: String = row.get(15)?;
    let recommendations: String = row.get(16)?;
    Ok(AllocationRequestRecord {
        request_id: row.get(0)?,
        region_id: row.get(1)?,
        region_name: row.get(2)?,
        poverty_index: row.get(3)?,
        project_impact: row.get(4)?,
        environmental_score: row.get(5)?,
        corruption_risk: row.get(6)?,
        notes: row.get(7)?,
        urls: serde_json::from_str(&urls).unwrap_or_default(),
        status: row.get(9)?,
        priority_score: row.get(10)?,
        priority_level: row.get(11)?,
        confidence_score: row.get(12)?,
        recommended_allocation_percentage: row.get(13)?,
        ai_recommendation: row.get(14)?,
        key_findings: serde_json::from_str(&key_findings).unwrap_or_default(),
        recommendations: serde_json::from_str(&recommendations).unwrap_or_default(),
        files_attached: row.get(17)?,
        created_at: row.get(18)?,
        updated_at: row.get(19)?,
        analyzed_at: row.get(20)?,
    })
}

const EXPLAIN_REQ_COLUMNS: &str = "request_id, region_id, region_name, allocation_data, \
     context, language, notes, status, explanation_text, key_points, \
     policy_implications, transparency_score, files_attached, created_at, \
     updated_at, completed_at";

fn explain_request_from_row(row: &Row) -> rusqlite::Result<ExplanationRequestRecord> {
    let allocation_data: String = row.get(3)?;
    let key_points: String = row.get(9)?;
    let policy_implications: String = row.get(10)?;
    Ok(ExplanationRequestRecord {
        request_id: row.get(0)?,
        region_id: row.get(1)?,
        region_name: row.get(2)?,
        allocation_data: serde_json::from_str(&allocation_data).unwrap_or_default(),
        context: row.get(4)?,
        language: row.get(5)?,
        notes: row.get(6)?,
        status: row.get(7)?,
        explanation_text: row.get(8)?,
        key_points: serde_json::from_str(&key_points).unwrap_or_default(),
        policy_implications: serde_json::from_str(&policy_implications).unwrap_or_default(),
        transparency_score: row.get(11)?,
        files_attached: row.get(12)?,
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
        completed_at: row.get(15)?,
    })
}

impl Store {
    pub async fn create_allocation_request(
        &self,
        submission: &AllocationSubmission,
    ) -> Result<AllocationRequestRecord> {
        submission.validate()?;

        let request_id = Uuid::new_v4().to_string();
        let now = now_rfc3339();
        let region_name = submission
            .region_name
            .clone()
            .unwrap_or_else(|| submission.region_id.clone());
        let urls = serde_json::to_string(&submission.urls)?;

        {
            let conn = self.lock().await;
            conn.execute(
                "INSERT INTO allocation_requests (request_id, region_id, region_name, \
                 poverty_index, project_impact, environmental_score, corruption_risk, \
                 notes, urls, files_attached, status, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 'pending', ?11, ?11)",
                params![
                    request_id,
                    submission.region_id,
                    region_name,
                    submission.poverty_index,
                    submission.project_impact,
                    submission.environmental_score,
                    submission.corruption_risk,
                    submission.notes,
                    urls,
                    submission.files_attached,
                    now,
                ],
            )?;
        }

        self.get_allocation_request(&request_id).await
    }

    pub async fn list_allocation_requests(
        &self,
        status: Option<&str>,
        region_id: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AllocationRequestRecord>> {
        let (clause, filters) = filter_clause(status, region_id);
        let sql = format!(
            "SELECT {ALLOC_REQ_COLUMNS} FROM allocation_requests{clause} \
             ORDER BY created_at DESC LIMIT {} OFFSET {}",
            limit.clamp(1, 50),
            offset.max(0)
        );

        let conn = self.lock().await;
        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map(params_from_iter(filters), alloc_request_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    pub async fn get_allocation_request(
        &self,
        request_id: &str,
    ) -> Result<AllocationRequestRecord> {
        let conn = self.lock().await;
        conn.query_row(
            &format!("SELECT {ALLOC_REQ_COLUMNS} FROM allocation_requests WHERE request_id = ?1"),
            params![request_id],
            alloc_request_from_row,
        )
        .optional()?
        .ok_or_else(|| Error::not_found("allocation request", request_id))
    }

    /// pending -> processing, when the request is handed to the gateway.
    pub async fn mark_allocation_request_processing(&self, request_id: &str) -> Result<()> {
        let now = now_rfc3339();
        let conn = self.lock().await;
        let changed = conn.execute(
            "UPDATE allocation_requests SET status = 'processing', updated_at = ?1 \
             WHERE request_id = ?2 AND status = 'pending'",
            params![now, request_id],
        )?;
        if changed == 0 {
            return Err(Error::not_found("allocation request", request_id));
        }
        Ok(())
    }

    /// Ingest a provider result payload: `{"recommendation": {...}}`.
    pub async fn apply_allocation_result(
        &self,
        request_id: &str,
        result: &Value,
    ) -> Result<AllocationRequestRecord> {
        let recommendation = result.get("recommendation").unwrap_or(result);

        let priority_score = recommendation
            .get("optimization_score")
            .or_else(|| recommendation.get("priority_score"))
            .and_then(Value::as_f64);
        let priority_level = recommendation
            .get("priority_level")
            .and_then(Value::as_str)
            .unwrap_or("");
        let confidence = recommendation
            .get("confidence_score")
            .and_then(Value::as_f64);
        let allocation_pct = recommendation
            .get("recommended_allocation_percentage")
            .or_else(|| recommendation.get("allocation_percentage"))
            .and_then(Value::as_f64);
        let rationale = recommendation
            .get("rationale")
            .or_else(|| recommendation.get("analysis"))
            .or_else(|| recommendation.get("explanation"))
            .and_then(Value::as_str)
            .unwrap_or("");
        let key_findings = recommendation
            .get("key_findings")
            .cloned()
            .unwrap_or_else(|| Value::Array(Vec::new()));
        let recommendations = recommendation
            .get("recommendations")
            .cloned()
            .unwrap_or_else(|| Value::Array(Vec::new()));

        let now = now_rfc3339();
        {
            let conn = self.lock().await;
            let changed = conn.execute(
                "UPDATE allocation_requests SET status = 'analyzed', priority_score = ?1, \
                 priority_level = ?2, confidence_score = ?3, \
                 recommended_allocation_percentage = ?4, ai_recommendation = ?5, \
                 key_findings = ?6, recommendations = ?7, analyzed_at = ?8, updated_at = ?8 \
                 WHERE request_id = ?9",
                params![
                    priority_score,
                    priority_level,
                    confidence,
                    allocation_pct,
                    rationale,
                    serde_json::to_string(&key_findings)?,
                    serde_json::to_string(&recommendations)?,
                    now,
                    request_id,
                ],
            )?;
            if changed == 0 {
                return Err(Error::not_found("allocation request", request_id));
            }
        }

        self.get_allocation_request(request_id).await
    }

    /// Ingest a local engine verdict (gateway fallback path).
    pub async fn apply_allocation_engine_result(
        &self,
        request_id: &str,
        result: &PriorityResult,
    ) -> Result<AllocationRequestRecord> {
        let payload = serde_json::json!({
            "recommendation": {
                "priority_score": result.priority_score,
                "priority_level": result.priority_level.as_str(),
                "confidence_score": result.confidence_score,
                "recommended_allocation_percentage": result.allocation_percentage,
                "rationale": result.explanation,
                "key_findings": result.key_findings,
                "recommendations": result.recommendations,
            }
        });
        self.apply_allocation_result(request_id, &payload).await
    }

    /// analyzed -> approved/rejected.
    pub async fn review_allocation_request(
        &self,
        request_id: &str,
        approve: bool,
    ) -> Result<AllocationRequestRecord> {
        let record = self.get_allocation_request(request_id).await?;
        let target = if approve { "approved" } else { "rejected" };
        guard_transition(&record.status, "analyzed", target)?;

        let now = now_rfc3339();
        {
            let conn = self.lock().await;
            conn.execute(
                "UPDATE allocation_requests SET status = ?1, updated_at = ?2 \
                 WHERE request_id = ?3",
                params![target, now, request_id],
            )?;
        }
        self.get_allocation_request(request_id).await
    }

    pub async fn create_explanation_request(
        &self,
        submission: &ExplanationSubmission,
    ) -> Result<ExplanationRequestRecord> {
        submission.validate()?;

        let request_id = Uuid::new_v4().to_string();
        let now = now_rfc3339();
        let region_name = submission.region_name.clone().unwrap_or_default();
        let allocation_data = serde_json::to_string(&submission.allocation_data)?;

        {
            let conn = self.lock().await;
            conn.execute(
                "INSERT INTO explanation_requests (request_id, region_id, region_name, \
                 allocation_data, context, language, notes, files_attached, status, \
                 created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'pending', ?9, ?9)",
                params![
                    request_id,
                    submission.region_id,
                    region_name,
                    allocation_data,
                    submission.context,
                    submission.language,
                    submission.notes,
                    submission.files_attached,
                    now,
                ],
            )?;
        }

        self.get_explanation_request(&request_id).await
    }

    pub async fn list_explanation_requests(
        &self,
        status: Option<&str>,
        region_id: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ExplanationRequestRecord>> {
        let (clause, filters) = filter_clause(status, region_id);
        let sql = format!(
            "SELECT {EXPLAIN_REQ_COLUMNS} FROM explanation_requests{clause} \
             ORDER BY created_at DESC LIMIT {} OFFSET {}",
            limit.clamp(1, 50),
            offset.max(0)
        );

        let conn = self.lock().await;
        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map(params_from_iter(filters), explain_request_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    pub async fn get_explanation_request(
        &self,
        request_id: &str,
    ) -> Result<ExplanationRequestRecord> {
        let conn = self.lock().await;
        conn.query_row(
            &format!(
                "SELECT {EXPLAIN_REQ_COLUMNS} FROM explanation_requests WHERE request_id = ?1"
            ),
            params![request_id],
            explain_request_from_row,
        )
        .optional()?
        .ok_or_else(|| Error::not_found("explanation request", request_id))
    }

    pub async fn mark_explanation_request_processing(&self, request_id: &str) -> Result<()> {
        let now = now_rfc3339();
        let conn = self.lock().await;
        let changed = conn.execute(
            "UPDATE explanation_requests SET status = 'processing', updated_at = ?1 \
             WHERE request_id = ?2 AND status = 'pending'",
            params![now, request_id],
        )?;
        if changed == 0 {
            return Err(Error::not_found("explanation request", request_id));
        }
        Ok(())
    }

    /// Ingest a provider result payload: `{"explanation": {...}}`.
    pub async fn apply_explanation_result(
        &self,
        request_id: &str,
        result: &Value,
    ) -> Result<ExplanationRequestRecord> {
        let explanation = result.get("explanation").unwrap_or(result);

        let text = explanation
            .get("text")
            .or_else(|| explanation.get("explanation"))
            .and_then(Value::as_str)
            .unwrap_or("");
        let key_points = explanation
            .get("key_points")
            .cloned()
            .unwrap_or_else(|| Value::Array(Vec::new()));
        let policy_implications = explanation
            .get("policy_implications")
            .cloned()
            .unwrap_or_else(|| Value::Array(Vec::new()));
        let transparency = explanation
            .get("transparency_score")
            .and_then(Value::as_f64);

        let now = now_rfc3339();
        {
            let conn = self.lock().await;
            let changed = conn.execute(
                "UPDATE explanation_requests SET status = 'completed', explanation_text = ?1, \
                 key_points = ?2, policy_implications = ?3, transparency_score = ?4, \
                 completed_at = ?5, updated_at = ?5 WHERE request_id = ?6",
                params![
                    text,
                    serde_json::to_string(&key_points)?,
                    serde_json::to_string(&policy_implications)?,
                    transparency,
                    now,
                    request_id,
                ],
            )?;
            if changed == 0 {
                return Err(Error::not_found("explanation request", request_id));
            }
        }

        self.get_explanation_request(request_id).await
    }

    /// Ingest a local engine explanation (gateway fallback path).
    pub async fn apply_explanation_engine_result(
        &self,
        request_id: &str,
        result: &ExplanationResult,
    ) -> Result<ExplanationRequestRecord> {
        let payload = serde_json::json!({
            "explanation": {
                "text": result.explanation,
                "key_points": result.key_points,
                "policy_implications": result.recommendations,
            }
        });
        self.apply_explanation_result(request_id, &payload).await
    }

    /// completed -> approved/rejected.
    pub async fn review_explanation_request(
        &self,
        request_id: &str,
        approve: bool,
    ) -> Result<ExplanationRequestRecord> {
        let record = self.get_explanation_request(request_id).await?;
        let target = if approve { "approved" } else { "rejected" };
        guard_transition(&record.status, "completed", target)?;

        let now = now_rfc3339();
        {
            let conn = self.lock().await;
            conn.execute(
                "UPDATE explanation_requests SET status = ?1, updated_at = ?2 \
                 WHERE request_id = ?3",
                params![target, now, request_id],
            )?;
        }
        self.get_explanation_request(request_id).await
    }

    pub async fn review_queue(&self) -> Result<ReviewQueue> {
        let conn = self.lock().await;
        let count = |sql: &str| -> rusqlite::Result<i64> { conn.query_row(sql, [], |r| r.get(0)) };

        Ok(ReviewQueue {
            allocation_pending: count(
                "SELECT COUNT(*) FROM allocation_requests WHERE status = 'pending'",
            )?,
            allocation_processing: count(
                "SELECT COUNT(*) FROM allocation_requests WHERE status = 'processing'",
            )?,
            allocation_analyzed: count(
                "SELECT COUNT(*) FROM allocation_requests WHERE status = 'analyzed'",
            )?,
            explanation_pending: count(
                "SELECT COUNT(*) FROM explanation_requests WHERE status = 'pending'",
            )?,
            explanation_processing: count(
                "SELECT COUNT(*) FROM explanation_requests WHERE status = 'processing'",
            )?,
            explanation_completed: count(
                "SELECT COUNT(*) FROM explanation_requests WHERE status = 'completed'",
            )?,
        })
    }
}

/// WHERE clause and positional filters shared by both request tables.
fn filter_clause(status: Option<&str>, region_id: Option<&str>) -> (String, Vec<String>) {
    let mut conditions = Vec::new();
    let mut filters = Vec::new();

    if let Some(s) = status {
        filters.push(s.to_string());
        conditions.push(format!("status = ?{}", filters.len()));
    }
    if let Some(r) = region_id {
        filters.push(r.to_string());
        conditions.push(format!("region_id = ?{}", filters.len()));
    }

    if conditions.is_empty() {
        (String::new(), filters)
    } else {
        (format!(" WHERE {}", conditions.join(" AND ")), filters)
    }
}
