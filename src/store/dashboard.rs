// Dashboard aggregates
//
// Computed per request straight from the store; nothing here is persisted.

use serde::Serialize;

use super::Store;
use crate::error::Result;

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub total_regions: i64,
    pub regions_funded: i64,
    pub average_priority_score: f64,

    pub total_proposals: i64,
    pub proposals_in_review: i64,
    pub proposals_voting: i64,
    pub proposals_approved: i64,
    pub proposals_rejected: i64,

    pub total_allocated: f64,
    pub total_disbursed: f64,

    pub allocation_requests_total: i64,
    pub allocation_requests_pending: i64,
    pub explanation_requests_total: i64,
    pub explanation_requests_pending: i64,

    pub data_sources_active: i64,
}

impl Store {
    pub async fn dashboard_snapshot(&self) -> Result<DashboardSnapshot> {
        let conn = self.lock().await;
        let count = |sql: &str| -> rusqlite::Result<i64> { conn.query_row(sql, [], |r| r.get(0)) };
        let sum = |sql: &str| -> rusqlite::Result<f64> {
            conn.query_row(sql, [], |r| r.get::<_, Option<f64>>(0))
                .map(|v| v.unwrap_or(0.0))
        };

        Ok(DashboardSnapshot {
            total_regions: count("SELECT COUNT(*) FROM regions")?,
            regions_funded: count("SELECT COUNT(*) FROM regions WHERE current_allocation > 0")?,
            average_priority_score: sum("SELECT AVG(priority_score) FROM regions")?,

            total_proposals: count("SELECT COUNT(*) FROM proposals")?,
            proposals_in_review: count(
                "SELECT COUNT(*) FROM proposals WHERE status = 'in_review'",
            )?,
            proposals_voting: count("SELECT COUNT(*) FROM proposals WHERE status = 'voting'")?,
            proposals_approved: count("SELECT COUNT(*) FROM proposals WHERE status = 'approved'")?,
            proposals_rejected: count("SELECT COUNT(*) FROM proposals WHERE status = 'rejected'")?,

            total_allocated: sum("SELECT SUM(amount) FROM allocations")?,
            total_disbursed: sum(
                "SELECT SUM(amount) FROM allocations WHERE status IN ('disbursed', 'completed')",
            )?,

            allocation_requests_total: count("SELECT COUNT(*) FROM allocation_requests")?,
            allocation_requests_pending: count(
                "SELECT COUNT(*) FROM allocation_requests WHERE status IN ('pending', 'processing')",
            )?,
            explanation_requests_total: count("SELECT COUNT(*) FROM explanation_requests")?,
            explanation_requests_pending: count(
                "SELECT COUNT(*) FROM explanation_requests WHERE status IN ('pending', 'processing')",
            )?,

            data_sources_active: count("SELECT COUNT(*) FROM data_sources WHERE is_active = 1")?,
        })
    }
}
