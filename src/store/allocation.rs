// Allocation rows
//
// Lifecycle: pending -> approved -> disbursed -> completed, with rejected as
// a terminal branch from pending. Approving copies the amount onto the
// region's current_allocation.

use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{constraint_to_validation, now_rfc3339, Store};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize)]
pub struct Allocation {
    pub id: i64,
    pub allocation_id: String,
    pub region_id: String,
    pub region_name: String,
    pub amount: f64,
    pub fiscal_year: i64,
    pub quarter: i64,
    pub priority_score_snapshot: f64,
    pub status: String,
    pub explanation: String,
    pub explanation_factors: serde_json::Value,
    pub created_at: String,
    pub approved_at: Option<String>,
    pub disbursed_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAllocation {
    pub region_id: String,
    pub amount: f64,
    pub fiscal_year: i64,
    pub quarter: i64,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub explanation_factors: serde_json::Value,
}

impl NewAllocation {
    pub fn validate(&self) -> Result<()> {
        if self.region_id.trim().is_empty() {
            return Err(Error::validation("region_id is required"));
        }
        if self.amount <= 0.0 || !self.amount.is_finite() {
            return Err(Error::validation("amount must be positive"));
        }
        if !(1..=4).contains(&self.quarter) {
            return Err(Error::validation(format!(
                "quarter must be between 1 and 4, got {}",
                self.quarter
            )));
        }
        Ok(())
    }
}

const ALLOCATION_COLUMNS: &str = "a.id, a.allocation_id, r.region_id, r.name, a.amount, \
     a.fiscal_year, a.quarter, a.priority_score_snapshot, a.status, a.explanation, \
     a.explanation_factors, a.created_at, a.approved_at, a.disbursed_at";

fn allocation_from_row(row: &Row) -> rusqlite::Result<Allocation> {
    let factors: String = row.get(10)?;
    Ok(Allocation {
        id: row.get(0)?,
        allocation_id: row.get(1)?,
        region_id: row.get(2)?,
        region_name: row.get(3)?,
        amount: row.get(4)?,
        fiscal_year: row.get(5)?,
        quarter: row.get(6)?,
        priority_score_snapshot: row.get(7)?,
        status: row.get(8)?,
        explanation: row.get(9)?,
        explanation_factors: serde_json::from_str(&factors).unwrap_or_default(),
        created_at: row.get(11)?,
        approved_at: row.get(12)?,
        disbursed_at: row.get(13)?,
    })
}

impl Store {
    pub async fn create_allocation(&self, new: &NewAllocation) -> Result<Allocation> {
        new.validate()?;
        let region = self.get_region(&new.region_id).await?;

        let allocation_id = Uuid::new_v4().to_string();
        let now = now_rfc3339();
        let factors = serde_json::to_string(&new.explanation_factors)?;

        {
            let conn = self.lock().await;
            conn.execute(
                "INSERT INTO allocations (allocation_id, region_id, amount, fiscal_year, \
                 quarter, priority_score_snapshot, status, explanation, explanation_factors, \
                 created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'pending', ?7, ?8, ?9)",
                params![
                    allocation_id,
                    region.id,
                    new.amount,
                    new.fiscal_year,
                    new.quarter,
                    region.priority_score,
                    new.explanation,
                    factors,
                    now,
                ],
            )
            .map_err(|e| {
                constraint_to_validation(
                    e,
                    &format!(
                        "an allocation for {} in Q{}/{} already exists",
                        new.region_id, new.quarter, new.fiscal_year
                    ),
                )
            })?;
        }

        self.get_allocation(&allocation_id).await
    }

    pub async fn list_allocations(&self) -> Result<Vec<Allocation>> {
        let conn = self.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ALLOCATION_COLUMNS} FROM allocations a \
             JOIN regions r ON r.id = a.region_id ORDER BY a.created_at DESC"
        ))?;
        let allocations = stmt
            .query_map([], allocation_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(allocations)
    }

    pub async fn get_allocation(&self, allocation_id: &str) -> Result<Allocation> {
        let conn = self.lock().await;
        conn.query_row(
            &format!(
                "SELECT {ALLOCATION_COLUMNS} FROM allocations a \
                 JOIN regions r ON r.id = a.region_id WHERE a.allocation_id = ?1"
            ),
            params![allocation_id],
            allocation_from_row,
        )
        .optional()?
        .ok_or_else(|| Error::not_found("allocation", allocation_id))
    }

    /// pending -> approved; mirrors the amount onto the region.
    pub async fn approve_allocation(&self, allocation_id: &str) -> Result<Allocation> {
        let allocation = self.get_allocation(allocation_id).await?;
        guard_transition(&allocation.status, "pending", "approved")?;

        let now = now_rfc3339();
        {
            let conn = self.lock().await;
            conn.execute(
                "UPDATE allocations SET status = 'approved', approved_at = ?1 \
                 WHERE allocation_id = ?2",
                params![now, allocation_id],
            )?;
            conn.execute(
                "UPDATE regions SET current_allocation = ?1, updated_at = ?2 \
                 WHERE region_id = ?3",
                params![allocation.amount, now, allocation.region_id],
            )?;
        }
        self.get_allocation(allocation_id).await
    }

    /// approved -> disbursed.
    pub async fn disburse_allocation(&self, allocation_id: &str) -> Result<Allocation> {
        let allocation = self.get_allocation(allocation_id).await?;
        guard_transition(&allocation.status, "approved", "disbursed")?;

        let now = now_rfc3339();
        {
            let conn = self.lock().await;
            conn.execute(
                "UPDATE allocations SET status = 'disbursed', disbursed_at = ?1 \
                 WHERE allocation_id = ?2",
                params![now, allocation_id],
            )?;
        }
        self.get_allocation(allocation_id).await
    }

    /// disbursed -> completed.
    pub async fn complete_allocation(&self, allocation_id: &str) -> Result<Allocation> {
        let allocation = self.get_allocation(allocation_id).await?;
        guard_transition(&allocation.status, "disbursed", "completed")?;

        {
            let conn = self.lock().await;
            conn.execute(
                "UPDATE allocations SET status = 'completed' WHERE allocation_id = ?1",
                params![allocation_id],
            )?;
        }
        self.get_allocation(allocation_id).await
    }

    /// pending -> rejected.
    pub async fn reject_allocation(&self, allocation_id: &str) -> Result<Allocation> {
        let allocation = self.get_allocation(allocation_id).await?;
        guard_transition(&allocation.status, "pending", "rejected")?;

        {
            let conn = self.lock().await;
            conn.execute(
                "UPDATE allocations SET status = 'rejected' WHERE allocation_id = ?1",
                params![allocation_id],
            )?;
        }
        self.get_allocation(allocation_id).await
    }
}

pub(super) fn guard_transition(current: &str, expected: &str, target: &str) -> Result<()> {
    if current != expected {
        return Err(Error::InvalidTransition {
            from: current.to_string(),
            to: target.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_allocation_validation() {
        let mut new = NewAllocation {
            region_id: "R-1".to_string(),
            amount: 1000.0,
            fiscal_year: 2026,
            quarter: 2,
            explanation: String::new(),
            explanation_factors: serde_json::Value::Null,
        };
        assert!(new.validate().is_ok());

        new.quarter = 5;
        assert!(new.validate().is_err());

        new.quarter = 1;
        new.amount = 0.0;
        assert!(new.validate().is_err());
    }

    #[test]
    fn test_guard_transition() {
        assert!(guard_transition("pending", "pending", "approved").is_ok());
        let err = guard_transition("disbursed", "pending", "approved").unwrap_err();
        assert!(err.to_string().contains("disbursed -> approved"));
    }
}
