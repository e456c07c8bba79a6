// Metrics data types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One logged request decision. Queries are stored hashed, never raw.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestMetric {
    pub timestamp: DateTime<Utc>,
    pub query_hash: String,
    /// Which path answered: "engine", "gateway", "knowledge", ...
    pub decision: String,
    /// Set when the gateway path fell back to the local engine
    pub fallback_reason: Option<String>,
    pub response_time_ms: u64,
}

impl RequestMetric {
    pub fn new(
        query_hash: String,
        decision: String,
        fallback_reason: Option<String>,
        response_time_ms: u64,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            query_hash,
            decision,
            fallback_reason,
            response_time_ms,
        }
    }
}
