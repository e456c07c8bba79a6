// Pending-request table
//
// In-memory status store behind the gateway's /status polling endpoint.
// Entries go in as processing when a job is dispatched, flip to completed
// when the provider answers, and are swept after a TTL.

use chrono::Utc;
use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct PendingEntry {
    status: String,
    data: Option<Value>,
    inserted: Instant,
    completed_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusView {
    pub request_id: String,
    pub status: String,
    pub data: Option<Value>,
    pub timestamp: String,
}

pub struct PendingRequests {
    map: DashMap<String, PendingEntry>,
    ttl: Duration,
}

impl PendingRequests {
    pub fn new(ttl: Duration) -> Self {
        Self {
            map: DashMap::new(),
            ttl,
        }
    }

    pub fn insert_processing(&self, request_id: &str) {
        self.map.insert(
            request_id.to_string(),
            PendingEntry {
                status: "processing".to_string(),
                data: None,
                inserted: Instant::now(),
                completed_at: None,
            },
        );
    }

    /// Attach the provider result. Completing an unknown id still records it
    /// so a slow insert_processing never loses a result.
    pub fn complete(&self, request_id: &str, data: Value) {
        self.map.insert(
            request_id.to_string(),
            PendingEntry {
                status: "completed".to_string(),
                data: Some(data),
                inserted: Instant::now(),
                completed_at: Some(Utc::now().to_rfc3339()),
            },
        );
    }

    pub fn get(&self, request_id: &str) -> Option<StatusView> {
        let entry = self.map.get(request_id)?;
        if entry.inserted.elapsed() >= self.ttl {
            drop(entry);
            self.map.remove(request_id);
            return None;
        }
        Some(StatusView {
            request_id: request_id.to_string(),
            status: entry.status.clone(),
            // Results are only exposed once the request completes
            data: if entry.status == "completed" {
                entry.data.clone()
            } else {
                None
            },
            timestamp: entry
                .completed_at
                .clone()
                .unwrap_or_else(|| Utc::now().to_rfc3339()),
        })
    }

    pub fn purge_expired(&self) {
        let ttl = self.ttl;
        self.map.retain(|_, entry| entry.inserted.elapsed() < ttl);
    }

    /// (processing, completed) counts.
    pub fn counts(&self) -> (usize, usize) {
        let mut processing = 0;
        let mut completed = 0;
        for entry in self.map.iter() {
            if entry.status == "completed" {
                completed += 1;
            } else {
                processing += 1;
            }
        }
        (processing, completed)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
