// Metrics logger
//
// Appends request metrics to a daily JSONL file and aggregates summaries
// over it. File-per-day keeps rotation trivial.

use anyhow::{Context, Result};
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use super::types::RequestMetric;

pub struct MetricsLogger {
    metrics_dir: PathBuf,
}

impl MetricsLogger {
    pub fn new(metrics_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&metrics_dir).with_context(|| {
            format!(
                "Failed to create metrics directory: {}",
                metrics_dir.display()
            )
        })?;

        Ok(Self { metrics_dir })
    }

    /// Log a request metric to today's JSONL file
    pub fn log(&self, metric: &RequestMetric) -> Result<()> {
        let today = Utc::now().format("%Y-%m-%d").to_string();
        let log_file = self.metrics_dir.join(format!("{}.jsonl", today));

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .with_context(|| format!("Failed to open metrics log: {}", log_file.display()))?;

        let json = serde_json::to_string(metric).context("Failed to serialize metric")?;
        writeln!(file, "{}", json).context("Failed to write metric to log")?;

        Ok(())
    }

    /// Hash a query for privacy (SHA256)
    pub fn hash_query(query: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(query.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Read metrics for a specific date (YYYY-MM-DD)
    pub fn read_metrics(&self, date: &str) -> Result<Vec<RequestMetric>> {
        let log_file = self.metrics_dir.join(format!("{}.jsonl", date));

        if !log_file.exists() {
            return Ok(Vec::new());
        }

        let contents = fs::read_to_string(&log_file)
            .with_context(|| format!("Failed to read metrics log: {}", log_file.display()))?;

        let metrics: Vec<RequestMetric> = contents
            .lines()
            .filter(|line| !line.is_empty())
            .map(serde_json::from_str)
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to parse metrics")?;

        Ok(metrics)
    }

    /// Get summary statistics for today
    pub fn today_summary(&self) -> Result<MetricsSummary> {
        let today = Utc::now().format("%Y-%m-%d").to_string();
        let metrics = self.read_metrics(&today)?;

        let total = metrics.len();
        let engine_count = metrics.iter().filter(|m| m.decision == "engine").count();
        let gateway_count = metrics.iter().filter(|m| m.decision == "gateway").count();
        let fallback_count = metrics
            .iter()
            .filter(|m| m.fallback_reason.is_some())
            .count();

        let avg_time = |decision: &str, count: usize| {
            if count == 0 {
                0
            } else {
                metrics
                    .iter()
                    .filter(|m| m.decision == decision)
                    .map(|m| m.response_time_ms)
                    .sum::<u64>()
                    / count as u64
            }
        };

        Ok(MetricsSummary {
            total,
            engine_count,
            gateway_count,
            fallback_count,
            avg_engine_time_ms: avg_time("engine", engine_count),
            avg_gateway_time_ms: avg_time("gateway", gateway_count),
        })
    }
}

#[derive(Debug, serde::Serialize)]
pub struct MetricsSummary {
    pub total: usize,
    pub engine_count: usize,
    pub gateway_count: usize,
    pub fallback_count: usize,
    pub avg_engine_time_ms: u64,
    pub avg_gateway_time_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_query() {
        let hash1 = MetricsLogger::hash_query("Hello");
        let hash2 = MetricsLogger::hash_query("Hello");
        let hash3 = MetricsLogger::hash_query("World");

        assert_eq!(hash1, hash2);
        assert_ne!(hash1, hash3);
        assert_eq!(hash1.len(), 64); // SHA256 produces 64 hex chars
    }

    #[test]
    fn test_log_and_summarize() {
        let dir = tempfile::tempdir().unwrap();
        let logger = MetricsLogger::new(dir.path().to_path_buf()).unwrap();

        logger
            .log(&RequestMetric::new(
                MetricsLogger::hash_query("q1"),
                "engine".to_string(),
                None,
                12,
            ))
            .unwrap();
        logger
            .log(&RequestMetric::new(
                MetricsLogger::hash_query("q2"),
                "gateway".to_string(),
                Some("gateway_unreachable".to_string()),
                80,
            ))
            .unwrap();

        let summary = logger.today_summary().unwrap();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.engine_count, 1);
        assert_eq!(summary.gateway_count, 1);
        assert_eq!(summary.fallback_count, 1);
        assert_eq!(summary.avg_engine_time_ms, 12);
    }

    #[test]
    fn test_read_missing_date_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let logger = MetricsLogger::new(dir.path().to_path_buf()).unwrap();
        assert!(logger.read_metrics("1999-01-01").unwrap().is_empty());
    }
}
