// Content pipeline
//
// Turns uploaded evidence (PDFs, text files, CSVs) and referenced URLs into
// summarized text the provider can reason over. Identical inputs are served
// from TTL caches instead of being reprocessed.

mod cache;
mod fetch;
mod language;
mod pdf;
mod summarize;

pub use cache::TtlCache;
pub use fetch::UrlContent;
pub use language::detect_language;
pub use pdf::extract_pdf_text;
pub use summarize::summarize;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;

use crate::config::constants::{CONTENT_CACHE_TTL_SECS, URL_CACHE_TTL_SECS};
use crate::error::{Error, Result};

/// Summarization keep-ratio applied to extracted text.
const SUMMARY_RATIO: f64 = 0.3;

/// One processed upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedFile {
    pub filename: String,
    pub content: String,
    pub summary: String,
    pub language: String,
    pub size: usize,
    pub processed_at: String,
}

/// Shared processor: extraction, summarization, and the two caches.
pub struct ContentProcessor {
    http: reqwest::Client,
    content_cache: TtlCache<ProcessedFile>,
    url_cache: TtlCache<UrlContent>,
    max_file_size: usize,
}

impl ContentProcessor {
    pub fn new(max_file_size: usize, request_timeout: Duration) -> Result<Arc<Self>> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| Error::Provider(format!("failed to build HTTP client: {e}")))?;

        Ok(Arc::new(Self {
            http,
            content_cache: TtlCache::new(100, Duration::from_secs(CONTENT_CACHE_TTL_SECS)),
            url_cache: TtlCache::new(50, Duration::from_secs(URL_CACHE_TTL_SECS)),
            max_file_size,
        }))
    }

    /// Cache key: first 16 hex chars of the content hash.
    pub fn cache_key(content: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content);
        let digest = format!("{:x}", hasher.finalize());
        digest[..16].to_string()
    }

    /// Extract, annotate, and summarize one uploaded file.
    pub fn process_file(&self, filename: &str, data: &[u8]) -> Result<ProcessedFile> {
        if data.len() > self.max_file_size {
            return Err(Error::validation(format!(
                "file {} exceeds the {} byte upload limit",
                filename, self.max_file_size
            )));
        }

        let key = Self::cache_key(data);
        if let Some(hit) = self.content_cache.get(&key) {
            tracing::debug!(filename, "content cache hit");
            return Ok(hit);
        }

        let ext = filename
            .rsplit('.')
            .next()
            .unwrap_or("")
            .to_ascii_lowercase();

        let content = match ext.as_str() {
            "pdf" => extract_pdf_text(data),
            "txt" | "md" => String::from_utf8_lossy(data).into_owned(),
            "csv" | "tsv" => csv_to_text(data, if ext == "tsv" { b'\t' } else { b',' }),
            "png" | "jpg" | "jpeg" | "bmp" | "tiff" => {
                // Image OCR is not supported; record the upload anyway so the
                // provider knows evidence was attached.
                format!("[Unsupported file type for text extraction: .{ext}]")
            }
            other => format!("[Unsupported file type: .{other}]"),
        };

        let processed = ProcessedFile {
            filename: filename.to_string(),
            language: detect_language(&content).to_string(),
            summary: summarize(&content, SUMMARY_RATIO),
            size: content.len(),
            content,
            processed_at: Utc::now().to_rfc3339(),
        };

        self.content_cache.insert(key, processed.clone());
        Ok(processed)
    }

    /// Fetch a referenced URL and extract its visible text.
    pub async fn process_url(&self, url: &str) -> UrlContent {
        if let Some(hit) = self.url_cache.get(url) {
            tracing::debug!(url, "url cache hit");
            return hit;
        }

        let result = fetch::fetch_url_content(&self.http, url).await;
        self.url_cache.insert(url.to_string(), result.clone());
        result
    }

    pub fn cache_sizes(&self) -> (usize, usize) {
        (self.content_cache.len(), self.url_cache.len())
    }

    pub fn clear_caches(&self) {
        self.content_cache.clear();
        self.url_cache.clear();
    }
}

/// Flatten CSV records into readable lines.
fn csv_to_text(data: &[u8], delimiter: u8) -> String {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .has_headers(false)
        .from_reader(data);

    let mut lines = Vec::new();
    for record in reader.records().flatten() {
        let fields: Vec<&str> = record.iter().collect();
        lines.push(fields.join(", "));
    }
    lines.join("\n")
}

/// Require http(s) URLs before anything is fetched.
pub fn validate_urls(urls: &[String]) -> Result<()> {
    for url in urls {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(Error::validation(format!("Invalid URL: {url}")));
        }
    }
    Ok(())
}
