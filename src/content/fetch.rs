// URL content extraction
//
// Fetches a referenced page and keeps the readable text: content-bearing
// elements only, scripts/styles/navigation skipped. Errors come back as
// marker content rather than failures so one dead link never sinks a
// submission.

use chrono::Utc;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};

use super::language::detect_language;
use super::summarize::summarize;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlContent {
    pub url: String,
    pub content: String,
    pub summary: String,
    pub language: String,
    pub fetched_at: String,
}

pub(super) async fn fetch_url_content(client: &reqwest::Client, url: &str) -> UrlContent {
    let fetched_at = Utc::now().to_rfc3339();

    let body = match client.get(url).send().await {
        Ok(response) => match response.error_for_status() {
            Ok(ok) => match ok.text().await {
                Ok(text) => text,
                Err(e) => return error_content(url, &fetched_at, &e.to_string()),
            },
            Err(e) => return error_content(url, &fetched_at, &e.to_string()),
        },
        Err(e) => return error_content(url, &fetched_at, &e.to_string()),
    };

    let content = html_to_text(&body);
    UrlContent {
        url: url.to_string(),
        language: detect_language(&content).to_string(),
        summary: summarize(&content, 0.3),
        content,
        fetched_at,
    }
}

fn error_content(url: &str, fetched_at: &str, error: &str) -> UrlContent {
    tracing::error!(url, error, "URL fetch failed");
    UrlContent {
        url: url.to_string(),
        content: format!("[Error fetching URL: {error}]"),
        summary: String::new(),
        language: "unknown".to_string(),
        fetched_at: fetched_at.to_string(),
    }
}

/// Visible text from content-bearing elements. Selecting paragraphs,
/// headings, and list/table cells skips script, style, nav, and footer
/// content without needing DOM surgery.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let selector = Selector::parse("p, h1, h2, h3, h4, h5, li, td, th, blockquote, article")
        .expect("static selector");

    let mut lines = Vec::new();
    for element in document.select(&selector) {
        let text = element
            .text()
            .collect::<Vec<_>>()
            .join(" ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        if !text.is_empty() {
            lines.push(text);
        }
    }
    lines.dedup();
    lines.join("\n")
}
