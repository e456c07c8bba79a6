// Gateway client
//
// The API server's view of the gateway: multipart forwarding for
// submissions, JSON passthrough for status/health/metrics. Connect failures
// are distinguished from upstream error statuses so the caller can decide
// between falling back locally and reporting a bad gateway.

use reqwest::multipart::{Form, Part};
use serde_json::Value;
use std::time::Duration;

use crate::error::{Error, Result};

/// One uploaded file being forwarded as-is.
#[derive(Debug, Clone)]
pub struct ForwardFile {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

#[derive(Clone)]
pub struct GatewayClient {
    http: reqwest::Client,
    base_url: String,
}

impl GatewayClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Provider(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn forward_allocation(
        &self,
        fields: Vec<(String, String)>,
        files: Vec<ForwardFile>,
    ) -> Result<Value> {
        self.post_multipart("/allocation/request", fields, files)
            .await
    }

    pub async fn forward_explanation(
        &self,
        fields: Vec<(String, String)>,
        files: Vec<ForwardFile>,
    ) -> Result<Value> {
        self.post_multipart("/explanation/request", fields, files)
            .await
    }

    pub async fn status(&self, request_id: &str) -> Result<Value> {
        self.get_json(&format!("/status/{request_id}")).await
    }

    pub async fn health(&self) -> Result<Value> {
        self.get_json("/health").await
    }

    pub async fn metrics(&self) -> Result<Value> {
        self.get_json("/metrics").await
    }

    async fn post_multipart(
        &self,
        path: &str,
        fields: Vec<(String, String)>,
        files: Vec<ForwardFile>,
    ) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);

        let mut form = Form::new();
        for (name, value) in fields {
            form = form.text(name, value);
        }
        for file in files {
            let part = Part::bytes(file.data)
                .file_name(file.filename)
                .mime_str(&file.content_type)
                .map_err(|e| Error::validation(format!("bad content type: {e}")))?;
            form = form.part("files", part);
        }

        let response = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|source| Error::GatewayUnreachable {
                url: self.base_url.clone(),
                source,
            })?;

        Self::json_or_upstream(response).await
    }

    async fn get_json(&self, path: &str) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        let response =
            self.http
                .get(&url)
                .send()
                .await
                .map_err(|source| Error::GatewayUnreachable {
                    url: self.base_url.clone(),
                    source,
                })?;

        Self::json_or_upstream(response).await
    }

    async fn json_or_upstream(response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Upstream {
                status: status.as_u16(),
                body,
            });
        }
        let value = response
            .json()
            .await
            .map_err(|e| Error::Provider(format!("invalid gateway response: {e}")))?;
        Ok(value)
    }
}
