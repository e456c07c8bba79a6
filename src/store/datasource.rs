// Data source rows
//
// Knowledge base entries the provider and orchestrator draw on: uploaded
// documents and reference URLs, with usage tracking.

use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::{now_rfc3339, Store};
use crate::error::{Error, Result};

const SOURCE_TYPES: &[&str] = &["pdf", "url", "document"];
const CATEGORIES: &[&str] = &[
    "policy",
    "research",
    "data",
    "guideline",
    "report",
    "reference",
    "other",
];

#[derive(Debug, Clone, Serialize)]
pub struct DataSource {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub source_type: String,
    pub category: String,
    pub url: Option<String>,
    pub file_path: Option<String>,
    pub tags: String,
    pub summary: String,
    pub is_active: bool,
    pub usage_count: i64,
    pub last_used: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl DataSource {
    /// URL for links, stored path for uploads.
    pub fn source_location(&self) -> Option<&str> {
        self.url.as_deref().or(self.file_path.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewDataSource {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub source_type: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub summary: String,
}

fn default_category() -> String {
    "reference".to_string()
}

impl NewDataSource {
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::validation("title is required"));
        }
        if !SOURCE_TYPES.contains(&self.source_type.as_str()) {
            return Err(Error::validation(format!(
                "unknown source_type: {}",
                self.source_type
            )));
        }
        if !CATEGORIES.contains(&self.category.as_str()) {
            return Err(Error::validation(format!(
                "unknown category: {}",
                self.category
            )));
        }
        if self.source_type == "url" {
            match &self.url {
                Some(url) if url.starts_with("http://") || url.starts_with("https://") => {}
                _ => return Err(Error::validation("url sources need an http(s) url")),
            }
        }
        if self.url.is_none() && self.file_path.is_none() {
            return Err(Error::validation("either url or file_path is required"));
        }
        Ok(())
    }
}

const SOURCE_COLUMNS: &str = "id, title, description, source_type, category, url, file_path, \
     tags, summary, is_active, usage_count, last_used, created_at, updated_at";

fn source_from_row(row: &Row) -> rusqlite::Result<DataSource> {
    Ok(DataSource {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        source_type: row.get(3)?,
        category: row.get(4)?,
        url: row.get(5)?,
        file_path: row.get(6)?,
        tags: row.get(7)?,
        summary: row.get(8)?,
        is_active: row.get::<_, i64>(9)? != 0,
        usage_count: row.get(10)?,
        last_used: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

impl Store {
    pub async fn create_data_source(&self, new: &NewDataSource) -> Result<DataSource> {
        new.validate()?;
        let now = now_rfc3339();

        let id = {
            let conn = self.lock().await;
            conn.execute(
                "INSERT INTO data_sources (title, description, source_type, category, url, \
                 file_path, tags, summary, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
                params![
                    new.title,
                    new.description,
                    new.source_type,
                    new.category,
                    new.url,
                    new.file_path,
                    new.tags,
                    new.summary,
                    now,
                ],
            )?;
            conn.last_insert_rowid()
        };

        self.get_data_source(id).await
    }

    pub async fn list_data_sources(
        &self,
        active_only: bool,
        category: Option<&str>,
    ) -> Result<Vec<DataSource>> {
        let mut sql = format!("SELECT {SOURCE_COLUMNS} FROM data_sources WHERE 1=1");
        if active_only {
            sql.push_str(" AND is_active = 1");
        }
        let mut filters: Vec<String> = Vec::new();
        if let Some(c) = category {
            filters.push(c.to_string());
            sql.push_str(" AND category = ?1");
        }
        sql.push_str(" ORDER BY created_at DESC");

        let conn = self.lock().await;
        let mut stmt = conn.prepare(&sql)?;
        let sources = stmt
            .query_map(rusqlite::params_from_iter(filters), source_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(sources)
    }

    pub async fn get_data_source(&self, id: i64) -> Result<DataSource> {
        let conn = self.lock().await;
        conn.query_row(
            &format!("SELECT {SOURCE_COLUMNS} FROM data_sources WHERE id = ?1"),
            params![id],
            source_from_row,
        )
        .optional()?
        .ok_or_else(|| Error::not_found("data source", id.to_string()))
    }

    /// Bump usage count and stamp last_used.
    pub async fn record_source_usage(&self, id: i64) -> Result<DataSource> {
        let now = now_rfc3339();
        {
            let conn = self.lock().await;
            let changed = conn.execute(
                "UPDATE data_sources SET usage_count = usage_count + 1, last_used = ?1, \
                 updated_at = ?1 WHERE id = ?2",
                params![now, id],
            )?;
            if changed == 0 {
                return Err(Error::not_found("data source", id.to_string()));
            }
        }
        self.get_data_source(id).await
    }

    pub async fn delete_data_source(&self, id: i64) -> Result<()> {
        let conn = self.lock().await;
        let changed = conn.execute("DELETE FROM data_sources WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(Error::not_found("data source", id.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(source_type: &str, url: Option<&str>) -> NewDataSource {
        NewDataSource {
            title: "County budget 2026".to_string(),
            description: String::new(),
            source_type: source_type.to_string(),
            category: "policy".to_string(),
            url: url.map(|u| u.to_string()),
            file_path: None,
            tags: String::new(),
            summary: String::new(),
        }
    }

    #[test]
    fn test_url_source_requires_http_url() {
        assert!(source("url", Some("https://gov.example/budget")).validate().is_ok());
        assert!(source("url", Some("file:///etc/passwd")).validate().is_err());
        assert!(source("url", None).validate().is_err());
    }

    #[test]
    fn test_location_requires_one_of_url_or_path() {
        let mut s = source("pdf", None);
        assert!(s.validate().is_err());
        s.file_path = Some("/uploads/budget.pdf".to_string());
        assert!(s.validate().is_ok());
    }

    #[test]
    fn test_unknown_type_rejected() {
        assert!(source("spreadsheet", Some("https://x.example")).validate().is_err());
    }
}
