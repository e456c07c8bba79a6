// Domain store
//
// SQLite persistence for regions, allocations, proposals, analysis requests,
// and data sources. WAL mode for concurrency; the schema is loaded from
// schema.sql at open. Entity methods live in the sibling files, one per
// aggregate.

mod allocation;
mod dashboard;
mod datasource;
mod proposal;
mod region;
mod request;

pub use allocation::{Allocation, NewAllocation};
pub use dashboard::DashboardSnapshot;
pub use datasource::{DataSource, NewDataSource};
pub use proposal::{NewProposal, Proposal, Vote, VoteChoice};
pub use region::{NewRegion, Region};
pub use request::{
    AllocationRequestRecord, AllocationSubmission, ExplanationRequestRecord,
    ExplanationSubmission, ReviewQueue,
};

use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::{Error, Result};

/// Shared handle to the domain store. Clone freely; all clones use the same
/// connection behind a tokio mutex.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open (or create) the store at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        Self::initialize(conn, Some(path))
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::initialize(conn, None)
    }

    fn initialize(conn: Connection, path: Option<&Path>) -> Result<Self> {
        // WAL only applies to file-backed databases
        if path.is_some() {
            conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        }
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        let schema = include_str!("schema.sql");
        conn.execute_batch(schema)?;

        if let Some(p) = path {
            tracing::info!(path = %p.display(), "Domain store initialized");
        }

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub(crate) async fn lock(&self) -> tokio::sync::MutexGuard<'_, Connection> {
        self.conn.lock().await
    }

    /// Quick liveness probe for health checks.
    pub async fn ping(&self) -> Result<()> {
        let conn = self.lock().await;
        conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }
}

/// Map unique/foreign-key violations to a validation error with a readable
/// message; everything else stays a storage error.
pub(crate) fn constraint_to_validation(err: rusqlite::Error, message: &str) -> Error {
    match &err {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Error::validation(message.to_string())
        }
        _ => Error::Storage(err),
    }
}

pub(crate) fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
