//! Run persistence port

use async_trait::async_trait;
use concilium_domain::{RunRecord, RunSummary};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during repository operations
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Run not found: {0}")]
    NotFound(String),
}

/// Persistent store of finalized run records.
///
/// Records are immutable once saved; `load_all` compacts verbose event
/// lists on read so hundreds of runs stay cheap to scan.
#[async_trait]
pub trait RunRepository: Send + Sync {
    /// Persist a record, returning where it was written.
    async fn save(&self, record: &RunRecord) -> Result<PathBuf, RepositoryError>;

    /// Load one record by id.
    async fn load(&self, id: &str) -> Result<RunRecord, RepositoryError>;

    /// Summaries of all stored runs, newest first.
    async fn list(&self) -> Result<Vec<RunSummary>, RepositoryError>;

    /// All stored runs with compacted events, newest first.
    async fn load_all(&self) -> Result<Vec<RunRecord>, RepositoryError>;
}
