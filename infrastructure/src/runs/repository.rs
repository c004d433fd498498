//! File-backed run repository
//!
//! One compact-JSON file per run under `{data_dir}/runs/`. Writes from
//! concurrent runs target disjoint filenames; directory creation is safe
//! under races. Unreadable files are skipped silently on scans.

use async_trait::async_trait;
use concilium_application::ports::run_repository::{RepositoryError, RunRepository};
use concilium_domain::{RunRecord, RunSummary, compact_events};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Concurrent file loads per batch in `load_all`.
const LOAD_BATCH: usize = 20;

/// Stores each run as `{id}.json` in a `runs/` subdirectory.
pub struct FileRunRepository {
    runs_dir: PathBuf,
}

impl FileRunRepository {
    /// `data_dir` is the application data directory; runs live in its
    /// `runs/` subfolder.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            runs_dir: data_dir.into().join("runs"),
        }
    }

    /// Platform data directory for concilium (e.g. XDG data dir).
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("concilium")
    }

    pub fn runs_dir(&self) -> &Path {
        &self.runs_dir
    }

    fn path_for(&self, id: &str) -> Result<PathBuf, RepositoryError> {
        // Run ids are opaque but come back through user input on load.
        if id.is_empty() || id.contains(['/', '\\']) || id.contains("..") {
            return Err(RepositoryError::NotFound(id.to_string()));
        }
        Ok(self.runs_dir.join(format!("{id}.json")))
    }

    async fn json_paths(&self) -> Result<Vec<PathBuf>, RepositoryError> {
        let mut paths = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.runs_dir).await {
            Ok(entries) => entries,
            // No directory yet means no runs yet.
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(paths),
            Err(error) => return Err(error.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        Ok(paths)
    }

    async fn load_file(path: &Path) -> Option<RunRecord> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(error) => {
                debug!("Skipping unreadable run file {}: {}", path.display(), error);
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(record) => Some(record),
            Err(error) => {
                debug!("Skipping malformed run file {}: {}", path.display(), error);
                None
            }
        }
    }

    /// Collapse each agent's event list to its cumulative usage event.
    fn compact(mut record: RunRecord) -> RunRecord {
        for agent in &mut record.agents {
            agent.events = compact_events(&agent.events);
        }
        record
    }
}

#[async_trait]
impl RunRepository for FileRunRepository {
    async fn save(&self, record: &RunRecord) -> Result<PathBuf, RepositoryError> {
        tokio::fs::create_dir_all(&self.runs_dir).await?;
        let path = self.path_for(&record.id)?;
        let json = serde_json::to_string(record)?;
        tokio::fs::write(&path, json).await?;
        Ok(path)
    }

    async fn load(&self, id: &str) -> Result<RunRecord, RepositoryError> {
        let path = self.path_for(id)?;
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Err(RepositoryError::NotFound(id.to_string()));
            }
            Err(error) => return Err(error.into()),
        };
        Ok(serde_json::from_str(&content)?)
    }

    async fn list(&self) -> Result<Vec<RunSummary>, RepositoryError> {
        let paths = self.json_paths().await?;
        let mut summaries = Vec::new();
        for path in paths {
            if let Some(record) = Self::load_file(&path).await {
                summaries.push(record.summary());
            }
        }
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(summaries)
    }

    async fn load_all(&self) -> Result<Vec<RunRecord>, RepositoryError> {
        let paths = self.json_paths().await?;
        let mut records = Vec::new();
        for batch in paths.chunks(LOAD_BATCH) {
            let loaded =
                futures::future::join_all(batch.iter().map(|path| Self::load_file(path))).await;
            records.extend(loaded.into_iter().flatten().map(Self::compact));
        }
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }
}
