//! Run artifacts: the DDL script and the exported rows.
//!
//! An [`ArtifactSink`] receives each artifact as soon as the phase that
//! produced it finishes, so a later phase failing does not lose it.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use crate::core::TableRecordSet;
use crate::error::Result;
use crate::transfer::render_sql_scripts;

pub const SCHEMA_FILE: &str = "schema.sql";
pub const DATA_FILE: &str = "data.json";
pub const SQL_DIR: &str = "sql";

/// Destination for the artifacts of a run.
///
/// # Example
///
/// ```rust,ignore
/// let sink: Arc<dyn ArtifactSink> = Arc::new(DirectorySink::new("migration-output"));
/// let report = Migrator::new(config)?
///     .with_artifact_sink(sink)
///     .migrate(&options, cancel)
///     .await?;
/// ```
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    /// Called once the schema phase has produced its script.
    async fn schema_exported(&self, ddl: &str) -> Result<()>;

    /// Called once every table has been read, before anything is imported.
    async fn data_exported(&self, records: &TableRecordSet) -> Result<()>;
}

/// Writes `schema.sql`, `data.json` and optionally `sql/<table>.sql` into a directory.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
    sql_scripts: bool,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            sql_scripts: false,
        }
    }

    /// Also write one SQL script per table next to `data.json`.
    pub fn with_sql_scripts(mut self, enabled: bool) -> Self {
        self.sql_scripts = enabled;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl ArtifactSink for DirectorySink {
    async fn schema_exported(&self, ddl: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(SCHEMA_FILE);
        tokio::fs::write(&path, ddl).await?;
        info!("Wrote {}", path.display());
        Ok(())
    }

    async fn data_exported(&self, records: &TableRecordSet) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(DATA_FILE);
        tokio::fs::write(&path, serde_json::to_string_pretty(records)?).await?;
        info!("Wrote {}", path.display());

        if self.sql_scripts {
            let sql_dir = self.dir.join(SQL_DIR);
            tokio::fs::create_dir_all(&sql_dir).await?;
            for (table, script) in render_sql_scripts(records)? {
                tokio::fs::write(sql_dir.join(format!("{}.sql", table)), script).await?;
            }
            info!("Wrote per-table SQL to {}", sql_dir.display());
        }
        Ok(())
    }
}
