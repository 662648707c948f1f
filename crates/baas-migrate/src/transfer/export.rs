//! Data export from the source project.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::EXPORT_TABLES;
use crate::config::MigrationOptions;
use crate::core::{QueryClient, TableRecordSet};
use crate::dialect::build_table_script;
use crate::error::{MigrateError, Result};

/// Reads every known table from a project.
pub struct DataExporter {
    source: Arc<dyn QueryClient>,
    cancel: CancellationToken,
}

impl DataExporter {
    pub fn new(source: Arc<dyn QueryClient>) -> Self {
        Self {
            source,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop between tables once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Export tables minus the ones the options skip.
    pub fn tables(options: &MigrationOptions) -> Vec<&'static str> {
        EXPORT_TABLES
            .iter()
            .copied()
            .filter(|t| !options.skips(t))
            .collect()
    }

    /// Read every table into a record set.
    ///
    /// A table that cannot be read is logged and exported as an empty list;
    /// the remaining tables are still read.
    pub async fn export_data(&self, options: &MigrationOptions) -> Result<TableRecordSet> {
        let page_size = options.effective_batch_size();
        let mut records = TableRecordSet::new();
        let mut total = 0usize;
        let mut unreadable = 0usize;

        for table in Self::tables(options) {
            if self.cancel.is_cancelled() {
                return Err(MigrateError::Cancelled);
            }

            let start = Instant::now();
            match self.source.select_all(table, page_size).await {
                Ok(rows) => {
                    debug!(
                        "{}: exported {} rows in {:?}",
                        table,
                        rows.len(),
                        start.elapsed()
                    );
                    total += rows.len();
                    records.insert(table.to_string(), rows);
                }
                Err(e) => {
                    warn!("{}: export failed, continuing with no rows: {}", table, e);
                    unreadable += 1;
                    records.insert(table.to_string(), Vec::new());
                }
            }
        }

        info!(
            "Exported {} rows from {} tables ({} unreadable)",
            total,
            records.len(),
            unreadable
        );
        Ok(records)
    }

    /// Export every table and render each one as a SQL script.
    pub async fn export_data_as_sql(
        &self,
        options: &MigrationOptions,
    ) -> Result<BTreeMap<String, String>> {
        let records = self.export_data(options).await?;
        render_sql_scripts(&records)
    }
}

/// SQL script per table for an already exported record set.
pub fn render_sql_scripts(records: &TableRecordSet) -> Result<BTreeMap<String, String>> {
    records
        .iter()
        .map(|(table, rows)| Ok((table.clone(), build_table_script(table, rows)?)))
        .collect()
}
