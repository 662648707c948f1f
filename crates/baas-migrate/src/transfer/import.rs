//! Data import into the target project.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::IMPORT_ORDER;
use crate::config::MigrationOptions;
use crate::core::{QueryClient, Record, TableRecordSet};
use crate::error::{MigrateError, Result};

/// A batch the target rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedBatch {
    /// Index of the first row in the batch.
    pub start: usize,
    /// Index of the last row in the batch (inclusive).
    pub end: usize,
    pub error: String,
}

/// Import outcome for one table.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TableImportSummary {
    pub table: String,
    pub rows_written: u64,
    pub rows_failed: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_batches: Vec<FailedBatch>,
}

/// Import outcome for a whole record set.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub tables: Vec<TableImportSummary>,
    /// Tables with no rows to import.
    pub skipped: Vec<String>,
}

impl ImportReport {
    pub fn rows_written(&self) -> u64 {
        self.tables.iter().map(|t| t.rows_written).sum()
    }

    pub fn rows_failed(&self) -> u64 {
        self.tables.iter().map(|t| t.rows_failed).sum()
    }

    pub fn failed_batches(&self) -> usize {
        self.tables.iter().map(|t| t.failed_batches.len()).sum()
    }

    /// True when every batch was accepted.
    pub fn is_clean(&self) -> bool {
        self.failed_batches() == 0
    }

    pub fn table(&self, name: &str) -> Option<&TableImportSummary> {
        self.tables.iter().find(|t| t.table == name)
    }
}

/// Writes exported records into a project in dependency order.
pub struct DataImporter {
    target: Arc<dyn QueryClient>,
    cancel: CancellationToken,
}

impl DataImporter {
    pub fn new(target: Arc<dyn QueryClient>) -> Self {
        Self {
            target,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop between batches once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Import every table of `records`, parents before children.
    ///
    /// Batches run one after another. A rejected batch is logged with its row
    /// range and the import moves on to the next batch.
    pub async fn import_data(
        &self,
        records: &TableRecordSet,
        options: &MigrationOptions,
    ) -> Result<ImportReport> {
        let batch_size = options.effective_batch_size();
        let mut report = ImportReport::default();

        for table in records.keys() {
            if !IMPORT_ORDER.contains(&table.as_str()) {
                warn!("{}: not a known table, skipping", table);
                report.skipped.push(table.clone());
            }
        }

        for &table in IMPORT_ORDER {
            if options.skips(table) {
                debug!("{}: skipped by options", table);
                continue;
            }
            let rows = match records.get(table) {
                Some(rows) if !rows.is_empty() => rows,
                _ => {
                    info!("{}: no records to import", table);
                    report.skipped.push(table.to_string());
                    continue;
                }
            };

            let summary = self.import_table(table, rows, batch_size).await?;
            report.tables.push(summary);
        }

        info!(
            "Imported {} rows ({} failed in {} batches)",
            report.rows_written(),
            report.rows_failed(),
            report.failed_batches()
        );
        Ok(report)
    }

    async fn import_table(
        &self,
        table: &str,
        rows: &[Record],
        batch_size: usize,
    ) -> Result<TableImportSummary> {
        let start = Instant::now();
        let mut summary = TableImportSummary {
            table: table.to_string(),
            ..Default::default()
        };

        info!("{}: importing {} rows", table, rows.len());

        for (idx, batch) in rows.chunks(batch_size).enumerate() {
            if self.cancel.is_cancelled() {
                return Err(MigrateError::Cancelled);
            }

            let first = idx * batch_size;
            let last = first + batch.len() - 1;
            // Rows carrying a primary key are merged so a repeated import is harmless.
            let upsert = batch.iter().any(|r| r.contains_key("id"));

            match self.target.insert(table, batch, upsert).await {
                Ok(written) => {
                    debug!("{}: rows {}-{} written", table, first, last);
                    summary.rows_written += written;
                }
                Err(e) => {
                    error!("{}: batch rows {}-{} failed: {}", table, first, last, e);
                    summary.rows_failed += batch.len() as u64;
                    summary.failed_batches.push(FailedBatch {
                        start: first,
                        end: last,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            "{}: {} rows written, {} failed in {:?}",
            table,
            summary.rows_written,
            summary.rows_failed,
            start.elapsed()
        );
        Ok(summary)
    }
}
