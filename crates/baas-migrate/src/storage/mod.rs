//! Object storage migration.
//!
//! Buckets are recreated on the target with their settings, then each bucket
//! is walked depth-first from its root. Listing entries without an `id` are
//! folders; the rest are files. Every file is downloaded and uploaded with
//! overwrite enabled: existing objects are replaced, never skipped. Whether
//! the object already existed only changes the log line.

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::core::value::{join_path, split_path};
use crate::core::{ListOptions, StorageClient, StorageEntry};
use crate::error::{MigrateError, Result};

/// Outcome of a storage migration.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StorageReport {
    /// True when the run was skipped for lack of privileged keys.
    pub skipped: bool,
    /// Buckets processed.
    pub buckets: Vec<String>,
    /// Buckets newly created on the target.
    pub buckets_created: usize,
    /// Files that did not exist on the target.
    pub migrated: usize,
    /// Files that replaced an existing target object.
    pub updated: usize,
    pub bytes_copied: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_buckets: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_folders: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_files: Vec<String>,
}

impl StorageReport {
    pub fn skipped() -> Self {
        Self {
            skipped: true,
            ..Default::default()
        }
    }

    pub fn files_copied(&self) -> usize {
        self.migrated + self.updated
    }

    pub fn failures(&self) -> usize {
        self.failed_buckets.len() + self.failed_folders.len() + self.failed_files.len()
    }
}

/// Totals over a project's object storage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StorageStats {
    pub buckets: usize,
    pub files: usize,
    pub total_bytes: u64,
}

/// Copies buckets and objects between two projects.
pub struct StorageMigrator {
    source: Arc<dyn StorageClient>,
    target: Arc<dyn StorageClient>,
    cancel: CancellationToken,
}

impl StorageMigrator {
    pub fn new(source: Arc<dyn StorageClient>, target: Arc<dyn StorageClient>) -> Self {
        Self {
            source,
            target,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop between files once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Copy every bucket, or only `only_bucket` when given.
    ///
    /// Failing to list the source buckets is fatal. Failures for a single
    /// bucket, folder or file are logged and recorded in the report.
    pub async fn migrate_storage(&self, only_bucket: Option<&str>) -> Result<StorageReport> {
        let mut buckets = self.source.list_buckets().await?;
        if let Some(name) = only_bucket {
            buckets.retain(|b| b.name == name);
            if buckets.is_empty() {
                return Err(MigrateError::storage(
                    name,
                    "bucket not found on the source project",
                ));
            }
        }

        let mut report = StorageReport::default();
        info!("Migrating {} storage buckets", buckets.len());

        for bucket in &buckets {
            if self.cancel.is_cancelled() {
                return Err(MigrateError::Cancelled);
            }

            match self.target.create_bucket(&bucket.name, &bucket.options()).await {
                Ok(()) => {
                    info!("Created bucket {}", bucket.name);
                    report.buckets_created += 1;
                }
                Err(e) if e.is_conflict() => debug!("Bucket {} already exists", bucket.name),
                Err(e) => {
                    error!("Cannot create bucket {}: {}", bucket.name, e);
                    report.failed_buckets.push(bucket.name.clone());
                    continue;
                }
            }

            report.buckets.push(bucket.name.clone());
            self.copy_tree(&bucket.name, String::new(), &mut report).await?;
        }

        info!(
            "Storage migration finished: {} migrated, {} updated, {} bytes, {} failures",
            report.migrated,
            report.updated,
            report.bytes_copied,
            report.failures()
        );
        Ok(report)
    }

    /// Depth-first copy of everything under `prefix`.
    fn copy_tree<'a>(
        &'a self,
        bucket: &'a str,
        prefix: String,
        report: &'a mut StorageReport,
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            let entries = match self.source.list_all(bucket, &prefix).await {
                Ok(entries) => entries,
                Err(e) => {
                    error!("Cannot list {}/{}: {}", bucket, prefix, e);
                    report.failed_folders.push(join_path(bucket, &prefix));
                    return Ok(());
                }
            };

            for entry in entries {
                if self.cancel.is_cancelled() {
                    return Err(MigrateError::Cancelled);
                }
                let path = join_path(&prefix, &entry.name);
                if entry.is_folder() {
                    self.copy_tree(bucket, path, report).await?;
                } else {
                    self.copy_file(bucket, &path, &entry, report).await;
                }
            }
            Ok(())
        }
        .boxed()
    }

    async fn copy_file(
        &self,
        bucket: &str,
        path: &str,
        entry: &StorageEntry,
        report: &mut StorageReport,
    ) {
        let data = match self.source.download(bucket, path).await {
            Ok(data) => data,
            Err(e) => {
                error!("Cannot download {}/{}: {}", bucket, path, e);
                report.failed_files.push(join_path(bucket, path));
                return;
            }
        };

        let exists = self.exists_on_target(bucket, path).await;
        let size = data.len() as u64;
        let content_type = entry.metadata.as_ref().and_then(|m| m.mimetype.as_deref());

        match self
            .target
            .upload(bucket, path, data, content_type, true)
            .await
        {
            Ok(()) => {
                if exists {
                    info!("Updated {}/{}", bucket, path);
                    report.updated += 1;
                } else {
                    info!("Migrated {}/{}", bucket, path);
                    report.migrated += 1;
                }
                report.bytes_copied += size;
            }
            Err(e) => {
                error!("Cannot upload {}/{}: {}", bucket, path, e);
                report.failed_files.push(join_path(bucket, path));
            }
        }
    }

    /// Whether the target already holds `path`. Listing errors count as absent.
    async fn exists_on_target(&self, bucket: &str, path: &str) -> bool {
        let (parent, name) = split_path(path);
        let options = ListOptions {
            search: Some(name.to_string()),
            ..Default::default()
        };
        match self.target.list(bucket, parent, &options).await {
            Ok(entries) => entries.iter().any(|e| e.name == name && !e.is_folder()),
            Err(e) => {
                debug!("Existence check for {}/{} failed: {}", bucket, path, e);
                false
            }
        }
    }
}

/// Count buckets, files and bytes with a read-only walk.
pub async fn get_storage_stats(client: &dyn StorageClient) -> Result<StorageStats> {
    let buckets = client.list_buckets().await?;
    let mut stats = StorageStats {
        buckets: buckets.len(),
        ..Default::default()
    };
    for bucket in &buckets {
        count_tree(client, &bucket.name, String::new(), &mut stats).await;
    }
    Ok(stats)
}

fn count_tree<'a>(
    client: &'a dyn StorageClient,
    bucket: &'a str,
    prefix: String,
    stats: &'a mut StorageStats,
) -> BoxFuture<'a, ()> {
    async move {
        let entries = match client.list_all(bucket, &prefix).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Cannot list {}/{}, not counted: {}", bucket, prefix, e);
                return;
            }
        };
        for entry in entries {
            if entry.is_folder() {
                count_tree(client, bucket, join_path(&prefix, &entry.name), stats).await;
            } else {
                stats.files += 1;
                stats.total_bytes += entry.size();
            }
        }
    }
    .boxed()
}
