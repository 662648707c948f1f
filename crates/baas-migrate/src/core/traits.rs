//! Capability traits the migration engine is written against.
//!
//! - [`QueryClient`]: table reads, batch inserts and stored-procedure calls
//! - [`StorageClient`]: bucket and object operations
//!
//! The engine never talks HTTP directly. `drivers::rest` implements both traits
//! against a live project, `drivers::memory` implements them in-process.

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;

use crate::error::Result;

use super::value::{Bucket, BucketOptions, ListOptions, Record, StorageEntry};

/// Equality filter on a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub column: String,
    pub value: String,
}

/// Options for a single select call.
#[derive(Debug, Clone, Default)]
pub struct SelectQuery {
    /// Equality filters, combined with AND.
    pub filters: Vec<Filter>,
    /// Column to order by (ascending).
    pub order_by: Option<String>,
    /// Maximum rows to return.
    pub limit: Option<usize>,
    /// Rows to skip.
    pub offset: usize,
}

impl SelectQuery {
    /// One page ordered by `id`.
    pub fn page(limit: usize, offset: usize) -> Self {
        Self {
            filters: Vec::new(),
            order_by: Some("id".to_string()),
            limit: Some(limit),
            offset,
        }
    }

    pub fn filter(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push(Filter {
            column: column.into(),
            value: value.into(),
        });
        self
    }
}

/// Typed remote query client for one project.
#[async_trait]
pub trait QueryClient: Send + Sync {
    /// Run one select against a table.
    async fn select(&self, table: &str, query: &SelectQuery) -> Result<Vec<Record>>;

    /// Read every row of a table, `page_size` rows per request.
    ///
    /// Pages are ordered by `id`; every known table has one.
    async fn select_all(&self, table: &str, page_size: usize) -> Result<Vec<Record>> {
        let page_size = page_size.max(1);
        let mut rows = Vec::new();
        loop {
            let page = self
                .select(table, &SelectQuery::page(page_size, rows.len()))
                .await?;
            let done = page.len() < page_size;
            rows.extend(page);
            if done {
                return Ok(rows);
            }
        }
    }

    /// Insert a batch of rows.
    ///
    /// With `upsert`, rows whose primary key already exists are updated in place.
    /// Returns the number of rows written.
    async fn insert(&self, table: &str, rows: &[Record], upsert: bool) -> Result<u64>;

    /// Invoke a stored procedure by name.
    async fn rpc(&self, function: &str, params: Value) -> Result<Value>;

    /// Base URL (or label) of the project, for log lines.
    fn endpoint(&self) -> &str;
}

/// Object storage client for one project.
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// List every bucket.
    async fn list_buckets(&self) -> Result<Vec<Bucket>>;

    /// Create a bucket. Fails with a conflict if it already exists.
    async fn create_bucket(&self, name: &str, options: &BucketOptions) -> Result<()>;

    /// List the entries directly under `prefix`.
    async fn list(&self, bucket: &str, prefix: &str, options: &ListOptions)
        -> Result<Vec<StorageEntry>>;

    /// List every entry directly under `prefix`, following pagination.
    async fn list_all(&self, bucket: &str, prefix: &str) -> Result<Vec<StorageEntry>> {
        let mut options = ListOptions::default();
        let mut entries = Vec::new();
        loop {
            let page = self.list(bucket, prefix, &options).await?;
            let done = page.len() < options.limit;
            options.offset += page.len();
            entries.extend(page);
            if done {
                return Ok(entries);
            }
        }
    }

    /// Download an object's bytes.
    async fn download(&self, bucket: &str, path: &str) -> Result<Bytes>;

    /// Upload bytes to a path. With `upsert`, an existing object is replaced.
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        data: Bytes,
        content_type: Option<&str>,
        upsert: bool,
    ) -> Result<()>;

    /// Delete objects by path.
    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<()>;

    /// Move an object within a bucket.
    async fn move_object(&self, bucket: &str, from: &str, to: &str) -> Result<()>;

    /// Short-lived signed download URL.
    async fn create_signed_url(&self, bucket: &str, path: &str, expires_in_secs: u64)
        -> Result<String>;

    /// Public URL for an object in a public bucket.
    fn public_url(&self, bucket: &str, path: &str) -> String;
}
