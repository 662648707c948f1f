//! In-process backend implementing both capability traits.
//!
//! Holds tables and buckets in memory and lets callers inject failures for
//! individual tables, rows, folders and files. Used throughout the test
//! suite; other crates enable it with the `memory` feature.
//!
//! Rows keep insertion order, so offset paging is stable without sorting.

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::core::value::{join_path, split_path};
use crate::core::{
    Bucket, BucketOptions, FileMetadata, ListOptions, QueryClient, Record, SelectQuery,
    SortColumn, StorageClient, StorageEntry,
};
use crate::error::{MigrateError, Result};

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    content_type: Option<String>,
}

#[derive(Debug, Default)]
struct MemoryState {
    tables: BTreeMap<String, Vec<Record>>,
    buckets: BTreeMap<String, (Bucket, BTreeMap<String, StoredObject>)>,
    failing_reads: HashSet<String>,
    rejected_rows: Vec<(String, String, Value)>,
    failing_listings: HashSet<(String, String)>,
    failing_downloads: HashSet<(String, String)>,
    uploads: Vec<(String, String)>,
    rpc_calls: Vec<(String, Value)>,
}

/// Shared in-memory project. Clones see the same data.
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    label: String,
    state: Arc<Mutex<MemoryState>>,
}

fn value_matches(value: Option<&Value>, expected: &str) -> bool {
    match value {
        Some(Value::String(s)) => s == expected,
        Some(other) => other.to_string() == expected,
        None => false,
    }
}

impl MemoryBackend {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            state: Arc::new(Mutex::new(MemoryState::default())),
        }
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace a table's rows.
    pub fn seed_table(&self, table: &str, rows: Vec<Record>) {
        self.state().tables.insert(table.to_string(), rows);
    }

    /// Current rows of a table.
    pub fn rows(&self, table: &str) -> Vec<Record> {
        self.state().tables.get(table).cloned().unwrap_or_default()
    }

    /// Make every read of `table` fail.
    pub fn fail_reads(&self, table: &str) {
        self.state().failing_reads.insert(table.to_string());
    }

    /// Reject any insert batch containing a row where `column` equals `value`.
    pub fn reject_rows(&self, table: &str, column: &str, value: Value) {
        self.state()
            .rejected_rows
            .push((table.to_string(), column.to_string(), value));
    }

    /// Create a bucket directly.
    pub fn seed_bucket(&self, bucket: Bucket) {
        self.state()
            .buckets
            .entry(bucket.name.clone())
            .or_insert_with(|| (bucket, BTreeMap::new()));
    }

    /// Store an object directly, creating a private bucket if needed.
    pub fn seed_object(&self, bucket: &str, path: &str, data: impl Into<Bytes>) {
        let mut state = self.state();
        let (_, objects) = state.buckets.entry(bucket.to_string()).or_insert_with(|| {
            (
                Bucket {
                    id: bucket.to_string(),
                    name: bucket.to_string(),
                    public: false,
                    allowed_mime_types: None,
                    file_size_limit: None,
                },
                BTreeMap::new(),
            )
        });
        objects.insert(
            path.trim_matches('/').to_string(),
            StoredObject {
                data: data.into(),
                content_type: None,
            },
        );
    }

    /// Make listing `prefix` inside `bucket` fail.
    pub fn fail_listing(&self, bucket: &str, prefix: &str) {
        self.state()
            .failing_listings
            .insert((bucket.to_string(), prefix.trim_matches('/').to_string()));
    }

    /// Make downloading one object fail.
    pub fn fail_download(&self, bucket: &str, path: &str) {
        self.state()
            .failing_downloads
            .insert((bucket.to_string(), path.trim_matches('/').to_string()));
    }

    pub fn bucket(&self, name: &str) -> Option<Bucket> {
        self.state().buckets.get(name).map(|(b, _)| b.clone())
    }

    /// Object bytes, if present.
    pub fn object(&self, bucket: &str, path: &str) -> Option<Bytes> {
        self.state()
            .buckets
            .get(bucket)
            .and_then(|(_, objects)| objects.get(path.trim_matches('/')))
            .map(|o| o.data.clone())
    }

    /// Every object path in a bucket.
    pub fn object_paths(&self, bucket: &str) -> Vec<String> {
        self.state()
            .buckets
            .get(bucket)
            .map(|(_, objects)| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// `(bucket, path)` of every upload, in order.
    pub fn uploads(&self) -> Vec<(String, String)> {
        self.state().uploads.clone()
    }

    pub fn rpc_calls(&self) -> Vec<(String, Value)> {
        self.state().rpc_calls.clone()
    }
}

#[async_trait]
impl QueryClient for MemoryBackend {
    async fn select(&self, table: &str, query: &SelectQuery) -> Result<Vec<Record>> {
        let state = self.state();
        if state.failing_reads.contains(table) {
            return Err(MigrateError::remote(
                404,
                format!("relation \"public.{}\" does not exist", table),
            ));
        }
        let rows = state.tables.get(table).map(Vec::as_slice).unwrap_or(&[]);
        let matching = rows
            .iter()
            .filter(|row| {
                query
                    .filters
                    .iter()
                    .all(|f| value_matches(row.get(&f.column), &f.value))
            })
            .skip(query.offset)
            .take(query.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok(matching)
    }

    async fn insert(&self, table: &str, rows: &[Record], upsert: bool) -> Result<u64> {
        let mut state = self.state();

        for (t, column, value) in &state.rejected_rows {
            if t == table && rows.iter().any(|r| r.get(column) == Some(value)) {
                return Err(MigrateError::remote(
                    400,
                    format!("row rejected: {} = {}", column, value),
                ));
            }
        }

        let existing = state.tables.entry(table.to_string()).or_default();

        // Validate the whole batch first so a failed batch writes nothing.
        if !upsert {
            for row in rows {
                if let Some(id) = row.get("id") {
                    if existing.iter().any(|r| r.get("id") == Some(id)) {
                        return Err(MigrateError::remote(
                            409,
                            format!("duplicate key value violates unique constraint \"{}_pkey\"", table),
                        ));
                    }
                }
            }
        }

        for row in rows {
            let slot = row
                .get("id")
                .and_then(|id| existing.iter().position(|r| r.get("id") == Some(id)));
            match slot {
                Some(idx) => {
                    for (k, v) in row {
                        existing[idx].insert(k.clone(), v.clone());
                    }
                }
                None => existing.push(row.clone()),
            }
        }

        Ok(rows.len() as u64)
    }

    async fn rpc(&self, function: &str, params: Value) -> Result<Value> {
        self.state().rpc_calls.push((function.to_string(), params));
        Ok(Value::Null)
    }

    fn endpoint(&self) -> &str {
        &self.label
    }
}

#[async_trait]
impl StorageClient for MemoryBackend {
    async fn list_buckets(&self) -> Result<Vec<Bucket>> {
        Ok(self.state().buckets.values().map(|(b, _)| b.clone()).collect())
    }

    async fn create_bucket(&self, name: &str, options: &BucketOptions) -> Result<()> {
        let mut state = self.state();
        if state.buckets.contains_key(name) {
            return Err(MigrateError::remote(409, "The resource already exists"));
        }
        let bucket = Bucket {
            id: name.to_string(),
            name: name.to_string(),
            public: options.public,
            allowed_mime_types: options.allowed_mime_types.clone(),
            file_size_limit: options.file_size_limit,
        };
        state.buckets.insert(name.to_string(), (bucket, BTreeMap::new()));
        Ok(())
    }

    async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        options: &ListOptions,
    ) -> Result<Vec<StorageEntry>> {
        let state = self.state();
        let prefix = prefix.trim_matches('/');
        if state
            .failing_listings
            .contains(&(bucket.to_string(), prefix.to_string()))
        {
            return Err(MigrateError::remote(500, format!("cannot list {}/{}", bucket, prefix)));
        }
        let (_, objects) = state
            .buckets
            .get(bucket)
            .ok_or_else(|| MigrateError::remote(404, "Bucket not found"))?;

        let mut folders = BTreeSet::new();
        let mut entries = Vec::new();
        for (path, object) in objects {
            let rest = if prefix.is_empty() {
                path.as_str()
            } else {
                match path.strip_prefix(prefix).and_then(|r| r.strip_prefix('/')) {
                    Some(rest) => rest,
                    None => continue,
                }
            };
            match rest.split_once('/') {
                Some((folder, _)) => {
                    folders.insert(folder.to_string());
                }
                None => entries.push(StorageEntry {
                    name: rest.to_string(),
                    id: Some(format!("{}/{}", bucket, path)),
                    metadata: Some(FileMetadata {
                        size: object.data.len() as u64,
                        mimetype: object.content_type.clone(),
                    }),
                }),
            }
        }
        entries.extend(folders.into_iter().map(|name| StorageEntry {
            name,
            id: None,
            metadata: None,
        }));

        if options.sort_by == SortColumn::Name {
            entries.sort_by(|a, b| a.name.cmp(&b.name));
            if !options.ascending {
                entries.reverse();
            }
        }

        Ok(entries
            .into_iter()
            .filter(|e| options.search.as_ref().map_or(true, |s| e.name.contains(s.as_str())))
            .skip(options.offset)
            .take(options.limit)
            .collect())
    }

    async fn download(&self, bucket: &str, path: &str) -> Result<Bytes> {
        let path = path.trim_matches('/');
        if self
            .state()
            .failing_downloads
            .contains(&(bucket.to_string(), path.to_string()))
        {
            return Err(MigrateError::remote(500, format!("download failed: {}", path)));
        }
        self.object(bucket, path)
            .ok_or_else(|| MigrateError::remote(404, format!("Object not found: {}", path)))
    }

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        data: Bytes,
        content_type: Option<&str>,
        upsert: bool,
    ) -> Result<()> {
        let mut state = self.state();
        let path = path.trim_matches('/').to_string();
        let (_, objects) = state
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| MigrateError::remote(404, "Bucket not found"))?;
        if !upsert && objects.contains_key(&path) {
            return Err(MigrateError::remote(409, "The resource already exists"));
        }
        objects.insert(
            path.clone(),
            StoredObject {
                data,
                content_type: content_type.map(str::to_string),
            },
        );
        state.uploads.push((bucket.to_string(), path));
        Ok(())
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<()> {
        let mut state = self.state();
        let (_, objects) = state
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| MigrateError::remote(404, "Bucket not found"))?;
        for path in paths {
            objects.remove(path.trim_matches('/'));
        }
        Ok(())
    }

    async fn move_object(&self, bucket: &str, from: &str, to: &str) -> Result<()> {
        let mut state = self.state();
        let (_, objects) = state
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| MigrateError::remote(404, "Bucket not found"))?;
        let object = objects
            .remove(from.trim_matches('/'))
            .ok_or_else(|| MigrateError::remote(404, format!("Object not found: {}", from)))?;
        objects.insert(to.trim_matches('/').to_string(), object);
        Ok(())
    }

    async fn create_signed_url(
        &self,
        bucket: &str,
        path: &str,
        expires_in_secs: u64,
    ) -> Result<String> {
        if self.object(bucket, path).is_none() {
            return Err(MigrateError::remote(404, format!("Object not found: {}", path)));
        }
        Ok(format!(
            "memory://{}/sign/{}?expires_in={}",
            self.label,
            join_path(bucket, path.trim_matches('/')),
            expires_in_secs
        ))
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        let (folder, name) = split_path(path);
        format!(
            "memory://{}/public/{}",
            self.label,
            join_path(&join_path(bucket, folder), name)
        )
    }
}
