//! Record and object-storage value types.
//!
//! Rows travel through the engine as JSON maps: the backend's REST surface
//! already speaks JSON, and the exported record set is written to disk as-is.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// One row: column name to JSON value.
pub type Record = Map<String, Value>;

/// Exported rows keyed by table name.
///
/// A `BTreeMap` keeps `data.json` output stable between runs; table order
/// carries no meaning here (import order comes from [`crate::transfer::IMPORT_ORDER`]).
pub type TableRecordSet = BTreeMap<String, Vec<Record>>;

/// Object storage bucket as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub public: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_mime_types: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size_limit: Option<u64>,
}

impl Bucket {
    /// Settings to recreate this bucket elsewhere.
    pub fn options(&self) -> BucketOptions {
        BucketOptions {
            public: self.public,
            allowed_mime_types: self.allowed_mime_types.clone(),
            file_size_limit: self.file_size_limit,
        }
    }
}

/// Settings for creating a bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketOptions {
    pub public: bool,
    pub allowed_mime_types: Option<Vec<String>>,
    pub file_size_limit: Option<u64>,
}

/// File metadata attached to listing entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    #[serde(default)]
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mimetype: Option<String>,
}

/// One entry returned by a storage listing.
///
/// Folders have no `id`; files always do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageEntry {
    pub name: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub metadata: Option<FileMetadata>,
}

impl StorageEntry {
    pub fn is_folder(&self) -> bool {
        self.id.is_none()
    }

    /// Reported size in bytes, zero when unknown.
    pub fn size(&self) -> u64 {
        self.metadata.as_ref().map(|m| m.size).unwrap_or(0)
    }
}

/// Sort column for storage listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortColumn {
    #[default]
    Name,
    CreatedAt,
    UpdatedAt,
}

impl SortColumn {
    pub fn as_str(self) -> &'static str {
        match self {
            SortColumn::Name => "name",
            SortColumn::CreatedAt => "created_at",
            SortColumn::UpdatedAt => "updated_at",
        }
    }
}

/// Pagination, filtering and ordering for a storage listing.
#[derive(Debug, Clone)]
pub struct ListOptions {
    pub limit: usize,
    pub offset: usize,
    /// Only entries whose name contains this string.
    pub search: Option<String>,
    pub sort_by: SortColumn,
    pub ascending: bool,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            limit: 1000,
            offset: 0,
            search: None,
            sort_by: SortColumn::Name,
            ascending: true,
        }
    }
}

/// Join a folder prefix and a name into an object path.
pub fn join_path(prefix: &str, name: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", prefix, name)
    }
}

/// Split an object path into (parent folder, file name).
pub fn split_path(path: &str) -> (&str, &str) {
    let path = path.trim_matches('/');
    match path.rfind('/') {
        Some(idx) => (&path[..idx], &path[idx + 1..]),
        None => ("", path),
    }
}
