//! Configuration type definitions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Default rows per read page and per insert batch.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Connection details for one backend project.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EndpointConfig {
    /// Project base URL, e.g. `https://abc.example.co`.
    pub url: String,

    /// Public (anonymous) API key.
    pub anon_key: String,

    /// Privileged service key. Required for storage migration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_key: Option<String>,
}

impl EndpointConfig {
    /// Create an endpoint without a service key.
    pub fn new(url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            anon_key: anon_key.into(),
            service_key: None,
        }
    }

    /// Attach a privileged service key.
    pub fn with_service_key(mut self, key: impl Into<String>) -> Self {
        self.service_key = Some(key.into());
        self
    }

    /// Service key if present and non-empty.
    pub fn service_key(&self) -> Option<&str> {
        self.service_key.as_deref().filter(|k| !k.is_empty())
    }

    /// Key used for query calls: the service key when available, else the public key.
    pub fn effective_key(&self) -> &str {
        self.service_key().unwrap_or(&self.anon_key)
    }
}

impl fmt::Debug for EndpointConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointConfig")
            .field("url", &self.url)
            .field("anon_key", &"[REDACTED]")
            .field(
                "service_key",
                &self.service_key.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// Root configuration for one migration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Project data is read from.
    pub source: EndpointConfig,

    /// Project data is written to. Not needed for schema-only runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<EndpointConfig>,

    /// Whether object storage should be migrated.
    #[serde(default)]
    pub include_storage: bool,

    /// Restrict storage migration to a single bucket.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_bucket: Option<String>,
}

impl MigrationConfig {
    /// Create a configuration for a source and target pair.
    pub fn new(source: EndpointConfig, target: EndpointConfig) -> Self {
        Self {
            source,
            target: Some(target),
            include_storage: false,
            storage_bucket: None,
        }
    }

    /// Create a configuration that only knows the source project.
    pub fn source_only(source: EndpointConfig) -> Self {
        Self {
            source,
            target: None,
            include_storage: false,
            storage_bucket: None,
        }
    }

    pub fn with_storage(mut self, include: bool) -> Self {
        self.include_storage = include;
        self
    }

    pub fn with_storage_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.storage_bucket = Some(bucket.into());
        self
    }
}

/// Which group of phases a run is expected to execute.
///
/// Drives validation: schema-only runs need only the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationMode {
    SchemaOnly,
    DataOnly,
    Full,
}

impl MigrationMode {
    /// Whether this mode writes to the target project.
    pub fn needs_target(self) -> bool {
        !matches!(self, MigrationMode::SchemaOnly)
    }
}

/// Per-invocation tuning. Not retained by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationOptions {
    /// Tables left out of export and import.
    #[serde(default)]
    pub skip_tables: Vec<String>,

    /// Rows per read page and per insert batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Produce the schema DDL.
    #[serde(default = "default_true")]
    pub include_schema: bool,

    /// Export and import table data.
    #[serde(default = "default_true")]
    pub include_data: bool,

    /// Copy object storage.
    #[serde(default)]
    pub include_storage: bool,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            skip_tables: Vec::new(),
            batch_size: DEFAULT_BATCH_SIZE,
            include_schema: true,
            include_data: true,
            include_storage: false,
        }
    }
}

impl MigrationOptions {
    /// Options selecting the phases of a mode.
    pub fn for_mode(mode: MigrationMode, include_storage: bool) -> Self {
        match mode {
            MigrationMode::SchemaOnly => Self {
                include_data: false,
                ..Default::default()
            },
            MigrationMode::DataOnly => Self {
                include_schema: false,
                ..Default::default()
            },
            MigrationMode::Full => Self {
                include_storage,
                ..Default::default()
            },
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_skip_tables(mut self, tables: Vec<String>) -> Self {
        self.skip_tables = tables;
        self
    }

    /// Batch size with zero treated as the default.
    pub fn effective_batch_size(&self) -> usize {
        if self.batch_size == 0 {
            DEFAULT_BATCH_SIZE
        } else {
            self.batch_size
        }
    }

    pub fn skips(&self, table: &str) -> bool {
        self.skip_tables.iter().any(|t| t == table)
    }
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_true() -> bool {
    true
}
