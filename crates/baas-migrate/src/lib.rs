//! # baas-migrate
//!
//! Cross-project migration engine for the listing application's backend.
//!
//! This library moves an application from one backend project to another:
//!
//! - **Connectivity probe** of both projects before anything is written
//! - **Schema export** as a DDL script for the operator to apply
//! - **Data export** of every known table, as JSON records or SQL scripts
//! - **Dependency-ordered import** with idempotent upserts
//! - **Storage migration** of buckets and files, walked depth-first
//! - **Resume capability** via a JSON step ledger
//! - **Artifact sinks** that receive the DDL and exported rows as soon as they exist
//!
//! ## Example
//!
//! ```rust,no_run
//! use baas_migrate::{EndpointConfig, MigrationConfig, MigrationOptions, Migrator};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> baas_migrate::Result<()> {
//!     let config = MigrationConfig::new(
//!         EndpointConfig::new("https://old.example.co", "anon-key"),
//!         EndpointConfig::new("https://new.example.co", "anon-key"),
//!     );
//!     let report = Migrator::new(config)?
//!         .migrate(&MigrationOptions::default(), CancellationToken::new())
//!         .await?;
//!     println!("Exported {} rows", report.rows_exported);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod dialect;
pub mod drivers;
pub mod error;
pub mod orchestrator;
pub mod output;
pub mod schema;
pub mod state;
pub mod storage;
pub mod transfer;

// Re-exports for convenient access
pub use config::{EndpointConfig, MigrationConfig, MigrationMode, MigrationOptions};
pub use crate::core::{QueryClient, Record, StorageClient, TableRecordSet};
pub use error::{MigrateError, Result};
pub use orchestrator::{ConnectionReport, MigrationReport, Migrator, ProjectClients};
pub use output::{ArtifactSink, DirectorySink};
pub use schema::{SchemaProvider, StaticSchema};
pub use state::{MigrationState, MigrationStep, RunStatus, StepResult, StepStatus};
pub use storage::{StorageMigrator, StorageReport, StorageStats};
pub use transfer::{DataExporter, DataImporter, ImportReport};
