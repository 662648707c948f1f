//! Migration orchestrator - sequences the phases of a run.
//!
//! Phases run strictly one after another: connectivity probe, schema export,
//! data export and import, storage. An error that escapes a phase stops the
//! run; phases that already finished are left as they are. Artifacts reach
//! the [`ArtifactSink`] as soon as the phase that produced them finishes.

mod health;

pub use health::{probe, ConnectionReport, PROBE_TABLE};

use crate::config::{MigrationConfig, MigrationOptions};
use crate::core::{QueryClient, StorageClient, TableRecordSet};
use crate::drivers::rest::{RestQueryClient, RestStorageClient};
use crate::error::{MigrateError, Result};
use crate::output::ArtifactSink;
use crate::schema::{SchemaProvider, StaticSchema};
use crate::state::{MigrationState, MigrationStep, RunStatus, StepResult};
use crate::storage::{get_storage_stats, StorageMigrator, StorageReport, StorageStats};
use crate::transfer::{render_sql_scripts, DataExporter, DataImporter, ImportReport};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Query and storage handles for one project.
#[derive(Clone)]
pub struct ProjectClients {
    pub query: Arc<dyn QueryClient>,
    pub storage: Arc<dyn StorageClient>,
}

impl ProjectClients {
    /// One backend serving both capabilities.
    pub fn from_backend<B>(backend: B) -> Self
    where
        B: QueryClient + StorageClient + 'static,
    {
        let backend = Arc::new(backend);
        Self {
            query: backend.clone(),
            storage: backend,
        }
    }
}

/// Migration orchestrator.
pub struct Migrator {
    config: MigrationConfig,
    source: ProjectClients,
    target: Option<ProjectClients>,
    schema: Arc<dyn SchemaProvider>,
    state_file: Option<PathBuf>,
    state: Option<MigrationState>,
    sink: Option<Arc<dyn ArtifactSink>>,
}

/// Result of a migration run.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    /// Unique run identifier.
    pub run_id: String,

    /// Final status.
    pub status: RunStatus,

    /// When the migration started.
    pub started_at: DateTime<Utc>,

    /// When the migration completed.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection: Option<ConnectionReport>,

    /// Tables read from the source.
    pub tables_exported: usize,

    /// Rows read from the source.
    pub rows_exported: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub import: Option<ImportReport>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageReport>,

    pub steps: Vec<StepResult>,

    /// DDL script, when the schema phase ran.
    #[serde(skip)]
    pub schema: Option<String>,

    /// Exported rows, when the data phase ran.
    #[serde(skip)]
    pub records: Option<TableRecordSet>,
}

impl MigrationReport {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Migrator {
    /// Create a migrator talking to both projects over REST.
    ///
    /// Storage handles use the privileged key when one is configured.
    pub fn new(config: MigrationConfig) -> Result<Self> {
        let source = ProjectClients {
            query: Arc::new(RestQueryClient::new(&config.source)?),
            storage: Arc::new(RestStorageClient::new(&config.source)?),
        };
        let target = match config.target {
            Some(ref endpoint) => Some(ProjectClients {
                query: Arc::new(RestQueryClient::new(endpoint)?),
                storage: Arc::new(RestStorageClient::new(endpoint)?),
            }),
            None => None,
        };
        Ok(Self::with_clients(config, source, target))
    }

    /// Create a migrator over caller-supplied clients.
    pub fn with_clients(
        config: MigrationConfig,
        source: ProjectClients,
        target: Option<ProjectClients>,
    ) -> Self {
        Self {
            config,
            source,
            target,
            schema: Arc::new(StaticSchema),
            state_file: None,
            state: None,
            sink: None,
        }
    }

    /// Replace the DDL source.
    pub fn with_schema_provider(mut self, provider: Arc<dyn SchemaProvider>) -> Self {
        self.schema = provider;
        self
    }

    /// Hand the DDL script and exported rows to `sink` as each phase finishes.
    pub fn with_artifact_sink(mut self, sink: Arc<dyn ArtifactSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Set the state file path for resume capability.
    pub fn with_state_file(mut self, path: PathBuf) -> Self {
        self.state_file = Some(path);
        self
    }

    /// Load existing state for resume.
    pub fn resume(mut self) -> Result<Self> {
        if let Some(ref path) = self.state_file {
            if path.exists() {
                let state = MigrationState::load(path)?;
                state.validate_config(&self.config.hash())?;
                self.state = Some(state);
                info!("Resuming from state file: {:?}", path);
            }
        }
        Ok(self)
    }

    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    fn target(&self) -> Result<&ProjectClients> {
        self.target
            .as_ref()
            .ok_or_else(|| MigrateError::Config("a target project is required".to_string()))
    }

    /// Probe both projects. Never fails; problems are reported as text.
    pub async fn test_connections(&self) -> ConnectionReport {
        let (source_error, source_latency_ms) = probe(self.source.query.as_ref()).await;
        let (target_error, target_latency_ms) = match self.target {
            Some(ref target) => probe(target.query.as_ref()).await,
            None => (Some("no target project configured".to_string()), 0),
        };

        ConnectionReport {
            source: source_error.is_none(),
            target: target_error.is_none(),
            source_error,
            target_error,
            source_latency_ms,
            target_latency_ms,
        }
    }

    /// DDL script for the target project. Never executed by this crate.
    pub async fn export_schema(&self) -> Result<String> {
        info!("Exporting schema ({} provider)", self.schema.name());
        self.schema.export_schema().await
    }

    /// Read every table from the source.
    pub async fn export_data(&self, options: &MigrationOptions) -> Result<TableRecordSet> {
        DataExporter::new(self.source.query.clone())
            .export_data(options)
            .await
    }

    /// Read every table from the source and render one SQL script per table.
    pub async fn export_data_as_sql(
        &self,
        options: &MigrationOptions,
    ) -> Result<BTreeMap<String, String>> {
        let records = self.export_data(options).await?;
        render_sql_scripts(&records)
    }

    /// Write a record set into the target.
    pub async fn import_data(
        &self,
        records: &TableRecordSet,
        options: &MigrationOptions,
    ) -> Result<ImportReport> {
        DataImporter::new(self.target()?.query.clone())
            .import_data(records, options)
            .await
    }

    /// Copy object storage. A logged no-op unless both projects carry a
    /// privileged key.
    pub async fn migrate_storage(&self, cancel: CancellationToken) -> Result<StorageReport> {
        let target_key = self.config.target.as_ref().and_then(|t| t.service_key());
        if self.config.source.service_key().is_none() || target_key.is_none() {
            info!("Storage migration skipped: both projects need a service key");
            return Ok(StorageReport::skipped());
        }

        StorageMigrator::new(self.source.storage.clone(), self.target()?.storage.clone())
            .with_cancellation(cancel)
            .migrate_storage(self.config.storage_bucket.as_deref())
            .await
    }

    /// Bucket, file and byte totals of the source storage.
    pub async fn get_storage_stats(&self) -> Result<StorageStats> {
        get_storage_stats(self.source.storage.as_ref()).await
    }

    /// Run the selected phases.
    pub async fn migrate(
        mut self,
        options: &MigrationOptions,
        cancel: CancellationToken,
    ) -> Result<MigrationReport> {
        let mut problems = options.validation_errors();
        problems.extend(self.config.selection_errors(options));
        if !problems.is_empty() {
            return Err(MigrateError::InvalidConfig(problems));
        }
        let writes_target = options.include_data || options.include_storage;
        if writes_target {
            self.target()?;
        }

        let started_at = Utc::now();
        let mut state = match self.state.take() {
            Some(mut state) => {
                state.reset_unfinished();
                state
            }
            None => MigrationState::new(uuid::Uuid::new_v4().to_string(), self.config.hash()),
        };
        let run_id = state.run_id.clone();
        info!("Starting migration run: {}", run_id);
        self.save_state(&state)?;

        let mut report = MigrationReport {
            run_id,
            status: RunStatus::Running,
            started_at,
            completed_at: started_at,
            duration_seconds: 0.0,
            connection: None,
            tables_exported: 0,
            rows_exported: 0,
            import: None,
            storage: None,
            steps: Vec::new(),
            schema: None,
            records: None,
        };

        let outcome = self
            .run_phases(options, &cancel, writes_target, &mut state, &mut report)
            .await;

        match outcome {
            Ok(()) => state.mark_completed(),
            Err(MigrateError::Cancelled) => state.mark_cancelled(),
            Err(_) => state.mark_failed(),
        }
        if let Err(e) = self.save_state(&state) {
            warn!("Could not save final state: {}", e);
        }

        report.status = state.status;
        report.completed_at = Utc::now();
        report.duration_seconds =
            (report.completed_at - started_at).num_milliseconds() as f64 / 1000.0;
        report.steps = state.steps.clone();

        match outcome {
            Ok(()) => {
                info!(
                    "Migration completed: {} tables, {} rows exported in {:.1}s",
                    report.tables_exported, report.rows_exported, report.duration_seconds
                );
                Ok(report)
            }
            Err(e) => {
                error!("Migration {:?}: {}", report.status, e);
                Err(e)
            }
        }
    }

    async fn run_phases(
        &self,
        options: &MigrationOptions,
        cancel: &CancellationToken,
        writes_target: bool,
        state: &mut MigrationState,
        report: &mut MigrationReport,
    ) -> Result<()> {
        // Read-only phases run every time; only target writes are skipped on resume.
        if writes_target {
            info!("Phase 1: Testing connections");
            self.begin(state, MigrationStep::Connectivity)?;
            let connection = self.test_connections().await;
            let healthy = connection.healthy();
            let err = connection.to_error();
            report.connection = Some(connection);
            if !healthy {
                return Err(self.fail(state, MigrationStep::Connectivity, err));
            }
            self.finish(state, MigrationStep::Connectivity)?;
        }

        if options.include_schema {
            info!("Phase 2: Exporting schema");
            self.begin(state, MigrationStep::Schema)?;
            let ddl = match self.export_schema().await {
                Ok(ddl) => ddl,
                Err(e) => return Err(self.fail(state, MigrationStep::Schema, e)),
            };
            if let Some(ref sink) = self.sink {
                if let Err(e) = sink.schema_exported(&ddl).await {
                    return Err(self.fail(state, MigrationStep::Schema, e));
                }
            }
            report.schema = Some(ddl);
            self.finish(state, MigrationStep::Schema)?;
        }

        if options.include_data {
            if state.is_step_completed(MigrationStep::Data) {
                info!("Phase 3: Data already migrated by a previous run, skipping");
            } else {
                info!("Phase 3: Exporting and importing data");
                self.begin(state, MigrationStep::Data)?;
                if let Err(e) = self.data_phase(options, cancel, report).await {
                    return Err(self.fail(state, MigrationStep::Data, e));
                }
                self.finish(state, MigrationStep::Data)?;
            }
        }

        if options.include_storage {
            if state.is_step_completed(MigrationStep::Storage) {
                info!("Phase 4: Storage already migrated by a previous run, skipping");
            } else {
                info!("Phase 4: Migrating storage");
                self.begin(state, MigrationStep::Storage)?;
                match self.migrate_storage(cancel.clone()).await {
                    Ok(storage) => report.storage = Some(storage),
                    Err(e) => return Err(self.fail(state, MigrationStep::Storage, e)),
                }
                self.finish(state, MigrationStep::Storage)?;
            }
        }

        Ok(())
    }

    async fn data_phase(
        &self,
        options: &MigrationOptions,
        cancel: &CancellationToken,
        report: &mut MigrationReport,
    ) -> Result<()> {
        let records = DataExporter::new(self.source.query.clone())
            .with_cancellation(cancel.clone())
            .export_data(options)
            .await?;
        report.tables_exported = records.len();
        report.rows_exported = records.values().map(Vec::len).sum();
        if let Some(ref sink) = self.sink {
            sink.data_exported(&records).await?;
        }

        let records = report.records.insert(records);

        let import = DataImporter::new(self.target()?.query.clone())
            .with_cancellation(cancel.clone())
            .import_data(records, options)
            .await?;
        if !import.is_clean() {
            warn!(
                "{} batches were rejected by the target ({} rows)",
                import.failed_batches(),
                import.rows_failed()
            );
        }

        report.import = Some(import);
        Ok(())
    }

    fn begin(&self, state: &mut MigrationState, step: MigrationStep) -> Result<()> {
        state.step_mut(step).mark_running();
        self.save_state(state)
    }

    fn finish(&self, state: &mut MigrationState, step: MigrationStep) -> Result<()> {
        state.step_mut(step).mark_completed();
        self.save_state(state)
    }

    /// Record a failed step and hand the error back.
    fn fail(&self, state: &mut MigrationState, step: MigrationStep, err: MigrateError) -> MigrateError {
        error!("Step {} failed: {}", step, err);
        state.step_mut(step).mark_failed(&err.to_string());
        if let Err(e) = self.save_state(state) {
            warn!("Could not save state: {}", e);
        }
        err
    }

    fn save_state(&self, state: &MigrationState) -> Result<()> {
        if let Some(ref path) = self.state_file {
            state.save(path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EndpointConfig, MigrationMode};
    use crate::core::Record;
    use crate::drivers::memory::MemoryBackend;
    use crate::output::{DirectorySink, DATA_FILE, SCHEMA_FILE};
    use crate::state::StepStatus;
    use serde_json::{json, Value};

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    fn config(service_keys: bool) -> MigrationConfig {
        let mut source = EndpointConfig::new("https://source.example.co", "anon-a");
        let mut target = EndpointConfig::new("https://target.example.co", "anon-b");
        if service_keys {
            source = source.with_service_key("service-a");
            target = target.with_service_key("service-b");
        }
        MigrationConfig::new(source, target)
    }

    fn migrator(cfg: MigrationConfig, source: &MemoryBackend, target: &MemoryBackend) -> Migrator {
        Migrator::with_clients(
            cfg,
            ProjectClients::from_backend(source.clone()),
            Some(ProjectClients::from_backend(target.clone())),
        )
    }

    fn casa_source() -> MemoryBackend {
        let source = MemoryBackend::new("source");
        source.seed_table("categories", vec![record(json!({"id": "c1", "name": "Casa"}))]);
        source
    }

    #[tokio::test]
    async fn test_full_migration_twice_leaves_one_row() {
        let source = casa_source();
        let target = MemoryBackend::new("target");
        let options = MigrationOptions::default();

        for _ in 0..2 {
            let report = migrator(config(false), &source, &target)
                .migrate(&options, CancellationToken::new())
                .await
                .unwrap();
            assert_eq!(report.status, RunStatus::Completed);
            assert!(report.import.as_ref().unwrap().is_clean());
            assert!(report.schema.as_ref().unwrap().contains("CREATE TABLE"));
        }

        assert_eq!(
            target.rows("categories"),
            vec![record(json!({"id": "c1", "name": "Casa"}))]
        );
    }

    #[tokio::test]
    async fn test_failed_probe_aborts_before_writing() {
        let source = casa_source();
        let target = MemoryBackend::new("target");
        target.fail_reads(PROBE_TABLE);

        let result = migrator(config(false), &source, &target)
            .migrate(&MigrationOptions::default(), CancellationToken::new())
            .await;

        match result {
            Err(MigrateError::Connectivity {
                source_error,
                target_error,
            }) => {
                assert!(source_error.is_none());
                assert!(target_error.is_some());
            }
            other => panic!("expected connectivity error, got {:?}", other.map(|r| r.status)),
        }
        assert!(target.rows("categories").is_empty());
    }

    #[tokio::test]
    async fn test_test_connections_against_unreachable_projects() {
        let cfg = MigrationConfig::new(
            EndpointConfig::new("http://127.0.0.1:1", "anon-a"),
            EndpointConfig::new("http://127.0.0.1:2", "anon-b"),
        );
        let report = Migrator::new(cfg).unwrap().test_connections().await;
        assert!(!report.source);
        assert!(!report.target);
        assert!(report.source_error.is_some());
        assert!(report.target_error.is_some());
    }

    #[tokio::test]
    async fn test_schema_only_needs_no_target() {
        let cfg = MigrationConfig::source_only(EndpointConfig::new("http://127.0.0.1:1", "anon"));
        let migrator = Migrator::new(cfg).unwrap();
        let options = MigrationOptions::for_mode(MigrationMode::SchemaOnly, false);

        let report = migrator.migrate(&options, CancellationToken::new()).await.unwrap();
        assert!(report.schema.is_some());
        assert!(report.records.is_none());
        assert!(report.connection.is_none());
        let schema_step = report
            .steps
            .iter()
            .find(|s| s.step == MigrationStep::Schema)
            .unwrap();
        assert_eq!(schema_step.status, StepStatus::Completed);
    }

    #[tokio::test]
    async fn test_data_without_target_is_config_error() {
        let source = casa_source();
        let migrator = Migrator::with_clients(
            MigrationConfig::source_only(EndpointConfig::new("https://source.example.co", "anon")),
            ProjectClients::from_backend(source),
            None,
        );
        let result = migrator
            .migrate(&MigrationOptions::default(), CancellationToken::new())
            .await;
        assert!(matches!(result, Err(MigrateError::Config(_))));
    }

    #[tokio::test]
    async fn test_storage_is_noop_without_service_keys() {
        let source = casa_source();
        source.seed_object("property-images", "cover.jpg", &b"x"[..]);
        let target = MemoryBackend::new("target");

        let options = MigrationOptions::for_mode(MigrationMode::Full, true);
        let report = migrator(config(false).with_storage(true), &source, &target)
            .migrate(&options, CancellationToken::new())
            .await
            .unwrap();
        assert!(report.storage.unwrap().skipped);
        assert!(target.uploads().is_empty());
    }

    #[tokio::test]
    async fn test_full_migration_with_storage() {
        let source = casa_source();
        source.seed_object("property-images", "p1/cover.jpg", &b"x"[..]);
        source.seed_object("avatars", "u1.png", &b"y"[..]);
        let target = MemoryBackend::new("target");

        let options = MigrationOptions::for_mode(MigrationMode::Full, true);
        let report = migrator(config(true).with_storage(true), &source, &target)
            .migrate(&options, CancellationToken::new())
            .await
            .unwrap();

        let storage = report.storage.unwrap();
        assert!(!storage.skipped);
        assert_eq!(storage.migrated, 2);
        assert!(target.object("avatars", "u1.png").is_some());
        assert!(report.steps.iter().all(|s| s.status == StepStatus::Completed));
    }

    #[tokio::test]
    async fn test_storage_selection_mismatch_rejected_before_any_phase() {
        let source = casa_source();
        let target = MemoryBackend::new("target");

        let result = migrator(config(true).with_storage(true), &source, &target)
            .migrate(&MigrationOptions::default(), CancellationToken::new())
            .await;
        match result {
            Err(MigrateError::InvalidConfig(errors)) => {
                assert!(errors[0].contains("not selected for this run"));
            }
            other => panic!("expected invalid config, got {:?}", other.map(|r| r.status)),
        }

        let options = MigrationOptions::for_mode(MigrationMode::Full, true);
        let result = migrator(config(true), &source, &target)
            .migrate(&options, CancellationToken::new())
            .await;
        assert!(matches!(result, Err(MigrateError::InvalidConfig(_))));
        assert!(target.rows("categories").is_empty());
    }

    #[tokio::test]
    async fn test_artifacts_survive_a_failing_storage_phase() {
        let dir = tempfile::tempdir().unwrap();
        let source = casa_source();
        source.seed_object("property-images", "cover.jpg", &b"x"[..]);
        let target = MemoryBackend::new("target");

        let cfg = config(true)
            .with_storage(true)
            .with_storage_bucket("missing-bucket");
        let options = MigrationOptions::for_mode(MigrationMode::Full, true);
        let result = migrator(cfg, &source, &target)
            .with_artifact_sink(Arc::new(DirectorySink::new(dir.path())))
            .migrate(&options, CancellationToken::new())
            .await;

        assert!(matches!(result, Err(MigrateError::Storage { .. })));
        assert_eq!(target.rows("categories").len(), 1);

        let ddl = std::fs::read_to_string(dir.path().join(SCHEMA_FILE)).unwrap();
        assert!(ddl.contains("CREATE TABLE IF NOT EXISTS public.categories"));
        let data: Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join(DATA_FILE)).unwrap())
                .unwrap();
        assert_eq!(data["categories"][0]["name"], "Casa");
    }

    #[tokio::test]
    async fn test_rows_reach_sink_before_the_import() {
        /// Keeps what it receives and stops the run once the rows arrive.
        struct StopAfterExport {
            ddl: std::sync::Mutex<Option<String>>,
            records: std::sync::Mutex<Option<TableRecordSet>>,
            token: CancellationToken,
        }

        #[async_trait::async_trait]
        impl ArtifactSink for StopAfterExport {
            async fn schema_exported(&self, ddl: &str) -> Result<()> {
                *self.ddl.lock().unwrap() = Some(ddl.to_string());
                Ok(())
            }

            async fn data_exported(&self, records: &TableRecordSet) -> Result<()> {
                *self.records.lock().unwrap() = Some(records.clone());
                self.token.cancel();
                Ok(())
            }
        }

        let source = casa_source();
        let target = MemoryBackend::new("target");
        let token = CancellationToken::new();
        let sink = Arc::new(StopAfterExport {
            ddl: Default::default(),
            records: Default::default(),
            token: token.clone(),
        });

        let result = migrator(config(false), &source, &target)
            .with_artifact_sink(sink.clone())
            .migrate(&MigrationOptions::default(), token)
            .await;

        assert!(matches!(result, Err(MigrateError::Cancelled)));
        assert!(target.rows("categories").is_empty());
        assert!(sink.ddl.lock().unwrap().as_ref().unwrap().contains("CREATE TABLE"));
        assert_eq!(
            sink.records.lock().unwrap().as_ref().unwrap()["categories"].len(),
            1
        );
    }

    #[tokio::test]
    async fn test_sink_failure_fails_the_phase() {
        struct Broken;

        #[async_trait::async_trait]
        impl ArtifactSink for Broken {
            async fn schema_exported(&self, _ddl: &str) -> Result<()> {
                Err(MigrateError::Io(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "read-only directory",
                )))
            }

            async fn data_exported(&self, _records: &TableRecordSet) -> Result<()> {
                Ok(())
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let state_path = dir.path().join("migration.state.json");
        let source = casa_source();
        let target = MemoryBackend::new("target");
        let result = migrator(config(false), &source, &target)
            .with_state_file(state_path.clone())
            .with_artifact_sink(Arc::new(Broken))
            .migrate(&MigrationOptions::default(), CancellationToken::new())
            .await;

        assert!(matches!(result, Err(MigrateError::Io(_))));
        let saved = MigrationState::load(&state_path).unwrap();
        assert_eq!(
            saved.step(MigrationStep::Schema).map(|s| s.status),
            Some(StepStatus::Error)
        );
        assert!(target.rows("categories").is_empty());
    }

    #[tokio::test]
    async fn test_state_file_records_steps_and_resume_skips_data() {
        let dir = tempfile::tempdir().unwrap();
        let state_path = dir.path().join("migration.state.json");
        let source = casa_source();
        let target = MemoryBackend::new("target");
        let options = MigrationOptions::default();

        migrator(config(false), &source, &target)
            .with_state_file(state_path.clone())
            .migrate(&options, CancellationToken::new())
            .await
            .unwrap();

        let saved = MigrationState::load(&state_path).unwrap();
        assert_eq!(saved.status, RunStatus::Completed);
        assert!(saved.is_step_completed(MigrationStep::Data));

        // New source rows are not picked up: the data step is already done.
        source.seed_table(
            "categories",
            vec![
                record(json!({"id": "c1", "name": "Casa"})),
                record(json!({"id": "c2", "name": "Apartamento"})),
            ],
        );
        let report = migrator(config(false), &source, &target)
            .with_state_file(state_path.clone())
            .resume()
            .unwrap()
            .migrate(&options, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.run_id, saved.run_id);
        assert!(report.import.is_none());
        assert_eq!(target.rows("categories").len(), 1);
    }

    #[tokio::test]
    async fn test_resume_rejects_changed_config() {
        let dir = tempfile::tempdir().unwrap();
        let state_path = dir.path().join("migration.state.json");
        MigrationState::new("run".into(), "other-hash".into())
            .save(&state_path)
            .unwrap();

        let source = casa_source();
        let target = MemoryBackend::new("target");
        let result = migrator(config(false), &source, &target)
            .with_state_file(state_path)
            .resume();
        assert!(matches!(result, Err(MigrateError::ConfigChanged)));
    }

    #[tokio::test]
    async fn test_cancelled_run_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let state_path = dir.path().join("migration.state.json");
        let source = casa_source();
        let target = MemoryBackend::new("target");
        let token = CancellationToken::new();
        token.cancel();

        let result = migrator(config(false), &source, &target)
            .with_state_file(state_path.clone())
            .migrate(&MigrationOptions::default(), token)
            .await;
        assert!(matches!(result, Err(MigrateError::Cancelled)));

        let saved = MigrationState::load(&state_path).unwrap();
        assert_eq!(saved.status, RunStatus::Cancelled);
        assert_eq!(
            saved.step(MigrationStep::Data).map(|s| s.status),
            Some(StepStatus::Error)
        );
    }

    #[tokio::test]
    async fn test_custom_schema_provider() {
        struct Fixed;

        #[async_trait::async_trait]
        impl SchemaProvider for Fixed {
            async fn export_schema(&self) -> Result<String> {
                Ok("CREATE TABLE public.only_one (id uuid);".to_string())
            }

            fn name(&self) -> &str {
                "fixed"
            }
        }

        let source = MemoryBackend::new("source");
        let target = MemoryBackend::new("target");
        let ddl = migrator(config(false), &source, &target)
            .with_schema_provider(Arc::new(Fixed))
            .export_schema()
            .await
            .unwrap();
        assert!(ddl.contains("only_one"));
    }

    #[tokio::test]
    async fn test_report_json_omits_bulk_payloads() {
        let source = casa_source();
        let target = MemoryBackend::new("target");
        let report = migrator(config(false), &source, &target)
            .migrate(&MigrationOptions::default(), CancellationToken::new())
            .await
            .unwrap();

        let json = report.to_json().unwrap();
        let parsed: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["status"], "completed");
        assert_eq!(parsed["rows_exported"], 1);
        assert!(parsed.get("records").is_none());
        assert!(parsed.get("schema").is_none());
    }

    #[tokio::test]
    async fn test_standalone_phases() {
        let source = casa_source();
        let target = MemoryBackend::new("target");
        let m = migrator(config(false), &source, &target);
        let options = MigrationOptions::default();

        let records = m.export_data(&options).await.unwrap();
        let report = m.import_data(&records, &options).await.unwrap();
        assert_eq!(report.rows_written(), 1);

        let scripts = m.export_data_as_sql(&options).await.unwrap();
        assert!(scripts["categories"].contains("ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name"));

        source.seed_object("docs", "a.pdf", &b"abc"[..]);
        let stats = m.get_storage_stats().await.unwrap();
        assert_eq!(stats.files, 1);
        assert_eq!(stats.total_bytes, 3);
    }
}
