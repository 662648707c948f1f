//! migrate - move a backend project's schema, data and storage to another project.

mod usage;

use baas_migrate::config::DEFAULT_BATCH_SIZE;
use baas_migrate::output::SCHEMA_FILE;
use baas_migrate::{
    DirectorySink, EndpointConfig, MigrateError, MigrationConfig, MigrationMode,
    MigrationOptions, MigrationReport, Migrator,
};
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Parser)]
#[command(name = "migrate")]
#[command(about = "Migrate schema, data and storage between backend projects")]
#[command(long_about = usage::GUIDE)]
#[command(after_help = usage::EXAMPLES)]
#[command(version)]
struct Cli {
    /// Source project URL
    #[arg(long)]
    source_url: Option<String>,

    /// Source project public key
    #[arg(long)]
    source_key: Option<String>,

    /// Source project service key (needed for storage)
    #[arg(long)]
    source_service_key: Option<String>,

    /// Target project URL
    #[arg(long)]
    target_url: Option<String>,

    /// Target project public key
    #[arg(long)]
    target_key: Option<String>,

    /// Target project service key (needed for storage)
    #[arg(long)]
    target_service_key: Option<String>,

    /// Also copy storage buckets and files
    #[arg(long, num_args = 0..=1, require_equals = true, default_value = "false",
        default_missing_value = "true", action = ArgAction::Set,
        value_parser = BoolishValueParser::new())]
    include_storage: bool,

    /// Only export the schema (source project only)
    #[arg(long, num_args = 0..=1, require_equals = true, default_value = "false",
        default_missing_value = "true", action = ArgAction::Set,
        value_parser = BoolishValueParser::new())]
    schema_only: bool,

    /// Only copy table data
    #[arg(long, num_args = 0..=1, require_equals = true, default_value = "false",
        default_missing_value = "true", action = ArgAction::Set,
        value_parser = BoolishValueParser::new())]
    data_only: bool,

    /// Also write one SQL script per table to <output-dir>/sql
    #[arg(long, num_args = 0..=1, require_equals = true, default_value = "false",
        default_missing_value = "true", action = ArgAction::Set,
        value_parser = BoolishValueParser::new())]
    emit_sql: bool,

    /// Rows per read page and per insert batch
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Directory for schema.sql, data.json and sql/
    #[arg(long, default_value = "migration-output")]
    output_dir: PathBuf,

    /// Only migrate this storage bucket
    #[arg(long)]
    storage_bucket: Option<String>,

    /// Comma-separated tables to leave out
    #[arg(long, value_delimiter = ',')]
    skip_tables: Vec<String>,

    /// Path to state file for resume capability
    #[arg(long)]
    state_file: Option<PathBuf>,

    /// Skip phases a previous run recorded as completed in --state-file
    #[arg(long)]
    resume: bool,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,
}

impl Cli {
    fn mode(&self) -> MigrationMode {
        if self.schema_only {
            MigrationMode::SchemaOnly
        } else if self.data_only {
            MigrationMode::DataOnly
        } else {
            MigrationMode::Full
        }
    }

    /// Build the run configuration and options, collecting every problem.
    fn to_config(&self) -> Result<(MigrationConfig, MigrationOptions), MigrateError> {
        let mode = self.mode();
        let mut errors = Vec::new();

        if self.schema_only && self.data_only {
            errors.push("--schema-only and --data-only cannot be combined".to_string());
        }
        if self.resume && self.state_file.is_none() {
            errors.push("--resume requires --state-file".to_string());
        }
        let include_storage = self.include_storage && mode == MigrationMode::Full;
        if self.include_storage && !include_storage {
            warn!("--include-storage is ignored outside a full migration");
        }

        let source = endpoint(&self.source_url, &self.source_key, &self.source_service_key);
        // Schema-only runs never touch the target, so its flags are not read.
        let mut config = if mode.needs_target() {
            MigrationConfig::new(
                source,
                endpoint(&self.target_url, &self.target_key, &self.target_service_key),
            )
        } else {
            MigrationConfig::source_only(source)
        }
        .with_storage(include_storage);
        if let Some(ref bucket) = self.storage_bucket {
            config = config.with_storage_bucket(bucket.clone());
        }

        let options = MigrationOptions::for_mode(mode, include_storage)
            .with_batch_size(self.batch_size)
            .with_skip_tables(
                self.skip_tables
                    .iter()
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect(),
            );

        errors.extend(config.validation_errors(mode));
        errors.extend(options.validation_errors());
        errors.extend(config.selection_errors(&options));
        if errors.is_empty() {
            Ok((config, options))
        } else {
            Err(MigrateError::InvalidConfig(errors))
        }
    }
}

fn endpoint(
    url: &Option<String>,
    key: &Option<String>,
    service_key: &Option<String>,
) -> EndpointConfig {
    let endpoint = EndpointConfig::new(
        url.clone().unwrap_or_default(),
        key.clone().unwrap_or_default(),
    );
    match service_key {
        Some(key) => endpoint.with_service_key(key.clone()),
        None => endpoint,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), MigrateError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format, cli.output_json)
        .map_err(|e| MigrateError::Config(e.to_string()))?;

    // Everything is checked before the first network call.
    let (config, options) = cli.to_config()?;
    info!("Mode: {:?}, batch size {}", cli.mode(), options.batch_size);

    let cancel_token = setup_signal_handler();

    // Artifacts land in --output-dir as each phase finishes.
    let sink = DirectorySink::new(cli.output_dir.clone()).with_sql_scripts(cli.emit_sql);
    let mut migrator = Migrator::new(config)?.with_artifact_sink(Arc::new(sink));
    if let Some(ref path) = cli.state_file {
        migrator = migrator.with_state_file(path.clone());
    }
    if cli.resume {
        migrator = migrator.resume()?;
    }

    let report = migrator.migrate(&options, cancel_token).await?;

    if cli.output_json {
        println!("{}", report.to_json()?);
    } else {
        print_summary(&report, &cli.output_dir);
    }

    Ok(())
}

fn print_summary(report: &MigrationReport, output_dir: &Path) {
    println!("\nMigration completed!");
    println!("  Run ID: {}", report.run_id);
    println!("  Duration: {:.2}s", report.duration_seconds);
    if let Some(ref connection) = report.connection {
        println!(
            "  Connections: source {}ms, target {}ms",
            connection.source_latency_ms, connection.target_latency_ms
        );
    }
    if report.schema.is_some() {
        println!("  Schema: {}", output_dir.join(SCHEMA_FILE).display());
    }
    if let Some(ref import) = report.import {
        println!(
            "  Rows: {} exported from {} tables, {} imported",
            report.rows_exported,
            report.tables_exported,
            import.rows_written()
        );
        if !import.is_clean() {
            println!(
                "  Failed batches: {} ({} rows)",
                import.failed_batches(),
                import.rows_failed()
            );
        }
    }
    if let Some(ref storage) = report.storage {
        if storage.skipped {
            println!("  Storage: skipped (service keys missing)");
        } else {
            println!(
                "  Storage: {} buckets, {} migrated, {} updated, {} bytes",
                storage.buckets.len(),
                storage.migrated,
                storage.updated,
                storage.bytes_copied
            );
            if storage.failures() > 0 {
                println!("  Storage failures: {}", storage.failures());
            }
        }
    }
}

fn setup_logging(verbosity: &str, format: &str, to_stderr: bool) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false);

    // Keep stdout clean for --output-json.
    let result = match (format == "json", to_stderr) {
        (true, true) => subscriber.json().with_writer(std::io::stderr).try_init(),
        (true, false) => subscriber.json().try_init(),
        (false, true) => subscriber.with_writer(std::io::stderr).try_init(),
        (false, false) => subscriber.try_init(),
    };

    result.map_err(|e| e.to_string())
}

/// Cancel the returned token on SIGINT or SIGTERM.
#[cfg(unix)]
fn setup_signal_handler() -> CancellationToken {
    use tokio::signal::unix::{signal, SignalKind};

    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        let (mut sigint, mut sigterm) =
            match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
                (Ok(int), Ok(term)) => (int, term),
                _ => {
                    warn!("Signal handlers unavailable; Ctrl-C will abort immediately");
                    return;
                }
            };
        tokio::select! {
            _ = sigint.recv() => eprintln!("\nReceived SIGINT. Stopping after the current step..."),
            _ = sigterm.recv() => eprintln!("\nReceived SIGTERM. Stopping after the current step..."),
        }
        token.cancel();
    });

    cancel_token
}

/// Cancel the returned token on Ctrl-C.
#[cfg(not(unix))]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nReceived Ctrl-C. Stopping after the current step...");
            token.cancel();
        }
    });

    cancel_token
}
