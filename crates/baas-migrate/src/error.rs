//! Error types for the migration library.

use thiserror::Error;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Single configuration problem (bad URL, missing endpoint for a phase).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Every problem found while validating a configuration for a mode.
    #[error("Invalid configuration:\n  - {}", .0.join("\n  - "))]
    InvalidConfig(Vec<String>),

    /// One or both endpoints failed the connectivity probe.
    #[error("Connectivity check failed (source: {}, target: {})",
        .source_error.as_deref().unwrap_or("ok"),
        .target_error.as_deref().unwrap_or("ok"))]
    Connectivity {
        source_error: Option<String>,
        target_error: Option<String>,
    },

    /// Transport-level HTTP failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("Remote error ({status}): {message}")]
    Remote { status: u16, message: String },

    /// Data export or import failed for a specific table
    #[error("Transfer failed for table {table}: {message}")]
    Transfer { table: String, message: String },

    /// Object storage operation failed for a path.
    #[error("Storage error at {path}: {message}")]
    Storage { path: String, message: String },

    /// State file error
    #[error("State file error: {0}")]
    State(String),

    /// Config hash mismatch on resume
    #[error("Config has changed since last run - cannot resume. Remove the state file to start fresh.")]
    ConfigChanged,

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Migration was cancelled (SIGINT, etc.)
    #[error("Migration cancelled")]
    Cancelled,
}

impl MigrateError {
    /// Create a Remote error from a status code and response body.
    pub fn remote(status: u16, message: impl Into<String>) -> Self {
        MigrateError::Remote {
            status,
            message: message.into(),
        }
    }

    /// Create a Transfer error
    pub fn transfer(table: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::Transfer {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create a Storage error
    pub fn storage(path: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::Storage {
            path: path.into(),
            message: message.into(),
        }
    }

    /// True when the backend reported that the resource already exists.
    ///
    /// Bucket creation treats this as success.
    pub fn is_conflict(&self) -> bool {
        match self {
            MigrateError::Remote { status, message } => {
                *status == 409 || message.to_lowercase().contains("already exists")
            }
            _ => false,
        }
    }

    /// Process exit code for the CLI.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_)
            | MigrateError::InvalidConfig(_)
            | MigrateError::ConfigChanged => 1,
            MigrateError::Connectivity { .. } => 2,
            MigrateError::Http(_) | MigrateError::Remote { .. } => 3,
            MigrateError::Transfer { .. } => 4,
            MigrateError::Storage { .. } => 5,
            MigrateError::Json(_) => 6,
            MigrateError::Io(_) | MigrateError::State(_) => 7,
            MigrateError::Cancelled => 130,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_config_lists_every_problem() {
        let err = MigrateError::InvalidConfig(vec![
            "--source-url is required".into(),
            "--target-key is required".into(),
        ]);
        let text = err.to_string();
        assert!(text.contains("--source-url is required"));
        assert!(text.contains("--target-key is required"));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_connectivity_message_names_failing_side() {
        let err = MigrateError::Connectivity {
            source_error: None,
            target_error: Some("connection refused".into()),
        };
        assert_eq!(
            err.to_string(),
            "Connectivity check failed (source: ok, target: connection refused)"
        );
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_conflict_detection() {
        assert!(MigrateError::remote(409, "Duplicate").is_conflict());
        assert!(MigrateError::remote(400, "The resource already exists").is_conflict());
        assert!(!MigrateError::remote(500, "boom").is_conflict());
        assert!(!MigrateError::Cancelled.is_conflict());
    }
}
