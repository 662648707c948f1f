//! Configuration and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::{MigrateError, Result};
use sha2::{Digest, Sha256};

impl MigrationConfig {
    /// Every problem with this configuration for the given mode.
    pub fn validation_errors(&self, mode: MigrationMode) -> Vec<String> {
        validation::validate(self, mode)
    }

    /// Validate the configuration, returning all problems at once.
    pub fn validate(&self, mode: MigrationMode) -> Result<()> {
        let errors = self.validation_errors(mode);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(MigrateError::InvalidConfig(errors))
        }
    }

    /// Every disagreement between this configuration and a run's options.
    pub fn selection_errors(&self, options: &MigrationOptions) -> Vec<String> {
        validation::validate_selection(self, options)
    }

    /// SHA256 over the endpoints and storage settings, used to validate resume.
    ///
    /// Keys are part of the hash so a state file is never reused against a
    /// different project that happens to share a URL.
    pub fn hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.source.url.as_bytes());
        hasher.update(self.source.anon_key.as_bytes());
        if let Some(target) = &self.target {
            hasher.update(b"\0target\0");
            hasher.update(target.url.as_bytes());
            hasher.update(target.anon_key.as_bytes());
        }
        hasher.update([self.include_storage as u8]);
        if let Some(bucket) = &self.storage_bucket {
            hasher.update(bucket.as_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

impl MigrationOptions {
    /// Every problem with these options.
    pub fn validation_errors(&self) -> Vec<String> {
        validation::validate_options(self)
    }
}
