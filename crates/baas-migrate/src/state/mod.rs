//! Step ledger for a migration run, optionally persisted for resume.
//!
//! Every phase is a [`StepResult`] moving `pending -> running -> completed`
//! or `error`. When the orchestrator has a state file the ledger is written
//! after each transition, so an interrupted run can skip the phases it
//! already finished.

use crate::error::{MigrateError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// One phase of a migration run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStep {
    Connectivity,
    Schema,
    Data,
    Storage,
}

impl MigrationStep {
    pub const ALL: [MigrationStep; 4] = [
        MigrationStep::Connectivity,
        MigrationStep::Schema,
        MigrationStep::Data,
        MigrationStep::Storage,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MigrationStep::Connectivity => "connectivity",
            MigrationStep::Schema => "schema",
            MigrationStep::Data => "data",
            MigrationStep::Storage => "storage",
        }
    }
}

impl fmt::Display for MigrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Step status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Error,
}

/// Overall run status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// State of a single step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    pub step: MigrationStep,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl StepResult {
    pub fn pending(step: MigrationStep) -> Self {
        Self {
            step,
            status: StepStatus::Pending,
            error: None,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn mark_running(&mut self) {
        self.status = StepStatus::Running;
        self.error = None;
        self.started_at = Some(Utc::now());
        self.completed_at = None;
    }

    pub fn mark_completed(&mut self) {
        self.status = StepStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    pub fn mark_failed(&mut self, error: &str) {
        self.status = StepStatus::Error;
        self.error = Some(error.to_string());
        self.completed_at = Some(Utc::now());
    }

    pub fn is_completed(&self) -> bool {
        self.status == StepStatus::Completed
    }
}

/// Migration ledger for resume capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationState {
    /// Unique run identifier.
    pub run_id: String,

    /// SHA256 hash of the configuration.
    pub config_hash: String,

    /// When the migration started.
    pub started_at: DateTime<Utc>,

    /// Current run status.
    pub status: RunStatus,

    /// One entry per step, in execution order.
    pub steps: Vec<StepResult>,

    /// When the migration finished (if finished).
    pub completed_at: Option<DateTime<Utc>>,
}

impl MigrationState {
    /// Create a ledger with every step pending.
    pub fn new(run_id: String, config_hash: String) -> Self {
        Self {
            run_id,
            config_hash,
            started_at: Utc::now(),
            status: RunStatus::Running,
            steps: MigrationStep::ALL.iter().map(|s| StepResult::pending(*s)).collect(),
            completed_at: None,
        }
    }

    /// Load a ledger from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            MigrateError::State(format!("cannot read {}: {}", path.display(), e))
        })?;
        let state: Self = serde_json::from_str(&content).map_err(|e| {
            MigrateError::State(format!("cannot parse {}: {}", path.display(), e))
        })?;
        Ok(state)
    }

    /// Save the ledger (atomic write through a temp file).
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)?;

        let temp_path = path.with_extension("tmp");
        std::fs::write(&temp_path, &content)?;
        std::fs::rename(&temp_path, path)?;

        Ok(())
    }

    /// Validate that the config hash matches for resume.
    pub fn validate_config(&self, config_hash: &str) -> Result<()> {
        if self.config_hash != config_hash {
            return Err(MigrateError::ConfigChanged);
        }
        Ok(())
    }

    /// Ledger entry for a step, created if an older file lacks it.
    pub fn step_mut(&mut self, step: MigrationStep) -> &mut StepResult {
        let idx = match self.steps.iter().position(|s| s.step == step) {
            Some(idx) => idx,
            None => {
                self.steps.push(StepResult::pending(step));
                self.steps.sort_by_key(|s| s.step);
                self.steps.iter().position(|s| s.step == step).unwrap_or(0)
            }
        };
        &mut self.steps[idx]
    }

    pub fn step(&self, step: MigrationStep) -> Option<&StepResult> {
        self.steps.iter().find(|s| s.step == step)
    }

    pub fn is_step_completed(&self, step: MigrationStep) -> bool {
        self.step(step).map(StepResult::is_completed).unwrap_or(false)
    }

    /// Put every unfinished step back to pending for another attempt.
    pub fn reset_unfinished(&mut self) {
        for step in &mut self.steps {
            if !step.is_completed() {
                *step = StepResult::pending(step.step);
            }
        }
        self.status = RunStatus::Running;
        self.completed_at = None;
    }

    pub fn mark_completed(&mut self) {
        self.status = RunStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    pub fn mark_failed(&mut self) {
        self.status = RunStatus::Failed;
        self.completed_at = Some(Utc::now());
    }

    pub fn mark_cancelled(&mut self) {
        self.status = RunStatus::Cancelled;
        self.completed_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_new_state_has_every_step_pending() {
        let state = MigrationState::new("run".into(), "hash".into());
        assert_eq!(state.steps.len(), 4);
        assert!(state.steps.iter().all(|s| s.status == StepStatus::Pending));
        assert_eq!(state.steps[0].step, MigrationStep::Connectivity);
        assert_eq!(state.steps[3].step, MigrationStep::Storage);
    }

    #[test]
    fn test_step_transitions() {
        let mut state = MigrationState::new("run".into(), "hash".into());
        let step = state.step_mut(MigrationStep::Data);
        step.mark_running();
        assert_eq!(step.status, StepStatus::Running);
        assert!(step.started_at.is_some());

        step.mark_failed("batch 0-99 rejected");
        assert_eq!(step.status, StepStatus::Error);
        assert_eq!(step.error.as_deref(), Some("batch 0-99 rejected"));

        step.mark_running();
        assert!(step.error.is_none());
        step.mark_completed();
        assert!(state.is_step_completed(MigrationStep::Data));
        assert!(!state.is_step_completed(MigrationStep::Storage));
    }

    #[test]
    fn test_state_save_load() {
        let mut state = MigrationState::new("test-run".into(), "abc123".into());
        state.step_mut(MigrationStep::Schema).mark_completed();
        state.step_mut(MigrationStep::Data).mark_failed("boom");

        let file = NamedTempFile::new().unwrap();
        state.save(file.path()).unwrap();

        let content = std::fs::read_to_string(file.path()).unwrap();
        assert!(content.contains("\"run_id\""));
        assert!(content.contains('\n'), "state file is pretty-printed");

        let loaded = MigrationState::load(file.path()).unwrap();
        assert_eq!(loaded.run_id, "test-run");
        assert_eq!(loaded.config_hash, "abc123");
        assert!(loaded.is_step_completed(MigrationStep::Schema));
        assert_eq!(
            loaded.step(MigrationStep::Data).and_then(|s| s.error.clone()),
            Some("boom".to_string())
        );
    }

    #[test]
    fn test_config_validation() {
        let state = MigrationState::new("test-run".into(), "abc123".into());
        assert!(state.validate_config("abc123").is_ok());
        assert!(matches!(
            state.validate_config("different"),
            Err(MigrateError::ConfigChanged)
        ));
    }

    #[test]
    fn test_reset_unfinished_keeps_completed_steps() {
        let mut state = MigrationState::new("run".into(), "hash".into());
        state.step_mut(MigrationStep::Connectivity).mark_completed();
        state.step_mut(MigrationStep::Data).mark_failed("boom");
        state.mark_failed();

        state.reset_unfinished();
        assert_eq!(state.status, RunStatus::Running);
        assert!(state.is_step_completed(MigrationStep::Connectivity));
        let data = state.step(MigrationStep::Data).unwrap();
        assert_eq!(data.status, StepStatus::Pending);
        assert!(data.error.is_none());
    }

    #[test]
    fn test_load_missing_file_is_state_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = MigrationState::load(dir.path().join("absent.json"));
        assert!(matches!(result, Err(MigrateError::State(_))));
    }

    #[test]
    fn test_step_mut_restores_missing_entry() {
        let mut state = MigrationState::new("run".into(), "hash".into());
        state.steps.retain(|s| s.step != MigrationStep::Schema);
        state.step_mut(MigrationStep::Schema).mark_completed();
        let order: Vec<_> = state.steps.iter().map(|s| s.step).collect();
        assert_eq!(order, MigrationStep::ALL.to_vec());
    }
}
