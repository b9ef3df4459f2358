//! State machine for tracking a publish run with resume capability
//!
//! The run is persisted after every change with an atomic temp-file write,
//! so an interrupted process leaves behind which targets already
//! acknowledged the module.

use crate::core::error::PublishError;
use crate::core::types::ModuleIdentity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

/// Publishing state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PublishState {
    Initial,
    WritingDescriptor,
    Publishing,
    Completed,
    /// Some targets acknowledged before one failed
    PartiallyPublished,
    Failed,
    Cancelled,
}

/// State transition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateTransition {
    pub from: PublishState,
    pub to: PublishState,
    pub timestamp: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

/// Persisted publish run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PublishStateData {
    pub run_id: Uuid,

    pub current_state: PublishState,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<ModuleIdentity>,

    /// Targets that acknowledged the module, in publish order
    #[serde(default)]
    pub succeeded_targets: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_target: Option<String>,

    pub transitions: Vec<StateTransition>,

    pub can_resume: bool,

    /// Last error message (if failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// State machine for tracking one module's publish run
pub struct PublishStateMachine {
    run_id: Uuid,
    current_state: PublishState,
    transitions: Vec<StateTransition>,
    state_file_path: PathBuf,
    module: Option<ModuleIdentity>,
    succeeded_targets: Vec<String>,
    failed_target: Option<String>,
    error: Option<String>,
}

fn state_error(context: &str, path: &Path, e: impl std::fmt::Display) -> PublishError {
    PublishError::State {
        message: format!("{} {}: {}", context, path.display(), e),
    }
}

impl PublishStateMachine {
    /// Create a state machine persisting to `state_file_path`
    pub fn new<P: AsRef<Path>>(state_file_path: P) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            current_state: PublishState::Initial,
            transitions: Vec::new(),
            state_file_path: state_file_path.as_ref().to_path_buf(),
            module: None,
            succeeded_targets: Vec::new(),
            failed_target: None,
            error: None,
        }
    }

    /// Start (or continue) a run for `module`
    ///
    /// Progress recorded for the same module in a resumable state is kept;
    /// anything else starts a fresh run.
    pub async fn begin(&mut self, module: &ModuleIdentity) -> Result<(), PublishError> {
        let continuing = self.can_resume() && self.module.as_ref() == Some(module);
        if !continuing {
            self.run_id = Uuid::new_v4();
            self.transitions.clear();
            self.succeeded_targets.clear();
            self.current_state = PublishState::Initial;
        }
        self.module = Some(module.clone());
        self.failed_target = None;
        self.error = None;

        let mut metadata = HashMap::new();
        metadata.insert(
            "module".to_string(),
            serde_json::Value::String(module.to_string()),
        );
        self.transition(PublishState::WritingDescriptor, Some(metadata))
            .await
    }

    /// Transition to a new state
    pub async fn transition(
        &mut self,
        to: PublishState,
        metadata: Option<HashMap<String, serde_json::Value>>,
    ) -> Result<(), PublishError> {
        if let Some(meta) = &metadata
            && let Some(serde_json::Value::String(error)) = meta.get("error")
        {
            self.error = Some(error.clone());
        }

        self.transitions.push(StateTransition {
            from: self.current_state,
            to,
            timestamp: Utc::now(),
            metadata,
        });
        self.current_state = to;

        self.save().await
    }

    /// Record that a target acknowledged the module
    pub async fn record_success(&mut self, target: &str) -> Result<(), PublishError> {
        if !self.succeeded_targets.iter().any(|t| t == target) {
            self.succeeded_targets.push(target.to_string());
        }
        self.save().await
    }

    /// Record a failure and move to `Failed` or `PartiallyPublished`
    pub async fn record_failure(
        &mut self,
        target: Option<&str>,
        error: &PublishError,
    ) -> Result<(), PublishError> {
        self.failed_target = target.map(str::to_string);

        let mut metadata = HashMap::new();
        metadata.insert(
            "error".to_string(),
            serde_json::Value::String(error.to_string()),
        );
        if let Some(target) = target {
            metadata.insert(
                "target".to_string(),
                serde_json::Value::String(target.to_string()),
            );
        }

        let to = if self.succeeded_targets.is_empty() {
            PublishState::Failed
        } else {
            PublishState::PartiallyPublished
        };
        self.transition(to, Some(metadata)).await
    }

    /// Get current state
    pub fn get_state(&self) -> PublishState {
        self.current_state
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn succeeded_targets(&self) -> &[String] {
        &self.succeeded_targets
    }

    /// Get state data
    pub fn get_state_data(&self) -> PublishStateData {
        PublishStateData {
            run_id: self.run_id,
            current_state: self.current_state,
            module: self.module.clone(),
            succeeded_targets: self.succeeded_targets.clone(),
            failed_target: self.failed_target.clone(),
            transitions: self.transitions.clone(),
            can_resume: self.can_resume(),
            error: self.error.clone(),
        }
    }

    /// Check if state can be resumed
    pub fn can_resume(&self) -> bool {
        !matches!(
            self.current_state,
            PublishState::Initial | PublishState::Completed
        )
    }

    /// Narrow `targets` to the ones that have not acknowledged `module` yet
    ///
    /// Progress recorded for a different module identity is ignored.
    pub fn remaining_targets<'a>(
        &self,
        module: &ModuleIdentity,
        targets: impl IntoIterator<Item = &'a str>,
    ) -> Vec<&'a str> {
        let recorded = self.module.as_ref() == Some(module);
        targets
            .into_iter()
            .filter(|t| !recorded || !self.succeeded_targets.iter().any(|s| s == t))
            .collect()
    }

    /// Restore state from file
    pub async fn restore(&mut self) -> Result<bool, PublishError> {
        if !self.state_file_path.exists() {
            return Ok(false);
        }

        let content = fs::read_to_string(&self.state_file_path)
            .await
            .map_err(|e| state_error("failed to read", &self.state_file_path, e))?;
        let data: PublishStateData = serde_json::from_str(&content)
            .map_err(|e| state_error("invalid state file", &self.state_file_path, e))?;

        self.run_id = data.run_id;
        self.current_state = data.current_state;
        self.module = data.module;
        self.succeeded_targets = data.succeeded_targets;
        self.failed_target = data.failed_target;
        self.error = data.error;
        self.transitions = data.transitions;

        Ok(true)
    }

    /// Save state to file (atomic operation)
    async fn save(&self) -> Result<(), PublishError> {
        let data = self.get_state_data();

        let json = serde_json::to_string_pretty(&data)
            .map_err(|e| state_error("failed to encode", &self.state_file_path, e))?;

        if let Some(parent) = self.state_file_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                state_error("failed to create directory for", &self.state_file_path, e)
            })?;
        }

        // Atomic write: write to temp file, then rename
        let temp_file = self.state_file_path.with_extension("json.tmp");
        fs::write(&temp_file, json)
            .await
            .map_err(|e| state_error("failed to write", &temp_file, e))?;
        fs::rename(&temp_file, &self.state_file_path)
            .await
            .map_err(|e| state_error("failed to replace", &self.state_file_path, e))?;

        Ok(())
    }

    /// Clear state file
    pub async fn clear(&mut self) -> Result<(), PublishError> {
        if self.state_file_path.exists() {
            fs::remove_file(&self.state_file_path)
                .await
                .map_err(|e| state_error("failed to remove", &self.state_file_path, e))?;
        }

        self.run_id = Uuid::new_v4();
        self.current_state = PublishState::Initial;
        self.transitions.clear();
        self.module = None;
        self.succeeded_targets.clear();
        self.failed_target = None;
        self.error = None;

        Ok(())
    }
}
