//! Error handling for descriptor building and publishing
//!
//! This module provides the error taxonomy with recovery guidance
//! using the thiserror crate for ergonomic error handling.

use std::path::PathBuf;
use thiserror::Error;

/// Broad class of a [`PublishError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Inconsistent configuration model; never partially honored
    Structural,
    /// Caller supplied an unusable request
    Request,
    /// Raised by an external collaborator (codec, target, state file)
    Io,
    /// Publish declaration could not be loaded
    Config,
}

/// Main error type for descriptor building and publishing operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    // Structural errors
    #[error("configuration '{name}' is already defined")]
    DuplicateConfiguration { name: String },

    #[error("configuration '{configuration}' extends unknown configuration '{parent}'")]
    UnknownParent {
        configuration: String,
        parent: String,
    },

    #[error("configuration '{name}' does not exist")]
    UnknownConfiguration { name: String },

    #[error("cyclic configuration inheritance: {}", path.join(" -> "))]
    CyclicInheritance { path: Vec<String> },

    #[error("artifacts {first} and {second} would both be published as '{file_name}'")]
    ConflictingArtifacts {
        file_name: String,
        first: String,
        second: String,
    },

    // Request errors
    #[error("no configurations were requested for publication")]
    EmptyPublication,

    #[error("module {field} must not be empty")]
    InvalidIdentity { field: &'static str },

    #[error("configuration name must not be empty")]
    InvalidConfigurationName,

    #[error("publication target '{target}' is listed more than once")]
    DuplicateTarget { target: String },

    // I/O errors
    #[error("failed to write module descriptor to {}: {message}", path.display())]
    DescriptorWrite { path: PathBuf, message: String },

    #[error("[{target}] publish failed: {message}")]
    Target { target: String, message: String },

    #[error("publish cancelled before: {}", remaining.join(", "))]
    Cancelled { remaining: Vec<String> },

    #[error("publish state error: {message}")]
    State { message: String },

    // Configuration errors
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl PublishError {
    /// Wrap an opaque target failure, keeping the full cause chain in the message
    pub fn target(target: impl Into<String>, cause: &anyhow::Error) -> Self {
        Self::Target {
            target: target.into(),
            message: format!("{:#}", cause),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Get the category of this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::DuplicateConfiguration { .. }
            | Self::UnknownParent { .. }
            | Self::UnknownConfiguration { .. }
            | Self::CyclicInheritance { .. }
            | Self::ConflictingArtifacts { .. } => ErrorCategory::Structural,
            Self::EmptyPublication
            | Self::InvalidIdentity { .. }
            | Self::InvalidConfigurationName
            | Self::DuplicateTarget { .. }
            | Self::Cancelled { .. } => ErrorCategory::Request,
            Self::DescriptorWrite { .. } | Self::Target { .. } | Self::State { .. } => {
                ErrorCategory::Io
            }
            Self::Config { .. } => ErrorCategory::Config,
        }
    }

    /// Get the publication target associated with this error, if any
    pub fn target_name(&self) -> Option<&str> {
        match self {
            Self::Target { target, .. } | Self::DuplicateTarget { target } => Some(target),
            _ => None,
        }
    }

    /// Check if re-invoking the same request could succeed
    ///
    /// Only I/O failures qualify; retry policy itself belongs to the caller.
    pub fn is_recoverable(&self) -> bool {
        self.category() == ErrorCategory::Io
    }

    /// Get suggested actions for this error
    pub fn suggested_actions(&self) -> Vec<&'static str> {
        match self {
            Self::DuplicateConfiguration { .. } => {
                vec!["Rename one of the configurations or merge their declarations"]
            }
            Self::UnknownParent { .. } => vec![
                "Declare the parent configuration before the configuration extending it",
                "Check the extendsFrom entry for typos (names are case-sensitive)",
            ],
            Self::UnknownConfiguration { .. } => {
                vec!["Check the requested configuration names against the declared ones"]
            }
            Self::CyclicInheritance { .. } => {
                vec!["Remove one extendsFrom edge on the reported path"]
            }
            Self::ConflictingArtifacts { .. } => vec![
                "Give one of the artifacts a classifier or a distinct name",
                "Publish the configurations declaring them separately",
            ],
            Self::EmptyPublication => {
                vec!["Request at least one configuration (publish.configurations)"]
            }
            Self::InvalidIdentity { .. } => {
                vec!["Set module group, name and version"]
            }
            Self::InvalidConfigurationName => vec!["Give every configuration a name"],
            Self::DuplicateTarget { .. } => vec!["Give every publication target a unique name"],
            Self::DescriptorWrite { .. } => vec![
                "Check that the descriptor destination directory is writable",
                "Check available disk space",
            ],
            Self::Target { .. } => vec![
                "Check the target's error message and connectivity",
                "Re-run with the remaining targets only (resume) to avoid re-publishing",
            ],
            Self::Cancelled { .. } => {
                vec!["Publish again with resume to reach the remaining targets"]
            }
            Self::State { .. } => vec!["Delete the publish state file and publish again"],
            Self::Config { .. } => vec![
                "Check module-publish.yaml for syntax errors and unknown keys",
                "Check that files referenced by extends exist",
            ],
        }
    }

    /// Get error code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::DuplicateConfiguration { .. } => "DUPLICATE_CONFIGURATION",
            Self::UnknownParent { .. } => "UNKNOWN_PARENT",
            Self::UnknownConfiguration { .. } => "UNKNOWN_CONFIGURATION",
            Self::CyclicInheritance { .. } => "CYCLIC_INHERITANCE",
            Self::ConflictingArtifacts { .. } => "CONFLICTING_ARTIFACTS",
            Self::EmptyPublication => "EMPTY_PUBLICATION",
            Self::InvalidIdentity { .. } => "INVALID_IDENTITY",
            Self::InvalidConfigurationName => "INVALID_CONFIGURATION_NAME",
            Self::DuplicateTarget { .. } => "DUPLICATE_TARGET",
            Self::DescriptorWrite { .. } => "DESCRIPTOR_WRITE_FAILED",
            Self::Target { .. } => "PUBLISH_FAILED",
            Self::Cancelled { .. } => "CANCELLED",
            Self::State { .. } => "STATE_ERROR",
            Self::Config { .. } => "CONFIG_ERROR",
        }
    }
}
