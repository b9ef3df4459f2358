//! Collaborator contracts consumed by the publication pipeline
//!
//! This module defines the seams where repository transports and descriptor
//! formats plug in. The core never depends on a concrete implementation.

use crate::core::types::ArtifactFileSet;
use crate::descriptor::ModuleDescriptor;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ============================================================================
// Publishing
// ============================================================================

/// What a target reports back after acknowledging a publish
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishReceipt {
    /// Where the module ended up (directory, URL, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    /// Files written by the target, descriptor included
    #[serde(default)]
    pub published_files: Vec<String>,
}

// ============================================================================
// Publication Target Trait
// ============================================================================

/// One repository a module can be published to
///
/// Implementations own their connection/session and decide the protocol.
/// Any error they return is treated as an opaque cause by the coordinator.
///
/// # Examples
///
/// ```no_run
/// # use module_publisher::core::{ArtifactFileSet, PublicationTarget, PublishReceipt};
/// # use module_publisher::descriptor::ModuleDescriptor;
/// # use async_trait::async_trait;
/// # use std::path::Path;
/// struct NullTarget;
///
/// #[async_trait]
/// impl PublicationTarget for NullTarget {
///     fn name(&self) -> &str {
///         "null"
///     }
///
///     async fn publish(
///         &self,
///         _descriptor: &ModuleDescriptor,
///         _artifacts: &ArtifactFileSet,
///         _descriptor_location: &Path,
///     ) -> anyhow::Result<PublishReceipt> {
///         Ok(PublishReceipt::default())
///     }
/// }
/// ```
#[async_trait]
pub trait PublicationTarget: Send + Sync {
    /// Target name, unique within one publish request
    fn name(&self) -> &str;

    /// Publish the descriptor and its artifacts
    ///
    /// # Arguments
    ///
    /// * `descriptor` - The immutable module descriptor
    /// * `artifacts` - Files to upload
    /// * `descriptor_location` - Where the serialized descriptor was written
    async fn publish(
        &self,
        descriptor: &ModuleDescriptor,
        artifacts: &ArtifactFileSet,
        descriptor_location: &Path,
    ) -> anyhow::Result<PublishReceipt>;
}

// ============================================================================
// Descriptor Codec Trait
// ============================================================================

/// Serializes a module descriptor to a local file
#[async_trait]
pub trait DescriptorCodec: Send + Sync {
    /// Format name (e.g., "json")
    fn format(&self) -> &str;

    /// Write `descriptor` to `destination`
    async fn write(&self, descriptor: &ModuleDescriptor, destination: &Path) -> anyhow::Result<()>;
}
