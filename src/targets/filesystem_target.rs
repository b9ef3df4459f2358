//! Filesystem Target - local directory repository
//!
//! Layout: `root/group/name/version/` holding each artifact under its
//! published file name plus the module descriptor.

use crate::core::traits::{PublicationTarget, PublishReceipt};
use crate::core::types::{ArtifactFileSet, ModuleIdentity};
use crate::descriptor::ModuleDescriptor;
use crate::targets::descriptor_file_name;
use anyhow::Context;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Local directory repository
pub struct FilesystemTarget {
    name: String,
    root: PathBuf,
}

impl FilesystemTarget {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one module version
    pub fn module_dir(&self, module: &ModuleIdentity) -> PathBuf {
        self.root
            .join(module.group())
            .join(module.name())
            .join(module.version())
    }
}

#[async_trait]
impl PublicationTarget for FilesystemTarget {
    fn name(&self) -> &str {
        &self.name
    }

    async fn publish(
        &self,
        descriptor: &ModuleDescriptor,
        artifacts: &ArtifactFileSet,
        descriptor_location: &Path,
    ) -> anyhow::Result<PublishReceipt> {
        let module = descriptor.module();
        let dir = self.module_dir(module);
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("failed to create {}", dir.display()))?;

        let mut published_files = Vec::with_capacity(artifacts.len() + 1);
        for file in artifacts.iter() {
            let file_name = file.artifact.published_file_name(module.version());
            let destination = dir.join(&file_name);
            fs::copy(&file.path, &destination).await.with_context(|| {
                format!(
                    "failed to copy artifact {} to {}",
                    file.path.display(),
                    destination.display()
                )
            })?;
            debug!(target_name = %self.name, file = %file_name, "artifact copied");
            published_files.push(file_name);
        }

        // Descriptor last: its presence marks the version as complete
        let file_name = descriptor_file_name(module);
        let destination = dir.join(&file_name);
        fs::copy(descriptor_location, &destination)
            .await
            .with_context(|| {
                format!(
                    "failed to copy descriptor {} to {}",
                    descriptor_location.display(),
                    destination.display()
                )
            })?;
        published_files.push(file_name);

        Ok(PublishReceipt {
            location: Some(dir.display().to_string()),
            published_files,
        })
    }
}
