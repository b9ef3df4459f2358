//! JSON descriptor codec
//!
//! Writes are atomic: the document goes to a sibling temp file which is
//! then renamed over the destination.

use crate::core::traits::DescriptorCodec;
use crate::descriptor::module_descriptor::ModuleDescriptor;
use anyhow::Context;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Default codec: pretty-printed JSON
#[derive(Debug, Clone, Copy)]
pub struct JsonDescriptorCodec {
    pretty: bool,
}

impl Default for JsonDescriptorCodec {
    fn default() -> Self {
        Self { pretty: true }
    }
}

impl JsonDescriptorCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-line output
    pub fn compact() -> Self {
        Self { pretty: false }
    }

    pub fn encode(&self, descriptor: &ModuleDescriptor) -> anyhow::Result<String> {
        let json = if self.pretty {
            serde_json::to_string_pretty(descriptor)?
        } else {
            serde_json::to_string(descriptor)?
        };
        Ok(json)
    }

    /// Read a descriptor previously written by this codec
    pub async fn read(&self, source: &Path) -> anyhow::Result<ModuleDescriptor> {
        let content = fs::read_to_string(source)
            .await
            .with_context(|| format!("failed to read {}", source.display()))?;
        let descriptor = serde_json::from_str(&content)
            .with_context(|| format!("invalid module descriptor in {}", source.display()))?;
        Ok(descriptor)
    }
}

fn temp_path(destination: &Path) -> PathBuf {
    let mut file_name = destination
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    file_name.push(".tmp");
    destination.with_file_name(file_name)
}

#[async_trait]
impl DescriptorCodec for JsonDescriptorCodec {
    fn format(&self) -> &str {
        "json"
    }

    async fn write(&self, descriptor: &ModuleDescriptor, destination: &Path) -> anyhow::Result<()> {
        let json = self.encode(descriptor)?;

        if let Some(parent) = destination.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let temp_file = temp_path(destination);
        fs::write(&temp_file, json)
            .await
            .with_context(|| format!("failed to write {}", temp_file.display()))?;
        fs::rename(&temp_file, destination)
            .await
            .with_context(|| format!("failed to move descriptor into {}", destination.display()))?;

        Ok(())
    }
}
