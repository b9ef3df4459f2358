//! HTTP Target - remote repository accepting PUT uploads
//!
//! Artifacts go to `url/group-path/name/version/file` where the group's dots
//! become path segments. Artifacts upload in parallel (bounded by
//! `max_concurrency`); the descriptor is uploaded only after all of them
//! succeeded.

use crate::core::retry::TransferError;
use crate::core::traits::{PublicationTarget, PublishReceipt};
use crate::core::types::{ArtifactFileSet, ModuleIdentity};
use crate::descriptor::ModuleDescriptor;
use crate::targets::descriptor_file_name;
use anyhow::Context;
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::debug;

pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Remote repository reached over HTTP PUT
pub struct HttpTarget {
    name: String,
    base_url: String,
    client: reqwest::Client,
    token: Option<Arc<SecretString>>,
    max_concurrency: usize,
}

impl HttpTarget {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            name: name.into(),
            base_url: url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            token: None,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    /// Send `Authorization: Bearer <token>` with every upload
    pub fn with_token(mut self, token: SecretString) -> Self {
        self.token = Some(Arc::new(token));
        self
    }

    /// Parallel uploads within this target; at least 1
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// URL of the directory holding one module version
    pub fn module_url(&self, module: &ModuleIdentity) -> String {
        format!(
            "{}/{}/{}/{}",
            self.base_url,
            module.group().replace('.', "/"),
            module.name(),
            module.version()
        )
    }

    async fn upload(
        client: reqwest::Client,
        token: Option<Arc<SecretString>>,
        url: String,
        source: PathBuf,
    ) -> anyhow::Result<()> {
        let body = tokio::fs::read(&source)
            .await
            .with_context(|| format!("failed to read {}", source.display()))?;

        let mut request = client.put(&url).body(body);
        if let Some(token) = &token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(source) => return Err(TransferError::Transport { url, source }.into()),
        };

        let status = response.status();
        if !status.is_success() {
            return Err(TransferError::Status { url, status }.into());
        }

        debug!(url = %url, status = status.as_u16(), "uploaded");
        Ok(())
    }
}

#[async_trait]
impl PublicationTarget for HttpTarget {
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
        let module_url = self.module_url(module);

        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks = Vec::with_capacity(artifacts.len());

        for file in artifacts.iter() {
            let file_name = file.artifact.published_file_name(module.version());
            let url = format!("{}/{}", module_url, file_name);
            let semaphore = Arc::clone(&semaphore);
            let client = self.client.clone();
            let token = self.token.clone();
            let source = file.path.clone();

            let task = tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await?;
                Self::upload(client, token, url, source).await
            });

            tasks.push((file_name, task));
        }

        // Wait for every upload before deciding; report the first failure
        let mut published_files = Vec::with_capacity(tasks.len() + 1);
        let mut first_error = None;
        for (file_name, task) in tasks {
            match task.await {
                Ok(Ok(())) => published_files.push(file_name),
                Ok(Err(e)) => {
                    first_error.get_or_insert(e);
                }
                Err(e) => {
                    first_error
                        .get_or_insert(anyhow::anyhow!("upload of {} aborted: {}", file_name, e));
                }
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        let file_name = descriptor_file_name(module);
        Self::upload(
            self.client.clone(),
            self.token.clone(),
            format!("{}/{}", module_url, file_name),
            descriptor_location.to_path_buf(),
        )
        .await?;
        published_files.push(file_name);

        Ok(PublishReceipt {
            location: Some(module_url),
            published_files,
        })
    }
}
