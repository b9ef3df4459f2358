//! Caller-side retry for one target
//!
//! The coordinator never retries. Wrapping a target here retries its whole
//! publish call on transient failures before the coordinator sees the result.

use crate::core::retry::RetryPolicy;
use crate::core::traits::{PublicationTarget, PublishReceipt};
use crate::core::types::ArtifactFileSet;
use crate::descriptor::ModuleDescriptor;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

/// Decorator re-running a target's publish on transient failures
pub struct RetryingTarget {
    inner: Arc<dyn PublicationTarget>,
    policy: RetryPolicy,
}

impl RetryingTarget {
    pub fn new(inner: Arc<dyn PublicationTarget>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl PublicationTarget for RetryingTarget {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn publish(
        &self,
        descriptor: &ModuleDescriptor,
        artifacts: &ArtifactFileSet,
        descriptor_location: &Path,
    ) -> anyhow::Result<PublishReceipt> {
        self.policy
            .run(|| self.inner.publish(descriptor, artifacts, descriptor_location))
            .await
    }
}
