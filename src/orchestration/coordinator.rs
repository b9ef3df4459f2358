//! Publication Coordinator - publishes one descriptor to an ordered list of
//! targets
//!
//! Features:
//! - Descriptor written before any target is touched
//! - Strictly sequential targets, in declared order
//! - Fail-fast: the first failing target stops the run
//! - Cancellation checked between targets
//! - Optional progress tracking for resume

use crate::core::error::PublishError;
use crate::core::state_machine::{PublishState, PublishStateMachine};
use crate::core::traits::{DescriptorCodec, PublicationTarget, PublishReceipt};
use crate::core::types::{ArtifactFileSet, ModuleIdentity};
use crate::descriptor::ModuleDescriptor;
use crate::orchestration::cancellation::CancellationSignal;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

// ============================================================================
// Request
// ============================================================================

/// The coordinator's unit of work
///
/// Created per publish invocation and consumed by it.
pub struct PublishRequest {
    descriptor: Arc<ModuleDescriptor>,
    artifacts: ArtifactFileSet,
    targets: Vec<Arc<dyn PublicationTarget>>,
    descriptor_destination: PathBuf,
}

impl PublishRequest {
    /// Create a request
    ///
    /// # Errors
    ///
    /// * `DuplicateTarget` - two targets share a name; outcomes identify
    ///   targets by name
    pub fn new(
        descriptor: Arc<ModuleDescriptor>,
        artifacts: ArtifactFileSet,
        targets: Vec<Arc<dyn PublicationTarget>>,
        descriptor_destination: impl Into<PathBuf>,
    ) -> Result<Self, PublishError> {
        let mut names = HashSet::new();
        for target in &targets {
            if !names.insert(target.name()) {
                return Err(PublishError::DuplicateTarget {
                    target: target.name().to_string(),
                });
            }
        }

        Ok(Self {
            descriptor,
            artifacts,
            targets,
            descriptor_destination: descriptor_destination.into(),
        })
    }

    pub fn descriptor(&self) -> &ModuleDescriptor {
        &self.descriptor
    }

    pub fn artifacts(&self) -> &ArtifactFileSet {
        &self.artifacts
    }

    pub fn descriptor_destination(&self) -> &Path {
        &self.descriptor_destination
    }

    /// Target names in publish order
    pub fn target_names(&self) -> Vec<&str> {
        self.targets.iter().map(|t| t.name()).collect()
    }
}

// ============================================================================
// Outcome
// ============================================================================

/// Summary of how a publish run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishStatus {
    /// Every target acknowledged the publish
    Completed,
    /// Targets before the failed one succeeded; later ones were not attempted
    TargetFailed,
    /// Nothing was attempted
    DescriptorWriteFailed,
    /// Stopped between targets by the cancellation signal
    Cancelled,
}

/// Per-call record of which targets succeeded, which failed, and why
#[derive(Debug, Clone, PartialEq)]
pub struct PublishOutcome {
    pub module: ModuleIdentity,

    /// Acknowledged targets, in publish order
    pub succeeded_targets: Vec<String>,

    pub failed_target: Option<String>,

    pub cause: Option<PublishError>,

    /// Targets never invoked (after a failure or cancellation)
    pub skipped_targets: Vec<String>,

    /// Receipts of the succeeded targets
    pub receipts: HashMap<String, PublishReceipt>,

    pub cancelled: bool,

    pub duration_ms: u64,
}

impl PublishOutcome {
    fn new(module: ModuleIdentity) -> Self {
        Self {
            module,
            succeeded_targets: Vec::new(),
            failed_target: None,
            cause: None,
            skipped_targets: Vec::new(),
            receipts: HashMap::new(),
            cancelled: false,
            duration_ms: 0,
        }
    }

    pub fn status(&self) -> PublishStatus {
        if matches!(self.cause, Some(PublishError::DescriptorWrite { .. })) {
            PublishStatus::DescriptorWriteFailed
        } else if self.failed_target.is_some() {
            PublishStatus::TargetFailed
        } else if self.cancelled {
            PublishStatus::Cancelled
        } else {
            PublishStatus::Completed
        }
    }

    pub fn is_success(&self) -> bool {
        self.status() == PublishStatus::Completed
    }

    /// Turn a failed or cancelled outcome into its error
    pub fn into_result(self) -> Result<Self, PublishError> {
        if let Some(cause) = &self.cause {
            return Err(cause.clone());
        }
        if self.cancelled {
            return Err(PublishError::Cancelled {
                remaining: self.skipped_targets,
            });
        }
        Ok(self)
    }
}

// ============================================================================
// Coordinator
// ============================================================================

/// Drives the publish fan-out of one descriptor
pub struct PublicationCoordinator {
    codec: Arc<dyn DescriptorCodec>,
    cancellation: CancellationSignal,
}

impl PublicationCoordinator {
    pub fn new(codec: Arc<dyn DescriptorCodec>) -> Self {
        Self {
            codec,
            cancellation: CancellationSignal::new(),
        }
    }

    /// Use an externally owned cancellation signal
    pub fn with_cancellation(mut self, cancellation: CancellationSignal) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn cancellation(&self) -> &CancellationSignal {
        &self.cancellation
    }

    /// Publish a request
    ///
    /// Never returns early with an error: every failure mode is reported in
    /// the outcome (see [`PublishOutcome::status`]).
    pub async fn publish(&self, request: PublishRequest) -> PublishOutcome {
        self.run(request, None).await
    }

    /// Publish a request and record progress in `state`
    ///
    /// State persistence failures are logged and do not affect the outcome.
    pub async fn publish_tracked(
        &self,
        request: PublishRequest,
        state: &mut PublishStateMachine,
    ) -> PublishOutcome {
        self.run(request, Some(state)).await
    }

    async fn run(
        &self,
        request: PublishRequest,
        mut state: Option<&mut PublishStateMachine>,
    ) -> PublishOutcome {
        let start = Instant::now();
        let module = request.descriptor.module().clone();
        let mut outcome = PublishOutcome::new(module.clone());

        if let Some(state) = state.as_deref_mut() {
            track(state.begin(&module).await);
        }

        info!(
            module = %module,
            destination = %request.descriptor_destination.display(),
            format = self.codec.format(),
            "writing module descriptor"
        );
        if let Err(e) = self
            .codec
            .write(&request.descriptor, &request.descriptor_destination)
            .await
        {
            let cause = PublishError::DescriptorWrite {
                path: request.descriptor_destination.clone(),
                message: format!("{:#}", e),
            };
            error!(
                module = %module,
                error = %cause,
                "descriptor write failed; no target attempted"
            );

            if let Some(state) = state.as_deref_mut() {
                track(state.record_failure(None, &cause).await);
            }
            outcome.skipped_targets = request
                .targets
                .iter()
                .map(|t| t.name().to_string())
                .collect();
            outcome.cause = Some(cause);
            outcome.duration_ms = start.elapsed().as_millis() as u64;
            return outcome;
        }

        if let Some(state) = state.as_deref_mut() {
            track(state.transition(PublishState::Publishing, None).await);
        }

        for (index, target) in request.targets.iter().enumerate() {
            if self.cancellation.is_cancelled() {
                outcome.cancelled = true;
                outcome.skipped_targets = request.targets[index..]
                    .iter()
                    .map(|t| t.name().to_string())
                    .collect();
                warn!(
                    module = %module,
                    skipped = ?outcome.skipped_targets,
                    "publish cancelled"
                );
                break;
            }

            let name = target.name();
            info!(module = %module, target_name = name, "publishing to target");

            match target
                .publish(&request.descriptor, &request.artifacts, &request.descriptor_destination)
                .await
            {
                Ok(receipt) => {
                    info!(
                        module = %module,
                        target_name = name,
                        files = receipt.published_files.len(),
                        "target acknowledged publish"
                    );
                    outcome.succeeded_targets.push(name.to_string());
                    outcome.receipts.insert(name.to_string(), receipt);

                    if let Some(state) = state.as_deref_mut() {
                        track(state.record_success(name).await);
                    }
                }
                Err(e) => {
                    let cause = PublishError::target(name, &e);
                    outcome.skipped_targets = request.targets[index + 1..]
                        .iter()
                        .map(|t| t.name().to_string())
                        .collect();
                    error!(
                        module = %module,
                        target_name = name,
                        error = %cause,
                        skipped = ?outcome.skipped_targets,
                        "target failed; stopping publish"
                    );

                    if let Some(state) = state.as_deref_mut() {
                        track(state.record_failure(Some(name), &cause).await);
                    }
                    outcome.failed_target = Some(name.to_string());
                    outcome.cause = Some(cause);
                    break;
                }
            }
        }

        if let Some(state) = state.as_deref_mut() {
            match outcome.status() {
                PublishStatus::Completed => {
                    track(state.transition(PublishState::Completed, None).await)
                }
                PublishStatus::Cancelled => {
                    track(state.transition(PublishState::Cancelled, None).await)
                }
                PublishStatus::TargetFailed | PublishStatus::DescriptorWriteFailed => {}
            }
        }

        outcome.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            module = %module,
            status = ?outcome.status(),
            succeeded = outcome.succeeded_targets.len(),
            duration_ms = outcome.duration_ms,
            "publish finished"
        );
        outcome
    }
}

fn track(result: Result<(), PublishError>) {
    if let Err(e) = result {
        warn!(error = %e, "failed to persist publish state");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::{ConfigurationGraph, ConfigurationSpec};
    use crate::core::types::ArtifactDescriptor;
    use crate::descriptor::{DescriptorBuilder, JsonDescriptorCodec};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;
    use tracing_test::traced_test;

    type CallLog = Arc<Mutex<Vec<String>>>;

    struct MockTarget {
        name: String,
        fail: bool,
        calls: CallLog,
        cancel_after: Option<CancellationSignal>,
    }

    impl MockTarget {
        fn ok(name: &str, calls: &CallLog) -> Arc<dyn PublicationTarget> {
            Arc::new(Self {
                name: name.to_string(),
                fail: false,
                calls: calls.clone(),
                cancel_after: None,
            })
        }

        fn failing(name: &str, calls: &CallLog) -> Arc<dyn PublicationTarget> {
            Arc::new(Self {
                name: name.to_string(),
                fail: true,
                calls: calls.clone(),
                cancel_after: None,
            })
        }

        fn cancelling(
            name: &str,
            calls: &CallLog,
            signal: &CancellationSignal,
        ) -> Arc<dyn PublicationTarget> {
            Arc::new(Self {
                name: name.to_string(),
                fail: false,
                calls: calls.clone(),
                cancel_after: Some(signal.clone()),
            })
        }
    }

    #[async_trait]
    impl PublicationTarget for MockTarget {
        fn name(&self) -> &str {
            &self.name
        }

        async fn publish(
            &self,
            descriptor: &ModuleDescriptor,
            _artifacts: &ArtifactFileSet,
            descriptor_location: &Path,
        ) -> anyhow::Result<PublishReceipt> {
            assert!(descriptor_location.exists());
            self.calls.lock().unwrap().push(self.name.clone());

            if let Some(signal) = &self.cancel_after {
                signal.cancel();
            }
            if self.fail {
                anyhow::bail!("connection refused");
            }
            Ok(PublishReceipt {
                location: Some(format!("{}/{}", self.name, descriptor.module().name())),
                published_files: vec!["module.json".to_string()],
            })
        }
    }

    struct FailingCodec;

    #[async_trait]
    impl DescriptorCodec for FailingCodec {
        fn format(&self) -> &str {
            "failing"
        }

        async fn write(&self, _: &ModuleDescriptor, _: &Path) -> anyhow::Result<()> {
            anyhow::bail!("disk full")
        }
    }

    fn descriptor() -> Arc<ModuleDescriptor> {
        let mut graph = ConfigurationGraph::new();
        graph
            .add_configuration(
                ConfigurationSpec::new("default")
                    .artifact(ArtifactDescriptor::new("demo", "demo.jar")),
            )
            .unwrap();
        let module = ModuleIdentity::new("org.example", "demo", "1.0.0").unwrap();
        Arc::new(DescriptorBuilder::new(&graph).build(module, ["default"]).unwrap())
    }

    fn request(temp_dir: &TempDir, targets: Vec<Arc<dyn PublicationTarget>>) -> PublishRequest {
        PublishRequest::new(
            descriptor(),
            ArtifactFileSet::new(),
            targets,
            temp_dir.path().join("module.json"),
        )
        .unwrap()
    }

    fn coordinator() -> PublicationCoordinator {
        PublicationCoordinator::new(Arc::new(JsonDescriptorCodec::new()))
    }

    fn calls(log: &CallLog) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn test_all_targets_succeed_in_order() {
        let temp_dir = TempDir::new().unwrap();
        let log = CallLog::default();
        let targets = vec![
            MockTarget::ok("local", &log),
            MockTarget::ok("staging", &log),
            MockTarget::ok("remote", &log),
        ];

        let outcome = coordinator().publish(request(&temp_dir, targets)).await;

        assert_eq!(outcome.status(), PublishStatus::Completed);
        assert!(outcome.is_success());
        assert_eq!(outcome.succeeded_targets, vec!["local", "staging", "remote"]);
        assert_eq!(calls(&log), vec!["local", "staging", "remote"]);
        assert_eq!(
            outcome.receipts["remote"].location.as_deref(),
            Some("remote/demo")
        );
        assert!(outcome.clone().into_result().is_ok());
    }

    #[tokio::test]
    async fn test_second_target_failure_stops_run() {
        let temp_dir = TempDir::new().unwrap();
        let log = CallLog::default();
        let targets = vec![
            MockTarget::ok("t1", &log),
            MockTarget::failing("t2", &log),
            MockTarget::ok("t3", &log),
        ];

        let outcome = coordinator().publish(request(&temp_dir, targets)).await;

        assert_eq!(outcome.status(), PublishStatus::TargetFailed);
        assert_eq!(outcome.succeeded_targets, vec!["t1"]);
        assert_eq!(outcome.failed_target.as_deref(), Some("t2"));
        assert_eq!(outcome.skipped_targets, vec!["t3"]);
        assert_eq!(calls(&log), vec!["t1", "t2"]);

        let cause = outcome.cause.clone().unwrap();
        assert_eq!(cause.target_name(), Some("t2"));
        assert!(cause.to_string().contains("connection refused"));
        assert_eq!(outcome.into_result().unwrap_err(), cause);
    }

    #[tokio::test]
    async fn test_descriptor_write_failure_touches_no_target() {
        let temp_dir = TempDir::new().unwrap();
        let log = CallLog::default();
        let targets = vec![MockTarget::ok("local", &log), MockTarget::ok("remote", &log)];

        let outcome = PublicationCoordinator::new(Arc::new(FailingCodec))
            .publish(request(&temp_dir, targets))
            .await;

        assert_eq!(outcome.status(), PublishStatus::DescriptorWriteFailed);
        assert!(outcome.succeeded_targets.is_empty());
        assert!(outcome.failed_target.is_none());
        assert_eq!(outcome.skipped_targets, vec!["local", "remote"]);
        assert!(calls(&log).is_empty());
        assert!(matches!(
            outcome.cause,
            Some(PublishError::DescriptorWrite { ref message, .. }) if message.contains("disk full")
        ));
    }

    #[tokio::test]
    async fn test_empty_target_list_only_writes_descriptor() {
        let temp_dir = TempDir::new().unwrap();

        let outcome = coordinator().publish(request(&temp_dir, Vec::new())).await;

        assert_eq!(outcome.status(), PublishStatus::Completed);
        assert!(temp_dir.path().join("module.json").exists());
    }

    #[tokio::test]
    async fn test_cancellation_between_targets() {
        let temp_dir = TempDir::new().unwrap();
        let log = CallLog::default();
        let signal = CancellationSignal::new();
        let targets = vec![
            MockTarget::cancelling("t1", &log, &signal),
            MockTarget::ok("t2", &log),
            MockTarget::ok("t3", &log),
        ];

        let outcome = coordinator()
            .with_cancellation(signal)
            .publish(request(&temp_dir, targets))
            .await;

        assert_eq!(outcome.status(), PublishStatus::Cancelled);
        assert!(outcome.cancelled);
        assert_eq!(outcome.succeeded_targets, vec!["t1"]);
        assert_eq!(outcome.skipped_targets, vec!["t2", "t3"]);
        assert_eq!(calls(&log), vec!["t1"]);
        assert_eq!(
            outcome.into_result().unwrap_err(),
            PublishError::Cancelled {
                remaining: vec!["t2".to_string(), "t3".to_string()]
            }
        );
    }

    #[tokio::test]
    async fn test_cancelled_before_start_still_writes_descriptor() {
        let temp_dir = TempDir::new().unwrap();
        let log = CallLog::default();
        let coordinator = coordinator();
        coordinator.cancellation().cancel();

        let outcome = coordinator
            .publish(request(&temp_dir, vec![MockTarget::ok("local", &log)]))
            .await;

        assert_eq!(outcome.status(), PublishStatus::Cancelled);
        assert!(calls(&log).is_empty());
        assert!(temp_dir.path().join("module.json").exists());
    }

    #[test]
    fn test_duplicate_target_names_rejected() {
        let log = CallLog::default();
        let result = PublishRequest::new(
            descriptor(),
            ArtifactFileSet::new(),
            vec![MockTarget::ok("local", &log), MockTarget::ok("local", &log)],
            "module.json",
        );

        assert!(matches!(
            result,
            Err(PublishError::DuplicateTarget { target }) if target == "local"
        ));
    }

    #[tokio::test]
    async fn test_tracked_publish_records_progress() {
        let temp_dir = TempDir::new().unwrap();
        let log = CallLog::default();
        let mut state = PublishStateMachine::new(temp_dir.path().join("state.json"));
        let targets = vec![MockTarget::ok("local", &log), MockTarget::failing("remote", &log)];

        let outcome = coordinator()
            .publish_tracked(request(&temp_dir, targets), &mut state)
            .await;

        assert_eq!(outcome.status(), PublishStatus::TargetFailed);
        assert_eq!(state.get_state(), PublishState::PartiallyPublished);
        assert_eq!(state.succeeded_targets(), ["local"]);

        let module = outcome.module.clone();
        assert_eq!(
            state.remaining_targets(&module, ["local", "remote"]),
            vec!["remote"]
        );
    }

    #[tokio::test]
    async fn test_tracked_publish_completes() {
        let temp_dir = TempDir::new().unwrap();
        let log = CallLog::default();
        let mut state = PublishStateMachine::new(temp_dir.path().join("state.json"));

        let outcome = coordinator()
            .publish_tracked(
                request(&temp_dir, vec![MockTarget::ok("local", &log)]),
                &mut state,
            )
            .await;

        assert!(outcome.is_success());
        assert_eq!(state.get_state(), PublishState::Completed);
        assert!(!state.can_resume());
    }

    #[tokio::test]
    #[traced_test]
    async fn test_failure_is_logged_with_target() {
        let temp_dir = TempDir::new().unwrap();
        let log = CallLog::default();

        coordinator()
            .publish(request(&temp_dir, vec![MockTarget::failing("remote", &log)]))
            .await;

        assert!(logs_contain("writing module descriptor"));
        assert!(logs_contain("target failed; stopping publish"));
        assert!(logs_contain("remote"));
    }
}
