//! Module Publisher - end-to-end publish pipeline for one project
//!
//! Manages the complete workflow:
//! - Layered configuration loading and validation
//! - Configuration graph population
//! - Descriptor building
//! - Target loading and filtering
//! - Resume from a previous partial publish
//! - Publication through the coordinator

use crate::core::config::PublishConfig;
use crate::core::config_loader::{ConfigLoadOptions, ConfigLoader};
use crate::core::error::PublishError;
use crate::core::state_machine::PublishStateMachine;
use crate::core::traits::DescriptorCodec;
use crate::core::types::ModuleIdentity;
use crate::descriptor::{DescriptorBuilder, JsonDescriptorCodec, ModuleDescriptor};
use crate::orchestration::cancellation::CancellationSignal;
use crate::orchestration::coordinator::{PublicationCoordinator, PublishOutcome, PublishRequest};
use crate::targets::TargetLoader;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Per-invocation publishing options
#[derive(Debug, Clone, Default)]
pub struct PublishOptions {
    /// Replace the requested configuration names of the config file
    pub configurations: Option<Vec<String>>,

    /// Publish only to these targets (declared order is kept)
    pub targets: Option<Vec<String>>,

    /// Build and write the descriptor without touching any target
    pub dry_run: bool,

    /// Skip targets that already acknowledged this module in a previous run
    pub resume: bool,
}

/// Publishing report returned after publish operation
#[derive(Debug, Clone)]
pub struct PublishReport {
    pub module: ModuleIdentity,
    pub descriptor_path: PathBuf,
    pub dry_run: bool,

    /// Coordinator outcome; `None` on a dry run
    pub outcome: Option<PublishOutcome>,

    /// Targets skipped because a previous run already published to them
    pub previously_published: Vec<String>,

    pub warnings: Vec<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub duration_ms: u64,
}

impl PublishReport {
    pub fn success(&self) -> bool {
        self.dry_run || self.outcome.as_ref().is_some_and(PublishOutcome::is_success)
    }
}

/// Main module publisher orchestrator
pub struct ModulePublisher {
    project_path: PathBuf,
    load_options: ConfigLoadOptions,
    codec: Arc<dyn DescriptorCodec>,
    cancellation: CancellationSignal,
    config: Option<PublishConfig>,
}

impl ModulePublisher {
    /// Publisher for a project directory, configured from the process environment
    pub fn new<P: AsRef<Path>>(project_path: P) -> Self {
        let project_path = project_path.as_ref().to_path_buf();
        Self {
            load_options: ConfigLoadOptions::for_project(project_path.clone()),
            project_path,
            codec: Arc::new(JsonDescriptorCodec::new()),
            cancellation: CancellationSignal::new(),
            config: None,
        }
    }

    /// Replace the configuration sources; the project path is kept in sync
    pub fn with_load_options(mut self, options: ConfigLoadOptions) -> Self {
        self.project_path = options.project_path.clone();
        self.load_options = options;
        self.config = None;
        self
    }

    pub fn with_codec(mut self, codec: Arc<dyn DescriptorCodec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_cancellation(mut self, cancellation: CancellationSignal) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn project_path(&self) -> &Path {
        &self.project_path
    }

    /// Loaded configuration, if `load_config` or `publish` ran
    pub fn config(&self) -> Option<&PublishConfig> {
        self.config.as_ref()
    }

    /// Load the layered configuration
    pub async fn load_config(&mut self) -> Result<&PublishConfig, PublishError> {
        let config = ConfigLoader::load(self.load_options.clone()).await?;
        Ok(self.config.insert(config))
    }

    /// Build the descriptor the loaded configuration describes
    ///
    /// Loads the configuration first if needed.
    pub async fn build_descriptor(
        &mut self,
        configurations: Option<&[String]>,
    ) -> Result<ModuleDescriptor, PublishError> {
        if self.config.is_none() {
            self.load_config().await?;
        }
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| PublishError::config("configuration not loaded"))?;

        let module = config.module_identity()?;
        let graph = config.configuration_graph()?;
        let requested = match configurations {
            Some(names) => names.to_vec(),
            None => config.requested_configurations(),
        };

        let mut builder = DescriptorBuilder::new(&graph);
        if let Some(status) = config.status() {
            builder = builder.with_status(status);
        }
        builder.build(module, requested)
    }

    /// Publish the project's module
    ///
    /// Configuration, graph and descriptor problems are returned as errors
    /// before anything is written. Once publishing starts, the result is
    /// reported through [`PublishReport::outcome`].
    pub async fn publish(
        &mut self,
        options: PublishOptions,
    ) -> Result<PublishReport, PublishError> {
        let start_time = Instant::now();

        // 1. Configuration
        let mut config = ConfigLoader::load(self.load_options.clone()).await?;
        if let Some(names) = &options.configurations {
            config
                .publish
                .get_or_insert_with(Default::default)
                .configurations = Some(names.clone());
        }

        let validation = ConfigLoader::validate(&config);
        let warnings: Vec<String> = validation
            .warnings
            .iter()
            .map(|w| format!("{}: {}", w.field, w.message))
            .collect();
        for warning in &warnings {
            warn!(warning = %warning, "configuration warning");
        }
        if let Some(error) = validation.into_error() {
            return Err(error);
        }
        self.config = Some(config.clone());

        // 2. Descriptor
        let module = config.module_identity()?;
        let graph = config.configuration_graph()?;
        let mut builder = DescriptorBuilder::new(&graph);
        if let Some(status) = config.status() {
            builder = builder.with_status(status);
        }
        let descriptor = builder.build(module.clone(), config.requested_configurations())?;
        info!(
            module = %module,
            configurations = descriptor.configurations().len(),
            artifacts = descriptor.artifacts().len(),
            dependencies = descriptor.dependencies().len(),
            "module descriptor built"
        );

        let descriptor_path = self.resolve(config.descriptor_path());

        // 3. Dry run
        if options.dry_run {
            self.codec
                .write(&descriptor, &descriptor_path)
                .await
                .map_err(|e| PublishError::DescriptorWrite {
                    path: descriptor_path.clone(),
                    message: format!("{:#}", e),
                })?;
            info!(module = %module, "dry run: descriptor written, no target touched");

            return Ok(PublishReport {
                module,
                descriptor_path,
                dry_run: true,
                outcome: None,
                previously_published: Vec::new(),
                warnings,
                published_at: None,
                duration_ms: start_time.elapsed().as_millis() as u64,
            });
        }

        // 4. Targets
        let target_configs = match &options.targets {
            Some(names) => {
                if let Some(unknown) = names.iter().find(|n| config.target(n).is_none()) {
                    return Err(PublishError::config(format!("unknown target '{}'", unknown)));
                }
                config
                    .targets
                    .iter()
                    .filter(|t| names.iter().any(|n| n == t.name()))
                    .cloned()
                    .collect()
            }
            None => config.targets.clone(),
        };

        let mut loader = TargetLoader::new(&self.project_path);
        let mut targets = loader.load_all(&target_configs)?;

        // 5. Resume
        let mut state = PublishStateMachine::new(self.resolve(config.state_file()));
        let mut previously_published = Vec::new();
        if options.resume {
            if state.restore().await? && state.can_resume() {
                let names: Vec<&str> = targets.iter().map(|t| t.name()).collect();
                let remaining: Vec<String> = state
                    .remaining_targets(&module, names)
                    .into_iter()
                    .map(str::to_string)
                    .collect();
                targets.retain(|t| {
                    let keep = remaining.iter().any(|r| r == t.name());
                    if !keep {
                        previously_published.push(t.name().to_string());
                    }
                    keep
                });
                info!(
                    module = %module,
                    skipped = ?previously_published,
                    "resuming previous publish"
                );
            } else {
                info!(module = %module, "nothing to resume; publishing to all targets");
            }
        } else {
            state.clear().await?;
        }

        // 6. Publish
        let artifacts = descriptor.artifact_files(&self.project_path);
        let request = PublishRequest::new(
            Arc::new(descriptor),
            artifacts,
            targets,
            descriptor_path.clone(),
        )?;

        let coordinator = PublicationCoordinator::new(Arc::clone(&self.codec))
            .with_cancellation(self.cancellation.clone());
        let outcome = coordinator.publish_tracked(request, &mut state).await;

        if let Some(cause) = &outcome.cause {
            warn!(
                module = %module,
                error = %loader.tokens().mask_tokens_in_string(&cause.to_string()),
                "publish did not complete"
            );
        }

        Ok(PublishReport {
            module,
            descriptor_path,
            dry_run: false,
            published_at: outcome.is_success().then(Utc::now),
            outcome: Some(outcome),
            previously_published,
            warnings,
            duration_ms: start_time.elapsed().as_millis() as u64,
        })
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_path.join(path)
        }
    }
}
