//! Configuration structures for the publish declaration file
//!
//! This module provides the serde schema of `module-publish.yaml` (or
//! `.toml`). Unknown keys are rejected everywhere so a typo never silently
//! turns into a default.

use crate::configuration::{ConfigurationGraph, ConfigurationSpec};
use crate::core::error::PublishError;
use crate::core::types::{ArtifactDescriptor, DependencyDescriptor, ExcludeRule, ModuleIdentity};
use serde::{Deserialize, Serialize};

/// Current schema version
pub const SCHEMA_VERSION: &str = "1.0";

/// Default location of the serialized descriptor, relative to the project
pub const DEFAULT_DESCRIPTOR_PATH: &str = "build/publications/module.json";

/// Default location of the publish state file, relative to the project
pub const DEFAULT_STATE_FILE: &str = ".module-publish-state.json";

fn default_schema_version() -> String {
    SCHEMA_VERSION.to_string()
}

/// Root configuration object
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PublishConfig {
    /// Schema version
    #[serde(default = "default_schema_version")]
    pub version: String,

    /// Base configuration file, merged underneath this one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,

    /// Module coordinate; parts may come from different layers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<ModuleConfig>,

    /// Descriptor status (default: "integration")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    /// Configuration declarations, in any order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub configurations: Vec<ConfigurationConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish: Option<PublishSection>,

    /// Publication targets, in publish order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<TargetConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub security: Option<SecurityConfig>,
}

/// Module coordinate as declared in a file
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ModuleConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// One configuration declaration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConfigurationConfig {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Visible outside the module (default: true)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,

    /// Dependencies resolved transitively (default: true)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transitive: Option<bool>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extends_from: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<ArtifactDescriptor>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<DependencyDescriptor>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excludes: Vec<ExcludeRule>,
}

impl ConfigurationConfig {
    /// Typed declaration for the configuration graph
    pub fn to_spec(&self) -> ConfigurationSpec {
        let mut spec = ConfigurationSpec::new(&self.name)
            .visible(self.visible.unwrap_or(true))
            .transitive(self.transitive.unwrap_or(true));

        if let Some(description) = &self.description {
            spec = spec.description(description);
        }
        for parent in &self.extends_from {
            spec = spec.extends_from(parent);
        }
        for artifact in &self.artifacts {
            spec = spec.artifact(artifact.clone().normalized());
        }
        for dependency in &self.dependencies {
            spec = spec.dependency(dependency.clone());
        }
        for rule in &self.excludes {
            spec = spec.exclude(rule.clone());
        }
        spec
    }
}

/// What to publish and where local outputs go
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PublishSection {
    /// Requested configuration names
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configurations: Option<Vec<String>>,

    /// Destination of the serialized descriptor
    #[serde(skip_serializing_if = "Option::is_none")]
    pub descriptor: Option<String>,

    /// Publish state file used for resume
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_file: Option<String>,
}

/// Publication target declaration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase", deny_unknown_fields)]
pub enum TargetConfig {
    /// Local directory repository
    #[serde(rename_all = "camelCase")]
    Filesystem { name: String, path: String },

    /// Remote repository accepting HTTP PUT
    #[serde(rename_all = "camelCase")]
    Http {
        name: String,
        url: String,

        /// Environment variable holding the bearer token
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token_env: Option<String>,

        /// Parallel uploads within this target (default: 4)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_concurrency: Option<usize>,

        #[serde(default, skip_serializing_if = "Option::is_none")]
        retry: Option<RetryConfig>,
    },
}

impl TargetConfig {
    pub fn name(&self) -> &str {
        match self {
            Self::Filesystem { name, .. } | Self::Http { name, .. } => name,
        }
    }

    /// Type tag as written in the file
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Filesystem { .. } => "filesystem",
            Self::Http { .. } => "http",
        }
    }
}

/// Caller-side retry of one target
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RetryConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_delay_ms: Option<u64>,
}

/// Security configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SecurityConfig {
    /// Environment variable expansion settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env_var_expansion: Option<EnvVarExpansionConfig>,
}

/// Environment variable expansion configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EnvVarExpansionConfig {
    /// Enable environment variable expansion (default: true)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Allowed environment variable prefixes (default: all)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_prefixes: Option<Vec<String>>,

    /// Forbidden patterns (regex) for environment variable names
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forbidden_patterns: Option<Vec<String>>,
}

/// Default configuration values
impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            version: default_schema_version(),
            extends: None,
            module: None,
            status: None,
            configurations: Vec::new(),
            publish: Some(PublishSection::defaults()),
            targets: Vec::new(),
            security: Some(SecurityConfig::default()),
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            env_var_expansion: Some(EnvVarExpansionConfig {
                enabled: Some(true),
                allowed_prefixes: None,
                forbidden_patterns: None,
            }),
        }
    }
}

impl PublishSection {
    fn defaults() -> Self {
        Self {
            configurations: None,
            descriptor: Some(DEFAULT_DESCRIPTOR_PATH.to_string()),
            state_file: Some(DEFAULT_STATE_FILE.to_string()),
        }
    }
}

impl PublishConfig {
    /// Validated module identity
    ///
    /// # Errors
    ///
    /// * `Config` - the `module` section is missing
    /// * `InvalidIdentity` - a part is missing or empty
    pub fn module_identity(&self) -> Result<ModuleIdentity, PublishError> {
        let module = self
            .module
            .as_ref()
            .ok_or_else(|| PublishError::config("module section is missing"))?;

        ModuleIdentity::new(
            module.group.clone().unwrap_or_default(),
            module.name.clone().unwrap_or_default(),
            module.version.clone().unwrap_or_default(),
        )
    }

    /// Populate a configuration graph from the declarations
    ///
    /// Declarations may reference configurations declared later in the file.
    pub fn configuration_graph(&self) -> Result<ConfigurationGraph, PublishError> {
        ConfigurationGraph::from_declarations(
            self.configurations.iter().map(ConfigurationConfig::to_spec),
        )
    }

    /// Configuration names requested for publication
    pub fn requested_configurations(&self) -> Vec<String> {
        self.publish
            .as_ref()
            .and_then(|p| p.configurations.clone())
            .unwrap_or_default()
    }

    pub fn descriptor_path(&self) -> &str {
        self.publish
            .as_ref()
            .and_then(|p| p.descriptor.as_deref())
            .unwrap_or(DEFAULT_DESCRIPTOR_PATH)
    }

    pub fn state_file(&self) -> &str {
        self.publish
            .as_ref()
            .and_then(|p| p.state_file.as_deref())
            .unwrap_or(DEFAULT_STATE_FILE)
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    /// Look up a target declaration by name
    pub fn target(&self, name: &str) -> Option<&TargetConfig> {
        self.targets.iter().find(|t| t.name() == name)
    }
}
