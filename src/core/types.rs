//! Value types shared by the configuration graph, descriptor builder and
//! publication targets
//!
//! Everything here is an immutable value: identities, artifact and
//! dependency declarations, exclude rules and the artifact file set handed
//! to publication targets.

use crate::core::error::PublishError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

// ============================================================================
// Module Identity
// ============================================================================

/// Immutable `(group, name, version)` coordinate of a module
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawModuleIdentity")]
pub struct ModuleIdentity {
    group: String,
    name: String,
    version: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawModuleIdentity {
    group: String,
    name: String,
    version: String,
}

impl TryFrom<RawModuleIdentity> for ModuleIdentity {
    type Error = PublishError;

    fn try_from(raw: RawModuleIdentity) -> Result<Self, Self::Error> {
        Self::new(raw.group, raw.name, raw.version)
    }
}

impl ModuleIdentity {
    /// Create a module identity; every part must be non-empty
    ///
    /// # Examples
    ///
    /// ```
    /// use module_publisher::core::ModuleIdentity;
    ///
    /// let id = ModuleIdentity::new("org.example", "demo", "1.0.0").unwrap();
    /// assert_eq!(id.to_string(), "org.example:demo:1.0.0");
    /// assert!(ModuleIdentity::new("", "demo", "1.0.0").is_err());
    /// ```
    pub fn new(
        group: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Result<Self, PublishError> {
        let group = group.into();
        let name = name.into();
        let version = version.into();

        for (field, value) in [("group", &group), ("name", &name), ("version", &version)] {
            if value.trim().is_empty() {
                return Err(PublishError::InvalidIdentity { field });
            }
        }

        Ok(Self {
            group,
            name,
            version,
        })
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }
}

impl fmt::Display for ModuleIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group, self.name, self.version)
    }
}

// ============================================================================
// Artifacts
// ============================================================================

/// A file published under one or more configurations
///
/// Two artifacts are the same artifact when every field matches; this is the
/// identity used when artifact sets are unioned across a hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArtifactDescriptor {
    pub name: String,
    pub file: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classifier: Option<String>,
    #[serde(default)]
    pub extension: String,
    #[serde(default, rename = "type")]
    pub artifact_type: String,
}

impl ArtifactDescriptor {
    /// Create an artifact whose extension and type are taken from the file name
    pub fn new(name: impl Into<String>, file: impl Into<PathBuf>) -> Self {
        let file = file.into();
        let extension = file
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            name: name.into(),
            artifact_type: extension.clone(),
            extension,
            file,
            classifier: None,
        }
    }

    /// Fill an empty extension from the file name and an empty type from the extension
    pub fn normalized(mut self) -> Self {
        if self.extension.is_empty()
            && let Some(extension) = self.file.extension()
        {
            self.extension = extension.to_string_lossy().into_owned();
        }
        if self.artifact_type.is_empty() {
            self.artifact_type = self.extension.clone();
        }
        self
    }

    pub fn with_classifier(mut self, classifier: impl Into<String>) -> Self {
        self.classifier = Some(classifier.into());
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn with_type(mut self, artifact_type: impl Into<String>) -> Self {
        self.artifact_type = artifact_type.into();
        self
    }

    /// Repository file name: `[name]-[version](-[classifier])(.[ext])`
    pub fn published_file_name(&self, version: &str) -> String {
        let mut file_name = format!("{}-{}", self.name, version);
        if let Some(classifier) = &self.classifier {
            file_name.push('-');
            file_name.push_str(classifier);
        }
        if !self.extension.is_empty() {
            file_name.push('.');
            file_name.push_str(&self.extension);
        }
        file_name
    }
}

// ============================================================================
// Exclude Rules
// ============================================================================

/// Excludes a group, a module, or one module of a group from transitive resolution
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExcludeRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
}

impl ExcludeRule {
    pub fn group(group: impl Into<String>) -> Self {
        Self {
            group: Some(group.into()),
            module: None,
        }
    }

    pub fn module(module: impl Into<String>) -> Self {
        Self {
            group: None,
            module: Some(module.into()),
        }
    }

    pub fn exact(group: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            group: Some(group.into()),
            module: Some(module.into()),
        }
    }

    /// Does this rule exclude the given module?
    pub fn matches(&self, id: &ModuleIdentity) -> bool {
        let group_matches = self.group.as_deref().is_none_or(|g| g == id.group());
        let module_matches = self.module.as_deref().is_none_or(|m| m == id.name());
        group_matches && module_matches && (self.group.is_some() || self.module.is_some())
    }
}

// ============================================================================
// Dependencies
// ============================================================================

fn default_target_configurations() -> Vec<String> {
    vec!["default".to_string()]
}

fn default_true() -> bool {
    true
}

/// A declared dependency on another module
///
/// `source_configuration` is the configuration that declares the dependency;
/// [`ConfigurationGraph`](crate::configuration::ConfigurationGraph) stamps it
/// when the dependency is added, so builder callers can leave it empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DependencyDescriptor {
    pub module: ModuleIdentity,
    #[serde(default)]
    pub source_configuration: String,
    #[serde(default = "default_target_configurations")]
    pub target_configurations: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excludes: Vec<ExcludeRule>,
    #[serde(default = "default_true")]
    pub transitive: bool,
    #[serde(default)]
    pub force: bool,
    #[serde(default)]
    pub changing: bool,
}

impl DependencyDescriptor {
    /// Transitive, non-forced, non-changing dependency on the target's `default` configuration
    pub fn new(module: ModuleIdentity) -> Self {
        Self {
            module,
            source_configuration: String::new(),
            target_configurations: default_target_configurations(),
            excludes: Vec::new(),
            transitive: true,
            force: false,
            changing: false,
        }
    }

    /// Replace the target configuration mapping
    pub fn target_configurations<I, S>(mut self, configurations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target_configurations = configurations.into_iter().map(Into::into).collect();
        self
    }

    pub fn exclude(mut self, rule: ExcludeRule) -> Self {
        self.excludes.push(rule);
        self
    }

    pub fn transitive(mut self, transitive: bool) -> Self {
        self.transitive = transitive;
        self
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn changing(mut self, changing: bool) -> Self {
        self.changing = changing;
        self
    }

    /// Ivy-style configuration mapping, e.g. `runtime->default,sources`
    pub fn configuration_mapping(&self) -> String {
        format!(
            "{}->{}",
            self.source_configuration,
            self.target_configurations.join(",")
        )
    }
}

// ============================================================================
// Artifact File Set
// ============================================================================

/// One file to upload, tied to the artifact it realizes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactFile {
    pub artifact: ArtifactDescriptor,
    pub path: PathBuf,
}

/// Ordered, de-duplicated set of files handed to every publication target
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactFileSet {
    files: Vec<ArtifactFile>,
    seen: HashSet<ArtifactDescriptor>,
}

impl ArtifactFileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file for an artifact; returns false if the artifact is already present
    pub fn insert(&mut self, artifact: ArtifactDescriptor, path: impl Into<PathBuf>) -> bool {
        if !self.seen.insert(artifact.clone()) {
            return false;
        }
        self.files.push(ArtifactFile {
            artifact,
            path: path.into(),
        });
        true
    }

    /// Add every artifact using its declared file, resolved against `base_dir`
    /// when relative
    pub fn extend_from<'a, I>(&mut self, artifacts: I, base_dir: &Path)
    where
        I: IntoIterator<Item = &'a ArtifactDescriptor>,
    {
        for artifact in artifacts {
            let path = if artifact.file.is_absolute() {
                artifact.file.clone()
            } else {
                base_dir.join(&artifact.file)
            };
            self.insert(artifact.clone(), path);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ArtifactFile> {
        self.files.iter()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
