//! Module Descriptor - the immutable publish-ready metadata document

use crate::core::types::{
    ArtifactDescriptor, ArtifactFileSet, DependencyDescriptor, ExcludeRule, ModuleIdentity,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Default descriptor status
pub const DEFAULT_STATUS: &str = "integration";

/// A requested configuration as documented in the descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedConfiguration {
    pub name: String,

    /// Declared parents, kept for documentation of the inheritance
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extends_from: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub visible: bool,
    pub transitive: bool,
}

/// An artifact and the requested configurations it is visible under
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributedArtifact {
    pub artifact: ArtifactDescriptor,
    pub configurations: BTreeSet<String>,
}

/// A dependency and the requested configurations that pulled it in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributedDependency {
    pub dependency: DependencyDescriptor,
    pub configurations: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributedExcludeRule {
    pub rule: ExcludeRule,
    pub configurations: BTreeSet<String>,
}

/// Immutable description of one module publication
///
/// Built once by [`DescriptorBuilder`](crate::descriptor::DescriptorBuilder)
/// and never mutated afterwards, so it can be shared (e.g. behind an `Arc`)
/// with every publication target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleDescriptor {
    pub(crate) module: ModuleIdentity,
    pub(crate) status: String,
    pub(crate) configurations: BTreeMap<String, PublishedConfiguration>,
    pub(crate) artifacts: Vec<AttributedArtifact>,
    pub(crate) dependencies: Vec<AttributedDependency>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) exclude_rules: Vec<AttributedExcludeRule>,
}

impl ModuleDescriptor {
    pub fn module(&self) -> &ModuleIdentity {
        &self.module
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    /// Requested configurations, keyed by name
    pub fn configurations(&self) -> &BTreeMap<String, PublishedConfiguration> {
        &self.configurations
    }

    pub fn configuration_names(&self) -> impl Iterator<Item = &str> {
        self.configurations.keys().map(String::as_str)
    }

    /// Every artifact once, with the configurations it is attributed to
    pub fn artifacts(&self) -> &[AttributedArtifact] {
        &self.artifacts
    }

    pub fn dependencies(&self) -> &[AttributedDependency] {
        &self.dependencies
    }

    pub fn exclude_rules(&self) -> &[AttributedExcludeRule] {
        &self.exclude_rules
    }

    /// Configurations an artifact is attributed to, if it is published at all
    pub fn artifact_configurations(
        &self,
        artifact: &ArtifactDescriptor,
    ) -> Option<&BTreeSet<String>> {
        self.artifacts
            .iter()
            .find(|a| &a.artifact == artifact)
            .map(|a| &a.configurations)
    }

    /// Artifacts visible under one requested configuration
    pub fn artifacts_for<'a>(
        &'a self,
        configuration: &'a str,
    ) -> impl Iterator<Item = &'a ArtifactDescriptor> + 'a {
        self.artifacts
            .iter()
            .filter(move |a| a.configurations.contains(configuration))
            .map(|a| &a.artifact)
    }

    /// Dependencies pulled in by one requested configuration
    pub fn dependencies_for<'a>(
        &'a self,
        configuration: &'a str,
    ) -> impl Iterator<Item = &'a DependencyDescriptor> + 'a {
        self.dependencies
            .iter()
            .filter(move |d| d.configurations.contains(configuration))
            .map(|d| &d.dependency)
    }

    /// Files to upload: every artifact once, relative paths resolved against `base_dir`
    pub fn artifact_files(&self, base_dir: &Path) -> ArtifactFileSet {
        let mut files = ArtifactFileSet::new();
        files.extend_from(self.artifacts.iter().map(|a| &a.artifact), base_dir);
        files
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn descriptor() -> ModuleDescriptor {
        let lib = ArtifactDescriptor::new("lib", "lib.jar");
        let native = ArtifactDescriptor::new("native", "/opt/native.so");

        ModuleDescriptor {
            module: ModuleIdentity::new("org.example", "demo", "1.0.0").unwrap(),
            status: DEFAULT_STATUS.to_string(),
            configurations: BTreeMap::from([(
                "runtime".to_string(),
                PublishedConfiguration {
                    name: "runtime".to_string(),
                    extends_from: vec!["compile".to_string()],
                    description: None,
                    visible: true,
                    transitive: true,
                },
            )]),
            artifacts: vec![
                AttributedArtifact {
                    artifact: lib,
                    configurations: BTreeSet::from(["runtime".to_string(), "test".to_string()]),
                },
                AttributedArtifact {
                    artifact: native,
                    configurations: BTreeSet::from(["runtime".to_string()]),
                },
            ],
            dependencies: Vec::new(),
            exclude_rules: Vec::new(),
        }
    }

    #[test]
    fn test_artifacts_for_configuration() {
        let descriptor = descriptor();

        let test: Vec<_> = descriptor.artifacts_for("test").map(|a| a.name.as_str()).collect();
        assert_eq!(test, vec!["lib"]);
        assert_eq!(descriptor.artifacts_for("runtime").count(), 2);
        assert_eq!(descriptor.artifacts_for("compile").count(), 0);
    }

    #[test]
    fn test_artifact_configurations_lookup() {
        let descriptor = descriptor();
        let lib = ArtifactDescriptor::new("lib", "lib.jar");

        let configurations = descriptor.artifact_configurations(&lib).unwrap();
        assert!(configurations.contains("runtime"));
        assert!(configurations.contains("test"));
        assert!(
            descriptor
                .artifact_configurations(&ArtifactDescriptor::new("other", "other.jar"))
                .is_none()
        );
    }

    #[test]
    fn test_artifact_files_resolve_against_base_dir() {
        let files = descriptor().artifact_files(Path::new("/project"));
        let paths: Vec<_> = files.iter().map(|f| f.path.clone()).collect();

        assert_eq!(
            paths,
            vec![
                PathBuf::from("/project/lib.jar"),
                PathBuf::from("/opt/native.so")
            ]
        );
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_value(descriptor()).unwrap();

        assert_eq!(json["module"]["name"], "demo");
        assert_eq!(json["status"], "integration");
        assert_eq!(json["configurations"]["runtime"]["extendsFrom"][0], "compile");
        assert_eq!(json["artifacts"][0]["configurations"][1], "test");
        assert!(json.get("excludeRules").is_none());
    }
}
