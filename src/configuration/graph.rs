//! Configuration Graph - named configurations and their `extendsFrom` edges
//!
//! The graph is append-only: configurations are added during one build
//! phase and only read afterwards. With [`ConfigurationGraph::add_configuration`]
//! parents must exist before their children, which rules out cycles by
//! construction. [`ConfigurationGraph::from_declarations`] accepts
//! declarations in any order (as a build file lists them) and leaves cycle
//! detection to flattening.

use crate::configuration::hierarchy::HierarchyFlattener;
use crate::core::error::PublishError;
use crate::core::types::{ArtifactDescriptor, DependencyDescriptor, ExcludeRule};
use std::collections::{HashMap, HashSet};

/// A named configuration node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    name: String,
    extends_from: Vec<String>,
    artifacts: Vec<ArtifactDescriptor>,
    dependencies: Vec<DependencyDescriptor>,
    exclude_rules: Vec<ExcludeRule>,
    description: Option<String>,
    visible: bool,
    transitive: bool,
}

impl Configuration {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parent configuration names in declared order
    pub fn extends_from(&self) -> &[String] {
        &self.extends_from
    }

    /// Artifacts declared directly on this configuration
    pub fn artifacts(&self) -> &[ArtifactDescriptor] {
        &self.artifacts
    }

    /// Dependencies declared directly on this configuration
    pub fn dependencies(&self) -> &[DependencyDescriptor] {
        &self.dependencies
    }

    pub fn exclude_rules(&self) -> &[ExcludeRule] {
        &self.exclude_rules
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_transitive(&self) -> bool {
        self.transitive
    }
}

/// Typed declaration of a configuration, validated when added to a graph
///
/// # Examples
///
/// ```
/// use module_publisher::configuration::{ConfigurationGraph, ConfigurationSpec};
/// use module_publisher::core::ArtifactDescriptor;
///
/// let mut graph = ConfigurationGraph::new();
/// graph
///     .add_configuration(
///         ConfigurationSpec::new("compile").artifact(ArtifactDescriptor::new("lib", "lib.jar")),
///     )
///     .unwrap();
/// graph
///     .add_configuration(ConfigurationSpec::new("runtime").extends_from("compile"))
///     .unwrap();
///
/// assert_eq!(graph.configuration("runtime").unwrap().extends_from(), ["compile"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationSpec {
    name: String,
    extends_from: Vec<String>,
    artifacts: Vec<ArtifactDescriptor>,
    dependencies: Vec<DependencyDescriptor>,
    exclude_rules: Vec<ExcludeRule>,
    description: Option<String>,
    visible: bool,
    transitive: bool,
}

impl ConfigurationSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extends_from: Vec::new(),
            artifacts: Vec::new(),
            dependencies: Vec::new(),
            exclude_rules: Vec::new(),
            description: None,
            visible: true,
            transitive: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a parent; repeated parents keep their first position
    pub fn extends_from(mut self, parent: impl Into<String>) -> Self {
        let parent = parent.into();
        if !self.extends_from.contains(&parent) {
            self.extends_from.push(parent);
        }
        self
    }

    pub fn artifact(mut self, artifact: ArtifactDescriptor) -> Self {
        self.artifacts.push(artifact);
        self
    }

    pub fn dependency(mut self, dependency: DependencyDescriptor) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn exclude(mut self, rule: ExcludeRule) -> Self {
        self.exclude_rules.push(rule);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    pub fn transitive(mut self, transitive: bool) -> Self {
        self.transitive = transitive;
        self
    }

    fn into_configuration(self) -> Configuration {
        let name = self.name;
        let dependencies = self
            .dependencies
            .into_iter()
            .map(|mut dependency| {
                dependency.source_configuration = name.clone();
                dependency
            })
            .collect();

        Configuration {
            extends_from: self.extends_from,
            artifacts: self.artifacts,
            dependencies,
            exclude_rules: self.exclude_rules,
            description: self.description,
            visible: self.visible,
            transitive: self.transitive,
            name,
        }
    }
}

/// Append-only set of configurations of one module
#[derive(Debug, Clone, Default)]
pub struct ConfigurationGraph {
    configurations: Vec<Configuration>,
    index: HashMap<String, usize>,
}

impl ConfigurationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a configuration whose parents are already in the graph
    ///
    /// # Errors
    ///
    /// * `InvalidConfigurationName` - the name is empty
    /// * `DuplicateConfiguration` - the name is already taken
    /// * `UnknownParent` - an `extendsFrom` entry is not yet in the graph
    pub fn add_configuration(&mut self, spec: ConfigurationSpec) -> Result<(), PublishError> {
        self.check_name(&spec.name)?;

        if let Some(parent) = spec
            .extends_from
            .iter()
            .find(|parent| !self.index.contains_key(parent.as_str()))
        {
            return Err(PublishError::UnknownParent {
                configuration: spec.name.clone(),
                parent: parent.clone(),
            });
        }

        self.insert(spec);
        Ok(())
    }

    /// Build a graph from declarations listed in any order
    ///
    /// Forward references are allowed, so an inheritance cycle can exist in
    /// the result; it surfaces as `CyclicInheritance` from flattening or
    /// [`check_acyclic`](Self::check_acyclic).
    pub fn from_declarations<I>(specs: I) -> Result<Self, PublishError>
    where
        I: IntoIterator<Item = ConfigurationSpec>,
    {
        let mut graph = Self::new();
        for spec in specs {
            graph.check_name(&spec.name)?;
            graph.insert(spec);
        }

        for configuration in &graph.configurations {
            if let Some(parent) = configuration
                .extends_from
                .iter()
                .find(|parent| !graph.index.contains_key(parent.as_str()))
            {
                return Err(PublishError::UnknownParent {
                    configuration: configuration.name.clone(),
                    parent: parent.clone(),
                });
            }
        }

        Ok(graph)
    }

    /// Look up a configuration by name
    pub fn configuration(&self, name: &str) -> Result<&Configuration, PublishError> {
        self.index
            .get(name)
            .map(|&i| &self.configurations[i])
            .ok_or_else(|| PublishError::UnknownConfiguration {
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Every configuration of the module, in insertion order
    ///
    /// This is the full listing, not the hierarchy of any one configuration.
    pub fn all(&self) -> impl Iterator<Item = &Configuration> {
        self.configurations.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.configurations.iter().map(|c| c.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.configurations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configurations.is_empty()
    }

    /// Flatten every configuration once, failing on the first cycle
    pub fn check_acyclic(&self) -> Result<(), PublishError> {
        let flattener = HierarchyFlattener::new(self);
        let mut checked: HashSet<&str> = HashSet::new();

        for configuration in &self.configurations {
            if checked.contains(configuration.name.as_str()) {
                continue;
            }
            let effective = flattener.flatten(&configuration.name)?;
            checked.extend(effective.hierarchy_names());
        }

        Ok(())
    }

    fn check_name(&self, name: &str) -> Result<(), PublishError> {
        if name.trim().is_empty() {
            return Err(PublishError::InvalidConfigurationName);
        }
        if self.index.contains_key(name) {
            return Err(PublishError::DuplicateConfiguration {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn insert(&mut self, spec: ConfigurationSpec) {
        let configuration = spec.into_configuration();
        self.index
            .insert(configuration.name.clone(), self.configurations.len());
        self.configurations.push(configuration);
    }
}
