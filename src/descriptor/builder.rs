//! Descriptor Builder - module identity plus requested configurations to
//! one immutable [`ModuleDescriptor`]

use crate::configuration::{ConfigurationGraph, HierarchyFlattener};
use crate::core::error::PublishError;
use crate::core::types::{ArtifactDescriptor, ModuleIdentity};
use crate::descriptor::module_descriptor::{
    AttributedArtifact, AttributedDependency, AttributedExcludeRule, DEFAULT_STATUS,
    ModuleDescriptor, PublishedConfiguration,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::hash::Hash;
use tracing::debug;

/// Builds descriptors from a populated configuration graph
///
/// # Examples
///
/// ```
/// use module_publisher::configuration::{ConfigurationGraph, ConfigurationSpec};
/// use module_publisher::core::{ArtifactDescriptor, ModuleIdentity};
/// use module_publisher::descriptor::DescriptorBuilder;
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
/// let module = ModuleIdentity::new("org.example", "demo", "1.0.0").unwrap();
/// let descriptor = DescriptorBuilder::new(&graph).build(module, ["runtime"]).unwrap();
///
/// assert_eq!(descriptor.artifacts().len(), 1);
/// assert!(descriptor.artifacts()[0].configurations.contains("runtime"));
/// ```
pub struct DescriptorBuilder<'g> {
    graph: &'g ConfigurationGraph,
    status: String,
}

impl<'g> DescriptorBuilder<'g> {
    pub fn new(graph: &'g ConfigurationGraph) -> Self {
        Self {
            graph,
            status: DEFAULT_STATUS.to_string(),
        }
    }

    /// Set the descriptor status (e.g. "release")
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    /// Build the descriptor for a set of requested configuration names
    ///
    /// Names are treated as a set; duplicates and ordering do not affect the
    /// result. Every artifact, dependency and exclude rule reachable from a
    /// requested configuration's hierarchy appears once, attributed to every
    /// requested configuration that reaches it.
    ///
    /// # Errors
    ///
    /// * `EmptyPublication` - no names were given
    /// * `UnknownConfiguration` / `CyclicInheritance` - from flattening; no
    ///   partial descriptor is returned
    /// * `ConflictingArtifacts` - two distinct artifacts share a published
    ///   file name
    pub fn build<I, S>(
        &self,
        module: ModuleIdentity,
        configuration_names: I,
    ) -> Result<ModuleDescriptor, PublishError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let requested: BTreeSet<String> = configuration_names
            .into_iter()
            .map(|name| name.as_ref().to_string())
            .collect();

        if requested.is_empty() {
            return Err(PublishError::EmptyPublication);
        }

        let flattener = HierarchyFlattener::new(self.graph);
        let mut configurations = BTreeMap::new();
        let mut artifacts = Attribution::default();
        let mut dependencies = Attribution::default();
        let mut exclude_rules = Attribution::default();

        for name in &requested {
            let effective = flattener.flatten(name)?;
            let configuration = self.graph.configuration(name)?;

            configurations.insert(
                name.clone(),
                PublishedConfiguration {
                    name: name.clone(),
                    extends_from: configuration.extends_from().to_vec(),
                    description: configuration.description().map(str::to_string),
                    visible: configuration.is_visible(),
                    transitive: configuration.is_transitive(),
                },
            );

            for artifact in effective.artifacts() {
                artifacts.attribute(artifact.clone().normalized(), name);
            }
            for dependency in effective.dependencies() {
                dependencies.attribute(dependency.clone(), name);
            }
            for rule in effective.exclude_rules() {
                exclude_rules.attribute(rule.clone(), name);
            }
        }

        check_published_names(&module, artifacts.entries.iter().map(|(a, _)| a))?;

        debug!(
            module = %module,
            configurations = requested.len(),
            artifacts = artifacts.entries.len(),
            dependencies = dependencies.entries.len(),
            "built module descriptor"
        );

        Ok(ModuleDescriptor {
            module,
            status: self.status.clone(),
            configurations,
            artifacts: artifacts
                .into_entries()
                .map(|(artifact, configurations)| AttributedArtifact {
                    artifact,
                    configurations,
                })
                .collect(),
            dependencies: dependencies
                .into_entries()
                .map(|(dependency, configurations)| AttributedDependency {
                    dependency,
                    configurations,
                })
                .collect(),
            exclude_rules: exclude_rules
                .into_entries()
                .map(|(rule, configurations)| AttributedExcludeRule {
                    rule,
                    configurations,
                })
                .collect(),
        })
    }
}

/// Repositories address artifacts by published file name, so two distinct
/// artifacts must never share one
fn check_published_names<'a>(
    module: &ModuleIdentity,
    artifacts: impl Iterator<Item = &'a ArtifactDescriptor>,
) -> Result<(), PublishError> {
    let mut by_name: HashMap<String, &ArtifactDescriptor> = HashMap::new();
    for artifact in artifacts {
        let file_name = artifact.published_file_name(module.version());
        if let Some(first) = by_name.get(&file_name) {
            return Err(PublishError::ConflictingArtifacts {
                file_name,
                first: first.file.display().to_string(),
                second: artifact.file.display().to_string(),
            });
        }
        by_name.insert(file_name, artifact);
    }
    Ok(())
}

/// Insertion-ordered map from an item to the configurations attributed to it
struct Attribution<T> {
    entries: Vec<(T, BTreeSet<String>)>,
    index: HashMap<T, usize>,
}

impl<T> Default for Attribution<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T: Clone + Eq + Hash> Attribution<T> {
    fn attribute(&mut self, item: T, configuration: &str) {
        let position = match self.index.get(&item) {
            Some(&position) => position,
            None => {
                self.index.insert(item.clone(), self.entries.len());
                self.entries.push((item, BTreeSet::new()));
                self.entries.len() - 1
            }
        };
        self.entries[position].1.insert(configuration.to_string());
    }

    fn into_entries(self) -> impl Iterator<Item = (T, BTreeSet<String>)> {
        self.entries.into_iter()
    }
}
