//! Hierarchy Flattener - the effective view of a configuration
//!
//! The hierarchy of `C` is `C` followed by its ancestors in depth-first
//! pre-order (parents in declared order), each configuration recorded the
//! first time it is reached. The same walk detects inheritance cycles.

use crate::configuration::graph::{Configuration, ConfigurationGraph};
use crate::core::error::PublishError;
use crate::core::types::{ArtifactDescriptor, DependencyDescriptor, ExcludeRule};
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use tracing::debug;

/// A configuration together with its flattened hierarchy
#[derive(Debug, Clone)]
pub struct EffectiveConfiguration<'g> {
    hierarchy: Vec<&'g Configuration>,
}

impl<'g> EffectiveConfiguration<'g> {
    /// Name of the flattened configuration
    pub fn name(&self) -> &'g str {
        self.hierarchy[0].name()
    }

    /// The configuration itself followed by every ancestor, each once
    pub fn hierarchy(&self) -> &[&'g Configuration] {
        &self.hierarchy
    }

    pub fn hierarchy_names(&self) -> impl Iterator<Item = &'g str> + '_ {
        self.hierarchy.iter().map(|c| c.name())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.hierarchy.iter().any(|c| c.name() == name)
    }

    /// Union of the artifacts declared anywhere in the hierarchy
    pub fn artifacts(&self) -> Vec<&'g ArtifactDescriptor> {
        union(self.hierarchy.iter().flat_map(|c| c.artifacts()))
    }

    /// Union of the dependencies declared anywhere in the hierarchy
    pub fn dependencies(&self) -> Vec<&'g DependencyDescriptor> {
        union(self.hierarchy.iter().flat_map(|c| c.dependencies()))
    }

    pub fn exclude_rules(&self) -> Vec<&'g ExcludeRule> {
        union(self.hierarchy.iter().flat_map(|c| c.exclude_rules()))
    }
}

/// De-duplicate by identity, keeping first occurrence
fn union<'g, T, I>(items: I) -> Vec<&'g T>
where
    T: Eq + Hash + 'g,
    I: IntoIterator<Item = &'g T>,
{
    let mut seen = HashSet::new();
    items.into_iter().filter(|item| seen.insert(*item)).collect()
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    InProgress,
    Done,
}

/// Computes effective configurations over an immutable graph
pub struct HierarchyFlattener<'g> {
    graph: &'g ConfigurationGraph,
}

impl<'g> HierarchyFlattener<'g> {
    pub fn new(graph: &'g ConfigurationGraph) -> Self {
        Self { graph }
    }

    /// Flatten one configuration
    ///
    /// # Errors
    ///
    /// * `UnknownConfiguration` - `name` (or an ancestor) is not in the graph
    /// * `CyclicInheritance` - the walk re-entered a configuration on its own path
    pub fn flatten(&self, name: &str) -> Result<EffectiveConfiguration<'g>, PublishError> {
        let mut states: HashMap<&'g str, Visit> = HashMap::new();
        let mut path: Vec<&'g str> = Vec::new();
        let mut hierarchy = Vec::new();

        let root = self.graph.configuration(name)?;
        self.visit(root, &mut states, &mut path, &mut hierarchy)?;

        debug!(
            configuration = name,
            hierarchy = ?hierarchy.iter().map(|c: &&Configuration| c.name()).collect::<Vec<_>>(),
            "flattened configuration"
        );

        Ok(EffectiveConfiguration { hierarchy })
    }

    /// Flatten several configurations into one combined hierarchy
    ///
    /// Each name's hierarchy is appended in turn, keeping first occurrences,
    /// so flattening an already flattened hierarchy reproduces it.
    pub fn flatten_all<'a, I>(&self, names: I) -> Result<Vec<&'g Configuration>, PublishError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut seen: HashSet<&'g str> = HashSet::new();
        let mut combined = Vec::new();

        for name in names {
            let effective = self.flatten(name)?;
            for configuration in effective.hierarchy {
                if seen.insert(configuration.name()) {
                    combined.push(configuration);
                }
            }
        }

        Ok(combined)
    }

    fn visit(
        &self,
        configuration: &'g Configuration,
        states: &mut HashMap<&'g str, Visit>,
        path: &mut Vec<&'g str>,
        hierarchy: &mut Vec<&'g Configuration>,
    ) -> Result<(), PublishError> {
        let name = configuration.name();
        match states.get(name) {
            Some(Visit::Done) => return Ok(()),
            Some(Visit::InProgress) => {
                let start = path.iter().position(|n| *n == name).unwrap_or(0);
                let mut cycle: Vec<String> = path[start..].iter().map(|n| n.to_string()).collect();
                cycle.push(name.to_string());
                return Err(PublishError::CyclicInheritance { path: cycle });
            }
            None => {}
        }

        states.insert(name, Visit::InProgress);
        path.push(name);
        hierarchy.push(configuration);

        for parent in configuration.extends_from() {
            let parent = self.graph.configuration(parent)?;
            self.visit(parent, states, path, hierarchy)?;
        }

        path.pop();
        states.insert(name, Visit::Done);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::graph::ConfigurationSpec;

    fn names<'g>(effective: &EffectiveConfiguration<'g>) -> Vec<&'g str> {
        effective.hierarchy_names().collect()
    }

    fn diamond() -> ConfigurationGraph {
        let mut graph = ConfigurationGraph::new();
        graph.add_configuration(ConfigurationSpec::new("A")).unwrap();
        graph
            .add_configuration(ConfigurationSpec::new("B").extends_from("A"))
            .unwrap();
        graph
            .add_configuration(ConfigurationSpec::new("C").extends_from("A"))
            .unwrap();
        graph
            .add_configuration(ConfigurationSpec::new("D").extends_from("B").extends_from("C"))
            .unwrap();
        graph
    }

    #[test]
    fn test_single_configuration() {
        let mut graph = ConfigurationGraph::new();
        graph.add_configuration(ConfigurationSpec::new("compile")).unwrap();

        let effective = HierarchyFlattener::new(&graph).flatten("compile").unwrap();
        assert_eq!(effective.name(), "compile");
        assert_eq!(names(&effective), vec!["compile"]);
    }

    #[test]
    fn test_diamond_visits_shared_ancestor_once() {
        let graph = diamond();
        let effective = HierarchyFlattener::new(&graph).flatten("D").unwrap();

        assert_eq!(names(&effective), vec!["D", "B", "A", "C"]);
        assert!(effective.contains("A"));
    }

    #[test]
    fn test_parents_visited_in_declared_order() {
        let mut graph = ConfigurationGraph::new();
        graph.add_configuration(ConfigurationSpec::new("x")).unwrap();
        graph.add_configuration(ConfigurationSpec::new("y")).unwrap();
        graph
            .add_configuration(ConfigurationSpec::new("z").extends_from("y").extends_from("x"))
            .unwrap();

        let effective = HierarchyFlattener::new(&graph).flatten("z").unwrap();
        assert_eq!(names(&effective), vec!["z", "y", "x"]);
    }

    #[test]
    fn test_unknown_configuration() {
        let graph = diamond();
        let result = HierarchyFlattener::new(&graph).flatten("E");

        assert!(matches!(
            result,
            Err(PublishError::UnknownConfiguration { name }) if name == "E"
        ));
    }

    #[test]
    fn test_two_node_cycle() {
        let graph = ConfigurationGraph::from_declarations([
            ConfigurationSpec::new("A").extends_from("B"),
            ConfigurationSpec::new("B").extends_from("A"),
        ])
        .unwrap();

        let result = HierarchyFlattener::new(&graph).flatten("A");
        assert_eq!(
            result.unwrap_err(),
            PublishError::CyclicInheritance {
                path: vec!["A".to_string(), "B".to_string(), "A".to_string()]
            }
        );
    }

    #[test]
    fn test_cycle_below_entry_point() {
        let graph = ConfigurationGraph::from_declarations([
            ConfigurationSpec::new("top").extends_from("x"),
            ConfigurationSpec::new("x").extends_from("y"),
            ConfigurationSpec::new("y").extends_from("x"),
        ])
        .unwrap();

        let result = HierarchyFlattener::new(&graph).flatten("top");
        assert_eq!(
            result.unwrap_err(),
            PublishError::CyclicInheritance {
                path: vec!["x".to_string(), "y".to_string(), "x".to_string()]
            }
        );
    }

    #[test]
    fn test_effective_artifacts_union_keeps_first_occurrence() {
        let lib = ArtifactDescriptor::new("lib", "lib.jar");
        let native = ArtifactDescriptor::new("native", "native.so");

        let mut graph = ConfigurationGraph::new();
        graph
            .add_configuration(ConfigurationSpec::new("compile").artifact(lib.clone()))
            .unwrap();
        graph
            .add_configuration(
                ConfigurationSpec::new("runtime")
                    .extends_from("compile")
                    .artifact(lib.clone())
                    .artifact(native.clone()),
            )
            .unwrap();

        let effective = HierarchyFlattener::new(&graph).flatten("runtime").unwrap();
        assert_eq!(effective.artifacts(), vec![&lib, &native]);
    }

    #[test]
    fn test_effective_exclude_rules_are_inherited() {
        let mut graph = ConfigurationGraph::new();
        graph
            .add_configuration(
                ConfigurationSpec::new("compile").exclude(ExcludeRule::group("commons-logging")),
            )
            .unwrap();
        graph
            .add_configuration(ConfigurationSpec::new("runtime").extends_from("compile"))
            .unwrap();

        let effective = HierarchyFlattener::new(&graph).flatten("runtime").unwrap();
        assert_eq!(effective.exclude_rules().len(), 1);
    }

    #[test]
    fn test_flatten_all_is_idempotent() {
        let graph = diamond();
        let flattener = HierarchyFlattener::new(&graph);

        let once: Vec<&str> = names(&flattener.flatten("D").unwrap());
        let twice: Vec<&str> = flattener
            .flatten_all(once.iter().copied())
            .unwrap()
            .iter()
            .map(|c| c.name())
            .collect();

        assert_eq!(once, twice);
    }

    #[test]
    fn test_flatten_all_merges_hierarchies() {
        let graph = diamond();
        let combined: Vec<&str> = HierarchyFlattener::new(&graph)
            .flatten_all(["C", "B"])
            .unwrap()
            .iter()
            .map(|c| c.name())
            .collect();

        assert_eq!(combined, vec!["C", "A", "B"]);
    }
}
