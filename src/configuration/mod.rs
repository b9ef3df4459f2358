//! Configuration model: the inheritance graph and its flattened views

pub mod graph;
pub mod hierarchy;

pub use graph::{Configuration, ConfigurationGraph, ConfigurationSpec};
pub use hierarchy::{EffectiveConfiguration, HierarchyFlattener};
