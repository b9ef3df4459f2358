//! Module descriptor construction and serialization

pub mod builder;
pub mod codec;
pub mod module_descriptor;

pub use builder::DescriptorBuilder;
pub use codec::JsonDescriptorCodec;
pub use module_descriptor::{
    AttributedArtifact, AttributedDependency, AttributedExcludeRule, DEFAULT_STATUS,
    ModuleDescriptor, PublishedConfiguration,
};
