pub mod configuration;
pub mod core;
pub mod descriptor;
pub mod orchestration;
pub mod security;
pub mod targets;

pub use configuration::{
    Configuration, ConfigurationGraph, ConfigurationSpec, EffectiveConfiguration,
    HierarchyFlattener,
};
pub use crate::core::*;
pub use descriptor::{DescriptorBuilder, JsonDescriptorCodec, ModuleDescriptor};
pub use orchestration::{
    CancellationSignal, ModulePublisher, PublicationCoordinator, PublishOptions, PublishOutcome,
    PublishReport, PublishRequest, PublishStatus,
};
pub use security::SecureTokenManager;
pub use targets::{FilesystemTarget, HttpTarget, RetryingTarget, TargetLoader};
