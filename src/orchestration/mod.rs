//! Orchestration layer for module publishing
//!
//! The coordinator drives one descriptor through an ordered list of
//! targets; the module publisher wires configuration, descriptor building
//! and targets around it.

pub mod cancellation;
pub mod coordinator;
pub mod module_publisher;

// Re-export main types for convenience
pub use cancellation::CancellationSignal;
pub use coordinator::{PublicationCoordinator, PublishOutcome, PublishRequest, PublishStatus};
pub use module_publisher::{ModulePublisher, PublishOptions, PublishReport};
