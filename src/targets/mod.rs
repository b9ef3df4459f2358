//! Publication target implementations
//!
//! Each target publishes one module version to one repository. The
//! coordinator only sees the `PublicationTarget` contract.

pub mod filesystem_target;
pub mod http_target;
pub mod retrying_target;
pub mod target_loader;

pub use filesystem_target::FilesystemTarget;
pub use http_target::HttpTarget;
pub use retrying_target::RetryingTarget;
pub use target_loader::{TargetKind, TargetLoader};

use crate::core::types::ModuleIdentity;

/// Repository file name of the module descriptor: `[name]-[version].module.json`
pub fn descriptor_file_name(module: &ModuleIdentity) -> String {
    format!("{}-{}.module.json", module.name(), module.version())
}
