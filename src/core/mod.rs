pub mod config;
pub mod config_loader;
pub mod error;
pub mod retry;
pub mod state_machine;
pub mod traits;
pub mod types;

pub use config::*;
pub use config_loader::{
    ConfigLoadOptions, ConfigLoader, ConfigValidationError, ConfigValidationResult,
    ConfigValidationWarning,
};
pub use error::*;
pub use retry::*;
pub use state_machine::{PublishState, PublishStateData, PublishStateMachine, StateTransition};
pub use traits::*;
pub use types::*;
