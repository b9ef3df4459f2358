//! Target Loader - builds publication targets from their declarations
//!
//! # Example
//!
//! ```no_run
//! use module_publisher::core::TargetConfig;
//! use module_publisher::targets::TargetLoader;
//!
//! # fn example() -> Result<(), module_publisher::core::PublishError> {
//! let mut loader = TargetLoader::new(".");
//! let targets = loader.load_all(&[TargetConfig::Filesystem {
//!     name: "local".to_string(),
//!     path: "build/repo".to_string(),
//! }])?;
//! assert_eq!(targets[0].name(), "local");
//! # Ok(())
//! # }
//! ```

use crate::core::config::TargetConfig;
use crate::core::error::PublishError;
use crate::core::retry::RetryPolicy;
use crate::core::traits::PublicationTarget;
use crate::security::SecureTokenManager;
use crate::targets::{FilesystemTarget, HttpTarget, RetryingTarget};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Target type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Filesystem,
    Http,
}

impl TargetKind {
    /// Get string representation of target type
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Filesystem => "filesystem",
            TargetKind::Http => "http",
        }
    }
}

impl From<&TargetConfig> for TargetKind {
    fn from(config: &TargetConfig) -> Self {
        match config {
            TargetConfig::Filesystem { .. } => TargetKind::Filesystem,
            TargetConfig::Http { .. } => TargetKind::Http,
        }
    }
}

/// Builds [`PublicationTarget`]s for a project
pub struct TargetLoader {
    project_path: PathBuf,
    tokens: SecureTokenManager,
}

impl TargetLoader {
    /// Relative filesystem paths are resolved against `project_path`
    pub fn new(project_path: impl AsRef<Path>) -> Self {
        Self {
            project_path: project_path.as_ref().to_path_buf(),
            tokens: SecureTokenManager::new(),
        }
    }

    /// Token mappings registered by loaded HTTP targets
    pub fn tokens(&self) -> &SecureTokenManager {
        &self.tokens
    }

    /// Build every target, preserving declaration order
    pub fn load_all(
        &mut self,
        configs: &[TargetConfig],
    ) -> Result<Vec<Arc<dyn PublicationTarget>>, PublishError> {
        configs.iter().map(|config| self.load(config)).collect()
    }

    /// Build one target
    pub fn load(
        &mut self,
        config: &TargetConfig,
    ) -> Result<Arc<dyn PublicationTarget>, PublishError> {
        debug!(
            target_name = config.name(),
            kind = TargetKind::from(config).as_str(),
            "loading publication target"
        );

        match config {
            TargetConfig::Filesystem { name, path } => {
                if path.trim().is_empty() {
                    return Err(PublishError::config(format!(
                        "target '{}' has an empty path",
                        name
                    )));
                }
                let root = Path::new(path);
                let root = if root.is_absolute() {
                    root.to_path_buf()
                } else {
                    self.project_path.join(root)
                };
                Ok(Arc::new(FilesystemTarget::new(name.as_str(), root)))
            }
            TargetConfig::Http {
                name,
                url,
                token_env,
                max_concurrency,
                retry,
            } => {
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(PublishError::config(format!(
                        "target '{}' url must start with http:// or https://, got '{}'",
                        name, url
                    )));
                }

                let mut target = HttpTarget::new(name.as_str(), url.as_str());
                if let Some(max_concurrency) = max_concurrency {
                    target = target.with_max_concurrency(*max_concurrency);
                }
                if let Some(env_var) = token_env {
                    self.tokens.register(name.as_str(), env_var.as_str());
                    match self.tokens.get_token(name) {
                        Some(token) => target = target.with_token(token),
                        None => warn!(
                            target_name = name.as_str(),
                            env_var = env_var.as_str(),
                            "token variable is not set; publishing without credentials"
                        ),
                    }
                }

                let target: Arc<dyn PublicationTarget> = Arc::new(target);
                Ok(match retry {
                    Some(retry) => Arc::new(RetryingTarget::new(target, RetryPolicy::from(retry))),
                    None => target,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::RetryConfig;

    fn http(name: &str, url: &str) -> TargetConfig {
        TargetConfig::Http {
            name: name.to_string(),
            url: url.to_string(),
            token_env: None,
            max_concurrency: None,
            retry: None,
        }
    }

    #[test]
    fn test_target_kind_as_str() {
        assert_eq!(TargetKind::Filesystem.as_str(), "filesystem");
        assert_eq!(TargetKind::Http.as_str(), "http");
        assert_eq!(
            TargetKind::from(&http("remote", "https://repo")),
            TargetKind::Http
        );
    }

    #[test]
    fn test_load_all_preserves_order() {
        let mut loader = TargetLoader::new("/work/project");
        let targets = loader
            .load_all(&[
                TargetConfig::Filesystem {
                    name: "local".to_string(),
                    path: "build/repo".to_string(),
                },
                http("remote", "https://repo.example.com"),
            ])
            .unwrap();

        let names: Vec<&str> = targets.iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["local", "remote"]);
    }

    #[test]
    fn test_invalid_url_is_config_error() {
        let mut loader = TargetLoader::new(".");
        let err = loader.load(&http("remote", "ftp://repo")).err().unwrap();

        assert!(matches!(err, PublishError::Config { .. }));
        assert!(err.to_string().contains("remote"));
    }

    #[test]
    fn test_empty_filesystem_path_is_config_error() {
        let mut loader = TargetLoader::new(".");
        let result = loader.load(&TargetConfig::Filesystem {
            name: "local".to_string(),
            path: " ".to_string(),
        });

        assert!(matches!(result, Err(PublishError::Config { .. })));
    }

    #[test]
    fn test_token_env_is_registered() {
        let mut loader = TargetLoader::new(".");
        let config = TargetConfig::Http {
            name: "remote".to_string(),
            url: "https://repo.example.com".to_string(),
            token_env: Some("MP_LOADER_TEST_TOKEN_UNSET".to_string()),
            max_concurrency: Some(2),
            retry: Some(RetryConfig {
                max_attempts: Some(2),
                initial_delay_ms: Some(10),
            }),
        };

        let target = loader.load(&config).unwrap();

        assert_eq!(target.name(), "remote");
        assert_eq!(
            loader.tokens().get_token_name("remote"),
            Some("MP_LOADER_TEST_TOKEN_UNSET")
        );
    }
}
