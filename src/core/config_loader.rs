//! Configuration file loader for module-publisher
//!
//! This module provides configuration loading, validation, and merging capabilities.

use super::config::*;
use crate::core::error::PublishError;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tokio::fs;
use tracing::{debug, warn};

/// Project configuration file names, tried in order
const CONFIG_FILENAMES: &[&str] = &[
    "module-publish.yaml",
    "module-publish.yml",
    "module-publish.toml",
];

/// Global configuration file name (in the home directory)
const GLOBAL_CONFIG_FILENAME: &str = ".module-publish.yaml";

/// Environment variable pattern (${VAR_NAME})
static ENV_VAR_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("env var pattern is valid")
});

/// Configuration load options
#[derive(Debug, Clone, Default)]
pub struct ConfigLoadOptions {
    /// Project directory to load config from
    pub project_path: PathBuf,

    /// Explicit config file, instead of searching the project directory
    pub config_file: Option<PathBuf>,

    /// Directory holding the global config file (usually `$HOME`)
    pub home_dir: Option<PathBuf>,

    /// Explicit overrides (highest priority)
    pub overrides: Option<PublishConfig>,

    /// Environment variables
    pub env: HashMap<String, String>,
}

impl ConfigLoadOptions {
    /// Options for a project directory using the process environment
    pub fn for_project(project_path: impl Into<PathBuf>) -> Self {
        let env: HashMap<String, String> = std::env::vars().collect();
        Self {
            project_path: project_path.into(),
            home_dir: env.get("HOME").map(PathBuf::from),
            env,
            ..Default::default()
        }
    }
}

/// Configuration validation result
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationResult {
    /// Is configuration valid?
    pub valid: bool,

    /// Validation errors
    pub errors: Vec<ConfigValidationError>,

    /// Validation warnings
    pub warnings: Vec<ConfigValidationWarning>,
}

/// Configuration validation error
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationError {
    /// Field path (e.g., "targets[1].url")
    pub field: String,

    /// Error message
    pub message: String,
}

/// Configuration validation warning
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationWarning {
    /// Field path
    pub field: String,

    /// Warning message
    pub message: String,

    /// Suggestion
    pub suggestion: Option<String>,
}

impl ConfigValidationResult {
    /// First error as a `PublishError`, if any
    pub fn into_error(self) -> Option<PublishError> {
        self.errors
            .into_iter()
            .next()
            .map(|e| PublishError::config(format!("{}: {}", e.field, e.message)))
    }
}

/// Configuration file loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from multiple sources with priority
    ///
    /// Priority (high to low):
    /// 1. Explicit overrides
    /// 2. Environment variables
    /// 3. Project config (./module-publish.yaml, following `extends`)
    /// 4. Global config (~/.module-publish.yaml)
    /// 5. Default values
    pub async fn load(options: ConfigLoadOptions) -> Result<PublishConfig, PublishError> {
        let mut configs: Vec<PublishConfig> = Vec::new();

        // 5. Default values (lowest priority)
        configs.push(PublishConfig::default());

        // 4. Global config
        if let Some(home_dir) = &options.home_dir
            && let Some(global_config) =
                Self::load_config_file(&home_dir.join(GLOBAL_CONFIG_FILENAME), Vec::new()).await?
        {
            configs.push(global_config);
        }

        // 3. Project config
        let project_file = match &options.config_file {
            Some(file) => {
                if !file.exists() {
                    return Err(PublishError::config(format!(
                        "config file {} does not exist",
                        file.display()
                    )));
                }
                Some(file.clone())
            }
            None => Self::find_project_config(&options.project_path),
        };
        if let Some(project_file) = project_file
            && let Some(project_config) = Self::load_config_file(&project_file, Vec::new()).await?
        {
            configs.push(project_config);
        }

        // 2. Environment variables
        if let Some(env_config) = Self::load_env_config(&options.env) {
            configs.push(env_config);
        }

        // 1. Overrides (highest priority)
        if let Some(overrides) = options.overrides {
            configs.push(overrides);
        }

        let merged_config = Self::merge_configs(configs);

        Self::expand_env_vars(merged_config, &options.env)
    }

    fn find_project_config(project_path: &Path) -> Option<PathBuf> {
        CONFIG_FILENAMES
            .iter()
            .map(|name| project_path.join(name))
            .find(|path| path.exists())
    }

    /// Parse a config document, choosing the format by file extension
    fn parse_config(file_path: &Path, content: &str) -> Result<PublishConfig, PublishError> {
        let is_toml = file_path.extension().is_some_and(|ext| ext == "toml");
        if is_toml {
            toml::from_str(content).map_err(|e| {
                PublishError::config(format!(
                    "Failed to parse TOML config {}: {}",
                    file_path.display(),
                    e
                ))
            })
        } else {
            serde_yaml::from_str(content).map_err(|e| {
                PublishError::config(format!(
                    "Failed to parse YAML config {}: {}",
                    file_path.display(),
                    e
                ))
            })
        }
    }

    /// Load configuration from a file, merging its `extends` chain underneath
    fn load_config_file(
        file_path: &Path,
        mut chain: Vec<PathBuf>,
    ) -> std::pin::Pin<
        Box<
            dyn std::future::Future<Output = Result<Option<PublishConfig>, PublishError>>
                + Send
                + '_,
        >,
    > {
        Box::pin(async move {
            // Check if file exists
            if !file_path.exists() {
                return Ok(None);
            }

            if chain.iter().any(|seen| seen == file_path) {
                return Err(PublishError::config(format!(
                    "config extends cycle at {}",
                    file_path.display()
                )));
            }
            chain.push(file_path.to_path_buf());

            let content = fs::read_to_string(file_path).await.map_err(|e| {
                PublishError::config(format!("Failed to read config file: {}", e))
            })?;

            let config = Self::parse_config(file_path, &content)?;
            Self::check_unique_names(&config)?;
            debug!(file = %file_path.display(), "loaded config file");

            // Handle extends if present
            if let Some(extends_path) = &config.extends {
                let base_path = file_path
                    .parent()
                    .ok_or_else(|| PublishError::config("Invalid config file path"))?
                    .join(extends_path);

                match Self::load_config_file(&base_path, chain).await? {
                    Some(base_config) => {
                        return Ok(Some(Self::merge_configs(vec![base_config, config])));
                    }
                    None => {
                        return Err(PublishError::config(format!(
                            "extended config file {} does not exist",
                            base_path.display()
                        )));
                    }
                }
            }

            Ok(Some(config))
        })
    }

    /// Reject names declared twice within one file; replacing by name only
    /// applies between layers
    fn check_unique_names(config: &PublishConfig) -> Result<(), PublishError> {
        let mut configurations = HashSet::new();
        for configuration in &config.configurations {
            if !configurations.insert(configuration.name.as_str()) {
                return Err(PublishError::DuplicateConfiguration {
                    name: configuration.name.clone(),
                });
            }
        }

        let mut targets = HashSet::new();
        for target in &config.targets {
            if !targets.insert(target.name()) {
                return Err(PublishError::DuplicateTarget {
                    target: target.name().to_string(),
                });
            }
        }

        Ok(())
    }

    /// Load configuration from environment variables
    fn load_env_config(env: &HashMap<String, String>) -> Option<PublishConfig> {
        let mut config = PublishConfig {
            publish: None,
            security: None,
            ..Default::default()
        };
        let mut has_changes = false;

        // PUBLISH_VERSION -> module.version
        if let Some(version) = env.get("PUBLISH_VERSION").filter(|v| !v.is_empty()) {
            config.module = Some(ModuleConfig {
                version: Some(version.clone()),
                ..Default::default()
            });
            has_changes = true;
        }

        // PUBLISH_STATUS -> status
        if let Some(status) = env.get("PUBLISH_STATUS").filter(|s| !s.is_empty()) {
            config.status = Some(status.clone());
            has_changes = true;
        }

        // PUBLISH_CONFIGURATIONS -> publish.configurations
        if let Some(names) = env.get("PUBLISH_CONFIGURATIONS") {
            let names: Vec<String> = names
                .split(',')
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string)
                .collect();

            if !names.is_empty() {
                config.publish = Some(PublishSection {
                    configurations: Some(names),
                    ..Default::default()
                });
                has_changes = true;
            }
        }

        if has_changes { Some(config) } else { None }
    }

    /// Merge multiple configurations with priority
    fn merge_configs(configs: Vec<PublishConfig>) -> PublishConfig {
        let mut configs = configs.into_iter();
        let mut result = configs.next().unwrap_or_default();

        for config in configs {
            Self::merge_into(&mut result, config);
        }

        result
    }

    /// Merge source config into target
    fn merge_into(target: &mut PublishConfig, source: PublishConfig) {
        // Version
        if !source.version.is_empty() {
            target.version = source.version;
        }

        // Extends
        if source.extends.is_some() {
            target.extends = source.extends;
        }

        // Module (field by field)
        if let Some(source_module) = source.module {
            let target_module = target.module.get_or_insert_with(ModuleConfig::default);

            if source_module.group.is_some() {
                target_module.group = source_module.group;
            }
            if source_module.name.is_some() {
                target_module.name = source_module.name;
            }
            if source_module.version.is_some() {
                target_module.version = source_module.version;
            }
        }

        if source.status.is_some() {
            target.status = source.status;
        }

        // Configurations (by name; later layer replaces)
        for configuration in source.configurations {
            match target
                .configurations
                .iter_mut()
                .find(|c| c.name == configuration.name)
            {
                Some(existing) => *existing = configuration,
                None => target.configurations.push(configuration),
            }
        }

        // Publish section (field by field)
        if let Some(source_publish) = source.publish {
            let target_publish = target.publish.get_or_insert_with(PublishSection::default);

            if source_publish.configurations.is_some() {
                target_publish.configurations = source_publish.configurations;
            }
            if source_publish.descriptor.is_some() {
                target_publish.descriptor = source_publish.descriptor;
            }
            if source_publish.state_file.is_some() {
                target_publish.state_file = source_publish.state_file;
            }
        }

        // Targets (by name; later layer replaces, order of first declaration kept)
        for target_config in source.targets {
            match target
                .targets
                .iter_mut()
                .find(|t| t.name() == target_config.name())
            {
                Some(existing) => *existing = target_config,
                None => target.targets.push(target_config),
            }
        }

        // Security
        if source.security.is_some() {
            target.security = source.security;
        }
    }

    /// Expand environment variables in configuration
    ///
    /// Security features:
    /// - Only expands variables matching ${VAR_NAME} pattern
    /// - Respects allowedPrefixes if configured
    /// - Checks forbiddenPatterns if configured
    fn expand_env_vars(
        mut config: PublishConfig,
        env: &HashMap<String, String>,
    ) -> Result<PublishConfig, PublishError> {
        let expansion = config
            .security
            .as_ref()
            .and_then(|s| s.env_var_expansion.as_ref());

        let enabled = expansion.and_then(|e| e.enabled).unwrap_or(true);
        if !enabled {
            return Ok(config);
        }

        let allowed_prefixes = expansion.and_then(|e| e.allowed_prefixes.clone());

        let forbidden_patterns = expansion
            .and_then(|e| e.forbidden_patterns.clone())
            .unwrap_or_default()
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| {
                    PublishError::config(format!("invalid forbidden pattern '{}': {}", p, e))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let expand = |input: &str| {
            Self::expand_string(input, env, allowed_prefixes.as_deref(), &forbidden_patterns)
        };

        for target in &mut config.targets {
            match target {
                TargetConfig::Filesystem { path, .. } => *path = expand(path),
                TargetConfig::Http { url, .. } => *url = expand(url),
            }
        }

        if let Some(publish) = &mut config.publish {
            if let Some(descriptor) = &publish.descriptor {
                publish.descriptor = Some(expand(descriptor));
            }
            if let Some(state_file) = &publish.state_file {
                publish.state_file = Some(expand(state_file));
            }
        }

        Ok(config)
    }

    /// Expand environment variables in a single string
    ///
    /// Variables that are forbidden, not allowed, or unset stay literal.
    fn expand_string(
        input: &str,
        env: &HashMap<String, String>,
        allowed_prefixes: Option<&[String]>,
        forbidden_patterns: &[Regex],
    ) -> String {
        ENV_VAR_REGEX
            .replace_all(input, |caps: &regex::Captures| {
                let var_name = &caps[1];

                if forbidden_patterns.iter().any(|p| p.is_match(var_name)) {
                    warn!(
                        variable = var_name,
                        "environment variable matches forbidden pattern, skipping"
                    );
                    return caps[0].to_string();
                }

                if let Some(prefixes) = allowed_prefixes
                    && !prefixes.iter().any(|prefix| var_name.starts_with(prefix.as_str()))
                {
                    warn!(
                        variable = var_name,
                        "environment variable not allowed by prefix whitelist, skipping"
                    );
                    return caps[0].to_string();
                }

                match env.get(var_name) {
                    Some(value) => value.clone(),
                    None => {
                        warn!(variable = var_name, "environment variable not found");
                        caps[0].to_string()
                    }
                }
            })
            .into_owned()
    }

    /// Validate configuration
    pub fn validate(config: &PublishConfig) -> ConfigValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        // 1. Check schema version
        if config.version.is_empty() {
            errors.push(error("version", "Version is required"));
        } else if config.version != SCHEMA_VERSION {
            warnings.push(ConfigValidationWarning {
                field: "version".to_string(),
                message: format!("Unknown version: {}", config.version),
                suggestion: Some(format!(
                    "Currently supported version is \"{}\" only",
                    SCHEMA_VERSION
                )),
            });
        }

        // 2. Module identity and status
        Self::validate_module(config, &mut errors, &mut warnings);

        // 3. Configurations and requested names
        Self::validate_configurations(config, &mut errors);

        // 4. Targets
        Self::validate_targets(&config.targets, &mut errors, &mut warnings);

        ConfigValidationResult {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    fn validate_module(
        config: &PublishConfig,
        errors: &mut Vec<ConfigValidationError>,
        warnings: &mut Vec<ConfigValidationWarning>,
    ) {
        let module = config.module.clone().unwrap_or_default();
        let parts = [
            ("module.group", &module.group),
            ("module.name", &module.name),
            ("module.version", &module.version),
        ];
        for (field, value) in parts {
            if value.as_deref().is_none_or(|v| v.trim().is_empty()) {
                errors.push(error(field, "is required"));
            }
        }

        if let Some(version) = &module.version
            && !version.trim().is_empty()
            && semver::Version::parse(version).is_err()
        {
            warnings.push(ConfigValidationWarning {
                field: "module.version".to_string(),
                message: format!("'{}' is not a semantic version", version),
                suggestion: Some("Use MAJOR.MINOR.PATCH (e.g., 1.0.0)".to_string()),
            });
        }

        if config.status.as_deref().is_some_and(|s| s.trim().is_empty()) {
            errors.push(error("status", "must not be empty"));
        }
    }

    fn validate_configurations(config: &PublishConfig, errors: &mut Vec<ConfigValidationError>) {
        let requested = config.requested_configurations();
        if requested.is_empty() {
            errors.push(error(
                "publish.configurations",
                "at least one configuration must be requested",
            ));
        }

        let graph = match config.configuration_graph() {
            Ok(graph) => graph,
            Err(e) => {
                errors.push(error("configurations", &e.to_string()));
                return;
            }
        };

        if let Err(e) = graph.check_acyclic() {
            errors.push(error("configurations", &e.to_string()));
        }

        for (i, name) in requested.iter().enumerate() {
            if !graph.contains(name) {
                errors.push(error(
                    &format!("publish.configurations[{}]", i),
                    &format!("unknown configuration '{}'", name),
                ));
            }
        }
    }

    fn validate_targets(
        targets: &[TargetConfig],
        errors: &mut Vec<ConfigValidationError>,
        warnings: &mut Vec<ConfigValidationWarning>,
    ) {
        if targets.is_empty() {
            warnings.push(ConfigValidationWarning {
                field: "targets".to_string(),
                message: "No publication targets configured".to_string(),
                suggestion: Some("Only the descriptor will be written".to_string()),
            });
        }

        let mut names = HashSet::new();
        for (i, target) in targets.iter().enumerate() {
            if target.name().trim().is_empty() {
                errors.push(error(&format!("targets[{}].name", i), "is required"));
            } else if !names.insert(target.name()) {
                errors.push(error(
                    &format!("targets[{}].name", i),
                    &format!("duplicate target name '{}'", target.name()),
                ));
            }

            match target {
                TargetConfig::Filesystem { path, .. } => {
                    if path.trim().is_empty() {
                        errors.push(error(&format!("targets[{}].path", i), "is required"));
                    }
                }
                TargetConfig::Http {
                    url,
                    max_concurrency,
                    retry,
                    ..
                } => {
                    if !(url.starts_with("http://") || url.starts_with("https://")) {
                        errors.push(error(
                            &format!("targets[{}].url", i),
                            &format!("'{}' is not an http(s) URL", url),
                        ));
                    }
                    if *max_concurrency == Some(0) {
                        errors.push(error(
                            &format!("targets[{}].maxConcurrency", i),
                            "must be at least 1",
                        ));
                    }
                    if retry.as_ref().and_then(|r| r.max_attempts) == Some(0) {
                        errors.push(error(
                            &format!("targets[{}].retry.maxAttempts", i),
                            "must be at least 1",
                        ));
                    }
                }
            }
        }
    }

    /// Format validation result as human-readable string
    pub fn format_validation_result(result: &ConfigValidationResult) -> String {
        let mut lines = Vec::new();

        if result.valid {
            lines.push("✅ Configuration validation succeeded".to_string());
        } else {
            lines.push("❌ Configuration has errors".to_string());
        }

        if !result.errors.is_empty() {
            lines.push("\n🔴 Errors:".to_string());
            for error in &result.errors {
                lines.push(format!("  - [{}] {}", error.field, error.message));
            }
        }

        if !result.warnings.is_empty() {
            lines.push("\n🟡 Warnings:".to_string());
            for warning in &result.warnings {
                lines.push(format!("  - [{}] {}", warning.field, warning.message));
                if let Some(suggestion) = &warning.suggestion {
                    lines.push(format!("    Suggestion: {}", suggestion));
                }
            }
        }

        lines.join("\n")
    }
}

fn error(field: &str, message: &str) -> ConfigValidationError {
    ConfigValidationError {
        field: field.to_string(),
        message: message.to_string(),
    }
}
