//! Secure token manager for publication target credentials
//!
//! Tokens are read from environment variables named per target and held as
//! [`SecretString`] so they do not leak through `Debug` output or logs.

use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::env;

/// Secure token manager for target authentication
///
/// # Examples
///
/// ```
/// use module_publisher::security::SecureTokenManager;
///
/// let mut manager = SecureTokenManager::new();
/// manager.register("remote", "REMOTE_REPO_TOKEN");
/// assert_eq!(manager.get_token_name("remote"), Some("REMOTE_REPO_TOKEN"));
/// ```
#[derive(Debug, Default)]
pub struct SecureTokenManager {
    target_map: HashMap<String, String>,
}

impl SecureTokenManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a target name to the environment variable holding its token
    pub fn register(&mut self, target: impl Into<String>, env_var: impl Into<String>) {
        self.target_map.insert(target.into(), env_var.into());
    }

    /// Retrieves the token for `target` from its environment variable
    ///
    /// Returns `None` if the target has no mapping, or the variable is unset
    /// or empty.
    pub fn get_token(&self, target: &str) -> Option<SecretString> {
        let token_name = self.target_map.get(target)?;
        let token_value = env::var(token_name).ok().filter(|v| !v.is_empty())?;
        Some(SecretString::new(token_value.into()))
    }

    pub fn has_token(&self, target: &str) -> bool {
        self.get_token(target).is_some()
    }

    /// Masks a token for safe logging
    ///
    /// Shows only the first 3 and last 3 characters for identification purposes.
    /// Tokens shorter than 10 characters are fully masked as "****".
    ///
    /// # Examples
    ///
    /// ```
    /// use module_publisher::security::SecureTokenManager;
    ///
    /// let manager = SecureTokenManager::new();
    /// assert_eq!(manager.mask_token("abcdef123456"), "abc...456");
    /// assert_eq!(manager.mask_token("short"), "****");
    /// ```
    pub fn mask_token(&self, token: &str) -> String {
        let chars: Vec<char> = token.chars().collect();
        if chars.len() < 10 {
            return "****".to_string();
        }

        let prefix: String = chars[..3].iter().collect();
        let suffix: String = chars[chars.len() - 3..].iter().collect();
        format!("{}...{}", prefix, suffix)
    }

    /// Masks every registered target token found in `text`
    pub fn mask_tokens_in_string(&self, text: &str) -> String {
        let mut masked = text.to_string();

        for target in self.target_map.keys() {
            if let Some(token) = self.get_token(target) {
                let token_str = token.expose_secret();
                if let Ok(regex) = Regex::new(&regex::escape(token_str)) {
                    let masked_token = self.mask_token(token_str);
                    masked = regex
                        .replace_all(&masked, masked_token.as_str())
                        .to_string();
                }
            }
        }

        masked
    }

    /// Gets the environment variable name for a target
    pub fn get_token_name(&self, target: &str) -> Option<&str> {
        self.target_map.get(target).map(|s| s.as_str())
    }

    pub fn registered_targets(&self) -> Vec<String> {
        let mut targets: Vec<String> = self.target_map.keys().cloned().collect();
        targets.sort();
        targets
    }
}
