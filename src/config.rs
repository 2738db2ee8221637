// ABOUTME: Configuration loading for the keepsake binary.
// ABOUTME: Reads KEEPSAKE_* environment variables and resolves them into plugin options.

use std::path::PathBuf;

use keepsake_storage::{PluginOptions, ROOT_STATE_KEY, StorageOption};
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("KEEPSAKE_STORAGE must be \"local\" or \"session\", got {0:?}")]
    InvalidStorage(String),

    #[error("KEEPSAKE_KEYS does not name any storage key")]
    NoKeys,
}

/// Binary configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct KeepsakeConfig {
    pub home: PathBuf,
    pub storage: StorageOption,
    pub keys: Vec<String>,
}

impl KeepsakeConfig {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// Environment variables:
    /// - KEEPSAKE_HOME: data directory (default: ~/.keepsake)
    /// - KEEPSAKE_STORAGE: `local` or `session` (default: local)
    /// - KEEPSAKE_KEYS: comma-separated storage keys (default: @@STATE)
    pub fn from_env() -> Result<Self, ConfigError> {
        let home = std::env::var("KEEPSAKE_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                std::env::var("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("/tmp"))
                    .join(".keepsake")
            });

        let storage = match std::env::var("KEEPSAKE_STORAGE") {
            Err(_) => StorageOption::Local,
            Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
                "" | "local" => StorageOption::Local,
                "session" => StorageOption::Session,
                _ => return Err(ConfigError::InvalidStorage(value)),
            },
        };

        let keys = match std::env::var("KEEPSAKE_KEYS") {
            Err(_) => vec![ROOT_STATE_KEY.to_string()],
            Ok(raw) => {
                let keys: Vec<String> = raw
                    .split(',')
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
                    .map(String::from)
                    .collect();
                if keys.is_empty() {
                    return Err(ConfigError::NoKeys);
                }
                keys
            }
        };

        Ok(Self {
            home,
            storage,
            keys,
        })
    }

    /// Plugin options for these settings, with `extra_keys` taking the place
    /// of the configured keys when given.
    pub fn plugin_options(&self, extra_keys: &[String]) -> PluginOptions {
        let keys = if extra_keys.is_empty() {
            self.keys.clone()
        } else {
            extra_keys.to_vec()
        };
        PluginOptions::new().keys(keys).storage(self.storage.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clear_env() {
        // SAFETY: test-only code, single-threaded test execution
        unsafe {
            std::env::remove_var("KEEPSAKE_HOME");
            std::env::remove_var("KEEPSAKE_STORAGE");
            std::env::remove_var("KEEPSAKE_KEYS");
        }
    }

    #[test]
    fn config_loads_defaults_and_parses_overrides() {
        clear_env();
        let config = KeepsakeConfig::from_env().unwrap();
        assert!(matches!(config.storage, StorageOption::Local));
        assert_eq!(config.keys, vec!["@@STATE".to_string()]);
        assert!(config.home.to_string_lossy().contains(".keepsake"));

        // SAFETY: test-only code, single-threaded test execution
        unsafe {
            std::env::set_var("KEEPSAKE_HOME", "/tmp/keepsake-test");
            std::env::set_var("KEEPSAKE_STORAGE", "Session");
            std::env::set_var("KEEPSAKE_KEYS", "counter, user.profile,");
        }
        let config = KeepsakeConfig::from_env().unwrap();

        // SAFETY: test-only code, single-threaded test execution
        unsafe {
            std::env::set_var("KEEPSAKE_STORAGE", "cloud");
        }
        let invalid = KeepsakeConfig::from_env();
        clear_env();

        assert_eq!(config.home, PathBuf::from("/tmp/keepsake-test"));
        assert!(matches!(config.storage, StorageOption::Session));
        assert_eq!(config.keys, vec!["counter".to_string(), "user.profile".to_string()]);

        let err = invalid.unwrap_err();
        assert!(
            err.to_string().contains("KEEPSAKE_STORAGE"),
            "error should name the variable: {}",
            err
        );
    }

    #[test]
    fn cli_keys_replace_configured_keys() {
        let config = KeepsakeConfig {
            home: PathBuf::from("/tmp"),
            storage: StorageOption::Session,
            keys: vec!["@@STATE".to_string()],
        };

        assert_eq!(config.plugin_options(&[]).keys, vec!["@@STATE".to_string()]);
        assert_eq!(
            config.plugin_options(&["counter".to_string()]).keys,
            vec!["counter".to_string()]
        );
    }
}
