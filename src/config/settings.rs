//! TOML-based configuration for querybridge.
//!
//! Example configuration (`querybridge.toml`):
//! ```toml
//! [bridge]
//! worker_threads = 2
//! max_blocking_threads = 64
//! thread_name = "querybridge-${USER}"
//!
//! [encoder]
//! base_overhead = 1024
//! per_token_estimate = 200
//! safety_margin = 200
//!
//! [logging]
//! level = "debug"
//! json = true
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Runtime backing the background execution contexts.
    pub bridge: BridgeSettings,

    /// Token JSON encoder buffer sizing.
    pub encoder: EncoderSettings,

    /// Log output.
    pub logging: LoggingSettings,
}

/// Runtime configuration for the execution bridge.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BridgeSettings {
    /// Async worker threads driving completions.
    pub worker_threads: usize,

    /// Upper bound on concurrently running engine calls.
    pub max_blocking_threads: usize,

    /// Thread name prefix (supports ${ENV_VAR} expansion).
    pub thread_name: String,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            worker_threads: 2,
            max_blocking_threads: 64,
            thread_name: "querybridge-engine".to_string(),
        }
    }
}

impl BridgeSettings {
    /// Get the thread name with environment variables expanded.
    pub fn resolved_thread_name(&self) -> Result<String, SettingsError> {
        expand_env_vars(&self.thread_name)
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if self.worker_threads == 0 {
            return Err(SettingsError::InvalidConfig(
                "bridge.worker_threads must be at least 1".to_string(),
            ));
        }
        if self.max_blocking_threads == 0 {
            return Err(SettingsError::InvalidConfig(
                "bridge.max_blocking_threads must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Buffer sizing for the token JSON encoder.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EncoderSettings {
    /// Initial bytes reserved for the document envelope.
    pub base_overhead: usize,

    /// Initial bytes reserved per token.
    pub per_token_estimate: usize,

    /// Minimum headroom kept before writing a token.
    pub safety_margin: usize,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            base_overhead: 1024,
            per_token_estimate: 200,
            safety_margin: 200,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default level when `RUST_LOG` is unset ("error" .. "trace").
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json: false,
        }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate settings from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        let settings: Settings = toml::from_str(content)?;
        settings.bridge.validate()?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `QUERYBRIDGE_CONFIG`
    /// 2. `./querybridge.toml`
    /// 3. `~/.config/querybridge/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("QUERYBRIDGE_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("querybridge.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("querybridge").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax. A lone `$` is kept as-is.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let braced = chars.next_if_eq(&'{').is_some();
        let mut var_name = String::new();
        if braced {
            for ch in chars.by_ref() {
                if ch == '}' {
                    break;
                }
                var_name.push(ch);
            }
        } else {
            while let Some(ch) = chars.next_if(|ch| ch.is_alphanumeric() || *ch == '_') {
                var_name.push(ch);
            }
        }

        if var_name.is_empty() && !braced {
            result.push('$');
            continue;
        }

        let value = env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name))?;
        result.push_str(&value);
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_env_vars_braces() {
        env::set_var("QB_TEST_VAR", "hello");
        assert_eq!(expand_env_vars("${QB_TEST_VAR}").unwrap(), "hello");
        assert_eq!(
            expand_env_vars("prefix_${QB_TEST_VAR}_suffix").unwrap(),
            "prefix_hello_suffix"
        );
        env::remove_var("QB_TEST_VAR");
    }

    #[test]
    fn test_expand_env_vars_no_braces() {
        env::set_var("QB_TEST_VAR2", "world");
        assert_eq!(expand_env_vars("$QB_TEST_VAR2").unwrap(), "world");
        assert_eq!(expand_env_vars("$QB_TEST_VAR2!").unwrap(), "world!");
        assert_eq!(expand_env_vars("cost $").unwrap(), "cost $");
        env::remove_var("QB_TEST_VAR2");
    }

    #[test]
    fn test_expand_env_vars_missing() {
        let result = expand_env_vars("${QB_NONEXISTENT_VAR_12345}");
        assert!(matches!(result, Err(SettingsError::MissingEnvVar(_))));
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
[bridge]
worker_threads = 4
max_blocking_threads = 16

[encoder]
safety_margin = 512

[logging]
level = "debug"
json = true
"#;

        let settings = Settings::from_toml(toml).unwrap();

        assert_eq!(settings.bridge.worker_threads, 4);
        assert_eq!(settings.bridge.max_blocking_threads, 16);
        assert_eq!(settings.bridge.thread_name, "querybridge-engine");
        assert_eq!(settings.encoder.safety_margin, 512);
        assert_eq!(settings.encoder.base_overhead, 1024);
        assert_eq!(settings.logging.level, "debug");
        assert!(settings.logging.json);
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();

        assert_eq!(settings.bridge.worker_threads, 2);
        assert_eq!(settings.bridge.max_blocking_threads, 64);
        assert_eq!(settings.encoder.per_token_estimate, 200);
        assert_eq!(settings.logging.level, "warn");
        assert!(!settings.logging.json);
    }

    #[test]
    fn test_zero_threads_rejected() {
        let result = Settings::from_toml("[bridge]\nworker_threads = 0\n");
        assert!(matches!(result, Err(SettingsError::InvalidConfig(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = Settings::from_file("/nonexistent/querybridge.toml");
        assert!(matches!(result, Err(SettingsError::FileNotFound(_))));
    }
}
