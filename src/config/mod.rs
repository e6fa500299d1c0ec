//! Configuration module for querybridge.
//!
//! Handles the TOML settings file and environment variable expansion.

mod settings;

pub use settings::{
    expand_env_vars, BridgeSettings, EncoderSettings, LoggingSettings, Settings, SettingsError,
};
