//! Configuration module for wrq.
//!
//! Handles data sources, row limits, security storage and environment
//! variable expansion.

mod settings;

pub use settings::{
    expand_env_vars, DataSourceSettings, SecuritySettings, ServerSettings, Settings,
    SettingsError,
};
