//! Configuration module for FlowKey Vault
//!
//! This module provides configuration management including:
//! - Data directory resolution
//! - Privacy settings persistence

pub mod paths;
pub mod settings;

pub use paths::FlowKeyPaths;
pub use settings::{PrivacySettings, SettingsStore};
