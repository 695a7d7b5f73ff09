//! Configuration loading, validation, and env substitution.
//!
//! Config files: `warden.toml`, `warden.yaml`, or `warden.json`
//! Searched in `./` then `~/.config/warden/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    loader::{apply_env_overrides, config_dir, discover_and_load, load_config},
    schema::{MetricsConfig, PanelConfig, SyncConfig, WardenConfig},
    validate::{Diagnostic, Severity, ValidationResult, validate},
};
