//! Configuration loading, validation, and env substitution.
//!
//! Config files: `relay.toml`, `relay.yaml`, or `relay.json`
//! Searched in `./` then `~/.config/wa-relay/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    error::{Error, Result},
    loader::{apply_env_overrides, config_dir, discover_and_load, load_config},
    schema::{
        DeliveryConfig, MetricsConfig, RelayConfig, ServerConfig, SessionConfig, WebhookConfig,
    },
    validate::{Diagnostic, Severity, ValidationResult},
};
