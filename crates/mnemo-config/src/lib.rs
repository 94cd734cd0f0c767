//! # mnemo-config
//!
//! Configuration system for the mnemo memory store. Reads from `mnemo.toml`,
//! then applies environment variable overrides on top.
//!
//! Supports hot-reload via filesystem watcher.

pub mod loader;
pub mod logging;
pub mod schema;

pub use loader::ConfigLoader;
pub use logging::init_tracing;
pub use schema::MnemoConfig;
pub use schema::{
    ConfigWarning, CoordinatorConfig, DomainRule, EpisodicConfig, LoggingConfig, SemanticConfig,
    WarningSeverity, WorkingConfig,
};
