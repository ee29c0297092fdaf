//! Application settings
//!
//! Typed configuration, layered loading and validation.

mod config;
mod loader;
mod validation;

pub use self::config::{AppConfig, ProviderSettings, RetrySettings, RunnerSettings, SlotSettings};
pub use self::loader::load_config;
pub use self::validation::validate_config;
