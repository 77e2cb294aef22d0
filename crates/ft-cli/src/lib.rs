//! Flip tracker CLI library.
//!
//! This crate provides the CLI interface for the flip tracker.

pub mod app;
mod cli;
pub mod commands;
mod config;
pub mod line_sensor;
pub mod lock;
mod notifier;

pub use cli::{Cli, Commands};
pub use config::{Config, ConfigError, default_config_file};
pub use notifier::ConsoleNotifier;
