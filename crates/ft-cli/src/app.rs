//! Wiring shared by the commands that talk to Kimai.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use ft_core::{Notifier, OrientationMachine, SideMapping, TimeEntryClient, TimesheetApi};
use ft_kimai::KimaiClient;

use crate::config::{self, Config};

/// Validated configuration plus the API client built from it.
#[derive(Debug)]
pub struct App {
    pub config: Config,
    pub sides: SideMapping,
    pub api: KimaiClient,
}

/// The file a user should edit when configuration is incomplete.
pub fn config_path_hint(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .or_else(config::default_config_file)
        .unwrap_or_else(|| PathBuf::from("config.toml"))
}

/// Loads configuration, refusing to continue without a credential and host.
pub fn load_config(explicit: Option<&Path>) -> Result<(Config, SideMapping)> {
    let config = Config::load_from(explicit).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");
    let sides = config.validate(&config_path_hint(explicit))?;
    Ok((config, sides))
}

impl App {
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let (config, sides) = load_config(explicit)?;
        let api = KimaiClient::new(
            config.api_host.clone(),
            config.api_token.clone(),
            config.request_timeout(),
        )
        .context("failed to create Kimai client")?;
        Ok(Self { config, sides, api })
    }
}

/// Builds the orientation machine over `api` with the configured policy.
pub fn build_machine<A: TimesheetApi>(
    api: A,
    config: &Config,
    sides: SideMapping,
    notifier: Arc<dyn Notifier>,
) -> OrientationMachine<A> {
    let client = TimeEntryClient::new(api, config.client_policy(), Arc::clone(&notifier));
    OrientationMachine::new(client, sides, notifier)
}
