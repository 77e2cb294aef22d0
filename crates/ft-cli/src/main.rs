use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use ft_core::{Notifier, Orientation, TimeEntryClient};
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

use ft_cli::app::{self, App};
use ft_cli::commands::{flip, init, sides, status, watch};
use ft_cli::line_sensor::LineSensor;
use ft_cli::lock::{self, InstanceLock};
use ft_cli::{Cli, Commands, Config, ConsoleNotifier};

/// Resolves once Ctrl-C is pressed.
async fn ctrl_c() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("interrupted, shutting down");
}

fn notifier() -> Arc<dyn Notifier> {
    Arc::new(ConsoleNotifier)
}

fn run_init(explicit: Option<&Path>) -> Result<()> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => ft_cli::default_config_file().context("could not determine config directory")?,
    };
    if init::run(&path)? {
        println!("Wrote config template. Please edit the config file: {}", path.display());
    } else {
        println!("Config file already exists: {}", path.display());
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Some(Commands::Watch) => {
            let App { config, sides, api } = App::load(config_path)?;
            let _lock = InstanceLock::acquire(&lock::lock_path())?;
            let machine = app::build_machine(api, &config, sides, notifier());
            let mut link = LineSensor::new(BufReader::new(tokio::io::stdin()));
            watch::run(machine, &mut link, &config.drive_config(), ctrl_c()).await?;
        }
        Some(Commands::Status) => {
            let App { config, sides, api } = App::load(config_path)?;
            let client = TimeEntryClient::new(api, config.client_policy(), notifier());
            let mut output = Vec::new();
            status::run(&mut output, &client, &sides, &chrono::Local).await?;
            std::io::stdout().write_all(&output)?;
        }
        Some(Commands::Flip { orientation }) => {
            let App { config, sides, api } = App::load(config_path)?;
            let mut machine = app::build_machine(api, &config, sides, notifier());
            let state = flip::run(&mut machine, Orientation::new(orientation)).await;
            tracing::debug!(?state, "flip applied");
        }
        Some(Commands::Init) => run_init(config_path)?,
        Some(Commands::Sides) => {
            let config = Config::load_from(config_path).context("failed to load configuration")?;
            let mapping = config.side_mapping(&app::config_path_hint(config_path))?;
            sides::run(&mut std::io::stdout().lock(), &mapping)?;
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Notifications own stdout; logs go to stderr.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    let result = runtime.block_on(run(cli));
    // A pending stdin read cannot be cancelled; do not wait for it.
    runtime.shutdown_background();
    result
}
