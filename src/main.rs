//! Module host binary
//!
//! Runs a top-level host, or a child host when started with
//! `--module-manager-constructor-options` by another host.
//!
//! Usage:
//!   module-host [--config <path>] [--module-dir <dir>]... [--module <path>]...

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use remoting_host::config::{HostConfig, LoggingConfig};
use remoting_host::module::bootstrap::{self, BootstrapOptions};
use remoting_host::module::manager::ConstructorOptions;
use remoting_host::utils::logging::{init_host_logging, init_logging_from_config};

#[derive(Parser, Debug)]
#[command(name = "module-host", version, about = "Cross-process component host")]
struct Args {
    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Manager options handed down by a parent host (child mode)
    #[arg(long)]
    module_manager_constructor_options: Option<String>,

    /// Directory of module units to load at startup
    #[arg(long = "module-dir")]
    module_dirs: Vec<String>,

    /// Single module unit to load at startup
    #[arg(long = "module")]
    modules: Vec<String>,

    /// Log filter directives (overrides the configuration file)
    #[arg(long)]
    log_filter: Option<String>,

    /// Host version (overrides the configuration file)
    #[arg(long)]
    host_version: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => HostConfig::from_json_file(path)
            .with_context(|| format!("Failed to load configuration from {:?}", path))?,
        None => HostConfig::default(),
    };
    config.modules.module_dirs.extend(args.module_dirs);
    config.modules.modules.extend(args.modules);
    if let Some(version) = args.host_version {
        config.host_version = Some(version);
    }
    if let Some(filter) = args.log_filter {
        let logging = config.logging.get_or_insert_with(LoggingConfig::default);
        logging.filter = Some(filter);
    }
    config.validate()?;

    let constructor_options = match &args.module_manager_constructor_options {
        Some(json) => Some(
            serde_json::from_str::<ConstructorOptions>(json)
                .context("Invalid --module-manager-constructor-options")?,
        ),
        None => None,
    };

    match std::env::var("MODULE_HOST_NAME") {
        Ok(host_name) if constructor_options.is_some() => init_host_logging(
            &host_name,
            config.logging.as_ref().and_then(|l| l.filter.as_deref()),
        ),
        _ => init_logging_from_config(config.logging.as_ref()),
    }

    info!("Starting module host");
    let mut options = BootstrapOptions::new(config);
    options.constructor_options = constructor_options;
    bootstrap::run(options).await?;
    info!("Module host stopped");
    Ok(())
}
