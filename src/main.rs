use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::PathBuf;

mod cli;
mod commands;
mod config;
mod engine;
mod error;
mod fetch;
mod git;
mod gitignore;
mod home;
mod lifecycle;
mod manifest;
mod plugin;
mod sanitize;
mod source;

use cli::{Cli, Commands, OutputFormat};
use config::{Config, LogLevel};
use error::{AtkError, exit_code};
use plugin::definition::LifecycleCommand;

fn setup_logging(log_level: LogLevel) -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("atk")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("atk.log");

    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    // RUST_LOG env var takes precedence, otherwise use config log_level
    let mut builder = env_logger::Builder::new();

    if std::env::var("RUST_LOG").is_ok() {
        builder.parse_default_env();
    } else {
        builder.filter_level(log_level.as_filter());
    }

    builder.target(env_logger::Target::Pipe(target)).init();

    info!("Logging initialized, writing to: {}", log_file.display());
    info!(
        "Log level: {} (from {})",
        log_level.as_filter(),
        if std::env::var("RUST_LOG").is_ok() { "RUST_LOG env" } else { "config" }
    );
    Ok(())
}

fn run(cli: Cli, config: Config) -> Result<()> {
    match cli.command {
        Commands::Init { path } => commands::init::run(path, &config),
        Commands::Add { sources } => commands::add::run(&sources, &config),
        Commands::Upgrade { target } => commands::upgrade::run(target, &config),
        Commands::Remove { target, cleanup } => commands::remove::run(target, cleanup, &config),
        Commands::List { format } => commands::list::run(OutputFormat::resolve(format), &config),
        Commands::Status { plugin, format } => {
            commands::status::run(plugin.as_deref(), OutputFormat::resolve(format), &config)
        }
        Commands::Install { target } => commands::lifecycle::run(LifecycleCommand::Install, target, &config),
        Commands::Uninstall { target } => commands::lifecycle::run(LifecycleCommand::Uninstall, target, &config),
        Commands::Start { target } => commands::lifecycle::run(LifecycleCommand::Start, target, &config),
        Commands::Stop { target } => commands::lifecycle::run(LifecycleCommand::Stop, target, &config),
        Commands::Restart { target } => commands::lifecycle::restart(target, &config),
        Commands::Logs { plugin } => commands::lifecycle::logs(&plugin, &config),
        Commands::Bootstrap => commands::bootstrap::run(&config),
        Commands::Completions { shell } => commands::completions::run(shell),
    }
}

/// Exit code of the first `AtkError` in the chain
fn exit_code_for(report: &eyre::Report) -> i32 {
    report
        .chain()
        .find_map(|cause| cause.downcast_ref::<AtkError>())
        .map(AtkError::exit_code)
        .unwrap_or(exit_code::GENERAL_ERROR)
}

fn try_main(cli: Cli) -> Result<()> {
    // Load configuration before logging, so log messages in Config::load are silent
    let mut config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    if cli.verbose {
        config.log_level = LogLevel::Debug;
    } else if cli.quiet {
        config.log_level = LogLevel::Warn;
    }

    setup_logging(config.log_level).context("Failed to setup logging")?;

    info!("Starting atk with config from: {:?}", cli.config);

    run(cli, config)
}

fn main() {
    let cli = Cli::parse();

    if let Err(report) = try_main(cli) {
        log::error!("{:?}", report);
        eprintln!("{} {}", "✗".red(), report);
        for cause in report.chain().skip(1) {
            eprintln!("  caused by: {}", cause);
        }
        std::process::exit(exit_code_for(&report));
    }
}
