//! install, uninstall, start, stop, restart and logs

use colored::*;
use eyre::Result;

use super::finish_bulk;
use crate::cli::PluginSelector;
use crate::config::Config;
use crate::error::AtkError;
use crate::home::AtkHome;
use crate::lifecycle::Lifecycle;
use crate::manifest::{Manifest, ManifestEntry, ManifestStore};
use crate::plugin::definition::LifecycleCommand;
use crate::plugin::executor::ShellExecutor;

fn load(config: &Config) -> Result<(AtkHome, Manifest)> {
    let home = config.atk_home();
    home.require_initialized()?;
    let manifest = home.manifest_store().load()?;
    Ok((home, manifest))
}

fn find<'m>(manifest: &'m Manifest, identifier: &str) -> Result<&'m ManifestEntry> {
    Ok(manifest
        .find(identifier)
        .ok_or_else(|| AtkError::PluginNotFound(identifier.to_string()))?)
}

fn past_tense(command: LifecycleCommand) -> &'static str {
    match command {
        LifecycleCommand::Install => "Installed",
        LifecycleCommand::Uninstall => "Uninstalled",
        LifecycleCommand::Start => "Started",
        LifecycleCommand::Stop => "Stopped",
        LifecycleCommand::Status => "Checked",
        LifecycleCommand::Logs => "Showed logs for",
    }
}

pub fn run(command: LifecycleCommand, target: PluginSelector, config: &Config) -> Result<()> {
    let (home, manifest) = load(config)?;
    let executor = ShellExecutor;
    let lifecycle = Lifecycle::new(&home, &executor);

    if target.all {
        println!("{} Running {} for all plugins", "→".blue(), command);
        let report = lifecycle.run_all(&manifest, command);
        return finish_bulk(&report, past_tense(command));
    }

    let Some(identifier) = target.plugin.as_deref() else {
        eyre::bail!("Specify a plugin or --all");
    };
    let entry = find(&manifest, identifier)?;
    println!("{} Running {} for {}", "→".blue(), command, entry.name.cyan());

    match lifecycle.run_checked(entry, command)? {
        Some(_) => println!("  {} {} {}", "✓".green(), past_tense(command), entry.name.cyan()),
        None => println!("  {} {} defines no {} command", "⚠".yellow(), entry.name.cyan(), command),
    }
    Ok(())
}

pub fn restart(target: PluginSelector, config: &Config) -> Result<()> {
    let (home, manifest) = load(config)?;
    let executor = ShellExecutor;
    let lifecycle = Lifecycle::new(&home, &executor);

    if target.all {
        println!("{} Restarting all plugins", "→".blue());
        let report = lifecycle.restart_all(&manifest);
        finish_bulk(&report.stop, "Stopped")?;
        return match report.start {
            Some(start) => finish_bulk(&start, "Started"),
            None => eyre::bail!("Not starting plugins because some failed to stop"),
        };
    }

    let Some(identifier) = target.plugin.as_deref() else {
        eyre::bail!("Specify a plugin or --all");
    };
    let entry = find(&manifest, identifier)?;
    println!("{} Restarting {}", "→".blue(), entry.name.cyan());
    lifecycle.restart(entry)?;
    println!("  {} Restarted {}", "✓".green(), entry.name.cyan());
    Ok(())
}

pub fn logs(identifier: &str, config: &Config) -> Result<()> {
    let (home, manifest) = load(config)?;
    let executor = ShellExecutor;
    let lifecycle = Lifecycle::new(&home, &executor);

    let entry = find(&manifest, identifier)?;
    if lifecycle.run_checked(entry, LifecycleCommand::Logs)?.is_none() {
        println!("{} {} defines no logs command", "⚠".yellow(), entry.name.cyan());
    }
    Ok(())
}
