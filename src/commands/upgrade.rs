//! Upgrade registry and git plugins

use colored::*;
use eyre::Result;

use super::add::print_commit;
use super::{finish_bulk, with_engine};
use crate::cli::PluginSelector;
use crate::config::Config;
use crate::engine::{UpgradeOutcome, UpgradeStatus};
use crate::git::short;

pub fn run(target: PluginSelector, config: &Config) -> Result<()> {
    with_engine(config, |engine| {
        if target.all {
            println!("{} Upgrading all plugins", "→".blue());
            let report = engine.upgrade_all()?;
            return finish_bulk(&report, "Upgraded");
        }

        let Some(plugin) = target.plugin.as_deref() else {
            eyre::bail!("Specify a plugin or --all");
        };
        println!("{} Upgrading plugin: {}", "→".blue(), plugin.cyan());
        let outcome = engine.upgrade(plugin)?;
        print_outcome(&outcome);
        Ok(())
    })
}

fn print_outcome(outcome: &UpgradeOutcome) {
    let old = outcome.old_ref.as_deref().map(short).unwrap_or("none");
    let new = outcome.new_ref.as_deref().map(short).unwrap_or("none");

    match outcome.status {
        UpgradeStatus::UpToDate => {
            println!("  {} {} is up to date ({})", "✓".green(), outcome.name.cyan(), old);
            return;
        }
        UpgradeStatus::RefRefreshed => {
            println!(
                "  {} {} unchanged, ref updated {} → {}",
                "✓".green(),
                outcome.name.cyan(),
                old,
                new
            );
        }
        UpgradeStatus::Upgraded => {
            println!("  {} Upgraded {} {} → {}", "✓".green(), outcome.name.cyan(), old, new);
        }
    }

    if !outcome.new_env_vars.is_empty() {
        println!("  {} New environment variables to set in .env:", "⚠".yellow());
        for var in &outcome.new_env_vars {
            println!("      {}", var.cyan());
        }
    }
    print_commit(outcome.commit.as_ref());
}
