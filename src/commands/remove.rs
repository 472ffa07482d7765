//! Remove plugins

use colored::*;
use eyre::Result;

use super::add::print_commit;
use super::{finish_bulk, with_engine};
use crate::cli::PluginSelector;
use crate::config::Config;
use crate::engine::RemoveMode;

pub fn run(target: PluginSelector, cleanup: bool, config: &Config) -> Result<()> {
    let mode = if cleanup { RemoveMode::Cleanup } else { RemoveMode::Direct };

    with_engine(config, |engine| {
        if target.all {
            println!("{} Removing all plugins", "→".blue());
            let report = engine.remove_all(mode)?;
            return finish_bulk(&report, "Removed");
        }

        let Some(plugin) = target.plugin.as_deref() else {
            eyre::bail!("Specify a plugin or --all");
        };
        println!("{} Removing plugin: {}", "→".blue(), plugin.cyan());
        let outcome = engine.remove(plugin, mode)?;

        if !outcome.removed {
            println!("  {} {} is not installed", "→".blue(), plugin);
            return Ok(());
        }
        if let Some(code) = outcome.stop_failed {
            println!("  {} Stop command exited with {}, removed anyway", "⚠".yellow(), code);
        }
        println!(
            "  {} Removed {}",
            "✓".green(),
            outcome.name.as_deref().unwrap_or(plugin).cyan()
        );
        print_commit(outcome.commit.as_ref());
        Ok(())
    })
}
