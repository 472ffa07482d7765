//! Plugin runtime status

use colored::*;
use eyre::Result;

use crate::cli::OutputFormat;
use crate::config::Config;
use crate::error::AtkError;
use crate::lifecycle::{Lifecycle, PluginState, StatusReport};
use crate::manifest::ManifestStore;
use crate::plugin::executor::ShellExecutor;

pub fn run(plugin: Option<&str>, format: OutputFormat, config: &Config) -> Result<()> {
    let home = config.atk_home();
    home.require_initialized()?;
    let manifest = home.manifest_store().load()?;
    let executor = ShellExecutor;
    let lifecycle = Lifecycle::new(&home, &executor);

    let entries = match plugin {
        Some(identifier) => vec![
            manifest
                .find(identifier)
                .ok_or_else(|| AtkError::PluginNotFound(identifier.to_string()))?,
        ],
        None => manifest.plugins.iter().collect(),
    };

    let mut reports = Vec::new();
    for entry in entries {
        match lifecycle.status(entry) {
            Ok(report) => reports.push(report),
            Err(e) if plugin.is_some() => return Err(e.into()),
            Err(e) => eprintln!("{} {}: {}", "⚠".yellow(), entry.name, e),
        }
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
        OutputFormat::Yaml => println!("{}", serde_yaml::to_string(&reports)?),
        OutputFormat::Text => print_text(&reports),
    }
    Ok(())
}

fn print_text(reports: &[StatusReport]) {
    if reports.is_empty() {
        println!("  {}", "(no plugins)".dimmed());
        return;
    }

    for report in reports {
        let state = match report.state {
            PluginState::Running => "running".green(),
            PluginState::Stopped => "stopped".red(),
            PluginState::Unknown => "unknown".dimmed(),
        };
        println!("  {:<24} {}", report.name.cyan(), state);

        for port in &report.ports {
            let mark = match port.listening {
                Some(true) => "✓".green(),
                Some(false) => "✗".red(),
                None => "-".dimmed(),
            };
            println!("      {} port {}", mark, port.port);
        }
    }
}
