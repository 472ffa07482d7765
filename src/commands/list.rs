//! List installed plugins and anything out of sync with the manifest

use colored::*;
use eyre::Result;

use super::with_engine;
use crate::cli::OutputFormat;
use crate::config::Config;
use crate::engine::{HealthStatus, PluginHealth};

pub fn run(format: OutputFormat, config: &Config) -> Result<()> {
    with_engine(config, |engine| {
        let plugins = engine.inspect()?;
        match format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&plugins)?),
            OutputFormat::Yaml => println!("{}", serde_yaml::to_string(&plugins)?),
            OutputFormat::Text => print_text(&plugins),
        }
        Ok(())
    })
}

fn print_text(plugins: &[PluginHealth]) {
    println!("{}", "Installed plugins:".bold());
    println!();

    if plugins.is_empty() {
        println!("  {}", "(none)".dimmed());
        return;
    }

    for plugin in plugins {
        let source = plugin.source.as_deref().unwrap_or("-");
        let (mark, note) = match &plugin.status {
            HealthStatus::Ok => ("✓".green(), String::new()),
            HealthStatus::MissingDirectory => ("✗".red(), "directory missing (run atk bootstrap)".to_string()),
            HealthStatus::MissingDefinition => ("✗".red(), "plugin.yaml missing (run atk bootstrap)".to_string()),
            HealthStatus::InvalidDefinition(message) => ("✗".red(), format!("invalid: {}", message)),
            HealthStatus::Orphaned => ("⚠".yellow(), "not in manifest".to_string()),
        };
        println!(
            "  {} {:<24} {:<24} {:<9} {}",
            mark,
            plugin.name.cyan(),
            plugin.directory,
            source.dimmed(),
            note.yellow()
        );
    }
}
