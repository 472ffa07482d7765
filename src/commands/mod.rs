//! CLI command handlers
//!
//! Each handler wires the real subprocess runner, git, fetcher and executor
//! into the engine and renders its outcome.

use colored::*;
use eyre::Result;

use crate::config::Config;
use crate::engine::{BulkReport, Engine};
use crate::fetch::Fetcher;
use crate::git::Git;
use crate::plugin::executor::{ShellExecutor, SystemRunner};

pub mod add;
pub mod bootstrap;
pub mod completions;
pub mod init;
pub mod lifecycle;
pub mod list;
pub mod remove;
pub mod status;
pub mod upgrade;

/// Build an engine over the configured ATK Home and hand it to `f`
pub fn with_engine<T>(config: &Config, f: impl FnOnce(&Engine) -> Result<T>) -> Result<T> {
    let home = config.atk_home();
    let runner = SystemRunner;
    let git = Git::new(&runner).with_author(&config.git.author_name, &config.git.author_email);
    let fetcher = Fetcher::new(&git, &config.registry.url);
    let executor = ShellExecutor;
    let store = home.manifest_store();
    let engine = Engine::new(home, &store, &fetcher, &executor, &git);
    f(&engine)
}

/// Print a bulk report; an error when any item failed
pub fn finish_bulk(report: &BulkReport, verb: &str) -> Result<()> {
    for name in &report.succeeded {
        println!("  {} {} {}", "✓".green(), verb, name.cyan());
    }
    for name in &report.skipped {
        println!("  {} {} {}", "→".blue(), "Skipped".dimmed(), name);
    }
    for (name, message) in &report.failed {
        println!("  {} {}: {}", "✗".red(), name.cyan(), message);
    }

    println!();
    println!(
        "{} succeeded, {} skipped, {} failed",
        report.succeeded.len(),
        report.skipped.len(),
        report.failed.len()
    );

    if !report.is_success() {
        eyre::bail!("{} of {} plugins failed", report.failed.len(), total(report));
    }
    Ok(())
}

fn total(report: &BulkReport) -> usize {
    report.succeeded.len() + report.skipped.len() + report.failed.len()
}
