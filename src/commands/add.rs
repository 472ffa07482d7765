//! Add plugins

use colored::*;
use eyre::Result;

use super::{finish_bulk, with_engine};
use crate::config::Config;
use crate::engine::AddOutcome;
use crate::git::{CommitOutcome, short};
use crate::manifest::SourceRef;

pub fn run(sources: &[String], config: &Config) -> Result<()> {
    with_engine(config, |engine| {
        if let [source] = sources {
            println!("{} Adding plugin: {}", "→".blue(), source.cyan());
            let outcome = engine.add(source)?;
            print_outcome(&outcome);
            return Ok(());
        }

        println!("{} Adding {} plugins", "→".blue(), sources.len());
        let report = engine.add_all(sources);
        finish_bulk(&report, "Added")
    })
}

fn print_outcome(outcome: &AddOutcome) {
    let verb = if outcome.replaced { "Updated" } else { "Added" };
    println!(
        "  {} {} {} ({})",
        "✓".green(),
        verb,
        outcome.name.cyan(),
        format!("plugins/{}", outcome.directory).dimmed()
    );

    match &outcome.source {
        SourceRef::Local => println!("  {} Source: local", "✓".green()),
        SourceRef::Registry { reference } => println!("  {} Source: registry @ {}", "✓".green(), short(reference)),
        SourceRef::Git { url, reference } => println!("  {} Source: {} @ {}", "✓".green(), url, short(reference)),
    }

    if outcome.install_exit.is_some() {
        println!("  {} Ran install", "✓".green());
    }
    print_commit(outcome.commit.as_ref());
}

pub(crate) fn print_commit(commit: Option<&CommitOutcome>) {
    match commit {
        Some(CommitOutcome::Committed { hash }) => println!("  {} Committed {}", "✓".green(), short(hash)),
        Some(CommitOutcome::NothingToCommit) => println!("  {} Nothing to commit", "→".blue()),
        None => println!("  {} Auto-commit disabled, changes left uncommitted", "⚠".yellow()),
    }
}
