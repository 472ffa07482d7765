//! Initialize ATK Home

use colored::*;
use eyre::Result;
use std::path::PathBuf;

use crate::config::Config;
use crate::error::AtkError;
use crate::git::Git;
use crate::home::{AtkHome, InitOutcome};
use crate::plugin::executor::SystemRunner;

pub fn run(path: Option<PathBuf>, config: &Config) -> Result<()> {
    let home = match path {
        Some(path) => AtkHome::new(Config::expand_path(&path)),
        None => config.atk_home(),
    };

    if !Git::is_available() {
        return Err(AtkError::Git("git not found on PATH".to_string()).into());
    }

    println!("{} Initializing ATK Home in {}", "→".blue(), home.root().display());

    let runner = SystemRunner;
    let git = Git::new(&runner).with_author(&config.git.author_name, &config.git.author_email);

    match home.init(&git)? {
        InitOutcome::AlreadyInitialized => {
            println!("  {} ATK Home already initialized at {}", "✓".green(), home.root().display());
        }
        InitOutcome::Created => {
            println!("  {} Created plugins/", "✓".green());
            println!("  {} Created manifest.yaml", "✓".green());
            println!("  {} Created .gitignore", "✓".green());
            println!("  {} Initialized git repository", "✓".green());
            println!();
            println!("{} ATK Home initialized!", "✓".green().bold());
            println!();
            println!("Next steps:");
            println!("  1. Run {} to add a plugin", "atk add <name|url|path>".cyan());
            println!("  2. Run {} to see what is installed", "atk list".cyan());
        }
    }

    Ok(())
}
