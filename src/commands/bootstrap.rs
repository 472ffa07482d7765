//! Restore plugin files after cloning ATK Home onto a new machine

use colored::*;
use eyre::Result;

use super::{finish_bulk, with_engine};
use crate::config::Config;

pub fn run(config: &Config) -> Result<()> {
    with_engine(config, |engine| {
        println!("{} Restoring plugins in {}", "→".blue(), engine.home().root().display());
        let report = engine.restore_missing()?;
        finish_bulk(&report, "Restored")
    })
}
