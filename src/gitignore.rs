//! ATK Home .gitignore contract
//!
//! Fetched plugin files are never committed (they are restored from their
//! source); `custom/` overrides always are. Local plugins have no source to
//! restore from, so each gets an exemption inside the managed block. Secret
//! patterns come last so no exemption can re-include them.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{AtkError, IoContext};

pub const GITIGNORE_FILE: &str = ".gitignore";

const BLOCK_START: &str = "# >>> atk local plugins (managed, do not edit)";
const BLOCK_END: &str = "# <<< atk local plugins";

const SECRETS: &str = "# Secrets
.env
*.env
.env.*
*.secret
";

pub fn default_content() -> String {
    format!(
        "# Plugin files are restored from their source, overrides are tracked
plugins/*/*
!plugins/*/custom/

# Interrupted operations
.atk-staging-*/

{}
{}

{}",
        BLOCK_START, BLOCK_END, SECRETS
    )
}

/// The exemption line for a local plugin directory
fn exemption(directory: &str) -> String {
    format!("!plugins/{}/*", directory)
}

/// Local plugin directories currently exempted
pub fn exemptions(content: &str) -> Vec<String> {
    managed_lines(content)
        .filter_map(|line| line.strip_prefix("!plugins/")?.strip_suffix("/*").map(str::to_string))
        .collect()
}

fn managed_lines(content: &str) -> impl Iterator<Item = &str> {
    content
        .lines()
        .skip_while(|line| *line != BLOCK_START)
        .skip(1)
        .take_while(|line| *line != BLOCK_END)
}

/// Add an exemption; returns the new content, unchanged if already present
pub fn add_exemption(content: &str, directory: &str) -> String {
    let mut dirs = exemptions(content);
    if dirs.iter().any(|d| d == directory) {
        return content.to_string();
    }
    dirs.push(directory.to_string());
    dirs.sort();
    rewrite_block(content, &dirs)
}

/// Remove an exemption; returns the new content, unchanged if absent
pub fn remove_exemption(content: &str, directory: &str) -> String {
    let dirs = exemptions(content);
    if !dirs.iter().any(|d| d == directory) {
        return content.to_string();
    }
    let remaining: Vec<String> = dirs.into_iter().filter(|d| d != directory).collect();
    rewrite_block(content, &remaining)
}

fn rewrite_block(content: &str, dirs: &[String]) -> String {
    let mut block = String::new();
    block.push_str(BLOCK_START);
    block.push('\n');
    for dir in dirs {
        block.push_str(&exemption(dir));
        block.push('\n');
    }
    block.push_str(BLOCK_END);

    let lines: Vec<&str> = content.lines().collect();
    let start = lines.iter().position(|l| *l == BLOCK_START);
    let end = lines.iter().position(|l| *l == BLOCK_END);

    match (start, end) {
        (Some(start), Some(end)) if start < end => {
            let mut out = lines[..start].join("\n");
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&block);
            out.push('\n');
            let rest = lines[end + 1..].join("\n");
            out.push_str(&rest);
            if !rest.is_empty() && content.ends_with('\n') {
                out.push('\n');
            }
            out
        }
        _ => {
            // Hand-edited file lost its markers: append the block, then the
            // secrets again so they still win
            let mut out = content.to_string();
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push('\n');
            out.push_str(&block);
            out.push_str("\n\n");
            out.push_str(SECRETS);
            out
        }
    }
}

/// .gitignore of an ATK Home
#[derive(Debug, Clone)]
pub struct GitignoreFile {
    path: PathBuf,
}

impl GitignoreFile {
    pub fn new(home: &Path) -> Self {
        Self {
            path: home.join(GITIGNORE_FILE),
        }
    }

    pub fn read(&self) -> Result<String, AtkError> {
        if !self.path.exists() {
            return Ok(String::new());
        }
        fs::read_to_string(&self.path).io_context(|| format!("Failed to read {}", self.path.display()))
    }

    pub fn write(&self, content: &str) -> Result<(), AtkError> {
        fs::write(&self.path, content).io_context(|| format!("Failed to write {}", self.path.display()))
    }

    /// Returns true if the file changed
    pub fn add_exemption(&self, directory: &str) -> Result<bool, AtkError> {
        let before = self.read()?;
        let after = add_exemption(&before, directory);
        if after == before {
            return Ok(false);
        }
        self.write(&after)?;
        log::debug!("Added gitignore exemption for plugins/{}", directory);
        Ok(true)
    }

    /// Returns true if the file changed
    pub fn remove_exemption(&self, directory: &str) -> Result<bool, AtkError> {
        let before = self.read()?;
        let after = remove_exemption(&before, directory);
        if after == before {
            return Ok(false);
        }
        self.write(&after)?;
        log::debug!("Removed gitignore exemption for plugins/{}", directory);
        Ok(true)
    }
}
