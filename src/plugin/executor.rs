//! Subprocess execution
//!
//! Two narrow capabilities: `CommandRunner` runs a program and captures its
//! output (git and fetch backends), `LifecycleExecutor` runs a plugin's
//! lifecycle command and reports its exit code. Tests substitute fakes for both.

use indexmap::IndexMap;
use std::path::Path;
use std::process::{Command, Stdio};

use super::definition::LifecycleCommand;
use crate::error::AtkError;

/// Captured result of a finished subprocess
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

pub trait CommandRunner {
    fn run(
        &self,
        dir: &Path,
        env: &IndexMap<String, String>,
        program: &str,
        args: &[&str],
    ) -> Result<CommandOutput, AtkError>;
}

/// Runs real processes
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(
        &self,
        dir: &Path,
        env: &IndexMap<String, String>,
        program: &str,
        args: &[&str],
    ) -> Result<CommandOutput, AtkError> {
        log::debug!("Running {} {} in {}", program, args.join(" "), dir.display());

        let output = Command::new(program)
            .args(args)
            .current_dir(dir)
            .envs(env)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| AtkError::io(format!("Failed to spawn {}", program), e))?;

        Ok(CommandOutput {
            code: output.status.code().unwrap_or(1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

pub trait LifecycleExecutor {
    /// Run `command_line` for lifecycle step `name` inside `plugin_dir`
    fn invoke(
        &self,
        plugin_dir: &Path,
        env: &IndexMap<String, String>,
        name: LifecycleCommand,
        command_line: &str,
    ) -> Result<i32, AtkError>;
}

/// Runs lifecycle commands through `sh -c`
///
/// Output goes straight to the terminal, except for `status` whose output is
/// discarded: only its exit code matters.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellExecutor;

impl LifecycleExecutor for ShellExecutor {
    fn invoke(
        &self,
        plugin_dir: &Path,
        env: &IndexMap<String, String>,
        name: LifecycleCommand,
        command_line: &str,
    ) -> Result<i32, AtkError> {
        log::info!("Running {} command in {}: {}", name, plugin_dir.display(), command_line);

        let mut command = Command::new("sh");
        command
            .arg("-c")
            .arg(command_line)
            .current_dir(plugin_dir)
            .envs(env)
            .env("ATK_PLUGIN_DIR", plugin_dir);

        if name == LifecycleCommand::Status {
            command.stdout(Stdio::null()).stderr(Stdio::null());
        }

        let status = command
            .status()
            .map_err(|e| AtkError::io(format!("Failed to run {} command", name), e))?;

        let code = status.code().unwrap_or(1);
        if code != 0 {
            log::warn!("{} command exited with code {}", name, code);
        }
        Ok(code)
    }
}
