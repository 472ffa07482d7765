//! Running lifecycle commands for installed plugins
//!
//! Commands resolve from the effective definition (upstream merged with
//! custom/), falling back to the service type's defaults.

use serde::Serialize;
use std::net::{SocketAddr, TcpStream};
use std::path::PathBuf;
use std::time::Duration;

use crate::engine::BulkReport;
use crate::error::AtkError;
use crate::home::AtkHome;
use crate::manifest::{Manifest, ManifestEntry};
use crate::plugin::definition::{LifecycleCommand, PluginDefinition};
use crate::plugin::env::plugin_env;
use crate::plugin::executor::LifecycleExecutor;
use crate::plugin::loader::load_plugin;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginState {
    Running,
    Stopped,
    /// No status command
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortStatus {
    pub port: u32,
    /// None when the plugin is not running
    pub listening: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub name: String,
    pub directory: String,
    pub state: PluginState,
    pub ports: Vec<PortStatus>,
}

/// Both phases of restarting every plugin
#[derive(Debug, Clone, Default)]
pub struct RestartReport {
    pub stop: BulkReport,
    /// None when the stop phase had failures
    pub start: Option<BulkReport>,
}

impl RestartReport {
    pub fn is_success(&self) -> bool {
        self.stop.is_success() && self.start.as_ref().is_some_and(BulkReport::is_success)
    }
}

pub struct Lifecycle<'a> {
    home: &'a AtkHome,
    executor: &'a dyn LifecycleExecutor,
}

impl<'a> Lifecycle<'a> {
    pub fn new(home: &'a AtkHome, executor: &'a dyn LifecycleExecutor) -> Self {
        Self { home, executor }
    }

    fn load(&self, entry: &ManifestEntry) -> Result<(PathBuf, PluginDefinition), AtkError> {
        let plugin_dir = self.home.plugin_dir(&entry.directory);
        let definition = load_plugin(&plugin_dir)?;
        Ok((plugin_dir, definition))
    }

    /// Exit code of the command, or None if the plugin has no such command
    pub fn run(&self, entry: &ManifestEntry, command: LifecycleCommand) -> Result<Option<i32>, AtkError> {
        let (plugin_dir, definition) = self.load(entry)?;
        let Some(command_line) = definition.command(command) else {
            log::info!("Plugin '{}' defines no {} command", entry.name, command);
            return Ok(None);
        };
        let env = plugin_env(&plugin_dir)?;
        self.executor
            .invoke(&plugin_dir, &env, command, &command_line)
            .map(Some)
    }

    /// Run `command` for one plugin; a non-zero exit is an error
    pub fn run_checked(&self, entry: &ManifestEntry, command: LifecycleCommand) -> Result<Option<i32>, AtkError> {
        match self.run(entry, command)? {
            Some(code) if code != 0 => Err(AtkError::Lifecycle {
                plugin: entry.name.clone(),
                command: command.to_string(),
                code,
            }),
            other => Ok(other),
        }
    }

    /// Run `command` for every plugin
    ///
    /// `stop` and `uninstall` go in reverse manifest order.
    pub fn run_all(&self, manifest: &Manifest, command: LifecycleCommand) -> BulkReport {
        let mut report = BulkReport::default();
        let mut entries: Vec<&ManifestEntry> = manifest.plugins.iter().collect();
        if matches!(command, LifecycleCommand::Stop | LifecycleCommand::Uninstall) {
            entries.reverse();
        }

        for entry in entries {
            match self.run(entry, command) {
                Ok(Some(0)) => report.succeeded.push(entry.name.clone()),
                Ok(Some(code)) => report.failed.push((entry.name.clone(), format!("exit code {}", code))),
                Ok(None) => report.skipped.push(entry.name.clone()),
                Err(e) => report.failed.push((entry.name.clone(), e.to_string())),
            }
        }
        report
    }

    /// Stop then start one plugin; start is skipped if stop failed
    pub fn restart(&self, entry: &ManifestEntry) -> Result<(), AtkError> {
        self.run_checked(entry, LifecycleCommand::Stop)?;
        self.run_checked(entry, LifecycleCommand::Start)?;
        Ok(())
    }

    /// Stop everything (reverse order), then start everything if all stops succeeded
    pub fn restart_all(&self, manifest: &Manifest) -> RestartReport {
        let stop = self.run_all(manifest, LifecycleCommand::Stop);
        if !stop.is_success() {
            log::warn!("Not starting plugins: {} failed to stop", stop.failed.len());
            return RestartReport { stop, start: None };
        }
        let start = self.run_all(manifest, LifecycleCommand::Start);
        RestartReport {
            stop,
            start: Some(start),
        }
    }

    pub fn status(&self, entry: &ManifestEntry) -> Result<StatusReport, AtkError> {
        let state = match self.run(entry, LifecycleCommand::Status)? {
            None => PluginState::Unknown,
            Some(0) => PluginState::Running,
            Some(_) => PluginState::Stopped,
        };
        let (_, definition) = self.load(entry)?;

        let ports = definition
            .ports
            .iter()
            .map(|spec| PortStatus {
                port: spec.port,
                listening: (state == PluginState::Running).then(|| is_port_listening(spec.port)),
            })
            .collect();

        Ok(StatusReport {
            name: entry.name.clone(),
            directory: entry.directory.clone(),
            state,
            ports,
        })
    }
}

fn is_port_listening(port: u32) -> bool {
    let Ok(port) = u16::try_from(port) else {
        return false;
    };
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    TcpStream::connect_timeout(&addr, Duration::from_millis(500)).is_ok()
}
