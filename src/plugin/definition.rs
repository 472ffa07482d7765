//! Plugin definition types (plugin.yaml)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Schema version written by this release
pub const CURRENT_SCHEMA_VERSION: &str = "2026-01-23";

/// Every schema version the validator understands, oldest first
pub const SUPPORTED_SCHEMA_VERSIONS: &[&str] = &["2025-12-01", CURRENT_SCHEMA_VERSION];

/// Parsed and normalized plugin.yaml
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PluginDefinition {
    pub schema_version: String,
    pub name: String,
    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<ServiceSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<VendorSpec>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<PortSpec>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env_vars: Vec<EnvVarSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lifecycle: Option<LifecycleSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mcp: Option<McpSpec>,
}

/// How the plugin's service runs
///
/// Each variant carries only the identifiers that make sense for it.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum ServiceSpec {
    #[serde(rename = "docker-compose")]
    Compose(ComposeService),
    #[serde(rename = "docker")]
    SingleContainer(ContainerService),
    #[serde(rename = "systemd")]
    SystemUnit(UnitService),
    #[serde(rename = "script")]
    Script(ScriptService),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ComposeService {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compose_file: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ContainerService {
    pub container_name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct UnitService {
    pub unit_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ScriptService {}

impl ServiceSpec {
    /// YAML tag of this variant
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Compose(_) => "docker-compose",
            Self::SingleContainer(_) => "docker",
            Self::SystemUnit(_) => "systemd",
            Self::Script(_) => "script",
        }
    }

    /// Command the service type implies when plugin.yaml does not spell one out
    ///
    /// Install and uninstall never have implied commands.
    pub fn default_command(&self, command: LifecycleCommand) -> Option<String> {
        use LifecycleCommand::*;

        match self {
            Self::Compose(compose) => {
                let file = compose
                    .compose_file
                    .as_deref()
                    .map(|f| format!(" -f {}", f))
                    .unwrap_or_default();
                match command {
                    Start => Some(format!("docker compose{} up -d", file)),
                    Stop => Some(format!("docker compose{} down", file)),
                    Status => Some(format!("docker compose{} ps --status running --quiet | grep -q .", file)),
                    Logs => Some(format!("docker compose{} logs -f", file)),
                    Install | Uninstall => None,
                }
            }
            Self::SingleContainer(container) => {
                let name = &container.container_name;
                match command {
                    Start => Some(format!("docker start {}", name)),
                    Stop => Some(format!("docker stop {}", name)),
                    Status => Some(format!(
                        "docker inspect -f '{{{{.State.Running}}}}' {} | grep -q true",
                        name
                    )),
                    Logs => Some(format!("docker logs -f {}", name)),
                    Install | Uninstall => None,
                }
            }
            Self::SystemUnit(unit) => {
                let name = &unit.unit_name;
                match command {
                    Start => Some(format!("systemctl start {}", name)),
                    Stop => Some(format!("systemctl stop {}", name)),
                    Status => Some(format!("systemctl is-active --quiet {}", name)),
                    Logs => Some(format!("journalctl -u {} -f", name)),
                    Install | Uninstall => None,
                }
            }
            Self::Script(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VendorSpec {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docs: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PortSpec {
    pub port: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default = "default_protocol")]
    pub protocol: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn default_protocol() -> String {
    "http".to_string()
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EnvVarSpec {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub required: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,

    #[serde(default)]
    pub secret: bool,
}

/// Named lifecycle commands
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LifecycleSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uninstall: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logs: Option<String>,

    /// Health check URL, informational only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_endpoint: Option<String>,
}

impl LifecycleSpec {
    pub fn get(&self, command: LifecycleCommand) -> Option<&str> {
        match command {
            LifecycleCommand::Install => self.install.as_deref(),
            LifecycleCommand::Uninstall => self.uninstall.as_deref(),
            LifecycleCommand::Start => self.start.as_deref(),
            LifecycleCommand::Stop => self.stop.as_deref(),
            LifecycleCommand::Status => self.status.as_deref(),
            LifecycleCommand::Logs => self.logs.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum McpTransport {
    Stdio,
    Sse,
}

/// MCP server description, consumed by agent configuration tooling
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct McpSpec {
    pub transport: McpTransport,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Names of env vars passed through to the MCP server
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<String>,
}

/// Lifecycle command names a plugin may define
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleCommand {
    Install,
    Uninstall,
    Start,
    Stop,
    Status,
    Logs,
}

impl LifecycleCommand {
    pub const ALL: [LifecycleCommand; 6] = [
        Self::Install,
        Self::Uninstall,
        Self::Start,
        Self::Stop,
        Self::Status,
        Self::Logs,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Uninstall => "uninstall",
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Status => "status",
            Self::Logs => "logs",
        }
    }
}

impl fmt::Display for LifecycleCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LifecycleCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown lifecycle command: {}", s))
    }
}

impl PluginDefinition {
    /// Resolve a lifecycle command: explicit entry first, then the service default
    pub fn command(&self, command: LifecycleCommand) -> Option<String> {
        if let Some(explicit) = self.lifecycle.as_ref().and_then(|l| l.get(command)) {
            return Some(explicit.to_string());
        }
        self.service.as_ref().and_then(|s| s.default_command(command))
    }

    /// Names of declared env vars, in declaration order
    pub fn env_var_names(&self) -> Vec<&str> {
        self.env_vars.iter().map(|v| v.name.as_str()).collect()
    }
}
