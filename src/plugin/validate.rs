//! Plugin definition validation
//!
//! Parses plugin.yaml, normalizes older schema versions to the current shape,
//! and checks the cross-field rules serde cannot express.

use serde_yaml::{Mapping, Value};
use std::collections::HashSet;

use super::definition::{CURRENT_SCHEMA_VERSION, McpTransport, PluginDefinition, SUPPORTED_SCHEMA_VERSIONS};
use crate::error::ValidationError;

const LEGACY_SCHEMA_VERSION: &str = "2025-12-01";

/// Validate raw plugin.yaml bytes
pub fn validate(raw: &[u8]) -> Result<PluginDefinition, ValidationError> {
    let document: Value =
        serde_yaml::from_slice(raw).map_err(|e| ValidationError::single(format!("invalid YAML: {}", e)))?;

    let Value::Mapping(mut mapping) = document else {
        return Err(ValidationError::single("plugin definition must be a YAML mapping"));
    };

    let version = schema_version(&mapping)?;
    if version == LEGACY_SCHEMA_VERSION {
        normalize_legacy(&mut mapping);
    }
    fill_defaults(&mut mapping);

    let mut problems = required_fields(&mapping);
    if !problems.is_empty() {
        return Err(ValidationError::new(problems));
    }

    let definition: PluginDefinition = serde_yaml::from_value(Value::Mapping(mapping))
        .map_err(|e| ValidationError::single(describe_serde_error(&e)))?;

    problems.extend(check_invariants(&definition));
    if problems.is_empty() {
        Ok(definition)
    } else {
        Err(ValidationError::new(problems))
    }
}

/// Cross-field rules, shared with the override merger
pub fn check_invariants(definition: &PluginDefinition) -> Vec<String> {
    let mut problems = Vec::new();

    if definition.name.trim().is_empty() {
        problems.push("'name': must not be empty".to_string());
    }
    if definition.description.trim().is_empty() {
        problems.push("'description': must not be empty".to_string());
    }

    if let Some(lifecycle) = &definition.lifecycle
        && lifecycle.install.is_some()
        && lifecycle.uninstall.is_none()
    {
        problems.push("'lifecycle.uninstall': required when 'lifecycle.install' is defined".to_string());
    }

    if let Some(mcp) = &definition.mcp {
        match mcp.transport {
            McpTransport::Stdio if mcp.command.is_none() => {
                problems.push("'mcp.command': required for stdio transport".to_string());
            }
            McpTransport::Sse if mcp.endpoint.is_none() => {
                problems.push("'mcp.endpoint': required for sse transport".to_string());
            }
            _ => {}
        }
    }

    for (index, port) in definition.ports.iter().enumerate() {
        if port.port == 0 || port.port > u16::MAX as u32 {
            problems.push(format!("'ports.{}.port': must be between 1 and 65535", index));
        }
    }

    let mut seen = HashSet::new();
    for (index, var) in definition.env_vars.iter().enumerate() {
        if !seen.insert(var.name.as_str()) {
            problems.push(format!("'env_vars.{}.name': duplicate variable '{}'", index, var.name));
        }
    }

    problems
}

fn schema_version(mapping: &Mapping) -> Result<String, ValidationError> {
    match mapping.get("schema_version") {
        None => Err(ValidationError::single("'schema_version': field is required")),
        Some(Value::String(version)) => {
            if SUPPORTED_SCHEMA_VERSIONS.contains(&version.as_str()) {
                Ok(version.clone())
            } else {
                Err(ValidationError::single(format!(
                    "'schema_version': unsupported version '{}' (supported: {})",
                    version,
                    SUPPORTED_SCHEMA_VERSIONS.join(", ")
                )))
            }
        }
        Some(_) => Err(ValidationError::single("'schema_version': expected string")),
    }
}

fn required_fields(mapping: &Mapping) -> Vec<String> {
    ["name", "description"]
        .into_iter()
        .filter_map(|field| match mapping.get(field) {
            None => Some(format!("'{}': field is required", field)),
            Some(Value::String(_)) => None,
            Some(_) => Some(format!("'{}': expected string", field)),
        })
        .collect()
}

fn describe_serde_error(err: &serde_yaml::Error) -> String {
    let message = err.to_string();
    // serde_yaml prefixes errors with the offending key path when it knows it
    match message.split_once(": ") {
        Some((path, detail)) if !path.contains(' ') => format!("'{}': {}", path, detail),
        _ => message,
    }
}

/// Defaults that apply to every schema version
fn fill_defaults(mapping: &mut Mapping) {
    if let Some(Value::Mapping(service)) = mapping.get_mut("service")
        && !service.contains_key("type")
    {
        service.insert("type".into(), "docker-compose".into());
    }
}

/// Rewrite a legacy document into the current shape, in memory only
fn normalize_legacy(mapping: &mut Mapping) {
    mapping.insert("schema_version".into(), CURRENT_SCHEMA_VERSION.into());

    if let Some(Value::Mapping(lifecycle)) = mapping.get_mut("lifecycle") {
        lifecycle.remove("restart");
    }

    if let Some(Value::Sequence(ports)) = mapping.get_mut("ports") {
        for port in ports.iter_mut() {
            if let Value::Mapping(port) = port {
                port.remove("configurable");
                port.remove("health_endpoint");
            }
        }
    }

    if let Some(Value::Mapping(vendor)) = mapping.get_mut("vendor") {
        vendor.remove("ref");
        if !vendor.contains_key("name") {
            let name = vendor
                .get("url")
                .and_then(Value::as_str)
                .map(repo_name_from_url)
                .unwrap_or_else(|| "unknown".to_string());
            vendor.insert("name".into(), name.into());
        }
    }

    let legacy_mcp = match mapping.get("mcp") {
        Some(Value::Mapping(mcp)) if !mcp.contains_key("transport") => Some(mcp.clone()),
        _ => None,
    };
    if let Some(mcp) = legacy_mcp {
        match normalize_legacy_mcp(&mcp) {
            Some(normalized) => mapping.insert("mcp".into(), Value::Mapping(normalized)),
            None => mapping.remove("mcp"),
        };
    }
}

fn normalize_legacy_mcp(legacy: &Mapping) -> Option<Mapping> {
    if legacy.get("enabled").and_then(Value::as_bool) == Some(false) {
        return None;
    }

    let transport = match legacy.get("type").and_then(Value::as_str) {
        Some("http-proxy") | Some("sse") => "sse",
        _ => "stdio",
    };

    let mut current = Mapping::new();
    current.insert("transport".into(), transport.into());
    for key in ["command", "args", "endpoint", "env"] {
        if let Some(value) = legacy.get(key) {
            current.insert(key.into(), value.clone());
        }
    }
    Some(current)
}

fn repo_name_from_url(url: &str) -> String {
    url.trim_end_matches('/')
        .rsplit(['/', ':'])
        .next()
        .unwrap_or(url)
        .trim_end_matches(".git")
        .to_string()
}
