use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Map as JsonMap, Value as Json};

/// One resource or data source, as written by the operator.
///
/// ```yaml
/// type: azurerm_resource_group
/// name: main
/// config:
///   name: rg-example
///   location: West Europe
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(rename = "type")]
    pub type_name: String,
    pub name: String,
    #[serde(default)]
    pub config: JsonMap<String, Json>,
}

impl Manifest {
    pub fn from_yaml(raw: &str) -> Result<Self> {
        let m: Manifest = serde_yaml::from_str(raw)?;
        validate_type_name(&m.type_name)?;
        if m.name.trim().is_empty() {
            anyhow::bail!("manifest name must not be empty");
        }
        Ok(m)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        Self::from_yaml(&raw).with_context(|| format!("parsing {}", path.display()))
    }

    /// Key under which the resource is kept in the state file.
    pub fn address(&self) -> String { address(&self.type_name, &self.name) }
}

pub fn address(type_name: &str, name: &str) -> String { format!("{type_name}.{name}") }

fn validate_type_name(type_name: &str) -> Result<()> {
    if !type_name.starts_with("azurerm_") {
        anyhow::bail!("type '{type_name}' must start with 'azurerm_'");
    }
    if !type_name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_') {
        anyhow::bail!("type '{type_name}' contains invalid characters; use lowercase, digits, and underscores only");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_nested_configuration() {
        let raw = "type: azurerm_servicebus_queue\nname: orders\nconfig:\n  name: orders\n  namespace_id: /x\n  max_delivery_count: 5\n  tags:\n    env: dev\n";
        let m = Manifest::from_yaml(raw).unwrap();
        assert_eq!(m.address(), "azurerm_servicebus_queue.orders");
        assert_eq!(m.config["max_delivery_count"], json!(5));
        assert_eq!(m.config["tags"], json!({ "env": "dev" }));
    }

    #[test]
    fn rejects_foreign_types_and_unknown_keys() {
        assert!(Manifest::from_yaml("type: aws_s3_bucket\nname: b\n").is_err());
        assert!(Manifest::from_yaml("type: azurerm_Resource\nname: b\n").is_err());
        assert!(Manifest::from_yaml("type: azurerm_resource_group\nname: b\nconfg: {}\n").is_err());
        assert!(Manifest::from_yaml("type: azurerm_resource_group\nname: ' '\n").is_err());
    }
}
