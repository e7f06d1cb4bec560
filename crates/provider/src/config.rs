use std::path::Path;

use anyhow::{Context, Result};
use azrm_azure::Environment;
use serde::{Deserialize, Serialize};

/// Provider block, loaded from YAML and overridden by `ARM_*` variables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderConfig {
    pub subscription_id: Option<String>,
    pub tenant_id: Option<String>,
    pub environment: Environment,
    /// Fallback delay between long-running operation polls.
    pub poll_interval_seconds: Option<u64>,
    pub features: Features,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Features {
    /// Refuse to create over an existing remote object.
    pub requires_import: bool,
    pub resource_group: ResourceGroupFeatures,
    pub app_configuration: AppConfigurationFeatures,
}

impl Default for Features {
    fn default() -> Self {
        Self { requires_import: true, resource_group: Default::default(), app_configuration: Default::default() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResourceGroupFeatures {
    pub prevent_deletion_if_contains_resources: bool,
}

impl Default for ResourceGroupFeatures {
    fn default() -> Self { Self { prevent_deletion_if_contains_resources: true } }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfigurationFeatures {
    pub purge_soft_delete_on_destroy: bool,
    pub recover_soft_deleted: bool,
}

impl Default for AppConfigurationFeatures {
    fn default() -> Self { Self { purge_soft_delete_on_destroy: true, recover_soft_deleted: true } }
}

impl ProviderConfig {
    pub fn from_yaml(raw: &str) -> Result<Self> {
        serde_yaml::from_str(raw).context("parsing provider configuration")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        Self::from_yaml(&raw).with_context(|| format!("loading {}", path.display()))
    }

    /// `ARM_SUBSCRIPTION_ID`, `ARM_TENANT_ID` and `ARM_ENVIRONMENT` win over file values.
    pub fn with_env(self) -> Result<Self> {
        self.with_overrides(|k| std::env::var(k).ok())
    }

    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |k: &str| lookup(k).filter(|v| !v.trim().is_empty());
        if let Some(v) = var("ARM_SUBSCRIPTION_ID") {
            self.subscription_id = Some(v);
        }
        if let Some(v) = var("ARM_TENANT_ID") {
            self.tenant_id = Some(v);
        }
        if let Some(v) = var("ARM_ENVIRONMENT") {
            self.environment = v.parse().map_err(anyhow::Error::msg).context("ARM_ENVIRONMENT")?;
        }
        Ok(self)
    }
}
