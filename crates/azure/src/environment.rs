use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Azure cloud the provider talks to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Public,
    UsGovernment,
    China,
}

impl Environment {
    pub fn resource_manager_endpoint(&self) -> &'static str {
        match self {
            Environment::Public => "https://management.azure.com",
            Environment::UsGovernment => "https://management.usgovcloudapi.net",
            Environment::China => "https://management.chinacloudapi.cn",
        }
    }

    /// Audience requested when acquiring tokens.
    pub fn token_audience(&self) -> &'static str {
        match self {
            Environment::Public => "https://management.core.windows.net/",
            Environment::UsGovernment => "https://management.core.usgovcloudapi.net/",
            Environment::China => "https://management.core.chinacloudapi.cn/",
        }
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "public" | "azurepubliccloud" => Ok(Environment::Public),
            "usgovernment" | "azureusgovernmentcloud" => Ok(Environment::UsGovernment),
            "china" | "azurechinacloud" => Ok(Environment::China),
            other => Err(format!("unknown environment {other:?}, expected one of public, usgovernment, china")),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Environment::Public => "public",
            Environment::UsGovernment => "usgovernment",
            Environment::China => "china",
        })
    }
}
