use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use azrm_azure::{ArmClient, AzureCliToken, Environment, HttpTransport, ServiceClient, StaticToken, TokenSource};
use secrecy::{ExposeSecret, SecretString};
use tracing::info;

use crate::config::{Features, ProviderConfig};

pub const RESOURCES_API_VERSION: &str = "2022-09-01";
pub const APP_CONFIGURATION_API_VERSION: &str = "2023-03-01";
pub const SERVICE_BUS_API_VERSION: &str = "2022-10-01-preview";
pub const APP_PLATFORM_API_VERSION: &str = "2023-05-01-preview";
pub const SQL_API_VERSION: &str = "2021-11-01";
pub const NETWORK_API_VERSION: &str = "2023-09-01";

#[derive(Debug, Clone)]
pub struct Account {
    pub subscription_id: String,
    pub tenant_id: Option<String>,
    pub environment: Environment,
}

/// Everything a handler needs, built once per provider configuration and
/// shared read-only between concurrent calls.
#[derive(Clone)]
pub struct Clients {
    pub account: Account,
    pub features: Features,
    pub resources: ServiceClient,
    pub app_configuration: ServiceClient,
    pub service_bus: ServiceClient,
    pub app_platform: ServiceClient,
    pub sql: ServiceClient,
    pub network: ServiceClient,
}

impl Clients {
    pub fn new(arm: ArmClient, account: Account, features: Features) -> Self {
        Self {
            account,
            features,
            resources: arm.service(RESOURCES_API_VERSION),
            app_configuration: arm.service(APP_CONFIGURATION_API_VERSION),
            service_bus: arm.service(SERVICE_BUS_API_VERSION),
            app_platform: arm.service(APP_PLATFORM_API_VERSION),
            sql: arm.service(SQL_API_VERSION),
            network: arm.service(NETWORK_API_VERSION),
        }
    }

    /// Real Azure: reqwest transport, a static token when one is given,
    /// otherwise the Azure CLI.
    pub fn connect(config: &ProviderConfig, access_token: Option<SecretString>) -> Result<Self> {
        let subscription_id = config
            .subscription_id
            .clone()
            .filter(|s| !s.is_empty())
            .context("subscription_id must be set in the provider configuration or via ARM_SUBSCRIPTION_ID")?;
        let environment = config.environment;

        let tokens: Arc<dyn TokenSource> = match access_token {
            Some(t) => Arc::new(StaticToken::new(t.expose_secret().clone())),
            None => Arc::new(AzureCliToken::new(environment.token_audience(), config.tenant_id.clone())),
        };
        let transport = Arc::new(HttpTransport::new().context("building HTTP client")?);
        let mut arm = ArmClient::new(transport, tokens, environment.resource_manager_endpoint());
        if let Some(secs) = config.poll_interval_seconds {
            arm = arm.with_poll_interval(Duration::from_secs(secs));
        }
        info!(%environment, subscription_id = %subscription_id, "configured Azure clients");

        let account = Account { subscription_id, tenant_id: config.tenant_id.clone(), environment };
        Ok(Self::new(arm, account, config.features.clone()))
    }
}
