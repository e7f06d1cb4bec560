use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::process::Command;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::ArmError;

/// Supplies bearer tokens for Resource Manager calls.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn token(&self) -> Result<SecretString, ArmError>;
}

/// A pre-issued token, e.g. from `ARM_ACCESS_TOKEN`.
pub struct StaticToken(SecretString);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self { Self(SecretString::new(token.into())) }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn token(&self) -> Result<SecretString, ArmError> {
        Ok(SecretString::new(self.0.expose_secret().clone()))
    }
}

struct CachedToken {
    secret: SecretString,
    expires_at: SystemTime,
}

/// Tokens from `az account get-access-token`, cached until shortly before expiry.
pub struct AzureCliToken {
    audience: String,
    tenant_id: Option<String>,
    cache: RwLock<Option<CachedToken>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliToken {
    access_token: String,
    #[serde(rename = "expires_on")]
    expires_on: Option<i64>,
}

const REFRESH_MARGIN: Duration = Duration::from_secs(300);

impl AzureCliToken {
    pub fn new(audience: impl Into<String>, tenant_id: Option<String>) -> Self {
        Self { audience: audience.into(), tenant_id, cache: RwLock::new(None) }
    }

    async fn fetch(&self) -> Result<CachedToken, ArmError> {
        let az = which::which("az").map_err(|_| ArmError::Auth("'az' CLI not found in PATH; install the Azure CLI or set ARM_ACCESS_TOKEN".into()))?;
        let mut cmd = Command::new(az);
        cmd.args(["account", "get-access-token", "--output", "json", "--resource", self.audience.as_str()]);
        if let Some(t) = &self.tenant_id {
            cmd.args(["--tenant", t.as_str()]);
        }
        debug!(audience = %self.audience, "requesting token from Azure CLI");
        let out = cmd.output().await.map_err(|e| ArmError::Auth(format!("running az: {e}")))?;
        if !out.status.success() {
            return Err(ArmError::Auth(format!("az account get-access-token failed: {}", String::from_utf8_lossy(&out.stderr).trim())));
        }
        let parsed: CliToken = serde_json::from_slice(&out.stdout).map_err(|e| ArmError::Auth(format!("parsing az output: {e}")))?;
        let expires_at = match parsed.expires_on {
            Some(secs) if secs > 0 => UNIX_EPOCH + Duration::from_secs(secs as u64),
            _ => SystemTime::now() + REFRESH_MARGIN * 2,
        };
        Ok(CachedToken { secret: SecretString::new(parsed.access_token), expires_at })
    }
}

fn still_valid(t: &CachedToken) -> bool {
    SystemTime::now() + REFRESH_MARGIN < t.expires_at
}

#[async_trait]
impl TokenSource for AzureCliToken {
    async fn token(&self) -> Result<SecretString, ArmError> {
        if let Some(t) = self.cache.read().await.as_ref().filter(|t| still_valid(t)) {
            return Ok(SecretString::new(t.secret.expose_secret().clone()));
        }
        let mut guard = self.cache.write().await;
        if let Some(t) = guard.as_ref().filter(|t| still_valid(t)) {
            return Ok(SecretString::new(t.secret.expose_secret().clone()));
        }
        let fresh = self.fetch().await?;
        let secret = SecretString::new(fresh.secret.expose_secret().clone());
        *guard = Some(fresh);
        Ok(secret)
    }
}
