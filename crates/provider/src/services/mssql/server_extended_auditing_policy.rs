use anyhow::{Context, Result};
use async_trait::async_trait;
use azrm_core::mapping::{self, pointer_insert, Field};
use azrm_core::schema::{AttributeSchema, Validator};
use azrm_core::{ProviderError, Resource, ResourceData, ResourceSchema};
use serde_json::{json, Value as Json};
use tracing::info;

use super::{ServerExtendedAuditingPolicyId, ServerId};
use crate::clients::Clients;
use crate::services::{get_or_clear, str_at};

const TYPE_NAME: &str = "azurerm_mssql_server_extended_auditing_policy";

const FIELDS: &[Field] = &[
    Field::new("storage_endpoint", "/properties/storageEndpoint"),
    Field::new("storage_account_access_key", "/properties/storageAccountAccessKey").write_only(),
    Field::new("storage_account_access_key_is_secondary", "/properties/isStorageSecondaryKeyInUse"),
    Field::new("retention_in_days", "/properties/retentionDays"),
    Field::new("log_monitoring_enabled", "/properties/isAzureMonitorTargetEnabled"),
    Field::new("storage_account_subscription_id", "/properties/storageAccountSubscriptionId"),
];

pub struct MsSqlServerExtendedAuditingPolicyResource;

fn validate_server_id(v: &Json) -> Result<(), String> {
    ServerId::parse(v.as_str().unwrap_or_default()).map(|_| ()).map_err(|e| e.to_string())
}

fn state(enabled: bool) -> &'static str {
    if enabled { "Enabled" } else { "Disabled" }
}

/// The shape Delete leaves behind. The setting itself can never be removed.
fn is_reset(body: &Json) -> bool {
    str_at(body, "/properties/state").eq_ignore_ascii_case("Disabled")
        && str_at(body, "/properties/storageEndpoint").is_empty()
        && !body.pointer("/properties/isAzureMonitorTargetEnabled").and_then(Json::as_bool).unwrap_or_default()
}

/// Whether the values held for the resource ask for auditing or log monitoring.
/// Unset flags (import) count as asking, matching the schema defaults.
fn expects_active(d: &ResourceData) -> bool {
    let flag = |k: &str| d.get(k).and_then(Json::as_bool).unwrap_or(true);
    flag("enabled") || flag("log_monitoring_enabled")
}

fn build_body(d: &ResourceData) -> Json {
    let mut body = json!({ "properties": { "state": state(d.get_bool("enabled")) } });
    mapping::expand(FIELDS, d, &mut body);
    body
}

#[async_trait]
impl Resource<Clients> for MsSqlServerExtendedAuditingPolicyResource {
    fn type_name(&self) -> &'static str { TYPE_NAME }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(TYPE_NAME)
            .attribute(AttributeSchema::string("server_id").required().force_new().validate(Validator::Custom(validate_server_id)))
            .attribute(AttributeSchema::bool("enabled").default(true))
            .attribute(AttributeSchema::string("storage_endpoint").validate(Validator::Regex {
                pattern: r"^https://\S+$",
                message: "the storage endpoint must be an https URL",
            }))
            .attribute(AttributeSchema::string("storage_account_access_key").sensitive().validate(Validator::NotEmpty))
            .attribute(AttributeSchema::bool("storage_account_access_key_is_secondary").default(false))
            .attribute(AttributeSchema::int("retention_in_days").default(0).validate(Validator::IntBetween(0, 3285)))
            .attribute(AttributeSchema::bool("log_monitoring_enabled").default(true))
            .attribute(AttributeSchema::string("storage_account_subscription_id").validate(Validator::Regex {
                pattern: r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$",
                message: "expected a UUID",
            }))
    }

    fn validate_import_id(&self, id: &str) -> Result<()> {
        ServerExtendedAuditingPolicyId::parse(id)?;
        Ok(())
    }

    async fn create(&self, meta: &Clients, d: &mut ResourceData) -> Result<()> {
        let server = ServerId::parse(d.get_str("server_id"))?;
        let id = ServerExtendedAuditingPolicyId::from(&server);

        // every server has a policy; only an enabled one counts as managed elsewhere
        if meta.features.requires_import {
            match meta.sql.get(&id.id()).await {
                Ok(existing) if str_at(&existing, "/properties/state").eq_ignore_ascii_case("Enabled") => {
                    return Err(ProviderError::requires_import(TYPE_NAME, id.id()).into());
                }
                Ok(_) => {}
                Err(e) if e.was_not_found() => {}
                Err(e) => return Err(e).with_context(|| format!("checking for presence of existing {id}")),
            }
        }

        meta.sql.put_then_poll(&id.id(), build_body(d)).await.with_context(|| format!("creating {id}"))?;
        d.set_id(id.id());
        Ok(())
    }

    async fn read(&self, meta: &Clients, d: &mut ResourceData) -> Result<()> {
        let id = ServerExtendedAuditingPolicyId::parse(d.require_id()?)?;
        let Some(body) = get_or_clear(&meta.sql, &id.id(), d, &id).await? else { return Ok(()) };
        // a reset policy is only gone if something active was expected of it
        if is_reset(&body) && expects_active(d) {
            info!(%id, "auditing is disabled - removing from state");
            d.clear_id();
            return Ok(());
        }

        d.set("server_id", id.server().id());
        d.set("enabled", str_at(&body, "/properties/state").eq_ignore_ascii_case("Enabled"));
        mapping::flatten(FIELDS, &self.schema(), &body, d);
        Ok(())
    }

    async fn update(&self, meta: &Clients, d: &mut ResourceData) -> Result<()> {
        let id = ServerExtendedAuditingPolicyId::parse(d.require_id()?)?;
        meta.sql.put_then_poll(&id.id(), build_body(d)).await.with_context(|| format!("updating {id}"))?;
        Ok(())
    }

    async fn delete(&self, meta: &Clients, d: &mut ResourceData) -> Result<()> {
        let id = ServerExtendedAuditingPolicyId::parse(d.require_id()?)?;
        let mut body = json!({ "properties": { "state": state(false) } });
        pointer_insert(&mut body, "/properties/isAzureMonitorTargetEnabled", json!(false));
        match meta.sql.put_then_poll(&id.id(), body).await {
            Ok(_) => Ok(()),
            Err(e) if e.was_not_found() => Ok(()),
            Err(e) => Err(e).with_context(|| format!("deleting {id}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_key_is_sent_but_never_read_back() {
        let d = ResourceData::new(
            json!({
                "enabled": true,
                "storage_endpoint": "https://acct.blob.core.windows.net/",
                "storage_account_access_key": "secret",
                "retention_in_days": 6,
            })
            .as_object()
            .cloned()
            .unwrap(),
        );
        let body = build_body(&d);
        assert_eq!(body["properties"]["state"], json!("Enabled"));
        assert_eq!(body["properties"]["storageAccountAccessKey"], json!("secret"));
        assert_eq!(body["properties"]["retentionDays"], json!(6));
    }

    #[test]
    fn reset_policies_look_deleted() {
        assert!(is_reset(&json!({ "properties": { "state": "Disabled", "isAzureMonitorTargetEnabled": false } })));
        assert!(!is_reset(&json!({ "properties": { "state": "Disabled", "storageEndpoint": "https://x" } })));
        assert!(!is_reset(&json!({ "properties": { "state": "Enabled" } })));
    }

    #[test]
    fn only_policies_expected_active_can_vanish() {
        let held = |v: Json| ResourceData::new(v.as_object().cloned().unwrap());
        assert!(expects_active(&held(json!({}))));
        assert!(expects_active(&held(json!({ "enabled": false, "log_monitoring_enabled": true }))));
        assert!(!expects_active(&held(json!({ "enabled": false, "log_monitoring_enabled": false }))));
    }
}
