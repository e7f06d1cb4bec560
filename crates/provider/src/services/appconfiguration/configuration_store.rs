use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use azrm_core::data::{block_str, ResourceState};
use azrm_core::mapping::{self, pointer_insert, Field};
use azrm_core::schema::{common, AttributeSchema, Normalize, Validator};
use azrm_core::{location, tags, Resource, ResourceData, ResourceSchema, Timeouts};
use serde_json::{json, Map as JsonMap, Value as Json};
use tracing::{debug, info};

use super::{ConfigurationStoreId, DeletedConfigurationStoreId};
use crate::clients::Clients;
use crate::services::{check_requires_import, delete_if_present, get_or_clear, str_at};

const TYPE_NAME: &str = "azurerm_app_configuration";
const PURGE_POLL_INTERVAL: Duration = Duration::from_secs(10);
const DEFAULT_RETENTION_DAYS: i64 = 7;
const KEY_BLOCKS: [&str; 4] = ["primary_read_key", "primary_write_key", "secondary_read_key", "secondary_write_key"];

const FIELDS: &[Field] = &[
    Field::new("location", "/location").location(),
    Field::new("sku", "/sku/name"),
    Field::new("local_auth_enabled", "/properties/disableLocalAuth").not(),
    Field::new("public_network_access", "/properties/publicNetworkAccess"),
    Field::new("purge_protection_enabled", "/properties/enablePurgeProtection"),
    Field::new("data_plane_proxy_authentication_mode", "/properties/dataPlaneProxy/authenticationMode"),
    Field::new("endpoint", "/properties/endpoint").read_only(),
];

pub struct AppConfigurationResource;

fn access_key_block(name: &'static str) -> AttributeSchema {
    AttributeSchema::block(name, vec![
        AttributeSchema::string("id").computed().sensitive(),
        AttributeSchema::string("connection_string").computed().sensitive(),
        AttributeSchema::string("secret").computed().sensitive(),
    ])
    .computed()
}

fn validate_data_plane_proxy(d: &ResourceData) -> Vec<String> {
    if d.get_str("data_plane_proxy_authentication_mode") == "Local" && d.get_bool("data_plane_proxy_private_link_delegation_enabled") {
        return vec!["data_plane_proxy_private_link_delegation_enabled: cannot be set to `true` when `data_plane_proxy_authentication_mode` is `Local`".to_string()];
    }
    Vec::new()
}

fn private_link_delegation(enabled: bool) -> &'static str {
    if enabled { "Enabled" } else { "Disabled" }
}

fn expand_encryption(d: &ResourceData) -> Json {
    let mut key_vault = JsonMap::new();
    if let Some(block) = d.get_block("encryption") {
        for (attr, prop) in [("identity_client_id", "identityClientId"), ("key_vault_key_identifier", "keyIdentifier")] {
            let v = block_str(block, attr);
            if !v.is_empty() {
                key_vault.insert(prop.to_string(), json!(v));
            }
        }
    }
    json!({ "keyVaultProperties": key_vault })
}

fn flatten_encryption(body: &Json) -> Json {
    let client_id = str_at(body, "/properties/encryption/keyVaultProperties/identityClientId");
    let key_id = str_at(body, "/properties/encryption/keyVaultProperties/keyIdentifier");
    if client_id.is_empty() && key_id.is_empty() {
        return json!([]);
    }
    json!([{ "identity_client_id": client_id, "key_vault_key_identifier": key_id }])
}

/// Sorts `listKeys` results into the four primary/secondary read/write blocks.
fn flatten_access_keys(keys: &[Json], d: &mut ResourceData) {
    for block in KEY_BLOCKS {
        d.set(block, json!([]));
    }
    for key in keys {
        let name = key.get("name").and_then(Json::as_str).unwrap_or_default().to_ascii_lowercase();
        let Some(read_only) = key.get("readOnly").and_then(Json::as_bool) else { continue };
        let tier = if name.starts_with("primary") {
            "primary"
        } else if name.starts_with("secondary") {
            "secondary"
        } else {
            continue;
        };
        let block = format!("{tier}_{}_key", if read_only { "read" } else { "write" });
        d.set(&block, json!([{
            "id": str_at(key, "/id"),
            "connection_string": str_at(key, "/connectionString"),
            "secret": str_at(key, "/value"),
        }]));
    }
}

#[async_trait]
impl Resource<Clients> for AppConfigurationResource {
    fn type_name(&self) -> &'static str { TYPE_NAME }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(TYPE_NAME)
            .attribute(common::name(r"^[a-zA-Z0-9-]{5,50}$", "name may only contain alphanumeric characters and dashes and must be between 5-50 chars"))
            .attribute(common::resource_group_name())
            .attribute(common::location())
            .attribute(
                AttributeSchema::string("sku")
                    .default("free")
                    .validate(Validator::StringInSlice { values: &["free", "developer", "standard", "premium"], ignore_case: false }),
            )
            .attribute(AttributeSchema::bool("local_auth_enabled").default(true))
            .attribute(
                AttributeSchema::string("public_network_access")
                    .validate(Validator::StringInSlice { values: &["Enabled", "Disabled"], ignore_case: true })
                    .normalize(Normalize::CaseInsensitive),
            )
            .attribute(AttributeSchema::bool("purge_protection_enabled").default(false))
            .attribute(AttributeSchema::int("soft_delete_retention_days").default(DEFAULT_RETENTION_DAYS).force_new().validate(Validator::IntBetween(1, 7)))
            .attribute(
                AttributeSchema::string("data_plane_proxy_authentication_mode")
                    .default("Local")
                    .validate(Validator::StringInSlice { values: &["Local", "Pass-through"], ignore_case: false }),
            )
            .attribute(AttributeSchema::bool("data_plane_proxy_private_link_delegation_enabled").default(false))
            .attribute(
                AttributeSchema::block("encryption", vec![
                    AttributeSchema::string("identity_client_id"),
                    AttributeSchema::string("key_vault_key_identifier"),
                ])
                .max_items(1),
            )
            .attribute(AttributeSchema::string("endpoint").computed())
            .attribute(access_key_block("primary_read_key"))
            .attribute(access_key_block("primary_write_key"))
            .attribute(access_key_block("secondary_read_key"))
            .attribute(access_key_block("secondary_write_key"))
            .attribute(common::tags())
    }

    fn timeouts(&self) -> Timeouts { Timeouts::minutes(60, 5, 60, 60) }

    fn validate_import_id(&self, id: &str) -> Result<()> {
        ConfigurationStoreId::parse(id)?;
        Ok(())
    }

    fn validate_config(&self, config: &ResourceData) -> Vec<String> { validate_data_plane_proxy(config) }

    /// A store cannot move down to `free`, nor from a production tier to `developer`.
    fn customize_diff(&self, prior: &ResourceState, config: &JsonMap<String, Json>) -> Vec<String> {
        let old = prior.attributes.get("sku").and_then(Json::as_str).unwrap_or_default();
        let new = config.get("sku").and_then(Json::as_str).unwrap_or("free");
        let downgrade = ((old == "premium" || old == "standard") && new == "developer") || new == "free";
        if old != new && downgrade {
            vec!["sku".to_string()]
        } else {
            Vec::new()
        }
    }

    async fn create(&self, meta: &Clients, d: &mut ResourceData) -> Result<()> {
        let client = &meta.app_configuration;
        let name = d.get_str("name").to_string();
        let id = ConfigurationStoreId::new(&meta.account.subscription_id, d.get_str("resource_group_name"), &name);
        check_requires_import(meta, client, TYPE_NAME, &id.id(), &id).await?;

        let location = location::normalize(d.get_str("location"));
        let mut recover = false;
        if meta.features.app_configuration.recover_soft_deleted {
            let deleted = DeletedConfigurationStoreId::new(&meta.account.subscription_id, &location, &name);
            match client.get(&deleted.id()).await {
                Ok(_) => {
                    debug!(%deleted, "soft-deleted App Configuration exists, marked for recover");
                    recover = true;
                }
                Err(e) if e.was_not_found() => {}
                Err(e) if e.was_status(403) => anyhow::bail!(
                    "an existing soft-deleted App Configuration exists with the Name {name:?} in the location {location:?}, \
                     however the credentials Terraform is using has insufficient permissions to check for an existing \
                     soft-deleted App Configuration. You can opt out of this behaviour with `features.app_configuration.recover_soft_deleted`"
                ),
                Err(e) => return Err(e).with_context(|| format!("checking for presence of deleted {deleted}")),
            }
        }

        let mut body = json!({ "tags": tags::expand(d.get("tags")) });
        mapping::expand(FIELDS, d, &mut body);
        pointer_insert(&mut body, "/properties/dataPlaneProxy/privateLinkDelegation", json!(private_link_delegation(d.get_bool("data_plane_proxy_private_link_delegation_enabled"))));
        pointer_insert(&mut body, "/properties/encryption", expand_encryption(d));
        pointer_insert(&mut body, "/properties/softDeleteRetentionInDays", json!(d.get_i64("soft_delete_retention_days")));
        if recover {
            pointer_insert(&mut body, "/properties/createMode", json!("Recover"));
        }

        client.put_then_poll(&id.id(), body).await.with_context(|| format!("creating {id}"))?;
        d.set_id(id.id());
        Ok(())
    }

    async fn read(&self, meta: &Clients, d: &mut ResourceData) -> Result<()> {
        let client = &meta.app_configuration;
        let id = ConfigurationStoreId::parse(d.require_id()?)?;
        let Some(body) = get_or_clear(client, &id.id(), d, &id).await? else { return Ok(()) };

        let keys = client.post(&format!("{}/listKeys", id.id()), None).await.with_context(|| format!("retrieving access keys for {id}"))?;

        d.set("name", id.configuration_store_name.as_str());
        d.set("resource_group_name", id.resource_group_name.as_str());
        mapping::flatten(FIELDS, &self.schema(), &body, d);
        d.set(
            "data_plane_proxy_private_link_delegation_enabled",
            str_at(&body, "/properties/dataPlaneProxy/privateLinkDelegation") == "Enabled",
        );
        d.set("encryption", flatten_encryption(&body));
        match body.pointer("/properties/softDeleteRetentionInDays").and_then(Json::as_i64) {
            Some(days) if days > 0 => d.set("soft_delete_retention_days", days),
            // stores without soft delete report 0; keep whatever was configured
            _ if d.get("soft_delete_retention_days").is_none() => d.set("soft_delete_retention_days", DEFAULT_RETENTION_DAYS),
            _ => {}
        }
        let values = keys.get("value").and_then(Json::as_array).map(Vec::as_slice).unwrap_or_default();
        flatten_access_keys(values, d);
        d.set("tags", tags::flatten(body.get("tags")));
        Ok(())
    }

    async fn update(&self, meta: &Clients, d: &mut ResourceData) -> Result<()> {
        let client = &meta.app_configuration;
        let id = ConfigurationStoreId::parse(d.require_id()?)?;

        let existing = client.get(&id.id()).await.with_context(|| format!("retrieving {id}"))?;
        let purge_protected = existing.pointer("/properties/enablePurgeProtection").and_then(Json::as_bool).unwrap_or_default();
        if purge_protected && !d.get_bool("purge_protection_enabled") {
            anyhow::bail!("updating {id}: once Purge Protection has been Enabled it's not possible to disable it");
        }

        let mut body = json!({});
        mapping::expand_changed(FIELDS, &self.schema(), d, &mut body);
        if d.has_change("data_plane_proxy_private_link_delegation_enabled") {
            let v = private_link_delegation(d.get_bool("data_plane_proxy_private_link_delegation_enabled"));
            pointer_insert(&mut body, "/properties/dataPlaneProxy/privateLinkDelegation", json!(v));
        }
        if d.has_change("encryption") {
            pointer_insert(&mut body, "/properties/encryption", expand_encryption(d));
        }
        if d.has_change("tags") {
            body["tags"] = tags::expand(d.get("tags"));
        }
        if body.as_object().is_some_and(|m| m.is_empty()) {
            return Ok(());
        }

        client.patch_then_poll(&id.id(), body).await.with_context(|| format!("updating {id}"))?;
        Ok(())
    }

    async fn delete(&self, meta: &Clients, d: &mut ResourceData) -> Result<()> {
        let client = &meta.app_configuration;
        let id = ConfigurationStoreId::parse(d.require_id()?)?;

        let existing = match client.get(&id.id()).await {
            Ok(body) => body,
            Err(e) if e.was_not_found() => return Ok(()),
            Err(e) => return Err(e).with_context(|| format!("retrieving {id}")),
        };
        let purge_protected = existing.pointer("/properties/enablePurgeProtection").and_then(Json::as_bool).unwrap_or_default();
        let soft_delete_enabled = existing.pointer("/properties/softDeleteRetentionInDays").and_then(Json::as_i64).unwrap_or_default() > 0;

        delete_if_present(client, &id.id(), &id).await?;

        if !(meta.features.app_configuration.purge_soft_delete_on_destroy && soft_delete_enabled) {
            return Ok(());
        }

        let deleted = DeletedConfigurationStoreId::new(&id.subscription_id, location::normalize(str_at(&existing, "/location")), &id.configuration_store_name);
        if purge_protected {
            info!(%id, "purge protection is enabled; Azure will purge the store once its retention period ends");
            return Ok(());
        }

        debug!(%deleted, "purging soft-deleted App Configuration");
        client.post_then_poll(&format!("{}/purge", deleted.id()), None).await.with_context(|| format!("purging {id}"))?;

        // purge answers before the deleted entry is gone; wait for the 404
        loop {
            match client.get(&deleted.id()).await {
                Err(e) if e.was_not_found() => break,
                Ok(_) => tokio::time::sleep(PURGE_POLL_INTERVAL).await,
                Err(e) => return Err(e).with_context(|| format!("polling after purging {id}")),
            }
        }
        info!(%id, "purged App Configuration");
        Ok(())
    }
}
