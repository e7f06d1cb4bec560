use anyhow::{Context, Result};
use async_trait::async_trait;
use azrm_azure::ServiceClient;
use azrm_core::mapping::{self, pointer_insert, Field};
use azrm_core::schema::{common, AttributeSchema, Validator};
use azrm_core::{tags, Resource, ResourceData, ResourceSchema, Timeouts};
use serde_json::{json, Value as Json};
use tracing::debug;

use super::{config_server, name_validator, SpringCloudServiceId};
use crate::clients::Clients;
use crate::services::{check_requires_import, delete_if_present, get_or_clear};

const TYPE_NAME: &str = "azurerm_spring_cloud_service";
const ENTERPRISE_SKU: &str = "E0";

const FIELDS: &[Field] = &[
    Field::new("location", "/location").location(),
    Field::new("sku_name", "/sku/name"),
    Field::new("zone_redundant", "/properties/zoneRedundant"),
];

pub struct SpringCloudServiceResource;

fn config_server_path(id: &SpringCloudServiceId) -> String { format!("{}/configServers/default", id.id()) }
fn service_registry_path(id: &SpringCloudServiceId) -> String { format!("{}/serviceRegistries/default", id.id()) }

fn is_enterprise(d: &ResourceData) -> bool { d.get_str("sku_name") == ENTERPRISE_SKU }

fn expand_git(d: &ResourceData) -> Result<Option<Json>> {
    let git = config_server::expand(d)?;
    if git.is_some() && is_enterprise(d) {
        anyhow::bail!("`config_server_git_setting` is not supported for sku `{ENTERPRISE_SKU}`");
    }
    Ok(git)
}

/// PUTs the config server, then reads it back: Azure accepts bad Git settings
/// and only reports them on the resource.
async fn apply_config_server(client: &ServiceClient, id: &SpringCloudServiceId, git: Option<Json>) -> Result<()> {
    debug!(%id, "updating config server settings");
    let mut body = json!({ "properties": { "configServer": {} } });
    if let Some(git) = git {
        pointer_insert(&mut body, "/properties/configServer/gitProperty", git);
    }
    let path = config_server_path(id);
    client.put_then_poll(&path, body).await.with_context(|| format!("updating config server for {id}"))?;

    let current = client.get(&path).await.with_context(|| format!("retrieving config server for {id}"))?;
    if let Some(error) = current.pointer("/properties/error").filter(|e| !e.is_null()) {
        anyhow::bail!("setting config server for {id}: {error}");
    }
    Ok(())
}

async fn set_service_registry(client: &ServiceClient, id: &SpringCloudServiceId, enabled: bool) -> Result<()> {
    let path = service_registry_path(id);
    if enabled {
        client.put_then_poll(&path, json!({})).await.with_context(|| format!("creating service registry of {id}"))?;
    } else {
        delete_if_present(client, &path, &format!("service registry of {id}")).await?;
    }
    Ok(())
}

fn build_body(d: &ResourceData) -> Json {
    let mut body = json!({ "tags": tags::expand(d.get("tags")) });
    mapping::expand(FIELDS, d, &mut body);
    if d.get_bool("log_stream_public_endpoint_enabled") {
        pointer_insert(&mut body, "/properties/vnetAddons/logStreamPublicEndpoint", json!(true));
    }
    body
}

#[async_trait]
impl Resource<Clients> for SpringCloudServiceResource {
    fn type_name(&self) -> &'static str { TYPE_NAME }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(TYPE_NAME)
            .attribute(AttributeSchema::string("name").required().force_new().validate(name_validator()))
            .attribute(common::location())
            .attribute(common::resource_group_name())
            .attribute(
                AttributeSchema::string("sku_name")
                    .default("S0")
                    .force_new()
                    .validate(Validator::StringInSlice { values: &["B0", "S0", ENTERPRISE_SKU], ignore_case: false }),
            )
            .attribute(AttributeSchema::bool("zone_redundant").default(false).force_new())
            .attribute(AttributeSchema::bool("log_stream_public_endpoint_enabled"))
            .attribute(config_server::schema())
            .attribute(AttributeSchema::bool("service_registry_enabled"))
            .attribute(AttributeSchema::string("service_registry_id").computed())
            .attribute(AttributeSchema::string_list("outbound_public_ip_addresses").computed())
            .attribute(common::tags())
    }

    fn timeouts(&self) -> Timeouts { Timeouts::minutes(60, 5, 30, 30) }

    fn validate_import_id(&self, id: &str) -> Result<()> {
        SpringCloudServiceId::parse(id)?;
        Ok(())
    }

    async fn create(&self, meta: &Clients, d: &mut ResourceData) -> Result<()> {
        let client = &meta.app_platform;
        let id = SpringCloudServiceId::new(&meta.account.subscription_id, d.get_str("resource_group_name"), d.get_str("name"));
        check_requires_import(meta, client, TYPE_NAME, &id.id(), &id).await?;
        let git = expand_git(d)?;

        // the create API ignores config server settings, so they follow as a separate call
        client.put_then_poll(&id.id(), build_body(d)).await.with_context(|| format!("creating {id}"))?;
        d.set_id(id.id());

        if !is_enterprise(d) {
            apply_config_server(client, &id, git).await?;
        }
        if d.get_bool("service_registry_enabled") {
            set_service_registry(client, &id, true).await?;
        }
        Ok(())
    }

    async fn read(&self, meta: &Clients, d: &mut ResourceData) -> Result<()> {
        let client = &meta.app_platform;
        let id = SpringCloudServiceId::parse(d.require_id()?)?;
        let Some(body) = get_or_clear(client, &id.id(), d, &id).await? else { return Ok(()) };

        d.set("name", id.spring_name.as_str());
        d.set("resource_group_name", id.resource_group_name.as_str());
        mapping::flatten(FIELDS, &self.schema(), &body, d);
        if let Some(enabled) = body.pointer("/properties/vnetAddons/logStreamPublicEndpoint").and_then(Json::as_bool) {
            d.set("log_stream_public_endpoint_enabled", enabled);
        }
        d.set("outbound_public_ip_addresses", json!(azrm_core::data::string_list(body.pointer("/properties/networkProfile/outboundIPs/publicIPs"))));
        d.set("tags", tags::flatten(body.get("tags")));

        let registry = match client.get(&service_registry_path(&id)).await {
            Ok(_) => true,
            Err(e) if e.was_not_found() => false,
            Err(e) => return Err(e).with_context(|| format!("retrieving service registry of {id}")),
        };
        d.set("service_registry_enabled", registry);
        d.set("service_registry_id", if registry { service_registry_path(&id) } else { String::new() });

        if !is_enterprise(d) {
            let server = client.get(&config_server_path(&id)).await.with_context(|| format!("retrieving config server configuration for {id}"))?;
            let old = d.get_block(config_server::ATTRIBUTE).cloned();
            let git = config_server::flatten(server.pointer("/properties/configServer/gitProperty"), old.as_ref());
            d.set(config_server::ATTRIBUTE, git);
        }
        Ok(())
    }

    async fn update(&self, meta: &Clients, d: &mut ResourceData) -> Result<()> {
        let client = &meta.app_platform;
        let id = SpringCloudServiceId::parse(d.require_id()?)?;

        if d.has_changes(&["tags", "log_stream_public_endpoint_enabled"]) {
            let mut patch = json!({
                "sku": { "name": d.get_str("sku_name") },
                "tags": tags::expand(d.get("tags")),
            });
            if d.has_change("log_stream_public_endpoint_enabled") {
                pointer_insert(&mut patch, "/properties/vnetAddons/logStreamPublicEndpoint", json!(d.get_bool("log_stream_public_endpoint_enabled")));
            }
            client.patch_then_poll(&id.id(), patch).await.with_context(|| format!("updating {id}"))?;
        }
        if d.has_change(config_server::ATTRIBUTE) {
            let git = expand_git(d)?;
            if !is_enterprise(d) {
                apply_config_server(client, &id, git).await?;
            }
        }
        if d.has_change("service_registry_enabled") {
            set_service_registry(client, &id, d.get_bool("service_registry_enabled")).await?;
        }
        Ok(())
    }

    async fn delete(&self, meta: &Clients, d: &mut ResourceData) -> Result<()> {
        let id = SpringCloudServiceId::parse(d.require_id()?)?;
        delete_if_present(&meta.app_platform, &id.id(), &id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(v: Json) -> ResourceData { ResourceData::new(v.as_object().cloned().unwrap()) }

    #[test]
    fn enterprise_services_reject_git_settings() {
        let d = data(json!({ "sku_name": "E0", "config_server_git_setting": [{ "uri": "https://github.com/org/config" }] }));
        assert!(expand_git(&d).unwrap_err().to_string().contains("not supported for sku `E0`"));
        assert!(expand_git(&data(json!({ "sku_name": "E0" }))).unwrap().is_none());
    }

    #[test]
    fn log_stream_endpoint_is_only_sent_when_enabled() {
        let body = build_body(&data(json!({ "location": "West Europe", "sku_name": "S0", "zone_redundant": false })));
        assert_eq!(body["location"], json!("westeurope"));
        assert!(body.pointer("/properties/vnetAddons").is_none());
        let body = build_body(&data(json!({ "log_stream_public_endpoint_enabled": true })));
        assert_eq!(body.pointer("/properties/vnetAddons/logStreamPublicEndpoint"), Some(&json!(true)));
    }
}
