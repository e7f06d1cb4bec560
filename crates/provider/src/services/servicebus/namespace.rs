use anyhow::{Context, Result};
use async_trait::async_trait;
use azrm_core::data::ResourceState;
use azrm_core::mapping::{self, pointer_insert, Field};
use azrm_core::schema::{common, AttributeSchema, Validator};
use azrm_core::{tags, Resource, ResourceData, ResourceSchema, Timeouts};
use serde_json::{json, Map as JsonMap, Value as Json};

use super::NamespaceId;
use crate::clients::Clients;
use crate::services::{check_requires_import, delete_if_present, get_or_clear, str_at};

const TYPE_NAME: &str = "azurerm_servicebus_namespace";
const ROOT_RULE: &str = "RootManageSharedAccessKey";
const PREMIUM_CAPACITIES: &[i64] = &[1, 2, 4, 8, 16];

const FIELDS: &[Field] = &[
    Field::new("location", "/location").location(),
    Field::new("sku", "/sku/name"),
    Field::new("local_auth_enabled", "/properties/disableLocalAuth").not(),
    Field::new("minimum_tls_version", "/properties/minimumTlsVersion"),
    Field::new("endpoint", "/properties/serviceBusEndpoint").read_only(),
];

const KEYS: &[(&str, &str)] = &[
    ("default_primary_connection_string", "primaryConnectionString"),
    ("default_secondary_connection_string", "secondaryConnectionString"),
    ("default_primary_key", "primaryKey"),
    ("default_secondary_key", "secondaryKey"),
];

pub struct ServiceBusNamespaceResource;

fn is_premium(sku: &str) -> bool { sku.eq_ignore_ascii_case("Premium") }

/// Premium namespaces scale in messaging units; the other tiers have none.
fn validate_capacity(d: &ResourceData) -> Vec<String> {
    let sku = d.get_str("sku");
    let capacity = d.get_i64("capacity");
    let mut errors = Vec::new();
    if is_premium(sku) {
        if !PREMIUM_CAPACITIES.contains(&capacity) {
            errors.push(format!("capacity: service bus SKU {sku:?} only supports `capacity` of 1, 2, 4, 8 or 16"));
        }
    } else {
        if capacity != 0 {
            errors.push(format!("capacity: service bus SKU {sku:?} only supports `capacity` of 0"));
        }
        if d.get_i64("premium_messaging_partitions") > 0 {
            errors.push("premium_messaging_partitions: only supported for the Premium SKU".to_string());
        }
    }
    errors
}

fn build_body(d: &ResourceData) -> Json {
    let mut body = json!({ "tags": tags::expand(d.get("tags")) });
    mapping::expand(FIELDS, d, &mut body);
    pointer_insert(&mut body, "/sku/tier", json!(d.get_str("sku")));
    if let Some(capacity) = d.get_ok("capacity") {
        pointer_insert(&mut body, "/sku/capacity", capacity.clone());
    }
    if let Some(partitions) = d.get_ok("premium_messaging_partitions") {
        pointer_insert(&mut body, "/properties/premiumMessagingPartitions", partitions.clone());
    }
    let access = if d.get_bool("public_network_access_enabled") { "Enabled" } else { "Disabled" };
    pointer_insert(&mut body, "/properties/publicNetworkAccess", json!(access));
    body
}

#[async_trait]
impl Resource<Clients> for ServiceBusNamespaceResource {
    fn type_name(&self) -> &'static str { TYPE_NAME }

    fn schema(&self) -> ResourceSchema {
        let mut schema = ResourceSchema::new(TYPE_NAME)
            .attribute(common::name(
                r"^[a-zA-Z][-a-zA-Z0-9]{4,48}[a-zA-Z0-9]$",
                "the namespace name can contain only letters, numbers and hyphens, must start with a letter, end with a letter or number and be 6-50 characters long",
            ))
            .attribute(common::location())
            .attribute(common::resource_group_name())
            .attribute(
                AttributeSchema::string("sku")
                    .required()
                    .validate(Validator::StringInSlice { values: &["Basic", "Standard", "Premium"], ignore_case: false }),
            )
            .attribute(AttributeSchema::int("capacity").default(0).validate(Validator::IntBetween(0, 16)))
            .attribute(AttributeSchema::int("premium_messaging_partitions").default(0).force_new())
            .attribute(AttributeSchema::bool("local_auth_enabled").default(true))
            .attribute(AttributeSchema::bool("public_network_access_enabled").default(true))
            .attribute(
                AttributeSchema::string("minimum_tls_version")
                    .default("1.2")
                    .validate(Validator::StringInSlice { values: &["1.0", "1.1", "1.2"], ignore_case: false }),
            )
            .attribute(AttributeSchema::string("endpoint").computed());
        for (attr, _) in KEYS {
            schema = schema.attribute(AttributeSchema::string(*attr).computed().sensitive());
        }
        schema.attribute(common::tags())
    }

    fn timeouts(&self) -> Timeouts { Timeouts::minutes(60, 5, 60, 60) }

    fn validate_import_id(&self, id: &str) -> Result<()> {
        NamespaceId::parse(id)?;
        Ok(())
    }

    fn validate_config(&self, config: &ResourceData) -> Vec<String> { validate_capacity(config) }

    /// Moving into or out of Premium rebuilds the namespace.
    fn customize_diff(&self, prior: &ResourceState, config: &JsonMap<String, Json>) -> Vec<String> {
        let old = prior.attributes.get("sku").and_then(Json::as_str).unwrap_or_default();
        let new = config.get("sku").and_then(Json::as_str).unwrap_or_default();
        if !old.eq_ignore_ascii_case(new) && (is_premium(old) || is_premium(new)) {
            vec!["sku".to_string()]
        } else {
            Vec::new()
        }
    }

    async fn create(&self, meta: &Clients, d: &mut ResourceData) -> Result<()> {
        let id = NamespaceId::new(&meta.account.subscription_id, d.get_str("resource_group_name"), d.get_str("name"));
        check_requires_import(meta, &meta.service_bus, TYPE_NAME, &id.id(), &id).await?;

        meta.service_bus.put_then_poll(&id.id(), build_body(d)).await.with_context(|| format!("creating {id}"))?;
        d.set_id(id.id());
        Ok(())
    }

    async fn read(&self, meta: &Clients, d: &mut ResourceData) -> Result<()> {
        let id = NamespaceId::parse(d.require_id()?)?;
        let Some(body) = get_or_clear(&meta.service_bus, &id.id(), d, &id).await? else { return Ok(()) };

        d.set("name", id.namespace_name.as_str());
        d.set("resource_group_name", id.resource_group_name.as_str());
        mapping::flatten(FIELDS, &self.schema(), &body, d);
        let capacity = body.pointer("/sku/capacity").and_then(Json::as_i64).unwrap_or_default();
        d.set("capacity", if is_premium(d.get_str("sku")) { capacity } else { 0 });
        d.set("premium_messaging_partitions", body.pointer("/properties/premiumMessagingPartitions").and_then(Json::as_i64).unwrap_or_default());
        d.set("public_network_access_enabled", !str_at(&body, "/properties/publicNetworkAccess").eq_ignore_ascii_case("Disabled"));
        d.set("tags", tags::flatten(body.get("tags")));

        let rule = format!("{}/authorizationRules/{ROOT_RULE}/listKeys", id.id());
        let keys = meta.service_bus.post(&rule, None).await.with_context(|| format!("listing default keys for {id}"))?;
        for (attr, prop) in KEYS {
            d.set(attr, keys.get(*prop).and_then(Json::as_str).unwrap_or_default());
        }
        Ok(())
    }

    async fn update(&self, meta: &Clients, d: &mut ResourceData) -> Result<()> {
        let id = NamespaceId::parse(d.require_id()?)?;
        meta.service_bus.put_then_poll(&id.id(), build_body(d)).await.with_context(|| format!("updating {id}"))?;
        Ok(())
    }

    async fn delete(&self, meta: &Clients, d: &mut ResourceData) -> Result<()> {
        let id = NamespaceId::parse(d.require_id()?)?;
        delete_if_present(&meta.service_bus, &id.id(), &id).await
    }
}
