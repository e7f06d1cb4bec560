use anyhow::{Context, Result};
use async_trait::async_trait;
use azrm_core::data::block_str;
use azrm_core::mapping::{self, pointer_insert, Field};
use azrm_core::schema::{AttributeSchema, Validator};
use azrm_core::{Resource, ResourceData, ResourceSchema};
use serde_json::{json, Value as Json};

use super::{name_validator, SpringCloudAppId, SpringCloudDeploymentId};
use crate::clients::Clients;
use crate::services::{check_requires_import, delete_if_present, get_or_clear, str_at};

const TYPE_NAME: &str = "azurerm_spring_cloud_java_deployment";
const RUNTIME_VERSIONS: &[&str] = &["Java_8", "Java_11", "Java_17", "Java_21"];

const FIELDS: &[Field] = &[
    Field::new("instance_count", "/sku/capacity"),
    Field::new("jvm_options", "/properties/source/jvmOptions"),
    Field::new("runtime_version", "/properties/source/runtimeVersion"),
    Field::new("environment_variables", "/properties/deploymentSettings/environmentVariables"),
];

pub struct SpringCloudJavaDeploymentResource;

fn validate_app_id(v: &Json) -> Result<(), String> {
    SpringCloudAppId::parse(v.as_str().unwrap_or_default()).map(|_| ()).map_err(|e| e.to_string())
}

/// Deployments inherit the SKU name and tier of their service; only the capacity is theirs.
async fn service_sku(meta: &Clients, app: &SpringCloudAppId) -> Result<Json> {
    let service = app.service();
    let body = meta.app_platform.get(&service.id()).await.with_context(|| format!("retrieving {service}"))?;
    Ok(json!({ "name": str_at(&body, "/sku/name"), "tier": str_at(&body, "/sku/tier") }))
}

fn build_body(d: &ResourceData, mut sku: Json) -> Json {
    sku["capacity"] = json!(d.get_i64("instance_count"));
    let mut body = json!({
        "sku": sku,
        "properties": { "source": { "type": "Jar", "relativePath": "<default>" } },
    });
    mapping::expand(FIELDS, d, &mut body);
    if let Some(quota) = d.get_block("quota") {
        pointer_insert(&mut body, "/properties/deploymentSettings/resourceRequests", json!({
            "cpu": block_str(quota, "cpu"),
            "memory": block_str(quota, "memory"),
        }));
    }
    body
}

fn flatten_quota(body: &Json) -> Json {
    match body.pointer("/properties/deploymentSettings/resourceRequests") {
        Some(Json::Object(requests)) => json!([{
            "cpu": block_str(requests, "cpu"),
            "memory": block_str(requests, "memory"),
        }]),
        _ => json!([]),
    }
}

#[async_trait]
impl Resource<Clients> for SpringCloudJavaDeploymentResource {
    fn type_name(&self) -> &'static str { TYPE_NAME }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(TYPE_NAME)
            .attribute(AttributeSchema::string("name").required().force_new().validate(name_validator()))
            .attribute(AttributeSchema::string("spring_cloud_app_id").required().force_new().validate(Validator::Custom(validate_app_id)))
            .attribute(AttributeSchema::int("instance_count").default(1).validate(Validator::IntBetween(1, 500)))
            .attribute(AttributeSchema::string("jvm_options"))
            .attribute(AttributeSchema::string_map("environment_variables"))
            .attribute(
                AttributeSchema::string("runtime_version")
                    .default("Java_8")
                    .validate(Validator::StringInSlice { values: RUNTIME_VERSIONS, ignore_case: false }),
            )
            .attribute(
                AttributeSchema::block("quota", vec![
                    AttributeSchema::string("cpu").default("1"),
                    AttributeSchema::string("memory").default("1Gi"),
                ])
                .max_items(1)
                .optional_computed(),
            )
    }

    fn validate_import_id(&self, id: &str) -> Result<()> {
        SpringCloudDeploymentId::parse(id)?;
        Ok(())
    }

    async fn create(&self, meta: &Clients, d: &mut ResourceData) -> Result<()> {
        let app = SpringCloudAppId::parse(d.get_str("spring_cloud_app_id"))?;
        let id = SpringCloudDeploymentId::new(&app.subscription_id, &app.resource_group_name, &app.spring_name, &app.app_name, d.get_str("name"));
        check_requires_import(meta, &meta.app_platform, TYPE_NAME, &id.id(), &id).await?;

        let sku = service_sku(meta, &app).await?;
        meta.app_platform.put_then_poll(&id.id(), build_body(d, sku)).await.with_context(|| format!("creating {id}"))?;
        d.set_id(id.id());
        Ok(())
    }

    async fn read(&self, meta: &Clients, d: &mut ResourceData) -> Result<()> {
        let id = SpringCloudDeploymentId::parse(d.require_id()?)?;
        let Some(body) = get_or_clear(&meta.app_platform, &id.id(), d, &id).await? else { return Ok(()) };

        d.set("name", id.deployment_name.as_str());
        d.set("spring_cloud_app_id", id.app().id());
        mapping::flatten(FIELDS, &self.schema(), &body, d);
        d.set("quota", flatten_quota(&body));
        Ok(())
    }

    async fn update(&self, meta: &Clients, d: &mut ResourceData) -> Result<()> {
        let id = SpringCloudDeploymentId::parse(d.require_id()?)?;
        let sku = service_sku(meta, &id.app()).await?;
        meta.app_platform.put_then_poll(&id.id(), build_body(d, sku)).await.with_context(|| format!("updating {id}"))?;
        Ok(())
    }

    async fn delete(&self, meta: &Clients, d: &mut ResourceData) -> Result<()> {
        let id = SpringCloudDeploymentId::parse(d.require_id()?)?;
        delete_if_present(&meta.app_platform, &id.id(), &id).await
    }
}
