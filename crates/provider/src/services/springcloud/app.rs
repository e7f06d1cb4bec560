use anyhow::{Context, Result};
use async_trait::async_trait;
use azrm_core::data::block_str;
use azrm_core::mapping::{self, pointer_insert, Field};
use azrm_core::schema::{common, AttributeSchema, Validator};
use azrm_core::{Resource, ResourceData, ResourceSchema};
use serde_json::{json, Value as Json};

use super::{name_validator, SpringCloudAppId};
use crate::clients::Clients;
use crate::services::{check_requires_import, delete_if_present, get_or_clear};

const TYPE_NAME: &str = "azurerm_spring_cloud_app";
const DEFAULT_MOUNT_PATH: &str = "/persistent";

const FIELDS: &[Field] = &[
    Field::new("is_public", "/properties/public"),
    Field::new("https_only", "/properties/httpsOnly"),
    Field::new("tls_enabled", "/properties/enableEndToEndTLS"),
    Field::new("url", "/properties/url").read_only(),
    Field::new("fqdn", "/properties/fqdn").read_only(),
];

pub struct SpringCloudAppResource;

fn build_body(d: &ResourceData) -> Json {
    let mut body = json!({ "properties": {} });
    mapping::expand(FIELDS, d, &mut body);
    if let Some(disk) = d.get_block("persistent_disk") {
        let mount_path = match block_str(disk, "mount_path") {
            "" => DEFAULT_MOUNT_PATH,
            path => path,
        };
        pointer_insert(&mut body, "/properties/persistentDisk", json!({
            "sizeInGB": disk.get("size_in_gb").and_then(Json::as_i64).unwrap_or_default(),
            "mountPath": mount_path,
        }));
    }
    body
}

/// A zero-sized disk is how the API reports "no disk".
fn flatten_persistent_disk(body: &Json) -> Json {
    let size = body.pointer("/properties/persistentDisk/sizeInGB").and_then(Json::as_i64).unwrap_or_default();
    if size == 0 {
        return json!([]);
    }
    let mount_path = body.pointer("/properties/persistentDisk/mountPath").and_then(Json::as_str).unwrap_or(DEFAULT_MOUNT_PATH);
    json!([{ "size_in_gb": size, "mount_path": mount_path }])
}

#[async_trait]
impl Resource<Clients> for SpringCloudAppResource {
    fn type_name(&self) -> &'static str { TYPE_NAME }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(TYPE_NAME)
            .attribute(AttributeSchema::string("name").required().force_new().validate(name_validator()))
            .attribute(common::resource_group_name())
            .attribute(AttributeSchema::string("service_name").required().force_new().validate(name_validator()))
            .attribute(AttributeSchema::bool("is_public").default(false))
            .attribute(AttributeSchema::bool("https_only").default(false))
            .attribute(AttributeSchema::bool("tls_enabled").default(false))
            .attribute(
                AttributeSchema::block("persistent_disk", vec![
                    AttributeSchema::int("size_in_gb").required().validate(Validator::IntBetween(0, 50)),
                    AttributeSchema::string("mount_path").default(DEFAULT_MOUNT_PATH).validate(Validator::Regex {
                        pattern: r"^/\S*$",
                        message: "the mount path must be an absolute path",
                    }),
                ])
                .max_items(1)
                .optional_computed(),
            )
            .attribute(AttributeSchema::string("url").computed())
            .attribute(AttributeSchema::string("fqdn").computed())
    }

    fn validate_import_id(&self, id: &str) -> Result<()> {
        SpringCloudAppId::parse(id)?;
        Ok(())
    }

    async fn create(&self, meta: &Clients, d: &mut ResourceData) -> Result<()> {
        let client = &meta.app_platform;
        let id = SpringCloudAppId::new(&meta.account.subscription_id, d.get_str("resource_group_name"), d.get_str("service_name"), d.get_str("name"));
        check_requires_import(meta, client, TYPE_NAME, &id.id(), &id).await?;

        client.put_then_poll(&id.id(), build_body(d)).await.with_context(|| format!("creating {id}"))?;
        d.set_id(id.id());
        Ok(())
    }

    async fn read(&self, meta: &Clients, d: &mut ResourceData) -> Result<()> {
        let id = SpringCloudAppId::parse(d.require_id()?)?;
        let Some(body) = get_or_clear(&meta.app_platform, &id.id(), d, &id).await? else { return Ok(()) };

        d.set("name", id.app_name.as_str());
        d.set("service_name", id.spring_name.as_str());
        d.set("resource_group_name", id.resource_group_name.as_str());
        mapping::flatten(FIELDS, &self.schema(), &body, d);
        d.set("persistent_disk", flatten_persistent_disk(&body));
        Ok(())
    }

    async fn update(&self, meta: &Clients, d: &mut ResourceData) -> Result<()> {
        let id = SpringCloudAppId::parse(d.require_id()?)?;
        meta.app_platform.put_then_poll(&id.id(), build_body(d)).await.with_context(|| format!("updating {id}"))?;
        Ok(())
    }

    async fn delete(&self, meta: &Clients, d: &mut ResourceData) -> Result<()> {
        let id = SpringCloudAppId::parse(d.require_id()?)?;
        delete_if_present(&meta.app_platform, &id.id(), &id).await
    }
}
