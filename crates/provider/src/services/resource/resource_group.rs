use anyhow::{Context, Result};
use async_trait::async_trait;
use azrm_core::mapping::{self, Field};
use azrm_core::schema::{common, AttributeSchema, Validator};
use azrm_core::{tags, Resource, ResourceData, ResourceSchema, Timeouts};
use serde_json::{json, Value as Json};
use tracing::debug;

use super::ResourceGroupId;
use crate::clients::Clients;
use crate::services::{check_requires_import, delete_if_present, get_or_clear, str_at};

const TYPE_NAME: &str = "azurerm_resource_group";

const FIELDS: &[Field] = &[
    Field::new("location", "/location").location(),
    Field::new("managed_by", "/managedBy"),
];

pub struct ResourceGroupResource;

#[async_trait]
impl Resource<Clients> for ResourceGroupResource {
    fn type_name(&self) -> &'static str { TYPE_NAME }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(TYPE_NAME)
            .attribute(
                AttributeSchema::string("name").required().force_new().validate(Validator::Regex {
                    pattern: r"^[-\w._()]{0,89}[-\w_()]$",
                    message: "resource group names may only contain alphanumerics, underscores, parentheses, hyphens and periods, may not end in a period and must be 1-90 characters long",
                }),
            )
            .attribute(common::location())
            .attribute(AttributeSchema::string("managed_by").force_new().validate(Validator::NotEmpty))
            .attribute(common::tags())
    }

    fn timeouts(&self) -> Timeouts { Timeouts::minutes(90, 5, 90, 90) }

    fn validate_import_id(&self, id: &str) -> Result<()> {
        ResourceGroupId::parse(id)?;
        Ok(())
    }

    async fn create(&self, meta: &Clients, d: &mut ResourceData) -> Result<()> {
        let id = ResourceGroupId::new(&meta.account.subscription_id, d.get_str("name"));
        check_requires_import(meta, &meta.resources, TYPE_NAME, &id.id(), &id).await?;

        let mut body = json!({ "tags": tags::expand(d.get("tags")) });
        mapping::expand(FIELDS, d, &mut body);
        meta.resources.put_then_poll(&id.id(), body).await.with_context(|| format!("creating {id}"))?;

        d.set_id(id.id());
        Ok(())
    }

    async fn read(&self, meta: &Clients, d: &mut ResourceData) -> Result<()> {
        let id = ResourceGroupId::parse(d.require_id()?)?;
        let Some(body) = get_or_clear(&meta.resources, &id.id(), d, &id).await? else { return Ok(()) };

        d.set("name", id.resource_group_name.as_str());
        flatten_into(&body, d, &self.schema());
        Ok(())
    }

    async fn update(&self, meta: &Clients, d: &mut ResourceData) -> Result<()> {
        let id = ResourceGroupId::parse(d.require_id()?)?;
        if !d.has_change("tags") {
            return Ok(());
        }
        let body = json!({ "tags": tags::expand(d.get("tags")) });
        meta.resources.patch_then_poll(&id.id(), body).await.with_context(|| format!("updating {id}"))?;
        Ok(())
    }

    async fn delete(&self, meta: &Clients, d: &mut ResourceData) -> Result<()> {
        let id = ResourceGroupId::parse(d.require_id()?)?;

        if meta.features.resource_group.prevent_deletion_if_contains_resources {
            let nested = match meta.resources.list(&format!("{}/resources", id.id())).await {
                Ok(items) => items,
                Err(e) if e.was_not_found() => return Ok(()),
                Err(e) => return Err(e).with_context(|| format!("listing resources in {id}")),
            };
            let ids: Vec<&str> = nested.iter().map(|r| str_at(r, "/id")).filter(|s| !s.is_empty()).collect();
            if !ids.is_empty() {
                anyhow::bail!(
                    "deleting {id}: the Resource Group still contains {} Resource(s):\n\n{}\n\n\
                     This feature is intended to avoid the unintentional destruction of nested Resources provisioned \
                     through some other means. It can be disabled with `features.resource_group.prevent_deletion_if_contains_resources`.",
                    ids.len(),
                    ids.iter().map(|i| format!("* `{i}`")).collect::<Vec<_>>().join("\n"),
                );
            }
        }

        debug!(%id, "deleting resource group");
        delete_if_present(&meta.resources, &id.id(), &id).await
    }
}

pub(super) fn flatten_into(body: &Json, d: &mut ResourceData, schema: &ResourceSchema) {
    mapping::flatten(FIELDS, schema, body, d);
    d.set("tags", tags::flatten(body.get("tags")));
}
