use anyhow::{Context, Result};
use async_trait::async_trait;
use azrm_core::schema::{common, AttributeSchema};
use azrm_core::{DataSource, ResourceData, ResourceSchema};

use super::resource_group::flatten_into;
use super::ResourceGroupId;
use crate::clients::Clients;

const TYPE_NAME: &str = "azurerm_resource_group";

pub struct ResourceGroupDataSource;

#[async_trait]
impl DataSource<Clients> for ResourceGroupDataSource {
    fn type_name(&self) -> &'static str { TYPE_NAME }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(TYPE_NAME)
            .attribute(AttributeSchema::string("name").required().validate(azrm_core::Validator::NotEmpty))
            .attribute(common::location_computed())
            .attribute(AttributeSchema::string("managed_by").computed())
            .attribute(common::tags_computed())
    }

    async fn read(&self, meta: &Clients, d: &mut ResourceData) -> Result<()> {
        let id = ResourceGroupId::new(&meta.account.subscription_id, d.get_str("name"));
        let body = meta.resources.get(&id.id()).await.with_context(|| format!("retrieving {id}"))?;
        d.set_id(id.id());
        flatten_into(&body, d, &self.schema());
        Ok(())
    }
}
