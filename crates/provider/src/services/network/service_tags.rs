//! Azure's published IP ranges, per service tag and region.

use anyhow::{Context, Result};
use async_trait::async_trait;
use azrm_core::data::string_list;
use azrm_core::schema::{AttributeSchema, Normalize, Validator};
use azrm_core::{location, DataSource, ResourceData, ResourceSchema};
use serde_json::{json, Value as Json};
use tracing::debug;

use crate::clients::Clients;

const TYPE_NAME: &str = "azurerm_network_service_tags";

pub struct NetworkServiceTagsDataSource;

/// `AzureCloud` or, with a region filter, `AzureCloud.westeurope`.
fn tag_name(service: &str, location_filter: &str) -> String {
    if location_filter.is_empty() {
        service.to_string()
    } else {
        format!("{service}.{}", location::normalize(location_filter))
    }
}

fn split_by_family(prefixes: &[String]) -> (Vec<&str>, Vec<&str>) {
    prefixes.iter().map(String::as_str).partition(|p| !p.contains(':'))
}

#[async_trait]
impl DataSource<Clients> for NetworkServiceTagsDataSource {
    fn type_name(&self) -> &'static str { TYPE_NAME }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(TYPE_NAME)
            .attribute(AttributeSchema::string("location").required().validate(Validator::NotEmpty).normalize(Normalize::Location))
            .attribute(AttributeSchema::string("service").required().validate(Validator::NotEmpty))
            .attribute(AttributeSchema::string("location_filter").normalize(Normalize::Location))
            .attribute(AttributeSchema::string("name").computed())
            .attribute(AttributeSchema::string_list("address_prefixes").computed())
            .attribute(AttributeSchema::string_list("ipv4_cidrs").computed())
            .attribute(AttributeSchema::string_list("ipv6_cidrs").computed())
    }

    async fn read(&self, meta: &Clients, d: &mut ResourceData) -> Result<()> {
        let region = location::normalize(d.get_str("location"));
        let path = format!("/subscriptions/{}/providers/Microsoft.Network/locations/{region}/serviceTags", meta.account.subscription_id);
        let body = meta.network.get(&path).await.with_context(|| format!("listing network service tags for {region:?}"))?;

        let wanted = tag_name(d.get_str("service"), d.get_str("location_filter"));
        let tags = body.get("values").and_then(Json::as_array).map(Vec::as_slice).unwrap_or_default();
        debug!(count = tags.len(), %wanted, "looking up service tag");
        let tag = tags
            .iter()
            .find(|t| t.get("name").and_then(Json::as_str).is_some_and(|n| n.eq_ignore_ascii_case(&wanted)))
            .with_context(|| format!("specified service tag `{wanted}` not found"))?;

        let prefixes = string_list(tag.pointer("/properties/addressPrefixes"));
        let (ipv4, ipv6) = split_by_family(&prefixes);
        d.set("ipv4_cidrs", json!(ipv4));
        d.set("ipv6_cidrs", json!(ipv6));
        d.set("address_prefixes", json!(prefixes));
        d.set("name", tag.get("name").cloned().unwrap_or(Json::Null));
        d.set_id(tag.get("id").and_then(Json::as_str).unwrap_or(&wanted));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_filter_is_normalized_into_the_tag_name() {
        assert_eq!(tag_name("AzureCloud", ""), "AzureCloud");
        assert_eq!(tag_name("AzureCloud", "West Europe"), "AzureCloud.westeurope");
    }

    #[test]
    fn prefixes_split_by_address_family() {
        let prefixes = vec!["10.0.0.0/24".to_string(), "2603:1000::/40".to_string(), "20.1.0.0/16".to_string()];
        let (v4, v6) = split_by_family(&prefixes);
        assert_eq!(v4, vec!["10.0.0.0/24", "20.1.0.0/16"]);
        assert_eq!(v6, vec!["2603:1000::/40"]);
    }
}
