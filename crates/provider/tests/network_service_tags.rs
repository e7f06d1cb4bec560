mod common;

use azrm_azure::Method;
use common::*;
use serde_json::json;

const TYPE: &str = "azurerm_network_service_tags";

fn tags_path() -> String {
    format!("/subscriptions/{SUBSCRIPTION}/providers/Microsoft.Network/locations/westeurope/serviceTags")
}

fn published() -> serde_json::Value {
    json!({
        "name": "Public",
        "values": [
            {
                "name": "AzureKeyVault",
                "id": "AzureKeyVault",
                "properties": { "addressPrefixes": ["13.66.138.88/30", "2603:1000:4::2c0/123"] },
            },
            {
                "name": "AzureKeyVault.WestEurope",
                "id": "AzureKeyVault.WestEurope",
                "properties": { "region": "westeurope", "addressPrefixes": ["13.69.64.64/30", "2603:1020:206::2c0/123", "20.61.103.224/29"] },
            },
        ],
    })
}

#[tokio::test]
async fn looks_up_a_global_tag() {
    let (fake, p) = provider();
    fake.respond(Method::Get, &tags_path(), published());

    let state = p.read_data_source(TYPE, &cfg(json!({ "location": "West Europe", "service": "AzureKeyVault" }))).await.unwrap();
    assert_eq!(state.id, "AzureKeyVault");
    assert_eq!(state.attributes["address_prefixes"], json!(["13.66.138.88/30", "2603:1000:4::2c0/123"]));
    assert_eq!(state.attributes["ipv4_cidrs"], json!(["13.66.138.88/30"]));
    assert_eq!(state.attributes["ipv6_cidrs"], json!(["2603:1000:4::2c0/123"]));
}

#[tokio::test]
async fn location_filter_selects_the_regional_tag() {
    let (fake, p) = provider();
    fake.respond(Method::Get, &tags_path(), published());

    let config = cfg(json!({ "location": "westeurope", "service": "azurekeyvault", "location_filter": "West Europe" }));
    let state = p.read_data_source(TYPE, &config).await.unwrap();
    assert_eq!(state.attributes["name"], json!("AzureKeyVault.WestEurope"));
    assert_eq!(state.attributes["ipv4_cidrs"], json!(["13.69.64.64/30", "20.61.103.224/29"]));
    assert_eq!(state.attributes["ipv6_cidrs"], json!(["2603:1020:206::2c0/123"]));
}

#[tokio::test]
async fn unknown_tags_are_an_error() {
    let (fake, p) = provider();
    fake.respond(Method::Get, &tags_path(), published());

    let err = p.read_data_source(TYPE, &cfg(json!({ "location": "westeurope", "service": "Storage" }))).await.unwrap_err();
    assert!(format!("{err:#}").contains("specified service tag `Storage` not found"));

    let err = p.read_data_source(TYPE, &cfg(json!({ "location": "westeurope" }))).await.unwrap_err();
    assert!(err.to_string().contains("service"));
}
