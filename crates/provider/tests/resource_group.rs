mod common;

use azrm_azure::Method;
use azrm_core::Op;
use azrm_provider::Features;
use common::*;
use serde_json::json;

const TYPE: &str = "azurerm_resource_group";

#[tokio::test]
async fn resource_group_lifecycle() {
    let (fake, p) = provider();
    let config = cfg(json!({ "name": "rg1", "location": "West Europe", "tags": { "env": "dev" } }));

    let state = assert_converges(&p, TYPE, &config).await;
    assert_eq!(state.id, rg_id("rg1"));
    assert_eq!(state.attributes["location"], json!("westeurope"));
    assert_eq!(state.attributes["tags"], json!({ "env": "dev" }));

    assert_requires_import(&p, TYPE, &config).await;

    let retagged = cfg(json!({ "name": "rg1", "location": "westeurope", "tags": { "env": "prod" } }));
    assert_eq!(p.plan(TYPE, Some(&state), &retagged).unwrap(), Op::Update { changed: vec!["tags".into()] });
    let updated = p.apply(TYPE, Some(&state), &retagged).await.unwrap().unwrap();
    assert_eq!(updated.attributes["tags"], json!({ "env": "prod" }));
    assert_eq!(fake.count(Method::Patch, "/resourceGroups/rg1"), 1);

    assert_deletes(&p, TYPE, &updated).await;
}

#[tokio::test]
async fn dropping_tags_clears_them() {
    let (_fake, p) = provider();
    let state = p.create(TYPE, &cfg(json!({ "name": "rg1", "location": "westeurope", "tags": { "a": "b" } }))).await.unwrap();
    let updated = p.apply(TYPE, Some(&state), &cfg(json!({ "name": "rg1", "location": "westeurope" }))).await.unwrap().unwrap();
    assert_eq!(updated.attributes["tags"], json!({}));
}

#[tokio::test]
async fn renaming_replaces_the_group() {
    let (fake, p) = provider();
    let state = p.create(TYPE, &cfg(json!({ "name": "rg1", "location": "westeurope" }))).await.unwrap();
    let renamed = cfg(json!({ "name": "rg2", "location": "westeurope" }));
    let new_state = p.apply(TYPE, Some(&state), &renamed).await.unwrap().unwrap();
    assert_eq!(new_state.id, rg_id("rg2"));
    assert!(fake.resource(&rg_id("rg1")).is_none());
}

#[tokio::test]
async fn non_empty_groups_are_kept_unless_the_feature_is_off() {
    let (fake, p) = provider();
    let state = p.create(TYPE, &cfg(json!({ "name": "rg1", "location": "westeurope" }))).await.unwrap();
    let vnet = format!("{}/providers/Microsoft.Network/virtualNetworks/vnet1", rg_id("rg1"));
    fake.seed(&vnet, json!({ "location": "westeurope" }));

    let err = p.delete(TYPE, &state).await.unwrap_err();
    let msg = format!("{err:#}");
    assert!(msg.contains("still contains 1 Resource(s)"), "{msg}");
    assert!(msg.contains("vnet1"), "{msg}");
    assert!(fake.resource(&rg_id("rg1")).is_some());

    let mut features = Features::default();
    features.resource_group.prevent_deletion_if_contains_resources = false;
    let (fake, p) = provider_with(features);
    let state = p.create(TYPE, &cfg(json!({ "name": "rg1", "location": "westeurope" }))).await.unwrap();
    fake.seed(&vnet, json!({ "location": "westeurope" }));
    p.delete(TYPE, &state).await.unwrap();
    assert!(fake.resource(&vnet).is_none());
}

#[tokio::test]
async fn import_reads_existing_groups_only() {
    let (fake, p) = provider();
    fake.seed(&rg_id("existing"), json!({ "location": "northeurope", "tags": { "owner": "ops" } }));

    let state = p.import(TYPE, &rg_id("existing")).await.unwrap();
    assert_eq!(state.attributes["name"], json!("existing"));
    assert_eq!(state.attributes["location"], json!("northeurope"));

    assert!(p.import(TYPE, &rg_id("missing")).await.is_err());
    assert!(p.import(TYPE, "/subscriptions/x/resourcegroup/bad").await.is_err());
}

#[tokio::test]
async fn data_source_reads_without_managing() {
    let (fake, p) = provider();
    fake.seed(&rg_id("shared"), json!({ "location": "uksouth", "tags": { "team": "net" } }));
    let state = p.read_data_source(TYPE, &cfg(json!({ "name": "shared" }))).await.unwrap();
    assert_eq!(state.id, rg_id("shared"));
    assert_eq!(state.attributes["tags"], json!({ "team": "net" }));

    let err = p.read_data_source(TYPE, &cfg(json!({ "name": "nope" }))).await.unwrap_err();
    assert!(format!("{err:#}").contains("retrieving Resource Group"));
}
