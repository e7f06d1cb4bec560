mod common;

use azrm_azure::Method;
use azrm_core::Op;
use azrm_provider::Features;
use common::*;
use serde_json::{json, Map as JsonMap, Value as Json};

const TYPE: &str = "azurerm_app_configuration";

fn store_id(name: &str) -> String {
    format!("{}/providers/Microsoft.AppConfiguration/configurationStores/{name}", rg_id("rg1"))
}

fn deleted_id(name: &str) -> String {
    format!("/subscriptions/{SUBSCRIPTION}/providers/Microsoft.AppConfiguration/locations/westeurope/deletedConfigurationStores/{name}")
}

fn config(extra: Json) -> JsonMap<String, Json> {
    let mut c = cfg(json!({ "name": "appconf1", "resource_group_name": "rg1", "location": "West Europe", "sku": "standard" }));
    c.extend(cfg(extra));
    c
}

fn put_body(fake: &azrm_azure::fake::FakeArm, path: &str) -> Json {
    fake.requests()
        .into_iter()
        .filter(|r| r.method == Method::Put && r.path.eq_ignore_ascii_case(path))
        .last()
        .and_then(|r| r.body)
        .expect("PUT was sent")
}

#[tokio::test]
async fn store_lifecycle() {
    let (fake, p) = provider();
    let config = config(json!({ "tags": { "env": "test" }, "local_auth_enabled": false }));

    let state = assert_converges(&p, TYPE, &config).await;
    assert_eq!(state.id, store_id("appconf1"));
    assert_eq!(state.attributes["soft_delete_retention_days"], json!(7));
    assert_eq!(state.attributes["local_auth_enabled"], json!(false));
    assert_eq!(put_body(&fake, &store_id("appconf1"))["properties"]["disableLocalAuth"], json!(true));
    assert!(put_body(&fake, &store_id("appconf1"))["properties"].get("createMode").is_none());

    assert_requires_import(&p, TYPE, &config).await;
    assert_deletes(&p, TYPE, &state).await;
}

#[tokio::test]
async fn access_keys_are_sorted_into_blocks() {
    let (fake, p) = provider();
    fake.respond(Method::Post, &format!("{}/listKeys", store_id("appconf1")), json!({ "value": [
        { "id": "k1", "name": "Primary", "value": "s1", "connectionString": "c1", "readOnly": false },
        { "id": "k2", "name": "Primary Read Only", "value": "s2", "connectionString": "c2", "readOnly": true },
        { "id": "k3", "name": "Secondary Read Only", "value": "s3", "connectionString": "c3", "readOnly": true },
    ] }));

    let state = p.create(TYPE, &config(json!({}))).await.unwrap();
    assert_eq!(state.attributes["primary_write_key"][0]["secret"], json!("s1"));
    assert_eq!(state.attributes["primary_read_key"][0]["connection_string"], json!("c2"));
    assert_eq!(state.attributes["secondary_read_key"][0]["id"], json!("k3"));
    assert_eq!(state.attributes["secondary_write_key"], json!([]));
}

#[tokio::test]
async fn soft_deleted_stores_are_recovered() {
    let (fake, p) = provider();
    fake.seed(&deleted_id("appconf1"), json!({ "properties": { "configurationStoreId": store_id("appconf1") } }));

    p.create(TYPE, &config(json!({}))).await.unwrap();
    assert_eq!(put_body(&fake, &store_id("appconf1"))["properties"]["createMode"], json!("Recover"));
}

#[tokio::test]
async fn recovery_needs_permission_to_look() {
    let (fake, p) = provider();
    fake.fail_next(Method::Get, &deleted_id("appconf1"), 403, "AuthorizationFailed", "no access");
    let err = p.create(TYPE, &config(json!({}))).await.unwrap_err();
    assert!(format!("{err:#}").contains("recover_soft_deleted"));

    let mut features = Features::default();
    features.app_configuration.recover_soft_deleted = false;
    let (fake, p) = provider_with(features);
    fake.fail_next(Method::Get, &deleted_id("appconf1"), 403, "AuthorizationFailed", "no access");
    p.create(TYPE, &config(json!({}))).await.unwrap();
}

#[tokio::test]
async fn destroy_purges_the_soft_deleted_store() {
    let (fake, p) = provider();
    let state = p.create(TYPE, &config(json!({}))).await.unwrap();
    p.delete(TYPE, &state).await.unwrap();
    assert_eq!(fake.count(Method::Post, &format!("{}/purge", deleted_id("appconf1"))), 1);

    let mut features = Features::default();
    features.app_configuration.purge_soft_delete_on_destroy = false;
    let (fake, p) = provider_with(features);
    let state = p.create(TYPE, &config(json!({}))).await.unwrap();
    p.delete(TYPE, &state).await.unwrap();
    assert_eq!(fake.count(Method::Post, "/purge"), 0);
}

#[tokio::test]
async fn purge_protection_is_one_way() {
    let (fake, p) = provider();
    let state = p.create(TYPE, &config(json!({ "purge_protection_enabled": true }))).await.unwrap();

    let err = p.apply(TYPE, Some(&state), &config(json!({ "purge_protection_enabled": false }))).await.unwrap_err();
    assert!(format!("{err:#}").contains("not possible to disable it"));

    p.delete(TYPE, &state).await.unwrap();
    assert_eq!(fake.count(Method::Post, "/purge"), 0);
}

#[tokio::test]
async fn in_place_updates_only_send_what_changed() {
    let (fake, p) = provider();
    let state = p.create(TYPE, &config(json!({}))).await.unwrap();

    let changed = config(json!({ "public_network_access": "Disabled", "tags": { "a": "b" } }));
    let updated = p.apply(TYPE, Some(&state), &changed).await.unwrap().unwrap();
    assert_eq!(updated.attributes["public_network_access"], json!("Disabled"));

    let patch = fake.requests().into_iter().find(|r| r.method == Method::Patch).and_then(|r| r.body).unwrap();
    assert_eq!(patch, json!({ "properties": { "publicNetworkAccess": "Disabled" }, "tags": { "a": "b" } }));
}

#[tokio::test]
async fn downgrading_to_free_replaces_the_store() {
    let (_fake, p) = provider();
    let state = p.create(TYPE, &config(json!({}))).await.unwrap();
    let op = p.plan(TYPE, Some(&state), &config(json!({ "sku": "free" }))).unwrap();
    assert_eq!(op, Op::Replace { requires_replace: vec!["sku".into()] });
    let op = p.plan(TYPE, Some(&state), &config(json!({ "sku": "premium" }))).unwrap();
    assert_eq!(op, Op::Update { changed: vec!["sku".into()] });
}

#[tokio::test]
async fn local_proxy_auth_cannot_delegate_private_links() {
    let (fake, p) = provider();
    let conflicting = config(json!({
        "data_plane_proxy_authentication_mode": "Local",
        "data_plane_proxy_private_link_delegation_enabled": true,
    }));
    let err = p.validate(TYPE, &conflicting).unwrap_err();
    assert!(err.to_string().contains("data_plane_proxy_private_link_delegation_enabled"), "{err}");
    assert!(p.plan(TYPE, None, &conflicting).is_err());
    assert!(p.create(TYPE, &conflicting).await.is_err());
    assert!(fake.requests().is_empty());
}
