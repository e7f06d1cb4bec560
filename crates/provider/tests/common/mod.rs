#![allow(dead_code)]

use std::sync::Arc;

use azrm_azure::fake::FakeArm;
use azrm_azure::Environment;
use azrm_core::Op;
use azrm_provider::{Account, AzureProvider, Clients, Features};
use serde_json::{Map as JsonMap, Value as Json};

pub const SUBSCRIPTION: &str = "00000000-0000-0000-0000-000000000000";

pub fn rg_id(name: &str) -> String { format!("/subscriptions/{SUBSCRIPTION}/resourceGroups/{name}") }

pub fn provider() -> (Arc<FakeArm>, AzureProvider) { provider_with(Features::default()) }

pub fn provider_with(features: Features) -> (Arc<FakeArm>, AzureProvider) {
    let fake = FakeArm::new();
    let account = Account { subscription_id: SUBSCRIPTION.to_string(), tenant_id: None, environment: Environment::Public };
    let provider = AzureProvider::new().with_clients(Clients::new(fake.client(), account, features));
    (fake, provider)
}

pub fn cfg(v: Json) -> JsonMap<String, Json> { v.as_object().cloned().expect("configuration must be an object") }

/// Create, re-plan, re-read: the properties every resource type must hold.
pub async fn assert_converges(provider: &AzureProvider, type_name: &str, config: &JsonMap<String, Json>) -> azrm_core::ResourceState {
    let state = provider.create(type_name, config).await.expect("create");
    assert_eq!(provider.plan(type_name, Some(&state), config).expect("plan"), Op::Noop, "re-plan after create of {type_name}");

    let reread = provider.read(type_name, &state).await.expect("read").expect("still exists");
    assert_eq!(reread.id, state.id);
    assert_eq!(provider.plan(type_name, Some(&reread), config).expect("plan"), Op::Noop, "re-plan after read of {type_name}");
    reread
}

pub async fn assert_deletes(provider: &AzureProvider, type_name: &str, state: &azrm_core::ResourceState) {
    provider.delete(type_name, state).await.expect("delete");
    assert!(provider.read(type_name, state).await.expect("read after delete").is_none(), "{type_name} still in state");
}

pub async fn assert_requires_import(provider: &AzureProvider, type_name: &str, config: &JsonMap<String, Json>) {
    let err = provider.create(type_name, config).await.expect_err("second create must fail");
    assert!(azrm_core::error::is_requires_import(&err), "unexpected error: {err:#}");
}
