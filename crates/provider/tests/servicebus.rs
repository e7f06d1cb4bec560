mod common;

use azrm_core::{Op, ProviderError};
use common::*;
use serde_json::json;

const NAMESPACE: &str = "azurerm_servicebus_namespace";
const QUEUE: &str = "azurerm_servicebus_queue";

fn namespace_id() -> String { format!("{}/providers/Microsoft.ServiceBus/namespaces/sbns-test1", rg_id("rg1")) }

#[tokio::test]
async fn namespace_lifecycle() {
    let (fake, p) = provider();
    let config = cfg(json!({ "name": "sbns-test1", "resource_group_name": "rg1", "location": "West Europe", "sku": "Standard" }));

    let state = assert_converges(&p, NAMESPACE, &config).await;
    assert_eq!(state.id, namespace_id());
    assert_eq!(state.attributes["capacity"], json!(0));
    assert_eq!(state.attributes["minimum_tls_version"], json!("1.2"));
    let sent = fake.resource(&namespace_id()).unwrap();
    assert_eq!(sent["sku"], json!({ "name": "Standard", "tier": "Standard" }));
    assert_eq!(sent["properties"]["publicNetworkAccess"], json!("Enabled"));

    assert_requires_import(&p, NAMESPACE, &config).await;
    assert_deletes(&p, NAMESPACE, &state).await;
}

#[tokio::test]
async fn premium_capacity_rules_and_replacement() {
    let (fake, p) = provider();
    let premium = cfg(json!({ "name": "sbns-test1", "resource_group_name": "rg1", "location": "westeurope", "sku": "Premium", "capacity": 3 }));
    let err = p.validate(NAMESPACE, &premium).unwrap_err();
    assert!(err.to_string().contains("only supports `capacity` of 1, 2, 4, 8 or 16"), "{err}");
    assert!(p.plan(NAMESPACE, None, &premium).is_err());
    let err = p.create(NAMESPACE, &premium).await.unwrap_err();
    assert!(matches!(err.downcast_ref::<ProviderError>(), Some(ProviderError::Validation(_))));
    assert!(fake.requests().is_empty());

    let standard = cfg(json!({ "name": "sbns-test1", "resource_group_name": "rg1", "location": "westeurope", "sku": "Standard" }));
    let state = p.create(NAMESPACE, &standard).await.unwrap();
    let premium = cfg(json!({ "name": "sbns-test1", "resource_group_name": "rg1", "location": "westeurope", "sku": "Premium", "capacity": 1 }));
    match p.plan(NAMESPACE, Some(&state), &premium).unwrap() {
        Op::Replace { requires_replace } => assert!(requires_replace.contains(&"sku".to_string())),
        other => panic!("expected replacement, got {other:?}"),
    }
}

#[tokio::test]
async fn queue_lifecycle() {
    let (_fake, p) = provider();
    p.create(NAMESPACE, &cfg(json!({ "name": "sbns-test1", "resource_group_name": "rg1", "location": "westeurope", "sku": "Standard" })))
        .await
        .unwrap();

    let config = cfg(json!({ "name": "queue1", "namespace_id": namespace_id(), "max_delivery_count": 5, "lock_duration": "PT30S" }));
    let state = assert_converges(&p, QUEUE, &config).await;
    assert_eq!(state.id, format!("{}/queues/queue1", namespace_id()));
    assert_eq!(state.attributes["max_delivery_count"], json!(5));
    assert_eq!(state.attributes["batched_operations_enabled"], json!(true));

    let changed = cfg(json!({ "name": "queue1", "namespace_id": namespace_id(), "max_delivery_count": 7, "lock_duration": "PT30S" }));
    let updated = p.apply(QUEUE, Some(&state), &changed).await.unwrap().unwrap();
    assert_eq!(updated.attributes["max_delivery_count"], json!(7));

    assert_requires_import(&p, QUEUE, &changed).await;
    assert_deletes(&p, QUEUE, &updated).await;
}

#[tokio::test]
async fn queue_validation_and_express_on_premium() {
    let (fake, p) = provider();
    let err = p.validate(QUEUE, &cfg(json!({ "name": "q", "namespace_id": "not-an-id", "lock_duration": "5 minutes" }))).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("namespace_id"), "{msg}");
    assert!(msg.contains("lock_duration"), "{msg}");

    fake.seed(&namespace_id(), json!({ "location": "westeurope", "sku": { "name": "Premium", "tier": "Premium", "capacity": 1 } }));
    let err = p.create(QUEUE, &cfg(json!({ "name": "q1", "namespace_id": namespace_id(), "express_enabled": true }))).await.unwrap_err();
    assert!(format!("{err:#}").contains("not supported for queues in a Premium namespace"));
}

#[tokio::test]
async fn queue_status_ignores_case() {
    let (fake, p) = provider();
    p.create(NAMESPACE, &cfg(json!({ "name": "sbns-test1", "resource_group_name": "rg1", "location": "westeurope", "sku": "Standard" })))
        .await
        .unwrap();
    let config = cfg(json!({ "name": "queue1", "namespace_id": namespace_id(), "status": "active" }));
    let state = p.create(QUEUE, &config).await.unwrap();

    // the service answers with its own casing
    let mut remote = fake.resource(&state.id).unwrap();
    remote["properties"]["status"] = json!("Active");
    fake.seed(&state.id, remote);
    let state = p.read(QUEUE, &state).await.unwrap().unwrap();
    assert_eq!(state.attributes["status"], json!("Active"));
    assert_eq!(p.plan(QUEUE, Some(&state), &config).unwrap(), Op::Noop);
}
