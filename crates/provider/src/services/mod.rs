//! Resource and data source handlers, grouped by Azure service.

use std::fmt::Display;

use anyhow::{Context, Result};
use azrm_azure::ServiceClient;
use azrm_core::{ProviderError, ResourceData};
use serde_json::Value as Json;
use tracing::info;

use crate::clients::Clients;

pub mod appconfiguration;
pub mod mssql;
pub mod network;
pub mod resource;
pub mod servicebus;
pub mod springcloud;

/// Fails with `RequiresImport` when `id` already exists and the feature is on.
pub(crate) async fn check_requires_import(meta: &Clients, client: &ServiceClient, type_name: &str, id: &str, what: &(dyn Display + Sync)) -> Result<()> {
    if !meta.features.requires_import {
        return Ok(());
    }
    match client.get(id).await {
        Ok(_) => Err(ProviderError::requires_import(type_name, id).into()),
        Err(e) if e.was_not_found() => Ok(()),
        Err(e) => Err(e).with_context(|| format!("checking for presence of existing {what}")),
    }
}

/// GET for Read. A 404 clears the ID and yields `None`.
pub(crate) async fn get_or_clear(client: &ServiceClient, path: &str, d: &mut ResourceData, what: &(dyn Display + Sync)) -> Result<Option<Json>> {
    match client.get(path).await {
        Ok(body) => Ok(Some(body)),
        Err(e) if e.was_not_found() => {
            info!(id = path, "{what} was not found - removing from state");
            d.clear_id();
            Ok(None)
        }
        Err(e) => Err(e).with_context(|| format!("retrieving {what}")),
    }
}

/// DELETE and wait; an object that is already gone counts as deleted.
pub(crate) async fn delete_if_present(client: &ServiceClient, path: &str, what: &(dyn Display + Sync)) -> Result<()> {
    match client.delete_then_poll(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.was_not_found() => Ok(()),
        Err(e) => Err(e).with_context(|| format!("deleting {what}")),
    }
}

pub(crate) fn str_at<'a>(body: &'a Json, pointer: &str) -> &'a str {
    body.pointer(pointer).and_then(Json::as_str).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::Account;
    use crate::config::Features;
    use azrm_azure::fake::FakeArm;
    use azrm_azure::Environment;
    use serde_json::json;

    fn assert_send<T: Send>(_: &T) {}

    fn clients() -> (std::sync::Arc<FakeArm>, Clients) {
        let fake = FakeArm::new();
        let account = Account { subscription_id: "0".into(), tenant_id: None, environment: Environment::Public };
        let clients = Clients::new(fake.client(), account, Features::default());
        (fake, clients)
    }

    #[tokio::test]
    async fn helper_futures_can_cross_threads() {
        let (fake, meta) = clients();
        let what = String::from("Thing \"x\"");
        let mut d = ResourceData::default();
        d.set_id("/x");

        let check = check_requires_import(&meta, &meta.resources, "azurerm_thing", "/x", &what);
        assert_send(&check);
        check.await.unwrap();

        fake.seed("/x", json!({}));
        let read = get_or_clear(&meta.resources, "/x", &mut d, &what);
        assert_send(&read);
        assert!(read.await.unwrap().is_some());

        let delete = delete_if_present(&meta.resources, "/x", &what);
        assert_send(&delete);
        delete.await.unwrap();
        assert!(get_or_clear(&meta.resources, "/x", &mut d, &what).await.unwrap().is_none());
        assert!(d.id().is_none());
    }
}
