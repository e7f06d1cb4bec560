use anyhow::{Context, Result};
use async_trait::async_trait;
use azrm_core::mapping::{self, Field};
use azrm_core::schema::{AttributeSchema, Normalize, Validator};
use azrm_core::{Resource, ResourceData, ResourceSchema};
use serde_json::{json, Value as Json};

use super::{NamespaceId, QueueId};
use crate::clients::Clients;
use crate::services::{check_requires_import, delete_if_present, get_or_clear, str_at};

const TYPE_NAME: &str = "azurerm_servicebus_queue";

const FIELDS: &[Field] = &[
    Field::new("lock_duration", "/properties/lockDuration"),
    Field::new("max_delivery_count", "/properties/maxDeliveryCount"),
    Field::new("max_size_in_megabytes", "/properties/maxSizeInMegabytes"),
    Field::new("requires_duplicate_detection", "/properties/requiresDuplicateDetection"),
    Field::new("requires_session", "/properties/requiresSession"),
    Field::new("dead_lettering_on_message_expiration", "/properties/deadLetteringOnMessageExpiration"),
    Field::new("default_message_ttl", "/properties/defaultMessageTimeToLive"),
    Field::new("duplicate_detection_history_time_window", "/properties/duplicateDetectionHistoryTimeWindow"),
    Field::new("auto_delete_on_idle", "/properties/autoDeleteOnIdle"),
    Field::new("batched_operations_enabled", "/properties/enableBatchedOperations"),
    Field::new("partitioning_enabled", "/properties/enablePartitioning"),
    Field::new("express_enabled", "/properties/enableExpress"),
    Field::new("forward_to", "/properties/forwardTo"),
    Field::new("forward_dead_lettered_messages_to", "/properties/forwardDeadLetteredMessagesTo"),
    Field::new("status", "/properties/status"),
];

const STATUSES: &[&str] = &["Active", "Creating", "Deleting", "Disabled", "ReceiveDisabled", "Renaming", "SendDisabled", "Unknown"];

pub struct ServiceBusQueueResource;

fn validate_namespace_id(v: &Json) -> Result<(), String> {
    NamespaceId::parse(v.as_str().unwrap_or_default()).map(|_| ()).map_err(|e| e.to_string())
}

fn duration(name: &'static str) -> AttributeSchema {
    AttributeSchema::string(name).validate(Validator::Regex {
        pattern: r"^-?P(\d+Y)?(\d+M)?(\d+W)?(\d+D)?(T(\d+H)?(\d+M)?(\d+(\.\d+)?S)?)?$",
        message: "expected an ISO 8601 duration such as PT5M",
    })
}

impl ServiceBusQueueResource {
    /// Express entities are not available on Premium namespaces.
    async fn check_namespace(&self, meta: &Clients, d: &ResourceData, namespace: &NamespaceId) -> Result<()> {
        if !d.get_bool("express_enabled") {
            return Ok(());
        }
        let ns = meta.service_bus.get(&namespace.id()).await.with_context(|| format!("retrieving {namespace}"))?;
        if str_at(&ns, "/sku/name").eq_ignore_ascii_case("Premium") {
            anyhow::bail!("`express_enabled` is not supported for queues in a Premium namespace ({namespace})");
        }
        Ok(())
    }
}

#[async_trait]
impl Resource<Clients> for ServiceBusQueueResource {
    fn type_name(&self) -> &'static str { TYPE_NAME }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(TYPE_NAME)
            .attribute(
                AttributeSchema::string("name").required().force_new().validate(Validator::Regex {
                    pattern: r"^[a-zA-Z0-9][\w.\-/~]{0,258}[\w~]$|^[a-zA-Z0-9]$",
                    message: "the queue name can contain only letters, numbers, periods, hyphens, underscores and slashes, must start with a letter or number and be up to 260 characters long",
                }),
            )
            .attribute(AttributeSchema::string("namespace_id").required().force_new().validate(Validator::Custom(validate_namespace_id)))
            .attribute(duration("lock_duration").default("PT1M"))
            .attribute(AttributeSchema::int("max_delivery_count").default(10).validate(Validator::IntBetween(1, 2000)))
            .attribute(AttributeSchema::int("max_size_in_megabytes").optional_computed())
            .attribute(AttributeSchema::bool("requires_duplicate_detection").default(false).force_new())
            .attribute(AttributeSchema::bool("requires_session").default(false).force_new())
            .attribute(AttributeSchema::bool("dead_lettering_on_message_expiration").default(false))
            .attribute(duration("default_message_ttl").optional_computed())
            .attribute(duration("duplicate_detection_history_time_window").default("PT10M"))
            .attribute(duration("auto_delete_on_idle").optional_computed())
            .attribute(AttributeSchema::bool("batched_operations_enabled").default(true))
            .attribute(AttributeSchema::bool("partitioning_enabled").default(false).force_new())
            .attribute(AttributeSchema::bool("express_enabled").default(false))
            .attribute(AttributeSchema::string("forward_to"))
            .attribute(AttributeSchema::string("forward_dead_lettered_messages_to"))
            .attribute(AttributeSchema::string("status").default("Active").normalize(Normalize::CaseInsensitive).validate(Validator::StringInSlice { values: STATUSES, ignore_case: true }))
    }

    fn validate_import_id(&self, id: &str) -> Result<()> {
        QueueId::parse(id)?;
        Ok(())
    }

    async fn create(&self, meta: &Clients, d: &mut ResourceData) -> Result<()> {
        let namespace = NamespaceId::parse(d.get_str("namespace_id"))?;
        let id = QueueId::new(&namespace.subscription_id, &namespace.resource_group_name, &namespace.namespace_name, d.get_str("name"));
        check_requires_import(meta, &meta.service_bus, TYPE_NAME, &id.id(), &id).await?;
        self.check_namespace(meta, d, &namespace).await?;

        let mut body = json!({});
        mapping::expand(FIELDS, d, &mut body);
        meta.service_bus.put_then_poll(&id.id(), body).await.with_context(|| format!("creating {id}"))?;
        d.set_id(id.id());
        Ok(())
    }

    async fn read(&self, meta: &Clients, d: &mut ResourceData) -> Result<()> {
        let id = QueueId::parse(d.require_id()?)?;
        let Some(body) = get_or_clear(&meta.service_bus, &id.id(), d, &id).await? else { return Ok(()) };

        d.set("name", id.queue_name.as_str());
        d.set("namespace_id", id.namespace().id());
        mapping::flatten(FIELDS, &self.schema(), &body, d);
        Ok(())
    }

    async fn update(&self, meta: &Clients, d: &mut ResourceData) -> Result<()> {
        let id = QueueId::parse(d.require_id()?)?;
        self.check_namespace(meta, d, &id.namespace()).await?;

        // queues have no PATCH; send the whole definition again
        let mut body = json!({});
        mapping::expand(FIELDS, d, &mut body);
        meta.service_bus.put_then_poll(&id.id(), body).await.with_context(|| format!("updating {id}"))?;
        Ok(())
    }

    async fn delete(&self, meta: &Clients, d: &mut ResourceData) -> Result<()> {
        let id = QueueId::parse(d.require_id()?)?;
        delete_if_present(&meta.service_bus, &id.id(), &id).await
    }
}
