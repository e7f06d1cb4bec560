mod namespace;
mod queue;

pub use namespace::ServiceBusNamespaceResource;
pub use queue::ServiceBusQueueResource;

azrm_core::resource_id! {
    pub struct NamespaceId = "Service Bus Namespace" {
        "subscriptions" => subscription_id,
        "resourceGroups" => resource_group_name,
        "providers/Microsoft.ServiceBus/namespaces" => namespace_name,
    }
}

azrm_core::resource_id! {
    pub struct QueueId = "Service Bus Queue" {
        "subscriptions" => subscription_id,
        "resourceGroups" => resource_group_name,
        "providers/Microsoft.ServiceBus/namespaces" => namespace_name,
        "queues" => queue_name,
    }
}

impl QueueId {
    pub fn namespace(&self) -> NamespaceId {
        NamespaceId::new(&self.subscription_id, &self.resource_group_name, &self.namespace_name)
    }
}
