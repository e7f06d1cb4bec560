mod server_extended_auditing_policy;

pub use server_extended_auditing_policy::MsSqlServerExtendedAuditingPolicyResource;

azrm_core::resource_id! {
    pub struct ServerId = "SQL Server" {
        "subscriptions" => subscription_id,
        "resourceGroups" => resource_group_name,
        "providers/Microsoft.Sql/servers" => server_name,
    }
}

azrm_core::resource_id! {
    /// There is exactly one auditing policy per server, named `default`.
    pub struct ServerExtendedAuditingPolicyId = "SQL Server Extended Auditing Policy" {
        "subscriptions" => subscription_id,
        "resourceGroups" => resource_group_name,
        "providers/Microsoft.Sql/servers" => server_name,
    } / "extendedAuditingSettings/default"
}

impl ServerExtendedAuditingPolicyId {
    pub fn server(&self) -> ServerId {
        ServerId::new(&self.subscription_id, &self.resource_group_name, &self.server_name)
    }
}

impl From<&ServerId> for ServerExtendedAuditingPolicyId {
    fn from(server: &ServerId) -> Self {
        Self::new(&server.subscription_id, &server.resource_group_name, &server.server_name)
    }
}
