mod configuration_store;

pub use configuration_store::AppConfigurationResource;

azrm_core::resource_id! {
    pub struct ConfigurationStoreId = "App Configuration" {
        "subscriptions" => subscription_id,
        "resourceGroups" => resource_group_name,
        "providers/Microsoft.AppConfiguration/configurationStores" => configuration_store_name,
    }
}

azrm_core::resource_id! {
    /// Where a soft-deleted store waits until it is purged or recovered.
    pub struct DeletedConfigurationStoreId = "Deleted App Configuration" {
        "subscriptions" => subscription_id,
        "providers/Microsoft.AppConfiguration/locations" => location,
        "deletedConfigurationStores" => configuration_store_name,
    }
}
