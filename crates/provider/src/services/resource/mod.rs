mod data_source;
mod resource_group;

pub use data_source::ResourceGroupDataSource;
pub use resource_group::ResourceGroupResource;

azrm_core::resource_id! {
    pub struct ResourceGroupId = "Resource Group" {
        "subscriptions" => subscription_id,
        "resourceGroups" => resource_group_name,
    }
}
