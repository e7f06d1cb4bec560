use azrm_core::schema::Validator;

mod app;
mod config_server;
mod java_deployment;
mod service;

pub use app::SpringCloudAppResource;
pub use java_deployment::SpringCloudJavaDeploymentResource;
pub use service::SpringCloudServiceResource;

azrm_core::resource_id! {
    pub struct SpringCloudServiceId = "Spring Cloud Service" {
        "subscriptions" => subscription_id,
        "resourceGroups" => resource_group_name,
        "providers/Microsoft.AppPlatform/spring" => spring_name,
    }
}

azrm_core::resource_id! {
    pub struct SpringCloudAppId = "Spring Cloud App" {
        "subscriptions" => subscription_id,
        "resourceGroups" => resource_group_name,
        "providers/Microsoft.AppPlatform/spring" => spring_name,
        "apps" => app_name,
    }
}

azrm_core::resource_id! {
    pub struct SpringCloudDeploymentId = "Spring Cloud Deployment" {
        "subscriptions" => subscription_id,
        "resourceGroups" => resource_group_name,
        "providers/Microsoft.AppPlatform/spring" => spring_name,
        "apps" => app_name,
        "deployments" => deployment_name,
    }
}

impl SpringCloudAppId {
    pub fn service(&self) -> SpringCloudServiceId {
        SpringCloudServiceId::new(&self.subscription_id, &self.resource_group_name, &self.spring_name)
    }
}

impl SpringCloudDeploymentId {
    pub fn app(&self) -> SpringCloudAppId {
        SpringCloudAppId::new(&self.subscription_id, &self.resource_group_name, &self.spring_name, &self.app_name)
    }
}

/// Service, app and deployment names share one rule.
pub(crate) fn name_validator() -> Validator {
    Validator::Regex {
        pattern: r"^[a-z][a-z0-9-]{2,30}[a-z0-9]$",
        message: "the name must be 4-32 characters long, start with a lowercase letter, end with a lowercase letter or number and contain only lowercase letters, numbers and hyphens",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deployment_ids_walk_up_to_the_service() {
        let raw = "/subscriptions/0000/resourceGroups/rg1/providers/Microsoft.AppPlatform/spring/svc1/apps/app1/deployments/blue";
        let id = SpringCloudDeploymentId::parse(raw).unwrap();
        assert_eq!(id.app().service().id(), "/subscriptions/0000/resourceGroups/rg1/providers/Microsoft.AppPlatform/spring/svc1");
        assert!(SpringCloudAppId::parse(raw).is_err());
    }
}
