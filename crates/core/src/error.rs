use thiserror::Error;

use crate::data::ResourceState;

/// Conditions the host needs to tell apart from plain Azure failures.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("A resource with the ID {id:?} already exists - to be managed via Terraform this resource needs to be imported into the State. Please see the resource documentation for {type_name:?} for more information.")]
    RequiresImport { type_name: String, id: String },

    #[error("validation failed:\n{}", .0.join("\n"))]
    Validation(Vec<String>),

    #[error("unknown resource type {0:?}")]
    UnknownResourceType(String),

    #[error("unknown data source {0:?}")]
    UnknownDataSource(String),

    #[error("{operation} of {type_name} timed out after {after:?}")]
    Timeout { operation: &'static str, type_name: String, after: std::time::Duration },

    #[error("provider has not been configured")]
    NotConfigured,

    #[error("{operation} of {type_name} finished without setting an ID")]
    IdNotSet { operation: &'static str, type_name: String },

    #[error("{type_name} {id:?} disappeared straight after {operation}")]
    Vanished { operation: &'static str, type_name: String, id: String },

    /// Attached as context when Create left an object behind but did not finish.
    #[error("{type_name} {:?} was created but could not be read back; it is kept in state as tainted", .state.id)]
    Tainted { type_name: String, state: Box<ResourceState> },
}

impl ProviderError {
    pub fn requires_import(type_name: &str, id: impl Into<String>) -> Self {
        ProviderError::RequiresImport { type_name: type_name.to_string(), id: id.into() }
    }
}

/// The state to keep for an object whose Create half-succeeded.
pub fn tainted_state(err: &anyhow::Error) -> Option<&ResourceState> {
    match err.downcast_ref::<ProviderError>() {
        Some(ProviderError::Tainted { state, .. }) => Some(state.as_ref()),
        _ => None,
    }
}

/// Returns true when `err` (or anything it wraps) is a requires-import error.
pub fn is_requires_import(err: &anyhow::Error) -> bool {
    err.chain()
        .any(|e| matches!(e.downcast_ref::<ProviderError>(), Some(ProviderError::RequiresImport { .. })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn tainted_state_rides_on_the_original_error() {
        let state = ResourceState::new("/subscriptions/0/resourceGroups/rg", serde_json::Map::new());
        let err = Err::<(), _>(anyhow::anyhow!("500 Internal Server Error"))
            .context(ProviderError::Tainted { type_name: "azurerm_resource_group".into(), state: Box::new(state.clone()) })
            .unwrap_err();
        assert_eq!(tainted_state(&err), Some(&state));
        assert!(format!("{err:#}").contains("500 Internal Server Error"));
        assert!(tainted_state(&anyhow::anyhow!("plain")).is_none());
    }
}
