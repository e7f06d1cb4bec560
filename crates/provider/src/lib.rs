//! The `azurerm` resource and data source handlers plus the registry that
//! validates, plans and dispatches calls to them.

pub mod clients;
pub mod config;
pub mod provider;
pub mod services;

pub use clients::{Account, Clients};
pub use config::{Features, ProviderConfig};
pub use provider::{AzureProvider, ProviderSchema};
