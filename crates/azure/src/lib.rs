//! Azure Resource Manager plumbing: authentication, transport and long-running
//! operation polling.

pub mod auth;
pub mod client;
pub mod environment;
pub mod error;
pub mod transport;

#[cfg(any(test, feature = "fake"))]
pub mod fake;

pub use auth::{AzureCliToken, StaticToken, TokenSource};
pub use client::{ArmClient, ServiceClient};
pub use environment::Environment;
pub use error::ArmError;
pub use transport::{ArmRequest, ArmResponse, HttpTransport, Method, Transport};
