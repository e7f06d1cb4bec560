//! Shared building blocks for Azure resource handlers: the CRUD contract,
//! resource IDs, schemas, attribute access, expand/flatten tables and planning.

use async_trait::async_trait;
use serde_json::{Value as Json, Map as JsonMap};

pub mod data;
pub mod error;
pub mod id;
pub mod location;
pub mod mapping;
pub mod plan;
pub mod schema;
pub mod tags;
pub mod timeouts;

pub use data::{ResourceData, ResourceState};
pub use error::ProviderError;
pub use id::IdError;
pub use mapping::Field;
pub use plan::Op;
pub use schema::{AttributeSchema, AttributeType, ResourceSchema, Validator};
pub use timeouts::Timeouts;

/// A managed resource type. `M` is the client set handed to every call.
///
/// Create sets the ID; Read clears it when the remote object is gone; Delete
/// treats an already-missing object as success.
#[async_trait]
pub trait Resource<M: Send + Sync>: Send + Sync {
    fn type_name(&self) -> &'static str;
    fn schema(&self) -> ResourceSchema;
    fn timeouts(&self) -> Timeouts { Timeouts::default() }

    /// Rejects malformed IDs handed to `import` before any API call.
    fn validate_import_id(&self, id: &str) -> anyhow::Result<()>;

    /// Rules spanning several attributes, checked against the configuration before any API call.
    fn validate_config(&self, _config: &ResourceData) -> Vec<String> { Vec::new() }

    /// Attributes whose change must replace the resource for these particular values.
    fn customize_diff(&self, _prior: &ResourceState, _config: &JsonMap<String, Json>) -> Vec<String> { Vec::new() }

    async fn create(&self, meta: &M, d: &mut ResourceData) -> anyhow::Result<()>;
    async fn read(&self, meta: &M, d: &mut ResourceData) -> anyhow::Result<()>;
    async fn update(&self, meta: &M, d: &mut ResourceData) -> anyhow::Result<()>;
    async fn delete(&self, meta: &M, d: &mut ResourceData) -> anyhow::Result<()>;
}

/// A read-only lookup; `read` must set a (synthetic) ID.
#[async_trait]
pub trait DataSource<M: Send + Sync>: Send + Sync {
    fn type_name(&self) -> &'static str;
    fn schema(&self) -> ResourceSchema;
    fn timeouts(&self) -> Timeouts { Timeouts::minutes(5, 5, 5, 5) }

    async fn read(&self, meta: &M, d: &mut ResourceData) -> anyhow::Result<()>;
}
