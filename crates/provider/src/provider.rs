//! The resource registry and the dispatcher the host calls into.
//!
//! Every handler call runs inside a tracing span and under the deadline from
//! the resource's [`Timeouts`], optionally overridden by the configuration's
//! `timeouts` block. Create and Update are always followed by a Read so the
//! returned state carries computed attributes.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use azrm_core::plan::{self, Op};
use azrm_core::{DataSource, ProviderError, Resource, ResourceData, ResourceSchema, ResourceState, Timeouts};
use secrecy::SecretString;
use serde::Serialize;
use serde_json::{Map as JsonMap, Value as Json};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::clients::Clients;
use crate::config::ProviderConfig;
use crate::services::{appconfiguration, mssql, network, resource, servicebus, springcloud};

pub type Config = JsonMap<String, Json>;

/// JSON-serializable description of everything the provider manages.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderSchema {
    pub resources: BTreeMap<&'static str, ResourceSchema>,
    pub data_sources: BTreeMap<&'static str, ResourceSchema>,
}

pub struct AzureProvider {
    resources: BTreeMap<&'static str, Arc<dyn Resource<Clients>>>,
    data_sources: BTreeMap<&'static str, Arc<dyn DataSource<Clients>>>,
    clients: Option<Arc<Clients>>,
}

impl Default for AzureProvider {
    fn default() -> Self { Self::new() }
}

async fn with_deadline<T>(operation: &'static str, type_name: &str, after: Duration, fut: impl Future<Output = Result<T>>) -> Result<T> {
    match tokio::time::timeout(after, fut).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::Timeout { operation, type_name: type_name.to_string(), after }.into()),
    }
}

/// Wraps `err` with the state of a created object that could not be completed.
fn taint(type_name: &str, id: String, d: ResourceData, err: anyhow::Error) -> anyhow::Error {
    warn!(resource_type = type_name, %id, error = %err, "keeping created object as tainted");
    let state = Box::new(d.into_tainted(id));
    err.context(ProviderError::Tainted { type_name: type_name.to_string(), state })
}

fn timeouts_for(defaults: Timeouts, attributes: &Config) -> Result<Timeouts> {
    defaults.with_overrides(attributes.get("timeouts")).map_err(|e| ProviderError::Validation(vec![e]).into())
}

impl AzureProvider {
    /// A registry with every supported resource type and data source.
    pub fn new() -> Self {
        let mut provider = Self::empty();
        provider.register_resource(Arc::new(resource::ResourceGroupResource));
        provider.register_resource(Arc::new(appconfiguration::AppConfigurationResource));
        provider.register_resource(Arc::new(servicebus::ServiceBusNamespaceResource));
        provider.register_resource(Arc::new(servicebus::ServiceBusQueueResource));
        provider.register_resource(Arc::new(springcloud::SpringCloudServiceResource));
        provider.register_resource(Arc::new(springcloud::SpringCloudAppResource));
        provider.register_resource(Arc::new(springcloud::SpringCloudJavaDeploymentResource));
        provider.register_resource(Arc::new(mssql::MsSqlServerExtendedAuditingPolicyResource));
        provider.register_data_source(Arc::new(resource::ResourceGroupDataSource));
        provider.register_data_source(Arc::new(network::NetworkServiceTagsDataSource));
        provider
    }

    pub fn empty() -> Self {
        Self { resources: BTreeMap::new(), data_sources: BTreeMap::new(), clients: None }
    }

    pub fn register_resource(&mut self, r: Arc<dyn Resource<Clients>>) {
        self.resources.insert(r.type_name(), r);
    }

    pub fn register_data_source(&mut self, ds: Arc<dyn DataSource<Clients>>) {
        self.data_sources.insert(ds.type_name(), ds);
    }

    /// Builds the real Azure client set.
    pub fn configure(&mut self, config: &ProviderConfig, access_token: Option<SecretString>) -> Result<()> {
        self.clients = Some(Arc::new(Clients::connect(config, access_token)?));
        Ok(())
    }

    pub fn with_clients(mut self, clients: Clients) -> Self {
        self.clients = Some(Arc::new(clients));
        self
    }

    pub fn clients(&self) -> Result<&Clients, ProviderError> {
        self.clients.as_deref().ok_or(ProviderError::NotConfigured)
    }

    pub fn resource_types(&self) -> impl Iterator<Item = &'static str> + '_ { self.resources.keys().copied() }

    pub fn schema(&self) -> ProviderSchema {
        ProviderSchema {
            resources: self.resources.iter().map(|(k, r)| (*k, r.schema())).collect(),
            data_sources: self.data_sources.iter().map(|(k, ds)| (*k, ds.schema())).collect(),
        }
    }

    fn resource(&self, type_name: &str) -> Result<&Arc<dyn Resource<Clients>>, ProviderError> {
        self.resources.get(type_name).ok_or_else(|| ProviderError::UnknownResourceType(type_name.to_string()))
    }

    fn data_source(&self, type_name: &str) -> Result<&Arc<dyn DataSource<Clients>>, ProviderError> {
        self.data_sources.get(type_name).ok_or_else(|| ProviderError::UnknownDataSource(type_name.to_string()))
    }

    /// Applies defaults and validates; the result is what handlers see.
    fn prepare(schema: &ResourceSchema, config: &Config, defaults: Timeouts) -> Result<Config> {
        let mut config = config.clone();
        schema.apply_defaults(&mut config);
        schema.validate(&config)?;
        timeouts_for(defaults, &config)?;
        Ok(config)
    }

    /// [`Self::prepare`] plus the resource's own cross-attribute rules.
    fn prepare_resource(r: &dyn Resource<Clients>, schema: &ResourceSchema, config: &Config) -> Result<Config> {
        let config = Self::prepare(schema, config, r.timeouts())?;
        let errors = r.validate_config(&ResourceData::new(config.clone()));
        if !errors.is_empty() {
            return Err(ProviderError::Validation(errors).into());
        }
        Ok(config)
    }

    pub fn validate(&self, type_name: &str, config: &Config) -> Result<()> {
        let r = self.resource(type_name)?;
        Self::prepare_resource(r.as_ref(), &r.schema(), config).map(|_| ())
    }

    pub fn plan(&self, type_name: &str, prior: Option<&ResourceState>, config: &Config) -> Result<Op> {
        let r = self.resource(type_name)?;
        let schema = r.schema();
        let config = Self::prepare_resource(r.as_ref(), &schema, config)?;
        let extra = prior.map(|p| r.customize_diff(p, &config)).unwrap_or_default();
        let op = plan::plan(&schema, prior, &config, &extra);
        debug!(resource_type = type_name, ?op, "planned");
        Ok(op)
    }

    async fn read_into(&self, r: &dyn Resource<Clients>, d: &mut ResourceData, timeouts: Timeouts) -> Result<()> {
        let type_name = r.type_name();
        let span = info_span!("resource.read", resource_type = type_name, resource_id = d.id().unwrap_or_default());
        with_deadline("read", type_name, timeouts.read, r.read(self.clients()?, d)).instrument(span).await
    }

    pub async fn create(&self, type_name: &str, config: &Config) -> Result<ResourceState> {
        let r = self.resource(type_name)?;
        let config = Self::prepare_resource(r.as_ref(), &r.schema(), config)?;
        let timeouts = timeouts_for(r.timeouts(), &config)?;
        let meta = self.clients()?;

        let mut d = ResourceData::new(config);
        let span = info_span!("resource.create", resource_type = type_name);
        let created = with_deadline("create", type_name, timeouts.create, r.create(meta, &mut d)).instrument(span).await;
        let Some(id) = d.id().map(str::to_string) else {
            created?;
            return Err(ProviderError::IdNotSet { operation: "create", type_name: type_name.to_string() }.into());
        };
        // the object exists from here on; failures keep it as tainted state
        if let Err(err) = created {
            return Err(taint(type_name, id, d, err));
        }
        info!(resource_type = type_name, %id, "created");

        match self.read_into(r.as_ref(), &mut d, timeouts).await {
            Ok(()) => match d.clone().into_state() {
                Some(state) => Ok(state),
                None => {
                    let vanished = ProviderError::Vanished { operation: "create", type_name: type_name.to_string(), id: id.clone() };
                    Err(taint(type_name, id, d, vanished.into()))
                }
            },
            Err(err) => Err(taint(type_name, id, d, err)),
        }
    }

    /// `None` when the remote object no longer exists.
    pub async fn read(&self, type_name: &str, state: &ResourceState) -> Result<Option<ResourceState>> {
        let r = self.resource(type_name)?;
        let timeouts = timeouts_for(r.timeouts(), &state.attributes)?;
        let mut d = ResourceData::from_state(state);
        self.read_into(r.as_ref(), &mut d, timeouts).await?;
        let refreshed = d.into_state();
        if refreshed.is_none() {
            info!(resource_type = type_name, id = %state.id, "remote object is gone");
        }
        Ok(refreshed)
    }

    pub async fn update(&self, type_name: &str, state: &ResourceState, config: &Config) -> Result<ResourceState> {
        let r = self.resource(type_name)?;
        let schema = r.schema();
        let mut config = Self::prepare_resource(r.as_ref(), &schema, config)?;
        // attributes dropped from the configuration are cleared rather than kept from state
        for a in schema.attributes.iter().filter(|a| !a.computed) {
            config.entry(a.name.to_string()).or_insert(Json::Null);
        }
        let timeouts = timeouts_for(r.timeouts(), &config)?;
        let meta = self.clients()?;

        let mut d = ResourceData::for_update(state, config);
        let span = info_span!("resource.update", resource_type = type_name, resource_id = %state.id);
        with_deadline("update", type_name, timeouts.update, r.update(meta, &mut d)).instrument(span).await?;

        self.read_into(r.as_ref(), &mut d, timeouts).await?;
        d.into_state().ok_or_else(|| {
            ProviderError::Vanished { operation: "update", type_name: type_name.to_string(), id: state.id.clone() }.into()
        })
    }

    pub async fn delete(&self, type_name: &str, state: &ResourceState) -> Result<()> {
        let r = self.resource(type_name)?;
        let timeouts = timeouts_for(r.timeouts(), &state.attributes)?;
        let meta = self.clients()?;

        let mut d = ResourceData::from_state(state);
        let span = info_span!("resource.delete", resource_type = type_name, resource_id = %state.id);
        with_deadline("delete", type_name, timeouts.delete, r.delete(meta, &mut d)).instrument(span).await?;
        info!(resource_type = type_name, id = %state.id, "deleted");
        Ok(())
    }

    /// Adopts an existing remote object into state.
    pub async fn import(&self, type_name: &str, id: &str) -> Result<ResourceState> {
        let r = self.resource(type_name)?;
        r.validate_import_id(id).with_context(|| format!("importing {type_name} {id:?}"))?;

        let mut d = ResourceData::from_state(&ResourceState::new(id, JsonMap::new()));
        self.read_into(r.as_ref(), &mut d, r.timeouts()).await?;
        d.into_state().with_context(|| format!("cannot import non-existent remote object {id:?} as {type_name}"))
    }

    pub async fn read_data_source(&self, type_name: &str, config: &Config) -> Result<ResourceState> {
        let ds = self.data_source(type_name)?;
        let config = Self::prepare(&ds.schema(), config, ds.timeouts())?;
        let timeouts = timeouts_for(ds.timeouts(), &config)?;
        let meta = self.clients()?;

        let mut d = ResourceData::new(config);
        let span = info_span!("data_source.read", resource_type = type_name);
        with_deadline("read", type_name, timeouts.read, ds.read(meta, &mut d)).instrument(span).await?;
        d.into_state()
            .ok_or_else(|| ProviderError::IdNotSet { operation: "read", type_name: type_name.to_string() }.into())
    }

    /// Plans and carries out the result for one resource. `None` means the
    /// resource is not in state afterwards.
    pub async fn apply(&self, type_name: &str, prior: Option<&ResourceState>, config: &Config) -> Result<Option<ResourceState>> {
        match (self.plan(type_name, prior, config)?, prior) {
            (Op::Noop, _) => Ok(prior.cloned()),
            (Op::Update { .. }, Some(prior)) => self.update(type_name, prior, config).await.map(Some),
            (Op::Replace { requires_replace }, Some(prior)) => {
                info!(resource_type = type_name, id = %prior.id, ?requires_replace, "replacing");
                self.delete(type_name, prior).await?;
                self.create(type_name, config).await.map(Some)
            }
            _ => self.create(type_name, config).await.map(Some),
        }
    }
}
