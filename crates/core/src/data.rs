use serde::{Deserialize, Serialize};
use serde_json::{Value as Json, Map as JsonMap};

/// What the host persists between calls: the resource ID plus its attributes.
///
/// A tainted resource was created but never read back successfully; the
/// next plan replaces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    pub id: String,
    #[serde(default)]
    pub attributes: JsonMap<String, Json>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub tainted: bool,
}

impl ResourceState {
    pub fn new(id: impl Into<String>, attributes: JsonMap<String, Json>) -> Self {
        Self { id: id.into(), attributes, tainted: false }
    }
}

/// Working view of one resource during a single CRUD call.
///
/// `values` starts from the configuration (Create), the prior state (Read,
/// Delete) or the prior state overlaid with the new configuration (Update).
/// Handlers read attributes from it and flatten remote values back into it;
/// `prior` is kept untouched for change detection and for values the API
/// never returns.
#[derive(Debug, Clone, Default)]
pub struct ResourceData {
    id: Option<String>,
    values: JsonMap<String, Json>,
    prior: JsonMap<String, Json>,
    tainted: bool,
}

impl ResourceData {
    pub fn new(config: JsonMap<String, Json>) -> Self {
        Self { id: None, values: config, prior: JsonMap::new(), tainted: false }
    }

    pub fn from_state(state: &ResourceState) -> Self {
        Self { id: Some(state.id.clone()), values: state.attributes.clone(), prior: state.attributes.clone(), tainted: state.tainted }
    }

    pub fn for_update(state: &ResourceState, config: JsonMap<String, Json>) -> Self {
        let mut values = state.attributes.clone();
        for (k, v) in config {
            values.insert(k, v);
        }
        Self { id: Some(state.id.clone()), values, prior: state.attributes.clone(), tainted: state.tainted }
    }

    pub fn id(&self) -> Option<&str> { self.id.as_deref() }
    pub fn set_id(&mut self, id: impl Into<String>) { self.id = Some(id.into()); }
    /// Marks the remote object as gone; the host drops it from state.
    pub fn clear_id(&mut self) { self.id = None; }

    /// Read/Update/Delete are never called without an ID.
    pub fn require_id(&self) -> anyhow::Result<&str> {
        self.id().ok_or_else(|| anyhow::anyhow!("resource has no ID"))
    }

    pub fn get(&self, key: &str) -> Option<&Json> {
        match self.values.get(key) {
            None | Some(Json::Null) => None,
            Some(v) => Some(v),
        }
    }

    pub fn get_str(&self, key: &str) -> &str { self.get(key).and_then(Json::as_str).unwrap_or_default() }
    pub fn get_bool(&self, key: &str) -> bool { self.get(key).and_then(Json::as_bool).unwrap_or_default() }
    pub fn get_i64(&self, key: &str) -> i64 { self.get(key).and_then(Json::as_i64).unwrap_or_default() }

    /// Like Terraform's `GetOk`: `None` for unset, empty or zero values.
    pub fn get_ok(&self, key: &str) -> Option<&Json> {
        self.get(key).filter(|v| !is_zero(v))
    }

    pub fn get_list(&self, key: &str) -> &[Json] {
        self.get(key).and_then(Json::as_array).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn get_string_list(&self, key: &str) -> Vec<String> {
        string_list(self.get(key))
    }

    /// First element of a `max_items(1)` block.
    pub fn get_block(&self, key: &str) -> Option<&JsonMap<String, Json>> {
        self.get_list(key).first().and_then(Json::as_object)
    }

    pub fn set(&mut self, key: &str, value: impl Into<Json>) {
        self.values.insert(key.to_string(), value.into());
    }

    pub fn prior(&self, key: &str) -> Option<&Json> {
        self.prior.get(key).filter(|v| !v.is_null())
    }

    pub fn has_change(&self, key: &str) -> bool {
        let before = self.prior.get(key).cloned().unwrap_or(Json::Null);
        let after = self.values.get(key).cloned().unwrap_or(Json::Null);
        if is_zero(&before) && is_zero(&after) {
            return false;
        }
        before != after
    }

    pub fn has_changes(&self, keys: &[&str]) -> bool { keys.iter().any(|k| self.has_change(k)) }

    /// `None` once the handler cleared the ID.
    pub fn into_state(self) -> Option<ResourceState> {
        let id = self.id?;
        Some(ResourceState { id, attributes: self.values, tainted: self.tainted })
    }

    /// Keeps a just-created object under `id` even though reading it back failed.
    pub fn into_tainted(self, id: String) -> ResourceState {
        ResourceState { id, attributes: self.values, tainted: true }
    }
}

pub fn is_zero(v: &Json) -> bool {
    match v {
        Json::Null => true,
        Json::Bool(b) => !b,
        Json::Number(n) => n.as_f64() == Some(0.0),
        Json::String(s) => s.is_empty(),
        Json::Array(a) => a.is_empty(),
        Json::Object(m) => m.is_empty(),
    }
}

pub fn string_list(v: Option<&Json>) -> Vec<String> {
    v.and_then(Json::as_array)
        .map(|items| items.iter().filter_map(Json::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

/// Reads a string field out of a nested block map.
pub fn block_str<'a>(block: &'a JsonMap<String, Json>, key: &str) -> &'a str {
    block.get(key).and_then(Json::as_str).unwrap_or_default()
}

pub fn block_bool(block: &JsonMap<String, Json>, key: &str) -> bool {
    block.get(key).and_then(Json::as_bool).unwrap_or_default()
}
