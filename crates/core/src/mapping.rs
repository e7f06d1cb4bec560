//! Declarative expand/flatten between configuration attributes and ARM documents.
//!
//! A resource lists its flat fields once as `attribute <-> JSON pointer` pairs;
//! only nested or conditional mappings are written by hand.

use serde_json::{Value as Json, Map as JsonMap};

use crate::data::ResourceData;
use crate::location;
use crate::schema::ResourceSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    Identity,
    /// `local_auth_enabled` <-> `disableLocalAuth`
    Not,
    Location,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Both,
    /// Server-assigned, never sent.
    ReadOnly,
    /// Sent but never returned (or returned masked); Read keeps the prior value.
    WriteOnly,
}

#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub attribute: &'static str,
    pub pointer: &'static str,
    pub transform: Transform,
    pub direction: Direction,
}

impl Field {
    pub const fn new(attribute: &'static str, pointer: &'static str) -> Self {
        Self { attribute, pointer, transform: Transform::Identity, direction: Direction::Both }
    }
    pub const fn not(mut self) -> Self { self.transform = Transform::Not; self }
    pub const fn location(mut self) -> Self { self.transform = Transform::Location; self }
    pub const fn read_only(mut self) -> Self { self.direction = Direction::ReadOnly; self }
    pub const fn write_only(mut self) -> Self { self.direction = Direction::WriteOnly; self }

    fn apply(&self, value: &Json) -> Json {
        match (self.transform, value) {
            (Transform::Not, Json::Bool(b)) => Json::Bool(!b),
            (Transform::Location, Json::String(s)) => Json::String(location::normalize(s)),
            _ => value.clone(),
        }
    }
}

/// Writes every set, sendable attribute into `body`.
pub fn expand(fields: &[Field], d: &ResourceData, body: &mut Json) {
    for f in fields.iter().filter(|f| f.direction != Direction::ReadOnly) {
        if let Some(v) = d.get(f.attribute) {
            pointer_insert(body, f.pointer, f.apply(v));
        }
    }
}

/// Like [`expand`] but only for attributes that changed, for PATCH bodies.
/// Cleared attributes are sent as their zero value. ForceNew attributes are
/// skipped: a real change to one of them never reaches Update.
pub fn expand_changed(fields: &[Field], schema: &ResourceSchema, d: &ResourceData, body: &mut Json) {
    for f in fields.iter().filter(|f| f.direction != Direction::ReadOnly && d.has_change(f.attribute)) {
        let attribute = schema.get(f.attribute);
        if attribute.is_some_and(|a| a.force_new) {
            continue;
        }
        let value = match d.get(f.attribute) {
            Some(v) => v.clone(),
            None => attribute.map(|a| a.zero_value()).unwrap_or(Json::Null),
        };
        pointer_insert(body, f.pointer, f.apply(&value));
    }
}

/// Reads every returned attribute out of `body`; missing values fall back to the
/// schema default or the type's zero value so re-reads converge.
pub fn flatten(fields: &[Field], schema: &ResourceSchema, body: &Json, d: &mut ResourceData) {
    for f in fields.iter().filter(|f| f.direction != Direction::WriteOnly) {
        let value = match body.pointer(f.pointer) {
            Some(v) if !v.is_null() => f.apply(v),
            _ => schema.get(f.attribute).map(|a| a.zero_value()).unwrap_or(Json::Null),
        };
        d.set(f.attribute, value);
    }
}

/// Inserts `value` at a JSON pointer, creating intermediate objects.
pub fn pointer_insert(root: &mut Json, pointer: &str, value: Json) {
    let mut cur = root;
    let mut parts = pointer.trim_start_matches('/').split('/').peekable();
    while let Some(part) = parts.next() {
        if !cur.is_object() {
            *cur = Json::Object(JsonMap::new());
        }
        let Json::Object(map) = cur else { return };
        if parts.peek().is_none() {
            map.insert(part.to_string(), value);
            return;
        }
        cur = map.entry(part.to_string()).or_insert_with(|| Json::Object(JsonMap::new()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::AttributeSchema;
    use serde_json::json;

    const FIELDS: &[Field] = &[
        Field::new("location", "/location").location(),
        Field::new("sku", "/sku/name"),
        Field::new("local_auth_enabled", "/properties/disableLocalAuth").not(),
        Field::new("endpoint", "/properties/endpoint").read_only(),
        Field::new("password", "/properties/password").write_only(),
    ];

    fn schema() -> ResourceSchema {
        ResourceSchema::new("azurerm_example")
            .attribute(AttributeSchema::string("location"))
            .attribute(AttributeSchema::string("sku").default("free"))
            .attribute(AttributeSchema::bool("local_auth_enabled").default(true))
            .attribute(AttributeSchema::string("endpoint").computed())
            .attribute(AttributeSchema::string("password").sensitive())
    }

    #[test]
    fn expand_builds_nested_document() {
        let cfg = json!({ "location": "West Europe", "sku": "standard", "local_auth_enabled": true, "endpoint": "ignored", "password": "p" });
        let d = ResourceData::new(cfg.as_object().cloned().unwrap());
        let mut body = json!({});
        expand(FIELDS, &d, &mut body);
        assert_eq!(body, json!({
            "location": "westeurope",
            "sku": { "name": "standard" },
            "properties": { "disableLocalAuth": false, "password": "p" },
        }));
    }

    #[test]
    fn flatten_reads_back_and_keeps_write_only_values() {
        let mut d = ResourceData::new(json!({ "password": "p" }).as_object().cloned().unwrap());
        let body = json!({ "location": "westeurope", "properties": { "disableLocalAuth": true, "endpoint": "https://x", "password": "***" } });
        flatten(FIELDS, &schema(), &body, &mut d);
        assert_eq!(d.get_str("location"), "westeurope");
        assert_eq!(d.get_str("sku"), "free");
        assert!(!d.get_bool("local_auth_enabled"));
        assert_eq!(d.get_str("endpoint"), "https://x");
        assert_eq!(d.get_str("password"), "p");
    }

    #[test]
    fn expand_changed_sends_only_the_diff() {
        let prior = crate::data::ResourceState::new(
            "x",
            json!({ "location": "westeurope", "sku": "free", "local_auth_enabled": true }).as_object().cloned().unwrap(),
        );
        let cfg = json!({ "sku": "standard", "local_auth_enabled": false }).as_object().cloned().unwrap();
        let d = ResourceData::for_update(&prior, cfg);
        let mut body = json!({});
        expand_changed(FIELDS, &schema(), &d, &mut body);
        assert_eq!(body, json!({ "sku": { "name": "standard" }, "properties": { "disableLocalAuth": true } }));
    }

    #[test]
    fn pointer_insert_replaces_scalars_on_the_path() {
        let mut body = json!({ "properties": "oops" });
        pointer_insert(&mut body, "/properties/a/b", json!(1));
        assert_eq!(body, json!({ "properties": { "a": { "b": 1 } } }));
    }
}
