use std::collections::HashMap;
use std::sync::{Mutex, OnceLock, PoisonError};

use regex::Regex;
use serde::Serialize;
use serde_json::{Value as Json, Map as JsonMap};

use crate::error::ProviderError;
use crate::location;

/// Attribute names every resource accepts besides its schema.
pub const META_ATTRIBUTES: &[&str] = &["timeouts"];

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "element", rename_all = "snake_case")]
pub enum AttributeType {
    String,
    Bool,
    Int,
    List(Box<AttributeType>),
    Map(Box<AttributeType>),
    /// A list of nested blocks, `max_items(1)` for single blocks.
    Block(Vec<AttributeSchema>),
}

#[derive(Clone)]
pub enum Validator {
    StringInSlice { values: &'static [&'static str], ignore_case: bool },
    IntBetween(i64, i64),
    Regex { pattern: &'static str, message: &'static str },
    NotEmpty,
    Custom(fn(&Json) -> Result<(), String>),
}

impl std::fmt::Debug for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Validator::StringInSlice { values, ignore_case } => write!(f, "StringInSlice({values:?}, ignore_case={ignore_case})"),
            Validator::IntBetween(min, max) => write!(f, "IntBetween({min}, {max})"),
            Validator::Regex { pattern, .. } => write!(f, "Regex({pattern:?})"),
            Validator::NotEmpty => f.write_str("NotEmpty"),
            Validator::Custom(_) => f.write_str("Custom"),
        }
    }
}

impl Validator {
    pub fn check(&self, value: &Json) -> Result<(), String> {
        match self {
            Validator::StringInSlice { values, ignore_case } => {
                let s = value.as_str().unwrap_or_default();
                let found = values.iter().any(|v| if *ignore_case { v.eq_ignore_ascii_case(s) } else { *v == s });
                if found { Ok(()) } else { Err(format!("expected one of {:?}, got {:?}", values, s)) }
            }
            Validator::IntBetween(min, max) => {
                let n = value.as_i64().unwrap_or_default();
                if (*min..=*max).contains(&n) { Ok(()) } else { Err(format!("expected to be in the range ({} - {}), got {}", min, max, n)) }
            }
            Validator::Regex { pattern, message } => {
                let re = compiled(pattern)?;
                let s = value.as_str().unwrap_or_default();
                if re.is_match(s) { Ok(()) } else { Err(format!("{} (got {:?})", message, s)) }
            }
            Validator::NotEmpty => match value.as_str() {
                Some(s) if !s.trim().is_empty() => Ok(()),
                _ => Err("must not be empty".to_string()),
            },
            Validator::Custom(f) => f(value),
        }
    }
}

fn patterns() -> &'static Mutex<HashMap<&'static str, Regex>> {
    static PATTERNS: OnceLock<Mutex<HashMap<&'static str, Regex>>> = OnceLock::new();
    PATTERNS.get_or_init(Mutex::default)
}

/// Each pattern is compiled once per process; clones share the compiled program.
fn compiled(pattern: &'static str) -> Result<Regex, String> {
    let mut cache = patterns().lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(re) = cache.get(pattern) {
        return Ok(re.clone());
    }
    let re = Regex::new(pattern).map_err(|e| format!("invalid pattern {pattern:?}: {e}"))?;
    cache.insert(pattern, re.clone());
    Ok(re)
}

/// How values are compared when planning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Normalize {
    #[default]
    None,
    Location,
    CaseInsensitive,
}

impl Normalize {
    pub fn apply(&self, value: &Json) -> Json {
        match (self, value) {
            (Normalize::Location, Json::String(s)) => Json::String(location::normalize(s)),
            (Normalize::CaseInsensitive, Json::String(s)) => Json::String(s.to_lowercase()),
            _ => value.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AttributeSchema {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub ty: AttributeType,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub sensitive: bool,
    pub force_new: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Json>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_items: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_items: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conflicts_with: Vec<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'static str>,
    #[serde(skip)]
    pub validators: Vec<Validator>,
    #[serde(skip)]
    pub normalize: Normalize,
}

impl AttributeSchema {
    pub fn new(name: &'static str, ty: AttributeType) -> Self {
        Self {
            name,
            ty,
            required: false,
            optional: true,
            computed: false,
            sensitive: false,
            force_new: false,
            default: None,
            min_items: None,
            max_items: None,
            conflicts_with: Vec::new(),
            description: None,
            validators: Vec::new(),
            normalize: Normalize::None,
        }
    }

    pub fn string(name: &'static str) -> Self { Self::new(name, AttributeType::String) }
    pub fn bool(name: &'static str) -> Self { Self::new(name, AttributeType::Bool) }
    pub fn int(name: &'static str) -> Self { Self::new(name, AttributeType::Int) }
    pub fn string_list(name: &'static str) -> Self { Self::new(name, AttributeType::List(Box::new(AttributeType::String))) }
    pub fn string_map(name: &'static str) -> Self { Self::new(name, AttributeType::Map(Box::new(AttributeType::String))) }
    pub fn block(name: &'static str, attributes: Vec<AttributeSchema>) -> Self { Self::new(name, AttributeType::Block(attributes)) }

    pub fn required(mut self) -> Self { self.required = true; self.optional = false; self }
    /// Server-assigned and read-only.
    pub fn computed(mut self) -> Self { self.computed = true; self.optional = false; self.required = false; self }
    /// Optional; the server picks a value when unset.
    pub fn optional_computed(mut self) -> Self { self.computed = true; self.optional = true; self }
    pub fn sensitive(mut self) -> Self { self.sensitive = true; self }
    pub fn force_new(mut self) -> Self { self.force_new = true; self }
    pub fn default(mut self, value: impl Into<Json>) -> Self { self.default = Some(value.into()); self }
    pub fn min_items(mut self, n: usize) -> Self { self.min_items = Some(n); self }
    pub fn max_items(mut self, n: usize) -> Self { self.max_items = Some(n); self }
    pub fn conflicts_with(mut self, others: &[&'static str]) -> Self { self.conflicts_with.extend_from_slice(others); self }
    pub fn validate(mut self, v: Validator) -> Self { self.validators.push(v); self }
    pub fn normalize(mut self, n: Normalize) -> Self { self.normalize = n; self }
    pub fn with_description(mut self, d: &'static str) -> Self { self.description = Some(d); self }

    pub fn is_computed_only(&self) -> bool { self.computed && !self.optional && !self.required }

    /// Value Read stores when the remote object has nothing for this attribute.
    pub fn zero_value(&self) -> Json {
        if let Some(d) = &self.default { return d.clone(); }
        match self.ty {
            AttributeType::String => Json::String(String::new()),
            AttributeType::Bool => Json::Bool(false),
            AttributeType::Int => Json::from(0),
            AttributeType::List(_) | AttributeType::Block(_) => Json::Array(Vec::new()),
            AttributeType::Map(_) => Json::Object(JsonMap::new()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResourceSchema {
    pub type_name: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'static str>,
    pub attributes: Vec<AttributeSchema>,
}

impl ResourceSchema {
    pub fn new(type_name: &'static str) -> Self { Self { type_name, description: None, attributes: Vec::new() } }
    pub fn with_description(mut self, d: &'static str) -> Self { self.description = Some(d); self }
    pub fn attribute(mut self, a: AttributeSchema) -> Self { self.attributes.push(a); self }

    pub fn get(&self, name: &str) -> Option<&AttributeSchema> { self.attributes.iter().find(|a| a.name == name) }

    pub fn apply_defaults(&self, config: &mut JsonMap<String, Json>) { apply_defaults(&self.attributes, config) }

    /// Collects every problem before failing so users see them all at once.
    pub fn validate(&self, config: &JsonMap<String, Json>) -> Result<(), ProviderError> {
        let mut errors = Vec::new();
        validate_object(&self.attributes, config, "", true, &mut errors);
        if errors.is_empty() { Ok(()) } else { Err(ProviderError::Validation(errors)) }
    }
}

fn is_set(v: Option<&Json>) -> bool {
    match v {
        None | Some(Json::Null) => false,
        Some(Json::Array(a)) => !a.is_empty(),
        Some(_) => true,
    }
}

fn apply_defaults(attrs: &[AttributeSchema], obj: &mut JsonMap<String, Json>) {
    for a in attrs {
        if matches!(obj.get(a.name), None | Some(Json::Null)) {
            if let Some(d) = &a.default {
                obj.insert(a.name.to_string(), d.clone());
            }
            continue;
        }
        let (AttributeType::Block(nested), Some(value)) = (&a.ty, obj.get_mut(a.name)) else { continue };
        if value.is_object() {
            *value = Json::Array(vec![value.take()]);
        }
        if let Json::Array(items) = value {
            for item in items.iter_mut() {
                if let Json::Object(m) = item {
                    apply_defaults(nested, m);
                }
            }
        }
    }
}

fn validate_object(attrs: &[AttributeSchema], obj: &JsonMap<String, Json>, prefix: &str, top: bool, errors: &mut Vec<String>) {
    for key in obj.keys() {
        let known = attrs.iter().any(|a| a.name == key) || (top && META_ATTRIBUTES.contains(&key.as_str()));
        if !known {
            errors.push(format!("{prefix}{key}: unsupported argument"));
        }
    }

    for a in attrs {
        let path = format!("{prefix}{}", a.name);
        let value = match obj.get(a.name) {
            None | Some(Json::Null) => {
                if a.required {
                    errors.push(format!("{path}: required argument is missing"));
                }
                continue;
            }
            Some(v) => v,
        };
        if a.is_computed_only() {
            errors.push(format!("{path}: is computed and cannot be set"));
            continue;
        }
        if !check_type(&a.ty, value, &path, errors) {
            continue;
        }
        if let Some(items) = value.as_array() {
            if let Some(min) = a.min_items {
                if items.len() < min { errors.push(format!("{path}: expected at least {min} item(s), got {}", items.len())); }
            }
            if let Some(max) = a.max_items {
                if items.len() > max { errors.push(format!("{path}: expected at most {max} item(s), got {}", items.len())); }
            }
        }
        for v in &a.validators {
            let targets: Vec<&Json> = match (&a.ty, value) {
                (AttributeType::List(_), Json::Array(items)) => items.iter().collect(),
                _ => vec![value],
            };
            for t in targets {
                if let Err(msg) = v.check(t) {
                    errors.push(format!("{path}: {msg}"));
                }
            }
        }
        for other in &a.conflicts_with {
            if is_set(Some(value)) && is_set(obj.get(*other)) {
                errors.push(format!("{path}: conflicts with {prefix}{other}"));
            }
        }
    }
}

fn check_type(ty: &AttributeType, value: &Json, path: &str, errors: &mut Vec<String>) -> bool {
    let ok = match (ty, value) {
        (AttributeType::String, Json::String(_)) => true,
        (AttributeType::Bool, Json::Bool(_)) => true,
        (AttributeType::Int, Json::Number(n)) => n.is_i64(),
        (AttributeType::List(el), Json::Array(items)) => {
            let mut all = true;
            for (i, item) in items.iter().enumerate() {
                all &= check_type(el, item, &format!("{path}.{i}"), errors);
            }
            return all;
        }
        (AttributeType::Map(el), Json::Object(m)) => {
            let mut all = true;
            for (k, item) in m {
                all &= check_type(el, item, &format!("{path}.{k}"), errors);
            }
            return all;
        }
        (AttributeType::Block(nested), Json::Array(items)) => {
            for (i, item) in items.iter().enumerate() {
                match item {
                    Json::Object(m) => validate_object(nested, m, &format!("{path}.{i}."), false, errors),
                    _ => errors.push(format!("{path}.{i}: expected a block")),
                }
            }
            return true;
        }
        _ => false,
    };
    if !ok {
        errors.push(format!("{path}: expected {}, got {}", type_label(ty), value));
    }
    ok
}

fn type_label(ty: &AttributeType) -> &'static str {
    match ty {
        AttributeType::String => "a string",
        AttributeType::Bool => "a bool",
        AttributeType::Int => "an integer",
        AttributeType::List(_) => "a list",
        AttributeType::Map(_) => "a map",
        AttributeType::Block(_) => "a list of blocks",
    }
}

/// Attributes shared by most ARM resources.
pub mod common {
    use super::*;

    pub fn name(pattern: &'static str, message: &'static str) -> AttributeSchema {
        AttributeSchema::string("name")
            .required()
            .force_new()
            .validate(Validator::Regex { pattern, message })
    }

    pub fn resource_group_name() -> AttributeSchema {
        AttributeSchema::string("resource_group_name")
            .required()
            .force_new()
            .validate(Validator::Regex {
                pattern: r"^[-\w._()]{0,89}[-\w_()]$",
                message: "resource group names may only contain alphanumerics, underscores, parentheses, hyphens and periods, may not end in a period and must be 1-90 characters long",
            })
    }

    pub fn location() -> AttributeSchema {
        AttributeSchema::string("location")
            .required()
            .force_new()
            .validate(Validator::NotEmpty)
            .normalize(Normalize::Location)
    }

    pub fn location_computed() -> AttributeSchema {
        AttributeSchema::string("location").computed()
    }

    pub fn tags() -> AttributeSchema {
        AttributeSchema::string_map("tags").validate(Validator::Custom(crate::tags::validate))
    }

    pub fn tags_computed() -> AttributeSchema {
        AttributeSchema::string_map("tags").computed()
    }
}
