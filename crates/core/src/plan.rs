use serde::{Deserialize, Serialize};
use serde_json::{Value as Json, Map as JsonMap};

use crate::data::{is_zero, ResourceState};
use crate::schema::{AttributeType, Normalize, ResourceSchema};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Op {
    Create,
    Update { changed: Vec<String> },
    Replace { requires_replace: Vec<String> },
    Noop,
}

/// Compares the desired configuration (defaults applied) against prior state.
///
/// Computed-only attributes never cause a change, nor do optional+computed
/// attributes the configuration leaves unset. `extra_replace` comes from the
/// resource's custom diff rules. A tainted prior state is always replaced,
/// with an empty `requires_replace`.
pub fn plan(schema: &ResourceSchema, prior: Option<&ResourceState>, config: &JsonMap<String, Json>, extra_replace: &[String]) -> Op {
    let Some(prior) = prior else { return Op::Create };
    if prior.tainted {
        return Op::Replace { requires_replace: Vec::new() };
    }

    let mut changed = Vec::new();
    let mut replace = Vec::new();
    for a in &schema.attributes {
        if a.is_computed_only() {
            continue;
        }
        let desired = match config.get(a.name) {
            Some(v) if !v.is_null() => v.clone(),
            _ if a.computed => continue,
            _ => a.zero_value(),
        };
        let current = prior.attributes.get(a.name).cloned().unwrap_or_else(|| a.zero_value());
        if equivalent(&a.ty, a.normalize, &current, &desired) {
            continue;
        }
        changed.push(a.name.to_string());
        if a.force_new {
            replace.push(a.name.to_string());
        }
    }
    for name in extra_replace {
        if !replace.contains(name) { replace.push(name.clone()); }
        if !changed.contains(name) { changed.push(name.clone()); }
    }

    if !replace.is_empty() {
        Op::Replace { requires_replace: replace }
    } else if !changed.is_empty() {
        Op::Update { changed }
    } else {
        Op::Noop
    }
}

fn equivalent(ty: &AttributeType, normalize: Normalize, a: &Json, b: &Json) -> bool {
    if is_zero(a) && is_zero(b) {
        return true;
    }
    match (ty, a, b) {
        (AttributeType::Block(nested), Json::Array(xs), Json::Array(ys)) => {
            xs.len() == ys.len()
                && xs.iter().zip(ys).all(|(x, y)| {
                    let (Some(x), Some(y)) = (x.as_object(), y.as_object()) else { return x == y };
                    nested.iter().filter(|n| !n.is_computed_only()).all(|n| {
                        let zero = n.zero_value();
                        let xv = x.get(n.name).filter(|v| !v.is_null()).unwrap_or(&zero);
                        let yv = y.get(n.name).filter(|v| !v.is_null()).unwrap_or(&zero);
                        equivalent(&n.ty, n.normalize, xv, yv)
                    })
                })
        }
        _ => normalize.apply(a) == normalize.apply(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{common, AttributeSchema};
    use serde_json::json;

    fn schema() -> ResourceSchema {
        ResourceSchema::new("azurerm_example")
            .attribute(common::name(".*", ""))
            .attribute(common::location())
            .attribute(AttributeSchema::string("sku").default("free"))
            .attribute(AttributeSchema::string("public_network_access").optional_computed())
            .attribute(AttributeSchema::string("endpoint").computed())
            .attribute(AttributeSchema::block("git", vec![
                AttributeSchema::string("uri").required(),
                AttributeSchema::string("label"),
                AttributeSchema::string_list("search_paths"),
            ]).max_items(1))
            .attribute(common::tags())
    }

    fn prior() -> ResourceState {
        ResourceState::new(
            "/x",
            json!({
                "name": "a", "location": "westeurope", "sku": "free", "public_network_access": "Enabled",
                "endpoint": "https://a", "git": [{ "uri": "https://g", "label": "", "search_paths": [] }], "tags": {},
            }).as_object().cloned().unwrap(),
        )
    }

    fn cfg(v: Json) -> JsonMap<String, Json> { v.as_object().cloned().unwrap() }

    #[test]
    fn tainted_state_is_replaced() {
        let mut tainted = prior();
        tainted.tainted = true;
        let c = cfg(json!({ "name": "a", "location": "West Europe", "sku": "free", "git": [{ "uri": "https://g" }] }));
        assert_eq!(plan(&schema(), Some(&tainted), &c, &[]), Op::Replace { requires_replace: vec![] });
    }

    #[test]
    fn no_prior_state_means_create() {
        assert_eq!(plan(&schema(), None, &cfg(json!({})), &[]), Op::Create);
    }

    #[test]
    fn unchanged_configuration_is_a_noop() {
        let c = cfg(json!({ "name": "a", "location": "West Europe", "sku": "free", "git": [{ "uri": "https://g" }] }));
        assert_eq!(plan(&schema(), Some(&prior()), &c, &[]), Op::Noop);
    }

    #[test]
    fn in_place_changes_are_updates() {
        let c = cfg(json!({ "name": "a", "location": "westeurope", "sku": "standard", "tags": { "env": "dev" }, "git": [{ "uri": "https://g" }] }));
        assert_eq!(plan(&schema(), Some(&prior()), &c, &[]), Op::Update { changed: vec!["sku".into(), "tags".into()] });
    }

    #[test]
    fn force_new_and_custom_rules_replace() {
        let c = cfg(json!({ "name": "b", "location": "westeurope", "sku": "free", "git": [{ "uri": "https://g" }] }));
        assert_eq!(plan(&schema(), Some(&prior()), &c, &[]), Op::Replace { requires_replace: vec!["name".into()] });
        let c = cfg(json!({ "name": "a", "location": "westeurope", "sku": "free", "git": [{ "uri": "https://g" }] }));
        assert_eq!(plan(&schema(), Some(&prior()), &c, &["sku".into()]), Op::Replace { requires_replace: vec!["sku".into()] });
    }
}
