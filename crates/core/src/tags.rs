//! Tags are orthogonal to every schema: a flat `string -> string` map sent as
//! the top-level `tags` object of an ARM document.

use serde_json::{Value as Json, Map as JsonMap};

const MAX_TAGS: usize = 50;
const MAX_KEY_LEN: usize = 512;
const MAX_VALUE_LEN: usize = 256;

/// Configuration map to ARM `tags`. Non-string values are stringified.
pub fn expand(input: Option<&Json>) -> Json {
    let mut out = JsonMap::new();
    if let Some(Json::Object(m)) = input {
        for (k, v) in m {
            let s = match v {
                Json::String(s) => s.clone(),
                Json::Null => continue,
                other => other.to_string(),
            };
            out.insert(k.clone(), Json::String(s));
        }
    }
    Json::Object(out)
}

/// ARM `tags` (absent or null for untagged resources) to the configuration map.
pub fn flatten(input: Option<&Json>) -> Json {
    match input {
        Some(Json::Object(m)) => Json::Object(m.iter().map(|(k, v)| (k.clone(), Json::String(v.as_str().unwrap_or_default().to_string()))).collect()),
        _ => Json::Object(JsonMap::new()),
    }
}

pub fn validate(value: &Json) -> Result<(), String> {
    let Json::Object(m) = value else { return Err("tags must be a map".to_string()) };
    if m.len() > MAX_TAGS {
        return Err(format!("a maximum of {MAX_TAGS} tags can be applied to each ARM resource"));
    }
    for (k, v) in m {
        if k.len() > MAX_KEY_LEN {
            return Err(format!("the maximum length for a tag key is {MAX_KEY_LEN} characters: {k:?} is {} characters", k.len()));
        }
        let len = v.as_str().map(str::len).unwrap_or_default();
        if len > MAX_VALUE_LEN {
            return Err(format!("the maximum length for a tag value is {MAX_VALUE_LEN} characters: the value for {k:?} is {len} characters"));
        }
    }
    Ok(())
}
