use std::time::Duration;

use serde_json::Value as Json;

/// Per-operation deadlines; the dispatcher drops the handler future once one passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub create: Duration,
    pub read: Duration,
    pub update: Duration,
    pub delete: Duration,
}

impl Default for Timeouts {
    fn default() -> Self { Self::minutes(30, 5, 30, 30) }
}

impl Timeouts {
    pub const fn minutes(create: u64, read: u64, update: u64, delete: u64) -> Self {
        Self {
            create: Duration::from_secs(create * 60),
            read: Duration::from_secs(read * 60),
            update: Duration::from_secs(update * 60),
            delete: Duration::from_secs(delete * 60),
        }
    }

    /// Applies a `timeouts { create = "60m" }` block from configuration.
    pub fn with_overrides(mut self, block: Option<&Json>) -> Result<Self, String> {
        let Some(block) = block.filter(|b| !b.is_null()) else { return Ok(self) };
        let block = match block {
            Json::Array(items) => items.first().unwrap_or(&Json::Null),
            other => other,
        };
        let Some(m) = block.as_object() else { return Err("timeouts must be a block".to_string()) };
        for (k, v) in m {
            let raw = v.as_str().ok_or_else(|| format!("timeouts.{k}: expected a duration string"))?;
            let d = parse_duration(raw).map_err(|e| format!("timeouts.{k}: {e}"))?;
            match k.as_str() {
                "create" => self.create = d,
                "read" => self.read = d,
                "update" => self.update = d,
                "delete" => self.delete = d,
                other => return Err(format!("timeouts.{other}: unsupported argument")),
            }
        }
        Ok(self)
    }
}

/// `90s`, `45m`, `2h`, `1h30m`.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("empty duration".to_string());
    }
    let mut total = 0u64;
    let mut digits = String::new();
    for c in s.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let n: u64 = digits.parse().map_err(|_| format!("invalid duration {input:?}"))?;
        digits.clear();
        total += match c {
            'h' => n * 3600,
            'm' => n * 60,
            's' => n,
            _ => return Err(format!("invalid duration {input:?}: unknown unit {c:?}")),
        };
    }
    if !digits.is_empty() {
        return Err(format!("invalid duration {input:?}: missing unit"));
    }
    Ok(Duration::from_secs(total))
}
