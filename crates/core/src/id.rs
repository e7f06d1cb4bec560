//! Azure Resource Manager IDs.
//!
//! An ID is a `/`-separated path of alternating static keys and user values,
//! e.g. `/subscriptions/{sub}/resourceGroups/{rg}/providers/Microsoft.Web/sites/{name}`.
//! Typed IDs are declared with [`resource_id!`](crate::resource_id) and parse back
//! into their segments for every Read/Update/Delete call.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    #[error("parsing {label} ID: input was empty")]
    Empty { label: &'static str },

    #[error("parsing {label} ID {input:?}: expected {expected} segments but got {actual}")]
    SegmentCount { label: &'static str, input: String, expected: usize, actual: usize },

    #[error("parsing {label} ID {input:?}: expected segment {position} to be {expected:?} but got {found:?}")]
    UnexpectedSegment { label: &'static str, input: String, position: usize, expected: &'static str, found: String },

    #[error("parsing {label} ID {input:?}: {field} was empty")]
    EmptyValue { label: &'static str, input: String, field: &'static str },
}

/// Static shape of an ID: `(static key path, field name)` pairs plus an optional
/// trailing static path for singleton children.
#[derive(Debug, Clone, Copy)]
pub struct IdPattern {
    pub label: &'static str,
    pub segments: &'static [(&'static str, &'static str)],
    pub suffix: Option<&'static str>,
}

enum Token {
    Static(&'static str),
    User(&'static str),
}

impl IdPattern {
    fn tokens(&self) -> Vec<Token> {
        let mut out = Vec::new();
        for (key, field) in self.segments {
            out.extend(key.split('/').map(Token::Static));
            out.push(Token::User(field));
        }
        if let Some(s) = self.suffix {
            out.extend(s.split('/').map(Token::Static));
        }
        out
    }

    /// Returns the user values in declaration order.
    pub fn parse(&self, input: &str, insensitive: bool) -> Result<Vec<String>, IdError> {
        let trimmed = input.trim().trim_matches('/');
        if trimmed.is_empty() {
            return Err(IdError::Empty { label: self.label });
        }
        let parts: Vec<&str> = trimmed.split('/').collect();
        let tokens = self.tokens();
        if parts.len() != tokens.len() {
            return Err(IdError::SegmentCount {
                label: self.label,
                input: input.to_string(),
                expected: tokens.len(),
                actual: parts.len(),
            });
        }

        let mut values = Vec::with_capacity(self.segments.len());
        for (position, (token, part)) in tokens.iter().zip(parts).enumerate() {
            match token {
                Token::Static(expected) => {
                    let matches = if insensitive { expected.eq_ignore_ascii_case(part) } else { *expected == part };
                    if !matches {
                        return Err(IdError::UnexpectedSegment {
                            label: self.label,
                            input: input.to_string(),
                            position,
                            expected,
                            found: part.to_string(),
                        });
                    }
                }
                Token::User(field) => {
                    if part.is_empty() {
                        return Err(IdError::EmptyValue { label: self.label, input: input.to_string(), field });
                    }
                    values.push(part.to_string());
                }
            }
        }
        Ok(values)
    }

    pub fn format(&self, values: &[&str]) -> String {
        let mut out = String::new();
        for ((key, _), value) in self.segments.iter().zip(values) {
            out.push('/');
            out.push_str(key);
            out.push('/');
            out.push_str(value);
        }
        if let Some(s) = self.suffix {
            out.push('/');
            out.push_str(s);
        }
        out
    }
}

/// `App Configuration Store (Subscription: "..." / Resource Group Name: "..." / ...)`
pub fn describe(label: &str, fields: &[(&str, &str)]) -> String {
    let parts: Vec<String> = fields.iter().map(|(f, v)| format!("{}: {:?}", humanize(f), v)).collect();
    format!("{} ({})", label, parts.join(" / "))
}

fn humanize(field: &str) -> String {
    let field = field.strip_suffix("_id").unwrap_or(field);
    field
        .split('_')
        .map(|w| {
            let mut c = w.chars();
            match c.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + c.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Declares a typed resource ID.
///
/// ```ignore
/// resource_id! {
///     pub struct QueueId = "Service Bus Queue" {
///         "subscriptions" => subscription_id,
///         "resourceGroups" => resource_group_name,
///         "providers/Microsoft.ServiceBus/namespaces" => namespace_name,
///         "queues" => queue_name,
///     }
/// }
/// ```
///
/// A trailing `/ "static/path"` after the braces declares a singleton child.
#[macro_export]
macro_rules! resource_id {
    (@suffix) => { None };
    (@suffix $s:literal) => { Some($s) };
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident = $label:literal {
            $( $segment:literal => $field:ident ),+ $(,)?
        } $( / $suffix:literal )?
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        $vis struct $name {
            $( pub $field: String ),+
        }

        impl $name {
            const PATTERN: $crate::id::IdPattern = $crate::id::IdPattern {
                label: $label,
                segments: &[ $( ($segment, stringify!($field)) ),+ ],
                suffix: $crate::resource_id!(@suffix $($suffix)?),
            };

            #[allow(clippy::too_many_arguments)]
            pub fn new($( $field: impl Into<String> ),+) -> Self {
                Self { $( $field: $field.into() ),+ }
            }

            pub fn parse(input: &str) -> Result<Self, $crate::id::IdError> {
                Self::parse_with(input, false)
            }

            /// Accepts static segments in any casing (`resourcegroups`, `Microsoft.sql`, ...).
            pub fn parse_insensitively(input: &str) -> Result<Self, $crate::id::IdError> {
                Self::parse_with(input, true)
            }

            fn parse_with(input: &str, insensitive: bool) -> Result<Self, $crate::id::IdError> {
                let mut values = Self::PATTERN.parse(input, insensitive)?.into_iter();
                Ok(Self { $( $field: values.next().unwrap_or_default() ),+ })
            }

            pub fn id(&self) -> String {
                Self::PATTERN.format(&[ $( self.$field.as_str() ),+ ])
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&$crate::id::describe($label, &[ $( (stringify!($field), self.$field.as_str()) ),+ ]))
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    crate::resource_id! {
        struct QueueId = "Service Bus Queue" {
            "subscriptions" => subscription_id,
            "resourceGroups" => resource_group_name,
            "providers/Microsoft.ServiceBus/namespaces" => namespace_name,
            "queues" => queue_name,
        }
    }

    crate::resource_id! {
        struct AuditingId = "Server Extended Auditing Policy" {
            "subscriptions" => subscription_id,
            "resourceGroups" => resource_group_name,
            "providers/Microsoft.Sql/servers" => server_name,
        } / "extendedAuditingSettings/default"
    }

    const QUEUE: &str = "/subscriptions/0000/resourceGroups/rg1/providers/Microsoft.ServiceBus/namespaces/ns1/queues/q1";

    #[test]
    fn parses_and_formats_nested_id() {
        let id = QueueId::parse(QUEUE).unwrap();
        assert_eq!(id.namespace_name, "ns1");
        assert_eq!(id.queue_name, "q1");
        assert_eq!(id.id(), QUEUE);
    }

    #[test]
    fn singleton_suffix_is_part_of_the_id() {
        let id = AuditingId::new("0000", "rg1", "sql1");
        assert_eq!(
            id.id(),
            "/subscriptions/0000/resourceGroups/rg1/providers/Microsoft.Sql/servers/sql1/extendedAuditingSettings/default"
        );
        assert_eq!(AuditingId::parse(&id.id()).unwrap(), id);
        let err = AuditingId::parse("/subscriptions/0000/resourceGroups/rg1/providers/Microsoft.Sql/servers/sql1").unwrap_err();
        assert!(matches!(err, IdError::SegmentCount { expected: 10, actual: 8, .. }));
    }

    #[test]
    fn static_segments_are_case_sensitive_unless_asked() {
        let lowered = QUEUE.replace("resourceGroups", "resourcegroups");
        let err = QueueId::parse(&lowered).unwrap_err();
        assert!(matches!(err, IdError::UnexpectedSegment { position: 2, expected: "resourceGroups", .. }));
        assert_eq!(QueueId::parse_insensitively(&lowered).unwrap().resource_group_name, "rg1");
    }

    #[test]
    fn rejects_empty_input_and_values() {
        assert!(matches!(QueueId::parse("  "), Err(IdError::Empty { .. })));
        let missing = "/subscriptions/0000/resourceGroups//providers/Microsoft.ServiceBus/namespaces/ns1/queues/q1";
        assert!(matches!(QueueId::parse(missing), Err(IdError::EmptyValue { field: "resource_group_name", .. })));
    }

    #[test]
    fn display_names_every_segment() {
        let id = QueueId::parse(QUEUE).unwrap();
        assert_eq!(
            id.to_string(),
            "Service Bus Queue (Subscription: \"0000\" / Resource Group Name: \"rg1\" / Namespace Name: \"ns1\" / Queue Name: \"q1\")"
        );
    }
}
