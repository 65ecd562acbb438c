//! Structural schema description and the validation walk.
//!
//! Schemas describe the shape a document must have. They are deliberately
//! lenient about extra fields: only declared properties are checked.

use lazy_static::lazy_static;
use regex::Regex;
use serde_yaml::Value;

use crate::types::Severity;

lazy_static! {
    static ref DNS_SUBDOMAIN: Regex =
        Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$").unwrap();
    static ref DNS_LABEL: Regex = Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").unwrap();
}

/// Named string formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringFormat {
    /// DNS-1123 subdomain: at most 253 chars of `[a-z0-9-.]`, alphanumeric at both ends.
    Dns1123Subdomain,
    /// DNS-1123 label: at most 63 chars of `[a-z0-9-]`, alphanumeric at both ends.
    Dns1123Label,
}

impl StringFormat {
    fn check(&self, s: &str) -> Option<String> {
        let (max, re, what) = match self {
            StringFormat::Dns1123Subdomain => (253, &*DNS_SUBDOMAIN, "DNS-1123 subdomain"),
            StringFormat::Dns1123Label => (63, &*DNS_LABEL, "DNS-1123 label"),
        };
        if s.is_empty() {
            return Some("must not be empty".to_string());
        }
        if s.len() > max {
            return Some(format!("must be no more than {} characters", max));
        }
        if !re.is_match(s) {
            return Some(format!(
                "{:?} is not a valid {}: use lowercase alphanumerics, '-' or '.', starting and ending with an alphanumeric",
                s, what
            ));
        }
        None
    }
}

/// A structural schema node.
#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    /// Anything goes.
    Any,
    String {
        allowed: Option<&'static [&'static str]>,
        format: Option<StringFormat>,
    },
    Integer {
        min: Option<i64>,
        max: Option<i64>,
    },
    /// An integer (range-checked) or a named string, as used for ports.
    IntOrString {
        min: Option<i64>,
        max: Option<i64>,
    },
    Boolean,
    Array {
        items: Box<Schema>,
        min_items: usize,
    },
    Object(ObjectSchema),
    /// A string-keyed map whose values all match one schema.
    Map(Box<Schema>),
}

/// Schema for a mapping with declared properties.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectSchema {
    pub properties: Vec<(&'static str, Schema)>,
    pub required: Vec<&'static str>,
    /// Groups of which at least one member must be present.
    pub any_of: Vec<&'static [&'static str]>,
    /// Groups of which at least one member should be present. A missing
    /// group is a warning, not a structural violation.
    pub recommended: Vec<&'static [&'static str]>,
}

impl ObjectSchema {
    pub fn property(&self, name: &str) -> Option<&Schema> {
        self.properties
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, s)| s)
    }
}

/// One structural violation, or a warning when `severity` is below error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Dotted path to the violating field, e.g. `spec.template.spec.containers[0].image`.
    pub field: String,
    pub message: String,
    pub severity: Severity,
}

impl Violation {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: if field.is_empty() {
                "<root>".to_string()
            } else {
                field.to_string()
            },
            message: message.into(),
            severity: Severity::Error,
        }
    }

    fn warning(field: &str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::new(field, message)
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", path, key)
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "array",
        Value::Mapping(_) => "object",
        Value::Tagged(_) => "tagged value",
    }
}

fn is_present(value: Option<&Value>) -> bool {
    !matches!(value, None | Some(Value::Null))
}

fn check_range(n: i64, min: Option<i64>, max: Option<i64>) -> Option<String> {
    match (min, max) {
        (Some(lo), Some(hi)) if n < lo || n > hi => {
            Some(format!("must be between {} and {}, got {}", lo, hi, n))
        }
        (Some(lo), None) if n < lo => Some(format!("must be at least {}, got {}", lo, n)),
        (None, Some(hi)) if n > hi => Some(format!("must be at most {}, got {}", hi, n)),
        _ => None,
    }
}

/// Validate a value against a schema. Returns every violation found.
pub fn validate(schema: &Schema, value: &Value) -> Vec<Violation> {
    let mut out = Vec::new();
    walk(schema, value, "", &mut out);
    out
}

fn walk(schema: &Schema, value: &Value, path: &str, out: &mut Vec<Violation>) {
    match schema {
        Schema::Any => {}

        Schema::String { allowed, format } => {
            let Some(s) = value.as_str() else {
                out.push(Violation::new(path, format!("expected string, got {}", type_name(value))));
                return;
            };
            if let Some(allowed) = allowed {
                if !allowed.contains(&s) {
                    out.push(Violation::new(
                        path,
                        format!("unsupported value {:?}, expected one of {}", s, allowed.join(", ")),
                    ));
                }
            }
            if let Some(msg) = format.and_then(|f| f.check(s)) {
                out.push(Violation::new(path, msg));
            }
        }

        Schema::Integer { min, max } => match value.as_i64() {
            Some(n) => {
                if let Some(msg) = check_range(n, *min, *max) {
                    out.push(Violation::new(path, msg));
                }
            }
            None => out.push(Violation::new(path, format!("expected integer, got {}", type_name(value)))),
        },

        Schema::IntOrString { min, max } => match value {
            Value::String(_) => {}
            _ => match value.as_i64() {
                Some(n) => {
                    if let Some(msg) = check_range(n, *min, *max) {
                        out.push(Violation::new(path, msg));
                    }
                }
                None => out.push(Violation::new(
                    path,
                    format!("expected integer or string, got {}", type_name(value)),
                )),
            },
        },

        Schema::Boolean => {
            if value.as_bool().is_none() {
                out.push(Violation::new(path, format!("expected boolean, got {}", type_name(value))));
            }
        }

        Schema::Array { items, min_items } => {
            let Some(seq) = value.as_sequence() else {
                out.push(Violation::new(path, format!("expected array, got {}", type_name(value))));
                return;
            };
            if seq.len() < *min_items {
                out.push(Violation::new(
                    path,
                    format!("must have at least {} item(s)", min_items),
                ));
            }
            for (i, item) in seq.iter().enumerate() {
                walk(items, item, &format!("{}[{}]", path, i), out);
            }
        }

        Schema::Map(values) => {
            let Some(map) = value.as_mapping() else {
                out.push(Violation::new(path, format!("expected object, got {}", type_name(value))));
                return;
            };
            for (k, v) in map {
                let key = k.as_str().map(str::to_string).unwrap_or_else(|| format!("{:?}", k));
                walk(values, v, &join(path, &key), out);
            }
        }

        Schema::Object(object) => {
            let Some(map) = value.as_mapping() else {
                out.push(Violation::new(path, format!("expected object, got {}", type_name(value))));
                return;
            };

            for name in &object.required {
                if !is_present(map.get(*name)) {
                    out.push(Violation::new(&join(path, name), "required field is missing"));
                }
            }

            for group in &object.any_of {
                if !group.iter().any(|name| is_present(map.get(*name))) {
                    out.push(Violation::new(
                        &join(path, group[0]),
                        format!("at least one of {} is required", group.join(", ")),
                    ));
                }
            }

            for group in &object.recommended {
                if !group.iter().any(|name| is_present(map.get(*name))) {
                    out.push(Violation::warning(
                        &join(path, group[0]),
                        format!("none of {} is set", group.join(", ")),
                    ));
                }
            }

            for (name, sub) in &object.properties {
                match map.get(*name) {
                    None | Some(Value::Null) => {}
                    Some(v) => walk(sub, v, &join(path, name), out),
                }
            }
        }
    }
}
