use std::fmt;
use std::iter;

use serde_json::{Map, Value as JsonValue};

use crate::descriptor::{TypeClass, TypeDescriptor};
use crate::error::{CodecError, Result};
use crate::registry::TypeRegistry;
use crate::typedef::{Metadata, Typedef};
use crate::units;
use crate::value::{Value, ValueKind};

/// One way a value fails to match a type definition.
#[derive(Debug, Clone, PartialEq)]
pub enum Violation {
    KindMismatch {
        path: String,
        expected: String,
        found: ValueKind,
    },
    Subtype {
        path: String,
        expected: String,
        found: String,
    },
    Precision {
        path: String,
        declared: u64,
        found: u64,
    },
    Units {
        path: String,
        expected: String,
        found: String,
    },
    /// Present in the type definition, absent from the value.
    MissingElement { path: String },
    /// Present in the value, outside the type definition.
    UnexpectedElement { path: String },
    Schema { path: String, message: String },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KindMismatch {
                path,
                expected,
                found,
            } => write!(f, "{path}: expected {expected}, found {found} value"),
            Self::Subtype {
                path,
                expected,
                found,
            } => write!(f, "{path}: subtype '{found}' does not match '{expected}'"),
            Self::Precision {
                path,
                declared,
                found,
            } => write!(f, "{path}: precision {found} exceeds declared {declared}"),
            Self::Units {
                path,
                expected,
                found,
            } => write!(f, "{path}: units '{found}' are incompatible with '{expected}'"),
            Self::MissingElement { path } => write!(f, "{path}: missing element"),
            Self::UnexpectedElement { path } => write!(f, "{path}: unexpected element"),
            Self::Schema { path, message } => write!(f, "{path}: {message}"),
        }
    }
}

#[derive(Clone, Copy)]
enum Mode {
    Definition,
    Metadata,
}

/// Check a type definition, and every nested definition, against its
/// type's meta-schema. All violations are reported together.
pub fn validate_definition(registry: &TypeRegistry, typedef: &Typedef) -> Result<()> {
    let mut violations = Vec::new();
    schema_violations(registry, typedef.as_map(), "$", Mode::Definition, &mut violations);
    if violations.is_empty() {
        Ok(())
    } else {
        Err(CodecError::Schema {
            type_name: typedef.type_name().to_string(),
            violations,
        })
    }
}

/// Check encoded metadata against `descriptor`.
///
/// Metadata of a fixed subtype of `descriptor` is rewritten to the base form
/// first. Transport keys are permitted.
pub fn validate_metadata(
    registry: &TypeRegistry,
    descriptor: &TypeDescriptor,
    metadata: &Metadata,
) -> Result<()> {
    let mut map = metadata.as_map().clone();
    if let Some(fixed) = metadata
        .type_name()
        .and_then(|name| registry.get(name))
        .and_then(|found| match found.class() {
            TypeClass::Fixed(fixed) if fixed.base == descriptor.name() => Some(fixed.clone()),
            _ => None,
        })
    {
        map = fixed.to_base(&map);
    }

    let mut violations = Vec::new();
    check_against(registry, descriptor, &map, "$", Mode::Metadata, &mut violations);
    if violations.is_empty() {
        Ok(())
    } else {
        Err(CodecError::Schema {
            type_name: descriptor.name().to_string(),
            violations,
        })
    }
}

fn schema_violations(
    registry: &TypeRegistry,
    schema: &Map<String, JsonValue>,
    path: &str,
    mode: Mode,
    out: &mut Vec<String>,
) {
    let Some(type_name) = schema.get("type").and_then(JsonValue::as_str) else {
        out.push(format!("{path}: missing string 'type'"));
        return;
    };
    match registry.get(type_name) {
        Some(descriptor) => check_against(registry, descriptor, schema, path, mode, out),
        None => out.push(format!("{path}: unknown type '{type_name}'")),
    }
}

fn check_against(
    registry: &TypeRegistry,
    descriptor: &TypeDescriptor,
    schema: &Map<String, JsonValue>,
    path: &str,
    mode: Mode,
    out: &mut Vec<String>,
) {
    let validator = match mode {
        Mode::Definition => descriptor.definition_validator(),
        Mode::Metadata => descriptor.metadata_validator(),
    };
    let validator = match validator {
        Ok(validator) => validator,
        Err(err) => {
            out.extend(err.violations().iter().map(|v| format!("{path}: {v}")));
            return;
        }
    };

    let instance = JsonValue::Object(schema.clone());
    let before = out.len();
    out.extend(
        validator
            .iter_errors(&instance)
            .map(|err| format!("{path}: {err}")),
    );
    if out.len() > before {
        return;
    }

    match descriptor.class() {
        TypeClass::Array => match schema.get("items") {
            Some(JsonValue::Object(child)) => {
                schema_violations(registry, child, &format!("{path}.items"), mode, out);
            }
            Some(JsonValue::Array(children)) => {
                for (i, child) in children.iter().enumerate() {
                    if let JsonValue::Object(child) = child {
                        schema_violations(registry, child, &format!("{path}.items[{i}]"), mode, out);
                    }
                }
            }
            _ => {}
        },
        TypeClass::Object => {
            if let Some(JsonValue::Object(children)) = schema.get("properties") {
                for (key, child) in children {
                    if let JsonValue::Object(child) = child {
                        schema_violations(
                            registry,
                            child,
                            &format!("{path}.properties.{key}"),
                            mode,
                            out,
                        );
                    }
                }
            }
        }
        _ => {}
    }
}

/// Check a value's shape and constraints against a type definition.
///
/// Returns every violation found; an empty list means the value conforms.
pub fn validate_instance(registry: &TypeRegistry, value: &Value, typedef: &Typedef) -> Vec<Violation> {
    let mut out = Vec::new();
    check_instance(registry, value, typedef.as_map(), "$".to_string(), &mut out);
    out
}

fn check_instance(
    registry: &TypeRegistry,
    value: &Value,
    schema: &Map<String, JsonValue>,
    path: String,
    out: &mut Vec<Violation>,
) {
    let type_name = schema.get("type").and_then(JsonValue::as_str).unwrap_or_default();
    let Some(descriptor) = registry.get(type_name) else {
        out.push(Violation::Schema {
            path,
            message: format!("unknown type '{type_name}'"),
        });
        return;
    };
    if !descriptor.accepts(value) {
        out.push(Violation::KindMismatch {
            path,
            expected: type_name.to_string(),
            found: value.kind(),
        });
        return;
    }

    match descriptor.class() {
        class @ (TypeClass::Scalar | TypeClass::Fixed(_)) => {
            check_scalar(class, value, schema, &path, out);
        }
        TypeClass::Array => {
            let (Value::Array(items), Some(spec)) = (value, schema.get("items")) else {
                return;
            };
            match spec {
                JsonValue::Array(children) => {
                    for (i, child) in children.iter().enumerate() {
                        let child_path = format!("{path}[{i}]");
                        match (items.get(i), child) {
                            (Some(item), JsonValue::Object(child)) => {
                                check_instance(registry, item, child, child_path, out);
                            }
                            (None, _) => out.push(Violation::MissingElement { path: child_path }),
                            _ => {}
                        }
                    }
                    for i in children.len()..items.len() {
                        out.push(Violation::UnexpectedElement {
                            path: format!("{path}[{i}]"),
                        });
                    }
                }
                JsonValue::Object(child) => {
                    for (i, item) in items.iter().enumerate() {
                        check_instance(registry, item, child, format!("{path}[{i}]"), out);
                    }
                }
                _ => {}
            }
        }
        TypeClass::Object => {
            let (Value::Object(entries), Some(JsonValue::Object(spec))) =
                (value, schema.get("properties"))
            else {
                return;
            };
            for (key, child) in spec {
                let child_path = format!("{path}.{key}");
                match (entries.get(key), child) {
                    (Some(entry), JsonValue::Object(child)) => {
                        check_instance(registry, entry, child, child_path, out);
                    }
                    (None, _) => out.push(Violation::MissingElement { path: child_path }),
                    _ => {}
                }
            }
            for key in entries.keys().filter(|key| !spec.contains_key(*key)) {
                out.push(Violation::UnexpectedElement {
                    path: format!("{path}.{key}"),
                });
            }
        }
        _ => {}
    }
}

fn check_scalar(
    class: &TypeClass,
    value: &Value,
    schema: &Map<String, JsonValue>,
    path: &str,
    out: &mut Vec<Violation>,
) {
    let (found_subtype, found_precision, found_units) = match value {
        Value::Scalar(s) => (s.data.subtype(), u64::from(s.precision), s.units.as_str()),
        Value::Bytes(b) => ("bytes", (b.len() as u64).saturating_mul(8), ""),
        _ => return,
    };

    let expected_subtype = class
        .fixed_subtype()
        .or_else(|| schema.get("subtype").and_then(JsonValue::as_str));
    if let Some(expected) = expected_subtype {
        if expected != found_subtype {
            out.push(Violation::Subtype {
                path: path.to_string(),
                expected: expected.to_string(),
                found: found_subtype.to_string(),
            });
        }
    }

    if let Some(declared) = schema.get("precision").and_then(JsonValue::as_u64) {
        if found_precision > declared {
            out.push(Violation::Precision {
                path: path.to_string(),
                declared,
                found: found_precision,
            });
        }
    }

    if let Some(expected) = schema.get("units").and_then(JsonValue::as_str) {
        if !units::are_compatible(expected, found_units) {
            out.push(Violation::Units {
                path: path.to_string(),
                expected: expected.to_string(),
                found: found_units.to_string(),
            });
        }
    }
}

/// Compare an encoded schema against an expected one.
///
/// Yields a diagnostic per incompatibility; an empty sequence means `found`
/// satisfies `expected`. Only keys of `expected` are checked. A smaller
/// precision and compatible units satisfy the expectation.
pub fn compare_schema<'a>(
    found: &'a Map<String, JsonValue>,
    expected: &'a Map<String, JsonValue>,
) -> Box<dyn Iterator<Item = String> + 'a> {
    Box::new(
        expected
            .iter()
            .flat_map(move |(key, want)| compare_property(key, found.get(key), want)),
    )
}

fn compare_property<'a>(
    key: &'a str,
    found: Option<&'a JsonValue>,
    expected: &'a JsonValue,
) -> Box<dyn Iterator<Item = String> + 'a> {
    match (key, found) {
        ("title" | "description", _) => Box::new(iter::empty()),
        (_, None) => Box::new(iter::once(format!(
            "missing property '{key}' (expected {expected})"
        ))),
        ("precision", Some(got)) => match (got.as_u64(), expected.as_u64()) {
            (Some(got), Some(want)) if got > want => Box::new(iter::once(format!(
                "precision {got} exceeds expected precision {want}"
            ))),
            (Some(_), Some(_)) => Box::new(iter::empty()),
            _ => mismatch(key, got, expected),
        },
        ("units", Some(got)) => {
            let (got, want) = (
                got.as_str().unwrap_or_default(),
                expected.as_str().unwrap_or_default(),
            );
            if units::are_compatible(got, want) {
                Box::new(iter::empty())
            } else {
                Box::new(iter::once(format!(
                    "units '{got}' are incompatible with '{want}'"
                )))
            }
        }
        ("items", Some(got)) => compare_items(got, expected),
        ("properties", Some(JsonValue::Object(got))) => match expected {
            JsonValue::Object(want) => Box::new(want.iter().flat_map(move |(name, want)| {
                match (got.get(name), want) {
                    (Some(JsonValue::Object(got)), JsonValue::Object(want)) => {
                        prefixed(format!("properties.{name}"), compare_schema(got, want))
                    }
                    (None, _) => Box::new(iter::once(format!("missing property '{name}'"))),
                    (Some(got), want) => mismatch(name, got, want),
                }
            })),
            _ => mismatch(key, &JsonValue::Null, expected),
        },
        (_, Some(got)) if got == expected => Box::new(iter::empty()),
        (_, Some(got)) => mismatch(key, got, expected),
    }
}

fn compare_items<'a>(found: &'a JsonValue, expected: &'a JsonValue) -> Box<dyn Iterator<Item = String> + 'a> {
    match (found, expected) {
        (JsonValue::Array(got), JsonValue::Array(want)) => {
            let length = (got.len() != want.len()).then(|| {
                format!("expected {} items, found {}", want.len(), got.len())
            });
            Box::new(length.into_iter().chain(
                got.iter()
                    .zip(want)
                    .enumerate()
                    .flat_map(|(i, (got, want))| compare_item(i, got, want)),
            ))
        }
        (JsonValue::Array(got), JsonValue::Object(_)) => Box::new(
            got.iter()
                .enumerate()
                .flat_map(move |(i, got)| compare_item(i, got, expected)),
        ),
        (JsonValue::Object(_), JsonValue::Array(want)) => Box::new(
            want.iter()
                .enumerate()
                .flat_map(move |(i, want)| compare_item(i, found, want)),
        ),
        (JsonValue::Object(got), JsonValue::Object(want)) => {
            prefixed("items".to_string(), compare_schema(got, want))
        }
        _ => mismatch("items", found, expected),
    }
}

fn compare_item<'a>(
    index: usize,
    found: &'a JsonValue,
    expected: &'a JsonValue,
) -> Box<dyn Iterator<Item = String> + 'a> {
    match (found, expected) {
        (JsonValue::Object(got), JsonValue::Object(want)) => {
            prefixed(format!("items[{index}]"), compare_schema(got, want))
        }
        _ => mismatch("items", found, expected),
    }
}

fn prefixed<'a>(
    prefix: String,
    inner: Box<dyn Iterator<Item = String> + 'a>,
) -> Box<dyn Iterator<Item = String> + 'a> {
    Box::new(inner.map(move |message| format!("{prefix}: {message}")))
}

fn mismatch<'a>(key: &str, found: &JsonValue, expected: &JsonValue) -> Box<dyn Iterator<Item = String> + 'a> {
    Box::new(iter::once(format!("'{key}' is {found}, expected {expected}")))
}
