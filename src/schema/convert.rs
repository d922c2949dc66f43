//! Conversion of declared YAML attributes into typed [`Attributes`].
//!
//! Every problem is recorded as a diagnostic and conversion carries on with
//! the next attribute, so a manifest reports all of its mistakes at once.

use serde_yaml::Value as Yaml;

use crate::diag::{Diagnostic, Diagnostics};
use crate::error::FieldError;

use super::field::{FieldKind, FieldMode, FieldSchema, ResourceSchema, SetSchema};
use super::value::{Attributes, FieldSet, SetElement, Value};

/// Converts a declared attribute mapping against a resource schema.
///
/// Defaults are filled in for omitted attributes that have one.
#[must_use]
pub fn declared_attributes(schema: &ResourceSchema, declared: &Yaml) -> (Attributes, Diagnostics) {
    let mut attributes = Attributes::new();
    let mut diags = Diagnostics::new();

    let mapping = match declared {
        Yaml::Null => None,
        Yaml::Mapping(mapping) => Some(mapping),
        other => {
            diags.push_error(format!(
                "{}: attributes must be a mapping, found {}",
                schema.label,
                yaml_shape(other)
            ));
            return (attributes, diags);
        }
    };

    if let Some(mapping) = mapping {
        for (key, raw) in mapping {
            let Some(name) = key.as_str() else {
                diags.push_error(format!("{}: attribute names must be strings", schema.label));
                continue;
            };
            match convert_declared(schema, name, raw) {
                Ok(Some(value)) => {
                    attributes.insert(name.to_string(), value);
                }
                Ok(None) => {}
                Err(err) => diags.push(field_diagnostic(&err)),
            }
        }
    }

    for field in schema.fields {
        if attributes.contains_key(field.name) {
            continue;
        }
        if let Some(default) = field.default {
            attributes.insert(field.name.to_string(), Value::from(default));
        } else if field.mode == FieldMode::Required {
            diags.push(
                Diagnostic::error(format!("missing required attribute {}", field.name))
                    .with_attribute(field.name),
            );
        }
    }

    (attributes, diags)
}

/// Wraps a field error as an error diagnostic naming the attribute.
#[must_use]
pub fn field_diagnostic(err: &FieldError) -> Diagnostic {
    Diagnostic::error(err.to_string()).with_attribute(err.field())
}

fn convert_declared(
    schema: &ResourceSchema,
    name: &str,
    raw: &Yaml,
) -> Result<Option<Value>, FieldError> {
    let field = schema.field(name).ok_or_else(|| FieldError::UnknownField {
        name: name.to_string(),
    })?;
    if !field.is_declarable() {
        return Err(FieldError::ComputedField {
            name: name.to_string(),
        });
    }
    if raw.is_null() {
        return Ok(None);
    }
    convert_value(field, raw).map(Some)
}

fn convert_value(field: &FieldSchema, raw: &Yaml) -> Result<Value, FieldError> {
    let value = match (&field.kind, raw) {
        (FieldKind::String, Yaml::String(s)) => Value::from(s),
        (FieldKind::Enum(allowed), Yaml::String(s)) => {
            let canonical = allowed
                .iter()
                .find(|candidate| candidate.eq_ignore_ascii_case(s))
                .ok_or_else(|| {
                    FieldError::invalid(
                        field.name,
                        format!("expected one of {}, got {s}", allowed.join(", ")),
                    )
                })?;
            Value::from(*canonical)
        }
        (FieldKind::Int { .. }, Yaml::Number(n)) => {
            let i = n.as_i64().ok_or_else(|| {
                FieldError::invalid(field.name, format!("{n} is not an integer"))
            })?;
            Value::Int(i)
        }
        (FieldKind::Set(set_schema), Yaml::Sequence(members)) => {
            Value::Set(convert_set(field, set_schema, members)?)
        }
        (kind, other) => {
            return Err(FieldError::TypeMismatch {
                name: field.name.to_string(),
                expected: kind.shape().to_string(),
                found: yaml_shape(other).to_string(),
            });
        }
    };

    field.check(&value)?;
    if let (Some(validate), Some(s)) = (field.validate, value.as_str()) {
        validate(s).map_err(|message| FieldError::invalid(field.name, message))?;
    }
    Ok(value)
}

fn convert_set(
    field: &FieldSchema,
    schema: &SetSchema,
    members: &[Yaml],
) -> Result<FieldSet, FieldError> {
    let mut set = FieldSet::new();
    for member in members {
        let Yaml::Mapping(mapping) = member else {
            return Err(FieldError::TypeMismatch {
                name: field.name.to_string(),
                expected: String::from("mapping"),
                found: yaml_shape(member).to_string(),
            });
        };

        let mut element = SetElement::new();
        for (key, raw) in mapping {
            let key = key.as_str().unwrap_or_default();
            let sub = schema
                .fields
                .iter()
                .find(|f| f.name == key)
                .ok_or_else(|| {
                    FieldError::invalid(field.name, format!("member has unknown field {key}"))
                })?;
            let value = convert_value(sub, raw)
                .map_err(|e| FieldError::invalid(field.name, e.to_string()))?;
            element.insert(key.to_string(), value);
        }
        if let Some(missing) = schema.fields.iter().find(|f| !element.contains_key(f.name)) {
            return Err(FieldError::invalid(
                field.name,
                format!("member is missing {}", missing.name),
            ));
        }

        set.insert(schema.hash_of(&element), element);
    }
    Ok(set)
}

const fn yaml_shape(value: &Yaml) -> &'static str {
    match value {
        Yaml::Null => "null",
        Yaml::Bool(_) => "boolean",
        Yaml::Number(_) => "number",
        Yaml::String(_) => "string",
        Yaml::Sequence(_) => "sequence",
        Yaml::Mapping(_) => "mapping",
        Yaml::Tagged(_) => "tagged value",
    }
}
