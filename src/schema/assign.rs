//! Helpers that copy changed declaration fields into API option structs.
//!
//! Each helper only touches its output when the field changed, so an update
//! carries exactly the fields the declaration altered.

use std::fmt::Display;
use std::str::FromStr;

use crate::diag::{Diagnostic, Diagnostics};
use crate::error::FieldError;

use super::data::ResourceData;
use super::value::SetElement;

/// Copies a changed string field.
pub fn assign_string(d: &ResourceData, target: &mut Option<String>, name: &str) {
    if d.has_change(name) {
        *target = Some(d.get_str(name).to_string());
    }
}

/// Copies a changed enumerated field, parsing its canonical string form.
#[must_use]
pub fn assign_enum<T>(d: &ResourceData, target: &mut Option<T>, name: &str) -> Diagnostics
where
    T: FromStr,
    T::Err: Display,
{
    if !d.has_change(name) {
        return Diagnostics::new();
    }
    match d.get_str(name).parse() {
        Ok(value) => {
            *target = Some(value);
            Diagnostics::new()
        }
        Err(err) => Diagnostic::error(format!("unexpected: {err}"))
            .with_attribute(name)
            .into(),
    }
}

/// Copies a changed set field, converting each member.
///
/// A member that fails to convert is reported and skipped; the remaining
/// members are still assigned.
#[must_use]
pub fn assign_set<T>(
    d: &ResourceData,
    target: &mut Option<Vec<T>>,
    name: &str,
    convert: fn(&SetElement) -> Result<T, FieldError>,
) -> Diagnostics {
    let mut diags = Diagnostics::new();
    if !d.has_change(name) {
        return diags;
    }
    let mut members = Vec::new();
    if let Some(set) = d.get(name).and_then(|v| v.as_set()) {
        for element in set.elements() {
            match convert(element) {
                Ok(member) => members.push(member),
                Err(err) => diags.push(super::convert::field_diagnostic(&err)),
            }
        }
    }
    *target = Some(members);
    diags
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::data::InstanceState;
    use crate::schema::field::{FieldKind, FieldSchema, PORT_NUMBER, ResourceSchema, SetSchema, Timeouts};
    use crate::schema::value::{Attributes, FieldSet, Value};

    #[derive(Debug, PartialEq)]
    enum Mode {
        Nat,
        Route,
    }

    impl FromStr for Mode {
        type Err = String;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            match s {
                "nat" => Ok(Self::Nat),
                "route" => Ok(Self::Route),
                other => Err(format!("unknown mode {other}")),
            }
        }
    }

    fn first_port(element: &SetElement) -> u32 {
        element
            .get("port")
            .and_then(Value::as_int)
            .and_then(|i| u32::try_from(i).ok())
            .unwrap_or_default()
    }

    static PORT_FIELDS: [FieldSchema; 1] = [FieldSchema::required("port", PORT_NUMBER)];
    static PORTS: SetSchema = SetSchema {
        fields: &PORT_FIELDS,
        hash: first_port,
    };

    static FIELDS: [FieldSchema; 3] = [
        FieldSchema::optional("name", FieldKind::String),
        FieldSchema::optional("mode", FieldKind::Enum(&["nat", "route"])),
        FieldSchema::optional("ports", FieldKind::Set(&PORTS)),
    ];

    static SCHEMA: ResourceSchema = ResourceSchema {
        label: "test",
        fields: &FIELDS,
        timeouts: Timeouts::standard(),
    };

    fn data(prior: Attributes, config: Attributes) -> ResourceData {
        ResourceData::from_state(
            &SCHEMA,
            InstanceState {
                id: String::from("x-1"),
                attributes: prior,
            },
        )
        .with_config(config)
    }

    #[test]
    fn test_unchanged_fields_stay_unset() {
        let attrs: Attributes = [
            (String::from("name"), Value::from("web")),
            (String::from("mode"), Value::from("nat")),
        ]
        .into();
        let d = data(attrs.clone(), attrs);

        let mut name = None;
        let mut mode: Option<Mode> = None;
        assign_string(&d, &mut name, "name");
        let diags = assign_enum(&d, &mut mode, "mode");

        assert!(diags.is_empty());
        assert!(name.is_none());
        assert!(mode.is_none());
    }

    #[test]
    fn test_changed_fields_are_copied() {
        let prior: Attributes = [(String::from("mode"), Value::from("nat"))].into();
        let config: Attributes = [
            (String::from("name"), Value::from("web")),
            (String::from("mode"), Value::from("route")),
        ]
        .into();
        let d = data(prior, config);

        let mut name = None;
        let mut mode = None;
        assign_string(&d, &mut name, "name");
        let diags = assign_enum(&d, &mut mode, "mode");

        assert!(diags.is_empty());
        assert_eq!(name.as_deref(), Some("web"));
        assert_eq!(mode, Some(Mode::Route));
    }

    #[test]
    fn test_set_members_converted() {
        let mut element = SetElement::new();
        element.insert(String::from("port"), Value::Int(443));
        let mut set = FieldSet::new();
        set.insert(443, element);
        let config: Attributes = [(String::from("ports"), Value::Set(set))].into();
        let d = data(Attributes::new(), config);

        let mut ports = None;
        let diags = assign_set(&d, &mut ports, "ports", |e| {
            e.get("port")
                .and_then(Value::as_int)
                .ok_or_else(|| FieldError::invalid("ports", "missing port"))
        });

        assert!(diags.is_empty());
        assert_eq!(ports, Some(vec![443]));
    }
}
