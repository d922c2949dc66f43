//! Per-instance declaration handle used by every lifecycle call.
//!
//! A [`ResourceData`] stacks three attribute layers: the prior persisted
//! snapshot, the declared configuration, and values written during the
//! current call. Reads fall through written, then config, then prior.
//! Change detection only ever compares config against prior, so a field the
//! declaration leaves out is never treated as changed.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::FieldError;

use super::field::{Operation, ResourceSchema, Timeouts};
use super::value::{Attributes, Value};

/// Persisted snapshot of one resource instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceState {
    /// Remote identifier.
    pub id: String,
    /// Last known attribute values.
    #[serde(default)]
    pub attributes: Attributes,
}

/// Declaration handle for one resource instance.
#[derive(Debug, Clone)]
pub struct ResourceData {
    schema: &'static ResourceSchema,
    id: String,
    prior: Attributes,
    config: Attributes,
    written: Attributes,
    timeouts: Timeouts,
}

impl ResourceData {
    /// Creates an empty handle for a resource that does not exist yet.
    #[must_use]
    pub const fn new(schema: &'static ResourceSchema) -> Self {
        Self {
            schema,
            id: String::new(),
            prior: Attributes::new(),
            config: Attributes::new(),
            written: Attributes::new(),
            timeouts: schema.timeouts,
        }
    }

    /// Creates a handle seeded from persisted state.
    #[must_use]
    pub fn from_state(schema: &'static ResourceSchema, state: InstanceState) -> Self {
        let mut data = Self::new(schema);
        data.id = state.id;
        data.prior = state.attributes;
        data
    }

    /// Sets the declared configuration layer.
    #[must_use]
    pub fn with_config(mut self, config: Attributes) -> Self {
        self.config = config;
        self
    }

    /// Overrides the operation timeouts.
    #[must_use]
    pub const fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Schema this handle validates writes against.
    #[must_use]
    pub const fn schema(&self) -> &'static ResourceSchema {
        self.schema
    }

    /// Remote identifier, empty when the resource is absent.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns true if no remote identifier is held.
    #[must_use]
    pub fn is_absent(&self) -> bool {
        self.id.is_empty()
    }

    /// Records the remote identifier.
    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    /// Clears the identifier, marking the resource as absent.
    pub fn clear_id(&mut self) {
        self.id.clear();
    }

    /// Timeout for an operation on this instance.
    #[must_use]
    pub const fn timeout(&self, operation: Operation) -> Duration {
        self.timeouts.get(operation)
    }

    /// Current value of a field: written, then config, then prior.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.written
            .get(name)
            .or_else(|| self.config.get(name))
            .or_else(|| self.prior.get(name))
    }

    /// Current value of a field, only if it is set to a non-zero value.
    #[must_use]
    pub fn get_ok(&self, name: &str) -> Option<&Value> {
        self.get(name).filter(|v| !v.is_zero())
    }

    /// Current string value of a field, or `""`.
    #[must_use]
    pub fn get_str(&self, name: &str) -> &str {
        self.get(name).and_then(Value::as_str).unwrap_or_default()
    }

    /// Prior and new value of a field.
    ///
    /// The new value is the declared one when present, otherwise the prior.
    #[must_use]
    pub fn get_change(&self, name: &str) -> (Option<&Value>, Option<&Value>) {
        let old = self.prior.get(name);
        let new = self.config.get(name).or(old);
        (old, new)
    }

    /// Returns true if the declaration sets this field to something other
    /// than the prior value.
    #[must_use]
    pub fn has_change(&self, name: &str) -> bool {
        self.config
            .get(name)
            .is_some_and(|declared| self.prior.get(name) != Some(declared))
    }

    /// Returns true if any declared field differs from the prior value.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.config.keys().any(|name| self.has_change(name))
    }

    /// Writes a field, checking it against the schema.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::UnknownField`] for names outside the schema and
    /// the schema's shape errors otherwise. Nothing is written on error.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<(), FieldError> {
        let field = self.schema.field(name).ok_or_else(|| FieldError::UnknownField {
            name: name.to_string(),
        })?;
        let value = value.into();
        field.check(&value)?;
        self.written.insert(name.to_string(), value);
        Ok(())
    }

    /// Merged attribute view: prior overlaid with config, then written.
    #[must_use]
    pub fn attributes(&self) -> Attributes {
        let mut merged = self.prior.clone();
        merged.extend(self.config.clone());
        merged.extend(self.written.clone());
        merged
    }

    /// Snapshot to persist, or `None` when the resource is absent.
    #[must_use]
    pub fn state(&self) -> Option<InstanceState> {
        if self.is_absent() {
            return None;
        }
        Some(InstanceState {
            id: self.id.clone(),
            attributes: self.attributes(),
        })
    }

    /// Like [`Self::state`] but without the declared layer.
    ///
    /// Used after a failed call, so declared values that never reached the
    /// remote side still show up as changes next time.
    #[must_use]
    pub fn observed_state(&self) -> Option<InstanceState> {
        if self.is_absent() {
            return None;
        }
        let mut attributes = self.prior.clone();
        attributes.extend(self.written.clone());
        Some(InstanceState {
            id: self.id.clone(),
            attributes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::field::{FieldKind, FieldSchema};

    static FIELDS: [FieldSchema; 3] = [
        FieldSchema::optional("name", FieldKind::String),
        FieldSchema::optional("mode", FieldKind::Enum(&["nat", "route"])),
        FieldSchema::computed("status", FieldKind::String),
    ];

    static SCHEMA: ResourceSchema = ResourceSchema {
        label: "test",
        fields: &FIELDS,
        timeouts: Timeouts::standard(),
    };

    fn attrs(pairs: &[(&str, &str)]) -> Attributes {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), Value::from(*v)))
            .collect()
    }

    #[test]
    fn test_get_layers() {
        let state = InstanceState {
            id: String::from("cip-1"),
            attributes: attrs(&[("name", "old"), ("mode", "nat")]),
        };
        let mut data =
            ResourceData::from_state(&SCHEMA, state).with_config(attrs(&[("name", "new")]));

        assert_eq!(data.get_str("name"), "new");
        assert_eq!(data.get_str("mode"), "nat");

        data.set("name", "written").unwrap();
        assert_eq!(data.get_str("name"), "written");
    }

    #[test]
    fn test_absent_from_config_is_not_a_change() {
        let state = InstanceState {
            id: String::from("cip-1"),
            attributes: attrs(&[("name", "web"), ("mode", "nat")]),
        };
        let data = ResourceData::from_state(&SCHEMA, state).with_config(attrs(&[("name", "web")]));

        assert!(!data.has_change("name"));
        assert!(!data.has_change("mode"));
        assert!(!data.has_changes());
        assert_eq!(data.get_change("mode").1, Some(&Value::from("nat")));
    }

    #[test]
    fn test_changed_field() {
        let state = InstanceState {
            id: String::from("cip-1"),
            attributes: attrs(&[("mode", "nat")]),
        };
        let data = ResourceData::from_state(&SCHEMA, state).with_config(attrs(&[("mode", "route")]));

        assert!(data.has_change("mode"));
        let (old, new) = data.get_change("mode");
        assert_eq!(old, Some(&Value::from("nat")));
        assert_eq!(new, Some(&Value::from("route")));
    }

    #[test]
    fn test_set_rejects_bad_values() {
        let mut data = ResourceData::new(&SCHEMA);

        assert!(matches!(
            data.set("colour", "red"),
            Err(FieldError::UnknownField { .. })
        ));
        assert!(matches!(
            data.set("name", 5_i64),
            Err(FieldError::TypeMismatch { .. })
        ));
        assert!(data.get("name").is_none());
    }

    #[test]
    fn test_state_requires_id() {
        let mut data = ResourceData::new(&SCHEMA).with_config(attrs(&[("name", "web")]));
        assert!(data.state().is_none());

        data.set_id("cip-1");
        data.set("status", "mapped").unwrap();
        let state = data.state().unwrap();
        assert_eq!(state.id, "cip-1");
        assert_eq!(state.attributes["name"], Value::from("web"));
        assert_eq!(state.attributes["status"], Value::from("mapped"));

        data.clear_id();
        assert!(data.is_absent());
    }

    #[test]
    fn test_observed_state_leaves_out_declared_values() {
        let state = InstanceState {
            id: String::from("cip-1"),
            attributes: attrs(&[("name", "web")]),
        };
        let mut data = ResourceData::from_state(&SCHEMA, state).with_config(attrs(&[("name", "api")]));
        data.set("status", "mapped").unwrap();

        let observed = data.observed_state().unwrap();
        assert_eq!(observed.attributes["name"], Value::from("web"));
        assert_eq!(observed.attributes["status"], Value::from("mapped"));
        assert_eq!(data.state().unwrap().attributes["name"], Value::from("api"));
    }
}
