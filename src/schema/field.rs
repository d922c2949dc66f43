//! Static attribute tables describing each resource kind.

use std::time::Duration;

use crate::error::FieldError;

use super::value::{FieldSet, SetElement, Value};

/// Checks a string value, returning a message on rejection.
pub type Validator = fn(&str) -> Result<(), String>;

/// Computes the identity hash of one set member.
pub type SetHash = fn(&SetElement) -> u32;

/// Shape of an attribute.
#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    /// Free-form string.
    String,
    /// String restricted to a fixed set of canonical values.
    Enum(&'static [&'static str]),
    /// Integer within an inclusive range.
    Int {
        /// Smallest accepted value.
        min: i64,
        /// Largest accepted value.
        max: i64,
    },
    /// Set of structured sub-records.
    Set(&'static SetSchema),
}

/// Layout of a set attribute's members.
#[derive(Debug)]
pub struct SetSchema {
    /// Sub-fields of each member; all are required.
    pub fields: &'static [FieldSchema],
    /// Member identity hash.
    pub hash: SetHash,
}

/// Who supplies an attribute's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldMode {
    /// Must be declared.
    Required,
    /// May be declared.
    Optional,
    /// Only ever written from the remote snapshot.
    Computed,
    /// May be declared, otherwise filled in from the remote snapshot.
    OptionalComputed,
}

/// One attribute of a resource kind.
#[derive(Debug, Clone, Copy)]
pub struct FieldSchema {
    /// Attribute name.
    pub name: &'static str,
    /// Value shape.
    pub kind: FieldKind,
    /// Who supplies the value.
    pub mode: FieldMode,
    /// Human-readable description.
    pub description: &'static str,
    /// Value used when the declaration omits the attribute.
    pub default: Option<&'static str>,
    /// Hide the value in output.
    pub sensitive: bool,
    /// Extra check for string values.
    pub validate: Option<Validator>,
}

/// Per-operation timeouts for a resource kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Create timeout.
    pub create: Duration,
    /// Read timeout.
    pub read: Duration,
    /// Update timeout.
    pub update: Duration,
    /// Delete timeout.
    pub delete: Duration,
}

/// Lifecycle operation, used to pick a timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Create.
    Create,
    /// Read.
    Read,
    /// Update.
    Update,
    /// Delete.
    Delete,
}

/// Attribute table for one resource kind.
#[derive(Debug)]
pub struct ResourceSchema {
    /// Resource kind label used in messages.
    pub label: &'static str,
    /// Declared attributes.
    pub fields: &'static [FieldSchema],
    /// Default timeouts.
    pub timeouts: Timeouts,
}

/// Default timeout for create and delete.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Default timeout for read and update.
pub const DEFAULT_LONG_TIMEOUT: Duration = Duration::from_secs(20 * 60);

impl FieldSchema {
    const fn new(name: &'static str, kind: FieldKind, mode: FieldMode) -> Self {
        Self {
            name,
            kind,
            mode,
            description: "",
            default: None,
            sensitive: false,
            validate: None,
        }
    }

    /// Declares a required attribute.
    #[must_use]
    pub const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self::new(name, kind, FieldMode::Required)
    }

    /// Declares an optional attribute.
    #[must_use]
    pub const fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self::new(name, kind, FieldMode::Optional)
    }

    /// Declares a computed attribute.
    #[must_use]
    pub const fn computed(name: &'static str, kind: FieldKind) -> Self {
        Self::new(name, kind, FieldMode::Computed)
    }

    /// Declares an optional attribute the remote side fills in when omitted.
    #[must_use]
    pub const fn optional_computed(name: &'static str, kind: FieldKind) -> Self {
        Self::new(name, kind, FieldMode::OptionalComputed)
    }

    /// Sets the description.
    #[must_use]
    pub const fn describe(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Sets the value used when the declaration omits the attribute.
    #[must_use]
    pub const fn with_default(mut self, default: &'static str) -> Self {
        self.default = Some(default);
        self
    }

    /// Marks the attribute as sensitive.
    #[must_use]
    pub const fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    /// Adds a string validator.
    #[must_use]
    pub const fn validated(mut self, validate: Validator) -> Self {
        self.validate = Some(validate);
        self
    }

    /// Returns true if a declaration may supply this attribute.
    #[must_use]
    pub const fn is_declarable(&self) -> bool {
        !matches!(self.mode, FieldMode::Computed)
    }

    /// Checks that `value` has this attribute's shape.
    ///
    /// Only the shape is checked here; validators run on declared input.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::TypeMismatch`] or [`FieldError::InvalidValue`].
    pub fn check(&self, value: &Value) -> Result<(), FieldError> {
        match (&self.kind, value) {
            (FieldKind::String, Value::String(_)) => Ok(()),
            (FieldKind::Enum(allowed), Value::String(s)) => {
                if s.is_empty() || allowed.contains(&s.as_str()) {
                    Ok(())
                } else {
                    Err(FieldError::invalid(
                        self.name,
                        format!("expected one of {}, got {s}", allowed.join(", ")),
                    ))
                }
            }
            (FieldKind::Int { min, max }, Value::Int(i)) => {
                if (*min..=*max).contains(i) {
                    Ok(())
                } else {
                    Err(FieldError::invalid(
                        self.name,
                        format!("expected value in range {min}..={max}, got {i}"),
                    ))
                }
            }
            (FieldKind::Set(schema), Value::Set(set)) => self.check_set(schema, set),
            (kind, value) => Err(FieldError::TypeMismatch {
                name: self.name.to_string(),
                expected: kind.shape().to_string(),
                found: value.shape().to_string(),
            }),
        }
    }

    fn check_set(&self, schema: &SetSchema, set: &FieldSet) -> Result<(), FieldError> {
        for (hash, element) in set.iter() {
            for sub in schema.fields {
                let value = element.get(sub.name).ok_or_else(|| {
                    FieldError::invalid(self.name, format!("member is missing {}", sub.name))
                })?;
                sub.check(value).map_err(|e| {
                    FieldError::invalid(self.name, format!("member {hash}: {e}"))
                })?;
            }
            if let Some(extra) = element
                .keys()
                .find(|k| !schema.fields.iter().any(|f| f.name == k.as_str()))
            {
                return Err(FieldError::invalid(
                    self.name,
                    format!("member has unknown field {extra}"),
                ));
            }
        }
        Ok(())
    }
}

impl FieldKind {
    /// Human-readable name of the shape.
    #[must_use]
    pub const fn shape(&self) -> &'static str {
        match self {
            Self::String | Self::Enum(_) => "string",
            Self::Int { .. } => "integer",
            Self::Set(_) => "set",
        }
    }
}

impl SetSchema {
    /// Hashes a member with this set's identity function.
    #[must_use]
    pub fn hash_of(&self, element: &SetElement) -> u32 {
        (self.hash)(element)
    }
}

impl Timeouts {
    /// Standard timeouts: five minutes for create and delete.
    #[must_use]
    pub const fn standard() -> Self {
        Self {
            create: DEFAULT_TIMEOUT,
            read: DEFAULT_LONG_TIMEOUT,
            update: DEFAULT_LONG_TIMEOUT,
            delete: DEFAULT_TIMEOUT,
        }
    }

    /// The same timeout for every operation.
    #[must_use]
    pub const fn uniform(timeout: Duration) -> Self {
        Self {
            create: timeout,
            read: timeout,
            update: timeout,
            delete: timeout,
        }
    }

    /// Returns the timeout for an operation.
    #[must_use]
    pub const fn get(&self, operation: Operation) -> Duration {
        match operation {
            Operation::Create => self.create,
            Operation::Read => self.read,
            Operation::Update => self.update,
            Operation::Delete => self.delete,
        }
    }

    /// Returns a copy with one operation's timeout replaced.
    #[must_use]
    pub const fn with(mut self, operation: Operation, timeout: Duration) -> Self {
        match operation {
            Operation::Create => self.create = timeout,
            Operation::Read => self.read = timeout,
            Operation::Update => self.update = timeout,
            Operation::Delete => self.delete = timeout,
        }
        self
    }
}

impl ResourceSchema {
    /// Looks up an attribute by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Returns true if the attribute is marked sensitive.
    #[must_use]
    pub fn is_sensitive(&self, name: &str) -> bool {
        self.field(name).is_some_and(|f| f.sensitive)
    }
}

/// Accepts TCP/UDP port numbers.
pub const PORT_NUMBER: FieldKind = FieldKind::Int { min: 1, max: 65535 };

#[cfg(test)]
mod tests {
    use super::*;

    const MODE: FieldSchema = FieldSchema::optional("mode", FieldKind::Enum(&["nat", "route"]));
    const PORT: FieldSchema = FieldSchema::required("incoming", PORT_NUMBER);

    #[test]
    fn test_enum_check() {
        assert!(MODE.check(&Value::from("nat")).is_ok());
        assert!(MODE.check(&Value::from("")).is_ok());

        let err = MODE.check(&Value::from("bridge")).unwrap_err();
        assert!(matches!(err, FieldError::InvalidValue { .. }));
    }

    #[test]
    fn test_type_mismatch() {
        let err = MODE.check(&Value::Int(3)).unwrap_err();
        assert_eq!(
            err,
            FieldError::TypeMismatch {
                name: String::from("mode"),
                expected: String::from("string"),
                found: String::from("integer"),
            }
        );
    }

    #[test]
    fn test_port_range() {
        assert!(PORT.check(&Value::Int(443)).is_ok());
        assert!(PORT.check(&Value::Int(0)).is_err());
        assert!(PORT.check(&Value::Int(70000)).is_err());
    }

    #[test]
    fn test_timeout_override() {
        let timeouts = Timeouts::standard().with(Operation::Create, Duration::from_secs(30));
        assert_eq!(timeouts.get(Operation::Create), Duration::from_secs(30));
        assert_eq!(timeouts.get(Operation::Delete), DEFAULT_TIMEOUT);
    }
}
