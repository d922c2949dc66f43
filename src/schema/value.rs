//! Attribute values held by a resource declaration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single structured member of a set attribute.
pub type SetElement = BTreeMap<String, Value>;

/// Attribute name to value mapping.
pub type Attributes = BTreeMap<String, Value>;

/// Value of a declared or computed attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Integer attribute.
    Int(i64),
    /// Plain or enumerated string attribute.
    String(String),
    /// Set of structured sub-records.
    Set(FieldSet),
}

/// A set of sub-records keyed by content hash.
///
/// Two sets are equal when they hold the same members, whatever order the
/// members were declared or returned in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<SetMember>", into = "Vec<SetMember>")]
pub struct FieldSet(BTreeMap<u32, SetElement>);

/// Persisted form of one set member.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SetMember {
    hash: u32,
    value: SetElement,
}

impl Value {
    /// Returns the string payload, if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer payload, if this is an integer.
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the set payload, if this is a set.
    #[must_use]
    pub const fn as_set(&self) -> Option<&FieldSet> {
        match self {
            Self::Set(set) => Some(set),
            _ => None,
        }
    }

    /// Returns true for the zero value of each shape: `""`, `0` or an empty set.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        match self {
            Self::Int(i) => *i == 0,
            Self::String(s) => s.is_empty(),
            Self::Set(set) => set.is_empty(),
        }
    }

    /// Human-readable name of the value's shape.
    #[must_use]
    pub const fn shape(&self) -> &'static str {
        match self {
            Self::Int(_) => "integer",
            Self::String(_) => "string",
            Self::Set(_) => "set",
        }
    }
}

impl FieldSet {
    /// Creates an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Inserts a member under its content hash, replacing an equal member.
    pub fn insert(&mut self, hash: u32, element: SetElement) {
        self.0.insert(hash, element);
    }

    /// Returns true if a member with this hash is present.
    #[must_use]
    pub fn contains(&self, hash: u32) -> bool {
        self.0.contains_key(&hash)
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the set has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over `(hash, member)` pairs in hash order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &SetElement)> {
        self.0.iter().map(|(hash, element)| (*hash, element))
    }

    /// Iterates over the members in hash order.
    pub fn elements(&self) -> impl Iterator<Item = &SetElement> {
        self.0.values()
    }
}

impl From<Vec<SetMember>> for FieldSet {
    fn from(members: Vec<SetMember>) -> Self {
        Self(members.into_iter().map(|m| (m.hash, m.value)).collect())
    }
}

impl From<FieldSet> for Vec<SetMember> {
    fn from(set: FieldSet) -> Self {
        set.0
            .into_iter()
            .map(|(hash, value)| SetMember { hash, value })
            .collect()
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Self::String(value.clone())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u16> for Value {
    fn from(value: u16) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<FieldSet> for Value {
    fn from(value: FieldSet) -> Self {
        Self::Set(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::String(s) => write!(f, "{s}"),
            Self::Set(set) => {
                write!(f, "[")?;
                for (i, element) in set.elements().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{{")?;
                    for (j, (key, value)) in element.iter().enumerate() {
                        if j > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{key}={value}")?;
                    }
                    write!(f, "}}")?;
                }
                write!(f, "]")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(incoming: i64) -> SetElement {
        let mut element = SetElement::new();
        element.insert(String::from("incoming"), Value::Int(incoming));
        element
    }

    #[test]
    fn test_set_equality_ignores_insertion_order() {
        let mut a = FieldSet::new();
        a.insert(2, element(443));
        a.insert(1, element(80));

        let mut b = FieldSet::new();
        b.insert(1, element(80));
        b.insert(2, element(443));

        assert_eq!(a, b);
        assert!(a.contains(1));
        assert_eq!(a.len(), 2);
    }

    #[test]
    fn test_zero_values() {
        assert!(Value::from("").is_zero());
        assert!(Value::Int(0).is_zero());
        assert!(Value::Set(FieldSet::new()).is_zero());
        assert!(!Value::from("nat").is_zero());
    }

    #[test]
    fn test_untagged_json_shapes() {
        let mut set = FieldSet::new();
        set.insert(7, element(443));
        let mut attrs = Attributes::new();
        attrs.insert(String::from("name"), Value::from("web"));
        attrs.insert(String::from("port_translator"), Value::Set(set));

        let json = serde_json::to_string(&attrs).expect("serialize");
        let back: Attributes = serde_json::from_str(&json).expect("deserialize");

        assert_eq!(back, attrs);
        assert_eq!(back["name"].as_str(), Some("web"));
        assert!(back["port_translator"].as_set().is_some());
    }
}
