// Copyright 2026 the Render Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Runtime values read through references.
//!
//! Values are cheap to clone: strings, lists and objects are reference counted. Equality is
//! structural except for component definitions, which compare by identity.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::component::ComponentDefinition;

/// A keyed record value.
pub type Object = BTreeMap<Box<str>, Value>;

/// A dynamically typed template value.
#[derive(Clone, Default)]
pub enum Value {
    /// The absent value.
    #[default]
    Undefined,
    /// An explicit empty value.
    Null,
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// A floating point number.
    Float(f64),
    /// An immutable string.
    Str(Rc<str>),
    /// An immutable list.
    List(Rc<[Value]>),
    /// An immutable keyed record.
    Object(Rc<Object>),
    /// A component definition, usable with `{{component}}` and guarded appends.
    Component(Rc<ComponentDefinition>),
}

impl Value {
    /// Builds a string value.
    #[must_use]
    pub fn str(s: &str) -> Self {
        Self::Str(Rc::from(s))
    }

    /// Builds a list value.
    #[must_use]
    pub fn list(items: impl IntoIterator<Item = Self>) -> Self {
        Self::List(items.into_iter().collect::<Vec<_>>().into())
    }

    /// Builds an object value from `(key, value)` pairs.
    #[must_use]
    pub fn object<'a>(entries: impl IntoIterator<Item = (&'a str, Self)>) -> Self {
        Self::Object(Rc::new(
            entries
                .into_iter()
                .map(|(k, v)| (Box::from(k), v))
                .collect(),
        ))
    }

    /// Returns `true` for `undefined` and `null`.
    #[must_use]
    pub fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    /// Template truthiness: `false`, `null`, `undefined`, `0`, `NaN`, `""` and `[]` are falsy.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0 && !f.is_nan(),
            Self::Str(s) => !s.is_empty(),
            Self::List(items) => !items.is_empty(),
            Self::Object(_) | Self::Component(_) => true,
        }
    }

    /// Returns `true` if this value can be encoded as an instruction-stream primitive.
    #[must_use]
    pub fn is_primitive(&self) -> bool {
        !matches!(self, Self::List(_) | Self::Object(_) | Self::Component(_))
    }

    /// Reads a property.
    ///
    /// Objects look up their entries; lists and strings answer `length`, and lists also answer
    /// numeric indices. Everything else reads as `undefined`.
    #[must_use]
    pub fn get(&self, key: &str) -> Self {
        match self {
            Self::Object(map) => map.get(key).cloned().unwrap_or_default(),
            Self::List(items) => {
                if key == "length" {
                    return Self::Int(i64::try_from(items.len()).unwrap_or(i64::MAX));
                }
                key.parse::<usize>()
                    .ok()
                    .and_then(|i| items.get(i))
                    .cloned()
                    .unwrap_or_default()
            }
            Self::Str(s) if key == "length" => {
                Self::Int(i64::try_from(s.chars().count()).unwrap_or(i64::MAX))
            }
            _ => Self::Undefined,
        }
    }

    /// Returns the component definition held by this value, if any.
    #[must_use]
    pub fn as_component(&self) -> Option<&Rc<ComponentDefinition>> {
        match self {
            Self::Component(def) => Some(def),
            _ => None,
        }
    }

    /// A short name for the value's type, used in error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Int(_) | Self::Float(_) => "number",
            Self::Str(_) => "string",
            Self::List(_) => "list",
            Self::Object(_) => "object",
            Self::Component(_) => "component",
        }
    }

    /// Renders this value as text content.
    ///
    /// `null` and `undefined` render as the empty string.
    #[must_use]
    pub fn to_content(&self) -> String {
        use alloc::string::ToString;
        self.to_string()
    }

    /// Returns the attribute text for this value, or `None` if the attribute should be omitted.
    ///
    /// Exactly `false`, `null` and `undefined` omit the attribute; every other value (including
    /// `0` and `""`) renders literally.
    #[must_use]
    pub fn to_attribute(&self) -> Option<String> {
        match self {
            Self::Undefined | Self::Null | Self::Bool(false) => None,
            other => Some(other.to_content()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::List(a), Self::List(b)) => Rc::ptr_eq(a, b) || a == b,
            (Self::Object(a), Self::Object(b)) => Rc::ptr_eq(a, b) || a == b,
            (Self::Component(a), Self::Component(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => write!(f, "undefined"),
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x:?}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::List(items) => f.debug_list().entries(items.iter()).finish(),
            Self::Object(map) => f.debug_map().entries(map.iter()).finish(),
            Self::Component(def) => write!(f, "<component {}>", def.name()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined | Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Str(s) => f.write_str(s),
            Self::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
            Self::Object(_) => f.write_str("[object Object]"),
            Self::Component(def) => write!(f, "[component {}]", def.name()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::str(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(Rc::from(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn truthiness_follows_template_rules() {
        assert!(!Value::Undefined.is_truthy());
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(!Value::Float(f64::NAN).is_truthy());
        assert!(!Value::str("").is_truthy());
        assert!(!Value::list([]).is_truthy());
        assert!(Value::list([Value::Int(0)]).is_truthy());
        assert!(Value::object([]).is_truthy());
        assert!(Value::str("0").is_truthy());
    }

    #[test]
    fn attribute_policy_omits_only_false_null_undefined() {
        assert_eq!(Value::Bool(false).to_attribute(), None);
        assert_eq!(Value::Null.to_attribute(), None);
        assert_eq!(Value::Undefined.to_attribute(), None);
        assert_eq!(Value::Int(0).to_attribute().as_deref(), Some("0"));
        assert_eq!(Value::str("").to_attribute().as_deref(), Some(""));
        assert_eq!(Value::Bool(true).to_attribute().as_deref(), Some("true"));
    }

    #[test]
    fn property_reads() {
        let v = Value::object([("a", Value::list([Value::Int(1), Value::Int(2)]))]);
        assert_eq!(v.get("a").get("length"), Value::Int(2));
        assert_eq!(v.get("a").get("1"), Value::Int(2));
        assert_eq!(v.get("missing"), Value::Undefined);
        assert_eq!(Value::Int(3).get("a"), Value::Undefined);
    }

    #[test]
    fn content_rendering() {
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::Float(1.5).to_string(), "1.5");
        assert_eq!(
            Value::list([Value::Int(1), Value::str("b")]).to_string(),
            "1,b"
        );
        assert_eq!(Value::object([]).to_string(), "[object Object]");
    }
}
