//! Structured values and their declared kinds.
//!
//! Values crossing the dispatch boundary are [`serde_json::Value`]. A
//! variable declares a [`ValueKind`]; `set_variable` only accepts values whose
//! kind is assignable to it.

use serde::{Deserialize, Serialize};
use std::fmt;

pub use serde_json::Value;

/// The declared type of a component variable.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    /// Only `null`.
    Null,
    /// `true` or `false`.
    Bool,
    /// A number without a fractional part.
    Integer,
    /// Any number, integral or not.
    Number,
    /// A string.
    String,
    /// An ordered list.
    List,
    /// A string-keyed object.
    Object,
    /// Anything at all.
    Any,
}

impl ValueKind {
    /// The narrowest kind describing `value`.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Bool,
            Value::Number(n) if n.is_i64() || n.is_u64() => Self::Integer,
            Value::Number(_) => Self::Number,
            Value::String(_) => Self::String,
            Value::Array(_) => Self::List,
            Value::Object(_) => Self::Object,
        }
    }

    /// Whether `value` may be stored in a slot declared with this kind.
    ///
    /// Integers are assignable to `Number`; nothing else widens.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, Self::of(value)) {
            (Self::Any, _) => true,
            (Self::Number, Self::Integer) => true,
            (declared, actual) => *declared == actual,
        }
    }

    /// Lowercase name used in error messages and on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::String => "string",
            Self::List => "list",
            Self::Object => "object",
            Self::Any => "any",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kind_of_each_value_shape() {
        assert_eq!(ValueKind::of(&json!(null)), ValueKind::Null);
        assert_eq!(ValueKind::of(&json!(true)), ValueKind::Bool);
        assert_eq!(ValueKind::of(&json!(-3)), ValueKind::Integer);
        assert_eq!(ValueKind::of(&json!(2.5)), ValueKind::Number);
        assert_eq!(ValueKind::of(&json!("x")), ValueKind::String);
        assert_eq!(ValueKind::of(&json!([1])), ValueKind::List);
        assert_eq!(ValueKind::of(&json!({"a": 1})), ValueKind::Object);
    }

    #[test]
    fn number_accepts_integers_but_not_the_reverse() {
        assert!(ValueKind::Number.accepts(&json!(7)));
        assert!(ValueKind::Number.accepts(&json!(7.5)));
        assert!(!ValueKind::Integer.accepts(&json!(7.5)));
    }

    #[test]
    fn any_accepts_everything() {
        for v in [json!(null), json!(1), json!("s"), json!([]), json!({})] {
            assert!(ValueKind::Any.accepts(&v));
        }
    }

    #[test]
    fn string_rejects_number() {
        assert!(!ValueKind::String.accepts(&json!(1)));
    }
}
