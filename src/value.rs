use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Represents the value of a feature flag or setting.
///
/// # Examples
///
/// ```rust
/// use configcat_core::Value;
///
/// let bool_val = Value::Bool(true);
/// let int_val = Value::Int(42);
/// ```
#[derive(PartialEq, Debug, Clone)]
pub enum Value {
    /// A bool feature flag's value.
    Bool(bool),
    /// A whole number setting's value.
    Int(i64),
    /// A decimal number setting's value.
    Float(f64),
    /// A text setting's value.
    String(String),
}

impl Value {
    /// Reads the value as `bool`. Returns [`None`] if it's not a [`Value::Bool`].
    pub fn as_bool(&self) -> Option<bool> {
        if let Value::Bool(val) = self {
            return Some(*val);
        }
        None
    }

    /// Reads the value as `i64`. Returns [`None`] if it's not a [`Value::Int`].
    pub fn as_int(&self) -> Option<i64> {
        if let Value::Int(val) = self {
            return Some(*val);
        }
        None
    }

    /// Reads the value as `f64`. Returns [`None`] if it's not a [`Value::Float`].
    pub fn as_float(&self) -> Option<f64> {
        if let Value::Float(val) = self {
            return Some(*val);
        }
        None
    }

    /// Reads the value as [`String`]. Returns [`None`] if it's not a [`Value::String`].
    ///
    /// # Examples
    ///
    /// ```rust
    /// use configcat_core::Value;
    ///
    /// let value = Value::String("foo".to_owned());
    /// assert_eq!(value.as_str().unwrap(), "foo".to_owned());
    /// ```
    pub fn as_str(&self) -> Option<String> {
        if let Value::String(val) = self {
            return Some(val.clone());
        }
        None
    }

    fn as_value(&self) -> Option<Value> {
        Some(self.clone())
    }

    /// The [`ValueKind`] this value belongs to.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Bool(_) => ValueKind::Flag,
            Value::Int(_) => ValueKind::Integer,
            Value::Float(_) => ValueKind::Real,
            Value::String(_) => ValueKind::Text,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Bool(val) => write!(f, "{val}"),
            Value::Int(val) => write!(f, "{val}"),
            Value::Float(val) => write!(f, "{val}"),
            Value::String(val) => f.write_str(val),
        }
    }
}

/// The closed set of value kinds a caller can request from the [`crate::ConfigParser`].
#[derive(PartialEq, Debug, Clone, Copy)]
pub enum ValueKind {
    /// Text values, read as [`String`].
    Text,
    /// Whole numbers, read as `i64`.
    Integer,
    /// Decimal numbers, read as `f64`.
    Real,
    /// On/off flags, read as `bool`.
    Flag,
    /// Any of the above, read as [`Value`].
    Opaque,
}

impl ValueKind {
    /// Returns `true` when a value of this kind can be produced from `value`.
    pub fn accepts(&self, value: &Value) -> bool {
        *self == ValueKind::Opaque || *self == value.kind()
    }
}

impl Display for ValueKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueKind::Text => f.write_str("String"),
            ValueKind::Integer => f.write_str("Integer"),
            ValueKind::Real => f.write_str("Double"),
            ValueKind::Flag => f.write_str("Bool"),
            ValueKind::Opaque => f.write_str("Any"),
        }
    }
}

/// A value kind requested through a textual type tag, e.g. `"string"` or `"int?"`.
///
/// A trailing `?` marks the nullable counterpart of the kind.
///
/// # Examples
///
/// ```rust
/// use configcat_core::{RequestedType, ValueKind};
///
/// let requested: RequestedType = "double?".parse().unwrap();
/// assert_eq!(requested.kind, ValueKind::Real);
/// assert!(requested.nullable);
/// assert!("[string]".parse::<RequestedType>().is_err());
/// ```
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct RequestedType {
    /// The requested kind.
    pub kind: ValueKind,
    /// Whether the nullable counterpart was requested.
    pub nullable: bool,
}

impl FromStr for RequestedType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (name, nullable) = match trimmed.strip_suffix('?') {
            Some(name) => (name, true),
            None => (trimmed, false),
        };
        let kind = match name.to_ascii_lowercase().as_str() {
            "string" | "str" | "text" => ValueKind::Text,
            "int" | "integer" | "i64" => ValueKind::Integer,
            "double" | "float" | "f64" => ValueKind::Real,
            "bool" | "boolean" => ValueKind::Flag,
            "any" | "value" => ValueKind::Opaque,
            _ => return Err(s.to_owned()),
        };
        Ok(Self { kind, nullable })
    }
}

/// Represents a type that a feature flag or setting value can be read as.
///
/// Implemented for [`String`], `i64`, `f64`, `bool`, [`Value`] and their [`Option`] counterparts.
pub trait ValuePrimitive: Sized {
    /// The kind of values this type can hold.
    const KIND: ValueKind;

    /// Reads the primitive value from a [`Value`].
    fn from_value(value: &Value) -> Option<Self>;
}

primitive_impl!(String Text as_str String);
primitive_impl!(Float Real as_float f64);
primitive_impl!(Int Integer as_int i64);
primitive_impl!(Bool Flag as_bool bool);
from_val_to_enum_into!(Value String &str);

impl ValuePrimitive for Value {
    const KIND: ValueKind = ValueKind::Opaque;

    fn from_value(value: &Value) -> Option<Self> {
        value.as_value()
    }
}

impl<T: ValuePrimitive> ValuePrimitive for Option<T> {
    const KIND: ValueKind = T::KIND;

    fn from_value(value: &Value) -> Option<Self> {
        T::from_value(value).map(Some)
    }
}

#[cfg(test)]
mod value_tests {
    use crate::value::{RequestedType, ValueKind, ValuePrimitive};
    use crate::Value;

    #[test]
    fn requested_type_names() {
        let tests = vec![
            ("string", ValueKind::Text, false),
            ("String?", ValueKind::Text, true),
            ("int", ValueKind::Integer, false),
            ("Integer?", ValueKind::Integer, true),
            ("double", ValueKind::Real, false),
            ("bool?", ValueKind::Flag, true),
            ("Any", ValueKind::Opaque, false),
            ("any?", ValueKind::Opaque, true),
        ];
        for (name, kind, nullable) in tests {
            let requested = name.parse::<RequestedType>().unwrap();
            assert_eq!(requested, RequestedType { kind, nullable });
        }
    }

    #[test]
    fn unsupported_type_names() {
        for name in ["[string]", "list", "map?", "", "?"] {
            assert_eq!(name.parse::<RequestedType>().unwrap_err(), name);
        }
    }

    #[test]
    fn kind_accepts() {
        assert!(ValueKind::Opaque.accepts(&Value::Int(1)));
        assert!(ValueKind::Integer.accepts(&Value::Int(1)));
        assert!(!ValueKind::Real.accepts(&Value::Int(1)));
        assert!(!ValueKind::Text.accepts(&Value::Bool(true)));
    }

    #[test]
    fn primitive_conversion() {
        assert_eq!(String::from_value(&"a".into()), Some("a".to_owned()));
        assert_eq!(i64::from_value(&Value::Float(1.0)), None);
        assert_eq!(Option::<bool>::from_value(&Value::Bool(true)), Some(Some(true)));
        assert_eq!(Option::<f64>::from_value(&Value::Int(3)), None);
        assert_eq!(
            Value::from_value(&Value::Float(3.5)),
            Some(Value::Float(3.5))
        );
        assert_eq!(<Option<i64> as ValuePrimitive>::KIND, ValueKind::Integer);
    }
}
