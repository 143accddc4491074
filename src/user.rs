use chrono::{DateTime, Utc};
use semver::Version;
use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};

/// Supported user attribute value types.
#[derive(Debug, Clone, PartialEq)]
pub enum UserValue {
    /// String user attribute value.
    String(String),
    /// Signed integer user attribute value.
    Int(i64),
    /// Unsigned integer user attribute value.
    UInt(u64),
    /// Float user attribute value.
    Float(f64),
    /// Datetime user attribute value.
    DateTime(DateTime<Utc>),
    /// String vector user attribute value.
    StringVec(Vec<String>),
    /// Semantic version user attribute value.
    SemVer(Version),
}

impl Display for UserValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            UserValue::String(val) => f.write_str(val),
            UserValue::Int(val) => write!(f, "{val}"),
            UserValue::UInt(val) => write!(f, "{val}"),
            UserValue::Float(val) => write!(f, "{val}"),
            UserValue::DateTime(val) => write!(f, "{val}"),
            UserValue::StringVec(val) => write!(f, "[{}]", val.join(", ")),
            UserValue::SemVer(val) => write!(f, "{val}"),
        }
    }
}

impl Serialize for UserValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            UserValue::String(val) => serializer.serialize_str(val),
            UserValue::Int(val) => serializer.serialize_i64(*val),
            UserValue::UInt(val) => serializer.serialize_u64(*val),
            UserValue::Float(val) => serializer.serialize_f64(*val),
            UserValue::DateTime(val) => serializer.collect_str(val),
            UserValue::StringVec(val) => {
                let mut seq = serializer.serialize_seq(Some(val.len()))?;
                for element in val {
                    seq.serialize_element(element)?;
                }
                seq.end()
            }
            UserValue::SemVer(val) => serializer.collect_str(val),
        }
    }
}

impl UserValue {
    /// Text representation used by text-based comparators and percentage bucketing.
    /// The flag is `true` when the value had to be converted.
    pub(crate) fn as_text(&self) -> (String, bool) {
        match self {
            UserValue::String(val) => (val.clone(), false),
            UserValue::Float(val) => {
                if val.is_nan() {
                    ("NaN".to_owned(), true)
                } else if val.is_infinite() {
                    let sign = if val.is_sign_negative() { "-" } else { "" };
                    (format!("{sign}Infinity"), true)
                } else {
                    (val.to_string(), true)
                }
            }
            UserValue::SemVer(val) => (val.to_string(), true),
            UserValue::Int(val) => (val.to_string(), true),
            UserValue::UInt(val) => (val.to_string(), true),
            UserValue::DateTime(val) => (unix_seconds(val).to_string(), true),
            UserValue::StringVec(val) => (serde_json::to_string(val).unwrap_or_default(), true),
        }
    }

    pub(crate) fn as_float(&self) -> Option<f64> {
        match self {
            UserValue::String(val) => {
                let trimmed = val.trim();
                match trimmed {
                    "Infinity" | "+Infinity" => Some(f64::INFINITY),
                    "-Infinity" => Some(f64::NEG_INFINITY),
                    "NaN" => Some(f64::NAN),
                    _ => trimmed.replace(',', ".").parse::<f64>().ok(),
                }
            }
            UserValue::Int(val) => Some(*val as f64),
            UserValue::UInt(val) => Some(*val as f64),
            UserValue::Float(val) => Some(*val),
            _ => None,
        }
    }

    /// Seconds elapsed since the Unix epoch.
    pub(crate) fn as_timestamp(&self) -> Option<f64> {
        match self {
            UserValue::DateTime(val) => Some(unix_seconds(val)),
            _ => self.as_float(),
        }
    }

    pub(crate) fn as_semver(&self) -> Option<Version> {
        match self {
            UserValue::SemVer(val) => Some(val.clone()),
            UserValue::String(val) => Version::parse(val.trim()).ok(),
            _ => None,
        }
    }

    pub(crate) fn as_str_vec(&self) -> Option<Vec<String>> {
        match self {
            UserValue::StringVec(val) => Some(val.clone()),
            UserValue::String(val) => serde_json::from_str::<Vec<String>>(val).ok(),
            _ => None,
        }
    }
}

fn unix_seconds(time: &DateTime<Utc>) -> f64 {
    time.timestamp_millis() as f64 / 1000.0
}

/// Describes a User Object. Contains user attributes which are used for evaluating targeting rules and percentage options.
///
/// # Examples:
///
/// ```rust
/// use configcat_core::User;
///
/// let user = User::new("user-id")
///     .email("john@example.com")
///     .custom("Rating", 4.5)
///     .custom("Roles", vec!["Role1", "Role2"]);
/// ```
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct User {
    attributes: HashMap<String, UserValue>,
}

impl User {
    /// Attribute name of the user's unique identifier.
    pub const IDENTIFIER: &'static str = "Identifier";
    /// Attribute name of the user's email address.
    pub const EMAIL: &'static str = "Email";
    /// Attribute name of the user's country.
    pub const COUNTRY: &'static str = "Country";

    /// Initializes a new [`User`].
    pub fn new(identifier: &str) -> Self {
        Self {
            attributes: HashMap::from([(Self::IDENTIFIER.to_owned(), identifier.into())]),
        }
    }

    /// Email address of the user.
    pub fn email(mut self, email: &str) -> Self {
        self.attributes.insert(Self::EMAIL.to_owned(), email.into());
        self
    }

    /// Country of the user.
    pub fn country(mut self, country: &str) -> Self {
        self.attributes
            .insert(Self::COUNTRY.to_owned(), country.into());
        self
    }

    /// Custom attribute of the user for advanced targeting rule definitions (e.g. user role, subscription type, etc.)
    ///
    /// Predefined attribute names (`Identifier`, `Email`, `Country`) are ignored.
    pub fn custom<T: Into<UserValue>>(mut self, key: &str, value: T) -> Self {
        if key == Self::IDENTIFIER || key == Self::EMAIL || key == Self::COUNTRY {
            return self;
        }
        self.attributes.insert(key.to_owned(), value.into());
        self
    }

    /// Gets the attribute identified by `key`.
    pub fn get(&self, key: &str) -> Option<&UserValue> {
        self.attributes.get(key)
    }

    pub(crate) fn identifier(&self) -> String {
        self.get(Self::IDENTIFIER)
            .map(|id| id.as_text().0)
            .unwrap_or_default()
    }
}

impl Display for User {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match serde_json::to_string(self) {
            Ok(str) => f.write_str(str.as_str()),
            Err(_) => f.write_str("<invalid user>"),
        }
    }
}

impl From<Vec<&str>> for UserValue {
    fn from(value: Vec<&str>) -> Self {
        Self::StringVec(value.iter().map(|x| x.to_string()).collect())
    }
}

from_val_to_enum!(UserValue String String);
from_val_to_enum!(UserValue DateTime DateTime<Utc>);
from_val_to_enum!(UserValue StringVec Vec<String>);
from_val_to_enum!(UserValue SemVer Version);
from_val_to_enum_into!(UserValue Float f64 f32);
from_val_to_enum_into!(UserValue UInt u8 u16 u32 u64);
from_val_to_enum_into!(UserValue Int i8 i16 i32 i64);
from_val_to_enum_into!(UserValue String &str);

#[cfg(test)]
mod user_tests {
    use crate::{User, UserValue};

    #[test]
    fn predefined_attributes_are_protected() {
        let user = User::new("id")
            .email("a@b.com")
            .custom("Identifier", "other")
            .custom("Plan", "pro");
        assert_eq!(user.identifier(), "id");
        assert_eq!(user.get(User::EMAIL), Some(&UserValue::String("a@b.com".to_owned())));
        assert_eq!(user.get("Plan"), Some(&UserValue::String("pro".to_owned())));
    }

    #[test]
    fn conversions() {
        assert_eq!(UserValue::from("1,5").as_float(), Some(1.5));
        assert_eq!(UserValue::from(3u8).as_text(), ("3".to_owned(), true));
        assert_eq!(UserValue::from(f64::NEG_INFINITY).as_text().0, "-Infinity");
        assert_eq!(
            UserValue::from(r#"["a","b"]"#).as_str_vec(),
            Some(vec!["a".to_owned(), "b".to_owned()])
        );
        assert!(UserValue::from("1.0").as_semver().is_none());
        assert!(UserValue::from(" 1.0.0 ").as_semver().is_some());
    }
}
