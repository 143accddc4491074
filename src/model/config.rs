use crate::model::enums::{
    PrerequisiteFlagComparator, RedirectMode, SegmentComparator, SettingType, UserComparator,
};
use crate::value::Value;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use thiserror::Error;

const INVALID_VALUE_TXT: &str = "<invalid value>";
const STRING_LIST_MAX_LENGTH: usize = 10;

#[derive(Error, Debug, PartialEq)]
pub enum Error {
    #[error("JSON parsing failed. ({0})")]
    Parse(String),
}

/// A config JSON snapshot together with its cache bookkeeping.
#[derive(Debug, Clone)]
pub struct ConfigEntry {
    /// The parsed config JSON.
    pub config: Arc<Config>,
    /// The raw config JSON text.
    pub config_json: String,
    /// The ETag of the HTTP response that delivered the config JSON.
    pub etag: String,
    /// The time of the last successful download.
    pub fetch_time: DateTime<Utc>,
}

impl Default for ConfigEntry {
    fn default() -> Self {
        Self {
            config: Arc::new(Config::default()),
            config_json: String::default(),
            etag: String::default(),
            fetch_time: DateTime::<Utc>::MIN_UTC,
        }
    }
}

impl PartialEq for ConfigEntry {
    fn eq(&self, other: &Self) -> bool {
        self.etag == other.etag && self.config_json == other.config_json
    }
}

impl ConfigEntry {
    /// The cache payload: fetch time in millis, ETag and the config JSON separated by new lines.
    pub fn serialize(&self) -> String {
        format!(
            "{}\n{}\n{}",
            self.fetch_time.timestamp_millis(),
            self.etag,
            self.config_json
        )
    }

    pub fn is_empty(&self) -> bool {
        self.etag.is_empty() && self.config_json.is_empty()
    }

    pub fn with_time(&self, time: DateTime<Utc>) -> Self {
        Self {
            fetch_time: time,
            ..self.clone()
        }
    }
}

pub fn entry_from_json(
    json: &str,
    etag: &str,
    fetch_time: DateTime<Utc>,
) -> Result<ConfigEntry, Error> {
    let mut config =
        serde_json::from_str::<Config>(json).map_err(|err| Error::Parse(err.to_string()))?;
    post_process(&mut config);
    Ok(ConfigEntry {
        config: Arc::new(config),
        etag: etag.to_owned(),
        fetch_time,
        config_json: json.to_owned(),
    })
}

pub fn entry_from_cached_json(cached_json: &str) -> Result<ConfigEntry, Error> {
    let mut parts = cached_json.splitn(3, '\n');
    let (time_string, etag, config_json) = match (parts.next(), parts.next(), parts.next()) {
        (Some(time), Some(etag), Some(json)) => (time, etag, json),
        _ => {
            return Err(Error::Parse(
                "Number of values is fewer than expected".to_owned(),
            ))
        }
    };
    let millis = time_string
        .parse::<i64>()
        .map_err(|_| Error::Parse(format!("Invalid fetch time: '{time_string}'")))?;
    let fetch_time = DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| Error::Parse(format!("Invalid unix millis value: '{millis}'")))?;
    entry_from_json(config_json, etag, fetch_time)
}

fn post_process(config: &mut Config) {
    config.salt = config.preferences.as_ref().and_then(|p| p.salt.clone());
    let segments = config.segments.clone().unwrap_or_default();
    for setting in config.settings.values_mut() {
        setting.salt.clone_from(&config.salt);
        for rule in setting.targeting_rules.iter_mut().flatten() {
            for cond in rule.conditions.iter_mut().flatten() {
                if let Some(segment_condition) = cond.segment_condition.as_mut() {
                    segment_condition.segment = segments.get(segment_condition.index).cloned();
                }
            }
        }
    }
}

/// The deserialized config JSON.
#[derive(Deserialize, Debug, Default, Clone)]
pub struct Config {
    /// The map of settings by their keys.
    #[serde(rename = "f", default)]
    pub settings: HashMap<String, Setting>,
    /// The list of segments.
    #[serde(rename = "s")]
    pub segments: Option<Vec<Arc<Segment>>>,
    /// The salt that was used to hash sensitive comparison values.
    #[serde(skip)]
    pub salt: Option<String>,

    #[serde(rename = "p")]
    pub(crate) preferences: Option<Preferences>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Preferences {
    #[serde(rename = "u")]
    pub url: Option<String>,
    #[serde(rename = "r")]
    pub redirect: Option<RedirectMode>,
    #[serde(rename = "s")]
    pub salt: Option<String>,
}

/// Describes a feature flag or setting.
#[derive(Deserialize, Debug, Clone)]
pub struct Setting {
    /// The value served when no targeting rule or percentage option applies.
    #[serde(rename = "v")]
    pub value: SettingValue,
    /// Percentage options, evaluated in order.
    #[serde(rename = "p")]
    pub percentage_options: Option<Vec<PercentageOption>>,
    /// Targeting rules, evaluated in order; the first match wins.
    #[serde(rename = "r")]
    pub targeting_rules: Option<Vec<TargetingRule>>,
    /// Variation ID of the default value (for analytical purposes).
    #[serde(rename = "i")]
    pub variation_id: Option<String>,
    /// The User Object attribute percentage options are based on. Defaults to the identifier.
    #[serde(rename = "a")]
    pub percentage_attribute: Option<String>,
    /// The setting's type.
    #[serde(rename = "t")]
    pub setting_type: SettingType,

    #[serde(skip)]
    pub(crate) salt: Option<String>,
}

impl From<&Value> for Setting {
    fn from(value: &Value) -> Self {
        let (setting_type, setting_value) = match value {
            Value::Bool(val) => (
                SettingType::Bool,
                SettingValue {
                    bool_val: Some(*val),
                    ..SettingValue::default()
                },
            ),
            Value::Int(val) => (
                SettingType::Int,
                SettingValue {
                    int_val: Some(*val),
                    ..SettingValue::default()
                },
            ),
            Value::Float(val) => (
                SettingType::Float,
                SettingValue {
                    float_val: Some(*val),
                    ..SettingValue::default()
                },
            ),
            Value::String(val) => (
                SettingType::String,
                SettingValue {
                    string_val: Some(val.clone()),
                    ..SettingValue::default()
                },
            ),
        };
        Setting {
            value: setting_value,
            setting_type,
            percentage_options: None,
            targeting_rules: None,
            variation_id: None,
            percentage_attribute: None,
            salt: None,
        }
    }
}

impl From<Value> for Setting {
    fn from(value: Value) -> Self {
        Setting::from(&value)
    }
}

/// Describes a segment.
#[derive(Deserialize, Debug)]
pub struct Segment {
    /// The name of the segment.
    #[serde(rename = "n")]
    pub name: String,
    /// Conditions combined with the AND logical operator.
    #[serde(rename = "r")]
    pub conditions: Vec<UserCondition>,
}

/// Describes a targeting rule.
#[derive(Deserialize, Debug, Clone)]
pub struct TargetingRule {
    /// The served value, or [`None`] when the rule serves percentage options.
    #[serde(rename = "s")]
    pub served_value: Option<ServedValue>,
    /// Conditions combined with the AND logical operator.
    #[serde(rename = "c")]
    pub conditions: Option<Vec<Condition>>,
    /// Percentage options served when the rule has no served value.
    #[serde(rename = "p")]
    pub percentage_options: Option<Vec<PercentageOption>>,
}

/// A condition: exactly one of the fields is expected to be set.
#[derive(Deserialize, Debug, Clone)]
pub struct Condition {
    /// Condition on a User Object attribute.
    #[serde(rename = "u")]
    pub user_condition: Option<UserCondition>,
    /// Condition on a segment.
    #[serde(rename = "s")]
    pub segment_condition: Option<SegmentCondition>,
    /// Condition on a prerequisite flag.
    #[serde(rename = "p")]
    pub prerequisite_flag_condition: Option<PrerequisiteFlagCondition>,
}

/// Describes a condition that is based on a [`crate::User`] attribute.
#[derive(Deserialize, Debug, Clone)]
pub struct UserCondition {
    /// Single text comparison value.
    #[serde(rename = "s")]
    pub string_val: Option<String>,
    /// Numeric comparison value.
    #[serde(rename = "d")]
    pub float_val: Option<f64>,
    /// List of text comparison values.
    #[serde(rename = "l")]
    pub string_vec_val: Option<Vec<String>>,
    /// The comparison operator.
    #[serde(rename = "c")]
    pub comparator: UserComparator,
    /// The User Object attribute the condition is based on.
    #[serde(rename = "a")]
    pub comp_attr: String,
}

impl Display for UserCondition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "User.{} {} ", self.comp_attr, self.comparator)?;
        if let Some(num) = self.float_val {
            if self.comparator.is_date() {
                return match DateTime::from_timestamp_millis((num * 1000.0) as i64) {
                    Some(date) => write!(f, "'{num}' ({date})"),
                    None => write!(f, "'{num}'"),
                };
            }
            return write!(f, "'{num}'");
        }
        if let Some(text) = self.string_val.as_ref() {
            return if self.comparator.is_sensitive() {
                f.write_str("'<hashed value>'")
            } else {
                write!(f, "'{text}'")
            };
        }
        if let Some(vec) = self.string_vec_val.as_ref() {
            let noun = |n: usize| if n > 1 { "values" } else { "value" };
            if self.comparator.is_sensitive() {
                return write!(f, "[<{} hashed {}>]", vec.len(), noun(vec.len()));
            }
            let shown = vec
                .iter()
                .take(STRING_LIST_MAX_LENGTH)
                .map(|item| format!("'{item}'"))
                .collect::<Vec<String>>()
                .join(", ");
            return if vec.len() > STRING_LIST_MAX_LENGTH {
                let rest = vec.len() - STRING_LIST_MAX_LENGTH;
                write!(f, "[{shown}, ... <{rest} more {}>]", noun(rest))
            } else {
                write!(f, "[{shown}]")
            };
        }
        f.write_str(INVALID_VALUE_TXT)
    }
}

/// Describes a condition that is based on a [`Segment`].
#[derive(Deserialize, Debug, Clone)]
pub struct SegmentCondition {
    /// Index of the segment in the config JSON's segment list.
    #[serde(rename = "s")]
    pub index: usize,
    /// The expected result of the segment evaluation.
    #[serde(rename = "c")]
    pub segment_comparator: SegmentComparator,

    #[serde(skip)]
    pub(crate) segment: Option<Arc<Segment>>,
}

impl Display for SegmentCondition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self.segment.as_ref() {
            Some(seg) => seg.name.as_str(),
            None => "<invalid name>",
        };
        write!(f, "User {} '{name}'", self.segment_comparator)
    }
}

/// Describes a condition that is based on a prerequisite flag.
#[derive(Deserialize, Debug, Clone)]
pub struct PrerequisiteFlagCondition {
    /// The key of the prerequisite flag.
    #[serde(rename = "f")]
    pub flag_key: String,
    /// The comparison operator.
    #[serde(rename = "c")]
    pub prerequisite_comparator: PrerequisiteFlagComparator,
    /// The value the prerequisite flag's evaluated value is compared to.
    #[serde(rename = "v")]
    pub flag_value: SettingValue,
}

impl Display for PrerequisiteFlagCondition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Flag '{}' {} '{}'",
            self.flag_key, self.prerequisite_comparator, self.flag_value
        )
    }
}

/// Describes a percentage option.
#[derive(Deserialize, Debug, Clone)]
pub struct PercentageOption {
    /// The served value.
    #[serde(rename = "v")]
    pub served_value: SettingValue,
    /// A number between 0 and 100, the size of the bucket.
    #[serde(rename = "p")]
    pub percentage: i64,
    /// Variation ID (for analytical purposes).
    #[serde(rename = "i")]
    pub variation_id: Option<String>,
}

/// A setting value served by a targeting rule.
#[derive(Deserialize, Debug, Clone)]
pub struct ServedValue {
    /// The served value.
    #[serde(rename = "v")]
    pub value: SettingValue,
    /// Variation ID (for analytical purposes).
    #[serde(rename = "i")]
    pub variation_id: Option<String>,
}

/// Describes a setting's value; the field matching the setting's type is set.
#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
pub struct SettingValue {
    /// Value of a bool feature flag.
    #[serde(rename = "b")]
    pub bool_val: Option<bool>,
    /// Value of a string setting.
    #[serde(rename = "s")]
    pub string_val: Option<String>,
    /// Value of a decimal number setting.
    #[serde(rename = "d")]
    pub float_val: Option<f64>,
    /// Value of a whole number setting.
    #[serde(rename = "i")]
    pub int_val: Option<i64>,
}

impl SettingValue {
    /// Reads the value that belongs to `setting_type`.
    pub fn as_val(&self, setting_type: &SettingType) -> Option<Value> {
        match setting_type {
            SettingType::Bool => self.bool_val.map(Value::Bool),
            SettingType::String => self.string_val.clone().map(Value::String),
            SettingType::Int => self.int_val.map(Value::Int),
            SettingType::Float => self.float_val.map(Value::Float),
        }
    }

    pub(crate) fn is_valid(&self, setting_type: &SettingType) -> bool {
        self.as_val(setting_type).is_some()
    }

    pub(crate) fn eq_by_type(&self, other: &SettingValue, setting_type: &SettingType) -> bool {
        match (self.as_val(setting_type), other.as_val(setting_type)) {
            (Some(this), Some(that)) => this == that,
            _ => false,
        }
    }
}

impl Display for SettingValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if let Some(b) = self.bool_val.as_ref() {
            write!(f, "{b}")
        } else if let Some(s) = self.string_val.as_ref() {
            f.write_str(s)
        } else if let Some(fl) = self.float_val.as_ref() {
            write!(f, "{fl}")
        } else if let Some(i) = self.int_val.as_ref() {
            write!(f, "{i}")
        } else {
            f.write_str(INVALID_VALUE_TXT)
        }
    }
}

#[cfg(test)]
mod model_tests {
    use crate::model::config::{entry_from_cached_json, entry_from_json};
    use chrono::{DateTime, Utc};
    use std::str::FromStr;

    static CONFIG_JSON: &str = r#"{"p":{"u":"https://cdn-global.configcat.com","r":0,"s":"test-salt"},"f":{"testKey":{"t":1,"v":{"s": "testValue"}}}}"#;

    #[test]
    fn parse() {
        let payload = format!("1686756435844\ntest-etag\n{CONFIG_JSON}");
        let result = entry_from_cached_json(payload.as_str()).unwrap();
        let exp_time: DateTime<Utc> = DateTime::from_str("2023-06-14T15:27:15.8440000Z").unwrap();
        assert_eq!(result.config.settings.len(), 1);
        assert_eq!(result.etag, "test-etag");
        assert_eq!(result.fetch_time, exp_time);
        assert_eq!(result.config_json, CONFIG_JSON);
        assert_eq!(result.config.salt.as_deref(), Some("test-salt"));
        assert_eq!(
            result.config.settings["testKey"].salt.as_deref(),
            Some("test-salt")
        );
        assert_eq!(payload, result.serialize());
    }

    #[test]
    fn parse_invalid() {
        let tests = vec![
            ("", "JSON parsing failed. (Number of values is fewer than expected)"),
            ("\n", "JSON parsing failed. (Number of values is fewer than expected)"),
            ("\n\n", "JSON parsing failed. (Invalid fetch time: '')"),
            (
                "1686756435844\ntest-etag",
                "JSON parsing failed. (Number of values is fewer than expected)",
            ),
        ];
        for (payload, expected) in tests {
            assert_eq!(
                entry_from_cached_json(payload).unwrap_err().to_string(),
                expected
            );
        }
        let err =
            entry_from_cached_json(format!("abc\ntest-etag\n{CONFIG_JSON}").as_str()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "JSON parsing failed. (Invalid fetch time: 'abc')"
        );
        let err = entry_from_cached_json("1686756435844\ntest-etag\n{\"f\":5}").unwrap_err();
        assert!(err.to_string().starts_with("JSON parsing failed. (invalid type"));
    }

    #[test]
    fn segments_are_resolved() {
        let json = r#"{
            "s": [{"n": "Beta users", "r": [{"a": "Email", "c": 2, "l": ["@example.com"]}]}],
            "f": {"flag": {"t": 0, "v": {"b": false}, "r": [
                {"c": [{"s": {"s": 0, "c": 0}}], "s": {"v": {"b": true}, "i": "rule"}}
            ]}}
        }"#;
        let entry = entry_from_json(json, "", Utc::now()).unwrap();
        let rules = entry.config.settings["flag"].targeting_rules.as_ref().unwrap();
        let cond = rules[0].conditions.as_ref().unwrap()[0]
            .segment_condition
            .as_ref()
            .unwrap();
        assert_eq!(cond.segment.as_ref().unwrap().name, "Beta users");
        assert_eq!(format!("{cond}"), "User IS IN SEGMENT 'Beta users'");
    }
}
