use crate::errors::{ErrorKind, ParserError};
use crate::eval::evaluator::{DefaultEvaluator, EvaluationOutcome, RolloutEvaluator};
use crate::value::{RequestedType, ValuePrimitive};
use crate::{Setting, SettingValue, User, Value};
use log::{error, info};
use std::collections::HashMap;
use std::sync::Arc;

/// Extracts typed values and variation IDs from a settings map.
///
/// The parser holds no state besides its evaluator, so it can be shared between threads.
/// The settings map passed to its methods is treated as an immutable snapshot.
///
/// # Examples
///
/// ```rust
/// use std::collections::HashMap;
/// use configcat_core::{ConfigParser, Setting, Value};
///
/// let settings = HashMap::from([("flag".to_owned(), Setting::from(Value::Bool(true)))]);
/// let parser = ConfigParser::default();
/// let value: bool = parser.get_value("flag", &settings, None).unwrap();
/// assert!(value);
/// ```
#[derive(Clone)]
pub struct ConfigParser {
    evaluator: Arc<dyn RolloutEvaluator>,
}

impl Default for ConfigParser {
    fn default() -> Self {
        Self::new(Arc::new(DefaultEvaluator))
    }
}

impl ConfigParser {
    /// Creates a parser that delegates to `evaluator`.
    pub fn new(evaluator: Arc<dyn RolloutEvaluator>) -> Self {
        Self { evaluator }
    }

    /// Evaluates the setting identified by `key` and reads its value as `T`.
    ///
    /// Fails with [`ParserError::ParseFailure`] when the setting can't be resolved
    /// or its value is not of the kind `T` represents.
    pub fn get_value<T: ValuePrimitive>(
        &self,
        key: &str,
        settings: &HashMap<String, Setting>,
        user: Option<&User>,
    ) -> Result<T, ParserError> {
        let value = self.resolve(key, settings, user)?.0;
        T::from_value(&value).ok_or_else(|| type_mismatch(key, &value, T::KIND))
    }

    /// Evaluates the setting identified by `key` and checks that the result is of the kind named by `kind`
    /// (e.g. `"string"`, `"int?"`, `"any"`).
    ///
    /// An unsupported kind name fails with [`ParserError::InvalidRequestedType`] without evaluating anything.
    pub fn get_value_of_kind(
        &self,
        key: &str,
        kind: &str,
        settings: &HashMap<String, Setting>,
        user: Option<&User>,
    ) -> Result<Value, ParserError> {
        let requested = kind.parse::<RequestedType>().map_err(|name| {
            let err = ParserError::InvalidRequestedType(name);
            error!(event_id = err.kind().event_id(); "{err}");
            err
        })?;
        let value = self.resolve(key, settings, user)?.0;
        if !requested.kind.accepts(&value) {
            return Err(type_mismatch(key, &value, requested.kind));
        }
        Ok(value)
    }

    /// Evaluates the setting identified by `key` and returns the variation ID of the result.
    pub fn get_variation_id(
        &self,
        key: &str,
        settings: &HashMap<String, Setting>,
        user: Option<&User>,
    ) -> Result<String, ParserError> {
        let (_, variation_id) = self.resolve(key, settings, user)?;
        variation_id.ok_or_else(|| {
            let kind = ErrorKind::EvaluationFailure;
            let msg = format!(
                "Failed to evaluate setting '{key}' (the evaluated value has no variation ID). Available keys: [{}].",
                key_list(settings)
            );
            error!(event_id = kind.event_id(); "{msg}");
            ParserError::parse_failure(kind, msg)
        })
    }

    /// Returns the variation IDs of every setting. Settings that fail to evaluate are skipped.
    pub fn get_all_variation_ids(
        &self,
        settings: &HashMap<String, Setting>,
        user: Option<&User>,
    ) -> Vec<String> {
        settings
            .keys()
            .filter_map(|key| self.get_variation_id(key, settings, user).ok())
            .collect()
    }

    /// Returns the values of every setting by their keys. Settings that fail to evaluate are skipped.
    pub fn get_all_values(
        &self,
        settings: &HashMap<String, Setting>,
        user: Option<&User>,
    ) -> HashMap<String, Value> {
        settings
            .keys()
            .filter_map(|key| {
                self.get_value::<Value>(key, settings, user)
                    .ok()
                    .map(|value| (key.clone(), value))
            })
            .collect()
    }

    /// Looks up the setting that owns `variation_id` and the value tagged with it.
    ///
    /// The default value, the targeting rules' served values, their percentage options and the
    /// setting's percentage options are searched, in this order, for each setting.
    /// Values that don't fit their setting's type are skipped.
    pub fn get_key_and_value(
        &self,
        variation_id: &str,
        settings: &HashMap<String, Setting>,
    ) -> Result<(String, Value), ParserError> {
        let mut mismatched = None;
        for (key, setting) in settings {
            let Some(setting_value) = find_variation(setting, variation_id) else {
                continue;
            };
            match setting_value.as_val(&setting.setting_type) {
                Some(value) => return Ok((key.clone(), value)),
                None => mismatched = Some((key, setting)),
            }
        }
        let (kind, msg) = match mismatched {
            Some((key, setting)) => (
                ErrorKind::SettingValueTypeMismatch,
                format!(
                    "The value with variation ID '{variation_id}' in setting '{key}' is not a valid {} value.",
                    setting.setting_type
                ),
            ),
            None => (
                ErrorKind::SettingForVariationIdMissing,
                format!("Could not find the setting for the specified variation ID: '{variation_id}'."),
            ),
        };
        error!(event_id = kind.event_id(); "{msg}");
        Err(ParserError::parse_failure(kind, msg))
    }

    fn resolve(
        &self,
        key: &str,
        settings: &HashMap<String, Setting>,
        user: Option<&User>,
    ) -> Result<(Value, Option<String>), ParserError> {
        let setting = settings.get(key);
        let EvaluationOutcome {
            value,
            variation_id,
            log: eval_log,
            error: reason,
        } = self.evaluator.evaluate(setting, key, user, settings);
        if let Some(eval_log) = eval_log {
            info!(event_id = 5000; "{eval_log}");
        }
        if let Some(value) = value {
            return Ok((value, variation_id));
        }
        let (kind, msg) = if setting.is_none() {
            (
                ErrorKind::SettingKeyMissing,
                format!(
                    "Failed to evaluate setting '{key}' (the key was not found in config JSON). Available keys: [{}].",
                    key_list(settings)
                ),
            )
        } else {
            (
                ErrorKind::EvaluationFailure,
                format!(
                    "Failed to evaluate setting '{key}' ({}). Available keys: [{}].",
                    reason.as_deref().unwrap_or("no value was resolved"),
                    key_list(settings)
                ),
            )
        };
        error!(event_id = kind.event_id(); "{msg}");
        Err(ParserError::parse_failure(kind, msg))
    }
}

fn find_variation<'a>(setting: &'a Setting, variation_id: &str) -> Option<&'a SettingValue> {
    if setting.variation_id.as_deref() == Some(variation_id) {
        return Some(&setting.value);
    }
    for rule in setting.targeting_rules.iter().flatten() {
        if let Some(served_value) = rule.served_value.as_ref() {
            if served_value.variation_id.as_deref() == Some(variation_id) {
                return Some(&served_value.value);
            }
        }
        for option in rule.percentage_options.iter().flatten() {
            if option.variation_id.as_deref() == Some(variation_id) {
                return Some(&option.served_value);
            }
        }
    }
    setting
        .percentage_options
        .iter()
        .flatten()
        .find(|option| option.variation_id.as_deref() == Some(variation_id))
        .map(|option| &option.served_value)
}

fn key_list(settings: &HashMap<String, Setting>) -> String {
    let mut keys = settings.keys().map(String::as_str).collect::<Vec<&str>>();
    keys.sort_unstable();
    keys.iter()
        .map(|k| format!("'{k}'"))
        .collect::<Vec<String>>()
        .join(", ")
}

fn type_mismatch(key: &str, value: &Value, kind: crate::ValueKind) -> ParserError {
    let msg = format!(
        "The type of setting '{key}' doesn't match the requested type. Setting's value: '{value}' ({}), requested type: {kind}.",
        value.kind()
    );
    let kind = ErrorKind::SettingValueTypeMismatch;
    error!(event_id = kind.event_id(); "{msg}");
    ParserError::parse_failure(kind, msg)
}
