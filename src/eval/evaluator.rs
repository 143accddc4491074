use crate::eval::evaluator::ConditionResult::*;
use crate::eval::evaluator::EvalResult::*;
use crate::eval::log_builder::EvalLogBuilder;
use crate::UserComparator::*;
use crate::{
    utils, Condition, PercentageOption, PrerequisiteFlagComparator, PrerequisiteFlagCondition,
    SegmentComparator, SegmentCondition, ServedValue, Setting, SettingValue, User,
    UserComparator, UserCondition, Value,
};
use log::{log_enabled, warn};
use semver::Version;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};

macro_rules! eval_log_enabled {
    () => {
        log_enabled!(log::Level::Info)
    };
}

const SALT_MISSING_MSG: &str = "Config JSON salt is missing";
const COMP_VAL_INVALID_MSG: &str = "Comparison value is missing or invalid";

/// The result of resolving a setting for a user.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvaluationOutcome {
    /// The resolved value, [`None`] when the setting could not be resolved.
    pub value: Option<Value>,
    /// The variation ID of the resolved value.
    pub variation_id: Option<String>,
    /// Human readable evaluation trace, only produced when info level logging is enabled.
    pub log: Option<String>,
    /// The reason of a failed evaluation.
    pub error: Option<String>,
}

impl EvaluationOutcome {
    /// An outcome that carries neither a value nor a variation ID.
    pub fn unresolved(error: Option<String>, log: Option<String>) -> Self {
        Self {
            value: None,
            variation_id: None,
            log,
            error,
        }
    }
}

/// Resolves a setting's value and variation ID for an optional [`User`].
///
/// Implementations must be safe to call from multiple threads and must never panic
/// on settings they can't resolve; such settings produce an outcome without a value.
pub trait RolloutEvaluator: Send + Sync {
    /// Evaluates `setting` identified by `key`. `settings` holds every setting of the
    /// current config JSON, for resolving prerequisite flags.
    fn evaluate(
        &self,
        setting: Option<&Setting>,
        key: &str,
        user: Option<&User>,
        settings: &HashMap<String, Setting>,
    ) -> EvaluationOutcome;
}

/// The standard rollout evaluator: targeting rules, segments, prerequisite flags and percentage options.
#[derive(Default)]
pub struct DefaultEvaluator;

impl RolloutEvaluator for DefaultEvaluator {
    fn evaluate(
        &self,
        setting: Option<&Setting>,
        key: &str,
        user: Option<&User>,
        settings: &HashMap<String, Setting>,
    ) -> EvaluationOutcome {
        let setting = if let Some(setting) = setting {
            setting
        } else {
            return EvaluationOutcome::unresolved(
                Some(format!("Setting '{key}' is missing")),
                None,
            );
        };
        let mut log = EvalLogBuilder::default();
        if eval_log_enabled!() {
            log.append(format!("Evaluating '{key}'").as_str());
            if let Some(user) = user {
                log.append(format!(" for User '{user}'").as_str());
            }
            log.inc_indent();
        }
        let mut cycle_tracker = Vec::<String>::new();
        let result = eval_setting(setting, key, user, &mut log, settings, &mut cycle_tracker);
        let mut outcome = match result {
            Success(setting_value, variation_id) => match setting_value.as_val(&setting.setting_type) {
                Some(value) => {
                    if eval_log_enabled!() {
                        log.new_ln(Some(format!("Returning '{value}'.").as_str()));
                    }
                    EvaluationOutcome {
                        value: Some(value),
                        variation_id,
                        log: None,
                        error: None,
                    }
                }
                None => EvaluationOutcome::unresolved(
                    Some(format!(
                        "Setting value is not of the expected type {}",
                        setting.setting_type
                    )),
                    None,
                ),
            },
            Failure(err) => {
                if eval_log_enabled!() {
                    log.new_ln(Some(format!("Evaluation failed: {err}").as_str()));
                }
                EvaluationOutcome::unresolved(Some(err), None)
            }
        };
        if eval_log_enabled!() {
            log.dec_indent();
            outcome.log = Some(log.content().to_owned());
        }
        outcome
    }
}

pub enum EvalResult {
    Success(SettingValue, Option<String>),
    Failure(String),
}

pub enum ConditionResult {
    Done(bool),
    NoUser,
    AttrMissing(String, String),
    AttrInvalid(String, String, String),
    CompValInvalid(Option<String>),
    Fatal(String),
}

impl ConditionResult {
    fn is_match(&self) -> bool {
        matches!(self, Done(true))
    }

    pub(crate) fn is_ok(&self) -> bool {
        matches!(self, Done(_))
    }

    fn is_attr_miss(&self) -> bool {
        matches!(self, AttrMissing(_, _))
    }
}

impl Display for ConditionResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Done(_) => f.write_str(""),
            NoUser => f.write_str("cannot evaluate, User Object is missing"),
            AttrMissing(attr, _) => {
                write!(f, "cannot evaluate, the User.{attr} attribute is missing")
            }
            AttrInvalid(reason, attr, _) => write!(
                f,
                "cannot evaluate, the User.{attr} attribute is invalid ({reason})"
            ),
            CompValInvalid(err) => write!(
                f,
                "cannot evaluate, ({})",
                err.as_deref().unwrap_or("comparison value is missing or invalid")
            ),
            Fatal(err) => write!(f, "cannot evaluate ({err})"),
        }
    }
}

fn eval_setting(
    setting: &Setting,
    key: &str,
    user: Option<&User>,
    log: &mut EvalLogBuilder,
    settings: &HashMap<String, Setting>,
    cycle_tracker: &mut Vec<String>,
) -> EvalResult {
    let mut user_missing_logged = false;
    if let Some(rules) = setting.targeting_rules.as_ref() {
        if eval_log_enabled!() {
            log.new_ln(Some(
                "Evaluating targeting rules and applying the first match if any:",
            ));
        }
        for rule in rules {
            let conditions = rule.conditions.as_deref().unwrap_or_default();
            let result = eval_conditions(
                conditions,
                rule.served_value.as_ref(),
                key,
                user,
                &setting.salt,
                key,
                log,
                settings,
                cycle_tracker,
            );
            match result {
                Done(true) => {}
                Done(false) => continue,
                Fatal(err) => return Failure(err),
                NoUser => {
                    if !user_missing_logged {
                        log_user_missing(key);
                        user_missing_logged = true;
                    }
                    continue;
                }
                AttrMissing(attr, cond) => {
                    warn!(event_id = 3003; "Cannot evaluate condition ({cond}) for setting '{key}' (the User.{attr} attribute is missing). You should set the User.{attr} attribute in order to make targeting work properly.");
                    continue;
                }
                AttrInvalid(reason, attr, cond) => {
                    warn!(event_id = 3004; "Cannot evaluate condition ({cond}) for setting '{key}' ({reason}). Please check the User.{attr} attribute and make sure that its value corresponds to the comparison operator.");
                    continue;
                }
                CompValInvalid(_) => continue,
            }
            if let Some(served_value) = rule.served_value.as_ref() {
                return Success(served_value.value.clone(), served_value.variation_id.clone());
            }
            let options = if let Some(options) = rule.percentage_options.as_deref() {
                options
            } else {
                return Failure("Targeting rule THEN part is missing or invalid".to_owned());
            };
            if eval_log_enabled!() {
                log.inc_indent();
            }
            let result = match user {
                Some(user) => eval_percentage(options, key, user, setting, log),
                None => {
                    if !user_missing_logged {
                        log_user_missing(key);
                        user_missing_logged = true;
                    }
                    if eval_log_enabled!() {
                        log.new_ln(Some(
                            "Skipping % options because the User Object is missing.",
                        ));
                    }
                    Ok(None)
                }
            };
            match result {
                Ok(Some(selected)) => return selected,
                Ok(None) => {
                    if eval_log_enabled!() {
                        log.new_ln(Some(
                            "The current targeting rule is ignored and the evaluation continues with the next rule.",
                        ))
                        .dec_indent();
                    }
                }
                Err(err) => return Failure(err),
            }
        }
    }
    if let Some(options) = setting.percentage_options.as_deref() {
        if !options.is_empty() {
            match user {
                Some(user) => match eval_percentage(options, key, user, setting, log) {
                    Ok(Some(selected)) => return selected,
                    Ok(None) => {}
                    Err(err) => return Failure(err),
                },
                None => {
                    if !user_missing_logged {
                        log_user_missing(key);
                    }
                    if eval_log_enabled!() {
                        log.new_ln(Some(
                            "Skipping % options because the User Object is missing.",
                        ));
                    }
                }
            }
        }
    }
    Success(setting.value.clone(), setting.variation_id.clone())
}

fn eval_percentage(
    options: &[PercentageOption],
    key: &str,
    user: &User,
    setting: &Setting,
    log: &mut EvalLogBuilder,
) -> Result<Option<EvalResult>, String> {
    let attr = setting
        .percentage_attribute
        .as_deref()
        .unwrap_or(User::IDENTIFIER);
    let user_attr = if let Some(user_attr) = user.get(attr) {
        user_attr
    } else {
        if eval_log_enabled!() {
            log.new_ln(Some(
                format!("Skipping % options because the User.{attr} attribute is missing.")
                    .as_str(),
            ));
        }
        warn!(event_id = 3003; "Cannot evaluate % options for setting '{key}' (the User.{attr} attribute is missing). You should set the User.{attr} attribute in order to make targeting work properly.");
        return Ok(None);
    };
    if eval_log_enabled!() {
        log.new_ln(Some(
            format!("Evaluating % options based on the User.{attr} attribute:").as_str(),
        ));
    }
    let (attr_text, _) = user_attr.as_text();
    let hash = utils::sha1(format!("{key}{attr_text}").as_str());
    let scale = hash
        .get(..7)
        .and_then(|prefix| u32::from_str_radix(prefix, 16).ok())
        .map(|num| num % 100)
        .ok_or_else(|| "Percentage hash computation failed".to_owned())?;
    if eval_log_enabled!() {
        log.new_ln(Some(format!("- Computing hash in the [0..99] range from User.{attr} => {scale} (this value is sticky and consistent across all SDKs)").as_str()));
    }
    let mut bucket = 0i64;
    for (index, option) in options.iter().enumerate() {
        bucket += option.percentage;
        if i64::from(scale) < bucket {
            if eval_log_enabled!() {
                log.new_ln(Some(
                    format!(
                        "- Hash value {scale} selects % option {} ({}%), '{}'.",
                        index + 1,
                        option.percentage,
                        option.served_value
                    )
                    .as_str(),
                ));
            }
            return Ok(Some(Success(
                option.served_value.clone(),
                option.variation_id.clone(),
            )));
        }
    }
    Err("Sum of percentage option percentages is less than 100".to_owned())
}

#[allow(clippy::too_many_arguments)]
fn eval_conditions(
    conditions: &[Condition],
    rule_srv_value: Option<&ServedValue>,
    key: &str,
    user: Option<&User>,
    salt: &Option<String>,
    ctx_salt: &str,
    log: &mut EvalLogBuilder,
    settings: &HashMap<String, Setting>,
    cycle_tracker: &mut Vec<String>,
) -> ConditionResult {
    if eval_log_enabled!() {
        log.new_ln(Some("- "));
    }
    let mut new_line_before_then = false;
    for (index, condition) in conditions.iter().enumerate() {
        let mut cond_result = Fatal(
            "Condition isn't a type of user, segment, or prerequisite flag condition".to_owned(),
        );
        if eval_log_enabled!() {
            if index == 0 {
                log.append("IF ").inc_indent();
            } else {
                log.inc_indent().new_ln(Some("AND "));
            }
        }
        if let Some(user_condition) = condition.user_condition.as_ref() {
            if eval_log_enabled!() {
                log.append(format!("{user_condition}").as_str());
            }
            cond_result = match user {
                Some(user) => eval_user_cond(user_condition, key, user, salt, ctx_salt),
                None => NoUser,
            };
            new_line_before_then = conditions.len() > 1;
        } else if let Some(segment_condition) = condition.segment_condition.as_ref() {
            if eval_log_enabled!() {
                log.append(format!("{segment_condition}").as_str());
            }
            cond_result = match user {
                Some(user) => eval_segment_cond(segment_condition, key, user, salt, log),
                None => NoUser,
            };
            new_line_before_then =
                cond_result.is_ok() || cond_result.is_attr_miss() || conditions.len() > 1;
        } else if let Some(prerequisite_condition) = condition.prerequisite_flag_condition.as_ref()
        {
            cond_result = eval_prerequisite_cond(
                prerequisite_condition,
                key,
                user,
                log,
                settings,
                cycle_tracker,
            );
            new_line_before_then = true;
        }
        if eval_log_enabled!() {
            if conditions.len() > 1 {
                let (res_msg, conclusion) = if cond_result.is_match() {
                    ("true", "")
                } else {
                    ("false", ", skipping the remaining AND conditions")
                };
                log.append(format!(" => {res_msg}{conclusion}").as_str());
            }
            log.dec_indent();
        }
        if !cond_result.is_match() {
            if eval_log_enabled!() {
                log.append_then_clause(new_line_before_then, &cond_result, rule_srv_value);
            }
            return cond_result;
        }
    }
    if eval_log_enabled!() {
        log.append_then_clause(new_line_before_then, &Done(true), rule_srv_value);
    }
    Done(true)
}

fn eval_prerequisite_cond(
    cond: &PrerequisiteFlagCondition,
    key: &str,
    user: Option<&User>,
    log: &mut EvalLogBuilder,
    settings: &HashMap<String, Setting>,
    cycle_tracker: &mut Vec<String>,
) -> ConditionResult {
    if eval_log_enabled!() {
        log.append(format!("{cond}").as_str());
    }
    let prerequisite = if let Some(prerequisite) = settings.get(&cond.flag_key) {
        prerequisite
    } else {
        return Fatal("Prerequisite flag is missing".to_owned());
    };
    if !cond.flag_value.is_valid(&prerequisite.setting_type) {
        return Fatal(format!(
            "Type mismatch between comparison value '{}' and prerequisite flag '{}'",
            cond.flag_value, cond.flag_key
        ));
    }

    cycle_tracker.push(key.to_owned());
    if cycle_tracker.contains(&cond.flag_key) {
        cycle_tracker.push(cond.flag_key.clone());
        let output = cycle_tracker
            .iter()
            .map(|k| format!("'{k}'"))
            .collect::<Vec<String>>()
            .join(" => ");
        return Fatal(format!("Circular dependency detected between the following depending flags: {output}"));
    }

    let needs_true = cond.prerequisite_comparator == PrerequisiteFlagComparator::Eq;
    if eval_log_enabled!() {
        log.new_ln(Some("(")).inc_indent().new_ln(Some(
            format!("Evaluating prerequisite flag '{}':", cond.flag_key).as_str(),
        ));
    }

    let result = eval_setting(
        prerequisite,
        cond.flag_key.as_str(),
        user,
        log,
        settings,
        cycle_tracker,
    );
    cycle_tracker.pop();

    match result {
        Success(sv, _) => {
            let matched = needs_true == cond.flag_value.eq_by_type(&sv, &prerequisite.setting_type);
            if eval_log_enabled!() {
                let msg = if matched { "true" } else { "false" };
                log.new_ln(Some(
                    format!("Prerequisite flag evaluation result: '{sv}'.").as_str(),
                ))
                .new_ln(Some(
                    format!("Condition ({cond}) evaluates to {msg}.").as_str(),
                ))
                .dec_indent()
                .new_ln(Some(")"));
            }
            Done(matched)
        }
        Failure(err) => Fatal(err),
    }
}

fn eval_segment_cond(
    cond: &SegmentCondition,
    key: &str,
    user: &User,
    salt: &Option<String>,
    log: &mut EvalLogBuilder,
) -> ConditionResult {
    let segment = if let Some(segment) = cond.segment.as_ref() {
        segment
    } else {
        return Fatal("Segment reference is invalid".to_owned());
    };

    if eval_log_enabled!() {
        log.new_ln(Some("(")).inc_indent().new_ln(Some(
            format!("Evaluating segment '{}':", segment.name).as_str(),
        ));
    }

    let mut result = Done(true);
    let needs_true = cond.segment_comparator == SegmentComparator::IsIn;

    for (index, user_condition) in segment.conditions.iter().enumerate() {
        if eval_log_enabled!() {
            log.new_ln(Some("- "));
            if index == 0 {
                log.append("IF ").inc_indent();
            } else {
                log.inc_indent().new_ln(Some("AND "));
            }
            log.append(format!("{user_condition}").as_str());
        }
        result = eval_user_cond(user_condition, key, user, salt, &segment.name);
        if eval_log_enabled!() {
            let (match_msg, end) = if result.is_match() {
                ("true", "")
            } else {
                ("false", ", skipping the remaining AND conditions")
            };
            log.append(" => ")
                .append(match_msg)
                .append(end)
                .dec_indent();
        }
        if !result.is_match() {
            break;
        }
    }
    if eval_log_enabled!() {
        log.new_ln(Some("Segment evaluation result: "));
        if result.is_ok() {
            let msg = if result.is_match() {
                SegmentComparator::IsIn
            } else {
                SegmentComparator::IsNotIn
            };
            log.append(format!("User {msg}.").as_str());
        } else {
            log.append(format!("{result}.").as_str());
        }
        log.new_ln(Some("Condition ("))
            .append(format!("{cond}").as_str())
            .append(")");
        if result.is_ok() {
            let msg = if result.is_match() == needs_true {
                "true"
            } else {
                "false"
            };
            log.append(format!(" evaluates to {msg}.").as_str());
        } else {
            log.append(" failed to evaluate.");
        }
        log.dec_indent().new_ln(Some(")"));
    }
    match result {
        Done(matched) => Done(matched == needs_true),
        _ => result,
    }
}

fn eval_user_cond(
    cond: &UserCondition,
    key: &str,
    user: &User,
    salt: &Option<String>,
    ctx_salt: &str,
) -> ConditionResult {
    let user_attr = if let Some(user_attr) = user.get(&cond.comp_attr) {
        user_attr
    } else {
        return AttrMissing(cond.comp_attr.clone(), format!("{cond}"));
    };
    let text_attr = || {
        let (user_val, converted) = user_attr.as_text();
        if converted {
            log_conv(cond, key, user_val.as_str());
        }
        user_val
    };
    match cond.comparator {
        Eq | NotEq | EqHashed | NotEqHashed => {
            let comp_val = if let Some(comp_val) = cond.string_val.as_ref() {
                comp_val
            } else {
                return CompValInvalid(None);
            };
            eval_text_eq(comp_val, text_attr(), &cond.comparator, salt, ctx_salt)
        }
        OneOf | NotOneOf | OneOfHashed | NotOneOfHashed => {
            let comp_val = if let Some(comp_val) = cond.string_vec_val.as_ref() {
                comp_val
            } else {
                return CompValInvalid(None);
            };
            eval_one_of(comp_val, text_attr(), &cond.comparator, salt, ctx_salt)
        }
        StartsWithAnyOf
        | StartsWithAnyOfHashed
        | NotStartsWithAnyOf
        | NotStartsWithAnyOfHashed
        | EndsWithAnyOf
        | NotEndsWithAnyOf
        | EndsWithAnyOfHashed
        | NotEndsWithAnyOfHashed => {
            let comp_val = if let Some(comp_val) = cond.string_vec_val.as_ref() {
                comp_val
            } else {
                return CompValInvalid(None);
            };
            eval_starts_ends_with(comp_val, text_attr(), &cond.comparator, salt, ctx_salt)
        }
        Contains | NotContains => {
            let comp_val = if let Some(comp_val) = cond.string_vec_val.as_ref() {
                comp_val
            } else {
                return CompValInvalid(None);
            };
            eval_contains(comp_val, text_attr(), &cond.comparator)
        }
        OneOfSemver | NotOneOfSemver => {
            let comp_val = if let Some(comp_val) = cond.string_vec_val.as_ref() {
                comp_val
            } else {
                return CompValInvalid(None);
            };
            let user_val = if let Some(user_val) = user_attr.as_semver() {
                user_val
            } else {
                return AttrInvalid(
                    format!("'{user_attr}' is not a valid semantic version"),
                    cond.comp_attr.clone(),
                    format!("{cond}"),
                );
            };
            eval_semver_is_one_of(comp_val, user_val, &cond.comparator)
        }
        GreaterSemver | GreaterEqSemver | LessSemver | LessEqSemver => {
            let comp_val = if let Some(comp_val) = cond.string_val.as_ref() {
                comp_val
            } else {
                return CompValInvalid(None);
            };
            let user_val = if let Some(user_val) = user_attr.as_semver() {
                user_val
            } else {
                return AttrInvalid(
                    format!("'{user_attr}' is not a valid semantic version"),
                    cond.comp_attr.clone(),
                    format!("{cond}"),
                );
            };
            eval_semver_compare(comp_val, user_val, &cond.comparator)
        }
        EqNum | NotEqNum | GreaterNum | GreaterEqNum | LessNum | LessEqNum => {
            let comp_val = if let Some(comp_val) = cond.float_val {
                comp_val
            } else {
                return CompValInvalid(None);
            };
            let user_val = if let Some(user_val) = user_attr.as_float() {
                user_val
            } else {
                return AttrInvalid(
                    format!("'{user_attr}' is not a valid decimal number"),
                    cond.comp_attr.clone(),
                    format!("{cond}"),
                );
            };
            eval_number_compare(comp_val, user_val, &cond.comparator)
        }
        BeforeDateTime | AfterDateTime => {
            let comp_val = if let Some(comp_val) = cond.float_val {
                comp_val
            } else {
                return CompValInvalid(None);
            };
            let user_val = if let Some(user_val) = user_attr.as_timestamp() {
                user_val
            } else {
                return AttrInvalid(
                    format!("'{user_attr}' is not a valid Unix timestamp (number of seconds elapsed since Unix epoch)"),
                    cond.comp_attr.clone(),
                    format!("{cond}"),
                );
            };
            eval_date(comp_val, user_val, &cond.comparator)
        }
        ArrayContainsAnyOf
        | ArrayNotContainsAnyOf
        | ArrayContainsAnyOfHashed
        | ArrayNotContainsAnyOfHashed => {
            let comp_val = if let Some(comp_val) = cond.string_vec_val.as_ref() {
                comp_val
            } else {
                return CompValInvalid(None);
            };
            let user_val = if let Some(user_val) = user_attr.as_str_vec() {
                user_val
            } else {
                return AttrInvalid(
                    format!("'{user_attr}' is not a valid string vector"),
                    cond.comp_attr.clone(),
                    format!("{cond}"),
                );
            };
            eval_array_contains(comp_val, &user_val, &cond.comparator, salt, ctx_salt)
        }
    }
}

fn hash_user_val(
    user_val: &str,
    comp: &UserComparator,
    salt: &Option<String>,
    ctx_salt: &str,
) -> Result<String, ConditionResult> {
    if !comp.is_sensitive() {
        return Ok(user_val.to_owned());
    }
    match salt {
        Some(st) => Ok(utils::sha256(user_val, st.as_str(), ctx_salt)),
        None => Err(Fatal(SALT_MISSING_MSG.to_owned())),
    }
}

fn eval_text_eq(
    comp_val: &str,
    user_val: String,
    comp: &UserComparator,
    salt: &Option<String>,
    ctx_salt: &str,
) -> ConditionResult {
    let usr_v = match hash_user_val(user_val.as_str(), comp, salt, ctx_salt) {
        Ok(val) => val,
        Err(fatal) => return fatal,
    };
    Done((comp_val == usr_v) == comp.is_positive())
}

fn eval_one_of(
    comp_val: &[String],
    user_val: String,
    comp: &UserComparator,
    salt: &Option<String>,
    ctx_salt: &str,
) -> ConditionResult {
    let usr_v = match hash_user_val(user_val.as_str(), comp, salt, ctx_salt) {
        Ok(val) => val,
        Err(fatal) => return fatal,
    };
    Done(comp_val.contains(&usr_v) == comp.is_positive())
}

fn eval_starts_ends_with(
    comp_val: &[String],
    user_val: String,
    comp: &UserComparator,
    salt: &Option<String>,
    ctx_salt: &str,
) -> ConditionResult {
    let needs_true = comp.is_positive();
    let user_val_len = user_val.len();
    for item in comp_val.iter() {
        if comp.is_sensitive() {
            let st = if let Some(st) = salt {
                st
            } else {
                return Fatal(SALT_MISSING_MSG.to_owned());
            };
            let (length, hashed) = match item.split_once('_') {
                Some((length, hashed)) if !hashed.is_empty() => (length, hashed),
                _ => return Fatal(COMP_VAL_INVALID_MSG.to_owned()),
            };
            let length = if let Ok(lg) = length.trim().parse::<usize>() {
                lg
            } else {
                return Fatal(COMP_VAL_INVALID_MSG.to_owned());
            };
            if length > user_val_len {
                continue;
            }
            let chunk = if comp.is_starts_with() {
                user_val.get(..length)
            } else {
                user_val.get((user_val_len - length)..)
            };
            if let Some(chunk) = chunk {
                if utils::sha256(chunk, st, ctx_salt) == hashed {
                    return Done(needs_true);
                }
            }
        } else {
            let matched = if comp.is_starts_with() {
                user_val.starts_with(item.as_str())
            } else {
                user_val.ends_with(item.as_str())
            };
            if matched {
                return Done(needs_true);
            }
        }
    }
    Done(!needs_true)
}

fn eval_contains(comp_val: &[String], user_val: String, comp: &UserComparator) -> ConditionResult {
    let needs_true = comp.is_positive();
    for item in comp_val.iter() {
        if user_val.contains(item.as_str()) {
            return Done(needs_true);
        }
    }
    Done(!needs_true)
}

fn eval_semver_is_one_of(
    comp_val: &[String],
    user_val: Version,
    comp: &UserComparator,
) -> ConditionResult {
    let mut matched = false;
    for item in comp_val.iter() {
        let trimmed = item.trim();
        if trimmed.is_empty() {
            continue;
        }
        let comp_ver = if let Ok(ver) = Version::parse(trimmed) {
            ver
        } else {
            // Invalid comparison values make the condition false.
            return Done(false);
        };
        if user_val == comp_ver {
            matched = true;
        }
    }
    Done(matched == comp.is_positive())
}

fn eval_semver_compare(
    comp_val: &str,
    user_val: Version,
    comp: &UserComparator,
) -> ConditionResult {
    let comp_ver = if let Ok(ver) = Version::parse(comp_val.trim()) {
        ver
    } else {
        return Done(false);
    };
    match comp {
        GreaterSemver => Done(user_val > comp_ver),
        GreaterEqSemver => Done(user_val >= comp_ver),
        LessSemver => Done(user_val < comp_ver),
        LessEqSemver => Done(user_val <= comp_ver),
        _ => Fatal("wrong semver comparator".to_owned()),
    }
}

fn eval_number_compare(comp_val: f64, user_val: f64, comp: &UserComparator) -> ConditionResult {
    match comp {
        EqNum => Done(user_val == comp_val),
        NotEqNum => Done(user_val != comp_val),
        GreaterNum => Done(user_val > comp_val),
        GreaterEqNum => Done(user_val >= comp_val),
        LessNum => Done(user_val < comp_val),
        LessEqNum => Done(user_val <= comp_val),
        _ => Fatal("wrong number comparator".to_owned()),
    }
}

fn eval_date(comp_val: f64, user_val: f64, comp: &UserComparator) -> ConditionResult {
    match comp {
        BeforeDateTime => Done(user_val < comp_val),
        _ => Done(user_val > comp_val),
    }
}

fn eval_array_contains(
    comp_val: &[String],
    user_val: &[String],
    comp: &UserComparator,
    salt: &Option<String>,
    ctx_salt: &str,
) -> ConditionResult {
    let needs_true = comp.is_positive();
    for user_item in user_val.iter() {
        let usr_v = match hash_user_val(user_item.as_str(), comp, salt, ctx_salt) {
            Ok(val) => val,
            Err(fatal) => return fatal,
        };
        if comp_val.contains(&usr_v) {
            return Done(needs_true);
        }
    }
    Done(!needs_true)
}

fn log_user_missing(key: &str) {
    warn!(event_id = 3001; "Cannot evaluate targeting rules and % options for setting '{key}' (User Object is missing). You should pass a User Object to the evaluation methods like `get_value()` in order to make targeting work properly.");
}

fn log_conv(cond: &UserCondition, key: &str, attr_val: &str) {
    warn!(event_id = 3005; "Evaluation of condition ({cond}) for setting '{key}' may not produce the expected result (the User.{} attribute is not a string value, thus it was automatically converted to the string value '{attr_val}'). Please make sure that using a non-string value was intended.", cond.comp_attr)
}

#[cfg(test)]
mod evaluator_tests {
    use crate::eval::evaluator::{DefaultEvaluator, RolloutEvaluator};
    use crate::model::config::entry_from_json;
    use crate::utils::sha256;
    use crate::{User, Value};
    use chrono::Utc;

    fn eval(json: &str, key: &str, user: Option<&User>) -> (Option<Value>, Option<String>) {
        let entry = entry_from_json(json, "", Utc::now()).unwrap();
        let settings = &entry.config.settings;
        let outcome = DefaultEvaluator.evaluate(settings.get(key), key, user, settings);
        (outcome.value, outcome.variation_id)
    }

    const RULES_JSON: &str = r#"{"f":{"flag":{"t":1,"v":{"s":"default"},"i":"v-def","r":[
        {"c":[{"u":{"a":"Email","c":2,"l":["@example.com"]}}],"s":{"v":{"s":"example"},"i":"v-ex"}},
        {"c":[{"u":{"a":"Country","c":0,"l":["HU","DE"]}},{"u":{"a":"Age","c":14,"d":18}}],"s":{"v":{"s":"adult"},"i":"v-adult"}}
    ]}}}"#;

    #[test]
    fn default_value_without_user() {
        assert_eq!(
            eval(RULES_JSON, "flag", None),
            (Some(Value::String("default".to_owned())), Some("v-def".to_owned()))
        );
    }

    #[test]
    fn first_matching_rule_wins() {
        let user = User::new("id").email("john@example.com").country("HU");
        assert_eq!(
            eval(RULES_JSON, "flag", Some(&user)).1.as_deref(),
            Some("v-ex")
        );
    }

    #[test]
    fn conditions_are_anded() {
        let adult = User::new("id").country("DE").custom("Age", 30);
        let minor = User::new("id").country("DE").custom("Age", "12");
        assert_eq!(eval(RULES_JSON, "flag", Some(&adult)).1.as_deref(), Some("v-adult"));
        assert_eq!(eval(RULES_JSON, "flag", Some(&minor)).1.as_deref(), Some("v-def"));
    }

    #[test]
    fn missing_setting_is_unresolved() {
        let entry = entry_from_json(RULES_JSON, "", Utc::now()).unwrap();
        let outcome = DefaultEvaluator.evaluate(None, "nope", None, &entry.config.settings);
        assert!(outcome.value.is_none());
        assert!(outcome.variation_id.is_none());
        assert!(outcome.error.is_some());
    }

    #[test]
    fn percentage_options_are_sticky() {
        let json = r#"{"f":{"flag":{"t":0,"v":{"b":false},"p":[
            {"p":50,"v":{"b":true},"i":"on"},{"p":50,"v":{"b":false},"i":"off"}
        ]}}}"#;
        let user = User::new("user-1");
        let first = eval(json, "flag", Some(&user));
        for _ in 0..5 {
            assert_eq!(eval(json, "flag", Some(&user)), first);
        }
        assert!(first.1.is_some());
        assert_eq!(eval(json, "flag", None).1, None);
    }

    #[test]
    fn percentage_bucket_matches_hash() {
        let key = "flag";
        let id = "user-42";
        let hash = crate::utils::sha1(format!("{key}{id}").as_str());
        let scale = u32::from_str_radix(&hash[..7], 16).unwrap() % 100;
        let json = format!(
            r#"{{"f":{{"flag":{{"t":2,"v":{{"i":-1}},"p":[{{"p":{},"v":{{"i":1}}}},{{"p":{},"v":{{"i":2}}}}]}}}}}}"#,
            scale + 1,
            99 - scale
        );
        assert_eq!(
            eval(json.as_str(), key, Some(&User::new(id))).0,
            Some(Value::Int(1))
        );
    }

    #[test]
    fn hashed_comparators_use_salts() {
        let hashed = sha256("a@b.com", "salt", "flag");
        let prefix = format!("2_{}", sha256("a@", "salt", "flag"));
        let json = format!(
            r#"{{"p":{{"s":"salt"}},"f":{{"flag":{{"t":0,"v":{{"b":false}},"r":[
                {{"c":[{{"u":{{"a":"Email","c":20,"s":"{hashed}"}}}}],"s":{{"v":{{"b":true}},"i":"eq"}}}},
                {{"c":[{{"u":{{"a":"Email","c":22,"l":["{prefix}"]}}}}],"s":{{"v":{{"b":true}},"i":"starts"}}}}
            ]}}}}}}"#
        );
        let user = User::new("x").email("a@b.com");
        assert_eq!(eval(json.as_str(), "flag", Some(&user)).1.as_deref(), Some("eq"));
        let user = User::new("x").email("a@c.com");
        assert_eq!(
            eval(json.as_str(), "flag", Some(&user)).1.as_deref(),
            Some("starts")
        );
        let user = User::new("x").email("é");
        assert_eq!(eval(json.as_str(), "flag", Some(&user)).0, Some(Value::Bool(false)));
    }

    #[test]
    fn semver_and_dates() {
        let json = r#"{"f":{"flag":{"t":1,"v":{"s":"old"},"r":[
            {"c":[{"u":{"a":"Version","c":8,"s":"1.2.0"}}],"s":{"v":{"s":"new"}}},
            {"c":[{"u":{"a":"Joined","c":18,"d":1700000000}}],"s":{"v":{"s":"early"}}}
        ]}}}"#;
        let v = |user: User| eval(json, "flag", Some(&user)).0;
        assert_eq!(v(User::new("a").custom("Version", "1.10.0")), Some("new".into()));
        assert_eq!(v(User::new("a").custom("Version", "1.1.9")), Some("old".into()));
        assert_eq!(v(User::new("a").custom("Joined", 1600000000)), Some("early".into()));
    }

    #[test]
    fn prerequisite_flags() {
        let json = r#"{"f":{
            "main":{"t":0,"v":{"b":false},"r":[{"c":[{"p":{"f":"dep","c":0,"v":{"s":"on"}}}],"s":{"v":{"b":true}}}]},
            "dep":{"t":1,"v":{"s":"on"}},
            "a":{"t":0,"v":{"b":false},"r":[{"c":[{"p":{"f":"b","c":0,"v":{"b":true}}}],"s":{"v":{"b":true}}}]},
            "b":{"t":0,"v":{"b":false},"r":[{"c":[{"p":{"f":"a","c":1,"v":{"b":true}}}],"s":{"v":{"b":true}}}]}
        }}"#;
        assert_eq!(eval(json, "main", None).0, Some(Value::Bool(true)));
        assert_eq!(eval(json, "a", None).0, None);
    }

    #[test]
    fn segments() {
        let json = r#"{"p":{"s":"salt"},"s":[{"n":"Outsiders","r":[{"a":"Email","c":33,"l":["@test.com"]}]}],
            "f":{"flag":{"t":0,"v":{"b":false},"r":[{"c":[{"s":{"s":0,"c":1}}],"s":{"v":{"b":true}}}]}}}"#;
        let tester = User::new("a").email("a@test.com");
        let outsider = User::new("a").email("a@else.com");
        assert_eq!(eval(json, "flag", Some(&outsider)).0, Some(Value::Bool(false)));
        assert_eq!(eval(json, "flag", Some(&tester)).0, Some(Value::Bool(true)));
    }
}
