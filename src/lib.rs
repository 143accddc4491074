//! ConfigCat SDK core for Rust: refresh policies and feature flag evaluation.
//!
//! The [`Client`] keeps the config JSON up to date according to its [`PollingMode`]
//! and reads feature flag values through a [`ConfigParser`]. The parser can also be used
//! on its own, on any settings map.
//!
//! # Examples
//!
//! ```rust
//! use std::collections::HashMap;
//! use configcat_core::{ConfigParser, Setting, User, Value};
//!
//! let settings = HashMap::from([
//!     ("text".to_owned(), Setting::from(Value::String("hello".to_owned()))),
//! ]);
//! let parser = ConfigParser::default();
//! let user = User::new("user-id");
//!
//! let value: String = parser.get_value("text", &settings, Some(&user)).unwrap();
//! assert_eq!(value, "hello");
//! assert!(parser.get_value::<bool>("text", &settings, None).is_err());
//! ```

#![warn(missing_docs)]

#[macro_use]
mod macros;
mod builder;
mod cache;
mod client;
mod constants;
mod errors;
mod eval;
mod fetch;
mod model;
mod modes;
mod parser;
mod policy;
mod user;
mod utils;
mod value;

pub use cache::{ConfigCache, EmptyConfigCache};
pub use client::Client;
pub use constants::PKG_VERSION;
pub use errors::{ClientError, ErrorKind, ParserError};
pub use eval::evaluator::{DefaultEvaluator, EvaluationOutcome, RolloutEvaluator};
pub use parser::ConfigParser;

pub use model::config::{
    Condition, Config, PercentageOption, PrerequisiteFlagCondition, Segment, SegmentCondition,
    ServedValue, Setting, SettingValue, TargetingRule, UserCondition,
};

pub use model::enums::{
    ClientCacheState, DataGovernance, PrerequisiteFlagComparator, SegmentComparator, SettingType,
    UserComparator,
};

pub use builder::ClientBuilder;
pub use modes::{OnConfigChanged, PollingMode};

pub use user::{User, UserValue};
pub use value::{RequestedType, Value, ValueKind, ValuePrimitive};
