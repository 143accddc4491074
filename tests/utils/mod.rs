#![allow(dead_code)]

use chrono::{DateTime, Utc};
use configcat_core::ConfigCache;
use log::kv::Key;
use log::{set_max_level, Level, Log, Metadata, Record};
use rand::distr::{Alphanumeric, SampleString};
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Mutex;

pub const COMPLEX_JSON: &str = r#"{"f":{
    "disabledFeature":{"t":0,"v":{"b":false},"i":"v-disabled-off","r":[
        {"c":[{"u":{"a":"Identifier","c":28,"s":"id1"}}],"s":{"v":{"b":true},"i":"v-disabled-on"}}
    ]},
    "enabledFeature":{"t":0,"v":{"b":true},"i":"v-enabled"},
    "stringSetting":{"t":1,"v":{"s":"test"},"i":"v-string"},
    "intSetting":{"t":2,"v":{"i":5},"i":"v-int"},
    "doubleSetting":{"t":3,"v":{"d":1.2},"i":"v-double"}
}}"#;

pub fn produce_mock_path() -> (String, String) {
    let sdk_key = rand_sdk_key();
    (sdk_key.clone(), format!("/configuration-files/{sdk_key}/config_v6.json"))
}

pub fn rand_sdk_key() -> String {
    format!("{}/{}", rand_str(22), rand_str(22))
}

pub fn construct_bool_json_payload(key: &str, val: bool) -> String {
    format!(r#"{{"f": {{"{key}":{{"t":0,"v":{{"b": {val}}}}}}}, "s": []}}"#)
}

pub fn construct_cache_payload(json: &str, time: DateTime<Utc>, etag: &str) -> String {
    format!("{}\n{etag}\n{json}", time.timestamp_millis())
}

fn rand_str(len: usize) -> String {
    Alphanumeric.sample_string(&mut rand::rng(), len)
}

/// Keeps every written value in memory, regardless of the key.
#[derive(Default)]
pub struct InMemoryCache {
    pub entries: Mutex<HashMap<String, String>>,
    preloaded: Option<String>,
}

impl InMemoryCache {
    pub fn preloaded(value: String) -> Self {
        Self {
            entries: Mutex::default(),
            preloaded: Some(value),
        }
    }
}

impl ConfigCache for InMemoryCache {
    fn read(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .or_else(|| self.preloaded.clone())
    }

    fn write(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_owned(), value.to_owned());
    }
}

pub struct RecordingLogger {}

impl RecordingLogger {
    thread_local!(pub static LOGS: RefCell<String> = RefCell::new(String::default()));
}

impl Log for RecordingLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level() && metadata.target().contains("configcat")
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let level = match record.level() {
            Level::Error => "ERROR",
            Level::Warn => "WARNING",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
        };
        let event_id = record
            .key_values()
            .get(Key::from("event_id"))
            .and_then(|id| id.to_i64())
            .unwrap_or_default();
        Self::LOGS.with_borrow_mut(|l| {
            l.push_str(format!("{level} [{event_id}] {}\n", record.args()).as_str())
        });
    }

    fn flush(&self) {}
}

pub fn log_record_init() {
    set_max_level(log::LevelFilter::Info);
    _ = log::set_logger(&RecordingLogger {});
    RecordingLogger::LOGS.take();
}
