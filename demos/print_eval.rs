use configcat_core::*;
use log::kv::Key;
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::time::Duration;

#[tokio::main]
async fn main() {
    // Info level logging shows the feature flag evaluation process.
    // Use the Warn level to avoid too detailed logging in your application.
    log::set_max_level(LevelFilter::Info);
    _ = log::set_logger(&PrintLog {});

    let client = Client::builder("PKDVCLf-Hq-h-kCzMp-L7Q/HhOWfwVtZ0mb30i9wi17GQ")
        .polling_mode(PollingMode::auto_poll(Duration::from_secs(5)))
        .build()
        .unwrap();

    let is_awesome_enabled = client
        .get_value("isAwesomeFeatureEnabled", None, false)
        .await;

    println!("isAwesomeFeatureEnabled: {is_awesome_enabled}");

    let user = User::new("#SOME-USER-ID#").email("configcat@example.com");

    let is_poc_enabled = client
        .get_value("isPOCFeatureEnabled", Some(user.clone()), false)
        .await;

    println!("isPOCFeatureEnabled: {is_poc_enabled}");

    let variation_ids = client.get_all_variation_ids(Some(user)).await;
    for id in variation_ids {
        if let Some((key, value)) = client.get_key_and_value(id.as_str()).await {
            println!("{id}: {key} = {value}");
        }
    }
}

pub struct PrintLog {}

impl Log for PrintLog {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level() && metadata.target().contains("configcat")
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let level = match record.level() {
            Level::Error => "ERROR",
            Level::Warn => "WARN",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
        };
        match record.key_values().get(Key::from("event_id")) {
            Some(event_id) => println!("{level} [{event_id}] {}", record.args()),
            None => println!("{level} {}", record.args()),
        }
    }

    fn flush(&self) {}
}
