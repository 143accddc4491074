pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const SDK_KEY_PROXY_PREFIX: &str = "configcat-proxy/";
pub const CONFIG_FILE_NAME: &str = "config_v6.json";
pub const SERIALIZATION_FORMAT_VERSION: &str = "v2";

pub const GLOBAL_CDN_URL: &str = "https://cdn-global.configcat.com";
pub const EU_CDN_URL: &str = "https://cdn-eu.configcat.com";
