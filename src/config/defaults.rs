//! Default configuration layer
//!
//! The loader merges files as YAML trees, so the defaults are provided as a
//! tree too. Every later layer only needs to mention the keys it changes.

use super::schema::Config;

/// Get the default configuration
pub fn default_config() -> Config {
    Config::default()
}

/// Default configuration as the bottom YAML layer
pub fn default_layer() -> serde_yaml::Value {
    serde_yaml::to_value(default_config()).unwrap_or(serde_yaml::Value::Null)
}
