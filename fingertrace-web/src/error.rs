//! Error types for the fallible boundaries: config parsing and persistence.
//!
//! Per-frame algorithms never fail; they degrade to safe defaults instead.

use thiserror::Error;
use wasm_bindgen::JsValue;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config value `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to serialize progress record: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl From<ConfigError> for JsValue {
    fn from(err: ConfigError) -> Self {
        JsValue::from_str(&err.to_string())
    }
}

impl From<StoreError> for JsValue {
    fn from(err: StoreError) -> Self {
        JsValue::from_str(&err.to_string())
    }
}
