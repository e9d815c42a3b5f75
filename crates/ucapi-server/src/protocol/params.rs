//! Extraction of `msg_data` fields.

use serde_json::Value;

use crate::errors::RequestError;

/// Extract a required field.
pub fn require_param<'a>(msg_data: Option<&'a Value>, key: &str) -> Result<&'a Value, RequestError> {
    msg_data
        .and_then(|data| data.get(key))
        .filter(|value| !value.is_null())
        .ok_or_else(|| RequestError::bad_request(format!("missing required field: {key}")))
}

pub fn require_string_param(msg_data: Option<&Value>, key: &str) -> Result<String, RequestError> {
    require_param(msg_data, key)?
        .as_str()
        .map(ToOwned::to_owned)
        .ok_or_else(|| RequestError::bad_request(format!("field '{key}' must be a string")))
}

/// Extract a required array of strings.
pub fn require_string_list(msg_data: Option<&Value>, key: &str) -> Result<Vec<String>, RequestError> {
    let items = require_param(msg_data, key)?
        .as_array()
        .ok_or_else(|| RequestError::bad_request(format!("field '{key}' must be an array")))?;
    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(ToOwned::to_owned)
                .ok_or_else(|| RequestError::bad_request(format!("field '{key}' must contain strings")))
        })
        .collect()
}
