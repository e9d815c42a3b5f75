//! Log redaction of outbound messages.
//!
//! Media players may report cover art as an inline `data:` URI of several
//! hundred kilobytes. Those values are shortened to `data:***` in log output;
//! the payload sent over the wire is never modified.

use serde_json::Value;

const MEDIA_IMAGE_URL: &str = "media_image_url";
const DATA_URI_PREFIX: &str = "data:";
const REDACTED: &str = "data:***";

/// Copy of `message` safe for logging.
///
/// Looks at `msg_data` of the envelope: an object with `attributes`, or an
/// array of such objects (as in `entity_states`).
pub fn redact_for_log(message: &Value) -> Value {
    let mut copy = message.clone();
    if let Some(msg_data) = copy.get_mut("msg_data") {
        if let Some(items) = msg_data.as_array_mut() {
            items.iter_mut().for_each(redact_attributes);
        } else {
            redact_attributes(msg_data);
        }
    }
    copy
}

fn redact_attributes(item: &mut Value) {
    let Some(url) = item
        .get_mut("attributes")
        .and_then(|attrs| attrs.get_mut(MEDIA_IMAGE_URL))
    else {
        return;
    };
    if url.as_str().is_some_and(|s| s.starts_with(DATA_URI_PREFIX)) {
        *url = Value::String(REDACTED.to_owned());
    }
}
