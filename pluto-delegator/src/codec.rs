//! Value encoding for arguments, variable values and results.
//!
//! Every value crosses the wire as compact JSON text. Decoding accepts any
//! JSON document, including bare scalars such as `42`, `"text"` or `null`.

use crate::error::{ErrorCode, RemoteError};
use pluto_core::Value;

/// Encode a value as compact JSON text.
pub fn encode_value(value: &Value) -> String {
    value.to_string()
}

/// Decode JSON text into a value.
pub fn decode_value(text: &str) -> Result<Value, serde_json::Error> {
    serde_json::from_str(text)
}

/// Decode a request field, reporting failures as `invalid_encoding`.
pub(crate) fn decode_field(field: &str, text: &str) -> Result<Value, RemoteError> {
    decode_value(text).map_err(|err| {
        RemoteError::new(
            ErrorCode::InvalidEncoding,
            format!("{field} is not valid JSON: {err}"),
        )
    })
}
