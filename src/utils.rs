//! Utility functions for the transaction assistant

use serde::de::DeserializeOwned;
use serde_json::{from_value, Value};

use crate::mcp::protocol::{error_codes, Response};

/// Helper function to extract a required argument from a JSON object
pub fn get_required_arg<T: DeserializeOwned>(
    args: &Value,
    key: &str,
    req_id: &Value,
) -> Result<T, Response> {
    from_value(args.get(key).cloned().unwrap_or(Value::Null)).map_err(|_| {
        Response::error(
            req_id.clone(),
            error_codes::INVALID_PARAMS,
            format!("Missing or invalid required argument: '{}'", key),
        )
    })
}

/// Like [`get_required_arg`], but an absent or `null` argument yields `None`.
pub fn get_optional_arg<T: DeserializeOwned>(
    args: &Value,
    key: &str,
    req_id: &Value,
) -> Result<Option<T>, Response> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(_) => get_required_arg(args, key, req_id).map(Some),
    }
}

/// Seconds since the UNIX epoch.
pub fn current_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}
