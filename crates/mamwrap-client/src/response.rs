//! Response unwrapping shared by every platform call.
//!
//! The platform reports failures in three ways: a non-success HTTP status, a
//! top-level `error` key in an otherwise successful body, or a body that is
//! missing the key the caller asked for. All three are turned into a
//! `MamError` here so call sites only handle the happy path.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use mamwrap_contracts::error::{MamError, MamResult};

/// Check `body` and walk `path` into it.
///
/// Order of checks:
/// 1. body is not JSON → `Http` for a non-success status, else `MalformedResponse`
/// 2. top-level non-null `error` key → `Api`
/// 3. non-success status → `Http`
/// 4. any segment of `path` missing → `MalformedResponse`
///
/// An empty `path` returns the whole body.
pub fn unwrap_response(status: u16, body: &str, path: &[&str]) -> MamResult<Value> {
    let success = (200..300).contains(&status);

    let parsed: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(e) if success => {
            return Err(MamError::MalformedResponse {
                reason: format!("body is not JSON: {}", e),
                body: body.to_string(),
            });
        }
        Err(_) => {
            return Err(MamError::Http { status, message: body.to_string() });
        }
    };

    if let Some(error) = parsed.get("error").filter(|error| !error.is_null()) {
        debug!(status, error = %error, "platform reported an error");
        return Err(MamError::Api { message: error_message(error) });
    }

    if !success {
        return Err(MamError::Http { status, message: body.to_string() });
    }

    let mut current = &parsed;
    for (depth, key) in path.iter().enumerate() {
        current = current.get(key).ok_or_else(|| MamError::MalformedResponse {
            reason: format!("missing key '{}'", path[..=depth].join(".")),
            body: body.to_string(),
        })?;
    }
    Ok(current.clone())
}

/// Like `unwrap_response`, then deserialize the selected value into `T`.
pub fn unwrap_as<T: DeserializeOwned>(status: u16, body: &str, path: &[&str]) -> MamResult<T> {
    let value = unwrap_response(status, body, path)?;
    serde_json::from_value(value).map_err(|e| MamError::MalformedResponse {
        reason: format!("unexpected shape at '{}': {}", path.join("."), e),
        body: body.to_string(),
    })
}

/// Ids arrive as numbers or strings depending on the endpoint.
pub(crate) fn value_to_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn error_message(error: &Value) -> String {
    match error {
        Value::String(message) => message.clone(),
        Value::Object(fields) => fields
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string()),
        other => other.to_string(),
    }
}
