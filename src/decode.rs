//! Request body decoding.
//!
//! Bodies decode into `serde_json::Value` with the `preserve_order` feature
//! enabled, so object key order and integer/float representation survive the
//! decode -> echo -> encode round trip untouched. Depth is bounded by
//! configuration; the check runs iteratively after parsing so a hostile body
//! cannot exhaust the coroutine stack here.

use serde_json::Value;
use tracing::debug;

use crate::config::RequestLimits;
use crate::error::ServiceError;

/// Decode a request body according to the configured limits.
///
/// Returns `Ok(None)` for an absent or empty body, which is a valid
/// distinguished state; routes that require a body reject it downstream.
/// `content_type` is advisory: bodies are parsed as JSON regardless, the
/// declared type only shows up in logs and error reasons.
pub fn decode_body(
    raw: &[u8],
    content_type: Option<&str>,
    limits: &RequestLimits,
) -> Result<Option<Value>, ServiceError> {
    if raw.is_empty() {
        return Ok(None);
    }
    if raw.len() > limits.max_body_bytes {
        return Err(ServiceError::BodyTooLarge {
            size: raw.len(),
            max_bytes: limits.max_body_bytes,
        });
    }

    let value: Value = serde_json::from_slice(raw).map_err(|e| {
        debug!(
            content_type = content_type.unwrap_or("<none>"),
            error = %e,
            "JSON body parse failed"
        );
        ServiceError::MalformedBody {
            reason: e.to_string(),
        }
    })?;

    let depth = value_depth(&value);
    if depth > limits.max_body_depth {
        return Err(ServiceError::DepthExceeded {
            depth,
            max_depth: limits.max_body_depth,
        });
    }

    Ok(Some(value))
}

/// Nesting depth of a JSON value. Scalars are depth 1; each enclosing array
/// or object adds one. Iterative on an explicit stack.
#[must_use]
pub fn value_depth(value: &Value) -> usize {
    let mut max_depth = 1;
    let mut stack: Vec<(&Value, usize)> = vec![(value, 1)];
    while let Some((v, depth)) = stack.pop() {
        max_depth = max_depth.max(depth);
        match v {
            Value::Array(items) => {
                for item in items {
                    stack.push((item, depth + 1));
                }
            }
            Value::Object(map) => {
                for item in map.values() {
                    stack.push((item, depth + 1));
                }
            }
            _ => {}
        }
    }
    max_depth
}
