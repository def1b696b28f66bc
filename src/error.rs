use serde_json::json;
use thiserror::Error;

/// Failure taxonomy for the request pipeline.
///
/// Every variant maps to exactly one HTTP status and a structured JSON body,
/// so the load generator's status-code assertions stay meaningful on every
/// failure path. Internal detail never reaches the client; it is logged at
/// the point of failure instead.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    #[error("no route matches {method} {path}")]
    NotFound { method: String, path: String },

    #[error("method {method} not allowed for {path}")]
    MethodNotAllowed {
        method: String,
        path: String,
        /// Methods registered for this path, in registration order.
        allow: Vec<String>,
    },

    #[error("malformed request body: {reason}")]
    MalformedBody { reason: String },

    #[error("request body nesting depth {depth} exceeds limit {max_depth}")]
    DepthExceeded { depth: usize, max_depth: usize },

    #[error("request body of {size} bytes exceeds limit {max_bytes}")]
    BodyTooLarge { size: usize, max_bytes: usize },

    #[error("request path of {len} bytes exceeds limit {max_bytes}")]
    PathTooLong { len: usize, max_bytes: usize },

    #[error("handler {handler} did not reply within {timeout_ms}ms")]
    HandlerTimeout { handler: String, timeout_ms: u64 },

    #[error("handler {handler} queue is full")]
    ServiceUnavailable { handler: String },

    #[error("internal fault")]
    InternalFault,
}

impl ServiceError {
    /// HTTP status code for this failure.
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            ServiceError::NotFound { .. } => 404,
            ServiceError::MethodNotAllowed { .. } => 405,
            ServiceError::MalformedBody { .. } => 400,
            ServiceError::DepthExceeded { .. } => 400,
            ServiceError::BodyTooLarge { .. } => 413,
            ServiceError::PathTooLong { .. } => 414,
            ServiceError::HandlerTimeout { .. } => 504,
            ServiceError::ServiceUnavailable { .. } => 503,
            ServiceError::InternalFault => 500,
        }
    }

    /// Client-visible JSON body. `InternalFault` stays generic; everything
    /// else carries enough context for a client to debug its request.
    #[must_use]
    pub fn body(&self) -> serde_json::Value {
        match self {
            ServiceError::NotFound { method, path } => {
                json!({ "error": "Not Found", "method": method, "path": path })
            }
            ServiceError::MethodNotAllowed {
                method,
                path,
                allow,
            } => json!({
                "error": "Method Not Allowed",
                "method": method,
                "path": path,
                "allow": allow,
            }),
            ServiceError::MalformedBody { reason } => {
                json!({ "error": "Malformed Body", "reason": reason })
            }
            ServiceError::DepthExceeded { depth, max_depth } => json!({
                "error": "Depth Exceeded",
                "depth": depth,
                "max_depth": max_depth,
            }),
            ServiceError::BodyTooLarge { size, max_bytes } => json!({
                "error": "Body Too Large",
                "size": size,
                "max_bytes": max_bytes,
            }),
            ServiceError::PathTooLong { len, max_bytes } => json!({
                "error": "Path Too Long",
                "length": len,
                "max_bytes": max_bytes,
            }),
            ServiceError::HandlerTimeout {
                handler,
                timeout_ms,
            } => json!({
                "error": "Handler Timeout",
                "handler": handler,
                "timeout_ms": timeout_ms,
            }),
            ServiceError::ServiceUnavailable { handler } => {
                json!({ "error": "Service Unavailable", "handler": handler })
            }
            ServiceError::InternalFault => json!({ "error": "Internal Server Error" }),
        }
    }
}
