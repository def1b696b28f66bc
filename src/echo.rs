//! The echo handler behind `POST /test/{param_a}/subcommand/{param_b}`.
//!
//! Replies with the decoded request body under `request` and the extracted
//! path parameters under `path`. Because decoded bodies keep their key order
//! and numeric representation, the `request` field re-serializes to exactly
//! the bytes the client sent (modulo whitespace), which is what makes the
//! load generator's response assertions deterministic.

use serde_json::json;

use crate::dispatcher::{HandlerRequest, HandlerResponse};
use crate::error::ServiceError;

pub fn echo_handler(req: HandlerRequest) {
    let response = match req.body {
        Some(ref body) => HandlerResponse::ok(json!({
            "request": body,
            "path": req.path_params_json(),
        })),
        None => {
            // This route requires a body; an empty one is a client error.
            let err = ServiceError::MalformedBody {
                reason: "request body is required".to_string(),
            };
            HandlerResponse::from_error(&err)
        }
    };
    let _ = req.reply_tx.send(response);
}

/// Handler behind `GET /health` when routed through dispatch. The connection
/// layer normally short-circuits health checks before routing; this exists so
/// the route table stays complete.
pub fn health_handler(req: HandlerRequest) {
    let _ = req
        .reply_tx
        .send(HandlerResponse::ok(json!({ "status": "ok" })));
}
