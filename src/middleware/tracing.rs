use std::time::Duration;

use tracing::{debug, info};

use super::Middleware;
use crate::dispatcher::{HandlerRequest, HandlerResponse};

/// Emits one event on dispatch and one on completion with status and latency.
pub struct TracingMiddleware;

impl Middleware for TracingMiddleware {
    fn before(&self, req: &HandlerRequest) -> Option<HandlerResponse> {
        debug!(
            request_id = %req.request_id,
            method = %req.method,
            path = %req.path,
            handler = %req.handler_name,
            "Dispatching request"
        );
        None
    }

    fn after(
        &self,
        method: &http::Method,
        path: &str,
        res: &HandlerResponse,
        latency: Duration,
    ) {
        info!(
            method = %method,
            path,
            status = res.status,
            latency_us = latency.as_micros() as u64,
            "Request completed"
        );
    }
}
