use std::time::Duration;

use crate::dispatcher::{HandlerRequest, HandlerResponse};

/// Hooks around handler dispatch. `before` may short-circuit with an early
/// response; `after` observes the outcome. The request itself is consumed by
/// the worker pool, so `after` sees only the routing identity and the result.
pub trait Middleware: Send + Sync {
    fn before(&self, _req: &HandlerRequest) -> Option<HandlerResponse> {
        None
    }
    fn after(
        &self,
        _method: &http::Method,
        _path: &str,
        _res: &HandlerResponse,
        _latency: Duration,
    ) {
    }
}
