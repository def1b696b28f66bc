//! Dispatcher core. Routes a matched request to the worker pool registered
//! for its handler, waits for the reply with a hard per-request deadline,
//! and maps every failure mode to a definite HTTP outcome. The response
//! for a timed-out or failed request is always a complete JSON document;
//! partial bodies never leave the dispatcher.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use may::sync::mpsc::{Receiver, Sender};
use std::sync::mpsc::TryRecvError;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::config::WorkerPoolConfig;
use crate::error::ServiceError;
use crate::health::HealthState;
use crate::ids::RequestId;
use crate::middleware::Middleware;
use crate::router::{ParamVec, RouteMatch};
use crate::worker_pool::{PoolError, WorkerPool};

/// Inline capacity for header storage on the hot path.
pub const MAX_INLINE_HEADERS: usize = 16;

/// Header storage that avoids heap allocation for typical requests.
pub type HeaderVec = smallvec::SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// Everything a handler needs to produce a response, plus the reply channel.
#[derive(Debug)]
pub struct HandlerRequest {
    pub request_id: RequestId,
    pub method: http::Method,
    pub path: String,
    pub handler_name: Arc<str>,
    pub path_params: ParamVec,
    pub query_params: ParamVec,
    pub headers: HeaderVec,
    pub body: Option<Value>,
    pub reply_tx: Sender<HandlerResponse>,
}

impl HandlerRequest {
    #[must_use]
    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Path parameters as an order-preserving JSON object.
    #[must_use]
    pub fn path_params_json(&self) -> Value {
        let mut map = serde_json::Map::new();
        for (k, v) in &self.path_params {
            map.insert(k.to_string(), Value::String(v.clone()));
        }
        Value::Object(map)
    }
}

/// What a handler sends back over the reply channel.
#[derive(Debug, Clone)]
pub struct HandlerResponse {
    pub status: u16,
    pub body: Value,
}

impl HandlerResponse {
    #[must_use]
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    #[must_use]
    pub fn from_error(err: &ServiceError) -> Self {
        Self {
            status: err.status(),
            body: err.body(),
        }
    }
}

/// How often the reply poll loop wakes while waiting on a handler.
const REPLY_POLL_INTERVAL: Duration = Duration::from_micros(500);

/// Owns the handler registry and the per-handler worker pools.
pub struct Dispatcher {
    pools: HashMap<Arc<str>, Arc<WorkerPool>>,
    middlewares: Vec<Arc<dyn Middleware>>,
    request_timeout: Duration,
    health: HealthState,
}

impl Dispatcher {
    #[must_use]
    pub fn new(request_timeout: Duration, health: HealthState) -> Self {
        Self {
            pools: HashMap::new(),
            middlewares: Vec::new(),
            request_timeout,
            health,
        }
    }

    pub fn add_middleware(&mut self, mw: Arc<dyn Middleware>) {
        self.middlewares.push(mw);
    }

    /// Register a handler function under a name, spawning its worker pool.
    ///
    /// # Safety
    ///
    /// Spawns `may` coroutines; the May runtime must be configured first.
    pub unsafe fn register_handler<F>(
        &mut self,
        handler_name: Arc<str>,
        pool_config: WorkerPoolConfig,
        handler_fn: F,
    ) where
        F: Fn(HandlerRequest) + Send + 'static + Clone,
    {
        let pool = WorkerPool::new(Arc::clone(&handler_name), pool_config, handler_fn);
        self.pools.insert(handler_name, Arc::new(pool));
    }

    #[must_use]
    pub fn has_handler(&self, name: &str) -> bool {
        self.pools.contains_key(name)
    }

    #[must_use]
    pub fn pool(&self, name: &str) -> Option<&Arc<WorkerPool>> {
        self.pools.get(name)
    }

    #[must_use]
    pub fn handler_names(&self) -> Vec<Arc<str>> {
        self.pools.keys().cloned().collect()
    }

    /// Dispatch a matched request and wait for its response.
    ///
    /// Always returns a complete response: handler output on success, or a
    /// JSON error document for timeouts, shed requests, and worker faults.
    pub fn dispatch(
        &self,
        route_match: &RouteMatch,
        method: http::Method,
        path: String,
        query_params: ParamVec,
        headers: HeaderVec,
        body: Option<Value>,
    ) -> HandlerResponse {
        let request_id = RequestId::new();
        let start = Instant::now();

        let Some(pool) = self.pools.get(&route_match.handler_name) else {
            // Routable but unregistered handler is a server wiring fault.
            error!(
                request_id = %request_id,
                handler_name = %route_match.handler_name,
                "No worker pool registered for handler"
            );
            return HandlerResponse::from_error(&ServiceError::InternalFault);
        };

        let (reply_tx, reply_rx) = mpsc::channel::<HandlerResponse>();
        let req = HandlerRequest {
            request_id,
            method: method.clone(),
            path: path.clone(),
            handler_name: Arc::clone(&route_match.handler_name),
            path_params: route_match.path_params.clone(),
            query_params,
            headers,
            body,
            reply_tx,
        };

        for mw in &self.middlewares {
            if let Some(early) = mw.before(&req) {
                debug!(
                    request_id = %request_id,
                    handler_name = %route_match.handler_name,
                    "Middleware produced early response"
                );
                return early;
            }
        }

        if let Err(e) = pool.dispatch(req) {
            let err = match e {
                PoolError::QueueFull => ServiceError::ServiceUnavailable {
                    handler: route_match.handler_name.to_string(),
                },
                PoolError::Disconnected => {
                    self.health.set_fault();
                    ServiceError::InternalFault
                }
            };
            let resp = HandlerResponse::from_error(&err);
            self.run_after(&method, &path, &resp, start.elapsed());
            return resp;
        }

        let resp = self.await_reply(&reply_rx, request_id, &route_match.handler_name);
        self.run_after(&method, &path, &resp, start.elapsed());
        resp
    }

    /// Poll the reply channel until a response arrives or the deadline
    /// passes. `may`'s mpsc has no `recv_timeout`, so this loop alternates
    /// `try_recv` with short coroutine sleeps; the poll interval bounds the
    /// added latency at well under a millisecond.
    fn await_reply(
        &self,
        reply_rx: &Receiver<HandlerResponse>,
        request_id: RequestId,
        handler_name: &str,
    ) -> HandlerResponse {
        let deadline = Instant::now() + self.request_timeout;
        loop {
            match reply_rx.try_recv() {
                Ok(resp) => return resp,
                Err(TryRecvError::Empty) => {
                    if Instant::now() >= deadline {
                        let timeout_ms = self.request_timeout.as_millis() as u64;
                        warn!(
                            request_id = %request_id,
                            handler_name,
                            timeout_ms,
                            "Handler deadline exceeded"
                        );
                        return HandlerResponse::from_error(&ServiceError::HandlerTimeout {
                            handler: handler_name.to_string(),
                            timeout_ms,
                        });
                    }
                    may::coroutine::sleep(REPLY_POLL_INTERVAL);
                }
                Err(TryRecvError::Disconnected) => {
                    // The handler finished without replying. A per-request
                    // bug, not a pool fault; the health latch stays clear.
                    error!(
                        request_id = %request_id,
                        handler_name,
                        "Handler dropped its reply channel without responding"
                    );
                    return HandlerResponse::from_error(&ServiceError::InternalFault);
                }
            }
        }
    }

    fn run_after(
        &self,
        method: &http::Method,
        path: &str,
        resp: &HandlerResponse,
        latency: Duration,
    ) {
        for mw in &self.middlewares {
            mw.after(method, path, resp, latency);
        }
    }

    #[must_use]
    pub fn health(&self) -> &HealthState {
        &self.health
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_route_match(handler: &str) -> RouteMatch {
        let meta = crate::route::RouteMeta::new(
            http::Method::POST,
            "/test/{param_a}/subcommand/{param_b}",
            handler,
        )
        .expect("valid template");
        let mut params = ParamVec::new();
        params.push((Arc::from("param_a"), "1".to_string()));
        params.push((Arc::from("param_b"), "2".to_string()));
        RouteMatch {
            handler_name: Arc::from(handler),
            route: Arc::new(meta),
            path_params: params,
        }
    }

    #[test]
    fn test_unregistered_handler_is_internal_fault() {
        let dispatcher = Dispatcher::new(Duration::from_millis(100), HealthState::new());
        let rm = test_route_match("missing");
        let resp = dispatcher.dispatch(
            &rm,
            http::Method::POST,
            "/test/1/subcommand/2".to_string(),
            ParamVec::new(),
            HeaderVec::new(),
            None,
        );
        assert_eq!(resp.status, 500);
        assert_eq!(resp.body["error"], "Internal Server Error");
    }

    #[test]
    fn test_dispatch_round_trip() {
        may::config().set_stack_size(0x8000);
        let mut dispatcher = Dispatcher::new(Duration::from_secs(1), HealthState::new());
        unsafe {
            dispatcher.register_handler(
                Arc::from("echo"),
                WorkerPoolConfig::default(),
                |req: HandlerRequest| {
                    let body = serde_json::json!({ "path": req.path_params_json() });
                    let _ = req.reply_tx.send(HandlerResponse::ok(body));
                },
            );
        }
        assert!(dispatcher.has_handler("echo"));
        assert!(!dispatcher.has_handler("missing"));
        assert_eq!(dispatcher.handler_names().len(), 1);
        let rm = test_route_match("echo");
        let resp = dispatcher.dispatch(
            &rm,
            http::Method::POST,
            "/test/1/subcommand/2".to_string(),
            ParamVec::new(),
            HeaderVec::new(),
            None,
        );
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body["path"]["param_a"], "1");
        assert_eq!(resp.body["path"]["param_b"], "2");
    }

    #[test]
    fn test_handler_timeout_yields_504() {
        may::config().set_stack_size(0x8000);
        let mut dispatcher = Dispatcher::new(Duration::from_millis(50), HealthState::new());
        unsafe {
            dispatcher.register_handler(
                Arc::from("slow"),
                WorkerPoolConfig::default(),
                |req: HandlerRequest| {
                    may::coroutine::sleep(Duration::from_secs(2));
                    let _ = req.reply_tx.send(HandlerResponse::ok(Value::Null));
                },
            );
        }
        let rm = test_route_match("slow");
        let resp = dispatcher.dispatch(
            &rm,
            http::Method::POST,
            "/test/1/subcommand/2".to_string(),
            ParamVec::new(),
            HeaderVec::new(),
            None,
        );
        assert_eq!(resp.status, 504);
        assert_eq!(resp.body["error"], "Handler Timeout");
    }

    #[test]
    fn test_handler_panic_yields_500() {
        may::config().set_stack_size(0x8000);
        let mut dispatcher = Dispatcher::new(Duration::from_secs(1), HealthState::new());
        unsafe {
            dispatcher.register_handler(
                Arc::from("boom"),
                WorkerPoolConfig::default(),
                |_req: HandlerRequest| panic!("handler blew up"),
            );
        }
        let rm = test_route_match("boom");
        let resp = dispatcher.dispatch(
            &rm,
            http::Method::POST,
            "/test/1/subcommand/2".to_string(),
            ParamVec::new(),
            HeaderVec::new(),
            None,
        );
        assert_eq!(resp.status, 500);
    }
}
