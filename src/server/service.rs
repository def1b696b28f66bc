use std::io;
use std::sync::Arc;

use may_minihttp::{HttpService, Request, Response};
use serde_json::json;
use tracing::warn;

use super::request::{parse_request, ParsedRequest};
use super::response::{
    write_handler_response, write_json_error, write_method_not_allowed, write_text_response,
};
use crate::config::RequestLimits;
use crate::decode::decode_body;
use crate::dispatcher::Dispatcher;
use crate::error::ServiceError;
use crate::health::HealthState;
use crate::middleware::MetricsMiddleware;
use crate::router::Router;

/// The per-connection request pipeline: parse, health/metrics fast paths,
/// route, decode, dispatch, encode.
///
/// Routing tables and handler pools are fixed at startup, so the service
/// holds plain `Arc`s and cloning it per connection is two pointer bumps.
pub struct AppService {
    pub router: Arc<Router>,
    pub dispatcher: Arc<Dispatcher>,
    pub metrics: Option<Arc<MetricsMiddleware>>,
    pub health: HealthState,
    pub limits: RequestLimits,
}

impl Clone for AppService {
    fn clone(&self) -> Self {
        Self {
            router: Arc::clone(&self.router),
            dispatcher: Arc::clone(&self.dispatcher),
            metrics: self.metrics.clone(),
            health: self.health.clone(),
            limits: self.limits,
        }
    }
}

impl AppService {
    #[must_use]
    pub fn new(
        router: Arc<Router>,
        dispatcher: Arc<Dispatcher>,
        health: HealthState,
        limits: RequestLimits,
    ) -> Self {
        Self {
            router,
            dispatcher,
            metrics: None,
            health,
            limits,
        }
    }

    pub fn set_metrics_middleware(&mut self, metrics: Arc<MetricsMiddleware>) {
        self.metrics = Some(metrics);
    }

    fn write_error(res: &mut Response, err: &ServiceError) {
        match err {
            ServiceError::MethodNotAllowed { allow, .. } => {
                write_method_not_allowed(res, &err.body(), allow);
            }
            _ => write_json_error(res, err.status(), &err.body()),
        }
    }
}

/// Health probe. Answered before routing so it stays cheap under load, and
/// flips to 503 once the fault latch is set.
pub fn health_endpoint(res: &mut Response, health: &HealthState) -> io::Result<()> {
    if health.is_ok() {
        write_handler_response(res, 200, &json!({ "status": "ok" }));
    } else {
        write_handler_response(res, 503, &json!({ "status": "fault" }));
    }
    Ok(())
}

/// Prometheus text endpoint: middleware counters plus the per-handler pool
/// gauges (queue depth, shed and dispatch totals).
pub fn metrics_endpoint(
    res: &mut Response,
    metrics: &MetricsMiddleware,
    dispatcher: &Dispatcher,
) -> io::Result<()> {
    let mut body = metrics.render_prometheus();
    for name in dispatcher.handler_names() {
        if let Some(pool) = dispatcher.pool(&name) {
            let m = pool.metrics();
            body.push_str(&format!(
                "volley_pool_queue_depth{{handler=\"{name}\"}} {}\n\
                 volley_pool_shed_total{{handler=\"{name}\"}} {}\n\
                 volley_pool_dispatched_total{{handler=\"{name}\"}} {}\n\
                 volley_pool_completed_total{{handler=\"{name}\"}} {}\n",
                m.queue_depth(),
                m.shed_count(),
                m.dispatched_count(),
                m.completed_count(),
            ));
        }
    }
    write_text_response(res, 200, body);
    Ok(())
}

impl HttpService for AppService {
    fn call(&mut self, req: Request, res: &mut Response) -> io::Result<()> {
        let parsed: ParsedRequest = parse_request(req);

        if parsed.method == "GET" && parsed.path == "/health" {
            if let Some(m) = &self.metrics {
                m.inc_top_level_request();
            }
            return health_endpoint(res, &self.health);
        }
        if parsed.method == "GET" && parsed.path == "/metrics" {
            if let Some(m) = &self.metrics {
                m.inc_top_level_request();
                return metrics_endpoint(res, m, &self.dispatcher);
            }
            let err = ServiceError::NotFound {
                method: parsed.method,
                path: parsed.path,
            };
            Self::write_error(res, &err);
            return Ok(());
        }

        let Ok(method) = parsed.method.parse::<http::Method>() else {
            warn!(method = %parsed.method, "Unparseable HTTP method");
            let err = ServiceError::MalformedBody {
                reason: format!("unsupported method {}", parsed.method),
            };
            Self::write_error(res, &err);
            return Ok(());
        };

        let route_match = match self.router.route(&method, &parsed.path) {
            Ok(m) => m,
            Err(err) => {
                Self::write_error(res, &err);
                return Ok(());
            }
        };

        let body = match decode_body(&parsed.body, parsed.content_type(), &self.limits) {
            Ok(b) => b,
            Err(err) => {
                Self::write_error(res, &err);
                return Ok(());
            }
        };

        if route_match.route.requires_body && body.is_none() {
            let err = ServiceError::MalformedBody {
                reason: "request body is required".to_string(),
            };
            Self::write_error(res, &err);
            return Ok(());
        }

        let handler_response = self.dispatcher.dispatch(
            &route_match,
            method,
            parsed.path,
            parsed.query_params,
            parsed.headers,
            body,
        );
        write_handler_response(res, handler_response.status, &handler_response.body);
        Ok(())
    }
}
