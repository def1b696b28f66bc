//! Wiring: the route table, handler registration, and service assembly.
//! `main` and the integration tests both start the server through here.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::dispatcher::Dispatcher;
use crate::echo::{echo_handler, health_handler};
use crate::health::HealthState;
use crate::middleware::{MetricsMiddleware, TracingMiddleware};
use crate::route::RouteMeta;
use crate::router::Router;
use crate::server::{AppService, HttpServer, ServerHandle};

/// The service's route table. `/health` is also short-circuited before
/// routing; it is registered here so 405 Allow lists stay accurate.
pub fn default_routes() -> Result<Vec<RouteMeta>, crate::route::TemplateError> {
    Ok(vec![
        RouteMeta::new(
            http::Method::POST,
            "/test/{param_a}/subcommand/{param_b}",
            "echo",
        )?
        .with_required_body(),
        RouteMeta::new(http::Method::GET, "/health", "health")?,
    ])
}

/// Assemble the full pipeline: router, worker pools, middleware, metrics.
///
/// # Safety
///
/// Spawns `may` coroutines for the worker pools; configure the May runtime
/// (stack size at minimum) before calling.
///
/// # Errors
///
/// Fails if a route template is malformed.
pub unsafe fn build_service(config: &ServerConfig) -> anyhow::Result<AppService> {
    let routes = default_routes()?;
    let router = Router::with_max_path_bytes(routes, config.limits.max_path_bytes);

    let health = HealthState::new();
    let mut dispatcher = Dispatcher::new(config.request_timeout, health.clone());
    dispatcher.register_handler(Arc::from("echo"), config.pool, echo_handler);
    dispatcher.register_handler(Arc::from("health"), config.pool, health_handler);

    let metrics = Arc::new(MetricsMiddleware::new());
    dispatcher.add_middleware(Arc::clone(&metrics) as Arc<dyn Middleware>);
    dispatcher.add_middleware(Arc::new(TracingMiddleware));

    let mut service = AppService::new(
        Arc::new(router),
        Arc::new(dispatcher),
        health,
        config.limits,
    );
    service.set_metrics_middleware(metrics);
    Ok(service)
}

/// Build the service and bind the listener.
///
/// # Safety
///
/// Same as [`build_service`].
///
/// # Errors
///
/// Route table faults or a failed bind.
pub unsafe fn start(config: &ServerConfig) -> anyhow::Result<ServerHandle> {
    let service = build_service(config)?;
    let handle = HttpServer(service).start(&config.addr)?;
    Ok(handle)
}
