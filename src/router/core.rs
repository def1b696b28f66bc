//! Router hot path: request path to route resolution.

use http::Method;
use smallvec::SmallVec;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::radix::{RadixLookup, RadixRouter};
use crate::error::ServiceError;
use crate::route::RouteMeta;

/// Maximum number of path parameters before heap allocation. The echo route
/// has two; anything beyond eight is an unusual API shape.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Stack-allocated parameter storage for the hot path.
///
/// Param names are `Arc<str>` because they come from the static route tree:
/// cloning is an atomic increment, not a string copy. Values are per-request
/// data and stay `String`.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Result of successfully matching a request path to a route.
///
/// Parameter bindings appear in template declaration order, so serializing
/// them into an order-preserving map is deterministic. Created per request
/// and dropped after dispatch.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    /// The matched route (`Arc` to avoid cloning metadata per request).
    pub route: Arc<RouteMeta>,
    /// Path parameters extracted from the URL, in declaration order.
    pub path_params: ParamVec,
    /// Name of the handler that should process this request.
    pub handler_name: Arc<str>,
}

impl RouteMatch {
    /// Get a path parameter by name. Duplicate names are rejected at
    /// template registration, so the first hit is the only hit.
    #[inline]
    #[must_use]
    pub fn get_path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Serialize path parameters as an order-preserving JSON object.
    #[must_use]
    pub fn path_params_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::with_capacity(self.path_params.len());
        for (k, v) in &self.path_params {
            map.insert(k.to_string(), serde_json::Value::String(v.clone()));
        }
        serde_json::Value::Object(map)
    }
}

/// Router that resolves requests against a radix tree of route templates.
///
/// The table is built once at startup and is read-only afterwards; it is
/// shared across all concurrent dispatchers behind an `Arc` without locking.
#[derive(Clone)]
pub struct Router {
    radix: RadixRouter,
    max_path_bytes: usize,
}

impl Router {
    /// Compile a routing table. Exact duplicate registrations keep the first
    /// entry and log a warning; ambiguity between literal and parameter
    /// segments is resolved literal-first at match time.
    #[must_use]
    pub fn new(routes: Vec<RouteMeta>) -> Self {
        Self::with_max_path_bytes(routes, crate::config::RequestLimits::default().max_path_bytes)
    }

    #[must_use]
    pub fn with_max_path_bytes(routes: Vec<RouteMeta>, max_path_bytes: usize) -> Self {
        let count = routes.len();
        let summary: Vec<String> = routes
            .iter()
            .take(10)
            .map(|r| format!("{} {}", r.method, r.path_pattern))
            .collect();

        let (radix, duplicates) = RadixRouter::new(routes);
        for dup in &duplicates {
            warn!(
                method = %dup.method,
                path_pattern = %dup.path_pattern,
                handler_name = %dup.handler_name,
                "Duplicate route registration ignored - first registered wins"
            );
        }

        info!(
            routes_count = count - duplicates.len(),
            routes_summary = ?summary,
            "Routing table loaded"
        );

        Self {
            radix,
            max_path_bytes,
        }
    }

    /// Match an HTTP request to a route.
    ///
    /// # Errors
    ///
    /// * `PathTooLong` - path exceeds the configured byte limit
    /// * `MethodNotAllowed` - path is registered, method is not
    /// * `NotFound` - no template matches
    pub fn route(&self, method: &Method, path: &str) -> Result<RouteMatch, ServiceError> {
        if path.len() > self.max_path_bytes {
            return Err(ServiceError::PathTooLong {
                len: path.len(),
                max_bytes: self.max_path_bytes,
            });
        }

        match self.radix.lookup(method, path) {
            RadixLookup::Matched { route, params } => {
                debug!(
                    method = %method,
                    path = %path,
                    route_pattern = %route.path_pattern,
                    handler_name = %route.handler_name,
                    path_params = ?params,
                    "Route matched"
                );
                let handler_name = Arc::clone(&route.handler_name);
                Ok(RouteMatch {
                    route,
                    path_params: params,
                    handler_name,
                })
            }
            RadixLookup::MethodMismatch { allow } => {
                debug!(method = %method, path = %path, allow = ?allow, "Method not allowed");
                Err(ServiceError::MethodNotAllowed {
                    method: method.to_string(),
                    path: path.to_string(),
                    allow: allow.iter().map(|m| m.to_string()).collect(),
                })
            }
            RadixLookup::NoMatch => {
                debug!(method = %method, path = %path, "No route matched");
                Err(ServiceError::NotFound {
                    method: method.to_string(),
                    path: path.to_string(),
                })
            }
        }
    }
}
