//! # Volley
//!
//! A coroutine-powered echo and validation service built for sustained
//! load-generator traffic. Requests to parameterized routes are matched
//! against a radix tree, their JSON bodies decoded with key order and
//! numeric form preserved, and dispatched over bounded channels to worker
//! coroutine pools. The response echoes the request body alongside the
//! extracted path parameters, so a load generator can assert byte-exact
//! round trips at tens of thousands of requests per second.
//!
//! ## Architecture
//!
//! - **[`router`]** - radix-tree path matching with literal-over-parameter
//!   precedence and registration-order 405 Allow lists
//! - **[`decode`]** - JSON body decoding with size and nesting-depth limits
//! - **[`dispatcher`]** - channel-based handler dispatch with per-request
//!   deadlines
//! - **[`worker_pool`]** - per-handler coroutine pools with an enforced
//!   queue bound and shed/block backpressure
//! - **[`server`]** - the `may_minihttp` connection layer, request parsing,
//!   and response encoding
//! - **[`middleware`]** - metrics and trace logging hooks around dispatch
//!
//! ## Runtime
//!
//! Volley runs on the `may` coroutine runtime, not tokio. Handlers execute
//! in coroutines pre-spawned at startup; stack size is configurable via
//! `VOLLEY_STACK_SIZE`.

pub mod app;
pub mod config;
pub mod decode;
pub mod dispatcher;
pub mod echo;
pub mod error;
pub mod health;
pub mod ids;
pub mod middleware;
pub mod route;
pub mod router;
pub mod server;
pub mod worker_pool;

pub use config::ServerConfig;
pub use error::ServiceError;
pub use ids::RequestId;
pub use route::RouteMeta;
