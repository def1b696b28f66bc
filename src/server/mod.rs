//! Connection layer: request parsing, the `HttpService` pipeline, response
//! encoding, and the server lifecycle wrapper.

pub mod http_server;
pub mod request;
pub mod response;
pub mod service;

pub use http_server::{HttpServer, ServerHandle};
pub use request::{parse_request, ParsedRequest};
pub use service::{health_endpoint, metrics_endpoint, AppService};
