//! Runtime configuration for the server and worker pools.
//!
//! Every knob can come from the environment (`VOLLEY_*`) with the CLI taking
//! precedence. Stack size accepts decimal or `0x`-prefixed hex, e.g.
//! `VOLLEY_STACK_SIZE=0x8000`.

use std::env;
use std::time::Duration;

/// Backpressure policy applied when a handler's bounded queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackpressureMode {
    /// Reject immediately with 503 Service Unavailable. The default: under a
    /// ramping arrival rate, fast rejection degrades predictably where a
    /// growing queue would not.
    #[default]
    Shed,
    /// Wait up to the configured timeout for the queue to drain, then 503.
    Block,
}

impl BackpressureMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "shed" => Some(Self::Shed),
            "block" => Some(Self::Block),
            _ => None,
        }
    }
}

/// Parse a stack size that may be decimal or `0x`-prefixed hex.
fn parse_stack_size(s: &str) -> Option<usize> {
    if let Some(hex) = s.strip_prefix("0x") {
        usize::from_str_radix(hex, 16).ok()
    } else {
        s.parse().ok()
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.parse().ok())
}

/// Highest configurable JSON nesting depth. serde_json's parser recurses
/// and rejects documents nested past 128 levels before our depth check can
/// run, so limits at or above that ceiling would misreport deep bodies as
/// malformed instead of too deep.
pub const MAX_SUPPORTED_BODY_DEPTH: usize = 127;

/// Limits applied while reading and decoding a single request.
#[derive(Debug, Clone, Copy)]
pub struct RequestLimits {
    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,
    /// Maximum JSON nesting depth, capped at [`MAX_SUPPORTED_BODY_DEPTH`].
    /// A body at exactly this depth is accepted.
    pub max_body_depth: usize,
    /// Maximum request path length in bytes.
    pub max_path_bytes: usize,
}

impl Default for RequestLimits {
    fn default() -> Self {
        Self {
            max_body_bytes: 1024 * 1024,
            max_body_depth: 32,
            max_path_bytes: 8192,
        }
    }
}

/// Configuration for a handler worker pool.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPoolConfig {
    /// Number of worker coroutines sharing the queue.
    pub num_workers: usize,
    /// Maximum number of queued-but-unfinished requests before backpressure.
    pub queue_bound: usize,
    /// What to do when the queue is full.
    pub backpressure_mode: BackpressureMode,
    /// How long block mode waits for the queue to drain.
    pub backpressure_timeout: Duration,
    /// Stack size for worker coroutines.
    pub stack_size: usize,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            num_workers: 4,
            queue_bound: 1024,
            backpressure_mode: BackpressureMode::Shed,
            backpressure_timeout: Duration::from_millis(50),
            stack_size: 0x10000,
        }
    }
}

impl WorkerPoolConfig {
    /// Load pool configuration from `VOLLEY_*` environment variables,
    /// falling back to defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            num_workers: env_parse("VOLLEY_HANDLER_WORKERS").unwrap_or(defaults.num_workers),
            queue_bound: env_parse("VOLLEY_HANDLER_QUEUE_BOUND").unwrap_or(defaults.queue_bound),
            backpressure_mode: env::var("VOLLEY_BACKPRESSURE_MODE")
                .ok()
                .and_then(|s| BackpressureMode::parse(&s))
                .unwrap_or(defaults.backpressure_mode),
            backpressure_timeout: env_parse("VOLLEY_BACKPRESSURE_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.backpressure_timeout),
            stack_size: env::var("VOLLEY_STACK_SIZE")
                .ok()
                .and_then(|s| parse_stack_size(&s))
                .unwrap_or(defaults.stack_size),
        }
    }
}

/// Top-level server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address, e.g. `0.0.0.0:8080`.
    pub addr: String,
    /// Per-request handler deadline. Exceeding it yields 504.
    pub request_timeout: Duration,
    /// Request read/decode limits.
    pub limits: RequestLimits,
    /// Worker pool configuration shared by all registered handlers.
    pub pool: WorkerPoolConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8080".to_string(),
            request_timeout: Duration::from_secs(5),
            limits: RequestLimits::default(),
            pool: WorkerPoolConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load server configuration from `VOLLEY_*` environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            addr: env::var("VOLLEY_ADDR").unwrap_or(defaults.addr),
            request_timeout: env_parse("VOLLEY_REQUEST_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.request_timeout),
            limits: RequestLimits {
                max_body_bytes: env_parse("VOLLEY_MAX_BODY_BYTES")
                    .unwrap_or(defaults.limits.max_body_bytes),
                max_body_depth: env_parse("VOLLEY_MAX_BODY_DEPTH")
                    .unwrap_or(defaults.limits.max_body_depth)
                    .min(MAX_SUPPORTED_BODY_DEPTH),
                max_path_bytes: env_parse("VOLLEY_MAX_PATH_BYTES")
                    .unwrap_or(defaults.limits.max_path_bytes),
            },
            pool: WorkerPoolConfig::from_env(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backpressure_mode_parse() {
        assert_eq!(BackpressureMode::parse("shed"), Some(BackpressureMode::Shed));
        assert_eq!(BackpressureMode::parse("SHED"), Some(BackpressureMode::Shed));
        assert_eq!(
            BackpressureMode::parse("Block"),
            Some(BackpressureMode::Block)
        );
        assert_eq!(BackpressureMode::parse("queue"), None);
    }

    #[test]
    fn test_parse_stack_size() {
        assert_eq!(parse_stack_size("16384"), Some(16384));
        assert_eq!(parse_stack_size("0x4000"), Some(0x4000));
        assert_eq!(parse_stack_size("bogus"), None);
    }

    #[test]
    fn test_body_depth_clamped_to_parser_ceiling() {
        env::set_var("VOLLEY_MAX_BODY_DEPTH", "500");
        let cfg = ServerConfig::from_env();
        env::remove_var("VOLLEY_MAX_BODY_DEPTH");
        assert_eq!(cfg.limits.max_body_depth, MAX_SUPPORTED_BODY_DEPTH);
    }

    #[test]
    fn test_defaults() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.request_timeout, Duration::from_secs(5));
        assert_eq!(cfg.pool.num_workers, 4);
        assert_eq!(cfg.pool.queue_bound, 1024);
        assert_eq!(cfg.pool.backpressure_mode, BackpressureMode::Shed);
        assert_eq!(cfg.limits.max_body_depth, 32);
    }
}
