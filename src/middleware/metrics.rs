use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use super::Middleware;
use crate::dispatcher::{HandlerRequest, HandlerResponse};

/// Passive request statistics: counts, average latency, and per-status-class
/// tallies. All counters are relaxed atomics; the numbers are eventually
/// consistent and cost almost nothing to collect.
pub struct MetricsMiddleware {
    request_count: AtomicUsize,
    total_latency_ns: AtomicU64,
    status_2xx: AtomicUsize,
    status_4xx: AtomicUsize,
    status_5xx: AtomicUsize,
    top_level_requests: AtomicUsize,
}

impl Default for MetricsMiddleware {
    fn default() -> Self {
        Self {
            request_count: AtomicUsize::new(0),
            total_latency_ns: AtomicU64::new(0),
            status_2xx: AtomicUsize::new(0),
            status_4xx: AtomicUsize::new(0),
            status_5xx: AtomicUsize::new(0),
            top_level_requests: AtomicUsize::new(0),
        }
    }
}

impl MetricsMiddleware {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::Relaxed)
    }

    /// Mean processing time across all dispatched requests, zero if none.
    #[must_use]
    pub fn average_latency(&self) -> Duration {
        let count = self.request_count.load(Ordering::Relaxed) as u64;
        if count == 0 {
            Duration::from_nanos(0)
        } else {
            Duration::from_nanos(self.total_latency_ns.load(Ordering::Relaxed) / count)
        }
    }

    #[must_use]
    pub fn status_counts(&self) -> (usize, usize, usize) {
        (
            self.status_2xx.load(Ordering::Relaxed),
            self.status_4xx.load(Ordering::Relaxed),
            self.status_5xx.load(Ordering::Relaxed),
        )
    }

    /// Call for endpoints served outside handler dispatch, `/health` and
    /// `/metrics` themselves.
    pub fn inc_top_level_request(&self) {
        self.top_level_requests.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn top_level_request_count(&self) -> usize {
        self.top_level_requests.load(Ordering::Relaxed)
    }

    /// Render the counters in Prometheus text exposition format.
    #[must_use]
    pub fn render_prometheus(&self) -> String {
        let (s2, s4, s5) = self.status_counts();
        format!(
            "# TYPE volley_requests_total counter\n\
             volley_requests_total {}\n\
             # TYPE volley_top_level_requests_total counter\n\
             volley_top_level_requests_total {}\n\
             # TYPE volley_responses_total counter\n\
             volley_responses_total{{class=\"2xx\"}} {}\n\
             volley_responses_total{{class=\"4xx\"}} {}\n\
             volley_responses_total{{class=\"5xx\"}} {}\n\
             # TYPE volley_request_latency_avg_ns gauge\n\
             volley_request_latency_avg_ns {}\n",
            self.request_count(),
            self.top_level_request_count(),
            s2,
            s4,
            s5,
            self.average_latency().as_nanos(),
        )
    }
}

impl Middleware for MetricsMiddleware {
    fn before(&self, _req: &HandlerRequest) -> Option<HandlerResponse> {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        None
    }

    fn after(
        &self,
        _method: &http::Method,
        _path: &str,
        res: &HandlerResponse,
        latency: Duration,
    ) {
        self.total_latency_ns
            .fetch_add(latency.as_nanos() as u64, Ordering::Relaxed);
        let counter = match res.status {
            200..=299 => &self.status_2xx,
            400..=499 => &self.status_4xx,
            _ => &self.status_5xx,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}
