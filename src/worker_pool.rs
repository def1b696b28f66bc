//! # Worker Pool Module
//!
//! A pool of worker coroutines per handler, fed by a shared channel with an
//! enforced bound. The bound is what makes overload behavior predictable: at
//! 40k req/s an unbounded queue turns a throughput problem into a latency
//! and memory problem. When the queue is full the configured backpressure
//! mode decides between immediate shedding and a short bounded wait.

use may::sync::mpsc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use crate::config::{BackpressureMode, WorkerPoolConfig};
use crate::dispatcher::HandlerRequest;
use crate::error::ServiceError;

/// Why a dispatch into the pool failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    /// Queue at its bound; request shed.
    QueueFull,
    /// Worker channel disconnected; the pool can no longer serve.
    Disconnected,
}

/// Counters for monitoring a pool. All atomic, relaxed ordering; the numbers
/// are for observability, not coordination.
#[derive(Debug, Default)]
pub struct WorkerPoolMetrics {
    shed_count: AtomicU64,
    queue_depth: AtomicUsize,
    dispatched_count: AtomicU64,
    completed_count: AtomicU64,
}

impl WorkerPoolMetrics {
    fn record_shed(&self) {
        self.shed_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Atomically claim a queue slot. The increment happens before the bound
    /// check so two dispatchers racing for the last slot cannot both win.
    fn try_reserve(&self, bound: usize) -> bool {
        let prev = self.queue_depth.fetch_add(1, Ordering::Relaxed);
        if prev >= bound {
            self.queue_depth.fetch_sub(1, Ordering::Relaxed);
            return false;
        }
        true
    }

    /// Give back a reserved slot without counting a completion.
    fn release(&self) {
        self.queue_depth.fetch_sub(1, Ordering::Relaxed);
    }

    fn record_dispatch(&self) {
        self.dispatched_count.fetch_add(1, Ordering::Relaxed);
    }

    fn record_completion(&self) {
        self.completed_count.fetch_add(1, Ordering::Relaxed);
        self.queue_depth.fetch_sub(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn shed_count(&self) -> u64 {
        self.shed_count.load(Ordering::Relaxed)
    }

    /// Queued-but-unfinished requests, approximate.
    #[must_use]
    pub fn queue_depth(&self) -> usize {
        self.queue_depth.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn dispatched_count(&self) -> u64 {
        self.dispatched_count.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn completed_count(&self) -> u64 {
        self.completed_count.load(Ordering::Relaxed)
    }
}

/// A pool of worker coroutines sharing one bounded request queue.
pub struct WorkerPool {
    config: WorkerPoolConfig,
    sender: mpsc::Sender<HandlerRequest>,
    metrics: Arc<WorkerPoolMetrics>,
    handler_name: Arc<str>,
}

impl WorkerPool {
    /// Spawn the pool's worker coroutines.
    ///
    /// # Safety
    ///
    /// `may::coroutine::Builder::spawn` is unsafe in the `may` runtime. The
    /// caller must ensure the May runtime is initialized before calling this.
    pub unsafe fn new<F>(handler_name: Arc<str>, config: WorkerPoolConfig, handler_fn: F) -> Self
    where
        F: Fn(HandlerRequest) + Send + 'static + Clone,
    {
        let (tx, rx) = mpsc::channel::<HandlerRequest>();
        let metrics = Arc::new(WorkerPoolMetrics::default());
        let rx = Arc::new(rx);

        info!(
            handler_name = %handler_name,
            num_workers = config.num_workers,
            queue_bound = config.queue_bound,
            backpressure_mode = ?config.backpressure_mode,
            stack_size = config.stack_size,
            "Creating worker pool"
        );

        for worker_id in 0..config.num_workers {
            let rx = Arc::clone(&rx);
            let handler_fn = handler_fn.clone();
            let handler_name = Arc::clone(&handler_name);
            let metrics = Arc::clone(&metrics);

            let spawn_result = may::coroutine::Builder::new()
                .stack_size(config.stack_size)
                .spawn({
                    let handler_name = Arc::clone(&handler_name);
                    move || {
                    debug!(handler_name = %handler_name, worker_id, "Worker coroutine started");

                    // All workers share the receiver and load-balance the queue.
                    while let Ok(req) = rx.recv() {
                        let request_id = req.request_id;
                        let reply_tx = req.reply_tx.clone();

                        if let Err(panic) =
                            std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                                handler_fn(req);
                            }))
                        {
                            error!(
                                request_id = %request_id,
                                handler_name = %handler_name,
                                worker_id,
                                panic_message = ?panic,
                                "Handler panicked"
                            );
                            // Generic 500; panic detail stays in the log.
                            let _ = reply_tx.send(crate::dispatcher::HandlerResponse {
                                status: ServiceError::InternalFault.status(),
                                body: ServiceError::InternalFault.body(),
                            });
                        }
                        metrics.record_completion();
                    }

                    debug!(handler_name = %handler_name, worker_id, "Worker coroutine exiting");
                });

            if let Err(e) = spawn_result {
                error!(
                    handler_name = %handler_name,
                    worker_id,
                    error = %e,
                    "Failed to spawn worker coroutine"
                );
            }
        }

        Self {
            config,
            sender: tx,
            metrics,
            handler_name,
        }
    }

    /// Dispatch a request into the bounded queue.
    ///
    /// # Errors
    ///
    /// * `QueueFull` - the bound was hit (shed mode immediately, block mode
    ///   after the configured wait)
    /// * `Disconnected` - the workers are gone
    pub fn dispatch(&self, req: HandlerRequest) -> Result<(), PoolError> {
        match self.config.backpressure_mode {
            BackpressureMode::Shed => {
                if !self.metrics.try_reserve(self.config.queue_bound) {
                    self.shed(req.request_id);
                    return Err(PoolError::QueueFull);
                }
            }
            BackpressureMode::Block => {
                let deadline = Instant::now() + self.config.backpressure_timeout;
                while !self.metrics.try_reserve(self.config.queue_bound) {
                    if Instant::now() >= deadline {
                        self.shed(req.request_id);
                        return Err(PoolError::QueueFull);
                    }
                    may::coroutine::sleep(Duration::from_millis(1));
                }
            }
        }

        self.metrics.record_dispatch();
        if let Err(e) = self.sender.send(req) {
            self.metrics.release();
            error!(
                handler_name = %self.handler_name,
                error = %e,
                "Worker pool channel disconnected"
            );
            return Err(PoolError::Disconnected);
        }
        Ok(())
    }

    fn shed(&self, request_id: crate::ids::RequestId) {
        self.metrics.record_shed();
        debug!(
            request_id = %request_id,
            handler_name = %self.handler_name,
            queue_depth = self.metrics.queue_depth(),
            queue_bound = self.config.queue_bound,
            "Queue full - shedding request"
        );
    }

    #[must_use]
    pub fn metrics(&self) -> &Arc<WorkerPoolMetrics> {
        &self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_counters() {
        let metrics = WorkerPoolMetrics::default();
        assert_eq!(metrics.queue_depth(), 0);

        assert!(metrics.try_reserve(1));
        metrics.record_dispatch();
        assert_eq!(metrics.dispatched_count(), 1);
        assert_eq!(metrics.queue_depth(), 1);

        metrics.record_completion();
        assert_eq!(metrics.completed_count(), 1);
        assert_eq!(metrics.queue_depth(), 0);

        metrics.record_shed();
        assert_eq!(metrics.shed_count(), 1);
    }

    #[test]
    fn test_reserve_respects_bound() {
        let metrics = WorkerPoolMetrics::default();
        assert!(metrics.try_reserve(2));
        assert!(metrics.try_reserve(2));
        assert!(!metrics.try_reserve(2));
        assert_eq!(metrics.queue_depth(), 2);

        metrics.release();
        assert!(metrics.try_reserve(2));
    }
}
