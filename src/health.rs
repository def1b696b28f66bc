use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Process-wide liveness state.
///
/// Initialized healthy at startup and never mutated by ordinary requests.
/// The fault latch is set only on unrecoverable internal faults (a handler's
/// worker channel disconnecting); once latched it stays latched so the
/// health endpoint reports the process as unfit for traffic.
#[derive(Clone, Debug, Default)]
pub struct HealthState {
    faulted: Arc<AtomicBool>,
}

impl HealthState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Latch the internal fault flag. One-way: there is no reset.
    pub fn set_fault(&self) {
        self.faulted.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        !self.faulted.load(Ordering::Relaxed)
    }
}
