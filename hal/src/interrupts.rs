//! # Interrupt Servicing Hook
//!
//! Long lifecycle phases drop the device lock between engines. At each of
//! those release points the orchestrator calls into the host so that
//! pending interrupts on other devices get serviced.

use core::sync::atomic::{AtomicU64, Ordering};

/// Called at every per-engine release point
pub trait InterruptService: Send + Sync {
    /// Service pending interrupts on every other device
    fn service_other_devices(&self);
}

/// No other devices to service
#[derive(Debug, Clone, Copy, Default)]
pub struct NoInterrupts;

impl InterruptService for NoInterrupts {
    fn service_other_devices(&self) {}
}

/// Counts release points, for diagnostics
#[derive(Debug, Default)]
pub struct CountingService {
    serviced: AtomicU64,
}

impl CountingService {
    /// Create a zeroed counter
    pub const fn new() -> Self {
        Self {
            serviced: AtomicU64::new(0),
        }
    }

    /// Number of release points seen
    pub fn serviced(&self) -> u64 {
        self.serviced.load(Ordering::Relaxed)
    }
}

impl InterruptService for CountingService {
    fn service_other_devices(&self) {
        self.serviced.fetch_add(1, Ordering::Relaxed);
    }
}
