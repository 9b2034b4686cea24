//! Process-wide cooperative stop flag.
//!
//! Set from the Ctrl-C handler; the cross-device copy fallback and the file batch mover
//! poll it between units of work and stop with an `Interrupted` failure.

use std::sync::atomic::{AtomicBool, Ordering};

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// Request a cooperative shutdown (idempotent, signal-safe).
#[inline]
pub fn request() {
    SHUTDOWN.store(true, Ordering::Relaxed);
}

#[inline]
pub fn is_requested() -> bool {
    SHUTDOWN.load(Ordering::Relaxed)
}

/// Clear the flag, e.g. between tests sharing one process.
#[doc(hidden)]
#[inline]
pub fn reset() {
    SHUTDOWN.store(false, Ordering::Relaxed);
}
