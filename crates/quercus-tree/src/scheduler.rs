//! Soft-capped permit gate for the recursive subtree fan-out.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Limits how many subtree workers run at once across one tree build.
///
/// Acquiring never blocks: when the cap is reached the caller decomposes
/// the child inline on its own thread instead of spawning.
#[derive(Debug)]
pub struct SpawnGate {
    in_flight: AtomicUsize,
    cap: usize,
}

impl SpawnGate {
    /// Create a gate admitting up to `cap` concurrent workers.
    #[must_use]
    pub fn new(cap: usize) -> Self {
        Self {
            in_flight: AtomicUsize::new(0),
            cap,
        }
    }

    /// Try to take a permit; `None` means run inline.
    #[must_use]
    pub fn try_acquire(&self) -> Option<SpawnPermit<'_>> {
        let acquired = self
            .in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current < self.cap).then_some(current + 1)
            });
        acquired.ok().map(|_| SpawnPermit { gate: self })
    }

    /// Return the number of permits currently held.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }
}

/// A held permit; dropping it frees the slot.
#[derive(Debug)]
pub struct SpawnPermit<'a> {
    gate: &'a SpawnGate,
}

impl Drop for SpawnPermit<'_> {
    fn drop(&mut self) {
        self.gate.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}
