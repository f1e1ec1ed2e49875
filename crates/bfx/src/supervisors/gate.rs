// ai
//! 🚦 The AdmissionGate: a bouncer with a clicker.
//!
//! 🎬 *[a velvet rope. a semaphore with `max_concurrency` wristbands.]*
//! *[batches line up. only so many get in. the rest wait, patiently, async.]*
//!
//! Acquire a `GatePermit` before launching a worker; the worker holds it for
//! its whole batch and drops it at the end. Drop is the only way a permit goes
//! back, so it goes back exactly once on every path: success, failure, panic.
//!
//! 🧠 Knowledge graph:
//! - `tokio::sync::Semaphore` does the real limiting
//! - `in_flight` / `peak_in_flight` are bookkeeping for logs and tests
//! - `acquire` races the semaphore against a `CancellationToken`; cancelled
//!   means "no permit", never "half a permit"

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context, Result, bail};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

/// 🚦 Counting gate with `capacity` permits.
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
}

/// 🎟️ One unit of the gate. Hold it while working, drop it when done.
#[derive(Debug)]
pub struct GatePermit {
    // -- ⚠️ `drop()` lowers the counter first; the semaphore permit goes back right after
    _permit: OwnedSemaphorePermit,
    in_flight: Arc<AtomicUsize>,
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl AdmissionGate {
    /// 🏗️ A gate with `capacity` permits (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// 🎟️ Wait for a permit, unless `cancel` fires first.
    ///
    /// 💀 Errors when cancelled (already or while waiting) or when the
    /// semaphore was closed. In both cases no permit is held afterwards.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<GatePermit> {
        let the_permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                bail!(
                    "🛑 Dispatch cancelled while waiting for a worker slot ({} of {} busy)",
                    self.in_flight(),
                    self.capacity
                );
            }
            permit = Arc::clone(&self.semaphore).acquire_owned() => {
                permit.context("💀 The admission gate was closed. Nobody gets in anymore.")?
            }
        };

        let the_count = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(the_count, Ordering::SeqCst);

        Ok(GatePermit {
            _permit: the_permit,
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 📊 permits handed out right now
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// 🏔️ the most permits ever out at once
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// 🔢 permits sitting in the drawer
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}
