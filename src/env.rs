//! Isolated worker environments and the pool that leases them.
//!
//! Each configured environment is a "slot": an ordered set of environment
//! variables (cache directory, server port, database URL, PID file) that at
//! most one running worker may use at a time. Workers borrow a slot for the
//! duration of one subprocess and return it when done.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// One isolated environment: a stable index plus its variables.
///
/// Immutable after pool construction; only the pool tracks whether the slot
/// is currently leased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvSlot {
    index: usize,
    vars: Vec<(String, String)>,
}

impl EnvSlot {
    /// Zero-based slot index, unique within the pool.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The slot's environment variables, in a stable order.
    pub fn vars(&self) -> &[(String, String)] {
        &self.vars
    }
}

/// Error returned when no slot frees up within the acquisition timeout.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("no free environment slot within {timeout:?}")]
pub struct SlotTimeout {
    /// The timeout that elapsed.
    pub timeout: Duration,
}

/// Fixed pool of environment slots with mutually exclusive leases.
///
/// Capacity equals the number of configured environments and bounds worker
/// concurrency. `acquire` waits until a slot frees, up to the configured
/// timeout; the returned lease releases the slot when dropped.
#[derive(Debug, Clone)]
pub struct EnvironmentPool {
    slots: Arc<Vec<EnvSlot>>,
    free: Arc<Mutex<Vec<usize>>>,
    semaphore: Arc<Semaphore>,
    acquire_timeout: Duration,
}

impl EnvironmentPool {
    /// Build a pool from the configured ordered list of environment maps.
    ///
    /// An empty list degrades to a single implicit slot with no variables:
    /// concurrency is then effectively 1 and workers run without isolation.
    /// This is deliberate — a bare configuration still runs, serially —
    /// rather than a configuration error.
    pub fn from_environments(
        environments: Vec<Vec<(String, String)>>,
        acquire_timeout: Duration,
    ) -> Self {
        let environments = if environments.is_empty() {
            vec![Vec::new()]
        } else {
            environments
        };

        let slots: Vec<EnvSlot> = environments
            .into_iter()
            .enumerate()
            .map(|(index, vars)| EnvSlot { index, vars })
            .collect();
        let free: Vec<usize> = (0..slots.len()).collect();
        let semaphore = Arc::new(Semaphore::new(slots.len()));

        Self {
            slots: Arc::new(slots),
            free: Arc::new(Mutex::new(free)),
            semaphore,
            acquire_timeout,
        }
    }

    /// Number of slots, which caps worker concurrency.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of slots currently free (best-effort snapshot).
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Lease a free slot, waiting up to the configured timeout.
    ///
    /// The lease is exclusive: no other caller holds the same slot index
    /// until the returned guard is dropped.
    pub async fn acquire(&self) -> Result<LeasedSlot, SlotTimeout> {
        let permit = match tokio::time::timeout(
            self.acquire_timeout,
            Arc::clone(&self.semaphore).acquire_owned(),
        )
        .await
        {
            Ok(Ok(permit)) => permit,
            // The semaphore is never closed; treat a closed error like
            // exhaustion so callers see a single failure mode.
            Ok(Err(_)) | Err(_) => {
                return Err(SlotTimeout {
                    timeout: self.acquire_timeout,
                })
            }
        };

        let index = {
            let mut free = lock_free_list(&self.free);
            // A permit guarantees at least one free index.
            free.pop().expect("semaphore permit without free slot")
        };

        Ok(LeasedSlot {
            slot: self.slots[index].clone(),
            free: Arc::clone(&self.free),
            _permit: permit,
        })
    }
}

/// Exclusive lease on one environment slot.
///
/// Dereferences to the slot's data; dropping the lease marks the slot free
/// and wakes one waiting acquirer.
#[derive(Debug)]
pub struct LeasedSlot {
    slot: EnvSlot,
    free: Arc<Mutex<Vec<usize>>>,
    _permit: OwnedSemaphorePermit,
}

impl std::ops::Deref for LeasedSlot {
    type Target = EnvSlot;

    fn deref(&self) -> &Self::Target {
        &self.slot
    }
}

impl Drop for LeasedSlot {
    fn drop(&mut self) {
        // Return the index before the permit is released (fields drop after
        // this body), so a woken waiter always finds a free index.
        lock_free_list(&self.free).push(self.slot.index);
    }
}

fn lock_free_list(free: &Mutex<Vec<usize>>) -> std::sync::MutexGuard<'_, Vec<usize>> {
    free.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
