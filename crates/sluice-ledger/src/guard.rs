// crates/sluice-ledger/src/guard.rs
//
// Non-reentrant, serializing section guard.
//
// Every state-changing engine operation enters the guard first. Operations
// from different threads queue on the section lock and run one at a time. A
// nested call from the thread already inside (for example one made from an
// outbound token transfer) finds the flag set and is rejected before it can
// read ledger state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use sluice_core::error::SluiceError;

#[derive(Debug, Default)]
pub struct ReentrancyGuard {
    entered: AtomicBool,
    owner: Mutex<Option<ThreadId>>,
    section: Mutex<()>,
}

/// Held for the duration of one operation; clears the flag when dropped.
#[derive(Debug)]
pub struct GuardToken<'a> {
    guard: &'a ReentrancyGuard,
    _section: MutexGuard<'a, ()>,
}

impl ReentrancyGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject re-entry from the current thread, otherwise wait for the
    /// section and set the in-progress flag.
    pub fn enter(&self, operation: &str) -> Result<GuardToken<'_>, SluiceError> {
        let me = thread::current().id();
        if self.is_entered() && self.owner() == Some(me) {
            return Err(reentrancy(operation));
        }

        // Ledger state only changes through atomic store batches, so a
        // panicked operation leaves nothing half-written behind the lock.
        let section = self
            .section
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.entered
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| reentrancy(operation))?;
        self.set_owner(Some(me));
        Ok(GuardToken {
            guard: self,
            _section: section,
        })
    }

    pub fn is_entered(&self) -> bool {
        self.entered.load(Ordering::Acquire)
    }

    fn owner(&self) -> Option<ThreadId> {
        *self.owner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_owner(&self, owner: Option<ThreadId>) {
        *self.owner.lock().unwrap_or_else(PoisonError::into_inner) = owner;
    }
}

fn reentrancy(operation: &str) -> SluiceError {
    SluiceError::Reentrancy(format!(
        "{} called while another ledger operation is in progress",
        operation
    ))
}

impl Drop for GuardToken<'_> {
    fn drop(&mut self) {
        self.guard.set_owner(None);
        self.guard.entered.store(false, Ordering::Release);
    }
}
