//! Per-organization mutual exclusion for strictly serialized appends.
//!
//! `OrgLocks` hands out one `Arc<Mutex<()>>` per organization id.  Writers
//! for the same organization queue on the same mutex; writers for different
//! organizations never contend.  Locks are created on first use and kept for
//! the lifetime of the map.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use provena_contracts::error::{LedgerError, LedgerResult};

#[derive(Debug, Default)]
pub struct OrgLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl OrgLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock guarding `org_id`'s chain.
    ///
    /// The map's own mutex is only held long enough to look up or insert the
    /// entry; callers lock the returned mutex themselves.
    pub fn lock_for(&self, org_id: &str) -> LedgerResult<Arc<Mutex<()>>> {
        let mut locks = self.locks.lock().map_err(|e| LedgerError::LockPoisoned {
            reason: format!("organization lock map poisoned: {}", e),
        })?;

        Ok(Arc::clone(
            locks
                .entry(org_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        ))
    }

    /// Number of organizations that have been assigned a lock.
    pub fn len(&self) -> usize {
        self.locks.lock().map(|locks| locks.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
