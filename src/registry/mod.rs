//! Concurrency gatekeeper mapping each target to its active scan

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::error::{Result, ScanError};

/// In-memory index of active scans, at most one claim per target.
///
/// The lock around the map is the sole serialization point for the per-target
/// mutual-exclusion invariant: no two callers can observe a successful
/// `acquire` for the same target between that call and the matching
/// `release`. The registry is owned by whoever constructs the orchestrator
/// and handed in explicitly; there is no process-wide instance.
pub struct ScanRegistry {
    active: Mutex<HashMap<String, Uuid>>,
}

impl ScanRegistry {
    pub fn new() -> Self {
        Self {
            active: Mutex::new(HashMap::new()),
        }
    }

    /// Claim `target` and allocate the scan id for it. Fails with
    /// `AlreadyRunning` while another scan holds the claim.
    pub fn acquire(&self, target: &str) -> Result<Uuid> {
        let mut active = self.lock();
        match active.entry(target.to_string()) {
            Entry::Occupied(_) => Err(ScanError::AlreadyRunning(target.to_string())),
            Entry::Vacant(slot) => {
                let id = Uuid::new_v4();
                slot.insert(id);
                Ok(id)
            }
        }
    }

    /// Drop the claim for `target` if scan `id` still holds it.
    ///
    /// Conditional on the owner so a late release from a scan that already
    /// lost its claim can never evict a newer scan on the same target.
    /// Returns whether the claim was removed.
    pub fn release(&self, target: &str, id: Uuid) -> bool {
        let mut active = self.lock();
        match active.get(target) {
            Some(current) if *current == id => {
                active.remove(target);
                true
            }
            _ => false,
        }
    }

    /// Re-register a persisted active scan at startup. Returns false if the
    /// target is already claimed.
    pub fn restore(&self, target: &str, id: Uuid) -> bool {
        match self.lock().entry(target.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(id);
                true
            }
        }
    }

    /// The scan currently holding the claim for `target`, if any.
    pub fn active_scan(&self, target: &str) -> Option<Uuid> {
        self.lock().get(target).copied()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Uuid>> {
        // The map stays valid even if a holder panicked.
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for ScanRegistry {
    fn default() -> Self {
        Self::new()
    }
}
