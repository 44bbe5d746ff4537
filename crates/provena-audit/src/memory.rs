//! In-memory implementation of `AuditLogRepository`.
//!
//! `InMemoryAuditLogRepository` keeps each organization's entries in a
//! `Vec` in insertion order, behind a `Mutex`.  Reads sort a copy by
//! timestamp with a stable sort, so entries that share a timestamp keep the
//! order they were inserted in.
//!
//! It is the reference store for tests and the CLI demo.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use provena_contracts::{
    entry::AuditLogEntry,
    error::{LedgerError, LedgerResult},
};
use provena_core::traits::AuditLogRepository;

// ── Internal mutable state ────────────────────────────────────────────────────

pub(crate) struct InMemoryState {
    /// Entries per organization, in insertion order.
    pub(crate) chains: HashMap<String, Vec<AuditLogEntry>>,

    /// When set, only these organizations accept inserts.
    pub(crate) tenants: Option<HashSet<String>>,
}

// ── Public repository ─────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct InMemoryAuditLogRepository {
    pub(crate) state: Arc<Mutex<InMemoryState>>,
}

impl InMemoryAuditLogRepository {
    /// A repository that accepts entries for any organization.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(InMemoryState {
                chains: HashMap::new(),
                tenants: None,
            })),
        }
    }

    /// A repository that rejects inserts for organizations not in `tenants`.
    pub fn with_tenants<I, S>(tenants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let repo = Self::new();
        if let Ok(mut state) = repo.state.lock() {
            state.tenants = Some(tenants.into_iter().map(Into::into).collect());
        }
        repo
    }

    /// Total number of entries across all organizations.
    pub fn len(&self) -> usize {
        self.state
            .lock()
            .map(|s| s.chains.values().map(Vec::len).sum())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> LedgerResult<MutexGuard<'_, InMemoryState>> {
        self.state.lock().map_err(|e| LedgerError::Storage {
            reason: format!("audit state lock poisoned: {}", e),
        })
    }
}

impl Default for InMemoryAuditLogRepository {
    fn default() -> Self {
        Self::new()
    }
}

// ── AuditLogRepository impl ──────────────────────────────────────────────────

impl AuditLogRepository for InMemoryAuditLogRepository {
    fn insert(&self, entry: &AuditLogEntry) -> LedgerResult<()> {
        let mut state = self.lock()?;

        if let Some(tenants) = &state.tenants {
            if !tenants.contains(&entry.organization_id) {
                return Err(LedgerError::UnknownOrganization {
                    org_id: entry.organization_id.clone(),
                });
            }
        }

        state
            .chains
            .entry(entry.organization_id.clone())
            .or_default()
            .push(entry.clone());
        Ok(())
    }

    fn find_latest_by_org(&self, org_id: &str) -> LedgerResult<Option<AuditLogEntry>> {
        let state = self.lock()?;
        let latest = state.chains.get(org_id).and_then(|entries| {
            entries
                .iter()
                .enumerate()
                .max_by_key(|(idx, e)| (e.timestamp, *idx))
                .map(|(_, e)| e.clone())
        });
        Ok(latest)
    }

    fn find_all_by_org_ordered_by_time(&self, org_id: &str) -> LedgerResult<Vec<AuditLogEntry>> {
        let state = self.lock()?;
        let mut entries = state.chains.get(org_id).cloned().unwrap_or_default();
        entries.sort_by_key(|e| e.timestamp);
        Ok(entries)
    }
}
