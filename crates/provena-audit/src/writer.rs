//! The chain writer: appends one linked entry per compliance action.
//!
//! Each append hashes the request and response payloads, reads the latest
//! entry for the organization, links to its `output_hash` (or the genesis
//! value) and inserts the new row.  How concurrent appends for one
//! organization are coordinated is an explicit `ChainConsistencyMode`.

use std::sync::{Arc, PoisonError};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use provena_contracts::{
    config::ChainConsistencyMode,
    entry::{AuditLogEntry, EntryId, NewEntry},
    error::{LedgerError, LedgerResult},
    payload::Payload,
    GENESIS_HASH,
};
use provena_core::traits::AuditLogRepository;

use crate::{hash::hash_payload, lock::OrgLocks};

/// Source of entry timestamps.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Appends hash-linked entries to per-organization chains.
///
/// In `StrictlySerialized` mode an append holds the writer's own
/// per-organization lock and the repository's `lock_chain` guard across
/// read-latest + insert.  Writers sharing one `ChainWriter` are serialized
/// by the former; independent writers, in this process or another, only by
/// the latter, so a store without `lock_chain` support is only strictly
/// serialized behind a single shared writer.
pub struct ChainWriter {
    repository: Arc<dyn AuditLogRepository>,
    mode: ChainConsistencyMode,
    locks: OrgLocks,
    clock: Clock,
}

impl ChainWriter {
    pub fn new(repository: Arc<dyn AuditLogRepository>, mode: ChainConsistencyMode) -> Self {
        Self {
            repository,
            mode,
            locks: OrgLocks::new(),
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the wall clock, e.g. to pin timestamps in tests.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Append an entry with just the required fields.
    pub fn append_entry(
        &self,
        org_id: &str,
        actor: &str,
        action: &str,
        request_payload: Payload,
        response_summary: Payload,
    ) -> LedgerResult<AuditLogEntry> {
        self.append(
            NewEntry::new(org_id, actor, action)
                .with_request(request_payload)
                .with_response(response_summary),
        )
    }

    /// Append one entry to `new.organization_id`'s chain.
    ///
    /// # Errors
    ///
    /// - `InvalidOrganization` for a blank organization id
    /// - `Serialization` if a payload cannot be canonicalized
    /// - whatever the repository returns for the read or the insert
    pub fn append(&self, new: NewEntry) -> LedgerResult<AuditLogEntry> {
        if new.organization_id.trim().is_empty() {
            return Err(LedgerError::InvalidOrganization {
                reason: "organization id must not be empty".to_string(),
            });
        }

        let input_hash = hash_payload(&new.request_payload)?;
        let output_hash = hash_payload(&new.response_summary)?;

        match self.mode {
            ChainConsistencyMode::StrictlySerialized => {
                let lock = self.locks.lock_for(&new.organization_id)?;
                // The mutex guards no data, so a poisoned lock is still usable.
                let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
                // Excludes writers on other handles to the same store.
                let _chain = self.repository.lock_chain(&new.organization_id)?;
                self.link_and_insert(new, input_hash, output_hash)
            }
            ChainConsistencyMode::EventuallyConsistent => {
                self.link_and_insert(new, input_hash, output_hash)
            }
        }
    }

    /// Append without letting an audit failure reach the caller.
    ///
    /// The audited business action must not be rolled back because its
    /// audit row could not be written.  Failures are logged at `warn` and
    /// reported as `None`.
    pub fn record_best_effort(&self, new: NewEntry) -> Option<AuditLogEntry> {
        let org_id = new.organization_id.clone();
        let action = new.action.clone();

        match self.append(new) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(
                    organization_id = %org_id,
                    action = %action,
                    error = %e,
                    "audit entry could not be recorded"
                );
                None
            }
        }
    }

    fn link_and_insert(
        &self,
        new: NewEntry,
        input_hash: String,
        output_hash: String,
    ) -> LedgerResult<AuditLogEntry> {
        let latest = self.repository.find_latest_by_org(&new.organization_id)?;

        let prev_hash = latest
            .as_ref()
            .and_then(|entry| entry.output_hash.clone())
            .unwrap_or_else(|| GENESIS_HASH.to_string());

        // Never stamp an entry earlier than the one it links to, so timestamp
        // order and link order agree even when clocks step backwards.
        let now = (self.clock)();
        let timestamp = match &latest {
            Some(entry) if entry.timestamp > now => entry.timestamp,
            _ => now,
        };

        let entry = AuditLogEntry {
            id: EntryId::new(),
            organization_id: new.organization_id,
            timestamp,
            actor: new.actor,
            agent: new.agent,
            action: new.action,
            event_type: new.event_type,
            status: new.status,
            input_hash: Some(input_hash),
            output_hash: Some(output_hash),
            prev_hash: Some(prev_hash),
            request_payload: new.request_payload,
            response_summary: new.response_summary,
            reasoning_chain: new.reasoning_chain,
        };

        if let Err(e) = self.repository.insert(&entry) {
            warn!(
                organization_id = %entry.organization_id,
                entry_id = %entry.id,
                error = %e,
                "audit entry insert failed"
            );
            return Err(e);
        }

        debug!(
            organization_id = %entry.organization_id,
            entry_id = %entry.id,
            action = %entry.action,
            prev_hash = ?entry.prev_hash,
            "audit entry appended"
        );

        Ok(entry)
    }
}
