//! Core trait definitions for the Provena ledger.
//!
//! - `AuditLogRepository`: trusted store (holds every entry immutably)
//! - `InsightProvider`: untrusted commentator (may be backed by an LLM)
//!
//! The chain writer and verifier receive a repository explicitly; nothing in
//! the ledger reaches for an ambient client.

use std::sync::Arc;

use provena_contracts::{
    entry::AuditLogEntry,
    error::LedgerResult,
    verify::{Insights, VerificationReport},
};

/// Persistent storage for audit entries, partitioned by organization.
///
/// The interface is append-only on purpose: there is no update or delete.
/// Removing a row would silently break the chain for every later entry.
pub trait AuditLogRepository: Send + Sync {
    /// Persist one entry.
    ///
    /// Implementations may reject entries for organizations they do not
    /// know with `LedgerError::UnknownOrganization`.
    fn insert(&self, entry: &AuditLogEntry) -> LedgerResult<()>;

    /// The most recent entry for `org_id` by timestamp, ties resolved in
    /// favor of the later insert.  `None` for an empty chain.
    fn find_latest_by_org(&self, org_id: &str) -> LedgerResult<Option<AuditLogEntry>>;

    /// Every entry for `org_id`, ascending by timestamp, ties in insertion
    /// order.
    fn find_all_by_org_ordered_by_time(&self, org_id: &str) -> LedgerResult<Vec<AuditLogEntry>>;

    /// Take an exclusive hold on `org_id`'s chain, shared with every other
    /// handle on the same store, including ones in other processes.
    ///
    /// Strictly serialized writers hold the returned guard across
    /// read-latest + insert.  Stores that are only ever reached through one
    /// writer return `None`; the writer's in-process locks are enough there.
    fn lock_chain(&self, _org_id: &str) -> LedgerResult<Option<ChainGuard>> {
        Ok(None)
    }
}

/// An exclusive hold on a chain, released when dropped.
pub struct ChainGuard {
    _hold: Box<dyn Send>,
}

impl ChainGuard {
    /// Wrap a value whose `Drop` releases the hold.
    pub fn new(hold: impl Send + 'static) -> Self {
        Self {
            _hold: Box::new(hold),
        }
    }
}

impl<R: AuditLogRepository + ?Sized> AuditLogRepository for Arc<R> {
    fn insert(&self, entry: &AuditLogEntry) -> LedgerResult<()> {
        (**self).insert(entry)
    }

    fn find_latest_by_org(&self, org_id: &str) -> LedgerResult<Option<AuditLogEntry>> {
        (**self).find_latest_by_org(org_id)
    }

    fn find_all_by_org_ordered_by_time(&self, org_id: &str) -> LedgerResult<Vec<AuditLogEntry>> {
        (**self).find_all_by_org_ordered_by_time(org_id)
    }

    fn lock_chain(&self, org_id: &str) -> LedgerResult<Option<ChainGuard>> {
        (**self).lock_chain(org_id)
    }
}

/// Turns a verification report into free text for the audit-trail viewer.
///
/// The production implementation forwards the report JSON to an external
/// language model and returns whatever text comes back; no structure is
/// guaranteed.  Failures never invalidate the verification itself.
pub trait InsightProvider: Send + Sync {
    fn summarize(&self, report: &VerificationReport) -> LedgerResult<Insights>;
}
