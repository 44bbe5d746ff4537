//! Chain verification.
//!
//! Entries are walked in ascending timestamp order (ties in insertion
//! order).  Three rules are checked:
//!
//! 1. **Linkage**: for every adjacent pair `(prev, next)`,
//!    `next.prev_hash == prev.output_hash`.
//! 2. **Genesis**: the first entry's `prev_hash` is `GENESIS_HASH`.
//! 3. **Content** (optional, on by default): each stored `input_hash` /
//!    `output_hash` equals the digest recomputed from the stored payload.
//!
//! Rules 1 and 2 only compare hashes that are present; an entry missing a
//! hash is skipped rather than counted as broken.  Verification does not
//! stop at the first failure: every break is collected, in chain order.
//!
//! A valid result only says that the entries present are consistent.
//! Deleting an entry and rewriting its successor's `prev_hash` is not
//! detectable here.

use std::sync::Arc;

use tracing::{info, warn};

use provena_contracts::{
    entry::AuditLogEntry,
    error::LedgerResult,
    payload::Payload,
    verify::{BreakKind, BrokenLink, VerificationReport},
    GENESIS_HASH,
};
use provena_core::traits::AuditLogRepository;

use crate::hash::hash_payload;

const MILLIS_PER_DAY: i64 = 86_400_000;

/// Walks an organization's chain and reports every broken link.
pub struct ChainVerifier {
    repository: Arc<dyn AuditLogRepository>,
    recompute_hashes: bool,
}

impl ChainVerifier {
    pub fn new(repository: Arc<dyn AuditLogRepository>) -> Self {
        Self {
            repository,
            recompute_hashes: true,
        }
    }

    /// Enable or disable the content rule.
    pub fn with_hash_recomputation(mut self, enabled: bool) -> Self {
        self.recompute_hashes = enabled;
        self
    }

    /// Fetch and verify `org_id`'s full chain.
    ///
    /// An organization with no entries is vacuously valid.  Only a failed
    /// repository read is an error; a broken chain is a normal result.
    pub fn verify_chain(&self, org_id: &str) -> LedgerResult<VerificationReport> {
        let entries = self.repository.find_all_by_org_ordered_by_time(org_id)?;
        let report = verify_entries(org_id, &entries, self.recompute_hashes);

        info!(
            organization_id = %org_id,
            total_entries = report.total_entries,
            checked_links = report.checked_links,
            broken_links = report.broken_links.len(),
            is_valid = report.is_valid,
            "audit chain verified"
        );

        Ok(report)
    }
}

/// Verify `entries`, which must already be in ascending timestamp order.
///
/// The genesis rule applies to chains of any length: a lone entry whose
/// `prev_hash` is present but not `GENESIS_HASH` is reported as a
/// `Genesis` break even though it has no adjacent pair.  An entry with no
/// `prev_hash` at all is skipped.
pub fn verify_entries(
    org_id: &str,
    entries: &[AuditLogEntry],
    recompute_hashes: bool,
) -> VerificationReport {
    let (first, last) = match (entries.first(), entries.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return VerificationReport::empty(org_id),
    };

    let mut breaks = Vec::new();
    let mut checked_links = 0;

    for (idx, entry) in entries.iter().enumerate() {
        let expected_prev = match idx {
            0 => Some(GENESIS_HASH),
            _ => entries[idx - 1].output_hash.as_deref(),
        };

        if let (Some(expected), Some(actual)) = (expected_prev, entry.prev_hash.as_deref()) {
            checked_links += 1;
            if expected != actual {
                let kind = if idx == 0 {
                    BreakKind::Genesis
                } else {
                    BreakKind::ChainLink
                };
                breaks.push(broken(entry, kind, expected, actual));
            }
        }

        if recompute_hashes {
            check_content(
                entry,
                &entry.input_hash,
                &entry.request_payload,
                BreakKind::InputHash,
                &mut breaks,
            );
            check_content(
                entry,
                &entry.output_hash,
                &entry.response_summary,
                BreakKind::OutputHash,
                &mut breaks,
            );
        }
    }

    for link in &breaks {
        warn!(
            organization_id = %org_id,
            entry_id = %link.entry_id,
            kind = ?link.kind,
            expected_hash = %link.expected_hash,
            actual_hash = %link.actual_hash,
            "audit chain link broken"
        );
    }

    let span_ms = (last.timestamp - first.timestamp).num_milliseconds();

    VerificationReport {
        organization_id: org_id.to_string(),
        is_valid: breaks.is_empty(),
        total_entries: entries.len(),
        checked_links,
        broken_links: breaks,
        first_entry_timestamp: Some(first.timestamp),
        last_entry_timestamp: Some(last.timestamp),
        chain_duration_days: Some(span_ms.div_euclid(MILLIS_PER_DAY)),
    }
}

fn check_content(
    entry: &AuditLogEntry,
    stored: &Option<String>,
    payload: &Payload,
    kind: BreakKind,
    breaks: &mut Vec<BrokenLink>,
) {
    let Some(stored) = stored else {
        return;
    };

    match hash_payload(payload) {
        Ok(recomputed) if &recomputed == stored => {}
        Ok(recomputed) => breaks.push(broken(entry, kind, &recomputed, stored)),
        // A stored payload that cannot be canonicalized cannot match its hash.
        Err(_) => breaks.push(broken(entry, kind, "", stored)),
    }
}

fn broken(entry: &AuditLogEntry, kind: BreakKind, expected: &str, actual: &str) -> BrokenLink {
    BrokenLink {
        entry_id: entry.id.clone(),
        kind,
        expected_hash: expected.to_string(),
        actual_hash: actual.to_string(),
    }
}
