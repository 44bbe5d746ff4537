//! # provena-audit
//!
//! Tenant-scoped, append-only, SHA-256 hash-chained audit log.
//!
//! ## Overview
//!
//! Every compliance-relevant action appends an `AuditLogEntry` to its
//! organization's chain.  The entry stores the hash of its request payload
//! (`input_hash`), the hash of its response summary (`output_hash`), and the
//! `output_hash` of the entry before it (`prev_hash`).  `ChainVerifier` walks
//! the chain and reports every place those links or hashes disagree.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use provena_audit::{ChainVerifier, ChainWriter, InMemoryAuditLogRepository};
//! use provena_contracts::ChainConsistencyMode;
//!
//! let repo: Arc<dyn AuditLogRepository> = Arc::new(InMemoryAuditLogRepository::new());
//! let writer = ChainWriter::new(repo.clone(), ChainConsistencyMode::StrictlySerialized);
//! writer.append_entry("org-1", "alice", "assessment.run", json!({"x": 1}).into(), json!({"y": 1}).into())?;
//!
//! let report = ChainVerifier::new(repo).verify_chain("org-1")?;
//! assert!(report.is_valid);
//! ```

pub mod hash;
pub mod insights;
pub mod jsonl;
pub mod lock;
pub mod memory;
pub mod service;
pub mod verifier;
pub mod writer;

pub use hash::{canonicalize, hash_payload, sha256_hex};
pub use insights::RuleBasedInsights;
pub use jsonl::JsonLinesAuditLogRepository;
pub use lock::OrgLocks;
pub use memory::InMemoryAuditLogRepository;
pub use service::VerificationService;
pub use verifier::{verify_entries, ChainVerifier};
pub use writer::ChainWriter;

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier, Mutex};
    use std::time::Duration;

    use chrono::{DateTime, TimeZone, Utc};
    use serde_json::json;

    use provena_contracts::{
        config::ChainConsistencyMode,
        entry::{AuditLogEntry, EntryStatus, NewEntry},
        error::{LedgerError, LedgerResult},
        payload::{ActionRecord, Payload},
        verify::{BreakKind, Insights, VerificationReport},
        GENESIS_HASH,
    };
    use provena_core::traits::{AuditLogRepository, ChainGuard, InsightProvider};

    use super::*;

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn setup(
        mode: ChainConsistencyMode,
    ) -> (InMemoryAuditLogRepository, ChainWriter, ChainVerifier) {
        let repo = InMemoryAuditLogRepository::new();
        let shared: Arc<dyn AuditLogRepository> = Arc::new(repo.clone());
        let writer = ChainWriter::new(shared.clone(), mode);
        let verifier = ChainVerifier::new(shared);
        (repo, writer, verifier)
    }

    /// Append `n` entries with distinguishable payloads.
    fn append_n(writer: &ChainWriter, org: &str, n: usize) -> Vec<AuditLogEntry> {
        (0..n)
            .map(|i| {
                writer
                    .append_entry(
                        org,
                        "auditor@example.com",
                        "assessment.run",
                        json!({ "step": i }).into(),
                        json!({ "result": i }).into(),
                    )
                    .unwrap()
            })
            .collect()
    }

    /// Mutate the `idx`-th stored entry of `org` in place.
    fn tamper(
        repo: &InMemoryAuditLogRepository,
        org: &str,
        idx: usize,
        f: impl FnOnce(&mut AuditLogEntry),
    ) {
        let mut state = repo.state.lock().unwrap();
        f(&mut state.chains.get_mut(org).unwrap()[idx]);
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, hour, 0, 0).unwrap()
    }

    /// A writer whose clock reads from the returned handle.
    fn pinned_clock_writer(
        repo: &InMemoryAuditLogRepository,
        start: DateTime<Utc>,
    ) -> (ChainWriter, Arc<Mutex<DateTime<Utc>>>) {
        let now = Arc::new(Mutex::new(start));
        let clock_now = now.clone();
        let writer = ChainWriter::new(
            Arc::new(repo.clone()),
            ChainConsistencyMode::StrictlySerialized,
        )
        .with_clock(Arc::new(move || *clock_now.lock().unwrap()));
        (writer, now)
    }

    // ── Hash function ─────────────────────────────────────────────────────────

    #[test]
    fn test_sha256_hex_known_vectors() {
        assert_eq!(
            sha256_hex(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            sha256_hex("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_sha256_hex_deterministic_and_distinct() {
        let inputs = ["{\"x\":1}", "{\"x\":2}", "{\"y\":1}", "", " "];
        for input in inputs {
            let digest = sha256_hex(input);
            assert_eq!(digest, sha256_hex(input), "digest must be deterministic");
            assert!(hash::is_sha256_hex(&digest), "digest must be 64 lowercase hex chars");
        }

        let unique: std::collections::HashSet<String> =
            inputs.iter().map(|i| sha256_hex(i)).collect();
        assert_eq!(unique.len(), inputs.len(), "distinct inputs must hash differently");
    }

    #[test]
    fn test_canonicalize_sorts_keys_at_every_depth() {
        let value = json!({
            "b": 1,
            "a": { "d": [3, { "z": 1, "y": 2 }], "c": null },
        });

        assert_eq!(
            canonicalize(&value).unwrap(),
            r#"{"a":{"c":null,"d":[3,{"y":2,"z":1}]},"b":1}"#
        );
    }

    #[test]
    fn test_canonicalize_ignores_source_formatting() {
        let spaced: serde_json::Value =
            serde_json::from_str("{ \"y\" : 1 ,\n  \"x\": \"caf\\u00e9\" }").unwrap();
        let compact: serde_json::Value = serde_json::from_str(r#"{"x":"café","y":1}"#).unwrap();

        assert_eq!(canonicalize(&spaced).unwrap(), canonicalize(&compact).unwrap());
        assert_eq!(
            hash_payload(&Payload::from(spaced)).unwrap(),
            hash_payload(&Payload::from(compact)).unwrap()
        );
    }

    // ── Chain writer ──────────────────────────────────────────────────────────

    /// A: {x:1} → {y:1}, B: {x:2} → {y:2} for "org-1".
    #[test]
    fn test_two_entry_scenario() {
        let (_repo, writer, verifier) = setup(ChainConsistencyMode::StrictlySerialized);

        let a = writer
            .append_entry(
                "org-1",
                "alice",
                "assessment.run",
                json!({"x": 1}).into(),
                json!({"y": 1}).into(),
            )
            .unwrap();
        let b = writer
            .append_entry(
                "org-1",
                "alice",
                "assessment.run",
                json!({"x": 2}).into(),
                json!({"y": 2}).into(),
            )
            .unwrap();

        assert_eq!(a.prev_hash.as_deref(), Some(GENESIS_HASH));
        assert_eq!(a.input_hash, Some(sha256_hex(r#"{"x":1}"#)));
        assert_eq!(a.output_hash, Some(sha256_hex(r#"{"y":1}"#)));
        assert_eq!(b.prev_hash, Some(sha256_hex(r#"{"y":1}"#)));

        let report = verifier.verify_chain("org-1").unwrap();
        assert!(report.is_valid);
        assert_eq!(report.total_entries, 2);
        assert!(report.broken_links.is_empty());
    }

    #[test]
    fn test_sequential_appends_link_to_previous_output() {
        let (_repo, writer, _) = setup(ChainConsistencyMode::EventuallyConsistent);
        let entries = append_n(&writer, "org-seq", 5);

        assert_eq!(
            entries[0].prev_hash.as_deref(),
            Some(GENESIS_HASH),
            "first entry of a fresh org must link to the genesis value"
        );
        for pair in entries.windows(2) {
            assert_eq!(pair[1].prev_hash, pair[0].output_hash);
        }
    }

    #[test]
    fn test_append_records_optional_fields() {
        let (_repo, writer, _) = setup(ChainConsistencyMode::StrictlySerialized);
        let request = Payload::from_record(&ActionRecord::AssessmentRun {
            framework: "eu_ai_act".to_string(),
            system_name: "cv-screener".to_string(),
            risk_level: Some("high".to_string()),
            score: None,
        })
        .unwrap();

        let entry = writer
            .append(
                NewEntry::new("org-1", "alice", "assessment.run")
                    .with_agent("risk-classifier")
                    .with_event_type("assessment")
                    .with_status(EntryStatus::Success)
                    .with_request(request.clone())
                    .with_reasoning(json!(["article 6(2)", "annex III"])),
            )
            .unwrap();

        assert_eq!(entry.agent.as_deref(), Some("risk-classifier"));
        assert_eq!(entry.event_type.as_deref(), Some("assessment"));
        assert_eq!(entry.status, Some(EntryStatus::Success));
        assert_eq!(entry.input_hash, Some(hash_payload(&request).unwrap()));
        assert!(matches!(
            entry.request_payload.record(),
            Some(ActionRecord::AssessmentRun { .. })
        ));
        // An absent response still hashes deterministically (as `null`).
        assert_eq!(entry.output_hash, Some(sha256_hex("null")));
    }

    #[test]
    fn test_blank_organization_rejected() {
        let (repo, writer, _) = setup(ChainConsistencyMode::StrictlySerialized);

        let err = writer
            .append_entry("  ", "alice", "noop", Payload::empty(), Payload::empty())
            .unwrap_err();

        assert!(matches!(err, LedgerError::InvalidOrganization { .. }));
        assert!(repo.is_empty());
    }

    #[test]
    fn test_chains_are_partitioned_by_organization() {
        let (_repo, writer, verifier) = setup(ChainConsistencyMode::StrictlySerialized);

        let a1 = append_n(&writer, "org-a", 1).remove(0);
        let b1 = append_n(&writer, "org-b", 1).remove(0);
        let a2 = append_n(&writer, "org-a", 1).remove(0);

        assert_eq!(a1.prev_hash.as_deref(), Some(GENESIS_HASH));
        assert_eq!(b1.prev_hash.as_deref(), Some(GENESIS_HASH));
        assert_eq!(a2.prev_hash, a1.output_hash);

        assert_eq!(verifier.verify_chain("org-a").unwrap().total_entries, 2);
        assert_eq!(verifier.verify_chain("org-b").unwrap().total_entries, 1);
    }

    #[test]
    fn test_timestamp_never_precedes_linked_entry() {
        let repo = InMemoryAuditLogRepository::new();
        let (writer, now) = pinned_clock_writer(&repo, at(10, 12));

        let first = append_n(&writer, "org-clock", 1).remove(0);
        // Wall clock steps backwards by a day.
        *now.lock().unwrap() = at(9, 12);
        let second = append_n(&writer, "org-clock", 1).remove(0);

        assert_eq!(second.timestamp, first.timestamp);
        let report = ChainVerifier::new(Arc::new(repo)).verify_chain("org-clock").unwrap();
        assert!(report.is_valid, "equal timestamps must keep insertion order");
    }

    #[test]
    fn test_best_effort_swallows_unknown_tenant() {
        let repo = InMemoryAuditLogRepository::with_tenants(["org-1"]);
        let writer = ChainWriter::new(Arc::new(repo.clone()), ChainConsistencyMode::StrictlySerialized);

        let err = writer
            .append_entry("org-2", "mallory", "role.change", Payload::empty(), Payload::empty())
            .unwrap_err();
        assert!(matches!(err, LedgerError::UnknownOrganization { ref org_id } if org_id == "org-2"));

        let recorded = writer.record_best_effort(NewEntry::new("org-2", "mallory", "role.change"));
        assert!(recorded.is_none());
        assert!(repo.is_empty());

        assert!(writer
            .record_best_effort(NewEntry::new("org-1", "alice", "role.change"))
            .is_some());
        assert_eq!(repo.len(), 1);
    }

    /// A store that is reachable for reads but rejects every write.
    struct ReadOnlyRepository;

    impl AuditLogRepository for ReadOnlyRepository {
        fn insert(&self, _entry: &AuditLogEntry) -> LedgerResult<()> {
            Err(LedgerError::Storage {
                reason: "database is read-only".to_string(),
            })
        }

        fn find_latest_by_org(&self, _org_id: &str) -> LedgerResult<Option<AuditLogEntry>> {
            Ok(None)
        }

        fn find_all_by_org_ordered_by_time(&self, _org_id: &str) -> LedgerResult<Vec<AuditLogEntry>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_storage_failure_propagates_or_is_swallowed() {
        let writer = ChainWriter::new(Arc::new(ReadOnlyRepository), ChainConsistencyMode::EventuallyConsistent);

        let err = writer
            .append_entry("org-1", "alice", "report.generate", Payload::empty(), Payload::empty())
            .unwrap_err();
        assert!(err.to_string().contains("read-only"));

        // The business action that triggered this audit must still go ahead.
        assert!(writer
            .record_best_effort(NewEntry::new("org-1", "alice", "report.generate"))
            .is_none());
    }

    // ── Chain verifier ────────────────────────────────────────────────────────

    #[test]
    fn test_round_trip_verifies() {
        let (_repo, writer, verifier) = setup(ChainConsistencyMode::StrictlySerialized);
        append_n(&writer, "org-rt", 10);

        let report = verifier.verify_chain("org-rt").unwrap();
        assert!(report.is_valid);
        assert_eq!(report.total_entries, 10);
        assert_eq!(report.checked_links, 10, "genesis check plus nine adjacent pairs");
    }

    #[test]
    fn test_verify_empty_chain() {
        let (_repo, _writer, verifier) = setup(ChainConsistencyMode::StrictlySerialized);

        let report = verifier.verify_chain("org-none").unwrap();
        assert!(report.is_valid, "an empty chain must be considered valid");
        assert_eq!(report.total_entries, 0);
        assert_eq!(report.first_entry_timestamp, None);
        assert_eq!(report.chain_duration_days, None);

        assert_eq!(verify_entries("org-none", &[], true), VerificationReport::empty("org-none"));
    }

    #[test]
    fn test_verify_single_entry() {
        let (_repo, writer, verifier) = setup(ChainConsistencyMode::StrictlySerialized);
        let only = append_n(&writer, "org-one", 1).remove(0);

        let report = verifier.verify_chain("org-one").unwrap();
        assert!(report.is_valid);
        assert_eq!(report.total_entries, 1);
        assert_eq!(report.first_entry_timestamp, Some(only.timestamp));
        assert_eq!(report.last_entry_timestamp, Some(only.timestamp));
        assert_eq!(report.chain_duration_days, Some(0));
    }

    #[test]
    fn test_single_entry_with_foreign_prev_hash_is_invalid() {
        let (repo, writer, verifier) = setup(ChainConsistencyMode::StrictlySerialized);
        let only = append_n(&writer, "org-one", 1).remove(0);

        tamper(&repo, "org-one", 0, |e| e.prev_hash = Some(sha256_hex("truncated-history")));

        let report = verifier.verify_chain("org-one").unwrap();
        assert!(!report.is_valid);
        assert_eq!(report.total_entries, 1);
        assert_eq!(report.checked_links, 1);
        assert_eq!(report.broken_links.len(), 1);
        assert_eq!(report.broken_links[0].entry_id, only.id);
        assert_eq!(report.broken_links[0].kind, BreakKind::Genesis);
        assert_eq!(report.broken_links[0].expected_hash, GENESIS_HASH);

        // Without a prev_hash there is nothing to compare.
        tamper(&repo, "org-one", 0, |e| e.prev_hash = None);
        assert!(verifier.verify_chain("org-one").unwrap().is_valid);
    }

    #[test]
    fn test_tampered_middle_output_hash_detected() {
        let (repo, writer, verifier) = setup(ChainConsistencyMode::StrictlySerialized);
        let entries = append_n(&writer, "org-t", 5);

        tamper(&repo, "org-t", 2, |e| e.output_hash = Some(sha256_hex("forged")));

        let report = verifier.verify_chain("org-t").unwrap();
        assert!(!report.is_valid);

        // The forged hash no longer matches entry 2's payload...
        let content = &report.broken_links[0];
        assert_eq!(content.entry_id, entries[2].id);
        assert_eq!(content.kind, BreakKind::OutputHash);
        assert_eq!(content.actual_hash, sha256_hex("forged"));

        // ...and entry 3 no longer links to it.
        let link = &report.broken_links[1];
        assert_eq!(link.entry_id, entries[3].id);
        assert_eq!(link.kind, BreakKind::ChainLink);
        assert_eq!(link.expected_hash, sha256_hex("forged"));
        assert_eq!(link.actual_hash, entries[2].output_hash.clone().unwrap());
        assert_eq!(report.broken_links.len(), 2);
    }

    #[test]
    fn test_tampered_prev_hash_detected() {
        let (repo, writer, verifier) = setup(ChainConsistencyMode::StrictlySerialized);
        let entries = append_n(&writer, "org-t", 4);

        tamper(&repo, "org-t", 3, |e| e.prev_hash = Some(sha256_hex("elsewhere")));

        let report = verifier.verify_chain("org-t").unwrap();
        assert!(!report.is_valid);
        assert_eq!(report.broken_links.len(), 1);
        assert_eq!(report.broken_links[0].entry_id, entries[3].id);
        assert_eq!(report.broken_links[0].kind, BreakKind::ChainLink);
    }

    #[test]
    fn test_tampered_chain_ends_detected() {
        let (repo, writer, verifier) = setup(ChainConsistencyMode::StrictlySerialized);
        let entries = append_n(&writer, "org-t", 3);

        // Neither end is covered by an adjacent pair.
        tamper(&repo, "org-t", 0, |e| e.prev_hash = Some(sha256_hex("before-genesis")));
        tamper(&repo, "org-t", 2, |e| e.output_hash = Some(sha256_hex("rewritten")));

        let report = verifier.verify_chain("org-t").unwrap();
        assert!(!report.is_valid);

        let kinds: Vec<_> = report
            .broken_links
            .iter()
            .map(|l| (l.entry_id.clone(), l.kind))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (entries[0].id.clone(), BreakKind::Genesis),
                (entries[2].id.clone(), BreakKind::OutputHash),
            ]
        );
    }

    #[test]
    fn test_all_breaks_are_collected() {
        let (repo, writer, verifier) = setup(ChainConsistencyMode::StrictlySerialized);
        let entries = append_n(&writer, "org-t", 6);

        tamper(&repo, "org-t", 1, |e| e.prev_hash = Some(sha256_hex("a")));
        tamper(&repo, "org-t", 4, |e| e.prev_hash = Some(sha256_hex("b")));

        let report = verifier.verify_chain("org-t").unwrap();
        let ids: Vec<_> = report.broken_links.iter().map(|l| l.entry_id.clone()).collect();
        assert_eq!(ids, vec![entries[1].id.clone(), entries[4].id.clone()]);
    }

    #[test]
    fn test_edited_payload_detected_only_with_recomputation() {
        let (repo, writer, verifier) = setup(ChainConsistencyMode::StrictlySerialized);
        let entries = append_n(&writer, "org-t", 3);

        tamper(&repo, "org-t", 1, |e| {
            e.request_payload = json!({ "step": "edited" }).into();
        });

        let report = verifier.verify_chain("org-t").unwrap();
        assert!(!report.is_valid);
        assert_eq!(report.broken_links.len(), 1);
        assert_eq!(report.broken_links[0].entry_id, entries[1].id);
        assert_eq!(report.broken_links[0].kind, BreakKind::InputHash);

        let links_only = verifier.with_hash_recomputation(false);
        assert!(links_only.verify_chain("org-t").unwrap().is_valid);
    }

    #[test]
    fn test_missing_hashes_are_skipped() {
        let (repo, writer, verifier) = setup(ChainConsistencyMode::StrictlySerialized);
        append_n(&writer, "org-legacy", 4);

        // Legacy rows: one without an output hash, one without a prev hash.
        tamper(&repo, "org-legacy", 1, |e| e.output_hash = None);
        tamper(&repo, "org-legacy", 3, |e| e.prev_hash = None);

        let report = verifier.verify_chain("org-legacy").unwrap();
        assert!(report.is_valid);
        assert_eq!(report.total_entries, 4);
        // genesis + (0,1) checked; (1,2) and (2,3) skipped.
        assert_eq!(report.checked_links, 2);
    }

    #[test]
    fn test_chain_duration_rounds_down_to_whole_days() {
        let repo = InMemoryAuditLogRepository::new();
        let (writer, now) = pinned_clock_writer(&repo, at(1, 0));

        append_n(&writer, "org-span", 1);
        *now.lock().unwrap() = at(3, 23);
        append_n(&writer, "org-span", 1);

        let report = ChainVerifier::new(Arc::new(repo)).verify_chain("org-span").unwrap();
        assert_eq!(report.first_entry_timestamp, Some(at(1, 0)));
        assert_eq!(report.last_entry_timestamp, Some(at(3, 23)));
        assert_eq!(report.chain_duration_days, Some(2));
    }

    // ── Consistency modes ─────────────────────────────────────────────────────

    /// Holds every reader at a barrier after it has read the latest entry,
    /// so concurrent writers are guaranteed to see the same predecessor.
    struct RacingRepository {
        inner: InMemoryAuditLogRepository,
        barrier: Barrier,
    }

    impl AuditLogRepository for RacingRepository {
        fn insert(&self, entry: &AuditLogEntry) -> LedgerResult<()> {
            self.inner.insert(entry)
        }

        fn find_latest_by_org(&self, org_id: &str) -> LedgerResult<Option<AuditLogEntry>> {
            let latest = self.inner.find_latest_by_org(org_id)?;
            self.barrier.wait();
            Ok(latest)
        }

        fn find_all_by_org_ordered_by_time(&self, org_id: &str) -> LedgerResult<Vec<AuditLogEntry>> {
            self.inner.find_all_by_org_ordered_by_time(org_id)
        }
    }

    #[test]
    fn test_eventually_consistent_fork_is_reported() {
        let inner = InMemoryAuditLogRepository::new();
        let racing = Arc::new(RacingRepository {
            inner: inner.clone(),
            barrier: Barrier::new(2),
        });
        let writer = ChainWriter::new(racing, ChainConsistencyMode::EventuallyConsistent);

        std::thread::scope(|s| {
            for i in 0..2 {
                let writer = &writer;
                s.spawn(move || {
                    writer
                        .append_entry(
                            "org-race",
                            "worker",
                            "pii.redact",
                            json!({ "doc": i }).into(),
                            json!({ "redacted": i }).into(),
                        )
                        .unwrap();
                });
            }
        });

        let entries = inner.find_all_by_org_ordered_by_time("org-race").unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries
            .iter()
            .all(|e| e.prev_hash.as_deref() == Some(GENESIS_HASH)));

        let report = ChainVerifier::new(Arc::new(inner)).verify_chain("org-race").unwrap();
        assert!(!report.is_valid, "a forked chain must fail verification");
        assert_eq!(report.broken_links.len(), 1);
        assert_eq!(report.broken_links[0].entry_id, entries[1].id);
        assert_eq!(report.broken_links[0].kind, BreakKind::ChainLink);
        assert_eq!(report.broken_links[0].actual_hash, GENESIS_HASH);
    }

    /// Widens the read-then-insert window so unserialized writers would race.
    struct SlowRepository {
        inner: InMemoryAuditLogRepository,
    }

    impl AuditLogRepository for SlowRepository {
        fn insert(&self, entry: &AuditLogEntry) -> LedgerResult<()> {
            self.inner.insert(entry)
        }

        fn find_latest_by_org(&self, org_id: &str) -> LedgerResult<Option<AuditLogEntry>> {
            let latest = self.inner.find_latest_by_org(org_id)?;
            std::thread::sleep(Duration::from_millis(2));
            Ok(latest)
        }

        fn find_all_by_org_ordered_by_time(&self, org_id: &str) -> LedgerResult<Vec<AuditLogEntry>> {
            self.inner.find_all_by_org_ordered_by_time(org_id)
        }
    }

    #[test]
    fn test_strictly_serialized_concurrent_appends_stay_linear() {
        let inner = InMemoryAuditLogRepository::new();
        let writer = ChainWriter::new(
            Arc::new(SlowRepository { inner: inner.clone() }),
            ChainConsistencyMode::StrictlySerialized,
        );

        std::thread::scope(|s| {
            for t in 0..8 {
                let writer = &writer;
                s.spawn(move || {
                    for i in 0..5 {
                        writer
                            .append_entry(
                                "org-busy",
                                "worker",
                                "report.generate",
                                json!({ "thread": t, "i": i }).into(),
                                json!({ "thread": t, "done": i }).into(),
                            )
                            .unwrap();
                    }
                });
            }
            // A second organization is not blocked by the first.
            let writer = &writer;
            s.spawn(move || {
                append_n(writer, "org-quiet", 3);
            });
        });

        let verifier = ChainVerifier::new(Arc::new(inner));
        let busy = verifier.verify_chain("org-busy").unwrap();
        assert!(busy.is_valid, "serialized writers must never fork: {:?}", busy.broken_links);
        assert_eq!(busy.total_entries, 40);
        assert_eq!(busy.checked_links, 40);
        assert!(verifier.verify_chain("org-quiet").unwrap().is_valid);
    }

    /// Counts `lock_chain` calls and how many guards are currently held.
    #[derive(Default)]
    struct GuardedRepository {
        inner: InMemoryAuditLogRepository,
        taken: AtomicUsize,
        held: Arc<AtomicUsize>,
        held_during_insert: AtomicUsize,
    }

    struct Held(Arc<AtomicUsize>);

    impl Drop for Held {
        fn drop(&mut self) {
            self.0.fetch_sub(1, Ordering::SeqCst);
        }
    }

    impl AuditLogRepository for GuardedRepository {
        fn insert(&self, entry: &AuditLogEntry) -> LedgerResult<()> {
            self.held_during_insert
                .fetch_add(self.held.load(Ordering::SeqCst), Ordering::SeqCst);
            self.inner.insert(entry)
        }

        fn find_latest_by_org(&self, org_id: &str) -> LedgerResult<Option<AuditLogEntry>> {
            self.inner.find_latest_by_org(org_id)
        }

        fn find_all_by_org_ordered_by_time(&self, org_id: &str) -> LedgerResult<Vec<AuditLogEntry>> {
            self.inner.find_all_by_org_ordered_by_time(org_id)
        }

        fn lock_chain(&self, _org_id: &str) -> LedgerResult<Option<ChainGuard>> {
            self.taken.fetch_add(1, Ordering::SeqCst);
            self.held.fetch_add(1, Ordering::SeqCst);
            Ok(Some(ChainGuard::new(Held(self.held.clone()))))
        }
    }

    #[test]
    fn test_strict_mode_holds_repository_lock_across_insert() {
        let repo = Arc::new(GuardedRepository::default());
        let writer = ChainWriter::new(repo.clone(), ChainConsistencyMode::StrictlySerialized);
        append_n(&writer, "org-1", 3);

        assert_eq!(repo.taken.load(Ordering::SeqCst), 3);
        assert_eq!(repo.held_during_insert.load(Ordering::SeqCst), 3);
        assert_eq!(repo.held.load(Ordering::SeqCst), 0, "guards must be released");

        let eventual = ChainWriter::new(repo.clone(), ChainConsistencyMode::EventuallyConsistent);
        append_n(&eventual, "org-1", 1);
        assert_eq!(repo.taken.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_org_locks_are_shared_per_organization() {
        let locks = OrgLocks::new();
        assert!(locks.is_empty());

        let a1 = locks.lock_for("org-a").unwrap();
        let a2 = locks.lock_for("org-a").unwrap();
        let b = locks.lock_for("org-b").unwrap();

        assert!(Arc::ptr_eq(&a1, &a2));
        assert!(!Arc::ptr_eq(&a1, &b));
        assert_eq!(locks.len(), 2);
    }

    // ── Verification service ──────────────────────────────────────────────────

    struct UnreachableModel;

    impl InsightProvider for UnreachableModel {
        fn summarize(&self, _report: &VerificationReport) -> LedgerResult<Insights> {
            Err(LedgerError::Insight {
                reason: "gateway timeout".to_string(),
            })
        }
    }

    #[test]
    fn test_service_attaches_rule_based_insights() {
        let (_repo, writer, verifier) = setup(ChainConsistencyMode::StrictlySerialized);
        append_n(&writer, "org-svc", 3);

        let service = VerificationService::new(verifier).with_insights(Box::new(RuleBasedInsights::new()));
        let response = service.verify("org-svc").unwrap();

        assert!(response.verification.is_valid);
        assert!(response.ai_insights.unwrap().contains("intact"));
        assert!(response.recommendation.unwrap().contains("No action needed"));
    }

    #[test]
    fn test_service_reports_breaks_in_insights() {
        let (repo, writer, verifier) = setup(ChainConsistencyMode::StrictlySerialized);
        let entries = append_n(&writer, "org-svc", 3);
        tamper(&repo, "org-svc", 2, |e| e.prev_hash = Some(sha256_hex("x")));

        let service = VerificationService::new(verifier).with_insights(Box::new(RuleBasedInsights));
        let response = service
            .handle(&provena_contracts::verify::VerificationRequest {
                org_id: "org-svc".to_string(),
            })
            .unwrap();

        assert!(!response.verification.is_valid);
        let insight = response.ai_insights.unwrap();
        assert!(insight.contains(&entries[2].id.to_string()));
        assert!(insight.contains("do not point at the preceding entry"));
    }

    #[test]
    fn test_service_survives_insight_failure() {
        let (_repo, writer, verifier) = setup(ChainConsistencyMode::StrictlySerialized);
        append_n(&writer, "org-svc", 2);

        let service = VerificationService::new(verifier).with_insights(Box::new(UnreachableModel));
        let response = service.verify("org-svc").unwrap();

        assert!(response.verification.is_valid);
        assert_eq!(response.verification.total_entries, 2);
        assert_eq!(response.ai_insights, None);
        assert_eq!(response.recommendation, None);
    }

    #[test]
    fn test_insights_for_empty_chain() {
        let insights = RuleBasedInsights
            .summarize(&VerificationReport::empty("org-new"))
            .unwrap();
        assert!(insights.ai_insights.unwrap().contains("no audit entries"));
    }
}
