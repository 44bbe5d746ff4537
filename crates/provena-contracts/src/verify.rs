//! Chain verification report types.
//!
//! A broken chain is a normal verification *result*, surfaced to users as a
//! warning.  Nothing in this module is an error type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entry::EntryId;

/// What kind of mismatch a `BrokenLink` records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakKind {
    /// `prev_hash` differs from the preceding entry's `output_hash`.
    #[default]
    ChainLink,
    /// The first entry's `prev_hash` is not the genesis value.
    Genesis,
    /// The stored `input_hash` does not match the stored request payload.
    InputHash,
    /// The stored `output_hash` does not match the stored response summary.
    OutputHash,
}

/// One integrity failure, attributed to the entry that carries the bad hash.
///
/// For `ChainLink` breaks `entry_id` is the later entry of the pair,
/// `expected_hash` the earlier entry's `output_hash` and `actual_hash` the
/// later entry's `prev_hash`.  For content breaks `expected_hash` is the
/// recomputed digest and `actual_hash` the stored one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokenLink {
    pub entry_id: EntryId,
    #[serde(default)]
    pub kind: BreakKind,
    pub expected_hash: String,
    pub actual_hash: String,
}

/// The outcome of walking one organization's chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub organization_id: String,

    /// True when no broken link was found.  Vacuously true for empty chains.
    pub is_valid: bool,

    pub total_entries: usize,

    /// Link comparisons made: adjacent pairs that carried both hashes, plus
    /// the genesis check on the first entry when it has a `prev_hash`.
    pub checked_links: usize,

    /// Every integrity failure, in chain order.
    pub broken_links: Vec<BrokenLink>,

    pub first_entry_timestamp: Option<DateTime<Utc>>,
    pub last_entry_timestamp: Option<DateTime<Utc>>,

    /// Whole days between the first and last entry, rounded down.
    pub chain_duration_days: Option<i64>,
}

impl VerificationReport {
    /// The report for an organization with no entries.
    pub fn empty(organization_id: impl Into<String>) -> Self {
        Self {
            organization_id: organization_id.into(),
            is_valid: true,
            total_entries: 0,
            checked_links: 0,
            broken_links: Vec::new(),
            first_entry_timestamp: None,
            last_entry_timestamp: None,
            chain_duration_days: None,
        }
    }
}

/// Natural-language commentary on a verification report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insights {
    pub ai_insights: Option<String>,
    pub recommendation: Option<String>,
}

/// The response of the verification call.
///
/// ```json
/// { "verification": { "is_valid": true, ... }, "ai_insights": "...", "recommendation": "..." }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResponse {
    pub verification: VerificationReport,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_insights: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
}

impl VerificationResponse {
    pub fn new(verification: VerificationReport, insights: Insights) -> Self {
        Self {
            verification,
            ai_insights: insights.ai_insights,
            recommendation: insights.recommendation,
        }
    }
}

/// The request body of the verification call: `{ "org_id": "..." }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRequest {
    pub org_id: String,
}
