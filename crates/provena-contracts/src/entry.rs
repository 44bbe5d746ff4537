//! Audit log entries.
//!
//! `AuditLogEntry` is the persisted, immutable row.  `NewEntry` is what a
//! caller hands to the chain writer; the writer fills in the id, timestamp
//! and the three hashes.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::payload::Payload;

/// Unique identifier of one audit entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub uuid::Uuid);

impl EntryId {
    /// Create a new, unique entry ID.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Outcome of the audited action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Success,
    Error,
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryStatus::Success => f.write_str("success"),
            EntryStatus::Error => f.write_str("error"),
        }
    }
}

/// One immutable record of a compliance-relevant action.
///
/// Entries for one organization form a chain: `prev_hash` holds the
/// `output_hash` of the entry before it in timestamp order, or
/// [`GENESIS_HASH`](crate::GENESIS_HASH) for the first entry.  The hash fields
/// are optional only because rows imported from older stores may lack them;
/// the chain writer always sets all three.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: EntryId,

    /// Tenant scope.  Every chain operation is partitioned by this value.
    pub organization_id: String,

    /// Creation time (UTC).  Defines chain order; ties keep insertion order.
    pub timestamp: DateTime<Utc>,

    /// Identity of the principal that triggered the action.
    pub actor: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,

    pub action: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<EntryStatus>,

    /// SHA-256 (hex) of the canonical request payload.
    pub input_hash: Option<String>,

    /// SHA-256 (hex) of the canonical response summary.
    pub output_hash: Option<String>,

    /// `output_hash` of the preceding entry, or the genesis value.
    pub prev_hash: Option<String>,

    #[serde(default)]
    pub request_payload: Payload,

    #[serde(default)]
    pub response_summary: Payload,

    /// Free-form reasoning attached by the producer.  Not hashed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_chain: Option<serde_json::Value>,
}

/// A request to append one entry to an organization's chain.
///
/// Built with [`NewEntry::new`] and the optional `with_*` setters:
///
/// ```rust,ignore
/// let entry = NewEntry::new("org-1", "alice@example.com", "assessment.run")
///     .with_request(json!({ "system": "cv-screener" }).into())
///     .with_response(json!({ "risk": "high" }).into())
///     .with_status(EntryStatus::Success);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct NewEntry {
    pub organization_id: String,
    pub actor: String,
    pub action: String,
    pub agent: Option<String>,
    pub event_type: Option<String>,
    pub status: Option<EntryStatus>,
    pub request_payload: Payload,
    pub response_summary: Payload,
    pub reasoning_chain: Option<serde_json::Value>,
}

impl NewEntry {
    pub fn new(
        organization_id: impl Into<String>,
        actor: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            organization_id: organization_id.into(),
            actor: actor.into(),
            action: action.into(),
            agent: None,
            event_type: None,
            status: None,
            request_payload: Payload::empty(),
            response_summary: Payload::empty(),
            reasoning_chain: None,
        }
    }

    pub fn with_request(mut self, payload: Payload) -> Self {
        self.request_payload = payload;
        self
    }

    pub fn with_response(mut self, payload: Payload) -> Self {
        self.response_summary = payload;
        self
    }

    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self
    }

    pub fn with_event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    pub fn with_status(mut self, status: EntryStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_reasoning(mut self, reasoning: serde_json::Value) -> Self {
        self.reasoning_chain = Some(reasoning);
        self
    }
}
