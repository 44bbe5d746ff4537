//! Request and response payloads carried by audit entries.
//!
//! Compliance actions produce a handful of well-known result shapes, which
//! are modelled as `ActionRecord`.  A `Payload` always keeps the JSON it was
//! given, known shape or not, and the integrity hash is taken over the
//! canonical form of that JSON.  Adding a variant here never changes the hash
//! of an existing entry.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{LedgerError, LedgerResult};

/// A known compliance action shape.
///
/// Serialized with a `kind` discriminant, e.g.
/// `{"kind":"role_change","user_id":"u-7","to_role":"admin"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionRecord {
    /// A risk or conformity assessment was run against an AI system.
    AssessmentRun {
        /// Regulatory framework, e.g. "eu_ai_act", "gdpr", "nis2".
        framework: String,
        system_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        risk_level: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        score: Option<f64>,
    },

    /// A member's role inside the organization changed.
    RoleChange {
        user_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from_role: Option<String>,
        to_role: String,
    },

    /// A compliance report was generated.
    ReportGenerated {
        report_type: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        period: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        document_count: Option<u64>,
    },

    /// Personal data was redacted from a document.
    PiiRedaction {
        document_id: String,
        entities_redacted: u64,
    },
}

/// The payload attached to an audit entry.
///
/// The stored JSON value is the source of truth for hashing; the typed
/// `ActionRecord` view is derived from it on demand.  Re-serializing a typed
/// record could drop unknown fields or renormalize numbers, which would
/// silently change the hash of an entry written by an older schema.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(Value);

impl Payload {
    /// An empty payload (`null`).
    pub fn empty() -> Self {
        Self(Value::Null)
    }

    /// Serialize a known action record into a payload.
    pub fn from_record(record: &ActionRecord) -> LedgerResult<Self> {
        serde_json::to_value(record)
            .map(Self)
            .map_err(|e| LedgerError::Serialization {
                reason: format!("action record could not be serialized: {}", e),
            })
    }

    /// The typed view of this payload, if it matches a known action shape.
    pub fn record(&self) -> Option<ActionRecord> {
        serde_json::from_value(self.0.clone()).ok()
    }

    /// The raw JSON value that is hashed and stored.
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Self(value)
    }
}
