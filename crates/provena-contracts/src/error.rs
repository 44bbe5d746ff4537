//! Error types for the Provena audit ledger.
//!
//! All fallible ledger operations return `LedgerResult<T>`.  Variants carry
//! enough context for an operator to act on them from a log line alone.
//!
//! A broken chain is *not* an error: it is reported through
//! `VerificationReport::is_valid`.

use thiserror::Error;

/// The unified error type for the Provena crates.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The backing store could not complete a read or write.
    #[error("audit storage error: {reason}")]
    Storage { reason: String },

    /// A payload or entry could not be serialized for hashing or storage.
    ///
    /// Fatal for the current append or verify.
    #[error("serialization error: {reason}")]
    Serialization { reason: String },

    /// The organization id supplied by the caller is malformed (e.g. empty).
    #[error("invalid organization: {reason}")]
    InvalidOrganization { reason: String },

    /// The repository does not know the organization.
    #[error("unknown organization '{org_id}'")]
    UnknownOrganization { org_id: String },

    /// A per-organization lock was poisoned by a panicking writer.
    #[error("lock poisoned: {reason}")]
    LockPoisoned { reason: String },

    /// A configuration value is missing, unreadable, or invalid.
    #[error("configuration error: {reason}")]
    Config { reason: String },

    /// The insight provider failed to summarize a verification report.
    #[error("insight generation failed: {reason}")]
    Insight { reason: String },
}

/// Convenience alias used throughout the Provena crates.
pub type LedgerResult<T> = Result<T, LedgerError>;
