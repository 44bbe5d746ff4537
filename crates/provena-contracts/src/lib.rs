//! # provena-contracts
//!
//! Shared types, errors, and configuration for the Provena audit ledger.
//!
//! All crates in the workspace import from here. No chain logic lives in
//! this crate: only data definitions, the error type and config parsing.

pub mod config;
pub mod entry;
pub mod error;
pub mod payload;
pub mod verify;

pub use config::{ChainConsistencyMode, LedgerConfig, VerificationConfig};
pub use entry::{AuditLogEntry, EntryId, EntryStatus, NewEntry};
pub use error::{LedgerError, LedgerResult};
pub use payload::{ActionRecord, Payload};
pub use verify::{BreakKind, BrokenLink, Insights, VerificationReport, VerificationResponse};

/// The `prev_hash` of the first entry in every organization's chain.
///
/// 64 hex zeros: the same width as a SHA-256 hex digest, and not a digest
/// anyone can produce from real data.
pub const GENESIS_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";
