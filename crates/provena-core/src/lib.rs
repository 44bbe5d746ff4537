//! # provena-core
//!
//! The trait seams the Provena chain logic is written against.
//!
//! This crate provides:
//! - `AuditLogRepository`: the append-only store of audit entries
//! - `InsightProvider`: natural-language commentary on verification results
//!
//! Both are consumed as opaque services; `provena-audit` ships in-memory and
//! file-backed repositories plus a deterministic insight provider.

pub mod traits;

pub use traits::{AuditLogRepository, ChainGuard, InsightProvider};
