//! Hashing primitives for the audit chain.
//!
//! Payloads are hashed as canonical JSON: compact, no insignificant
//! whitespace, object keys sorted by byte order at every depth, arrays in
//! their original order.  The canonical form is produced here rather than
//! left to `serde_json`'s map type so the digest does not depend on which
//! feature flags the final binary happens to enable.

use serde_json::Value;
use sha2::{Digest, Sha256};

use provena_contracts::{
    error::{LedgerError, LedgerResult},
    payload::Payload,
};

/// SHA-256 of `input`'s UTF-8 bytes as 64 lowercase hex characters.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// True if `s` has the shape of a `sha256_hex` digest.
pub fn is_sha256_hex(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Render `value` as canonical JSON.
pub fn canonicalize(value: &Value) -> LedgerResult<String> {
    let mut out = String::new();
    write_canonical(value, &mut out)?;
    Ok(out)
}

fn write_canonical(value: &Value, out: &mut String) -> LedgerResult<()> {
    match value {
        Value::Object(map) => {
            let mut fields: Vec<(&String, &Value)> = map.iter().collect();
            fields.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, field)) in fields.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&encode_scalar(&Value::String(key.clone()))?);
                out.push(':');
                write_canonical(field, out)?;
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out)?;
            }
            out.push(']');
        }
        scalar => out.push_str(&encode_scalar(scalar)?),
    }
    Ok(())
}

// Strings, numbers, booleans and null use serde_json's own encoding so
// escaping and number formatting match what the store round-trips.
fn encode_scalar(value: &Value) -> LedgerResult<String> {
    serde_json::to_string(value).map_err(|e| LedgerError::Serialization {
        reason: format!("failed to encode JSON value: {}", e),
    })
}

/// The integrity hash of a payload: `sha256_hex(canonicalize(payload))`.
pub fn hash_payload(payload: &Payload) -> LedgerResult<String> {
    Ok(sha256_hex(&canonicalize(payload.as_value())?))
}
