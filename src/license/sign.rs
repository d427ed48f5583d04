//! Keyed integrity tag over the canonical record bytes.
//!
//! HMAC-SHA256, not a plain hash: forging a tag requires the secret, not
//! just the ability to hash. The secret is process-wide and shared by the
//! issuer, every validating install and the registry server; rotating it
//! invalidates all previously issued keys.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::{LicenseRecord, codec};
use crate::error::{LicenseError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Computes the hex tag over the record's canonical bytes. The bound and
/// unbound forms of the same logical key canonicalize differently, so
/// each carries its own valid tag.
pub fn sign(record: &LicenseRecord, secret: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| LicenseError::Signature)?;
    mac.update(&codec::canonical_bytes(record)?);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verifies a hex tag against the record in constant time. Non-hex or
/// wrong-length tags verify as false, never as an error.
pub fn verify(record: &LicenseRecord, signature: &str, secret: &[u8]) -> Result<bool> {
    let presented = match hex::decode(signature) {
        Ok(bytes) => bytes,
        Err(_) => return Ok(false),
    };
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| LicenseError::Signature)?;
    mac.update(&codec::canonical_bytes(record)?);
    let expected = mac.finalize().into_bytes();
    Ok(expected.as_slice().ct_eq(presented.as_slice()).into())
}
