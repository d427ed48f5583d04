//! Transport-string codec and canonicalization.
//!
//! A transport string is `base64(json { "data": record, "signature": hex })`
//! with lexicographically sorted keys throughout. Sorted-key JSON is the
//! canonical form: structurally equal records always serialize to the same
//! bytes, which is what makes the signature well-defined.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{LicenseRecord, SignedToken, sign};
use crate::error::{LicenseError, Result};

#[derive(Serialize, Deserialize)]
struct Envelope {
    data: serde_json::Value,
    signature: String,
}

/// Canonical byte serialization of a record.
///
/// Goes through `serde_json::Value` so keys come out sorted regardless of
/// struct field order; `activation` is omitted entirely when absent, so
/// bound and unbound forms canonicalize to different byte strings.
pub fn canonical_bytes(record: &LicenseRecord) -> Result<Vec<u8>> {
    let value =
        serde_json::to_value(record).map_err(|e| LicenseError::Malformed(e.to_string()))?;
    serde_json::to_vec(&value).map_err(|e| LicenseError::Malformed(e.to_string()))
}

/// Signs `record` with `secret` and encodes the result as a transport
/// string.
pub fn encode(record: &LicenseRecord, secret: &[u8]) -> Result<String> {
    let signature = sign::sign(record, secret)?;
    encode_signed(record, &signature)
}

/// Encodes a record with an already-computed signature. Used when
/// re-emitting a token verbatim and by tamper tests.
pub fn encode_signed(record: &LicenseRecord, signature: &str) -> Result<String> {
    let envelope = Envelope {
        data: serde_json::to_value(record).map_err(|e| LicenseError::Malformed(e.to_string()))?,
        signature: signature.to_string(),
    };
    let value =
        serde_json::to_value(&envelope).map_err(|e| LicenseError::Malformed(e.to_string()))?;
    let json = serde_json::to_vec(&value).map_err(|e| LicenseError::Malformed(e.to_string()))?;
    Ok(BASE64.encode(json))
}

/// Decodes a transport string. Unknown extra fields are ignored; missing
/// required fields or a broken encoding are [`LicenseError::Malformed`].
pub fn decode(raw: &str) -> Result<SignedToken> {
    let json = BASE64
        .decode(raw.trim())
        .map_err(|e| LicenseError::Malformed(format!("invalid base64: {e}")))?;
    let envelope: Envelope = serde_json::from_slice(&json)
        .map_err(|e| LicenseError::Malformed(format!("invalid envelope: {e}")))?;
    let record: LicenseRecord = serde_json::from_value(envelope.data)
        .map_err(|e| LicenseError::Malformed(format!("invalid license data: {e}")))?;
    Ok(SignedToken {
        record,
        signature: envelope.signature,
    })
}

/// Stable identity of an issuance: the sha256 of the transport string the
/// unbound record encodes to. Re-derived even from already-bound tokens,
/// so every token descended from one issuance maps to the same value.
pub fn original_fingerprint(record: &LicenseRecord, secret: &[u8]) -> Result<String> {
    let raw = encode(&record.unbound(), secret)?;
    Ok(hex::encode(Sha256::digest(raw.as_bytes())))
}

/// Identity of a presented transport string: the unbound-form fingerprint
/// when it decodes, or a hash of the raw bytes when it does not. The
/// fallback keeps corrupted-but-registered keys pinned to their binding.
pub fn presented_fingerprint(raw: &str, secret: &[u8]) -> String {
    match decode(raw).and_then(|token| original_fingerprint(&token.record, secret)) {
        Ok(fingerprint) => fingerprint,
        Err(_) => hex::encode(Sha256::digest(raw.trim().as_bytes())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::license::Activation;
    use chrono::{TimeZone, Utc};

    const SECRET: &[u8] = b"codec-test-secret";

    fn record() -> LicenseRecord {
        let created = Utc.with_ymd_and_hms(2026, 3, 1, 8, 30, 0).unwrap();
        LicenseRecord {
            customer_id: "cust42".to_string(),
            created_at: created,
            expires_at: created + chrono::Duration::days(90),
            validity_days: 90,
            activation: None,
        }
    }

    #[test]
    fn round_trip() {
        let raw = encode(&record(), SECRET).unwrap();
        let token = decode(&raw).unwrap();
        assert_eq!(token.record, record());
        assert_eq!(encode_signed(&token.record, &token.signature).unwrap(), raw);
    }

    #[test]
    fn encoding_is_deterministic() {
        assert_eq!(encode(&record(), SECRET).unwrap(), encode(&record(), SECRET).unwrap());
    }

    #[test]
    fn extra_fields_are_ignored() {
        let raw = encode(&record(), SECRET).unwrap();
        let json = BASE64.decode(&raw).unwrap();
        let mut value: serde_json::Value = serde_json::from_slice(&json).unwrap();
        value["data"]["edition"] = serde_json::json!("pro");
        let patched = BASE64.encode(serde_json::to_vec(&value).unwrap());
        let token = decode(&patched).unwrap();
        assert_eq!(token.record, record());
    }

    #[test]
    fn missing_fields_are_malformed() {
        let raw = encode(&record(), SECRET).unwrap();
        let json = BASE64.decode(&raw).unwrap();
        let mut value: serde_json::Value = serde_json::from_slice(&json).unwrap();
        value["data"].as_object_mut().unwrap().remove("expires_at");
        let patched = BASE64.encode(serde_json::to_vec(&value).unwrap());
        assert!(matches!(decode(&patched), Err(LicenseError::Malformed(_))));
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(decode("not base64 at all!"), Err(LicenseError::Malformed(_))));
        let not_json = BASE64.encode(b"hello");
        assert!(matches!(decode(&not_json), Err(LicenseError::Malformed(_))));
    }

    #[test]
    fn original_fingerprint_survives_binding() {
        let unbound = record();
        let before = original_fingerprint(&unbound, SECRET).unwrap();

        let mut bound = unbound.clone();
        bound.activation = Some(Activation {
            machine_fingerprint: "machine-a".to_string(),
            activated_at: bound.created_at,
        });
        let after = original_fingerprint(&bound, SECRET).unwrap();
        assert_eq!(before, after);

        let raw_bound = encode(&bound, SECRET).unwrap();
        assert_eq!(presented_fingerprint(&raw_bound, SECRET), before);
    }
}
