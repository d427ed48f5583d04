//! License data model.
//!
//! A [`LicenseRecord`] is the signed payload; a [`SignedToken`] pairs it
//! with its integrity tag, which is what the transport string encodes.
//! A record with no [`Activation`] is "unbound"; embedding one on first
//! use is permanent — there is no unbind operation.

pub mod codec;
pub mod sign;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// On-disk and on-wire timestamp format (second resolution).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const SECONDS_PER_DAY: i64 = 86_400;

/// The signed license payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LicenseRecord {
    /// Opaque customer identifier; not validated further.
    pub customer_id: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    /// Exclusive: the key is valid strictly before this instant.
    #[serde(with = "timestamp")]
    pub expires_at: DateTime<Utc>,
    /// Informational; fixed at issuance, never re-derived.
    pub validity_days: i64,
    /// Present iff the key has completed first activation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activation: Option<Activation>,
}

/// The machine binding embedded into a record on first activation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activation {
    pub machine_fingerprint: String,
    #[serde(with = "timestamp")]
    pub activated_at: DateTime<Utc>,
}

impl LicenseRecord {
    pub fn is_bound(&self) -> bool {
        self.activation.is_some()
    }

    /// The record as it looked before activation. Identity function for
    /// unbound records.
    pub fn unbound(&self) -> LicenseRecord {
        LicenseRecord {
            activation: None,
            ..self.clone()
        }
    }

    /// Whole days until expiry, rounded up so a freshly issued 30-day key
    /// reports 30 rather than 29.
    pub fn days_remaining(&self, now: DateTime<Utc>) -> i64 {
        let secs = (self.expires_at - now).num_seconds();
        (secs + SECONDS_PER_DAY - 1).div_euclid(SECONDS_PER_DAY)
    }
}

/// A license record plus its integrity tag, as decoded from a transport
/// string. The tag is the hex HMAC over the record's canonical bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct SignedToken {
    pub record: LicenseRecord,
    pub signature: String,
}

mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de};

    use super::TIMESTAMP_FORMAT;

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&dt.format(TIMESTAMP_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let naive = NaiveDateTime::parse_from_str(&raw, TIMESTAMP_FORMAT)
            .map_err(de::Error::custom)?;
        Ok(naive.and_utc())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(expires_in_secs: i64) -> LicenseRecord {
        let created = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        LicenseRecord {
            customer_id: "acme".to_string(),
            created_at: created,
            expires_at: created + chrono::Duration::seconds(expires_in_secs),
            validity_days: 30,
            activation: None,
        }
    }

    #[test]
    fn days_remaining_rounds_up() {
        let r = record(30 * 86_400);
        assert_eq!(r.days_remaining(r.created_at), 30);
        assert_eq!(r.days_remaining(r.created_at + chrono::Duration::seconds(1)), 30);
        assert_eq!(r.days_remaining(r.expires_at - chrono::Duration::seconds(1)), 1);
    }

    #[test]
    fn unbound_strips_activation_only() {
        let mut r = record(86_400);
        r.activation = Some(Activation {
            machine_fingerprint: "m1".to_string(),
            activated_at: r.created_at,
        });
        let u = r.unbound();
        assert!(u.activation.is_none());
        assert_eq!(u.customer_id, r.customer_id);
        assert_eq!(u.expires_at, r.expires_at);
    }
}
