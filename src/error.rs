use thiserror::Error;

/// Errors produced while issuing or validating license keys.
///
/// Every terminal rejection carries a specific, user-presentable reason so
/// the caller can tell "buy a new key" apart from "contact support" apart
/// from "this key is already used elsewhere".
#[derive(Debug, Error)]
pub enum LicenseError {
    /// The transport string is not a decodable license.
    #[error("license key is malformed: {0}")]
    Malformed(String),

    /// The integrity tag does not match the canonical payload.
    #[error("license key is invalid or has been tampered with")]
    Signature,

    #[error("license expired {days} day(s) ago")]
    Expired { days: i64 },

    /// The token itself, or the remote/local registry, records a binding to
    /// a different machine.
    #[error("this license has already been activated on another machine; each key can only be used once")]
    BoundElsewhere,

    /// The local registry disagrees with an otherwise locally-bound token.
    #[error("this license is already registered to another machine; each key can only be used once")]
    RegisteredElsewhere,

    #[error("license validity must be at least one day")]
    InvalidValidity,

    /// The remote authority answered and refused the key. Carries the
    /// server's message verbatim.
    #[error("{0}")]
    RemoteRejected(String),

    /// Failed to construct the remote authority client.
    #[error("remote authority client error: {0}")]
    Remote(#[from] reqwest::Error),

    #[error("license store error: {0}")]
    Store(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LicenseError>;
