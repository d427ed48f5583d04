//! Remote authority client.
//!
//! The authority holds the canonical activation registry. Queries are
//! best-effort: timeouts, refused connections, error statuses and
//! unparseable bodies all collapse to [`Unreachable`] so the engine always
//! has a defined offline path, never a hard network error.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};
use tracing::warn;

/// What a query asks the authority to do. `Check` is read-only;
/// `Activate` performs the compare-and-set registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AuthorityAction {
    Check,
    Activate,
}

/// Outcome of a round-trip that reached the authority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteDecision {
    /// No binding recorded for this key.
    Available,
    /// Already bound to the querying machine.
    BoundToThisMachine,
    /// Bound to a different machine.
    BoundToOtherMachine { message: String },
    /// Refused for any other reason.
    Rejected { message: String },
}

/// The authority could not be reached or did not answer in protocol.
/// Not an error: callers fall back to local-only evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unreachable;

/// The seam between the activation engine and whatever holds the
/// canonical registry. Production uses [`HttpAuthority`]; tests script
/// their own.
pub trait Authority: Send + Sync {
    fn query(
        &self,
        action: AuthorityAction,
        license_key: &str,
        machine_id: &str,
    ) -> Result<RemoteDecision, Unreachable>;
}

impl<A: Authority + ?Sized> Authority for std::sync::Arc<A> {
    fn query(
        &self,
        action: AuthorityAction,
        license_key: &str,
        machine_id: &str,
    ) -> Result<RemoteDecision, Unreachable> {
        (**self).query(action, license_key, machine_id)
    }
}

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    license_key: &'a str,
    machine_id: &'a str,
    action: AuthorityAction,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    valid: bool,
    #[serde(default)]
    message: String,
    #[serde(default)]
    already_activated: bool,
}

/// HTTP client for the registry server's `/validate` endpoint.
#[derive(Debug)]
pub struct HttpAuthority {
    url: String,
    client: reqwest::blocking::Client,
}

impl HttpAuthority {
    /// Builds a client with the given request timeout. The validation path
    /// is synchronous and caller-serialized, so one blocking round-trip
    /// per query is the whole concurrency story.
    pub fn new(url: impl Into<String>, timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::blocking::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

impl Authority for HttpAuthority {
    fn query(
        &self,
        action: AuthorityAction,
        license_key: &str,
        machine_id: &str,
    ) -> Result<RemoteDecision, Unreachable> {
        let request = WireRequest {
            license_key,
            machine_id,
            action,
        };
        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .map_err(|e| {
                warn!(error = %e, "remote authority unreachable");
                Unreachable
            })?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "remote authority returned an error status");
            return Err(Unreachable);
        }

        let body: WireResponse = response.json().map_err(|e| {
            warn!(error = %e, "remote authority returned a malformed response");
            Unreachable
        })?;

        Ok(match (body.valid, body.already_activated) {
            (true, true) => RemoteDecision::BoundToThisMachine,
            (true, false) => RemoteDecision::Available,
            (false, true) => RemoteDecision::BoundToOtherMachine {
                message: body.message,
            },
            (false, false) => RemoteDecision::Rejected {
                message: body.message,
            },
        })
    }
}
