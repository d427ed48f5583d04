//! The activation engine: the issue/validate/activate state machine.
//!
//! A presented token walks the states in order — malformed, bad signature,
//! expired, bound to a foreign machine, bound here, unbound — and the
//! first terminal state wins. The remote authority's decision overrides
//! local records whenever it is reachable; local tables are consulted as
//! the offline fallback and as a safety net on the already-bound path.
//! Each validation call is synchronous and assumes exclusive access to the
//! two local tables; multi-threaded embedders must serialize calls.

use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{LicenseError, Result};
use crate::license::{Activation, LicenseRecord, codec, sign};
use crate::machine;
use crate::remote::{Authority, AuthorityAction, HttpAuthority, RemoteDecision};
use crate::store::LockStore;

/// Result of presenting a token to the engine. Rejections carry the
/// specific reason; acceptance-via-activation carries the re-signed token
/// the caller must persist as the new license file content.
#[derive(Debug, Clone, Serialize)]
pub struct Validation {
    pub accepted: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_token: Option<String>,
}

impl Validation {
    fn rejected(message: String) -> Self {
        Self {
            accepted: false,
            message,
            updated_token: None,
        }
    }
}

/// Issues a fresh unbound key valid for `days` days. Purely offline:
/// codec plus signer, no network, no store access.
pub fn issue(days: u32, customer_id: &str, secret: &[u8]) -> Result<String> {
    if days == 0 {
        return Err(LicenseError::InvalidValidity);
    }
    let now = Utc::now();
    let record = LicenseRecord {
        customer_id: customer_id.to_string(),
        created_at: now,
        expires_at: now + chrono::Duration::days(i64::from(days)),
        validity_days: i64::from(days),
        activation: None,
    };
    codec::encode(&record, secret)
}

pub struct Engine {
    secret: Vec<u8>,
    machine_id: String,
    store: LockStore,
    authority: Option<Box<dyn Authority>>,
}

impl Engine {
    /// Builds an engine bound to the current machine, with no remote
    /// authority configured.
    pub fn new(secret: impl Into<Vec<u8>>, store: LockStore) -> Self {
        Self {
            secret: secret.into(),
            machine_id: machine::fingerprint(),
            store,
            authority: None,
        }
    }

    /// Builds the engine the way the binaries and embedding applications
    /// do: store paths, secret and optional authority from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let store = LockStore::open(&config.lock_file, &config.registry_file);
        let mut engine = Engine::new(config.secret.as_bytes().to_vec(), store);
        if let Some(url) = config.server_url.as_deref() {
            let authority = HttpAuthority::new(url, Duration::from_secs(config.timeout_secs))?;
            engine = engine.with_authority(Box::new(authority));
        }
        Ok(engine)
    }

    /// Overrides the machine fingerprint. Escape hatch for embedders that
    /// derive their own identity, and the test hook for simulating hosts.
    pub fn with_machine_id(mut self, machine_id: impl Into<String>) -> Self {
        self.machine_id = machine_id.into();
        self
    }

    pub fn with_authority(mut self, authority: Box<dyn Authority>) -> Self {
        self.authority = Some(authority);
        self
    }

    pub fn issue(&self, days: u32, customer_id: &str) -> Result<String> {
        issue(days, customer_id, &self.secret)
    }

    /// Runs the full validation state machine over a transport string.
    pub fn validate(&self, raw: &str) -> Validation {
        match self.evaluate(raw) {
            Ok((message, updated_token)) => Validation {
                accepted: true,
                message,
                updated_token,
            },
            Err(err) => Validation::rejected(err.to_string()),
        }
    }

    /// Loads and validates the license file, rewriting it when validation
    /// produced a newly bound token so the next run starts already bound.
    pub fn load_license_file(&self, path: &Path) -> Validation {
        let raw = match std::fs::read_to_string(path) {
            Ok(contents) => contents.trim().to_string(),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Validation::rejected("license file not found".to_string());
            }
            Err(err) => {
                return Validation::rejected(format!("failed to read license file: {err}"));
            }
        };
        let outcome = self.validate(&raw);
        if outcome.accepted
            && let Some(updated) = outcome.updated_token.as_deref()
            && let Err(err) = std::fs::write(path, updated)
        {
            warn!(error = %err, "failed to rewrite license file with the activated token");
        }
        outcome
    }

    /// Validates and stores a presented key. Invalid keys are still
    /// written as-is so the next load surfaces the same error to the user.
    pub fn save_license_file(&self, path: &Path, raw: &str) -> Result<Validation> {
        let outcome = self.validate(raw);
        let contents = outcome
            .updated_token
            .as_deref()
            .filter(|_| outcome.accepted)
            .unwrap_or(raw);
        std::fs::write(path, contents)?;
        Ok(outcome)
    }

    fn evaluate(&self, raw: &str) -> Result<(String, Option<String>)> {
        let token = codec::decode(raw)?;
        if !sign::verify(&token.record, &token.signature, &self.secret)? {
            return Err(LicenseError::Signature);
        }
        let record = token.record;

        let now = Utc::now();
        if now >= record.expires_at {
            return Err(LicenseError::Expired {
                days: (now - record.expires_at).num_days(),
            });
        }

        let key_fingerprint = codec::original_fingerprint(&record, &self.secret)?;
        let days_left = record.days_remaining(now);

        match record.activation.as_ref() {
            Some(activation) if activation.machine_fingerprint != self.machine_id => {
                Err(LicenseError::BoundElsewhere)
            }
            Some(_) => {
                // Already active here; cross-check both registries for a
                // conflicting record before accepting.
                self.check_remote(raw)?;
                if let Some(owner) = self.store.owner(&key_fingerprint)
                    && owner != self.machine_id
                {
                    return Err(LicenseError::RegisteredElsewhere);
                }
                Ok((valid_message(days_left), None))
            }
            None => {
                let remote_answered = self.check_remote(raw)?;
                if !remote_answered {
                    if let Some(owner) = self.store.owner(&key_fingerprint)
                        && owner != self.machine_id
                    {
                        return Err(LicenseError::BoundElsewhere);
                    }
                    // Offline first activation is deliberately fail-open so
                    // a missing network never locks out a legitimate
                    // install.
                    if self.authority.is_some() {
                        warn!("activating offline; binding recorded locally only");
                    }
                }

                let bound = LicenseRecord {
                    activation: Some(Activation {
                        machine_fingerprint: self.machine_id.clone(),
                        activated_at: now,
                    }),
                    ..record
                };
                let updated = codec::encode(&bound, &self.secret)?;

                if remote_answered {
                    self.activate_remote(raw)?;
                }
                if let Err(err) = self.store.record(&key_fingerprint, &self.machine_id) {
                    // The in-memory decision stands; persistence is retried
                    // on the next run.
                    warn!(error = %err, "failed to persist activation binding locally");
                }
                debug!(customer = %bound.customer_id, "license activated on this machine");
                Ok((valid_message(days_left), Some(updated)))
            }
        }
    }

    /// Read-only conflict probe. `Ok(true)` when the authority answered
    /// and found no conflict, `Ok(false)` when it was unreachable or not
    /// configured.
    fn check_remote(&self, raw: &str) -> Result<bool> {
        let Some(authority) = self.authority.as_ref() else {
            return Ok(false);
        };
        match authority.query(AuthorityAction::Check, raw, &self.machine_id) {
            Ok(RemoteDecision::Available) | Ok(RemoteDecision::BoundToThisMachine) => Ok(true),
            Ok(RemoteDecision::BoundToOtherMachine { message })
            | Ok(RemoteDecision::Rejected { message }) => {
                Err(LicenseError::RemoteRejected(message))
            }
            Err(_) => {
                warn!("remote authority unreachable; falling back to local records");
                Ok(false)
            }
        }
    }

    /// Registers the binding remotely. Only called after a successful
    /// check, but the registration itself can still lose the race to
    /// another machine.
    fn activate_remote(&self, raw: &str) -> Result<()> {
        let Some(authority) = self.authority.as_ref() else {
            return Ok(());
        };
        match authority.query(AuthorityAction::Activate, raw, &self.machine_id) {
            Ok(RemoteDecision::Available) | Ok(RemoteDecision::BoundToThisMachine) => Ok(()),
            Ok(RemoteDecision::BoundToOtherMachine { message })
            | Ok(RemoteDecision::Rejected { message }) => {
                Err(LicenseError::RemoteRejected(message))
            }
            Err(_) => {
                warn!("remote authority dropped out during activation; proceeding with local binding");
                Ok(())
            }
        }
    }
}

fn valid_message(days_left: i64) -> String {
    format!("license valid; {days_left} day(s) remaining")
}
