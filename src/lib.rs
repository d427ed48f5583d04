//! Machine-bound license issuing and validation.
//!
//! An operator issues a signed, time-limited key offline. On first
//! successful validation the key is irrevocably bound to the validating
//! machine: the engine embeds the machine fingerprint into the record,
//! re-signs it, and records the binding in the local lock/registry tables
//! and, when reachable, the remote authority. Re-validation of a bound
//! key checks the embedded fingerprint and cross-checks both registries.
//!
//! # Design points
//!
//! - **Remote is authoritative when reachable**: its decision overrides
//!   local records, so wiping local state cannot forge acceptance while
//!   the network is up.
//! - **Offline keeps working**: an unreachable authority degrades to
//!   local-only evaluation rather than failing; offline first activation
//!   is deliberately fail-open.
//! - **Shared secret**: issuer, validator and registry server share one
//!   HMAC secret; rotating it invalidates every outstanding key.

pub mod config;
pub mod engine;
pub mod error;
pub mod license;
pub mod machine;
pub mod remote;
pub mod server;
pub mod store;

pub use config::Config;
pub use engine::{Engine, Validation, issue};
pub use error::{LicenseError, Result};
pub use license::{Activation, LicenseRecord, SignedToken};
pub use remote::{Authority, AuthorityAction, HttpAuthority, RemoteDecision, Unreachable};
pub use store::{LockStore, Table};
