// ABOUTME: Host public key utilities for cowork sessions.
// ABOUTME: Parses accepted host keys, computes fingerprints, and verifies presented keys.

//! # cowork-ssh
//!
//! The session layer of a cowork connection authenticates the remote host
//! against a set of accepted host public keys handed out by the relay. This
//! crate owns that set.
//!
//! ## Example
//!
//! ```no_run
//! use cowork_ssh::HostKeySet;
//!
//! let keys = HostKeySet::parse(["AAAAC3NzaC1lZDI1NTE5AAAAIO3mepiIGcR/X0pUqTHo4qI27NLDq/DXpX/C2m+nGcM9"])
//!     .expect("host keys should parse");
//! for fp in keys.fingerprints() {
//!     println!("accepting host key {fp}");
//! }
//! ```

mod error;
mod fingerprint;
mod host_keys;

pub use error::{HostKeyError, Result};
pub use fingerprint::compute_fingerprint;
pub use host_keys::HostKeySet;

// Re-export ssh_key types for convenience
pub use ssh_key::PublicKey;
