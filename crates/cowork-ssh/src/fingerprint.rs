// ABOUTME: SSH public key fingerprint computation.
// ABOUTME: Computes SHA256 fingerprints over the key's SSH wire encoding.

use crate::error::{HostKeyError, Result};
use sha2::{Digest, Sha256};
use ssh_key::PublicKey;

/// Compute SHA256 fingerprint of a public key (hex encoded, lowercase).
///
/// The hash covers the key's SSH wire format (algorithm name and key data,
/// each as a length-prefixed SSH string), the same bytes the relay hands out
/// base64-encoded as an accepted host key. Any algorithm `ssh-key` can encode
/// is supported.
///
/// # Returns
/// A 64-character lowercase hex string representing the SHA256 hash.
///
/// # Errors
/// Returns `HostKeyError::SerializeKey` if the key cannot be encoded.
pub fn compute_fingerprint(public_key: &PublicKey) -> Result<String> {
    let wire_data = public_key.to_bytes().map_err(HostKeyError::SerializeKey)?;

    let mut hasher = Sha256::new();
    hasher.update(&wire_data);
    let hash = hasher.finalize();

    Ok(hex::encode(hash))
}
