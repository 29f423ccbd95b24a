// ABOUTME: Accepted host key set handed to the session layer.
// ABOUTME: Accepts base64 wire blobs or OpenSSH lines and verifies presented keys by membership.

use base64::Engine;
use ssh_key::PublicKey;

use crate::error::{HostKeyError, Result};
use crate::fingerprint::compute_fingerprint;

/// The set of host public keys a session is allowed to authenticate against.
///
/// Entries come from the relay either as bare base64 SSH wire blobs
/// (`AAAAC3NzaC1lZDI1NTE5...`) or as OpenSSH public key lines
/// (`ssh-ed25519 AAAA... comment`). An empty set trusts nothing.
#[derive(Debug, Clone, Default)]
pub struct HostKeySet {
    keys: Vec<PublicKey>,
}

impl HostKeySet {
    /// Parse every entry, failing on the first one that is not a public key.
    pub fn parse<I, S>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keys = entries
            .into_iter()
            .map(|entry| parse_entry(entry.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { keys })
    }

    /// Build a set from already parsed keys.
    pub fn from_keys(keys: Vec<PublicKey>) -> Self {
        Self { keys }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PublicKey> {
        self.keys.iter()
    }

    /// Whether the presented key matches an accepted key. Comments are ignored.
    pub fn contains(&self, key: &PublicKey) -> bool {
        self.keys.iter().any(|k| k.key_data() == key.key_data())
    }

    /// Verify a key presented by the remote host.
    ///
    /// # Errors
    /// Returns `HostKeyError::Untrusted` carrying the presented key's
    /// fingerprint if it is not in the set.
    pub fn verify(&self, key: &PublicKey) -> Result<()> {
        if self.contains(key) {
            return Ok(());
        }
        Err(HostKeyError::Untrusted {
            fingerprint: compute_fingerprint(key)?,
        })
    }

    /// Fingerprints of every accepted key, in input order.
    pub fn fingerprints(&self) -> Vec<String> {
        self.keys
            .iter()
            .filter_map(|k| compute_fingerprint(k).ok())
            .collect()
    }
}

fn parse_entry(entry: &str) -> Result<PublicKey> {
    let trimmed = entry.trim();

    // OpenSSH lines always carry the algorithm name before the key blob.
    if trimmed.contains(char::is_whitespace) {
        return PublicKey::from_openssh(trimmed).map_err(|e| HostKeyError::ParseKey {
            entry: trimmed.to_string(),
            source: e,
        });
    }

    let wire = base64::engine::general_purpose::STANDARD
        .decode(trimmed)
        .map_err(|e| HostKeyError::InvalidEncoding {
            entry: trimmed.to_string(),
            source: e,
        })?;

    PublicKey::from_bytes(&wire).map_err(|e| HostKeyError::ParseKey {
        entry: trimmed.to_string(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ssh_key::{Algorithm, PrivateKey};

    fn generate_public_key() -> PublicKey {
        PrivateKey::random(&mut rand::thread_rng(), Algorithm::Ed25519)
            .expect("should generate ed25519 key")
            .public_key()
            .clone()
    }

    fn wire_base64(key: &PublicKey) -> String {
        base64::engine::general_purpose::STANDARD.encode(key.to_bytes().unwrap())
    }

    #[test]
    fn test_parse_base64_wire_blob() {
        let key = generate_public_key();
        let set = HostKeySet::parse([wire_base64(&key)]).unwrap();
        assert_eq!(set.len(), 1);
        assert!(set.contains(&key));
    }

    #[test]
    fn test_parse_openssh_line() {
        let key = generate_public_key();
        let line = key.to_openssh().unwrap();
        let set = HostKeySet::parse([format!("  {line}  ")]).unwrap();
        assert!(set.contains(&key));
    }

    #[test]
    fn test_contains_ignores_comment() {
        let mut key = generate_public_key();
        let set = HostKeySet::from_keys(vec![key.clone()]);
        key.set_comment("someone@somewhere");
        assert!(set.contains(&key));
    }

    #[test]
    fn test_parse_rejects_bad_base64() {
        let err = HostKeySet::parse(["not*base64"]).unwrap_err();
        assert!(matches!(err, HostKeyError::InvalidEncoding { .. }));
    }

    #[test]
    fn test_parse_rejects_non_key_blob() {
        let blob = base64::engine::general_purpose::STANDARD.encode(b"hello world");
        let err = HostKeySet::parse([blob]).unwrap_err();
        assert!(matches!(err, HostKeyError::ParseKey { .. }));
    }

    #[test]
    fn test_verify_untrusted_reports_fingerprint() {
        let trusted = generate_public_key();
        let stranger = generate_public_key();
        let set = HostKeySet::from_keys(vec![trusted.clone()]);

        assert!(set.verify(&trusted).is_ok());
        match set.verify(&stranger) {
            Err(HostKeyError::Untrusted { fingerprint }) => {
                assert_eq!(fingerprint, compute_fingerprint(&stranger).unwrap());
            }
            other => panic!("expected Untrusted, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_set_trusts_nothing() {
        let set = HostKeySet::default();
        assert!(set.is_empty());
        assert!(set.verify(&generate_public_key()).is_err());
    }

    #[test]
    fn test_fingerprints_in_order() {
        let a = generate_public_key();
        let b = generate_public_key();
        let set = HostKeySet::parse([wire_base64(&a), wire_base64(&b)]).unwrap();
        assert_eq!(
            set.fingerprints(),
            vec![
                compute_fingerprint(&a).unwrap(),
                compute_fingerprint(&b).unwrap()
            ]
        );
        assert_eq!(set.iter().count(), 2);
    }
}
