// ABOUTME: Error types for host key operations using thiserror.
// ABOUTME: Provides typed errors for decoding, parsing, and verifying host public keys.

use thiserror::Error;

/// Errors that can occur while handling accepted host keys.
#[derive(Error, Debug)]
pub enum HostKeyError {
    /// A host key entry was not valid base64.
    #[error("host key '{entry}' is not valid base64: {source}")]
    InvalidEncoding {
        entry: String,
        #[source]
        source: base64::DecodeError,
    },

    /// A host key entry decoded but was not a valid SSH public key.
    #[error("failed to parse host key '{entry}': {source}")]
    ParseKey {
        entry: String,
        #[source]
        source: ssh_key::Error,
    },

    /// Failed to encode a key into SSH wire format.
    #[error("failed to serialize host key: {0}")]
    SerializeKey(#[source] ssh_key::Error),

    /// The presented host key is not in the accepted set.
    #[error("host key {fingerprint} is not in the accepted set")]
    Untrusted { fingerprint: String },
}

/// Result type alias using HostKeyError.
pub type Result<T> = std::result::Result<T, HostKeyError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_untrusted_display() {
        let err = HostKeyError::Untrusted {
            fingerprint: "abc123".to_string(),
        };
        let display = err.to_string();
        assert!(display.contains("abc123"));
        assert!(display.contains("not in the accepted set"));
        assert!(err.source().is_none());
    }

    #[test]
    fn test_parse_key_display_and_source() {
        let err = HostKeyError::ParseKey {
            entry: "garbage".to_string(),
            source: ssh_key::Error::AlgorithmUnknown,
        };
        assert!(err.to_string().contains("failed to parse host key 'garbage'"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_serialize_key_source() {
        let err = HostKeyError::SerializeKey(ssh_key::Error::AlgorithmUnknown);
        assert!(err.to_string().contains("failed to serialize host key"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_error_debug() {
        let err = HostKeyError::Untrusted {
            fingerprint: "ff".to_string(),
        };
        assert!(format!("{:?}", err).contains("Untrusted"));
    }
}
