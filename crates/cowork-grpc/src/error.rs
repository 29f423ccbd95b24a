// ABOUTME: Error types for the cowork-grpc crate.
// ABOUTME: Provides structured errors for channel creation and client authentication.

use thiserror::Error;

/// Errors that can occur in the internal gRPC client.
#[derive(Error, Debug)]
pub enum GrpcClientError {
    /// Invalid server address format.
    #[error("invalid server address: {0}")]
    InvalidAddress(String),

    /// Failed to connect to the server.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The session token cannot be carried in request metadata.
    #[error("invalid session token: {0}")]
    InvalidToken(String),

    /// The client was used before `connect` succeeded.
    #[error("client is not connected")]
    NotConnected,
}

impl From<tonic::transport::Error> for GrpcClientError {
    fn from(err: tonic::transport::Error) -> Self {
        GrpcClientError::ConnectionFailed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GrpcClientError::InvalidAddress("not a url".to_string());
        assert_eq!(err.to_string(), "invalid server address: not a url");

        let err = GrpcClientError::InvalidToken("bad byte".to_string());
        assert_eq!(err.to_string(), "invalid session token: bad byte");

        assert_eq!(
            GrpcClientError::NotConnected.to_string(),
            "client is not connected"
        );
    }

    #[test]
    fn test_connection_failed_display() {
        let err = GrpcClientError::ConnectionFailed("refused".to_string());
        assert!(err.to_string().contains("connection failed"));
        assert!(err.to_string().contains("refused"));
    }

    #[tokio::test]
    async fn test_from_tonic_transport_error() {
        use tonic::transport::Endpoint;

        let endpoint = Endpoint::from_static("http://[::1]:1");
        let result = endpoint.connect().await;

        if let Err(transport_err) = result {
            let grpc_err: GrpcClientError = transport_err.into();
            assert!(matches!(grpc_err, GrpcClientError::ConnectionFailed(_)));
        }
    }
}
