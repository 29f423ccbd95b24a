// ABOUTME: Layered error type for session establishment.
// ABOUTME: One variant per protocol layer, each wrapping its underlying cause.

use thiserror::Error;

use crate::forward::ForwardError;
use crate::rpc::RpcError;

/// Boxed error returned by external collaborators (transport, SSH, RPC, gRPC).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while establishing or running a session.
///
/// Each variant names the layer that failed so callers can branch with
/// [`SessionError::kind`] instead of matching on messages.
#[derive(Error, Debug)]
pub enum SessionError {
    /// A required connection parameter was empty. No I/O was attempted.
    #[error("{field} is required")]
    Validation { field: &'static str },

    /// A tunable was set to a value the session cannot run with.
    #[error("{field} {reason}")]
    InvalidConfig {
        field: &'static str,
        reason: &'static str,
    },

    /// The websocket transport could not be opened.
    #[error("error connecting websocket: {0}")]
    Transport(#[source] BoxError),

    /// The SSH session over the transport could not be established.
    #[error("error connecting to ssh session: {0}")]
    SessionLayer(#[source] BoxError),

    /// The JSON-RPC control channel failed.
    #[error("error connecting control channel: {0}")]
    ControlChannel(#[source] BoxError),

    /// The `workspace.joinWorkspace` call failed or returned garbage.
    #[error("error joining workspace: {0}")]
    JoinWorkspace(#[source] RpcError),

    /// The ephemeral loopback listener for the internal tunnel could not be bound.
    #[error("failed to listen to local port over tcp: {0}")]
    LocalBind(#[source] std::io::Error),

    /// The internal control client could not connect through the tunnel.
    #[error("failed to establish connection on port {port}: {source}")]
    InternalClient {
        port: u16,
        #[source]
        source: BoxError,
    },

    /// The forwarding task had already finished when the bridge was checked.
    #[error("internal tunnel closed: {0}")]
    TunnelClosed(#[source] ForwardError),

    /// The caller's cancellation token fired during a connect step.
    #[error("operation cancelled")]
    Cancelled,
}

/// The layer a [`SessionError`] originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Transport,
    SessionLayer,
    ControlChannel,
    JoinWorkspace,
    LocalBind,
    InternalClient,
    TunnelClosed,
    Cancelled,
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::Validation { .. } => ErrorKind::Validation,
            SessionError::InvalidConfig { .. } => ErrorKind::Validation,
            SessionError::Transport(_) => ErrorKind::Transport,
            SessionError::SessionLayer(_) => ErrorKind::SessionLayer,
            SessionError::ControlChannel(_) => ErrorKind::ControlChannel,
            SessionError::JoinWorkspace(_) => ErrorKind::JoinWorkspace,
            SessionError::LocalBind(_) => ErrorKind::LocalBind,
            SessionError::InternalClient { .. } => ErrorKind::InternalClient,
            SessionError::TunnelClosed(_) => ErrorKind::TunnelClosed,
            SessionError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Whether the internal tunnel bridge failed during setup (bind or
    /// client connect), as opposed to the forwarder having already died.
    pub fn is_bridge_setup_failure(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::LocalBind | ErrorKind::InternalClient
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;
    use std::io;

    #[test]
    fn test_validation_names_field() {
        let err = SessionError::Validation {
            field: "client_name",
        };
        assert_eq!(err.to_string(), "client_name is required");
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.source().is_none());
    }

    #[test]
    fn test_layer_messages_wrap_cause() {
        let err = SessionError::Transport("refused".into());
        assert_eq!(err.to_string(), "error connecting websocket: refused");
        assert!(err.source().is_some());

        let err = SessionError::SessionLayer("bad host key".into());
        assert_eq!(err.to_string(), "error connecting to ssh session: bad host key");
        assert_eq!(err.kind(), ErrorKind::SessionLayer);
    }

    #[test]
    fn test_internal_client_includes_port() {
        let err = SessionError::InternalClient {
            port: 40123,
            source: "handshake failed".into(),
        };
        let display = err.to_string();
        assert!(display.contains("40123"));
        assert!(display.contains("handshake failed"));
        assert!(err.is_bridge_setup_failure());
    }

    #[test]
    fn test_tunnel_closed_is_not_setup_failure() {
        let err = SessionError::TunnelClosed(ForwardError::Stopped);
        assert_eq!(err.kind(), ErrorKind::TunnelClosed);
        assert!(!err.is_bridge_setup_failure());
        assert!(err.to_string().starts_with("internal tunnel closed"));
    }

    #[test]
    fn test_local_bind_is_setup_failure() {
        let err = SessionError::LocalBind(io::Error::new(io::ErrorKind::AddrInUse, "in use"));
        assert!(err.is_bridge_setup_failure());
        assert!(err.source().is_some());
    }

    #[test]
    fn test_cancelled_kind() {
        assert_eq!(SessionError::Cancelled.kind(), ErrorKind::Cancelled);
    }
}
