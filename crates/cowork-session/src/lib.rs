// ABOUTME: Relay session establishment for cowork workspaces.
// ABOUTME: Layers transport, SSH, JSON-RPC and workspace join, then bridges the internal tunnel.

pub mod endpoint;
pub mod error;
pub mod forward;
pub mod heartbeat;
pub mod layers;
pub mod mailbox;
pub mod options;
pub mod rpc;
pub mod session;
pub mod tunnel;

// Connection parameters
pub use endpoint::CONNECT_ACTION;
pub use options::{ConfigError, Options, SessionConfig};

// Session
pub use session::Session;

// Collaborator interfaces
pub use layers::{ControlChannel, Dialer, DuplexStream, InternalClient, SessionLayer};

// Background tasks
pub use forward::{ForwardError, PortForwarder};
pub use heartbeat::Heartbeat;
pub use mailbox::ReasonMailbox;
pub use tunnel::{INTERNAL_PORT, INTERNAL_SESSION_NAME};

// Error types
pub use error::{BoxError, ErrorKind, SessionError};
pub use rpc::RpcError;
