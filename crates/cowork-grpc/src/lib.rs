// ABOUTME: Internal gRPC control client for cowork sessions.
// ABOUTME: Provides loopback channel creation and a token-authenticated client handle.

pub mod channel;
pub mod client;
pub mod error;

// Channel creation
pub use channel::{create_channel, ChannelConfig, KeepAliveConfig};

// Client
pub use client::{GrpcControlClient, TokenInterceptor};

// Error types
pub use error::GrpcClientError;
