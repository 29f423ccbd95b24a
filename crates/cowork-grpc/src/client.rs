// ABOUTME: Token-authenticated handle to the internal gRPC server.
// ABOUTME: Connects over the forwarded loopback port and stamps every request with the session token.

use std::sync::RwLock;
use std::time::Duration;

use tonic::metadata::{Ascii, MetadataValue};
use tonic::service::interceptor::InterceptedService;
use tonic::service::Interceptor;
use tonic::transport::Channel;

use crate::channel::{create_channel, ChannelConfig, KeepAliveConfig};
use crate::error::GrpcClientError;

/// Adds `authorization: Bearer <token>` to every outgoing request.
#[derive(Debug, Clone)]
pub struct TokenInterceptor {
    header: MetadataValue<Ascii>,
}

impl TokenInterceptor {
    /// Build an interceptor for the given session token.
    ///
    /// # Errors
    /// Returns `GrpcClientError::InvalidToken` if the token contains bytes
    /// that are not valid in an HTTP header.
    pub fn new(token: &str) -> Result<Self, GrpcClientError> {
        let header: MetadataValue<Ascii> = format!("Bearer {}", token)
            .parse()
            .map_err(|e: tonic::metadata::errors::InvalidMetadataValue| {
                GrpcClientError::InvalidToken(e.to_string())
            })?;
        Ok(Self { header })
    }
}

impl Interceptor for TokenInterceptor {
    fn call(&mut self, mut req: tonic::Request<()>) -> Result<tonic::Request<()>, tonic::Status> {
        req.metadata_mut()
            .insert("authorization", self.header.clone());
        Ok(req)
    }
}

struct Connection {
    channel: Channel,
    interceptor: TokenInterceptor,
    port: u16,
}

/// Client for the internal gRPC server running next to the remote workspace.
///
/// Created disconnected; [`GrpcControlClient::connect`] establishes the
/// channel once the internal port has been forwarded locally. After that the
/// client is the authority on tunnel health: a broken forward surfaces as
/// request errors on the channel.
pub struct GrpcControlClient {
    keep_alive: Option<KeepAliveConfig>,
    connect_timeout: Duration,
    connection: RwLock<Option<Connection>>,
}

impl Default for GrpcControlClient {
    fn default() -> Self {
        Self::new()
    }
}

impl GrpcControlClient {
    pub fn new() -> Self {
        Self {
            keep_alive: Some(KeepAliveConfig::default()),
            connect_timeout: Duration::from_secs(30),
            connection: RwLock::new(None),
        }
    }

    /// Set connection timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Disable keep-alive.
    pub fn without_keep_alive(mut self) -> Self {
        self.keep_alive = None;
        self
    }

    /// Connect to the internal server forwarded to `127.0.0.1:<port>`.
    ///
    /// Replaces any previous connection.
    pub async fn connect(&self, port: u16, token: &str) -> Result<(), GrpcClientError> {
        let interceptor = TokenInterceptor::new(token)?;

        let mut config = ChannelConfig::loopback(port).with_connect_timeout(self.connect_timeout);
        config.keep_alive = self.keep_alive.clone();

        let channel = create_channel(&config).await?;
        tracing::debug!(port, "internal gRPC client connected");

        let mut guard = self.connection.write().expect("lock poisoned");
        *guard = Some(Connection {
            channel,
            interceptor,
            port,
        });
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.connection.read().expect("lock poisoned").is_some()
    }

    /// Local port the client is connected through.
    pub fn local_port(&self) -> Option<u16> {
        self.connection
            .read()
            .expect("lock poisoned")
            .as_ref()
            .map(|c| c.port)
    }

    /// Authenticated channel for generated service clients.
    ///
    /// # Errors
    /// Returns `GrpcClientError::NotConnected` before a successful `connect`.
    pub fn channel(&self) -> Result<InterceptedService<Channel, TokenInterceptor>, GrpcClientError> {
        let guard = self.connection.read().expect("lock poisoned");
        let conn = guard.as_ref().ok_or(GrpcClientError::NotConnected)?;
        Ok(InterceptedService::new(
            conn.channel.clone(),
            conn.interceptor.clone(),
        ))
    }

    /// Drop the channel. Subsequent calls to `channel` fail until reconnected.
    pub fn disconnect(&self) {
        self.connection.write().expect("lock poisoned").take();
    }
}
