// ABOUTME: Interfaces of the external layers a session is built from.
// ABOUTME: Transport, SSH session, JSON-RPC control channel, and internal client seams.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use cowork_grpc::GrpcControlClient;
use cowork_ssh::HostKeySet;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::BoxError;

/// A duplex byte stream: the websocket transport, or a channel opened on the
/// SSH session.
pub trait DuplexStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> DuplexStream for T {}

/// An authenticated SSH session riding on the transport.
#[async_trait]
pub trait SessionLayer: Send + Sync {
    /// Open a streaming channel for a stream id handed out by the
    /// control channel (`streamManager.getStream`).
    async fn open_channel(&self, stream_id: &str) -> Result<Box<dyn DuplexStream>, BoxError>;

    /// Close the session and the transport under it.
    async fn close(&self) -> Result<(), BoxError>;
}

/// A JSON-RPC client riding on the session layer.
#[async_trait]
pub trait ControlChannel: Send + Sync {
    /// Synchronous request/response call.
    async fn call(&self, method: &str, params: Value) -> Result<Value, BoxError>;

    async fn close(&self) -> Result<(), BoxError>;
}

/// The internal control client that talks through the forwarded port.
#[async_trait]
pub trait InternalClient: Send + Sync {
    /// Connect to the internal server exposed at `local_addr`.
    async fn connect(&self, local_addr: SocketAddr, token: &str) -> Result<(), BoxError>;
}

#[async_trait]
impl InternalClient for GrpcControlClient {
    async fn connect(&self, local_addr: SocketAddr, token: &str) -> Result<(), BoxError> {
        GrpcControlClient::connect(self, local_addr.port(), token)
            .await
            .map_err(Into::into)
    }
}

/// Opens each layer of a session, bottom up.
///
/// Implementations wrap the concrete websocket, SSH and JSON-RPC stacks.
/// Every method may be cancelled by dropping its future.
#[async_trait]
pub trait Dialer: Send + Sync {
    /// Open the websocket transport to `url`.
    async fn dial_transport(
        &self,
        url: &str,
        tls: Option<Arc<rustls::ClientConfig>>,
    ) -> Result<Box<dyn DuplexStream>, BoxError>;

    /// Authenticate an SSH session over `transport`, accepting only hosts
    /// whose key is in `host_keys`.
    async fn dial_session(
        &self,
        transport: Box<dyn DuplexStream>,
        token: &str,
        host_keys: &HostKeySet,
    ) -> Result<Arc<dyn SessionLayer>, BoxError>;

    /// Attach a JSON-RPC client to the session.
    async fn dial_control(
        &self,
        session: Arc<dyn SessionLayer>,
    ) -> Result<Arc<dyn ControlChannel>, BoxError>;

    /// A fresh, unconnected internal control client.
    fn internal_client(&self) -> Arc<dyn InternalClient> {
        Arc::new(GrpcControlClient::new())
    }
}
