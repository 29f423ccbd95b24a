// ABOUTME: Forwards a port shared by the remote host to a local TCP listener.
// ABOUTME: Each accepted connection is relayed over its own SSH streaming channel.

use std::sync::Arc;

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

use crate::error::BoxError;
use crate::layers::{ControlChannel, SessionLayer};
use crate::mailbox::ReasonMailbox;
use crate::rpc::{self, RpcError, SharedStream};

/// Keep-alive reason posted for each forwarded connection.
pub const FORWARD_KEEP_ALIVE_REASON: &str = "portForwarding";

/// Why a forwarder stopped.
#[derive(Error, Debug)]
pub enum ForwardError {
    /// The host refused to share the remote port.
    #[error("failed to share remote port: {0}")]
    Share(#[source] RpcError),

    /// The local listener stopped accepting.
    #[error("failed to accept local connection: {0}")]
    Accept(#[source] std::io::Error),

    /// Forwarding ended without an error (cancelled or the task went away).
    #[error("forwarding stopped")]
    Stopped,
}

#[derive(Error, Debug)]
enum ConnectionError {
    #[error("failed to resolve stream: {0}")]
    Stream(#[source] RpcError),

    #[error("failed to open streaming channel: {0}")]
    Channel(#[source] BoxError),

    #[error("relay failed: {0}")]
    Relay(#[source] std::io::Error),
}

/// Forwards one remote port, identified by its port and session name, over
/// the SSH session.
#[derive(Clone)]
pub struct PortForwarder {
    session_layer: Arc<dyn SessionLayer>,
    control: Arc<dyn ControlChannel>,
    name: String,
    remote_port: u16,
    keep_alive: Option<ReasonMailbox>,
}

impl PortForwarder {
    pub fn new(
        session_layer: Arc<dyn SessionLayer>,
        control: Arc<dyn ControlChannel>,
        name: impl Into<String>,
        remote_port: u16,
    ) -> Self {
        Self {
            session_layer,
            control,
            name: name.into(),
            remote_port,
            keep_alive: None,
        }
    }

    /// Count every forwarded connection as session activity.
    pub fn with_keep_alive(mut self, mailbox: ReasonMailbox) -> Self {
        self.keep_alive = Some(mailbox);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn remote_port(&self) -> u16 {
        self.remote_port
    }

    /// Serve `listener` until `cancel` fires or forwarding fails for good.
    ///
    /// Returns `Ok(())` only on cancellation. Failures of a single forwarded
    /// connection are logged and do not stop the forwarder. The listener is
    /// dropped on return; in-flight connections are cancelled with it.
    pub async fn forward_to_listener(
        &self,
        listener: TcpListener,
        cancel: CancellationToken,
    ) -> Result<(), ForwardError> {
        let stream = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            shared = rpc::start_sharing(&*self.control, &self.name, self.remote_port) => {
                shared.map_err(ForwardError::Share)?
            }
        };
        info!(
            name = %self.name,
            remote_port = self.remote_port,
            stream = %stream.stream_name,
            "remote port shared"
        );

        let connections = cancel.child_token();
        let _stop_connections = connections.clone().drop_guard();

        loop {
            let (conn, peer) = tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                accepted = listener.accept() => accepted.map_err(ForwardError::Accept)?,
            };
            debug!(%peer, name = %self.name, "accepted forwarded connection");

            if let Some(mailbox) = &self.keep_alive {
                mailbox.post(FORWARD_KEEP_ALIVE_REASON);
            }

            let forwarder = self.clone();
            let stream = stream.clone();
            let cancel = connections.clone();
            tokio::spawn(
                async move {
                    tokio::select! {
                        _ = cancel.cancelled() => {}
                        result = forwarder.relay(conn, &stream) => {
                            if let Err(e) = result {
                                warn!(%peer, error = %e, "forwarded connection failed");
                            }
                        }
                    }
                }
                .in_current_span(),
            );
        }
    }

    async fn relay(&self, mut conn: TcpStream, stream: &SharedStream) -> Result<(), ConnectionError> {
        let stream_id = rpc::get_stream(&*self.control, stream)
            .await
            .map_err(ConnectionError::Stream)?;
        let mut channel = self
            .session_layer
            .open_channel(&stream_id)
            .await
            .map_err(ConnectionError::Channel)?;

        let (up, down) = tokio::io::copy_bidirectional(&mut conn, &mut channel)
            .await
            .map_err(ConnectionError::Relay)?;
        debug!(stream_id = %stream_id, up, down, "forwarded connection closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::DuplexStream;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Mutex;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    /// Shares the port successfully and hands out a fixed stream id.
    #[derive(Default)]
    struct SharingChannel {
        refuse: bool,
        methods: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ControlChannel for SharingChannel {
        async fn call(&self, method: &str, _params: Value) -> Result<Value, BoxError> {
            self.methods.lock().unwrap().push(method.to_string());
            match method {
                rpc::START_SHARING_METHOD if self.refuse => Err("port not available".into()),
                rpc::START_SHARING_METHOD => {
                    Ok(json!({"streamName": "internal", "streamCondition": "ready"}))
                }
                rpc::GET_STREAM_METHOD => Ok(json!("stream-1")),
                other => Err(format!("unexpected method {other}").into()),
            }
        }

        async fn close(&self) -> Result<(), BoxError> {
            Ok(())
        }
    }

    /// Echoes everything written to an opened channel.
    #[derive(Default)]
    struct EchoSession {
        opened: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SessionLayer for EchoSession {
        async fn open_channel(&self, stream_id: &str) -> Result<Box<dyn DuplexStream>, BoxError> {
            self.opened.lock().unwrap().push(stream_id.to_string());
            let (ours, mut theirs) = tokio::io::duplex(1024);
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                loop {
                    match theirs.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            if theirs.write_all(&buf[..n]).await.is_err() {
                                break;
                            }
                        }
                    }
                }
            });
            Ok(Box::new(ours))
        }

        async fn close(&self) -> Result<(), BoxError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_relays_connection_through_channel() {
        let session = Arc::new(EchoSession::default());
        let control = Arc::new(SharingChannel::default());
        let mailbox = ReasonMailbox::new();
        let forwarder = PortForwarder::new(session.clone(), control.clone(), "internal", 16634)
            .with_keep_alive(mailbox.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let cancel = CancellationToken::new();
        let task = {
            let cancel = cancel.clone();
            tokio::spawn(async move { forwarder.forward_to_listener(listener, cancel).await })
        };

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        assert_eq!(*session.opened.lock().unwrap(), vec!["stream-1"]);
        assert_eq!(mailbox.take().as_deref(), Some(FORWARD_KEEP_ALIVE_REASON));

        cancel.cancel();
        assert!(task.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_share_refusal_is_terminal() {
        let forwarder = PortForwarder::new(
            Arc::new(EchoSession::default()),
            Arc::new(SharingChannel {
                refuse: true,
                ..Default::default()
            }),
            "internal",
            16634,
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

        let err = forwarder
            .forward_to_listener(listener, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ForwardError::Share(_)));
    }

    #[tokio::test]
    async fn test_cancel_releases_listener() {
        let forwarder = PortForwarder::new(
            Arc::new(EchoSession::default()),
            Arc::new(SharingChannel::default()),
            "internal",
            16634,
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        forwarder.forward_to_listener(listener, cancel).await.unwrap();

        // The port is free again once the forwarder returns.
        TcpListener::bind(addr).await.unwrap();
    }

    #[test]
    fn test_accessors() {
        let forwarder = PortForwarder::new(
            Arc::new(EchoSession::default()),
            Arc::new(SharingChannel::default()),
            "CodespacesInternal",
            16634,
        );
        assert_eq!(forwarder.name(), "CodespacesInternal");
        assert_eq!(forwarder.remote_port(), 16634);
        assert!(ForwardError::Stopped.to_string().contains("stopped"));
    }
}
