// ABOUTME: Internal tunnel bridge carrying the internal control connection.
// ABOUTME: Forwards the fixed internal port to a loopback listener and connects the client through it.

use std::net::{Ipv4Addr, SocketAddr};

use tokio::net::TcpListener;
use tokio::sync::oneshot::{self, error::TryRecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn, Instrument};

use crate::error::SessionError;
use crate::forward::{ForwardError, PortForwarder};
use crate::layers::InternalClient;
use crate::session::cancellable;

/// Remote port of the internal control server.
pub const INTERNAL_PORT: u16 = 16634;

/// Session name the internal port is shared under.
pub const INTERNAL_SESSION_NAME: &str = "CodespacesInternal";

/// A running internal tunnel. The forwarding task owns the listener.
#[derive(Debug)]
pub(crate) struct InternalTunnel {
    pub local_addr: SocketAddr,
    pub task: JoinHandle<()>,
}

/// Forward the internal port to an ephemeral loopback listener and connect
/// `client` through it.
///
/// The forwarder runs on its own task while the client connects on this one.
/// Once the connect returns, the forwarder's completion slot is checked
/// exactly once without waiting: a forwarder that already finished fails the
/// bridge with `TunnelClosed`. A forwarder that dies after that check is the
/// client's problem. On any failure `cancel` is fired so nothing outlives
/// the bridge.
pub(crate) async fn start(
    forwarder: PortForwarder,
    client: &dyn InternalClient,
    token: &str,
    cancel: CancellationToken,
) -> Result<InternalTunnel, SessionError> {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
        .await
        .map_err(SessionError::LocalBind)?;
    let local_addr = listener.local_addr().map_err(SessionError::LocalBind)?;
    let port = local_addr.port();
    debug!(%local_addr, remote_port = forwarder.remote_port(), "internal tunnel listening");

    let (closed_tx, mut closed_rx) = oneshot::channel::<ForwardError>();
    let task = {
        let cancel = cancel.clone();
        tokio::spawn(
            async move {
                let outcome = match forwarder.forward_to_listener(listener, cancel).await {
                    Ok(()) => ForwardError::Stopped,
                    Err(e) => {
                        warn!(error = %e, "internal tunnel forwarding failed");
                        e
                    }
                };
                let _ = closed_tx.send(outcome);
            }
            .in_current_span(),
        )
    };

    let connected = match cancellable(&cancel, client.connect(local_addr, token)).await {
        Ok(result) => result.map_err(|source| SessionError::InternalClient { port, source }),
        Err(cancelled) => Err(cancelled),
    };
    if let Err(e) = connected {
        cancel.cancel();
        return Err(e);
    }

    match closed_rx.try_recv() {
        Err(TryRecvError::Empty) => Ok(InternalTunnel { local_addr, task }),
        Ok(reason) => Err(SessionError::TunnelClosed(reason)),
        Err(TryRecvError::Closed) => Err(SessionError::TunnelClosed(ForwardError::Stopped)),
    }
}
