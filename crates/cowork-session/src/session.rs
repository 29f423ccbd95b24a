// ABOUTME: Session establishment pipeline and the live session it produces.
// ABOUTME: Stacks transport, SSH, control channel and join, then starts heartbeat and internal tunnel.

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use cowork_ssh::HostKeySet;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument, Span};

use crate::endpoint::CONNECT_ACTION;
use crate::error::SessionError;
use crate::forward::PortForwarder;
use crate::heartbeat::Heartbeat;
use crate::layers::{ControlChannel, Dialer, InternalClient, SessionLayer};
use crate::mailbox::ReasonMailbox;
use crate::options::{Options, SessionConfig};
use crate::rpc::{self, JoinWorkspaceArgs};
use crate::tunnel::{self, INTERNAL_PORT, INTERNAL_SESSION_NAME};

/// Run `fut` unless `cancel` fires first.
pub(crate) async fn cancellable<F: Future>(
    cancel: &CancellationToken,
    fut: F,
) -> Result<F::Output, SessionError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(SessionError::Cancelled),
        out = fut => Ok(out),
    }
}

/// A joined workspace session with its heartbeat and internal tunnel running.
///
/// Background tasks hang off a cancellation token derived from the one
/// passed to [`Session::connect`]; [`Session::close`] or dropping the
/// session stops them.
pub struct Session {
    session_layer: Arc<dyn SessionLayer>,
    control: Arc<dyn ControlChannel>,
    internal: Arc<dyn InternalClient>,
    mailbox: ReasonMailbox,
    client_name: String,
    session_number: i64,
    tunnel_addr: SocketAddr,
    span: Span,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("client_name", &self.client_name)
            .field("session_number", &self.session_number)
            .field("tunnel_addr", &self.tunnel_addr)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Session {
    /// Connect with default [`SessionConfig`].
    pub async fn connect(
        dialer: &dyn Dialer,
        opts: &Options,
        cancel: &CancellationToken,
    ) -> Result<Self, SessionError> {
        Self::connect_with(dialer, opts, SessionConfig::default(), cancel).await
    }

    /// Establish each layer in order and start the background tasks.
    ///
    /// The first failing step aborts the whole connect; layers opened before
    /// it are closed and no session is returned. Cancelling `cancel` aborts
    /// the step in progress with [`SessionError::Cancelled`] and, once
    /// connected, stops the session's background tasks.
    pub async fn connect_with(
        dialer: &dyn Dialer,
        opts: &Options,
        config: SessionConfig,
        cancel: &CancellationToken,
    ) -> Result<Self, SessionError> {
        let span = info_span!(
            "session",
            client = %opts.client_name,
            session_id = %opts.session_id
        );
        let connect_span = info_span!(parent: &span, "connect");

        Self::establish(dialer, opts, config, cancel, span)
            .instrument(connect_span)
            .await
    }

    async fn establish(
        dialer: &dyn Dialer,
        opts: &Options,
        config: SessionConfig,
        cancel: &CancellationToken,
        span: Span,
    ) -> Result<Self, SessionError> {
        let url = opts.uri(CONNECT_ACTION)?;
        config.validate()?;

        debug!("opening transport");
        let transport = cancellable(cancel, dialer.dial_transport(&url, opts.tls_config.clone()))
            .await?
            .map_err(SessionError::Transport)?;

        if opts.session_token.is_empty() {
            return Err(SessionError::Validation {
                field: "session_token",
            });
        }
        let host_keys = HostKeySet::parse(&opts.host_public_keys)
            .map_err(|e| SessionError::SessionLayer(e.into()))?;

        debug!(host_keys = host_keys.len(), "opening ssh session");
        let session_layer = cancellable(
            cancel,
            dialer.dial_session(transport, &opts.session_token, &host_keys),
        )
        .await?
        .map_err(SessionError::SessionLayer)?;

        debug!("opening control channel");
        let control = match cancellable(cancel, dialer.dial_control(session_layer.clone()))
            .await
            .and_then(|r| r.map_err(SessionError::ControlChannel))
        {
            Ok(control) => control,
            Err(e) => {
                close_layers(None, &*session_layer).await;
                return Err(e);
            }
        };

        let args = JoinWorkspaceArgs::new(&opts.session_id, &opts.session_token);
        let joined = match cancellable(cancel, rpc::join_workspace(&*control, &args))
            .await
            .and_then(|r| r.map_err(SessionError::JoinWorkspace))
        {
            Ok(joined) => joined,
            Err(e) => {
                close_layers(Some(&*control), &*session_layer).await;
                return Err(e);
            }
        };
        info!(session_number = joined.session_number, "joined workspace");

        let token = cancel.child_token();
        let mailbox = ReasonMailbox::new();

        let heartbeat = Heartbeat::new(
            control.clone(),
            opts.client_name.clone(),
            mailbox.clone(),
            config.heartbeat_interval,
            config.default_heartbeat_reason.clone(),
        );
        let heartbeat_task = span.in_scope(|| heartbeat.spawn(token.child_token()));

        let internal = dialer.internal_client();
        let mut forwarder = PortForwarder::new(
            session_layer.clone(),
            control.clone(),
            INTERNAL_SESSION_NAME,
            INTERNAL_PORT,
        );
        if config.forward_keep_alive {
            forwarder = forwarder.with_keep_alive(mailbox.clone());
        }

        let tunnel = match tunnel::start(
            forwarder,
            &*internal,
            &opts.session_token,
            token.child_token(),
        )
        .instrument(span.clone())
        .await
        {
            Ok(tunnel) => tunnel,
            Err(e) => {
                warn!(error = %e, "internal tunnel failed, tearing down session");
                token.cancel();
                if let Err(e) = heartbeat_task.await {
                    warn!(error = %e, "heartbeat task ended abnormally");
                }
                close_layers(Some(&*control), &*session_layer).await;
                return Err(e);
            }
        };
        info!(local_addr = %tunnel.local_addr, "internal tunnel ready");

        Ok(Self {
            session_layer,
            control,
            internal,
            mailbox,
            client_name: opts.client_name.clone(),
            session_number: joined.session_number,
            tunnel_addr: tunnel.local_addr,
            span,
            cancel: token,
            tasks: Mutex::new(vec![heartbeat_task, tunnel.task]),
            closed: AtomicBool::new(false),
        })
    }

    /// Ask for the next heartbeat to carry `reason`.
    ///
    /// Only the latest reason posted between two ticks is sent.
    pub fn keep_alive(&self, reason: impl Into<String>) {
        if let Some(stale) = self.mailbox.post(reason) {
            debug!(parent: &self.span, stale = %stale, "replaced pending heartbeat reason");
        }
    }

    /// Session number assigned by the host on join.
    pub fn session_number(&self) -> i64 {
        self.session_number
    }

    pub fn client_name(&self) -> &str {
        &self.client_name
    }

    /// The internal control client, connected through the internal tunnel.
    pub fn internal_client(&self) -> &Arc<dyn InternalClient> {
        &self.internal
    }

    pub fn control(&self) -> &Arc<dyn ControlChannel> {
        &self.control
    }

    pub fn session_layer(&self) -> &Arc<dyn SessionLayer> {
        &self.session_layer
    }

    /// Loopback address the internal port is forwarded to.
    pub fn internal_tunnel_addr(&self) -> SocketAddr {
        self.tunnel_addr
    }

    /// Span the session's background tasks log under.
    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Stop the heartbeat and the internal tunnel, then close the control
    /// channel and the SSH session. Calling it again does nothing.
    pub async fn close(&self) -> Result<(), SessionError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        self.cancel.cancel();
        let tasks = std::mem::take(&mut *self.tasks.lock().expect("lock poisoned"));
        for task in tasks {
            if let Err(e) = task.await {
                warn!(parent: &self.span, error = %e, "background task ended abnormally");
            }
        }

        let control = self.control.close().await.map_err(SessionError::ControlChannel);
        let session = self
            .session_layer
            .close()
            .await
            .map_err(SessionError::SessionLayer);
        info!(parent: &self.span, "session closed");
        control.and(session)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Best-effort teardown after a failed connect.
async fn close_layers(control: Option<&dyn ControlChannel>, session_layer: &dyn SessionLayer) {
    if let Some(control) = control {
        if let Err(e) = control.close().await {
            warn!(error = %e, "failed to close control channel");
        }
    }
    if let Err(e) = session_layer.close().await {
        warn!(error = %e, "failed to close ssh session");
    }
}
