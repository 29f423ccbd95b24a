// ABOUTME: Periodic liveness signal for a connected session.
// ABOUTME: Each tick drains the reason mailbox and notifies the host over the control channel.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn, Instrument};

use crate::layers::ControlChannel;
use crate::mailbox::ReasonMailbox;
use crate::rpc;

/// Background task that keeps the workspace from being reclaimed as idle.
pub struct Heartbeat {
    control: Arc<dyn ControlChannel>,
    client_name: String,
    mailbox: ReasonMailbox,
    interval: Duration,
    default_reason: String,
}

impl Heartbeat {
    pub fn new(
        control: Arc<dyn ControlChannel>,
        client_name: impl Into<String>,
        mailbox: ReasonMailbox,
        interval: Duration,
        default_reason: impl Into<String>,
    ) -> Self {
        Self {
            control,
            client_name: client_name.into(),
            mailbox,
            interval,
            default_reason: default_reason.into(),
        }
    }

    /// Run the loop on its own task until `cancel` fires.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel).in_current_span())
    }

    /// Tick every interval; the first beat goes out one interval after start.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("heartbeat stopped");
                    return;
                }
                _ = ticker.tick() => {
                    // A stalled notify must not outlive the session.
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            debug!("heartbeat stopped during notify");
                            return;
                        }
                        _ = self.beat() => {}
                    }
                }
            }
        }
    }

    async fn beat(&self) {
        let reason = self.mailbox.take_or(&self.default_reason);
        debug!(reason = %reason, "heartbeat tick");

        if let Err(e) = rpc::notify_activity(&*self.control, &self.client_name, &reason).await {
            warn!(error = %e, reason = %reason, "failed to notify host of activity");
        }
    }
}
