//! The inbound action loop.
//!
//! A single task drains the inbound channel and publishes each envelope
//! through the [`Dispatcher`], one at a time. The acknowledgment goes out
//! on the [`Notifier`] addressed to the acting player.

use std::sync::Arc;

use petfarm_types::Envelope;
use tokio::sync::mpsc;

use crate::dispatcher::Dispatcher;
use crate::events::Notifier;
use crate::shutdown::Shutdown;

/// Sequential consumer of inbound envelopes.
pub struct EventLoop {
    dispatcher: Arc<Dispatcher>,
    notifier: Notifier,
    inbound: mpsc::Receiver<Envelope>,
}

impl EventLoop {
    /// Create a loop draining `inbound`.
    pub const fn new(
        dispatcher: Arc<Dispatcher>,
        notifier: Notifier,
        inbound: mpsc::Receiver<Envelope>,
    ) -> Self {
        Self {
            dispatcher,
            notifier,
            inbound,
        }
    }

    /// Process envelopes until `shutdown` fires or every sender is dropped.
    /// Returns how many were processed.
    pub async fn run(mut self, shutdown: Arc<Shutdown>) -> u64 {
        let mut processed = 0_u64;
        tracing::info!("Event loop started");

        loop {
            let envelope = tokio::select! {
                () = shutdown.wait() => break,
                next = self.inbound.recv() => match next {
                    Some(envelope) => envelope,
                    None => {
                        tracing::info!("Inbound channel closed");
                        break;
                    }
                },
            };

            let ack = self.dispatcher.publish(&envelope).await;
            tracing::debug!(
                player_id = %envelope.player_id,
                request_id = %envelope.request_id,
                topic = %envelope.topic(),
                success = ack.success,
                "Action processed"
            );
            self.notifier.ack(envelope.player_id, ack);
            processed = processed.saturating_add(1);
        }

        tracing::info!(processed, "Event loop stopped");
        processed
    }
}
