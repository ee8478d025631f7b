//! In-process publish/subscribe for inbound player actions.
//!
//! The [`Dispatcher`] maps each [`Topic`] to an ordered list of
//! [`Handler`]s. [`Dispatcher::publish`] awaits every current subscriber of
//! the envelope's topic in subscription order before returning, so delivery
//! is synchronous and at-least-once for the lifetime of the process.
//! Nothing is persisted; the dispatcher owns no domain state.
//!
//! Each request produces exactly one [`Ack`]: the first subscriber that
//! returns one wins and later answers are dropped. When nobody answers, the
//! caller gets a failed ack with [`RejectionReason::Unhandled`].

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use petfarm_types::{Ack, Envelope, RejectionReason, Topic};
use tokio::sync::RwLock;

/// A subscriber to one or more topics.
///
/// Handlers must tolerate being called more than once with the same
/// logical message.
pub trait Handler: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Process `envelope`. Returns the acknowledgment if this handler
    /// answers the request.
    fn handle<'a>(&'a self, envelope: &'a Envelope) -> BoxFuture<'a, Option<Ack>>;
}

/// Topic to handler routing table.
#[derive(Default)]
pub struct Dispatcher {
    routes: RwLock<BTreeMap<Topic, Vec<Arc<dyn Handler>>>>,
}

impl Dispatcher {
    /// An empty dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `handler` to `topic`.
    pub async fn subscribe(&self, topic: Topic, handler: Arc<dyn Handler>) {
        tracing::debug!(topic = %topic, handler = handler.name(), "Handler subscribed");
        self.routes
            .write()
            .await
            .entry(topic)
            .or_default()
            .push(handler);
    }

    /// Subscribe `handler` to every topic.
    pub async fn subscribe_all(&self, handler: &Arc<dyn Handler>) {
        for topic in Topic::ALL {
            self.subscribe(topic, Arc::clone(handler)).await;
        }
    }

    /// Number of handlers subscribed to `topic`.
    pub async fn subscriber_count(&self, topic: Topic) -> usize {
        self.routes.read().await.get(&topic).map_or(0, Vec::len)
    }

    /// Deliver `envelope` to every subscriber of its topic and return the
    /// single acknowledgment for the request.
    pub async fn publish(&self, envelope: &Envelope) -> Ack {
        let topic = envelope.topic();
        // Snapshot so handlers may subscribe without deadlocking.
        let handlers = self
            .routes
            .read()
            .await
            .get(&topic)
            .cloned()
            .unwrap_or_default();

        let mut answer = None;
        for handler in &handlers {
            let ack = handler.handle(envelope).await;
            match (&answer, ack) {
                (None, Some(ack)) => answer = Some(ack),
                (Some(_), Some(_)) => tracing::debug!(
                    topic = %topic,
                    handler = handler.name(),
                    request_id = %envelope.request_id,
                    "Dropping extra acknowledgment"
                ),
                (_, None) => {}
            }
        }

        answer.unwrap_or_else(|| {
            tracing::warn!(
                topic = %topic,
                request_id = %envelope.request_id,
                subscribers = handlers.len(),
                "No handler answered request"
            );
            Ack::fail(
                envelope,
                RejectionReason::Unhandled,
                format!("no handler for {topic}"),
            )
        })
    }
}
