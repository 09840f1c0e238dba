//! Event broadcaster
//!
//! In-process publish/subscribe keyed by operation id. Each subscription is
//! an unbounded channel; publishing pushes the message into every channel
//! registered on the topic at that moment. Nothing is buffered for late
//! subscribers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::mpsc;

/// Identifies one registration on one topic
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    topic: String,
    id: u64,
}

impl SubscriptionHandle {
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

type Registry = HashMap<String, Vec<(u64, mpsc::UnboundedSender<String>)>>;

/// Topic-keyed fan-out of log lines to live subscribers
#[derive(Default)]
pub struct Broadcaster {
    topics: Mutex<Registry>,
    next_id: AtomicU64,
}

impl Broadcaster {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        // a panic while holding the lock cannot leave the map half-updated
        self.topics.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new subscriber on `topic`
    ///
    /// The returned [`Subscription`] unsubscribes itself when dropped.
    pub fn subscribe(self: &Arc<Self>, topic: &str) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();

        self.registry()
            .entry(topic.to_string())
            .or_default()
            .push((id, tx));

        tracing::debug!(topic, subscription = id, "Subscriber registered");

        Subscription {
            handle: SubscriptionHandle {
                topic: topic.to_string(),
                id,
            },
            receiver: rx,
            broadcaster: Arc::downgrade(self),
        }
    }

    /// Deliver `message` to every subscriber currently registered on `topic`
    ///
    /// Delivery follows registration order. Returns how many subscribers
    /// received the message.
    pub fn publish(&self, topic: &str, message: &str) -> usize {
        let senders: Vec<_> = match self.registry().get(topic) {
            Some(subscribers) => subscribers.clone(),
            None => return 0,
        };

        let mut delivered = 0;
        let mut closed = Vec::new();

        for (id, tx) in senders {
            if tx.send(message.to_string()).is_ok() {
                delivered += 1;
            } else {
                closed.push(id);
            }
        }

        if !closed.is_empty() {
            self.remove(topic, |id| closed.contains(&id));
        }

        delivered
    }

    /// Remove exactly the registration behind `handle`
    ///
    /// Unsubscribing twice is a no-op.
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) {
        if self.remove(&handle.topic, |id| id == handle.id) {
            tracing::debug!(
                topic = handle.topic.as_str(),
                subscription = handle.id,
                "Subscriber removed"
            );
        }
    }

    /// Number of live registrations on `topic`
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.registry().get(topic).map_or(0, Vec::len)
    }

    fn remove(&self, topic: &str, matches: impl Fn(u64) -> bool) -> bool {
        let mut registry = self.registry();
        let Some(subscribers) = registry.get_mut(topic) else {
            return false;
        };

        let before = subscribers.len();
        subscribers.retain(|(id, _)| !matches(*id));
        let removed = subscribers.len() != before;

        if subscribers.is_empty() {
            registry.remove(topic);
        }

        removed
    }
}

/// A live registration on one topic
///
/// Owns the receiving end of the channel. Dropping it unregisters the
/// subscriber, so a disconnected stream never leaks its registration.
pub struct Subscription {
    handle: SubscriptionHandle,
    receiver: mpsc::UnboundedReceiver<String>,
    broadcaster: Weak<Broadcaster>,
}

impl Subscription {
    pub fn handle(&self) -> &SubscriptionHandle {
        &self.handle
    }

    /// Next published message, or `None` once unsubscribed
    pub async fn recv(&mut self) -> Option<String> {
        self.receiver.recv().await
    }

    /// Next message if one is already queued
    pub fn try_recv(&mut self) -> Option<String> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(broadcaster) = self.broadcaster.upgrade() {
            broadcaster.unsubscribe(&self.handle);
        }
    }
}
