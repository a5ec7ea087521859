// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-process publish/subscribe bus.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::event::DeviceEvent;

use super::Topic;

/// Unique identifier for a subscription.
///
/// IDs increase monotonically within a bus, which gives handlers of one
/// topic their delivery order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Returns the raw ID value.
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sub({})", self.0)
    }
}

type Handler<P> = Arc<dyn Fn(&P) + Send + Sync>;

struct Registry<P> {
    next_id: AtomicU64,
    topics: RwLock<HashMap<Topic, BTreeMap<SubscriptionId, Handler<P>>>>,
}

impl<P> Registry<P> {
    fn remove(&self, topic: &Topic, id: SubscriptionId) -> bool {
        let mut topics = self.topics.write();
        let Some(handlers) = topics.get_mut(topic) else {
            return false;
        };
        let removed = handlers.remove(&id).is_some();
        if handlers.is_empty() {
            topics.remove(topic);
        }
        removed
    }
}

/// Fan-out of payloads to any number of topic subscribers.
///
/// # Delivery
///
/// - Handlers of a topic run in the order they subscribed.
/// - Only handlers subscribed when [`publish`](Self::publish) is called see
///   the payload; nothing is stored or replayed.
/// - A handler that panics is logged and skipped; the remaining handlers still
///   run and the bus stays usable.
/// - Handlers run on the publishing thread, outside the internal lock, so a
///   handler may itself subscribe or unsubscribe.
///
/// Cloning the bus yields another handle to the same subscriptions.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use thermolink_lib::subscription::{NotificationBus, Topic};
///
/// let bus: NotificationBus<String> = NotificationBus::new();
/// let seen = Arc::new(AtomicUsize::new(0));
///
/// let counter = Arc::clone(&seen);
/// let subscription = bus.subscribe(Topic::from("greetings"), move |msg: &String| {
///     assert_eq!(msg, "hello");
///     counter.fetch_add(1, Ordering::SeqCst);
/// });
///
/// bus.publish(&Topic::from("greetings"), &"hello".to_string());
/// assert_eq!(seen.load(Ordering::SeqCst), 1);
///
/// subscription.unsubscribe();
/// bus.publish(&Topic::from("greetings"), &"hello".to_string());
/// assert_eq!(seen.load(Ordering::SeqCst), 1);
/// ```
pub struct NotificationBus<P = DeviceEvent> {
    registry: Arc<Registry<P>>,
}

impl<P> NotificationBus<P> {
    /// Creates a bus without subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Registry {
                next_id: AtomicU64::new(1),
                topics: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Registers `handler` for payloads published on `topic`.
    ///
    /// The handler stays registered until [`Subscription::unsubscribe`] is
    /// called; dropping the returned handle does not unsubscribe.
    pub fn subscribe<F>(&self, topic: Topic, handler: F) -> Subscription<P>
    where
        F: Fn(&P) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.registry.next_id.fetch_add(1, Ordering::Relaxed));
        tracing::trace!(topic = %topic, subscription = %id, "Subscribing");

        self.registry
            .topics
            .write()
            .entry(topic.clone())
            .or_default()
            .insert(id, Arc::new(handler));

        Subscription {
            id,
            topic,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Delivers `payload` to every handler subscribed to `topic`.
    ///
    /// Returns the number of handlers that completed without panicking.
    pub fn publish(&self, topic: &Topic, payload: &P) -> usize {
        // Snapshot the handlers so none run under the lock
        let handlers: Vec<(SubscriptionId, Handler<P>)> = match self.registry.topics.read().get(topic)
        {
            Some(handlers) => handlers
                .iter()
                .map(|(id, handler)| (*id, Arc::clone(handler)))
                .collect(),
            None => return 0,
        };

        let mut delivered = 0;
        for (id, handler) in handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(payload))).is_ok() {
                delivered += 1;
            } else {
                tracing::error!(topic = %topic, subscription = %id, "Subscriber panicked while handling notification");
            }
        }
        delivered
    }

    /// Returns the number of handlers subscribed to `topic`.
    #[must_use]
    pub fn subscriber_count(&self, topic: &Topic) -> usize {
        self.registry
            .topics
            .read()
            .get(topic)
            .map_or(0, BTreeMap::len)
    }

    /// Returns the number of handlers across all topics.
    #[must_use]
    pub fn total_subscribers(&self) -> usize {
        self.registry.topics.read().values().map(BTreeMap::len).sum()
    }

    /// Removes every subscription.
    pub fn clear(&self) {
        self.registry.topics.write().clear();
    }
}

impl<P> Default for NotificationBus<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> Clone for NotificationBus<P> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<P> fmt::Debug for NotificationBus<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationBus")
            .field("subscribers", &self.total_subscribers())
            .finish()
    }
}

/// Handle to a registered subscription.
///
/// The handle holds only a weak reference to the bus: unsubscribing after the
/// bus is gone is a no-op.
pub struct Subscription<P = DeviceEvent> {
    id: SubscriptionId,
    topic: Topic,
    registry: Weak<Registry<P>>,
}

impl<P> Subscription<P> {
    /// Returns the subscription ID.
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Returns the subscribed topic.
    #[must_use]
    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Removes the handler from the bus.
    ///
    /// Returns `true` if the handler was still registered.
    pub fn unsubscribe(self) -> bool {
        tracing::trace!(topic = %self.topic, subscription = %self.id, "Unsubscribing");
        self.registry
            .upgrade()
            .is_some_and(|registry| registry.remove(&self.topic, self.id))
    }
}

impl<P> fmt::Debug for Subscription<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("topic", &self.topic)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicU32;

    fn topic() -> Topic {
        Topic::from("test")
    }

    #[test]
    fn subscription_id_display() {
        let bus: NotificationBus<u32> = NotificationBus::new();
        let sub = bus.subscribe(topic(), |_| {});
        assert_eq!(sub.id().to_string(), format!("Sub({})", sub.id().value()));
    }

    #[test]
    fn new_bus_is_empty() {
        let bus: NotificationBus<u32> = NotificationBus::new();
        assert_eq!(bus.total_subscribers(), 0);
        assert_eq!(bus.publish(&topic(), &1), 0);
    }

    #[test]
    fn delivers_in_subscription_order() {
        let bus: NotificationBus<u32> = NotificationBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            bus.subscribe(topic(), move |value| order.lock().push((tag, *value)));
        }

        assert_eq!(bus.publish(&topic(), &7), 3);
        assert_eq!(
            *order.lock(),
            vec![("first", 7), ("second", 7), ("third", 7)]
        );
    }

    #[test]
    fn topics_are_isolated() {
        let bus: NotificationBus<u32> = NotificationBus::new();
        let counter = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&counter);
        bus.subscribe(Topic::from("a"), move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish(&Topic::from("b"), &1);
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        bus.publish(&Topic::from("a"), &1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn no_replay_for_late_subscribers() {
        let bus: NotificationBus<u32> = NotificationBus::new();
        bus.publish(&topic(), &1);

        let counter = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&counter);
        bus.subscribe(topic(), move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let bus: NotificationBus<u32> = NotificationBus::new();
        let counter = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&counter);
        let sub = bus.subscribe(topic(), move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish(&topic(), &1);
        assert!(sub.unsubscribe());
        bus.publish(&topic(), &2);

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(bus.subscriber_count(&topic()), 0);
    }

    #[test]
    fn unsubscribe_after_bus_dropped_is_noop() {
        let bus: NotificationBus<u32> = NotificationBus::new();
        let sub = bus.subscribe(topic(), |_| {});
        drop(bus);
        assert!(!sub.unsubscribe());
    }

    #[test]
    fn panicking_handler_does_not_break_delivery() {
        let bus: NotificationBus<u32> = NotificationBus::new();
        let counter = Arc::new(AtomicU32::new(0));

        let c = Arc::clone(&counter);
        bus.subscribe(topic(), move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        bus.subscribe(topic(), |_| panic!("handler failure"));
        let c = Arc::clone(&counter);
        bus.subscribe(topic(), move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(bus.publish(&topic(), &1), 2);
        assert_eq!(counter.load(Ordering::SeqCst), 2);

        // The bus keeps working for later publishes
        assert_eq!(bus.publish(&topic(), &2), 2);
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn handler_may_unsubscribe_reentrantly() {
        let bus: NotificationBus<u32> = NotificationBus::new();
        let slot: Arc<Mutex<Option<Subscription<u32>>>> = Arc::new(Mutex::new(None));

        let inner_slot = Arc::clone(&slot);
        let sub = bus.subscribe(topic(), move |_| {
            if let Some(sub) = inner_slot.lock().take() {
                sub.unsubscribe();
            }
        });
        *slot.lock() = Some(sub);

        assert_eq!(bus.publish(&topic(), &1), 1);
        assert_eq!(bus.subscriber_count(&topic()), 0);
    }

    #[test]
    fn clones_share_subscriptions() {
        let bus: NotificationBus<u32> = NotificationBus::new();
        let other = bus.clone();
        bus.subscribe(topic(), |_| {});

        assert_eq!(other.subscriber_count(&topic()), 1);
        other.clear();
        assert_eq!(bus.total_subscribers(), 0);
    }
}
