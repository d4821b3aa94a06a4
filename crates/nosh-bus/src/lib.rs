// In-process pub/sub bus for order events.
// Topics are plain strings; a topic exists exactly while it has subscribers.
// Delivery is fan-out with per-subscriber bounded queues: a slow subscriber
// drops locally instead of stalling publishers or other subscribers.
use arc_swap::ArcSwap;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use slab::Slab;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// Per-subscriber delivery predicate over the published payload.
pub type Filter = dyn Fn(&Value) -> bool + Send + Sync;

const DEFAULT_QUEUE_CAPACITY: usize = 64;

struct SubscriberSlot {
    sender: mpsc::Sender<Arc<Value>>,
    filter: Option<Arc<Filter>>,
}

#[derive(Clone)]
struct SubscriberEntry {
    id: usize,
    sender: mpsc::Sender<Arc<Value>>,
    filter: Option<Arc<Filter>>,
}

struct TopicState {
    // Snapshot used by the publish hot path: lock-free read, taken at
    // publish time. A subscriber added mid-publish may miss that event but
    // sees everything published after its registration completes.
    snapshot: ArcSwap<Vec<SubscriberEntry>>,
    // Registry mutated only on subscribe/unsubscribe paths.
    subscribers: Mutex<Slab<SubscriberSlot>>,
}

impl TopicState {
    fn new() -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(Vec::new()),
            subscribers: Mutex::new(Slab::new()),
        }
    }

    fn register(
        &self,
        filter: Option<Arc<Filter>>,
        queue_capacity: usize,
    ) -> (usize, mpsc::Sender<Arc<Value>>, mpsc::Receiver<Arc<Value>>) {
        let mut slots = self.subscribers.lock();
        let (tx, rx) = mpsc::channel(queue_capacity);
        let id = slots.insert(SubscriberSlot {
            sender: tx.clone(),
            filter,
        });
        self.rebuild_snapshot(&slots);
        (id, tx, rx)
    }

    // Slab ids are reused after removal, so every removal target carries
    // the sender it was registered with; a slot whose channel no longer
    // matches belongs to a newer subscriber and is left alone.
    fn remove(&self, targets: &[(usize, mpsc::Sender<Arc<Value>>)]) -> bool {
        let mut slots = self.subscribers.lock();
        let mut removed = false;
        for (id, sender) in targets {
            let matches = slots
                .get(*id)
                .is_some_and(|slot| slot.sender.same_channel(sender));
            if matches {
                slots.remove(*id);
                removed = true;
            }
        }
        if removed {
            self.rebuild_snapshot(&slots);
        }
        slots.is_empty()
    }

    fn rebuild_snapshot(&self, slots: &Slab<SubscriberSlot>) {
        let mut snapshot = Vec::with_capacity(slots.len());
        for (id, slot) in slots.iter() {
            snapshot.push(SubscriberEntry {
                id,
                sender: slot.sender.clone(),
                filter: slot.filter.clone(),
            });
        }
        self.snapshot.store(Arc::new(snapshot));
    }
}

struct BusInner {
    topics: RwLock<HashMap<String, Arc<TopicState>>>,
    queue_capacity: usize,
}

impl BusInner {
    // Unregister subscribers from the exact state they registered with and
    // drop the topic once the last one leaves. Resolving the topic by name
    // here would be wrong: the topic may have been torn down and recreated
    // with a brand-new state since the caller registered.
    fn remove_subscribers(
        &self,
        topic: &str,
        state: &Arc<TopicState>,
        targets: &[(usize, mpsc::Sender<Arc<Value>>)],
    ) {
        if !state.remove(targets) {
            return;
        }
        let mut topics = self.topics.write();
        // Re-check under the write lock; a subscriber may have arrived in
        // the meantime, and registration happens under the read lock.
        if let Some(current) = topics.get(topic) {
            if Arc::ptr_eq(current, state) && current.subscribers.lock().is_empty() {
                topics.remove(topic);
            }
        }
    }
}

/// Process-wide event bus. Cheap to clone; construct one at startup and
/// hand it to the components that publish or subscribe.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                topics: RwLock::new(HashMap::new()),
                queue_capacity: DEFAULT_QUEUE_CAPACITY,
            }),
        }
    }

    /// Per-subscriber queue depth. Values below 1 are clamped to 1.
    pub fn with_queue_capacity(self, capacity: usize) -> Self {
        Self {
            inner: Arc::new(BusInner {
                topics: RwLock::new(HashMap::new()),
                queue_capacity: capacity.max(1),
            }),
        }
    }

    /// Publish `payload` to every current subscriber of `topic` whose
    /// filter accepts it. Returns the number of deliveries.
    ///
    /// Never blocks and never fails: an unknown topic or one with no
    /// subscribers is a no-op, and a subscriber whose queue is full simply
    /// misses this event.
    pub fn publish(&self, topic: &str, payload: Value) -> usize {
        let state = self.inner.topics.read().get(topic).cloned();
        let Some(state) = state else {
            return 0;
        };

        let payload = Arc::new(payload);
        let snapshot = state.snapshot.load_full();
        let mut closed = Vec::new();
        let mut delivered = 0usize;
        for entry in snapshot.iter() {
            if let Some(filter) = &entry.filter {
                // A panicking filter must not take down the bus; that
                // subscriber just misses this event.
                let keep = catch_unwind(AssertUnwindSafe(|| filter(&payload)));
                match keep {
                    Ok(true) => {}
                    Ok(false) => continue,
                    Err(_) => {
                        tracing::debug!(topic, subscriber = entry.id, "subscriber filter panicked");
                        continue;
                    }
                }
            }
            match entry.sender.try_send(Arc::clone(&payload)) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    metrics::counter!("nosh_bus_dropped_total").increment(1);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    closed.push((entry.id, entry.sender.clone()));
                }
            }
        }
        if !closed.is_empty() {
            self.inner.remove_subscribers(topic, &state, &closed);
        }
        metrics::counter!("nosh_bus_delivered_total").increment(delivered as u64);
        delivered
    }

    /// Subscribe to every event published to `topic`.
    pub fn subscribe(&self, topic: &str) -> Subscription {
        self.subscribe_inner(topic, None)
    }

    /// Subscribe with a filter; only payloads the predicate accepts are
    /// delivered.
    pub fn subscribe_filtered<F>(&self, topic: &str, filter: F) -> Subscription
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.subscribe_inner(topic, Some(Arc::new(filter)))
    }

    fn subscribe_inner(&self, topic: &str, filter: Option<Arc<Filter>>) -> Subscription {
        // Register while holding the topics read lock so topic teardown
        // (which takes the write lock) cannot race the registration.
        let (state, id, sender, receiver) = loop {
            {
                let topics = self.inner.topics.read();
                if let Some(state) = topics.get(topic) {
                    let (id, sender, receiver) =
                        state.register(filter.clone(), self.inner.queue_capacity);
                    break (Arc::clone(state), id, sender, receiver);
                }
            }
            let mut topics = self.inner.topics.write();
            topics
                .entry(topic.to_string())
                .or_insert_with(|| Arc::new(TopicState::new()));
        };
        Subscription {
            receiver,
            _guard: SubscriptionGuard {
                bus: Arc::downgrade(&self.inner),
                state: Arc::downgrade(&state),
                topic: topic.to_string(),
                subscriber_id: id,
                sender,
            },
        }
    }

    #[cfg(test)]
    fn subscriber_count(&self, topic: &str) -> usize {
        self.inner
            .topics
            .read()
            .get(topic)
            .map(|state| state.subscribers.lock().len())
            .unwrap_or(0)
    }

    #[cfg(test)]
    fn has_topic(&self, topic: &str) -> bool {
        self.inner.topics.read().contains_key(topic)
    }
}

/// RAII handle that unregisters the subscriber on drop.
///
/// Holds the exact `TopicState` it registered with (weakly) plus its own
/// sender, so a stale drop can never unregister a later subscriber that
/// recreated the topic or reused the slab id after a publish-side prune.
struct SubscriptionGuard {
    bus: Weak<BusInner>,
    state: Weak<TopicState>,
    topic: String,
    subscriber_id: usize,
    sender: mpsc::Sender<Arc<Value>>,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        let (Some(bus), Some(state)) = (self.bus.upgrade(), self.state.upgrade()) else {
            return;
        };
        bus.remove_subscribers(
            &self.topic,
            &state,
            &[(self.subscriber_id, self.sender.clone())],
        );
    }
}

/// Live, push-fed sequence of payloads for one subscriber.
///
/// Dropping the subscription unregisters it; events published afterwards
/// are not delivered, and missed events are never replayed.
pub struct Subscription {
    receiver: mpsc::Receiver<Arc<Value>>,
    _guard: SubscriptionGuard,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<Arc<Value>> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Result<Arc<Value>, mpsc::error::TryRecvError> {
        self.receiver.try_recv()
    }
}

impl futures_core::Stream for Subscription {
    type Item = Arc<Value>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn publish_delivers_to_subscriber() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe("orders");
        let delivered = bus.publish("orders", json!({"id": 1}));
        assert_eq!(delivered, 1);
        let payload = sub.recv().await.expect("recv");
        assert_eq!(payload.as_ref(), &json!({"id": 1}));
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_a_noop() {
        let bus = EventBus::new();
        assert_eq!(bus.publish("nobody-home", json!({"id": 1})), 0);
    }

    #[tokio::test]
    async fn delivery_order_matches_publish_order() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe("orders");
        bus.publish("orders", json!({"seq": 1}));
        bus.publish("orders", json!({"seq": 2}));
        assert_eq!(sub.recv().await.expect("recv").as_ref(), &json!({"seq": 1}));
        assert_eq!(sub.recv().await.expect("recv").as_ref(), &json!({"seq": 2}));
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_payload() {
        let bus = EventBus::new();
        let mut sub_a = bus.subscribe("orders");
        let mut sub_b = bus.subscribe("orders");
        assert_eq!(bus.publish("orders", json!({"id": 3})), 2);
        assert_eq!(sub_a.recv().await.expect("recv").as_ref(), &json!({"id": 3}));
        assert_eq!(sub_b.recv().await.expect("recv").as_ref(), &json!({"id": 3}));
    }

    #[tokio::test]
    async fn filters_route_payloads_per_subscriber() {
        let bus = EventBus::new();
        let mut sub_five =
            bus.subscribe_filtered("orders", |payload| payload["id"].as_i64() == Some(5));
        let mut sub_seven =
            bus.subscribe_filtered("orders", |payload| payload["id"].as_i64() == Some(7));
        let delivered = bus.publish("orders", json!({"id": 5}));
        assert_eq!(delivered, 1);
        assert_eq!(
            sub_five.recv().await.expect("recv").as_ref(),
            &json!({"id": 5})
        );
        assert!(sub_seven.try_recv().is_err());
    }

    #[tokio::test]
    async fn unfiltered_subscriber_always_receives() {
        let bus = EventBus::new();
        let mut all = bus.subscribe("orders");
        let mut none = bus.subscribe_filtered("orders", |_| false);
        assert_eq!(bus.publish("orders", json!({"id": 1})), 1);
        assert_eq!(all.recv().await.expect("recv").as_ref(), &json!({"id": 1}));
        assert!(none.try_recv().is_err());
    }

    #[tokio::test]
    async fn panicking_filter_does_not_break_other_deliveries() {
        let bus = EventBus::new();
        let mut broken = bus.subscribe_filtered("orders", |payload| {
            payload["missing"].as_str().expect("boom");
            true
        });
        let mut healthy = bus.subscribe("orders");
        let delivered = bus.publish("orders", json!({"id": 1}));
        assert_eq!(delivered, 1);
        assert_eq!(
            healthy.recv().await.expect("recv").as_ref(),
            &json!({"id": 1})
        );
        assert!(broken.try_recv().is_err());
    }

    #[tokio::test]
    async fn slow_subscriber_drops_without_blocking_publish() {
        let bus = EventBus::new().with_queue_capacity(1);
        let mut sub = bus.subscribe("orders");
        assert_eq!(bus.publish("orders", json!({"seq": 1})), 1);
        // Queue full: this event is dropped for the laggard, not queued.
        assert_eq!(bus.publish("orders", json!({"seq": 2})), 0);
        assert_eq!(sub.recv().await.expect("recv").as_ref(), &json!({"seq": 1}));
        assert!(sub.try_recv().is_err());
    }

    #[tokio::test]
    async fn drop_unregisters_and_tears_down_idle_topic() {
        let bus = EventBus::new();
        let sub = bus.subscribe("orders");
        assert_eq!(bus.subscriber_count("orders"), 1);
        drop(sub);
        assert_eq!(bus.subscriber_count("orders"), 0);
        assert!(!bus.has_topic("orders"));
        // Publishing after the disconnect must not error.
        assert_eq!(bus.publish("orders", json!({"id": 1})), 0);
    }

    #[tokio::test]
    async fn remaining_subscriber_keeps_topic_alive() {
        let bus = EventBus::new();
        let sub_a = bus.subscribe("orders");
        let mut sub_b = bus.subscribe("orders");
        drop(sub_a);
        assert!(bus.has_topic("orders"));
        assert_eq!(bus.publish("orders", json!({"id": 2})), 1);
        assert_eq!(sub_b.recv().await.expect("recv").as_ref(), &json!({"id": 2}));
    }

    // Replays the pathological interleaving by hand: a publish-side prune
    // removes the subscriber and tears the topic down before its guard
    // runs, and a replacement subscriber recreates the topic.
    #[tokio::test]
    async fn stale_guard_ignores_a_recreated_topic() {
        let bus = EventBus::new();
        let sub_a = bus.subscribe("orders");
        {
            let state = bus.inner.topics.read().get("orders").cloned().expect("state");
            let targets: Vec<_> = state
                .snapshot
                .load()
                .iter()
                .map(|entry| (entry.id, entry.sender.clone()))
                .collect();
            bus.inner.remove_subscribers("orders", &state, &targets);
        }
        assert!(!bus.has_topic("orders"));

        let mut sub_b = bus.subscribe("orders");
        assert_eq!(bus.subscriber_count("orders"), 1);

        // The stale guard fires against a topic state it never registered
        // with; the replacement subscriber must survive.
        drop(sub_a);
        assert_eq!(bus.subscriber_count("orders"), 1);
        assert_eq!(bus.publish("orders", json!({"id": 1})), 1);
        assert_eq!(sub_b.recv().await.expect("recv").as_ref(), &json!({"id": 1}));
    }

    // Same hazard one level down: the prune frees the slab slot without
    // tearing the topic down, and the replacement reuses the freed id in
    // the same state. The guard must match on the channel, not the id.
    #[tokio::test]
    async fn stale_guard_ignores_a_reused_slot() {
        let bus = EventBus::new();
        let sub_a = bus.subscribe("orders");
        let state = bus.inner.topics.read().get("orders").cloned().expect("state");
        let targets: Vec<_> = state
            .snapshot
            .load()
            .iter()
            .map(|entry| (entry.id, entry.sender.clone()))
            .collect();
        state.remove(&targets);
        assert_eq!(bus.subscriber_count("orders"), 0);

        // Slab hands the freed id to the next registration.
        let mut sub_b = bus.subscribe("orders");
        assert_eq!(bus.subscriber_count("orders"), 1);

        drop(sub_a);
        assert_eq!(bus.subscriber_count("orders"), 1);
        assert_eq!(bus.publish("orders", json!({"id": 2})), 1);
        assert_eq!(sub_b.recv().await.expect("recv").as_ref(), &json!({"id": 2}));
    }

    #[tokio::test]
    async fn late_subscriber_misses_earlier_events() {
        let bus = EventBus::new();
        let _anchor = bus.subscribe("orders");
        bus.publish("orders", json!({"seq": 1}));
        let mut late = bus.subscribe("orders");
        bus.publish("orders", json!({"seq": 2}));
        assert_eq!(late.recv().await.expect("recv").as_ref(), &json!({"seq": 2}));
        assert!(late.try_recv().is_err());
    }

    #[tokio::test]
    async fn subscription_is_a_stream() {
        use futures_core::Stream;
        use std::future::poll_fn;

        let bus = EventBus::new();
        let mut sub = bus.subscribe("orders");
        bus.publish("orders", json!({"id": 4}));
        let item = poll_fn(|cx| Pin::new(&mut sub).poll_next(cx)).await;
        assert_eq!(item.expect("item").as_ref(), &json!({"id": 4}));
    }
}
