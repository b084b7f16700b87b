// src/broker/memory.rs
//! In-process broker: topics live in memory, published events fan out to every
//! open subscription of the topic.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use super::{Broker, Event, Subscription, TopicId, TopicInfo};
use crate::errors::BrokerError;

/// Events a subscription holds before `publish` waits for it to drain.
pub const SUBSCRIBER_BUFFER: usize = 64;

#[derive(Default)]
struct Inner {
    topics: Vec<TopicInfo>,
    subscribers: HashMap<TopicId, Vec<(u64, mpsc::Sender<Event>)>>,
}

#[derive(Clone, Default)]
pub struct InMemoryBroker {
    inner: Arc<Mutex<Inner>>,
    next_id: Arc<AtomicU64>,
    created: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a topic with an arbitrary raw id, as a remote broker might report it.
    pub fn insert_topic(&self, name: &str, raw_id: Vec<u8>) {
        let mut inner = self.inner.lock().expect("broker mutex poisoned");
        inner.topics.push(TopicInfo {
            name: name.to_string(),
            id: raw_id,
        });
    }

    /// Deliver `event` to every open subscription of `topic`.
    /// Returns how many subscriptions received it.
    ///
    /// Each subscription buffers `SUBSCRIBER_BUFFER` events. Past that, this waits
    /// until the subscriber reads, so a test that publishes more than that before
    /// consuming must drive the pipeline concurrently.
    pub async fn publish(&self, topic: &TopicId, event: Event) -> Result<usize, BrokerError> {
        let senders: Vec<mpsc::Sender<Event>> = {
            let inner = self.inner.lock().expect("broker mutex poisoned");
            if !inner.topics.iter().any(|t| t.id == topic.as_bytes()) {
                return Err(BrokerError::UnknownTopic(topic.to_string()));
            }
            inner
                .subscribers
                .get(topic)
                .map(|subs| subs.iter().map(|(_, tx)| tx.clone()).collect())
                .unwrap_or_default()
        };

        let mut delivered = 0;
        for tx in senders {
            if tx.send(event.clone()).await.is_ok() {
                delivered += 1;
            }
        }
        Ok(delivered)
    }

    /// End the feed of every subscription on `topic` (upstream close).
    pub fn close_topic(&self, topic: &TopicId) {
        let mut inner = self.inner.lock().expect("broker mutex poisoned");
        inner.subscribers.remove(topic);
    }

    /// Number of topics created through `create_topic`.
    pub fn topics_created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Number of subscriptions that have been released.
    pub fn subscriptions_released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn open_subscriptions(&self, topic: &TopicId) -> usize {
        let inner = self.inner.lock().expect("broker mutex poisoned");
        inner.subscribers.get(topic).map_or(0, Vec::len)
    }

    fn issue_id(&self) -> TopicId {
        // ULID layout: 48-bit millisecond timestamp, then 80 bits of sequence.
        let millis = chrono::Utc::now().timestamp_millis().max(0) as u128;
        let seq = self.next_id.fetch_add(1, Ordering::SeqCst) as u128;
        let value = (millis << 80) | (seq & ((1u128 << 80) - 1));
        TopicId::from_bytes(value.to_be_bytes())
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn topic_exists(&self, name: &str) -> Result<bool, BrokerError> {
        let inner = self.inner.lock().expect("broker mutex poisoned");
        Ok(inner.topics.iter().any(|t| t.name == name))
    }

    async fn create_topic(&self, name: &str) -> Result<TopicId, BrokerError> {
        let id = self.issue_id();
        self.insert_topic(name, id.as_bytes().to_vec());
        self.created.fetch_add(1, Ordering::SeqCst);
        debug!(topic = name, id = %id, "created in-memory topic");
        Ok(id)
    }

    async fn list_topics(&self) -> Result<Vec<TopicInfo>, BrokerError> {
        let inner = self.inner.lock().expect("broker mutex poisoned");
        Ok(inner.topics.clone())
    }

    async fn subscribe(&self, topic: &TopicId) -> Result<Subscription, BrokerError> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        let sub_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        {
            let mut inner = self.inner.lock().expect("broker mutex poisoned");
            if !inner.topics.iter().any(|t| t.id == topic.as_bytes()) {
                return Err(BrokerError::UnknownTopic(topic.to_string()));
            }
            inner
                .subscribers
                .entry(*topic)
                .or_default()
                .push((sub_id, tx));
        }

        let inner = self.inner.clone();
        let released = self.released.clone();
        let topic_id = *topic;
        Ok(Subscription::new(*topic, rx, move || {
            if let Ok(mut inner) = inner.lock() {
                if let Some(subs) = inner.subscribers.get_mut(&topic_id) {
                    subs.retain(|(id, _)| *id != sub_id);
                }
            }
            released.fetch_add(1, Ordering::SeqCst);
        }))
    }

    fn name(&self) -> &'static str {
        "in-memory"
    }
}
