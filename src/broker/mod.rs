// src/broker/mod.rs
//! Publish/subscribe transport boundary.
//!
//! The consumer only needs four calls from a broker: topic existence, topic
//! creation, topic listing and subscription. `HttpBroker` speaks to the hosted
//! gateway; `InMemoryBroker` keeps everything in-process.

pub mod http;
pub mod memory;
pub mod subscription;
pub mod topic_id;

use async_trait::async_trait;

use crate::errors::BrokerError;

pub use http::HttpBroker;
pub use memory::InMemoryBroker;
pub use subscription::Subscription;
pub use topic_id::TopicId;

/// One delivered unit on a topic feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Declared type, e.g. "Document" or "FeedItem".
    pub type_name: String,
    /// Opaque payload; its schema depends on `type_name`.
    pub data: Vec<u8>,
}

impl Event {
    pub fn new(type_name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            type_name: type_name.into(),
            data,
        }
    }
}

/// A topic as reported by `list_topics`. The id is still in raw wire form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicInfo {
    pub name: String,
    pub id: Vec<u8>,
}

#[async_trait]
pub trait Broker: Send + Sync {
    async fn topic_exists(&self, name: &str) -> Result<bool, BrokerError>;
    async fn create_topic(&self, name: &str) -> Result<TopicId, BrokerError>;
    async fn list_topics(&self) -> Result<Vec<TopicInfo>, BrokerError>;
    async fn subscribe(&self, topic: &TopicId) -> Result<Subscription, BrokerError>;

    /// Name used in logs.
    fn name(&self) -> &'static str;
}
