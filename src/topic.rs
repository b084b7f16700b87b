// src/topic.rs
use tracing::info;

use crate::broker::{Broker, TopicId};
use crate::errors::ResolutionError;

/// Nickname of the document topic; the broker maps it to the id actually used.
pub const BALEEN_TOPIC: &str = "baleen-docs";

/// Turns topic nicknames into topic ids, creating topics that don't exist yet.
pub struct TopicResolver<'a> {
    broker: &'a dyn Broker,
}

impl<'a> TopicResolver<'a> {
    pub fn new(broker: &'a dyn Broker) -> Self {
        Self { broker }
    }

    pub async fn resolve(&self, name: &str) -> Result<TopicId, ResolutionError> {
        let exists = self
            .broker
            .topic_exists(name)
            .await
            .map_err(|source| ResolutionError::Exists {
                name: name.to_string(),
                source,
            })?;

        if !exists {
            let id = self
                .broker
                .create_topic(name)
                .await
                .map_err(|source| ResolutionError::Create {
                    name: name.to_string(),
                    source,
                })?;
            info!(topic = name, id = %id, "created topic");
            return Ok(id);
        }

        let topics = self
            .broker
            .list_topics()
            .await
            .map_err(ResolutionError::List)?;
        let topic = topics
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| ResolutionError::NotListed(name.to_string()))?;
        let id = TopicId::try_from(topic.id.as_slice()).map_err(|source| {
            ResolutionError::InvalidId {
                name: name.to_string(),
                source,
            }
        })?;

        info!(topic = name, id = %id, "found existing topic");
        Ok(id)
    }
}
