// src/broker/subscription.rs
use tokio::sync::mpsc;
use tracing::debug;

use super::{Event, TopicId};

type Release = Box<dyn FnOnce() + Send>;

/// Open handle on a topic's event feed.
///
/// The feed is finite only because the transport (or `close`) ends it. Transport
/// resources are released exactly once: on `close`, or on drop if `close` never ran.
pub struct Subscription {
    topic: TopicId,
    events: mpsc::Receiver<Event>,
    release: Option<Release>,
}

impl Subscription {
    pub fn new(
        topic: TopicId,
        events: mpsc::Receiver<Event>,
        release: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            topic,
            events,
            release: Some(Box::new(release)),
        }
    }

    pub fn topic(&self) -> &TopicId {
        &self.topic
    }

    /// Next event in transport order; `None` once the feed is closed.
    pub async fn next(&mut self) -> Option<Event> {
        self.events.recv().await
    }

    pub fn is_closed(&self) -> bool {
        self.release.is_none()
    }

    /// Stop the feed and release transport resources. Idempotent.
    pub fn close(&mut self) {
        if let Some(release) = self.release.take() {
            self.events.close();
            release();
            debug!(topic = %self.topic, "subscription released");
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counted(count: &Arc<AtomicUsize>) -> impl FnOnce() + Send + 'static {
        let count = count.clone();
        move || {
            count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn close_then_drop_releases_once() {
        let releases = Arc::new(AtomicUsize::new(0));
        let (_tx, rx) = mpsc::channel(4);
        let mut sub = Subscription::new(TopicId::from_bytes([7; 16]), rx, counted(&releases));

        sub.close();
        sub.close();
        assert!(sub.is_closed());
        drop(sub);

        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn drop_without_close_still_releases() {
        let releases = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::channel(4);
        {
            let mut sub = Subscription::new(TopicId::from_bytes([1; 16]), rx, counted(&releases));
            tx.send(Event::new("FeedItem", vec![])).await.unwrap();
            assert_eq!(sub.next().await.unwrap().type_name, "FeedItem");
        }
        assert_eq!(releases.load(Ordering::SeqCst), 1);
        assert!(tx.is_closed());
    }
}
