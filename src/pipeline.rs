// src/pipeline.rs
//! The consume loop: one event at a time, from subscription to sink.

use std::future::Future;

use metrics::counter;
use tracing::{error, info, instrument, warn};

use crate::analyze::Enricher;
use crate::broker::Subscription;
use crate::dispatch::{Dispatch, EventDispatcher};
use crate::errors::ProcessError;
use crate::sink::RowSink;

/// Counts for one run of the loop, logged at shutdown.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PipelineStats {
    pub events: u64,
    pub documents: u64,
    pub feed_items: u64,
    pub ignored: u64,
    pub decode_errors: u64,
    pub extraction_errors: u64,
    pub rows_written: u64,
    pub row_errors: u64,
}

impl PipelineStats {
    fn record(&mut self, outcome: &Result<Dispatch, ProcessError>) {
        self.events += 1;
        match outcome {
            Ok(Dispatch::Rows { entities, written }) => {
                self.documents += 1;
                self.rows_written += *written as u64;
                self.row_errors += entities.saturating_sub(*written) as u64;
            }
            Ok(Dispatch::FeedItem) => self.feed_items += 1,
            Ok(Dispatch::Ignored) => self.ignored += 1,
            Err(ProcessError::Decode(_)) => self.decode_errors += 1,
            Err(ProcessError::Extraction(_)) => self.extraction_errors += 1,
        }
    }
}

pub struct Pipeline<'m, S: RowSink> {
    dispatcher: EventDispatcher<'m, S>,
    stats: PipelineStats,
}

impl<'m, S: RowSink> Pipeline<'m, S> {
    pub fn new(model: &'m dyn Enricher, sink: S) -> Self {
        Self {
            dispatcher: EventDispatcher::new(model, sink),
            stats: PipelineStats::default(),
        }
    }

    /// Consume `sub` until the feed closes or `shutdown` resolves.
    ///
    /// The subscription and the sink are each released exactly once before this
    /// returns; the sink is handed back for inspection.
    #[instrument(skip_all, fields(topic = %sub.topic()))]
    pub async fn run<F>(mut self, mut sub: Subscription, shutdown: F) -> (PipelineStats, S)
    where
        F: Future<Output = ()>,
    {
        info!(target: "consumer", "waiting for events");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!(target: "consumer", "shutdown requested");
                    break;
                }
                next = sub.next() => {
                    let Some(event) = next else {
                        info!(target: "consumer", "event feed closed");
                        break;
                    };
                    counter!("consumer_events_total").increment(1);
                    let outcome = self.dispatcher.dispatch(&event);
                    if let Err(e) = &outcome {
                        warn!(target: "consumer", event_type = %event.type_name, error = %e, "skipping event");
                    }
                    self.stats.record(&outcome);
                }
            }
        }

        sub.close();
        let mut sink = self.dispatcher.into_sink();
        if let Err(e) = sink.close() {
            error!(error = %e, "failed to close output");
        }

        let s = self.stats;
        info!(
            target: "consumer",
            events = s.events,
            documents = s.documents,
            feed_items = s.feed_items,
            ignored = s.ignored,
            decode_errors = s.decode_errors,
            extraction_errors = s.extraction_errors,
            rows_written = s.rows_written,
            row_errors = s.row_errors,
            "consumer stopped"
        );
        (s, sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_count_partial_row_failures() {
        let mut s = PipelineStats::default();
        s.record(&Ok(Dispatch::Rows {
            entities: 3,
            written: 2,
        }));
        s.record(&Ok(Dispatch::Ignored));
        s.record(&Err(ProcessError::extraction("empty")));
        assert_eq!(s.events, 3);
        assert_eq!(s.documents, 1);
        assert_eq!(s.rows_written, 2);
        assert_eq!(s.row_errors, 1);
        assert_eq!(s.ignored, 1);
        assert_eq!(s.extraction_errors, 1);
    }
}
