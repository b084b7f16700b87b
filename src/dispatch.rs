// src/dispatch.rs
//! Per-event routing by declared type.

use std::time::Instant;

use metrics::{counter, histogram};
use tracing::{debug, info, warn};

use crate::analyze::{Enricher, Extraction};
use crate::broker::Event;
use crate::document::{normalize_text, Document};
use crate::errors::ProcessError;
use crate::sink::{ResultRow, RowSink};

pub const DOCUMENT_TYPE: &str = "Document";
pub const FEED_ITEM_TYPE: &str = "FeedItem";

/// Event types this consumer knows about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Document,
    FeedItem,
    Other(String),
}

impl EventKind {
    pub fn classify(type_name: &str) -> Self {
        match type_name {
            DOCUMENT_TYPE => Self::Document,
            FEED_ITEM_TYPE => Self::FeedItem,
            other => Self::Other(other.to_string()),
        }
    }
}

/// What happened to one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// A document was enriched; `written` of `entities` rows made it to the sink.
    Rows { entities: usize, written: usize },
    FeedItem,
    Ignored,
}

/// Decode a `Document` payload and enrich its body.
pub fn process_document(
    payload: &[u8],
    model: &dyn Enricher,
) -> Result<(Document, Extraction), ProcessError> {
    let doc = Document::decode_payload(payload)?;
    let text = normalize_text(&doc.content);
    let extraction = model.enrich(&text)?;
    Ok((doc, extraction))
}

pub struct EventDispatcher<'m, S: RowSink> {
    model: &'m dyn Enricher,
    sink: S,
}

impl<'m, S: RowSink> EventDispatcher<'m, S> {
    pub fn new(model: &'m dyn Enricher, sink: S) -> Self {
        Self { model, sink }
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Route one event. Unknown types are a no-op; only a `Document` that fails to
    /// decode or enrich returns an error, and that error is never fatal.
    pub fn dispatch(&mut self, event: &Event) -> Result<Dispatch, ProcessError> {
        match EventKind::classify(&event.type_name) {
            EventKind::Document => self.handle_document(&event.data),
            EventKind::FeedItem => {
                info!(target: "consumer", at = %chrono::Utc::now(), "feed item detected");
                counter!("consumer_feed_items_total").increment(1);
                Ok(Dispatch::FeedItem)
            }
            EventKind::Other(name) => {
                debug!(target: "consumer", event_type = %name, "ignoring event");
                counter!("consumer_ignored_events_total").increment(1);
                Ok(Dispatch::Ignored)
            }
        }
    }

    fn handle_document(&mut self, payload: &[u8]) -> Result<Dispatch, ProcessError> {
        let t0 = Instant::now();
        let (doc, extraction) = process_document(payload, self.model).inspect_err(|e| {
            let name = match e {
                ProcessError::Decode(_) => "consumer_decode_errors_total",
                ProcessError::Extraction(_) => "consumer_extraction_errors_total",
            };
            counter!(name).increment(1);
        })?;
        counter!("consumer_documents_total").increment(1);

        let mut written = 0usize;
        for (entity, label) in &extraction.entities {
            let row = ResultRow::new(&doc, entity, label, extraction.sentiment);
            match self.sink.append(&row) {
                Ok(()) => written += 1,
                Err(e) => {
                    warn!(error = %e, entity = %entity, "failed to write entity row");
                    counter!("consumer_row_errors_total").increment(1);
                }
            }
        }
        if let Err(e) = self.sink.flush() {
            warn!(error = %e, "failed to flush entity rows");
        }
        counter!("consumer_rows_written_total").increment(written as u64);
        histogram!("consumer_process_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

        info!(
            target: "consumer",
            title = %doc.title,
            entities = extraction.entities.len(),
            written,
            sentiment = extraction.sentiment,
            "stored extracted entities"
        );
        Ok(Dispatch::Rows {
            entities: extraction.entities.len(),
            written,
        })
    }
}
