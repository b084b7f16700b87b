// src/lib.rs
//! Downstream consumer for the baleen document topic.
//!
//! Resolves the topic, subscribes, and for every `Document` event extracts named
//! entities and an aggregate sentiment score, appending one CSV row per entity.
//! `FeedItem` and unknown events are acknowledged and skipped.

pub mod analyze;
pub mod broker;
pub mod config;
pub mod dispatch;
pub mod document;
pub mod errors;
pub mod pipeline;
pub mod sink;
pub mod telemetry;
pub mod topic;

pub use analyze::{Enricher, EnrichmentModel, Extraction};
pub use broker::{Broker, Event, Subscription, TopicId};
pub use dispatch::{Dispatch, EventDispatcher, EventKind};
pub use document::Document;
pub use pipeline::{Pipeline, PipelineStats};
pub use sink::{CsvSink, ResultRow, RowSink};
pub use topic::{TopicResolver, BALEEN_TOPIC};
