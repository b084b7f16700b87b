// src/analyze/mod.rs
//! Enrichment: named entities plus an aggregate sentiment score per document.

pub mod ner;
pub mod sentiment;

use std::collections::HashMap;
use std::path::Path;

use tracing::info;

use crate::errors::{ModelError, ProcessError};

pub use ner::{EntityExtractor, EntityRule};
pub use sentiment::SentimentModel;

/// Output of one enrichment call.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Extraction {
    /// Entity text → entity type. Iteration order is unspecified.
    pub entities: HashMap<String, String>,
    /// Mean sentence polarity in `[0.0, 1.0]`.
    pub sentiment: f32,
}

/// Text in, entities + sentiment out.
///
/// Implementations are immutable after construction and shared by reference for
/// the whole run, which lets tests swap in a fixed fake.
pub trait Enricher: Send + Sync {
    fn enrich(&self, text: &str) -> Result<Extraction, ProcessError>;
}

/// Production model: lexicon sentiment plus rule-based entities.
#[derive(Debug, Clone)]
pub struct EnrichmentModel {
    sentiment: SentimentModel,
    entities: EntityExtractor,
}

impl EnrichmentModel {
    pub fn new(sentiment: SentimentModel, entities: EntityExtractor) -> Self {
        Self {
            sentiment,
            entities,
        }
    }

    /// Load both halves. `None` paths fall back to the embedded lexicon and the
    /// default rule lookup.
    pub fn load(lexicon: Option<&Path>, rules: Option<&Path>) -> Result<Self, ModelError> {
        let sentiment = match lexicon {
            Some(p) => SentimentModel::from_path(p)?,
            None => SentimentModel::embedded()?,
        };
        let entities = EntityExtractor::load(rules)?;
        info!(
            lexicon_words = sentiment.len(),
            entity_rules = entities.rule_count(),
            "enrichment model loaded"
        );
        Ok(Self::new(sentiment, entities))
    }
}

impl Enricher for EnrichmentModel {
    fn enrich(&self, text: &str) -> Result<Extraction, ProcessError> {
        if text.trim().is_empty() {
            return Err(ProcessError::extraction("document body is empty"));
        }
        let sentiment = self
            .sentiment
            .average_polarity(text)
            .ok_or_else(|| ProcessError::extraction("document body has no words"))?;
        Ok(Extraction {
            entities: self.entities.extract(text),
            sentiment,
        })
    }
}
