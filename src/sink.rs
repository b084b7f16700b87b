// src/sink.rs
//! Tabular output: one row per extracted entity.
//!
//! Column order is fixed: entity, entity type, document title, fetched-at
//! (RFC 3339, UTC), document link, average sentiment (six decimals). No header row.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use chrono::SecondsFormat;
use tracing::debug;

use crate::document::Document;
use crate::errors::WriteError;

#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub entity: String,
    pub entity_type: String,
    pub title: String,
    pub fetched_at: String,
    pub link: String,
    pub sentiment: f32,
}

impl ResultRow {
    pub fn new(doc: &Document, entity: &str, entity_type: &str, sentiment: f32) -> Self {
        Self {
            entity: entity.to_string(),
            entity_type: entity_type.to_string(),
            title: doc.title.clone(),
            fetched_at: doc
                .fetched_at_utc()
                .to_rfc3339_opts(SecondsFormat::AutoSi, true),
            link: doc.link.clone(),
            sentiment,
        }
    }

    pub fn fields(&self) -> [String; 6] {
        [
            self.entity.clone(),
            self.entity_type.clone(),
            self.title.clone(),
            self.fetched_at.clone(),
            self.link.clone(),
            format!("{:.6}", self.sentiment),
        ]
    }
}

/// Append-only row store.
pub trait RowSink {
    fn append(&mut self, row: &ResultRow) -> Result<(), WriteError>;
    fn flush(&mut self) -> Result<(), WriteError>;
    /// Flush and release the underlying resource. Idempotent.
    fn close(&mut self) -> Result<(), WriteError>;
}

pub struct CsvSink<W: Write> {
    writer: Option<csv::Writer<W>>,
}

impl<W: Write> std::fmt::Debug for CsvSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsvSink")
            .field("closed", &self.writer.is_none())
            .finish()
    }
}

impl CsvSink<File> {
    /// Create (or truncate) the output file.
    pub fn create(path: &Path) -> Result<Self, WriteError> {
        let file = File::create(path).map_err(|source| WriteError::Open {
            path: path.display().to_string(),
            source,
        })?;
        debug!(path = %path.display(), "output file created");
        Ok(Self::from_writer(file))
    }
}

impl<W: Write> CsvSink<W> {
    pub fn from_writer(inner: W) -> Self {
        let writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(inner);
        Self {
            writer: Some(writer),
        }
    }

    /// Flush and hand back the inner writer.
    pub fn into_inner(mut self) -> Result<W, WriteError> {
        let writer = self.writer.take().ok_or(WriteError::Closed)?;
        writer
            .into_inner()
            .map_err(|e| WriteError::Flush(e.into_error()))
    }
}

impl<W: Write> RowSink for CsvSink<W> {
    fn append(&mut self, row: &ResultRow) -> Result<(), WriteError> {
        let writer = self.writer.as_mut().ok_or(WriteError::Closed)?;
        writer.write_record(row.fields())?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), WriteError> {
        let writer = self.writer.as_mut().ok_or(WriteError::Closed)?;
        writer.flush()?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), WriteError> {
        match self.writer.take() {
            Some(mut writer) => {
                writer.flush()?;
                debug!("output closed");
                Ok(())
            }
            None => Ok(()),
        }
    }
}
