// src/errors.rs
//! Error types for every stage of the consumer.
//!
//! Setup failures (`ConfigError`, `BrokerError`, `ResolutionError`, `ModelError`,
//! `WriteError::Open`) end the process. `ProcessError` and row-level `WriteError`s are
//! logged and the loop moves on to the next event.

use thiserror::Error;

/// Missing or unparseable environment configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required env var {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Failures reported by the publish/subscribe transport.
#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected response from {endpoint}: {status}")]
    Status { endpoint: String, status: u16 },

    #[error("unknown topic {0}")]
    UnknownTopic(String),
}

impl BrokerError {
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }
}

impl From<reqwest::Error> for BrokerError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// A raw topic identifier that does not have the 16-byte ULID layout.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopicIdError {
    #[error("topic id must be 16 bytes, got {0}")]
    InvalidLength(usize),

    #[error("topic id text must be 26 Crockford base32 characters: {0:?}")]
    InvalidText(String),
}

/// Failures while turning a topic nickname into a topic id.
#[derive(Error, Debug)]
pub enum ResolutionError {
    #[error("could not check whether topic {name} exists: {source}")]
    Exists {
        name: String,
        #[source]
        source: BrokerError,
    },

    #[error("could not create topic {name}: {source}")]
    Create {
        name: String,
        #[source]
        source: BrokerError,
    },

    #[error("could not list topics: {0}")]
    List(#[source] BrokerError),

    #[error("topic {0} reported as existing but missing from the topic list")]
    NotListed(String),

    #[error("topic {name} has an undecodable id: {source}")]
    InvalidId {
        name: String,
        #[source]
        source: TopicIdError,
    },
}

/// Per-event failures inside a `Document` event. Never fatal.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("failed to decode document payload: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("failed to extract entities: {0}")]
    Extraction(String),
}

impl ProcessError {
    pub fn extraction(msg: impl Into<String>) -> Self {
        Self::Extraction(msg.into())
    }
}

/// Failures while loading the enrichment model.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("reading {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("invalid entity rule {label}/{regex}: {source}")]
    Rule {
        label: String,
        regex: String,
        #[source]
        source: regex::Error,
    },
}

/// Failures of the tabular output.
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("could not create output file {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write row: {0}")]
    Row(#[from] csv::Error),

    #[error("failed to flush output: {0}")]
    Flush(#[from] std::io::Error),

    #[error("output already closed")]
    Closed,
}
