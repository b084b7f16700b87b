// src/broker/http.rs
//! Broker client for a REST/NDJSON bridge in front of the event broker.
//!
//! The hosted broker's native API is gRPC; this client does not speak it. It
//! expects a bridge that exposes `POST {auth}/v1/authenticate`,
//! `GET /v1/topics/exists?query=`, `GET|POST /v1/topics`, and a long-lived
//! `GET /v1/topics/{id}/events` NDJSON response, one event per line, pumped into
//! a channel by a background task. Point `ENSIGN_ENDPOINT` at such a bridge.
//! `InMemoryBroker` is the transport that needs no external service.

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{Broker, Event, Subscription, TopicId, TopicInfo};
use crate::config::Credentials;
use crate::errors::BrokerError;

const EVENT_BUFFER: usize = 64;

#[derive(Serialize)]
struct AuthRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
}

#[derive(Deserialize)]
struct AuthReply {
    access_token: String,
}

#[derive(Deserialize)]
struct ExistsReply {
    exists: bool,
}

#[derive(Serialize)]
struct CreateTopicRequest<'a> {
    name: &'a str,
}

#[derive(Deserialize)]
struct CreateTopicReply {
    id: String,
}

#[derive(Deserialize)]
struct TopicsPage {
    #[serde(default)]
    topics: Vec<WireTopic>,
}

#[derive(Deserialize)]
struct WireTopic {
    name: String,
    id: Vec<u8>,
}

#[derive(Deserialize)]
struct WireEventType {
    name: String,
}

#[derive(Deserialize)]
struct WireEvent {
    #[serde(rename = "type")]
    event_type: WireEventType,
    #[serde(default)]
    data: Vec<u8>,
}

/// Decode one NDJSON frame of the event stream.
pub(crate) fn parse_frame(line: &[u8]) -> Result<Event, serde_json::Error> {
    let wire: WireEvent = serde_json::from_slice(line)?;
    Ok(Event::new(wire.event_type.name, wire.data))
}

pub struct HttpBroker {
    http: reqwest::Client,
    endpoint: String,
    token: String,
}

impl HttpBroker {
    /// Authenticate and return a ready client.
    pub async fn connect(creds: &Credentials) -> Result<Self, BrokerError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let url = format!("{}/v1/authenticate", creds.auth_url.trim_end_matches('/'));
        let resp = http
            .post(&url)
            .json(&AuthRequest {
                client_id: &creds.client_id,
                client_secret: &creds.client_secret,
            })
            .send()
            .await
            .map_err(|e| BrokerError::Auth(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(BrokerError::Auth(format!(
                "{url} returned {}",
                resp.status().as_u16()
            )));
        }
        let reply: AuthReply = resp
            .json()
            .await
            .map_err(|e| BrokerError::Auth(e.to_string()))?;

        info!(endpoint = %creds.endpoint, "authenticated with event gateway");
        Ok(Self {
            http,
            endpoint: creds.endpoint.trim_end_matches('/').to_string(),
            token: reply.access_token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }

    fn check(resp: reqwest::Response) -> Result<reqwest::Response, BrokerError> {
        let status = resp.status();
        if status.is_success() {
            Ok(resp)
        } else {
            Err(BrokerError::Status {
                endpoint: resp.url().path().to_string(),
                status: status.as_u16(),
            })
        }
    }
}

#[async_trait]
impl Broker for HttpBroker {
    async fn topic_exists(&self, name: &str) -> Result<bool, BrokerError> {
        let resp = self
            .http
            .get(self.url("/v1/topics/exists"))
            .bearer_auth(&self.token)
            .query(&[("query", name)])
            .send()
            .await?;
        let reply: ExistsReply = Self::check(resp)?.json().await?;
        Ok(reply.exists)
    }

    async fn create_topic(&self, name: &str) -> Result<TopicId, BrokerError> {
        let resp = self
            .http
            .post(self.url("/v1/topics"))
            .bearer_auth(&self.token)
            .json(&CreateTopicRequest { name })
            .send()
            .await?;
        let reply: CreateTopicReply = Self::check(resp)?.json().await?;
        reply
            .id
            .parse()
            .map_err(|e| BrokerError::transport(format!("created topic id: {e}")))
    }

    async fn list_topics(&self) -> Result<Vec<TopicInfo>, BrokerError> {
        let resp = self
            .http
            .get(self.url("/v1/topics"))
            .bearer_auth(&self.token)
            .send()
            .await?;
        let page: TopicsPage = Self::check(resp)?.json().await?;
        Ok(page
            .topics
            .into_iter()
            .map(|t| TopicInfo {
                name: t.name,
                id: t.id,
            })
            .collect())
    }

    async fn subscribe(&self, topic: &TopicId) -> Result<Subscription, BrokerError> {
        let resp = self
            .http
            .get(self.url(&format!("/v1/topics/{topic}/events")))
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, "application/x-ndjson")
            .send()
            .await?;
        let resp = Self::check(resp)?;

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let pump = spawn_pump(resp, tx);
        Ok(Subscription::new(*topic, rx, move || pump.abort()))
    }

    fn name(&self) -> &'static str {
        "http-gateway"
    }
}

fn spawn_pump(resp: reqwest::Response, tx: mpsc::Sender<Event>) -> JoinHandle<()> {
    tokio::spawn(pump_frames(resp.bytes_stream(), tx))
}

/// Split a byte stream into NDJSON frames and forward each event. A final frame
/// without a trailing newline is still delivered when the stream ends.
async fn pump_frames<S, B, E>(mut stream: S, tx: mpsc::Sender<Event>)
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let mut buf: Vec<u8> = Vec::new();

    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "event stream broke; ending feed");
                return;
            }
        };
        buf.extend_from_slice(chunk.as_ref());

        while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = buf.drain(..=pos).collect();
            if !forward(&line, &tx).await {
                return;
            }
        }
    }
    forward(&buf, &tx).await;
    debug!("event stream closed by gateway");
}

/// Returns false once the subscriber is gone.
async fn forward(line: &[u8], tx: &mpsc::Sender<Event>) -> bool {
    let line = line.trim_ascii();
    if line.is_empty() {
        return true;
    }
    match parse_frame(line) {
        Ok(event) => {
            if tx.send(event).await.is_err() {
                debug!("subscriber gone; stopping pump");
                return false;
            }
        }
        Err(e) => warn!(error = %e, "skipping malformed event frame"),
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_carries_type_and_raw_payload() {
        let ev = parse_frame(br#"{"type":{"name":"Document","version":1},"data":[1,2,255]}"#)
            .unwrap();
        assert_eq!(ev.type_name, "Document");
        assert_eq!(ev.data, vec![1, 2, 255]);
    }

    #[test]
    fn frame_without_data_is_empty_payload() {
        let ev = parse_frame(br#"{"type":{"name":"FeedItem"}}"#).unwrap();
        assert_eq!(ev.type_name, "FeedItem");
        assert!(ev.data.is_empty());
    }

    #[test]
    fn frame_without_type_is_rejected() {
        assert!(parse_frame(br#"{"data":[1]}"#).is_err());
        assert!(parse_frame(b"not json").is_err());
    }

    async fn pumped(chunks: Vec<Result<&'static [u8], std::io::Error>>) -> Vec<String> {
        let (tx, mut rx) = mpsc::channel(8);
        pump_frames(futures::stream::iter(chunks), tx).await;
        let mut names = Vec::new();
        while let Some(ev) = rx.recv().await {
            names.push(ev.type_name);
        }
        names
    }

    #[tokio::test]
    async fn last_frame_without_newline_is_delivered() {
        let names = pumped(vec![Ok(
            br#"{"type":{"name":"FeedItem"}}
{"type":{"name":"Document"},"data":[1]}"#
                .as_slice(),
        )])
        .await;
        assert_eq!(names, vec!["FeedItem", "Document"]);
    }

    #[tokio::test]
    async fn frames_split_across_chunks_are_reassembled() {
        let names = pumped(vec![
            Ok(br#"{"type":{"na"#.as_slice()),
            Ok(b"me\":\"Document\"}}\n\n garbage\n".as_slice()),
            Ok(br#"{"type":{"name":"FeedItem"}}"#.as_slice()),
            Ok(b"\n".as_slice()),
        ])
        .await;
        assert_eq!(names, vec!["Document", "FeedItem"]);
    }

    #[tokio::test]
    async fn broken_stream_drops_the_partial_frame() {
        let names = pumped(vec![
            Ok(br#"{"type":{"name":"FeedItem"}}"#.as_slice()),
            Ok(b"\n{\"type\":{\"name\":\"Doc".as_slice()),
            Err(std::io::Error::other("reset")),
        ])
        .await;
        assert_eq!(names, vec!["FeedItem"]);
    }
}
