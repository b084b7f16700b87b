// src/document.rs
//! Document payload schema shared with the upstream publisher, plus the text
//! clean-up applied to its body before enrichment.
//!
//! Payloads are MessagePack maps keyed by the publisher's field names (`Title`,
//! `Link`, `FetchedAt`, `Content`); unknown keys are skipped. `FetchedAt` is a
//! MessagePack timestamp extension, either the publisher's own (type 5) or the
//! standard one (type -1).

use std::fmt;

use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use crate::errors::ProcessError;

/// Extension type the upstream codec uses for `time.Time`: 8-byte seconds, 4-byte nanos.
const EXT_TIME: i8 = 5;
/// MessagePack's standard timestamp extension.
const EXT_TIMESTAMP: i8 = -1;

/// A fetched page as published in `Document` events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Document {
    #[serde(alias = "title")]
    pub title: String,
    #[serde(alias = "link")]
    pub link: String,
    #[serde(
        default,
        alias = "fetched_at",
        serialize_with = "ser_timestamp",
        deserialize_with = "de_timestamp"
    )]
    pub fetched_at: Option<DateTime<Utc>>,
    /// Raw body; usually HTML.
    #[serde(alias = "content")]
    pub content: String,
}

impl Document {
    /// Decode a MessagePack payload. Empty, truncated, or mistyped input is an error.
    pub fn decode_payload(payload: &[u8]) -> Result<Self, ProcessError> {
        Ok(rmp_serde::from_slice(payload)?)
    }

    /// Encode the way the upstream publisher does (named map fields).
    pub fn encode_payload(&self) -> Result<Vec<u8>, rmp_serde::encode::Error> {
        rmp_serde::to_vec_named(self)
    }

    /// Fetch time in UTC; the Unix epoch when the publisher left it unset.
    pub fn fetched_at_utc(&self) -> DateTime<Utc> {
        self.fetched_at.unwrap_or(DateTime::UNIX_EPOCH)
    }

    pub fn set_fetched_at(&mut self, at: DateTime<Utc>) {
        self.fetched_at = Some(at);
    }
}

struct RawBytes<'a>(&'a [u8]);

impl Serialize for RawBytes<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(self.0)
    }
}

fn ser_timestamp<S: Serializer>(
    at: &Option<DateTime<Utc>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match at {
        Some(at) => {
            let mut buf = [0u8; 12];
            buf[..8].copy_from_slice(&at.timestamp().to_be_bytes());
            buf[8..].copy_from_slice(&at.timestamp_subsec_nanos().to_be_bytes());
            serializer.serialize_newtype_struct(
                rmp_serde::MSGPACK_EXT_STRUCT_NAME,
                &(EXT_TIME, RawBytes(&buf)),
            )
        }
        None => serializer.serialize_none(),
    }
}

fn de_timestamp<'de, D: Deserializer<'de>>(d: D) -> Result<Option<DateTime<Utc>>, D::Error> {
    d.deserialize_any(TimestampVisitor)
}

fn timestamp(secs: i64, nanos: u32) -> Option<DateTime<Utc>> {
    if nanos >= 1_000_000_000 {
        return None;
    }
    DateTime::from_timestamp(secs, nanos)
}

/// Decode an extension body into a UTC instant.
fn ext_timestamp(tag: i8, data: &[u8]) -> Result<DateTime<Utc>, String> {
    let be_u32 = |b: &[u8]| u32::from_be_bytes([b[0], b[1], b[2], b[3]]);
    let be_i64 = |b: &[u8]| {
        let mut a = [0u8; 8];
        a.copy_from_slice(&b[..8]);
        i64::from_be_bytes(a)
    };
    let parsed = match (tag, data.len()) {
        (EXT_TIME, 12) => timestamp(be_i64(&data[..8]), be_u32(&data[8..])),
        (EXT_TIMESTAMP, 4) => timestamp(be_u32(data) as i64, 0),
        (EXT_TIMESTAMP, 8) => {
            let raw = u64::from_be_bytes([
                data[0], data[1], data[2], data[3], data[4], data[5], data[6], data[7],
            ]);
            timestamp((raw & 0x3_ffff_ffff) as i64, (raw >> 34) as u32)
        }
        (EXT_TIMESTAMP, 12) => timestamp(be_i64(&data[4..]), be_u32(&data[..4])),
        (tag, len) => return Err(format!("unsupported time extension {tag} ({len} bytes)")),
    };
    parsed.ok_or_else(|| "time extension out of range".to_string())
}

struct TimestampVisitor;

impl<'de> Visitor<'de> for TimestampVisitor {
    type Value = Option<DateTime<Utc>>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a timestamp extension, RFC 3339 string, unix seconds, or nil")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Self::Value, D::Error> {
        d.deserialize_any(self)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        timestamp(v, 0)
            .map(Some)
            .ok_or_else(|| E::custom("unix seconds out of range"))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        let secs = i64::try_from(v).map_err(|_| E::custom("unix seconds out of range"))?;
        self.visit_i64(secs)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        DateTime::parse_from_rfc3339(v)
            .map(|t| Some(t.with_timezone(&Utc)))
            .map_err(E::custom)
    }

    fn visit_newtype_struct<D: Deserializer<'de>>(self, d: D) -> Result<Self::Value, D::Error> {
        let (tag, data) = d.deserialize_tuple(2, ExtVisitor)?;
        ext_timestamp(tag, &data).map(Some).map_err(de::Error::custom)
    }
}

struct ExtVisitor;

impl<'de> Visitor<'de> for ExtVisitor {
    type Value = (i8, Vec<u8>);

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an extension tag and body")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let tag: i8 = seq
            .next_element()?
            .ok_or_else(|| de::Error::invalid_length(0, &self))?;
        let ExtBody(data) = seq
            .next_element()?
            .ok_or_else(|| de::Error::invalid_length(1, &self))?;
        Ok((tag, data))
    }
}

struct ExtBody(Vec<u8>);

impl<'de> Deserialize<'de> for ExtBody {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        struct BodyVisitor;

        impl<'de> Visitor<'de> for BodyVisitor {
            type Value = ExtBody;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("extension bytes")
            }

            fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<ExtBody, E> {
                Ok(ExtBody(v.to_vec()))
            }

            fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<ExtBody, E> {
                Ok(ExtBody(v))
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<ExtBody, A::Error> {
                let mut out = Vec::new();
                while let Some(b) = seq.next_element::<u8>()? {
                    out.push(b);
                }
                Ok(ExtBody(out))
            }
        }

        d.deserialize_bytes(BodyVisitor)
    }
}

/// Normalize body text: decode entities, drop tags and scripts, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    static RE_BLOCKS: OnceCell<regex::Regex> = OnceCell::new();
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();

    // script/style bodies are not prose
    let re_blocks = RE_BLOCKS.get_or_init(|| {
        regex::Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)>").unwrap()
    });
    let mut out = re_blocks.replace_all(s, " ").to_string();

    // Tags become spaces so adjacent block elements don't glue words together.
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    out = html_escape::decode_html_entities(&out).to_string();

    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace('\u{00A0}', " ");

    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    re_ws.replace_all(&out, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    /// Hand-built map in the publisher's layout, with an extra key the schema skips.
    fn upstream_payload(fetched_at: &[u8]) -> Vec<u8> {
        let mut p = vec![0x85];
        p.extend_from_slice(b"\xa6FeedID\xa3f-1");
        p.extend_from_slice(b"\xa5Title\xa6Launch");
        p.extend_from_slice(b"\xa4Link\xaahttp://x/1");
        p.extend_from_slice(b"\xa9FetchedAt");
        p.extend_from_slice(fetched_at);
        p.extend_from_slice(b"\xa7Content\xa9Acme Corp");
        p
    }

    fn time_ext(secs: i64, nanos: u32) -> Vec<u8> {
        let mut e = vec![0xc7, 12, EXT_TIME as u8];
        e.extend_from_slice(&secs.to_be_bytes());
        e.extend_from_slice(&nanos.to_be_bytes());
        e
    }

    #[test]
    fn normalize_strips_markup_and_collapses_ws() {
        let s = "<html><head><style>p { color: red }</style></head>\
                 <body><p>Acme&nbsp;Corp</p><p>&ldquo;rallied&rdquo;   today.</p>\
                 <script>var x = 1;</script></body></html>";
        assert_eq!(normalize_text(s), r#"Acme Corp "rallied" today."#);
    }

    #[test]
    fn upstream_map_decodes() {
        let at = Utc.with_ymd_and_hms(2023, 3, 14, 15, 9, 26).unwrap();
        let doc = Document::decode_payload(&upstream_payload(&time_ext(at.timestamp(), 0))).unwrap();
        assert_eq!(doc.title, "Launch");
        assert_eq!(doc.link, "http://x/1");
        assert_eq!(doc.content, "Acme Corp");
        assert_eq!(doc.fetched_at_utc(), at);
    }

    #[test]
    fn standard_timestamp_extension_decodes() {
        // fixext 8: 30-bit nanos above 34-bit seconds
        let raw: u64 = (500u64 << 34) | 1_678_806_566;
        let mut ext = vec![0xd7, EXT_TIMESTAMP as u8];
        ext.extend_from_slice(&raw.to_be_bytes());
        let doc = Document::decode_payload(&upstream_payload(&ext)).unwrap();
        assert_eq!(doc.fetched_at_utc().timestamp(), 1_678_806_566);
        assert_eq!(doc.fetched_at_utc().timestamp_subsec_nanos(), 500);
    }

    #[test]
    fn payload_round_trips_with_timestamp() {
        let mut doc = Document {
            title: "Launch".into(),
            link: "http://x/1".into(),
            fetched_at: None,
            content: "<p>hello</p>".into(),
        };
        let at = Utc.with_ymd_and_hms(2023, 3, 14, 15, 9, 26).unwrap();
        doc.set_fetched_at(at);

        let decoded = Document::decode_payload(&doc.encode_payload().unwrap()).unwrap();
        assert_eq!(decoded, doc);
        assert_eq!(decoded.fetched_at_utc(), at);
    }

    #[test]
    fn empty_or_truncated_payload_is_a_decode_error() {
        assert!(matches!(
            Document::decode_payload(&[]),
            Err(ProcessError::Decode(_))
        ));
        let full = upstream_payload(&[0xc0]);
        assert!(matches!(
            Document::decode_payload(&full[..full.len() - 4]),
            Err(ProcessError::Decode(_))
        ));
        // a bare integer is not a document
        assert!(matches!(
            Document::decode_payload(&[0x2a]),
            Err(ProcessError::Decode(_))
        ));
    }

    #[test]
    fn out_of_range_nanos_are_rejected_not_zeroed() {
        let payload = upstream_payload(&time_ext(1_678_806_566, 1_000_000_000));
        assert!(matches!(
            Document::decode_payload(&payload),
            Err(ProcessError::Decode(_))
        ));
    }

    #[test]
    fn missing_timestamp_falls_back_to_epoch() {
        let doc = Document::decode_payload(&upstream_payload(&[0xc0])).unwrap();
        assert_eq!(doc.fetched_at_utc(), DateTime::<Utc>::UNIX_EPOCH);
    }
}
