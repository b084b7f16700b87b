// src/broker/topic_id.rs
//! Topic identifiers: 16 raw bytes on the wire, 26-character ULID text elsewhere.

use std::fmt;
use std::str::FromStr;

use crate::errors::TopicIdError;

const CROCKFORD: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";
const TEXT_LEN: usize = 26;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TopicId([u8; 16]);

impl TopicId {
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl TryFrom<&[u8]> for TopicId {
    type Error = TopicIdError;

    fn try_from(raw: &[u8]) -> Result<Self, Self::Error> {
        let bytes: [u8; 16] = raw
            .try_into()
            .map_err(|_| TopicIdError::InvalidLength(raw.len()))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for TopicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = u128::from_be_bytes(self.0);
        let mut out = String::with_capacity(TEXT_LEN);
        // 26 * 5 = 130 bits; the leading symbol only carries the top 3.
        for i in 0..TEXT_LEN {
            let shift = 125 - 5 * i as u32;
            let idx = ((value >> shift) & 0x1f) as usize;
            out.push(CROCKFORD[idx] as char);
        }
        f.write_str(&out)
    }
}

impl FromStr for TopicId {
    type Err = TopicIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TopicIdError::InvalidText(s.to_string());
        if s.len() != TEXT_LEN {
            return Err(invalid());
        }

        let mut value: u128 = 0;
        for (i, c) in s.bytes().enumerate() {
            let upper = c.to_ascii_uppercase();
            let idx = CROCKFORD
                .iter()
                .position(|&a| a == upper)
                .ok_or_else(invalid)? as u128;
            if i == 0 && idx > 7 {
                return Err(invalid());
            }
            value = (value << 5) | idx;
        }
        Ok(Self(value.to_be_bytes()))
    }
}
