// src/analyze/sentiment.rs
use std::collections::HashMap;
use std::path::Path;

use crate::errors::ModelError;

const EMBEDDED_LEXICON: &str = include_str!("../../sentiment_lexicon.json");

/// Lexicon-based polarity model. Loaded once, read-only afterwards.
#[derive(Debug, Clone)]
pub struct SentimentModel {
    lexicon: HashMap<String, i32>,
}

impl SentimentModel {
    /// The lexicon compiled into the binary.
    pub fn embedded() -> Result<Self, ModelError> {
        Self::from_json(EMBEDDED_LEXICON, "<embedded>")
    }

    pub fn from_path(path: &Path) -> Result<Self, ModelError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ModelError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&raw, &path.display().to_string())
    }

    fn from_json(raw: &str, origin: &str) -> Result<Self, ModelError> {
        let words: HashMap<String, i32> =
            serde_json::from_str(raw).map_err(|e| ModelError::Parse {
                path: origin.to_string(),
                reason: e.to_string(),
            })?;
        let lexicon = words
            .into_iter()
            .map(|(w, s)| (w.to_lowercase(), s))
            .collect();
        Ok(Self { lexicon })
    }

    pub fn len(&self) -> usize {
        self.lexicon.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lexicon.is_empty()
    }

    #[inline]
    fn word_score(&self, w: &str) -> i32 {
        *self.lexicon.get(w).unwrap_or(&0)
    }

    /// Returns (score, token count).
    /// A negator within the previous 1..=3 tokens flips the sign of a word's score.
    pub fn score_text(&self, text: &str) -> (i32, usize) {
        // collected because negation looks backwards
        let tokens: Vec<String> = tokenize(text).collect();
        let mut score: i32 = 0;

        for i in 0..tokens.len() {
            let base = self.word_score(tokens[i].as_str());
            if base == 0 {
                continue;
            }
            let negated = (1..=3).any(|k| i >= k && is_negator(tokens[i - k].as_str()));
            score += if negated { -base } else { base };
        }

        (score, tokens.len())
    }

    /// Polarity of one sentence: 1.0 positive, 0.0 negative, 0.5 neutral.
    pub fn sentence_polarity(&self, sentence: &str) -> f32 {
        match self.score_text(sentence).0 {
            s if s > 0 => 1.0,
            s if s < 0 => 0.0,
            _ => 0.5,
        }
    }

    /// Mean sentence polarity of `text`, always within `[0.0, 1.0]`.
    /// `None` when the text holds no words.
    pub fn average_polarity(&self, text: &str) -> Option<f32> {
        let polarities: Vec<f32> = split_sentences(text)
            .filter(|s| tokenize(s).next().is_some())
            .map(|s| self.sentence_polarity(s))
            .collect();
        if polarities.is_empty() {
            return None;
        }
        let avg = polarities.iter().sum::<f32>() / polarities.len() as f32;
        Some(avg.clamp(0.0, 1.0))
    }
}

/// Lower-cased word tokens; apostrophes stay inside words ("isn't").
fn tokenize(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|t| t.trim_matches('\''))
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

fn split_sentences(s: &str) -> impl Iterator<Item = &str> {
    s.split_inclusive(['.', '!', '?', '\n'])
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn is_negator(tok: &str) -> bool {
    matches!(
        tok,
        "not"
            | "no"
            | "never"
            | "isn't"
            | "wasn't"
            | "aren't"
            | "won't"
            | "can't"
            | "cannot"
            | "didn't"
            | "doesn't"
            | "without"
    )
}
