// src/analyze/ner.rs
//! Rule-based named-entity extraction.
//!
//! Each rule pairs an entity label (`ORG`, `PERSON`, `GPE`, ...) with a regex. A match
//! yields the text of the `entity` capture group when the regex defines one, or the
//! whole match otherwise; `canonical` replaces the matched text entirely.
//!
//! Rules come from a TOML or JSON file:
//! 1) an explicit path (`ENTITY_RULES_PATH`),
//! 2) `config/entity_rules.toml`,
//! 3) `config/entity_rules.json`,
//! 4) the built-in rules below.
//!
//! Regexes must be compatible with the `regex` crate (no lookarounds).

use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::ModelError;

const BUILTIN_RULES: &[(&str, &str)] = &[
    (
        "ORG",
        r"\b(?P<entity>(?:[A-Z][A-Za-z0-9&'\-]*\s+){1,3}(?:Corp|Corporation|Inc|Ltd|LLC|Group|Holdings|Company|Bank|Technologies|Systems|Labs)\b)",
    ),
    (
        "PERSON",
        r"\b(?:Mr|Mrs|Ms|Dr|Prof|Sen|Rep|President|CEO|Chairman|Chairwoman)\.?\s+(?P<entity>[A-Z][a-z]+(?:\s+[A-Z][a-z]+)?)",
    ),
    (
        "GPE",
        r"\b(?:United States|United Kingdom|European Union|China|Japan|Germany|France|India|Canada|Russia|Brazil|Mexico|Ukraine|New York|London|Washington|Beijing|Tokyo|Paris|Berlin|San Francisco)\b",
    ),
];

#[derive(Debug, Deserialize)]
struct RawRule {
    label: String,
    regex: String,
    #[serde(default)]
    canonical: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RulesFile {
    #[serde(default)]
    rules: Vec<RawRule>,
}

#[derive(Debug, Clone)]
pub struct EntityRule {
    pub label: String,
    regex: Regex,
    canonical: Option<String>,
}

impl EntityRule {
    pub fn new(label: &str, pattern: &str, canonical: Option<String>) -> Result<Self, ModelError> {
        let regex = Regex::new(pattern).map_err(|source| ModelError::Rule {
            label: label.to_string(),
            regex: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            label: label.to_string(),
            regex,
            canonical,
        })
    }

    fn matches<'t>(&'t self, text: &'t str) -> impl Iterator<Item = String> + 't {
        self.regex.captures_iter(text).filter_map(move |caps| {
            if let Some(c) = &self.canonical {
                return Some(c.clone());
            }
            let m = caps.name("entity").or_else(|| caps.get(0))?;
            let t = m.as_str().split_whitespace().collect::<Vec<_>>().join(" ");
            (!t.is_empty()).then_some(t)
        })
    }
}

/// Ordered rule set; the first rule to claim an entity text decides its label.
#[derive(Debug, Clone)]
pub struct EntityExtractor {
    rules: Vec<EntityRule>,
}

impl EntityExtractor {
    pub fn new(rules: Vec<EntityRule>) -> Self {
        Self { rules }
    }

    pub fn builtin() -> Result<Self, ModelError> {
        let rules = BUILTIN_RULES
            .iter()
            .map(|(label, re)| EntityRule::new(label, re, None))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(rules))
    }

    /// Load rules from an explicit path. Supports TOML or JSON.
    pub fn from_path(path: &Path) -> Result<Self, ModelError> {
        let content = fs::read_to_string(path).map_err(|source| ModelError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let file = parse_rules(&content, &ext).map_err(|reason| ModelError::Parse {
            path: path.display().to_string(),
            reason,
        })?;

        let rules = file
            .rules
            .into_iter()
            .map(|r| EntityRule::new(r.label.trim(), &r.regex, r.canonical))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(rules))
    }

    /// Explicit path first, then `config/entity_rules.{toml,json}`, then built-ins.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ModelError> {
        if let Some(p) = explicit {
            return Self::from_path(p);
        }
        for candidate in ["config/entity_rules.toml", "config/entity_rules.json"] {
            let pb = PathBuf::from(candidate);
            if pb.exists() {
                return Self::from_path(&pb);
            }
        }
        Self::builtin()
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Map of entity text → label. Keys are unique.
    pub fn extract(&self, text: &str) -> HashMap<String, String> {
        let mut out = HashMap::new();
        for rule in &self.rules {
            for entity in rule.matches(text) {
                out.entry(entity).or_insert_with(|| rule.label.clone());
            }
        }
        out
    }
}

fn parse_rules(s: &str, hint_ext: &str) -> Result<RulesFile, String> {
    if hint_ext == "json" {
        return serde_json::from_str(s).map_err(|e| e.to_string());
    }
    if hint_ext == "toml" {
        return toml::from_str(s).map_err(|e| e.to_string());
    }
    // no usable extension: try both
    serde_json::from_str(s)
        .or_else(|_| toml::from_str(s))
        .map_err(|e: toml::de::Error| e.to_string())
}
