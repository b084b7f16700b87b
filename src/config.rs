// src/config.rs
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::errors::ConfigError;

pub const ENV_CLIENT_ID: &str = "ENSIGN_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "ENSIGN_CLIENT_SECRET";
pub const ENV_AUTH_URL: &str = "ENSIGN_AUTH_URL";
pub const ENV_ENDPOINT: &str = "ENSIGN_ENDPOINT";
pub const ENV_OUTPUT_PATH: &str = "ENTITIES_CSV_PATH";
pub const ENV_ENTITY_RULES_PATH: &str = "ENTITY_RULES_PATH";
pub const ENV_LEXICON_PATH: &str = "SENTIMENT_LEXICON_PATH";
pub const ENV_METRICS_ADDR: &str = "METRICS_ADDR";

pub const DEFAULT_AUTH_URL: &str = "https://auth.rotational.app";
pub const DEFAULT_ENDPOINT: &str = "https://ensign.rotational.app";
pub const DEFAULT_OUTPUT_PATH: &str = "entities.csv";

/// Gateway identity. The secret is never printed.
#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub auth_url: String,
    pub endpoint: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("secret_len", &self.client_secret.len())
            .field("auth_url", &self.auth_url)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    pub credentials: Credentials,
    pub output_path: PathBuf,
    /// Explicit entity rules file; `None` falls back to `config/entity_rules.*`.
    pub entity_rules_path: Option<PathBuf>,
    /// Explicit lexicon file; `None` uses the embedded lexicon.
    pub lexicon_path: Option<PathBuf>,
    pub metrics_addr: Option<SocketAddr>,
}

impl ConsumerConfig {
    /// Read configuration from the process environment (call `dotenvy::dotenv()` first).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let credentials = Credentials {
            client_id: required(ENV_CLIENT_ID)?,
            client_secret: required(ENV_CLIENT_SECRET)?,
            auth_url: get(ENV_AUTH_URL).unwrap_or_else(|| DEFAULT_AUTH_URL.to_string()),
            endpoint: get(ENV_ENDPOINT).unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
        };

        let metrics_addr = match get(ENV_METRICS_ADDR) {
            Some(raw) => Some(raw.parse::<SocketAddr>().map_err(|e| ConfigError::Invalid {
                name: ENV_METRICS_ADDR,
                reason: e.to_string(),
            })?),
            None => None,
        };

        Ok(Self {
            credentials,
            output_path: get(ENV_OUTPUT_PATH)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_PATH)),
            entity_rules_path: get(ENV_ENTITY_RULES_PATH).map(PathBuf::from),
            lexicon_path: get(ENV_LEXICON_PATH).map(PathBuf::from),
            metrics_addr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k: &str| map.get(k).cloned()
    }

    #[test]
    fn defaults_fill_optional_fields() {
        let cfg = ConsumerConfig::from_lookup(lookup(&[
            (ENV_CLIENT_ID, "client"),
            (ENV_CLIENT_SECRET, "s3cret"),
        ]))
        .unwrap();

        assert_eq!(cfg.credentials.auth_url, DEFAULT_AUTH_URL);
        assert_eq!(cfg.credentials.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(cfg.output_path, PathBuf::from("entities.csv"));
        assert!(cfg.entity_rules_path.is_none());
        assert!(cfg.metrics_addr.is_none());
    }

    #[test]
    fn missing_or_blank_credentials_are_rejected() {
        let err = ConsumerConfig::from_lookup(lookup(&[(ENV_CLIENT_ID, "client")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(ENV_CLIENT_SECRET)));

        let err = ConsumerConfig::from_lookup(lookup(&[
            (ENV_CLIENT_ID, "   "),
            (ENV_CLIENT_SECRET, "x"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Missing(ENV_CLIENT_ID)));
    }

    #[test]
    fn overrides_and_bad_metrics_addr() {
        let cfg = ConsumerConfig::from_lookup(lookup(&[
            (ENV_CLIENT_ID, "client"),
            (ENV_CLIENT_SECRET, "s3cret"),
            (ENV_ENDPOINT, "https://staging.example:443"),
            (ENV_OUTPUT_PATH, "/tmp/out.csv"),
            (ENV_METRICS_ADDR, "127.0.0.1:9100"),
        ]))
        .unwrap();
        assert_eq!(cfg.credentials.endpoint, "https://staging.example:443");
        assert_eq!(cfg.output_path, PathBuf::from("/tmp/out.csv"));
        assert_eq!(cfg.metrics_addr.unwrap().port(), 9100);

        let err = ConsumerConfig::from_lookup(lookup(&[
            (ENV_CLIENT_ID, "client"),
            (ENV_CLIENT_SECRET, "s3cret"),
            (ENV_METRICS_ADDR, "nope"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: ENV_METRICS_ADDR, .. }));
    }

    #[test]
    fn debug_hides_secret() {
        let cfg = ConsumerConfig::from_lookup(lookup(&[
            (ENV_CLIENT_ID, "client"),
            (ENV_CLIENT_SECRET, "s3cret"),
        ]))
        .unwrap();
        let shown = format!("{:?}", cfg.credentials);
        assert!(!shown.contains("s3cret"));
        assert!(shown.contains("secret_len: 6"));
    }

    #[serial_test::serial]
    #[test]
    fn from_env_reads_process_environment() {
        std::env::set_var(ENV_CLIENT_ID, "env-client");
        std::env::set_var(ENV_CLIENT_SECRET, "env-secret");
        let cfg = ConsumerConfig::from_env().unwrap();
        assert_eq!(cfg.credentials.client_id, "env-client");
        std::env::remove_var(ENV_CLIENT_ID);
        std::env::remove_var(ENV_CLIENT_SECRET);
    }
}
