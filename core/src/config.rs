//! Client configuration.
//!
//! The base URL is always supplied by the caller. Authentication headers
//! belong to the application and are passed through `default_headers`.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Headers sent with every request (e.g. API tokens).
    #[serde(default)]
    pub default_headers: BTreeMap<String, String>,
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            default_headers: BTreeMap::new(),
        }
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(name.into(), value.into());
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_trims_trailing_slash_and_uses_defaults() {
        let config = ClientConfig::new("https://boletos.example/api/");
        assert_eq!(config.base_url, "https://boletos.example/api");
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert!(config.default_headers.is_empty());
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"base_url":"http://localhost:3000"}"#).unwrap();
        assert_eq!(config.timeout_secs, 30);
        assert!(config.default_headers.is_empty());
    }

    #[test]
    fn headers_accumulate() {
        let config = ClientConfig::new("http://x")
            .with_header("cnpj-sh", "000")
            .with_header("token-sh", "abc")
            .with_timeout_secs(5);
        assert_eq!(config.default_headers.len(), 2);
        assert_eq!(config.default_headers["token-sh"], "abc");
        assert_eq!(config.timeout_secs, 5);
    }
}
