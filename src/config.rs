use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api";

// Client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub base_url: String,
    // Sent as X-Api-Key on every request when present
    #[serde(default)]
    pub api_key: Option<String>,
    // Where the session store keeps the signed-in user between runs
    #[serde(default)]
    pub session_file: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            session_file: None,
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    // Defaults overridden by TRAVEL_API_BASE_URL, TRAVEL_API_KEY and TRAVEL_SESSION_FILE
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut config = Self::default();
        if let Some(base_url) = non_empty("TRAVEL_API_BASE_URL") {
            config.base_url = base_url;
        }
        config.api_key = non_empty("TRAVEL_API_KEY");
        config.session_file = non_empty("TRAVEL_SESSION_FILE").map(PathBuf::from);
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_when_environment_is_empty() {
        let config = ClientConfig::from_lookup(|_| None);
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.base_url, "http://localhost:8080/api");
    }

    #[test]
    fn test_environment_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("TRAVEL_API_BASE_URL", "https://travel.example.com/api"),
            ("TRAVEL_API_KEY", "  "),
            ("TRAVEL_SESSION_FILE", "/tmp/session.json"),
        ]);
        let config = ClientConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.base_url, "https://travel.example.com/api");
        assert_eq!(config.api_key, None);
        assert_eq!(config.session_file, Some(PathBuf::from("/tmp/session.json")));
    }
}
