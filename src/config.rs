//! Endpoint configuration for the REST backend and the push channel

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    /// REST base URL, including any path prefix (e.g. `/api`)
    pub rest_base_url: String,
    /// Push channel endpoint
    pub push_url: String,
    /// Per-request timeout for REST calls
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rest_base_url: "http://localhost:8000/api".to_string(),
            push_url: "ws://localhost:8000/ws".to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl Config {
    /// Defaults with environment overrides applied
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("TRADEBOARD_API_URL") {
            config.rest_base_url = url;
        }
        if let Ok(url) = std::env::var("TRADEBOARD_WS_URL") {
            config.push_url = url;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.rest_base_url.ends_with("/api"));
        assert!(config.push_url.starts_with("ws://"));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }
}
