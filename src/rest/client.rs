//! REST client for the dashboard backend

use reqwest::Client;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use crate::config::Config;
use crate::types::{Account, MarketStatus, Order, Position, Trade};

#[derive(Error, Debug)]
pub enum RestError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("HTTP {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// HTTP client bound to one backend base URL
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self, RestError> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            client,
            base_url: config.rest_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, RestError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "GET");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(%status, body = %body, "Request failed");
            return Err(RestError::Status { status, body });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    pub(crate) async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        body: Option<serde_json::Value>,
    ) -> Result<T, RestError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "POST");

        let mut request = self.client.post(&url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(%status, body = %body, "Request failed");
            return Err(RestError::Status { status, body });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    pub async fn account(&self) -> Result<Account, RestError> {
        self.get_json("/account").await
    }

    pub async fn positions(&self) -> Result<Vec<Position>, RestError> {
        self.get_json("/positions").await
    }

    pub async fn orders(&self) -> Result<Vec<Order>, RestError> {
        self.get_json("/orders").await
    }

    pub async fn trades(&self) -> Result<Vec<Trade>, RestError> {
        self.get_json("/trades").await
    }

    pub async fn market_status(&self) -> Result<MarketStatus, RestError> {
        self.get_json("/market/status").await
    }
}
