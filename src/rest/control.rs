//! Control-plane endpoints: strategy scheduling, AI training, backtests
//!
//! These are external collaborators; the dashboard only relays their
//! responses. Start/stop return a status message, train and backtest
//! results stay opaque JSON for the caller to surface.

use serde::{Deserialize, Serialize};

use crate::rest::client::{ApiClient, RestError};

#[derive(Debug, Clone, Deserialize)]
pub struct StatusMessage {
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AvailableStrategies {
    pub strategies: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TrainRequest {
    pub symbol: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BacktestRequest {
    pub symbol: String,
    pub strategy_name: String,
    pub start_date: String,
    pub end_date: String,
}

impl ApiClient {
    pub async fn start_strategy(
        &self,
        strategy: &str,
        symbol: &str,
    ) -> Result<StatusMessage, RestError> {
        self.post_json(&format!("/strategy/start/{}/{}", strategy, symbol), &[], None)
            .await
    }

    pub async fn stop_strategy(
        &self,
        strategy: &str,
        symbol: &str,
    ) -> Result<StatusMessage, RestError> {
        self.post_json(&format!("/strategy/stop/{}/{}", strategy, symbol), &[], None)
            .await
    }

    pub async fn available_strategies(&self) -> Result<AvailableStrategies, RestError> {
        self.get_json("/strategy/available").await
    }

    /// Kick off AI model training. Parameters travel as query arguments,
    /// matching the backend contract.
    pub async fn train_ai(&self, request: &TrainRequest) -> Result<serde_json::Value, RestError> {
        let mut query: Vec<(&str, String)> = vec![("symbol", request.symbol.clone())];
        if let Some(start) = &request.start_date {
            query.push(("start_date", start.clone()));
        }
        if let Some(end) = &request.end_date {
            query.push(("end_date", end.clone()));
        }
        self.post_json("/strategy/ai/train", &query, None).await
    }

    pub async fn run_backtest(
        &self,
        request: &BacktestRequest,
    ) -> Result<serde_json::Value, RestError> {
        self.post_json("/backtest", &[], Some(serde_json::to_value(request)?))
            .await
    }
}
