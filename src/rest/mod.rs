//! REST side: snapshot loader and control-plane clients

pub mod client;
pub mod control;
pub mod loader;

pub use client::{ApiClient, RestError};
pub use control::{AvailableStrategies, BacktestRequest, StatusMessage, TrainRequest};
pub use loader::SnapshotLoader;
