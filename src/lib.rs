//! Client-side state synchronization for a brokerage dashboard
//!
//! Reconciles one-shot REST snapshots with an unordered, at-least-once
//! push stream into a single observable view model:
//!
//! - [`store`]: per-entity-type slices with loading/error flags, the log
//!   sequence, and buffering for pushes that beat the first snapshot
//! - [`rest`]: snapshot loader plus strategy/backtest control clients
//! - [`push`]: one duplex connection decoding tagged frames into a closed
//!   event type with an explicit unknown fallback
//! - [`view`]: pure projections (daily P/L, market countdown, fill ratio)

pub mod config;
pub mod logging;
pub mod push;
pub mod rest;
pub mod store;
pub mod types;
pub mod view;
