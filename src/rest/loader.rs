//! Snapshot loader: one-shot REST fetches seeding the store
//!
//! Each entity type is fetched independently; a failure settles only its
//! own slice and never delays or masks the others. There is no automatic
//! retry, the caller decides when to load again.

use std::sync::{Arc, Weak};

use tracing::{debug, info, warn};

use crate::rest::client::ApiClient;
use crate::store::DashboardStore;

pub struct SnapshotLoader {
    api: ApiClient,
    /// Weak so a fetch result landing after teardown is dropped instead of
    /// written into a store nobody reads anymore.
    store: Weak<DashboardStore>,
}

impl SnapshotLoader {
    pub fn new(api: ApiClient, store: &Arc<DashboardStore>) -> Self {
        Self {
            api,
            store: Arc::downgrade(store),
        }
    }

    /// Fetch all five entity types concurrently
    pub async fn load_all(&self) {
        info!("Loading dashboard snapshots");
        tokio::join!(
            self.load_account(),
            self.load_positions(),
            self.load_orders(),
            self.load_trades(),
            self.load_market_status(),
        );
    }

    /// On-demand market status refresh, independent of `load_all`
    pub async fn refresh_market_status(&self) {
        self.load_market_status().await;
    }

    async fn load_account(&self) {
        let Some(store) = self.store.upgrade() else {
            return;
        };
        store.set_account_loading();
        drop(store);

        let result = self.api.account().await;
        let Some(store) = self.store.upgrade() else {
            debug!("Store dropped, discarding account snapshot");
            return;
        };
        match result {
            Ok(account) => {
                debug!("Account snapshot loaded");
                store.set_account(account);
            }
            Err(e) => {
                warn!(error = %e, "Account snapshot failed");
                store.set_account_error(format!("failed to fetch account: {}", e));
            }
        }
    }

    async fn load_positions(&self) {
        let Some(store) = self.store.upgrade() else {
            return;
        };
        store.set_positions_loading();
        drop(store);

        let result = self.api.positions().await;
        let Some(store) = self.store.upgrade() else {
            debug!("Store dropped, discarding positions snapshot");
            return;
        };
        match result {
            Ok(positions) => {
                debug!(count = positions.len(), "Positions snapshot loaded");
                store.set_positions(positions);
            }
            Err(e) => {
                warn!(error = %e, "Positions snapshot failed");
                store.set_positions_error(format!("failed to fetch positions: {}", e));
            }
        }
    }

    async fn load_orders(&self) {
        let Some(store) = self.store.upgrade() else {
            return;
        };
        store.set_orders_loading();
        drop(store);

        let result = self.api.orders().await;
        let Some(store) = self.store.upgrade() else {
            debug!("Store dropped, discarding orders snapshot");
            return;
        };
        match result {
            Ok(orders) => {
                debug!(count = orders.len(), "Orders snapshot loaded");
                store.set_orders(orders);
            }
            Err(e) => {
                warn!(error = %e, "Orders snapshot failed");
                store.set_orders_error(format!("failed to fetch orders: {}", e));
            }
        }
    }

    async fn load_trades(&self) {
        let Some(store) = self.store.upgrade() else {
            return;
        };
        store.set_trades_loading();
        drop(store);

        let result = self.api.trades().await;
        let Some(store) = self.store.upgrade() else {
            debug!("Store dropped, discarding trades snapshot");
            return;
        };
        match result {
            Ok(trades) => {
                debug!(count = trades.len(), "Trades snapshot loaded");
                store.set_trades(trades);
            }
            Err(e) => {
                warn!(error = %e, "Trades snapshot failed");
                store.set_trades_error(format!("failed to fetch trades: {}", e));
            }
        }
    }

    async fn load_market_status(&self) {
        let Some(store) = self.store.upgrade() else {
            return;
        };
        store.set_market_status_loading();
        drop(store);

        let result = self.api.market_status().await;
        let Some(store) = self.store.upgrade() else {
            debug!("Store dropped, discarding market status snapshot");
            return;
        };
        match result {
            Ok(status) => {
                debug!(is_open = status.is_open, "Market status loaded");
                store.set_market_status(status);
            }
            Err(e) => {
                warn!(error = %e, "Market status failed");
                store.set_market_status_error(format!("failed to fetch market status: {}", e));
            }
        }
    }
}
