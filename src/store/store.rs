//! The dashboard store: one slice per entity type plus the log sequence
//!
//! Constructed once per session and shared by `Arc`; there is no global
//! singleton. All mutations are synchronous and immediately visible to
//! subsequent reads. Async consumers observe changes through a watch-based
//! version counter.

use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::push::events::PushEvent;
use crate::store::slice::{EntitySlice, SliceView};
use crate::types::{Account, MarketStatus, Order, Position, Trade};

/// Push updates that arrived before their entity type's initial snapshot
/// settled, held in arrival order until the load completes or fails.
#[derive(Debug, Default)]
struct PendingPushes {
    account: Vec<Account>,
    positions: Vec<Vec<Position>>,
    orders: Vec<Order>,
    trades: Vec<Trade>,
    market_status: Vec<MarketStatus>,
}

pub struct DashboardStore {
    account: RwLock<EntitySlice<Account>>,
    positions: RwLock<EntitySlice<Vec<Position>>>,
    orders: RwLock<EntitySlice<Vec<Order>>>,
    trades: RwLock<EntitySlice<Vec<Trade>>>,
    market_status: RwLock<EntitySlice<MarketStatus>>,
    log: RwLock<Vec<String>>,
    pending: Mutex<PendingPushes>,
    version: watch::Sender<u64>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl DashboardStore {
    pub fn new() -> Self {
        let (version, _) = watch::channel(0);
        Self {
            account: RwLock::new(EntitySlice::new()),
            positions: RwLock::new(EntitySlice::new()),
            orders: RwLock::new(EntitySlice::new()),
            trades: RwLock::new(EntitySlice::new()),
            market_status: RwLock::new(EntitySlice::new()),
            log: RwLock::new(Vec::new()),
            pending: Mutex::new(PendingPushes::default()),
            version,
        }
    }

    /// Receiver that changes whenever any slice or the log mutates
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    fn bump(&self) {
        self.version.send_modify(|v| *v = v.wrapping_add(1));
    }

    // --- account ---

    pub fn account(&self) -> SliceView<Account> {
        read(&self.account).get()
    }

    pub fn set_account_loading(&self) {
        write(&self.account).set_loading();
        self.bump();
    }

    pub fn set_account(&self, account: Account) {
        let mut pending = lock(&self.pending);
        let mut slice = write(&self.account);
        slice.set_value(account);
        drain_account(&mut pending, &mut slice);
        drop(slice);
        drop(pending);
        self.bump();
    }

    pub fn set_account_error(&self, error: impl Into<String>) {
        let mut pending = lock(&self.pending);
        let mut slice = write(&self.account);
        slice.set_error(error);
        drain_account(&mut pending, &mut slice);
        drop(slice);
        drop(pending);
        self.bump();
    }

    // --- positions ---

    pub fn positions(&self) -> SliceView<Vec<Position>> {
        read(&self.positions).get()
    }

    pub fn set_positions_loading(&self) {
        write(&self.positions).set_loading();
        self.bump();
    }

    /// Wholesale replace. A previously known asset id missing from the new
    /// set means that position was closed; no per-row diffing happens here.
    pub fn set_positions(&self, positions: Vec<Position>) {
        let mut pending = lock(&self.pending);
        let mut slice = write(&self.positions);
        slice.set_value(positions);
        drain_positions(&mut pending, &mut slice);
        drop(slice);
        drop(pending);
        self.bump();
    }

    pub fn set_positions_error(&self, error: impl Into<String>) {
        let mut pending = lock(&self.pending);
        let mut slice = write(&self.positions);
        slice.set_error(error);
        drain_positions(&mut pending, &mut slice);
        drop(slice);
        drop(pending);
        self.bump();
    }

    // --- orders ---

    pub fn orders(&self) -> SliceView<Vec<Order>> {
        read(&self.orders).get()
    }

    pub fn set_orders_loading(&self) {
        write(&self.orders).set_loading();
        self.bump();
    }

    pub fn set_orders(&self, orders: Vec<Order>) {
        let mut pending = lock(&self.pending);
        let mut slice = write(&self.orders);
        slice.set_value(orders);
        drain_orders(&mut pending, &mut slice);
        drop(slice);
        drop(pending);
        self.bump();
    }

    pub fn set_orders_error(&self, error: impl Into<String>) {
        let mut pending = lock(&self.pending);
        let mut slice = write(&self.orders);
        slice.set_error(error);
        drain_orders(&mut pending, &mut slice);
        drop(slice);
        drop(pending);
        self.bump();
    }

    /// Insert-if-absent-else-overwrite by order id. Push updates carry a
    /// single order and must never replace the collection wholesale.
    pub fn upsert_order(&self, order: Order) {
        if order.id.is_empty() {
            warn!("Rejected order update with empty id");
            write(&self.orders).set_error("order update with empty id rejected");
            self.bump();
            return;
        }
        upsert_into(&mut write(&self.orders), order);
        self.bump();
    }

    // --- trades ---

    pub fn trades(&self) -> SliceView<Vec<Trade>> {
        read(&self.trades).get()
    }

    pub fn set_trades_loading(&self) {
        write(&self.trades).set_loading();
        self.bump();
    }

    /// Wholesale replace in server-provided (chronological) order
    pub fn set_trades(&self, trades: Vec<Trade>) {
        let mut pending = lock(&self.pending);
        let mut slice = write(&self.trades);
        slice.set_value(trades);
        drain_trades(&mut pending, &mut slice);
        drop(slice);
        drop(pending);
        self.bump();
    }

    pub fn set_trades_error(&self, error: impl Into<String>) {
        let mut pending = lock(&self.pending);
        let mut slice = write(&self.trades);
        slice.set_error(error);
        drain_trades(&mut pending, &mut slice);
        drop(slice);
        drop(pending);
        self.bump();
    }

    /// Append-only: pushed trades extend the sequence, never overwrite it
    pub fn append_trade(&self, trade: Trade) {
        if trade.id.is_empty() {
            warn!("Rejected trade update with empty id");
            write(&self.trades).set_error("trade update with empty id rejected");
            self.bump();
            return;
        }
        write(&self.trades).update_with(Vec::new(), |trades| trades.push(trade));
        self.bump();
    }

    // --- market status ---

    pub fn market_status(&self) -> SliceView<MarketStatus> {
        read(&self.market_status).get()
    }

    pub fn set_market_status_loading(&self) {
        write(&self.market_status).set_loading();
        self.bump();
    }

    pub fn set_market_status(&self, status: MarketStatus) {
        let mut pending = lock(&self.pending);
        let mut slice = write(&self.market_status);
        slice.set_value(status);
        drain_market_status(&mut pending, &mut slice);
        drop(slice);
        drop(pending);
        self.bump();
    }

    pub fn set_market_status_error(&self, error: impl Into<String>) {
        let mut pending = lock(&self.pending);
        let mut slice = write(&self.market_status);
        slice.set_error(error);
        drain_market_status(&mut pending, &mut slice);
        drop(slice);
        drop(pending);
        self.bump();
    }

    // --- log ---

    pub fn log_lines(&self) -> Vec<String> {
        read(&self.log).clone()
    }

    pub fn push_log(&self, line: impl Into<String>) {
        write(&self.log).push(line.into());
        self.bump();
    }

    pub fn clear_log(&self) {
        write(&self.log).clear();
        self.bump();
    }

    // --- push dispatch ---

    /// Apply one decoded push event.
    ///
    /// Entity updates for a slice whose initial snapshot has not settled
    /// yet are buffered (never dropped) and applied when the load completes
    /// or fails. The pending lock is held across the seeded check here, and
    /// the setters hold it across both the slice write and the queue drain,
    /// so an event always lands either in the queue (drained in arrival
    /// order) or on the slice strictly after the drain has finished. A
    /// concurrent snapshot settle can neither strand a buffered event nor
    /// roll the slice back to an older one.
    pub fn apply_push(&self, event: PushEvent) {
        match event {
            PushEvent::AccountUpdate(account) => {
                let mut pending = lock(&self.pending);
                if read(&self.account).is_seeded() {
                    drop(pending);
                    self.set_account(account);
                } else {
                    debug!("Buffered account push before initial snapshot");
                    pending.account.push(account);
                }
            }
            PushEvent::PositionsUpdate(positions) => {
                let mut pending = lock(&self.pending);
                if read(&self.positions).is_seeded() {
                    drop(pending);
                    self.set_positions(positions);
                } else {
                    debug!("Buffered positions push before initial snapshot");
                    pending.positions.push(positions);
                }
            }
            PushEvent::OrderUpdate(order) => {
                let mut pending = lock(&self.pending);
                if read(&self.orders).is_seeded() {
                    drop(pending);
                    self.upsert_order(order);
                } else {
                    debug!(order_id = %order.id, "Buffered order push before initial snapshot");
                    pending.orders.push(order);
                }
            }
            PushEvent::TradeUpdate(trade) => {
                let mut pending = lock(&self.pending);
                if read(&self.trades).is_seeded() {
                    drop(pending);
                    self.append_trade(trade);
                } else {
                    debug!(trade_id = %trade.id, "Buffered trade push before initial snapshot");
                    pending.trades.push(trade);
                }
            }
            PushEvent::MarketStatusUpdate(status) => {
                let mut pending = lock(&self.pending);
                if read(&self.market_status).is_seeded() {
                    drop(pending);
                    self.set_market_status(status);
                } else {
                    debug!("Buffered market status push before initial snapshot");
                    pending.market_status.push(status);
                }
            }
            PushEvent::LogLine(message) => {
                self.push_log(message);
            }
            PushEvent::Unknown { raw } => {
                // Nothing is silently lost: unrecognized or undecodable
                // frames land in the log verbatim.
                self.push_log(raw);
            }
        }
    }
}

impl Default for DashboardStore {
    fn default() -> Self {
        Self::new()
    }
}

fn upsert_into(slice: &mut EntitySlice<Vec<Order>>, order: Order) {
    slice.update_with(Vec::new(), |orders| {
        match orders.iter_mut().find(|o| o.id == order.id) {
            Some(existing) => *existing = order,
            None => orders.push(order),
        }
    });
}

// Queue drains run with both the pending lock and the slice write lock
// held, so no push can interleave between the snapshot write and the
// buffered events landing on the slice.

fn drain_account(pending: &mut PendingPushes, slice: &mut EntitySlice<Account>) {
    let queued = std::mem::take(&mut pending.account);
    if !queued.is_empty() {
        debug!(count = queued.len(), "Applying buffered account pushes");
        for account in queued {
            slice.set_value(account);
        }
    }
}

fn drain_positions(pending: &mut PendingPushes, slice: &mut EntitySlice<Vec<Position>>) {
    let queued = std::mem::take(&mut pending.positions);
    if !queued.is_empty() {
        debug!(count = queued.len(), "Applying buffered position pushes");
        for positions in queued {
            slice.set_value(positions);
        }
    }
}

fn drain_orders(pending: &mut PendingPushes, slice: &mut EntitySlice<Vec<Order>>) {
    let queued = std::mem::take(&mut pending.orders);
    if !queued.is_empty() {
        debug!(count = queued.len(), "Applying buffered order pushes");
        for order in queued {
            upsert_into(slice, order);
        }
    }
}

fn drain_trades(pending: &mut PendingPushes, slice: &mut EntitySlice<Vec<Trade>>) {
    let queued = std::mem::take(&mut pending.trades);
    if !queued.is_empty() {
        debug!(count = queued.len(), "Applying buffered trade pushes");
        for trade in queued {
            slice.update_with(Vec::new(), |trades| trades.push(trade));
        }
    }
}

fn drain_market_status(pending: &mut PendingPushes, slice: &mut EntitySlice<MarketStatus>) {
    let queued = std::mem::take(&mut pending.market_status);
    if !queued.is_empty() {
        debug!(count = queued.len(), "Applying buffered market status pushes");
        for status in queued {
            slice.set_value(status);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AccountStatus, OrderSide, OrderStatus};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn sample_order(id: &str, status: OrderStatus) -> Order {
        Order {
            id: id.to_string(),
            symbol: "AAPL".to_string(),
            side: OrderSide::Buy,
            order_type: "market".to_string(),
            qty: dec!(10),
            filled_qty: dec!(0),
            filled_avg_price: None,
            status,
            submitted_at: Some(Utc::now()),
            filled_at: None,
        }
    }

    fn sample_trade(id: &str) -> Trade {
        Trade {
            id: id.to_string(),
            symbol: "AAPL".to_string(),
            qty: dec!(1),
            price: dec!(190.5),
            side: OrderSide::Sell,
            timestamp: Utc::now(),
        }
    }

    fn sample_account(equity: rust_decimal::Decimal) -> Account {
        Account {
            portfolio_value: equity,
            buying_power: dec!(50000),
            equity,
            last_equity: dec!(100000),
            status: AccountStatus::Active,
        }
    }

    #[test]
    fn test_upsert_is_idempotent_by_id() {
        let store = DashboardStore::new();
        store.set_orders(Vec::new());

        store.upsert_order(sample_order("a", OrderStatus::New));
        store.upsert_order(sample_order("b", OrderStatus::New));
        store.upsert_order(sample_order("a", OrderStatus::Filled));

        let orders = store.orders().value.unwrap();
        assert_eq!(orders.len(), 2);
        let a = orders.iter().find(|o| o.id == "a").unwrap();
        assert_eq!(a.status, OrderStatus::Filled);
        assert!(orders.iter().any(|o| o.id == "b"));
    }

    #[test]
    fn test_append_preserves_count_and_order() {
        let store = DashboardStore::new();
        store.set_trades(Vec::new());

        for id in ["t1", "t2", "t3"] {
            store.append_trade(sample_trade(id));
        }

        let trades = store.trades().value.unwrap();
        assert_eq!(trades.len(), 3);
        let ids: Vec<&str> = trades.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["t1", "t2", "t3"]);
    }

    #[test]
    fn test_error_then_value_transition() {
        let store = DashboardStore::new();

        store.set_account_error("x");
        let view = store.account();
        assert!(view.value.is_none());
        assert!(!view.loading);
        assert_eq!(view.error.as_deref(), Some("x"));

        store.set_account(sample_account(dec!(101000)));
        let view = store.account();
        assert_eq!(view.value.unwrap().equity, dec!(101000));
        assert!(!view.loading);
        assert!(view.error.is_none());
    }

    #[test]
    fn test_push_buffered_until_snapshot_settles() {
        let store = DashboardStore::new();

        store.apply_push(PushEvent::OrderUpdate(sample_order("o1", OrderStatus::Filled)));
        assert!(store.orders().value.is_none(), "push must not apply before the snapshot");

        store.set_orders(vec![sample_order("o2", OrderStatus::New)]);

        let orders = store.orders().value.unwrap();
        assert_eq!(orders.len(), 2);
        assert!(orders.iter().any(|o| o.id == "o1" && o.status == OrderStatus::Filled));
    }

    #[test]
    fn test_push_buffered_applies_after_failed_load() {
        let store = DashboardStore::new();

        store.apply_push(PushEvent::AccountUpdate(sample_account(dec!(99))));
        store.set_account_error("network down");

        let view = store.account();
        assert_eq!(view.value.unwrap().equity, dec!(99));
        assert!(view.error.is_none(), "buffered push clears the load error");
    }

    #[test]
    fn test_push_after_seed_applies_directly() {
        let store = DashboardStore::new();
        store.set_orders(Vec::new());

        store.apply_push(PushEvent::OrderUpdate(sample_order("o1", OrderStatus::Filled)));

        let orders = store.orders().value.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].status, OrderStatus::Filled);
    }

    #[test]
    fn test_concurrent_snapshot_drain_preserves_push_arrival_order() {
        // A push racing the snapshot settle must end up applied last no
        // matter how the two threads interleave: either it is buffered and
        // drained after the stale queued event, or it upserts strictly
        // after the drain has finished. The state must never roll back to
        // the older buffered status.
        for _ in 0..200 {
            let store = std::sync::Arc::new(DashboardStore::new());
            store.apply_push(PushEvent::OrderUpdate(sample_order("o1", OrderStatus::New)));

            let settle = {
                let store = store.clone();
                std::thread::spawn(move || store.set_orders(Vec::new()))
            };
            let push = {
                let store = store.clone();
                std::thread::spawn(move || {
                    store.apply_push(PushEvent::OrderUpdate(sample_order("o1", OrderStatus::Filled)))
                })
            };
            settle.join().unwrap();
            push.join().unwrap();

            let orders = store.orders().value.unwrap();
            assert_eq!(orders.len(), 1);
            assert_eq!(orders[0].status, OrderStatus::Filled);
        }
    }

    #[test]
    fn test_unknown_event_only_touches_log() {
        let store = DashboardStore::new();
        store.set_orders(Vec::new());
        let orders_before = store.orders();

        store.apply_push(PushEvent::Unknown {
            raw: r#"{"type":"foo","data":{"x":1}}"#.to_string(),
        });

        assert_eq!(store.log_lines(), vec![r#"{"type":"foo","data":{"x":1}}"#.to_string()]);
        assert_eq!(store.orders(), orders_before);
        assert!(store.positions().value.is_none());
    }

    #[test]
    fn test_log_append_and_clear() {
        let store = DashboardStore::new();
        store.push_log("first");
        store.push_log("second");
        assert_eq!(store.log_lines().len(), 2);

        store.clear_log();
        assert!(store.log_lines().is_empty());
    }

    #[test]
    fn test_empty_order_id_rejected_as_error() {
        let store = DashboardStore::new();
        store.set_orders(vec![sample_order("a", OrderStatus::New)]);

        store.upsert_order(sample_order("", OrderStatus::Filled));

        let view = store.orders();
        assert_eq!(view.value.unwrap().len(), 1, "store must not be corrupted");
        assert!(view.error.is_some());
    }

    #[test]
    fn test_version_bumps_on_mutation() {
        let store = DashboardStore::new();
        let rx = store.subscribe();
        let before = *rx.borrow();

        store.push_log("line");

        assert_ne!(*rx.borrow(), before);
    }
}
