//! Read-side projections: UI-ready values derived from store state
//!
//! Pure functions only. Nothing here mutates the store or caches results.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use crate::types::{Account, MarketStatus, Order};

/// Daily profit/loss: equity minus prior-day equity. Sign carries the
/// profit-or-loss presentation.
pub fn daily_pl(account: &Account) -> Decimal {
    account.equity - account.last_equity
}

/// Time until the next market event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Countdown {
    /// The target time has already passed
    Now,
    Remaining(Duration),
}

impl Countdown {
    pub fn is_now(&self) -> bool {
        matches!(self, Countdown::Now)
    }
}

impl fmt::Display for Countdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Countdown::Now => write!(f, "now"),
            Countdown::Remaining(remaining) => {
                // Seconds truncate, they never round up.
                let total = remaining.num_seconds();
                write!(f, "{}h {}m {}s", total / 3600, (total % 3600) / 60, total % 60)
            }
        }
    }
}

/// Countdown to the next market event: `next_close` while the market is
/// open, `next_open` otherwise. A target in the past reports `Now`, never
/// a negative duration.
pub fn market_countdown(status: &MarketStatus, now: DateTime<Utc>) -> Countdown {
    let target = if status.is_open {
        status.next_close
    } else {
        status.next_open
    };
    let remaining = target - now;
    if remaining <= Duration::zero() {
        Countdown::Now
    } else {
        Countdown::Remaining(remaining)
    }
}

/// Filled fraction of an order, `None` for zero-quantity orders
pub fn fill_ratio(order: &Order) -> Option<Decimal> {
    if order.qty.is_zero() {
        None
    } else {
        order.filled_qty.checked_div(order.qty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AccountStatus, OrderSide, OrderStatus};
    use rust_decimal_macros::dec;

    fn account(equity: Decimal, last_equity: Decimal) -> Account {
        Account {
            portfolio_value: equity,
            buying_power: dec!(0),
            equity,
            last_equity,
            status: AccountStatus::Active,
        }
    }

    fn status(is_open: bool, now: DateTime<Utc>, seconds_ahead: i64) -> MarketStatus {
        MarketStatus {
            is_open,
            next_open: now + Duration::seconds(seconds_ahead),
            next_close: now + Duration::seconds(seconds_ahead),
            timestamp: now,
        }
    }

    fn order(qty: Decimal, filled_qty: Decimal) -> Order {
        Order {
            id: "o1".to_string(),
            symbol: "AAPL".to_string(),
            side: OrderSide::Buy,
            order_type: "limit".to_string(),
            qty,
            filled_qty,
            filled_avg_price: None,
            status: OrderStatus::PartiallyFilled,
            submitted_at: None,
            filled_at: None,
        }
    }

    #[test]
    fn test_daily_pl_sign() {
        assert_eq!(daily_pl(&account(dec!(101000), dec!(100000))), dec!(1000));
        assert_eq!(daily_pl(&account(dec!(99500), dec!(100000))), dec!(-500));
    }

    #[test]
    fn test_countdown_truncates_seconds() {
        let now = Utc::now();
        let countdown = market_countdown(&status(true, now, 3661), now);
        assert_eq!(countdown.to_string(), "1h 1m 1s");
    }

    #[test]
    fn test_countdown_past_target_is_now() {
        let now = Utc::now();
        let countdown = market_countdown(&status(false, now, -10), now);
        assert!(countdown.is_now());
        assert_eq!(countdown.to_string(), "now");
    }

    #[test]
    fn test_countdown_uses_close_when_open() {
        let now = Utc::now();
        let status = MarketStatus {
            is_open: true,
            next_open: now + Duration::seconds(86400),
            next_close: now + Duration::seconds(60),
            timestamp: now,
        };
        assert_eq!(market_countdown(&status, now).to_string(), "0h 1m 0s");
    }

    #[test]
    fn test_fill_ratio() {
        assert_eq!(fill_ratio(&order(dec!(10), dec!(5))), Some(dec!(0.5)));
        assert_eq!(fill_ratio(&order(dec!(0), dec!(0))), None);
    }
}
