//! Entity models for the dashboard state-synchronization layer
//!
//! Everything here mirrors the broker's wire format: money and quantity
//! fields arrive as decimal strings, timestamps as RFC 3339, and enums as
//! lowercase (orders) or uppercase (account status) strings. Unknown enum
//! values are preserved in an `Other` variant instead of failing the whole
//! entity.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Brokerage account snapshot. Replaced wholesale on every update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    #[serde(deserialize_with = "deserialize_decimal_flexible")]
    pub portfolio_value: Decimal,
    #[serde(deserialize_with = "deserialize_decimal_flexible")]
    pub buying_power: Decimal,
    #[serde(deserialize_with = "deserialize_decimal_flexible")]
    pub equity: Decimal,
    #[serde(deserialize_with = "deserialize_decimal_flexible")]
    pub last_equity: Decimal,
    pub status: AccountStatus,
}

/// Account status as reported by the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountStatus {
    Active,
    Other(String),
}

impl AccountStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, AccountStatus::Active)
    }
}

impl<'de> Deserialize<'de> for AccountStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(match s.as_str() {
            "ACTIVE" => AccountStatus::Active,
            _ => AccountStatus::Other(s),
        })
    }
}

impl Serialize for AccountStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            AccountStatus::Active => serializer.serialize_str("ACTIVE"),
            AccountStatus::Other(s) => serializer.serialize_str(s),
        }
    }
}

/// Open position, keyed by `asset_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub asset_id: String,
    pub symbol: String,
    #[serde(deserialize_with = "deserialize_decimal_flexible")]
    pub qty: Decimal,
    #[serde(deserialize_with = "deserialize_decimal_flexible")]
    pub avg_entry_price: Decimal,
    #[serde(deserialize_with = "deserialize_decimal_flexible")]
    pub market_value: Decimal,
    #[serde(deserialize_with = "deserialize_decimal_flexible")]
    pub unrealized_pl: Decimal,
    #[serde(default, deserialize_with = "deserialize_opt_decimal_flexible")]
    pub take_profit_price: Option<Decimal>,
    #[serde(default, deserialize_with = "deserialize_opt_decimal_flexible")]
    pub stop_loss_price: Option<Decimal>,
}

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl<'de> Deserialize<'de> for OrderSide {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match s.to_lowercase().as_str() {
            "buy" => Ok(OrderSide::Buy),
            "sell" => Ok(OrderSide::Sell),
            _ => Err(serde::de::Error::unknown_variant(&s, &["buy", "sell"])),
        }
    }
}

/// Order lifecycle status; unrecognized values are kept verbatim
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Canceled,
    Expired,
    Other(String),
}

impl<'de> Deserialize<'de> for OrderStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(match s.as_str() {
            "new" => OrderStatus::New,
            "partially_filled" => OrderStatus::PartiallyFilled,
            "filled" => OrderStatus::Filled,
            "canceled" => OrderStatus::Canceled,
            "expired" => OrderStatus::Expired,
            _ => OrderStatus::Other(s),
        })
    }
}

impl Serialize for OrderStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = match self {
            OrderStatus::New => "new",
            OrderStatus::PartiallyFilled => "partially_filled",
            OrderStatus::Filled => "filled",
            OrderStatus::Canceled => "canceled",
            OrderStatus::Expired => "expired",
            OrderStatus::Other(s) => s.as_str(),
        };
        serializer.serialize_str(s)
    }
}

/// Order, keyed by `id`. Snapshots replace the full set; push updates
/// carry a single order and are upserted by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: String,
    #[serde(deserialize_with = "deserialize_decimal_flexible")]
    pub qty: Decimal,
    #[serde(deserialize_with = "deserialize_decimal_flexible")]
    pub filled_qty: Decimal,
    #[serde(default, deserialize_with = "deserialize_opt_decimal_flexible")]
    pub filled_avg_price: Option<Decimal>,
    pub status: OrderStatus,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub filled_at: Option<DateTime<Utc>>,
}

/// Executed trade, keyed by `id`. Append-only under push delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: String,
    pub symbol: String,
    #[serde(deserialize_with = "deserialize_decimal_flexible")]
    pub qty: Decimal,
    #[serde(deserialize_with = "deserialize_decimal_flexible")]
    pub price: Decimal,
    pub side: OrderSide,
    pub timestamp: DateTime<Utc>,
}

/// Market clock snapshot. Replaced wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketStatus {
    pub is_open: bool,
    pub next_open: DateTime<Utc>,
    pub next_close: DateTime<Utc>,
    pub timestamp: DateTime<Utc>,
}

/// Deserialize a decimal from either a string or a bare number
pub(crate) fn deserialize_decimal_flexible<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::{Error, Visitor};
    use std::fmt;

    struct DecimalVisitor;

    impl<'de> Visitor<'de> for DecimalVisitor {
        type Value = Decimal;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a decimal number as string or number")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: Error,
        {
            value
                .parse::<Decimal>()
                .map_err(|_| E::custom(format!("Invalid decimal string: {}", value)))
        }

        fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
        where
            E: Error,
        {
            Decimal::try_from(value)
                .map_err(|_| E::custom(format!("Invalid decimal number: {}", value)))
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: Error,
        {
            Ok(Decimal::from(value))
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: Error,
        {
            Ok(Decimal::from(value))
        }
    }

    deserializer.deserialize_any(DecimalVisitor)
}

/// Deserialize an optional decimal, tolerating null and missing fields
pub(crate) fn deserialize_opt_decimal_flexible<'de, D>(
    deserializer: D,
) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Wrapper(#[serde(deserialize_with = "deserialize_decimal_flexible")] Decimal);

    Ok(Option::<Wrapper>::deserialize(deserializer)?.map(|w| w.0))
}
