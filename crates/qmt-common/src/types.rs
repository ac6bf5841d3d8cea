//! Shared types for the QMT trading gateway.
//!
//! CRITICAL: All prices and amounts use `rust_decimal::Decimal`.
//! NEVER use f64 for financial math.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Order type for submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    /// Limit order at a specified price.
    Limit,
    /// Market order (fill at best available).
    Market,
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderType::Limit => write!(f, "LIMIT"),
            OrderType::Market => write!(f, "MARKET"),
        }
    }
}

/// Lifecycle status of a submitted order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    Submitted,
    Cancelled,
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Submitted => write!(f, "SUBMITTED"),
            OrderStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// An order as submitted by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTicket {
    /// Instrument code, e.g. "000001.SZ" or "600000.SH".
    pub stock_code: String,
    /// Buy or sell.
    pub side: Side,
    /// Order type.
    #[serde(default = "default_order_type")]
    pub order_type: OrderType,
    /// Number of shares.
    pub volume: u64,
    /// Limit price. Required for limit orders.
    pub price: Option<Decimal>,
}

fn default_order_type() -> OrderType {
    OrderType::Limit
}

impl OrderTicket {
    /// Create a limit order ticket.
    pub fn limit(stock_code: impl Into<String>, side: Side, volume: u64, price: Decimal) -> Self {
        Self {
            stock_code: stock_code.into(),
            side,
            order_type: OrderType::Limit,
            volume,
            price: Some(price),
        }
    }

    /// Create a market order ticket.
    pub fn market(stock_code: impl Into<String>, side: Side, volume: u64) -> Self {
        Self {
            stock_code: stock_code.into(),
            side,
            order_type: OrderType::Market,
            volume,
            price: None,
        }
    }
}

/// Account asset snapshot returned by read-only queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetSnapshot {
    pub total_asset: Decimal,
    pub market_value: Decimal,
    pub cash: Decimal,
    pub frozen_cash: Decimal,
}

/// Position snapshot returned by read-only queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub stock_code: String,
    pub volume: u64,
    pub available_volume: u64,
    pub cost_price: Decimal,
    pub market_price: Decimal,
}

/// Validate an instrument code.
///
/// Accepted formats:
/// - A-shares: 6 digits + ".SH" / ".SZ" / ".BJ" (e.g. "000001.SZ", "600000.SH")
/// - Hong Kong: digits + ".HK"
/// - US: digits + ".US"
/// - Bare numeric codes of 4-8 digits
pub fn validate_stock_code(stock_code: &str) -> bool {
    let code = stock_code.trim().to_uppercase();
    if code.is_empty() {
        return false;
    }

    match code.split_once('.') {
        Some((num, market)) => {
            if num.is_empty() || !num.bytes().all(|b| b.is_ascii_digit()) {
                return false;
            }
            match market {
                "SH" | "SZ" | "BJ" => num.len() == 6,
                "HK" | "US" => true,
                _ => false,
            }
        }
        None => {
            code.bytes().all(|b| b.is_ascii_digit()) && (4..=8).contains(&code.len())
        }
    }
}
