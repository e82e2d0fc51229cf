// 1.0: all the primitives live here. market ids, sides, order kinds, statuses, price bands.
// amounts are I256 scaled integers (1e6 for price/margin, 1e18 for size). no floats anywhere.

use alloy_primitives::{uint, I256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 1e6: precision of prices, margin, fees and ratios.
pub const ONE_E6: I256 = I256::from_raw(uint!(1000000_U256));
/// 1e18: precision of base asset quantities.
pub const ONE_E18: I256 = I256::from_raw(uint!(1000000000000000000_U256));

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MarketId(pub u64);

impl fmt::Display for MarketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "market#{}", self.0)
    }
}

// Long = positive base asset quantity. Short = negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// Side implied by a signed quantity. None for zero.
    pub fn from_quantity(quantity: I256) -> Option<Self> {
        if quantity.is_positive() {
            Some(Side::Long)
        } else if quantity.is_negative() {
            Some(Side::Short)
        } else {
            None
        }
    }

    // signs a magnitude for this side
    pub fn apply(&self, magnitude: I256) -> I256 {
        match self {
            Side::Long => magnitude.abs(),
            Side::Short => -magnitude.abs(),
        }
    }
}

// 1.1: order kind tag. the u8 is the wire tag in the typed order envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OrderKind {
    Limit,
    Ioc,
    Signed,
}

impl OrderKind {
    pub fn tag(&self) -> u8 {
        match self {
            OrderKind::Limit => 0,
            OrderKind::Ioc => 1,
            OrderKind::Signed => 2,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(OrderKind::Limit),
            1 => Some(OrderKind::Ioc),
            2 => Some(OrderKind::Signed),
            _ => None,
        }
    }
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderKind::Limit => write!(f, "limit"),
            OrderKind::Ioc => write!(f, "ioc"),
            OrderKind::Signed => write!(f, "signed"),
        }
    }
}

// 1.2: lifecycle. Invalid doubles as "never seen".
// Invalid -> Placed -> {Filled | Cancelled}, nothing leaves a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OrderStatus {
    #[default]
    Invalid,
    Placed,
    Filled,
    Cancelled,
}

impl OrderStatus {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => OrderStatus::Placed,
            2 => OrderStatus::Filled,
            3 => OrderStatus::Cancelled,
            _ => OrderStatus::Invalid,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Filled | OrderStatus::Cancelled)
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Invalid, OrderStatus::Placed)
                | (OrderStatus::Placed, OrderStatus::Filled)
                | (OrderStatus::Placed, OrderStatus::Cancelled)
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Invalid => write!(f, "Invalid"),
            OrderStatus::Placed => write!(f, "Placed"),
            OrderStatus::Filled => write!(f, "Filled"),
            OrderStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

// maker rests and sets the price, taker crosses into it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionMode {
    Taker,
    Maker,
}

// 1.3: oracle spread band. fill prices are clamped into [lower, upper].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBand {
    pub upper: I256,
    pub lower: I256,
}

impl PriceBand {
    pub fn new(upper: I256, lower: I256) -> Self {
        Self { upper, lower }
    }
}

// 1.4: unix seconds, as reported by the block header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    pub fn as_secs(&self) -> u64 {
        self.0
    }

    pub fn saturating_add(&self, secs: u64) -> Self {
        Self(self.0.saturating_add(secs))
    }

    // display helper for logs only; never consulted by a decision
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        i64::try_from(self.0)
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "{}", dt.to_rfc3339()),
            None => write!(f, "{}s", self.0),
        }
    }
}
