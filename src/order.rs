//! Order value types and per-order lifecycle bookkeeping.
//!
//! Three kinds share a common base: limit orders rest in the book, IOC orders
//! live only until `expire_at`, signed orders are authored off-chain and
//! submitted by a relayer. Identity is the canonical hash of the fields.

use crate::codec;
use crate::crypto::OrderDomain;
use crate::juror::OrderError;
use crate::types::{MarketId, OrderKind, OrderStatus, Timestamp};
use alloy_primitives::{keccak256, Address, Bytes, B256, I256, U256};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseOrder {
    pub market_id: MarketId,
    pub trader: Address,
    /// 1e18 scaled. sign is the direction.
    pub base_asset_quantity: I256,
    /// 1e6 scaled.
    pub price: I256,
    pub salt: U256,
    pub reduce_only: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitOrder {
    pub base: BaseOrder,
    pub post_only: bool,
}

impl LimitOrder {
    pub fn hash(&self) -> B256 {
        keccak256(codec::encode_limit_order(self))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IocOrder {
    /// Must carry the IOC tag to be executable.
    pub order_type: u8,
    pub expire_at: Timestamp,
    pub base: BaseOrder,
}

impl IocOrder {
    pub fn hash(&self) -> B256 {
        keccak256(codec::encode_ioc_order(self))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedOrder {
    pub order_type: u8,
    pub expire_at: Timestamp,
    pub base: BaseOrder,
    pub post_only: bool,
    /// 65 byte r || s || v.
    pub signature: Bytes,
}

impl SignedOrder {
    /// EIP-712 signing hash. The signature is not part of it.
    pub fn hash(&self, domain: &OrderDomain) -> B256 {
        codec::signed_order_digest(self, domain)
    }
}

// 2.0: closed set of order kinds. every entry point matches exhaustively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Order {
    Limit(LimitOrder),
    Ioc(IocOrder),
    Signed(SignedOrder),
}

impl Order {
    pub fn kind(&self) -> OrderKind {
        match self {
            Order::Limit(_) => OrderKind::Limit,
            Order::Ioc(_) => OrderKind::Ioc,
            Order::Signed(_) => OrderKind::Signed,
        }
    }

    pub fn base(&self) -> &BaseOrder {
        match self {
            Order::Limit(order) => &order.base,
            Order::Ioc(order) => &order.base,
            Order::Signed(order) => &order.base,
        }
    }

    pub fn post_only(&self) -> bool {
        match self {
            Order::Limit(order) => order.post_only,
            Order::Ioc(_) => false,
            Order::Signed(order) => order.post_only,
        }
    }

    pub fn hash(&self, domain: &OrderDomain) -> B256 {
        match self {
            Order::Limit(order) => order.hash(),
            Order::Ioc(order) => order.hash(),
            Order::Signed(order) => order.hash(domain),
        }
    }

    /// Field encoding without the type tag.
    pub fn encode(&self) -> Bytes {
        let raw = match self {
            Order::Limit(order) => codec::encode_limit_order(order),
            Order::Ioc(order) => codec::encode_ioc_order(order),
            Order::Signed(order) => codec::encode_signed_order(order),
        };
        Bytes::from(raw)
    }

    /// Typed envelope: `(uint8 orderType, bytes encodedOrder)`.
    pub fn encode_typed(&self) -> Bytes {
        Bytes::from(codec::encode_typed_order(self.kind(), &self.encode()))
    }
}

impl From<LimitOrder> for Order {
    fn from(order: LimitOrder) -> Self {
        Order::Limit(order)
    }
}

impl From<IocOrder> for Order {
    fn from(order: IocOrder) -> Self {
        Order::Ioc(order)
    }
}

impl From<SignedOrder> for Order {
    fn from(order: SignedOrder) -> Self {
        Order::Signed(order)
    }
}

// 2.1: on-chain view of one order. filled_amount carries the order's sign and
// never exceeds the quantity in magnitude. Default is the never-seen record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub status: OrderStatus,
    pub base_asset_quantity: I256,
    pub filled_amount: I256,
    pub block_placed: u64,
}

impl OrderRecord {
    pub fn placed(base_asset_quantity: I256, block_placed: u64) -> Self {
        Self {
            status: OrderStatus::Placed,
            base_asset_quantity,
            filled_amount: I256::ZERO,
            block_placed,
        }
    }

    pub fn unfilled(&self) -> I256 {
        self.base_asset_quantity - self.filled_amount
    }

    /// Applies a signed fill. Moves to Filled once the quantity is reached.
    pub fn fill(&mut self, delta: I256) -> Result<(), OrderError> {
        if self.status != OrderStatus::Placed {
            return Err(OrderError::Status(self.status));
        }
        if delta.is_zero() || delta.is_negative() != self.base_asset_quantity.is_negative() {
            return Err(OrderError::InvalidFillAmount);
        }
        let filled = self.filled_amount.checked_add(delta).ok_or(OrderError::Overfill)?;
        if filled.unsigned_abs() > self.base_asset_quantity.unsigned_abs() {
            return Err(OrderError::Overfill);
        }
        self.filled_amount = filled;
        if filled == self.base_asset_quantity {
            self.status = OrderStatus::Filled;
        }
        Ok(())
    }

    /// Cancels and returns the unfilled remainder.
    pub fn cancel(&mut self) -> Result<I256, OrderError> {
        if !self.status.can_transition_to(OrderStatus::Cancelled) {
            return Err(OrderError::Status(self.status));
        }
        self.status = OrderStatus::Cancelled;
        Ok(self.unfilled())
    }
}
