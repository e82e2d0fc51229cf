// 8.0.2: result types and errors for juror decisions.

use crate::codec::CodecError;
use crate::types::{ExecutionMode, MarketId, OrderKind, OrderStatus};
use alloy_primitives::{Address, Bytes, B256, I256};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderError {
    // placement
    #[error("invalid price")]
    InvalidPrice,

    #[error("no trading authority")]
    NoTradingAuthority,

    #[error("invalid market")]
    InvalidMarket,

    #[error("baseAssetQuantity is zero")]
    BaseAssetQuantityZero,

    #[error("not multiple of min size")]
    NotMultipleOfMinSize,

    #[error("order already exists")]
    OrderAlreadyExists,

    #[error("stale reduce only orders")]
    StaleReduceOnlyOrders,

    #[error("reduce only order must reduce position")]
    ReduceOnlyQuantityInvalid,

    #[error("open orders")]
    OpenOrders,

    #[error("net reduce only amount exceeded")]
    NetReduceOnlyExceeded,

    #[error("open reduce only orders")]
    OpenReduceOnlyOrders,

    #[error("insufficient margin")]
    InsufficientMargin,

    #[error("crossing market")]
    CrossingMarket,

    #[error("no referrer")]
    NoReferrer,

    #[error("invalid price precision")]
    PricePrecision,

    // cancellation. a non-placed order reports its own status name
    #[error("{0}")]
    Status(OrderStatus),

    #[error("not low margin")]
    NotLowMargin,

    // matching
    #[error("invalid order")]
    InvalidOrder,

    #[error("not long")]
    NotLongOrder,

    #[error("not short")]
    NotShortOrder,

    #[error("invalid fill amount")]
    InvalidFillAmount,

    #[error("overfill")]
    Overfill,

    #[error("reduce only amount exceeded")]
    ReduceOnlyAmountExceeded,

    #[error("orders for different markets")]
    NotSameMarket,

    #[error("orders do not match")]
    NoMatch,

    #[error("long price below lower bound")]
    PriceBelowLowerBound,

    #[error("short price above upper bound")]
    PriceAboveUpperBound,

    #[error("IOC order expired")]
    IocOrderExpired,

    // ioc and signed orders
    #[error("not ioc order")]
    NotIocOrder,

    #[error("ioc expiration too far")]
    IocExpirationTooFar,

    #[error("trader mismatch")]
    TraderMismatch,

    #[error("no orders")]
    NoOrders,

    #[error("not signed order")]
    NotSignedOrder,

    #[error("signed order expired")]
    SignedOrderExpired,

    #[error("post only required")]
    NotPostOnly,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("decode failed: {0}")]
    Decode(#[from] CodecError),
}

/// Which input a match rejection is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadElement {
    Order0,
    Order1,
    Generic,
    NoError,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{element:?}: {error}")]
pub struct MatchRejection {
    pub error: OrderError,
    pub element: BadElement,
}

impl MatchRejection {
    pub fn new(error: OrderError, element: BadElement) -> Self {
        Self { error, element }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceOrderResponse {
    /// Always set, even on rejection.
    pub order_hash: B256,
    /// Set once the market resolved.
    pub market: Option<Address>,
    pub reserve_amount: I256,
    pub error: Option<OrderError>,
}

impl PlaceOrderResponse {
    pub(crate) fn new(order_hash: B256) -> Self {
        Self {
            order_hash,
            market: None,
            reserve_amount: I256::ZERO,
            error: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn into_result(self) -> Result<Self, OrderError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelOrderResponse {
    pub order_hash: B256,
    pub market: Option<Address>,
    /// Remaining signed quantity. Zero on rejection.
    pub unfilled_amount: I256,
    pub error: Option<OrderError>,
}

impl CancelOrderResponse {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn into_result(self) -> Result<Self, OrderError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }
}

/// One side of a settlement instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchInstruction {
    pub market_id: MarketId,
    pub trader: Address,
    pub order_hash: B256,
    pub mode: ExecutionMode,
}

/// Accepted two-order match. Slot 0 is the long order, slot 1 the short.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchOutput {
    pub instructions: [MatchInstruction; 2],
    pub order_kinds: [OrderKind; 2],
    pub encoded_orders: [Bytes; 2],
    pub fill_price: I256,
    /// Unsigned base quantity the match was validated for.
    pub fill_amount: I256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiquidationMatchOutput {
    pub instruction: MatchInstruction,
    pub order_kind: OrderKind,
    pub encoded_order: Bytes,
    pub fill_price: I256,
    /// Signed from the order's point of view.
    pub fill_amount: I256,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_errors_print_the_status_name() {
        assert_eq!(OrderError::Status(OrderStatus::Filled).to_string(), "Filled");
        assert_eq!(OrderError::Status(OrderStatus::Invalid).to_string(), "Invalid");
    }

    #[test]
    fn rejection_names_the_slot() {
        let rejection = MatchRejection::new(OrderError::NoMatch, BadElement::Generic);
        assert_eq!(rejection.to_string(), "Generic: orders do not match");
    }

    #[test]
    fn into_result_surfaces_the_error() {
        let mut response = PlaceOrderResponse::new(B256::ZERO);
        assert!(response.clone().into_result().is_ok());
        response.error = Some(OrderError::NoReferrer);
        assert_eq!(response.into_result(), Err(OrderError::NoReferrer));
    }
}
