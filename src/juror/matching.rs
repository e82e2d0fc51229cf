//! Two-order matching: may these orders trade, at what price, who made it.
//!
//! Slot 0 is always the long order and slot 1 the short. Rejections carry a
//! `BadElement` so the caller can blame the offending order and leave its
//! counterparty alone.

use super::core::Juror;
use super::results::{BadElement, MatchInstruction, MatchOutput, MatchRejection, OrderError};
use crate::codec;
use crate::crypto::SignerRecovery;
use crate::math::{is_multiple_of, max, min};
use crate::order::{BaseOrder, Order};
use crate::state::StateAccessor;
use crate::types::{ExecutionMode, MarketId, OrderKind, OrderStatus, PriceBand, Side};
use alloy_primitives::{Address, Bytes, B256, I256};
use std::cmp::Ordering;
use tracing::{debug, trace};

/// Direction an order is validated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchSide {
    Long,
    Short,
    /// Direction taken from the order's own quantity sign.
    Liquidation,
}

/// What matching needs to know about a validated order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Metadata {
    pub market_id: MarketId,
    pub trader: Address,
    pub base_asset_quantity: I256,
    pub price: I256,
    pub block_placed: u64,
    pub order_hash: B256,
    pub kind: OrderKind,
    pub post_only: bool,
}

impl Metadata {
    fn new(order: &Order, order_hash: B256, block_placed: u64) -> Self {
        let base = order.base();
        Self {
            market_id: base.market_id,
            trader: base.trader,
            base_asset_quantity: base.base_asset_quantity,
            price: base.price,
            block_placed,
            order_hash,
            kind: order.kind(),
            post_only: order.post_only(),
        }
    }

    pub(super) fn instruction(&self, mode: ExecutionMode) -> MatchInstruction {
        MatchInstruction {
            market_id: self.market_id,
            trader: self.trader,
            order_hash: self.order_hash,
            mode,
        }
    }
}

impl<'a, S: StateAccessor + ?Sized, R: SignerRecovery> Juror<'a, S, R> {
    /// `orders` are typed envelopes, long first. `fill_amount` is the unsigned
    /// base quantity to trade.
    pub fn validate_orders_and_determine_fill_price(
        &self,
        orders: [&[u8]; 2],
        fill_amount: I256,
    ) -> Result<MatchOutput, MatchRejection> {
        let outcome = self.match_orders(orders, fill_amount);
        match &outcome {
            Ok(output) => trace!(
                long = %output.instructions[0].order_hash,
                short = %output.instructions[1].order_hash,
                fill_price = %output.fill_price,
                %fill_amount,
                "match accepted"
            ),
            Err(rejection) => debug!(element = ?rejection.element, error = %rejection.error, "match rejected"),
        }
        outcome
    }

    fn match_orders(&self, orders: [&[u8]; 2], fill_amount: I256) -> Result<MatchOutput, MatchRejection> {
        if !fill_amount.is_positive() {
            return Err(MatchRejection::new(OrderError::InvalidFillAmount, BadElement::Generic));
        }

        let (m0, encoded0) = self
            .validate_encoded_order(orders[0], MatchSide::Long, fill_amount)
            .map_err(|err| MatchRejection::new(err, BadElement::Order0))?;
        let (m1, encoded1) = self
            .validate_encoded_order(orders[1], MatchSide::Short, -fill_amount)
            .map_err(|err| MatchRejection::new(err, BadElement::Order1))?;

        if m0.market_id != m1.market_id {
            return Err(MatchRejection::new(OrderError::NotSameMarket, BadElement::Generic));
        }
        if m0.price < m1.price {
            return Err(MatchRejection::new(OrderError::NoMatch, BadElement::Generic));
        }
        if !is_multiple_of(fill_amount, self.state.min_size_requirement(m0.market_id)) {
            return Err(MatchRejection::new(OrderError::NotMultipleOfMinSize, BadElement::Generic));
        }

        let band = self.state.price_bounds(m0.market_id);
        let (fill_price, mode0, mode1) = determine_fill_price(&m0, &m1, band)?;

        Ok(MatchOutput {
            instructions: [m0.instruction(mode0), m1.instruction(mode1)],
            order_kinds: [m0.kind, m1.kind],
            encoded_orders: [encoded0, encoded1],
            fill_price,
            fill_amount,
        })
    }

    /// Opens a typed envelope and validates the order inside it.
    pub(super) fn validate_encoded_order(
        &self,
        data: &[u8],
        side: MatchSide,
        fill_amount: I256,
    ) -> Result<(Metadata, Bytes), OrderError> {
        let (kind, encoded) = codec::decode_typed_order(data)?;
        let order = codec::decode_order(kind, &encoded)?;
        let metadata = self.validate_order(&order, side, fill_amount)?;
        Ok((metadata, encoded))
    }

    // 8.3: per-kind execution checks, then the shared limit-like check
    pub(super) fn validate_order(&self, order: &Order, side: MatchSide, fill_amount: I256) -> Result<Metadata, OrderError> {
        match order {
            Order::Limit(limit) => {
                let hash = limit.hash();
                let metadata = Metadata::new(order, hash, self.state.block_placed(OrderKind::Limit, hash));
                self.validate_limit_like(
                    &limit.base,
                    self.state.order_filled_amount(OrderKind::Limit, hash),
                    self.state.order_status(OrderKind::Limit, hash),
                    side,
                    fill_amount,
                )?;
                Ok(metadata)
            }
            Order::Ioc(ioc) => {
                let hash = ioc.hash();
                let metadata = Metadata::new(order, hash, self.state.block_placed(OrderKind::Ioc, hash));
                if ioc.order_type != OrderKind::Ioc.tag() {
                    return Err(OrderError::NotIocOrder);
                }
                if ioc.expire_at.as_secs() < self.state.block_timestamp() {
                    return Err(OrderError::IocOrderExpired);
                }
                self.validate_limit_like(
                    &ioc.base,
                    self.state.order_filled_amount(OrderKind::Ioc, hash),
                    self.state.order_status(OrderKind::Ioc, hash),
                    side,
                    fill_amount,
                )?;
                Ok(metadata)
            }
            Order::Signed(signed) => {
                let hash = signed.hash(&self.state.order_domain());
                let metadata = Metadata::new(order, hash, self.state.block_placed(OrderKind::Signed, hash));
                self.check_signed_order(signed, hash)?;
                // a signed order first exists on chain at its first fill
                let status = match self.state.order_status(OrderKind::Signed, hash) {
                    OrderStatus::Invalid => OrderStatus::Placed,
                    status => status,
                };
                self.validate_limit_like(
                    &signed.base,
                    self.state.order_filled_amount(OrderKind::Signed, hash),
                    status,
                    side,
                    fill_amount,
                )?;
                Ok(metadata)
            }
        }
    }

    /// Status, direction, overfill and reduce-only checks shared by every kind.
    /// `fill_amount` is signed for Long/Short and unsigned for Liquidation.
    fn validate_limit_like(
        &self,
        base: &BaseOrder,
        filled_amount: I256,
        status: OrderStatus,
        side: MatchSide,
        fill_amount: I256,
    ) -> Result<(), OrderError> {
        if status != OrderStatus::Placed {
            return Err(OrderError::InvalidOrder);
        }

        let quantity = base.base_asset_quantity;
        let (side, fill_amount) = match side {
            MatchSide::Long => (Side::Long, fill_amount),
            MatchSide::Short => (Side::Short, fill_amount),
            MatchSide::Liquidation => match Side::from_quantity(quantity) {
                Some(Side::Long) => (Side::Long, fill_amount),
                Some(Side::Short) => (Side::Short, -fill_amount),
                None => return Err(OrderError::NoMatch),
            },
        };

        match side {
            Side::Long => {
                if !quantity.is_positive() {
                    return Err(OrderError::NotLongOrder);
                }
                if !fill_amount.is_positive() {
                    return Err(OrderError::InvalidFillAmount);
                }
                // a sum past int256 is past any quantity too
                if filled_amount.checked_add(fill_amount).map_or(true, |filled| filled > quantity) {
                    return Err(OrderError::Overfill);
                }
                if base.reduce_only {
                    let position = self.state.position_size(base.market_id, base.trader);
                    // the long fill may only close a short
                    if position.checked_add(fill_amount).map_or(true, |after| after.is_positive()) {
                        return Err(OrderError::ReduceOnlyAmountExceeded);
                    }
                }
            }
            Side::Short => {
                if !quantity.is_negative() {
                    return Err(OrderError::NotShortOrder);
                }
                if !fill_amount.is_negative() {
                    return Err(OrderError::InvalidFillAmount);
                }
                if filled_amount.checked_add(fill_amount).map_or(true, |filled| filled < quantity) {
                    return Err(OrderError::Overfill);
                }
                if base.reduce_only {
                    let position = self.state.position_size(base.market_id, base.trader);
                    if position.checked_add(fill_amount).map_or(true, |after| after.is_negative()) {
                        return Err(OrderError::ReduceOnlyAmountExceeded);
                    }
                }
            }
        }
        Ok(())
    }
}

// 8.4: maker is whoever was placed first. returns (fill price, mode0, mode1)
fn determine_fill_price(
    m0: &Metadata,
    m1: &Metadata,
    band: PriceBand,
) -> Result<(I256, ExecutionMode, ExecutionMode), MatchRejection> {
    if m0.price < band.lower {
        return Err(MatchRejection::new(OrderError::PriceBelowLowerBound, BadElement::Order0));
    }
    if m1.price > band.upper {
        return Err(MatchRejection::new(OrderError::PriceAboveUpperBound, BadElement::Order1));
    }

    let long_makes = (min(m0.price, band.upper), ExecutionMode::Maker, ExecutionMode::Taker);
    let short_makes = (max(m1.price, band.lower), ExecutionMode::Taker, ExecutionMode::Maker);

    match m0.block_placed.cmp(&m1.block_placed) {
        Ordering::Less => {
            // an IOC order can't have been resting
            if m0.kind == OrderKind::Ioc {
                return Err(MatchRejection::new(OrderError::IocOrderExpired, BadElement::Order0));
            }
            if m1.kind == OrderKind::Limit && m1.post_only {
                return Err(MatchRejection::new(OrderError::CrossingMarket, BadElement::Order1));
            }
            Ok(long_makes)
        }
        Ordering::Greater => {
            if m1.kind == OrderKind::Ioc {
                return Err(MatchRejection::new(OrderError::IocOrderExpired, BadElement::Order1));
            }
            if m0.kind == OrderKind::Limit && m0.post_only {
                return Err(MatchRejection::new(OrderError::CrossingMarket, BadElement::Order0));
            }
            Ok(short_makes)
        }
        // same block: an IOC short takes, otherwise the long side takes
        Ordering::Equal if m1.kind == OrderKind::Ioc => Ok(long_makes),
        Ordering::Equal => Ok(short_makes),
    }
}
