//! Order placement checks.
//!
//! Checks run in a fixed order and the first failure wins. The order hash is
//! computed before anything else and the market address is recorded as soon as
//! it resolves, so a rejected response still identifies the order.

use super::core::{reduces_position, Juror};
use super::results::{OrderError, PlaceOrderResponse};
use crate::crypto::SignerRecovery;
use crate::margin::required_margin;
use crate::math::{is_multiple_of, sign};
use crate::order::{BaseOrder, IocOrder, LimitOrder, SignedOrder};
use crate::state::StateAccessor;
use crate::types::{OrderKind, OrderStatus};
use alloy_primitives::{Address, B256, I256};
use tracing::{debug, trace};

impl<'a, S: StateAccessor + ?Sized, R: SignerRecovery> Juror<'a, S, R> {
    pub fn validate_place_limit_order(&self, order: &LimitOrder, sender: Address) -> PlaceOrderResponse {
        let mut response = PlaceOrderResponse::new(order.hash());
        let outcome = self.check_placement(
            OrderKind::Limit,
            response.order_hash,
            &order.base,
            order.post_only,
            Some(sender),
            &mut response.market,
        );
        self.finish_placement(response, outcome, OrderKind::Limit)
    }

    /// Signed orders carry their own authority: the recovered signer must be
    /// the trader or one of its delegates. Whoever relays it does not matter.
    pub fn validate_place_signed_order(&self, order: &SignedOrder) -> PlaceOrderResponse {
        let domain = self.state.order_domain();
        let mut response = PlaceOrderResponse::new(order.hash(&domain));
        let outcome = self.check_signed_order(order, response.order_hash).and_then(|()| {
            self.check_placement(
                OrderKind::Signed,
                response.order_hash,
                &order.base,
                order.post_only,
                None,
                &mut response.market,
            )
        });
        self.finish_placement(response, outcome, OrderKind::Signed)
    }

    /// Validates a batch of IOC orders for one trader. Orders are checked in
    /// array order and the first failure rejects the whole batch.
    pub fn validate_place_ioc_orders(&self, orders: &[IocOrder], sender: Address) -> Result<Vec<B256>, OrderError> {
        let first = orders.first().ok_or(OrderError::NoOrders)?;
        let trader = first.base.trader;
        self.check_authority(trader, sender)?;

        let now = self.state.block_timestamp();
        let expire_within = now.saturating_add(self.state.ioc_expiration_cap());
        let active_markets = self.state.active_markets_count();

        let mut hashes = Vec::with_capacity(orders.len());
        for (index, order) in orders.iter().enumerate() {
            let base = &order.base;
            let hash = order.hash();
            let check = || -> Result<(), OrderError> {
                if base.base_asset_quantity.is_zero() {
                    return Err(OrderError::BaseAssetQuantityZero);
                }
                if base.trader != trader {
                    return Err(OrderError::TraderMismatch);
                }
                if order.order_type != OrderKind::Ioc.tag() {
                    return Err(OrderError::NotIocOrder);
                }
                if order.expire_at.as_secs() < now {
                    return Err(OrderError::IocOrderExpired);
                }
                if order.expire_at.as_secs() > expire_within {
                    return Err(OrderError::IocExpirationTooFar);
                }
                if base.market_id.0 >= active_markets {
                    return Err(OrderError::InvalidMarket);
                }
                let min_size = self.state.min_size_requirement(base.market_id);
                if !is_multiple_of(base.base_asset_quantity, min_size) {
                    return Err(OrderError::NotMultipleOfMinSize);
                }
                if base.reduce_only {
                    let position = self.state.position_size(base.market_id, trader);
                    if !reduces_position(position, base.base_asset_quantity) {
                        return Err(OrderError::ReduceOnlyQuantityInvalid);
                    }
                }
                if self.state.order_status(OrderKind::Ioc, hash) != OrderStatus::Invalid {
                    return Err(OrderError::OrderAlreadyExists);
                }
                Ok(())
            };
            if let Err(err) = check() {
                debug!(%trader, index, order_hash = %hash, error = %err, "ioc batch rejected");
                return Err(err);
            }
            hashes.push(hash);
        }

        trace!(%trader, count = hashes.len(), "ioc batch accepted");
        Ok(hashes)
    }

    /// Margin a non reduce-only order must reserve. Shorts priced under the
    /// upper band are charged at the band. `None` when it overflows `int256`.
    pub fn required_margin_for(&self, base: &BaseOrder) -> Option<I256> {
        let mut price = base.price;
        let band = self.state.price_bounds(base.market_id);
        if base.base_asset_quantity.is_negative() && price < band.upper {
            price = band.upper;
        }
        required_margin(
            price,
            base.base_asset_quantity,
            self.state.min_allowable_margin(),
            self.state.taker_fee(),
        )
    }

    pub(super) fn check_signed_order(&self, order: &SignedOrder, hash: B256) -> Result<(), OrderError> {
        if order.order_type != OrderKind::Signed.tag() {
            return Err(OrderError::NotSignedOrder);
        }
        if order.expire_at.as_secs() < self.state.block_timestamp() {
            return Err(OrderError::SignedOrderExpired);
        }
        if !order.post_only {
            return Err(OrderError::NotPostOnly);
        }
        let signer = self
            .recovery
            .recover(hash, &order.signature)
            .ok_or(OrderError::InvalidSignature)?;
        self.check_authority(order.base.trader, signer)
    }

    // 8.2: shared placement checks. returns the reserve amount.
    // sender is None when authority was already settled by a signature
    fn check_placement(
        &self,
        kind: OrderKind,
        hash: B256,
        base: &BaseOrder,
        post_only: bool,
        sender: Option<Address>,
        market_out: &mut Option<Address>,
    ) -> Result<I256, OrderError> {
        let market = base.market_id;
        let trader = base.trader;
        let quantity = base.base_asset_quantity;

        if !base.price.is_positive() {
            return Err(OrderError::InvalidPrice);
        }
        if let Some(sender) = sender {
            self.check_authority(trader, sender)?;
        }

        *market_out = Some(self.state.market_address(market).ok_or(OrderError::InvalidMarket)?);

        if quantity.is_zero() {
            return Err(OrderError::BaseAssetQuantityZero);
        }
        if !is_multiple_of(quantity, self.state.min_size_requirement(market)) {
            return Err(OrderError::NotMultipleOfMinSize);
        }
        if self.state.order_status(kind, hash) != OrderStatus::Invalid {
            return Err(OrderError::OrderAlreadyExists);
        }

        let position = self.state.position_size(market, trader);
        let reduce_only_amount = self.state.reduce_only_amount(trader, market);
        // reduce-only orders left behind by a liquidation or a flip
        let stale = (position.is_zero() && !reduce_only_amount.is_zero())
            || (!position.is_zero() && sign(position) * sign(reduce_only_amount) > 0);
        if stale {
            return Err(OrderError::StaleReduceOnlyOrders);
        }

        let mut reserve_amount = I256::ZERO;
        if base.reduce_only {
            if !reduces_position(position, quantity) {
                return Err(OrderError::ReduceOnlyQuantityInvalid);
            }
            let long_open = self.state.long_open_orders_amount(trader, market);
            let short_open = self.state.short_open_orders_amount(trader, market);
            if (quantity.is_positive() && !long_open.is_zero()) || (quantity.is_negative() && !short_open.is_zero()) {
                return Err(OrderError::OpenOrders);
            }
            let net = reduce_only_amount.checked_add(quantity).and_then(|net| net.checked_abs());
            if net.map_or(true, |net| net > position.abs()) {
                return Err(OrderError::NetReduceOnlyExceeded);
            }
        } else {
            if !reduce_only_amount.is_zero() && sign(quantity) != sign(position) {
                return Err(OrderError::OpenReduceOnlyOrders);
            }
            let available = self.state.available_margin(trader);
            let Some(required) = self.required_margin_for(base) else {
                debug!(%trader, %available, price = %base.price, "required margin overflows");
                return Err(OrderError::InsufficientMargin);
            };
            if available < required {
                debug!(%trader, %available, %required, "margin short for new order");
                return Err(OrderError::InsufficientMargin);
            }
            reserve_amount = required;
        }

        if post_only {
            let bid = self.state.best_bid(market);
            let ask = self.state.best_ask(market);
            let crosses = (quantity.is_negative() && !bid.is_zero() && base.price <= bid)
                || (quantity.is_positive() && !ask.is_zero() && base.price >= ask);
            if crosses {
                return Err(OrderError::CrossingMarket);
            }
        }

        if !self.state.has_referrer(trader) {
            return Err(OrderError::NoReferrer);
        }
        if !is_multiple_of(base.price, self.state.price_multiplier(market)) {
            return Err(OrderError::PricePrecision);
        }
        Ok(reserve_amount)
    }

    fn finish_placement(
        &self,
        mut response: PlaceOrderResponse,
        outcome: Result<I256, OrderError>,
        kind: OrderKind,
    ) -> PlaceOrderResponse {
        match outcome {
            Ok(reserve_amount) => {
                trace!(order_hash = %response.order_hash, %kind, %reserve_amount, "placement accepted");
                response.reserve_amount = reserve_amount;
            }
            Err(err) => {
                debug!(order_hash = %response.order_hash, %kind, error = %err, "placement rejected");
                response.error = Some(err);
            }
        }
        response
    }
}
