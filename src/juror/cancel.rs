//! Order cancellation checks.

use super::core::Juror;
use super::results::{CancelOrderResponse, OrderError};
use crate::crypto::SignerRecovery;
use crate::order::LimitOrder;
use crate::state::StateAccessor;
use crate::types::{OrderKind, OrderStatus};
use alloy_primitives::{Address, I256};
use tracing::{debug, trace};

impl<'a, S: StateAccessor + ?Sized, R: SignerRecovery> Juror<'a, S, R> {
    /// Ordinary cancels come from the trader or a delegate. Forced cancels
    /// (`assert_low_margin`) come from a validator and only go through while
    /// the trader's available margin is negative.
    pub fn validate_cancel_limit_order(
        &self,
        order: &LimitOrder,
        sender: Address,
        assert_low_margin: bool,
    ) -> CancelOrderResponse {
        let order_hash = order.hash();
        let mut response = CancelOrderResponse {
            order_hash,
            market: self.state.market_address(order.base.market_id),
            unfilled_amount: I256::ZERO,
            error: None,
        };

        match self.check_cancel(order, sender, assert_low_margin) {
            Ok(unfilled_amount) => {
                trace!(%order_hash, %unfilled_amount, assert_low_margin, "cancel accepted");
                response.unfilled_amount = unfilled_amount;
            }
            Err(err) => {
                debug!(%order_hash, %sender, error = %err, "cancel rejected");
                response.error = Some(err);
            }
        }
        response
    }

    fn check_cancel(&self, order: &LimitOrder, sender: Address, assert_low_margin: bool) -> Result<I256, OrderError> {
        let trader = order.base.trader;
        let hash = order.hash();

        let authorized = if assert_low_margin {
            self.state.is_validator(sender)
        } else {
            trader == sender || self.state.is_trading_authority(trader, sender)
        };
        if !authorized {
            return Err(OrderError::NoTradingAuthority);
        }

        let status = self.state.order_status(OrderKind::Limit, hash);
        if status != OrderStatus::Placed {
            return Err(OrderError::Status(status));
        }

        if assert_low_margin && !self.state.available_margin(trader).is_negative() {
            return Err(OrderError::NotLowMargin);
        }

        let filled = self.state.order_filled_amount(OrderKind::Limit, hash);
        Ok(order.base.base_asset_quantity - filled)
    }
}
