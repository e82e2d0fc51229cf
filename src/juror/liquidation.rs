//! Matching a resting order against a liquidation.

use super::core::Juror;
use super::matching::MatchSide;
use super::results::{LiquidationMatchOutput, OrderError};
use crate::crypto::SignerRecovery;
use crate::math::{is_multiple_of, max, min};
use crate::state::StateAccessor;
use crate::types::{ExecutionMode, Side};
use alloy_primitives::I256;
use tracing::{debug, trace};

impl<'a, S: StateAccessor + ?Sized, R: SignerRecovery> Juror<'a, S, R> {
    /// `order` is a typed envelope. `liquidation_amount` is a magnitude; the
    /// returned fill amount carries the order's sign. The order is always the maker.
    pub fn validate_liquidation_order_and_determine_fill_price(
        &self,
        order: &[u8],
        liquidation_amount: I256,
    ) -> Result<LiquidationMatchOutput, OrderError> {
        let outcome = self.match_liquidation(order, liquidation_amount);
        match &outcome {
            Ok(output) => trace!(
                order_hash = %output.instruction.order_hash,
                fill_price = %output.fill_price,
                fill_amount = %output.fill_amount,
                "liquidation match accepted"
            ),
            Err(err) => debug!(%liquidation_amount, error = %err, "liquidation match rejected"),
        }
        outcome
    }

    fn match_liquidation(&self, order: &[u8], liquidation_amount: I256) -> Result<LiquidationMatchOutput, OrderError> {
        if !liquidation_amount.is_positive() {
            return Err(OrderError::InvalidFillAmount);
        }

        let (metadata, encoded_order) = self.validate_encoded_order(order, MatchSide::Liquidation, liquidation_amount)?;

        let side = Side::from_quantity(metadata.base_asset_quantity).ok_or(OrderError::NoMatch)?;
        let fill_amount = side.apply(liquidation_amount);
        if !is_multiple_of(fill_amount, self.state.min_size_requirement(metadata.market_id)) {
            return Err(OrderError::NotMultipleOfMinSize);
        }

        let liquidation_band = self.state.liquidation_bounds(metadata.market_id);
        let band = self.state.price_bounds(metadata.market_id);
        // a long order takes over a liquidated long and the reverse
        let fill_price = if metadata.base_asset_quantity.is_positive() {
            if metadata.price < liquidation_band.lower {
                return Err(OrderError::PriceBelowLowerBound);
            }
            min(metadata.price, band.upper)
        } else {
            if metadata.price > liquidation_band.upper {
                return Err(OrderError::PriceAboveUpperBound);
            }
            max(metadata.price, band.lower)
        };

        Ok(LiquidationMatchOutput {
            instruction: metadata.instruction(ExecutionMode::Maker),
            order_kind: metadata.kind,
            encoded_order,
            fill_price,
            fill_amount,
        })
    }
}
