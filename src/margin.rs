//! Margin and collateral accounting.
//!
//! Pure functions over explicit inputs: the market/risk snapshot (`HubbleState`)
//! and one account (`UserState`). Nothing here reads global state.
//!
//! Margin fraction is `(margin + unrealized pnl) * 1e6 / notional`. It is NOT
//! clamped at zero: liquidation scanning depends on seeing negative fractions.
//! For every open position the engine evaluates pnl at both the last traded
//! price and the oracle price and keeps the one that suits the context:
//! the higher margin fraction when deciding liquidations, the lower one when
//! deciding how much margin is free for new orders.

use crate::math::{div_1e18, div_1e6, from_u64, mul_1e6, unscale};
use crate::types::MarketId;
use alloy_primitives::I256;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which requirement a margin computation is answering to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarginMode {
    /// Liquidation context. Benefit of the doubt goes to the trader.
    MaintenanceMargin,
    /// New order context. Conservative about free margin.
    MinAllowableMargin,
}

/// Oracle inputs for one collateral asset. Read-only to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collateral {
    /// 1e6 scaled price.
    pub price: I256,
    /// 1e6 scaled, at most 1e6.
    pub weight: I256,
    pub decimals: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// 1e18 scaled, signed.
    pub size: I256,
    /// 1e6 scaled.
    pub open_notional: I256,
}

impl Position {
    pub fn new(size: I256, open_notional: I256) -> Self {
        Self { size, open_notional }
    }

    pub fn is_open(&self) -> bool {
        !self.size.is_zero()
    }

    /// Applies a signed fill of `delta` at `price`. Returns realized pnl.
    ///
    /// Increasing adds to open notional, reducing releases it pro rata,
    /// flipping closes everything and reopens the remainder at `price`.
    pub fn apply_fill(&mut self, delta: I256, price: I256) -> I256 {
        let fill_notional = notional_position(price, delta);
        if self.size.is_zero() || self.size.is_negative() == delta.is_negative() {
            self.size = self.size.saturating_add(delta);
            self.open_notional = self.open_notional.saturating_add(fill_notional);
            return I256::ZERO;
        }

        if delta.abs() <= self.size.abs() {
            let released = self.open_notional.saturating_mul(delta.abs()) / self.size.abs();
            let realized = if self.size.is_positive() {
                fill_notional - released
            } else {
                released - fill_notional
            };
            self.size = self.size + delta;
            self.open_notional = if self.size.is_zero() {
                I256::ZERO
            } else {
                self.open_notional - released
            };
            return realized;
        }

        let close_notional = notional_position(price, self.size);
        let realized = if self.size.is_positive() {
            close_notional - self.open_notional
        } else {
            self.open_notional - close_notional
        };
        self.size = self.size + delta;
        self.open_notional = notional_position(price, self.size);
        realized
    }
}

// 3.0: everything market-wide the margin math needs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubbleState {
    pub assets: Vec<Collateral>,
    pub oracle_prices: BTreeMap<MarketId, I256>,
    /// Last traded price per market.
    pub last_prices: BTreeMap<MarketId, I256>,
    pub active_markets: Vec<MarketId>,
    pub min_allowable_margin: I256,
    pub maintenance_margin: I256,
}

// 3.1: one account's margin inputs. margins are indexed like HubbleState::assets
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserState {
    pub positions: BTreeMap<MarketId, Position>,
    pub margins: Vec<I256>,
    pub pending_funding: I256,
    pub reserved_margin: I256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionMetadata {
    pub notional: I256,
    pub unrealized_pnl: I256,
    pub margin_fraction: I256,
}

impl PositionMetadata {
    fn flat() -> Self {
        Self {
            notional: I256::ZERO,
            unrealized_pnl: I256::ZERO,
            margin_fraction: I256::ZERO,
        }
    }
}

/// Margin fraction reported for an account with no notional exposure.
pub fn max_margin_fraction() -> I256 {
    from_u64(i64::MAX as u64)
}

/// Returns `(weighted, spot)` collateral value in 1e6 units.
///
/// Assets with a zero or missing balance are skipped.
pub fn weighted_and_spot_collateral(assets: &[Collateral], amounts: &[I256]) -> (I256, I256) {
    let mut weighted = I256::ZERO;
    let mut spot = I256::ZERO;
    for (asset, amount) in assets.iter().zip(amounts.iter()) {
        if amount.is_zero() {
            continue;
        }
        // amount carries the asset's own decimals
        let numerator = amount.saturating_mul(asset.price);
        spot = spot.saturating_add(unscale(numerator, asset.decimals));
        weighted = weighted.saturating_add(unscale(numerator.saturating_mul(asset.weight), asset.decimals + 6));
    }
    (weighted, spot)
}

pub fn normalized_margin(assets: &[Collateral], amounts: &[I256]) -> I256 {
    weighted_and_spot_collateral(assets, amounts).0
}

/// `|size * price| / 1e18`, saturating at the I256 range.
pub fn notional_position(price: I256, size: I256) -> I256 {
    div_1e18(size.saturating_mul(price)).abs()
}

pub fn position_metadata(price: I256, open_notional: I256, size: I256, margin: I256) -> PositionMetadata {
    let notional = notional_position(price, size);
    if notional.is_zero() {
        return PositionMetadata::flat();
    }
    let unrealized_pnl = if size.is_positive() {
        notional.saturating_sub(open_notional)
    } else {
        open_notional.saturating_sub(notional)
    };
    let margin_fraction = mul_1e6(margin.saturating_add(unrealized_pnl)) / notional;
    PositionMetadata {
        notional,
        unrealized_pnl,
        margin_fraction,
    }
}

/// Picks between the last-price and oracle-price view of a position.
///
/// Ties keep the last-price view.
pub fn optimal_pnl(
    state: &HubbleState,
    position: Option<&Position>,
    margin: I256,
    market: MarketId,
    mode: MarginMode,
) -> PositionMetadata {
    let Some(position) = position.filter(|p| p.is_open()) else {
        return PositionMetadata::flat();
    };

    let last_price = state.last_prices.get(&market).copied().unwrap_or(I256::ZERO);
    let oracle_price = state.oracle_prices.get(&market).copied().unwrap_or(I256::ZERO);

    let last_based = position_metadata(last_price, position.open_notional, position.size, margin);
    let oracle_based = position_metadata(oracle_price, position.open_notional, position.size, margin);

    let prefer_oracle = match mode {
        MarginMode::MaintenanceMargin => oracle_based.margin_fraction > last_based.margin_fraction,
        MarginMode::MinAllowableMargin => oracle_based.margin_fraction < last_based.margin_fraction,
    };

    if prefer_oracle {
        oracle_based
    } else {
        last_based
    }
}

/// Sums `(notional, unrealized pnl)` over the active markets.
pub fn total_notional_position_and_unrealized_pnl(
    state: &HubbleState,
    user: &UserState,
    margin: I256,
    mode: MarginMode,
) -> (I256, I256) {
    let mut notional = I256::ZERO;
    let mut unrealized_pnl = I256::ZERO;
    for market in &state.active_markets {
        let meta = optimal_pnl(state, user.positions.get(market), margin, *market, mode);
        notional = notional.saturating_add(meta.notional);
        unrealized_pnl = unrealized_pnl.saturating_add(meta.unrealized_pnl);
    }
    (notional, unrealized_pnl)
}

/// Returns `(total notional, margin including unrealized pnl)`.
pub fn notional_position_and_margin(state: &HubbleState, user: &UserState, mode: MarginMode) -> (I256, I256) {
    let margin = normalized_margin(&state.assets, &user.margins).saturating_sub(user.pending_funding);
    let (notional, unrealized_pnl) = total_notional_position_and_unrealized_pnl(state, user, margin, mode);
    (notional, margin.saturating_add(unrealized_pnl))
}

// 3.2: free margin for new orders. may go negative
pub fn available_margin(state: &HubbleState, user: &UserState) -> I256 {
    let (notional, margin) = notional_position_and_margin(state, user, MarginMode::MinAllowableMargin);
    available_margin_from_parts(notional, margin, user.reserved_margin, state.min_allowable_margin)
}

pub fn available_margin_from_parts(
    notional: I256,
    margin: I256,
    reserved_margin: I256,
    min_allowable_margin: I256,
) -> I256 {
    let utilized = div_1e6(notional.saturating_mul(min_allowable_margin));
    margin.saturating_sub(utilized).saturating_sub(reserved_margin)
}

// 3.3: liquidation metric
pub fn margin_fraction(state: &HubbleState, user: &UserState) -> I256 {
    let (notional, margin) = notional_position_and_margin(state, user, MarginMode::MaintenanceMargin);
    if notional.is_zero() {
        return max_margin_fraction();
    }
    mul_1e6(margin) / notional
}

/// Margin to reserve for an order of `quantity` (unsigned) at `price`.
///
/// `None` when the reserve does not fit in an `int256`. Such an order can
/// never be backed by collateral.
pub fn required_margin(price: I256, quantity: I256, min_allowable_margin: I256, taker_fee: I256) -> Option<I256> {
    let quote_asset = div_1e18(quantity.checked_mul(price)?).checked_abs()?;
    let rate = min_allowable_margin.checked_add(taker_fee)?;
    Some(div_1e6(rate.checked_mul(quote_asset)?))
}
