//! Liquidation scanning.
//!
//! An account is liquidable when its margin fraction, evaluated in
//! maintenance mode (the more favourable of last and oracle price per
//! position), drops below the maintenance margin. Every open position of such
//! an account is reported together with how much of it one liquidation may close.
//! The result is ordered most undercollateralized first; equal fractions keep
//! account order, which makes the output identical on every node.

use crate::margin::{margin_fraction, HubbleState, UserState};
use crate::math::{div_1e6, max, min};
use crate::types::MarketId;
use alloy_primitives::{Address, I256};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidablePosition {
    pub trader: Address,
    pub market: MarketId,
    pub size: I256,
    /// Largest signed size one liquidation may close.
    pub liquidation_threshold: I256,
    pub margin_fraction: I256,
}

#[derive(Debug, Clone, Default)]
pub struct ScanParams {
    /// 1e6 scaled share of a position one liquidation may close.
    pub max_liquidation_ratio: I256,
    pub min_sizes: BTreeMap<MarketId, I256>,
}

/// `max(|size| * ratio / 1e6 + 1, min_size)`, capped at `|size|`, signed like `size`.
pub fn liquidation_threshold(size: I256, max_liquidation_ratio: I256, min_size: I256) -> I256 {
    let abs_size = size.abs();
    let max_liquidation_size = div_1e6(abs_size * max_liquidation_ratio) + I256::ONE;
    let threshold = min(max(max_liquidation_size, min_size), abs_size);
    if size.is_negative() {
        -threshold
    } else {
        threshold
    }
}

pub fn find_liquidable_positions(
    state: &HubbleState,
    accounts: &BTreeMap<Address, UserState>,
    params: &ScanParams,
) -> Vec<LiquidablePosition> {
    let mut liquidable = Vec::new();

    for (trader, user) in accounts {
        if !user.positions.values().any(|position| position.is_open()) {
            continue;
        }
        let fraction = margin_fraction(state, user);
        if fraction >= state.maintenance_margin {
            continue;
        }
        for (market, position) in user.positions.iter().filter(|(_, p)| p.is_open()) {
            let min_size = params.min_sizes.get(market).copied().unwrap_or(I256::ZERO);
            liquidable.push(LiquidablePosition {
                trader: *trader,
                market: *market,
                size: position.size,
                liquidation_threshold: liquidation_threshold(position.size, params.max_liquidation_ratio, min_size),
                margin_fraction: fraction,
            });
        }
    }

    // stable: ties keep account order
    liquidable.sort_by(|a, b| a.margin_fraction.cmp(&b.margin_fraction));
    liquidable
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::margin::{Collateral, Position};
    use crate::math::from_i128;

    const E6: i128 = 1_000_000;
    const E18: i128 = 1_000_000_000_000_000_000;

    fn state() -> HubbleState {
        HubbleState {
            assets: vec![Collateral {
                price: from_i128(E6),
                weight: from_i128(E6),
                decimals: 6,
            }],
            oracle_prices: BTreeMap::from([(MarketId(0), from_i128(100 * E6))]),
            last_prices: BTreeMap::from([(MarketId(0), from_i128(100 * E6))]),
            active_markets: vec![MarketId(0)],
            min_allowable_margin: from_i128(200_000),
            maintenance_margin: from_i128(50_000),
        }
    }

    // one long unit at 100 with no pnl: margin fraction is margin / 100
    fn account(margin: i128) -> UserState {
        UserState {
            positions: BTreeMap::from([(MarketId(0), Position::new(from_i128(E18), from_i128(100 * E6)))]),
            margins: vec![from_i128(margin)],
            ..Default::default()
        }
    }

    fn params() -> ScanParams {
        ScanParams {
            max_liquidation_ratio: from_i128(250_000),
            min_sizes: BTreeMap::from([(MarketId(0), from_i128(E18 / 100))]),
        }
    }

    #[test]
    fn most_undercollateralized_first() {
        let a = Address::with_last_byte(1);
        let b = Address::with_last_byte(2);
        let healthy = Address::with_last_byte(3);
        let flat = Address::with_last_byte(4);
        let accounts = BTreeMap::from([
            (a, account(3 * E6)),
            (b, account(E6)),
            (healthy, account(10 * E6)),
            (flat, UserState { margins: vec![from_i128(0)], ..Default::default() }),
        ]);

        let found = find_liquidable_positions(&state(), &accounts, &params());
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].trader, b);
        assert_eq!(found[0].margin_fraction, from_i128(10_000));
        assert_eq!(found[1].trader, a);
        assert_eq!(found[1].margin_fraction, from_i128(30_000));
        assert_eq!(found[0].liquidation_threshold, from_i128(E18 / 4 + 1));
    }

    #[test]
    fn equal_fractions_keep_account_order() {
        let accounts = BTreeMap::from([
            (Address::with_last_byte(9), account(E6)),
            (Address::with_last_byte(5), account(E6)),
        ]);
        let found = find_liquidable_positions(&state(), &accounts, &params());
        assert_eq!(found[0].trader, Address::with_last_byte(5));
        assert_eq!(found[1].trader, Address::with_last_byte(9));
    }

    #[test]
    fn pending_funding_counts_against_margin() {
        let mut user = account(10 * E6);
        user.pending_funding = from_i128(8 * E6);
        let accounts = BTreeMap::from([(Address::with_last_byte(1), user)]);
        let found = find_liquidable_positions(&state(), &accounts, &params());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].margin_fraction, from_i128(20_000));
    }

    #[test]
    fn threshold_floor_cap_and_sign() {
        let ratio = from_i128(250_000);
        // quarter of 4 units, plus one wei
        assert_eq!(liquidation_threshold(from_i128(4 * E18), ratio, from_i128(E18 / 100)), from_i128(E18 + 1));
        // min size floor
        assert_eq!(liquidation_threshold(from_i128(-E18 / 10), ratio, from_i128(E18 / 20)), from_i128(-E18 / 20));
        // never more than the position
        assert_eq!(liquidation_threshold(from_i128(E18 / 100), ratio, from_i128(E18)), from_i128(E18 / 100));
        assert_eq!(liquidation_threshold(I256::ZERO, ratio, from_i128(E18)), I256::ZERO);
    }
}
