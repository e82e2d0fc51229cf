//! Read-only view of exchange state consumed by the juror.
//!
//! Everything the validators know about markets, accounts and the order books
//! comes through this trait. Implementations answer from a snapshot taken at the
//! start of the enclosing transaction. The juror never writes back.

use crate::crypto::OrderDomain;
use crate::margin::{self, HubbleState, UserState};
use crate::types::{MarketId, OrderKind, OrderStatus, PriceBand};
use alloy_primitives::{Address, B256, I256};

pub trait StateAccessor {
    // 4.0: markets and risk parameters

    /// Contract address of the market at `market`, if one is registered.
    fn market_address(&self, market: MarketId) -> Option<Address>;

    fn active_markets_count(&self) -> u64;

    /// Minimum base asset step, 1e18 scaled.
    fn min_size_requirement(&self, market: MarketId) -> I256;

    /// Price tick, 1e6 scaled.
    fn price_multiplier(&self, market: MarketId) -> I256;

    fn min_allowable_margin(&self) -> I256;

    fn taker_fee(&self) -> I256;

    /// Oracle spread band for ordinary matches.
    fn price_bounds(&self, market: MarketId) -> PriceBand;

    /// Wider band used when matching against a liquidation.
    fn liquidation_bounds(&self, market: MarketId) -> PriceBand;

    // 4.1: account and book

    fn position_size(&self, market: MarketId, trader: Address) -> I256;

    fn reduce_only_amount(&self, trader: Address, market: MarketId) -> I256;

    fn long_open_orders_amount(&self, trader: Address, market: MarketId) -> I256;

    fn short_open_orders_amount(&self, trader: Address, market: MarketId) -> I256;

    /// Zero when the bid side is empty.
    fn best_bid(&self, market: MarketId) -> I256;

    /// Zero when the ask side is empty.
    fn best_ask(&self, market: MarketId) -> I256;

    // 4.2: orders. Limit, IOC and signed orders live in separate books

    fn order_status(&self, kind: OrderKind, hash: B256) -> OrderStatus;

    fn order_filled_amount(&self, kind: OrderKind, hash: B256) -> I256;

    /// Zero for an order that was never placed.
    fn block_placed(&self, kind: OrderKind, hash: B256) -> u64;

    // 4.3: permissions

    fn is_trading_authority(&self, trader: Address, sender: Address) -> bool;

    fn has_referrer(&self, trader: Address) -> bool;

    fn is_validator(&self, sender: Address) -> bool;

    // 4.4: execution context

    /// Current block time, unix seconds.
    fn block_timestamp(&self) -> u64;

    /// How far past the block time an IOC order may expire.
    fn ioc_expiration_cap(&self) -> u64;

    fn order_domain(&self) -> OrderDomain;

    fn hubble_state(&self) -> HubbleState;

    fn user_state(&self, trader: Address) -> UserState;

    fn available_margin(&self, trader: Address) -> I256 {
        margin::available_margin(&self.hubble_state(), &self.user_state(trader))
    }
}
