// 9.0 memory.rs: in-memory exchange snapshot. implements StateAccessor for the juror
// and applies accepted decisions (placements, cancels, matches, liquidations) the way the
// order book and clearing house contracts would. BTreeMaps throughout so iteration is ordered.

use crate::codec::{self, CodecError};
use crate::config::{ConfigError, ExchangeConfig, MarketParams, RiskParams};
use crate::crypto::OrderDomain;
use crate::juror::{CancelOrderResponse, LiquidationMatchOutput, MatchOutput, OrderError, PlaceOrderResponse};
use crate::liquidation::{find_liquidable_positions, LiquidablePosition, ScanParams};
use crate::margin::{notional_position, Collateral, HubbleState, Position, UserState};
use crate::math::div_1e6;
use crate::order::{IocOrder, LimitOrder, OrderRecord};
use crate::state::StateAccessor;
use crate::types::{ExecutionMode, MarketId, OrderKind, OrderStatus, PriceBand, ONE_E6};
use alloy_primitives::{Address, B256, I256};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

// Unfilled open order totals for one (trader, market). signed like the orders
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenOrders {
    pub long: I256,
    pub short: I256,
    pub reduce_only: I256,
}

impl OpenOrders {
    fn add(&mut self, quantity: I256, reduce_only: bool) {
        if reduce_only {
            self.reduce_only = self.reduce_only + quantity;
        } else if quantity.is_positive() {
            self.long = self.long + quantity;
        } else {
            self.short = self.short + quantity;
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Account {
    pub state: UserState,
    pub open_orders: BTreeMap<MarketId, OpenOrders>,
}

impl Account {
    fn new(asset_count: usize) -> Self {
        let mut account = Self::default();
        account.state.margins = vec![I256::ZERO; asset_count];
        account
    }
}

// A limit order resting in the book
#[derive(Debug, Clone)]
struct RestingOrder {
    market: MarketId,
    trader: Address,
    price: I256,
    quantity: I256,
    reduce_only: bool,
    // margin still held for the unfilled part
    reserved: I256,
}

// an order record with one fill applied, waiting to be written back
struct StagedFill {
    kind: OrderKind,
    hash: B256,
    trader: Address,
    market: MarketId,
    delta: I256,
    unfilled_before: I256,
    record: OrderRecord,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    #[error("unknown market {0}")]
    UnknownMarket(MarketId),

    #[error("unknown collateral index {0}")]
    UnknownCollateral(usize),

    #[error("order {0} not found")]
    OrderNotFound(B256),

    #[error("rejected decision: {0}")]
    Rejected(OrderError),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Decode(#[from] CodecError),
}

/** 9.1: the whole exchange. one struct, all state */
#[derive(Debug, Clone)]
pub struct MemoryState {
    domain: OrderDomain,
    risk: RiskParams,
    markets: Vec<MarketParams>,
    assets: Vec<Collateral>,
    oracle_prices: BTreeMap<MarketId, I256>,
    last_prices: BTreeMap<MarketId, I256>,
    accounts: BTreeMap<Address, Account>,
    orders: BTreeMap<(OrderKind, B256), OrderRecord>,
    book: BTreeMap<B256, RestingOrder>,
    // (trader, delegate)
    authorities: BTreeSet<(Address, Address)>,
    referrers: BTreeSet<Address>,
    validators: BTreeSet<Address>,
    block_number: u64,
    timestamp: u64,
}

impl MemoryState {
    pub fn new(config: &ExchangeConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            domain: config.order_domain(),
            risk: config.risk_params()?,
            markets: config.market_params()?,
            assets: config.collateral_assets()?,
            oracle_prices: BTreeMap::new(),
            last_prices: BTreeMap::new(),
            accounts: BTreeMap::new(),
            orders: BTreeMap::new(),
            book: BTreeMap::new(),
            authorities: BTreeSet::new(),
            referrers: BTreeSet::new(),
            validators: BTreeSet::new(),
            block_number: 1,
            timestamp: 0,
        })
    }

    // ---- block context ----

    pub fn set_block(&mut self, number: u64, timestamp: u64) {
        self.block_number = number;
        self.timestamp = timestamp;
    }

    /// Moves to the next block, `secs` later.
    pub fn advance_block(&mut self, secs: u64) {
        self.block_number += 1;
        self.timestamp = self.timestamp.saturating_add(secs);
    }

    // ---- prices ----

    pub fn set_oracle_price(&mut self, market: MarketId, price: I256) -> Result<(), StateError> {
        self.market(market)?;
        self.oracle_prices.insert(market, price);
        Ok(())
    }

    pub fn set_last_price(&mut self, market: MarketId, price: I256) -> Result<(), StateError> {
        self.market(market)?;
        self.last_prices.insert(market, price);
        Ok(())
    }

    // ---- accounts and permissions ----

    pub fn deposit(&mut self, trader: Address, collateral: usize, amount: I256) -> Result<(), StateError> {
        if collateral >= self.assets.len() {
            return Err(StateError::UnknownCollateral(collateral));
        }
        let account = self.account_mut(trader);
        account.state.margins[collateral] = account.state.margins[collateral] + amount;
        Ok(())
    }

    pub fn set_pending_funding(&mut self, trader: Address, amount: I256) {
        self.account_mut(trader).state.pending_funding = amount;
    }

    /// Overwrites a position. Used to seed scenarios.
    pub fn set_position(&mut self, trader: Address, market: MarketId, position: Position) -> Result<(), StateError> {
        self.market(market)?;
        let positions = &mut self.account_mut(trader).state.positions;
        if position.is_open() {
            positions.insert(market, position);
        } else {
            positions.remove(&market);
        }
        Ok(())
    }

    pub fn add_trading_authority(&mut self, trader: Address, delegate: Address) {
        self.authorities.insert((trader, delegate));
    }

    pub fn register_referrer(&mut self, trader: Address) {
        self.referrers.insert(trader);
    }

    pub fn add_validator(&mut self, validator: Address) {
        self.validators.insert(validator);
    }

    pub fn account(&self, trader: Address) -> Option<&Account> {
        self.accounts.get(&trader)
    }

    pub fn order(&self, kind: OrderKind, hash: B256) -> Option<&OrderRecord> {
        self.orders.get(&(kind, hash))
    }

    /// Margin state of every known account.
    pub fn user_states(&self) -> BTreeMap<Address, UserState> {
        self.accounts
            .iter()
            .map(|(trader, account)| (*trader, account.state.clone()))
            .collect()
    }

    pub fn liquidable_positions(&self) -> Vec<LiquidablePosition> {
        let params = ScanParams {
            max_liquidation_ratio: self.risk.max_liquidation_ratio,
            min_sizes: self.markets.iter().map(|m| (m.id, m.min_size)).collect(),
        };
        find_liquidable_positions(&self.hubble_state(), &self.user_states(), &params)
    }

    // ---- applying decisions ----

    /// Rests an accepted limit order and reserves its margin.
    pub fn place_limit_order(&mut self, order: &LimitOrder, response: &PlaceOrderResponse) -> Result<(), StateError> {
        if let Some(err) = &response.error {
            return Err(StateError::Rejected(err.clone()));
        }
        let base = &order.base;
        self.market(base.market_id)?;
        let hash = response.order_hash;
        let block = self.block_number;

        let record = self.orders.entry((OrderKind::Limit, hash)).or_default();
        if !record.status.can_transition_to(OrderStatus::Placed) {
            return Err(OrderError::OrderAlreadyExists.into());
        }
        *record = OrderRecord::placed(base.base_asset_quantity, block);

        self.book.insert(
            hash,
            RestingOrder {
                market: base.market_id,
                trader: base.trader,
                price: base.price,
                quantity: base.base_asset_quantity,
                reduce_only: base.reduce_only,
                reserved: response.reserve_amount,
            },
        );
        let account = self.account_mut(base.trader);
        account.state.reserved_margin = account.state.reserved_margin + response.reserve_amount;
        account
            .open_orders
            .entry(base.market_id)
            .or_default()
            .add(base.base_asset_quantity, base.reduce_only);

        info!(order_hash = %hash, trader = %base.trader, market = %base.market_id, block, "limit order placed");
        Ok(())
    }

    /// Records an accepted IOC batch. IOC orders never rest and hold no margin.
    pub fn place_ioc_orders(&mut self, orders: &[IocOrder]) -> Result<(), StateError> {
        let block = self.block_number;
        for order in orders {
            let record = self.orders.entry((OrderKind::Ioc, order.hash())).or_default();
            if !record.status.can_transition_to(OrderStatus::Placed) {
                return Err(OrderError::OrderAlreadyExists.into());
            }
            *record = OrderRecord::placed(order.base.base_asset_quantity, block);
        }
        Ok(())
    }

    /// Cancels an accepted limit order and releases what it still held.
    pub fn cancel_limit_order(&mut self, response: &CancelOrderResponse) -> Result<(), StateError> {
        if let Some(err) = &response.error {
            return Err(StateError::Rejected(err.clone()));
        }
        let hash = response.order_hash;
        let record = self
            .orders
            .get_mut(&(OrderKind::Limit, hash))
            .ok_or(StateError::OrderNotFound(hash))?;
        let unfilled = record.cancel()?;

        if let Some(resting) = self.book.remove(&hash) {
            let account = self.account_mut(resting.trader);
            account.state.reserved_margin = account.state.reserved_margin - resting.reserved;
            account
                .open_orders
                .entry(resting.market)
                .or_default()
                .add(-unfilled, resting.reduce_only);
        }
        info!(order_hash = %hash, %unfilled, "limit order cancelled");
        Ok(())
    }

    /// Settles an accepted two-order match. Both fills are checked before
    /// either is applied, so a rejected settlement leaves the state untouched.
    pub fn settle_match(&mut self, output: &MatchOutput) -> Result<(), StateError> {
        let amount = output.fill_amount.abs();
        let long = self.stage_fill(
            output.order_kinds[0],
            &output.encoded_orders[0],
            output.instructions[0].order_hash,
            amount,
        )?;
        let short = self.stage_fill(
            output.order_kinds[1],
            &output.encoded_orders[1],
            output.instructions[1].order_hash,
            -amount,
        )?;

        self.commit_fill(long, output.fill_price, output.instructions[0].mode);
        self.commit_fill(short, output.fill_price, output.instructions[1].mode);
        let market = output.instructions[0].market_id;
        self.last_prices.insert(market, output.fill_price);
        info!(%market, fill_price = %output.fill_price, fill_amount = %amount, "match settled");
        Ok(())
    }

    /// Settles an accepted liquidation match. The liquidated trader takes the
    /// opposite side of the order at the fill price.
    pub fn settle_liquidation(&mut self, output: &LiquidationMatchOutput, liquidated: Address) -> Result<(), StateError> {
        let fill = self.stage_fill(
            output.order_kind,
            &output.encoded_order,
            output.instruction.order_hash,
            output.fill_amount,
        )?;
        self.commit_fill(fill, output.fill_price, ExecutionMode::Maker);
        let market = output.instruction.market_id;
        self.apply_trade(liquidated, market, -output.fill_amount, output.fill_price, ExecutionMode::Taker);
        self.last_prices.insert(market, output.fill_price);
        info!(%liquidated, %market, fill_amount = %output.fill_amount, fill_price = %output.fill_price, "liquidation settled");
        Ok(())
    }

    // fills a copy of the order record. nothing is written until commit_fill
    fn stage_fill(&self, kind: OrderKind, encoded: &[u8], hash: B256, delta: I256) -> Result<StagedFill, StateError> {
        let order = codec::decode_order(kind, encoded)?;
        let base = order.base();
        let mut record = match self.orders.get(&(kind, hash)) {
            Some(record) => record.clone(),
            // signed orders come into existence at their first fill
            None if kind == OrderKind::Signed => OrderRecord::placed(base.base_asset_quantity, 0),
            None => return Err(StateError::OrderNotFound(hash)),
        };
        let unfilled_before = record.unfilled();
        record.fill(delta)?;
        Ok(StagedFill {
            kind,
            hash,
            trader: base.trader,
            market: base.market_id,
            delta,
            unfilled_before,
            record,
        })
    }

    fn commit_fill(&mut self, fill: StagedFill, price: I256, mode: ExecutionMode) {
        let StagedFill {
            kind,
            hash,
            trader,
            market,
            delta,
            unfilled_before,
            record,
        } = fill;
        let filled = record.status == OrderStatus::Filled;
        self.orders.insert((kind, hash), record);

        if let Some(resting) = self.book.get_mut(&hash) {
            let release = if filled {
                resting.reserved
            } else {
                resting.reserved.saturating_mul(delta.abs()) / unfilled_before.abs()
            };
            resting.reserved = resting.reserved - release;
            let (owner, book_market, reduce_only) = (resting.trader, resting.market, resting.reduce_only);
            if filled {
                self.book.remove(&hash);
            }
            let account = self.account_mut(owner);
            account.state.reserved_margin = account.state.reserved_margin - release;
            account.open_orders.entry(book_market).or_default().add(-delta, reduce_only);
        }

        self.apply_trade(trader, market, delta, price, mode);
    }

    // position update plus realized pnl and taker fee, booked to the first collateral
    fn apply_trade(&mut self, trader: Address, market: MarketId, delta: I256, price: I256, mode: ExecutionMode) {
        let taker_fee = self.risk.taker_fee;
        let account = self.account_mut(trader);
        let position = account.state.positions.entry(market).or_default();
        let mut pnl = position.apply_fill(delta, price);
        if !position.is_open() {
            account.state.positions.remove(&market);
        }
        if mode == ExecutionMode::Taker {
            pnl = pnl.saturating_sub(div_1e6(notional_position(price, delta).saturating_mul(taker_fee)));
        }
        if let Some(quote) = account.state.margins.first_mut() {
            *quote = quote.saturating_add(pnl);
        }
        debug!(%trader, %market, %delta, %price, %pnl, "trade applied");
    }

    // ---- helpers ----

    fn market(&self, market: MarketId) -> Result<&MarketParams, StateError> {
        usize::try_from(market.0)
            .ok()
            .and_then(|index| self.markets.get(index))
            .ok_or(StateError::UnknownMarket(market))
    }

    fn account_mut(&mut self, trader: Address) -> &mut Account {
        let asset_count = self.assets.len();
        self.accounts.entry(trader).or_insert_with(|| Account::new(asset_count))
    }

    fn open_orders(&self, trader: Address, market: MarketId) -> OpenOrders {
        self.accounts
            .get(&trader)
            .and_then(|account| account.open_orders.get(&market))
            .copied()
            .unwrap_or_default()
    }

    fn band_around(price: I256, spread: I256) -> PriceBand {
        PriceBand::new(
            div_1e6(price.saturating_mul(ONE_E6 + spread)),
            div_1e6(price.saturating_mul(ONE_E6 - spread)),
        )
    }
}

impl StateAccessor for MemoryState {
    fn market_address(&self, market: MarketId) -> Option<Address> {
        self.market(market).ok().map(|m| m.address)
    }

    fn active_markets_count(&self) -> u64 {
        self.markets.len() as u64
    }

    fn min_size_requirement(&self, market: MarketId) -> I256 {
        self.market(market).map(|m| m.min_size).unwrap_or(I256::ZERO)
    }

    fn price_multiplier(&self, market: MarketId) -> I256 {
        self.market(market).map(|m| m.tick).unwrap_or(I256::ZERO)
    }

    fn min_allowable_margin(&self) -> I256 {
        self.risk.min_allowable_margin
    }

    fn taker_fee(&self) -> I256 {
        self.risk.taker_fee
    }

    fn price_bounds(&self, market: MarketId) -> PriceBand {
        let Ok(params) = self.market(market) else {
            return PriceBand::new(I256::ZERO, I256::ZERO);
        };
        let oracle = self.oracle_prices.get(&market).copied().unwrap_or(I256::ZERO);
        Self::band_around(oracle, params.max_oracle_spread)
    }

    // around the mark price, falling back to the oracle before the first trade
    fn liquidation_bounds(&self, market: MarketId) -> PriceBand {
        let Ok(params) = self.market(market) else {
            return PriceBand::new(I256::ZERO, I256::ZERO);
        };
        let mark = match self.last_prices.get(&market) {
            Some(price) if !price.is_zero() => *price,
            _ => self.oracle_prices.get(&market).copied().unwrap_or(I256::ZERO),
        };
        Self::band_around(mark, params.max_liquidation_spread)
    }

    fn position_size(&self, market: MarketId, trader: Address) -> I256 {
        self.accounts
            .get(&trader)
            .and_then(|account| account.state.positions.get(&market))
            .map(|position| position.size)
            .unwrap_or(I256::ZERO)
    }

    fn reduce_only_amount(&self, trader: Address, market: MarketId) -> I256 {
        self.open_orders(trader, market).reduce_only
    }

    fn long_open_orders_amount(&self, trader: Address, market: MarketId) -> I256 {
        self.open_orders(trader, market).long
    }

    fn short_open_orders_amount(&self, trader: Address, market: MarketId) -> I256 {
        self.open_orders(trader, market).short
    }

    fn best_bid(&self, market: MarketId) -> I256 {
        self.book
            .values()
            .filter(|order| order.market == market && order.quantity.is_positive())
            .map(|order| order.price)
            .max()
            .unwrap_or(I256::ZERO)
    }

    fn best_ask(&self, market: MarketId) -> I256 {
        self.book
            .values()
            .filter(|order| order.market == market && order.quantity.is_negative())
            .map(|order| order.price)
            .min()
            .unwrap_or(I256::ZERO)
    }

    fn order_status(&self, kind: OrderKind, hash: B256) -> OrderStatus {
        self.order(kind, hash).map(|r| r.status).unwrap_or_default()
    }

    fn order_filled_amount(&self, kind: OrderKind, hash: B256) -> I256 {
        self.order(kind, hash).map(|r| r.filled_amount).unwrap_or(I256::ZERO)
    }

    fn block_placed(&self, kind: OrderKind, hash: B256) -> u64 {
        self.order(kind, hash).map(|r| r.block_placed).unwrap_or(0)
    }

    fn is_trading_authority(&self, trader: Address, sender: Address) -> bool {
        self.authorities.contains(&(trader, sender))
    }

    fn has_referrer(&self, trader: Address) -> bool {
        self.referrers.contains(&trader)
    }

    fn is_validator(&self, sender: Address) -> bool {
        self.validators.contains(&sender)
    }

    fn block_timestamp(&self) -> u64 {
        self.timestamp
    }

    fn ioc_expiration_cap(&self) -> u64 {
        self.risk.ioc_expiration_cap
    }

    fn order_domain(&self) -> OrderDomain {
        self.domain
    }

    // markets that have not traded yet are marked at the oracle
    fn hubble_state(&self) -> HubbleState {
        let mut last_prices = self.oracle_prices.clone();
        last_prices.extend(self.last_prices.iter().filter(|(_, price)| !price.is_zero()));
        HubbleState {
            assets: self.assets.clone(),
            oracle_prices: self.oracle_prices.clone(),
            last_prices,
            active_markets: self.markets.iter().map(|m| m.id).collect(),
            min_allowable_margin: self.risk.min_allowable_margin,
            maintenance_margin: self.risk.maintenance_margin,
        }
    }

    fn user_state(&self, trader: Address) -> UserState {
        match self.accounts.get(&trader) {
            Some(account) => account.state.clone(),
            None => Account::new(self.assets.len()).state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::from_i128;

    const E6: i128 = 1_000_000;
    const E18: i128 = 1_000_000_000_000_000_000;

    fn state() -> MemoryState {
        let mut state = MemoryState::new(&ExchangeConfig::default()).unwrap();
        state.set_oracle_price(MarketId(0), from_i128(100 * E6)).unwrap();
        state
    }

    #[test]
    fn bands_follow_oracle_and_mark() {
        let mut state = state();
        // default spreads: 20% oracle, 5% liquidation
        assert_eq!(
            state.price_bounds(MarketId(0)),
            PriceBand::new(from_i128(120 * E6), from_i128(80 * E6))
        );
        assert_eq!(
            state.liquidation_bounds(MarketId(0)),
            PriceBand::new(from_i128(105 * E6), from_i128(95 * E6))
        );
        state.set_last_price(MarketId(0), from_i128(200 * E6)).unwrap();
        assert_eq!(state.liquidation_bounds(MarketId(0)).upper, from_i128(210 * E6));
        assert_eq!(state.price_bounds(MarketId(9)), PriceBand::new(I256::ZERO, I256::ZERO));
    }

    #[test]
    fn unknown_market_and_collateral() {
        let mut state = state();
        assert_eq!(
            state.set_oracle_price(MarketId(7), I256::ONE),
            Err(StateError::UnknownMarket(MarketId(7)))
        );
        assert_eq!(
            state.deposit(Address::ZERO, 3, I256::ONE),
            Err(StateError::UnknownCollateral(3))
        );
        assert_eq!(state.market_address(MarketId(7)), None);
        assert_eq!(state.active_markets_count(), 2);
    }

    #[test]
    fn deposits_show_up_as_available_margin() {
        let mut state = state();
        let trader = Address::with_last_byte(1);
        assert_eq!(state.available_margin(trader), I256::ZERO);
        state.deposit(trader, 0, from_i128(1_000 * E6)).unwrap();
        assert_eq!(state.available_margin(trader), from_i128(1_000 * E6));
    }

    #[test]
    fn place_and_cancel_track_book_and_reserve() {
        let mut state = state();
        let trader = Address::with_last_byte(1);
        let order = crate::order::LimitOrder {
            base: crate::order::BaseOrder {
                market_id: MarketId(0),
                trader,
                base_asset_quantity: from_i128(2 * E18),
                price: from_i128(99 * E6),
                salt: alloy_primitives::U256::from(1u64),
                reduce_only: false,
            },
            post_only: false,
        };
        let mut response = PlaceOrderResponse::new(order.hash());
        response.reserve_amount = from_i128(40 * E6);
        state.place_limit_order(&order, &response).unwrap();

        assert_eq!(state.best_bid(MarketId(0)), from_i128(99 * E6));
        assert_eq!(state.best_ask(MarketId(0)), I256::ZERO);
        assert_eq!(state.long_open_orders_amount(trader, MarketId(0)), from_i128(2 * E18));
        assert_eq!(state.user_state(trader).reserved_margin, from_i128(40 * E6));
        assert_eq!(state.order_status(OrderKind::Limit, order.hash()), OrderStatus::Placed);
        assert_eq!(state.block_placed(OrderKind::Limit, order.hash()), 1);
        assert!(matches!(
            state.place_limit_order(&order, &response),
            Err(StateError::Order(OrderError::OrderAlreadyExists))
        ));

        let cancel = CancelOrderResponse {
            order_hash: order.hash(),
            market: state.market_address(MarketId(0)),
            unfilled_amount: from_i128(2 * E18),
            error: None,
        };
        state.cancel_limit_order(&cancel).unwrap();
        assert_eq!(state.best_bid(MarketId(0)), I256::ZERO);
        assert_eq!(state.long_open_orders_amount(trader, MarketId(0)), I256::ZERO);
        assert_eq!(state.user_state(trader).reserved_margin, I256::ZERO);
        assert_eq!(state.order_status(OrderKind::Limit, order.hash()), OrderStatus::Cancelled);
    }

    #[test]
    fn rejected_decisions_are_not_applied() {
        let mut state = state();
        let cancel = CancelOrderResponse {
            order_hash: B256::ZERO,
            market: None,
            unfilled_amount: I256::ZERO,
            error: Some(OrderError::NoTradingAuthority),
        };
        assert_eq!(
            state.cancel_limit_order(&cancel),
            Err(StateError::Rejected(OrderError::NoTradingAuthority))
        );
    }
}
