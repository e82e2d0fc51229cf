//! Hubble juror simulation.
//!
//! Runs a handful of end to end scenarios against the in-memory snapshot:
//! placement, maker/taker resolution, IOC tie-breaks, cancellation, and a
//! liquidation found by the scanner and filled against a resting order.
//! Set `RUST_LOG=hubble_core=trace` to watch every decision.

use alloy_primitives::{Address, I256, U256};
use hubble_core::config::to_scaled;
use hubble_core::margin::notional_position;
use hubble_core::math::from_i128;
use hubble_core::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::error::Error;
use tracing_subscriber::EnvFilter;

type SimResult = Result<(), Box<dyn Error>>;

const ETH: MarketId = MarketId(0);

fn main() -> SimResult {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("Hubble Juror Simulation");
    println!("ETH-PERP, USDC collateral, in-memory settlement\n");

    scenario_1_placement()?;
    scenario_2_maker_taker()?;
    scenario_3_same_block_ioc()?;
    scenario_4_cancel_filled()?;
    scenario_5_liquidation()?;
    scenario_6_notional();

    println!("\nAll simulations completed successfully.");
    Ok(())
}

fn trader(byte: u8) -> Address {
    Address::with_last_byte(byte)
}

fn usd(value: Decimal) -> Result<I256, ConfigError> {
    to_scaled(value, 6)
}

fn base_units(value: Decimal) -> Result<I256, ConfigError> {
    to_scaled(value, 18)
}

fn limit(owner: Address, quantity: Decimal, price: Decimal, salt: u64) -> Result<LimitOrder, ConfigError> {
    Ok(LimitOrder {
        base: BaseOrder {
            market_id: ETH,
            trader: owner,
            base_asset_quantity: base_units(quantity)?,
            price: usd(price)?,
            salt: U256::from(salt),
            reduce_only: false,
        },
        post_only: false,
    })
}

fn exchange(oracle: Decimal) -> Result<MemoryState, Box<dyn Error>> {
    let mut state = MemoryState::new(&Environment::Development.config())?;
    state.set_oracle_price(ETH, usd(oracle)?)?;
    Ok(state)
}

fn fund(state: &mut MemoryState, owner: Address, amount: Decimal) -> SimResult {
    state.deposit(owner, 0, usd(amount)?)?;
    state.register_referrer(owner);
    Ok(())
}

/// Validates and, when accepted, rests a limit order.
fn place(state: &mut MemoryState, order: &LimitOrder) -> Result<PlaceOrderResponse, Box<dyn Error>> {
    let response = Juror::new(&*state).validate_place_limit_order(order, order.base.trader);
    let response = response.into_result()?;
    state.place_limit_order(order, &response)?;
    Ok(response)
}

/// Margin reservation for a fresh long.
fn scenario_1_placement() -> SimResult {
    println!("Scenario 1: Limit Order Placement\n");

    let mut state = exchange(dec!(1000))?;
    let alice = trader(0xa1);
    fund(&mut state, alice, dec!(10000))?;

    let order = limit(alice, dec!(5), dec!(1000), 1)?;
    let response = place(&mut state, &order)?;

    println!("  Alice deposits $10,000 and bids 5 ETH @ $1,000");
    println!("  Order hash: {}", response.order_hash);
    println!("  Reserved margin: {} (1e6 scaled)", response.reserve_amount);
    println!("  Available margin after: {}\n", state.available_margin(alice));
    Ok(())
}

/// The order placed in the earlier block makes.
fn scenario_2_maker_taker() -> SimResult {
    println!("Scenario 2: Maker / Taker by Block\n");

    let mut state = exchange(dec!(100))?;
    let (alice, bob) = (trader(0xa1), trader(0xb0));
    fund(&mut state, alice, dec!(1000))?;
    fund(&mut state, bob, dec!(1000))?;

    state.set_block(10, 1_700_000_000);
    let long = limit(alice, dec!(1), dec!(100), 1)?;
    place(&mut state, &long)?;

    state.set_block(12, 1_700_000_004);
    let short = limit(bob, dec!(-1), dec!(90), 2)?;
    place(&mut state, &short)?;

    let fill = base_units(dec!(1))?;
    let long_envelope = Order::from(long).encode_typed();
    let short_envelope = Order::from(short).encode_typed();
    let output = Juror::new(&state).validate_orders_and_determine_fill_price([&long_envelope, &short_envelope], fill)?;
    state.settle_match(&output)?;

    println!("  Alice bids 1 ETH @ $100 in block 10, Bob offers @ $90 in block 12");
    println!("  Fill price: {}", output.fill_price);
    println!("  Alice: {:?}, Bob: {:?}", output.instructions[0].mode, output.instructions[1].mode);
    println!("  Alice position: {}", state.position_size(ETH, alice));
    println!("  Bob position: {}\n", state.position_size(ETH, bob));
    Ok(())
}

/// An IOC short in the same block as a resting long leaves the long as maker.
fn scenario_3_same_block_ioc() -> SimResult {
    println!("Scenario 3: Same Block IOC\n");

    let mut state = exchange(dec!(100))?;
    let (carol, dave) = (trader(0xc0), trader(0xd0));
    fund(&mut state, carol, dec!(1000))?;
    fund(&mut state, dave, dec!(1000))?;

    state.set_block(20, 1_700_000_100);
    let long = limit(carol, dec!(2), dec!(101), 3)?;
    place(&mut state, &long)?;

    let ioc = IocOrder {
        order_type: OrderKind::Ioc.tag(),
        expire_at: Timestamp::from_secs(1_700_000_103),
        base: BaseOrder {
            market_id: ETH,
            trader: dave,
            base_asset_quantity: base_units(dec!(-2))?,
            price: usd(dec!(99))?,
            salt: U256::from(4u64),
            reduce_only: false,
        },
    };
    let batch = [ioc.clone()];
    let hashes = Juror::new(&state).validate_place_ioc_orders(&batch, dave)?;
    state.place_ioc_orders(&batch)?;

    let fill = base_units(dec!(2))?;
    let long_envelope = Order::from(long).encode_typed();
    let ioc_envelope = Order::from(ioc).encode_typed();
    let output = Juror::new(&state).validate_orders_and_determine_fill_price([&long_envelope, &ioc_envelope], fill)?;
    state.settle_match(&output)?;

    println!("  Carol bids 2 ETH @ $101, Dave sends IOC offer @ $99, same block");
    println!("  IOC hash: {}", hashes[0]);
    println!("  Carol: {:?}, fill price: {}\n", output.instructions[0].mode, output.fill_price);
    Ok(())
}

/// Cancelling a filled order reports its status.
fn scenario_4_cancel_filled() -> SimResult {
    println!("Scenario 4: Cancel After Fill\n");

    let mut state = exchange(dec!(100))?;
    let (alice, bob) = (trader(0xa1), trader(0xb0));
    fund(&mut state, alice, dec!(1000))?;
    fund(&mut state, bob, dec!(1000))?;

    let long = limit(alice, dec!(1), dec!(100), 5)?;
    place(&mut state, &long)?;
    state.advance_block(2);
    let short = limit(bob, dec!(-1), dec!(100), 6)?;
    place(&mut state, &short)?;

    let fill = base_units(dec!(1))?;
    let envelopes = [Order::from(long.clone()).encode_typed(), Order::from(short).encode_typed()];
    let output = Juror::new(&state).validate_orders_and_determine_fill_price([&envelopes[0], &envelopes[1]], fill)?;
    state.settle_match(&output)?;

    let cancel = Juror::new(&state).validate_cancel_limit_order(&long, alice, false);
    match &cancel.error {
        Some(err) => println!("  Cancel rejected: \"{}\", unfilled {}\n", err, cancel.unfilled_amount),
        None => println!("  Cancel unexpectedly accepted\n"),
    }
    Ok(())
}

/// Price falls, the scanner flags the account, a resting bid absorbs the position.
fn scenario_5_liquidation() -> SimResult {
    println!("Scenario 5: Liquidation\n");

    let mut state = exchange(dec!(100))?;
    let (eve, frank) = (trader(0xe0), trader(0xf0));
    fund(&mut state, eve, dec!(150))?;
    fund(&mut state, frank, dec!(1000))?;
    state.set_position(eve, ETH, Position::new(base_units(dec!(10))?, usd(dec!(1000))?))?;

    state.set_oracle_price(ETH, usd(dec!(90))?)?;
    state.set_last_price(ETH, usd(dec!(90))?)?;

    let liquidable = state.liquidable_positions();
    let Some(target) = liquidable.first() else {
        println!("  Nothing to liquidate\n");
        return Ok(());
    };
    println!("  ETH drops to $90, Eve (10 ETH long, $150 margin) is under maintenance");
    println!("  Margin fraction: {}, threshold: {}", target.margin_fraction, target.liquidation_threshold);

    let min_size = state.min_size_requirement(ETH);
    let amount = target.liquidation_threshold.abs() - target.liquidation_threshold.abs() % min_size;

    let bid = LimitOrder {
        base: BaseOrder {
            base_asset_quantity: amount,
            ..limit(frank, Decimal::ONE, dec!(90), 7)?.base
        },
        post_only: false,
    };
    place(&mut state, &bid)?;

    let envelope = Order::from(bid).encode_typed();
    let output = Juror::new(&state).validate_liquidation_order_and_determine_fill_price(&envelope, amount)?;
    state.settle_liquidation(&output, target.trader)?;

    println!("  Frank's bid absorbs {} at {}", output.fill_amount, output.fill_price);
    println!("  Eve position after: {}\n", state.position_size(ETH, eve));
    Ok(())
}

fn scenario_6_notional() {
    println!("Scenario 6: Notional\n");
    let size = from_i128(-5) * ONE_E18;
    let price = from_i128(20) * ONE_E6;
    println!("  notional(-5 @ 20) = {}", notional_position(price, size));
}
