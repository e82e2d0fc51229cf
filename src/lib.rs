// hubble-core: juror for the Hubble perpetuals order book.
// validates placements, cancels, two-order matches and liquidation matches, computes
// margin, and scans for liquidable accounts. all computation is deterministic with no I/O.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: MarketId, Side, OrderKind, OrderStatus, PriceBand, Timestamp
//   1.5  math.rs: I256 fixed point helpers, truncating division
//   2.x  order.rs: limit, IOC and signed orders, OrderRecord lifecycle
//   2.2  codec.rs: ABI field encoding, typed envelope, EIP-712 digest
//   2.3  crypto.rs: signing domain, signer recovery
//   3.x  margin.rs: collateral, notional, pnl, margin fraction, available margin
//   4.x  state.rs: StateAccessor, the read-only snapshot the juror consumes
//   6.x  liquidation.rs: liquidable account scan and thresholds
//   7.x  config.rs: risk, markets, collateral, env presets
//   8.x  juror/: placement, cancel, matching and liquidation checks
//   9.x  memory.rs: in-memory snapshot and settlement

// order model
pub mod codec;
pub mod crypto;
pub mod order;
pub mod types;

// accounting and risk
pub mod liquidation;
pub mod margin;
pub mod math;

// validation
pub mod juror;
pub mod state;

// integration
pub mod config;
pub mod memory;

// re exports for convenience
pub use codec::CodecError;
pub use config::{ConfigError, Environment, ExchangeConfig};
pub use crypto::{EcdsaRecovery, OrderDomain, SignerRecovery};
pub use juror::*;
pub use liquidation::{find_liquidable_positions, liquidation_threshold, LiquidablePosition, ScanParams};
pub use margin::{HubbleState, MarginMode, Position, UserState};
pub use memory::{MemoryState, StateError};
pub use order::*;
pub use state::StateAccessor;
pub use types::*;
