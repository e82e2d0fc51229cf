// 8.0: the juror. validates placements, cancels, matches and liquidation matches
// against a read-only state snapshot. deterministic, no I/O, no writes.

mod cancel;
mod core;
mod liquidation;
mod matching;
mod place;
mod results;

pub use self::core::Juror;
pub use matching::MatchSide;
pub use results::{
    BadElement, CancelOrderResponse, LiquidationMatchOutput, MatchInstruction, MatchOutput, MatchRejection,
    OrderError, PlaceOrderResponse,
};
