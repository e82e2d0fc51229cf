// 8.0 juror/core.rs: the juror struct. borrows a state snapshot, never mutates it.

use super::results::OrderError;
use crate::crypto::{EcdsaRecovery, SignerRecovery};
use crate::state::StateAccessor;
use alloy_primitives::{Address, I256};

/** 8.1: every validation entry point hangs off this. decisions only, no writes */
pub struct Juror<'a, S: StateAccessor + ?Sized, R: SignerRecovery = EcdsaRecovery> {
    pub(super) state: &'a S,
    pub(super) recovery: R,
}

impl<'a, S: StateAccessor + ?Sized> Juror<'a, S> {
    pub fn new(state: &'a S) -> Self {
        Self {
            state,
            recovery: EcdsaRecovery,
        }
    }
}

impl<'a, S: StateAccessor + ?Sized, R: SignerRecovery> Juror<'a, S, R> {
    pub fn with_recovery(state: &'a S, recovery: R) -> Self {
        Self { state, recovery }
    }

    /// `sender` may act for `trader` when it is the trader or a delegate.
    pub(super) fn check_authority(&self, trader: Address, sender: Address) -> Result<(), OrderError> {
        if trader != sender && !self.state.is_trading_authority(trader, sender) {
            return Err(OrderError::NoTradingAuthority);
        }
        Ok(())
    }
}

/// True when `quantity` shrinks `position` without flipping it.
pub(crate) fn reduces_position(position: I256, quantity: I256) -> bool {
    if position.is_positive() && quantity.is_negative() {
        return (position + quantity) >= I256::ZERO;
    }
    if position.is_negative() && quantity.is_positive() {
        return (position + quantity) <= I256::ZERO;
    }
    false
}
