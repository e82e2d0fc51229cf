//! Fixed-point helpers over `I256`.
//!
//! Every division here truncates toward zero. That rounding direction is part of
//! the consensus contract: all validators must land on the same integer.

use crate::types::{ONE_E18, ONE_E6};
use alloy_primitives::{uint, I256, U256};

const TEN: I256 = I256::from_raw(uint!(10_U256));

pub fn from_i128(value: i128) -> I256 {
    let magnitude = I256::from_raw(U256::from(value.unsigned_abs()));
    if value < 0 {
        -magnitude
    } else {
        magnitude
    }
}

pub fn from_u64(value: u64) -> I256 {
    I256::from_raw(U256::from(value))
}

/// 10^n as I256.
pub fn pow10(n: u32) -> I256 {
    let mut acc = I256::ONE;
    for _ in 0..n {
        acc = acc * TEN;
    }
    acc
}

// saturates: callers compare or divide the result, never wrap it
pub fn mul_1e6(value: I256) -> I256 {
    value.saturating_mul(ONE_E6)
}

pub fn div_1e6(value: I256) -> I256 {
    value / ONE_E6
}

pub fn div_1e18(value: I256) -> I256 {
    value / ONE_E18
}

/// Drop `decimals` digits of precision.
pub fn unscale(value: I256, decimals: u32) -> I256 {
    value / pow10(decimals)
}

// zero step means no granularity constraint
pub fn is_multiple_of(value: I256, step: I256) -> bool {
    if step.is_zero() {
        return true;
    }
    (value % step).is_zero()
}

pub fn min(a: I256, b: I256) -> I256 {
    if a < b {
        a
    } else {
        b
    }
}

pub fn max(a: I256, b: I256) -> I256 {
    if a > b {
        a
    } else {
        b
    }
}

/// -1, 0 or 1.
pub fn sign(value: I256) -> i8 {
    if value.is_positive() {
        1
    } else if value.is_negative() {
        -1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn division_truncates_toward_zero() {
        assert_eq!(div_1e6(from_i128(1_999_999)), from_i128(1));
        assert_eq!(div_1e6(from_i128(-1_999_999)), from_i128(-1));
        assert_eq!(div_1e18(from_i128(-5)), I256::ZERO);
    }

    #[test]
    fn multiples() {
        let step = from_i128(10_000_000_000_000_000);
        assert!(is_multiple_of(from_i128(5_000_000_000_000_000_000), step));
        assert!(is_multiple_of(from_i128(-20_000_000_000_000_000), step));
        assert!(!is_multiple_of(from_i128(15_000_000_000_000_001), step));
        assert!(is_multiple_of(from_i128(3), I256::ZERO));
    }

    #[test]
    fn pow10_and_unscale() {
        assert_eq!(pow10(0), I256::ONE);
        assert_eq!(pow10(6), ONE_E6);
        assert_eq!(pow10(18), ONE_E18);
        assert_eq!(unscale(from_i128(123_456_789), 3), from_i128(123_456));
    }

    #[test]
    fn min_max_sign() {
        let a = from_i128(-3);
        let b = from_i128(4);
        assert_eq!(min(a, b), a);
        assert_eq!(max(a, b), b);
        assert_eq!(sign(a), -1);
        assert_eq!(sign(I256::ZERO), 0);
        assert_eq!(sign(b), 1);
        assert_eq!(from_u64(7), from_i128(7));
    }
}
