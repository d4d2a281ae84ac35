// 2.0: decimal math. every quotient and product that lands in state goes through
// quo/mul so all nodes round the same way (18 dp, half to even). no floats anywhere.

use primitive_types::U256;
use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

/// Fixed-point precision of every stored decimal.
pub const PRECISION: u32 = 18;

// largest mantissa a Decimal can hold (2^96 - 1)
const MAX_MANTISSA: u128 = 79_228_162_514_264_337_593_543_950_335;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MathError {
    #[error("square root of negative number: {0}")]
    NegativeSqrt(Decimal),

    #[error("decimal overflow")]
    Overflow,
}

/// a / b rounded to 18 dp. caller guarantees b != 0.
pub fn quo(a: Decimal, b: Decimal) -> Decimal {
    (a / b).round_dp_with_strategy(PRECISION, RoundingStrategy::MidpointNearestEven)
}

/// a * b rounded to 18 dp.
pub fn mul(a: Decimal, b: Decimal) -> Decimal {
    (a * b).round_dp_with_strategy(PRECISION, RoundingStrategy::MidpointNearestEven)
}

/// Like [`mul`] but an out of range product is an error instead of a panic.
pub fn checked_mul(a: Decimal, b: Decimal) -> Result<Decimal, MathError> {
    a.checked_mul(b)
        .map(|product| product.round_dp_with_strategy(PRECISION, RoundingStrategy::MidpointNearestEven))
        .ok_or(MathError::Overflow)
}

/// Like [`quo`] but an out of range quotient (or b == 0) is an error.
pub fn checked_quo(a: Decimal, b: Decimal) -> Result<Decimal, MathError> {
    a.checked_div(b)
        .map(|quotient| quotient.round_dp_with_strategy(PRECISION, RoundingStrategy::MidpointNearestEven))
        .ok_or(MathError::Overflow)
}

/// Largest magnitude that still carries all 18 fractional digits, ~7.9e10.
pub fn max_at_precision() -> Decimal {
    Decimal::from_i128_with_scale(MAX_MANTISSA as i128, PRECISION)
}

// past ~7.9e10 the 96 bit mantissa starts eating fractional digits
pub fn fits_precision(value: Decimal) -> bool {
    value.abs() <= max_at_precision()
}

// coin amounts are whole units
pub fn round_int(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven)
}

// 2.1: floor(sqrt(n)). U256 cannot hold a negative value so the precondition is in the type.
pub fn sqrt_big_int(n: U256) -> U256 {
    if n > U256::from(3u8) {
        let mut z = n;
        let mut x = n / 2 + 1;
        while x < z {
            z = x;
            x = (n / x + x) / 2;
        }
        z
    } else if n.is_zero() {
        U256::zero()
    } else {
        U256::one()
    }
}

// 2.2: sqrt of a fixed-point decimal. the mantissa is lifted to 10^36 scale so the
// integer root lands at 10^18 scale, then the result is read back as an 18 dp decimal.
pub fn sqrt_dec(value: Decimal) -> Result<Decimal, MathError> {
    if value < Decimal::ZERO {
        return Err(MathError::NegativeSqrt(value));
    }
    if value.is_zero() {
        return Ok(Decimal::ZERO);
    }

    let mantissa = value.mantissa().unsigned_abs();
    let shift = (2 * PRECISION - value.scale()) as usize;
    let scaled = U256::from(mantissa) * U256::exp10(shift);

    let mut root = sqrt_big_int(scaled).as_u128();
    let mut scale = PRECISION;
    // very large inputs: give up fractional digits (truncating) until the root fits
    while root > MAX_MANTISSA {
        root /= 10;
        scale -= 1;
    }

    Ok(Decimal::from_i128_with_scale(root as i128, scale).normalize())
}

/// Like [`sqrt_dec`] but a negative input is a programming error upstream.
pub fn must_sqrt_dec(value: Decimal) -> Decimal {
    match sqrt_dec(value) {
        Ok(root) => root,
        Err(err) => panic!("{err}"),
    }
}
