// 3.0: virtual reserves. constant product curve x*y=k with a peg multiplier that
// maps quote reserve units to real quote asset. nothing here touches storage:
// every swap returns a fresh Pool and the engine decides whether to persist it.

use crate::market::MarketConfig;
use crate::math::{checked_mul, checked_quo, fits_precision, mul, must_sqrt_dec, quo, MathError};
use crate::types::{Direction, Pair, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmmError {
    #[error("over trading limit: reserve delta {delta} exceeds {max}")]
    OverTradingLimit { delta: Decimal, max: Decimal },

    #[error("asset amount {amount} fails user limit {limit}")]
    AssetFailsUserLimit { amount: Decimal, limit: Decimal },

    #[error("over fluctuation limit: price {price} outside [{lower}, {upper}]")]
    OverFluctuationLimit {
        price: Decimal,
        lower: Decimal,
        upper: Decimal,
    },

    #[error("quote reserve would reach zero")]
    QuoteReserveAtZero,

    #[error("base reserve would reach zero")]
    BaseReserveAtZero,

    #[error("reserves and peg multiplier must be positive")]
    NonPositiveReserves,

    #[error("reserve arithmetic leaves the 18 dp decimal range")]
    Overflow,
}

impl From<MathError> for AmmError {
    fn from(_: MathError) -> Self {
        AmmError::Overflow
    }
}

/// Reserve state of one market. `sqrt_depth` always matches the reserves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub pair: Pair,
    pub quote_reserve: Decimal,
    pub base_reserve: Decimal,
    pub peg_multiplier: Decimal,
    pub sqrt_depth: Decimal,
}

// 3.1: what a snapshot-based price is computed from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TwapCalcOption {
    /// Mark price of the reserves.
    Spot,
    /// Base received for swapping `amount` of quote asset.
    QuoteAssetSwap { direction: Direction, amount: Decimal },
    /// Quote asset received for swapping `amount` of base.
    BaseAssetSwap { direction: Direction, amount: Decimal },
}

impl Pool {
    pub fn new(
        pair: Pair,
        quote_reserve: Decimal,
        base_reserve: Decimal,
        peg_multiplier: Decimal,
    ) -> Result<Self, AmmError> {
        if quote_reserve <= Decimal::ZERO
            || base_reserve <= Decimal::ZERO
            || peg_multiplier <= Decimal::ZERO
        {
            return Err(AmmError::NonPositiveReserves);
        }
        if !fits_precision(peg_multiplier) {
            return Err(AmmError::Overflow);
        }
        Ok(Self {
            sqrt_depth: depth(quote_reserve, base_reserve)?,
            pair,
            quote_reserve,
            base_reserve,
            peg_multiplier,
        })
    }

    /// Copy of the pool with new reserves; the only place depth is recomputed.
    pub fn with_reserves(&self, quote_reserve: Decimal, base_reserve: Decimal) -> Result<Self, AmmError> {
        Ok(Self {
            pair: self.pair.clone(),
            quote_reserve,
            base_reserve,
            peg_multiplier: self.peg_multiplier,
            sqrt_depth: depth(quote_reserve, base_reserve)?,
        })
    }

    pub fn mark_price(&self) -> Decimal {
        if self.base_reserve.is_zero() {
            return Decimal::ZERO;
        }
        mul(quo(self.quote_reserve, self.base_reserve), self.peg_multiplier)
    }

    pub fn to_quote_asset(&self, quote_reserve: Decimal) -> Decimal {
        mul(quote_reserve, self.peg_multiplier)
    }

    fn invariant(&self) -> Result<Decimal, AmmError> {
        Ok(checked_mul(self.quote_reserve, self.base_reserve)?)
    }

    // 3.2: base moved when `quote_delta` reserve units enter (Long) or leave (Short)
    pub fn base_amount_for_quote(
        &self,
        quote_delta: Decimal,
        direction: Direction,
    ) -> Result<Decimal, AmmError> {
        if quote_delta.is_zero() {
            return Ok(Decimal::ZERO);
        }
        let quote_after = self
            .quote_reserve
            .checked_add(direction.sign() * quote_delta)
            .ok_or(AmmError::Overflow)?;
        if quote_after <= Decimal::ZERO {
            return Err(AmmError::QuoteReserveAtZero);
        }
        let base_after = checked_quo(self.invariant()?, quote_after)?;
        Ok((base_after - self.base_reserve).abs())
    }

    // 3.3: quote reserve units moved when `base_delta` enters (Long) or leaves (Short)
    pub fn quote_amount_for_base(
        &self,
        base_delta: Decimal,
        direction: Direction,
    ) -> Result<Decimal, AmmError> {
        if base_delta.is_zero() {
            return Ok(Decimal::ZERO);
        }
        let base_after = self
            .base_reserve
            .checked_add(direction.sign() * base_delta)
            .ok_or(AmmError::Overflow)?;
        if base_after <= Decimal::ZERO {
            return Err(AmmError::BaseReserveAtZero);
        }
        let quote_after = checked_quo(self.invariant()?, base_after)?;
        Ok((quote_after - self.quote_reserve).abs())
    }

    fn check_trade_limit(
        &self,
        quote_delta: Decimal,
        base_delta: Decimal,
        trade_limit_ratio: Decimal,
    ) -> Result<(), AmmError> {
        let max_quote = mul(self.quote_reserve, trade_limit_ratio);
        if quote_delta > max_quote {
            return Err(AmmError::OverTradingLimit {
                delta: quote_delta,
                max: max_quote,
            });
        }
        let max_base = mul(self.base_reserve, trade_limit_ratio);
        if base_delta > max_base {
            return Err(AmmError::OverTradingLimit {
                delta: base_delta,
                max: max_base,
            });
        }
        Ok(())
    }

    // 3.4: swap quote asset for base without the fluctuation check. returns the
    // post-swap pool and the base amount. zero input returns the pool as is.
    pub fn swap_quote_for_base(
        &self,
        config: &MarketConfig,
        direction: Direction,
        quote_amount: Decimal,
        base_limit: Decimal,
    ) -> Result<(Pool, Decimal), AmmError> {
        if quote_amount.is_zero() {
            return Ok((self.clone(), Decimal::ZERO));
        }

        let quote_delta = checked_quo(quote_amount, self.peg_multiplier)?;
        let base_amount = self.base_amount_for_quote(quote_delta, direction)?;
        check_user_limit(direction, base_amount, base_limit)?;
        self.check_trade_limit(quote_delta, base_amount, config.trade_limit_ratio)?;

        let updated = match direction {
            Direction::Long => self.with_reserves(
                self.quote_reserve + quote_delta,
                self.base_reserve - base_amount,
            )?,
            Direction::Short => self.with_reserves(
                self.quote_reserve - quote_delta,
                self.base_reserve + base_amount,
            )?,
        };
        Ok((updated, base_amount))
    }

    // 3.5: swap base for quote asset. Long adds base to the pool (closing a long),
    // Short takes base out of it.
    pub fn swap_base_for_quote(
        &self,
        config: &MarketConfig,
        direction: Direction,
        base_amount: Decimal,
        quote_limit: Decimal,
    ) -> Result<(Pool, Decimal), AmmError> {
        if base_amount.is_zero() {
            return Ok((self.clone(), Decimal::ZERO));
        }

        let quote_delta = self.quote_amount_for_base(base_amount, direction)?;
        let quote_amount = checked_mul(quote_delta, self.peg_multiplier)?;
        check_user_limit(direction, quote_amount, quote_limit)?;
        self.check_trade_limit(quote_delta, base_amount, config.trade_limit_ratio)?;

        let updated = match direction {
            Direction::Long => self.with_reserves(
                self.quote_reserve - quote_delta,
                self.base_reserve + base_amount,
            )?,
            Direction::Short => self.with_reserves(
                self.quote_reserve + quote_delta,
                self.base_reserve - base_amount,
            )?,
        };
        Ok((updated, quote_amount))
    }

    // 3.6: mark price against a snapshot's, band [p(1-r), p(1+r)]. zero ratio disables it.
    pub fn check_fluctuation_limit(
        &self,
        snapshot: &ReserveSnapshot,
        fluctuation_limit_ratio: Decimal,
    ) -> Result<(), AmmError> {
        if fluctuation_limit_ratio.is_zero() {
            return Ok(());
        }
        let last_price = snapshot.mark_price();
        let upper = mul(last_price, Decimal::ONE + fluctuation_limit_ratio);
        let lower = mul(last_price, Decimal::ONE - fluctuation_limit_ratio);
        let price = self.mark_price();
        if price > upper || price < lower {
            return Err(AmmError::OverFluctuationLimit { price, lower, upper });
        }
        Ok(())
    }

    pub fn snapshot(&self, timestamp: Timestamp) -> ReserveSnapshot {
        ReserveSnapshot {
            pair: self.pair.clone(),
            quote_reserve: self.quote_reserve,
            base_reserve: self.base_reserve,
            peg_multiplier: self.peg_multiplier,
            timestamp_ms: timestamp.as_millis(),
        }
    }

    /// Price under a TWAP option, read off these reserves.
    pub fn price_for(&self, option: TwapCalcOption) -> Result<Decimal, AmmError> {
        match option {
            TwapCalcOption::Spot => Ok(self.mark_price()),
            TwapCalcOption::QuoteAssetSwap { direction, amount } => {
                self.base_amount_for_quote(checked_quo(amount, self.peg_multiplier)?, direction)
            }
            TwapCalcOption::BaseAssetSwap { direction, amount } => {
                let quote_delta = self.quote_amount_for_base(amount, direction)?;
                Ok(checked_mul(quote_delta, self.peg_multiplier)?)
            }
        }
    }
}

// sqrt(k) for reserves that keep their full 18 dp
fn depth(quote_reserve: Decimal, base_reserve: Decimal) -> Result<Decimal, AmmError> {
    if !fits_precision(quote_reserve) || !fits_precision(base_reserve) {
        return Err(AmmError::Overflow);
    }
    Ok(must_sqrt_dec(checked_mul(quote_reserve, base_reserve)?))
}

// Long receives at least the limit, Short gives at most the limit. zero = no limit.
fn check_user_limit(direction: Direction, amount: Decimal, limit: Decimal) -> Result<(), AmmError> {
    if limit.is_zero() {
        return Ok(());
    }
    let fails = match direction {
        Direction::Long => amount < limit,
        Direction::Short => amount > limit,
    };
    if fails {
        return Err(AmmError::AssetFailsUserLimit { amount, limit });
    }
    Ok(())
}

/// Reserves of a pair at one block time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveSnapshot {
    pub pair: Pair,
    pub quote_reserve: Decimal,
    pub base_reserve: Decimal,
    pub peg_multiplier: Decimal,
    pub timestamp_ms: i64,
}

impl ReserveSnapshot {
    pub fn mark_price(&self) -> Decimal {
        if self.base_reserve.is_zero() {
            return Decimal::ZERO;
        }
        mul(quo(self.quote_reserve, self.base_reserve), self.peg_multiplier)
    }

    pub fn to_pool(&self) -> Result<Pool, AmmError> {
        Pool::new(
            self.pair.clone(),
            self.quote_reserve,
            self.base_reserve,
            self.peg_multiplier,
        )
    }

    pub fn price_for(&self, option: TwapCalcOption) -> Result<Decimal, AmmError> {
        match option {
            TwapCalcOption::Spot => Ok(self.mark_price()),
            _ => self.to_pool()?.price_for(option),
        }
    }
}
