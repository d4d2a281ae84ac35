// 4.0: position record and the pure accounting around it.
// pnl is notional vs open notional, signed by side. funding = size * cpf delta.
// notional comes from the pool (spot) or from snapshots (twap, see engine/pricing.rs).

use crate::amm::{AmmError, Pool};
use crate::math::{mul, quo};
use crate::types::{Address, Direction, Pair};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub pair: Pair,
    pub trader: Address,
    /// Signed base size. positive is long.
    pub size: Decimal,
    pub margin: Decimal,
    pub open_notional: Decimal,
    /// Market cpf at the last settlement; the funding baseline.
    pub latest_cumulative_premium_fraction: Decimal,
    pub last_updated_block_number: u64,
}

impl Position {
    /// Empty position carrying the market's current funding baseline.
    pub fn zero(pair: Pair, trader: Address, cumulative_premium_fraction: Decimal, block: u64) -> Self {
        Self {
            pair,
            trader,
            size: Decimal::ZERO,
            margin: Decimal::ZERO,
            open_notional: Decimal::ZERO,
            latest_cumulative_premium_fraction: cumulative_premium_fraction,
            last_updated_block_number: block,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.size.is_zero()
    }

    pub fn direction(&self) -> Option<Direction> {
        Direction::of_size(self.size)
    }

    // base-side direction that hands the position back to the pool.
    // a long adds its base back (Long), a short takes base out (Short).
    pub fn closing_base_direction(&self) -> Direction {
        if self.size > Decimal::ZERO {
            Direction::Long
        } else {
            Direction::Short
        }
    }

    // quote-side direction that reduces the position
    pub fn reducing_quote_direction(&self) -> Direction {
        if self.size > Decimal::ZERO {
            Direction::Short
        } else {
            Direction::Long
        }
    }
}

/// Result of any position-changing operation. Every field is always set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionResp {
    pub position: Position,
    /// Quote asset that went through the pool.
    pub exchanged_notional_value: Decimal,
    /// Signed base that went through the pool.
    pub exchanged_position_size: Decimal,
    pub bad_debt: Decimal,
    pub funding_payment: Decimal,
    pub realized_pnl: Decimal,
    pub unrealized_pnl_after: Decimal,
    /// Positive moves margin trader -> vault, negative vault -> trader.
    pub margin_to_vault: Decimal,
    pub position_notional: Decimal,
}

impl PositionResp {
    pub fn empty(position: Position) -> Self {
        Self {
            position,
            exchanged_notional_value: Decimal::ZERO,
            exchanged_position_size: Decimal::ZERO,
            bad_debt: Decimal::ZERO,
            funding_payment: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
            unrealized_pnl_after: Decimal::ZERO,
            margin_to_vault: Decimal::ZERO,
            position_notional: Decimal::ZERO,
        }
    }
}

// 4.1: quote value of closing |size| against the pool right now
pub fn position_notional_spot(pool: &Pool, position: &Position) -> Result<Decimal, AmmError> {
    if position.is_empty() {
        return Ok(Decimal::ZERO);
    }
    let quote_delta =
        pool.quote_amount_for_base(position.size.abs(), position.closing_base_direction())?;
    Ok(pool.to_quote_asset(quote_delta))
}

// 4.2: long gains when notional rises above open notional, short the reverse
pub fn unrealized_pnl(position: &Position, position_notional: Decimal) -> Decimal {
    if position.size > Decimal::ZERO {
        position_notional - position.open_notional
    } else if position.size < Decimal::ZERO {
        position.open_notional - position_notional
    } else {
        Decimal::ZERO
    }
}

pub fn funding_payment(position: &Position, market_cumulative_premium_fraction: Decimal) -> Decimal {
    mul(
        position.size,
        market_cumulative_premium_fraction - position.latest_cumulative_premium_fraction,
    )
}

/// Margin left after adding `margin_delta` and settling funding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemainingMargin {
    /// Never negative; a shortfall shows up as bad debt instead.
    pub margin: Decimal,
    pub bad_debt: Decimal,
    pub funding_payment: Decimal,
}

pub fn remaining_margin(
    position: &Position,
    margin_delta: Decimal,
    market_cumulative_premium_fraction: Decimal,
) -> RemainingMargin {
    let funding_payment = funding_payment(position, market_cumulative_premium_fraction);
    let remaining = position.margin + margin_delta - funding_payment;
    if remaining < Decimal::ZERO {
        RemainingMargin {
            margin: Decimal::ZERO,
            bad_debt: -remaining,
            funding_payment,
        }
    } else {
        RemainingMargin {
            margin: remaining,
            bad_debt: Decimal::ZERO,
            funding_payment,
        }
    }
}

// 4.3: (margin + pnl - funding) / notional. zero when there is nothing to divide by.
pub fn margin_ratio(
    position: &Position,
    position_notional: Decimal,
    market_cumulative_premium_fraction: Decimal,
) -> Decimal {
    if position.is_empty() || position_notional.is_zero() {
        return Decimal::ZERO;
    }
    let remaining = position.margin + unrealized_pnl(position, position_notional)
        - funding_payment(position, market_cumulative_premium_fraction);
    quo(remaining, position_notional)
}
