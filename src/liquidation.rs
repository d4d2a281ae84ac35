//! Liquidation rules and fee splits.
//!
//! A position is liquidatable once its margin ratio (on the larger of spot and
//! twap notional) drops below maintenance. The spot margin ratio then picks the
//! severity: at or above the liquidation fee ratio only part of the position is
//! closed, below it the whole position goes.

use crate::math::{mul, quo};
use crate::position::PositionResp;
use crate::types::Address;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Share of the liquidation fee paid to the liquidator. the rest goes to the ecosystem fund.
pub const LIQUIDATOR_SHARE: Decimal = dec!(0.5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LiquidationFailedReason {
    NonexistentPair,
    NonexistentPosition,
    PositionHealthy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LiquidationKind {
    Partial,
    Full,
}

pub fn is_liquidatable(margin_ratio: Decimal, maintenance_margin_ratio: Decimal) -> bool {
    margin_ratio < maintenance_margin_ratio
}

pub fn liquidation_kind(spot_margin_ratio: Decimal, liquidation_fee_ratio: Decimal) -> LiquidationKind {
    if spot_margin_ratio >= liquidation_fee_ratio {
        LiquidationKind::Partial
    } else {
        LiquidationKind::Full
    }
}

/// How a fully liquidated position's remaining margin is divided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FullLiquidationSplit {
    pub fee_to_liquidator: Decimal,
    pub fee_to_ecosystem_fund: Decimal,
    /// Bad debt from the close plus any fee the margin could not cover.
    pub bad_debt: Decimal,
}

// liquidator fee is half of fee_ratio * exchanged notional. when the margin left after
// closing cannot pay it the difference is booked as bad debt.
pub fn split_full_liquidation(
    remain_margin: Decimal,
    exchanged_notional: Decimal,
    close_bad_debt: Decimal,
    liquidation_fee_ratio: Decimal,
) -> FullLiquidationSplit {
    let fee_to_liquidator = quo(mul(liquidation_fee_ratio, exchanged_notional), dec!(2));
    let mut bad_debt = close_bad_debt;
    let left_for_fund = if fee_to_liquidator > remain_margin {
        bad_debt += fee_to_liquidator - remain_margin;
        Decimal::ZERO
    } else {
        remain_margin - fee_to_liquidator
    };

    FullLiquidationSplit {
        fee_to_liquidator,
        fee_to_ecosystem_fund: left_for_fund.max(Decimal::ZERO),
        bad_debt,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartialLiquidationSplit {
    /// Taken out of the position's margin.
    pub fee: Decimal,
    pub fee_to_liquidator: Decimal,
    pub fee_to_ecosystem_fund: Decimal,
}

pub fn split_partial_liquidation(quote_delta: Decimal, liquidation_fee_ratio: Decimal) -> PartialLiquidationSplit {
    let fee = mul(quote_delta, liquidation_fee_ratio);
    let fee_to_liquidator = mul(fee, LIQUIDATOR_SHARE);
    PartialLiquidationSplit {
        fee,
        fee_to_liquidator,
        fee_to_ecosystem_fund: fee - fee_to_liquidator,
    }
}

/// Outcome of one liquidation. Fee and bad debt amounts are whole coin units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidateResp {
    pub kind: LiquidationKind,
    pub liquidator: Address,
    pub bad_debt: Decimal,
    pub fee_to_liquidator: Decimal,
    pub fee_to_perp_ecosystem_fund: Decimal,
    pub position_resp: PositionResp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_threshold_is_inclusive_for_partial() {
        assert_eq!(liquidation_kind(dec!(0.05), dec!(0.05)), LiquidationKind::Partial);
        assert_eq!(liquidation_kind(dec!(0.049), dec!(0.05)), LiquidationKind::Full);
        assert!(is_liquidatable(dec!(0.06), dec!(0.0625)));
        assert!(!is_liquidatable(dec!(0.0625), dec!(0.0625)));
    }

    #[test]
    fn full_split_pays_fund_the_rest() {
        // fee = 0.05 * 1000 / 2 = 25, margin 40 -> fund 15
        let split = split_full_liquidation(dec!(40), dec!(1_000), Decimal::ZERO, dec!(0.05));
        assert_eq!(split.fee_to_liquidator, dec!(25));
        assert_eq!(split.fee_to_ecosystem_fund, dec!(15));
        assert_eq!(split.bad_debt, Decimal::ZERO);
    }

    #[test]
    fn full_split_books_uncovered_fee_as_bad_debt() {
        let split = split_full_liquidation(dec!(10), dec!(1_000), dec!(3), dec!(0.05));
        assert_eq!(split.fee_to_liquidator, dec!(25));
        assert_eq!(split.fee_to_ecosystem_fund, Decimal::ZERO);
        assert_eq!(split.bad_debt, dec!(18));
    }

    #[test]
    fn full_split_conserves_margin() {
        for (margin, notional) in [(dec!(40), dec!(1_000)), (dec!(10), dec!(1_000)), (dec!(0), dec!(77.7))] {
            let split = split_full_liquidation(margin, notional, Decimal::ZERO, dec!(0.05));
            assert_eq!(
                split.fee_to_liquidator + split.fee_to_ecosystem_fund,
                margin + split.bad_debt
            );
        }
    }

    #[test]
    fn partial_split_is_even() {
        let split = split_partial_liquidation(dec!(1_000), dec!(0.05));
        assert_eq!(split.fee, dec!(50));
        assert_eq!(split.fee_to_liquidator, dec!(25));
        assert_eq!(split.fee_to_ecosystem_fund, dec!(25));
    }
}
