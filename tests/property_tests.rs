//! Property-based tests for the reserve curve and the pure accounting helpers.
//!
//! These tests verify invariants hold under random inputs.

use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use vamm_perps::funding::{intervals_per_day, premium_fraction};
use vamm_perps::liquidation::{split_full_liquidation, split_partial_liquidation};
use vamm_perps::math::{mul, quo};
use vamm_perps::position::margin_ratio;
use vamm_perps::*;

fn reserve_strategy() -> impl Strategy<Value = Decimal> {
    (1_000i64..10_000_000i64).prop_map(Decimal::from)
}

fn peg_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..100_000i64).prop_map(|x| Decimal::new(x, 2)) // 0.01 to 1,000
}

// share of the quote reserve a trade takes, 0.01% to 50%
fn fraction_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..=5_000i64).prop_map(|x| Decimal::new(x, 4))
}

fn pool(quote: Decimal, base: Decimal, peg: Decimal) -> Pool {
    Pool::new(Pair::new("ubtc", "unusd"), quote, base, peg).unwrap()
}

proptest! {
    /// Buying base and selling it straight back never returns more quote than was paid
    #[test]
    fn round_trip_never_profits(
        quote in reserve_strategy(),
        base in reserve_strategy(),
        peg in peg_strategy(),
        fraction in fraction_strategy(),
    ) {
        let config = MarketConfig::default();
        let start = pool(quote, base, peg);
        let paid = mul(start.to_quote_asset(quote), fraction);

        let (after_buy, base_out) = start
            .swap_quote_for_base(&config, Direction::Long, paid, Decimal::ZERO)
            .unwrap();
        let (after_sell, received) = after_buy
            .swap_base_for_quote(&config, Direction::Long, base_out, Decimal::ZERO)
            .unwrap();

        prop_assert!(received <= paid + dec!(0.000001), "paid {} received {}", paid, received);
        prop_assert!((after_sell.quote_reserve - quote).abs() < dec!(0.000001));
    }

    /// Depth stays the square root of the reserve product after any swap
    #[test]
    fn depth_tracks_reserves(
        quote in reserve_strategy(),
        base in reserve_strategy(),
        fraction in fraction_strategy(),
        long in any::<bool>(),
    ) {
        let direction = if long { Direction::Long } else { Direction::Short };
        let start = pool(quote, base, dec!(1));
        let (updated, _) = start
            .swap_quote_for_base(&MarketConfig::default(), direction, mul(quote, fraction), Decimal::ZERO)
            .unwrap();

        let product = mul(updated.quote_reserve, updated.base_reserve);
        let squared = mul(updated.sqrt_depth, updated.sqrt_depth);
        prop_assert!((squared - product).abs() <= mul(product, dec!(0.000000001)));
    }

    /// Buying base raises the mark price, selling lowers it
    #[test]
    fn mark_moves_with_the_taker(
        quote in reserve_strategy(),
        base in reserve_strategy(),
        peg in peg_strategy(),
        fraction in fraction_strategy(),
    ) {
        let config = MarketConfig::default();
        let start = pool(quote, base, peg);
        let amount = mul(start.to_quote_asset(quote), fraction);

        let (up, _) = start.swap_quote_for_base(&config, Direction::Long, amount, Decimal::ZERO).unwrap();
        let (down, _) = start.swap_quote_for_base(&config, Direction::Short, amount, Decimal::ZERO).unwrap();
        prop_assert!(up.mark_price() > start.mark_price());
        prop_assert!(down.mark_price() < start.mark_price());
    }

    /// A fresh position's margin ratio is its margin over its notional
    #[test]
    fn fresh_position_ratio_is_inverse_leverage(
        notional in (1i64..1_000_000i64).prop_map(Decimal::from),
        leverage in (1i64..=10i64).prop_map(Decimal::from),
        long in any::<bool>(),
    ) {
        let margin = quo(notional, leverage);
        let size = if long { dec!(1) } else { dec!(-1) };
        let position = Position {
            pair: Pair::new("ubtc", "unusd"),
            trader: Address::new("alice"),
            size,
            margin,
            open_notional: notional,
            latest_cumulative_premium_fraction: dec!(0.01),
            last_updated_block_number: 1,
        };
        let ratio = margin_ratio(&position, notional, dec!(0.01));
        prop_assert_eq!(ratio, quo(margin, notional));
    }

    /// Liquidator fee plus fund share equals the margin left plus the fee shortfall
    #[test]
    fn full_liquidation_split_conserves(
        margin in (0i64..100_000i64).prop_map(|x| Decimal::new(x, 2)),
        notional in (1i64..10_000_000i64).prop_map(|x| Decimal::new(x, 2)),
        close_bad_debt in (0i64..1_000i64).prop_map(Decimal::from),
    ) {
        let split = split_full_liquidation(margin, notional, close_bad_debt, dec!(0.05));
        prop_assert!(split.fee_to_ecosystem_fund >= Decimal::ZERO);
        prop_assert!(split.bad_debt >= close_bad_debt);
        prop_assert_eq!(
            split.fee_to_liquidator + split.fee_to_ecosystem_fund,
            margin + split.bad_debt - close_bad_debt
        );
    }

    /// Partial liquidation fee is split without remainder
    #[test]
    fn partial_liquidation_split_conserves(
        quote_delta in (1i64..10_000_000i64).prop_map(|x| Decimal::new(x, 3)),
        fee_ratio in (1i64..=100i64).prop_map(|x| Decimal::new(x, 3)),
    ) {
        let split = split_partial_liquidation(quote_delta, fee_ratio);
        prop_assert_eq!(split.fee_to_liquidator + split.fee_to_ecosystem_fund, split.fee);
        prop_assert!(split.fee_to_liquidator <= split.fee);
    }

    /// One day of premium fractions adds back up to the mark-index gap
    #[test]
    fn premium_fractions_sum_to_daily_gap(
        mark in (1i64..10_000_000i64).prop_map(|x| Decimal::new(x, 2)),
        index in (1i64..10_000_000i64).prop_map(|x| Decimal::new(x, 2)),
        minutes in prop::sample::select(vec![15i64, 30, 60, 240, 480, 1_440]),
    ) {
        let intervals = intervals_per_day(chrono::Duration::minutes(minutes)).unwrap();
        let premium = premium_fraction(mark, index, intervals);
        let day = premium * Decimal::from(intervals);
        prop_assert!((day - (mark - index)).abs() <= dec!(0.000000000001));
    }
}

// Edge cases

#[test]
fn zero_amount_swaps_leave_pool_alone() {
    let config = MarketConfig::default();
    let start = pool(dec!(1_000), dec!(1_000), dec!(1));
    let (after, base) = start
        .swap_quote_for_base(&config, Direction::Long, Decimal::ZERO, Decimal::ZERO)
        .unwrap();
    assert_eq!(after, start);
    assert_eq!(base, Decimal::ZERO);
    let (after, quote) = start
        .swap_base_for_quote(&config, Direction::Short, Decimal::ZERO, Decimal::ZERO)
        .unwrap();
    assert_eq!(after, start);
    assert_eq!(quote, Decimal::ZERO);
}

#[test]
fn draining_a_reserve_fails() {
    let config = MarketConfig::default();
    let start = pool(dec!(1_000), dec!(1_000), dec!(1));
    assert_eq!(
        start.swap_quote_for_base(&config, Direction::Short, dec!(1_000), Decimal::ZERO),
        Err(AmmError::QuoteReserveAtZero)
    );
    assert_eq!(
        start.swap_base_for_quote(&config, Direction::Short, dec!(1_000), Decimal::ZERO),
        Err(AmmError::BaseReserveAtZero)
    );
}

#[test]
fn epochs_longer_than_a_day_have_no_intervals() {
    assert_eq!(intervals_per_day(chrono::Duration::days(2)), None);
    assert_eq!(intervals_per_day(chrono::Duration::zero()), None);
    assert_eq!(intervals_per_day(chrono::Duration::hours(1)), Some(24));
}
