//! Snapshot-based pricing: TWAPs, mark price and the oracle spread check.

use super::core::Engine;
use super::results::EngineError;
use crate::amm::TwapCalcOption;
use crate::bank::BankKeeper;
use crate::epochs::EpochKeeper;
use crate::math::{mul, quo};
use crate::oracle::OracleKeeper;
use crate::position::{margin_ratio, position_notional_spot, Position};
use crate::types::Pair;
use chrono::Duration;
use rust_decimal::Decimal;

impl<B, O, E> Engine<B, O, E>
where
    B: BankKeeper + Clone,
    O: OracleKeeper,
    E: EpochKeeper,
{
    /// Time-weighted price of `pair` over the last `lookback`.
    ///
    /// Snapshots are walked newest first from the current block time. The walk
    /// stops after the first snapshot taken at or before the window start, and
    /// that snapshot is only weighted for the part of the window it covers.
    pub fn calc_twap(
        &self,
        pair: &Pair,
        option: TwapCalcOption,
        lookback: Duration,
    ) -> Result<Decimal, EngineError> {
        let now = self.block_time;
        let lower_limit = now.saturating_sub(lookback).as_millis();

        let mut window = Vec::new();
        for snapshot in self.state.snapshots_desc(pair, now) {
            window.push(snapshot);
            if snapshot.timestamp_ms <= lower_limit {
                break;
            }
        }

        let latest = match window.first() {
            Some(snapshot) => snapshot.price_for(option)?,
            None => return Err(EngineError::NoValidTwap(pair.clone())),
        };
        if window.len() == 1 {
            return Ok(latest);
        }

        let mut prev_ms = now.as_millis();
        let mut cumulative_price = Decimal::ZERO;
        let mut cumulative_period = Decimal::ZERO;
        for snapshot in window {
            let start_ms = snapshot.timestamp_ms.max(lower_limit);
            let elapsed = Decimal::from(prev_ms - start_ms);
            cumulative_price += mul(snapshot.price_for(option)?, elapsed);
            cumulative_period += elapsed;
            prev_ms = start_ms;
        }

        // empty window
        if cumulative_period.is_zero() {
            return Ok(latest);
        }
        Ok(quo(cumulative_price, cumulative_period))
    }

    /// TWAP of the quote a position would get for closing against the pool.
    pub fn position_notional_twap(
        &self,
        position: &Position,
        lookback: Duration,
    ) -> Result<Decimal, EngineError> {
        if position.is_empty() {
            return Ok(Decimal::ZERO);
        }
        self.calc_twap(
            &position.pair,
            TwapCalcOption::BaseAssetSwap {
                direction: position.closing_base_direction(),
                amount: position.size.abs(),
            },
            lookback,
        )
    }

    pub fn position_notional(&self, position: &Position) -> Result<Decimal, EngineError> {
        let pool = self.pool(&position.pair)?;
        Ok(position_notional_spot(&pool, position)?)
    }

    // margin ratio under whichever of spot and twap notional suits the trader.
    // checks on traders' own actions use this so one block's move cannot block them.
    pub(super) fn best_margin_ratio(&self, position: &Position) -> Result<Decimal, EngineError> {
        let market = self.market(&position.pair)?;
        let cpf = market.latest_cumulative_premium_fraction;
        let spot = self.position_notional(position)?;
        let twap = self.position_notional_twap(position, market.twap_lookback_window())?;
        Ok(margin_ratio(position, spot, cpf).max(margin_ratio(position, twap, cpf)))
    }

    pub fn mark_price(&self, pair: &Pair) -> Result<Decimal, EngineError> {
        Ok(self.pool(pair)?.mark_price())
    }

    /// True when mark and oracle price differ by more than `max_oracle_spread_ratio`.
    pub fn is_over_spread_limit(&self, pair: &Pair) -> Result<bool, EngineError> {
        let market = self.market(pair)?;
        let mark = self.mark_price(pair)?;
        let oracle_price = self.oracle.get_exchange_rate(pair)?;
        if oracle_price <= Decimal::ZERO {
            return Ok(true);
        }
        let spread = quo((mark - oracle_price).abs(), oracle_price);
        Ok(spread > market.config.max_oracle_spread_ratio)
    }
}
