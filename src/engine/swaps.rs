// 8.6 engine/swaps.rs: persisting swaps. curve math and the trade/user limits
// come from Pool; here the post-swap pool is checked against the latest snapshot
// and then written back with market totals and a fresh snapshot.
// every check runs before the first write so a failed swap changes nothing.

use super::core::Engine;
use super::results::EngineError;
use crate::amm::{Pool, ReserveSnapshot};
use crate::bank::BankKeeper;
use crate::epochs::EpochKeeper;
use crate::market::MarketConfig;
use crate::oracle::OracleKeeper;
use crate::types::{Direction, Pair};
use rust_decimal::Decimal;
use tracing::debug;

impl<B, O, E> Engine<B, O, E>
where
    B: BankKeeper + Clone,
    O: OracleKeeper,
    E: EpochKeeper,
{
    /// Swap `quote_amount` of quote asset for base. Long buys base, Short sells it.
    pub fn swap_quote_for_base(
        &mut self,
        pair: &Pair,
        direction: Direction,
        quote_amount: Decimal,
        base_limit: Decimal,
        skip_fluctuation_check: bool,
    ) -> Result<(Pool, Decimal), EngineError> {
        let market = self.market(pair)?;
        let pool = self.pool(pair)?;
        if quote_amount.is_zero() {
            return Ok((pool, Decimal::ZERO));
        }

        let (updated, base_amount) =
            pool.swap_quote_for_base(&market.config, direction, quote_amount, base_limit)?;
        if !skip_fluctuation_check {
            self.check_fluctuation_limit(&updated, &market.config)?;
        }

        // quote Long takes base out of the pool
        self.commit_swap(updated.clone(), direction, base_amount);
        debug!(%pair, ?direction, %quote_amount, %base_amount, "swapped quote for base");
        Ok((updated, base_amount))
    }

    /// Swap `base_amount` of base for quote asset. Long adds base to the pool, Short removes it.
    pub fn swap_base_for_quote(
        &mut self,
        pair: &Pair,
        direction: Direction,
        base_amount: Decimal,
        quote_limit: Decimal,
        skip_fluctuation_check: bool,
    ) -> Result<(Pool, Decimal), EngineError> {
        let market = self.market(pair)?;
        let pool = self.pool(pair)?;
        if base_amount.is_zero() {
            return Ok((pool, Decimal::ZERO));
        }

        let (updated, quote_amount) =
            pool.swap_base_for_quote(&market.config, direction, base_amount, quote_limit)?;
        if !skip_fluctuation_check {
            self.check_fluctuation_limit(&updated, &market.config)?;
        }

        // base Long puts base back, the mirror of a quote Short
        self.commit_swap(updated.clone(), direction.opposite(), base_amount);
        debug!(%pair, ?direction, %base_amount, %quote_amount, "swapped base for quote");
        Ok((updated, quote_amount))
    }

    /// Latest snapshot of the pair at or before the current block time.
    pub fn latest_snapshot(&self, pair: &Pair) -> Option<&ReserveSnapshot> {
        self.state.latest_snapshot(pair, self.block_time)
    }

    // 8.6.1: the swap's own snapshot is written after this, so "latest" is the state
    // the pool was in before the swap. no snapshot at all passes.
    pub(super) fn check_fluctuation_limit(
        &self,
        updated: &Pool,
        config: &MarketConfig,
    ) -> Result<(), EngineError> {
        if config.fluctuation_limit_ratio.is_zero() {
            return Ok(());
        }
        if let Some(snapshot) = self.latest_snapshot(&updated.pair) {
            updated.check_fluctuation_limit(snapshot, config.fluctuation_limit_ratio)?;
        }
        Ok(())
    }

    // `taker_side` is the side whose exposure grew: Long bumps total_long
    fn commit_swap(&mut self, pool: Pool, taker_side: Direction, base_amount: Decimal) {
        if let Some(market) = self.state.market(&pool.pair) {
            let mut market = market.clone();
            match taker_side {
                Direction::Long => market.total_long += base_amount,
                Direction::Short => market.total_short += base_amount,
            }
            self.state.insert_market(market);
        }
        self.state.insert_snapshot(pool.snapshot(self.block_time));
        self.state.insert_pool(pool);
    }
}
