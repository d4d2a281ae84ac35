//! Funding rate updates driven by the epoch scheduler.

use super::core::Engine;
use crate::amm::TwapCalcOption;
use crate::bank::BankKeeper;
use crate::epochs::{EpochHooks, EpochKeeper};
use crate::events::{EventPayload, FundingRateChangedEvent};
use crate::funding::{funding_rate, intervals_per_day, premium_fraction};
use crate::market::Market;
use crate::oracle::OracleKeeper;
use rust_decimal::Decimal;
use tracing::{debug, error};

impl<B, O, E> EpochHooks for Engine<B, O, E>
where
    B: BankKeeper + Clone,
    O: OracleKeeper,
    E: EpochKeeper,
{
    fn before_epoch_start(&mut self, _identifier: &str, _epoch_number: u64) {}

    /// Accrue one premium fraction on every enabled market funded on `identifier`.
    /// A market that cannot be priced is logged and skipped, the rest still update.
    fn after_epoch_end(&mut self, identifier: &str, epoch_number: u64) {
        let markets: Vec<Market> = self
            .state
            .markets()
            .filter(|market| market.enabled && market.funding_rate_epoch_id == identifier)
            .cloned()
            .collect();

        for market in markets {
            self.update_funding(market, identifier, epoch_number);
        }
    }
}

impl<B, O, E> Engine<B, O, E>
where
    B: BankKeeper + Clone,
    O: OracleKeeper,
    E: EpochKeeper,
{
    fn update_funding(&mut self, mut market: Market, identifier: &str, epoch_number: u64) {
        let pair = market.pair.clone();

        let index_twap = match self.oracle.get_exchange_rate_twap(&pair) {
            Ok(price) if !price.is_zero() => price,
            Ok(_) => {
                error!(%pair, "index price twap is zero");
                return;
            }
            Err(err) => {
                error!(%pair, error = %err, "failed to fetch index price twap");
                return;
            }
        };

        let mark_twap = match self.calc_twap(&pair, TwapCalcOption::Spot, market.twap_lookback_window()) {
            Ok(price) if !price.is_zero() => price,
            Ok(_) => {
                error!(%pair, "mark price twap is zero");
                return;
            }
            Err(err) => {
                error!(%pair, error = %err, "failed to compute mark price twap");
                return;
            }
        };

        let Some(epoch) = self.epochs.get_epoch_info(identifier) else {
            error!(%pair, identifier, "unknown funding epoch");
            return;
        };
        let Some(intervals) = intervals_per_day(epoch.duration) else {
            error!(%pair, identifier, duration_ms = epoch.duration.num_milliseconds(), "epoch does not divide a day");
            return;
        };

        let premium = premium_fraction(mark_twap, index_twap, intervals);
        market.latest_cumulative_premium_fraction += premium;
        let cumulative = market.latest_cumulative_premium_fraction;
        self.state.insert_market(market);

        debug!(%pair, epoch_number, %mark_twap, %index_twap, %premium, %cumulative, "funding updated");
        self.emit_event(EventPayload::FundingRateChanged(FundingRateChangedEvent {
            pair,
            mark_price: mark_twap,
            index_price: index_twap,
            latest_funding_rate: funding_rate(premium, index_twap),
            latest_premium_fraction: premium,
            cumulative_premium_fraction: cumulative,
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::MemoryBank;
    use crate::engine::{CreateMarketArgs, EngineConfig};
    use crate::epochs::{EpochInfo, StaticEpochs};
    use crate::oracle::StaticOracle;
    use crate::types::{Pair, Timestamp};
    use chrono::Duration;
    use rust_decimal_macros::dec;

    type TestEngine = Engine<MemoryBank, StaticOracle, StaticEpochs>;

    fn btc() -> Pair {
        Pair::new("ubtc", "unusd")
    }

    fn eth() -> Pair {
        Pair::new("ueth", "unusd")
    }

    // btc at mark 1 funded every 30 min, index twap 0.9
    fn engine() -> TestEngine {
        let epochs = StaticEpochs::new()
            .with_epoch(EpochInfo::new("30 min", Duration::minutes(30)))
            .with_epoch(EpochInfo::new("1 week", Duration::weeks(1)));
        let oracle = StaticOracle::new().with_price(btc(), dec!(0.9));
        let mut engine = Engine::new(EngineConfig::default(), MemoryBank::new(), oracle, epochs).unwrap();
        engine.set_block(1, Timestamp::from_millis(0));
        engine
            .create_market(CreateMarketArgs::new(btc(), dec!(1_000), dec!(1_000), dec!(1)))
            .unwrap();
        engine.advance_block(60_000);
        engine
    }

    fn cumulative(engine: &TestEngine, pair: &Pair) -> Decimal {
        engine.get_market(pair).unwrap().latest_cumulative_premium_fraction
    }

    fn funding_events(engine: &TestEngine) -> Vec<&FundingRateChangedEvent> {
        engine
            .events()
            .iter()
            .filter_map(|event| match &event.payload {
                EventPayload::FundingRateChanged(changed) => Some(changed),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn epoch_end_accrues_premium() {
        let mut engine = engine();
        engine.after_epoch_end("30 min", 1);

        // (1 - 0.9) / 48
        let premium = dec!(0.002083333333333333);
        assert_eq!(premium, premium_fraction(dec!(1), dec!(0.9), 48));
        assert_eq!(cumulative(&engine, &btc()), premium);

        let events = funding_events(&engine);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].mark_price, dec!(1));
        assert_eq!(events[0].index_price, dec!(0.9));
        assert_eq!(events[0].latest_premium_fraction, premium);
        assert_eq!(events[0].latest_funding_rate, funding_rate(premium, dec!(0.9)));

        engine.advance_block(60_000);
        engine.after_epoch_end("30 min", 2);
        assert_eq!(cumulative(&engine, &btc()), premium + premium);
        assert_eq!(funding_events(&engine)[1].cumulative_premium_fraction, premium + premium);
    }

    #[test]
    fn other_epochs_and_disabled_markets_skipped() {
        let mut engine = engine();
        engine.after_epoch_end("1 week", 1);
        assert_eq!(cumulative(&engine, &btc()), Decimal::ZERO);

        engine.set_market_enabled(&btc(), false).unwrap();
        engine.after_epoch_end("30 min", 1);
        assert_eq!(cumulative(&engine, &btc()), Decimal::ZERO);
        assert!(funding_events(&engine).is_empty());
    }

    #[test]
    fn unpriced_market_does_not_block_others() {
        let mut engine = engine();
        // btc is visited first and fails
        engine.oracle_mut().set_twap(btc(), Decimal::ZERO);
        engine
            .create_market(CreateMarketArgs::new(eth(), dec!(2_000), dec!(1_000), dec!(1)))
            .unwrap();
        engine.oracle_mut().set_rate(eth(), dec!(2));

        engine.after_epoch_end("30 min", 1);
        assert_eq!(cumulative(&engine, &btc()), Decimal::ZERO);
        // mark 2 equals index 2
        assert_eq!(cumulative(&engine, &eth()), Decimal::ZERO);
        let events = funding_events(&engine);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].pair, eth());
    }

    #[test]
    fn missing_index_price_skips_market() {
        let mut engine = engine();
        engine
            .create_market(CreateMarketArgs::new(eth(), dec!(2_000), dec!(1_000), dec!(1)))
            .unwrap();
        engine.after_epoch_end("30 min", 1);
        assert_eq!(cumulative(&engine, &eth()), Decimal::ZERO);
        assert_eq!(cumulative(&engine, &btc()), dec!(0.002083333333333333));
    }

    #[test]
    fn epoch_unknown_to_scheduler_skips() {
        let mut engine = engine();
        engine
            .create_market(
                CreateMarketArgs::new(eth(), dec!(2_000), dec!(1_000), dec!(1)).with_funding_epoch("15 min"),
            )
            .unwrap();
        engine.oracle_mut().set_rate(eth(), dec!(1));
        engine.after_epoch_end("15 min", 1);
        assert_eq!(cumulative(&engine, &eth()), Decimal::ZERO);
        assert!(funding_events(&engine).is_empty());
    }

    #[test]
    fn epoch_start_is_a_no_op() {
        let mut engine = engine();
        let before = engine.state().clone();
        engine.before_epoch_start("30 min", 1);
        assert_eq!(engine.state(), &before);
    }
}
