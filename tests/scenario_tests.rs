//! End-to-end scenarios across trading, funding and liquidation.

use chrono::Duration;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use vamm_perps::*;

type TestEngine = Engine<MemoryBank, StaticOracle, StaticEpochs>;

fn btc() -> Pair {
    Pair::new("ubtc", "unusd")
}

fn usd(amount: Decimal) -> Coin {
    Coin::new("unusd", amount)
}

fn alice() -> Address {
    Address::new("alice")
}

fn bob() -> Address {
    Address::new("bob")
}

fn keeper() -> Address {
    Address::new("keeper")
}

fn engine() -> TestEngine {
    let mut bank = MemoryBank::new();
    bank.mint_coins(PERP_EF_MODULE, &[usd(dec!(100_000))]).unwrap();
    bank.fund_account(&alice(), usd(dec!(10_000))).unwrap();
    bank.fund_account(&bob(), usd(dec!(10_000))).unwrap();
    let epochs = StaticEpochs::new().with_epoch(EpochInfo::new("30 min", Duration::minutes(30)));
    let oracle = StaticOracle::new().with_price(btc(), dec!(1));

    let mut engine = Engine::new(EngineConfig::default(), bank, oracle, epochs).unwrap();
    engine.set_block(1, Timestamp::from_millis(1_000));
    engine
        .create_market(CreateMarketArgs::new(btc(), dec!(10_000), dec!(10_000), dec!(1)))
        .unwrap();
    engine.advance_block(60_000);
    engine
}

#[test]
fn lifecycle_events_are_ordered_and_serializable() {
    let mut engine = engine();
    engine
        .open_position(&btc(), &alice(), Direction::Long, dec!(100), dec!(3), Decimal::ZERO)
        .unwrap();
    engine.advance_block(60_000);
    engine.close_position(&btc(), &alice()).unwrap();

    let events = engine.events();
    assert!(matches!(events[0].payload, EventPayload::MarketCreated(_)));
    assert!(events[1..]
        .iter()
        .all(|event| matches!(event.payload, EventPayload::PositionChanged(_))));
    assert!(events.windows(2).all(|pair| pair[0].id < pair[1].id));
    assert!(events.windows(2).all(|pair| pair[0].timestamp <= pair[1].timestamp));

    let json = serde_json::to_string(events).unwrap();
    let back: Vec<Event> = serde_json::from_str(&json).unwrap();
    assert_eq!(back, events);
}

#[test]
fn funding_moves_from_longs_to_shorts() {
    let mut engine = engine();
    engine
        .open_position(&btc(), &alice(), Direction::Long, dec!(500), dec!(2), Decimal::ZERO)
        .unwrap();
    engine.advance_block(60_000);
    engine
        .open_position(&btc(), &bob(), Direction::Short, dec!(250), dec!(2), Decimal::ZERO)
        .unwrap();
    engine.advance_block(30 * 60_000);

    // mark sits above 1, index far below it
    engine.oracle_mut().set_twap(btc(), dec!(0.5));
    engine.after_epoch_end("30 min", 1);
    let cpf = engine
        .get_market(&btc())
        .unwrap()
        .latest_cumulative_premium_fraction;
    assert!(cpf > Decimal::ZERO);

    let long = engine.remove_margin(&btc(), &alice(), usd(dec!(1))).unwrap();
    let short = engine.remove_margin(&btc(), &bob(), usd(dec!(1))).unwrap();
    assert!(long.funding_payment > Decimal::ZERO);
    assert!(short.funding_payment < Decimal::ZERO);
    assert_eq!(long.position.margin, dec!(500) - long.funding_payment - dec!(1));
    assert_eq!(short.position.margin, dec!(250) - short.funding_payment - dec!(1));
    assert_eq!(long.position.latest_cumulative_premium_fraction, cpf);

    // settled once; the next change pays nothing
    let again = engine.add_margin(&btc(), &alice(), usd(dec!(1))).unwrap();
    assert_eq!(again.funding_payment, Decimal::ZERO);
}

#[test]
fn batch_liquidation_records_every_attempt() {
    let mut engine = engine();
    engine
        .open_position(&btc(), &alice(), Direction::Long, dec!(100), dec!(10), Decimal::ZERO)
        .unwrap();
    engine.advance_block(60_000);
    engine
        .open_position(&btc(), &bob(), Direction::Short, dec!(1_000), dec!(2), Decimal::ZERO)
        .unwrap();
    engine.advance_block(31 * 60_000);

    let requests = vec![
        LiquidationRequest {
            pair: btc(),
            trader: bob(),
        },
        LiquidationRequest {
            pair: btc(),
            trader: alice(),
        },
    ];
    let events_before = engine.events().len();
    let outcomes = engine.multi_liquidate(&keeper(), &requests).unwrap();
    assert!(!outcomes[0].is_success());
    assert!(outcomes[1].is_success());

    let new_events = &engine.events()[events_before..];
    assert_eq!(new_events.len(), 2);
    match &new_events[0].payload {
        EventPayload::LiquidationFailed(failed) => {
            assert_eq!(failed.trader, bob());
            assert_eq!(failed.reason, LiquidationFailedReason::PositionHealthy);
        }
        other => panic!("unexpected {other:?}"),
    }
    match &new_events[1].payload {
        EventPayload::PositionLiquidated(liquidated) => {
            assert_eq!(liquidated.trader, alice());
            assert_eq!(liquidated.liquidator, keeper());
            assert_eq!(liquidated.position_size, Decimal::ZERO);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(engine.query_position(&btc(), &alice()).is_err());
    assert!(engine.query_position(&btc(), &bob()).is_ok());
}

#[test]
fn discarded_scope_restores_everything() {
    let mut engine = engine();
    let state = engine.state().clone();
    let bank = engine.bank().clone();
    let events = engine.events().len();

    engine.begin_scope();
    engine
        .open_position(&btc(), &alice(), Direction::Long, dec!(100), dec!(3), Decimal::ZERO)
        .unwrap();
    assert_eq!(engine.scope_depth(), 1);
    engine.discard_scope().unwrap();

    assert_eq!(engine.state(), &state);
    assert_eq!(engine.bank(), &bank);
    assert_eq!(engine.events().len(), events);
    assert_eq!(engine.discard_scope(), Err(EngineError::NoOpenScope));
}

#[test]
fn disabled_market_rejects_new_positions() {
    let mut engine = engine();
    engine.set_market_enabled(&btc(), false).unwrap();
    assert_eq!(
        engine.open_position(&btc(), &alice(), Direction::Long, dec!(100), dec!(3), Decimal::ZERO),
        Err(EngineError::MarketNotEnabled(btc()))
    );
}

#[test]
fn spread_check_follows_the_mark() {
    let mut engine = engine();
    assert!(!engine.is_over_spread_limit(&btc()).unwrap());

    let tight = MarketConfig::default().with_max_oracle_spread_ratio(dec!(0.1));
    let eth = Pair::new("ueth", "unusd");
    engine
        .create_market(CreateMarketArgs::new(eth.clone(), dec!(10_000), dec!(10_000), dec!(1)).with_config(tight))
        .unwrap();
    engine.oracle_mut().set_rate(eth.clone(), dec!(1));
    engine
        .open_position(&eth, &alice(), Direction::Long, dec!(1_000), dec!(2), Decimal::ZERO)
        .unwrap();
    // 12,000 x 8,333.33 puts the mark at 1.44
    assert!(engine.is_over_spread_limit(&eth).unwrap());
}
