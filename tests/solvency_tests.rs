//! Solvency invariant tests.
//!
//! These tests verify invariants that must hold for the vault and the
//! ecosystem fund to stay whole under any sequence of trades.

use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use vamm_perps::*;

type TestEngine = Engine<MemoryBank, StaticOracle, StaticEpochs>;

const TRADERS: usize = 5;

fn btc() -> Pair {
    Pair::new("ubtc", "unusd")
}

fn trader(i: usize) -> Address {
    Address::new(format!("trader{i}"))
}

fn engine() -> TestEngine {
    let mut bank = MemoryBank::new();
    bank.mint_coins(PERP_EF_MODULE, &[Coin::new("unusd", dec!(1_000_000))])
        .unwrap();
    for i in 0..TRADERS {
        bank.fund_account(&trader(i), Coin::new("unusd", dec!(10_000))).unwrap();
    }
    let mut engine = Engine::new(EngineConfig::default(), bank, StaticOracle::new(), StaticEpochs::new()).unwrap();
    engine.set_block(1, Timestamp::from_millis(1_000));
    engine
        .create_market(CreateMarketArgs::new(btc(), dec!(100_000), dec!(100_000), dec!(1)))
        .unwrap();
    engine.advance_block(1_000);
    engine
}

fn total_coins(engine: &TestEngine) -> Decimal {
    let mut holders: Vec<Address> = (0..TRADERS).map(trader).collect();
    holders.push(Address::module(VAULT_MODULE));
    holders.push(Address::module(PERP_EF_MODULE));
    holders.push(Address::new("keeper"));
    holders
        .iter()
        .map(|address| engine.bank().get_balance(address, "unusd").amount)
        .sum()
}

fn net_size(engine: &TestEngine) -> Decimal {
    engine.state().positions().map(|position| position.size).sum()
}

fn volume_gap(engine: &TestEngine) -> Decimal {
    let market = engine.get_market(&btc()).unwrap();
    market.total_long - market.total_short
}

#[derive(Debug, Clone)]
struct Trade {
    trader: usize,
    long: bool,
    margin: i64,
    leverage: i64,
}

fn trade_strategy() -> impl Strategy<Value = Trade> {
    (0..TRADERS, any::<bool>(), 1i64..500i64, 1i64..=5i64).prop_map(|(trader, long, margin, leverage)| Trade {
        trader,
        long,
        margin,
        leverage,
    })
}

fn apply(engine: &mut TestEngine, trade: &Trade) {
    let direction = if trade.long { Direction::Long } else { Direction::Short };
    // rejected trades roll back; the invariants must hold either way
    let _ = engine.open_position(
        &btc(),
        &trader(trade.trader),
        direction,
        Decimal::from(trade.margin),
        Decimal::from(trade.leverage),
        Decimal::ZERO,
    );
    engine.advance_block(1_000);
}

proptest! {
    /// Net position size always equals long minus short base volume
    #[test]
    fn positions_match_pool_volume(
        trades in proptest::collection::vec(trade_strategy(), 1..30),
    ) {
        let mut engine = engine();
        for trade in &trades {
            apply(&mut engine, trade);
            prop_assert_eq!(net_size(&engine), volume_gap(&engine));
        }
    }

    /// Trading moves coins between traders, vault and fund but never creates them
    #[test]
    fn coins_are_conserved(
        trades in proptest::collection::vec(trade_strategy(), 1..30),
    ) {
        let mut engine = engine();
        let supply = total_coins(&engine);
        for trade in &trades {
            apply(&mut engine, trade);
            prop_assert_eq!(total_coins(&engine), supply);
        }
    }

    /// Closing every position puts the curve back where it started
    #[test]
    fn closing_everything_restores_reserves(
        trades in proptest::collection::vec(trade_strategy(), 1..30),
    ) {
        let mut engine = engine();
        let supply = total_coins(&engine);
        for trade in &trades {
            apply(&mut engine, trade);
        }
        for i in 0..TRADERS {
            if engine.query_position(&btc(), &trader(i)).is_ok() {
                let closed = engine.close_position(&btc(), &trader(i));
                prop_assert!(closed.is_ok(), "close failed: {:?}", closed);
            }
            engine.advance_block(1_000);
        }

        prop_assert_eq!(engine.state().positions().count(), 0);
        let pool = engine.get_pool(&btc()).unwrap();
        prop_assert!((pool.base_reserve - dec!(100_000)).abs() < dec!(0.000001));
        prop_assert!((pool.quote_reserve - dec!(100_000)).abs() < dec!(0.000001));
        prop_assert_eq!(net_size(&engine), volume_gap(&engine));
        prop_assert_eq!(total_coins(&engine), supply);
    }
}

/// Crash a 10x long, liquidate it and check every coin is accounted for.
#[test]
fn liquidation_keeps_coins_whole() {
    let mut engine = engine();
    let supply = total_coins(&engine);
    let long = trader(0);
    let whale = trader(1);

    engine
        .open_position(&btc(), &long, Direction::Long, dec!(100), dec!(10), Decimal::ZERO)
        .unwrap();
    engine.advance_block(1_000);
    engine
        .open_position(&btc(), &whale, Direction::Short, dec!(2_000), dec!(5), Decimal::ZERO)
        .unwrap();
    // past the twap window so the drop is visible to liquidation
    engine.advance_block(31 * 60 * 1000);

    let resp = engine
        .liquidate(&Address::new("keeper"), &btc(), &long)
        .unwrap();
    assert_eq!(resp.kind, LiquidationKind::Full);
    assert!(resp.bad_debt > Decimal::ZERO);
    assert!(engine.query_position(&btc(), &long).is_err());
    assert_eq!(total_coins(&engine), supply);
    assert_eq!(net_size(&engine), volume_gap(&engine));

    let fund = engine
        .bank()
        .get_balance(&Address::module(PERP_EF_MODULE), "unusd")
        .amount;
    assert!(fund < dec!(1_000_000));
}

/// A winner is paid in full even when the vault has to borrow from the fund.
#[test]
fn winners_paid_when_vault_runs_dry() {
    let mut engine = engine();
    let supply = total_coins(&engine);
    let early = trader(0);
    let late = trader(1);

    engine
        .open_position(&btc(), &early, Direction::Long, dec!(400), dec!(5), Decimal::ZERO)
        .unwrap();
    engine.advance_block(1_000);
    engine
        .open_position(&btc(), &late, Direction::Long, dec!(400), dec!(5), Decimal::ZERO)
        .unwrap();
    engine.advance_block(1_000);

    let resp = engine.close_position(&btc(), &early).unwrap();
    assert!(resp.realized_pnl > Decimal::ZERO);
    let balance = engine.bank().get_balance(&early, "unusd").amount;
    assert!(balance > dec!(10_000));
    assert_eq!(total_coins(&engine), supply);

    // the late long now owes the early long's profit
    let resp = engine.close_position(&btc(), &late).unwrap();
    assert!(resp.realized_pnl < Decimal::ZERO);
    assert_eq!(total_coins(&engine), supply);
    let vault = engine
        .bank()
        .get_balance(&Address::module(VAULT_MODULE), "unusd")
        .amount;
    assert!(vault >= Decimal::ZERO);
}
