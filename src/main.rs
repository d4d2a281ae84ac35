//! vAMM perpetuals simulation.
//!
//! Runs one market through a trading session: positions against the curve,
//! a funding epoch and a price crash that ends in a liquidation.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::info;
use tracing_subscriber::EnvFilter;
use vamm_perps::*;

type SimEngine = Engine<MemoryBank, StaticOracle, StaticEpochs>;

const MINUTE_MS: i64 = 60 * 1000;

fn main() -> Result<(), EngineError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("vAMM Perpetuals Simulation");
    println!("Single market, isolated margin, virtual reserves\n");

    let mut engine = setup()?;
    scenario_1_trading(&mut engine)?;
    scenario_2_funding(&mut engine)?;
    scenario_3_liquidation(&mut engine)?;

    println!("\nAll simulations completed.");
    Ok(())
}

fn btc() -> Pair {
    Pair::new("ubtc", "unusd")
}

fn usd(amount: Decimal) -> Coin {
    Coin::new("unusd", amount)
}

/// BTC market priced at 20,000 with 10,000 units of each reserve.
fn setup() -> Result<SimEngine, EngineError> {
    let config = EngineConfig {
        verbose: true,
        ..EngineConfig::default()
    };
    let epochs = StaticEpochs::new().with_epoch(EpochInfo::new("30 min", chrono::Duration::minutes(30)));
    let oracle = StaticOracle::new().with_price(btc(), dec!(20_000));

    let mut bank = MemoryBank::new();
    bank.mint_coins(PERP_EF_MODULE, &[usd(dec!(1_000_000))])?;
    for trader in ["alice", "bob", "carol"] {
        bank.fund_account(&Address::new(trader), usd(dec!(100_000)))?;
    }
    bank.fund_account(&Address::new("dave"), usd(dec!(5_000_000)))?;

    let mut engine = Engine::new(config, bank, oracle, epochs)?;
    engine.set_block(1, Timestamp::from_millis(1_700_000_000_000));
    engine.create_market(CreateMarketArgs::new(btc(), dec!(10_000), dec!(10_000), dec!(20_000)))?;
    engine.advance_block(MINUTE_MS);
    Ok(engine)
}

fn print_position(engine: &SimEngine, trader: &Address) -> Result<(), EngineError> {
    let resp = engine.query_position(&btc(), trader)?;
    println!(
        "  {}: size {:.6}, margin {:.2}, open notional {:.2}, pnl {:.2}, margin ratio {:.4}",
        trader,
        resp.position.size,
        resp.position.margin,
        resp.position.open_notional,
        resp.unrealized_pnl,
        resp.margin_ratio
    );
    Ok(())
}

/// Longs and shorts move the mark price along the curve.
fn scenario_1_trading(engine: &mut SimEngine) -> Result<(), EngineError> {
    println!("Scenario 1: Trading Against the Curve\n");
    let alice = Address::new("alice");
    let bob = Address::new("bob");

    println!("  Mark price: {:.2}", engine.mark_price(&btc())?);
    engine.open_position(&btc(), &alice, Direction::Long, dec!(10_000), dec!(5), Decimal::ZERO)?;
    println!("  Alice longs 50,000 notional at 5x");
    println!("  Mark price: {:.2}", engine.mark_price(&btc())?);
    print_position(engine, &alice)?;

    engine.advance_block(MINUTE_MS);
    engine.open_position(&btc(), &bob, Direction::Short, dec!(5_000), dec!(4), Decimal::ZERO)?;
    println!("  Bob shorts 20,000 notional at 4x");
    println!("  Mark price: {:.2}", engine.mark_price(&btc())?);
    print_position(engine, &bob)?;

    engine.advance_block(MINUTE_MS);
    engine.add_margin(&btc(), &bob, usd(dec!(1_000)))?;
    let resp = engine.close_position(&btc(), &alice)?;
    println!(
        "  Alice closes: realized pnl {:.2}, balance {}",
        resp.realized_pnl,
        engine.bank().get_balance(&alice, "unusd").amount
    );
    let market = engine.get_market(&btc()).ok_or_else(|| EngineError::PairNotFound(btc()))?;
    println!("  Open interest: {:.6} long, {:.6} short\n", market.total_long, market.total_short);
    Ok(())
}

/// A mark premium over the index makes longs pay shorts.
fn scenario_2_funding(engine: &mut SimEngine) -> Result<(), EngineError> {
    println!("Scenario 2: Funding Epoch\n");
    let bob = Address::new("bob");

    engine.advance_block(30 * MINUTE_MS);
    engine.oracle_mut().set_twap(btc(), dec!(19_700));
    engine.after_epoch_end("30 min", 1);

    let market = engine.get_market(&btc()).ok_or_else(|| EngineError::PairNotFound(btc()))?;
    println!("  Index twap 19,700, mark {:.2}", engine.mark_price(&btc())?);
    println!("  Cumulative premium fraction: {:.8}", market.latest_cumulative_premium_fraction);

    let resp = engine.add_margin(&btc(), &bob, usd(dec!(1)))?;
    println!("  Bob settles funding: payment {} (negative means received)", resp.funding_payment);
    print_position(engine, &bob)?;
    println!();
    Ok(())
}

/// A large short crashes the price and leaves a leveraged long underwater.
fn scenario_3_liquidation(engine: &mut SimEngine) -> Result<(), EngineError> {
    println!("Scenario 3: Price Crash and Liquidation\n");
    let carol = Address::new("carol");
    let dave = Address::new("dave");
    let keeper = Address::new("keeper");

    engine.open_position(&btc(), &carol, Direction::Long, dec!(1_000), dec!(10), Decimal::ZERO)?;
    println!("  Carol longs 10,000 notional at 10x");
    print_position(engine, &carol)?;

    engine.advance_block(MINUTE_MS);
    engine.open_position(&btc(), &dave, Direction::Short, dec!(2_000_000), dec!(5), Decimal::ZERO)?;
    println!("  Dave shorts 10,000,000 notional at 5x");
    println!("  Mark price: {:.2}", engine.mark_price(&btc())?);

    // let the twap catch up with the crash
    engine.advance_block(31 * MINUTE_MS);
    print_position(engine, &carol)?;

    let requests = vec![
        LiquidationRequest {
            pair: btc(),
            trader: carol.clone(),
        },
        LiquidationRequest {
            pair: btc(),
            trader: Address::new("bob"),
        },
    ];
    match engine.multi_liquidate(&keeper, &requests) {
        Ok(outcomes) => {
            for (request, outcome) in requests.iter().zip(&outcomes) {
                match outcome {
                    LiquidationOutcome::Success {
                        liquidator_fee,
                        perp_ef_fee,
                    } => println!(
                        "  {} liquidated: keeper fee {}, ecosystem fund fee {}",
                        request.trader, liquidator_fee.amount, perp_ef_fee.amount
                    ),
                    LiquidationOutcome::Failure { error } => {
                        println!("  {} not liquidated: {}", request.trader, error)
                    }
                }
            }
        }
        Err(err) => println!("  Liquidation batch failed: {err}"),
    }

    let fund = engine.bank().get_balance(&Address::module(PERP_EF_MODULE), "unusd").amount;
    let vault = engine.bank().get_balance(&Address::module(VAULT_MODULE), "unusd").amount;
    info!(%fund, %vault, events = engine.events().len(), "session finished");
    println!("  Ecosystem fund: {fund}, vault: {vault}");
    Ok(())
}
