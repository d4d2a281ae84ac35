// 8.0 engine/core.rs: main engine. owns the keyed stores, the capabilities and
// the event log. every public mutating call runs inside a scope.

use super::config::EngineConfig;
use super::results::EngineError;
use crate::amm::Pool;
use crate::bank::BankKeeper;
use crate::epochs::EpochKeeper;
use crate::events::{Event, EventId, EventPayload, MarketCreatedEvent};
use crate::market::{Market, MarketConfig};
use crate::oracle::OracleKeeper;
use crate::store::State;
use crate::types::{Pair, Timestamp};
use chrono::Duration;
use rust_decimal::Decimal;
use tracing::{debug, info};

/// Arguments for [`Engine::create_market`].
#[derive(Debug, Clone)]
pub struct CreateMarketArgs {
    pub pair: Pair,
    pub quote_reserve: Decimal,
    pub base_reserve: Decimal,
    pub peg_multiplier: Decimal,
    pub config: MarketConfig,
    pub funding_rate_epoch_id: Option<String>,
    pub twap_lookback_window: Option<Duration>,
}

impl CreateMarketArgs {
    pub fn new(pair: Pair, quote_reserve: Decimal, base_reserve: Decimal, peg_multiplier: Decimal) -> Self {
        Self {
            pair,
            quote_reserve,
            base_reserve,
            peg_multiplier,
            config: MarketConfig::default(),
            funding_rate_epoch_id: None,
            twap_lookback_window: None,
        }
    }

    pub fn with_config(mut self, config: MarketConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_funding_epoch(mut self, epoch_id: impl Into<String>) -> Self {
        self.funding_rate_epoch_id = Some(epoch_id.into());
        self
    }

    pub fn with_twap_lookback(mut self, window: Duration) -> Self {
        self.twap_lookback_window = Some(window);
        self
    }
}

// what a scope restores on discard
#[derive(Debug)]
struct Checkpoint<B> {
    state: State,
    bank: B,
    events_len: usize,
    next_event_id: u64,
}

/** 8.1: main engine struct. all state lives here */
#[derive(Debug)]
pub struct Engine<B, O, E> {
    pub(super) config: EngineConfig,
    pub(super) state: State,
    pub(super) bank: B,
    pub(super) oracle: O,
    pub(super) epochs: E,
    pub(super) events: Vec<Event>,
    pub(super) next_event_id: u64,
    pub(super) block_height: u64,
    pub(super) block_time: Timestamp,
    scopes: Vec<Checkpoint<B>>,
}

impl<B, O, E> Engine<B, O, E>
where
    B: BankKeeper + Clone,
    O: OracleKeeper,
    E: EpochKeeper,
{
    pub fn new(config: EngineConfig, bank: B, oracle: O, epochs: E) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            config,
            state: State::new(),
            bank,
            oracle,
            epochs,
            events: Vec::new(),
            next_event_id: 1,
            block_height: 0,
            block_time: Timestamp::from_millis(0),
            scopes: Vec::new(),
        })
    }

    // 8.2: block context supplied by the caller

    pub fn set_block(&mut self, height: u64, time: Timestamp) {
        self.block_height = height;
        self.block_time = time;
    }

    pub fn advance_block(&mut self, millis: i64) {
        self.block_height += 1;
        self.block_time = Timestamp::from_millis(self.block_time.as_millis() + millis);
    }

    pub fn block_height(&self) -> u64 {
        self.block_height
    }

    pub fn block_time(&self) -> Timestamp {
        self.block_time
    }

    // 8.3: scopes. a checkpoint copies the stores and the bank; events are cut back
    // to their length at begin. the log is only trimmed once no scope is open.

    pub fn begin_scope(&mut self) {
        self.scopes.push(Checkpoint {
            state: self.state.clone(),
            bank: self.bank.clone(),
            events_len: self.events.len(),
            next_event_id: self.next_event_id,
        });
    }

    pub fn commit_scope(&mut self) -> Result<(), EngineError> {
        self.scopes.pop().ok_or(EngineError::NoOpenScope)?;
        if self.scopes.is_empty() {
            self.trim_events();
        }
        Ok(())
    }

    pub fn discard_scope(&mut self) -> Result<(), EngineError> {
        let checkpoint = self.scopes.pop().ok_or(EngineError::NoOpenScope)?;
        self.state = checkpoint.state;
        self.bank = checkpoint.bank;
        self.events.truncate(checkpoint.events_len);
        self.next_event_id = checkpoint.next_event_id;
        Ok(())
    }

    pub fn scope_depth(&self) -> usize {
        self.scopes.len()
    }

    /// Run `f` in its own scope: kept on Ok, rolled back on Err.
    pub(super) fn in_scope<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        self.begin_scope();
        match f(self) {
            Ok(value) => {
                self.commit_scope()?;
                Ok(value)
            }
            Err(err) => {
                self.discard_scope()?;
                Err(err)
            }
        }
    }

    // 8.4: market administration

    pub fn create_market(&mut self, args: CreateMarketArgs) -> Result<(), EngineError> {
        self.in_scope(|engine| {
            args.config.validate()?;
            if engine.state.market(&args.pair).is_some() {
                return Err(EngineError::MarketAlreadyExists(args.pair.clone()));
            }
            let pool = Pool::new(
                args.pair.clone(),
                args.quote_reserve,
                args.base_reserve,
                args.peg_multiplier,
            )?;

            let epoch_id = args
                .funding_rate_epoch_id
                .clone()
                .unwrap_or_else(|| engine.config.default_funding_epoch_id.clone());
            let lookback = args
                .twap_lookback_window
                .unwrap_or_else(|| engine.config.default_twap_lookback_window());
            let market = Market::new(args.pair.clone(), args.config.clone(), epoch_id, lookback);

            engine.state.insert_snapshot(pool.snapshot(engine.block_time));
            engine.state.insert_pool(pool);
            engine.state.insert_market(market);

            debug!(pair = %args.pair, quote = %args.quote_reserve, base = %args.base_reserve, "market created");
            engine.emit_event(EventPayload::MarketCreated(MarketCreatedEvent {
                pair: args.pair.clone(),
                quote_reserve: args.quote_reserve,
                base_reserve: args.base_reserve,
                peg_multiplier: args.peg_multiplier,
                config: args.config.clone(),
            }));
            Ok(())
        })
    }

    pub fn set_market_enabled(&mut self, pair: &Pair, enabled: bool) -> Result<(), EngineError> {
        let mut market = self.market(pair)?;
        market.enabled = enabled;
        self.state.insert_market(market);
        Ok(())
    }

    // 8.5: queries

    pub fn get_market(&self, pair: &Pair) -> Option<&Market> {
        self.state.market(pair)
    }

    pub fn get_pool(&self, pair: &Pair) -> Option<&Pool> {
        self.state.pool(pair)
    }

    /// All markets in pair order.
    pub fn get_markets(&self) -> Vec<Market> {
        self.state.markets().cloned().collect()
    }

    pub fn get_maintenance_margin_ratio(&self, pair: &Pair) -> Result<Decimal, EngineError> {
        Ok(self.market(pair)?.config.maintenance_margin_ratio)
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn bank(&self) -> &B {
        &self.bank
    }

    pub fn bank_mut(&mut self) -> &mut B {
        &mut self.bank
    }

    pub fn oracle_mut(&mut self) -> &mut O {
        &mut self.oracle
    }

    pub fn recent_events(&self, count: usize) -> &[Event] {
        let start = self.events.len().saturating_sub(count);
        &self.events[start..]
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    // owned copies: callers mutate and write back through the store
    pub(super) fn market(&self, pair: &Pair) -> Result<Market, EngineError> {
        self.state
            .market(pair)
            .cloned()
            .ok_or_else(|| EngineError::PairNotFound(pair.clone()))
    }

    pub(super) fn pool(&self, pair: &Pair) -> Result<Pool, EngineError> {
        self.state
            .pool(pair)
            .cloned()
            .ok_or_else(|| EngineError::PairNotFound(pair.clone()))
    }

    pub(super) fn emit_event(&mut self, payload: EventPayload) {
        let event = Event::new(
            EventId(self.next_event_id),
            self.block_height,
            self.block_time,
            payload,
        );
        self.next_event_id += 1;

        if self.config.verbose {
            info!(id = event.id.0, payload = ?event.payload, "event");
        }

        self.events.push(event);

        if self.scopes.is_empty() {
            self.trim_events();
        }
    }

    fn trim_events(&mut self) {
        if self.events.len() > self.config.max_events {
            let drain_count = self.events.len() - self.config.max_events;
            self.events.drain(0..drain_count);
        }
    }
}
