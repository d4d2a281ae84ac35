// 9.1 oracle.rs: index price capability. the engine never fetches prices itself,
// it asks an OracleKeeper for the spot rate and the rate twap of a pair.

use crate::types::Pair;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
    #[error("no exchange rate for {0}")]
    NoPrice(Pair),
}

pub trait OracleKeeper {
    fn get_exchange_rate(&self, pair: &Pair) -> Result<Decimal, OracleError>;

    fn get_exchange_rate_twap(&self, pair: &Pair) -> Result<Decimal, OracleError>;
}

/// Fixed prices set by the caller. twap falls back to the spot rate.
#[derive(Debug, Clone, Default)]
pub struct StaticOracle {
    rates: BTreeMap<Pair, Decimal>,
    twaps: BTreeMap<Pair, Decimal>,
}

impl StaticOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_rate(&mut self, pair: Pair, rate: Decimal) {
        self.rates.insert(pair, rate);
    }

    pub fn set_twap(&mut self, pair: Pair, twap: Decimal) {
        self.twaps.insert(pair, twap);
    }

    pub fn with_price(mut self, pair: Pair, price: Decimal) -> Self {
        self.set_rate(pair, price);
        self
    }
}

impl OracleKeeper for StaticOracle {
    fn get_exchange_rate(&self, pair: &Pair) -> Result<Decimal, OracleError> {
        self.rates
            .get(pair)
            .copied()
            .ok_or_else(|| OracleError::NoPrice(pair.clone()))
    }

    fn get_exchange_rate_twap(&self, pair: &Pair) -> Result<Decimal, OracleError> {
        match self.twaps.get(pair) {
            Some(twap) => Ok(*twap),
            None => self.get_exchange_rate(pair),
        }
    }
}
