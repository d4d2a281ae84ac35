// 1.0: all the primitives live here. pairs, addresses, directions, coins, timestamps.
// each is a newtype so the compiler catches mixups between a trader and a denom.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// 1.1: trading pair. displayed and parsed as "base:quote", e.g. "ubtc:unusd".
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Pair {
    base: String,
    quote: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid pair {0:?}: expected base:quote")]
pub struct ParsePairError(pub String);

impl Pair {
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            quote: quote.into(),
        }
    }

    pub fn base_denom(&self) -> &str {
        &self.base
    }

    pub fn quote_denom(&self) -> &str {
        &self.quote
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.base, self.quote)
    }
}

impl FromStr for Pair {
    type Err = ParsePairError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((base, quote)) if !base.is_empty() && !quote.is_empty() && !quote.contains(':') => {
                Ok(Self::new(base, quote))
            }
            _ => Err(ParsePairError(s.to_string())),
        }
    }
}

// 1.2: account address. module accounts (vault, ecosystem fund) live in the same space.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(String);

impl Address {
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }

    pub fn module(name: &str) -> Self {
        Self(format!("module/{name}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// 1.3: swap direction. on the quote side Long adds quote to the reserves (trader buys base).
// on the base side Long adds base to the reserves, which is how a long position is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn opposite(&self) -> Self {
        match self {
            Direction::Long => Direction::Short,
            Direction::Short => Direction::Long,
        }
    }

    /// Side of a signed position size. None for an empty position.
    pub fn of_size(size: Decimal) -> Option<Self> {
        if size > Decimal::ZERO {
            Some(Direction::Long)
        } else if size < Decimal::ZERO {
            Some(Direction::Short)
        } else {
            None
        }
    }

    pub fn sign(&self) -> Decimal {
        match self {
            Direction::Long => Decimal::ONE,
            Direction::Short => Decimal::NEGATIVE_ONE,
        }
    }
}

// 1.4: a whole-unit amount of one denom. what actually moves through the bank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    pub amount: Decimal,
}

impl Coin {
    pub fn new(denom: impl Into<String>, amount: Decimal) -> Self {
        Self {
            denom: denom.into(),
            amount,
        }
    }

    pub fn zero(denom: impl Into<String>) -> Self {
        Self::new(denom, Decimal::ZERO)
    }

    pub fn is_positive(&self) -> bool {
        self.amount > Decimal::ZERO
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

// 1.5: millisecond block timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn from_millis(ms: i64) -> Self {
        Self(ms)
    }

    pub fn as_millis(&self) -> i64 {
        self.0
    }

    pub fn saturating_sub(&self, window: chrono::Duration) -> Timestamp {
        Self(self.0.saturating_sub(window.num_milliseconds()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn pair_round_trips_through_display() {
        let pair: Pair = "ubtc:unusd".parse().unwrap();
        assert_eq!(pair.base_denom(), "ubtc");
        assert_eq!(pair.quote_denom(), "unusd");
        assert_eq!(pair.to_string(), "ubtc:unusd");
    }

    #[test]
    fn pair_rejects_malformed() {
        assert!("ubtc".parse::<Pair>().is_err());
        assert!(":unusd".parse::<Pair>().is_err());
        assert!("a:b:c".parse::<Pair>().is_err());
    }

    #[test]
    fn pairs_order_by_base_then_quote() {
        let btc = Pair::new("ubtc", "unusd");
        let eth = Pair::new("ueth", "unusd");
        assert!(btc < eth);
    }

    #[test]
    fn direction_from_size() {
        assert_eq!(Direction::of_size(dec!(3)), Some(Direction::Long));
        assert_eq!(Direction::of_size(dec!(-3)), Some(Direction::Short));
        assert_eq!(Direction::of_size(Decimal::ZERO), None);
        assert_eq!(Direction::Long.opposite(), Direction::Short);
        assert_eq!(Direction::Short.sign(), dec!(-1));
    }

    #[test]
    fn module_addresses_are_namespaced() {
        assert_eq!(Address::module("vault").as_str(), "module/vault");
        assert_ne!(Address::module("vault"), Address::new("vault"));
    }

    #[test]
    fn timestamp_window_start() {
        let now = Timestamp::from_millis(10_000);
        let start = now.saturating_sub(chrono::Duration::seconds(4));
        assert_eq!(start.as_millis(), 6_000);

        let floor = Timestamp::from_millis(i64::MIN + 1).saturating_sub(chrono::Duration::seconds(4));
        assert_eq!(floor.as_millis(), i64::MIN);
    }
}
