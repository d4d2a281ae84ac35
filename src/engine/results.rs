// 8.0.2: result types and errors for engine operations.

use super::config::ConfigError;
use crate::amm::AmmError;
use crate::bank::BankError;
use crate::market::MarketError;
use crate::math::MathError;
use crate::oracle::OracleError;
use crate::position::Position;
use crate::types::{Address, Coin, Pair};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One entry of a batch liquidation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationRequest {
    pub pair: Pair,
    pub trader: Address,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiquidationOutcome {
    Success { liquidator_fee: Coin, perp_ef_fee: Coin },
    Failure { error: EngineError },
}

impl LiquidationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, LiquidationOutcome::Success { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryPositionResp {
    pub position: Position,
    pub position_notional: Decimal,
    pub unrealized_pnl: Decimal,
    pub margin_ratio: Decimal,
    pub block_number: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarginResp {
    pub position: Position,
    pub funding_payment: Decimal,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("pair {0} not found")]
    PairNotFound(Pair),

    #[error("market {0} already exists")]
    MarketAlreadyExists(Pair),

    #[error("market {0} is not enabled")]
    MarketNotEnabled(Pair),

    #[error("no position for {trader} on {pair}")]
    PositionNotFound { pair: Pair, trader: Address },

    #[error("position of {trader} on {pair} is healthy")]
    PositionHealthy { pair: Pair, trader: Address },

    #[error("margin ratio {ratio} is below maintenance {maintenance}")]
    MarginRatioTooLow { ratio: Decimal, maintenance: Decimal },

    #[error("position would carry bad debt {0}")]
    BadDebt(Decimal),

    #[error("removing {amount} would leave margin {remaining}")]
    FailedRemoveMargin { amount: Decimal, remaining: Decimal },

    #[error("adding {amount} still leaves margin {remaining}")]
    FailedAddMargin { amount: Decimal, remaining: Decimal },

    #[error("leverage {leverage} above max {max}")]
    LeverageTooHigh { leverage: Decimal, max: Decimal },

    #[error("margin must be positive, got {0}")]
    NonPositiveMargin(Decimal),

    #[error("leverage must be positive, got {0}")]
    NonPositiveLeverage(Decimal),

    #[error("amount must be positive, got {0}")]
    NonPositiveAmount(Decimal),

    #[error("expected denom {expected}, got {got}")]
    InvalidDenom { expected: String, got: String },

    #[error("open notional would be negative: {0}")]
    NegativeOpenNotional(Decimal),

    #[error("reverse trade closed {closed} base, more than the limit {limit}")]
    BaseLimitExceeded { limit: Decimal, closed: Decimal },

    #[error("closing returned {closed} quote, more than the {notional} requested")]
    ReverseNotionalTooSmall { notional: Decimal, closed: Decimal },

    #[error("no snapshot to compute a twap for {0}")]
    NoValidTwap(Pair),

    #[error("{count} liquidations failed")]
    AllLiquidationsFailed {
        count: usize,
        outcomes: Vec<LiquidationOutcome>,
    },

    #[error("no open scope")]
    NoOpenScope,

    #[error("amm error: {0}")]
    Amm(#[from] AmmError),

    #[error("market error: {0}")]
    Market(#[from] MarketError),

    #[error("bank error: {0}")]
    Bank(#[from] BankError),

    #[error("oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("math error: {0}")]
    Math(#[from] MathError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}
