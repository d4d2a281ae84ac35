//! Market configuration and state.
//!
//! A market is one pair's risk parameters plus the running accounting
//! (open interest, cumulative funding, prepaid bad debt). Its reserves live
//! in the matching [`Pool`](crate::amm::Pool).

use crate::types::Pair;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarketError {
    #[error("invalid market config: {field} = {value}")]
    InvalidConfig { field: &'static str, value: Decimal },
}

/// Static risk parameters of a market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Max share of either reserve a single swap may move.
    pub trade_limit_ratio: Decimal,
    /// Max relative move of the mark price against the latest snapshot.
    pub fluctuation_limit_ratio: Decimal,
    /// Max relative spread between mark and oracle price.
    pub max_oracle_spread_ratio: Decimal,
    pub maintenance_margin_ratio: Decimal,
    pub max_leverage: Decimal,
    pub liquidation_fee_ratio: Decimal,
    /// Share of a position closed by a partial liquidation.
    pub partial_liquidation_ratio: Decimal,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            trade_limit_ratio: Decimal::ONE,
            fluctuation_limit_ratio: Decimal::ONE,
            max_oracle_spread_ratio: Decimal::ONE,
            maintenance_margin_ratio: dec!(0.0625),
            max_leverage: dec!(10),
            liquidation_fee_ratio: dec!(0.05),
            partial_liquidation_ratio: dec!(0.5),
        }
    }
}

impl MarketConfig {
    pub fn with_trade_limit_ratio(mut self, ratio: Decimal) -> Self {
        self.trade_limit_ratio = ratio;
        self
    }

    pub fn with_fluctuation_limit_ratio(mut self, ratio: Decimal) -> Self {
        self.fluctuation_limit_ratio = ratio;
        self
    }

    pub fn with_max_oracle_spread_ratio(mut self, ratio: Decimal) -> Self {
        self.max_oracle_spread_ratio = ratio;
        self
    }

    pub fn with_maintenance_margin_ratio(mut self, ratio: Decimal) -> Self {
        self.maintenance_margin_ratio = ratio;
        self
    }

    pub fn with_max_leverage(mut self, leverage: Decimal) -> Self {
        self.max_leverage = leverage;
        self
    }

    pub fn with_liquidation_fee_ratio(mut self, ratio: Decimal) -> Self {
        self.liquidation_fee_ratio = ratio;
        self
    }

    pub fn with_partial_liquidation_ratio(mut self, ratio: Decimal) -> Self {
        self.partial_liquidation_ratio = ratio;
        self
    }

    /// Every ratio must lie in [0, 1] and max leverage must be at least 1.
    pub fn validate(&self) -> Result<(), MarketError> {
        let ratios = [
            ("trade_limit_ratio", self.trade_limit_ratio),
            ("fluctuation_limit_ratio", self.fluctuation_limit_ratio),
            ("max_oracle_spread_ratio", self.max_oracle_spread_ratio),
            ("maintenance_margin_ratio", self.maintenance_margin_ratio),
            ("liquidation_fee_ratio", self.liquidation_fee_ratio),
            ("partial_liquidation_ratio", self.partial_liquidation_ratio),
        ];
        for (field, value) in ratios {
            if value < Decimal::ZERO || value > Decimal::ONE {
                return Err(MarketError::InvalidConfig { field, value });
            }
        }
        if self.max_leverage < Decimal::ONE {
            return Err(MarketError::InvalidConfig {
                field: "max_leverage",
                value: self.max_leverage,
            });
        }
        Ok(())
    }
}

/// Per-pair market record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Market {
    pub pair: Pair,
    pub config: MarketConfig,
    pub enabled: bool,
    /// Epoch identifier whose end triggers funding for this market.
    pub funding_rate_epoch_id: String,
    pub twap_lookback_window_ms: i64,
    /// Only ever added to by the funding hook.
    pub latest_cumulative_premium_fraction: Decimal,
    pub total_long: Decimal,
    pub total_short: Decimal,
    /// Quote already advanced from the ecosystem fund to the vault.
    pub prepaid_bad_debt: Decimal,
}

impl Market {
    pub fn new(
        pair: Pair,
        config: MarketConfig,
        funding_rate_epoch_id: impl Into<String>,
        twap_lookback_window: chrono::Duration,
    ) -> Self {
        Self {
            pair,
            config,
            enabled: true,
            funding_rate_epoch_id: funding_rate_epoch_id.into(),
            twap_lookback_window_ms: twap_lookback_window.num_milliseconds(),
            latest_cumulative_premium_fraction: Decimal::ZERO,
            total_long: Decimal::ZERO,
            total_short: Decimal::ZERO,
            prepaid_bad_debt: Decimal::ZERO,
        }
    }

    pub fn twap_lookback_window(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.twap_lookback_window_ms)
    }

    /// Net base exposure taken from the pool.
    pub fn bias(&self) -> Decimal {
        self.total_long - self.total_short
    }
}
