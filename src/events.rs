// 11.0: every state change produces an event. the engine keeps a bounded log
// of them; nothing in the core reads events back.

use crate::liquidation::LiquidationFailedReason;
use crate::market::MarketConfig;
use crate::types::{Address, Coin, Pair, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub block_height: u64,
    pub timestamp: Timestamp,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(id: EventId, block_height: u64, timestamp: Timestamp, payload: EventPayload) -> Self {
        Self {
            id,
            block_height,
            timestamp,
            payload,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventPayload {
    MarketCreated(MarketCreatedEvent),
    PositionChanged(PositionChangedEvent),
    PositionLiquidated(PositionLiquidatedEvent),
    LiquidationFailed(LiquidationFailedEvent),
    FundingRateChanged(FundingRateChangedEvent),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketCreatedEvent {
    pub pair: Pair,
    pub quote_reserve: Decimal,
    pub base_reserve: Decimal,
    pub peg_multiplier: Decimal,
    pub config: MarketConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionChangedEvent {
    pub pair: Pair,
    pub trader: Address,
    pub margin: Coin,
    pub position_notional: Decimal,
    pub exchanged_notional: Decimal,
    pub exchanged_size: Decimal,
    pub position_size: Decimal,
    pub realized_pnl: Decimal,
    pub unrealized_pnl_after: Decimal,
    pub bad_debt: Coin,
    pub funding_payment: Decimal,
    pub mark_price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionLiquidatedEvent {
    pub pair: Pair,
    pub trader: Address,
    pub liquidator: Address,
    pub exchanged_quote_amount: Decimal,
    pub exchanged_position_size: Decimal,
    pub fee_to_liquidator: Coin,
    pub fee_to_ecosystem_fund: Coin,
    pub bad_debt: Coin,
    pub margin: Coin,
    pub position_notional: Decimal,
    pub position_size: Decimal,
    pub unrealized_pnl: Decimal,
    pub mark_price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidationFailedEvent {
    pub pair: Pair,
    pub trader: Address,
    pub liquidator: Address,
    pub reason: LiquidationFailedReason,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingRateChangedEvent {
    pub pair: Pair,
    pub mark_price: Decimal,
    pub index_price: Decimal,
    pub latest_funding_rate: Decimal,
    pub latest_premium_fraction: Decimal,
    pub cumulative_premium_fraction: Decimal,
}
