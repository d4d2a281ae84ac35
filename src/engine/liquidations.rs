//! Liquidation execution.
//!
//! One attempt runs in its own scope. When it fails the scope is rolled back
//! and, for lookup failures and healthy positions, a `LiquidationFailed` event
//! is emitted afterwards so the rejection stays on record.

use super::core::Engine;
use super::results::{EngineError, LiquidationOutcome, LiquidationRequest};
use crate::bank::{BankKeeper, PERP_EF_MODULE, VAULT_MODULE};
use crate::epochs::EpochKeeper;
use crate::events::{EventPayload, LiquidationFailedEvent, PositionLiquidatedEvent};
use crate::liquidation::{
    is_liquidatable, liquidation_kind, split_full_liquidation, split_partial_liquidation,
    LiquidateResp, LiquidationFailedReason, LiquidationKind,
};
use crate::market::Market;
use crate::math::{mul, round_int};
use crate::oracle::OracleKeeper;
use crate::position::{margin_ratio, Position};
use crate::types::{Address, Coin, Pair};
use rust_decimal::Decimal;
use tracing::{debug, warn};

impl<B, O, E> Engine<B, O, E>
where
    B: BankKeeper + Clone,
    O: OracleKeeper,
    E: EpochKeeper,
{
    /// Liquidate `trader`'s position on `pair` if it is below maintenance margin.
    pub fn liquidate(
        &mut self,
        liquidator: &Address,
        pair: &Pair,
        trader: &Address,
    ) -> Result<LiquidateResp, EngineError> {
        let result = self.in_scope(|engine| engine.execute_liquidation(liquidator, pair, trader));

        if let Err(err) = &result {
            if let Some(reason) = failure_reason(err) {
                self.emit_event(EventPayload::LiquidationFailed(LiquidationFailedEvent {
                    pair: pair.clone(),
                    trader: trader.clone(),
                    liquidator: liquidator.clone(),
                    reason,
                }));
            }
            warn!(%pair, %trader, %liquidator, error = %err, "liquidation failed");
        }
        result
    }

    /// Liquidate each request independently. Fails only if every one of them failed.
    pub fn multi_liquidate(
        &mut self,
        liquidator: &Address,
        requests: &[LiquidationRequest],
    ) -> Result<Vec<LiquidationOutcome>, EngineError> {
        let mut outcomes = Vec::with_capacity(requests.len());
        for request in requests {
            let outcome = match self.liquidate(liquidator, &request.pair, &request.trader) {
                Ok(resp) => {
                    let denom = request.pair.quote_denom();
                    LiquidationOutcome::Success {
                        liquidator_fee: Coin::new(denom, resp.fee_to_liquidator),
                        perp_ef_fee: Coin::new(denom, resp.fee_to_perp_ecosystem_fund),
                    }
                }
                Err(error) => LiquidationOutcome::Failure { error },
            };
            outcomes.push(outcome);
        }

        if !outcomes.iter().any(LiquidationOutcome::is_success) {
            return Err(EngineError::AllLiquidationsFailed {
                count: requests.len(),
                outcomes,
            });
        }
        Ok(outcomes)
    }

    fn execute_liquidation(
        &mut self,
        liquidator: &Address,
        pair: &Pair,
        trader: &Address,
    ) -> Result<LiquidateResp, EngineError> {
        let market = self.market(pair)?;
        self.pool(pair)?;
        let position = self.existing_position(pair, trader)?;
        let cpf = market.latest_cumulative_premium_fraction;

        // eligibility on the trader-friendly notional, severity on spot
        let spot_notional = self.position_notional(&position)?;
        let twap_notional = self.position_notional_twap(&position, market.twap_lookback_window())?;
        let ratio = margin_ratio(&position, spot_notional.max(twap_notional), cpf);
        if !is_liquidatable(ratio, market.config.maintenance_margin_ratio) {
            return Err(EngineError::PositionHealthy {
                pair: pair.clone(),
                trader: trader.clone(),
            });
        }

        let spot_ratio = margin_ratio(&position, spot_notional, cpf);
        let kind = liquidation_kind(spot_ratio, market.config.liquidation_fee_ratio);
        debug!(%pair, %trader, %ratio, %spot_ratio, ?kind, "liquidating");
        match kind {
            LiquidationKind::Partial => self.execute_partial_liquidation(&market, liquidator, position),
            LiquidationKind::Full => self.execute_full_liquidation(&market, liquidator, position),
        }
    }

    fn execute_full_liquidation(
        &mut self,
        market: &Market,
        liquidator: &Address,
        position: Position,
    ) -> Result<LiquidateResp, EngineError> {
        let pair = market.pair.clone();
        let resp = self.close_position_entirely(position, Decimal::ZERO, true)?;

        let remain_margin = resp.margin_to_vault.abs();
        let split = split_full_liquidation(
            remain_margin,
            resp.exchanged_notional_value,
            resp.bad_debt,
            market.config.liquidation_fee_ratio,
        );

        let bad_debt = round_int(split.bad_debt);
        if bad_debt > Decimal::ZERO {
            self.realize_bad_debt(&pair, bad_debt)?;
        }

        let liquidate_resp = LiquidateResp {
            kind: LiquidationKind::Full,
            liquidator: liquidator.clone(),
            bad_debt,
            fee_to_liquidator: round_int(split.fee_to_liquidator),
            fee_to_perp_ecosystem_fund: round_int(split.fee_to_ecosystem_fund),
            position_resp: resp,
        };
        self.distribute_liquidate_rewards(&pair, &liquidate_resp)?;
        self.emit_position_liquidated(&liquidate_resp)?;
        Ok(liquidate_resp)
    }

    // sells partial_liquidation_ratio of the base back to the pool and takes the
    // fee out of what margin is left
    fn execute_partial_liquidation(
        &mut self,
        market: &Market,
        liquidator: &Address,
        position: Position,
    ) -> Result<LiquidateResp, EngineError> {
        let pair = market.pair.clone();
        let pool = self.pool(&pair)?;
        let base_amount = mul(position.size, market.config.partial_liquidation_ratio).abs();
        let quote_reserve_delta =
            pool.quote_amount_for_base(base_amount, position.closing_base_direction())?;
        let quote_asset_delta = pool.to_quote_asset(quote_reserve_delta);

        let mut resp = self.decrease_position(position, quote_asset_delta, Decimal::ZERO, true)?;

        let split = split_partial_liquidation(quote_asset_delta, market.config.liquidation_fee_ratio);
        resp.position.margin -= split.fee;
        if !resp.position.is_empty() {
            self.state.insert_position(resp.position.clone());
        }

        let liquidate_resp = LiquidateResp {
            kind: LiquidationKind::Partial,
            liquidator: liquidator.clone(),
            bad_debt: Decimal::ZERO,
            fee_to_liquidator: round_int(split.fee_to_liquidator),
            fee_to_perp_ecosystem_fund: round_int(split.fee_to_ecosystem_fund),
            position_resp: resp,
        };
        self.distribute_liquidate_rewards(&pair, &liquidate_resp)?;
        self.emit_position_liquidated(&liquidate_resp)?;
        Ok(liquidate_resp)
    }

    // ecosystem fund share leaves the vault first, then the liquidator is paid
    fn distribute_liquidate_rewards(&mut self, pair: &Pair, resp: &LiquidateResp) -> Result<(), EngineError> {
        let denom = pair.quote_denom();
        if resp.fee_to_perp_ecosystem_fund > Decimal::ZERO {
            self.bank.send_coins_from_module_to_module(
                VAULT_MODULE,
                PERP_EF_MODULE,
                &[Coin::new(denom, resp.fee_to_perp_ecosystem_fund)],
            )?;
        }
        if resp.fee_to_liquidator > Decimal::ZERO {
            self.withdraw(pair, &resp.liquidator, resp.fee_to_liquidator)?;
        }
        Ok(())
    }

    fn emit_position_liquidated(&mut self, resp: &LiquidateResp) -> Result<(), EngineError> {
        let position_resp = &resp.position_resp;
        let pair = position_resp.position.pair.clone();
        let mark_price = self.mark_price(&pair)?;
        let denom = pair.quote_denom().to_string();
        self.emit_event(EventPayload::PositionLiquidated(PositionLiquidatedEvent {
            trader: position_resp.position.trader.clone(),
            liquidator: resp.liquidator.clone(),
            exchanged_quote_amount: position_resp.exchanged_notional_value,
            exchanged_position_size: position_resp.exchanged_position_size,
            fee_to_liquidator: Coin::new(denom.clone(), resp.fee_to_liquidator),
            fee_to_ecosystem_fund: Coin::new(denom.clone(), resp.fee_to_perp_ecosystem_fund),
            bad_debt: Coin::new(denom.clone(), resp.bad_debt),
            margin: Coin::new(denom, round_int(position_resp.position.margin)),
            position_notional: position_resp.position_notional,
            position_size: position_resp.position.size,
            unrealized_pnl: position_resp.unrealized_pnl_after,
            mark_price,
            pair,
        }));
        Ok(())
    }
}

fn failure_reason(err: &EngineError) -> Option<LiquidationFailedReason> {
    match err {
        EngineError::PairNotFound(_) => Some(LiquidationFailedReason::NonexistentPair),
        EngineError::PositionNotFound { .. } => Some(LiquidationFailedReason::NonexistentPosition),
        EngineError::PositionHealthy { .. } => Some(LiquidationFailedReason::PositionHealthy),
        _ => None,
    }
}
