//! Position lifecycle: open, reverse, close, margin changes and queries.
//!
//! Every public entry point runs in its own scope. The internal helpers
//! (`increase_position`, `decrease_position`, `close_position_entirely`,
//! `open_reverse_position`) swap against the pool and return a [`PositionResp`];
//! `after_position_update` then checks the result and settles margin with the vault.

use super::core::Engine;
use super::results::{EngineError, MarginResp, QueryPositionResp};
use crate::bank::{BankKeeper, VAULT_MODULE};
use crate::epochs::EpochKeeper;
use crate::events::{EventPayload, PositionChangedEvent};
use crate::math::{checked_mul, mul, quo, round_int};
use crate::oracle::OracleKeeper;
use crate::position::{
    funding_payment, position_notional_spot, remaining_margin, unrealized_pnl,
    Position, PositionResp,
};
use crate::types::{Address, Coin, Direction, Pair};
use rust_decimal::Decimal;
use tracing::debug;

impl<B, O, E> Engine<B, O, E>
where
    B: BankKeeper + Clone,
    O: OracleKeeper,
    E: EpochKeeper,
{
    /// Open or extend a position, or trade against an existing one.
    ///
    /// `margin` is quote asset and `margin * leverage` is the notional traded.
    /// A trade in the existing position's direction increases it. A trade the
    /// other way decreases it, or closes it and opens the remainder on the other
    /// side when the notional is at least the position's current value.
    pub fn open_position(
        &mut self,
        pair: &Pair,
        trader: &Address,
        direction: Direction,
        margin: Decimal,
        leverage: Decimal,
        base_limit: Decimal,
    ) -> Result<PositionResp, EngineError> {
        self.in_scope(|engine| {
            let market = engine.market(pair)?;
            if !market.enabled {
                return Err(EngineError::MarketNotEnabled(pair.clone()));
            }
            if margin <= Decimal::ZERO {
                return Err(EngineError::NonPositiveMargin(margin));
            }
            if leverage <= Decimal::ZERO {
                return Err(EngineError::NonPositiveLeverage(leverage));
            }
            if leverage > market.config.max_leverage {
                return Err(EngineError::LeverageTooHigh {
                    leverage,
                    max: market.config.max_leverage,
                });
            }

            let position = engine.state.position(pair, trader).cloned().unwrap_or_else(|| {
                Position::zero(
                    pair.clone(),
                    trader.clone(),
                    market.latest_cumulative_premium_fraction,
                    engine.block_height,
                )
            });
            let notional = checked_mul(margin, leverage)?;

            let resp = match position.direction() {
                Some(side) if side != direction => {
                    engine.open_reverse_position(position, notional, leverage, base_limit)?
                }
                _ => engine.increase_position(position, direction, notional, base_limit, leverage)?,
            };
            if resp.bad_debt > Decimal::ZERO {
                return Err(EngineError::BadDebt(resp.bad_debt));
            }

            engine.after_position_update(&resp)?;
            debug!(%pair, %trader, ?direction, %notional, size = %resp.position.size, "position opened");
            Ok(resp)
        })
    }

    /// Close the whole position at any price. Bad debt goes to the ecosystem fund.
    pub fn close_position(&mut self, pair: &Pair, trader: &Address) -> Result<PositionResp, EngineError> {
        self.in_scope(|engine| {
            let position = engine.existing_position(pair, trader)?;
            let resp = engine.close_position_entirely(position, Decimal::ZERO, false)?;
            if resp.bad_debt > Decimal::ZERO {
                engine.realize_bad_debt(pair, round_int(resp.bad_debt))?;
            }
            engine.after_position_update(&resp)?;
            debug!(%pair, %trader, realized_pnl = %resp.realized_pnl, "position closed");
            Ok(resp)
        })
    }

    /// Move `margin` from the trader into the position, settling funding first.
    pub fn add_margin(&mut self, pair: &Pair, trader: &Address, margin: Coin) -> Result<MarginResp, EngineError> {
        self.in_scope(|engine| {
            let market = engine.market(pair)?;
            check_margin_coin(pair, &margin)?;
            let mut position = engine.existing_position(pair, trader)?;

            engine
                .bank
                .send_coins_from_account_to_module(trader, VAULT_MODULE, &[margin.clone()])?;

            let funding = funding_payment(&position, market.latest_cumulative_premium_fraction);
            let remaining = position.margin + margin.amount - funding;
            if remaining < Decimal::ZERO {
                return Err(EngineError::FailedAddMargin {
                    amount: margin.amount,
                    remaining,
                });
            }
            position.margin = remaining;
            position.latest_cumulative_premium_fraction = market.latest_cumulative_premium_fraction;
            position.last_updated_block_number = engine.block_height;
            engine.state.insert_position(position.clone());

            engine.emit_margin_change(&position, funding)?;
            Ok(MarginResp {
                position,
                funding_payment: funding,
            })
        })
    }

    /// Pay `margin` out of the position. Fails when that leaves the position
    /// below maintenance margin.
    pub fn remove_margin(
        &mut self,
        pair: &Pair,
        trader: &Address,
        margin: Coin,
    ) -> Result<MarginResp, EngineError> {
        self.in_scope(|engine| {
            let market = engine.market(pair)?;
            check_margin_coin(pair, &margin)?;
            let mut position = engine.existing_position(pair, trader)?;

            let funding = funding_payment(&position, market.latest_cumulative_premium_fraction);
            let remaining = position.margin - funding - margin.amount;
            if remaining < Decimal::ZERO {
                return Err(EngineError::FailedRemoveMargin {
                    amount: margin.amount,
                    remaining,
                });
            }
            position.margin = remaining;
            position.latest_cumulative_premium_fraction = market.latest_cumulative_premium_fraction;
            position.last_updated_block_number = engine.block_height;

            let ratio = engine.best_margin_ratio(&position)?;
            if ratio < market.config.maintenance_margin_ratio {
                return Err(EngineError::MarginRatioTooLow {
                    ratio,
                    maintenance: market.config.maintenance_margin_ratio,
                });
            }

            engine.withdraw(pair, trader, round_int(margin.amount))?;
            engine.state.insert_position(position.clone());

            engine.emit_margin_change(&position, funding)?;
            Ok(MarginResp {
                position,
                funding_payment: funding,
            })
        })
    }

    pub fn query_position(&self, pair: &Pair, trader: &Address) -> Result<QueryPositionResp, EngineError> {
        let position = self.existing_position(pair, trader)?;
        self.describe_position(position)
    }

    /// Every open position of `trader`, in pair order.
    pub fn query_positions(&self, trader: &Address) -> Result<Vec<QueryPositionResp>, EngineError> {
        self.state
            .positions_of(trader)
            .cloned()
            .map(|position| self.describe_position(position))
            .collect()
    }

    /// Write a position record directly, as a genesis import would.
    pub fn insert_position(&mut self, position: Position) -> Result<(), EngineError> {
        self.market(&position.pair)?;
        self.state.insert_position(position);
        Ok(())
    }

    fn describe_position(&self, position: Position) -> Result<QueryPositionResp, EngineError> {
        let position_notional = self.position_notional(&position)?;
        let unrealized = unrealized_pnl(&position, position_notional);
        let ratio = self.best_margin_ratio(&position)?;
        Ok(QueryPositionResp {
            position,
            position_notional,
            unrealized_pnl: unrealized,
            margin_ratio: ratio,
            block_number: self.block_height,
        })
    }

    pub(super) fn existing_position(&self, pair: &Pair, trader: &Address) -> Result<Position, EngineError> {
        self.state
            .position(pair, trader)
            .cloned()
            .ok_or_else(|| EngineError::PositionNotFound {
                pair: pair.clone(),
                trader: trader.clone(),
            })
    }

    // 8.8.1: buy more in the position's direction. pnl is read off the pool after
    // the swap, against the position as it was before.
    pub(super) fn increase_position(
        &mut self,
        position: Position,
        direction: Direction,
        increased_notional: Decimal,
        base_limit: Decimal,
        leverage: Decimal,
    ) -> Result<PositionResp, EngineError> {
        let pair = position.pair.clone();
        let market = self.market(&pair)?;
        let (pool, base_amount) =
            self.swap_quote_for_base(&pair, direction, increased_notional, base_limit, false)?;
        let exchanged_size = direction.sign() * base_amount;

        let margin_increase = quo(increased_notional, leverage);
        let remaining = remaining_margin(
            &position,
            margin_increase,
            market.latest_cumulative_premium_fraction,
        );
        let position_notional = position_notional_spot(&pool, &position)?;
        let unrealized = unrealized_pnl(&position, position_notional);

        Ok(PositionResp {
            position: Position {
                size: position.size + exchanged_size,
                margin: remaining.margin,
                open_notional: position.open_notional + increased_notional,
                latest_cumulative_premium_fraction: market.latest_cumulative_premium_fraction,
                last_updated_block_number: self.block_height,
                pair: position.pair,
                trader: position.trader,
            },
            exchanged_notional_value: increased_notional,
            exchanged_position_size: exchanged_size,
            bad_debt: remaining.bad_debt,
            funding_payment: remaining.funding_payment,
            realized_pnl: Decimal::ZERO,
            unrealized_pnl_after: unrealized,
            margin_to_vault: margin_increase,
            position_notional: position_notional + increased_notional,
        })
    }

    // 8.8.2: sell `reduced_notional` worth of the position back to the pool. pnl
    // is realized in proportion to the base sold. persists the result.
    pub(super) fn decrease_position(
        &mut self,
        position: Position,
        reduced_notional: Decimal,
        base_limit: Decimal,
        skip_fluctuation_check: bool,
    ) -> Result<PositionResp, EngineError> {
        if position.is_empty() {
            return Err(EngineError::PositionNotFound {
                pair: position.pair,
                trader: position.trader,
            });
        }
        let pair = position.pair.clone();
        let market = self.market(&pair)?;
        let old_notional = self.position_notional(&position)?;
        let unrealized = unrealized_pnl(&position, old_notional);

        let direction = position.reducing_quote_direction();
        let (_, base_amount) = self.swap_quote_for_base(
            &pair,
            direction,
            reduced_notional,
            base_limit,
            skip_fluctuation_check,
        )?;
        let exchanged_size = direction.sign() * base_amount;

        let realized = quo(mul(unrealized, exchanged_size.abs()), position.size.abs());
        let remaining = remaining_margin(&position, realized, market.latest_cumulative_premium_fraction);
        let unrealized_after = unrealized - realized;
        let position_notional = (old_notional - reduced_notional).abs();

        // long: pnl = notional - open, short: pnl = open - notional
        let open_notional = if position.size > Decimal::ZERO {
            position_notional - unrealized_after
        } else {
            position_notional + unrealized_after
        };
        if open_notional < Decimal::ZERO {
            return Err(EngineError::NegativeOpenNotional(open_notional));
        }

        let updated = Position {
            size: position.size + exchanged_size,
            margin: remaining.margin,
            open_notional,
            latest_cumulative_premium_fraction: market.latest_cumulative_premium_fraction,
            last_updated_block_number: self.block_height,
            pair: position.pair,
            trader: position.trader,
        };
        if updated.is_empty() {
            self.state.remove_position(&updated.pair, &updated.trader);
        } else {
            self.state.insert_position(updated.clone());
        }

        Ok(PositionResp {
            position: updated,
            exchanged_notional_value: reduced_notional,
            exchanged_position_size: exchanged_size,
            bad_debt: remaining.bad_debt,
            funding_payment: remaining.funding_payment,
            realized_pnl: realized,
            unrealized_pnl_after: unrealized_after,
            margin_to_vault: Decimal::ZERO,
            position_notional,
        })
    }

    // 8.8.3: hand all base back to the pool. the margin left after pnl and funding
    // is owed to the trader (negative margin_to_vault), a shortfall is bad debt.
    pub(super) fn close_position_entirely(
        &mut self,
        position: Position,
        quote_limit: Decimal,
        skip_fluctuation_check: bool,
    ) -> Result<PositionResp, EngineError> {
        if position.is_empty() {
            return Err(EngineError::PositionNotFound {
                pair: position.pair,
                trader: position.trader,
            });
        }
        let pair = position.pair.clone();
        let market = self.market(&pair)?;
        let position_notional = self.position_notional(&position)?;
        let unrealized = unrealized_pnl(&position, position_notional);
        let remaining = remaining_margin(&position, unrealized, market.latest_cumulative_premium_fraction);

        let (_, quote_amount) = self.swap_base_for_quote(
            &pair,
            position.closing_base_direction(),
            position.size.abs(),
            quote_limit,
            skip_fluctuation_check,
        )?;
        self.state.remove_position(&pair, &position.trader);

        Ok(PositionResp {
            exchanged_notional_value: quote_amount,
            exchanged_position_size: -position.size,
            bad_debt: remaining.bad_debt,
            funding_payment: remaining.funding_payment,
            realized_pnl: unrealized,
            unrealized_pnl_after: Decimal::ZERO,
            margin_to_vault: -remaining.margin,
            position_notional: Decimal::ZERO,
            position: Position::zero(
                pair,
                position.trader,
                market.latest_cumulative_premium_fraction,
                self.block_height,
            ),
        })
    }

    // 8.8.4: trade against the position. smaller than its value: decrease.
    // otherwise close it and open what is left of the notional the other way.
    pub(super) fn open_reverse_position(
        &mut self,
        position: Position,
        notional: Decimal,
        leverage: Decimal,
        base_limit: Decimal,
    ) -> Result<PositionResp, EngineError> {
        let current_notional = self.position_notional(&position)?;
        if current_notional > notional {
            return self.decrease_position(position, notional, base_limit, false);
        }

        let direction = position.reducing_quote_direction();
        let closed = self.close_position_entirely(position.clone(), Decimal::ZERO, false)?;
        if closed.bad_debt > Decimal::ZERO {
            return Err(EngineError::BadDebt(closed.bad_debt));
        }

        let remaining_notional = notional - closed.exchanged_notional_value;
        if remaining_notional < Decimal::ZERO {
            return Err(EngineError::ReverseNotionalTooSmall {
                notional,
                closed: closed.exchanged_notional_value,
            });
        }
        if remaining_notional.is_zero() {
            return Ok(closed);
        }

        let closed_size = closed.exchanged_position_size.abs();
        let reverse_limit = if base_limit > Decimal::ZERO {
            base_limit - closed_size
        } else {
            base_limit
        };
        if reverse_limit < Decimal::ZERO {
            return Err(EngineError::BaseLimitExceeded {
                limit: base_limit,
                closed: closed_size,
            });
        }

        let fresh = Position::zero(
            position.pair,
            position.trader,
            closed.position.latest_cumulative_premium_fraction,
            self.block_height,
        );
        let opened = self.increase_position(fresh, direction, remaining_notional, reverse_limit, leverage)?;

        Ok(PositionResp {
            exchanged_notional_value: closed.exchanged_notional_value + opened.exchanged_notional_value,
            exchanged_position_size: closed.exchanged_position_size + opened.exchanged_position_size,
            bad_debt: closed.bad_debt + opened.bad_debt,
            funding_payment: closed.funding_payment + opened.funding_payment,
            realized_pnl: closed.realized_pnl + opened.realized_pnl,
            unrealized_pnl_after: Decimal::ZERO,
            margin_to_vault: closed.margin_to_vault + opened.margin_to_vault,
            position_notional: opened.position_notional,
            position: opened.position,
        })
    }

    // 8.8.5: persist, check maintenance margin, settle margin with the vault, emit
    pub(super) fn after_position_update(&mut self, resp: &PositionResp) -> Result<(), EngineError> {
        let position = &resp.position;
        let pair = &position.pair;

        if !position.is_empty() {
            self.state.insert_position(position.clone());
            let market = self.market(pair)?;
            let ratio = self.best_margin_ratio(position)?;
            if ratio < market.config.maintenance_margin_ratio {
                return Err(EngineError::MarginRatioTooLow {
                    ratio,
                    maintenance: market.config.maintenance_margin_ratio,
                });
            }
        }

        let margin_to_vault = round_int(resp.margin_to_vault);
        if margin_to_vault > Decimal::ZERO {
            self.bank.send_coins_from_account_to_module(
                &position.trader,
                VAULT_MODULE,
                &[Coin::new(pair.quote_denom(), margin_to_vault)],
            )?;
        } else if margin_to_vault < Decimal::ZERO {
            self.withdraw(pair, &position.trader, -margin_to_vault)?;
        }

        self.emit_position_changed(resp)
    }

    pub(super) fn emit_position_changed(&mut self, resp: &PositionResp) -> Result<(), EngineError> {
        let pair = resp.position.pair.clone();
        let mark_price = self.mark_price(&pair)?;
        let denom = pair.quote_denom().to_string();
        self.emit_event(EventPayload::PositionChanged(PositionChangedEvent {
            trader: resp.position.trader.clone(),
            margin: Coin::new(denom.clone(), round_int(resp.position.margin)),
            position_notional: resp.position_notional,
            exchanged_notional: resp.exchanged_notional_value,
            exchanged_size: resp.exchanged_position_size,
            position_size: resp.position.size,
            realized_pnl: resp.realized_pnl,
            unrealized_pnl_after: resp.unrealized_pnl_after,
            bad_debt: Coin::new(denom, round_int(resp.bad_debt)),
            funding_payment: resp.funding_payment,
            mark_price,
            pair,
        }));
        Ok(())
    }

    fn emit_margin_change(&mut self, position: &Position, funding: Decimal) -> Result<(), EngineError> {
        let position_notional = self.position_notional(position)?;
        let mut resp = PositionResp::empty(position.clone());
        resp.funding_payment = funding;
        resp.position_notional = position_notional;
        resp.unrealized_pnl_after = unrealized_pnl(position, position_notional);
        self.emit_position_changed(&resp)
    }
}

fn check_margin_coin(pair: &Pair, margin: &Coin) -> Result<(), EngineError> {
    if margin.denom != pair.quote_denom() {
        return Err(EngineError::InvalidDenom {
            expected: pair.quote_denom().to_string(),
            got: margin.denom.clone(),
        });
    }
    if margin.amount <= Decimal::ZERO {
        return Err(EngineError::NonPositiveAmount(margin.amount));
    }
    Ok(())
}
