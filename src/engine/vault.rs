// 8.7 engine/vault.rs: quote custody. the vault holds all trader margin, the
// ecosystem fund backs it. amounts here are whole coin units.

use super::core::Engine;
use super::results::EngineError;
use crate::bank::{BankKeeper, PERP_EF_MODULE, VAULT_MODULE};
use crate::epochs::EpochKeeper;
use crate::oracle::OracleKeeper;
use crate::types::{Address, Coin, Pair};
use rust_decimal::Decimal;
use tracing::debug;

impl<B, O, E> Engine<B, O, E>
where
    B: BankKeeper + Clone,
    O: OracleKeeper,
    E: EpochKeeper,
{
    // 8.7.1: pay `amount` of quote out of the vault. if the vault is short the
    // ecosystem fund covers the gap and it is booked as prepaid bad debt.
    pub(super) fn withdraw(
        &mut self,
        pair: &Pair,
        receiver: &Address,
        amount: Decimal,
    ) -> Result<(), EngineError> {
        if amount <= Decimal::ZERO {
            return Ok(());
        }
        let denom = pair.quote_denom();
        let vault_balance = self
            .bank
            .get_balance(&Address::module(VAULT_MODULE), denom)
            .amount;

        if vault_balance < amount {
            let shortage = amount - vault_balance;
            let mut market = self.market(pair)?;
            market.prepaid_bad_debt += shortage;
            self.state.insert_market(market);
            debug!(%pair, %shortage, "vault short, drawing on ecosystem fund");
            self.bank.send_coins_from_module_to_module(
                PERP_EF_MODULE,
                VAULT_MODULE,
                &[Coin::new(denom, shortage)],
            )?;
        }

        self.bank
            .send_coins_from_module_to_account(VAULT_MODULE, receiver, &[Coin::new(denom, amount)])?;
        Ok(())
    }

    // 8.7.2: bad debt is paid by the ecosystem fund. whatever it already
    // advanced through withdraw counts first.
    pub(super) fn realize_bad_debt(&mut self, pair: &Pair, bad_debt: Decimal) -> Result<(), EngineError> {
        if bad_debt <= Decimal::ZERO {
            return Ok(());
        }
        let mut market = self.market(pair)?;
        if market.prepaid_bad_debt >= bad_debt {
            market.prepaid_bad_debt -= bad_debt;
            self.state.insert_market(market);
            return Ok(());
        }

        let uncovered = bad_debt - market.prepaid_bad_debt;
        market.prepaid_bad_debt = Decimal::ZERO;
        self.state.insert_market(market);
        self.bank.send_coins_from_module_to_module(
            PERP_EF_MODULE,
            VAULT_MODULE,
            &[Coin::new(pair.quote_denom(), uncovered)],
        )?;
        Ok(())
    }
}
