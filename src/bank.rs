// 9.0 bank.rs: balance ledger capability. the engine only moves coins between
// the trader, the vault and the ecosystem fund through this trait.
// MemoryBank is the in-process ledger used by the simulator and tests.

use crate::types::{Address, Coin};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use thiserror::Error;

/// Module account holding all trader margin.
pub const VAULT_MODULE: &str = "vault";
/// Module account that absorbs bad debt and collects liquidation fees.
pub const PERP_EF_MODULE: &str = "perp_ef";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BankError {
    #[error("insufficient funds: {address} has {available}{denom}, needs {requested}{denom}")]
    InsufficientFunds {
        address: Address,
        denom: String,
        available: Decimal,
        requested: Decimal,
    },

    #[error("invalid coin amount: {0}")]
    InvalidAmount(Coin),
}

pub trait BankKeeper {
    fn send_coins_from_module_to_module(
        &mut self,
        from_module: &str,
        to_module: &str,
        coins: &[Coin],
    ) -> Result<(), BankError>;

    fn send_coins_from_account_to_module(
        &mut self,
        from: &Address,
        to_module: &str,
        coins: &[Coin],
    ) -> Result<(), BankError>;

    fn send_coins_from_module_to_account(
        &mut self,
        from_module: &str,
        to: &Address,
        coins: &[Coin],
    ) -> Result<(), BankError>;

    fn mint_coins(&mut self, module: &str, coins: &[Coin]) -> Result<(), BankError>;

    fn get_all_balances(&self, address: &Address) -> Vec<Coin>;

    fn get_balance(&self, address: &Address, denom: &str) -> Coin;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryBank {
    balances: BTreeMap<(Address, String), Decimal>,
}

impl MemoryBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit an account directly, outside of any module.
    pub fn fund_account(&mut self, address: &Address, coin: Coin) -> Result<(), BankError> {
        self.credit(address, &coin)
    }

    fn credit(&mut self, address: &Address, coin: &Coin) -> Result<(), BankError> {
        if coin.amount < Decimal::ZERO {
            return Err(BankError::InvalidAmount(coin.clone()));
        }
        *self
            .balances
            .entry((address.clone(), coin.denom.clone()))
            .or_insert(Decimal::ZERO) += coin.amount;
        Ok(())
    }

    fn transfer(&mut self, from: &Address, to: &Address, coins: &[Coin]) -> Result<(), BankError> {
        // check every denom's total before moving any coin
        let mut requested: BTreeMap<&str, Decimal> = BTreeMap::new();
        for coin in coins {
            if coin.amount < Decimal::ZERO {
                return Err(BankError::InvalidAmount(coin.clone()));
            }
            let total = requested.entry(coin.denom.as_str()).or_insert(Decimal::ZERO);
            *total = total
                .checked_add(coin.amount)
                .ok_or_else(|| BankError::InvalidAmount(coin.clone()))?;
        }
        for (denom, amount) in requested {
            let available = self.get_balance(from, denom).amount;
            if available < amount {
                return Err(BankError::InsufficientFunds {
                    address: from.clone(),
                    denom: denom.to_string(),
                    available,
                    requested: amount,
                });
            }
        }
        for coin in coins {
            if let Some(balance) = self.balances.get_mut(&(from.clone(), coin.denom.clone())) {
                *balance -= coin.amount;
            }
            self.credit(to, coin)?;
        }
        Ok(())
    }
}

impl BankKeeper for MemoryBank {
    fn send_coins_from_module_to_module(
        &mut self,
        from_module: &str,
        to_module: &str,
        coins: &[Coin],
    ) -> Result<(), BankError> {
        self.transfer(&Address::module(from_module), &Address::module(to_module), coins)
    }

    fn send_coins_from_account_to_module(
        &mut self,
        from: &Address,
        to_module: &str,
        coins: &[Coin],
    ) -> Result<(), BankError> {
        self.transfer(from, &Address::module(to_module), coins)
    }

    fn send_coins_from_module_to_account(
        &mut self,
        from_module: &str,
        to: &Address,
        coins: &[Coin],
    ) -> Result<(), BankError> {
        self.transfer(&Address::module(from_module), to, coins)
    }

    fn mint_coins(&mut self, module: &str, coins: &[Coin]) -> Result<(), BankError> {
        let address = Address::module(module);
        for coin in coins {
            self.credit(&address, coin)?;
        }
        Ok(())
    }

    fn get_all_balances(&self, address: &Address) -> Vec<Coin> {
        self.balances
            .iter()
            .filter(|((owner, _), amount)| owner == address && !amount.is_zero())
            .map(|((_, denom), amount)| Coin::new(denom.clone(), *amount))
            .collect()
    }

    fn get_balance(&self, address: &Address, denom: &str) -> Coin {
        let amount = self
            .balances
            .get(&(address.clone(), denom.to_string()))
            .copied()
            .unwrap_or(Decimal::ZERO);
        Coin::new(denom, amount)
    }
}
