use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error as ThisError;

use super::AccountId;

#[derive(Debug, ThisError, PartialEq, Eq)]
pub enum WalletInvariantError {
    #[error("negative balance for {asset} ({amount})")]
    NegativeBalance { asset: String, amount: Decimal },
    #[error("empty lot persisted for {0}")]
    EmptyLot(String),
    #[error("lot for {asset} holds {lot} but wallet balance is {balance}")]
    LotExceedsBalance {
        asset: String,
        lot: Decimal,
        balance: Decimal,
    },
}

/// Quantity held and running weighted-average cost for one asset.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvestmentLot {
    pub quantity: Decimal,
    pub average_cost: Decimal,
}

impl InvestmentLot {
    /// Cost basis of the units currently held.
    pub fn cost_basis(&self) -> Decimal {
        self.quantity * self.average_cost
    }
}

/// Simulated crypto wallet. One per account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub owner: AccountId,
    pub balances: BTreeMap<String, Decimal>,
    pub lots: BTreeMap<String, InvestmentLot>,
    pub realized_pnl: Decimal,
}

impl Wallet {
    pub fn new(owner: AccountId) -> Self {
        Self {
            owner,
            balances: BTreeMap::new(),
            lots: BTreeMap::new(),
            realized_pnl: Decimal::ZERO,
        }
    }

    pub fn balance(&self, asset: &str) -> Decimal {
        self.balances.get(asset).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn lot(&self, asset: &str) -> Option<&InvestmentLot> {
        self.lots.get(asset)
    }

    pub fn validate_invariants(&self) -> Result<(), WalletInvariantError> {
        for (asset, amount) in &self.balances {
            if *amount < Decimal::ZERO {
                return Err(WalletInvariantError::NegativeBalance {
                    asset: asset.clone(),
                    amount: *amount,
                });
            }
        }
        for (asset, lot) in &self.lots {
            if lot.quantity <= Decimal::ZERO {
                return Err(WalletInvariantError::EmptyLot(asset.clone()));
            }
            let balance = self.balance(asset);
            if lot.quantity > balance {
                return Err(WalletInvariantError::LotExceedsBalance {
                    asset: asset.clone(),
                    lot: lot.quantity,
                    balance,
                });
            }
        }
        Ok(())
    }
}
