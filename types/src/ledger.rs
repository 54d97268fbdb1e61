//! Append-only transaction records.
//!
//! A [Transaction] is written exactly once, in the same unit as the balance changes it
//! describes, and is never mutated afterwards.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::economy::{AccountId, BalanceSnapshot, MachineId};

/// Unit an amount is denominated in.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Currency {
    Coins,
    Tokens,
    Asset(String),
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Currency::Coins => f.write_str("coins"),
            Currency::Tokens => f.write_str("tokens"),
            Currency::Asset(symbol) => f.write_str(symbol),
        }
    }
}

/// The other side of a two-legged event (e.g. the asset received by a purchase).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leg {
    pub amount: Decimal,
    pub currency: Currency,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransactionKind {
    GameWin {
        machine: MachineId,
        bet: u64,
        is_jackpot: bool,
        crypto_earned: Decimal,
    },
    GameLoss {
        machine: MachineId,
        bet: u64,
    },
    CryptoPurchase {
        asset: String,
        price: Decimal,
    },
    CryptoSale {
        asset: String,
        price: Decimal,
        realized_pnl: Decimal,
    },
    CryptoConversion {
        from: String,
        to: String,
        from_price: Decimal,
        to_price: Decimal,
        realized_pnl: Decimal,
    },
    CryptoDeposit {
        asset: String,
        price: Decimal,
    },
    CryptoWithdrawal {
        asset: String,
    },
    DailyBonus {
        streak: u32,
    },
    AchievementReward {
        achievement: String,
    },
    MachinePurchase {
        machine: MachineId,
        machine_type: String,
    },
    MachineUpgrade {
        machine: MachineId,
        upgrade: String,
    },
}

impl TransactionKind {
    pub fn label(&self) -> &'static str {
        match self {
            TransactionKind::GameWin { .. } => "game_win",
            TransactionKind::GameLoss { .. } => "game_loss",
            TransactionKind::CryptoPurchase { .. } => "crypto_purchase",
            TransactionKind::CryptoSale { .. } => "crypto_sale",
            TransactionKind::CryptoConversion { .. } => "crypto_conversion",
            TransactionKind::CryptoDeposit { .. } => "crypto_deposit",
            TransactionKind::CryptoWithdrawal { .. } => "crypto_withdrawal",
            TransactionKind::DailyBonus { .. } => "daily_bonus",
            TransactionKind::AchievementReward { .. } => "achievement_reward",
            TransactionKind::MachinePurchase { .. } => "machine_purchase",
            TransactionKind::MachineUpgrade { .. } => "machine_upgrade",
        }
    }

    pub fn machine(&self) -> Option<MachineId> {
        match self {
            TransactionKind::GameWin { machine, .. }
            | TransactionKind::GameLoss { machine, .. }
            | TransactionKind::MachinePurchase { machine, .. }
            | TransactionKind::MachineUpgrade { machine, .. } => Some(*machine),
            _ => None,
        }
    }
}

/// Immutable record of one economic event.
///
/// `amount`/`currency` describe the primary leg (the debit for trades and wagers, the credit
/// for rewards). `counter` is the credited leg of a trade, already net of `fee`, which is
/// denominated in the counter currency.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub seq: u64,
    pub account: AccountId,
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub currency: Currency,
    pub counter: Option<Leg>,
    pub fee: Decimal,
    pub balances: BalanceSnapshot,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Signed change to the account's coin balance caused by this transaction.
    pub fn coin_delta(&self) -> i128 {
        let whole = |amount: Decimal| amount.trunc().to_i128().unwrap_or(0);
        let credit = match &self.counter {
            Some(Leg {
                amount,
                currency: Currency::Coins,
            }) => whole(*amount),
            _ => 0,
        };
        match (&self.kind, &self.currency) {
            (TransactionKind::GameWin { bet, .. }, Currency::Coins) => {
                whole(self.amount) - i128::from(*bet)
            }
            (
                TransactionKind::DailyBonus { .. } | TransactionKind::AchievementReward { .. },
                Currency::Coins,
            ) => whole(self.amount),
            (_, Currency::Coins) => credit - whole(self.amount),
            _ => credit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn transaction(kind: TransactionKind, amount: Decimal, currency: Currency) -> Transaction {
        Transaction {
            seq: 0,
            account: Uuid::nil(),
            kind,
            amount,
            currency,
            counter: None,
            fee: Decimal::ZERO,
            balances: BalanceSnapshot::default(),
            created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_coin_delta_for_spins() {
        let win = transaction(
            TransactionKind::GameWin {
                machine: 0,
                bet: 100,
                is_jackpot: true,
                crypto_earned: dec!(5),
            },
            dec!(10000),
            Currency::Coins,
        );
        assert_eq!(win.coin_delta(), 9_900);
        assert_eq!(win.kind.label(), "game_win");

        let loss = transaction(
            TransactionKind::GameLoss { machine: 0, bet: 100 },
            dec!(100),
            Currency::Coins,
        );
        assert_eq!(loss.coin_delta(), -100);
    }

    #[test]
    fn test_coin_delta_for_trades() {
        let mut sale = transaction(
            TransactionKind::CryptoSale {
                asset: "BTC".to_string(),
                price: dec!(70000),
                realized_pnl: dec!(15000),
            },
            dec!(1),
            Currency::Asset("BTC".to_string()),
        );
        sale.counter = Some(Leg {
            amount: dec!(69300),
            currency: Currency::Coins,
        });
        assert_eq!(sale.coin_delta(), 69_300);

        let purchase = transaction(
            TransactionKind::CryptoPurchase {
                asset: "BTC".to_string(),
                price: dec!(50000),
            },
            dec!(50000),
            Currency::Coins,
        );
        assert_eq!(purchase.coin_delta(), -50_000);

        let bonus = transaction(
            TransactionKind::DailyBonus { streak: 2 },
            dec!(110),
            Currency::Coins,
        );
        assert_eq!(bonus.coin_delta(), 110);
    }
}
