use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error as ThisError;

use super::{AccountId, MachineId, SessionId, INITIAL_COINS, MAX_NAME_LENGTH};

#[derive(Debug, ThisError, PartialEq, Eq)]
pub enum AccountInvariantError {
    #[error("account name too long (len={len}, max={max})")]
    NameTooLong { len: usize, max: usize },
    #[error("account name must not be empty")]
    EmptyName,
    #[error("token balance is negative ({0})")]
    NegativeTokens(Decimal),
    #[error("wins ({wins}) + losses ({losses}) != spins ({spins})")]
    SpinCountMismatch { spins: u64, wins: u64, losses: u64 },
}

/// Stat fields an achievement rule can be evaluated against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatField {
    TotalSpins,
    TotalWins,
    TotalLosses,
    TotalWinnings,
    TotalBets,
    BiggestWin,
    JackpotsHit,
    DailyStreak,
}

/// Gameplay totals. Accounts and machines both carry one.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameStats {
    pub total_spins: u64,
    pub total_wins: u64,
    pub total_losses: u64,
    pub total_winnings: u64,
    pub total_bets: u64,
    pub biggest_win: u64,
    pub jackpots_hit: u64,
}

impl GameStats {
    /// Fold one resolved spin into the totals. A matching line counts as a win even when its
    /// payout floors to zero coins.
    pub fn record_spin(&mut self, bet: u64, is_win: bool, win_amount: u64, is_jackpot: bool) {
        self.total_spins = self.total_spins.saturating_add(1);
        self.total_bets = self.total_bets.saturating_add(bet);
        if is_win {
            self.total_wins = self.total_wins.saturating_add(1);
            self.total_winnings = self.total_winnings.saturating_add(win_amount);
            self.biggest_win = self.biggest_win.max(win_amount);
        } else {
            self.total_losses = self.total_losses.saturating_add(1);
        }
        if is_jackpot {
            self.jackpots_hit = self.jackpots_hit.saturating_add(1);
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyBonusState {
    pub last_claimed_day: Option<NaiveDate>,
    pub streak: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountProfile {
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Monotonic counters used to allocate per-account identifiers.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSequences {
    pub next_machine: MachineId,
    pub next_session: SessionId,
    pub next_transaction: u64,
}

/// Balances carried on every transaction record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub coins: u64,
    pub tokens: Decimal,
}

/// Player account: game balance, stats, streak and achievement progress.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub profile: AccountProfile,
    pub coin_balance: u64,
    pub token_balance: Decimal,
    pub stats: GameStats,
    pub daily_bonus: DailyBonusState,
    pub achievement_progress: BTreeSet<String>,
    /// Session currently driven by auto-spin. At most one per account.
    #[serde(default)]
    pub auto_spin: Option<SessionId>,
    pub sequences: AccountSequences,
}

impl Account {
    pub fn new(id: AccountId, name: String, created_at: DateTime<Utc>) -> Self {
        Self::with_coins(id, name, created_at, INITIAL_COINS)
    }

    pub fn with_coins(id: AccountId, name: String, created_at: DateTime<Utc>, coins: u64) -> Self {
        Self {
            id,
            profile: AccountProfile { name, created_at },
            coin_balance: coins,
            token_balance: Decimal::ZERO,
            stats: GameStats::default(),
            daily_bonus: DailyBonusState::default(),
            achievement_progress: BTreeSet::new(),
            auto_spin: None,
            sequences: AccountSequences::default(),
        }
    }

    pub fn validate_invariants(&self) -> Result<(), AccountInvariantError> {
        let len = self.profile.name.len();
        if len == 0 {
            return Err(AccountInvariantError::EmptyName);
        }
        if len > MAX_NAME_LENGTH {
            return Err(AccountInvariantError::NameTooLong {
                len,
                max: MAX_NAME_LENGTH,
            });
        }
        if self.token_balance.is_sign_negative() && !self.token_balance.is_zero() {
            return Err(AccountInvariantError::NegativeTokens(self.token_balance));
        }
        let stats = &self.stats;
        if stats.total_wins.saturating_add(stats.total_losses) != stats.total_spins {
            return Err(AccountInvariantError::SpinCountMismatch {
                spins: stats.total_spins,
                wins: stats.total_wins,
                losses: stats.total_losses,
            });
        }
        Ok(())
    }

    /// Current value of a stat field, including fields that live outside [GameStats].
    pub fn stat(&self, field: StatField) -> u64 {
        match field {
            StatField::TotalSpins => self.stats.total_spins,
            StatField::TotalWins => self.stats.total_wins,
            StatField::TotalLosses => self.stats.total_losses,
            StatField::TotalWinnings => self.stats.total_winnings,
            StatField::TotalBets => self.stats.total_bets,
            StatField::BiggestWin => self.stats.biggest_win,
            StatField::JackpotsHit => self.stats.jackpots_hit,
            StatField::DailyStreak => u64::from(self.daily_bonus.streak),
        }
    }

    pub fn balances(&self) -> BalanceSnapshot {
        BalanceSnapshot {
            coins: self.coin_balance,
            tokens: self.token_balance,
        }
    }

    pub fn allocate_machine_id(&mut self) -> MachineId {
        let id = self.sequences.next_machine;
        self.sequences.next_machine += 1;
        id
    }

    pub fn allocate_session_id(&mut self) -> SessionId {
        let id = self.sequences.next_session;
        self.sequences.next_session += 1;
        id
    }

    pub fn allocate_transaction_seq(&mut self) -> u64 {
        let seq = self.sequences.next_transaction;
        self.sequences.next_transaction += 1;
        seq
    }
}
