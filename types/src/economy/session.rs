use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{MachineId, SessionId};

/// Conditions that end an auto-spin run early.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StopPolicy {
    pub stop_on_jackpot: bool,
    pub stop_on_big_win: bool,
    pub big_win_threshold: u64,
}

/// Auto-spin bookkeeping attached to a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoSpin {
    pub requested: u32,
    pub remaining: u32,
    pub bet: u64,
    pub policy: StopPolicy,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Idle,
    Active,
    Stopped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Auto-spin ran its full count.
    Exhausted,
    Jackpot,
    BigWin,
    /// Explicit stop request.
    Requested,
    /// A step was rejected because the bet could no longer be covered.
    InsufficientFunds,
    /// A step was rejected for any other reason.
    Aborted,
    /// A manual session reached its spin record limit.
    SpinLimit,
}

/// One resolved spin as recorded on its session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpinRecord {
    pub transaction_seq: u64,
    pub bet: u64,
    pub symbols: Vec<String>,
    pub win_amount: u64,
    pub is_jackpot: bool,
    pub crypto_earned: Decimal,
    pub at: DateTime<Utc>,
}

/// Play session on one machine. `Stopped` is terminal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSession {
    pub id: SessionId,
    pub machine: MachineId,
    pub status: SessionStatus,
    pub stop_reason: Option<StopReason>,
    pub spins: Vec<SpinRecord>,
    pub auto_spin: Option<AutoSpin>,
    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl GameSession {
    pub fn new(id: SessionId, machine: MachineId, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            machine,
            status: SessionStatus::Idle,
            stop_reason: None,
            spins: Vec::new(),
            auto_spin: None,
            created_at,
            ended_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status == SessionStatus::Stopped
    }

    /// Move an idle session to active. Returns false for a terminal session.
    pub fn activate(&mut self) -> bool {
        match self.status {
            SessionStatus::Stopped => false,
            SessionStatus::Idle | SessionStatus::Active => {
                self.status = SessionStatus::Active;
                true
            }
        }
    }

    /// Enter the terminal state. Returns false if the session was already stopped.
    pub fn stop(&mut self, reason: StopReason, at: DateTime<Utc>) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.status = SessionStatus::Stopped;
        self.stop_reason = Some(reason);
        self.ended_at = Some(at);
        true
    }

    pub fn is_auto_spinning(&self) -> bool {
        self.status == SessionStatus::Active && self.auto_spin.is_some()
    }

    pub fn state(&self) -> SessionState {
        let (total_bet, total_won) = self.spins.iter().fold((0u64, 0u64), |(bet, won), spin| {
            (
                bet.saturating_add(spin.bet),
                won.saturating_add(spin.win_amount),
            )
        });
        SessionState {
            id: self.id,
            machine: self.machine,
            status: self.status,
            stop_reason: self.stop_reason,
            spins_recorded: self.spins.len(),
            remaining: self.auto_spin.as_ref().map(|auto| auto.remaining),
            total_bet,
            total_won,
        }
    }
}

/// Caller-facing summary of a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub id: SessionId,
    pub machine: MachineId,
    pub status: SessionStatus,
    pub stop_reason: Option<StopReason>,
    pub spins_recorded: usize,
    pub remaining: Option<u32>,
    pub total_bet: u64,
    pub total_won: u64,
}
