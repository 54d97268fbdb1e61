use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error as ThisError;

use super::{AccountId, GameStats, MachineId, SessionId};

#[derive(Debug, ThisError, PartialEq, Eq)]
pub enum MachineInvariantError {
    #[error("machine must have at least one reel")]
    NoReels,
    #[error("bet range is empty (min={min}, max={max})")]
    EmptyBetRange { min: u64, max: u64 },
    #[error("payout multiplier must be positive (got {0})")]
    NonPositiveMultiplier(Decimal),
    #[error("crypto earning rate must not be negative (got {0})")]
    NegativeEarningRate(Decimal),
    #[error("upgrade {0} already applied")]
    UpgradeAlreadyApplied(String),
    #[error("attribute overflow while applying upgrade {0}")]
    AttributeOverflow(String),
}

/// Tunable attributes of a slot machine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineAttributes {
    pub payout_multiplier: Decimal,
    pub reels: u8,
    pub paylines: u8,
    pub min_bet: u64,
    pub max_bet: u64,
    pub crypto_earning_rate: Decimal,
    pub symbol_set: String,
}

impl MachineAttributes {
    pub fn validate(&self) -> Result<(), MachineInvariantError> {
        if self.reels == 0 {
            return Err(MachineInvariantError::NoReels);
        }
        if self.min_bet == 0 || self.min_bet > self.max_bet {
            return Err(MachineInvariantError::EmptyBetRange {
                min: self.min_bet,
                max: self.max_bet,
            });
        }
        if self.payout_multiplier <= Decimal::ZERO {
            return Err(MachineInvariantError::NonPositiveMultiplier(
                self.payout_multiplier,
            ));
        }
        if self.crypto_earning_rate < Decimal::ZERO {
            return Err(MachineInvariantError::NegativeEarningRate(
                self.crypto_earning_rate,
            ));
        }
        Ok(())
    }

    pub fn accepts_bet(&self, bet: u64) -> bool {
        (self.min_bet..=self.max_bet).contains(&bet)
    }
}

/// Additive attribute changes granted by an upgrade.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributeDeltas {
    pub payout_multiplier: Decimal,
    pub crypto_earning_rate: Decimal,
    pub max_bet: u64,
    pub paylines: u8,
}

/// A slot machine owned by exactly one account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Machine {
    pub id: MachineId,
    pub owner: AccountId,
    pub machine_type: String,
    pub name: String,
    pub attributes: MachineAttributes,
    pub stats: GameStats,
    pub upgrades: BTreeSet<String>,
    pub active_session: Option<SessionId>,
    pub acquired_at: DateTime<Utc>,
}

impl Machine {
    /// Add an upgrade's deltas on top of the current attributes. Base values are never replaced.
    pub fn apply_upgrade(
        &mut self,
        upgrade_id: &str,
        deltas: &AttributeDeltas,
    ) -> Result<(), MachineInvariantError> {
        if self.upgrades.contains(upgrade_id) {
            return Err(MachineInvariantError::UpgradeAlreadyApplied(
                upgrade_id.to_string(),
            ));
        }
        let overflow = || MachineInvariantError::AttributeOverflow(upgrade_id.to_string());
        let mut next = self.attributes.clone();
        next.payout_multiplier = next
            .payout_multiplier
            .checked_add(deltas.payout_multiplier)
            .ok_or_else(overflow)?;
        next.crypto_earning_rate = next
            .crypto_earning_rate
            .checked_add(deltas.crypto_earning_rate)
            .ok_or_else(overflow)?;
        next.max_bet = next
            .max_bet
            .checked_add(deltas.max_bet)
            .ok_or_else(overflow)?;
        next.paylines = next
            .paylines
            .checked_add(deltas.paylines)
            .ok_or_else(overflow)?;
        next.validate()?;

        self.attributes = next;
        self.upgrades.insert(upgrade_id.to_string());
        Ok(())
    }
}
