use chrono::NaiveDate;
use reelvault_types::{
    catalog::Reward,
    economy::{AccountId, MachineId, SessionState},
    Transaction,
};
use serde::{Deserialize, Serialize};

use crate::spin::SpinOutcome;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub account: AccountId,
    pub starter_machine: MachineId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievementGrant {
    pub achievement: String,
    pub name: String,
    pub reward: Reward,
    pub transaction: Transaction,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpinReceipt {
    pub outcome: SpinOutcome,
    pub session: SessionState,
    pub transaction: Transaction,
    /// Filled by the engine once the achievement pass that follows the spin has run.
    pub achievements: Vec<AchievementGrant>,
}

/// Result of one auto-spin step. `outcome` is `None` when the session was no longer active.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepReceipt {
    pub outcome: Option<SpinOutcome>,
    pub session: SessionState,
    pub achievements: Vec<AchievementGrant>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BonusReceipt {
    pub amount: u64,
    pub streak: u32,
    pub next_available: NaiveDate,
    pub transaction: Transaction,
    pub achievements: Vec<AchievementGrant>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineReceipt {
    pub machine: MachineId,
    pub transaction: Transaction,
}

/// What a committed ledger unit produced.
#[derive(Clone, Debug, PartialEq, Eq)]
#[allow(clippy::large_enum_variant)]
pub enum Receipt {
    Registered(Registration),
    Spun(SpinReceipt),
    AutoSpinStarted(SpinReceipt),
    AutoSpinStep(StepReceipt),
    AutoSpinStopped(SessionState),
    BonusClaimed(BonusReceipt),
    Traded(Transaction),
    MachineAcquired(MachineReceipt),
    MachineUpgraded(Transaction),
    AchievementGranted(AchievementGrant),
    /// The unit had nothing to do (e.g. an achievement that was already granted).
    Unchanged,
}

impl Receipt {
    pub(crate) fn attach_achievements(&mut self, grants: Vec<AchievementGrant>) {
        match self {
            Receipt::Spun(receipt) | Receipt::AutoSpinStarted(receipt) => {
                receipt.achievements.extend(grants)
            }
            Receipt::AutoSpinStep(receipt) => receipt.achievements.extend(grants),
            Receipt::BonusClaimed(receipt) => receipt.achievements.extend(grants),
            _ => {}
        }
    }
}
