//! Store schema.
//!
//! Every record the engine persists is addressed by a [Key] and stored as a [Value]. All keys
//! of one account share that account's id, which lets a store partition records by account.

use serde::{Deserialize, Serialize};

use crate::economy::{Account, AccountId, GameSession, Machine, MachineId, SessionId, Wallet};
use crate::ledger::Transaction;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Key {
    Account(AccountId),
    Wallet(AccountId),
    Machine(AccountId, MachineId),
    Session(AccountId, SessionId),
    Transaction(AccountId, u64),
}

impl Key {
    /// Account that owns the record behind this key.
    pub fn account(&self) -> AccountId {
        match self {
            Key::Account(id)
            | Key::Wallet(id)
            | Key::Machine(id, _)
            | Key::Session(id, _)
            | Key::Transaction(id, _) => *id,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::large_enum_variant)]
pub enum Value {
    Account(Account),
    Wallet(Wallet),
    Machine(Machine),
    Session(GameSession),
    Transaction(Transaction),
}
