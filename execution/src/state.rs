use anyhow::{anyhow, Result};
use reelvault_types::{
    economy::{Account, AccountId, GameSession, Machine, MachineId, SessionId, Wallet},
    Key, Transaction, Value,
};
use std::{collections::HashMap, future::Future};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("store moved from version {expected} to {found}")]
    Conflict { expected: u64, found: u64 },
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Keyed record store.
///
/// `version` advances once per applied change set; [State::apply_versioned] refuses to apply
/// a change set prepared against an older version.
pub trait State: Send + Sync {
    fn get(&self, key: &Key) -> impl Future<Output = Result<Option<Value>>> + Send;
    fn insert(&mut self, key: Key, value: Value) -> impl Future<Output = Result<()>> + Send;
    fn delete(&mut self, key: &Key) -> impl Future<Output = Result<()>> + Send;
    fn version(&self) -> u64;

    fn apply(&mut self, changes: Vec<(Key, Status)>) -> impl Future<Output = Result<()>> + Send {
        async move {
            for (key, status) in changes {
                match status {
                    Status::Update(value) => self.insert(key, value).await?,
                    Status::Delete => self.delete(&key).await?,
                }
            }
            Ok(())
        }
    }

    fn apply_versioned(
        &mut self,
        expected: u64,
        changes: Vec<(Key, Status)>,
    ) -> impl Future<Output = Result<(), ApplyError>> + Send {
        async move {
            let found = self.version();
            if found != expected {
                return Err(ApplyError::Conflict { expected, found });
            }
            self.apply(changes).await?;
            Ok(())
        }
    }
}

/// In-memory store holding one account partition.
#[derive(Default)]
pub struct Memory {
    state: HashMap<Key, Value>,
    version: u64,
}

impl Memory {
    pub fn len(&self) -> usize {
        self.state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }
}

impl State for Memory {
    async fn get(&self, key: &Key) -> Result<Option<Value>> {
        Ok(self.state.get(key).cloned())
    }

    async fn insert(&mut self, key: Key, value: Value) -> Result<()> {
        self.state.insert(key, value);
        Ok(())
    }

    async fn delete(&mut self, key: &Key) -> Result<()> {
        self.state.remove(key);
        Ok(())
    }

    fn version(&self) -> u64 {
        self.version
    }

    async fn apply(&mut self, changes: Vec<(Key, Status)>) -> Result<()> {
        for (key, status) in changes {
            match status {
                Status::Update(value) => {
                    self.state.insert(key, value);
                }
                Status::Delete => {
                    self.state.remove(&key);
                }
            }
        }
        self.version += 1;
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[allow(clippy::large_enum_variant)]
pub enum Status {
    Update(Value),
    Delete,
}

fn unexpected(key: &Key) -> anyhow::Error {
    anyhow!("record stored under {key:?} has the wrong type")
}

pub async fn load_account<S: State>(state: &S, id: AccountId) -> Result<Option<Account>> {
    let key = Key::Account(id);
    match state.get(&key).await? {
        Some(Value::Account(account)) => Ok(Some(account)),
        Some(_) => Err(unexpected(&key)),
        None => Ok(None),
    }
}

pub async fn load_wallet<S: State>(state: &S, owner: AccountId) -> Result<Option<Wallet>> {
    let key = Key::Wallet(owner);
    match state.get(&key).await? {
        Some(Value::Wallet(wallet)) => Ok(Some(wallet)),
        Some(_) => Err(unexpected(&key)),
        None => Ok(None),
    }
}

pub async fn load_machine<S: State>(
    state: &S,
    owner: AccountId,
    id: MachineId,
) -> Result<Option<Machine>> {
    let key = Key::Machine(owner, id);
    match state.get(&key).await? {
        Some(Value::Machine(machine)) => Ok(Some(machine)),
        Some(_) => Err(unexpected(&key)),
        None => Ok(None),
    }
}

pub async fn load_session<S: State>(
    state: &S,
    owner: AccountId,
    id: SessionId,
) -> Result<Option<GameSession>> {
    let key = Key::Session(owner, id);
    match state.get(&key).await? {
        Some(Value::Session(session)) => Ok(Some(session)),
        Some(_) => Err(unexpected(&key)),
        None => Ok(None),
    }
}

pub async fn load_transaction<S: State>(
    state: &S,
    owner: AccountId,
    seq: u64,
) -> Result<Option<Transaction>> {
    let key = Key::Transaction(owner, seq);
    match state.get(&key).await? {
        Some(Value::Transaction(transaction)) => Ok(Some(transaction)),
        Some(_) => Err(unexpected(&key)),
        None => Ok(None),
    }
}
