use anyhow::Result;
use chrono::{DateTime, Utc};
use reelvault_types::{
    economy::{Account, AccountId, GameSession, Machine, MachineId, SessionId, StopPolicy, StopReason, Wallet},
    Catalog, Currency, Key, Leg, Transaction, TransactionKind, Value,
};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::debug;

use crate::{
    config::EngineConfig,
    error::EngineError,
    spin::ReelSource,
    state::{self, State, Status},
};

mod handlers;
mod receipt;

pub use receipt::*;

/// One economic event, applied as a single all-or-nothing unit.
///
/// Prices are quoted by the caller before the unit starts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LedgerEvent {
    Register {
        name: String,
    },
    Spin {
        machine: MachineId,
        bet: u64,
    },
    StartAutoSpin {
        machine: MachineId,
        bet: u64,
        count: u32,
        policy: StopPolicy,
    },
    AutoSpinStep {
        session: SessionId,
    },
    StopAutoSpin {
        reason: StopReason,
    },
    ClaimDailyBonus,
    Purchase {
        asset: String,
        coins: u64,
        price: Decimal,
    },
    Sell {
        asset: String,
        quantity: Decimal,
        price: Decimal,
    },
    Convert {
        from: String,
        to: String,
        quantity: Decimal,
        from_price: Decimal,
        to_price: Decimal,
    },
    Deposit {
        asset: String,
        quantity: Decimal,
        price: Decimal,
    },
    Withdraw {
        asset: String,
        quantity: Decimal,
    },
    AcquireMachine {
        machine_type: String,
    },
    ApplyUpgrade {
        machine: MachineId,
        upgrade: String,
    },
    GrantAchievement {
        achievement: String,
    },
}

impl LedgerEvent {
    pub fn label(&self) -> &'static str {
        match self {
            LedgerEvent::Register { .. } => "register",
            LedgerEvent::Spin { .. } => "spin",
            LedgerEvent::StartAutoSpin { .. } => "start_auto_spin",
            LedgerEvent::AutoSpinStep { .. } => "auto_spin_step",
            LedgerEvent::StopAutoSpin { .. } => "stop_auto_spin",
            LedgerEvent::ClaimDailyBonus => "claim_daily_bonus",
            LedgerEvent::Purchase { .. } => "purchase",
            LedgerEvent::Sell { .. } => "sell",
            LedgerEvent::Convert { .. } => "convert",
            LedgerEvent::Deposit { .. } => "deposit",
            LedgerEvent::Withdraw { .. } => "withdraw",
            LedgerEvent::AcquireMachine { .. } => "acquire_machine",
            LedgerEvent::ApplyUpgrade { .. } => "apply_upgrade",
            LedgerEvent::GrantAchievement { .. } => "grant_achievement",
        }
    }

    /// Whether the event can move an account stat that achievement rules read.
    pub fn changes_stats(&self) -> bool {
        matches!(
            self,
            LedgerEvent::Spin { .. }
                | LedgerEvent::StartAutoSpin { .. }
                | LedgerEvent::AutoSpinStep { .. }
                | LedgerEvent::ClaimDailyBonus
        )
    }
}

/// Primary and counter legs of a transaction about to be appended.
struct Posting {
    kind: TransactionKind,
    amount: Decimal,
    currency: Currency,
    counter: Option<Leg>,
    fee: Decimal,
}

impl Posting {
    fn new(kind: TransactionKind, amount: Decimal, currency: Currency) -> Self {
        Self {
            kind,
            amount,
            currency,
            counter: None,
            fee: Decimal::ZERO,
        }
    }

    fn counter(mut self, amount: Decimal, currency: Currency) -> Self {
        self.counter = Some(Leg { amount, currency });
        self
    }

    fn fee(mut self, fee: Decimal) -> Self {
        self.fee = fee;
        self
    }
}

/// Staged view over one account partition.
///
/// Reads fall through to the underlying store; writes only touch `pending`. Nothing reaches the
/// store until the engine applies [Layer::commit], so dropping a layer rejects the whole unit.
pub struct Layer<'a, S: State> {
    state: &'a S,
    pending: BTreeMap<Key, Status>,

    catalog: &'a Catalog,
    config: &'a EngineConfig,
    reels: &'a dyn ReelSource,
    now: DateTime<Utc>,
}

impl<'a, S: State> Layer<'a, S> {
    pub fn new(
        state: &'a S,
        catalog: &'a Catalog,
        config: &'a EngineConfig,
        reels: &'a dyn ReelSource,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            state,
            pending: BTreeMap::new(),
            catalog,
            config,
            reels,
            now,
        }
    }

    fn stage(&mut self, key: Key, value: Value) {
        self.pending.insert(key, Status::Update(value));
    }

    fn stage_account(&mut self, account: Account) {
        self.stage(Key::Account(account.id), Value::Account(account));
    }

    fn stage_wallet(&mut self, wallet: Wallet) {
        self.stage(Key::Wallet(wallet.owner), Value::Wallet(wallet));
    }

    fn stage_machine(&mut self, machine: Machine) {
        self.stage(Key::Machine(machine.owner, machine.id), Value::Machine(machine));
    }

    fn stage_session(&mut self, owner: AccountId, session: GameSession) {
        self.stage(Key::Session(owner, session.id), Value::Session(session));
    }

    async fn account(&self, id: AccountId) -> Result<Account, EngineError> {
        state::load_account(self, id)
            .await?
            .ok_or(EngineError::AccountNotFound(id))
    }

    /// The account's wallet, or an empty one if none was stored yet.
    async fn wallet(&self, owner: AccountId) -> Result<Wallet, EngineError> {
        Ok(state::load_wallet(self, owner)
            .await?
            .unwrap_or_else(|| Wallet::new(owner)))
    }

    async fn machine(&self, owner: AccountId, id: MachineId) -> Result<Machine, EngineError> {
        state::load_machine(self, owner, id)
            .await?
            .ok_or(EngineError::MachineNotFound(id))
    }

    async fn session(&self, owner: AccountId, id: SessionId) -> Result<GameSession, EngineError> {
        state::load_session(self, owner, id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("session {id}")))
    }

    /// Append a transaction carrying the account's balances as they stand now. Callers stage the
    /// account afterwards so the allocated sequence number is persisted with it.
    fn record(&mut self, account: &mut Account, posting: Posting) -> Transaction {
        let transaction = Transaction {
            seq: account.allocate_transaction_seq(),
            account: account.id,
            kind: posting.kind,
            amount: posting.amount,
            currency: posting.currency,
            counter: posting.counter,
            fee: posting.fee,
            balances: account.balances(),
            created_at: self.now,
        };
        self.stage(
            Key::Transaction(account.id, transaction.seq),
            Value::Transaction(transaction.clone()),
        );
        transaction
    }

    pub async fn apply(
        &mut self,
        account: AccountId,
        event: &LedgerEvent,
    ) -> Result<Receipt, EngineError> {
        let receipt = match event {
            LedgerEvent::Register { name } => self.handle_register(account, name).await?,
            LedgerEvent::Spin { machine, bet } => self.handle_spin(account, *machine, *bet).await?,
            LedgerEvent::StartAutoSpin {
                machine,
                bet,
                count,
                policy,
            } => {
                self.handle_start_auto_spin(account, *machine, *bet, *count, policy)
                    .await?
            }
            LedgerEvent::AutoSpinStep { session } => {
                self.handle_auto_spin_step(account, *session).await?
            }
            LedgerEvent::StopAutoSpin { reason } => {
                self.handle_stop_auto_spin(account, *reason).await?
            }
            LedgerEvent::ClaimDailyBonus => self.handle_daily_bonus(account).await?,
            LedgerEvent::Purchase { asset, coins, price } => {
                self.handle_purchase(account, asset, *coins, *price).await?
            }
            LedgerEvent::Sell {
                asset,
                quantity,
                price,
            } => self.handle_sell(account, asset, *quantity, *price).await?,
            LedgerEvent::Convert {
                from,
                to,
                quantity,
                from_price,
                to_price,
            } => {
                self.handle_convert(account, from, to, *quantity, *from_price, *to_price)
                    .await?
            }
            LedgerEvent::Deposit {
                asset,
                quantity,
                price,
            } => self.handle_deposit(account, asset, *quantity, *price).await?,
            LedgerEvent::Withdraw { asset, quantity } => {
                self.handle_withdraw(account, asset, *quantity).await?
            }
            LedgerEvent::AcquireMachine { machine_type } => {
                self.handle_acquire_machine(account, machine_type).await?
            }
            LedgerEvent::ApplyUpgrade { machine, upgrade } => {
                self.handle_apply_upgrade(account, *machine, upgrade).await?
            }
            LedgerEvent::GrantAchievement { achievement } => {
                self.handle_grant_achievement(account, achievement).await?
            }
        };
        debug!(
            %account,
            event = event.label(),
            staged = self.pending.len(),
            "ledger unit prepared"
        );
        Ok(receipt)
    }

    pub fn commit(self) -> Vec<(Key, Status)> {
        self.pending.into_iter().collect()
    }
}

impl<'a, S: State> State for Layer<'a, S> {
    async fn get(&self, key: &Key) -> Result<Option<Value>> {
        Ok(match self.pending.get(key) {
            Some(Status::Update(value)) => Some(value.clone()),
            Some(Status::Delete) => None,
            None => self.state.get(key).await?,
        })
    }

    async fn insert(&mut self, key: Key, value: Value) -> Result<()> {
        self.pending.insert(key, Status::Update(value));
        Ok(())
    }

    async fn delete(&mut self, key: &Key) -> Result<()> {
        self.pending.insert(key.clone(), Status::Delete);
        Ok(())
    }

    fn version(&self) -> u64 {
        self.state.version()
    }
}
