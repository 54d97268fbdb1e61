use reelvault_types::{
    catalog::normalize_asset,
    economy::{
        Account, AccountId, Machine, MachineId, SessionId, SessionState, SessionStatus,
        StopPolicy, StopReason, Wallet,
    },
    Catalog, Transaction,
};
use rust_decimal::Decimal;
use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
    time::Duration,
};
use tokio::{
    sync::{watch, Mutex, RwLock},
    task::JoinHandle,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    achievements,
    config::{ConfigError, EngineConfig},
    error::{EngineError, ErrorKind},
    layer::{
        AchievementGrant, BonusReceipt, Layer, LedgerEvent, MachineReceipt, Receipt,
        Registration, SpinReceipt, StepReceipt,
    },
    oracle::{Clock, PriceOracle, SystemClock},
    portfolio::{self, PortfolioSummary},
    spin::{ReelSource, ThreadReels},
    state::{self, ApplyError, Memory, State},
};

/// Auto-spin run accepted by [Engine::start_auto_spin].
#[derive(Debug)]
pub struct AutoSpinStarted {
    /// The first cycle, applied before the call returned.
    pub first: SpinReceipt,
    /// Background task driving the remaining cycles; `None` when the first cycle already ended
    /// the run.
    pub handle: Option<JoinHandle<Result<AutoSpinFinished, EngineError>>>,
}

/// Outcome of the background part of an auto-spin run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AutoSpinFinished {
    /// Final session state.
    pub session: SessionState,
    /// Achievements granted by the cycles after the first, in grant order.
    pub achievements: Vec<AchievementGrant>,
}

pub struct EngineBuilder {
    config: EngineConfig,
    catalog: Catalog,
    oracle: Arc<dyn PriceOracle>,
    reels: Arc<dyn ReelSource>,
    clock: Arc<dyn Clock>,
}

impl EngineBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn reels(mut self, reels: Arc<dyn ReelSource>) -> Self {
        self.reels = reels;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build<S: State + Default + 'static>(self) -> Result<Engine<S>, ConfigError> {
        self.config.validate(&self.catalog)?;
        Ok(Engine {
            inner: Arc::new(Inner {
                config: self.config,
                catalog: self.catalog,
                oracle: self.oracle,
                reels: self.reels,
                clock: self.clock,
                partitions: RwLock::new(HashMap::new()),
                auto_spins: Mutex::new(HashMap::new()),
            }),
        })
    }
}

struct Inner<S> {
    config: EngineConfig,
    catalog: Catalog,
    oracle: Arc<dyn PriceOracle>,
    reels: Arc<dyn ReelSource>,
    clock: Arc<dyn Clock>,

    /// One store partition per account. Its mutex is the account's critical section.
    partitions: RwLock<HashMap<AccountId, Arc<Mutex<S>>>>,
    /// Stop signals of running auto-spin tasks.
    auto_spins: Mutex<HashMap<(AccountId, SessionId), watch::Sender<bool>>>,
}

/// Game economy engine.
///
/// Every mutation runs as one [Layer] unit inside the owning account's critical section and is
/// applied to the account's partition with a single versioned write. Different accounts never
/// share a lock. Prices are quoted before the critical section is entered.
pub struct Engine<S = Memory> {
    inner: Arc<Inner<S>>,
}

impl<S> Clone for Engine<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// Attempts at committing the stop of a run whose step was rejected.
const STOP_ATTEMPTS: u32 = 2;

fn unexpected(event: &LedgerEvent) -> EngineError {
    EngineError::Storage(anyhow::anyhow!(
        "unexpected receipt for {}",
        event.label()
    ))
}

impl Engine<Memory> {
    pub fn builder(oracle: Arc<dyn PriceOracle>) -> EngineBuilder {
        EngineBuilder {
            config: EngineConfig::default(),
            catalog: Catalog::standard(),
            oracle,
            reels: Arc::new(ThreadReels),
            clock: Arc::new(SystemClock),
        }
    }
}

impl<S: State + Default + 'static> Engine<S> {
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.inner.catalog
    }

    async fn partition(&self, account: AccountId) -> Result<Arc<Mutex<S>>, EngineError> {
        self.inner
            .partitions
            .read()
            .await
            .get(&account)
            .cloned()
            .ok_or(EngineError::AccountNotFound(account))
    }

    /// Prepare `event` against the partition and apply it, retrying when the partition moved
    /// underneath the unit.
    async fn commit(
        &self,
        store: &mut S,
        account: AccountId,
        event: &LedgerEvent,
    ) -> Result<Receipt, EngineError> {
        let inner = &*self.inner;
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let version = store.version();
            let mut layer = Layer::new(
                &*store,
                &inner.catalog,
                &inner.config,
                inner.reels.as_ref(),
                inner.clock.now(),
            );
            let receipt = layer.apply(account, event).await?;
            let changes = layer.commit();
            let staged = changes.len();
            match store.apply_versioned(version, changes).await {
                Ok(()) => {
                    debug!(%account, event = event.label(), staged, version, "ledger unit committed");
                    return Ok(receipt);
                }
                Err(ApplyError::Conflict { expected, found })
                    if attempts <= inner.config.max_conflict_retries =>
                {
                    warn!(
                        %account,
                        event = event.label(),
                        attempts,
                        expected,
                        found,
                        "ledger unit conflicted; retrying"
                    );
                }
                Err(ApplyError::Conflict { .. }) => {
                    return Err(EngineError::Conflict { attempts });
                }
                Err(ApplyError::Storage(err)) => return Err(EngineError::Storage(err)),
            }
        }
    }

    /// Grant every achievement the account newly satisfies, each as its own unit.
    ///
    /// A failed grant is logged and left for the next pass; it never fails the event that
    /// triggered the pass.
    async fn grant_achievements(&self, store: &mut S, account: AccountId) -> Vec<AchievementGrant> {
        let snapshot = match state::load_account(&*store, account).await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return Vec::new(),
            Err(err) => {
                warn!(%account, error = %err, "could not load account for achievement pass");
                return Vec::new();
            }
        };
        let pending: Vec<String> = achievements::pending(&snapshot, &self.inner.catalog)
            .into_iter()
            .map(|achievement| achievement.id.clone())
            .collect();

        let mut grants = Vec::with_capacity(pending.len());
        for achievement in pending {
            let event = LedgerEvent::GrantAchievement {
                achievement: achievement.clone(),
            };
            match self.commit(store, account, &event).await {
                Ok(Receipt::AchievementGranted(grant)) => grants.push(grant),
                Ok(_) => {}
                Err(err) => warn!(%account, %achievement, error = %err, "achievement grant failed"),
            }
        }
        grants
    }

    async fn execute_locked(
        &self,
        store: &mut S,
        account: AccountId,
        event: &LedgerEvent,
    ) -> Result<Receipt, EngineError> {
        let mut receipt = self.commit(store, account, event).await?;
        if event.changes_stats() {
            let grants = self.grant_achievements(store, account).await;
            receipt.attach_achievements(grants);
        }
        Ok(receipt)
    }

    async fn execute(&self, account: AccountId, event: LedgerEvent) -> Result<Receipt, EngineError> {
        let partition = self.partition(account).await?;
        let mut store = partition.lock().await;
        self.execute_locked(&mut store, account, &event).await
    }

    fn quote(&self, asset: &str) -> Result<(String, Decimal), EngineError> {
        let symbol = normalize_asset(asset)
            .ok_or_else(|| EngineError::InvalidInput(format!("malformed asset symbol {asset:?}")))?;
        if self.inner.catalog.asset(&symbol).is_none() {
            return Err(EngineError::UnsupportedAsset(symbol));
        }
        match self.inner.oracle.price(&symbol) {
            Some(price) if price > Decimal::ZERO => Ok((symbol, price)),
            _ => Err(EngineError::PriceUnavailable(symbol)),
        }
    }

    async fn trade(&self, account: AccountId, event: LedgerEvent) -> Result<Transaction, EngineError> {
        match self.execute(account, event.clone()).await? {
            Receipt::Traded(transaction) => Ok(transaction),
            _ => Err(unexpected(&event)),
        }
    }

    /// Create an account with its wallet and starter machine.
    pub async fn register_account(&self, name: &str) -> Result<Registration, EngineError> {
        let account = Uuid::new_v4();
        let partition = Arc::new(Mutex::new(S::default()));
        let mut store = partition.lock().await;
        let event = LedgerEvent::Register {
            name: name.to_string(),
        };
        let Receipt::Registered(registration) = self.commit(&mut store, account, &event).await?
        else {
            return Err(unexpected(&event));
        };
        self.inner
            .partitions
            .write()
            .await
            .insert(account, partition.clone());
        Ok(registration)
    }

    /// Remove an account and everything it owns. Running auto-spins are signalled to stop.
    pub async fn delete_account(&self, account: AccountId) -> Result<(), EngineError> {
        let partition = self
            .inner
            .partitions
            .write()
            .await
            .remove(&account)
            .ok_or(EngineError::AccountNotFound(account))?;
        // Wait for any unit already inside the critical section.
        let _store = partition.lock().await;

        self.inner
            .auto_spins
            .lock()
            .await
            .retain(|(owner, _), stop| {
                if *owner == account {
                    let _ = stop.send(true);
                    false
                } else {
                    true
                }
            });
        info!(%account, "account deleted");
        Ok(())
    }

    pub async fn resolve_spin(
        &self,
        account: AccountId,
        machine: MachineId,
        bet: u64,
    ) -> Result<SpinReceipt, EngineError> {
        let event = LedgerEvent::Spin { machine, bet };
        match self.execute(account, event.clone()).await? {
            Receipt::Spun(receipt) => Ok(receipt),
            _ => Err(unexpected(&event)),
        }
    }

    /// Start an auto-spin run. The first cycle is applied before returning; the rest run on a
    /// background task until the stop policy fires, the count is exhausted, a step is rejected,
    /// or [Engine::stop_auto_spin] is called.
    pub async fn start_auto_spin(
        &self,
        account: AccountId,
        machine: MachineId,
        bet: u64,
        count: u32,
        policy: StopPolicy,
    ) -> Result<AutoSpinStarted, EngineError> {
        let event = LedgerEvent::StartAutoSpin {
            machine,
            bet,
            count,
            policy,
        };
        let Receipt::AutoSpinStarted(first) = self.execute(account, event.clone()).await? else {
            return Err(unexpected(&event));
        };

        let handle = (first.session.status == SessionStatus::Active).then(|| {
            let (stop_tx, stop_rx) = watch::channel(false);
            let session = first.session.id;
            let engine = self.clone();
            tokio::spawn(async move {
                engine
                    .inner
                    .auto_spins
                    .lock()
                    .await
                    .insert((account, session), stop_tx);
                let result = engine.drive_auto_spin(account, session, stop_rx).await;
                engine.inner.auto_spins.lock().await.remove(&(account, session));
                result
            })
        });
        Ok(AutoSpinStarted { first, handle })
    }

    async fn drive_auto_spin(
        &self,
        account: AccountId,
        session: SessionId,
        mut stop: watch::Receiver<bool>,
    ) -> Result<AutoSpinFinished, EngineError> {
        let interval = self.inner.config.auto_spin_interval();
        let mut achievements = Vec::new();
        loop {
            let partition = self.partition(account).await?;
            let step = {
                let mut store = partition.lock().await;
                self.auto_spin_step(&mut store, account, session).await?
            };
            achievements.extend(step.achievements);
            if step.session.status != SessionStatus::Active {
                return Ok(AutoSpinFinished {
                    session: step.session,
                    achievements,
                });
            }
            pause(interval, &mut stop).await;
        }
    }

    /// Run one cycle. A rejected cycle stops the session with a reason derived from the error.
    async fn auto_spin_step(
        &self,
        store: &mut S,
        account: AccountId,
        session: SessionId,
    ) -> Result<StepReceipt, EngineError> {
        let event = LedgerEvent::AutoSpinStep { session };
        let err = match self.execute_locked(store, account, &event).await {
            Ok(Receipt::AutoSpinStep(step)) => return Ok(step),
            Ok(_) => return Err(unexpected(&event)),
            Err(err) => err,
        };

        let reason = match err.kind() {
            ErrorKind::InsufficientFunds => StopReason::InsufficientFunds,
            _ => StopReason::Aborted,
        };
        warn!(%account, session, error = %err, ?reason, "auto-spin step rejected; stopping");
        let stop = LedgerEvent::StopAutoSpin { reason };
        let mut attempt = 1;
        loop {
            match self.commit(store, account, &stop).await {
                Ok(Receipt::AutoSpinStopped(state)) => {
                    return Ok(StepReceipt {
                        outcome: None,
                        session: state,
                        achievements: Vec::new(),
                    })
                }
                Ok(_) => return Err(unexpected(&stop)),
                Err(EngineError::NoActiveSession) => return Err(err),
                Err(stop_err) if attempt < STOP_ATTEMPTS => {
                    warn!(%account, session, attempt, error = %stop_err, "auto-spin stop failed; retrying");
                    attempt += 1;
                }
                Err(stop_err) => {
                    warn!(
                        %account,
                        session,
                        error = %stop_err,
                        "auto-spin stop failed; session left active until stopped by hand"
                    );
                    return Err(stop_err);
                }
            }
        }
    }

    /// Stop the account's auto-spin run. Takes effect after the cycle in flight, never inside it.
    pub async fn stop_auto_spin(&self, account: AccountId) -> Result<SessionState, EngineError> {
        let event = LedgerEvent::StopAutoSpin {
            reason: StopReason::Requested,
        };
        let Receipt::AutoSpinStopped(state) = self.execute(account, event.clone()).await? else {
            return Err(unexpected(&event));
        };
        if let Some(stop) = self.inner.auto_spins.lock().await.get(&(account, state.id)) {
            let _ = stop.send(true);
        }
        Ok(state)
    }

    pub async fn claim_daily_bonus(&self, account: AccountId) -> Result<BonusReceipt, EngineError> {
        let event = LedgerEvent::ClaimDailyBonus;
        match self.execute(account, event.clone()).await? {
            Receipt::BonusClaimed(receipt) => Ok(receipt),
            _ => Err(unexpected(&event)),
        }
    }

    /// Spend `coins` on `asset` at the current quote.
    pub async fn purchase_crypto(
        &self,
        account: AccountId,
        asset: &str,
        coins: u64,
    ) -> Result<Transaction, EngineError> {
        let (asset, price) = self.quote(asset)?;
        self.trade(account, LedgerEvent::Purchase { asset, coins, price })
            .await
    }

    pub async fn sell_crypto(
        &self,
        account: AccountId,
        asset: &str,
        quantity: Decimal,
    ) -> Result<Transaction, EngineError> {
        let (asset, price) = self.quote(asset)?;
        self.trade(
            account,
            LedgerEvent::Sell {
                asset,
                quantity,
                price,
            },
        )
        .await
    }

    pub async fn convert_crypto(
        &self,
        account: AccountId,
        from: &str,
        to: &str,
        quantity: Decimal,
    ) -> Result<Transaction, EngineError> {
        let (from, from_price) = self.quote(from)?;
        let (to, to_price) = self.quote(to)?;
        self.trade(
            account,
            LedgerEvent::Convert {
                from,
                to,
                quantity,
                from_price,
                to_price,
            },
        )
        .await
    }

    /// Simulated deposit: credits the wallet with cost basis at the current quote.
    pub async fn deposit_crypto(
        &self,
        account: AccountId,
        asset: &str,
        quantity: Decimal,
    ) -> Result<Transaction, EngineError> {
        let (asset, price) = self.quote(asset)?;
        self.trade(
            account,
            LedgerEvent::Deposit {
                asset,
                quantity,
                price,
            },
        )
        .await
    }

    /// Simulated withdrawal: no quote is needed and no profit is realized.
    pub async fn withdraw_crypto(
        &self,
        account: AccountId,
        asset: &str,
        quantity: Decimal,
    ) -> Result<Transaction, EngineError> {
        self.trade(
            account,
            LedgerEvent::Withdraw {
                asset: asset.to_string(),
                quantity,
            },
        )
        .await
    }

    pub async fn acquire_machine(
        &self,
        account: AccountId,
        machine_type: &str,
    ) -> Result<MachineReceipt, EngineError> {
        let event = LedgerEvent::AcquireMachine {
            machine_type: machine_type.to_string(),
        };
        match self.execute(account, event.clone()).await? {
            Receipt::MachineAcquired(receipt) => Ok(receipt),
            _ => Err(unexpected(&event)),
        }
    }

    pub async fn apply_upgrade(
        &self,
        account: AccountId,
        machine: MachineId,
        upgrade: &str,
    ) -> Result<Transaction, EngineError> {
        let event = LedgerEvent::ApplyUpgrade {
            machine,
            upgrade: upgrade.to_string(),
        };
        match self.execute(account, event.clone()).await? {
            Receipt::MachineUpgraded(transaction) => Ok(transaction),
            _ => Err(unexpected(&event)),
        }
    }

    /// Run an achievement pass outside of any triggering event.
    pub async fn evaluate_achievements(
        &self,
        account: AccountId,
    ) -> Result<Vec<AchievementGrant>, EngineError> {
        let partition = self.partition(account).await?;
        let mut store = partition.lock().await;
        Ok(self.grant_achievements(&mut store, account).await)
    }

    pub async fn account_snapshot(&self, account: AccountId) -> Result<Account, EngineError> {
        let partition = self.partition(account).await?;
        let store = partition.lock().await;
        state::load_account(&*store, account)
            .await?
            .ok_or(EngineError::AccountNotFound(account))
    }

    pub async fn wallet(&self, account: AccountId) -> Result<Wallet, EngineError> {
        let partition = self.partition(account).await?;
        let store = partition.lock().await;
        Ok(state::load_wallet(&*store, account)
            .await?
            .unwrap_or_else(|| Wallet::new(account)))
    }

    /// Value the wallet at current quotes. Quotes are taken before the critical section.
    pub async fn portfolio(&self, account: AccountId) -> Result<PortfolioSummary, EngineError> {
        let prices: BTreeMap<String, Decimal> = self
            .inner
            .catalog
            .assets
            .iter()
            .filter_map(|asset| {
                self.inner
                    .oracle
                    .price(&asset.symbol)
                    .filter(|price| *price > Decimal::ZERO)
                    .map(|price| (asset.symbol.clone(), price))
            })
            .collect();
        let wallet = self.wallet(account).await?;
        portfolio::summarize(&wallet, &prices)
            .ok_or_else(|| EngineError::InvalidInput("portfolio value overflows".to_string()))
    }

    pub async fn machines(&self, account: AccountId) -> Result<Vec<Machine>, EngineError> {
        let partition = self.partition(account).await?;
        let store = partition.lock().await;
        let snapshot = state::load_account(&*store, account)
            .await?
            .ok_or(EngineError::AccountNotFound(account))?;
        let mut machines = Vec::new();
        for id in 0..snapshot.sequences.next_machine {
            if let Some(machine) = state::load_machine(&*store, account, id).await? {
                machines.push(machine);
            }
        }
        Ok(machines)
    }

    /// Latest session opened on a machine, if any.
    pub async fn session(
        &self,
        account: AccountId,
        machine: MachineId,
    ) -> Result<Option<SessionState>, EngineError> {
        let partition = self.partition(account).await?;
        let store = partition.lock().await;
        let machine = state::load_machine(&*store, account, machine)
            .await?
            .ok_or(EngineError::MachineNotFound(machine))?;
        let Some(session) = machine.active_session else {
            return Ok(None);
        };
        Ok(state::load_session(&*store, account, session)
            .await?
            .map(|session| session.state()))
    }

    /// Up to `limit` transactions, newest first.
    pub async fn transaction_history(
        &self,
        account: AccountId,
        limit: usize,
    ) -> Result<Vec<Transaction>, EngineError> {
        let partition = self.partition(account).await?;
        let store = partition.lock().await;
        let snapshot = state::load_account(&*store, account)
            .await?
            .ok_or(EngineError::AccountNotFound(account))?;
        let mut history = Vec::with_capacity(limit.min(snapshot.sequences.next_transaction as usize));
        for seq in (0..snapshot.sequences.next_transaction).rev().take(limit) {
            if let Some(transaction) = state::load_transaction(&*store, account, seq).await? {
                history.push(transaction);
            }
        }
        Ok(history)
    }

    pub async fn accounts(&self) -> Vec<AccountId> {
        self.inner.partitions.read().await.keys().copied().collect()
    }
}

/// Wait between auto-spin cycles, waking early on a stop signal.
async fn pause(interval: Duration, stop: &mut watch::Receiver<bool>) {
    if interval.is_zero() {
        tokio::task::yield_now().await;
        return;
    }
    tokio::select! {
        _ = tokio::time::sleep(interval) => {}
        _ = stop.changed() => {}
    }
}
