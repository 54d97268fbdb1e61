//! Load driver for the reelvault engine.
//!
//! Registers a population of simulated players, lets each of them play, trade and claim
//! rewards concurrently against one [Engine], and finally audits every account: the
//! transaction log must explain the coin balance exactly.

use anyhow::{anyhow, Context, Result};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use reelvault_execution::{
    portfolio::truncate_quantity, Engine, EngineConfig, EngineError, PriceOracle, SeededReels,
    SystemClock,
};
use reelvault_types::{
    catalog::{normalize_asset, CatalogError},
    economy::{AccountId, MachineId, StopPolicy},
    Catalog,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    str::FromStr,
    sync::{Arc, Mutex, PoisonError, RwLock},
};
use thiserror::Error;
use tracing::{debug, info, warn, Level};

/// Lowest quote the random walk can reach.
const PRICE_FLOOR: Decimal = Decimal::from_parts(1, 0, 0, false, 8);

/// Simulator configuration as read from YAML. Every field has a default.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub log_level: String,
    pub json_logs: bool,

    pub players: usize,
    pub rounds: usize,
    pub seed: u64,

    /// YAML catalog to load instead of the built-in one.
    pub catalog_path: Option<String>,
    pub engine: EngineConfig,

    /// Opening quote per asset symbol.
    pub prices: BTreeMap<String, Decimal>,
    /// Largest per-round price move, in basis points.
    pub volatility_bps: u32,

    /// Every `auto_spin_every` rounds a player runs an auto-spin instead of a single action.
    pub auto_spin_every: usize,
    pub auto_spin_count: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            players: 16,
            rounds: 200,
            seed: 0,
            catalog_path: None,
            engine: EngineConfig::default(),
            prices: BTreeMap::from([
                ("BTC".to_string(), Decimal::from(50_000)),
                ("ETH".to_string(), Decimal::from(3_000)),
                ("SOL".to_string(), Decimal::from(150)),
                ("DOGE".to_string(), Decimal::new(1, 1)),
            ]),
            volatility_bps: 200,
            auto_spin_every: 25,
            auto_spin_count: 10,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid log level: {value}")]
    InvalidLogLevel { value: String },
    #[error("{field} must be > 0 (got {value})")]
    InvalidNonZero { field: &'static str, value: usize },
    #[error("volatility_bps must be below 10000 (got {0})")]
    InvalidVolatility(u32),
    #[error("no opening price for {asset}")]
    MissingPrice { asset: String },
    #[error("opening price for {asset} must be positive (got {price})")]
    InvalidPrice { asset: String, price: Decimal },
    #[error("malformed asset symbol {0:?}")]
    InvalidAsset(String),
    #[error(transparent)]
    Engine(#[from] reelvault_execution::ConfigError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

pub struct ValidatedConfig {
    pub log_level: Level,
    pub json_logs: bool,

    pub players: usize,
    pub rounds: usize,
    pub seed: u64,

    pub catalog: Catalog,
    pub engine: EngineConfig,

    pub prices: BTreeMap<String, Decimal>,
    pub volatility_bps: u32,

    pub auto_spin_every: usize,
    pub auto_spin_count: u32,
}

fn ensure_nonzero(field: &'static str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidNonZero { field, value });
    }
    Ok(())
}

impl Config {
    /// Check the config against the catalog it will run with.
    pub fn validate(self, catalog: Catalog) -> Result<ValidatedConfig, ConfigError> {
        let log_level = Level::from_str(&self.log_level).map_err(|_| {
            ConfigError::InvalidLogLevel {
                value: self.log_level.clone(),
            }
        })?;
        ensure_nonzero("players", self.players)?;
        ensure_nonzero("rounds", self.rounds)?;
        ensure_nonzero("auto_spin_every", self.auto_spin_every)?;
        ensure_nonzero("auto_spin_count", self.auto_spin_count as usize)?;
        if self.volatility_bps >= 10_000 {
            return Err(ConfigError::InvalidVolatility(self.volatility_bps));
        }
        self.engine.validate(&catalog)?;

        let mut prices = BTreeMap::new();
        for (asset, price) in self.prices {
            let symbol = normalize_asset(&asset).ok_or(ConfigError::InvalidAsset(asset))?;
            if price <= Decimal::ZERO {
                return Err(ConfigError::InvalidPrice {
                    asset: symbol,
                    price,
                });
            }
            prices.insert(symbol, price);
        }
        if let Some(missing) = catalog
            .assets
            .iter()
            .find(|asset| !prices.contains_key(&asset.symbol))
        {
            return Err(ConfigError::MissingPrice {
                asset: missing.symbol.clone(),
            });
        }

        Ok(ValidatedConfig {
            log_level,
            json_logs: self.json_logs,
            players: self.players,
            rounds: self.rounds,
            seed: self.seed,
            catalog,
            engine: self.engine,
            prices,
            volatility_bps: self.volatility_bps,
            auto_spin_every: self.auto_spin_every,
            auto_spin_count: self.auto_spin_count,
        })
    }
}

/// Oracle whose quotes drift by a bounded random step each time [RandomWalkOracle::step] runs.
pub struct RandomWalkOracle {
    prices: RwLock<BTreeMap<String, Decimal>>,
    rng: Mutex<ChaCha20Rng>,
    volatility_bps: u32,
}

impl RandomWalkOracle {
    pub fn new(prices: BTreeMap<String, Decimal>, volatility_bps: u32, seed: u64) -> Self {
        Self {
            prices: RwLock::new(prices),
            rng: Mutex::new(ChaCha20Rng::seed_from_u64(seed)),
            volatility_bps,
        }
    }

    pub fn step(&self) {
        let bound = i64::from(self.volatility_bps);
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        let mut prices = self.prices.write().unwrap_or_else(PoisonError::into_inner);
        for price in prices.values_mut() {
            let moved = rng.gen_range(-bound..=bound);
            let next = *price * Decimal::from(10_000 + moved) / Decimal::from(10_000);
            *price = next.round_dp(8).max(PRICE_FLOOR);
        }
    }

    pub fn snapshot(&self) -> BTreeMap<String, Decimal> {
        self.prices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl PriceOracle for RandomWalkOracle {
    fn price(&self, asset: &str) -> Option<Decimal> {
        self.prices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(asset)
            .copied()
    }
}

/// Counts of what one player attempted.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Tally {
    pub operations: u64,
    pub spins: u64,
    pub auto_spin_runs: u64,
    /// Achievements reported back by spins, bonuses and auto-spin runs.
    pub achievements: u64,
    /// Rejections keyed by `operation:kind`.
    pub rejected: BTreeMap<String, u64>,
}

impl Tally {
    fn record<T>(&mut self, operation: &'static str, result: Result<T, EngineError>) -> Option<T> {
        self.operations += 1;
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                if matches!(err, EngineError::Storage(_)) {
                    warn!(operation, error = %err, "operation failed");
                } else {
                    debug!(operation, error = %err, "operation rejected");
                }
                *self
                    .rejected
                    .entry(format!("{operation}:{:?}", err.kind()))
                    .or_default() += 1;
                None
            }
        }
    }

    fn merge(&mut self, other: Tally) {
        self.operations += other.operations;
        self.spins += other.spins;
        self.auto_spin_runs += other.auto_spin_runs;
        self.achievements += other.achievements;
        for (key, count) in other.rejected {
            *self.rejected.entry(key).or_default() += count;
        }
    }
}

/// Per-account result of the final audit.
#[derive(Clone, Debug, Serialize)]
pub struct AccountReport {
    pub account: AccountId,
    pub name: String,
    pub coins: u64,
    pub tokens: Decimal,
    pub total_spins: u64,
    pub transactions: u64,
    pub market_value: Decimal,
    pub realized_pnl: Decimal,
    /// Whether replaying the transaction log reproduces every recorded coin balance.
    pub conserved: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct Report {
    pub seed: u64,
    pub players: usize,
    pub rounds: usize,
    pub tally: Tally,
    pub final_prices: BTreeMap<String, Decimal>,
    pub accounts: Vec<AccountReport>,
    pub violations: usize,
}

/// Replay an account's log from `initial_coins` and compare it with the stored balances.
pub async fn audit(
    engine: &Engine,
    account: AccountId,
    initial_coins: u64,
) -> Result<AccountReport, EngineError> {
    let snapshot = engine.account_snapshot(account).await?;
    let mut history = engine.transaction_history(account, usize::MAX).await?;
    history.reverse();

    let mut coins = i128::from(initial_coins);
    let mut conserved = true;
    for (seq, transaction) in history.iter().enumerate() {
        coins += transaction.coin_delta();
        if transaction.seq != seq as u64 || i128::from(transaction.balances.coins) != coins {
            warn!(%account, seq = transaction.seq, expected = %coins, "ledger does not explain balance");
            conserved = false;
        }
    }
    conserved &= i128::from(snapshot.coin_balance) == coins
        && snapshot.validate_invariants().is_ok();

    let portfolio = engine.portfolio(account).await?;
    Ok(AccountReport {
        account,
        name: snapshot.profile.name,
        coins: snapshot.coin_balance,
        tokens: snapshot.token_balance,
        total_spins: snapshot.stats.total_spins,
        transactions: history.len() as u64,
        market_value: portfolio.market_value,
        realized_pnl: portfolio.realized_pnl,
        conserved,
    })
}

struct Player {
    engine: Engine,
    account: AccountId,
    rng: ChaCha20Rng,
    assets: Vec<String>,
    machine_types: Vec<String>,
    upgrades: Vec<String>,
    auto_spin_every: usize,
    auto_spin_count: u32,
}

impl Player {
    /// A random owned machine and a bet inside its range.
    async fn pick_machine(&mut self) -> Option<(MachineId, u64)> {
        let machines = self.engine.machines(self.account).await.ok()?;
        if machines.is_empty() {
            return None;
        }
        let machine = &machines[self.rng.gen_range(0..machines.len())];
        let attributes = &machine.attributes;
        Some((
            machine.id,
            self.rng.gen_range(attributes.min_bet..=attributes.max_bet),
        ))
    }

    fn pick<'a>(&mut self, options: &'a [String]) -> Option<&'a str> {
        if options.is_empty() {
            return None;
        }
        Some(options[self.rng.gen_range(0..options.len())].as_str())
    }

    async fn share(&mut self, asset: &str) -> Decimal {
        let balance = match self.engine.wallet(self.account).await {
            Ok(wallet) => wallet.balance(asset),
            Err(_) => return Decimal::ZERO,
        };
        let percent = self.rng.gen_range(10u32..=100);
        truncate_quantity(balance * Decimal::from(percent) / Decimal::from(100))
    }

    async fn auto_spin(&mut self, tally: &mut Tally) -> Result<()> {
        let Some((machine, bet)) = self.pick_machine().await else {
            return Ok(());
        };
        let policy = StopPolicy {
            stop_on_jackpot: self.rng.gen_bool(0.5),
            stop_on_big_win: self.rng.gen_bool(0.5),
            big_win_threshold: bet.saturating_mul(20),
        };
        let started = self
            .engine
            .start_auto_spin(self.account, machine, bet, self.auto_spin_count, policy)
            .await;
        let Some(started) = tally.record("auto_spin", started) else {
            return Ok(());
        };
        tally.auto_spin_runs += 1;
        tally.achievements += started.first.achievements.len() as u64;
        let session = match started.handle {
            Some(handle) => {
                let finished = handle.await.context("auto-spin task panicked")?;
                match tally.record("auto_spin", finished) {
                    Some(finished) => {
                        tally.achievements += finished.achievements.len() as u64;
                        finished.session
                    }
                    None => return Ok(()),
                }
            }
            None => started.first.session,
        };
        let remaining = session.remaining.unwrap_or(0);
        tally.spins += u64::from(self.auto_spin_count.saturating_sub(remaining));
        debug!(account = %self.account, session = session.id, reason = ?session.stop_reason, "auto-spin finished");
        Ok(())
    }

    async fn act(&mut self, tally: &mut Tally) {
        let engine = self.engine.clone();
        let account = self.account;
        match self.rng.gen_range(0..100u32) {
            0..=59 => {
                if let Some((machine, bet)) = self.pick_machine().await {
                    let spun = engine.resolve_spin(account, machine, bet).await;
                    if let Some(receipt) = tally.record("spin", spun) {
                        tally.spins += 1;
                        tally.achievements += receipt.achievements.len() as u64;
                    }
                }
            }
            60..=71 => {
                let coins = self.rng.gen_range(10..=250);
                if let Some(asset) = self.pick(&self.assets.clone()) {
                    tally.record("purchase", engine.purchase_crypto(account, asset, coins).await);
                }
            }
            72..=81 => {
                if let Some(asset) = self.pick(&self.assets.clone()) {
                    let quantity = self.share(asset).await;
                    tally.record("sell", engine.sell_crypto(account, asset, quantity).await);
                }
            }
            82..=86 => {
                let assets = self.assets.clone();
                if let (Some(from), Some(to)) = (self.pick(&assets), self.pick(&assets)) {
                    let quantity = self.share(from).await;
                    tally.record(
                        "convert",
                        engine.convert_crypto(account, from, to, quantity).await,
                    );
                }
            }
            87..=91 => {
                let claimed = engine.claim_daily_bonus(account).await;
                if let Some(receipt) = tally.record("daily_bonus", claimed) {
                    tally.achievements += receipt.achievements.len() as u64;
                }
            }
            92..=95 => {
                if let Some(machine_type) = self.pick(&self.machine_types.clone()) {
                    tally.record(
                        "acquire_machine",
                        engine.acquire_machine(account, machine_type).await,
                    );
                }
            }
            _ => {
                let upgrades = self.upgrades.clone();
                let machine = self.pick_machine().await.map(|(machine, _)| machine);
                if let (Some(upgrade), Some(machine)) = (self.pick(&upgrades), machine) {
                    tally.record(
                        "apply_upgrade",
                        engine.apply_upgrade(account, machine, upgrade).await,
                    );
                }
            }
        }
    }

    async fn play(mut self, rounds: usize) -> Result<Tally> {
        let mut tally = Tally::default();
        for round in 1..=rounds {
            if round % self.auto_spin_every == 0 {
                self.auto_spin(&mut tally).await?;
            } else {
                self.act(&mut tally).await;
            }
            tokio::task::yield_now().await;
        }
        Ok(tally)
    }
}

/// Run the configured population to completion and audit every account.
pub async fn run_simulation(config: &ValidatedConfig) -> Result<Report> {
    let oracle = Arc::new(RandomWalkOracle::new(
        config.prices.clone(),
        config.volatility_bps,
        config.seed,
    ));
    let engine: Engine = Engine::builder(oracle.clone())
        .config(config.engine.clone())
        .catalog(config.catalog.clone())
        .reels(Arc::new(SeededReels::new(config.seed)))
        .clock(Arc::new(SystemClock))
        .build()
        .context("engine config rejected")?;

    let mut players = Vec::with_capacity(config.players);
    for index in 0..config.players {
        let registration = engine
            .register_account(&format!("player-{index}"))
            .await
            .with_context(|| format!("could not register player {index}"))?;
        players.push(Player {
            engine: engine.clone(),
            account: registration.account,
            rng: ChaCha20Rng::seed_from_u64(config.seed.wrapping_add(index as u64 + 1)),
            assets: config.prices.keys().cloned().collect(),
            machine_types: config
                .catalog
                .machine_types
                .iter()
                .map(|machine_type| machine_type.id.clone())
                .collect(),
            upgrades: config
                .catalog
                .upgrades
                .iter()
                .map(|upgrade| upgrade.id.clone())
                .collect(),
            auto_spin_every: config.auto_spin_every,
            auto_spin_count: config.auto_spin_count,
        });
    }
    let accounts: Vec<AccountId> = players.iter().map(|player| player.account).collect();
    info!(players = players.len(), rounds = config.rounds, seed = config.seed, "simulation started");

    let ticker = {
        let oracle = oracle.clone();
        let rounds = config.rounds;
        tokio::spawn(async move {
            for _ in 0..rounds {
                oracle.step();
                tokio::task::yield_now().await;
            }
        })
    };
    let tasks: Vec<_> = players
        .into_iter()
        .map(|player| tokio::spawn(player.play(config.rounds)))
        .collect();

    let mut tally = Tally::default();
    for task in futures::future::join_all(tasks).await {
        let player_tally = task.map_err(|err| anyhow!("player task failed: {err}"))??;
        tally.merge(player_tally);
    }
    ticker.await.context("price ticker failed")?;

    let mut reports = Vec::with_capacity(accounts.len());
    for account in accounts {
        reports.push(audit(&engine, account, config.engine.initial_coins).await?);
    }
    let violations = reports.iter().filter(|report| !report.conserved).count();
    if violations > 0 {
        warn!(violations, "conservation check failed");
    }
    info!(
        operations = tally.operations,
        spins = tally.spins,
        achievements = tally.achievements,
        violations,
        "simulation finished"
    );

    Ok(Report {
        seed: config.seed,
        players: config.players,
        rounds: config.rounds,
        tally,
        final_prices: oracle.snapshot(),
        accounts: reports,
        violations,
    })
}
