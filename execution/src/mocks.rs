use crate::{
    config::EngineConfig,
    engine::Engine,
    oracle::{FixedPriceOracle, ManualClock},
    spin::ReelSource,
    state::{ApplyError, Memory, State, Status},
};
use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use reelvault_types::{
    economy::{SessionStatus, StopReason},
    Catalog, Key, Value,
};
use rust_decimal::Decimal;
use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, PoisonError},
};

/// Reel source replaying a fixed queue of stops, then stop 0 forever
#[derive(Default)]
pub struct ScriptedReels {
    stops: Mutex<VecDeque<usize>>,
}

impl ScriptedReels {
    pub fn new(stops: impl IntoIterator<Item = usize>) -> Self {
        Self {
            stops: Mutex::new(stops.into_iter().collect()),
        }
    }

    /// Lands `count` reels on the same stop
    pub fn repeat(stop: usize, count: usize) -> Self {
        Self::new(std::iter::repeat(stop).take(count))
    }

    /// Queues more stops behind the ones not yet drawn
    pub fn push(&self, stops: impl IntoIterator<Item = usize>) {
        self.stops
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(stops);
    }

    pub fn remaining(&self) -> usize {
        self.stops
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl ReelSource for ScriptedReels {
    fn draw(&self, symbols: usize) -> usize {
        let stop = self
            .stops
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or(0);
        stop % symbols.max(1)
    }
}

/// Store whose first `N` versioned writes report a conflict
pub struct ConflictingMemory<const N: u32> {
    inner: Memory,
    conflicts_left: u32,
}

impl<const N: u32> Default for ConflictingMemory<N> {
    fn default() -> Self {
        Self {
            inner: Memory::default(),
            conflicts_left: N,
        }
    }
}

impl<const N: u32> State for ConflictingMemory<N> {
    async fn get(&self, key: &Key) -> Result<Option<Value>> {
        self.inner.get(key).await
    }

    async fn insert(&mut self, key: Key, value: Value) -> Result<()> {
        self.inner.insert(key, value).await
    }

    async fn delete(&mut self, key: &Key) -> Result<()> {
        self.inner.delete(key).await
    }

    fn version(&self) -> u64 {
        self.inner.version()
    }

    async fn apply(&mut self, changes: Vec<(Key, Status)>) -> Result<()> {
        self.inner.apply(changes).await
    }

    async fn apply_versioned(
        &mut self,
        expected: u64,
        changes: Vec<(Key, Status)>,
    ) -> Result<(), ApplyError> {
        if self.conflicts_left > 0 {
            self.conflicts_left -= 1;
            return Err(ApplyError::Conflict {
                expected,
                found: expected + 1,
            });
        }
        self.inner.apply_versioned(expected, changes).await
    }
}

/// Store whose first `N` writes that end a session for lack of funds report a conflict
pub struct StubbornStops<const N: u32> {
    inner: Memory,
    conflicts_left: u32,
}

impl<const N: u32> Default for StubbornStops<N> {
    fn default() -> Self {
        Self {
            inner: Memory::default(),
            conflicts_left: N,
        }
    }
}

fn stops_for_funds(changes: &[(Key, Status)]) -> bool {
    changes.iter().any(|(_, status)| {
        matches!(
            status,
            Status::Update(Value::Session(session))
                if session.stop_reason == Some(StopReason::InsufficientFunds)
                    && session.status == SessionStatus::Stopped
        )
    })
}

impl<const N: u32> State for StubbornStops<N> {
    async fn get(&self, key: &Key) -> Result<Option<Value>> {
        self.inner.get(key).await
    }

    async fn insert(&mut self, key: Key, value: Value) -> Result<()> {
        self.inner.insert(key, value).await
    }

    async fn delete(&mut self, key: &Key) -> Result<()> {
        self.inner.delete(key).await
    }

    fn version(&self) -> u64 {
        self.inner.version()
    }

    async fn apply(&mut self, changes: Vec<(Key, Status)>) -> Result<()> {
        self.inner.apply(changes).await
    }

    async fn apply_versioned(
        &mut self,
        expected: u64,
        changes: Vec<(Key, Status)>,
    ) -> Result<(), ApplyError> {
        if self.conflicts_left > 0 && stops_for_funds(&changes) {
            self.conflicts_left -= 1;
            return Err(ApplyError::Conflict {
                expected,
                found: expected + 1,
            });
        }
        self.inner.apply_versioned(expected, changes).await
    }
}

/// Fixed start time used by test clocks
pub fn test_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 30, 0)
        .single()
        .unwrap_or_default()
}

/// Oracle quoting every standard asset
pub fn create_oracle() -> FixedPriceOracle {
    FixedPriceOracle::new([
        ("BTC", Decimal::from(50_000)),
        ("ETH", Decimal::from(3_000)),
        ("SOL", Decimal::from(150)),
        ("DOGE", Decimal::new(1, 1)),
    ])
}

/// Engine wired to scripted reels, a manual clock and a fixed oracle
pub struct Harness<S = Memory> {
    pub engine: Engine<S>,
    pub reels: Arc<ScriptedReels>,
    pub clock: Arc<ManualClock>,
    pub oracle: Arc<FixedPriceOracle>,
}

impl Harness<Memory> {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self::build(config)
    }
}

impl Default for Harness<Memory> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: State + Default + 'static> Harness<S> {
    /// Creates a harness over any store type
    pub fn build(config: EngineConfig) -> Self {
        let reels = Arc::new(ScriptedReels::default());
        let clock = Arc::new(ManualClock::new(test_time()));
        let oracle = Arc::new(create_oracle());
        let engine = Engine::builder(oracle.clone())
            .config(config)
            .catalog(Catalog::standard())
            .reels(reels.clone())
            .clock(clock.clone())
            .build::<S>()
            .expect("test config must validate");
        Self {
            engine,
            reels,
            clock,
            oracle,
        }
    }
}
