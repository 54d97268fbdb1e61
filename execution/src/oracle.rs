//! Injected capabilities: market prices and wall-clock time.
//!
//! Both are consulted by the engine *before* it enters an account's critical section; nothing
//! inside a ledger unit reads them directly.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::{
    collections::HashMap,
    sync::{PoisonError, RwLock},
};

/// USD quote for an asset symbol.
pub trait PriceOracle: Send + Sync {
    /// Returns `None` when the asset cannot be quoted.
    fn price(&self, asset: &str) -> Option<Decimal>;
}

/// Oracle backed by a mutable price table.
#[derive(Default)]
pub struct FixedPriceOracle {
    prices: RwLock<HashMap<String, Decimal>>,
}

impl FixedPriceOracle {
    pub fn new<I, A>(prices: I) -> Self
    where
        I: IntoIterator<Item = (A, Decimal)>,
        A: Into<String>,
    {
        Self {
            prices: RwLock::new(
                prices
                    .into_iter()
                    .map(|(asset, price)| (asset.into(), price))
                    .collect(),
            ),
        }
    }

    pub fn set(&self, asset: &str, price: Decimal) {
        self.prices
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(asset.to_string(), price);
    }

    pub fn remove(&self, asset: &str) {
        self.prices
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(asset);
    }
}

impl PriceOracle for FixedPriceOracle {
    fn price(&self, asset: &str) -> Option<Decimal> {
        self.prices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(asset)
            .copied()
    }
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(start),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.write().unwrap_or_else(PoisonError::into_inner) = at;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.write().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().unwrap_or_else(PoisonError::into_inner)
    }
}
