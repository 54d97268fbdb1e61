//! Reelvault economy engine.
//!
//! This crate holds the ledger logic (`Layer`), the per-account engine that commits it, and the
//! pure pricing, payout and reward rules both of them use.
//!
//! ## Atomicity requirements
//! - Every mutation is one [`LedgerEvent`] prepared in a [`Layer`] and applied to the account's
//!   store partition with a single versioned write. A rejected event leaves nothing behind.
//! - Every balance change appends a transaction carrying the post-change balances.
//! - Market prices and wall-clock time are read before the account's critical section. Nothing
//!   inside a unit awaits an external collaborator.
//!
//! ## Concurrency
//! Units on the same account are serialized; units on different accounts never contend. Auto-spin
//! runs are background tasks that enter the critical section once per cycle, so a stop request
//! lands between cycles.
//!
//! The primary entrypoint is [`Engine`].
//!
//! ## Minimal session (example)
//! ```rust,ignore
//! use std::sync::Arc;
//! use reelvault_execution::{oracle::FixedPriceOracle, Engine};
//! use rust_decimal::Decimal;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let oracle = Arc::new(FixedPriceOracle::new([("BTC", Decimal::from(50_000))]));
//! let engine: Engine = Engine::builder(oracle).build()?;
//!
//! let player = engine.register_account("alice").await?;
//! let spin = engine.resolve_spin(player.account, player.starter_machine, 10).await?;
//! let bought = engine.purchase_crypto(player.account, "btc", 250).await?;
//! # Ok(())
//! # }
//! ```

pub mod achievements;
pub mod bonus;
pub mod config;
pub mod engine;
pub mod error;
pub mod oracle;
pub mod portfolio;
pub mod session;
pub mod spin;

#[cfg(any(test, feature = "mocks"))]
pub mod mocks;

mod layer;

mod state;

#[cfg(test)]
mod autospin_tests;
#[cfg(test)]
mod ledger_tests;

pub use config::{ConfigError, EngineConfig};
pub use engine::{AutoSpinFinished, AutoSpinStarted, Engine, EngineBuilder};
pub use error::{EngineError, ErrorKind};
pub use layer::{
    AchievementGrant, BonusReceipt, Layer, LedgerEvent, MachineReceipt, Receipt, Registration,
    SpinReceipt, StepReceipt,
};
pub use oracle::{Clock, PriceOracle, SystemClock};
pub use portfolio::{Holding, PortfolioSummary};
pub use spin::{ReelSource, SeededReels, SpinOutcome, ThreadReels};
pub use state::{
    load_account, load_machine, load_session, load_transaction, load_wallet, ApplyError, Memory,
    State, Status,
};
