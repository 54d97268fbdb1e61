//! Records, store schema and static catalogs shared by the reelvault engine and its drivers.

pub mod catalog;
pub mod economy;
pub mod execution;
pub mod ledger;

pub use catalog::Catalog;
pub use execution::{Key, Value};
pub use ledger::{Currency, Leg, Transaction, TransactionKind};
