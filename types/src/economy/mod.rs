mod account;
mod constants;
mod machine;
mod session;
mod wallet;

pub use account::*;
pub use constants::*;
pub use machine::*;
pub use session::*;
pub use wallet::*;

/// Account identifier issued at registration.
pub type AccountId = uuid::Uuid;

/// Machine identifier, unique within the owning account.
pub type MachineId = u64;

/// Session identifier, unique within the owning account.
pub type SessionId = u64;
