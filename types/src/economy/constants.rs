/// Maximum account name length accepted at registration
pub const MAX_NAME_LENGTH: usize = 32;

/// Coins granted to a freshly registered account
pub const INITIAL_COINS: u64 = 1_000;

/// Machine type every account receives at registration
pub const STARTER_MACHINE_TYPE: &str = "classic";

/// Multiplier applied on top of the symbol payout when the jackpot symbol lines up
pub const JACKPOT_MULTIPLIER: u64 = 10;

/// Divisor applied to `win_amount * crypto_earning_rate` to derive crypto earned on a win
pub const CRYPTO_EARNING_SCALE: u64 = 10_000;

/// Trading fee in basis points (1%), taken from the credited side of a trade
pub const TRADE_FEE_BASIS_POINTS: u32 = 100;

/// Basis points denominator
pub const BASIS_POINTS_SCALE: u32 = 10_000;

/// Decimal places kept for persisted asset quantities and token balances
pub const ASSET_DECIMALS: u32 = 8;

/// Base coins granted by the daily bonus before the streak multiplier
pub const DAILY_BONUS_BASE: u64 = 100;

/// Streak multiplier growth per consecutive day, in basis points (0.1x)
pub const DAILY_BONUS_STEP_BASIS_POINTS: u32 = 1_000;

/// Upper bound of the daily bonus streak multiplier, in basis points (2.0x)
pub const DAILY_BONUS_MAX_BASIS_POINTS: u32 = 20_000;

/// Upper bound for a single auto-spin request
pub const MAX_AUTO_SPINS: u32 = 1_000;

/// Spin records a manual session keeps before it is closed and the next spin opens a new one
pub const MAX_SESSION_SPINS: usize = 500;

/// Conflict retries attempted before a ledger unit is surfaced as transient failure
pub const MAX_CONFLICT_RETRIES: u32 = 3;

/// Error codes reported alongside engine errors
pub const ERROR_INSUFFICIENT_FUNDS: u8 = 1;
pub const ERROR_INVALID_INPUT: u8 = 2;
pub const ERROR_INVALID_BET: u8 = 3;
pub const ERROR_UNSUPPORTED_ASSET: u8 = 4;
pub const ERROR_NOT_FOUND: u8 = 5;
pub const ERROR_PRICE_UNAVAILABLE: u8 = 6;
pub const ERROR_ALREADY_CLAIMED: u8 = 7;
pub const ERROR_NO_ACTIVE_SESSION: u8 = 8;
pub const ERROR_CONFLICT: u8 = 9;
pub const ERROR_STORAGE: u8 = 10;
