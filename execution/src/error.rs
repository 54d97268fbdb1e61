use chrono::NaiveDate;
use reelvault_types::{
    economy::{
        AccountId, MachineId, ERROR_ALREADY_CLAIMED, ERROR_CONFLICT, ERROR_INSUFFICIENT_FUNDS,
        ERROR_INVALID_BET, ERROR_INVALID_INPUT, ERROR_NOT_FOUND, ERROR_NO_ACTIVE_SESSION,
        ERROR_PRICE_UNAVAILABLE, ERROR_STORAGE, ERROR_UNSUPPORTED_ASSET,
    },
    Currency,
};
use rust_decimal::Decimal;
use thiserror::Error;

/// Coarse classification surfaced to callers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    InsufficientFunds,
    InvalidInput,
    NotFound,
    PriceUnavailable,
    Conflict,
    Fatal,
}

/// Every rejected operation leaves persisted state untouched, whatever the variant.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("insufficient {currency}: needed {needed}, available {available}")]
    InsufficientFunds {
        currency: Currency,
        needed: Decimal,
        available: Decimal,
    },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("bet {bet} outside machine range [{min}, {max}]")]
    InvalidBet { bet: u64, min: u64, max: u64 },
    #[error("unsupported asset: {0}")]
    UnsupportedAsset(String),
    #[error("machine {0} not found")]
    MachineNotFound(MachineId),
    #[error("account {0} not found")]
    AccountNotFound(AccountId),
    #[error("{0} not found")]
    NotFound(String),
    #[error("no price available for {0}")]
    PriceUnavailable(String),
    #[error("daily bonus already claimed (next available {next_available})")]
    AlreadyClaimed { next_available: NaiveDate },
    #[error("no active auto-spin session")]
    NoActiveSession,
    #[error("concurrent modification persisted after {attempts} attempts")]
    Conflict { attempts: u32 },
    #[error("storage failure: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl EngineError {
    pub fn insufficient_coins(needed: u64, available: u64) -> Self {
        Self::InsufficientFunds {
            currency: Currency::Coins,
            needed: Decimal::from(needed),
            available: Decimal::from(available),
        }
    }

    pub fn insufficient_asset(asset: &str, needed: Decimal, available: Decimal) -> Self {
        Self::InsufficientFunds {
            currency: Currency::Asset(asset.to_string()),
            needed,
            available,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            Self::InvalidInput(_)
            | Self::InvalidBet { .. }
            | Self::UnsupportedAsset(_)
            | Self::AlreadyClaimed { .. } => ErrorKind::InvalidInput,
            Self::MachineNotFound(_)
            | Self::AccountNotFound(_)
            | Self::NotFound(_)
            | Self::NoActiveSession => ErrorKind::NotFound,
            Self::PriceUnavailable(_) => ErrorKind::PriceUnavailable,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Storage(_) => ErrorKind::Fatal,
        }
    }

    /// Stable numeric code for the variant.
    pub fn code(&self) -> u8 {
        match self {
            Self::InsufficientFunds { .. } => ERROR_INSUFFICIENT_FUNDS,
            Self::InvalidInput(_) => ERROR_INVALID_INPUT,
            Self::InvalidBet { .. } => ERROR_INVALID_BET,
            Self::UnsupportedAsset(_) => ERROR_UNSUPPORTED_ASSET,
            Self::MachineNotFound(_) | Self::AccountNotFound(_) | Self::NotFound(_) => {
                ERROR_NOT_FOUND
            }
            Self::PriceUnavailable(_) => ERROR_PRICE_UNAVAILABLE,
            Self::AlreadyClaimed { .. } => ERROR_ALREADY_CLAIMED,
            Self::NoActiveSession => ERROR_NO_ACTIVE_SESSION,
            Self::Conflict { .. } => ERROR_CONFLICT,
            Self::Storage(_) => ERROR_STORAGE,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_follow_taxonomy() {
        assert_eq!(
            EngineError::insufficient_coins(100, 5).kind(),
            ErrorKind::InsufficientFunds
        );
        assert_eq!(
            EngineError::InvalidBet {
                bet: 5,
                min: 10,
                max: 100
            }
            .kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(EngineError::MachineNotFound(3).kind(), ErrorKind::NotFound);
        assert_eq!(EngineError::NoActiveSession.kind(), ErrorKind::NotFound);
        assert_eq!(
            EngineError::Storage(anyhow::anyhow!("disk gone")).kind(),
            ErrorKind::Fatal
        );
        assert!(EngineError::Conflict { attempts: 4 }.is_transient());
    }

    #[test]
    fn test_codes_are_distinct_per_family() {
        let codes = [
            EngineError::insufficient_coins(1, 0).code(),
            EngineError::InvalidInput(String::new()).code(),
            EngineError::InvalidBet {
                bet: 0,
                min: 1,
                max: 1,
            }
            .code(),
            EngineError::UnsupportedAsset(String::new()).code(),
            EngineError::NotFound(String::new()).code(),
            EngineError::PriceUnavailable(String::new()).code(),
            EngineError::NoActiveSession.code(),
            EngineError::Conflict { attempts: 1 }.code(),
        ];
        let unique: std::collections::BTreeSet<_> = codes.iter().collect();
        assert_eq!(unique.len(), codes.len());
    }

    #[test]
    fn test_insufficient_funds_message() {
        let err = EngineError::insufficient_asset("BTC", Decimal::new(15, 1), Decimal::ONE);
        assert_eq!(
            err.to_string(),
            "insufficient BTC: needed 1.5, available 1"
        );
    }
}
