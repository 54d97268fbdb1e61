use reelvault_types::{
    catalog::CatalogError,
    economy::{
        DAILY_BONUS_BASE, INITIAL_COINS, MAX_AUTO_SPINS, MAX_CONFLICT_RETRIES,
        MAX_SESSION_SPINS, STARTER_MACHINE_TYPE,
    },
    Catalog,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("starter machine type {0} is not in the catalog")]
    UnknownStarterMachine(String),
    #[error("max_auto_spins must be at least 1")]
    ZeroAutoSpinLimit,
    #[error("daily_bonus_base must be positive")]
    ZeroDailyBonus,
    #[error("max_session_spins must be at least 1")]
    ZeroSessionSpinLimit,
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Engine tunables. Every field has a default, so a partial YAML/JSON document is accepted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub initial_coins: u64,
    pub starter_machine: String,
    pub daily_bonus_base: u64,
    pub max_conflict_retries: u32,
    /// Pause between auto-spin steps. Zero yields to the scheduler instead of sleeping.
    pub auto_spin_interval_ms: u64,
    pub max_auto_spins: u32,
    /// Spin records after which an idle manual session is closed.
    pub max_session_spins: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_coins: INITIAL_COINS,
            starter_machine: STARTER_MACHINE_TYPE.to_string(),
            daily_bonus_base: DAILY_BONUS_BASE,
            max_conflict_retries: MAX_CONFLICT_RETRIES,
            auto_spin_interval_ms: 0,
            max_auto_spins: MAX_AUTO_SPINS,
            max_session_spins: MAX_SESSION_SPINS,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self, catalog: &Catalog) -> Result<(), ConfigError> {
        catalog.validate()?;
        if catalog.machine_type(&self.starter_machine).is_none() {
            return Err(ConfigError::UnknownStarterMachine(
                self.starter_machine.clone(),
            ));
        }
        if self.max_auto_spins == 0 {
            return Err(ConfigError::ZeroAutoSpinLimit);
        }
        if self.daily_bonus_base == 0 {
            return Err(ConfigError::ZeroDailyBonus);
        }
        if self.max_session_spins == 0 {
            return Err(ConfigError::ZeroSessionSpinLimit);
        }
        Ok(())
    }

    pub fn auto_spin_interval(&self) -> Duration {
        Duration::from_millis(self.auto_spin_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate_against_standard_catalog() {
        let config = EngineConfig::default();
        config.validate(&Catalog::standard()).unwrap();
        assert_eq!(config.initial_coins, 1_000);
        assert_eq!(config.max_conflict_retries, 3);
        assert!(config.auto_spin_interval().is_zero());
        assert_eq!(config.max_session_spins, 500);

        let config = EngineConfig {
            max_session_spins: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(&Catalog::standard()),
            Err(ConfigError::ZeroSessionSpinLimit)
        ));
    }

    #[test]
    fn test_partial_document_keeps_defaults() {
        let config: EngineConfig =
            serde_yaml::from_str("initial_coins: 5000\nauto_spin_interval_ms: 25\n").unwrap();
        assert_eq!(config.initial_coins, 5_000);
        assert_eq!(config.auto_spin_interval(), Duration::from_millis(25));
        assert_eq!(config.starter_machine, "classic");
    }

    #[test]
    fn test_unknown_starter_machine_rejected() {
        let config = EngineConfig {
            starter_machine: "golden_goose".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(&Catalog::standard()),
            Err(ConfigError::UnknownStarterMachine(id)) if id == "golden_goose"
        ));
    }
}
