//! Read-only configuration: symbol sets, machine types, upgrades, achievements and assets.
//!
//! A [Catalog] is validated once when it is loaded; the engine relies on the validated
//! shape (non-empty symbol sets, at least one reel, non-empty bet ranges) and never
//! re-checks it per spin.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error as ThisError;

use crate::economy::{AttributeDeltas, MachineAttributes, MachineInvariantError, StatField};

#[derive(Debug, ThisError)]
pub enum CatalogError {
    #[error("symbol set {0} has no symbols")]
    EmptySymbolSet(String),
    #[error("symbol {symbol} in set {set} has a non-positive payout")]
    NonPositivePayout { set: String, symbol: String },
    #[error("machine type {machine_type} references unknown symbol set {set}")]
    UnknownSymbolSet { machine_type: String, set: String },
    #[error("machine type {id} is invalid: {source}")]
    InvalidMachine {
        id: String,
        #[source]
        source: MachineInvariantError,
    },
    #[error("duplicate {kind} id: {id}")]
    DuplicateId { kind: &'static str, id: String },
    #[error("achievement {0} must have a positive threshold")]
    ZeroThreshold(String),
    #[error("asset symbol {0} is malformed")]
    MalformedAsset(String),
    #[error("catalog has no machine types")]
    NoMachineTypes,
    #[error("could not parse catalog: {0}")]
    Parse(#[from] serde_yaml::Error),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolSpec {
    pub symbol: String,
    pub payout: Decimal,
    #[serde(default)]
    pub jackpot: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolSet {
    pub name: String,
    pub symbols: Vec<SymbolSpec>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineType {
    pub id: String,
    pub name: String,
    pub price: u64,
    pub attributes: MachineAttributes,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Upgrade {
    pub id: String,
    pub name: String,
    pub cost: u64,
    pub deltas: AttributeDeltas,
}

/// Inclusive threshold on one stat field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievementRule {
    pub stat: StatField,
    pub threshold: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Reward {
    pub coins: u64,
    pub tokens: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Achievement {
    pub id: String,
    pub name: String,
    pub rule: AchievementRule,
    pub reward: Reward,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetSpec {
    pub symbol: String,
    pub name: String,
}

/// Normalize a user-supplied asset symbol (`" btc "` -> `"BTC"`).
///
/// Returns `None` when the symbol is not 2-10 ASCII alphanumerics.
pub fn normalize_asset(symbol: &str) -> Option<String> {
    let trimmed = symbol.trim();
    if !(2..=10).contains(&trimmed.len()) || !trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(trimmed.to_ascii_uppercase())
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    pub symbol_sets: Vec<SymbolSet>,
    pub machine_types: Vec<MachineType>,
    #[serde(default)]
    pub upgrades: Vec<Upgrade>,
    #[serde(default)]
    pub achievements: Vec<Achievement>,
    #[serde(default)]
    pub assets: Vec<AssetSpec>,
}

impl Catalog {
    /// Parse and validate a YAML catalog.
    pub fn from_yaml(contents: &str) -> Result<Self, CatalogError> {
        let catalog: Catalog = serde_yaml::from_str(contents)?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn validate(&self) -> Result<(), CatalogError> {
        ensure_unique("symbol set", self.symbol_sets.iter().map(|s| s.name.as_str()))?;
        ensure_unique("machine type", self.machine_types.iter().map(|m| m.id.as_str()))?;
        ensure_unique("upgrade", self.upgrades.iter().map(|u| u.id.as_str()))?;
        ensure_unique("achievement", self.achievements.iter().map(|a| a.id.as_str()))?;
        ensure_unique("asset", self.assets.iter().map(|a| a.symbol.as_str()))?;

        for set in &self.symbol_sets {
            if set.symbols.is_empty() {
                return Err(CatalogError::EmptySymbolSet(set.name.clone()));
            }
            if let Some(bad) = set.symbols.iter().find(|s| s.payout <= Decimal::ZERO) {
                return Err(CatalogError::NonPositivePayout {
                    set: set.name.clone(),
                    symbol: bad.symbol.clone(),
                });
            }
        }
        if self.machine_types.is_empty() {
            return Err(CatalogError::NoMachineTypes);
        }
        for machine in &self.machine_types {
            machine
                .attributes
                .validate()
                .map_err(|source| CatalogError::InvalidMachine {
                    id: machine.id.clone(),
                    source,
                })?;
            if self.symbol_set(&machine.attributes.symbol_set).is_none() {
                return Err(CatalogError::UnknownSymbolSet {
                    machine_type: machine.id.clone(),
                    set: machine.attributes.symbol_set.clone(),
                });
            }
        }
        for achievement in &self.achievements {
            if achievement.rule.threshold == 0 {
                return Err(CatalogError::ZeroThreshold(achievement.id.clone()));
            }
        }
        for asset in &self.assets {
            if normalize_asset(&asset.symbol).as_deref() != Some(asset.symbol.as_str()) {
                return Err(CatalogError::MalformedAsset(asset.symbol.clone()));
            }
        }
        Ok(())
    }

    pub fn symbol_set(&self, name: &str) -> Option<&SymbolSet> {
        self.symbol_sets.iter().find(|set| set.name == name)
    }

    pub fn machine_type(&self, id: &str) -> Option<&MachineType> {
        self.machine_types.iter().find(|m| m.id == id)
    }

    pub fn upgrade(&self, id: &str) -> Option<&Upgrade> {
        self.upgrades.iter().find(|u| u.id == id)
    }

    pub fn achievement(&self, id: &str) -> Option<&Achievement> {
        self.achievements.iter().find(|a| a.id == id)
    }

    /// Achievement rules in catalog order.
    pub fn achievements(&self) -> &[Achievement] {
        &self.achievements
    }

    pub fn asset(&self, symbol: &str) -> Option<&AssetSpec> {
        self.assets.iter().find(|a| a.symbol == symbol)
    }

    /// Built-in catalog used when no catalog file is configured.
    pub fn standard() -> Self {
        let symbol = |symbol: &str, payout: i64, jackpot: bool| SymbolSpec {
            symbol: symbol.to_string(),
            payout: Decimal::from(payout),
            jackpot,
        };
        let attributes = |reels, paylines, min_bet, max_bet, multiplier: (i64, u32), rate: i64, set: &str| {
            MachineAttributes {
                payout_multiplier: Decimal::new(multiplier.0, multiplier.1),
                reels,
                paylines,
                min_bet,
                max_bet,
                crypto_earning_rate: Decimal::from(rate),
                symbol_set: set.to_string(),
            }
        };
        let achievement = |id: &str, name: &str, stat, threshold, coins, tokens: i64| Achievement {
            id: id.to_string(),
            name: name.to_string(),
            rule: AchievementRule { stat, threshold },
            reward: Reward {
                coins,
                tokens: Decimal::from(tokens),
            },
        };
        let asset = |symbol: &str, name: &str| AssetSpec {
            symbol: symbol.to_string(),
            name: name.to_string(),
        };

        Self {
            symbol_sets: vec![
                SymbolSet {
                    name: "classic".to_string(),
                    symbols: vec![
                        symbol("cherry", 2, false),
                        symbol("lemon", 3, false),
                        symbol("orange", 4, false),
                        symbol("bell", 5, false),
                        symbol("bar", 8, false),
                        symbol("seven", 10, true),
                    ],
                },
                SymbolSet {
                    name: "fruit".to_string(),
                    symbols: vec![
                        symbol("cherry", 2, false),
                        symbol("grape", 3, false),
                        symbol("watermelon", 4, false),
                        symbol("pineapple", 6, false),
                        symbol("star", 12, true),
                    ],
                },
                SymbolSet {
                    name: "crypto".to_string(),
                    symbols: vec![
                        symbol("ada", 2, false),
                        symbol("doge", 3, false),
                        symbol("sol", 4, false),
                        symbol("eth", 6, false),
                        symbol("btc", 10, true),
                    ],
                },
            ],
            machine_types: vec![
                MachineType {
                    id: "classic".to_string(),
                    name: "Classic Reels".to_string(),
                    price: 0,
                    attributes: attributes(3, 1, 10, 100, (10, 1), 5, "classic"),
                },
                MachineType {
                    id: "fruit_frenzy".to_string(),
                    name: "Fruit Frenzy".to_string(),
                    price: 5_000,
                    attributes: attributes(3, 5, 20, 500, (12, 1), 8, "fruit"),
                },
                MachineType {
                    id: "crypto_rush".to_string(),
                    name: "Crypto Rush".to_string(),
                    price: 25_000,
                    attributes: attributes(4, 9, 50, 2_000, (15, 1), 20, "crypto"),
                },
            ],
            upgrades: vec![
                Upgrade {
                    id: "lucky_charm".to_string(),
                    name: "Lucky Charm".to_string(),
                    cost: 2_000,
                    deltas: AttributeDeltas {
                        payout_multiplier: Decimal::new(1, 1),
                        ..Default::default()
                    },
                },
                Upgrade {
                    id: "high_roller".to_string(),
                    name: "High Roller Table".to_string(),
                    cost: 5_000,
                    deltas: AttributeDeltas {
                        max_bet: 400,
                        ..Default::default()
                    },
                },
                Upgrade {
                    id: "crypto_miner".to_string(),
                    name: "Crypto Miner".to_string(),
                    cost: 3_000,
                    deltas: AttributeDeltas {
                        crypto_earning_rate: Decimal::from(2),
                        ..Default::default()
                    },
                },
                Upgrade {
                    id: "extra_lines".to_string(),
                    name: "Extra Paylines".to_string(),
                    cost: 1_500,
                    deltas: AttributeDeltas {
                        paylines: 2,
                        ..Default::default()
                    },
                },
            ],
            achievements: vec![
                achievement("first_spin", "First Spin", StatField::TotalSpins, 1, 50, 0),
                achievement("regular", "Regular", StatField::TotalSpins, 100, 500, 0),
                achievement("first_win", "Winner", StatField::TotalWins, 1, 100, 0),
                achievement("big_winner", "Big Winner", StatField::BiggestWin, 1_000, 1_000, 0),
                achievement("jackpot_hunter", "Jackpot Hunter", StatField::JackpotsHit, 1, 2_500, 1),
                achievement("high_roller", "High Roller", StatField::TotalBets, 10_000, 1_000, 0),
                achievement("dedicated", "Dedicated", StatField::DailyStreak, 7, 700, 0),
            ],
            assets: vec![
                asset("BTC", "Bitcoin"),
                asset("ETH", "Ethereum"),
                asset("SOL", "Solana"),
                asset("DOGE", "Dogecoin"),
            ],
        }
    }
}

fn ensure_unique<'a>(
    kind: &'static str,
    ids: impl Iterator<Item = &'a str>,
) -> Result<(), CatalogError> {
    let mut seen = BTreeSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(CatalogError::DuplicateId {
                kind,
                id: id.to_string(),
            });
        }
    }
    Ok(())
}
