//! Spin resolution.
//!
//! [resolve] is a pure function of the machine attributes, the bet and the draws taken from a
//! [ReelSource]; it touches no record. Balance and stat changes happen in the ledger layer.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use reelvault_types::{
    catalog::SymbolSpec,
    economy::{MachineAttributes, ASSET_DECIMALS, CRYPTO_EARNING_SCALE, JACKPOT_MULTIPLIER},
};
use rust_decimal::{prelude::ToPrimitive, Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};

/// Source of reel stops.
pub trait ReelSource: Send + Sync {
    /// Index of the symbol shown on one reel, in `0..symbols`.
    fn draw(&self, symbols: usize) -> usize;
}

/// Draws from the thread-local generator.
pub struct ThreadReels;

impl ReelSource for ThreadReels {
    fn draw(&self, symbols: usize) -> usize {
        rand::thread_rng().gen_range(0..symbols)
    }
}

/// Reproducible draws from a seeded ChaCha stream.
pub struct SeededReels {
    rng: Mutex<ChaCha20Rng>,
}

impl SeededReels {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(ChaCha20Rng::seed_from_u64(seed)),
        }
    }
}

impl ReelSource for SeededReels {
    fn draw(&self, symbols: usize) -> usize {
        self.rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .gen_range(0..symbols)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpinOutcome {
    pub symbols: Vec<String>,
    pub is_win: bool,
    pub is_jackpot: bool,
    pub win_amount: u64,
    pub crypto_earned: Decimal,
    /// Total multiplier applied to the bet (symbol payout, machine multiplier, jackpot).
    pub multiplier: Decimal,
}

/// Draw `attributes.reels` symbols and score them.
///
/// A spin wins only when every reel shows the same symbol. `symbols` must be non-empty; the
/// catalog guarantees this for every configured set.
pub fn resolve(
    attributes: &MachineAttributes,
    symbols: &[SymbolSpec],
    bet: u64,
    reels: &dyn ReelSource,
) -> SpinOutcome {
    let drawn: Vec<&SymbolSpec> = (0..attributes.reels)
        .map(|_| &symbols[reels.draw(symbols.len()) % symbols.len()])
        .collect();

    let matched = drawn
        .first()
        .filter(|first| drawn.iter().all(|spec| spec.symbol == first.symbol))
        .copied();

    let (is_jackpot, multiplier) = match matched {
        Some(spec) => {
            let mut multiplier = spec.payout * attributes.payout_multiplier;
            if spec.jackpot {
                multiplier *= Decimal::from(JACKPOT_MULTIPLIER);
            }
            (spec.jackpot, multiplier)
        }
        None => (false, Decimal::ZERO),
    };

    let win_amount = (Decimal::from(bet) * multiplier)
        .floor()
        .to_u64()
        .unwrap_or(u64::MAX);
    let crypto_earned = (Decimal::from(win_amount) * attributes.crypto_earning_rate
        / Decimal::from(CRYPTO_EARNING_SCALE))
    .round_dp_with_strategy(ASSET_DECIMALS, RoundingStrategy::ToZero);

    SpinOutcome {
        symbols: drawn.iter().map(|spec| spec.symbol.clone()).collect(),
        is_win: matched.is_some(),
        is_jackpot,
        win_amount,
        crypto_earned,
        multiplier,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::ScriptedReels;
    use reelvault_types::Catalog;
    use rust_decimal_macros::dec;

    fn classic() -> (MachineAttributes, Vec<SymbolSpec>) {
        let catalog = Catalog::standard();
        let attributes = catalog.machine_type("classic").unwrap().attributes.clone();
        let symbols = catalog.symbol_set("classic").unwrap().symbols.clone();
        (attributes, symbols)
    }

    #[test]
    fn test_jackpot_line() {
        let (attributes, symbols) = classic();
        // "seven" is the last classic symbol.
        let reels = ScriptedReels::repeat(5, 3);
        let outcome = resolve(&attributes, &symbols, 100, &reels);

        assert!(outcome.is_win);
        assert!(outcome.is_jackpot);
        assert_eq!(outcome.symbols, vec!["seven"; 3]);
        assert_eq!(outcome.multiplier, dec!(100));
        assert_eq!(outcome.win_amount, 10_000);
        assert_eq!(outcome.crypto_earned, dec!(5));
    }

    #[test]
    fn test_plain_line_pays_symbol_times_machine_multiplier() {
        let (mut attributes, symbols) = classic();
        attributes.payout_multiplier = dec!(1.5);
        let reels = ScriptedReels::repeat(1, 3);
        let outcome = resolve(&attributes, &symbols, 15, &reels);

        assert!(outcome.is_win);
        assert!(!outcome.is_jackpot);
        // 15 * 3 * 1.5 = 67.5, floored.
        assert_eq!(outcome.win_amount, 67);
        assert_eq!(outcome.crypto_earned, dec!(0.0335));
    }

    #[test]
    fn test_matching_line_wins_even_when_payout_floors_to_zero() {
        let (mut attributes, symbols) = classic();
        attributes.payout_multiplier = dec!(0.1);
        let reels = ScriptedReels::repeat(0, 3);
        let outcome = resolve(&attributes, &symbols, 1, &reels);

        assert!(outcome.is_win);
        assert_eq!(outcome.symbols, vec!["cherry"; 3]);
        assert_eq!(outcome.win_amount, 0);
        assert_eq!(outcome.crypto_earned, Decimal::ZERO);
    }

    #[test]
    fn test_mixed_line_loses() {
        let (attributes, symbols) = classic();
        let reels = ScriptedReels::new([5, 5, 4]);
        let outcome = resolve(&attributes, &symbols, 100, &reels);

        assert!(!outcome.is_win);
        assert!(!outcome.is_jackpot);
        assert_eq!(outcome.win_amount, 0);
        assert_eq!(outcome.crypto_earned, Decimal::ZERO);
        assert_eq!(outcome.multiplier, Decimal::ZERO);
        assert_eq!(outcome.symbols, vec!["seven", "seven", "bar"]);
    }

    #[test]
    fn test_single_reel_always_matches() {
        let (mut attributes, symbols) = classic();
        attributes.reels = 1;
        let reels = ScriptedReels::new([0]);
        let outcome = resolve(&attributes, &symbols, 10, &reels);
        assert!(outcome.is_win);
        assert_eq!(outcome.win_amount, 20);
    }

    #[test]
    fn test_seeded_reels_are_reproducible() {
        let (attributes, symbols) = classic();
        let first = SeededReels::new(42);
        let second = SeededReels::new(42);
        for _ in 0..50 {
            assert_eq!(
                resolve(&attributes, &symbols, 10, &first),
                resolve(&attributes, &symbols, 10, &second)
            );
        }
    }

    #[test]
    fn test_thread_reels_stay_in_range() {
        let reels = ThreadReels;
        for _ in 0..1_000 {
            assert!(reels.draw(6) < 6);
        }
    }
}
