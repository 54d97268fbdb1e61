//! Daily bonus calendar.

use chrono::{Days, NaiveDate};
use reelvault_types::economy::{
    DailyBonusState, BASIS_POINTS_SCALE, DAILY_BONUS_MAX_BASIS_POINTS,
    DAILY_BONUS_STEP_BASIS_POINTS,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BonusClaim {
    pub amount: u64,
    pub streak: u32,
    pub next_available: NaiveDate,
}

/// Streak multiplier in basis points: `1 + 0.1 * (streak - 1)`, capped at 2x.
pub fn multiplier_basis_points(streak: u32) -> u32 {
    let growth = streak
        .saturating_sub(1)
        .saturating_mul(DAILY_BONUS_STEP_BASIS_POINTS);
    BASIS_POINTS_SCALE
        .saturating_add(growth)
        .min(DAILY_BONUS_MAX_BASIS_POINTS)
}

fn next_day(day: NaiveDate) -> NaiveDate {
    day.checked_add_days(Days::new(1)).unwrap_or(day)
}

/// Work out the claim for `today`. `Err` carries the first day a claim is accepted again.
///
/// A claim on the day after the last one extends the streak; any gap resets it to 1. A clock
/// that moved backwards is treated like a same-day claim.
pub fn claim(state: &DailyBonusState, today: NaiveDate, base: u64) -> Result<BonusClaim, NaiveDate> {
    let streak = match state.last_claimed_day {
        Some(last) if last >= today => return Err(next_day(last)),
        Some(last) if next_day(last) == today => state.streak.saturating_add(1),
        _ => 1,
    };
    let amount = u128::from(base) * u128::from(multiplier_basis_points(streak))
        / u128::from(BASIS_POINTS_SCALE);
    Ok(BonusClaim {
        amount: u64::try_from(amount).unwrap_or(u64::MAX),
        streak,
        next_available: next_day(today),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, d).unwrap()
    }

    #[test]
    fn test_streak_grows_and_caps() {
        let mut state = DailyBonusState::default();
        let mut amounts = Vec::new();
        for d in 1..=13 {
            let claim = claim(&state, day(d), 100).unwrap();
            assert_eq!(claim.streak, d);
            assert_eq!(claim.next_available, day(d + 1));
            amounts.push(claim.amount);
            state.last_claimed_day = Some(day(d));
            state.streak = claim.streak;
        }
        assert_eq!(
            amounts,
            vec![100, 110, 120, 130, 140, 150, 160, 170, 180, 190, 200, 200, 200]
        );
    }

    #[test]
    fn test_same_day_rejected() {
        let state = DailyBonusState {
            last_claimed_day: Some(day(4)),
            streak: 3,
        };
        assert_eq!(claim(&state, day(4), 100), Err(day(5)));
        assert_eq!(claim(&state, day(3), 100), Err(day(5)));
    }

    #[test]
    fn test_gap_resets_streak() {
        let state = DailyBonusState {
            last_claimed_day: Some(day(4)),
            streak: 6,
        };
        let claim = claim(&state, day(6), 100).unwrap();
        assert_eq!(claim.streak, 1);
        assert_eq!(claim.amount, 100);
    }

    #[test]
    fn test_amount_truncates() {
        assert_eq!(multiplier_basis_points(2), 11_000);
        let state = DailyBonusState {
            last_claimed_day: Some(day(1)),
            streak: 1,
        };
        assert_eq!(claim(&state, day(2), 15).unwrap().amount, 16);
    }
}
