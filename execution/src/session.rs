//! Auto-spin stopping policy.

use reelvault_types::economy::{AutoSpin, StopReason};

use crate::spin::SpinOutcome;

/// Reason the run ends after a spin, evaluated once `remaining` has been decremented for it.
///
/// Jackpot and big-win conditions take precedence over exhaustion so the recorded reason
/// reflects the policy that fired.
pub fn stop_reason(auto: &AutoSpin, outcome: &SpinOutcome) -> Option<StopReason> {
    let policy = &auto.policy;
    if policy.stop_on_jackpot && outcome.is_jackpot {
        Some(StopReason::Jackpot)
    } else if policy.stop_on_big_win && outcome.win_amount >= policy.big_win_threshold {
        Some(StopReason::BigWin)
    } else if auto.remaining == 0 {
        Some(StopReason::Exhausted)
    } else {
        None
    }
}
