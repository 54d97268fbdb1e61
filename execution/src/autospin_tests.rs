//! Auto-spin lifecycle tests.
//!
//! Runs are driven by the engine's background task; tests await its handle to observe the
//! final session state.

#[cfg(test)]
mod tests {
    use crate::{
        config::EngineConfig,
        error::EngineError,
        mocks::{Harness, StubbornStops},
        state::State,
    };
    use reelvault_types::economy::{AccountId, SessionStatus, StopPolicy, StopReason, INITIAL_COINS};

    async fn player<S: State + Default + 'static>(harness: &Harness<S>) -> AccountId {
        harness
            .engine
            .register_account("spinner")
            .await
            .unwrap()
            .account
    }

    fn paced() -> Harness {
        Harness::with_config(EngineConfig {
            auto_spin_interval_ms: 50,
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_stops_on_jackpot() {
        let harness = Harness::new();
        let account = player(&harness).await;
        harness.reels.push([0, 1, 2, 0, 1, 2, 5, 5, 5]);

        let started = harness
            .engine
            .start_auto_spin(
                account,
                0,
                10,
                10,
                StopPolicy {
                    stop_on_jackpot: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(!started.first.outcome.is_win);
        assert_eq!(started.first.session.remaining, Some(9));

        let session = started.handle.unwrap().await.unwrap().unwrap().session;
        assert_eq!(session.status, SessionStatus::Stopped);
        assert_eq!(session.stop_reason, Some(StopReason::Jackpot));
        assert_eq!(session.spins_recorded, 3);
        assert_eq!(session.remaining, Some(7));
        assert_eq!(session.total_bet, 30);
        assert_eq!(session.total_won, 1_000);

        let snapshot = harness.engine.account_snapshot(account).await.unwrap();
        assert_eq!(snapshot.auto_spin, None);
        assert_eq!(snapshot.stats.total_spins, 3);
        assert_eq!(harness.engine.session(account, 0).await.unwrap(), Some(session));
    }

    #[tokio::test]
    async fn test_runs_until_exhausted() {
        let harness = Harness::new();
        let account = player(&harness).await;

        let started = harness
            .engine
            .start_auto_spin(account, 0, 10, 3, StopPolicy::default())
            .await
            .unwrap();
        let session = started.handle.unwrap().await.unwrap().unwrap().session;
        assert_eq!(session.stop_reason, Some(StopReason::Exhausted));
        assert_eq!(session.spins_recorded, 3);
        assert_eq!(session.remaining, Some(0));

        // Every reel lands on stop 0, so all three spins pay 2x.
        let snapshot = harness.engine.account_snapshot(account).await.unwrap();
        assert_eq!(snapshot.coin_balance, INITIAL_COINS + 30 + 50 + 100);
    }

    #[tokio::test]
    async fn test_later_cycles_report_their_achievements() {
        let harness = Harness::new();
        let account = player(&harness).await;
        harness.reels.push([0, 1, 2]);

        let started = harness
            .engine
            .start_auto_spin(account, 0, 10, 2, StopPolicy::default())
            .await
            .unwrap();
        let first: Vec<_> = started
            .first
            .achievements
            .iter()
            .map(|grant| grant.achievement.as_str())
            .collect();
        assert_eq!(first, ["first_spin"]);

        // The second cycle lands on stop 0 and wins.
        let finished = started.handle.unwrap().await.unwrap().unwrap();
        assert_eq!(finished.session.stop_reason, Some(StopReason::Exhausted));
        let later: Vec<_> = finished
            .achievements
            .iter()
            .map(|grant| grant.achievement.as_str())
            .collect();
        assert!(later.contains(&"first_win"), "granted {later:?}");
        assert!(!later.contains(&"first_spin"));

        let history = harness
            .engine
            .transaction_history(account, usize::MAX)
            .await
            .unwrap();
        let rewards = history
            .iter()
            .filter(|transaction| transaction.kind.label() == "achievement_reward")
            .count();
        assert_eq!(rewards, first.len() + later.len());
    }

    #[tokio::test]
    async fn test_single_spin_run_finishes_inline() {
        let harness = Harness::new();
        let account = player(&harness).await;

        let started = harness
            .engine
            .start_auto_spin(account, 0, 10, 1, StopPolicy::default())
            .await
            .unwrap();
        assert!(started.handle.is_none());
        assert_eq!(started.first.session.status, SessionStatus::Stopped);
        assert_eq!(started.first.session.stop_reason, Some(StopReason::Exhausted));
        assert_eq!(started.first.achievements.len(), 2);

        // The machine accepts a fresh run once the previous one ended.
        let again = harness
            .engine
            .start_auto_spin(account, 0, 10, 1, StopPolicy::default())
            .await
            .unwrap();
        assert_ne!(again.first.session.id, started.first.session.id);
    }

    #[tokio::test]
    async fn test_big_win_threshold_is_inclusive() {
        let harness = Harness::new();
        let account = player(&harness).await;

        let started = harness
            .engine
            .start_auto_spin(
                account,
                0,
                10,
                20,
                StopPolicy {
                    stop_on_big_win: true,
                    big_win_threshold: 20,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(started.handle.is_none());
        assert_eq!(started.first.outcome.win_amount, 20);
        assert_eq!(started.first.session.stop_reason, Some(StopReason::BigWin));
        assert_eq!(started.first.session.remaining, Some(19));
    }

    #[tokio::test]
    async fn test_running_out_of_coins_stops_the_run() {
        let harness = Harness::new();
        let account = player(&harness).await;
        for _ in 0..12 {
            harness.reels.push([0, 1, 2]);
        }

        let started = harness
            .engine
            .start_auto_spin(account, 0, 100, 50, StopPolicy::default())
            .await
            .unwrap();
        let session = started.handle.unwrap().await.unwrap().unwrap().session;
        assert_eq!(session.stop_reason, Some(StopReason::InsufficientFunds));
        assert_eq!(session.spins_recorded, 10);
        assert_eq!(session.remaining, Some(40));

        let snapshot = harness.engine.account_snapshot(account).await.unwrap();
        assert_eq!(snapshot.coin_balance, 50);
        assert_eq!(snapshot.auto_spin, None);
    }

    #[tokio::test]
    async fn test_stop_request_ends_run_between_cycles() {
        let harness = paced();
        let account = player(&harness).await;

        let started = harness
            .engine
            .start_auto_spin(account, 0, 10, 1_000, StopPolicy::default())
            .await
            .unwrap();
        let stopped = harness.engine.stop_auto_spin(account).await.unwrap();
        assert_eq!(stopped.status, SessionStatus::Stopped);
        assert_eq!(stopped.stop_reason, Some(StopReason::Requested));

        let last = started.handle.unwrap().await.unwrap().unwrap().session;
        assert_eq!(last, stopped);
        assert!(last.spins_recorded < 1_000);

        let err = harness.engine.stop_auto_spin(account).await.unwrap_err();
        assert!(matches!(err, EngineError::NoActiveSession));
    }

    #[tokio::test]
    async fn test_one_run_per_account() {
        let harness = paced();
        let account = player(&harness).await;
        harness
            .engine
            .acquire_machine(account, "classic")
            .await
            .unwrap();

        let started = harness
            .engine
            .start_auto_spin(account, 0, 10, 1_000, StopPolicy::default())
            .await
            .unwrap();

        let err = harness
            .engine
            .start_auto_spin(account, 1, 10, 5, StopPolicy::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
        let err = harness.engine.resolve_spin(account, 0, 10).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));

        // Manual play on another machine is unaffected.
        harness.engine.resolve_spin(account, 1, 10).await.unwrap();

        harness.engine.stop_auto_spin(account).await.unwrap();
        started.handle.unwrap().await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_rejects_bad_parameters() {
        let harness = Harness::new();
        let account = player(&harness).await;
        let max = harness.engine.config().max_auto_spins;

        for count in [0, max + 1] {
            let err = harness
                .engine
                .start_auto_spin(account, 0, 10, count, StopPolicy::default())
                .await
                .unwrap_err();
            assert!(matches!(err, EngineError::InvalidInput(_)), "count {count}");
        }
        let err = harness
            .engine
            .start_auto_spin(
                account,
                0,
                10,
                5,
                StopPolicy {
                    stop_on_big_win: true,
                    big_win_threshold: 0,
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
        let err = harness
            .engine
            .start_auto_spin(account, 0, 500, 5, StopPolicy::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidBet { .. }));

        let snapshot = harness.engine.account_snapshot(account).await.unwrap();
        assert_eq!(snapshot.auto_spin, None);
        assert_eq!(snapshot.coin_balance, INITIAL_COINS);
    }

    #[tokio::test]
    async fn test_deleting_account_ends_run() {
        let harness = paced();
        let account = player(&harness).await;

        let started = harness
            .engine
            .start_auto_spin(account, 0, 10, 1_000, StopPolicy::default())
            .await
            .unwrap();
        harness.engine.delete_account(account).await.unwrap();

        let err = started.handle.unwrap().await.unwrap().unwrap_err();
        assert!(matches!(err, EngineError::AccountNotFound(id) if id == account));
    }

    #[tokio::test]
    async fn test_conflicting_stop_is_retried() {
        let harness = Harness::<StubbornStops<4>>::build(EngineConfig::default());
        let account = player(&harness).await;
        for _ in 0..12 {
            harness.reels.push([0, 1, 2]);
        }

        let started = harness
            .engine
            .start_auto_spin(account, 0, 100, 50, StopPolicy::default())
            .await
            .unwrap();
        let session = started.handle.unwrap().await.unwrap().unwrap().session;
        assert_eq!(session.status, SessionStatus::Stopped);
        assert_eq!(session.stop_reason, Some(StopReason::InsufficientFunds));

        let snapshot = harness.engine.account_snapshot(account).await.unwrap();
        assert_eq!(snapshot.auto_spin, None);
    }

    #[tokio::test]
    async fn test_unstoppable_run_can_be_stopped_by_hand() {
        let harness = Harness::<StubbornStops<8>>::build(EngineConfig::default());
        let account = player(&harness).await;
        for _ in 0..12 {
            harness.reels.push([0, 1, 2]);
        }

        let started = harness
            .engine
            .start_auto_spin(account, 0, 100, 50, StopPolicy::default())
            .await
            .unwrap();
        let err = started.handle.unwrap().await.unwrap().unwrap_err();
        assert!(matches!(err, EngineError::Conflict { attempts: 4 }));
        let snapshot = harness.engine.account_snapshot(account).await.unwrap();
        assert!(snapshot.auto_spin.is_some());

        let stopped = harness.engine.stop_auto_spin(account).await.unwrap();
        assert_eq!(stopped.stop_reason, Some(StopReason::Requested));
        let snapshot = harness.engine.account_snapshot(account).await.unwrap();
        assert_eq!(snapshot.auto_spin, None);
    }
}
