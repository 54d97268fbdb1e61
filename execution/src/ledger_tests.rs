//! Ledger consistency tests.
//!
//! These check that the transaction log always explains the account's coin balance, that
//! units survive store conflicts, and that concurrent callers never lose an update.

#[cfg(test)]
mod tests {
    use crate::{
        config::EngineConfig,
        engine::Engine,
        error::EngineError,
        mocks::{ConflictingMemory, Harness},
        portfolio::truncate_quantity,
        state::Memory,
    };
    use chrono::Duration;
    use futures::future::join_all;
    use proptest::prelude::*;
    use reelvault_types::economy::{AccountId, INITIAL_COINS};
    use rust_decimal::Decimal;

    const ASSETS: [&str; 4] = ["BTC", "ETH", "SOL", "DOGE"];

    #[derive(Clone, Debug)]
    enum Op {
        Spin { bet: u64, stops: [usize; 3] },
        Bonus { days: i64 },
        Purchase { asset: usize, coins: u64 },
        Sell { asset: usize, percent: u32 },
        Convert { from: usize, to: usize, percent: u32 },
        Deposit { asset: usize, units: u32 },
        Withdraw { asset: usize, percent: u32 },
        Reprice { asset: usize, percent: u32 },
        Acquire,
    }

    fn op() -> impl Strategy<Value = Op> {
        let asset = 0usize..ASSETS.len();
        prop_oneof![
            4 => (10u64..=100, [0usize..6, 0usize..6, 0usize..6])
                .prop_map(|(bet, stops)| Op::Spin { bet, stops }),
            1 => (0i64..3).prop_map(|days| Op::Bonus { days }),
            2 => (asset.clone(), 1u64..600).prop_map(|(asset, coins)| Op::Purchase { asset, coins }),
            2 => (asset.clone(), 1u32..=100).prop_map(|(asset, percent)| Op::Sell { asset, percent }),
            1 => (asset.clone(), asset.clone(), 1u32..=100)
                .prop_map(|(from, to, percent)| Op::Convert { from, to, percent }),
            1 => (asset.clone(), 1u32..5).prop_map(|(asset, units)| Op::Deposit { asset, units }),
            1 => (asset.clone(), 1u32..=100).prop_map(|(asset, percent)| Op::Withdraw { asset, percent }),
            1 => (asset, 50u32..200).prop_map(|(asset, percent)| Op::Reprice { asset, percent }),
            1 => Just(Op::Acquire),
        ]
    }

    async fn share(harness: &Harness, account: AccountId, asset: &str, percent: u32) -> Decimal {
        let balance = harness.engine.wallet(account).await.unwrap().balance(asset);
        truncate_quantity(balance * Decimal::from(percent) / Decimal::from(100))
    }

    async fn run(harness: &Harness, account: AccountId, op: &Op) -> Result<(), EngineError> {
        let engine = &harness.engine;
        match *op {
            Op::Spin { bet, stops } => {
                harness.reels.push(stops);
                engine.resolve_spin(account, 0, bet).await.map(drop)
            }
            Op::Bonus { days } => {
                harness.clock.advance(Duration::days(days));
                engine.claim_daily_bonus(account).await.map(drop)
            }
            Op::Purchase { asset, coins } => engine
                .purchase_crypto(account, ASSETS[asset], coins)
                .await
                .map(drop),
            Op::Sell { asset, percent } => {
                let quantity = share(harness, account, ASSETS[asset], percent).await;
                engine
                    .sell_crypto(account, ASSETS[asset], quantity)
                    .await
                    .map(drop)
            }
            Op::Convert { from, to, percent } => {
                let quantity = share(harness, account, ASSETS[from], percent).await;
                engine
                    .convert_crypto(account, ASSETS[from], ASSETS[to], quantity)
                    .await
                    .map(drop)
            }
            Op::Deposit { asset, units } => engine
                .deposit_crypto(account, ASSETS[asset], Decimal::from(units))
                .await
                .map(drop),
            Op::Withdraw { asset, percent } => {
                let quantity = share(harness, account, ASSETS[asset], percent).await;
                engine
                    .withdraw_crypto(account, ASSETS[asset], quantity)
                    .await
                    .map(drop)
            }
            Op::Reprice { asset, percent } => {
                let base = crate::mocks::create_oracle();
                let price = crate::oracle::PriceOracle::price(&base, ASSETS[asset])
                    .unwrap_or(Decimal::ONE);
                harness
                    .oracle
                    .set(ASSETS[asset], price * Decimal::from(percent) / Decimal::from(100));
                Ok(())
            }
            Op::Acquire => engine
                .acquire_machine(account, "fruit_frenzy")
                .await
                .map(drop),
        }
    }

    /// Replays the log and checks every recorded balance against the running total.
    async fn assert_log_explains_balance<S>(engine: &Engine<S>, account: AccountId)
    where
        S: crate::state::State + Default + 'static,
    {
        let snapshot = engine.account_snapshot(account).await.unwrap();
        let mut history = engine
            .transaction_history(account, usize::MAX)
            .await
            .unwrap();
        history.reverse();

        let mut coins = i128::from(INITIAL_COINS);
        for (seq, transaction) in history.iter().enumerate() {
            assert_eq!(transaction.seq, seq as u64);
            coins += transaction.coin_delta();
            assert_eq!(
                i128::from(transaction.balances.coins),
                coins,
                "transaction {seq} ({})",
                transaction.kind.label()
            );
        }
        assert_eq!(i128::from(snapshot.coin_balance), coins);
        assert_eq!(snapshot.sequences.next_transaction, history.len() as u64);
        snapshot.validate_invariants().unwrap();
        engine
            .wallet(account)
            .await
            .unwrap()
            .validate_invariants()
            .unwrap();
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn test_transaction_log_conserves_coins(ops in prop::collection::vec(op(), 1..40)) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async {
                let harness = Harness::new();
                let account = harness.engine.register_account("prop").await.unwrap().account;
                for op in &ops {
                    let before = harness.engine.account_snapshot(account).await.unwrap();
                    let result = run(&harness, account, op).await;
                    if let Err(err) = result {
                        let after = harness.engine.account_snapshot(account).await.unwrap();
                        assert_eq!(before, after, "{op:?} failed with {err} but changed the account");
                    }
                }
                assert_log_explains_balance(&harness.engine, account).await;
            });
        }
    }

    #[tokio::test]
    async fn test_conflicts_within_budget_are_retried() {
        let harness = Harness::<ConflictingMemory<3>>::build(EngineConfig::default());
        let account = harness
            .engine
            .register_account("retry")
            .await
            .unwrap()
            .account;
        harness.engine.resolve_spin(account, 0, 10).await.unwrap();
        assert_log_explains_balance(&harness.engine, account).await;
    }

    #[tokio::test]
    async fn test_conflicts_beyond_budget_fail_cleanly() {
        let harness = Harness::<ConflictingMemory<4>>::build(EngineConfig::default());
        let err = harness.engine.register_account("retry").await.unwrap_err();
        assert!(matches!(err, EngineError::Conflict { attempts: 4 }));
        assert!(err.is_transient());
        assert!(harness.engine.accounts().await.is_empty());

        let harness = Harness::<ConflictingMemory<1>>::build(EngineConfig {
            max_conflict_retries: 0,
            ..Default::default()
        });
        let err = harness.engine.register_account("retry").await.unwrap_err();
        assert!(matches!(err, EngineError::Conflict { attempts: 1 }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_spins_on_one_account_serialize() {
        let harness = Harness::new();
        let account = harness.engine.register_account("busy").await.unwrap().account;

        let spins = (0..20).map(|_| {
            let engine: Engine<Memory> = harness.engine.clone();
            tokio::spawn(async move { engine.resolve_spin(account, 0, 10).await })
        });
        for result in join_all(spins).await {
            result.unwrap().unwrap();
        }

        // Unscripted reels land on stop 0: every spin pays 20 for a 10 bet.
        let snapshot = harness.engine.account_snapshot(account).await.unwrap();
        assert_eq!(snapshot.stats.total_spins, 20);
        assert_eq!(snapshot.coin_balance, INITIAL_COINS + 200 + 50 + 100);
        assert_log_explains_balance(&harness.engine, account).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_accounts_progress_independently() {
        let harness = Harness::new();
        let mut accounts = Vec::new();
        for i in 0..8 {
            let name = format!("player{i}");
            accounts.push(harness.engine.register_account(&name).await.unwrap().account);
        }

        let players = accounts.iter().copied().map(|account| {
            let engine = harness.engine.clone();
            tokio::spawn(async move {
                for _ in 0..10 {
                    engine.resolve_spin(account, 0, 10).await?;
                }
                engine.claim_daily_bonus(account).await?;
                Ok::<_, EngineError>(())
            })
        });
        for result in join_all(players).await {
            result.unwrap().unwrap();
        }

        for account in accounts {
            let snapshot = harness.engine.account_snapshot(account).await.unwrap();
            assert_eq!(snapshot.stats.total_spins, 10);
            assert_eq!(snapshot.coin_balance, INITIAL_COINS + 100 + 50 + 100 + 100);
            assert_log_explains_balance(&harness.engine, account).await;
        }
    }
}
