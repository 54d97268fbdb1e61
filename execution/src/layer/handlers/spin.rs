use super::super::*;
use super::{credit_coins, debit_coins};
use crate::{
    session::stop_reason,
    spin::{self, SpinOutcome},
};
use reelvault_types::economy::{AutoSpin, SpinRecord};
use tracing::info;

impl<'a, S: State> Layer<'a, S> {
    /// Resolve one spin and fold it into the account, machine and session copies.
    fn play(
        &mut self,
        account: &mut Account,
        machine: &mut Machine,
        session: &mut GameSession,
        bet: u64,
    ) -> Result<(SpinOutcome, Transaction), EngineError> {
        let attributes = &machine.attributes;
        if !attributes.accepts_bet(bet) {
            return Err(EngineError::InvalidBet {
                bet,
                min: attributes.min_bet,
                max: attributes.max_bet,
            });
        }
        if account.coin_balance < bet {
            return Err(EngineError::insufficient_coins(bet, account.coin_balance));
        }
        let catalog = self.catalog;
        let symbols = catalog
            .symbol_set(&attributes.symbol_set)
            .filter(|set| !set.symbols.is_empty())
            .ok_or_else(|| EngineError::NotFound(format!("symbol set {}", attributes.symbol_set)))?;
        let outcome = spin::resolve(attributes, &symbols.symbols, bet, self.reels);

        debit_coins(account, bet)?;
        credit_coins(account, outcome.win_amount)?;
        account.token_balance += outcome.crypto_earned;
        account
            .stats
            .record_spin(bet, outcome.is_win, outcome.win_amount, outcome.is_jackpot);
        machine
            .stats
            .record_spin(bet, outcome.is_win, outcome.win_amount, outcome.is_jackpot);

        let posting = if outcome.is_win {
            Posting::new(
                TransactionKind::GameWin {
                    machine: machine.id,
                    bet,
                    is_jackpot: outcome.is_jackpot,
                    crypto_earned: outcome.crypto_earned,
                },
                Decimal::from(outcome.win_amount),
                Currency::Coins,
            )
        } else {
            Posting::new(
                TransactionKind::GameLoss {
                    machine: machine.id,
                    bet,
                },
                Decimal::from(bet),
                Currency::Coins,
            )
        };
        let transaction = self.record(account, posting);
        session.spins.push(SpinRecord {
            transaction_seq: transaction.seq,
            bet,
            symbols: outcome.symbols.clone(),
            win_amount: outcome.win_amount,
            is_jackpot: outcome.is_jackpot,
            crypto_earned: outcome.crypto_earned,
            at: self.now,
        });

        debug!(
            account = %account.id,
            machine = machine.id,
            bet,
            win = outcome.win_amount,
            jackpot = outcome.is_jackpot,
            "spin resolved"
        );
        Ok((outcome, transaction))
    }

    /// One auto-spin cycle: spin at the session's bet, count it down and apply the stop policy.
    fn auto_step(
        &mut self,
        account: &mut Account,
        machine: &mut Machine,
        session: &mut GameSession,
    ) -> Result<(SpinOutcome, Transaction), EngineError> {
        let bet = session
            .auto_spin
            .as_ref()
            .map(|auto| auto.bet)
            .ok_or(EngineError::NoActiveSession)?;
        let (outcome, transaction) = self.play(account, machine, session, bet)?;

        let reason = session.auto_spin.as_mut().and_then(|auto| {
            auto.remaining = auto.remaining.saturating_sub(1);
            stop_reason(auto, &outcome)
        });
        if let Some(reason) = reason {
            session.stop(reason, self.now);
            account.auto_spin = None;
            info!(
                account = %account.id,
                session = session.id,
                ?reason,
                spins = session.spins.len(),
                "auto-spin finished"
            );
        }
        Ok((outcome, transaction))
    }

    /// The machine's open session, or a fresh one if it has none (or only a stopped one).
    ///
    /// An open session that is not auto-spinning and already holds `max_session_spins` records
    /// is closed here, so a long run of manual play spreads over bounded sessions.
    async fn current_session(
        &mut self,
        account: &mut Account,
        machine: &mut Machine,
    ) -> Result<GameSession, EngineError> {
        if let Some(id) = machine.active_session {
            if let Some(mut session) = state::load_session(&*self, account.id, id).await? {
                let full = session.spins.len() >= self.config.max_session_spins;
                if !session.is_terminal() && (!full || session.is_auto_spinning()) {
                    return Ok(session);
                }
                if session.stop(StopReason::SpinLimit, self.now) {
                    debug!(
                        account = %account.id,
                        session = session.id,
                        spins = session.spins.len(),
                        "session closed at spin limit"
                    );
                    self.stage_session(account.id, session);
                }
            }
        }
        let session = GameSession::new(account.allocate_session_id(), machine.id, self.now);
        machine.active_session = Some(session.id);
        Ok(session)
    }

    pub(in crate::layer) async fn handle_spin(
        &mut self,
        id: AccountId,
        machine_id: MachineId,
        bet: u64,
    ) -> Result<Receipt, EngineError> {
        let mut account = self.account(id).await?;
        let mut machine = self.machine(id, machine_id).await?;
        let mut session = self.current_session(&mut account, &mut machine).await?;
        if session.is_auto_spinning() {
            return Err(EngineError::InvalidInput(format!(
                "machine {machine_id} is running auto-spin"
            )));
        }
        session.activate();

        let (outcome, transaction) = self.play(&mut account, &mut machine, &mut session, bet)?;
        let state = session.state();
        self.stage_session(id, session);
        self.stage_machine(machine);
        self.stage_account(account);

        Ok(Receipt::Spun(SpinReceipt {
            outcome,
            session: state,
            transaction,
            achievements: Vec::new(),
        }))
    }

    pub(in crate::layer) async fn handle_start_auto_spin(
        &mut self,
        id: AccountId,
        machine_id: MachineId,
        bet: u64,
        count: u32,
        policy: &StopPolicy,
    ) -> Result<Receipt, EngineError> {
        if count == 0 || count > self.config.max_auto_spins {
            return Err(EngineError::InvalidInput(format!(
                "spin count must be 1-{}",
                self.config.max_auto_spins
            )));
        }
        if policy.stop_on_big_win && policy.big_win_threshold == 0 {
            return Err(EngineError::InvalidInput(
                "big win threshold must be positive".to_string(),
            ));
        }

        let mut account = self.account(id).await?;
        if let Some(running) = account.auto_spin {
            return Err(EngineError::InvalidInput(format!(
                "auto-spin already running in session {running}"
            )));
        }
        let mut machine = self.machine(id, machine_id).await?;
        let mut session = self.current_session(&mut account, &mut machine).await?;
        session.activate();
        session.auto_spin = Some(AutoSpin {
            requested: count,
            remaining: count,
            bet,
            policy: policy.clone(),
        });
        account.auto_spin = Some(session.id);
        info!(account = %id, machine = machine_id, session = session.id, bet, count, "auto-spin started");

        let (outcome, transaction) = self.auto_step(&mut account, &mut machine, &mut session)?;
        let state = session.state();
        self.stage_session(id, session);
        self.stage_machine(machine);
        self.stage_account(account);

        Ok(Receipt::AutoSpinStarted(SpinReceipt {
            outcome,
            session: state,
            transaction,
            achievements: Vec::new(),
        }))
    }

    pub(in crate::layer) async fn handle_auto_spin_step(
        &mut self,
        id: AccountId,
        session_id: SessionId,
    ) -> Result<Receipt, EngineError> {
        let mut account = self.account(id).await?;
        let mut session = self.session(id, session_id).await?;
        if !session.is_auto_spinning() || account.auto_spin != Some(session_id) {
            return Ok(Receipt::AutoSpinStep(StepReceipt {
                outcome: None,
                session: session.state(),
                achievements: Vec::new(),
            }));
        }
        let mut machine = self.machine(id, session.machine).await?;

        let (outcome, _) = self.auto_step(&mut account, &mut machine, &mut session)?;
        let state = session.state();
        self.stage_session(id, session);
        self.stage_machine(machine);
        self.stage_account(account);

        Ok(Receipt::AutoSpinStep(StepReceipt {
            outcome: Some(outcome),
            session: state,
            achievements: Vec::new(),
        }))
    }

    pub(in crate::layer) async fn handle_stop_auto_spin(
        &mut self,
        id: AccountId,
        reason: StopReason,
    ) -> Result<Receipt, EngineError> {
        let mut account = self.account(id).await?;
        let session_id = account.auto_spin.take().ok_or(EngineError::NoActiveSession)?;
        let mut session = self.session(id, session_id).await?;
        session.stop(reason, self.now);

        info!(
            account = %id,
            session = session_id,
            ?reason,
            spins = session.spins.len(),
            "auto-spin stopped"
        );
        let state = session.state();
        self.stage_session(id, session);
        self.stage_account(account);

        Ok(Receipt::AutoSpinStopped(state))
    }
}
