use super::super::*;
use super::credit_coins;
use crate::{achievements, bonus};
use reelvault_types::economy::DailyBonusState;
use tracing::info;

impl<'a, S: State> Layer<'a, S> {
    pub(in crate::layer) async fn handle_daily_bonus(
        &mut self,
        id: AccountId,
    ) -> Result<Receipt, EngineError> {
        let mut account = self.account(id).await?;
        let today = self.now.date_naive();
        let claim = bonus::claim(&account.daily_bonus, today, self.config.daily_bonus_base)
            .map_err(|next_available| EngineError::AlreadyClaimed { next_available })?;

        credit_coins(&mut account, claim.amount)?;
        account.daily_bonus = DailyBonusState {
            last_claimed_day: Some(today),
            streak: claim.streak,
        };
        let transaction = self.record(
            &mut account,
            Posting::new(
                TransactionKind::DailyBonus {
                    streak: claim.streak,
                },
                Decimal::from(claim.amount),
                Currency::Coins,
            ),
        );
        debug!(account = %id, amount = claim.amount, streak = claim.streak, "daily bonus claimed");
        self.stage_account(account);

        Ok(Receipt::BonusClaimed(BonusReceipt {
            amount: claim.amount,
            streak: claim.streak,
            next_available: claim.next_available,
            transaction,
            achievements: Vec::new(),
        }))
    }

    /// Grant one achievement if it is satisfied and not yet granted. Re-running it is a no-op.
    pub(in crate::layer) async fn handle_grant_achievement(
        &mut self,
        id: AccountId,
        achievement_id: &str,
    ) -> Result<Receipt, EngineError> {
        let catalog = self.catalog;
        let achievement = catalog
            .achievement(achievement_id)
            .ok_or_else(|| EngineError::NotFound(format!("achievement {achievement_id}")))?;

        let mut account = self.account(id).await?;
        if account.achievement_progress.contains(&achievement.id)
            || !achievements::is_satisfied(&account, achievement)
        {
            return Ok(Receipt::Unchanged);
        }

        let reward = &achievement.reward;
        account
            .achievement_progress
            .insert(achievement.id.clone());
        credit_coins(&mut account, reward.coins)?;
        account.token_balance += reward.tokens;

        let kind = TransactionKind::AchievementReward {
            achievement: achievement.id.clone(),
        };
        let posting = if reward.coins == 0 && !reward.tokens.is_zero() {
            Posting::new(kind, reward.tokens, Currency::Tokens)
        } else if reward.tokens.is_zero() {
            Posting::new(kind, Decimal::from(reward.coins), Currency::Coins)
        } else {
            Posting::new(kind, Decimal::from(reward.coins), Currency::Coins)
                .counter(reward.tokens, Currency::Tokens)
        };
        let transaction = self.record(&mut account, posting);
        info!(account = %id, achievement = %achievement.id, "achievement granted");
        self.stage_account(account);

        Ok(Receipt::AchievementGranted(AchievementGrant {
            achievement: achievement.id.clone(),
            name: achievement.name.clone(),
            reward: reward.clone(),
            transaction,
        }))
    }
}
