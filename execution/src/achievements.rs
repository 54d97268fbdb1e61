use reelvault_types::{
    catalog::{Achievement, Catalog},
    economy::Account,
};

pub fn is_satisfied(account: &Account, achievement: &Achievement) -> bool {
    account.stat(achievement.rule.stat) >= achievement.rule.threshold
}

/// Achievements the account satisfies but has not been granted yet, in catalog order.
pub fn pending<'a>(account: &Account, catalog: &'a Catalog) -> Vec<&'a Achievement> {
    catalog
        .achievements()
        .iter()
        .filter(|achievement| !account.achievement_progress.contains(&achievement.id))
        .filter(|achievement| is_satisfied(account, achievement))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn account() -> Account {
        let at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        Account::new(Uuid::nil(), "Alice".to_string(), at)
    }

    fn ids(pending: Vec<&Achievement>) -> Vec<&str> {
        pending.into_iter().map(|a| a.id.as_str()).collect()
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let catalog = Catalog::standard();
        let mut account = account();
        assert!(pending(&account, &catalog).is_empty());

        account.stats.record_spin(100, true, 1_000, false);
        assert_eq!(
            ids(pending(&account, &catalog)),
            vec!["first_spin", "first_win", "big_winner"]
        );
    }

    #[test]
    fn test_granted_achievements_are_skipped() {
        let catalog = Catalog::standard();
        let mut account = account();
        account.stats.record_spin(10, false, 0, false);
        account.achievement_progress.insert("first_spin".to_string());
        assert!(pending(&account, &catalog).is_empty());
    }

    #[test]
    fn test_streak_rule() {
        let catalog = Catalog::standard();
        let mut account = account();
        account.daily_bonus.streak = 7;
        assert_eq!(ids(pending(&account, &catalog)), vec!["dedicated"]);
    }
}
