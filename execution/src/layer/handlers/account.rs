use super::super::*;
use super::{build_machine, debit_coins};
use reelvault_types::economy::MAX_NAME_LENGTH;
use tracing::info;

impl<'a, S: State> Layer<'a, S> {
    pub(in crate::layer) async fn handle_register(
        &mut self,
        id: AccountId,
        name: &str,
    ) -> Result<Receipt, EngineError> {
        let name = name.trim();
        if name.is_empty() || name.len() > MAX_NAME_LENGTH {
            return Err(EngineError::InvalidInput(format!(
                "name must be 1-{MAX_NAME_LENGTH} bytes"
            )));
        }
        if state::load_account(self, id).await?.is_some() {
            return Err(EngineError::InvalidInput(format!(
                "account {id} already registered"
            )));
        }

        let catalog = self.catalog;
        let starter = catalog
            .machine_type(&self.config.starter_machine)
            .ok_or_else(|| {
                EngineError::NotFound(format!("machine type {}", self.config.starter_machine))
            })?;

        let mut account = Account::with_coins(
            id,
            name.to_string(),
            self.now,
            self.config.initial_coins,
        );
        let machine = build_machine(&mut account, starter, self.now);
        let starter_machine = machine.id;

        info!(account = %id, name, coins = account.coin_balance, "account registered");
        self.stage_machine(machine);
        self.stage_wallet(Wallet::new(id));
        self.stage_account(account);

        Ok(Receipt::Registered(Registration {
            account: id,
            starter_machine,
        }))
    }

    pub(in crate::layer) async fn handle_acquire_machine(
        &mut self,
        id: AccountId,
        machine_type: &str,
    ) -> Result<Receipt, EngineError> {
        let catalog = self.catalog;
        let machine_type = catalog
            .machine_type(machine_type)
            .ok_or_else(|| EngineError::NotFound(format!("machine type {machine_type}")))?;

        let mut account = self.account(id).await?;
        debit_coins(&mut account, machine_type.price)?;
        let machine = build_machine(&mut account, machine_type, self.now);
        let machine_id = machine.id;

        let transaction = self.record(
            &mut account,
            Posting::new(
                TransactionKind::MachinePurchase {
                    machine: machine_id,
                    machine_type: machine_type.id.clone(),
                },
                Decimal::from(machine_type.price),
                Currency::Coins,
            ),
        );
        self.stage_machine(machine);
        self.stage_account(account);

        Ok(Receipt::MachineAcquired(MachineReceipt {
            machine: machine_id,
            transaction,
        }))
    }

    pub(in crate::layer) async fn handle_apply_upgrade(
        &mut self,
        id: AccountId,
        machine_id: MachineId,
        upgrade_id: &str,
    ) -> Result<Receipt, EngineError> {
        let catalog = self.catalog;
        let upgrade = catalog
            .upgrade(upgrade_id)
            .ok_or_else(|| EngineError::NotFound(format!("upgrade {upgrade_id}")))?;

        let mut account = self.account(id).await?;
        let mut machine = self.machine(id, machine_id).await?;
        if machine.upgrades.contains(&upgrade.id) {
            return Err(EngineError::InvalidInput(format!(
                "upgrade {} already applied to machine {machine_id}",
                upgrade.id
            )));
        }
        debit_coins(&mut account, upgrade.cost)?;
        machine
            .apply_upgrade(&upgrade.id, &upgrade.deltas)
            .map_err(|err| EngineError::InvalidInput(err.to_string()))?;

        let transaction = self.record(
            &mut account,
            Posting::new(
                TransactionKind::MachineUpgrade {
                    machine: machine_id,
                    upgrade: upgrade.id.clone(),
                },
                Decimal::from(upgrade.cost),
                Currency::Coins,
            ),
        );
        debug!(account = %id, machine = machine_id, upgrade = %upgrade.id, "upgrade applied");
        self.stage_machine(machine);
        self.stage_account(account);

        Ok(Receipt::MachineUpgraded(transaction))
    }
}
