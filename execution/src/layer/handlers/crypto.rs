use super::super::*;
use super::{
    add_to_wallet, credit_coins, debit_coins, ensure_holding, overflow, quoted, remove_from_wallet,
    supported_asset, tradable,
};
use crate::portfolio;

impl<'a, S: State> Layer<'a, S> {
    pub(in crate::layer) async fn handle_purchase(
        &mut self,
        id: AccountId,
        asset: &str,
        coins: u64,
        price: Decimal,
    ) -> Result<Receipt, EngineError> {
        let asset = supported_asset(self.catalog, asset)?;
        let price = quoted(&asset, price)?;
        if coins == 0 {
            return Err(EngineError::InvalidInput(
                "purchase amount must be positive".to_string(),
            ));
        }

        let mut account = self.account(id).await?;
        let mut wallet = self.wallet(id).await?;
        debit_coins(&mut account, coins)?;
        let fill = portfolio::purchase_fill(coins, price).ok_or_else(|| overflow("purchase"))?;
        if fill.quantity.is_zero() {
            return Err(EngineError::InvalidInput(format!(
                "{coins} coins buys less than the smallest {asset} unit"
            )));
        }
        add_to_wallet(&mut wallet, &asset, fill.quantity, price)?;

        let transaction = self.record(
            &mut account,
            Posting::new(
                TransactionKind::CryptoPurchase {
                    asset: asset.clone(),
                    price,
                },
                Decimal::from(coins),
                Currency::Coins,
            )
            .counter(fill.quantity, Currency::Asset(asset.clone()))
            .fee(fill.fee),
        );
        debug!(account = %id, %asset, coins, quantity = %fill.quantity, %price, "crypto purchased");
        self.stage_wallet(wallet);
        self.stage_account(account);

        Ok(Receipt::Traded(transaction))
    }

    pub(in crate::layer) async fn handle_sell(
        &mut self,
        id: AccountId,
        asset: &str,
        quantity: Decimal,
        price: Decimal,
    ) -> Result<Receipt, EngineError> {
        let asset = supported_asset(self.catalog, asset)?;
        let price = quoted(&asset, price)?;
        let quantity = tradable(quantity)?;

        let mut account = self.account(id).await?;
        let mut wallet = self.wallet(id).await?;
        ensure_holding(&wallet, &asset, quantity)?;
        let realized_pnl = portfolio::realized_pnl(wallet.lot(&asset), quantity, price)
            .ok_or_else(|| overflow("realized profit"))?;
        let fill = portfolio::sale_fill(quantity, price).ok_or_else(|| overflow("sale"))?;
        if fill.coins == 0 {
            return Err(EngineError::InvalidInput(format!(
                "{quantity} {asset} is worth less than one coin after fees"
            )));
        }

        remove_from_wallet(&mut wallet, &asset, quantity);
        wallet.realized_pnl = wallet
            .realized_pnl
            .checked_add(realized_pnl)
            .ok_or_else(|| overflow("realized profit"))?;
        credit_coins(&mut account, fill.coins)?;

        let transaction = self.record(
            &mut account,
            Posting::new(
                TransactionKind::CryptoSale {
                    asset: asset.clone(),
                    price,
                    realized_pnl,
                },
                quantity,
                Currency::Asset(asset.clone()),
            )
            .counter(Decimal::from(fill.coins), Currency::Coins)
            .fee(fill.fee),
        );
        debug!(account = %id, %asset, %quantity, coins = fill.coins, %realized_pnl, "crypto sold");
        self.stage_wallet(wallet);
        self.stage_account(account);

        Ok(Receipt::Traded(transaction))
    }

    pub(in crate::layer) async fn handle_convert(
        &mut self,
        id: AccountId,
        from: &str,
        to: &str,
        quantity: Decimal,
        from_price: Decimal,
        to_price: Decimal,
    ) -> Result<Receipt, EngineError> {
        let from = supported_asset(self.catalog, from)?;
        let to = supported_asset(self.catalog, to)?;
        if from == to {
            return Err(EngineError::InvalidInput(format!(
                "cannot convert {from} into itself"
            )));
        }
        let from_price = quoted(&from, from_price)?;
        let to_price = quoted(&to, to_price)?;
        let quantity = tradable(quantity)?;

        let mut account = self.account(id).await?;
        let mut wallet = self.wallet(id).await?;
        ensure_holding(&wallet, &from, quantity)?;
        let realized_pnl = portfolio::realized_pnl(wallet.lot(&from), quantity, from_price)
            .ok_or_else(|| overflow("realized profit"))?;
        let fill = portfolio::conversion_fill(quantity, from_price, to_price)
            .ok_or_else(|| overflow("conversion"))?;
        if fill.quantity.is_zero() {
            return Err(EngineError::InvalidInput(format!(
                "{quantity} {from} converts to less than the smallest {to} unit"
            )));
        }

        remove_from_wallet(&mut wallet, &from, quantity);
        add_to_wallet(&mut wallet, &to, fill.quantity, to_price)?;
        wallet.realized_pnl = wallet
            .realized_pnl
            .checked_add(realized_pnl)
            .ok_or_else(|| overflow("realized profit"))?;

        let transaction = self.record(
            &mut account,
            Posting::new(
                TransactionKind::CryptoConversion {
                    from: from.clone(),
                    to: to.clone(),
                    from_price,
                    to_price,
                    realized_pnl,
                },
                quantity,
                Currency::Asset(from.clone()),
            )
            .counter(fill.quantity, Currency::Asset(to.clone()))
            .fee(fill.fee),
        );
        debug!(
            account = %id,
            %from,
            %to,
            %quantity,
            received = %fill.quantity,
            proceeds = %fill.proceeds,
            "crypto converted"
        );
        self.stage_wallet(wallet);
        self.stage_account(account);

        Ok(Receipt::Traded(transaction))
    }

    pub(in crate::layer) async fn handle_deposit(
        &mut self,
        id: AccountId,
        asset: &str,
        quantity: Decimal,
        price: Decimal,
    ) -> Result<Receipt, EngineError> {
        let asset = supported_asset(self.catalog, asset)?;
        let price = quoted(&asset, price)?;
        let quantity = tradable(quantity)?;

        let mut account = self.account(id).await?;
        let mut wallet = self.wallet(id).await?;
        add_to_wallet(&mut wallet, &asset, quantity, price)?;

        let transaction = self.record(
            &mut account,
            Posting::new(
                TransactionKind::CryptoDeposit {
                    asset: asset.clone(),
                    price,
                },
                quantity,
                Currency::Asset(asset.clone()),
            ),
        );
        debug!(account = %id, %asset, %quantity, %price, "crypto deposited");
        self.stage_wallet(wallet);
        self.stage_account(account);

        Ok(Receipt::Traded(transaction))
    }

    pub(in crate::layer) async fn handle_withdraw(
        &mut self,
        id: AccountId,
        asset: &str,
        quantity: Decimal,
    ) -> Result<Receipt, EngineError> {
        let asset = supported_asset(self.catalog, asset)?;
        let quantity = tradable(quantity)?;

        let mut account = self.account(id).await?;
        let mut wallet = self.wallet(id).await?;
        ensure_holding(&wallet, &asset, quantity)?;
        remove_from_wallet(&mut wallet, &asset, quantity);

        let transaction = self.record(
            &mut account,
            Posting::new(
                TransactionKind::CryptoWithdrawal {
                    asset: asset.clone(),
                },
                quantity,
                Currency::Asset(asset.clone()),
            ),
        );
        debug!(account = %id, %asset, %quantity, "crypto withdrawn");
        self.stage_wallet(wallet);
        self.stage_account(account);

        Ok(Receipt::Traded(transaction))
    }
}
