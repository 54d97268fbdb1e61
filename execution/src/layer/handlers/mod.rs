use super::*;
use reelvault_types::catalog::{normalize_asset, MachineType};

use crate::portfolio;

mod account;
mod crypto;
mod rewards;
mod spin;

fn overflow(what: &str) -> EngineError {
    EngineError::InvalidInput(format!("{what} overflows"))
}

fn debit_coins(account: &mut Account, amount: u64) -> Result<(), EngineError> {
    account.coin_balance = account
        .coin_balance
        .checked_sub(amount)
        .ok_or_else(|| EngineError::insufficient_coins(amount, account.coin_balance))?;
    Ok(())
}

fn credit_coins(account: &mut Account, amount: u64) -> Result<(), EngineError> {
    account.coin_balance = account
        .coin_balance
        .checked_add(amount)
        .ok_or_else(|| overflow("coin balance"))?;
    Ok(())
}

/// Normalized symbol of an asset listed in the catalog.
fn supported_asset(catalog: &Catalog, asset: &str) -> Result<String, EngineError> {
    let symbol = normalize_asset(asset)
        .ok_or_else(|| EngineError::InvalidInput(format!("malformed asset symbol {asset:?}")))?;
    if catalog.asset(&symbol).is_none() {
        return Err(EngineError::UnsupportedAsset(symbol));
    }
    Ok(symbol)
}

fn quoted(asset: &str, price: Decimal) -> Result<Decimal, EngineError> {
    if price <= Decimal::ZERO {
        return Err(EngineError::PriceUnavailable(asset.to_string()));
    }
    Ok(price)
}

/// Quantity truncated to persisted precision; must stay positive.
fn tradable(quantity: Decimal) -> Result<Decimal, EngineError> {
    let quantity = portfolio::truncate_quantity(quantity);
    if quantity <= Decimal::ZERO {
        return Err(EngineError::InvalidInput(format!(
            "quantity must be positive (got {quantity})"
        )));
    }
    Ok(quantity)
}

fn ensure_holding(wallet: &Wallet, asset: &str, quantity: Decimal) -> Result<(), EngineError> {
    let available = wallet.balance(asset);
    if quantity > available {
        return Err(EngineError::insufficient_asset(asset, quantity, available));
    }
    Ok(())
}

/// Credit `quantity` at `price`, folding it into the asset's lot.
fn add_to_wallet(
    wallet: &mut Wallet,
    asset: &str,
    quantity: Decimal,
    price: Decimal,
) -> Result<(), EngineError> {
    let lot = portfolio::buy_into(wallet.lot(asset), quantity, price)
        .ok_or_else(|| overflow("lot cost basis"))?;
    let balance = wallet
        .balance(asset)
        .checked_add(quantity)
        .ok_or_else(|| overflow("asset balance"))?;
    wallet.lots.insert(asset.to_string(), lot);
    wallet.balances.insert(asset.to_string(), balance);
    Ok(())
}

/// Debit `quantity`; the lot keeps its average cost and disappears once empty.
fn remove_from_wallet(wallet: &mut Wallet, asset: &str, quantity: Decimal) {
    let remaining = wallet.balance(asset) - quantity;
    if remaining > Decimal::ZERO {
        wallet.balances.insert(asset.to_string(), remaining);
    } else {
        wallet.balances.remove(asset);
    }
    match wallet.lot(asset).and_then(|lot| portfolio::reduce(lot, quantity)) {
        Some(lot) => {
            wallet.lots.insert(asset.to_string(), lot);
        }
        None => {
            wallet.lots.remove(asset);
        }
    }
}

fn build_machine(account: &mut Account, machine_type: &MachineType, at: DateTime<Utc>) -> Machine {
    Machine {
        id: account.allocate_machine_id(),
        owner: account.id,
        machine_type: machine_type.id.clone(),
        name: machine_type.name.clone(),
        attributes: machine_type.attributes.clone(),
        stats: Default::default(),
        upgrades: Default::default(),
        active_session: None,
        acquired_at: at,
    }
}
