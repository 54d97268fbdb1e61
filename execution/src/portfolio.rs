//! Lot accounting and trade fills.
//!
//! Prices are USD per unit and one coin is worth one USD. All arithmetic stays in decimal;
//! quantities are truncated to [ASSET_DECIMALS] places only when a fill is produced, and coins
//! credited from decimal proceeds are truncated to whole coins with the remainder booked as fee.

use reelvault_types::economy::{
    InvestmentLot, Wallet, ASSET_DECIMALS, BASIS_POINTS_SCALE, TRADE_FEE_BASIS_POINTS,
};
use rust_decimal::{prelude::ToPrimitive, Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub fn truncate_quantity(quantity: Decimal) -> Decimal {
    quantity.round_dp_with_strategy(ASSET_DECIMALS, RoundingStrategy::ToZero)
}

pub fn fee_rate() -> Decimal {
    Decimal::from(TRADE_FEE_BASIS_POINTS) / Decimal::from(BASIS_POINTS_SCALE)
}

/// Add `quantity` bought at `price` to a lot, recomputing the weighted-average cost.
pub fn buy_into(lot: Option<&InvestmentLot>, quantity: Decimal, price: Decimal) -> Option<InvestmentLot> {
    let (held, average) = lot
        .map(|lot| (lot.quantity, lot.average_cost))
        .unwrap_or_default();
    let total = held.checked_add(quantity)?;
    if total <= Decimal::ZERO {
        return None;
    }
    let cost = held
        .checked_mul(average)?
        .checked_add(quantity.checked_mul(price)?)?;
    Some(InvestmentLot {
        quantity: total,
        average_cost: cost.checked_div(total)?,
    })
}

/// Remove `quantity` from a lot. The average cost of the remainder is unchanged and a lot that
/// reaches zero disappears.
pub fn reduce(lot: &InvestmentLot, quantity: Decimal) -> Option<InvestmentLot> {
    let remaining = lot.quantity - quantity;
    (remaining > Decimal::ZERO).then(|| InvestmentLot {
        quantity: remaining,
        average_cost: lot.average_cost,
    })
}

/// Profit booked by selling `quantity` at `price` against the lot's average cost.
pub fn realized_pnl(lot: Option<&InvestmentLot>, quantity: Decimal, price: Decimal) -> Option<Decimal> {
    let average = lot.map(|lot| lot.average_cost).unwrap_or(price);
    quantity.checked_mul(price.checked_sub(average)?)
}

/// Asset received for coins: `quantity` is net of `fee`, both in asset units.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PurchaseFill {
    pub quantity: Decimal,
    pub fee: Decimal,
}

pub fn purchase_fill(coins: u64, price: Decimal) -> Option<PurchaseFill> {
    if price <= Decimal::ZERO {
        return None;
    }
    let gross = Decimal::from(coins).checked_div(price)?;
    let quantity = truncate_quantity(gross - gross * fee_rate());
    Some(PurchaseFill {
        quantity,
        fee: gross - quantity,
    })
}

/// Coins received for an asset: `coins` is net of `fee`, both in coin units.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SaleFill {
    pub coins: u64,
    pub fee: Decimal,
}

pub fn sale_fill(quantity: Decimal, price: Decimal) -> Option<SaleFill> {
    let gross = quantity.checked_mul(price)?;
    let coins = (gross - gross * fee_rate()).floor().to_u64()?;
    Some(SaleFill {
        coins,
        fee: gross - Decimal::from(coins),
    })
}

/// Target asset received by a conversion: `quantity` is net of `fee`, both in target units.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversionFill {
    pub quantity: Decimal,
    pub fee: Decimal,
    /// USD value of the source quantity before fees.
    pub proceeds: Decimal,
}

pub fn conversion_fill(quantity: Decimal, from_price: Decimal, to_price: Decimal) -> Option<ConversionFill> {
    if to_price <= Decimal::ZERO {
        return None;
    }
    let proceeds = quantity.checked_mul(from_price)?;
    let gross = proceeds.checked_div(to_price)?;
    let net = truncate_quantity((proceeds - proceeds * fee_rate()).checked_div(to_price)?);
    Some(ConversionFill {
        quantity: net,
        fee: gross - net,
        proceeds,
    })
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holding {
    pub asset: String,
    pub quantity: Decimal,
    pub average_cost: Decimal,
    pub cost_basis: Decimal,
    pub price: Option<Decimal>,
    pub market_value: Option<Decimal>,
    pub unrealized_pnl: Option<Decimal>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub holdings: Vec<Holding>,
    pub cost_basis: Decimal,
    /// Sum over holdings that could be quoted.
    pub market_value: Decimal,
    pub unrealized_pnl: Decimal,
    pub realized_pnl: Decimal,
}

/// Value a wallet at the given quotes. Assets missing from `prices`, or whose value at the
/// quote overflows, are listed without a market value and do not contribute to the valued
/// totals. Returns `None` if the cost basis or the totals overflow.
pub fn summarize(wallet: &Wallet, prices: &BTreeMap<String, Decimal>) -> Option<PortfolioSummary> {
    let mut summary = PortfolioSummary {
        holdings: Vec::with_capacity(wallet.balances.len()),
        cost_basis: Decimal::ZERO,
        market_value: Decimal::ZERO,
        unrealized_pnl: Decimal::ZERO,
        realized_pnl: wallet.realized_pnl,
    };
    for (asset, quantity) in &wallet.balances {
        if quantity.is_zero() {
            continue;
        }
        let average_cost = wallet
            .lot(asset)
            .map(|lot| lot.average_cost)
            .unwrap_or(Decimal::ZERO);
        let cost_basis = quantity.checked_mul(average_cost)?;
        let price = prices.get(asset).copied();
        let valued = price.and_then(|price| {
            let value = quantity.checked_mul(price)?;
            let pnl = value.checked_sub(cost_basis)?;
            let market_value = summary.market_value.checked_add(value)?;
            let unrealized_pnl = summary.unrealized_pnl.checked_add(pnl)?;
            Some((value, pnl, market_value, unrealized_pnl))
        });

        summary.cost_basis = summary.cost_basis.checked_add(cost_basis)?;
        let (market_value, unrealized_pnl) = match valued {
            Some((value, pnl, total_value, total_pnl)) => {
                summary.market_value = total_value;
                summary.unrealized_pnl = total_pnl;
                (Some(value), Some(pnl))
            }
            None => (None, None),
        };
        summary.holdings.push(Holding {
            asset: asset.clone(),
            quantity: *quantity,
            average_cost,
            cost_basis,
            price,
            market_value,
            unrealized_pnl,
        });
    }
    Some(summary)
}
