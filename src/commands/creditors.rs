// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::transactions::{self, NewTransaction};
use crate::db::{UnitOfWork, unit_of_work};
use crate::error::LedgerError;
use crate::models::{DEBT_PAYMENT_CATEGORY, TxKind};
use crate::store;
use crate::utils::{
    maybe_print_json, non_empty, normalize_currency, parse_amount, parse_date, parse_decimal,
    parse_id, pretty_table,
};
use anyhow::Result;
use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, params};
use rust_decimal::Decimal;
use tracing::info;

#[derive(Debug, Clone)]
pub struct NewCreditor {
    pub name: String,
    pub amount: Decimal,
    pub currency: String,
    pub description: Option<String>,
}

pub fn create_creditor(uow: &UnitOfWork<'_>, c: &NewCreditor) -> Result<i64> {
    let name = c.name.trim();
    if name.is_empty() {
        return Err(LedgerError::validation("creditor name is required").into());
    }
    if c.amount < Decimal::ZERO {
        return Err(LedgerError::validation("amount owed cannot be negative").into());
    }
    let currency = normalize_currency(&c.currency)?;
    uow.execute(
        "INSERT INTO creditors(name, amount, currency, description) VALUES (?1, ?2, ?3, ?4)",
        params![name, c.amount.to_string(), currency, c.description],
    )?;
    Ok(uow.last_insert_rowid())
}

pub fn delete_creditor(uow: &UnitOfWork<'_>, id: i64) -> Result<()> {
    store::get_creditor(uow, id)?;
    uow.execute("DELETE FROM creditors WHERE id=?1", params![id])?;
    Ok(())
}

/// Pays `amount` of a debt from a wallet: records a `Debt Payment` expense on
/// the wallet and lowers what is owed by the same figure. Returns the
/// transaction id.
pub fn pay_creditor(
    uow: &UnitOfWork<'_>,
    creditor_id: i64,
    wallet_id: i64,
    amount: Decimal,
    date: NaiveDate,
) -> Result<i64> {
    let c = store::get_creditor(uow, creditor_id)?;
    if amount > c.amount {
        return Err(LedgerError::refused(format!(
            "payment {} exceeds the {} {} owed to {}",
            amount, c.amount, c.currency, c.name
        ))
        .into());
    }
    let category_id = store::system_category(uow, DEBT_PAYMENT_CATEGORY)?;
    let mut t = NewTransaction::new(
        amount,
        &format!("Payment to {}", c.name),
        date,
        category_id,
        wallet_id,
        TxKind::Expense,
    );
    t.tags = Some("debt_payment".into());
    let tx_id = transactions::record(uow, &t)?;

    let outstanding = c.amount - amount;
    uow.execute(
        "UPDATE creditors SET amount=?1 WHERE id=?2",
        params![outstanding.to_string(), creditor_id],
    )?;
    info!(creditor = creditor_id, wallet = wallet_id, %amount, %outstanding, "debt payment recorded");
    Ok(tx_id)
}

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let c = NewCreditor {
                name: sub.get_one::<String>("name").unwrap().clone(),
                amount: parse_decimal(sub.get_one::<String>("amount").unwrap())?,
                currency: sub.get_one::<String>("currency").unwrap().clone(),
                description: non_empty(sub.get_one::<String>("description")),
            };
            let id = unit_of_work(conn, |uow| create_creditor(uow, &c))?;
            println!("Added creditor '{}' (id {})", c.name.trim(), id);
        }
        Some(("list", sub)) => {
            let rows = store::list_creditors(conn)?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &rows)? {
                let data = rows
                    .iter()
                    .map(|c| {
                        vec![
                            c.id.to_string(),
                            c.name.clone(),
                            format!("{:.2}", c.amount),
                            c.currency.clone(),
                            c.description.clone().unwrap_or_default(),
                        ]
                    })
                    .collect();
                println!(
                    "{}",
                    pretty_table(&["ID", "Creditor", "Owed", "CCY", "Description"], data)
                );
            }
        }
        Some(("pay", sub)) => {
            let creditor_id = parse_id(sub.get_one::<String>("id").unwrap())?;
            let wallet_id = parse_id(sub.get_one::<String>("wallet").unwrap())?;
            let amount = parse_amount(sub.get_one::<String>("amount").unwrap())?;
            let date = match sub.get_one::<String>("date") {
                Some(s) => parse_date(s)?,
                None => Utc::now().date_naive(),
            };
            let tx_id =
                unit_of_work(conn, |uow| pay_creditor(uow, creditor_id, wallet_id, amount, date))?;
            println!("Paid {} to creditor {} (transaction {})", amount, creditor_id, tx_id);
        }
        Some(("rm", sub)) => {
            let id = parse_id(sub.get_one::<String>("id").unwrap())?;
            unit_of_work(conn, |uow| delete_creditor(uow, id))?;
            println!("Removed creditor {}", id);
        }
        _ => {}
    }
    Ok(())
}
