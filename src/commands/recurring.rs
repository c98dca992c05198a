// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::db::{UnitOfWork, unit_of_work};
use crate::error::LedgerError;
use crate::models::{Frequency, TxKind};
use crate::store;
use crate::utils::{
    ensure_positive, maybe_print_json, non_empty, parse_amount, parse_date, parse_id, pretty_table,
};
use anyhow::Result;
use chrono::{Duration, NaiveDate};
use rusqlite::{Connection, params};
use rust_decimal::Decimal;
use tracing::info;

pub fn next_due(start: NaiveDate, frequency: Frequency) -> NaiveDate {
    start + Duration::days(frequency.days())
}

#[derive(Debug, Clone)]
pub struct NewRecurring {
    pub amount: Decimal,
    pub description: String,
    pub category_id: i64,
    pub wallet_id: i64,
    pub kind: TxKind,
    pub frequency: Frequency,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

pub fn create_recurring(uow: &UnitOfWork<'_>, r: &NewRecurring) -> Result<i64> {
    ensure_positive(r.amount, "amount")?;
    if r.description.trim().is_empty() {
        return Err(LedgerError::validation("description is required").into());
    }
    if let Some(end) = r.end_date {
        if end < r.start_date {
            return Err(LedgerError::validation("end date is before start date").into());
        }
    }
    store::get_category(uow, r.category_id)?;
    store::get_wallet(uow, r.wallet_id)?;
    let due = next_due(r.start_date, r.frequency);
    uow.execute(
        "INSERT INTO recurring_transactions(amount, description, category_id, wallet_id, kind,
             frequency, start_date, end_date, next_due, is_active, notes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 1, ?10)",
        params![
            r.amount.to_string(),
            r.description.trim(),
            r.category_id,
            r.wallet_id,
            r.kind.as_str(),
            r.frequency.as_str(),
            r.start_date,
            r.end_date,
            due,
            r.notes
        ],
    )?;
    let id = uow.last_insert_rowid();
    info!(id, frequency = r.frequency.as_str(), %due, "recurring transaction created");
    Ok(id)
}

pub fn set_active(uow: &UnitOfWork<'_>, id: i64, active: bool) -> Result<()> {
    store::get_recurring(uow, id)?;
    uow.execute(
        "UPDATE recurring_transactions SET is_active=?1 WHERE id=?2",
        params![active, id],
    )?;
    Ok(())
}

pub fn delete_recurring(uow: &UnitOfWork<'_>, id: i64) -> Result<()> {
    store::get_recurring(uow, id)?;
    uow.execute("DELETE FROM recurring_transactions WHERE id=?1", params![id])?;
    Ok(())
}

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let r = NewRecurring {
                amount: parse_amount(sub.get_one::<String>("amount").unwrap())?,
                description: sub.get_one::<String>("description").unwrap().clone(),
                category_id: parse_id(sub.get_one::<String>("category").unwrap())?,
                wallet_id: parse_id(sub.get_one::<String>("wallet").unwrap())?,
                kind: match sub.get_one::<String>("type") {
                    Some(s) => s.parse()?,
                    None => TxKind::Expense,
                },
                frequency: sub.get_one::<String>("frequency").unwrap().parse()?,
                start_date: parse_date(sub.get_one::<String>("start").unwrap())?,
                end_date: sub.get_one::<String>("end").map(|s| parse_date(s)).transpose()?,
                notes: non_empty(sub.get_one::<String>("notes")),
            };
            let id = unit_of_work(conn, |uow| create_recurring(uow, &r))?;
            println!(
                "Recurring {} '{}' created (id {}), next due {}",
                r.frequency.as_str(),
                r.description.trim(),
                id,
                next_due(r.start_date, r.frequency)
            );
        }
        Some(("list", sub)) => {
            let items = store::list_recurring(conn, !sub.get_flag("all"))?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &items)? {
                let data = items
                    .iter()
                    .map(|r| {
                        vec![
                            r.id.to_string(),
                            r.description.clone(),
                            format!("{:.2}", r.amount),
                            r.kind.to_string(),
                            r.frequency.as_str().to_string(),
                            r.next_due.map(|d| d.to_string()).unwrap_or_default(),
                            if r.is_active { "active" } else { "paused" }.to_string(),
                        ]
                    })
                    .collect();
                println!(
                    "{}",
                    pretty_table(
                        &["ID", "Description", "Amount", "Type", "Every", "Next due", "Status"],
                        data
                    )
                );
            }
        }
        Some(("pause", sub)) => {
            let id = parse_id(sub.get_one::<String>("id").unwrap())?;
            unit_of_work(conn, |uow| set_active(uow, id, false))?;
            println!("Paused recurring transaction {}", id);
        }
        Some(("resume", sub)) => {
            let id = parse_id(sub.get_one::<String>("id").unwrap())?;
            unit_of_work(conn, |uow| set_active(uow, id, true))?;
            println!("Resumed recurring transaction {}", id);
        }
        Some(("rm", sub)) => {
            let id = parse_id(sub.get_one::<String>("id").unwrap())?;
            unit_of_work(conn, |uow| delete_recurring(uow, id))?;
            println!("Deleted recurring transaction {}", id);
        }
        _ => {}
    }
    Ok(())
}
