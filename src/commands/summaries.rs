// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Historical totals entered by hand for periods that predate the ledger.

use crate::db::{UnitOfWork, unit_of_work};
use crate::error::LedgerError;
use crate::store;
use crate::utils::{maybe_print_json, non_empty, parse_decimal, parse_id, pretty_table};
use anyhow::Result;
use chrono::{Datelike, Utc};
use rusqlite::{Connection, params};
use rust_decimal::Decimal;

#[derive(Debug, Clone)]
pub struct NewSummary {
    pub year: i32,
    pub month: Option<u32>,
    pub total_income: Decimal,
    pub total_expense: Decimal,
    pub notes: Option<String>,
}

/// Earliest year a summary may describe.
pub const MIN_SUMMARY_YEAR: i32 = 1900;

pub fn create_summary(uow: &UnitOfWork<'_>, s: &NewSummary) -> Result<i64> {
    let this_year = Utc::now().year();
    if !(MIN_SUMMARY_YEAR..=this_year).contains(&s.year) {
        return Err(LedgerError::validation(format!(
            "year {} is outside {}-{}",
            s.year, MIN_SUMMARY_YEAR, this_year
        ))
        .into());
    }
    if let Some(m) = s.month {
        if !(1..=12).contains(&m) {
            return Err(LedgerError::validation(format!("month {} is outside 1-12", m)).into());
        }
    }
    if s.total_income < Decimal::ZERO || s.total_expense < Decimal::ZERO {
        return Err(LedgerError::validation("summary totals cannot be negative").into());
    }
    uow.execute(
        "INSERT INTO financial_summaries(year, month, total_income, total_expense, notes)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            s.year,
            s.month,
            s.total_income.to_string(),
            s.total_expense.to_string(),
            s.notes
        ],
    )?;
    Ok(uow.last_insert_rowid())
}

pub fn delete_summary(uow: &UnitOfWork<'_>, id: i64) -> Result<()> {
    let n = uow.execute("DELETE FROM financial_summaries WHERE id=?1", params![id])?;
    if n == 0 {
        return Err(LedgerError::not_found("summary", id).into());
    }
    Ok(())
}

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let s = NewSummary {
                year: *sub.get_one::<i32>("year").unwrap(),
                month: sub.get_one::<u32>("month").copied(),
                total_income: match sub.get_one::<String>("income") {
                    Some(v) => parse_decimal(v)?,
                    None => Decimal::ZERO,
                },
                total_expense: match sub.get_one::<String>("expense") {
                    Some(v) => parse_decimal(v)?,
                    None => Decimal::ZERO,
                },
                notes: non_empty(sub.get_one::<String>("notes")),
            };
            let id = unit_of_work(conn, |uow| create_summary(uow, &s))?;
            println!("Added summary {} for {}", id, period_label(s.year, s.month));
        }
        Some(("list", sub)) => {
            let rows = store::list_summaries(conn)?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &rows)? {
                let data = rows
                    .iter()
                    .map(|s| {
                        vec![
                            s.id.to_string(),
                            period_label(s.year, s.month),
                            format!("{:.2}", s.total_income),
                            format!("{:.2}", s.total_expense),
                            s.notes.clone().unwrap_or_default(),
                        ]
                    })
                    .collect();
                println!(
                    "{}",
                    pretty_table(&["ID", "Period", "Income", "Expense", "Notes"], data)
                );
            }
        }
        Some(("rm", sub)) => {
            let id = parse_id(sub.get_one::<String>("id").unwrap())?;
            unit_of_work(conn, |uow| delete_summary(uow, id))?;
            println!("Deleted summary {}", id);
        }
        _ => {}
    }
    Ok(())
}

fn period_label(year: i32, month: Option<u32>) -> String {
    match month {
        Some(m) => format!("{}-{:02}", year, m),
        None => year.to_string(),
    }
}
