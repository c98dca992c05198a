// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::transactions::{self, TransactionFilter, TransactionRow};
use crate::error::LedgerError;
use anyhow::{Context, Result};
use rusqlite::Connection;
use serde_json::json;
use std::io::Write;
use std::path::Path;

pub const CSV_HEADER: [&str; 8] = [
    "Date",
    "Description",
    "Category",
    "Wallet",
    "Amount",
    "Type",
    "Tags",
    "Notes",
];

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("transactions", sub)) => {
            let fmt = sub.get_one::<String>("format").unwrap().to_lowercase();
            let out = sub.get_one::<String>("out").unwrap();
            let n = export_transactions(conn, &fmt, Path::new(out))?;
            println!("Exported {} transactions to {}", n, out);
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Writes every transaction, newest first, to `out` as `csv` or `json`.
/// An unknown format fails before the file is created.
pub fn export_transactions(conn: &Connection, fmt: &str, out: &Path) -> Result<usize> {
    if fmt != "csv" && fmt != "json" {
        return Err(
            LedgerError::validation(format!("unknown format '{}' (use csv|json)", fmt)).into(),
        );
    }
    let rows = transactions::query_rows(conn, &TransactionFilter::default())?;
    let file =
        std::fs::File::create(out).with_context(|| format!("Create {}", out.display()))?;
    if fmt == "csv" {
        write_csv(file, &rows)?;
    } else {
        write_json(file, &rows)?;
    }
    Ok(rows.len())
}

pub fn write_csv<W: Write>(w: W, rows: &[TransactionRow]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(w);
    wtr.write_record(CSV_HEADER)?;
    for r in rows {
        let amount = r.amount.to_string();
        wtr.write_record([
            r.date.as_str(),
            r.description.as_str(),
            r.category.as_str(),
            r.wallet.as_str(),
            amount.as_str(),
            r.kind.as_str(),
            r.tags.as_str(),
            r.notes.as_str(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

fn write_json<W: Write>(mut w: W, rows: &[TransactionRow]) -> Result<()> {
    let items: Vec<_> = rows
        .iter()
        .map(|r| {
            json!({
                "date": r.date, "description": r.description, "category": r.category,
                "wallet": r.wallet, "amount": r.amount, "currency": r.currency,
                "type": r.kind, "tags": r.tags, "notes": r.notes
            })
        })
        .collect();
    w.write_all(serde_json::to_string_pretty(&items)?.as_bytes())?;
    Ok(())
}
