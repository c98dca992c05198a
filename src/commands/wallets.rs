// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::fx::RateProvider;
use crate::commands::transactions::{self, TransferRequest};
use crate::db::{UnitOfWork, unit_of_work};
use crate::error::LedgerError;
use crate::models::WalletType;
use crate::store;
use crate::utils::{
    maybe_print_json, non_empty, normalize_currency, parse_amount, parse_date, parse_decimal,
    parse_id, pretty_table,
};
use anyhow::Result;
use chrono::Utc;
use rusqlite::{Connection, params};
use rust_decimal::Decimal;
use tracing::info;

#[derive(Debug, Clone)]
pub struct NewWallet {
    pub name: String,
    pub opening_balance: Decimal,
    pub currency: String,
    pub wallet_type: WalletType,
    pub account_number: Option<String>,
    pub is_shared: bool,
}

/// Editable wallet attributes. The balance is deliberately absent.
#[derive(Debug, Clone, Default)]
pub struct WalletUpdate {
    pub name: Option<String>,
    pub wallet_type: Option<WalletType>,
    /// `Some(None)` clears the stored number.
    pub account_number: Option<Option<String>>,
    pub is_shared: Option<bool>,
}

pub fn create_wallet(uow: &UnitOfWork<'_>, w: &NewWallet) -> Result<i64> {
    let name = w.name.trim();
    if name.is_empty() {
        return Err(LedgerError::validation("wallet name is required").into());
    }
    let currency = normalize_currency(&w.currency)?;
    uow.execute(
        "INSERT INTO wallets(name, balance, opening_balance, currency, wallet_type, account_number, is_shared)
         VALUES (?1, ?2, ?2, ?3, ?4, ?5, ?6)",
        params![
            name,
            w.opening_balance.to_string(),
            currency,
            w.wallet_type.as_str(),
            w.account_number,
            w.is_shared
        ],
    )?;
    let id = uow.last_insert_rowid();
    info!(id, name, %currency, "wallet created");
    Ok(id)
}

pub fn update_wallet(uow: &UnitOfWork<'_>, id: i64, u: &WalletUpdate) -> Result<()> {
    let cur = store::get_wallet(uow, id)?;
    let name = u.name.clone().unwrap_or(cur.name);
    if name.trim().is_empty() {
        return Err(LedgerError::validation("wallet name is required").into());
    }
    uow.execute(
        "UPDATE wallets SET name=?1, wallet_type=?2, account_number=?3, is_shared=?4 WHERE id=?5",
        params![
            name.trim(),
            u.wallet_type.unwrap_or(cur.wallet_type).as_str(),
            u.account_number.clone().unwrap_or(cur.account_number),
            u.is_shared.unwrap_or(cur.is_shared),
            id
        ],
    )?;
    Ok(())
}

/// Removes a wallet that nothing references. Transactions are never
/// cascaded away with their wallet.
pub fn delete_wallet(uow: &UnitOfWork<'_>, id: i64) -> Result<()> {
    let w = store::get_wallet(uow, id)?;
    let count = |sql: &str| -> Result<i64> { Ok(uow.query_row(sql, params![id], |r| r.get(0))?) };
    let txs = count("SELECT COUNT(*) FROM transactions WHERE wallet_id=?1")?;
    if txs > 0 {
        return Err(LedgerError::refused(format!(
            "cannot delete wallet '{}': {} transaction(s) still reference it",
            w.name, txs
        ))
        .into());
    }
    let recurring = count("SELECT COUNT(*) FROM recurring_transactions WHERE wallet_id=?1")?;
    if recurring > 0 {
        return Err(LedgerError::refused(format!(
            "cannot delete wallet '{}': {} recurring transaction(s) still use it",
            w.name, recurring
        ))
        .into());
    }
    let projects = count("SELECT COUNT(*) FROM projects WHERE wallet_id=?1")?;
    if projects > 0 {
        return Err(LedgerError::refused(format!(
            "cannot delete wallet '{}': {} project(s) are funded from it",
            w.name, projects
        ))
        .into());
    }
    uow.execute("DELETE FROM wallets WHERE id=?1", params![id])?;
    info!(id, "wallet deleted");
    Ok(())
}

pub fn handle(conn: &mut Connection, rates: &dyn RateProvider, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let w = NewWallet {
                name: sub.get_one::<String>("name").unwrap().clone(),
                opening_balance: match sub.get_one::<String>("balance") {
                    Some(s) => parse_decimal(s)?,
                    None => Decimal::ZERO,
                },
                currency: sub.get_one::<String>("currency").unwrap().clone(),
                wallet_type: sub.get_one::<String>("type").unwrap().parse()?,
                account_number: non_empty(sub.get_one::<String>("account_number")),
                is_shared: sub.get_flag("shared"),
            };
            let id = unit_of_work(conn, |uow| create_wallet(uow, &w))?;
            println!("Added wallet '{}' (id {})", w.name.trim(), id);
        }
        Some(("list", sub)) => {
            let wallets = store::list_wallets(conn)?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &wallets)? {
                let data = wallets
                    .iter()
                    .map(|w| {
                        vec![
                            w.id.to_string(),
                            w.name.clone(),
                            w.wallet_type.as_str().to_string(),
                            w.currency.clone(),
                            format!("{:.2}", w.balance),
                            if w.is_shared { "yes".into() } else { String::new() },
                        ]
                    })
                    .collect();
                println!(
                    "{}",
                    pretty_table(&["ID", "Name", "Type", "CCY", "Balance", "Shared"], data)
                );
            }
        }
        Some(("edit", sub)) => {
            let id = parse_id(sub.get_one::<String>("id").unwrap())?;
            let u = WalletUpdate {
                name: non_empty(sub.get_one::<String>("name")),
                wallet_type: sub
                    .get_one::<String>("type")
                    .map(|s| s.parse::<WalletType>())
                    .transpose()?,
                // an empty --account-number clears it
                account_number: sub
                    .contains_id("account_number")
                    .then(|| non_empty(sub.get_one::<String>("account_number"))),
                is_shared: sub.get_one::<bool>("shared").copied(),
            };
            unit_of_work(conn, |uow| update_wallet(uow, id, &u))?;
            println!("Updated wallet {}", id);
        }
        Some(("rm", sub)) => {
            let id = parse_id(sub.get_one::<String>("id").unwrap())?;
            unit_of_work(conn, |uow| delete_wallet(uow, id))?;
            println!("Removed wallet {}", id);
        }
        Some(("transfer", sub)) => {
            let req = TransferRequest {
                from_wallet: parse_id(sub.get_one::<String>("from").unwrap())?,
                to_wallet: parse_id(sub.get_one::<String>("to").unwrap())?,
                amount: parse_amount(sub.get_one::<String>("amount").unwrap())?,
                date: match sub.get_one::<String>("date") {
                    Some(s) => parse_date(s)?,
                    None => Utc::now().date_naive(),
                },
                note: non_empty(sub.get_one::<String>("note")),
            };
            let (out_id, in_id) =
                unit_of_work(conn, |uow| transactions::transfer(uow, rates, &req, Utc::now()))?;
            println!(
                "Transferred {} from wallet {} to wallet {} (transactions {} / {})",
                req.amount, req.from_wallet, req.to_wallet, out_id, in_id
            );
        }
        Some(("transfers", sub)) => {
            let limit = *sub.get_one::<usize>("limit").unwrap_or(&10);
            let rows = transactions::transfer_history(conn, limit)?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &rows)? {
                transactions::print_rows(&rows);
            }
        }
        _ => {}
    }
    Ok(())
}
