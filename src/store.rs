// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Row mapping and lookups over the ledger tables. Everything here works on a
//! plain `&Connection`, so it runs equally against a unit of work
//! (`rusqlite::Transaction` derefs to `Connection`).

use anyhow::Result;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Params, Row, params};
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::error::LedgerError;
use crate::models::{
    Budget, BudgetPeriod, Category, Creditor, FinancialSummary, FundingSource, Project,
    ProjectItem, ProjectItemPayment, RecurringTransaction, TRANSFER_CATEGORY, Transaction,
    Wallet,
};

pub(crate) fn dec(r: &Row, idx: usize) -> rusqlite::Result<Decimal> {
    let s: String = r.get(idx)?;
    s.parse::<Decimal>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn opt_dec(r: &Row, idx: usize) -> rusqlite::Result<Option<Decimal>> {
    let s: Option<String> = r.get(idx)?;
    s.map(|v| {
        v.parse::<Decimal>()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

fn parsed<T: FromStr<Err = LedgerError>>(r: &Row, idx: usize) -> rusqlite::Result<T> {
    let s: String = r.get(idx)?;
    s.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Sums a single decimal column over every row returned by `sql`.
pub fn sum_decimal<P: Params>(conn: &Connection, sql: &str, p: P) -> Result<Decimal> {
    let mut stmt = conn.prepare_cached(sql)?;
    let mut rows = stmt.query(p)?;
    let mut total = Decimal::ZERO;
    while let Some(r) = rows.next()? {
        total += dec(r, 0)?;
    }
    Ok(total)
}

fn fetch_one<T>(
    conn: &Connection,
    sql: &str,
    id: i64,
    entity: &'static str,
    map: impl FnOnce(&Row) -> rusqlite::Result<T>,
) -> Result<T> {
    conn.query_row(sql, params![id], map)
        .optional()?
        .ok_or_else(|| LedgerError::not_found(entity, id).into())
}

fn fetch_all<T, P: Params>(
    conn: &Connection,
    sql: &str,
    p: P,
    map: impl FnMut(&Row) -> rusqlite::Result<T>,
) -> Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(p, map)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

// ----- wallets -----

const WALLET_COLS: &str =
    "id, name, balance, opening_balance, currency, wallet_type, account_number, is_shared";

fn wallet_row(r: &Row) -> rusqlite::Result<Wallet> {
    Ok(Wallet {
        id: r.get(0)?,
        name: r.get(1)?,
        balance: dec(r, 2)?,
        opening_balance: dec(r, 3)?,
        currency: r.get(4)?,
        wallet_type: parsed(r, 5)?,
        account_number: r.get(6)?,
        is_shared: r.get(7)?,
    })
}

pub fn get_wallet(conn: &Connection, id: i64) -> Result<Wallet> {
    let sql = format!("SELECT {WALLET_COLS} FROM wallets WHERE id=?1");
    fetch_one(conn, &sql, id, "wallet", wallet_row)
}

pub fn list_wallets(conn: &Connection) -> Result<Vec<Wallet>> {
    let sql = format!("SELECT {WALLET_COLS} FROM wallets ORDER BY id");
    fetch_all(conn, &sql, [], wallet_row)
}

pub fn set_wallet_balance(conn: &Connection, id: i64, balance: Decimal) -> Result<()> {
    let n = conn.execute(
        "UPDATE wallets SET balance=?1 WHERE id=?2",
        params![balance.to_string(), id],
    )?;
    if n == 0 {
        return Err(LedgerError::not_found("wallet", id).into());
    }
    Ok(())
}

// ----- categories -----

fn category_row(r: &Row) -> rusqlite::Result<Category> {
    Ok(Category {
        id: r.get(0)?,
        name: r.get(1)?,
        is_custom: r.get(2)?,
    })
}

pub fn get_category(conn: &Connection, id: i64) -> Result<Category> {
    fetch_one(
        conn,
        "SELECT id, name, is_custom FROM categories WHERE id=?1",
        id,
        "category",
        category_row,
    )
}

pub fn list_categories(conn: &Connection) -> Result<Vec<Category>> {
    fetch_all(
        conn,
        "SELECT id, name, is_custom FROM categories ORDER BY name",
        [],
        category_row,
    )
}

pub fn category_by_name(conn: &Connection, name: &str) -> Result<Option<Category>> {
    Ok(conn
        .query_row(
            "SELECT id, name, is_custom FROM categories WHERE name=?1 COLLATE NOCASE",
            params![name],
            category_row,
        )
        .optional()?)
}

/// Returns the id of a non-custom system category, creating it on first use.
pub fn system_category(conn: &Connection, name: &str) -> Result<i64> {
    if let Some(c) = category_by_name(conn, name)? {
        return Ok(c.id);
    }
    conn.execute(
        "INSERT INTO categories(name, is_custom) VALUES (?1, 0)",
        params![name],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Id of the transfer category if any transfer was ever recorded.
pub fn transfer_category_id(conn: &Connection) -> Result<Option<i64>> {
    Ok(category_by_name(conn, TRANSFER_CATEGORY)?.map(|c| c.id))
}

// ----- transactions -----

pub(crate) const TX_COLS: &str = "id, amount, description, date, category_id, wallet_id, kind, \
     notes, tags, receipt_path, original_amount, original_currency, transfer_peer_id";

pub(crate) fn transaction_row(r: &Row) -> rusqlite::Result<Transaction> {
    Ok(Transaction {
        id: r.get(0)?,
        amount: dec(r, 1)?,
        description: r.get(2)?,
        date: r.get(3)?,
        category_id: r.get(4)?,
        wallet_id: r.get(5)?,
        kind: parsed(r, 6)?,
        notes: r.get(7)?,
        tags: r.get(8)?,
        receipt_path: r.get(9)?,
        original_amount: opt_dec(r, 10)?,
        original_currency: r.get(11)?,
        transfer_peer_id: r.get(12)?,
    })
}

pub fn get_transaction(conn: &Connection, id: i64) -> Result<Transaction> {
    let sql = format!("SELECT {TX_COLS} FROM transactions WHERE id=?1");
    fetch_one(conn, &sql, id, "transaction", transaction_row)
}

pub fn transactions_for_wallet(conn: &Connection, wallet_id: i64) -> Result<Vec<Transaction>> {
    let sql = format!("SELECT {TX_COLS} FROM transactions WHERE wallet_id=?1 ORDER BY id");
    fetch_all(conn, &sql, params![wallet_id], transaction_row)
}

// ----- budgets -----

const BUDGET_COLS: &str = "id, category_id, amount, period, start_date, end_date, \
     notify_at_75, notify_at_90, notify_at_100, is_active";

fn budget_row(r: &Row) -> rusqlite::Result<Budget> {
    Ok(Budget {
        id: r.get(0)?,
        category_id: r.get(1)?,
        amount: dec(r, 2)?,
        period: BudgetPeriod::from(r.get::<_, String>(3)?),
        start_date: r.get(4)?,
        end_date: r.get(5)?,
        notify_at_75: r.get(6)?,
        notify_at_90: r.get(7)?,
        notify_at_100: r.get(8)?,
        is_active: r.get(9)?,
    })
}

pub fn get_budget(conn: &Connection, id: i64) -> Result<Budget> {
    let sql = format!("SELECT {BUDGET_COLS} FROM budgets WHERE id=?1");
    fetch_one(conn, &sql, id, "budget", budget_row)
}

pub fn list_budgets(conn: &Connection, active_only: bool) -> Result<Vec<Budget>> {
    let sql = if active_only {
        format!("SELECT {BUDGET_COLS} FROM budgets WHERE is_active=1 ORDER BY id")
    } else {
        format!("SELECT {BUDGET_COLS} FROM budgets ORDER BY id")
    };
    fetch_all(conn, &sql, [], budget_row)
}

// ----- recurring -----

const RECURRING_COLS: &str = "id, amount, description, category_id, wallet_id, kind, frequency, \
     start_date, end_date, last_created, next_due, is_active, notes";

fn recurring_row(r: &Row) -> rusqlite::Result<RecurringTransaction> {
    Ok(RecurringTransaction {
        id: r.get(0)?,
        amount: dec(r, 1)?,
        description: r.get(2)?,
        category_id: r.get(3)?,
        wallet_id: r.get(4)?,
        kind: parsed(r, 5)?,
        frequency: parsed(r, 6)?,
        start_date: r.get(7)?,
        end_date: r.get(8)?,
        last_created: r.get(9)?,
        next_due: r.get(10)?,
        is_active: r.get(11)?,
        notes: r.get(12)?,
    })
}

pub fn get_recurring(conn: &Connection, id: i64) -> Result<RecurringTransaction> {
    let sql = format!("SELECT {RECURRING_COLS} FROM recurring_transactions WHERE id=?1");
    fetch_one(conn, &sql, id, "recurring transaction", recurring_row)
}

pub fn list_recurring(conn: &Connection, active_only: bool) -> Result<Vec<RecurringTransaction>> {
    let filter = if active_only { "WHERE is_active=1" } else { "" };
    let sql = format!(
        "SELECT {RECURRING_COLS} FROM recurring_transactions {filter} ORDER BY next_due, id"
    );
    fetch_all(conn, &sql, [], recurring_row)
}

// ----- projects -----

const PROJECT_COLS: &str =
    "id, name, description, wallet_id, external_source, created_date, is_completed";

fn project_row(r: &Row) -> rusqlite::Result<Project> {
    let wallet_id: Option<i64> = r.get(3)?;
    let external: Option<String> = r.get(4)?;
    let funding = match wallet_id {
        Some(w) => FundingSource::Wallet(w),
        None => FundingSource::External(external.unwrap_or_default()),
    };
    Ok(Project {
        id: r.get(0)?,
        name: r.get(1)?,
        description: r.get(2)?,
        funding,
        created_date: r.get(5)?,
        is_completed: r.get(6)?,
    })
}

pub fn get_project(conn: &Connection, id: i64) -> Result<Project> {
    let sql = format!("SELECT {PROJECT_COLS} FROM projects WHERE id=?1");
    fetch_one(conn, &sql, id, "project", project_row)
}

pub fn list_projects(conn: &Connection) -> Result<Vec<Project>> {
    let sql = format!("SELECT {PROJECT_COLS} FROM projects ORDER BY created_date DESC, id DESC");
    fetch_all(conn, &sql, [], project_row)
}

const ITEM_COLS: &str = "id, project_id, name, description, cost, item_type, is_completed";

fn item_row(r: &Row) -> rusqlite::Result<ProjectItem> {
    Ok(ProjectItem {
        id: r.get(0)?,
        project_id: r.get(1)?,
        name: r.get(2)?,
        description: r.get(3)?,
        cost: dec(r, 4)?,
        item_type: parsed(r, 5)?,
        is_completed: r.get(6)?,
    })
}

/// Looks an item up within its project; an item of another project is not found.
pub fn get_item(conn: &Connection, project_id: i64, item_id: i64) -> Result<ProjectItem> {
    let sql = format!("SELECT {ITEM_COLS} FROM project_items WHERE id=?1");
    let item = fetch_one(conn, &sql, item_id, "project item", item_row)?;
    if item.project_id != project_id {
        return Err(LedgerError::not_found("project item", item_id).into());
    }
    Ok(item)
}

pub fn items_for_project(conn: &Connection, project_id: i64) -> Result<Vec<ProjectItem>> {
    let sql = format!("SELECT {ITEM_COLS} FROM project_items WHERE project_id=?1 ORDER BY id");
    fetch_all(conn, &sql, params![project_id], item_row)
}

const PAYMENT_COLS: &str = "id, item_id, amount, description, is_paid, payment_date";

fn payment_row(r: &Row) -> rusqlite::Result<ProjectItemPayment> {
    Ok(ProjectItemPayment {
        id: r.get(0)?,
        item_id: r.get(1)?,
        amount: dec(r, 2)?,
        description: r.get(3)?,
        is_paid: r.get(4)?,
        payment_date: r.get(5)?,
    })
}

pub fn get_payment(conn: &Connection, item_id: i64, payment_id: i64) -> Result<ProjectItemPayment> {
    let sql = format!("SELECT {PAYMENT_COLS} FROM project_item_payments WHERE id=?1");
    let p = fetch_one(conn, &sql, payment_id, "payment", payment_row)?;
    if p.item_id != item_id {
        return Err(LedgerError::not_found("payment", payment_id).into());
    }
    Ok(p)
}

pub fn payments_for_item(conn: &Connection, item_id: i64) -> Result<Vec<ProjectItemPayment>> {
    let sql =
        format!("SELECT {PAYMENT_COLS} FROM project_item_payments WHERE item_id=?1 ORDER BY id");
    fetch_all(conn, &sql, params![item_id], payment_row)
}

// ----- summaries & creditors -----

fn summary_row(r: &Row) -> rusqlite::Result<FinancialSummary> {
    Ok(FinancialSummary {
        id: r.get(0)?,
        year: r.get(1)?,
        month: r.get(2)?,
        total_income: dec(r, 3)?,
        total_expense: dec(r, 4)?,
        notes: r.get(5)?,
    })
}

pub fn list_summaries(conn: &Connection) -> Result<Vec<FinancialSummary>> {
    fetch_all(
        conn,
        "SELECT id, year, month, total_income, total_expense, notes FROM financial_summaries
         ORDER BY year DESC, month IS NOT NULL, month DESC",
        [],
        summary_row,
    )
}

fn creditor_row(r: &Row) -> rusqlite::Result<Creditor> {
    Ok(Creditor {
        id: r.get(0)?,
        name: r.get(1)?,
        amount: dec(r, 2)?,
        currency: r.get(3)?,
        description: r.get(4)?,
    })
}

pub fn get_creditor(conn: &Connection, id: i64) -> Result<Creditor> {
    fetch_one(
        conn,
        "SELECT id, name, amount, currency, description FROM creditors WHERE id=?1",
        id,
        "creditor",
        creditor_row,
    )
}

pub fn list_creditors(conn: &Connection) -> Result<Vec<Creditor>> {
    fetch_all(
        conn,
        "SELECT id, name, amount, currency, description FROM creditors ORDER BY name",
        [],
        creditor_row,
    )
}
