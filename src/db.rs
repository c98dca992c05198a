// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use once_cell::sync::Lazy;
use rusqlite::{Connection, Transaction, params};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info};

static APP: Lazy<(&str, &str, &str)> = Lazy::new(|| ("com.alphavelocity", "Fintrack", "fintrack"));

/// One explicit database transaction; ledger mutations require one.
pub type UnitOfWork<'c> = Transaction<'c>;

/// Environment variable that overrides the database location.
pub const DB_ENV: &str = "FINTRACK_DB";

pub const DEFAULT_CATEGORIES: [&str; 11] = [
    "Food & Drink",
    "Transport",
    "Utilities",
    "Entertainment",
    "Health",
    "Shopping",
    "Work",
    "Travel",
    "Gifts",
    "Home",
    "Other",
];

pub fn db_path() -> Result<PathBuf> {
    if let Ok(p) = std::env::var(DB_ENV) {
        if !p.trim().is_empty() {
            return Ok(PathBuf::from(p.trim()));
        }
    }
    let proj = ProjectDirs::from(APP.0, APP.1, APP.2)
        .context("Could not determine platform-specific data dir")?;
    let data_dir = proj.data_dir();
    fs::create_dir_all(data_dir).context("Failed to create data dir")?;
    Ok(data_dir.join("fintrack.sqlite"))
}

pub fn open_or_init() -> Result<Connection> {
    let path = db_path()?;
    debug!(path = %path.display(), "opening database");
    let mut conn =
        Connection::open(&path).with_context(|| format!("Open DB at {}", path.display()))?;
    init_schema(&mut conn)?;
    seed_defaults(&mut conn)?;
    Ok(conn)
}

/// Runs `f` inside one SQLite transaction. Commits when `f` returns `Ok`;
/// any error (or panic) drops the transaction, which rolls it back.
pub fn unit_of_work<T>(
    conn: &mut Connection,
    f: impl FnOnce(&UnitOfWork<'_>) -> Result<T>,
) -> Result<T> {
    let tx = conn.transaction()?;
    let out = f(&tx)?;
    tx.commit().context("Commit unit of work")?;
    Ok(out)
}

/// Creates the default `Cash` wallet and the default categories on an empty
/// database. Safe to call on every start.
pub fn seed_defaults(conn: &mut Connection) -> Result<()> {
    unit_of_work(conn, |tx| {
        let wallets: i64 = tx.query_row("SELECT COUNT(*) FROM wallets", [], |r| r.get(0))?;
        if wallets == 0 {
            tx.execute(
                "INSERT INTO wallets(name, balance, opening_balance, currency, wallet_type)
                 VALUES ('Cash', '0', '0', 'GHS', 'cash')",
                [],
            )?;
            info!("initialized default wallet");
        }
        let categories: i64 =
            tx.query_row("SELECT COUNT(*) FROM categories", [], |r| r.get(0))?;
        if categories == 0 {
            for name in DEFAULT_CATEGORIES {
                tx.execute(
                    "INSERT INTO categories(name, is_custom) VALUES (?1, 0)",
                    params![name],
                )?;
            }
            info!("initialized default categories");
        }
        Ok(())
    })
}

pub fn init_schema(conn: &mut Connection) -> Result<()> {
    conn.execute_batch(
        r#"
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS settings(
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS wallets(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        balance TEXT NOT NULL DEFAULT '0',
        opening_balance TEXT NOT NULL DEFAULT '0',
        currency TEXT NOT NULL DEFAULT 'GHS',
        wallet_type TEXT NOT NULL DEFAULT 'cash'
            CHECK(wallet_type IN ('cash','bank','crypto','ewallet')),
        account_number TEXT,
        is_shared INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE TABLE IF NOT EXISTS categories(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        is_custom INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS transactions(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        amount TEXT NOT NULL,
        description TEXT NOT NULL,
        date TEXT NOT NULL,
        category_id INTEGER NOT NULL,
        wallet_id INTEGER NOT NULL,
        kind TEXT NOT NULL DEFAULT 'expense' CHECK(kind IN ('expense','income')),
        notes TEXT,
        tags TEXT,
        receipt_path TEXT,
        original_amount TEXT,
        original_currency TEXT,
        transfer_peer_id INTEGER,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        FOREIGN KEY(category_id) REFERENCES categories(id),
        FOREIGN KEY(wallet_id) REFERENCES wallets(id)
    );
    CREATE INDEX IF NOT EXISTS idx_transactions_date ON transactions(date);
    CREATE INDEX IF NOT EXISTS idx_transactions_category ON transactions(category_id, kind, date);

    CREATE TABLE IF NOT EXISTS budgets(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        category_id INTEGER NOT NULL,
        amount TEXT NOT NULL,
        period TEXT NOT NULL DEFAULT 'monthly',
        start_date TEXT NOT NULL,
        end_date TEXT,
        notify_at_75 INTEGER NOT NULL DEFAULT 1,
        notify_at_90 INTEGER NOT NULL DEFAULT 1,
        notify_at_100 INTEGER NOT NULL DEFAULT 1,
        is_active INTEGER NOT NULL DEFAULT 1,
        FOREIGN KEY(category_id) REFERENCES categories(id)
    );

    CREATE TABLE IF NOT EXISTS recurring_transactions(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        amount TEXT NOT NULL,
        description TEXT NOT NULL,
        category_id INTEGER NOT NULL,
        wallet_id INTEGER NOT NULL,
        kind TEXT NOT NULL DEFAULT 'expense' CHECK(kind IN ('expense','income')),
        frequency TEXT NOT NULL CHECK(frequency IN ('daily','weekly','monthly','yearly')),
        start_date TEXT NOT NULL,
        end_date TEXT,
        last_created TEXT,
        next_due TEXT,
        is_active INTEGER NOT NULL DEFAULT 1,
        notes TEXT,
        FOREIGN KEY(category_id) REFERENCES categories(id),
        FOREIGN KEY(wallet_id) REFERENCES wallets(id)
    );

    -- Append-only log of observed rates: 1 from_currency = rate to_currency
    CREATE TABLE IF NOT EXISTS exchange_rates(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        from_currency TEXT NOT NULL,
        to_currency TEXT NOT NULL,
        rate TEXT NOT NULL,
        fetched_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_exchange_rates_pair
        ON exchange_rates(from_currency, to_currency, fetched_at);

    CREATE TABLE IF NOT EXISTS projects(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        description TEXT,
        wallet_id INTEGER,
        external_source TEXT,
        created_date TEXT NOT NULL,
        is_completed INTEGER NOT NULL DEFAULT 0,
        CHECK((wallet_id IS NULL) <> (external_source IS NULL)),
        FOREIGN KEY(wallet_id) REFERENCES wallets(id)
    );

    -- Items and payments are removed by projects::delete_project, not by the engine
    CREATE TABLE IF NOT EXISTS project_items(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        project_id INTEGER NOT NULL,
        name TEXT NOT NULL,
        description TEXT,
        cost TEXT NOT NULL DEFAULT '0',
        item_type TEXT NOT NULL DEFAULT 'expense' CHECK(item_type IN ('expense','income')),
        is_completed INTEGER NOT NULL DEFAULT 0,
        created_date TEXT NOT NULL DEFAULT (date('now')),
        FOREIGN KEY(project_id) REFERENCES projects(id)
    );

    CREATE TABLE IF NOT EXISTS project_item_payments(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        item_id INTEGER NOT NULL,
        amount TEXT NOT NULL,
        description TEXT,
        is_paid INTEGER NOT NULL DEFAULT 0,
        payment_date TEXT,
        created_date TEXT NOT NULL DEFAULT (date('now')),
        FOREIGN KEY(item_id) REFERENCES project_items(id)
    );

    CREATE TABLE IF NOT EXISTS financial_summaries(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        year INTEGER NOT NULL,
        month INTEGER CHECK(month IS NULL OR (month BETWEEN 1 AND 12)),
        total_income TEXT NOT NULL DEFAULT '0',
        total_expense TEXT NOT NULL DEFAULT '0',
        notes TEXT,
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE TABLE IF NOT EXISTS creditors(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        amount TEXT NOT NULL DEFAULT '0',
        currency TEXT NOT NULL DEFAULT 'GHS',
        description TEXT,
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );
    "#,
    )?;
    Ok(())
}
