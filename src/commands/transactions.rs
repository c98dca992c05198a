// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::fx::{self, RateProvider};
use crate::db::{UnitOfWork, unit_of_work};
use crate::error::LedgerError;
use crate::models::{TRANSFER_CATEGORY, TxKind, Wallet, is_reserved_category};
use crate::store::{self, dec};
use crate::utils::{
    ensure_positive, maybe_print_json, non_empty, normalize_currency, parse_amount, parse_date,
    parse_id, pretty_table,
};
use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, params};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

/// Fields of a transaction as entered; used for both create and edit.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub amount: Decimal,
    pub description: String,
    pub date: NaiveDate,
    pub category_id: i64,
    pub wallet_id: i64,
    pub kind: TxKind,
    pub notes: Option<String>,
    pub tags: Option<String>,
    pub receipt_path: Option<String>,
    pub original_amount: Option<Decimal>,
    pub original_currency: Option<String>,
}

impl NewTransaction {
    pub fn new(
        amount: Decimal,
        description: &str,
        date: NaiveDate,
        category_id: i64,
        wallet_id: i64,
        kind: TxKind,
    ) -> Self {
        Self {
            amount,
            description: description.to_string(),
            date,
            category_id,
            wallet_id,
            kind,
            notes: None,
            tags: None,
            receipt_path: None,
            original_amount: None,
            original_currency: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub from_wallet: i64,
    pub to_wallet: i64,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub note: Option<String>,
}

/// Checks everything a write needs before anything is written.
fn validate(conn: &Connection, t: &NewTransaction) -> Result<Wallet> {
    ensure_positive(t.amount, "amount")?;
    if t.description.trim().is_empty() {
        return Err(LedgerError::validation("description is required").into());
    }
    store::get_category(conn, t.category_id)?;
    store::get_wallet(conn, t.wallet_id)
}

/// Refuses the categories only transfers and debt payments may post to.
fn ensure_user_category(conn: &Connection, category_id: i64) -> Result<()> {
    let c = store::get_category(conn, category_id)?;
    if is_reserved_category(&c.name) {
        return Err(LedgerError::refused(format!(
            "category '{}' is managed by the ledger and cannot be used directly",
            c.name
        ))
        .into());
    }
    Ok(())
}

fn adjust_wallet(conn: &Connection, wallet_id: i64, delta: Decimal) -> Result<Decimal> {
    let w = store::get_wallet(conn, wallet_id)?;
    let balance = w.balance + delta;
    store::set_wallet_balance(conn, wallet_id, balance)?;
    Ok(balance)
}

fn insert_row(conn: &Connection, t: &NewTransaction) -> Result<i64> {
    conn.execute(
        "INSERT INTO transactions(amount, description, date, category_id, wallet_id, kind,
             notes, tags, receipt_path, original_amount, original_currency)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            t.amount.to_string(),
            t.description.trim(),
            t.date,
            t.category_id,
            t.wallet_id,
            t.kind.as_str(),
            t.notes,
            t.tags,
            t.receipt_path,
            t.original_amount.map(|d| d.to_string()),
            t.original_currency,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Records a transaction and applies its effect to the wallet balance.
/// Nothing is written when the wallet or category does not resolve.
pub fn create_transaction(uow: &UnitOfWork<'_>, t: &NewTransaction) -> Result<i64> {
    ensure_user_category(uow, t.category_id)?;
    record(uow, t)
}

/// Insert path shared with transfers and debt payments, which post to
/// reserved categories.
pub(crate) fn record(uow: &UnitOfWork<'_>, t: &NewTransaction) -> Result<i64> {
    validate(uow, t)?;
    let id = insert_row(uow, t)?;
    let balance = adjust_wallet(uow, t.wallet_id, t.kind.signed(t.amount))?;
    info!(id, wallet = t.wallet_id, kind = %t.kind, amount = %t.amount, %balance, "transaction recorded");
    Ok(id)
}

/// Replaces a transaction. The stored row is snapshotted first: its effect is
/// reversed on its own wallet, then the new effect lands on the new wallet.
pub fn update_transaction(uow: &UnitOfWork<'_>, id: i64, t: &NewTransaction) -> Result<()> {
    let original = store::get_transaction(uow, id)?;
    if original.transfer_peer_id.is_some() {
        return Err(LedgerError::refused(
            "transfer legs cannot be edited; delete the transfer and record it again",
        )
        .into());
    }
    if t.category_id != original.category_id {
        ensure_user_category(uow, t.category_id)?;
    }
    validate(uow, t)?;

    adjust_wallet(uow, original.wallet_id, -original.kind.signed(original.amount))?;
    adjust_wallet(uow, t.wallet_id, t.kind.signed(t.amount))?;

    uow.execute(
        "UPDATE transactions SET amount=?1, description=?2, date=?3, category_id=?4,
             wallet_id=?5, kind=?6, notes=?7, tags=?8, receipt_path=?9,
             original_amount=?10, original_currency=?11
         WHERE id=?12",
        params![
            t.amount.to_string(),
            t.description.trim(),
            t.date,
            t.category_id,
            t.wallet_id,
            t.kind.as_str(),
            t.notes,
            t.tags,
            t.receipt_path,
            t.original_amount.map(|d| d.to_string()),
            t.original_currency,
            id
        ],
    )?;
    info!(id, from_wallet = original.wallet_id, to_wallet = t.wallet_id, "transaction updated");
    Ok(())
}

/// Deletes a transaction and reverses its balance effect. Deleting either leg
/// of a transfer removes both. Returns the ids removed.
pub fn delete_transaction(uow: &UnitOfWork<'_>, id: i64) -> Result<Vec<i64>> {
    let first = store::get_transaction(uow, id)?;
    let mut legs = vec![first.clone()];
    if let Some(peer) = first.transfer_peer_id {
        legs.push(store::get_transaction(uow, peer)?);
    }
    let mut removed = Vec::new();
    for leg in legs {
        adjust_wallet(uow, leg.wallet_id, -leg.kind.signed(leg.amount))?;
        uow.execute("DELETE FROM transactions WHERE id=?1", params![leg.id])?;
        removed.push(leg.id);
    }
    info!(?removed, "transaction deleted");
    Ok(removed)
}

/// Moves money between wallets as an expense on the source and an income on
/// the destination, both in the Transfer category and linked to each other.
/// Across currencies the destination leg is converted at the current rate.
pub fn transfer(
    uow: &UnitOfWork<'_>,
    rates: &dyn RateProvider,
    req: &TransferRequest,
    now: DateTime<Utc>,
) -> Result<(i64, i64)> {
    ensure_positive(req.amount, "amount")?;
    if req.from_wallet == req.to_wallet {
        return Err(LedgerError::refused("cannot transfer to the same wallet").into());
    }
    let src = store::get_wallet(uow, req.from_wallet)?;
    let dst = store::get_wallet(uow, req.to_wallet)?;
    let category_id = store::system_category(uow, TRANSFER_CATEGORY)?;

    let mut out = NewTransaction::new(
        req.amount,
        &format!("Transfer to {}", dst.name),
        req.date,
        category_id,
        src.id,
        TxKind::Expense,
    );
    out.tags = Some("transfer".into());
    out.notes = req.note.clone();

    let mut inc = NewTransaction::new(
        req.amount,
        &format!("Transfer from {}", src.name),
        req.date,
        category_id,
        dst.id,
        TxKind::Income,
    );
    inc.tags = Some("transfer".into());
    inc.notes = req.note.clone();
    if src.currency != dst.currency {
        inc.amount =
            fx::convert(uow, rates, req.amount, &src.currency, &dst.currency, now)?.round_dp(2);
        inc.original_amount = Some(req.amount);
        inc.original_currency = Some(src.currency.clone());
    }

    let out_id = record(uow, &out)?;
    let in_id = record(uow, &inc)?;
    uow.execute(
        "UPDATE transactions SET transfer_peer_id=?2 WHERE id=?1",
        params![out_id, in_id],
    )?;
    uow.execute(
        "UPDATE transactions SET transfer_peer_id=?2 WHERE id=?1",
        params![in_id, out_id],
    )?;
    info!(from = src.id, to = dst.id, amount = %req.amount, "transfer recorded");
    Ok((out_id, in_id))
}

/// Rewrites an entry made in a foreign currency into its wallet's currency,
/// keeping the figure as entered in `original_amount`/`original_currency`.
pub fn apply_entry_currency(
    conn: &Connection,
    rates: &dyn RateProvider,
    mut t: NewTransaction,
    currency: Option<&str>,
    now: DateTime<Utc>,
) -> Result<NewTransaction> {
    let Some(ccy) = currency else {
        return Ok(t);
    };
    let ccy = normalize_currency(ccy)?;
    let wallet = store::get_wallet(conn, t.wallet_id)?;
    if ccy == wallet.currency {
        return Ok(t);
    }
    let converted = fx::convert(conn, rates, t.amount, &ccy, &wallet.currency, now)?.round_dp(2);
    t.original_amount = Some(t.amount);
    t.original_currency = Some(ccy);
    t.amount = converted;
    Ok(t)
}

/// Re-expresses an entry for the wallet it now sits on. A foreign entry is
/// converted again from the figure as entered; the pair is dropped when that
/// currency matches the wallet.
pub fn reapply_entry_currency(
    conn: &Connection,
    rates: &dyn RateProvider,
    mut t: NewTransaction,
    now: DateTime<Utc>,
) -> Result<NewTransaction> {
    let entered = t.original_amount.take();
    let Some(ccy) = t.original_currency.take() else {
        return Ok(t);
    };
    if let Some(amount) = entered {
        t.amount = amount;
    }
    apply_entry_currency(conn, rates, t, Some(&ccy), now)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Date,
    Description,
    Category,
    Amount,
}

impl SortKey {
    fn column(&self) -> &'static str {
        match self {
            SortKey::Date => "t.date",
            SortKey::Description => "t.description",
            SortKey::Category => "c.name",
            SortKey::Amount => "CAST(t.amount AS REAL)",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub search: Option<String>,
    pub category_id: Option<i64>,
    pub wallet_id: Option<i64>,
    pub kind: Option<TxKind>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub sort: SortKey,
    pub ascending: bool,
    pub limit: Option<usize>,
}

impl TransactionFilter {
    pub fn from_matches(sub: &clap::ArgMatches) -> Result<Self> {
        let sort = match sub.get_one::<String>("sort").map(|s| s.as_str()) {
            Some("description") => SortKey::Description,
            Some("category") => SortKey::Category,
            Some("amount") => SortKey::Amount,
            _ => SortKey::Date,
        };
        Ok(Self {
            search: non_empty(sub.get_one::<String>("search")),
            category_id: sub.get_one::<String>("category").map(|s| parse_id(s)).transpose()?,
            wallet_id: sub.get_one::<String>("wallet").map(|s| parse_id(s)).transpose()?,
            kind: sub
                .get_one::<String>("type")
                .map(|s| s.parse::<TxKind>())
                .transpose()?,
            from: sub.get_one::<String>("from").map(|s| parse_date(s)).transpose()?,
            to: sub.get_one::<String>("to").map(|s| parse_date(s)).transpose()?,
            sort,
            ascending: sub.get_one::<String>("order").map(|s| s == "asc").unwrap_or(false),
            limit: sub.get_one::<usize>("limit").copied(),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TransactionRow {
    pub id: i64,
    pub date: String,
    pub description: String,
    pub category: String,
    pub wallet: String,
    pub amount: Decimal,
    pub currency: String,
    pub kind: String,
    pub tags: String,
    pub notes: String,
}

pub fn query_rows(conn: &Connection, f: &TransactionFilter) -> Result<Vec<TransactionRow>> {
    let mut sql = String::from(
        "SELECT t.id, t.date, t.description, c.name, w.name, t.amount, w.currency, t.kind, t.tags, t.notes
         FROM transactions t
         JOIN categories c ON t.category_id=c.id
         JOIN wallets w ON t.wallet_id=w.id
         WHERE 1=1",
    );
    let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(q) = &f.search {
        sql.push_str(" AND (instr(t.description, ?) > 0 OR instr(IFNULL(t.notes,''), ?) > 0 OR instr(IFNULL(t.tags,''), ?) > 0)");
        for _ in 0..3 {
            params_vec.push(Box::new(q.clone()));
        }
    }
    if let Some(c) = f.category_id {
        sql.push_str(" AND t.category_id=?");
        params_vec.push(Box::new(c));
    }
    if let Some(w) = f.wallet_id {
        sql.push_str(" AND t.wallet_id=?");
        params_vec.push(Box::new(w));
    }
    if let Some(k) = f.kind {
        sql.push_str(" AND t.kind=?");
        params_vec.push(Box::new(k.as_str()));
    }
    if let Some(from) = f.from {
        sql.push_str(" AND t.date>=?");
        params_vec.push(Box::new(from));
    }
    if let Some(to) = f.to {
        sql.push_str(" AND t.date<=?");
        params_vec.push(Box::new(to));
    }
    let dir = if f.ascending { "ASC" } else { "DESC" };
    sql.push_str(&format!(" ORDER BY {} {}, t.id {}", f.sort.column(), dir, dir));
    if let Some(limit) = f.limit {
        sql.push_str(" LIMIT ?");
        params_vec.push(Box::new(limit as i64));
    }

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(rusqlite::params_from_iter(params_vec.iter()))?;

    let mut data = Vec::new();
    while let Some(r) = rows.next()? {
        let date: NaiveDate = r.get(1)?;
        let tags: Option<String> = r.get(8)?;
        let notes: Option<String> = r.get(9)?;
        data.push(TransactionRow {
            id: r.get(0)?,
            date: date.format("%Y-%m-%d").to_string(),
            description: r.get(2)?,
            category: r.get(3)?,
            wallet: r.get(4)?,
            amount: dec(r, 5)?,
            currency: r.get(6)?,
            kind: r.get(7)?,
            tags: tags.unwrap_or_default(),
            notes: notes.unwrap_or_default(),
        });
    }
    Ok(data)
}

/// Most recent transfer legs, newest first.
pub fn transfer_history(conn: &Connection, limit: usize) -> Result<Vec<TransactionRow>> {
    let Some(category_id) = store::transfer_category_id(conn)? else {
        return Ok(Vec::new());
    };
    let filter = TransactionFilter {
        category_id: Some(category_id),
        limit: Some(limit),
        ..Default::default()
    };
    query_rows(conn, &filter)
}

pub fn print_rows(rows: &[TransactionRow]) {
    let data: Vec<Vec<String>> = rows
        .iter()
        .map(|r| {
            vec![
                r.id.to_string(),
                r.date.clone(),
                r.description.clone(),
                r.category.clone(),
                r.wallet.clone(),
                format!("{:.2} {}", r.amount, r.currency),
                r.kind.clone(),
                r.tags.clone(),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(
            &["ID", "Date", "Description", "Category", "Wallet", "Amount", "Type", "Tags"],
            data,
        )
    );
}

pub fn handle(conn: &mut Connection, rates: &dyn RateProvider, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => add(conn, rates, sub)?,
        Some(("edit", sub)) => edit(conn, rates, sub)?,
        Some(("rm", sub)) => {
            let id = parse_id(sub.get_one::<String>("id").unwrap())?;
            let removed = unit_of_work(conn, |uow| delete_transaction(uow, id))?;
            println!("Deleted transaction(s) {:?}", removed);
        }
        Some(("show", sub)) => {
            let id = parse_id(sub.get_one::<String>("id").unwrap())?;
            let t = store::get_transaction(conn, id)?;
            println!("{}", serde_json::to_string_pretty(&t)?);
        }
        Some(("list", sub)) => {
            let filter = TransactionFilter::from_matches(sub)?;
            let rows = query_rows(conn, &filter)?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &rows)? {
                print_rows(&rows);
            }
        }
        _ => {}
    }
    Ok(())
}

fn add(conn: &mut Connection, rates: &dyn RateProvider, sub: &clap::ArgMatches) -> Result<()> {
    let amount = parse_amount(sub.get_one::<String>("amount").unwrap())?;
    let description = sub.get_one::<String>("description").unwrap();
    let category_id = parse_id(sub.get_one::<String>("category").unwrap())?;
    let wallet_id = parse_id(sub.get_one::<String>("wallet").unwrap())?;
    let kind = match sub.get_one::<String>("type") {
        Some(s) => s.parse::<TxKind>()?,
        None => TxKind::Expense,
    };
    let date = match sub.get_one::<String>("date") {
        Some(s) => parse_date(s)?,
        None => Utc::now().date_naive(),
    };
    let mut t = NewTransaction::new(amount, description, date, category_id, wallet_id, kind);
    t.notes = non_empty(sub.get_one::<String>("notes"));
    t.tags = non_empty(sub.get_one::<String>("tags"));
    t.receipt_path = non_empty(sub.get_one::<String>("receipt"));
    let currency = sub.get_one::<String>("currency").map(|s| s.as_str());

    let id = unit_of_work(conn, |uow| {
        let t = apply_entry_currency(uow, rates, t, currency, Utc::now())?;
        create_transaction(uow, &t)
    })?;
    println!("Recorded {} {} as transaction {}", kind, amount, id);
    Ok(())
}

fn edit(conn: &mut Connection, rates: &dyn RateProvider, sub: &clap::ArgMatches) -> Result<()> {
    let id = parse_id(sub.get_one::<String>("id").unwrap())?;
    let cur = store::get_transaction(conn, id)?;
    let prev_wallet = cur.wallet_id;
    let mut t = NewTransaction {
        amount: cur.amount,
        description: cur.description,
        date: cur.date,
        category_id: cur.category_id,
        wallet_id: cur.wallet_id,
        kind: cur.kind,
        notes: cur.notes,
        tags: cur.tags,
        receipt_path: cur.receipt_path,
        original_amount: cur.original_amount,
        original_currency: cur.original_currency,
    };
    if let Some(s) = sub.get_one::<String>("amount") {
        t.amount = parse_amount(s)?;
        t.original_amount = None;
        t.original_currency = None;
    }
    if let Some(s) = sub.get_one::<String>("description") {
        t.description = s.clone();
    }
    if let Some(s) = sub.get_one::<String>("category") {
        t.category_id = parse_id(s)?;
    }
    if let Some(s) = sub.get_one::<String>("wallet") {
        t.wallet_id = parse_id(s)?;
    }
    if let Some(s) = sub.get_one::<String>("type") {
        t.kind = s.parse::<TxKind>()?;
    }
    if let Some(s) = sub.get_one::<String>("date") {
        t.date = parse_date(s)?;
    }
    if sub.contains_id("notes") {
        t.notes = non_empty(sub.get_one::<String>("notes"));
    }
    if sub.contains_id("tags") {
        t.tags = non_empty(sub.get_one::<String>("tags"));
    }
    if sub.contains_id("receipt") {
        t.receipt_path = non_empty(sub.get_one::<String>("receipt"));
    }
    let currency = sub.get_one::<String>("currency").map(|s| s.as_str());

    let moved = t.wallet_id != prev_wallet;

    unit_of_work(conn, |uow| {
        let t = match currency {
            Some(_) => apply_entry_currency(uow, rates, t, currency, Utc::now())?,
            None if moved => reapply_entry_currency(uow, rates, t, Utc::now())?,
            None => t,
        };
        update_transaction(uow, id, &t)
    })?;
    println!("Updated transaction {}", id);
    Ok(())
}
