// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Project budgeting: itemized plans with partial payments per item.
//!
//! Projects are planning records only. Completing an item or marking a
//! payment paid never touches a wallet balance; spending that actually
//! happens is recorded as a regular transaction.

use crate::db::{UnitOfWork, unit_of_work};
use crate::error::LedgerError;
use crate::models::{FundingSource, Project, ProjectItem, ProjectItemPayment, TxKind};
use crate::store;
use crate::utils::{
    ensure_positive, maybe_print_json, non_empty, parse_amount, parse_decimal, parse_id,
    pretty_table,
};
use anyhow::Result;
use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, params};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone)]
pub struct NewProject {
    pub name: String,
    pub description: Option<String>,
    pub funding: FundingSource,
}

pub fn create_project(uow: &UnitOfWork<'_>, p: &NewProject, today: NaiveDate) -> Result<i64> {
    let name = p.name.trim();
    if name.is_empty() {
        return Err(LedgerError::validation("project name is required").into());
    }
    let (wallet_id, external) = match &p.funding {
        FundingSource::Wallet(id) => (Some(store::get_wallet(uow, *id)?.id), None),
        FundingSource::External(src) => {
            let src = src.trim();
            if src.is_empty() {
                return Err(LedgerError::validation("funding source is required").into());
            }
            (None, Some(src.to_string()))
        }
    };
    uow.execute(
        "INSERT INTO projects(name, description, wallet_id, external_source, created_date)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![name, p.description, wallet_id, external, today],
    )?;
    let id = uow.last_insert_rowid();
    info!(id, name, "project created");
    Ok(id)
}

pub fn toggle_project(uow: &UnitOfWork<'_>, id: i64) -> Result<bool> {
    let p = store::get_project(uow, id)?;
    let done = !p.is_completed;
    uow.execute(
        "UPDATE projects SET is_completed=?1 WHERE id=?2",
        params![done, id],
    )?;
    Ok(done)
}

/// Deletes a project with all of its items and their payments.
pub fn delete_project(uow: &UnitOfWork<'_>, id: i64) -> Result<()> {
    store::get_project(uow, id)?;
    let payments = uow.execute(
        "DELETE FROM project_item_payments
         WHERE item_id IN (SELECT id FROM project_items WHERE project_id=?1)",
        params![id],
    )?;
    let items = uow.execute("DELETE FROM project_items WHERE project_id=?1", params![id])?;
    uow.execute("DELETE FROM projects WHERE id=?1", params![id])?;
    info!(id, items, payments, "project deleted");
    Ok(())
}

#[derive(Debug, Clone)]
pub struct NewItem {
    pub name: String,
    pub description: Option<String>,
    pub cost: Decimal,
    pub item_type: TxKind,
}

fn validate_item(item: &NewItem) -> Result<()> {
    if item.name.trim().is_empty() {
        return Err(LedgerError::validation("item name is required").into());
    }
    if item.cost < Decimal::ZERO {
        return Err(LedgerError::validation("item cost cannot be negative").into());
    }
    Ok(())
}

pub fn add_item(uow: &UnitOfWork<'_>, project_id: i64, item: &NewItem) -> Result<i64> {
    validate_item(item)?;
    store::get_project(uow, project_id)?;
    uow.execute(
        "INSERT INTO project_items(project_id, name, description, cost, item_type)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            project_id,
            item.name.trim(),
            item.description,
            item.cost.to_string(),
            item.item_type.as_str()
        ],
    )?;
    Ok(uow.last_insert_rowid())
}

pub fn update_item(
    uow: &UnitOfWork<'_>,
    project_id: i64,
    item_id: i64,
    item: &NewItem,
) -> Result<()> {
    validate_item(item)?;
    store::get_item(uow, project_id, item_id)?;
    uow.execute(
        "UPDATE project_items SET name=?1, description=?2, cost=?3, item_type=?4 WHERE id=?5",
        params![
            item.name.trim(),
            item.description,
            item.cost.to_string(),
            item.item_type.as_str(),
            item_id
        ],
    )?;
    Ok(())
}

pub fn delete_item(uow: &UnitOfWork<'_>, project_id: i64, item_id: i64) -> Result<()> {
    store::get_item(uow, project_id, item_id)?;
    uow.execute(
        "DELETE FROM project_item_payments WHERE item_id=?1",
        params![item_id],
    )?;
    uow.execute("DELETE FROM project_items WHERE id=?1", params![item_id])?;
    Ok(())
}

pub fn toggle_item(uow: &UnitOfWork<'_>, project_id: i64, item_id: i64) -> Result<bool> {
    let item = store::get_item(uow, project_id, item_id)?;
    let done = !item.is_completed;
    uow.execute(
        "UPDATE project_items SET is_completed=?1 WHERE id=?2",
        params![done, item_id],
    )?;
    Ok(done)
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub amount: Decimal,
    pub description: Option<String>,
    pub is_paid: bool,
}

pub fn add_payment(
    uow: &UnitOfWork<'_>,
    project_id: i64,
    item_id: i64,
    p: &NewPayment,
    today: NaiveDate,
) -> Result<i64> {
    ensure_positive(p.amount, "payment amount")?;
    store::get_item(uow, project_id, item_id)?;
    let paid_on = p.is_paid.then_some(today);
    uow.execute(
        "INSERT INTO project_item_payments(item_id, amount, description, is_paid, payment_date)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![item_id, p.amount.to_string(), p.description, p.is_paid, paid_on],
    )?;
    Ok(uow.last_insert_rowid())
}

/// Flips the paid flag. Marking paid stamps `today` as the payment date;
/// unmarking clears it.
pub fn toggle_payment(
    uow: &UnitOfWork<'_>,
    project_id: i64,
    item_id: i64,
    payment_id: i64,
    today: NaiveDate,
) -> Result<bool> {
    store::get_item(uow, project_id, item_id)?;
    let p = store::get_payment(uow, item_id, payment_id)?;
    let paid = !p.is_paid;
    uow.execute(
        "UPDATE project_item_payments SET is_paid=?1, payment_date=?2 WHERE id=?3",
        params![paid, paid.then_some(today), payment_id],
    )?;
    Ok(paid)
}

pub fn delete_payment(
    uow: &UnitOfWork<'_>,
    project_id: i64,
    item_id: i64,
    payment_id: i64,
) -> Result<()> {
    store::get_item(uow, project_id, item_id)?;
    store::get_payment(uow, item_id, payment_id)?;
    uow.execute(
        "DELETE FROM project_item_payments WHERE id=?1",
        params![payment_id],
    )?;
    Ok(())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProjectStats {
    pub total_cost: Decimal,
    pub total_income: Decimal,
    pub expense_completed: Decimal,
    pub expense_pending: Decimal,
}

/// Totals over a project's items. Cost counts expense items only; income
/// counts completed income items only.
pub fn project_stats(items: &[ProjectItem]) -> ProjectStats {
    let mut s = ProjectStats::default();
    for item in items {
        match (item.item_type, item.is_completed) {
            (TxKind::Expense, true) => {
                s.total_cost += item.cost;
                s.expense_completed += item.cost;
            }
            (TxKind::Expense, false) => {
                s.total_cost += item.cost;
                s.expense_pending += item.cost;
            }
            (TxKind::Income, true) => s.total_income += item.cost,
            (TxKind::Income, false) => {}
        }
    }
    s
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemDetail {
    pub item: ProjectItem,
    pub total_paid: Decimal,
    pub remaining: Decimal,
    pub payments: Vec<ProjectItemPayment>,
}

pub fn item_detail(conn: &Connection, item: ProjectItem) -> Result<ItemDetail> {
    let payments = store::payments_for_item(conn, item.id)?;
    let total_paid: Decimal = payments.iter().filter(|p| p.is_paid).map(|p| p.amount).sum();
    Ok(ItemDetail {
        remaining: item.cost - total_paid,
        item,
        total_paid,
        payments,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectDetail {
    pub project: Project,
    pub stats: ProjectStats,
    pub items: Vec<ItemDetail>,
}

pub fn project_detail(conn: &Connection, id: i64) -> Result<ProjectDetail> {
    let project = store::get_project(conn, id)?;
    let items = store::items_for_project(conn, id)?;
    let stats = project_stats(&items);
    let items = items
        .into_iter()
        .map(|i| item_detail(conn, i))
        .collect::<Result<Vec<_>>>()?;
    Ok(ProjectDetail {
        project,
        stats,
        items,
    })
}

fn funding_label(f: &FundingSource) -> String {
    match f {
        FundingSource::Wallet(id) => format!("wallet {}", id),
        FundingSource::External(s) => s.clone(),
    }
}

fn item_from_matches(sub: &clap::ArgMatches) -> Result<NewItem> {
    Ok(NewItem {
        name: sub.get_one::<String>("name").unwrap().clone(),
        description: non_empty(sub.get_one::<String>("description")),
        cost: match sub.get_one::<String>("cost") {
            Some(s) => parse_decimal(s)?,
            None => Decimal::ZERO,
        },
        item_type: match sub.get_one::<String>("type") {
            Some(s) => s.parse()?,
            None => TxKind::Expense,
        },
    })
}

fn ids(sub: &clap::ArgMatches, names: &[&str]) -> Result<Vec<i64>> {
    names
        .iter()
        .map(|n| parse_id(sub.get_one::<String>(n).unwrap()))
        .collect()
}

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    let today = Utc::now().date_naive();
    match m.subcommand() {
        Some(("add", sub)) => {
            let funding = match sub.get_one::<String>("wallet") {
                Some(w) => FundingSource::Wallet(parse_id(w)?),
                None => FundingSource::External(
                    sub.get_one::<String>("source").cloned().unwrap_or_default(),
                ),
            };
            let p = NewProject {
                name: sub.get_one::<String>("name").unwrap().clone(),
                description: non_empty(sub.get_one::<String>("description")),
                funding,
            };
            let id = unit_of_work(conn, |uow| create_project(uow, &p, today))?;
            println!("Created project '{}' (id {})", p.name.trim(), id);
        }
        Some(("list", sub)) => {
            let projects = store::list_projects(conn)?;
            let mut rows = Vec::new();
            for p in projects {
                let stats = project_stats(&store::items_for_project(conn, p.id)?);
                rows.push((p, stats));
            }
            let json_rows: Vec<_> = rows
                .iter()
                .map(|(p, s)| serde_json::json!({ "project": p, "stats": s }))
                .collect();
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &json_rows)? {
                let data = rows
                    .iter()
                    .map(|(p, s)| {
                        vec![
                            p.id.to_string(),
                            p.name.clone(),
                            funding_label(&p.funding),
                            format!("{:.2}", s.total_cost),
                            format!("{:.2}", s.total_income),
                            if p.is_completed { "done" } else { "open" }.to_string(),
                        ]
                    })
                    .collect();
                println!(
                    "{}",
                    pretty_table(&["ID", "Project", "Funding", "Cost", "Income", "Status"], data)
                );
            }
        }
        Some(("show", sub)) => {
            let d = project_detail(conn, parse_id(sub.get_one::<String>("id").unwrap())?)?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &d)? {
                println!(
                    "{} ({}): cost {:.2}, income {:.2}, done {:.2}, pending {:.2}",
                    d.project.name,
                    funding_label(&d.project.funding),
                    d.stats.total_cost,
                    d.stats.total_income,
                    d.stats.expense_completed,
                    d.stats.expense_pending
                );
                let data = d
                    .items
                    .iter()
                    .map(|i| {
                        vec![
                            i.item.id.to_string(),
                            i.item.name.clone(),
                            i.item.item_type.to_string(),
                            format!("{:.2}", i.item.cost),
                            format!("{:.2}", i.total_paid),
                            format!("{:.2}", i.remaining),
                            if i.item.is_completed { "x" } else { "" }.to_string(),
                        ]
                    })
                    .collect();
                println!(
                    "{}",
                    pretty_table(&["ID", "Item", "Type", "Cost", "Paid", "Remaining", "Done"], data)
                );
            }
        }
        Some(("toggle", sub)) => {
            let id = parse_id(sub.get_one::<String>("id").unwrap())?;
            let done = unit_of_work(conn, |uow| toggle_project(uow, id))?;
            println!("Project {} completed: {}", id, done);
        }
        Some(("rm", sub)) => {
            let id = parse_id(sub.get_one::<String>("id").unwrap())?;
            unit_of_work(conn, |uow| delete_project(uow, id))?;
            println!("Deleted project {}", id);
        }
        Some(("item", sub)) => handle_item(conn, sub)?,
        Some(("payment", sub)) => handle_payment(conn, sub, today)?,
        _ => {}
    }
    Ok(())
}

fn handle_item(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let project_id = parse_id(sub.get_one::<String>("project").unwrap())?;
            let item = item_from_matches(sub)?;
            let id = unit_of_work(conn, |uow| add_item(uow, project_id, &item))?;
            println!("Added item {} to project {}", id, project_id);
        }
        Some(("edit", sub)) => {
            let v = ids(sub, &["project", "item"])?;
            let cur = store::get_item(conn, v[0], v[1])?;
            let item = NewItem {
                name: sub.get_one::<String>("name").cloned().unwrap_or(cur.name),
                description: non_empty(sub.get_one::<String>("description")).or(cur.description),
                cost: match sub.get_one::<String>("cost") {
                    Some(s) => parse_decimal(s)?,
                    None => cur.cost,
                },
                item_type: match sub.get_one::<String>("type") {
                    Some(s) => s.parse()?,
                    None => cur.item_type,
                },
            };
            unit_of_work(conn, |uow| update_item(uow, v[0], v[1], &item))?;
            println!("Updated item {}", v[1]);
        }
        Some(("toggle", sub)) => {
            let v = ids(sub, &["project", "item"])?;
            let done = unit_of_work(conn, |uow| toggle_item(uow, v[0], v[1]))?;
            println!("Item {} completed: {}", v[1], done);
        }
        Some(("rm", sub)) => {
            let v = ids(sub, &["project", "item"])?;
            unit_of_work(conn, |uow| delete_item(uow, v[0], v[1]))?;
            println!("Deleted item {}", v[1]);
        }
        _ => {}
    }
    Ok(())
}

fn handle_payment(conn: &mut Connection, m: &clap::ArgMatches, today: NaiveDate) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let v = ids(sub, &["project", "item"])?;
            let p = NewPayment {
                amount: parse_amount(sub.get_one::<String>("amount").unwrap())?,
                description: non_empty(sub.get_one::<String>("description")),
                is_paid: sub.get_flag("paid"),
            };
            let id = unit_of_work(conn, |uow| add_payment(uow, v[0], v[1], &p, today))?;
            println!("Added payment {} to item {}", id, v[1]);
        }
        Some(("toggle", sub)) => {
            let v = ids(sub, &["project", "item", "payment"])?;
            let paid = unit_of_work(conn, |uow| toggle_payment(uow, v[0], v[1], v[2], today))?;
            println!("Payment {} paid: {}", v[2], paid);
        }
        Some(("rm", sub)) => {
            let v = ids(sub, &["project", "item", "payment"])?;
            unit_of_work(conn, |uow| delete_payment(uow, v[0], v[1], v[2]))?;
            println!("Deleted payment {}", v[2]);
        }
        _ => {}
    }
    Ok(())
}
