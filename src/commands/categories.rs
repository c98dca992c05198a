// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::db::{UnitOfWork, unit_of_work};
use crate::error::LedgerError;
use crate::models::is_reserved_category;
use crate::store;
use crate::utils::{maybe_print_json, parse_id, pretty_table};
use anyhow::Result;
use rusqlite::{Connection, params};
use tracing::info;

/// Adds a user category.
pub fn create_category(uow: &UnitOfWork<'_>, name: &str) -> Result<i64> {
    let name = name.trim();
    if name.is_empty() {
        return Err(LedgerError::validation("category name is required").into());
    }
    if is_reserved_category(name) {
        return Err(LedgerError::refused(format!("category name '{}' is reserved", name)).into());
    }
    if store::category_by_name(uow, name)?.is_some() {
        return Err(LedgerError::validation(format!("category '{}' already exists", name)).into());
    }
    uow.execute(
        "INSERT INTO categories(name, is_custom) VALUES (?1, 1)",
        params![name],
    )?;
    Ok(uow.last_insert_rowid())
}

/// Deletes a custom category together with its budgets. Seeded categories
/// and categories still used by transactions or templates are kept.
pub fn delete_category(uow: &UnitOfWork<'_>, id: i64) -> Result<()> {
    let c = store::get_category(uow, id)?;
    if !c.is_custom {
        return Err(LedgerError::refused(format!("cannot delete default category '{}'", c.name)).into());
    }
    let used: i64 = uow.query_row(
        "SELECT (SELECT COUNT(*) FROM transactions WHERE category_id=?1)
              + (SELECT COUNT(*) FROM recurring_transactions WHERE category_id=?1)",
        params![id],
        |r| r.get(0),
    )?;
    if used > 0 {
        return Err(LedgerError::refused(format!(
            "cannot delete category '{}': still used by {} transaction(s) or template(s)",
            c.name, used
        ))
        .into());
    }
    let budgets = uow.execute("DELETE FROM budgets WHERE category_id=?1", params![id])?;
    uow.execute("DELETE FROM categories WHERE id=?1", params![id])?;
    info!(id, budgets, "category deleted");
    Ok(())
}

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let name = sub.get_one::<String>("name").unwrap();
            let id = unit_of_work(conn, |uow| create_category(uow, name))?;
            println!("Added category '{}' (id {})", name.trim(), id);
        }
        Some(("list", sub)) => {
            let cats = store::list_categories(conn)?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &cats)? {
                let data = cats
                    .iter()
                    .map(|c| {
                        vec![
                            c.id.to_string(),
                            c.name.clone(),
                            if c.is_custom { "custom" } else { "default" }.to_string(),
                        ]
                    })
                    .collect();
                println!("{}", pretty_table(&["ID", "Category", "Kind"], data));
            }
        }
        Some(("rm", sub)) => {
            let id = parse_id(sub.get_one::<String>("id").unwrap())?;
            unit_of_work(conn, |uow| delete_category(uow, id))?;
            println!("Removed category {}", id);
        }
        _ => {}
    }
    Ok(())
}
