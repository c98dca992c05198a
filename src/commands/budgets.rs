// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::db::{UnitOfWork, unit_of_work};
use crate::error::LedgerError;
use crate::models::{Budget, BudgetPeriod};
use crate::store;
use crate::utils::{ensure_positive, maybe_print_json, parse_amount, parse_id, pretty_table};
use anyhow::Result;
use chrono::{Datelike, Days, NaiveDate, Utc};
use rusqlite::{Connection, params};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum AlertLevel {
    #[serde(rename = "75")]
    SeventyFive,
    #[serde(rename = "90")]
    Ninety,
    #[serde(rename = "exceeded")]
    Exceeded,
}

impl AlertLevel {
    pub fn label(&self) -> &'static str {
        match self {
            AlertLevel::SeventyFive => "75",
            AlertLevel::Ninety => "90",
            AlertLevel::Exceeded => "exceeded",
        }
    }
}

/// Highest threshold reached by `percentage`, if any.
pub fn alert_level(percentage: Decimal) -> Option<AlertLevel> {
    if percentage >= Decimal::ONE_HUNDRED {
        Some(AlertLevel::Exceeded)
    } else if percentage >= Decimal::from(90) {
        Some(AlertLevel::Ninety)
    } else if percentage >= Decimal::from(75) {
        Some(AlertLevel::SeventyFive)
    } else {
        None
    }
}

/// First day of the window a budget is measured over. Rolling periods always
/// track the current calendar week (from Monday), month or year; only an
/// unrecognized period falls back to the stored start date.
pub fn effective_start(budget: &Budget, today: NaiveDate) -> NaiveDate {
    match budget.period {
        BudgetPeriod::Weekly => {
            today - Days::new(u64::from(today.weekday().num_days_from_monday()))
        }
        BudgetPeriod::Monthly => today - Days::new(u64::from(today.day0())),
        BudgetPeriod::Yearly => today - Days::new(u64::from(today.ordinal0())),
        BudgetPeriod::Other(_) => budget.start_date,
    }
}

pub fn spent_since(conn: &Connection, category_id: i64, since: NaiveDate) -> Result<Decimal> {
    store::sum_decimal(
        conn,
        "SELECT amount FROM transactions WHERE category_id=?1 AND kind='expense' AND date>=?2",
        params![category_id, since],
    )
}

#[derive(Debug, Clone, Serialize)]
pub struct BudgetStatus {
    pub budget: Budget,
    pub category: String,
    pub effective_start: NaiveDate,
    pub spent: Decimal,
    pub remaining: Decimal,
    pub percentage: Decimal,
    pub width_percentage: Decimal,
    pub alert: Option<AlertLevel>,
}

impl BudgetStatus {
    /// Whether the budget's notification settings ask for this alert.
    pub fn notifies(&self) -> bool {
        match self.alert {
            Some(AlertLevel::Exceeded) => self.budget.notify_at_100,
            Some(AlertLevel::Ninety) => self.budget.notify_at_90,
            Some(AlertLevel::SeventyFive) => self.budget.notify_at_75,
            None => false,
        }
    }
}

pub fn evaluate(conn: &Connection, budget: &Budget, today: NaiveDate) -> Result<BudgetStatus> {
    let category = store::get_category(conn, budget.category_id)?;
    let start = effective_start(budget, today);
    let spent = spent_since(conn, budget.category_id, start)?;
    let percentage = if budget.amount > Decimal::ZERO {
        spent / budget.amount * Decimal::ONE_HUNDRED
    } else {
        Decimal::ZERO
    };
    debug!(budget = budget.id, %start, %spent, %percentage, "budget evaluated");
    Ok(BudgetStatus {
        budget: budget.clone(),
        category: category.name,
        effective_start: start,
        spent,
        remaining: budget.amount - spent,
        percentage,
        width_percentage: percentage.min(Decimal::ONE_HUNDRED),
        alert: alert_level(percentage),
    })
}

pub fn evaluate_active(conn: &Connection, today: NaiveDate) -> Result<Vec<BudgetStatus>> {
    store::list_budgets(conn, true)?
        .iter()
        .map(|b| evaluate(conn, b, today))
        .collect()
}

/// Active budgets past a threshold whose notification for it is enabled.
pub fn budget_alerts(conn: &Connection, today: NaiveDate) -> Result<Vec<BudgetStatus>> {
    Ok(evaluate_active(conn, today)?
        .into_iter()
        .filter(|s| s.notifies())
        .collect())
}

#[derive(Debug, Clone)]
pub struct NewBudget {
    pub category_id: i64,
    pub amount: Decimal,
    pub period: BudgetPeriod,
    pub notify_at_75: bool,
    pub notify_at_90: bool,
    pub notify_at_100: bool,
}

pub fn create_budget(uow: &UnitOfWork<'_>, nb: &NewBudget, today: NaiveDate) -> Result<i64> {
    ensure_positive(nb.amount, "budget amount")?;
    let days = match nb.period {
        BudgetPeriod::Weekly => 7,
        BudgetPeriod::Monthly => 30,
        BudgetPeriod::Yearly => 365,
        BudgetPeriod::Other(ref p) => {
            return Err(LedgerError::validation(format!(
                "unknown budget period '{}' (use weekly|monthly|yearly)",
                p
            ))
            .into());
        }
    };
    store::get_category(uow, nb.category_id)?;
    let end = today + Days::new(days);
    uow.execute(
        "INSERT INTO budgets(category_id, amount, period, start_date, end_date,
             notify_at_75, notify_at_90, notify_at_100, is_active)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1)",
        params![
            nb.category_id,
            nb.amount.to_string(),
            nb.period.as_str(),
            today,
            end,
            nb.notify_at_75,
            nb.notify_at_90,
            nb.notify_at_100
        ],
    )?;
    let id = uow.last_insert_rowid();
    info!(id, category = nb.category_id, amount = %nb.amount, period = nb.period.as_str(), "budget created");
    Ok(id)
}

pub fn delete_budget(uow: &UnitOfWork<'_>, id: i64) -> Result<()> {
    store::get_budget(uow, id)?;
    uow.execute("DELETE FROM budgets WHERE id=?1", params![id])?;
    Ok(())
}

/// Flips the active flag and returns the new value.
pub fn toggle_active(uow: &UnitOfWork<'_>, id: i64) -> Result<bool> {
    let b = store::get_budget(uow, id)?;
    let active = !b.is_active;
    uow.execute(
        "UPDATE budgets SET is_active=?1 WHERE id=?2",
        params![active, id],
    )?;
    Ok(active)
}

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let nb = NewBudget {
                category_id: parse_id(sub.get_one::<String>("category").unwrap())?,
                amount: parse_amount(sub.get_one::<String>("amount").unwrap())?,
                period: BudgetPeriod::from(sub.get_one::<String>("period").unwrap().to_lowercase()),
                notify_at_75: !sub.get_flag("no_notify_75"),
                notify_at_90: !sub.get_flag("no_notify_90"),
                notify_at_100: !sub.get_flag("no_notify_100"),
            };
            let today = Utc::now().date_naive();
            let id = unit_of_work(conn, |uow| create_budget(uow, &nb, today))?;
            println!("Budget {} set: {} {}", id, nb.period.as_str(), nb.amount);
        }
        Some(("list", sub)) => list(conn, sub, false)?,
        Some(("alerts", sub)) => list(conn, sub, true)?,
        Some(("rm", sub)) => {
            let id = parse_id(sub.get_one::<String>("id").unwrap())?;
            unit_of_work(conn, |uow| delete_budget(uow, id))?;
            println!("Deleted budget {}", id);
        }
        Some(("toggle", sub)) => {
            let id = parse_id(sub.get_one::<String>("id").unwrap())?;
            let active = unit_of_work(conn, |uow| toggle_active(uow, id))?;
            println!(
                "Budget {} is now {}",
                id,
                if active { "active" } else { "inactive" }
            );
        }
        _ => {}
    }
    Ok(())
}

fn list(conn: &Connection, sub: &clap::ArgMatches, alerts_only: bool) -> Result<()> {
    let today = Utc::now().date_naive();
    let statuses = if alerts_only {
        budget_alerts(conn, today)?
    } else {
        evaluate_active(conn, today)?
    };
    if maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &statuses)? {
        return Ok(());
    }
    let data = statuses
        .iter()
        .map(|s| {
            vec![
                s.budget.id.to_string(),
                s.category.clone(),
                s.budget.period.as_str().to_string(),
                s.effective_start.to_string(),
                format!("{:.2}", s.budget.amount),
                format!("{:.2}", s.spent),
                format!("{:.2}", s.remaining),
                format!("{:.1}%", s.percentage),
                s.alert.map(|a| a.label().to_string()).unwrap_or_default(),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(
            &["ID", "Category", "Period", "Since", "Budget", "Spent", "Remaining", "Used", "Alert"],
            data
        )
    );
    Ok(())
}
