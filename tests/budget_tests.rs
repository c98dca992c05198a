// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use fintrack::commands::budgets::{self, AlertLevel, NewBudget};
use fintrack::commands::transactions::{self, NewTransaction};
use fintrack::db::{self, unit_of_work};
use fintrack::models::{BudgetPeriod, TxKind};
use fintrack::{LedgerError, store};
use rusqlite::{Connection, params};
use rust_decimal::Decimal;

const CASH: i64 = 1;
const FOOD: i64 = 1;
const TRANSPORT: i64 = 2;

fn setup() -> Connection {
    let mut conn = Connection::open_in_memory().unwrap();
    db::init_schema(&mut conn).unwrap();
    db::seed_defaults(&mut conn).unwrap();
    conn
}

fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

// Wednesday
fn today() -> NaiveDate {
    d("2025-08-20")
}

fn spend(conn: &mut Connection, amount: &str, category: i64, date: &str) {
    let t = NewTransaction::new(dec(amount), "Spend", d(date), category, CASH, TxKind::Expense);
    unit_of_work(conn, |uow| transactions::create_transaction(uow, &t)).unwrap();
}

fn budget(conn: &mut Connection, category: i64, amount: &str, period: &str) -> i64 {
    let nb = NewBudget {
        category_id: category,
        amount: dec(amount),
        period: BudgetPeriod::from(period.to_string()),
        notify_at_75: true,
        notify_at_90: true,
        notify_at_100: true,
    };
    unit_of_work(conn, |uow| budgets::create_budget(uow, &nb, today())).unwrap()
}

fn status(conn: &Connection, id: i64) -> budgets::BudgetStatus {
    let b = store::get_budget(conn, id).unwrap();
    budgets::evaluate(conn, &b, today()).unwrap()
}

#[test]
fn create_sets_window_end_from_period() {
    let mut conn = setup();
    let w = budget(&mut conn, FOOD, "100", "weekly");
    let m = budget(&mut conn, FOOD, "100", "monthly");
    let y = budget(&mut conn, FOOD, "100", "yearly");
    assert_eq!(store::get_budget(&conn, w).unwrap().end_date, Some(d("2025-08-27")));
    assert_eq!(store::get_budget(&conn, m).unwrap().end_date, Some(d("2025-09-19")));
    assert_eq!(store::get_budget(&conn, y).unwrap().end_date, Some(d("2026-08-20")));
    assert_eq!(store::get_budget(&conn, m).unwrap().start_date, today());
}

#[test]
fn create_rejects_bad_input() {
    let mut conn = setup();
    let mut nb = NewBudget {
        category_id: FOOD,
        amount: Decimal::ZERO,
        period: BudgetPeriod::Monthly,
        notify_at_75: true,
        notify_at_90: true,
        notify_at_100: true,
    };
    let err = unit_of_work(&mut conn, |uow| budgets::create_budget(uow, &nb, today())).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<LedgerError>(),
        Some(LedgerError::Validation(_))
    ));

    nb.amount = dec("50");
    nb.period = BudgetPeriod::from("fortnightly".to_string());
    assert!(unit_of_work(&mut conn, |uow| budgets::create_budget(uow, &nb, today())).is_err());

    nb.period = BudgetPeriod::Monthly;
    nb.category_id = 999;
    assert!(unit_of_work(&mut conn, |uow| budgets::create_budget(uow, &nb, today())).is_err());
    assert!(store::list_budgets(&conn, false).unwrap().is_empty());
}

#[test]
fn weekly_window_starts_monday() {
    let mut conn = setup();
    let id = budget(&mut conn, FOOD, "100", "weekly");
    spend(&mut conn, "30", FOOD, "2025-08-17"); // Sunday before
    spend(&mut conn, "40", FOOD, "2025-08-18"); // Monday
    spend(&mut conn, "35", FOOD, "2025-08-20");
    spend(&mut conn, "99", TRANSPORT, "2025-08-19");

    let s = status(&conn, id);
    assert_eq!(s.effective_start, d("2025-08-18"));
    assert_eq!(s.spent, dec("75"));
    assert_eq!(s.remaining, dec("25"));
    assert_eq!(s.percentage, dec("75"));
    assert_eq!(s.alert, Some(AlertLevel::SeventyFive));
}

#[test]
fn monthly_and_yearly_windows_follow_calendar() {
    let mut conn = setup();
    let m = budget(&mut conn, FOOD, "200", "monthly");
    let y = budget(&mut conn, FOOD, "1000", "yearly");
    spend(&mut conn, "50", FOOD, "2024-12-31");
    spend(&mut conn, "70", FOOD, "2025-07-31");
    spend(&mut conn, "90", FOOD, "2025-08-01");

    let sm = status(&conn, m);
    assert_eq!(sm.effective_start, d("2025-08-01"));
    assert_eq!(sm.spent, dec("90"));
    assert_eq!(sm.alert, None);

    let sy = status(&conn, y);
    assert_eq!(sy.effective_start, d("2025-01-01"));
    assert_eq!(sy.spent, dec("160"));
}

#[test]
fn only_this_months_spending_counts() {
    let mut conn = setup();
    let id = budget(&mut conn, FOOD, "1000", "monthly");
    spend(&mut conn, "300", FOOD, "2025-07-15");
    spend(&mut conn, "400", FOOD, "2025-08-05");
    let s = status(&conn, id);
    assert_eq!(s.spent, dec("400"));
    assert_eq!(s.percentage, dec("40.0"));
    assert_eq!(s.remaining, dec("600"));
    assert_eq!(s.alert, None);
}

#[test]
fn income_does_not_count_as_spending() {
    let mut conn = setup();
    let id = budget(&mut conn, FOOD, "100", "monthly");
    let t = NewTransaction::new(dec("500"), "Refund", d("2025-08-10"), FOOD, CASH, TxKind::Income);
    unit_of_work(&mut conn, |uow| transactions::create_transaction(uow, &t)).unwrap();
    assert_eq!(status(&conn, id).spent, Decimal::ZERO);
}

#[test]
fn overspent_budget_is_exceeded_and_width_capped() {
    let mut conn = setup();
    let id = budget(&mut conn, FOOD, "100", "monthly");
    spend(&mut conn, "150", FOOD, "2025-08-05");
    let s = status(&conn, id);
    assert_eq!(s.percentage, dec("150"));
    assert_eq!(s.width_percentage, dec("100"));
    assert_eq!(s.remaining, dec("-50"));
    assert_eq!(s.alert, Some(AlertLevel::Exceeded));
}

#[test]
fn ninety_percent_threshold() {
    let mut conn = setup();
    let id = budget(&mut conn, FOOD, "100", "monthly");
    spend(&mut conn, "90", FOOD, "2025-08-05");
    assert_eq!(status(&conn, id).alert, Some(AlertLevel::Ninety));
}

#[test]
fn zero_amount_budget_reports_zero_percent() {
    let mut conn = setup();
    conn.execute(
        "INSERT INTO budgets(category_id, amount, period, start_date) VALUES (?1, '0', 'monthly', ?2)",
        params![FOOD, today()],
    )
    .unwrap();
    spend(&mut conn, "10", FOOD, "2025-08-05");
    let b = store::list_budgets(&conn, true).unwrap();
    assert_eq!(b.len(), 1);
    let s = budgets::evaluate(&conn, &b[0], today()).unwrap();
    assert_eq!(s.spent, dec("10"));
    assert_eq!(s.percentage, Decimal::ZERO);
    assert_eq!(s.alert, None);
}

#[test]
fn unknown_period_uses_stored_start() {
    let mut conn = setup();
    conn.execute(
        "INSERT INTO budgets(category_id, amount, period, start_date) VALUES (?1, '100', 'fortnightly', '2025-08-10')",
        params![FOOD],
    )
    .unwrap();
    spend(&mut conn, "20", FOOD, "2025-08-09");
    spend(&mut conn, "30", FOOD, "2025-08-10");
    let all = store::list_budgets(&conn, true).unwrap();
    assert_eq!(all[0].period, BudgetPeriod::Other("fortnightly".into()));
    let s = budgets::evaluate(&conn, &all[0], today()).unwrap();
    assert_eq!(s.effective_start, d("2025-08-10"));
    assert_eq!(s.spent, dec("30"));
}

#[test]
fn alerts_respect_notification_flags_and_active_state() {
    let mut conn = setup();
    let food = budget(&mut conn, FOOD, "100", "monthly");
    let transport = budget(&mut conn, TRANSPORT, "100", "monthly");
    spend(&mut conn, "80", FOOD, "2025-08-05");
    spend(&mut conn, "80", TRANSPORT, "2025-08-05");

    let alerts = budgets::budget_alerts(&conn, today()).unwrap();
    assert_eq!(alerts.len(), 2);

    conn.execute(
        "UPDATE budgets SET notify_at_75=0 WHERE id=?1",
        params![transport],
    )
    .unwrap();
    let alerts = budgets::budget_alerts(&conn, today()).unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].budget.id, food);
    // still evaluated, only the notification is muted
    assert_eq!(budgets::evaluate_active(&conn, today()).unwrap().len(), 2);

    let active = unit_of_work(&mut conn, |uow| budgets::toggle_active(uow, food)).unwrap();
    assert!(!active);
    assert!(budgets::budget_alerts(&conn, today()).unwrap().is_empty());
    assert_eq!(store::list_budgets(&conn, true).unwrap().len(), 1);
    assert_eq!(store::list_budgets(&conn, false).unwrap().len(), 2);
}

#[test]
fn delete_missing_budget_is_not_found() {
    let mut conn = setup();
    let err = unit_of_work(&mut conn, |uow| budgets::delete_budget(uow, 42)).unwrap_err();
    assert_eq!(
        err.downcast_ref::<LedgerError>(),
        Some(&LedgerError::NotFound {
            entity: "budget",
            id: 42
        })
    );
}
