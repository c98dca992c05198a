// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::budgets::{self, BudgetStatus};
use crate::commands::fx::{self, RateProvider};
use crate::commands::summaries::MIN_SUMMARY_YEAR;
use crate::commands::transactions::{self, TransactionFilter, TransactionRow};
use crate::error::LedgerError;
use crate::models::TRANSFER_CATEGORY;
use crate::store::{self, dec};
use crate::utils::{fmt_money, get_base_currency, maybe_print_json, pretty_table};
use anyhow::Result;
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use rusqlite::{Connection, Params, params};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::str::FromStr;

/// All-time totals. Transfers move money between wallets and are left out.
#[derive(Debug, Clone, Serialize)]
pub struct Totals {
    pub income: Decimal,
    pub expense: Decimal,
    pub net: Decimal,
}

pub fn totals(conn: &Connection) -> Result<Totals> {
    let sum_kind = |kind: &str| {
        store::sum_decimal(
            conn,
            "SELECT t.amount FROM transactions t JOIN categories c ON t.category_id=c.id
             WHERE t.kind=?1 AND c.name<>?2",
            params![kind, TRANSFER_CATEGORY],
        )
    };
    let income = sum_kind("income")?;
    let expense = sum_kind("expense")?;
    Ok(Totals {
        income,
        expense,
        net: income - expense,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryTotal {
    pub category: String,
    pub total: Decimal,
}

/// Expense totals per category since `since` (all time when `None`),
/// largest first.
pub fn category_totals(
    conn: &Connection,
    since: Option<NaiveDate>,
) -> Result<Vec<CategoryTotal>> {
    let mut stmt = conn.prepare_cached(
        "SELECT c.name, t.amount FROM transactions t JOIN categories c ON t.category_id=c.id
         WHERE t.kind='expense' AND c.name<>?1 AND (?2 IS NULL OR t.date>=?2)",
    )?;
    let mut rows = stmt.query(params![TRANSFER_CATEGORY, since])?;
    let mut agg: BTreeMap<String, Decimal> = BTreeMap::new();
    while let Some(r) = rows.next()? {
        let name: String = r.get(0)?;
        *agg.entry(name).or_insert(Decimal::ZERO) += dec(r, 1)?;
    }
    let mut items: Vec<CategoryTotal> = agg
        .into_iter()
        .map(|(category, total)| CategoryTotal { category, total })
        .collect();
    items.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.category.cmp(&b.category)));
    Ok(items)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportPeriod {
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl ReportPeriod {
    pub const ALL: [ReportPeriod; 4] = [
        ReportPeriod::Weekly,
        ReportPeriod::Monthly,
        ReportPeriod::Quarterly,
        ReportPeriod::Yearly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportPeriod::Weekly => "weekly",
            ReportPeriod::Monthly => "monthly",
            ReportPeriod::Quarterly => "quarterly",
            ReportPeriod::Yearly => "yearly",
        }
    }

    /// Weekly and quarterly look back 7 and 90 days; monthly and yearly start
    /// at the first day of the current month or year.
    pub fn since(&self, today: NaiveDate) -> NaiveDate {
        match self {
            ReportPeriod::Weekly => today - Duration::days(7),
            ReportPeriod::Monthly => today - Duration::days(i64::from(today.day0())),
            ReportPeriod::Quarterly => today - Duration::days(90),
            ReportPeriod::Yearly => today - Duration::days(i64::from(today.ordinal0())),
        }
    }
}

impl FromStr for ReportPeriod {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "weekly" => Ok(ReportPeriod::Weekly),
            "monthly" => Ok(ReportPeriod::Monthly),
            "quarterly" => Ok(ReportPeriod::Quarterly),
            "yearly" => Ok(ReportPeriod::Yearly),
            other => Err(LedgerError::validation(format!(
                "unknown report period '{}' (use weekly|monthly|quarterly|yearly)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PeriodReport {
    pub period: &'static str,
    pub since: NaiveDate,
    pub categories: Vec<CategoryTotal>,
    pub total: Decimal,
}

pub fn period_report(
    conn: &Connection,
    period: ReportPeriod,
    today: NaiveDate,
) -> Result<PeriodReport> {
    let since = period.since(today);
    let categories = category_totals(conn, Some(since))?;
    let total = categories.iter().map(|c| c.total).sum();
    Ok(PeriodReport {
        period: period.as_str(),
        since,
        categories,
        total,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct TrendBucket {
    pub label: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub expense: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct Analytics {
    pub categories: Vec<CategoryTotal>,
    pub trend: Vec<TrendBucket>,
}

pub const TREND_BUCKETS: i64 = 6;
pub const TREND_BUCKET_DAYS: i64 = 30;

/// Category breakdown plus six 30-day expense buckets, oldest first, the
/// last one ending today.
pub fn analytics(conn: &Connection, today: NaiveDate) -> Result<Analytics> {
    let mut trend = Vec::with_capacity(TREND_BUCKETS as usize);
    for i in (0..TREND_BUCKETS).rev() {
        let end = today - Duration::days(TREND_BUCKET_DAYS * i);
        let start = end - Duration::days(TREND_BUCKET_DAYS - 1);
        let expense = store::sum_decimal(
            conn,
            "SELECT t.amount FROM transactions t JOIN categories c ON t.category_id=c.id
             WHERE t.kind='expense' AND c.name<>?1 AND t.date>=?2 AND t.date<=?3",
            params![TRANSFER_CATEGORY, start, end],
        )?;
        trend.push(TrendBucket {
            label: end.format("%b").to_string(),
            start,
            end,
            expense,
        });
    }
    Ok(Analytics {
        categories: category_totals(conn, None)?,
        trend,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Live,
    Summary,
    #[serde(rename = "none")]
    NoData,
}

#[derive(Debug, Clone, Serialize)]
pub struct OverviewRow {
    pub year: i32,
    pub month: Option<u32>,
    pub income: Decimal,
    pub expense: Decimal,
    pub net: Decimal,
    pub source: Source,
}

impl OverviewRow {
    fn new(year: i32, month: Option<u32>, totals: Pair, source: Source) -> Self {
        let (income, expense) = totals.unwrap_or((Decimal::ZERO, Decimal::ZERO));
        Self {
            year,
            month,
            income,
            expense,
            net: income - expense,
            source,
        }
    }
}

/// Income and expense of non-transfer transactions dated in `[from, until)`,
/// or `None` when there are none.
fn live_totals(
    conn: &Connection,
    from: NaiveDate,
    until: NaiveDate,
) -> Result<Option<(Decimal, Decimal)>> {
    let mut stmt = conn.prepare_cached(
        "SELECT t.kind, t.amount FROM transactions t JOIN categories c ON t.category_id=c.id
         WHERE c.name<>?1 AND t.date>=?2 AND t.date<?3",
    )?;
    let mut rows = stmt.query(params![TRANSFER_CATEGORY, from, until])?;
    let mut seen = false;
    let (mut income, mut expense) = (Decimal::ZERO, Decimal::ZERO);
    while let Some(r) = rows.next()? {
        seen = true;
        let kind: String = r.get(0)?;
        if kind == "income" {
            income += dec(r, 1)?;
        } else {
            expense += dec(r, 1)?;
        }
    }
    Ok(seen.then_some((income, expense)))
}

fn summary_totals<P: Params>(
    conn: &Connection,
    sql: &str,
    p: P,
) -> Result<Option<(Decimal, Decimal)>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let mut rows = stmt.query(p)?;
    let mut seen = false;
    let (mut income, mut expense) = (Decimal::ZERO, Decimal::ZERO);
    while let Some(r) = rows.next()? {
        seen = true;
        income += dec(r, 0)?;
        expense += dec(r, 1)?;
    }
    Ok(seen.then_some((income, expense)))
}

/// A yearly summary row wins; otherwise the year's monthly rows are added up.
fn year_summary(conn: &Connection, year: i32) -> Result<Option<(Decimal, Decimal)>> {
    if let Some(t) = summary_totals(
        conn,
        "SELECT total_income, total_expense FROM financial_summaries WHERE year=?1 AND month IS NULL",
        params![year],
    )? {
        return Ok(Some(t));
    }
    summary_totals(
        conn,
        "SELECT total_income, total_expense FROM financial_summaries WHERE year=?1 AND month IS NOT NULL",
        params![year],
    )
}

fn month_start(year: i32, month: u32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| LedgerError::validation(format!("invalid period {}-{:02}", year, month)).into())
}

type Pair = Option<(Decimal, Decimal)>;

fn blend(live: Pair, summary: impl FnOnce() -> Result<Pair>) -> Result<(Pair, Source)> {
    if live.is_some() {
        return Ok((live, Source::Live));
    }
    Ok(match summary()? {
        Some(t) => (Some(t), Source::Summary),
        None => (None, Source::NoData),
    })
}

/// One row per year from the earliest year holding transactions or summaries
/// through the current year. Live transactions take precedence over
/// summaries for the same year.
pub fn annual_overview(conn: &Connection, today: NaiveDate) -> Result<Vec<OverviewRow>> {
    let first_tx: Option<NaiveDate> =
        conn.query_row("SELECT MIN(date) FROM transactions", [], |r| r.get(0))?;
    let first_summary: Option<i32> = conn.query_row(
        "SELECT MIN(year) FROM financial_summaries WHERE year>=?1",
        params![MIN_SUMMARY_YEAR],
        |r| r.get(0),
    )?;
    let first = [first_tx.map(|d| d.year()), first_summary]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(today.year())
        .min(today.year());

    let mut out = Vec::new();
    for year in first..=today.year() {
        let live = live_totals(conn, month_start(year, 1)?, month_start(year + 1, 1)?)?;
        let (totals, source) = blend(live, || year_summary(conn, year))?;
        out.push(OverviewRow::new(year, None, totals, source));
    }
    Ok(out)
}

/// Twelve rows for `year`, blended like the annual overview.
pub fn monthly_overview(conn: &Connection, year: i32) -> Result<Vec<OverviewRow>> {
    let mut out = Vec::with_capacity(12);
    for month in 1..=12u32 {
        let from = month_start(year, month)?;
        let until = if month == 12 {
            month_start(year + 1, 1)?
        } else {
            month_start(year, month + 1)?
        };
        let live = live_totals(conn, from, until)?;
        let (totals, source) = blend(live, || {
            summary_totals(
                conn,
                "SELECT total_income, total_expense FROM financial_summaries WHERE year=?1 AND month=?2",
                params![year, month],
            )
        })?;
        out.push(OverviewRow::new(year, Some(month), totals, source));
    }
    Ok(out)
}

#[derive(Debug, Clone, Serialize)]
pub struct WalletBalance {
    pub id: i64,
    pub name: String,
    pub currency: String,
    pub balance: Decimal,
    pub base_balance: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct Balances {
    pub base_currency: String,
    pub wallets: Vec<WalletBalance>,
    pub total: Decimal,
}

pub fn balances(conn: &Connection, rates: &dyn RateProvider, now: DateTime<Utc>) -> Result<Balances> {
    let base = get_base_currency(conn)?;
    let mut wallets = Vec::new();
    let mut total = Decimal::ZERO;
    for w in store::list_wallets(conn)? {
        let base_balance = fx::convert(conn, rates, w.balance, &w.currency, &base, now)?;
        total += base_balance;
        wallets.push(WalletBalance {
            id: w.id,
            name: w.name,
            currency: w.currency,
            balance: w.balance,
            base_balance,
        });
    }
    Ok(Balances {
        base_currency: base,
        wallets,
        total,
    })
}

/// Outstanding creditor amounts in the base currency.
pub fn total_debt(conn: &Connection, rates: &dyn RateProvider, now: DateTime<Utc>) -> Result<Decimal> {
    let base = get_base_currency(conn)?;
    let mut total = Decimal::ZERO;
    for c in store::list_creditors(conn)? {
        total += fx::convert(conn, rates, c.amount, &c.currency, &base, now)?;
    }
    Ok(total)
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub balances: Balances,
    pub total_debt: Decimal,
    pub net_worth: Decimal,
    pub recent: Vec<TransactionRow>,
    pub totals: Totals,
    pub alerts: Vec<BudgetStatus>,
}

pub fn dashboard(conn: &Connection, rates: &dyn RateProvider, now: DateTime<Utc>) -> Result<Dashboard> {
    let balances = balances(conn, rates, now)?;
    let total_debt = total_debt(conn, rates, now)?;
    let recent = transactions::query_rows(
        conn,
        &TransactionFilter {
            limit: Some(5),
            ..Default::default()
        },
    )?;
    Ok(Dashboard {
        net_worth: balances.total - total_debt,
        balances,
        total_debt,
        recent,
        totals: totals(conn)?,
        alerts: budgets::budget_alerts(conn, now.date_naive())?,
    })
}

pub fn handle(conn: &Connection, rates: &dyn RateProvider, m: &clap::ArgMatches) -> Result<()> {
    let today = Utc::now().date_naive();
    match m.subcommand() {
        Some(("totals", sub)) => {
            let t = totals(conn)?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &t)? {
                print_totals(&t);
            }
        }
        Some(("period", sub)) => {
            let reports = match sub.get_one::<String>("period") {
                Some(p) => vec![period_report(conn, p.parse()?, today)?],
                None => ReportPeriod::ALL
                    .iter()
                    .map(|p| period_report(conn, *p, today))
                    .collect::<Result<Vec<_>>>()?,
            };
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &reports)? {
                for r in &reports {
                    println!("{} (since {}): total {:.2}", r.period, r.since, r.total);
                    print_categories(&r.categories);
                }
            }
        }
        Some(("analytics", sub)) => {
            let a = analytics(conn, today)?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &a)? {
                print_categories(&a.categories);
                let data = a
                    .trend
                    .iter()
                    .map(|b| {
                        vec![
                            b.label.clone(),
                            format!("{} .. {}", b.start, b.end),
                            format!("{:.2}", b.expense),
                        ]
                    })
                    .collect();
                println!("{}", pretty_table(&["Month", "Window", "Spent"], data));
            }
        }
        Some(("annual", sub)) => {
            let rows = annual_overview(conn, today)?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &rows)? {
                print_overview(&rows);
            }
        }
        Some(("monthly", sub)) => {
            let year = sub.get_one::<i32>("year").copied().unwrap_or(today.year());
            let rows = monthly_overview(conn, year)?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &rows)? {
                print_overview(&rows);
            }
        }
        Some(("balances", sub)) => {
            let b = balances(conn, rates, Utc::now())?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &b)? {
                print_balances(&b);
            }
        }
        Some(("dashboard", sub)) => {
            let d = dashboard(conn, rates, Utc::now())?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &d)? {
                print_balances(&d.balances);
                println!(
                    "Debt: {}   Net worth: {}",
                    fmt_money(&d.total_debt, &d.balances.base_currency),
                    fmt_money(&d.net_worth, &d.balances.base_currency)
                );
                print_totals(&d.totals);
                transactions::print_rows(&d.recent);
                for a in &d.alerts {
                    println!(
                        "Budget alert [{}]: {} at {:.1}% ({:.2} of {:.2})",
                        a.alert.map(|l| l.label()).unwrap_or_default(),
                        a.category,
                        a.percentage,
                        a.spent,
                        a.budget.amount
                    );
                }
            }
        }
        _ => {}
    }
    Ok(())
}

fn print_totals(t: &Totals) {
    println!(
        "{}",
        pretty_table(
            &["Income", "Expense", "Net"],
            vec![vec![
                format!("{:.2}", t.income),
                format!("{:.2}", t.expense),
                format!("{:.2}", t.net),
            ]]
        )
    );
}

fn print_categories(items: &[CategoryTotal]) {
    let data = items
        .iter()
        .map(|c| vec![c.category.clone(), format!("{:.2}", c.total)])
        .collect();
    println!("{}", pretty_table(&["Category", "Spent"], data));
}

fn print_overview(rows: &[OverviewRow]) {
    let data = rows
        .iter()
        .map(|r| {
            let period = match r.month {
                Some(m) => format!("{}-{:02}", r.year, m),
                None => r.year.to_string(),
            };
            let source = match r.source {
                Source::Live => "live",
                Source::Summary => "summary",
                Source::NoData => "",
            };
            vec![
                period,
                format!("{:.2}", r.income),
                format!("{:.2}", r.expense),
                format!("{:.2}", r.net),
                source.to_string(),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(&["Period", "Income", "Expense", "Net", "Source"], data)
    );
}

fn print_balances(b: &Balances) {
    let mut data: Vec<Vec<String>> = b
        .wallets
        .iter()
        .map(|w| {
            vec![
                w.name.clone(),
                fmt_money(&w.balance, &w.currency),
                fmt_money(&w.base_balance, &b.base_currency),
            ]
        })
        .collect();
    data.push(vec![
        "Total".into(),
        String::new(),
        fmt_money(&b.total, &b.base_currency),
    ]);
    let base_col = format!("In {}", b.base_currency);
    println!(
        "{}",
        pretty_table(&["Wallet", "Balance", base_col.as_str()], data)
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_starts() {
        let today = NaiveDate::from_ymd_opt(2025, 8, 20).unwrap();
        let d = |m, day| NaiveDate::from_ymd_opt(2025, m, day).unwrap();
        assert_eq!(ReportPeriod::Weekly.since(today), d(8, 13));
        assert_eq!(ReportPeriod::Monthly.since(today), d(8, 1));
        assert_eq!(ReportPeriod::Quarterly.since(today), d(5, 22));
        assert_eq!(ReportPeriod::Yearly.since(today), d(1, 1));
    }
}
