// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::LedgerError;

/// Name of the system category used for both legs of a wallet transfer.
pub const TRANSFER_CATEGORY: &str = "Transfer";
/// Name of the system category used for creditor payments.
pub const DEBT_PAYMENT_CATEGORY: &str = "Debt Payment";

/// Categories owned by the ledger itself. Users cannot create them or file
/// ordinary transactions under them.
pub fn is_reserved_category(name: &str) -> bool {
    let name = name.trim();
    [TRANSFER_CATEGORY, DEBT_PAYMENT_CATEGORY]
        .iter()
        .any(|r| r.eq_ignore_ascii_case(name))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxKind {
    Expense,
    Income,
}

impl TxKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxKind::Expense => "expense",
            TxKind::Income => "income",
        }
    }

    /// Effect of `amount` of this kind on a wallet balance.
    pub fn signed(&self, amount: Decimal) -> Decimal {
        match self {
            TxKind::Expense => -amount,
            TxKind::Income => amount,
        }
    }
}

impl FromStr for TxKind {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "expense" => Ok(TxKind::Expense),
            "income" => Ok(TxKind::Income),
            other => Err(LedgerError::validation(format!(
                "unknown transaction type '{}' (use expense|income)",
                other
            ))),
        }
    }
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletType {
    Cash,
    Bank,
    Crypto,
    Ewallet,
}

impl WalletType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletType::Cash => "cash",
            WalletType::Bank => "bank",
            WalletType::Crypto => "crypto",
            WalletType::Ewallet => "ewallet",
        }
    }
}

impl FromStr for WalletType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cash" => Ok(WalletType::Cash),
            "bank" => Ok(WalletType::Bank),
            "crypto" => Ok(WalletType::Crypto),
            "ewallet" => Ok(WalletType::Ewallet),
            other => Err(LedgerError::validation(format!(
                "unknown wallet type '{}' (use cash|bank|crypto|ewallet)",
                other
            ))),
        }
    }
}

/// Budget period. Values outside the three rolling periods are kept verbatim
/// and evaluated against the budget's stored start date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BudgetPeriod {
    Weekly,
    Monthly,
    Yearly,
    Other(String),
}

impl BudgetPeriod {
    pub fn as_str(&self) -> &str {
        match self {
            BudgetPeriod::Weekly => "weekly",
            BudgetPeriod::Monthly => "monthly",
            BudgetPeriod::Yearly => "yearly",
            BudgetPeriod::Other(s) => s.as_str(),
        }
    }

    pub fn is_rolling(&self) -> bool {
        !matches!(self, BudgetPeriod::Other(_))
    }
}

impl From<String> for BudgetPeriod {
    fn from(s: String) -> Self {
        match s.as_str() {
            "weekly" => BudgetPeriod::Weekly,
            "monthly" => BudgetPeriod::Monthly,
            "yearly" => BudgetPeriod::Yearly,
            _ => BudgetPeriod::Other(s),
        }
    }
}

impl From<BudgetPeriod> for String {
    fn from(p: BudgetPeriod) -> Self {
        p.as_str().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
            Frequency::Yearly => "yearly",
        }
    }

    /// Fixed day offset between occurrences (months and years are approximated).
    pub fn days(&self) -> i64 {
        match self {
            Frequency::Daily => 1,
            Frequency::Weekly => 7,
            Frequency::Monthly => 30,
            Frequency::Yearly => 365,
        }
    }
}

impl FromStr for Frequency {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "monthly" => Ok(Frequency::Monthly),
            "yearly" => Ok(Frequency::Yearly),
            other => Err(LedgerError::validation(format!(
                "unknown frequency '{}' (use daily|weekly|monthly|yearly)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub id: i64,
    pub name: String,
    pub balance: Decimal,
    pub opening_balance: Decimal,
    pub currency: String,
    pub wallet_type: WalletType,
    pub account_number: Option<String>,
    pub is_shared: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub is_custom: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
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
    pub transfer_peer_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Budget {
    pub id: i64,
    pub category_id: i64,
    pub amount: Decimal,
    pub period: BudgetPeriod,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub notify_at_75: bool,
    pub notify_at_90: bool,
    pub notify_at_100: bool,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringTransaction {
    pub id: i64,
    pub amount: Decimal,
    pub description: String,
    pub category_id: i64,
    pub wallet_id: i64,
    pub kind: TxKind,
    pub frequency: Frequency,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub last_created: Option<NaiveDate>,
    pub next_due: Option<NaiveDate>,
    pub is_active: bool,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeRate {
    pub id: i64,
    pub from_currency: String,
    pub to_currency: String,
    pub rate: Decimal,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "source", rename_all = "lowercase")]
pub enum FundingSource {
    Wallet(i64),
    External(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub funding: FundingSource,
    pub created_date: NaiveDate,
    pub is_completed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectItem {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub cost: Decimal,
    pub item_type: TxKind,
    pub is_completed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectItemPayment {
    pub id: i64,
    pub item_id: i64,
    pub amount: Decimal,
    pub description: Option<String>,
    pub is_paid: bool,
    pub payment_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialSummary {
    pub id: i64,
    pub year: i32,
    pub month: Option<u32>, // 1-12, None for a whole-year summary
    pub total_income: Decimal,
    pub total_expense: Decimal,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Creditor {
    pub id: i64,
    pub name: String,
    pub amount: Decimal, // outstanding
    pub currency: String,
    pub description: Option<String>,
}
