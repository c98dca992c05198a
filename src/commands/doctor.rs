// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::store;
use crate::utils::{get_base_currency, maybe_print_json, pretty_table};
use anyhow::Result;
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub kind: &'static str,
    pub detail: String,
}

pub fn diagnose(conn: &Connection) -> Result<Vec<Issue>> {
    let mut issues = Vec::new();

    // 1) Balance drift: stored balance vs opening balance plus ledger
    for w in store::list_wallets(conn)? {
        let expected: Decimal = w.opening_balance
            + store::transactions_for_wallet(conn, w.id)?
                .iter()
                .map(|t| t.kind.signed(t.amount))
                .sum::<Decimal>();
        if expected != w.balance {
            issues.push(Issue {
                kind: "balance_drift",
                detail: format!(
                    "wallet {} '{}': stored {} but ledger gives {}",
                    w.id, w.name, w.balance, expected
                ),
            });
        }
    }

    // 2) Transfer legs whose peer is gone
    let mut stmt = conn.prepare(
        "SELECT t.id, t.transfer_peer_id FROM transactions t
         LEFT JOIN transactions p ON p.id = t.transfer_peer_id
         WHERE t.transfer_peer_id IS NOT NULL AND p.id IS NULL",
    )?;
    let mut rows = stmt.query([])?;
    while let Some(r) = rows.next()? {
        let id: i64 = r.get(0)?;
        let peer: i64 = r.get(1)?;
        issues.push(Issue {
            kind: "orphan_transfer",
            detail: format!("transaction {} points at missing transfer leg {}", id, peer),
        });
    }

    // 3) Wallet currencies never converted to the base currency
    let base = get_base_currency(conn)?;
    let mut stmt = conn.prepare(
        "SELECT DISTINCT w.currency FROM wallets w
         WHERE w.currency <> ?1
           AND NOT EXISTS (SELECT 1 FROM exchange_rates r
                           WHERE r.from_currency = w.currency AND r.to_currency = ?1)
         ORDER BY w.currency",
    )?;
    let mut rows = stmt.query([&base])?;
    while let Some(r) = rows.next()? {
        let ccy: String = r.get(0)?;
        issues.push(Issue {
            kind: "missing_fx",
            detail: format!("no cached {}/{} rate", ccy, base),
        });
    }

    Ok(issues)
}

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    let issues = diagnose(conn)?;
    if maybe_print_json(m.get_flag("json"), m.get_flag("jsonl"), &issues)? {
        return Ok(());
    }
    if issues.is_empty() {
        println!("✅ doctor: no issues found");
    } else {
        let rows = issues
            .into_iter()
            .map(|i| vec![i.kind.to_string(), i.detail])
            .collect();
        println!("{}", pretty_table(&["Issue", "Detail"], rows));
    }
    Ok(())
}
