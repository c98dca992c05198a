// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;
use chrono::{NaiveDate, TimeZone, Utc};
use fintrack::commands::fx::RateProvider;
use fintrack::commands::transactions::{
    self, NewTransaction, TransactionFilter, TransferRequest,
};
use fintrack::commands::wallets::{self, NewWallet, WalletUpdate};
use fintrack::db::{self, unit_of_work};
use fintrack::models::{TxKind, WalletType};
use fintrack::{LedgerError, cli, store};
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::collections::HashMap;

const CASH: i64 = 1;
const FOOD: i64 = 1;
const TRANSPORT: i64 = 2;

struct Rates(HashMap<String, f64>);

impl RateProvider for Rates {
    fn latest_rates(&self, _base: &str) -> Result<HashMap<String, f64>> {
        Ok(self.0.clone())
    }
}

fn no_rates() -> Rates {
    Rates(HashMap::new())
}

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

fn add_wallet(conn: &mut Connection, name: &str, opening: &str, ccy: &str) -> i64 {
    let w = NewWallet {
        name: name.into(),
        opening_balance: dec(opening),
        currency: ccy.into(),
        wallet_type: WalletType::Bank,
        account_number: None,
        is_shared: false,
    };
    unit_of_work(conn, |uow| wallets::create_wallet(uow, &w)).unwrap()
}

fn record(conn: &mut Connection, amount: &str, kind: TxKind, wallet: i64, date: &str) -> i64 {
    let t = NewTransaction::new(dec(amount), "Test entry", d(date), FOOD, wallet, kind);
    unit_of_work(conn, |uow| transactions::create_transaction(uow, &t)).unwrap()
}

fn balance(conn: &Connection, wallet: i64) -> Decimal {
    store::get_wallet(conn, wallet).unwrap().balance
}

fn tx_count(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM transactions", [], |r| r.get(0))
        .unwrap()
}

fn ledger_error(err: &anyhow::Error) -> &LedgerError {
    err.downcast_ref::<LedgerError>().expect("domain error")
}

#[test]
fn expenses_subtract_and_income_adds() {
    let mut conn = setup();
    record(&mut conn, "25.50", TxKind::Expense, CASH, "2025-08-01");
    assert_eq!(balance(&conn, CASH), dec("-25.50"));
    record(&mut conn, "100", TxKind::Income, CASH, "2025-08-02");
    assert_eq!(balance(&conn, CASH), dec("74.50"));
}

#[test]
fn unknown_wallet_writes_nothing() {
    let mut conn = setup();
    let t = NewTransaction::new(dec("10"), "Lunch", d("2025-08-01"), FOOD, 99, TxKind::Expense);
    let err = unit_of_work(&mut conn, |uow| transactions::create_transaction(uow, &t)).unwrap_err();
    assert_eq!(
        ledger_error(&err),
        &LedgerError::NotFound {
            entity: "wallet",
            id: 99
        }
    );
    assert_eq!(tx_count(&conn), 0);
}

#[test]
fn invalid_input_is_rejected_before_writing() {
    let mut conn = setup();
    let zero = NewTransaction::new(Decimal::ZERO, "Lunch", d("2025-08-01"), FOOD, CASH, TxKind::Expense);
    let err = unit_of_work(&mut conn, |uow| transactions::create_transaction(uow, &zero)).unwrap_err();
    assert!(matches!(ledger_error(&err), LedgerError::Validation(_)));

    let blank = NewTransaction::new(dec("5"), "   ", d("2025-08-01"), FOOD, CASH, TxKind::Expense);
    let err = unit_of_work(&mut conn, |uow| transactions::create_transaction(uow, &blank)).unwrap_err();
    assert!(matches!(ledger_error(&err), LedgerError::Validation(_)));

    let no_cat = NewTransaction::new(dec("5"), "Lunch", d("2025-08-01"), 404, CASH, TxKind::Expense);
    assert!(unit_of_work(&mut conn, |uow| transactions::create_transaction(uow, &no_cat)).is_err());

    assert_eq!(tx_count(&conn), 0);
    assert_eq!(balance(&conn, CASH), Decimal::ZERO);
}

#[test]
fn edit_moves_effect_between_wallets() {
    let mut conn = setup();
    let bank = add_wallet(&mut conn, "Bank", "500", "GHS");
    let id = record(&mut conn, "50", TxKind::Expense, CASH, "2025-08-01");
    assert_eq!(balance(&conn, CASH), dec("-50"));

    let mut t = NewTransaction::new(dec("30"), "Moved", d("2025-08-01"), TRANSPORT, bank, TxKind::Expense);
    t.notes = Some("now on the bank card".into());
    unit_of_work(&mut conn, |uow| transactions::update_transaction(uow, id, &t)).unwrap();

    assert_eq!(balance(&conn, CASH), Decimal::ZERO);
    assert_eq!(balance(&conn, bank), dec("470"));
    let stored = store::get_transaction(&conn, id).unwrap();
    assert_eq!(stored.wallet_id, bank);
    assert_eq!(stored.category_id, TRANSPORT);
}

#[test]
fn edit_can_flip_kind() {
    let mut conn = setup();
    let id = record(&mut conn, "40", TxKind::Expense, CASH, "2025-08-01");
    let t = NewTransaction::new(dec("40"), "Refund", d("2025-08-01"), FOOD, CASH, TxKind::Income);
    unit_of_work(&mut conn, |uow| transactions::update_transaction(uow, id, &t)).unwrap();
    assert_eq!(balance(&conn, CASH), dec("40"));
}

#[test]
fn failed_edit_leaves_balances_alone() {
    let mut conn = setup();
    let id = record(&mut conn, "40", TxKind::Expense, CASH, "2025-08-01");
    let t = NewTransaction::new(dec("10"), "Elsewhere", d("2025-08-01"), FOOD, 77, TxKind::Expense);
    assert!(unit_of_work(&mut conn, |uow| transactions::update_transaction(uow, id, &t)).is_err());
    assert_eq!(balance(&conn, CASH), dec("-40"));
    assert_eq!(store::get_transaction(&conn, id).unwrap().amount, dec("40"));
}

#[test]
fn delete_reverses_effect() {
    let mut conn = setup();
    let id = record(&mut conn, "12.34", TxKind::Expense, CASH, "2025-08-01");
    let removed = unit_of_work(&mut conn, |uow| transactions::delete_transaction(uow, id)).unwrap();
    assert_eq!(removed, vec![id]);
    assert_eq!(balance(&conn, CASH), Decimal::ZERO);
    assert_eq!(tx_count(&conn), 0);
}

#[test]
fn balance_matches_opening_plus_ledger_after_many_operations() {
    let mut conn = setup();
    let bank = add_wallet(&mut conn, "Bank", "1000.10", "GHS");
    let a = record(&mut conn, "0.10", TxKind::Expense, bank, "2025-08-01");
    let b = record(&mut conn, "0.20", TxKind::Income, bank, "2025-08-02");
    record(&mut conn, "333.33", TxKind::Expense, bank, "2025-08-03");
    let t = NewTransaction::new(dec("0.30"), "Edited", d("2025-08-01"), FOOD, bank, TxKind::Expense);
    unit_of_work(&mut conn, |uow| transactions::update_transaction(uow, a, &t)).unwrap();
    unit_of_work(&mut conn, |uow| transactions::delete_transaction(uow, b)).unwrap();

    let w = store::get_wallet(&conn, bank).unwrap();
    let ledger: Decimal = store::transactions_for_wallet(&conn, bank)
        .unwrap()
        .iter()
        .map(|t| t.kind.signed(t.amount))
        .sum();
    assert_eq!(w.balance, w.opening_balance + ledger);
    assert_eq!(w.balance, dec("666.47"));
}

#[test]
fn ten_edits_across_amount_kind_and_wallet_match_direct_computation() {
    let mut conn = setup();
    let x = add_wallet(&mut conn, "Main", "1000", "GHS");
    let y = add_wallet(&mut conn, "Side", "0", "GHS");
    record(&mut conn, "7.77", TxKind::Expense, x, "2025-08-01");
    let id = record(&mut conn, "5", TxKind::Expense, x, "2025-08-02");

    let edits = [
        ("12.50", TxKind::Expense, x),
        ("40", TxKind::Income, y),
        ("7.25", TxKind::Expense, y),
        ("100", TxKind::Income, x),
        ("0.01", TxKind::Expense, x),
        ("55.55", TxKind::Expense, y),
        ("300", TxKind::Income, y),
        ("18.40", TxKind::Expense, x),
        ("2", TxKind::Income, x),
        ("22.34", TxKind::Expense, y),
    ];
    for (amount, kind, wallet) in edits {
        let t = NewTransaction::new(dec(amount), "Edited", d("2025-08-02"), FOOD, wallet, kind);
        unit_of_work(&mut conn, |uow| transactions::update_transaction(uow, id, &t)).unwrap();

        let effect = kind.signed(dec(amount));
        let (want_x, want_y) = if wallet == x {
            (dec("992.23") + effect, Decimal::ZERO)
        } else {
            (dec("992.23"), effect)
        };
        assert_eq!(balance(&conn, x), want_x, "after editing to {} {} on {}", kind, amount, wallet);
        assert_eq!(balance(&conn, y), want_y, "after editing to {} {} on {}", kind, amount, wallet);
    }

    assert_eq!(balance(&conn, x), dec("992.23"));
    assert_eq!(balance(&conn, y), dec("-22.34"));
    for w in [x, y] {
        let wallet = store::get_wallet(&conn, w).unwrap();
        let ledger: Decimal = store::transactions_for_wallet(&conn, w)
            .unwrap()
            .iter()
            .map(|t| t.kind.signed(t.amount))
            .sum();
        assert_eq!(wallet.balance, wallet.opening_balance + ledger);
    }
}

#[test]
fn wallet_edit_never_touches_balance() {
    let mut conn = setup();
    let bank = add_wallet(&mut conn, "Bank", "250", "GHS");
    let u = WalletUpdate {
        name: Some("Main bank".into()),
        is_shared: Some(true),
        ..Default::default()
    };
    unit_of_work(&mut conn, |uow| wallets::update_wallet(uow, bank, &u)).unwrap();
    let w = store::get_wallet(&conn, bank).unwrap();
    assert_eq!(w.name, "Main bank");
    assert!(w.is_shared);
    assert_eq!(w.balance, dec("250"));
}

#[test]
fn wallet_account_number_can_be_kept_or_cleared() {
    let mut conn = setup();
    let bank = add_wallet(&mut conn, "Bank", "0", "GHS");
    let set = WalletUpdate {
        account_number: Some(Some("0011223344".into())),
        ..Default::default()
    };
    unit_of_work(&mut conn, |uow| wallets::update_wallet(uow, bank, &set)).unwrap();

    let rename = WalletUpdate {
        name: Some("Savings".into()),
        ..Default::default()
    };
    unit_of_work(&mut conn, |uow| wallets::update_wallet(uow, bank, &rename)).unwrap();
    let w = store::get_wallet(&conn, bank).unwrap();
    assert_eq!(w.account_number.as_deref(), Some("0011223344"));

    let clear = WalletUpdate {
        account_number: Some(None),
        ..Default::default()
    };
    unit_of_work(&mut conn, |uow| wallets::update_wallet(uow, bank, &clear)).unwrap();
    let w = store::get_wallet(&conn, bank).unwrap();
    assert_eq!(w.account_number, None);
    assert_eq!(w.name, "Savings");
}

#[test]
fn transfer_moves_amount_and_keeps_the_sum() {
    let mut conn = setup();
    let x = add_wallet(&mut conn, "Main", "1000", "GHS");
    let y = add_wallet(&mut conn, "Side", "0", "GHS");
    let req = TransferRequest {
        from_wallet: x,
        to_wallet: y,
        amount: dec("250.75"),
        date: d("2025-08-05"),
        note: None,
    };
    unit_of_work(&mut conn, |uow| transactions::transfer(uow, &no_rates(), &req, Utc::now()))
        .unwrap();
    assert_eq!(balance(&conn, x), dec("749.25"));
    assert_eq!(balance(&conn, y), dec("250.75"));
    assert_eq!(balance(&conn, x) + balance(&conn, y), dec("1000"));
}

#[test]
fn reserved_categories_refuse_ordinary_entries() {
    let mut conn = setup();
    let bank = add_wallet(&mut conn, "Bank", "1000", "GHS");
    let req = TransferRequest {
        from_wallet: bank,
        to_wallet: CASH,
        amount: dec("100"),
        date: d("2025-08-05"),
        note: None,
    };
    let (out_id, _) =
        unit_of_work(&mut conn, |uow| transactions::transfer(uow, &no_rates(), &req, Utc::now()))
            .unwrap();
    let transfer_cat = store::get_transaction(&conn, out_id).unwrap().category_id;

    let one_legged =
        NewTransaction::new(dec("500"), "Fake move", d("2025-08-06"), transfer_cat, bank, TxKind::Expense);
    let err = unit_of_work(&mut conn, |uow| transactions::create_transaction(uow, &one_legged))
        .unwrap_err();
    assert!(matches!(ledger_error(&err), LedgerError::Refused(_)));

    let id = record(&mut conn, "20", TxKind::Expense, bank, "2025-08-06");
    let moved =
        NewTransaction::new(dec("20"), "Recategorised", d("2025-08-06"), transfer_cat, bank, TxKind::Expense);
    let err = unit_of_work(&mut conn, |uow| transactions::update_transaction(uow, id, &moved))
        .unwrap_err();
    assert!(matches!(ledger_error(&err), LedgerError::Refused(_)));

    assert_eq!(balance(&conn, bank), dec("880"));
    assert_eq!(balance(&conn, CASH), dec("100"));
    assert_eq!(tx_count(&conn), 3);
}

#[test]
fn moving_foreign_entry_to_another_wallet_reconverts_it() {
    let mut conn = setup();
    let usd = add_wallet(&mut conn, "Dollar account", "0", "USD");
    let eur = add_wallet(&mut conn, "Euro account", "0", "EUR");
    let rates = Rates(HashMap::from([
        ("GHS".to_string(), 15.0),
        ("USD".to_string(), 2.0),
    ]));
    let now = Utc::now();
    let t = NewTransaction::new(dec("4"), "Museum", d("2025-08-06"), FOOD, CASH, TxKind::Expense);
    let id = unit_of_work(&mut conn, |uow| {
        let t = transactions::apply_entry_currency(uow, &rates, t, Some("EUR"), now)?;
        transactions::create_transaction(uow, &t)
    })
    .unwrap();
    assert_eq!(balance(&conn, CASH), dec("-60"));

    let mut t = NewTransaction::new(dec("60"), "Museum", d("2025-08-06"), FOOD, usd, TxKind::Expense);
    t.original_amount = Some(dec("4"));
    t.original_currency = Some("EUR".into());
    unit_of_work(&mut conn, |uow| {
        let t = transactions::reapply_entry_currency(uow, &rates, t, now)?;
        transactions::update_transaction(uow, id, &t)
    })
    .unwrap();
    let stored = store::get_transaction(&conn, id).unwrap();
    assert_eq!(stored.amount, dec("8"));
    assert_eq!(stored.original_amount, Some(dec("4")));
    assert_eq!(stored.original_currency.as_deref(), Some("EUR"));
    assert_eq!(balance(&conn, CASH), Decimal::ZERO);
    assert_eq!(balance(&conn, usd), dec("-8"));

    // back in the currency it was entered in, the pair is dropped
    let mut t = NewTransaction::new(dec("8"), "Museum", d("2025-08-06"), FOOD, eur, TxKind::Expense);
    t.original_amount = stored.original_amount;
    t.original_currency = stored.original_currency.clone();
    unit_of_work(&mut conn, |uow| {
        let t = transactions::reapply_entry_currency(uow, &rates, t, now)?;
        transactions::update_transaction(uow, id, &t)
    })
    .unwrap();
    let stored = store::get_transaction(&conn, id).unwrap();
    assert_eq!(stored.amount, dec("4"));
    assert_eq!(stored.original_amount, None);
    assert_eq!(stored.original_currency, None);
    assert_eq!(balance(&conn, usd), Decimal::ZERO);
    assert_eq!(balance(&conn, eur), dec("-4"));
}

#[test]
fn transfer_creates_linked_legs() {
    let mut conn = setup();
    let bank = add_wallet(&mut conn, "Bank", "300", "GHS");
    let req = TransferRequest {
        from_wallet: bank,
        to_wallet: CASH,
        amount: dec("120"),
        date: d("2025-08-05"),
        note: Some("ATM".into()),
    };
    let now = Utc.with_ymd_and_hms(2025, 8, 5, 12, 0, 0).unwrap();
    let (out_id, in_id) =
        unit_of_work(&mut conn, |uow| transactions::transfer(uow, &no_rates(), &req, now)).unwrap();

    assert_eq!(balance(&conn, bank), dec("180"));
    assert_eq!(balance(&conn, CASH), dec("120"));

    let out = store::get_transaction(&conn, out_id).unwrap();
    let inc = store::get_transaction(&conn, in_id).unwrap();
    assert_eq!(out.kind, TxKind::Expense);
    assert_eq!(inc.kind, TxKind::Income);
    assert_eq!(out.transfer_peer_id, Some(in_id));
    assert_eq!(inc.transfer_peer_id, Some(out_id));
    assert_eq!(out.tags.as_deref(), Some("transfer"));
    let cat = store::get_category(&conn, out.category_id).unwrap();
    assert_eq!(cat.name, "Transfer");
    assert!(!cat.is_custom);

    let history = transactions::transfer_history(&conn, 10).unwrap();
    assert_eq!(history.len(), 2);
}

#[test]
fn deleting_one_transfer_leg_removes_both() {
    let mut conn = setup();
    let bank = add_wallet(&mut conn, "Bank", "300", "GHS");
    let req = TransferRequest {
        from_wallet: bank,
        to_wallet: CASH,
        amount: dec("50"),
        date: d("2025-08-05"),
        note: None,
    };
    let now = Utc::now();
    let (_, in_id) =
        unit_of_work(&mut conn, |uow| transactions::transfer(uow, &no_rates(), &req, now)).unwrap();
    let removed = unit_of_work(&mut conn, |uow| transactions::delete_transaction(uow, in_id)).unwrap();
    assert_eq!(removed.len(), 2);
    assert_eq!(balance(&conn, bank), dec("300"));
    assert_eq!(balance(&conn, CASH), Decimal::ZERO);
    assert_eq!(tx_count(&conn), 0);
}

#[test]
fn transfer_legs_cannot_be_edited_and_same_wallet_is_refused() {
    let mut conn = setup();
    let bank = add_wallet(&mut conn, "Bank", "300", "GHS");
    let now = Utc::now();
    let same = TransferRequest {
        from_wallet: bank,
        to_wallet: bank,
        amount: dec("10"),
        date: d("2025-08-05"),
        note: None,
    };
    let err = unit_of_work(&mut conn, |uow| transactions::transfer(uow, &no_rates(), &same, now))
        .unwrap_err();
    assert!(matches!(ledger_error(&err), LedgerError::Refused(_)));

    let req = TransferRequest { to_wallet: CASH, ..same };
    let (out_id, _) =
        unit_of_work(&mut conn, |uow| transactions::transfer(uow, &no_rates(), &req, now)).unwrap();
    let t = NewTransaction::new(dec("1"), "Sneaky", d("2025-08-05"), FOOD, bank, TxKind::Expense);
    let err = unit_of_work(&mut conn, |uow| transactions::update_transaction(uow, out_id, &t))
        .unwrap_err();
    assert!(matches!(ledger_error(&err), LedgerError::Refused(_)));
    assert_eq!(balance(&conn, bank), dec("290"));
}

#[test]
fn cross_currency_transfer_converts_incoming_leg() {
    let mut conn = setup();
    let usd = add_wallet(&mut conn, "Dollar account", "100", "USD");
    let rates = Rates(HashMap::from([("GHS".to_string(), 12.5)]));
    let req = TransferRequest {
        from_wallet: usd,
        to_wallet: CASH,
        amount: dec("10"),
        date: d("2025-08-05"),
        note: None,
    };
    let (_, in_id) =
        unit_of_work(&mut conn, |uow| transactions::transfer(uow, &rates, &req, Utc::now())).unwrap();
    assert_eq!(balance(&conn, usd), dec("90"));
    assert_eq!(balance(&conn, CASH), dec("125"));
    let inc = store::get_transaction(&conn, in_id).unwrap();
    assert_eq!(inc.original_amount, Some(dec("10")));
    assert_eq!(inc.original_currency.as_deref(), Some("USD"));
}

#[test]
fn foreign_currency_entry_is_converted_and_original_kept() {
    let mut conn = setup();
    let rates = Rates(HashMap::from([("GHS".to_string(), 15.0)]));
    let t = NewTransaction::new(dec("4"), "Coffee abroad", d("2025-08-06"), FOOD, CASH, TxKind::Expense);
    let id = unit_of_work(&mut conn, |uow| {
        let t = transactions::apply_entry_currency(uow, &rates, t, Some("eur"), Utc::now())?;
        transactions::create_transaction(uow, &t)
    })
    .unwrap();
    let stored = store::get_transaction(&conn, id).unwrap();
    assert_eq!(stored.amount, dec("60"));
    assert_eq!(stored.original_amount, Some(dec("4")));
    assert_eq!(stored.original_currency.as_deref(), Some("EUR"));
    assert_eq!(balance(&conn, CASH), dec("-60"));
}

fn list(conn: &Connection, args: &[&str]) -> Vec<transactions::TransactionRow> {
    let mut argv = vec!["fintrack", "tx", "list"];
    argv.extend_from_slice(args);
    let matches = cli::build_cli().get_matches_from(argv);
    if let Some(("tx", tx_m)) = matches.subcommand() {
        if let Some(("list", list_m)) = tx_m.subcommand() {
            let filter = TransactionFilter::from_matches(list_m).unwrap();
            return transactions::query_rows(conn, &filter).unwrap();
        }
    }
    panic!("no tx list subcommand");
}

#[test]
fn list_limit_and_filters_respected() {
    let mut conn = setup();
    for day in 1..=3 {
        record(&mut conn, "10", TxKind::Expense, CASH, &format!("2025-01-0{}", day));
    }
    let mut t = NewTransaction::new(dec("99"), "Salary", d("2025-01-04"), TRANSPORT, CASH, TxKind::Income);
    t.tags = Some("work,monthly".into());
    unit_of_work(&mut conn, |uow| transactions::create_transaction(uow, &t)).unwrap();

    let rows = list(&conn, &["--limit", "2"]);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].date, "2025-01-04");
    assert_eq!(rows[1].date, "2025-01-03");

    let rows = list(&conn, &["--type", "income"]);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].description, "Salary");

    let rows = list(&conn, &["--search", "monthly"]);
    assert_eq!(rows.len(), 1);

    let rows = list(&conn, &["--from", "2025-01-02", "--to", "2025-01-03"]);
    assert_eq!(rows.len(), 2);

    let rows = list(&conn, &["--category", "2"]);
    assert_eq!(rows.len(), 1);

    let rows = list(&conn, &["--sort", "amount", "--order", "asc"]);
    assert_eq!(rows.last().unwrap().amount, dec("99"));
    assert_eq!(rows[0].date, "2025-01-01");
}
