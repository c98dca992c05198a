// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use fintrack::commands::fx::ExchangeRateApi;
use fintrack::{cli, commands, db};

fn main() -> Result<()> {
    let matches = cli::build_cli().get_matches();

    let level = match matches.get_count("verbose") {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        _ => LevelFilter::DEBUG,
    };
    init_logger(level);

    let mut conn = db::open_or_init()?;
    let rates = ExchangeRateApi::new()?;
    debug!("dispatching {:?}", matches.subcommand_name());

    match matches.subcommand() {
        Some(("init", _)) => {
            println!("Database initialized at {}", db::db_path()?.display());
        }
        Some(("wallet", sub)) => commands::wallets::handle(&mut conn, &rates, sub)?,
        Some(("category", sub)) => commands::categories::handle(&mut conn, sub)?,
        Some(("tx", sub)) => commands::transactions::handle(&mut conn, &rates, sub)?,
        Some(("budget", sub)) => commands::budgets::handle(&mut conn, sub)?,
        Some(("recurring", sub)) => commands::recurring::handle(&mut conn, sub)?,
        Some(("fx", sub)) => commands::fx::handle(&conn, &rates, sub)?,
        Some(("report", sub)) => commands::reports::handle(&conn, &rates, sub)?,
        Some(("summary", sub)) => commands::summaries::handle(&mut conn, sub)?,
        Some(("project", sub)) => commands::projects::handle(&mut conn, sub)?,
        Some(("creditor", sub)) => commands::creditors::handle(&mut conn, sub)?,
        Some(("export", sub)) => commands::exporter::handle(&conn, sub)?,
        Some(("doctor", sub)) => commands::doctor::handle(&conn, sub)?,
        _ => {
            cli::build_cli().print_help()?;
            println!();
        }
    }
    Ok(())
}

/// Honors `RUST_LOG` when set; otherwise logs this crate at `level`.
fn init_logger(level: LevelFilter) {
    let filter = match std::env::var("RUST_LOG").ok() {
        Some(_) => EnvFilter::from_default_env(),
        None => EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), level)),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
