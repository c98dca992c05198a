// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::models::ExchangeRate;
use crate::store::dec;
use crate::utils::{
    get_base_currency, http_client, maybe_print_json, normalize_currency, parse_decimal,
    pretty_table, set_base_currency,
};
use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Duration, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};

pub const RATE_API_URL: &str = "https://api.exchangerate-api.com/v4/latest";

/// Cached rates are served without a refetch for this long.
pub fn cache_ttl() -> Duration {
    Duration::hours(24)
}

/// Source of "latest" rate tables keyed by quote currency (1 base = rate quote).
pub trait RateProvider {
    fn latest_rates(&self, base: &str) -> Result<HashMap<String, f64>>;
}

#[derive(Debug, Deserialize)]
struct LatestRates {
    rates: HashMap<String, f64>,
}

/// exchangerate-api.com v4 client.
pub struct ExchangeRateApi {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl ExchangeRateApi {
    pub fn new() -> Result<Self> {
        Self::with_base_url(RATE_API_URL)
    }

    pub fn with_base_url(url: &str) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            base_url: url.trim_end_matches('/').to_string(),
        })
    }
}

impl RateProvider for ExchangeRateApi {
    fn latest_rates(&self, base: &str) -> Result<HashMap<String, f64>> {
        let url = format!("{}/{}", self.base_url, base);
        let resp = self.client.get(&url).send()?.error_for_status()?;
        let body: LatestRates = resp
            .json()
            .with_context(|| format!("Malformed rate payload from {}", url))?;
        Ok(body.rates)
    }
}

fn latest_cached(
    conn: &Connection,
    from: &str,
    to: &str,
) -> Result<Option<(Decimal, DateTime<Utc>)>> {
    let row = conn
        .query_row(
            "SELECT rate, fetched_at FROM exchange_rates
             WHERE from_currency=?1 AND to_currency=?2
             ORDER BY fetched_at DESC, id DESC LIMIT 1",
            params![from, to],
            |r| Ok((dec(r, 0)?, r.get::<_, DateTime<Utc>>(1)?)),
        )
        .optional()?;
    Ok(row)
}

fn fetch_rate(provider: &dyn RateProvider, from: &str, to: &str) -> Result<Decimal> {
    let rates = provider.latest_rates(from)?;
    let raw = rates
        .get(to)
        .copied()
        .ok_or_else(|| anyhow!("no {} entry in {} rate table", to, from))?;
    let rate = Decimal::try_from(raw).with_context(|| format!("Invalid rate {}", raw))?;
    if rate <= Decimal::ZERO {
        return Err(anyhow!("non-positive rate {} for {}/{}", rate, from, to));
    }
    Ok(rate)
}

/// Rate for 1 `from` in `to`. Serves a cached rate younger than 24h, otherwise
/// asks `provider` once and appends the answer to the cache. When the provider
/// fails the last known rate is used even if stale, and 1 when there is none.
/// Only database errors are returned.
pub fn rate(
    conn: &Connection,
    provider: &dyn RateProvider,
    from: &str,
    to: &str,
    now: DateTime<Utc>,
) -> Result<Decimal> {
    if from == to {
        return Ok(Decimal::ONE);
    }
    let cached = latest_cached(conn, from, to)?;
    if let Some((r, fetched_at)) = cached {
        if now - fetched_at < cache_ttl() {
            debug!(from, to, %r, "rate cache hit");
            return Ok(r);
        }
    }

    match fetch_rate(provider, from, to) {
        Ok(r) => {
            conn.execute(
                "INSERT INTO exchange_rates(from_currency, to_currency, rate, fetched_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![from, to, r.to_string(), now],
            )?;
            info!(from, to, %r, "fetched exchange rate");
            Ok(r)
        }
        Err(err) => {
            warn!(from, to, error = %err, "rate lookup failed, falling back");
            Ok(cached.map(|(r, _)| r).unwrap_or(Decimal::ONE))
        }
    }
}

pub fn convert(
    conn: &Connection,
    provider: &dyn RateProvider,
    amount: Decimal,
    from: &str,
    to: &str,
    now: DateTime<Utc>,
) -> Result<Decimal> {
    Ok(amount * rate(conn, provider, from, to, now)?)
}

pub fn handle(conn: &Connection, rates: &dyn RateProvider, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("set-base", sub)) => {
            let ccy = sub.get_one::<String>("currency").unwrap();
            set_base_currency(conn, ccy)?;
            println!("Base currency set to {}", get_base_currency(conn)?);
        }
        Some(("rate", sub)) => {
            let from = normalize_currency(sub.get_one::<String>("from").unwrap())?;
            let to = match sub.get_one::<String>("to") {
                Some(t) => normalize_currency(t)?,
                None => get_base_currency(conn)?,
            };
            let r = rate(conn, rates, &from, &to, Utc::now())?;
            println!("1 {} = {} {}", from, r.round_dp(6), to);
        }
        Some(("convert", sub)) => {
            let amount = parse_decimal(sub.get_one::<String>("amount").unwrap())?;
            let from = normalize_currency(sub.get_one::<String>("from").unwrap())?;
            let to = match sub.get_one::<String>("to") {
                Some(t) => normalize_currency(t)?,
                None => get_base_currency(conn)?,
            };
            let res = convert(conn, rates, amount, &from, &to, Utc::now())?;
            println!("{} {} -> {:.2} {}", amount, from, res, to);
        }
        Some(("list", sub)) => list_rates(conn, sub)?,
        _ => {}
    }
    Ok(())
}

/// Most recent cache rows, newest first.
pub fn cached_rates(conn: &Connection, limit: usize) -> Result<Vec<ExchangeRate>> {
    let mut stmt = conn.prepare(
        "SELECT id, from_currency, to_currency, rate, fetched_at FROM exchange_rates
         ORDER BY fetched_at DESC, id DESC LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit as i64], |r| {
        Ok(ExchangeRate {
            id: r.get(0)?,
            from_currency: r.get(1)?,
            to_currency: r.get(2)?,
            rate: dec(r, 3)?,
            fetched_at: r.get(4)?,
        })
    })?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

fn list_rates(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let rates = cached_rates(conn, 50)?;
    if maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &rates)? {
        return Ok(());
    }
    let data = rates
        .iter()
        .map(|r| {
            vec![
                r.fetched_at.format("%Y-%m-%d %H:%M").to_string(),
                r.from_currency.clone(),
                r.to_currency.clone(),
                r.rate.to_string(),
            ]
        })
        .collect();
    println!("{}", pretty_table(&["Fetched", "From", "To", "Rate"], data));
    Ok(())
}
