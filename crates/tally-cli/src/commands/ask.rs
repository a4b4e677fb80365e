//! The `ask` command: natural-language questions against the ledger

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use tally_core::{
    db::Database,
    models::{Intent, TimeRangeSource},
    query::QueryTransaction,
    QueryConfig, QueryEngine, QueryResult,
};

use super::{money, truncate};

/// How many transactions to print before summarizing the rest
const MAX_LISTED: usize = 10;

/// Parse the --now flag, defaulting to the local wall clock
///
/// A bare date means the end of that day.
pub fn parse_now(value: Option<&str>) -> Result<NaiveDateTime> {
    let Some(value) = value.map(str::trim) else {
        return Ok(Local::now().naive_local());
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.naive_local());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Ok(dt);
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(23, 59, 59))
        .with_context(|| format!("Invalid --now value: {}", value))
}

/// Answer a question against the ledger
pub fn answer(
    db: &Database,
    config: QueryConfig,
    question: &str,
    now: Option<&str>,
    account: Option<&str>,
) -> Result<QueryResult> {
    let engine = QueryEngine::new(config).context("Invalid query config")?;
    let now = parse_now(now)?;
    engine
        .ask(question, now, account, db, db)
        .context("Failed to answer question")
}

pub fn cmd_ask(
    db: &Database,
    config: QueryConfig,
    question: &str,
    now: Option<&str>,
    account: Option<&str>,
    json: bool,
) -> Result<()> {
    let result = answer(db, config, question, now, account)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }
    Ok(())
}

fn print_result(result: &QueryResult) {
    if result.intent == Intent::Unrecognized {
        println!("🤔 I couldn't tell what you're asking.");
        if !result.suggestions.is_empty() {
            println!();
            println!("Try asking:");
            for suggestion in &result.suggestions {
                println!("   • {}", suggestion.example);
            }
        }
        return;
    }

    println!();
    let source = match result.time_range_source {
        TimeRangeSource::Explicit => "",
        TimeRangeSource::Default => " (default)",
    };
    if result.time_range.is_instant() {
        println!("📊 {}", result.intent.label());
    } else {
        println!(
            "📊 {} · {} to {}{}",
            result.intent.label(),
            result.time_range.start_date(),
            result.time_range.end_date(),
            source
        );
    }
    println!("   ─────────────────────────────────────────────────────");
    println!("   Total: {}", money(result.total));

    if let Some(account) = &result.filters.account {
        println!("   Account: {}", account);
    }
    if let Some(amount) = &result.filters.amount {
        println!("   Amount: {}", amount);
    }

    if !result.breakdown.is_empty() {
        println!();
        for entry in &result.breakdown {
            let mut extra = String::new();
            if let Some(pct) = entry.percentage {
                extra.push_str(&format!("  {:>5.1}%", pct));
            }
            if let Some(confidence) = entry.confidence {
                extra.push_str(&format!("  confidence {:.0}", confidence));
            }
            println!(
                "   {:<28} {:>12}  ×{}{}",
                truncate(&entry.label, 28),
                money(entry.total),
                entry.count,
                extra
            );
        }
    }

    print_transactions("Transactions", &result.transactions);

    if !result.uncertain_transactions.is_empty() {
        print_transactions("Maybe lunch", &result.uncertain_transactions);
        println!("   Uncertain total: {}", money(result.uncertain_total));
    }
}

fn print_transactions(title: &str, transactions: &[QueryTransaction]) {
    if transactions.is_empty() {
        return;
    }

    println!();
    println!("   {} ({})", title, transactions.len());
    for t in transactions.iter().take(MAX_LISTED) {
        let tx = &t.transaction;
        let score = t
            .confidence
            .as_ref()
            .map(|c| format!("  [{}]", c.score))
            .unwrap_or_default();
        let pending = if tx.pending { " (pending)" } else { "" };
        println!(
            "   {}  {:<28} {:>12}{}{}",
            tx.date,
            truncate(&tx.merchant, 28),
            money(tx.amount),
            score,
            pending
        );
    }
    if transactions.len() > MAX_LISTED {
        println!("   ... and {} more", transactions.len() - MAX_LISTED);
    }
}
