//! The `score` command: lunch confidence for one purchase

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime, NaiveTime};
use tally_core::{
    models::{TransactionKind, TransactionRecord},
    ConfidenceResult, LunchScorer, QueryConfig,
};

/// Score a hypothetical purchase made today
pub fn score_purchase(
    config: &QueryConfig,
    merchant: &str,
    amount: f64,
    time: Option<&str>,
    category: Option<&str>,
) -> Result<ConfidenceResult> {
    let scorer = LunchScorer::new(config).context("Invalid query config")?;

    let date = Local::now().date_naive();
    let timestamp = time
        .map(|t| {
            NaiveTime::parse_from_str(t.trim(), "%H:%M")
                .with_context(|| format!("Invalid --time (expected HH:MM): {}", t))
        })
        .transpose()?
        .map(|t| NaiveDateTime::new(date, t));

    let record = TransactionRecord {
        id: "cli".to_string(),
        account_id: String::new(),
        date,
        timestamp,
        merchant: merchant.to_string(),
        description: merchant.to_string(),
        amount,
        category: category.map(String::from),
        kind: TransactionKind::Expense,
        ticker: None,
        pending: false,
    };

    Ok(scorer.score(&record))
}

pub fn cmd_score(
    config: &QueryConfig,
    merchant: &str,
    amount: f64,
    time: Option<&str>,
    category: Option<&str>,
    json: bool,
) -> Result<()> {
    let result = score_purchase(config, merchant, amount, time, category)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!();
    println!("🍽️  {} ({})", merchant, super::money(amount));
    println!("   Score: {} → {}", result.score, result.tier);
    println!("   ─────────────────────────────");
    for contribution in &result.contributions {
        println!(
            "   {:<12} {:>+4}  {}",
            contribution.factor.as_str(),
            contribution.delta,
            contribution.reason
        );
    }

    Ok(())
}
