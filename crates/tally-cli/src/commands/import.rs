//! Import command implementations

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use tally_core::{
    db::Database,
    import::{parse_csv, parse_holdings_csv},
    models::AccountKind,
};

fn parse_kind(kind: &str) -> Result<AccountKind> {
    kind.parse()
        .map_err(|_| anyhow::anyhow!("Unknown account kind: {}", kind))
}

/// Find the account by name, creating it with `kind` if missing
fn resolve_account(db: &Database, account: &str, kind: &str) -> Result<i64> {
    let kind = parse_kind(kind)?;
    db.upsert_account(account, kind, None)
        .with_context(|| format!("Failed to create account {}", account))
}

pub fn cmd_import(db: &Database, file: &Path, account: &str, kind: &str) -> Result<()> {
    let csv_file =
        File::open(file).with_context(|| format!("Failed to open file: {}", file.display()))?;

    println!("📥 Importing {} into {}...", file.display(), account);

    let transactions = parse_csv(csv_file)?;
    println!("   Found {} transactions", transactions.len());

    let account_id = resolve_account(db, account, kind)?;

    let mut imported = 0;
    let mut skipped = 0;
    for tx in &transactions {
        if db.insert_transaction(account_id, tx)?.is_inserted() {
            imported += 1;
        } else {
            skipped += 1;
        }
    }

    println!();
    println!("✅ Import complete!");
    println!("   Imported: {}", imported);
    println!("   Skipped (duplicates): {}", skipped);

    Ok(())
}

pub fn cmd_import_holdings(db: &Database, file: &Path, account: &str, kind: &str) -> Result<()> {
    let csv_file =
        File::open(file).with_context(|| format!("Failed to open file: {}", file.display()))?;

    println!("📥 Importing positions from {} into {}...", file.display(), account);

    let account_id = resolve_account(db, account, kind)?;
    let holdings = parse_holdings_csv(csv_file, account_id)?;

    for holding in &holdings {
        db.upsert_holding(holding)?;
    }

    println!("✅ Updated {} positions", holdings.len());
    Ok(())
}
