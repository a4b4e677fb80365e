//! Account commands

use anyhow::{Context, Result};
use tally_core::{db::Database, models::AccountKind};

use super::{money, truncate};

pub fn cmd_accounts_list(db: &Database) -> Result<()> {
    let accounts = db.list_accounts()?;

    if accounts.is_empty() {
        println!("No accounts found. Import transactions with:");
        println!("  tally import --file statement.csv --account Checking");
        return Ok(());
    }

    println!();
    println!("📁 Accounts");
    println!("   ─────────────────────────────────────────────────────");

    for account in accounts {
        let status = if account.is_active { "" } else { " (inactive)" };
        println!(
            "   {:>3}  {:<28} {:<11} {:>14}{}",
            account.id,
            truncate(&account.name, 28),
            account.kind.as_str(),
            money(account.balance),
            status
        );
    }

    Ok(())
}

pub fn cmd_accounts_add(
    db: &Database,
    name: &str,
    kind: &str,
    institution: Option<&str>,
) -> Result<()> {
    let kind: AccountKind = kind
        .parse()
        .map_err(|_| anyhow::anyhow!("Unknown account kind: {}", kind))?;
    let id = db.upsert_account(name, kind, institution)?;
    println!("✅ Account {} ({}) ready with id {}", name, kind, id);
    Ok(())
}

pub fn cmd_accounts_balance(db: &Database, account: &str, amount: f64) -> Result<()> {
    let found = db
        .find_account(account)?
        .with_context(|| format!("No account matches '{}'", account))?;
    db.set_account_balance(found.id, amount)?;
    println!("✅ {} balance set to {}", found.name, money(amount));
    Ok(())
}
