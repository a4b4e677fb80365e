//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `load_config` - Resolve the query configuration
//! - `cmd_init` - Initialize the database

use std::path::Path;

use anyhow::{Context, Result};
use tally_core::{db::Database, QueryConfig};

/// Open (and migrate) the ledger database
pub fn open_db(db_path: &Path) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .with_context(|| format!("Database path is not valid UTF-8: {}", db_path.display()))?;
    Database::new(path_str).context("Failed to open database")
}

/// Resolve config from --config, the override file, or the built-in defaults
pub fn load_config(config_path: Option<&Path>) -> Result<QueryConfig> {
    QueryConfig::resolve(config_path).context("Failed to load query config")
}

pub fn cmd_init(db_path: &Path) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    open_db(db_path)?;

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Import transactions: tally import --file statement.csv --account Checking");
    println!("  2. Ask a question: tally ask \"how much did I spend on groceries this month?\"");

    Ok(())
}
