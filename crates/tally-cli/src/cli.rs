//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Tally - Ask questions about your money in plain English
#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Natural-language questions over your personal finance ledger", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "tally.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Query config file (aliases, merchant lists, lunch thresholds)
    ///
    /// Defaults to ~/.local/share/tally/config/query.toml when present,
    /// otherwise the built-in configuration.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Import transactions (or holdings) from CSV
    Import {
        /// CSV file to import
        #[arg(short, long)]
        file: PathBuf,

        /// Account to import into (created if missing)
        #[arg(short, long)]
        account: String,

        /// Account kind when creating: checking, savings, credit, brokerage, retirement, loan
        #[arg(short, long, default_value = "checking")]
        kind: String,

        /// File holds positions (ticker, quantity, market_value, ...) instead of transactions
        #[arg(long)]
        holdings: bool,
    },

    /// List and manage accounts
    Accounts {
        #[command(subcommand)]
        action: Option<AccountsAction>,
    },

    /// Ask a question, e.g. "how much did I spend on lunch last month?"
    Ask {
        /// The question
        question: String,

        /// Reference time instead of now (RFC 3339, YYYY-MM-DDTHH:MM:SS or YYYY-MM-DD)
        #[arg(long)]
        now: Option<String>,

        /// Restrict to an account (id or name fragment), overriding the question
        #[arg(short, long)]
        account: Option<String>,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Score a single purchase for lunch confidence
    Score {
        /// Merchant name
        #[arg(short, long)]
        merchant: String,

        /// Purchase amount
        #[arg(long)]
        amount: f64,

        /// Time of day (HH:MM); omit when unknown
        #[arg(short, long)]
        time: Option<String>,

        /// Transaction category
        #[arg(short, long)]
        category: Option<String>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Inspect the query configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
pub enum AccountsAction {
    /// List accounts with balances (default)
    List,
    /// Add an account
    Add {
        /// Account name
        name: String,

        /// checking, savings, credit, brokerage, retirement, loan
        #[arg(short, long, default_value = "checking")]
        kind: String,

        /// Bank or broker
        #[arg(short, long)]
        institution: Option<String>,
    },
    /// Set an account's current balance (amount owed for credit/loan)
    Balance {
        /// Account id or name fragment
        account: String,

        /// New balance
        #[arg(allow_hyphen_values = true)]
        amount: f64,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML (default)
    Show,
    /// Print where the override file is read from
    Path,
}
