//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Shared utilities (open_db, load_config) and init
//! - `import` - CSV import of transactions and holdings
//! - `accounts` - Account listing, creation and balances
//! - `ask` - Natural-language questions
//! - `score` - Lunch confidence for a single purchase
//! - `config` - Effective configuration and override path

pub mod accounts;
pub mod ask;
pub mod config;
pub mod core;
pub mod import;
pub mod score;

// Re-export command functions for main.rs
pub use accounts::*;
pub use ask::*;
pub use config::*;
pub use core::*;
pub use import::*;
pub use score::*;

/// Truncate a string to a maximum length, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Format a currency amount with a sign and thousands separators
pub fn money(amount: f64) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let mut grouped = String::new();
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    format!("{}${}.{:02}", sign, grouped, cents % 100)
}
