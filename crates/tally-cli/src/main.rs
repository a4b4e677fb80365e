//! Tally CLI - Natural-language personal finance queries
//!
//! Usage:
//!   tally init                                  Initialize database
//!   tally import --file CSV --account NAME      Import transactions
//!   tally ask "how much did I spend on beer?"   Ask a question
//!   tally score --merchant Chipotle --amount 12 Score a purchase for lunch

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db),
        Commands::Import {
            file,
            account,
            kind,
            holdings,
        } => {
            let db = commands::open_db(&cli.db)?;
            if holdings {
                commands::cmd_import_holdings(&db, &file, &account, &kind)
            } else {
                commands::cmd_import(&db, &file, &account, &kind)
            }
        }
        Commands::Accounts { action } => {
            let db = commands::open_db(&cli.db)?;
            match action {
                None | Some(AccountsAction::List) => commands::cmd_accounts_list(&db),
                Some(AccountsAction::Add {
                    name,
                    kind,
                    institution,
                }) => commands::cmd_accounts_add(&db, &name, &kind, institution.as_deref()),
                Some(AccountsAction::Balance { account, amount }) => {
                    commands::cmd_accounts_balance(&db, &account, amount)
                }
            }
        }
        Commands::Ask {
            question,
            now,
            account,
            json,
        } => {
            let db = commands::open_db(&cli.db)?;
            let config = commands::load_config(config_path)?;
            commands::cmd_ask(
                &db,
                config,
                &question,
                now.as_deref(),
                account.as_deref(),
                json,
            )
        }
        Commands::Score {
            merchant,
            amount,
            time,
            category,
            json,
        } => {
            let config = commands::load_config(config_path)?;
            commands::cmd_score(
                &config,
                &merchant,
                amount,
                time.as_deref(),
                category.as_deref(),
                json,
            )
        }
        Commands::Config { action } => match action {
            None | Some(ConfigAction::Show) => {
                let config = commands::load_config(config_path)?;
                commands::cmd_config_show(&config)
            }
            Some(ConfigAction::Path) => commands::cmd_config_path(config_path),
        },
    }
}
