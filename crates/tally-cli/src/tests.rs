//! CLI command tests
//!
//! This module contains all tests for the CLI commands.

use std::io::Write;

use chrono::{NaiveDate, Timelike};
use tally_core::db::Database;
use tally_core::lunch::ConfidenceTier;
use tally_core::models::{AccountKind, Intent};
use tally_core::QueryConfig;

use crate::commands::{self, money, truncate};

fn setup_test_db() -> Database {
    Database::in_memory().unwrap()
}

fn write_file(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    path
}

const TRANSACTIONS_CSV: &str = "date,time,merchant,amount,category\n\
    2024-03-04,12:15,Chipotle,11.50,Restaurants\n\
    2024-03-05,,Safeway,64.20,Groceries\n\
    2024-03-06,18:40,Brewery One,22.00,Beer\n";

// ========== Helper Tests ==========

#[test]
fn test_truncate() {
    assert_eq!(truncate("short", 10), "short");
    assert_eq!(truncate("a much longer merchant name", 10), "a much ...");
    assert_eq!(truncate("café crème brûlée", 8), "café ...");
}

#[test]
fn test_money() {
    assert_eq!(money(0.0), "$0.00");
    assert_eq!(money(12.5), "$12.50");
    assert_eq!(money(1234567.891), "$1,234,567.89");
    assert_eq!(money(-900.0), "-$900.00");
    assert_eq!(money(-0.001), "$0.00");
}

#[test]
fn test_parse_now() {
    let dt = commands::parse_now(Some("2024-03-13T15:30:00")).unwrap();
    assert_eq!(
        dt,
        NaiveDate::from_ymd_opt(2024, 3, 13)
            .unwrap()
            .and_hms_opt(15, 30, 0)
            .unwrap()
    );

    let rfc = commands::parse_now(Some("2024-03-13T15:30:00-06:00")).unwrap();
    assert_eq!(rfc.hour(), 15);

    let date_only = commands::parse_now(Some("2024-03-13")).unwrap();
    assert_eq!(date_only.hour(), 23);

    assert!(commands::parse_now(Some("next tuesday")).is_err());
    assert!(commands::parse_now(None).is_ok());
}

// ========== Import Command Tests ==========

#[test]
fn test_cmd_import_creates_account_and_dedupes() {
    let db = setup_test_db();
    let dir = tempfile::tempdir().unwrap();
    let file = write_file(&dir, "march.csv", TRANSACTIONS_CSV);

    commands::cmd_import(&db, &file, "Checking", "checking").unwrap();
    assert_eq!(db.count_transactions(None).unwrap(), 3);

    // Second import of the same file inserts nothing
    commands::cmd_import(&db, &file, "Checking", "checking").unwrap();
    assert_eq!(db.count_transactions(None).unwrap(), 3);
    assert_eq!(db.list_accounts().unwrap().len(), 1);
}

#[test]
fn test_cmd_import_rejects_unknown_kind() {
    let db = setup_test_db();
    let dir = tempfile::tempdir().unwrap();
    let file = write_file(&dir, "march.csv", TRANSACTIONS_CSV);

    assert!(commands::cmd_import(&db, &file, "Checking", "piggybank").is_err());
}

#[test]
fn test_cmd_import_missing_file() {
    let db = setup_test_db();
    let result = commands::cmd_import(
        &db,
        std::path::Path::new("/nonexistent/file.csv"),
        "Checking",
        "checking",
    );
    assert!(result.is_err());
}

#[test]
fn test_cmd_import_holdings() {
    let db = setup_test_db();
    let dir = tempfile::tempdir().unwrap();
    let file = write_file(
        &dir,
        "positions.csv",
        "ticker,quantity,market_value\nVTI,10,2500\nBND,5,480\n",
    );

    commands::cmd_import_holdings(&db, &file, "Brokerage", "brokerage").unwrap();
    let holdings = db.list_holdings(Some("brokerage")).unwrap();
    assert_eq!(holdings.len(), 2);
    assert_eq!(
        db.find_account("brokerage").unwrap().unwrap().kind,
        AccountKind::Brokerage
    );
}

// ========== Accounts Command Tests ==========

#[test]
fn test_cmd_accounts() {
    let db = setup_test_db();
    assert!(commands::cmd_accounts_list(&db).is_ok());

    commands::cmd_accounts_add(&db, "Rewards Card", "credit", Some("Chase")).unwrap();
    commands::cmd_accounts_balance(&db, "rewards", 640.25).unwrap();

    let account = db.find_account("Rewards Card").unwrap().unwrap();
    assert_eq!(account.kind, AccountKind::Credit);
    assert_eq!(account.balance, 640.25);
    assert!(commands::cmd_accounts_list(&db).is_ok());

    assert!(commands::cmd_accounts_balance(&db, "nonexistent", 1.0).is_err());
    assert!(commands::cmd_accounts_add(&db, "Jar", "piggybank", None).is_err());
}

// ========== Ask Command Tests ==========

#[test]
fn test_answer_against_imported_ledger() {
    let db = setup_test_db();
    let dir = tempfile::tempdir().unwrap();
    let file = write_file(&dir, "march.csv", TRANSACTIONS_CSV);
    commands::cmd_import(&db, &file, "Checking", "checking").unwrap();

    let result = commands::answer(
        &db,
        QueryConfig::default(),
        "How much did I spend on groceries?",
        Some("2024-03-13T15:30:00"),
        None,
    )
    .unwrap();
    assert_eq!(result.intent, Intent::CategorySpending);
    assert_eq!(result.total, 64.2);

    let lunch = commands::answer(
        &db,
        QueryConfig::default(),
        "lunch this month",
        Some("2024-03-13T15:30:00"),
        None,
    )
    .unwrap();
    assert_eq!(lunch.transactions.len(), 1);
    assert_eq!(lunch.transactions[0].transaction.merchant, "Chipotle");
}

#[test]
fn test_cmd_ask_prints_every_shape() {
    let db = setup_test_db();
    let dir = tempfile::tempdir().unwrap();
    let file = write_file(&dir, "march.csv", TRANSACTIONS_CSV);
    commands::cmd_import(&db, &file, "Checking", "checking").unwrap();

    for (question, json) in [
        ("lunch this month", false),
        ("net worth", false),
        ("what's my wealth looking like", false),
        ("spent at safeway", true),
    ] {
        let result = commands::cmd_ask(
            &db,
            QueryConfig::default(),
            question,
            Some("2024-03-13"),
            None,
            json,
        );
        assert!(result.is_ok(), "{}: {:?}", question, result);
    }
}

#[test]
fn test_cmd_ask_rejects_bad_now() {
    let db = setup_test_db();
    let result = commands::cmd_ask(
        &db,
        QueryConfig::default(),
        "net worth",
        Some("someday"),
        None,
        false,
    );
    assert!(result.is_err());
}

// ========== Score Command Tests ==========

#[test]
fn test_score_purchase() {
    let config = QueryConfig::default();

    let result =
        commands::score_purchase(&config, "King Soupers", 12.43, Some("12:48"), None).unwrap();
    assert_eq!(result.score, 100);
    assert_eq!(result.tier, ConfidenceTier::Include);

    let result =
        commands::score_purchase(&config, "Unknown Deli", 9.99, None, Some("restaurant"))
            .unwrap();
    assert_eq!(result.score, 65);

    assert!(commands::score_purchase(&config, "Shell", 45.2, Some("1pm"), None).is_err());
    assert!(commands::cmd_score(&config, "Shell", 45.2, Some("13:00"), None, false).is_ok());
}

// ========== Config Command Tests ==========

#[test]
fn test_load_config_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "query.toml", "[query]\nsuggestion_limit = 1\n");

    let config = commands::load_config(Some(path.as_path())).unwrap();
    assert_eq!(config.suggestion_limit, 1);
    assert!(commands::cmd_config_show(&config).is_ok());
    assert!(commands::cmd_config_path(Some(path.as_path())).is_ok());

    let bad = write_file(&dir, "bad.toml", "[query\n");
    assert!(commands::load_config(Some(bad.as_path())).is_err());
}

#[test]
fn test_missing_config_path_is_an_error() {
    let missing = std::path::Path::new("/nonexistent/tally/query.toml");
    assert!(commands::load_config(Some(missing)).is_err());
    assert!(commands::cmd_config_path(Some(missing)).is_err());
}
