//! Tally Core Library
//!
//! Natural-language questions over personal finance data:
//! - Intent classification with ordered, tiered rules
//! - Parameter extraction (time ranges, categories, merchants, accounts, amounts)
//! - Lunch-confidence scoring with tagged contributions
//! - Query routing to pluggable analytics and transaction collaborators
//! - SQLite reference ledger implementing those collaborators
//! - CSV import for transactions and holdings

pub mod collaborators;
pub mod config;
pub mod db;
pub mod error;
pub mod import;
pub mod lunch;
pub mod models;
pub mod query;

/// In-memory collaborators for tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use collaborators::{Analytics, TransactionQuery, TransactionRepository};
pub use config::QueryConfig;
pub use db::Database;
pub use error::{Error, Result};
pub use lunch::{ConfidenceResult, ConfidenceTier, LunchScorer};
pub use query::{QueryContext, QueryEngine, QueryResult};
