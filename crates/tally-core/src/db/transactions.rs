//! Transaction operations

use rusqlite::{params, OptionalExtension};
use tracing::debug;

use super::transaction_filter::TransactionFilter;
use super::{parse_date, parse_timestamp, Database, TIMESTAMP_FORMAT};
use crate::collaborators::{TransactionQuery, TransactionRepository};
use crate::error::Result;
use crate::models::{NewTransaction, TransactionRecord};

/// Result of inserting a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionInsertResult {
    /// Transaction was inserted successfully, contains new transaction ID
    Inserted(i64),
    /// Transaction was a duplicate, contains existing transaction ID
    Duplicate(i64),
}

impl TransactionInsertResult {
    pub fn is_inserted(&self) -> bool {
        matches!(self, Self::Inserted(_))
    }
}

/// Map a row selected with `TRANSACTION_COLUMNS`
pub(crate) fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<TransactionRecord> {
    let id: i64 = row.get(0)?;
    let account_id: i64 = row.get(1)?;
    let date: String = row.get(2)?;
    let timestamp: Option<String> = row.get(3)?;
    let kind: String = row.get(8)?;

    Ok(TransactionRecord {
        id: id.to_string(),
        account_id: account_id.to_string(),
        date: parse_date(2, &date)?,
        timestamp: timestamp
            .as_deref()
            .map(|ts| parse_timestamp(3, ts))
            .transpose()?,
        merchant: row.get(4)?,
        description: row.get(5)?,
        amount: row.get(6)?,
        category: row.get(7)?,
        kind: kind.parse().unwrap_or_default(),
        ticker: row.get(9)?,
        pending: row.get::<_, i64>(10)? != 0,
    })
}

impl Database {
    /// Insert a transaction (skips duplicates based on import_hash)
    pub fn insert_transaction(
        &self,
        account_id: i64,
        tx: &NewTransaction,
    ) -> Result<TransactionInsertResult> {
        let conn = self.conn()?;

        // Check for duplicate
        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM transactions WHERE import_hash = ?",
                params![tx.import_hash],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(id) = existing {
            debug!("Skipping duplicate transaction {}", tx.import_hash);
            return Ok(TransactionInsertResult::Duplicate(id));
        }

        conn.execute(
            r#"
            INSERT INTO transactions (account_id, date, timestamp, merchant, description, amount,
                                      category, kind, ticker, pending, import_hash, original_data)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                account_id,
                tx.date.to_string(),
                tx.timestamp
                    .map(|ts| ts.format(TIMESTAMP_FORMAT).to_string()),
                tx.merchant,
                tx.description,
                tx.amount,
                tx.category,
                tx.kind.as_str(),
                tx.ticker,
                tx.pending as i64,
                tx.import_hash,
                tx.original_data,
            ],
        )?;

        Ok(TransactionInsertResult::Inserted(conn.last_insert_rowid()))
    }

    /// Count transactions, optionally for one account
    pub fn count_transactions(&self, account_id: Option<i64>) -> Result<i64> {
        let conn = self.conn()?;
        let count = match account_id {
            Some(id) => conn.query_row(
                "SELECT COUNT(*) FROM transactions WHERE account_id = ?",
                params![id],
                |row| row.get(0),
            )?,
            None => conn.query_row("SELECT COUNT(*) FROM transactions", [], |row| row.get(0))?,
        };
        Ok(count)
    }

    /// Count transactions matching a repository query (ignores its limit)
    pub fn count_matching(&self, query: &TransactionQuery) -> Result<i64> {
        let conn = self.conn()?;
        let filter = TransactionFilter::from_query(query);
        let result = TransactionFilter {
            limit: None,
            ..filter
        }
        .build();

        let count = conn.query_row(
            &result.build_count_query(),
            result.params_refs().as_slice(),
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

impl TransactionRepository for Database {
    fn find(&self, query: &TransactionQuery) -> Result<Vec<TransactionRecord>> {
        let conn = self.conn()?;
        let result = TransactionFilter::from_query(query).build();
        let sql = result.build_select_query();

        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map(result.params_refs().as_slice(), row_to_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        debug!("Ledger lookup matched {} transactions", records.len());
        Ok(records)
    }
}
