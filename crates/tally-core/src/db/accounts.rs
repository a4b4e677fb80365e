//! Account operations

use rusqlite::{params, OptionalExtension};

use super::transaction_filter::account_condition;
use super::Database;
use crate::error::{Error, Result};
use crate::models::{Account, AccountKind};

const ACCOUNT_COLUMNS: &str = "a.id, a.name, a.kind, a.institution, a.balance, a.is_active";

fn row_to_account(row: &rusqlite::Row) -> rusqlite::Result<Account> {
    let kind: String = row.get(2)?;
    Ok(Account {
        id: row.get(0)?,
        name: row.get(1)?,
        kind: kind.parse().unwrap_or_default(),
        institution: row.get(3)?,
        balance: row.get(4)?,
        is_active: row.get::<_, i64>(5)? != 0,
    })
}

impl Database {
    /// Create or get an account by name
    ///
    /// Names are unique case-insensitively; an existing account keeps its kind.
    pub fn upsert_account(
        &self,
        name: &str,
        kind: AccountKind,
        institution: Option<&str>,
    ) -> Result<i64> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidData("Account name cannot be empty".into()));
        }

        let conn = self.conn()?;

        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM accounts WHERE name = ? COLLATE NOCASE",
                params![name],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(id) = existing {
            return Ok(id);
        }

        conn.execute(
            "INSERT INTO accounts (name, kind, institution) VALUES (?, ?, ?)",
            params![name, kind.as_str(), institution],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// List all accounts
    pub fn list_accounts(&self) -> Result<Vec<Account>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM accounts a ORDER BY a.name",
            ACCOUNT_COLUMNS
        ))?;

        let accounts = stmt
            .query_map([], row_to_account)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(accounts)
    }

    /// Get an account by ID
    pub fn get_account(&self, id: i64) -> Result<Option<Account>> {
        let conn = self.conn()?;
        let account = conn
            .query_row(
                &format!("SELECT {} FROM accounts a WHERE a.id = ?", ACCOUNT_COLUMNS),
                params![id],
                row_to_account,
            )
            .optional()?;

        Ok(account)
    }

    /// Find an account by id or case-insensitive name fragment
    ///
    /// An exact id or name wins over a fragment; among fragments the
    /// lowest id is returned.
    pub fn find_account(&self, needle: &str) -> Result<Option<Account>> {
        let needle = needle.trim();
        if needle.is_empty() {
            return Ok(None);
        }

        let conn = self.conn()?;
        let (condition, mut params) = account_condition(needle);
        params.push(Box::new(needle.to_string()));
        params.push(Box::new(needle.to_string()));
        let refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let account = conn
            .query_row(
                &format!(
                    "SELECT {} FROM accounts a WHERE {} \
                     ORDER BY (CAST(a.id AS TEXT) = ? OR a.name = ? COLLATE NOCASE) DESC, a.id \
                     LIMIT 1",
                    ACCOUNT_COLUMNS, condition
                ),
                refs.as_slice(),
                row_to_account,
            )
            .optional()?;

        Ok(account)
    }

    /// Set the current balance of an account
    pub fn set_account_balance(&self, id: i64, balance: f64) -> Result<()> {
        if !balance.is_finite() {
            return Err(Error::InvalidData(format!("Invalid balance: {}", balance)));
        }

        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE accounts SET balance = ? WHERE id = ?",
            params![balance, id],
        )?;

        if updated == 0 {
            return Err(Error::NotFound(format!("Account {}", id)));
        }
        Ok(())
    }

    /// Mark an account active or inactive (inactive accounts drop out of net worth)
    pub fn set_account_active(&self, id: i64, active: bool) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE accounts SET is_active = ? WHERE id = ?",
            params![active as i64, id],
        )?;

        if updated == 0 {
            return Err(Error::NotFound(format!("Account {}", id)));
        }
        Ok(())
    }
}
