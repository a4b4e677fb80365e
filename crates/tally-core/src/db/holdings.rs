//! Investment positions

use rusqlite::params;

use super::transaction_filter::account_condition;
use super::Database;
use crate::error::{Error, Result};
use crate::models::Holding;

impl Database {
    /// Insert or replace the position for (account, ticker)
    pub fn upsert_holding(&self, holding: &Holding) -> Result<()> {
        let ticker = holding.ticker.trim().to_uppercase();
        if ticker.is_empty() {
            return Err(Error::InvalidData("Holding ticker cannot be empty".into()));
        }

        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO holdings (account_id, ticker, name, asset_class, quantity, cost_basis, market_value)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(account_id, ticker) DO UPDATE SET
                name = excluded.name,
                asset_class = excluded.asset_class,
                quantity = excluded.quantity,
                cost_basis = excluded.cost_basis,
                market_value = excluded.market_value,
                updated_at = CURRENT_TIMESTAMP
            "#,
            params![
                holding.account_id,
                ticker,
                holding.name,
                holding.asset_class.to_lowercase(),
                holding.quantity,
                holding.cost_basis,
                holding.market_value,
            ],
        )?;

        Ok(())
    }

    /// List positions of active accounts, largest market value first
    ///
    /// `account` narrows to an account id or name fragment.
    pub fn list_holdings(&self, account: Option<&str>) -> Result<Vec<Holding>> {
        let conn = self.conn()?;

        let (condition, params) = match account.map(str::trim).filter(|a| !a.is_empty()) {
            Some(account) => {
                let (condition, params) = account_condition(account);
                (format!("AND {}", condition), params)
            }
            None => (String::new(), Vec::new()),
        };
        let refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let mut stmt = conn.prepare(&format!(
            "SELECT h.account_id, h.ticker, h.name, h.asset_class, h.quantity, h.cost_basis, h.market_value \
             FROM holdings h JOIN accounts a ON h.account_id = a.id \
             WHERE a.is_active = 1 {} \
             ORDER BY h.market_value DESC, h.ticker",
            condition
        ))?;

        let holdings = stmt
            .query_map(refs.as_slice(), |row| {
                Ok(Holding {
                    account_id: row.get(0)?,
                    ticker: row.get(1)?,
                    name: row.get(2)?,
                    asset_class: row.get(3)?,
                    quantity: row.get(4)?,
                    cost_basis: row.get(5)?,
                    market_value: row.get(6)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(holdings)
    }
}
