//! Aggregates over the ledger, exposed through the `Analytics` trait
//!
//! Balances and positions are current values, so net worth, allocation,
//! holdings and the position half of performance ignore the time range.
//! Everything derived from transactions is restricted to it.

use rusqlite::params_from_iter;
use tracing::debug;

use super::transaction_filter::{account_condition, TransactionFilter};
use super::Database;
use crate::collaborators::Analytics;
use crate::error::Result;
use crate::models::{
    AllocationSummary, BreakdownEntry, CashFlowSummary, DividendSummary, ExpenseSummary,
    FilterSet, HoldingsSummary, IncomeSummary, NetWorthSummary, PerformanceSummary, TimeRange,
    TransactionKind,
};
use crate::query::round_cents;

/// Fill in each entry's share of the combined total
fn with_percentages(mut entries: Vec<BreakdownEntry>) -> Vec<BreakdownEntry> {
    let total: f64 = entries.iter().map(|e| e.total).sum();
    if total > 0.0 {
        for entry in &mut entries {
            entry.percentage = Some(round_cents(entry.total / total * 100.0));
        }
    }
    entries
}

impl Database {
    /// Grouped transaction totals for the given kinds
    ///
    /// `sign` flips money-in kinds (stored negative) to positive totals.
    fn grouped_totals(
        &self,
        range: &TimeRange,
        filters: &FilterSet,
        kinds: &[TransactionKind],
        group_expr: &str,
        sign: f64,
    ) -> Result<Vec<BreakdownEntry>> {
        let conn = self.conn()?;
        let result = TransactionFilter::from_filters(range, filters)
            .kinds(kinds)
            .build();
        let sql = result.build_grouped_sum_query(group_expr, sign);

        let mut stmt = conn.prepare(&sql)?;
        let entries = stmt
            .query_map(result.params_refs().as_slice(), |row| {
                let label: String = row.get(0)?;
                let total: f64 = row.get(1)?;
                Ok(BreakdownEntry::new(label, round_cents(total), row.get(2)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(with_percentages(entries))
    }
}

impl Analytics for Database {
    fn net_worth(&self, _range: &TimeRange, filters: &FilterSet) -> Result<NetWorthSummary> {
        let conn = self.conn()?;

        let (condition, params) = match filters.account.as_deref() {
            Some(account) if !account.trim().is_empty() => {
                let (condition, params) = account_condition(account);
                (format!("AND {}", condition), params)
            }
            _ => (String::new(), Vec::new()),
        };

        // Cash balance plus the market value of any positions held in the account
        let mut stmt = conn.prepare(&format!(
            "SELECT a.name, a.kind, a.balance + COALESCE(\
                 (SELECT SUM(h.market_value) FROM holdings h WHERE h.account_id = a.id), 0) \
             FROM accounts a WHERE a.is_active = 1 {} ORDER BY a.name",
            condition
        ))?;
        let rows = stmt
            .query_map(params_from_iter(params.iter()), |row| {
                let name: String = row.get(0)?;
                let kind: String = row.get(1)?;
                let value: f64 = row.get(2)?;
                Ok((name, kind, value))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut assets = 0.0;
        let mut liabilities = 0.0;
        let mut by_account = Vec::with_capacity(rows.len());
        for (name, kind, value) in rows {
            let kind: crate::models::AccountKind = kind.parse().unwrap_or_default();
            let signed = if kind.is_liability() {
                liabilities += value.abs();
                -value.abs()
            } else {
                assets += value;
                value
            };
            by_account.push(BreakdownEntry::new(name, round_cents(signed), 1));
        }
        by_account.sort_by(|a, b| {
            b.total
                .partial_cmp(&a.total)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.label.cmp(&b.label))
        });

        debug!(
            "Net worth over {} accounts: assets {:.2}, liabilities {:.2}",
            by_account.len(),
            assets,
            liabilities
        );

        Ok(NetWorthSummary {
            assets: round_cents(assets),
            liabilities: round_cents(liabilities),
            net_worth: round_cents(assets - liabilities),
            by_account,
        })
    }

    fn performance(&self, range: &TimeRange, filters: &FilterSet) -> Result<PerformanceSummary> {
        let positions = self.list_holdings(filters.account.as_deref())?;
        let cost_basis: f64 = positions.iter().map(|h| h.cost_basis).sum();
        let market_value: f64 = positions.iter().map(|h| h.market_value).sum();
        let unrealized_gain = market_value - cost_basis;
        let return_percent = if cost_basis > 0.0 {
            unrealized_gain / cost_basis * 100.0
        } else {
            0.0
        };
        let dividends = self.dividends(range, filters)?.total;

        Ok(PerformanceSummary {
            cost_basis: round_cents(cost_basis),
            market_value: round_cents(market_value),
            unrealized_gain: round_cents(unrealized_gain),
            return_percent: round_cents(return_percent),
            dividends,
        })
    }

    fn allocation(&self, _range: &TimeRange, filters: &FilterSet) -> Result<AllocationSummary> {
        let positions = self.list_holdings(filters.account.as_deref())?;

        let mut by_class: std::collections::BTreeMap<&str, (f64, i64)> =
            std::collections::BTreeMap::new();
        for holding in &positions {
            let entry = by_class
                .entry(holding.asset_class.as_str())
                .or_insert((0.0, 0));
            entry.0 += holding.market_value;
            entry.1 += 1;
        }

        let mut entries: Vec<BreakdownEntry> = by_class
            .into_iter()
            .map(|(class, (total, count))| BreakdownEntry::new(class, round_cents(total), count))
            .collect();
        entries.sort_by(|a, b| {
            b.total
                .partial_cmp(&a.total)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.label.cmp(&b.label))
        });

        Ok(AllocationSummary {
            total_value: round_cents(positions.iter().map(|h| h.market_value).sum()),
            by_asset_class: with_percentages(entries),
        })
    }

    fn holdings(&self, _range: &TimeRange, filters: &FilterSet) -> Result<HoldingsSummary> {
        let positions = self.list_holdings(filters.account.as_deref())?;
        Ok(HoldingsSummary {
            total_value: round_cents(positions.iter().map(|h| h.market_value).sum()),
            positions,
        })
    }

    fn income(&self, range: &TimeRange, filters: &FilterSet) -> Result<IncomeSummary> {
        let by_source =
            self.grouped_totals(range, filters, &[TransactionKind::Income], "t.merchant", -1.0)?;
        Ok(IncomeSummary {
            total: round_cents(by_source.iter().map(|e| e.total).sum()),
            by_source,
        })
    }

    fn expenses(&self, range: &TimeRange, filters: &FilterSet) -> Result<ExpenseSummary> {
        let by_category = self.grouped_totals(
            range,
            filters,
            &[TransactionKind::Expense],
            "COALESCE(t.category, 'Uncategorized')",
            1.0,
        )?;
        Ok(ExpenseSummary {
            total: round_cents(by_category.iter().map(|e| e.total).sum()),
            transaction_count: by_category.iter().map(|e| e.count).sum(),
            by_category,
        })
    }

    fn dividends(&self, range: &TimeRange, filters: &FilterSet) -> Result<DividendSummary> {
        let by_ticker = self.grouped_totals(
            range,
            filters,
            &[TransactionKind::Dividend],
            "COALESCE(t.ticker, t.merchant)",
            -1.0,
        )?;
        Ok(DividendSummary {
            total: round_cents(by_ticker.iter().map(|e| e.total).sum()),
            by_ticker,
        })
    }

    fn cash_flow(&self, range: &TimeRange, filters: &FilterSet) -> Result<CashFlowSummary> {
        let income = self.income(range, filters)?;
        let expenses = self.expenses(range, filters)?;
        Ok(CashFlowSummary {
            income: income.total,
            expenses: expenses.total,
            net: round_cents(income.total - expenses.total),
            income_breakdown: income.by_source,
            expense_breakdown: expenses.by_category,
        })
    }
}
