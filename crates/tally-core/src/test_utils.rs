//! Test utilities for tally-core
//!
//! In-memory collaborators for exercising the query engine without SQLite:
//! [`FakeLedger`] implements both collaborator traits over plain vectors and
//! records what it was asked, [`FailingLedger`] fails every call.

use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::{NaiveDate, NaiveDateTime};

use crate::collaborators::{Analytics, TransactionQuery, TransactionRepository};
use crate::error::{Error, Result};
use crate::models::*;

/// In-memory ledger implementing [`Analytics`] and [`TransactionRepository`]
///
/// Accounts are matched by name, transactions by their `account_id` string,
/// so tests usually use the account name as the id.
#[derive(Default)]
pub struct FakeLedger {
    pub accounts: Vec<Account>,
    pub transactions: Vec<TransactionRecord>,
    pub holdings: Vec<Holding>,
    calls: Mutex<Vec<String>>,
    queries: Mutex<Vec<TransactionQuery>>,
}

impl FakeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(mut self, name: &str, kind: AccountKind, balance: f64) -> Self {
        let id = self.accounts.len() as i64 + 1;
        self.accounts.push(Account {
            id,
            name: name.to_string(),
            kind,
            institution: None,
            balance,
            is_active: true,
        });
        self
    }

    pub fn with_transaction(mut self, record: TransactionRecord) -> Self {
        self.transactions.push(record);
        self
    }

    pub fn with_holding(
        mut self,
        ticker: &str,
        asset_class: &str,
        cost_basis: f64,
        market_value: f64,
    ) -> Self {
        self.holdings.push(Holding {
            account_id: 1,
            ticker: ticker.to_string(),
            name: None,
            asset_class: asset_class.to_string(),
            quantity: 1.0,
            cost_basis,
            market_value,
        });
        self
    }

    /// Names of the collaborator methods called so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Repository queries received so far, in order
    pub fn queries(&self) -> Vec<TransactionQuery> {
        self.queries.lock().unwrap().clone()
    }

    fn record_call(&self, name: &str) {
        self.calls.lock().unwrap().push(name.to_string());
    }

    fn select(
        &self,
        range: &TimeRange,
        filters: &FilterSet,
        kind: TransactionKind,
    ) -> Vec<&TransactionRecord> {
        let query = TransactionQuery::new(*range).with_filters(filters).kind(kind);
        self.transactions
            .iter()
            .filter(|r| query.matches(r))
            .collect()
    }

    fn account_matches(&self, account: &Account, filters: &FilterSet) -> bool {
        match filters.account.as_deref() {
            Some(needle) => {
                account.id.to_string() == needle
                    || account.name.to_lowercase().contains(&needle.to_lowercase())
            }
            None => true,
        }
    }
}

/// Sum `amount * sign` per label, largest first
fn group(
    records: &[&TransactionRecord],
    label: impl Fn(&TransactionRecord) -> String,
    sign: f64,
) -> Vec<BreakdownEntry> {
    let mut groups: BTreeMap<String, (f64, i64)> = BTreeMap::new();
    for record in records {
        let entry = groups.entry(label(record)).or_insert((0.0, 0));
        entry.0 += record.amount * sign;
        entry.1 += 1;
    }
    let mut entries: Vec<BreakdownEntry> = groups
        .into_iter()
        .map(|(label, (total, count))| BreakdownEntry::new(label, total, count))
        .collect();
    entries.sort_by(|a, b| b.total.total_cmp(&a.total).then_with(|| a.label.cmp(&b.label)));
    entries
}

fn total(entries: &[BreakdownEntry]) -> f64 {
    entries.iter().map(|e| e.total).sum()
}

impl Analytics for FakeLedger {
    fn net_worth(&self, _range: &TimeRange, filters: &FilterSet) -> Result<NetWorthSummary> {
        self.record_call("net_worth");
        let mut summary = NetWorthSummary {
            assets: 0.0,
            liabilities: 0.0,
            net_worth: 0.0,
            by_account: Vec::new(),
        };
        for account in self
            .accounts
            .iter()
            .filter(|a| a.is_active && self.account_matches(a, filters))
        {
            let signed = if account.kind.is_liability() {
                summary.liabilities += account.balance;
                -account.balance
            } else {
                summary.assets += account.balance;
                account.balance
            };
            summary
                .by_account
                .push(BreakdownEntry::new(account.name.clone(), signed, 1));
        }
        summary.net_worth = summary.assets - summary.liabilities;
        Ok(summary)
    }

    fn performance(&self, range: &TimeRange, filters: &FilterSet) -> Result<PerformanceSummary> {
        self.record_call("performance");
        let cost_basis: f64 = self.holdings.iter().map(|h| h.cost_basis).sum();
        let market_value: f64 = self.holdings.iter().map(|h| h.market_value).sum();
        let dividends = self.select(range, filters, TransactionKind::Dividend);
        Ok(PerformanceSummary {
            cost_basis,
            market_value,
            unrealized_gain: market_value - cost_basis,
            return_percent: if cost_basis > 0.0 {
                (market_value - cost_basis) / cost_basis * 100.0
            } else {
                0.0
            },
            dividends: -dividends.iter().map(|r| r.amount).sum::<f64>(),
        })
    }

    fn allocation(&self, _range: &TimeRange, _filters: &FilterSet) -> Result<AllocationSummary> {
        self.record_call("allocation");
        let mut by_class: BTreeMap<&str, (f64, i64)> = BTreeMap::new();
        for holding in &self.holdings {
            let entry = by_class.entry(&holding.asset_class).or_insert((0.0, 0));
            entry.0 += holding.market_value;
            entry.1 += 1;
        }
        Ok(AllocationSummary {
            total_value: self.holdings.iter().map(|h| h.market_value).sum(),
            by_asset_class: by_class
                .into_iter()
                .map(|(class, (total, count))| BreakdownEntry::new(class, total, count))
                .collect(),
        })
    }

    fn holdings(&self, _range: &TimeRange, _filters: &FilterSet) -> Result<HoldingsSummary> {
        self.record_call("holdings");
        Ok(HoldingsSummary {
            total_value: self.holdings.iter().map(|h| h.market_value).sum(),
            positions: self.holdings.clone(),
        })
    }

    fn income(&self, range: &TimeRange, filters: &FilterSet) -> Result<IncomeSummary> {
        self.record_call("income");
        let records = self.select(range, filters, TransactionKind::Income);
        let by_source = group(&records, |r| r.merchant.clone(), -1.0);
        Ok(IncomeSummary {
            total: total(&by_source),
            by_source,
        })
    }

    fn expenses(&self, range: &TimeRange, filters: &FilterSet) -> Result<ExpenseSummary> {
        self.record_call("expenses");
        let records = self.select(range, filters, TransactionKind::Expense);
        let by_category = group(
            &records,
            |r| {
                r.category
                    .clone()
                    .unwrap_or_else(|| "Uncategorized".to_string())
            },
            1.0,
        );
        Ok(ExpenseSummary {
            total: total(&by_category),
            transaction_count: records.len() as i64,
            by_category,
        })
    }

    fn dividends(&self, range: &TimeRange, filters: &FilterSet) -> Result<DividendSummary> {
        self.record_call("dividends");
        let records = self.select(range, filters, TransactionKind::Dividend);
        let by_ticker = group(
            &records,
            |r| r.ticker.clone().unwrap_or_else(|| r.merchant.clone()),
            -1.0,
        );
        Ok(DividendSummary {
            total: total(&by_ticker),
            by_ticker,
        })
    }

    fn cash_flow(&self, range: &TimeRange, filters: &FilterSet) -> Result<CashFlowSummary> {
        let income = self.income(range, filters)?;
        let expenses = self.expenses(range, filters)?;
        self.record_call("cash_flow");
        Ok(CashFlowSummary {
            income: income.total,
            expenses: expenses.total,
            net: income.total - expenses.total,
            income_breakdown: income.by_source,
            expense_breakdown: expenses.by_category,
        })
    }
}

impl TransactionRepository for FakeLedger {
    fn find(&self, query: &TransactionQuery) -> Result<Vec<TransactionRecord>> {
        self.record_call("find");
        self.queries.lock().unwrap().push(query.clone());

        let mut records: Vec<TransactionRecord> = self
            .transactions
            .iter()
            .filter(|r| query.matches(r))
            .cloned()
            .collect();
        records.sort_by(|a, b| b.date.cmp(&a.date).then(b.timestamp.cmp(&a.timestamp)));
        if let Some(limit) = query.limit {
            records.truncate(limit.max(0) as usize);
        }
        Ok(records)
    }
}

/// Collaborator whose every call fails with the same error
pub struct FailingLedger {
    pub message: String,
}

impl FailingLedger {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }

    fn fail<T>(&self) -> Result<T> {
        Err(Error::NotFound(self.message.clone()))
    }
}

impl Analytics for FailingLedger {
    fn net_worth(&self, _: &TimeRange, _: &FilterSet) -> Result<NetWorthSummary> {
        self.fail()
    }
    fn performance(&self, _: &TimeRange, _: &FilterSet) -> Result<PerformanceSummary> {
        self.fail()
    }
    fn allocation(&self, _: &TimeRange, _: &FilterSet) -> Result<AllocationSummary> {
        self.fail()
    }
    fn holdings(&self, _: &TimeRange, _: &FilterSet) -> Result<HoldingsSummary> {
        self.fail()
    }
    fn income(&self, _: &TimeRange, _: &FilterSet) -> Result<IncomeSummary> {
        self.fail()
    }
    fn expenses(&self, _: &TimeRange, _: &FilterSet) -> Result<ExpenseSummary> {
        self.fail()
    }
    fn dividends(&self, _: &TimeRange, _: &FilterSet) -> Result<DividendSummary> {
        self.fail()
    }
    fn cash_flow(&self, _: &TimeRange, _: &FilterSet) -> Result<CashFlowSummary> {
        self.fail()
    }
}

impl TransactionRepository for FailingLedger {
    fn find(&self, _: &TransactionQuery) -> Result<Vec<TransactionRecord>> {
        self.fail()
    }
}

/// Builder for test transaction records
pub struct RecordBuilder {
    record: TransactionRecord,
}

impl RecordBuilder {
    /// An expense on `date` at `merchant`, account "checking", no time of day
    pub fn expense(id: &str, date: NaiveDate, merchant: &str, amount: f64) -> Self {
        Self {
            record: TransactionRecord {
                id: id.to_string(),
                account_id: "checking".to_string(),
                date,
                timestamp: None,
                merchant: merchant.to_string(),
                description: merchant.to_string(),
                amount,
                category: None,
                kind: TransactionKind::Expense,
                ticker: None,
                pending: false,
            },
        }
    }

    /// Set the time of day (also moves the date to match)
    pub fn at(mut self, timestamp: NaiveDateTime) -> Self {
        self.record.date = timestamp.date();
        self.record.timestamp = Some(timestamp);
        self
    }

    pub fn category(mut self, category: &str) -> Self {
        self.record.category = Some(category.to_string());
        self
    }

    pub fn kind(mut self, kind: TransactionKind) -> Self {
        self.record.kind = kind;
        self
    }

    pub fn account(mut self, account: &str) -> Self {
        self.record.account_id = account.to_string();
        self
    }

    pub fn ticker(mut self, ticker: &str) -> Self {
        self.record.ticker = Some(ticker.to_string());
        self
    }

    pub fn pending(mut self) -> Self {
        self.record.pending = true;
        self
    }

    pub fn build(self) -> TransactionRecord {
        self.record
    }
}
