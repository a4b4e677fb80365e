//! Boundary traits the query router calls into
//!
//! The engine never touches storage directly. Analytics aggregates and
//! transaction lookups are delegated to implementations of these traits; the
//! SQLite ledger in [`crate::db`] is one, the in-memory fake in `test_utils`
//! is another.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{
    AllocationSummary, AmountThreshold, CashFlowSummary, DividendSummary, ExpenseSummary,
    FilterSet, HoldingsSummary, IncomeSummary, NetWorthSummary, PerformanceSummary, TimeRange,
    TransactionKind, TransactionRecord,
};

/// Deterministic aggregate calculations, one per aggregate intent
pub trait Analytics {
    fn net_worth(&self, range: &TimeRange, filters: &FilterSet) -> Result<NetWorthSummary>;

    fn performance(&self, range: &TimeRange, filters: &FilterSet) -> Result<PerformanceSummary>;

    fn allocation(&self, range: &TimeRange, filters: &FilterSet) -> Result<AllocationSummary>;

    fn holdings(&self, range: &TimeRange, filters: &FilterSet) -> Result<HoldingsSummary>;

    fn income(&self, range: &TimeRange, filters: &FilterSet) -> Result<IncomeSummary>;

    fn expenses(&self, range: &TimeRange, filters: &FilterSet) -> Result<ExpenseSummary>;

    fn dividends(&self, range: &TimeRange, filters: &FilterSet) -> Result<DividendSummary>;

    fn cash_flow(&self, range: &TimeRange, filters: &FilterSet) -> Result<CashFlowSummary>;
}

/// Transaction lookup by resolved query parameters
pub trait TransactionRepository {
    fn find(&self, query: &TransactionQuery) -> Result<Vec<TransactionRecord>>;
}

/// Parameters for a repository lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionQuery {
    pub range: TimeRange,
    pub kind: Option<TransactionKind>,
    pub category: Option<String>,
    /// Free-text term matched against category, merchant and description
    pub keyword: Option<String>,
    pub merchant: Option<String>,
    pub account: Option<String>,
    pub amount: Option<AmountThreshold>,
    pub include_pending: bool,
    pub limit: Option<i64>,
}

impl TransactionQuery {
    pub fn new(range: TimeRange) -> Self {
        Self {
            range,
            kind: None,
            category: None,
            keyword: None,
            merchant: None,
            account: None,
            amount: None,
            include_pending: true,
            limit: None,
        }
    }

    /// Copy every filter from a resolved filter set
    pub fn with_filters(mut self, filters: &FilterSet) -> Self {
        self.category = filters.category.clone();
        self.keyword = filters.keyword.clone();
        self.merchant = filters.merchant.clone();
        self.account = filters.account.clone();
        self.amount = filters.amount;
        self
    }

    pub fn kind(mut self, kind: TransactionKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn include_pending(mut self, include: bool) -> Self {
        self.include_pending = include;
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether a record satisfies this query
    ///
    /// Mirrors the SQL the ledger builds so in-memory implementations
    /// agree with it. Text filters are case-insensitive substring matches;
    /// thresholds compare the absolute amount.
    pub fn matches(&self, record: &TransactionRecord) -> bool {
        if !self.range.covers(record.date, record.timestamp) {
            return false;
        }
        if let Some(kind) = self.kind {
            if record.kind != kind {
                return false;
            }
        }
        if !self.include_pending && record.pending {
            return false;
        }
        if let Some(category) = &self.category {
            match &record.category {
                Some(c) if c.eq_ignore_ascii_case(category) => {}
                _ => return false,
            }
        }
        if let Some(merchant) = &self.merchant {
            if !contains_ci(&record.merchant, merchant) {
                return false;
            }
        }
        if let Some(keyword) = &self.keyword {
            let in_category = record
                .category
                .as_deref()
                .is_some_and(|c| contains_ci(c, keyword));
            if !in_category
                && !contains_ci(&record.merchant, keyword)
                && !contains_ci(&record.description, keyword)
            {
                return false;
            }
        }
        if let Some(account) = &self.account {
            if record.account_id != *account && !contains_ci(&record.account_id, account) {
                return false;
            }
        }
        if let Some(threshold) = &self.amount {
            if !threshold.matches(record.amount.abs()) {
                return false;
            }
        }
        true
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}
