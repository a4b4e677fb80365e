//! Domain models for Tally

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// What a natural-language query is asking for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    NetWorth,
    Performance,
    Allocation,
    Holdings,
    Transactions,
    Income,
    Expense,
    CategorySpending,
    MerchantSpending,
    LunchSpending,
    Dividend,
    CashFlow,
    Unrecognized,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NetWorth => "net_worth",
            Self::Performance => "performance",
            Self::Allocation => "allocation",
            Self::Holdings => "holdings",
            Self::Transactions => "transactions",
            Self::Income => "income",
            Self::Expense => "expense",
            Self::CategorySpending => "category_spending",
            Self::MerchantSpending => "merchant_spending",
            Self::LunchSpending => "lunch_spending",
            Self::Dividend => "dividend",
            Self::CashFlow => "cash_flow",
            Self::Unrecognized => "unrecognized",
        }
    }

    /// Human-readable label for CLI output
    pub fn label(&self) -> &'static str {
        match self {
            Self::NetWorth => "Net worth",
            Self::Performance => "Portfolio performance",
            Self::Allocation => "Asset allocation",
            Self::Holdings => "Holdings",
            Self::Transactions => "Transactions",
            Self::Income => "Income",
            Self::Expense => "Expenses",
            Self::CategorySpending => "Category spending",
            Self::MerchantSpending => "Merchant spending",
            Self::LunchSpending => "Lunch spending",
            Self::Dividend => "Dividends",
            Self::CashFlow => "Cash flow",
            Self::Unrecognized => "Unrecognized",
        }
    }

    /// Whether merchant, category, keyword and amount filters narrow this intent
    ///
    /// Portfolio and income-side aggregates are scoped by account only.
    pub fn uses_transaction_filters(&self) -> bool {
        matches!(
            self,
            Self::Transactions
                | Self::Expense
                | Self::CategorySpending
                | Self::MerchantSpending
                | Self::LunchSpending
        )
    }

    /// Get all intents
    pub fn all() -> &'static [Intent] {
        &[
            Self::NetWorth,
            Self::Performance,
            Self::Allocation,
            Self::Holdings,
            Self::Transactions,
            Self::Income,
            Self::Expense,
            Self::CategorySpending,
            Self::MerchantSpending,
            Self::LunchSpending,
            Self::Dividend,
            Self::CashFlow,
            Self::Unrecognized,
        ]
    }
}

impl std::str::FromStr for Intent {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Intent::all()
            .iter()
            .find(|i| i.as_str() == s.to_lowercase())
            .copied()
            .ok_or_else(|| format!("Unknown intent: {}", s))
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A concrete, inclusive window of local wall-clock time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl TimeRange {
    /// Create a range, rejecting `start > end`
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self> {
        if start > end {
            return Err(Error::InvalidData(format!(
                "Time range start {} is after end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// A zero-width range at a single instant (as-of queries)
    pub fn instant(at: NaiveDateTime) -> Self {
        Self { start: at, end: at }
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start.date()
    }

    pub fn end_date(&self) -> NaiveDate {
        self.end.date()
    }

    pub fn is_instant(&self) -> bool {
        self.start == self.end
    }

    /// Whether a calendar date falls within the range (date granularity)
    pub fn contains_date(&self, date: NaiveDate) -> bool {
        date >= self.start_date() && date <= self.end_date()
    }

    /// Whether a transaction falls within the range
    ///
    /// Compares the timestamp when one is recorded; undated-by-time
    /// transactions fall back to date granularity.
    pub fn covers(&self, date: NaiveDate, timestamp: Option<NaiveDateTime>) -> bool {
        match timestamp {
            Some(at) => at >= self.start && at <= self.end,
            None => self.contains_date(date),
        }
    }
}

impl std::fmt::Display for TimeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to {}",
            self.start.format("%Y-%m-%d %H:%M"),
            self.end.format("%Y-%m-%d %H:%M")
        )
    }
}

/// Whether the time range came from the query text or the intent default
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeRangeSource {
    Explicit,
    Default,
}

/// Comparison operator for amount filters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountOperator {
    GreaterThan,
    LessThan,
}

impl AmountOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GreaterThan => "greater_than",
            Self::LessThan => "less_than",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::GreaterThan => ">",
            Self::LessThan => "<",
        }
    }
}

/// An amount comparison extracted from phrases like "over $50"
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AmountThreshold {
    pub operator: AmountOperator,
    pub amount: f64,
}

impl AmountThreshold {
    /// Test a (non-negative) transaction amount against the threshold
    pub fn matches(&self, value: f64) -> bool {
        match self.operator {
            AmountOperator::GreaterThan => value > self.amount,
            AmountOperator::LessThan => value < self.amount,
        }
    }
}

impl std::fmt::Display for AmountThreshold {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ${:.2}", self.operator.symbol(), self.amount)
    }
}

/// Filters resolved from a query. Every field is independently optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSet {
    /// Canonical category from the alias table
    pub category: Option<String>,
    pub merchant: Option<String>,
    /// Account id or name fragment
    pub account: Option<String>,
    pub amount: Option<AmountThreshold>,
    /// Raw spending term that did not resolve to a canonical category
    pub keyword: Option<String>,
}

impl FilterSet {
    pub fn is_empty(&self) -> bool {
        self.category.is_none()
            && self.merchant.is_none()
            && self.account.is_none()
            && self.amount.is_none()
            && self.keyword.is_none()
    }
}

/// What kind of money movement a transaction represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    #[default]
    Expense,
    Income,
    Dividend,
    Transfer,
    Buy,
    Sell,
    Fee,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Expense => "expense",
            Self::Income => "income",
            Self::Dividend => "dividend",
            Self::Transfer => "transfer",
            Self::Buy => "buy",
            Self::Sell => "sell",
            Self::Fee => "fee",
        }
    }
}

impl std::str::FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "expense" | "debit" | "purchase" | "" => Ok(Self::Expense),
            "income" | "credit" | "deposit" | "payroll" => Ok(Self::Income),
            "dividend" => Ok(Self::Dividend),
            "transfer" => Ok(Self::Transfer),
            "buy" => Ok(Self::Buy),
            "sell" => Ok(Self::Sell),
            "fee" => Ok(Self::Fee),
            _ => Err(format!("Unknown transaction kind: {}", s)),
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A transaction as returned by the repository collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: String,
    pub account_id: String,
    pub date: NaiveDate,
    /// Full timestamp when the time of day is known
    pub timestamp: Option<NaiveDateTime>,
    pub merchant: String,
    pub description: String,
    /// Positive = money out (expense), negative = money in
    pub amount: f64,
    pub category: Option<String>,
    pub kind: TransactionKind,
    pub ticker: Option<String>,
    pub pending: bool,
}

/// A transaction to be stored (before DB insertion)
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub date: NaiveDate,
    pub timestamp: Option<NaiveDateTime>,
    pub merchant: String,
    pub description: String,
    pub amount: f64,
    pub category: Option<String>,
    pub kind: TransactionKind,
    pub ticker: Option<String>,
    pub pending: bool,
    /// Hash for deduplication
    pub import_hash: String,
    /// Original import row as JSON (for reprocessing)
    pub original_data: Option<String>,
}

/// Account types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    #[default]
    Checking,
    Savings,
    Credit,
    Brokerage,
    Retirement,
    Loan,
}

impl AccountKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Checking => "checking",
            Self::Savings => "savings",
            Self::Credit => "credit",
            Self::Brokerage => "brokerage",
            Self::Retirement => "retirement",
            Self::Loan => "loan",
        }
    }

    /// Balances of these accounts are owed, not owned
    pub fn is_liability(&self) -> bool {
        matches!(self, Self::Credit | Self::Loan)
    }
}

impl std::str::FromStr for AccountKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "checking" => Ok(Self::Checking),
            "savings" => Ok(Self::Savings),
            "credit" | "credit_card" => Ok(Self::Credit),
            "brokerage" | "investment" => Ok(Self::Brokerage),
            "retirement" | "ira" | "401k" | "roth" => Ok(Self::Retirement),
            "loan" | "mortgage" => Ok(Self::Loan),
            _ => Err(format!("Unknown account kind: {}", s)),
        }
    }
}

impl std::fmt::Display for AccountKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A financial account in the reference ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub name: String,
    pub kind: AccountKind,
    pub institution: Option<String>,
    /// Current balance (amount owed for liabilities)
    pub balance: f64,
    pub is_active: bool,
}

/// An investment position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub account_id: i64,
    pub ticker: String,
    pub name: Option<String>,
    pub asset_class: String,
    pub quantity: f64,
    pub cost_basis: f64,
    pub market_value: f64,
}

/// One row of a grouped total (per category, merchant, account, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakdownEntry {
    pub label: String,
    pub total: f64,
    pub count: i64,
    /// Share of the overall total, when meaningful
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,
    /// Average lunch confidence (lunch breakdowns only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl BreakdownEntry {
    pub fn new(label: impl Into<String>, total: f64, count: i64) -> Self {
        Self {
            label: label.into(),
            total,
            count,
            percentage: None,
            confidence: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetWorthSummary {
    pub assets: f64,
    pub liabilities: f64,
    pub net_worth: f64,
    pub by_account: Vec<BreakdownEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub cost_basis: f64,
    pub market_value: f64,
    pub unrealized_gain: f64,
    pub return_percent: f64,
    /// Dividends received within the range
    pub dividends: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationSummary {
    pub total_value: f64,
    pub by_asset_class: Vec<BreakdownEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingsSummary {
    pub total_value: f64,
    pub positions: Vec<Holding>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomeSummary {
    pub total: f64,
    pub by_source: Vec<BreakdownEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseSummary {
    pub total: f64,
    pub transaction_count: i64,
    pub by_category: Vec<BreakdownEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DividendSummary {
    pub total: f64,
    pub by_ticker: Vec<BreakdownEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlowSummary {
    pub income: f64,
    pub expenses: f64,
    pub net: f64,
    pub income_breakdown: Vec<BreakdownEntry>,
    pub expense_breakdown: Vec<BreakdownEntry>,
}

/// The analytics aggregate behind a result, passed through unmodified
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AggregateDetails {
    NetWorth(NetWorthSummary),
    Performance(PerformanceSummary),
    Allocation(AllocationSummary),
    Holdings(HoldingsSummary),
    Income(IncomeSummary),
    Expense(ExpenseSummary),
    Dividend(DividendSummary),
    CashFlow(CashFlowSummary),
}
