//! Transaction filter builder for constructing dynamic SQL queries
//!
//! Shared by repository lookups and the analytics aggregates so both apply
//! the same date, account, and text semantics.

use crate::collaborators::TransactionQuery;
use super::TIMESTAMP_FORMAT;
use crate::models::{AmountOperator, AmountThreshold, FilterSet, TimeRange, TransactionKind};

/// Columns selected for a full transaction row, in `row_to_record` order
pub(crate) const TRANSACTION_COLUMNS: &str = "t.id, t.account_id, t.date, t.timestamp, \
     t.merchant, t.description, t.amount, t.category, t.kind, t.ticker, t.pending";

/// Builder for constructing transaction query filters
///
/// The lifetime `'query` is how long the borrowed text filters must live.
#[derive(Default)]
pub struct TransactionFilter<'query> {
    pub range: Option<TimeRange>,
    pub kinds: Vec<TransactionKind>,
    pub category: Option<&'query str>,
    pub keyword: Option<&'query str>,
    pub merchant: Option<&'query str>,
    pub account: Option<&'query str>,
    pub amount: Option<AmountThreshold>,
    pub include_pending: bool,
    pub limit: Option<i64>,
}

/// Result of building a filter - contains SQL components and parameters
pub struct FilterResult {
    /// JOIN clause for account-name matching
    pub join_clause: &'static str,
    /// WHERE clause including "WHERE" keyword (empty if no conditions)
    pub where_clause: String,
    /// ORDER BY clause including "ORDER BY" keyword
    pub order_clause: String,
    /// LIMIT clause (empty if unlimited)
    pub limit_clause: String,
    /// Parameters for the query (boxed for rusqlite compatibility)
    pub params: Vec<Box<dyn rusqlite::ToSql>>,
}

impl<'query> TransactionFilter<'query> {
    /// Create a new filter builder (pending transactions included)
    pub fn new() -> Self {
        Self {
            include_pending: true,
            ..Default::default()
        }
    }

    /// Filter from a repository query
    pub fn from_query(query: &'query TransactionQuery) -> Self {
        let mut filter = Self::new()
            .time_range(&query.range)
            .category(query.category.as_deref())
            .keyword(query.keyword.as_deref())
            .merchant(query.merchant.as_deref())
            .account(query.account.as_deref())
            .amount(query.amount)
            .include_pending(query.include_pending);
        filter.kinds = query.kind.into_iter().collect();
        filter.limit = query.limit;
        filter
    }

    /// Filter from an analytics call's range and filter set
    pub fn from_filters(range: &TimeRange, filters: &'query FilterSet) -> Self {
        Self::new()
            .time_range(range)
            .category(filters.category.as_deref())
            .keyword(filters.keyword.as_deref())
            .merchant(filters.merchant.as_deref())
            .account(filters.account.as_deref())
            .amount(filters.amount)
    }

    /// Restrict to the range, inclusive
    ///
    /// Rows with a timestamp are compared to the second; rows without one
    /// match on their date.
    pub fn time_range(mut self, range: &TimeRange) -> Self {
        self.range = Some(*range);
        self
    }

    /// Restrict to any of these kinds
    pub fn kinds(mut self, kinds: &[TransactionKind]) -> Self {
        self.kinds = kinds.to_vec();
        self
    }

    /// Exact category match (case-insensitive)
    pub fn category(mut self, category: Option<&'query str>) -> Self {
        self.category = category;
        self
    }

    /// Substring match on category, merchant, or description
    pub fn keyword(mut self, keyword: Option<&'query str>) -> Self {
        self.keyword = keyword;
        self
    }

    /// Substring match on merchant
    pub fn merchant(mut self, merchant: Option<&'query str>) -> Self {
        self.merchant = merchant;
        self
    }

    /// Account id, or a fragment of the account name
    pub fn account(mut self, account: Option<&'query str>) -> Self {
        self.account = account;
        self
    }

    /// Compare the absolute amount against a threshold
    pub fn amount(mut self, amount: Option<AmountThreshold>) -> Self {
        self.amount = amount;
        self
    }

    pub fn include_pending(mut self, value: bool) -> Self {
        self.include_pending = value;
        self
    }

    /// Build the filter components
    pub fn build(self) -> FilterResult {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        // Time range filter
        if let Some(range) = self.range {
            conditions.push(
                "t.date >= ? AND t.date <= ? \
                 AND (t.timestamp IS NULL OR (t.timestamp >= ? AND t.timestamp <= ?))"
                    .to_string(),
            );
            params.push(Box::new(range.start_date().to_string()));
            params.push(Box::new(range.end_date().to_string()));
            params.push(Box::new(range.start().format(TIMESTAMP_FORMAT).to_string()));
            params.push(Box::new(range.end().format(TIMESTAMP_FORMAT).to_string()));
        }

        if !self.kinds.is_empty() {
            let placeholders: Vec<&str> = self.kinds.iter().map(|_| "?").collect();
            conditions.push(format!("t.kind IN ({})", placeholders.join(", ")));
            for kind in &self.kinds {
                params.push(Box::new(kind.as_str()));
            }
        }

        if let Some(category) = non_empty(self.category) {
            conditions.push("t.category = ? COLLATE NOCASE".to_string());
            params.push(Box::new(category.to_string()));
        }

        // Keyword: category, merchant, or description
        if let Some(keyword) = non_empty(self.keyword) {
            conditions.push(
                "(t.category LIKE ? COLLATE NOCASE OR t.merchant LIKE ? COLLATE NOCASE \
                 OR t.description LIKE ? COLLATE NOCASE)"
                    .to_string(),
            );
            let pattern = format!("%{}%", keyword);
            params.push(Box::new(pattern.clone()));
            params.push(Box::new(pattern.clone()));
            params.push(Box::new(pattern));
        }

        if let Some(merchant) = non_empty(self.merchant) {
            conditions.push(
                "(t.merchant LIKE ? COLLATE NOCASE OR t.description LIKE ? COLLATE NOCASE)"
                    .to_string(),
            );
            let pattern = format!("%{}%", merchant);
            params.push(Box::new(pattern.clone()));
            params.push(Box::new(pattern));
        }

        if let Some(account) = non_empty(self.account) {
            let (condition, account_params) = account_condition(account);
            conditions.push(condition);
            params.extend(account_params);
        }

        if let Some(threshold) = self.amount {
            let op = match threshold.operator {
                AmountOperator::GreaterThan => ">",
                AmountOperator::LessThan => "<",
            };
            conditions.push(format!("ABS(t.amount) {} ?", op));
            params.push(Box::new(threshold.amount));
        }

        if !self.include_pending {
            conditions.push("t.pending = 0".to_string());
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let limit_clause = match self.limit {
            Some(limit) => {
                params.push(Box::new(limit));
                "LIMIT ?".to_string()
            }
            None => String::new(),
        };

        FilterResult {
            join_clause: "JOIN accounts a ON t.account_id = a.id",
            where_clause,
            order_clause: "ORDER BY t.date DESC, t.timestamp DESC, t.id DESC".to_string(),
            limit_clause,
            params,
        }
    }
}

/// Match an account by id or by case-insensitive name fragment (alias `a`)
pub(crate) fn account_condition(account: &str) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
    let account = account.trim();
    (
        "(CAST(a.id AS TEXT) = ? OR a.name LIKE ? COLLATE NOCASE)".to_string(),
        vec![
            Box::new(account.to_string()),
            Box::new(format!("%{}%", account)),
        ],
    )
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

impl FilterResult {
    /// Full-row SELECT, ordered newest first
    pub fn build_select_query(&self) -> String {
        format!(
            "SELECT {} FROM transactions t {} {} {} {}",
            TRANSACTION_COLUMNS,
            self.join_clause,
            self.where_clause,
            self.order_clause,
            self.limit_clause
        )
    }

    /// Build a COUNT query
    pub fn build_count_query(&self) -> String {
        format!(
            "SELECT COUNT(*) FROM transactions t {} {}",
            self.join_clause, self.where_clause
        )
    }

    /// Grouped SUM/COUNT over `group_expr`, largest total first
    ///
    /// `sign` is applied to the sum so money-in kinds read as positive.
    pub fn build_grouped_sum_query(&self, group_expr: &str, sign: f64) -> String {
        format!(
            "SELECT {group} AS label, {sign} * SUM(t.amount) AS total, COUNT(*) \
             FROM transactions t {join} {where_} \
             GROUP BY label ORDER BY total DESC, label ASC",
            group = group_expr,
            sign = sign,
            join = self.join_clause,
            where_ = self.where_clause
        )
    }

    /// Get parameter references for query execution
    pub fn params_refs(&self) -> Vec<&dyn rusqlite::ToSql> {
        self.params.iter().map(|p| p.as_ref()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn range() -> TimeRange {
        TimeRange::new(
            NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 31)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_empty_filter_has_no_where() {
        let result = TransactionFilter::new().build();
        assert!(result.where_clause.is_empty());
        assert!(result.params.is_empty());
        assert!(result.limit_clause.is_empty());
    }

    #[test]
    fn test_filter_conditions_and_param_order() {
        let query = TransactionQuery::new(range())
            .kind(TransactionKind::Expense)
            .include_pending(false)
            .limit(10);
        let result = TransactionFilter::from_query(&query).build();

        assert!(result.where_clause.contains("t.date >= ? AND t.date <= ?"));
        assert!(result
            .where_clause
            .contains("(t.timestamp IS NULL OR (t.timestamp >= ? AND t.timestamp <= ?))"));
        assert!(result.where_clause.contains("t.kind IN (?)"));
        assert!(result.where_clause.contains("t.pending = 0"));
        assert_eq!(result.limit_clause, "LIMIT ?");
        // 2 dates + 2 timestamps + kind + limit
        assert_eq!(result.params.len(), 6);
    }

    #[test]
    fn test_blank_text_filters_are_ignored() {
        let result = TransactionFilter::new()
            .merchant(Some("  "))
            .category(Some(""))
            .build();
        assert!(result.where_clause.is_empty());
    }

    #[test]
    fn test_amount_threshold_uses_absolute_value() {
        let result = TransactionFilter::new()
            .amount(Some(AmountThreshold {
                operator: AmountOperator::LessThan,
                amount: 20.0,
            }))
            .build();
        assert_eq!(result.where_clause, "WHERE ABS(t.amount) < ?");
    }
}
