//! Dispatch of resolved queries to the analytics and repository collaborators

use std::collections::BTreeMap;

use tracing::debug;

use crate::collaborators::{Analytics, TransactionQuery, TransactionRepository};
use crate::error::Result;
use crate::lunch::{ConfidenceTier, LunchScorer};
use crate::models::{AggregateDetails, BreakdownEntry, Intent, TransactionKind, TransactionRecord};

use super::{round_cents, QueryContext, QueryResult, QueryTransaction};

/// Which field transaction-listing breakdowns group by
#[derive(Debug, Clone, Copy)]
enum GroupBy {
    Merchant,
    Category,
}

/// Executes a [`QueryContext`] against the collaborators
///
/// Collaborator errors are returned unchanged.
pub struct QueryRouter<'a> {
    analytics: &'a dyn Analytics,
    repository: &'a dyn TransactionRepository,
    scorer: &'a LunchScorer,
    include_pending: bool,
}

impl<'a> QueryRouter<'a> {
    pub fn new(
        analytics: &'a dyn Analytics,
        repository: &'a dyn TransactionRepository,
        scorer: &'a LunchScorer,
    ) -> Self {
        Self {
            analytics,
            repository,
            scorer,
            include_pending: true,
        }
    }

    /// Whether pending transactions are passed to the repository filter
    pub fn include_pending(mut self, include: bool) -> Self {
        self.include_pending = include;
        self
    }

    pub fn execute(&self, ctx: &QueryContext) -> Result<QueryResult> {
        let mut result = QueryResult::empty(ctx);
        let range = ctx.time_range();
        let filters = ctx.filters();

        debug!("Routing {} query over {}", ctx.intent(), range);

        match ctx.intent() {
            Intent::Unrecognized => {
                result.suggestions = ctx.suggestions().to_vec();
            }
            Intent::NetWorth => {
                let summary = self.analytics.net_worth(range, filters)?;
                result.total = summary.net_worth;
                result.breakdown = summary.by_account.clone();
                result.details = Some(AggregateDetails::NetWorth(summary));
            }
            Intent::Performance => {
                let summary = self.analytics.performance(range, filters)?;
                result.total = summary.unrealized_gain;
                result.details = Some(AggregateDetails::Performance(summary));
            }
            Intent::Allocation => {
                let summary = self.analytics.allocation(range, filters)?;
                result.total = summary.total_value;
                result.breakdown = summary.by_asset_class.clone();
                result.details = Some(AggregateDetails::Allocation(summary));
            }
            Intent::Holdings => {
                let summary = self.analytics.holdings(range, filters)?;
                result.total = summary.total_value;
                result.breakdown = summary
                    .positions
                    .iter()
                    .map(|h| {
                        let mut entry = BreakdownEntry::new(h.ticker.clone(), h.market_value, 1);
                        if summary.total_value > 0.0 {
                            entry.percentage =
                                Some(round_cents(h.market_value / summary.total_value * 100.0));
                        }
                        entry
                    })
                    .collect();
                result.details = Some(AggregateDetails::Holdings(summary));
            }
            Intent::Income => {
                let summary = self.analytics.income(range, filters)?;
                result.total = summary.total;
                result.breakdown = summary.by_source.clone();
                result.details = Some(AggregateDetails::Income(summary));
            }
            Intent::Expense => {
                let summary = self.analytics.expenses(range, filters)?;
                result.total = summary.total;
                result.breakdown = summary.by_category.clone();
                result.details = Some(AggregateDetails::Expense(summary));
            }
            Intent::Dividend => {
                let summary = self.analytics.dividends(range, filters)?;
                result.total = summary.total;
                result.breakdown = summary.by_ticker.clone();
                result.details = Some(AggregateDetails::Dividend(summary));
            }
            Intent::CashFlow => {
                let summary = self.analytics.cash_flow(range, filters)?;
                result.total = summary.net;
                let count =
                    |entries: &[BreakdownEntry]| -> i64 { entries.iter().map(|e| e.count).sum() };
                result.breakdown = vec![
                    BreakdownEntry::new(
                        "income",
                        summary.income,
                        count(&summary.income_breakdown),
                    ),
                    BreakdownEntry::new(
                        "expenses",
                        summary.expenses,
                        count(&summary.expense_breakdown),
                    ),
                ];
                result.details = Some(AggregateDetails::CashFlow(summary));
            }
            Intent::CategorySpending => {
                let query = self.base_query(ctx).kind(TransactionKind::Expense);
                self.list_transactions(&mut result, &query, GroupBy::Merchant)?;
            }
            Intent::MerchantSpending => {
                let query = self.base_query(ctx).kind(TransactionKind::Expense);
                self.list_transactions(&mut result, &query, GroupBy::Category)?;
            }
            Intent::Transactions => {
                let query = self.base_query(ctx);
                self.list_transactions(&mut result, &query, GroupBy::Category)?;
            }
            Intent::LunchSpending => {
                self.lunch(ctx, &mut result)?;
            }
        }

        Ok(result)
    }

    fn base_query(&self, ctx: &QueryContext) -> TransactionQuery {
        TransactionQuery::new(*ctx.time_range())
            .with_filters(ctx.filters())
            .include_pending(self.include_pending)
    }

    fn list_transactions(
        &self,
        result: &mut QueryResult,
        query: &TransactionQuery,
        group_by: GroupBy,
    ) -> Result<()> {
        let records = self.repository.find(query)?;
        debug!("Repository returned {} transactions", records.len());

        result.total = round_cents(records.iter().map(|r| r.amount.abs()).sum());
        result.breakdown = breakdown(records.iter(), group_by);
        result.transactions = records
            .into_iter()
            .map(|transaction| QueryTransaction {
                transaction,
                confidence: None,
            })
            .collect();
        Ok(())
    }

    fn lunch(&self, ctx: &QueryContext, result: &mut QueryResult) -> Result<()> {
        // The scorer reads categories itself, so the category filter is dropped
        let mut query = self.base_query(ctx).kind(TransactionKind::Expense);
        query.category = None;
        query.keyword = None;

        let candidates = self.repository.find(&query)?;
        debug!("Scoring {} lunch candidates", candidates.len());

        let mut included = Vec::new();
        let mut uncertain = Vec::new();
        for transaction in candidates {
            let confidence = self.scorer.score(&transaction);
            let tier = confidence.tier;
            let scored = QueryTransaction {
                transaction,
                confidence: Some(confidence),
            };
            match tier {
                ConfidenceTier::Include => included.push(scored),
                ConfidenceTier::Uncertain => uncertain.push(scored),
                ConfidenceTier::Exclude => {}
            }
        }

        debug!(
            "Lunch: {} included, {} uncertain",
            included.len(),
            uncertain.len()
        );

        result.total = round_cents(included.iter().map(|t| t.transaction.amount.abs()).sum());
        result.uncertain_total =
            round_cents(uncertain.iter().map(|t| t.transaction.amount.abs()).sum());
        result.breakdown = lunch_breakdown(&included);
        result.transactions = included;
        result.uncertain_transactions = uncertain;
        Ok(())
    }
}

/// Group by merchant or category, sorted by total descending then label
fn breakdown<'r>(
    records: impl Iterator<Item = &'r TransactionRecord>,
    group_by: GroupBy,
) -> Vec<BreakdownEntry> {
    let mut groups: BTreeMap<String, (f64, i64)> = BTreeMap::new();
    for record in records {
        let label = match group_by {
            GroupBy::Merchant => record.merchant.clone(),
            GroupBy::Category => record
                .category
                .clone()
                .unwrap_or_else(|| "Uncategorized".to_string()),
        };
        let entry = groups.entry(label).or_insert((0.0, 0));
        entry.0 += record.amount.abs();
        entry.1 += 1;
    }

    let grand_total: f64 = groups.values().map(|(total, _)| total).sum();
    let mut entries: Vec<BreakdownEntry> = groups
        .into_iter()
        .map(|(label, (total, count))| {
            let mut entry = BreakdownEntry::new(label, round_cents(total), count);
            if grand_total > 0.0 {
                entry.percentage = Some(round_cents(total / grand_total * 100.0));
            }
            entry
        })
        .collect();
    sort_entries(&mut entries);
    entries
}

/// Per-merchant count, total and average confidence of included lunches
fn lunch_breakdown(included: &[QueryTransaction]) -> Vec<BreakdownEntry> {
    let mut groups: BTreeMap<&str, (f64, i64, u32)> = BTreeMap::new();
    for t in included {
        let entry = groups
            .entry(t.transaction.merchant.as_str())
            .or_insert((0.0, 0, 0));
        entry.0 += t.transaction.amount.abs();
        entry.1 += 1;
        entry.2 += t.confidence.as_ref().map_or(0, |c| c.score as u32);
    }

    let mut entries: Vec<BreakdownEntry> = groups
        .into_iter()
        .map(|(merchant, (total, count, score_sum))| {
            let mut entry = BreakdownEntry::new(merchant, round_cents(total), count);
            let average = score_sum as f64 / count as f64;
            entry.confidence = Some((average * 10.0).round() / 10.0);
            entry
        })
        .collect();
    sort_entries(&mut entries);
    entries
}

fn sort_entries(entries: &mut [BreakdownEntry]) {
    entries.sort_by(|a, b| {
        b.total
            .partial_cmp(&a.total)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.label.cmp(&b.label))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(merchant: &str, amount: f64, category: Option<&str>) -> TransactionRecord {
        TransactionRecord {
            id: merchant.into(),
            account_id: "1".into(),
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            timestamp: None,
            merchant: merchant.into(),
            description: String::new(),
            amount,
            category: category.map(String::from),
            kind: TransactionKind::Expense,
            ticker: None,
            pending: false,
        }
    }

    #[test]
    fn test_breakdown_sorted_by_total_then_label() {
        let records = [
            record("B", 10.0, Some("beer")),
            record("A", 10.0, Some("gas")),
            record("C", 30.0, None),
            record("A", 5.0, Some("gas")),
        ];

        let by_merchant = breakdown(records.iter(), GroupBy::Merchant);
        let labels: Vec<_> = by_merchant.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["C", "A", "B"]);
        assert_eq!(by_merchant[1].count, 2);
        assert_eq!(by_merchant[1].total, 15.0);

        let by_category = breakdown(records.iter(), GroupBy::Category);
        let labels: Vec<_> = by_category.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["Uncategorized", "gas", "beer"]);
        assert_eq!(by_category[0].percentage, Some(54.55));
    }

    use crate::config::QueryConfig;
    use crate::error::Error;
    use crate::models::AccountKind;
    use crate::query::QueryEngine;
    use crate::test_utils::{FailingLedger, FakeLedger, RecordBuilder};
    use chrono::NaiveDateTime;

    fn engine() -> QueryEngine {
        QueryEngine::new(QueryConfig::default()).unwrap()
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 13)
            .unwrap()
            .and_hms_opt(15, 30, 0)
            .unwrap()
    }

    fn feb(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 2, day)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn lunch_ledger() -> FakeLedger {
        FakeLedger::new()
            .with_transaction(
                RecordBuilder::expense("1", feb(5, 0, 0).date(), "King Soupers", 12.43)
                    .at(feb(5, 12, 48))
                    .category("Groceries")
                    .build(),
            )
            .with_transaction(
                RecordBuilder::expense("2", feb(6, 0, 0).date(), "Shell", 45.20)
                    .at(feb(6, 13, 0))
                    .build(),
            )
            .with_transaction(
                RecordBuilder::expense("3", feb(7, 0, 0).date(), "Costco", 180.0)
                    .at(feb(7, 19, 30))
                    .category("Groceries")
                    .build(),
            )
            .with_transaction(
                RecordBuilder::expense("4", feb(8, 0, 0).date(), "Unknown Deli", 9.99)
                    .category("restaurant")
                    .build(),
            )
            // Outside last month
            .with_transaction(
                RecordBuilder::expense("5", NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(), "Chipotle", 11.0)
                    .build(),
            )
    }

    #[test]
    fn test_lunch_query_partitions_by_tier() {
        let ledger = lunch_ledger();
        let result = engine()
            .ask("How much did I spend on lunch last month?", now(), None, &ledger, &ledger)
            .unwrap();

        assert_eq!(result.intent, Intent::LunchSpending);
        let included: Vec<_> = result
            .transactions
            .iter()
            .map(|t| t.transaction.merchant.as_str())
            .collect();
        assert_eq!(included, vec!["Unknown Deli", "King Soupers"]);
        assert_eq!(result.total, 22.42);

        assert_eq!(result.uncertain_transactions.len(), 1);
        let shell = &result.uncertain_transactions[0];
        assert_eq!(shell.transaction.merchant, "Shell");
        assert_eq!(shell.confidence.as_ref().unwrap().score, 40);
        assert_eq!(result.uncertain_total, 45.2);

        assert_eq!(result.breakdown[0].label, "King Soupers");
        assert_eq!(result.breakdown[0].confidence, Some(100.0));
        assert_eq!(result.breakdown[1].confidence, Some(65.0));

        // Category and keyword never narrow the candidate set
        let queries = ledger.queries();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].kind, Some(TransactionKind::Expense));
        assert_eq!(queries[0].category, None);
        assert_eq!(queries[0].keyword, None);
    }

    #[test]
    fn test_lunch_query_with_no_candidates() {
        let ledger = FakeLedger::new();
        let result = engine()
            .ask("lunch last week", now(), None, &ledger, &ledger)
            .unwrap();
        assert_eq!(result.total, 0.0);
        assert!(result.transactions.is_empty());
        assert!(result.breakdown.is_empty());
    }

    #[test]
    fn test_unrecognized_makes_no_collaborator_calls() {
        let ledger = FakeLedger::new();
        let result = engine()
            .ask("what's my wealth looking like", now(), None, &ledger, &ledger)
            .unwrap();
        assert_eq!(result.intent, Intent::Unrecognized);
        assert!(!result.suggestions.is_empty());
        assert!(ledger.calls().is_empty());
    }

    #[test]
    fn test_category_query_groups_by_merchant() {
        let march = |d| NaiveDate::from_ymd_opt(2024, 3, d).unwrap();
        let ledger = FakeLedger::new()
            .with_transaction(
                RecordBuilder::expense("1", march(1), "Brewery One", 18.0)
                    .category("beer")
                    .build(),
            )
            .with_transaction(
                RecordBuilder::expense("2", march(2), "Liquor Barn", 30.0)
                    .category("beer")
                    .build(),
            )
            .with_transaction(
                RecordBuilder::expense("3", march(3), "Brewery One", 22.0)
                    .category("beer")
                    .build(),
            )
            .with_transaction(
                RecordBuilder::expense("4", march(4), "Safeway", 60.0)
                    .category("groceries")
                    .build(),
            );

        let result = engine()
            .ask("How much did I spend on beer?", now(), None, &ledger, &ledger)
            .unwrap();
        assert_eq!(result.total, 70.0);
        assert_eq!(result.transactions.len(), 3);
        assert_eq!(result.breakdown[0].label, "Brewery One");
        assert_eq!(result.breakdown[0].count, 2);
        assert!(result.details.is_none());
    }

    #[test]
    fn test_aggregate_intents_pass_details_through() {
        let ledger = FakeLedger::new()
            .with_account("checking", AccountKind::Checking, 5000.0)
            .with_account("visa", AccountKind::Credit, 1200.0);

        let result = engine()
            .ask("what is my net worth", now(), None, &ledger, &ledger)
            .unwrap();
        assert_eq!(result.total, 3800.0);
        assert_eq!(result.breakdown.len(), 2);
        match result.details {
            Some(AggregateDetails::NetWorth(summary)) => assert_eq!(summary.liabilities, 1200.0),
            other => panic!("unexpected details: {:?}", other),
        }
        assert_eq!(ledger.calls(), vec!["net_worth"]);
    }

    #[test]
    fn test_portfolio_intents_read_holdings() {
        let ledger = FakeLedger::new()
            .with_account("brokerage", AccountKind::Brokerage, 0.0)
            .with_holding("VTI", "equity", 7500.0, 9000.0)
            .with_holding("BND", "bond", 2500.0, 1000.0);
        let e = engine();

        let holdings = e
            .ask("list my holdings", now(), None, &ledger, &ledger)
            .unwrap();
        assert_eq!(holdings.total, 10000.0);
        assert_eq!(holdings.breakdown[0].label, "VTI");
        assert_eq!(holdings.breakdown[0].percentage, Some(90.0));
        assert_eq!(holdings.breakdown[1].percentage, Some(10.0));

        // "target" is also a store name; allocation is not scoped by merchant
        let allocation = e
            .ask("what is my target allocation", now(), None, &ledger, &ledger)
            .unwrap();
        assert!(allocation.filters.is_empty());
        let labels: Vec<_> = allocation.breakdown.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["bond", "equity"]);
        assert_eq!(allocation.total, 10000.0);

        assert_eq!(ledger.calls(), vec!["holdings", "allocation"]);
        assert!(ledger.queries().is_empty());
    }

    #[test]
    fn test_cash_flow_breakdown_is_income_and_expenses() {
        let march = |d| NaiveDate::from_ymd_opt(2024, 3, d).unwrap();
        let ledger = FakeLedger::new()
            .with_transaction(
                RecordBuilder::expense("1", march(1), "Employer", -2500.0)
                    .kind(TransactionKind::Income)
                    .build(),
            )
            .with_transaction(RecordBuilder::expense("2", march(2), "Rent", 1800.0).build());

        let result = engine()
            .ask("cash flow this month", now(), None, &ledger, &ledger)
            .unwrap();
        assert_eq!(result.intent, Intent::CashFlow);
        assert_eq!(result.total, 700.0);
        let labels: Vec<_> = result.breakdown.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["income", "expenses"]);
        assert_eq!(result.breakdown[0].count, 1);
    }

    #[test]
    fn test_pending_toggle_reaches_repository() {
        let ledger = FakeLedger::new().with_transaction(
            RecordBuilder::expense("1", NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(), "Safeway", 20.0)
                .category("groceries")
                .pending()
                .build(),
        );
        let mut config = QueryConfig::default();
        config.include_pending = false;
        let engine = QueryEngine::new(config).unwrap();

        let result = engine
            .ask("spent on groceries", now(), None, &ledger, &ledger)
            .unwrap();
        assert!(result.transactions.is_empty());
        assert!(!ledger.queries()[0].include_pending);
    }

    #[test]
    fn test_collaborator_errors_propagate() {
        let failing = FailingLedger::new("ledger offline");
        let e = engine();

        for query in ["net worth", "spent on beer", "lunch this week", "dividends this year"] {
            let err = e.ask(query, now(), None, &failing, &failing).unwrap_err();
            assert!(
                matches!(&err, Error::NotFound(msg) if msg == "ledger offline"),
                "{}: {:?}",
                query,
                err
            );
        }
    }
}
