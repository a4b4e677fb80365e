//! Database tests

use super::*;
use crate::collaborators::{Analytics, TransactionQuery, TransactionRepository};
use crate::models::*;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        date(y, m, d).and_hms_opt(h, min, 0).unwrap()
    }

    fn march() -> TimeRange {
        TimeRange::new(at(2024, 3, 1, 0, 0), at(2024, 3, 31, 23, 59)).unwrap()
    }

    fn tx(
        day: u32,
        merchant: &str,
        amount: f64,
        category: Option<&str>,
        kind: TransactionKind,
    ) -> NewTransaction {
        NewTransaction {
            date: date(2024, 3, day),
            timestamp: Some(at(2024, 3, day, 12, 30)),
            merchant: merchant.to_string(),
            description: format!("{} purchase", merchant),
            amount,
            category: category.map(String::from),
            kind,
            ticker: None,
            pending: false,
            import_hash: format!("{}-{}-{}", day, merchant, amount),
            original_data: None,
        }
    }

    /// Checking + credit card with a handful of March transactions
    fn seeded() -> (Database, i64, i64) {
        let db = Database::in_memory().unwrap();
        let checking = db
            .upsert_account("Everyday Checking", AccountKind::Checking, Some("First Bank"))
            .unwrap();
        let card = db
            .upsert_account("Rewards Card", AccountKind::Credit, None)
            .unwrap();

        let rows = [
            (checking, tx(1, "Employer Inc", -3000.0, None, TransactionKind::Income)),
            (card, tx(2, "Chipotle", 12.50, Some("Restaurants"), TransactionKind::Expense)),
            (card, tx(5, "Chipotle", 14.00, Some("Restaurants"), TransactionKind::Expense)),
            (card, tx(7, "Whole Foods", 142.10, Some("Groceries"), TransactionKind::Expense)),
            (checking, tx(9, "Electric Co", 95.00, Some("Bills"), TransactionKind::Expense)),
            (checking, tx(10, "Corner Store", 4.25, None, TransactionKind::Expense)),
            (checking, tx(12, "Savings Transfer", 500.0, None, TransactionKind::Transfer)),
        ];
        for (account, row) in rows {
            assert!(db.insert_transaction(account, &row).unwrap().is_inserted());
        }

        // Outside the range
        let mut february = tx(1, "Chipotle", 11.0, Some("Restaurants"), TransactionKind::Expense);
        february.date = date(2024, 2, 28);
        february.timestamp = None;
        february.import_hash = "feb".into();
        db.insert_transaction(card, &february).unwrap();

        (db, checking, card)
    }

    #[test]
    fn test_in_memory_db() {
        let db = Database::in_memory().unwrap();
        let accounts = db.list_accounts().unwrap();
        assert!(accounts.is_empty());
        assert_eq!(db.count_transactions(None).unwrap(), 0);
    }

    #[test]
    fn test_schema_exists() {
        let db = Database::in_memory().unwrap();
        let conn = db.conn().unwrap();

        let result: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM pragma_table_info('transactions') WHERE name IN ('timestamp', 'kind', 'ticker', 'pending', 'import_hash')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(result, 5, "transactions table should carry query columns");

        let result: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('accounts', 'transactions', 'holdings')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(result, 3);
    }

    #[test]
    fn test_reopen_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        let path = path.to_string_lossy();

        let db = Database::new(&path).unwrap();
        db.upsert_account("Checking", AccountKind::Checking, None)
            .unwrap();
        drop(db);

        let db = Database::new(&path).unwrap();
        assert_eq!(db.path(), path);
        assert_eq!(db.list_accounts().unwrap().len(), 1);
    }

    #[test]
    fn test_account_crud() {
        let db = Database::in_memory().unwrap();

        let id = db
            .upsert_account("Rewards Card", AccountKind::Credit, Some("Chase"))
            .unwrap();
        assert!(id > 0);

        // Upsert same account (any case) returns same ID
        let id2 = db
            .upsert_account("rewards card", AccountKind::Checking, None)
            .unwrap();
        assert_eq!(id, id2);

        let accounts = db.list_accounts().unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].name, "Rewards Card");
        assert_eq!(accounts[0].kind, AccountKind::Credit);
        assert_eq!(accounts[0].institution.as_deref(), Some("Chase"));
        assert!(accounts[0].is_active);

        db.set_account_balance(id, 812.40).unwrap();
        assert_eq!(db.get_account(id).unwrap().unwrap().balance, 812.40);

        assert!(db.upsert_account("  ", AccountKind::Checking, None).is_err());
        assert!(matches!(
            db.set_account_balance(999, 1.0),
            Err(crate::error::Error::NotFound(_))
        ));
    }

    #[test]
    fn test_find_account_by_id_or_name_fragment() {
        let (db, checking, card) = seeded();

        assert_eq!(db.find_account("rewards").unwrap().unwrap().id, card);
        assert_eq!(db.find_account("CHECKING").unwrap().unwrap().id, checking);
        assert_eq!(
            db.find_account(&checking.to_string()).unwrap().unwrap().id,
            checking
        );
        assert!(db.find_account("brokerage").unwrap().is_none());
        assert!(db.find_account("").unwrap().is_none());
    }

    #[test]
    fn test_insert_transaction_dedupes_by_hash() {
        let db = Database::in_memory().unwrap();
        let account = db
            .upsert_account("Checking", AccountKind::Checking, None)
            .unwrap();
        let row = tx(3, "Chipotle", 12.5, None, TransactionKind::Expense);

        let first = db.insert_transaction(account, &row).unwrap();
        let TransactionInsertResult::Inserted(id) = first else {
            panic!("expected insert, got {:?}", first);
        };
        assert_eq!(
            db.insert_transaction(account, &row).unwrap(),
            TransactionInsertResult::Duplicate(id)
        );
        assert_eq!(db.count_transactions(Some(account)).unwrap(), 1);
    }

    #[test]
    fn test_find_round_trips_record_fields() {
        let (db, _, card) = seeded();
        let query = TransactionQuery {
            merchant: Some("whole foods".into()),
            ..TransactionQuery::new(march())
        };

        let records = db.find(&query).unwrap();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.account_id, card.to_string());
        assert_eq!(record.date, date(2024, 3, 7));
        assert_eq!(record.timestamp, Some(at(2024, 3, 7, 12, 30)));
        assert_eq!(record.amount, 142.10);
        assert_eq!(record.category.as_deref(), Some("Groceries"));
        assert_eq!(record.kind, TransactionKind::Expense);
        assert!(!record.pending);
    }

    #[test]
    fn test_find_filters() {
        let (db, _, _) = seeded();

        // Range excludes February, kind excludes income and transfer
        let expenses = db
            .find(&TransactionQuery::new(march()).kind(TransactionKind::Expense))
            .unwrap();
        assert_eq!(expenses.len(), 5);
        // Newest first
        assert_eq!(expenses[0].merchant, "Corner Store");

        let restaurants = db
            .find(&TransactionQuery {
                category: Some("restaurants".into()),
                ..TransactionQuery::new(march())
            })
            .unwrap();
        assert_eq!(restaurants.len(), 2);

        let keyword = db
            .find(&TransactionQuery {
                keyword: Some("electric".into()),
                ..TransactionQuery::new(march())
            })
            .unwrap();
        assert_eq!(keyword.len(), 1);

        let large = db
            .find(&TransactionQuery {
                amount: Some(AmountThreshold {
                    operator: AmountOperator::GreaterThan,
                    amount: 100.0,
                }),
                ..TransactionQuery::new(march())
            })
            .unwrap();
        // Income compares on its absolute value
        let merchants: Vec<_> = large.iter().map(|r| r.merchant.as_str()).collect();
        assert_eq!(merchants, vec!["Savings Transfer", "Whole Foods", "Employer Inc"]);

        let limited = db.find(&TransactionQuery::new(march()).limit(2)).unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[test]
    fn test_range_compares_timestamps_to_the_second() {
        let (db, _, card) = seeded();
        let mut untimed = tx(5, "Taqueria", 9.0, Some("Restaurants"), TransactionKind::Expense);
        untimed.timestamp = None;
        untimed.import_hash = "untimed".into();
        db.insert_transaction(card, &untimed).unwrap();

        // Seeded rows are at 12:30 on their day
        let range = TimeRange::new(at(2024, 3, 5, 15, 0), at(2024, 3, 10, 12, 0)).unwrap();
        let found = db
            .find(&TransactionQuery::new(range).kind(TransactionKind::Expense))
            .unwrap();
        let merchants: Vec<_> = found.iter().map(|r| r.merchant.as_str()).collect();
        assert_eq!(merchants, vec!["Electric Co", "Whole Foods", "Taqueria"]);

        let expenses = db.expenses(&range, &FilterSet::default()).unwrap();
        assert_eq!(expenses.transaction_count, 3);
    }

    #[test]
    fn test_find_account_filter_by_name_or_id() {
        let (db, checking, _) = seeded();

        let by_name = db
            .find(&TransactionQuery {
                account: Some("rewards".into()),
                ..TransactionQuery::new(march())
            })
            .unwrap();
        assert_eq!(by_name.len(), 3);

        let by_id = db
            .find(&TransactionQuery {
                account: Some(checking.to_string()),
                ..TransactionQuery::new(march())
            })
            .unwrap();
        assert_eq!(by_id.len(), 4);
    }

    #[test]
    fn test_pending_toggle() {
        let db = Database::in_memory().unwrap();
        let account = db
            .upsert_account("Checking", AccountKind::Checking, None)
            .unwrap();
        let mut row = tx(4, "Chipotle", 12.5, None, TransactionKind::Expense);
        row.pending = true;
        db.insert_transaction(account, &row).unwrap();

        let query = TransactionQuery::new(march());
        assert_eq!(db.find(&query).unwrap().len(), 1);
        assert!(db.find(&query.clone().include_pending(false)).unwrap().is_empty());
        assert_eq!(db.count_matching(&query).unwrap(), 1);
    }

    #[test]
    fn test_holdings_upsert_replaces_position() {
        let db = Database::in_memory().unwrap();
        let account = db
            .upsert_account("Brokerage", AccountKind::Brokerage, None)
            .unwrap();

        let mut holding = Holding {
            account_id: account,
            ticker: "vti".into(),
            name: Some("Total Market".into()),
            asset_class: "Equity".into(),
            quantity: 10.0,
            cost_basis: 2000.0,
            market_value: 2500.0,
        };
        db.upsert_holding(&holding).unwrap();
        holding.quantity = 12.0;
        holding.market_value = 3000.0;
        db.upsert_holding(&holding).unwrap();

        let holdings = db.list_holdings(None).unwrap();
        assert_eq!(holdings.len(), 1);
        assert_eq!(holdings[0].ticker, "VTI");
        assert_eq!(holdings[0].asset_class, "equity");
        assert_eq!(holdings[0].market_value, 3000.0);

        assert!(db.list_holdings(Some("checking")).unwrap().is_empty());
    }

    fn seed_portfolio(db: &Database) -> i64 {
        let brokerage = db
            .upsert_account("Brokerage", AccountKind::Brokerage, None)
            .unwrap();
        for (ticker, class, cost, value) in [
            ("VTI", "equity", 6000.0, 7500.0),
            ("BND", "bond", 2000.0, 1900.0),
            ("VXUS", "equity", 500.0, 600.0),
        ] {
            db.upsert_holding(&Holding {
                account_id: brokerage,
                ticker: ticker.into(),
                name: None,
                asset_class: class.into(),
                quantity: 1.0,
                cost_basis: cost,
                market_value: value,
            })
            .unwrap();
        }

        let mut dividend = tx(15, "Vanguard", -42.0, None, TransactionKind::Dividend);
        dividend.ticker = Some("VTI".into());
        db.insert_transaction(brokerage, &dividend).unwrap();
        brokerage
    }

    #[test]
    fn test_net_worth_counts_liabilities_and_positions() {
        let (db, checking, card) = seeded();
        seed_portfolio(&db);
        db.set_account_balance(checking, 4200.0).unwrap();
        db.set_account_balance(card, 650.0).unwrap();

        let summary = db.net_worth(&march(), &FilterSet::default()).unwrap();
        assert_eq!(summary.assets, 4200.0 + 10000.0);
        assert_eq!(summary.liabilities, 650.0);
        assert_eq!(summary.net_worth, 13550.0);
        assert_eq!(summary.by_account[0].label, "Brokerage");
        assert_eq!(summary.by_account[2].total, -650.0);

        db.set_account_active(card, false).unwrap();
        let summary = db.net_worth(&march(), &FilterSet::default()).unwrap();
        assert_eq!(summary.liabilities, 0.0);

        let filters = FilterSet {
            account: Some("checking".into()),
            ..Default::default()
        };
        let summary = db.net_worth(&march(), &filters).unwrap();
        assert_eq!(summary.net_worth, 4200.0);
        assert_eq!(summary.by_account.len(), 1);
    }

    #[test]
    fn test_portfolio_aggregates() {
        let db = Database::in_memory().unwrap();
        seed_portfolio(&db);
        let filters = FilterSet::default();

        let performance = db.performance(&march(), &filters).unwrap();
        assert_eq!(performance.cost_basis, 8500.0);
        assert_eq!(performance.market_value, 10000.0);
        assert_eq!(performance.unrealized_gain, 1500.0);
        assert_eq!(performance.return_percent, 17.65);
        assert_eq!(performance.dividends, 42.0);

        let allocation = db.allocation(&march(), &filters).unwrap();
        assert_eq!(allocation.total_value, 10000.0);
        assert_eq!(allocation.by_asset_class[0].label, "equity");
        assert_eq!(allocation.by_asset_class[0].count, 2);
        assert_eq!(allocation.by_asset_class[0].percentage, Some(81.0));
        assert_eq!(allocation.by_asset_class[1].percentage, Some(19.0));

        let holdings = db.holdings(&march(), &filters).unwrap();
        let tickers: Vec<_> = holdings.positions.iter().map(|h| h.ticker.as_str()).collect();
        assert_eq!(tickers, vec!["VTI", "BND", "VXUS"]);

        let dividends = db.dividends(&march(), &filters).unwrap();
        assert_eq!(dividends.by_ticker[0].label, "VTI");
        assert_eq!(dividends.total, 42.0);
    }

    #[test]
    fn test_income_expenses_and_cash_flow() {
        let (db, _, _) = seeded();
        let filters = FilterSet::default();

        let income = db.income(&march(), &filters).unwrap();
        assert_eq!(income.total, 3000.0);
        assert_eq!(income.by_source[0].label, "Employer Inc");

        let expenses = db.expenses(&march(), &filters).unwrap();
        assert_eq!(expenses.total, 267.85);
        assert_eq!(expenses.transaction_count, 5);
        let labels: Vec<_> = expenses
            .by_category
            .iter()
            .map(|e| e.label.as_str())
            .collect();
        assert_eq!(
            labels,
            vec!["Groceries", "Bills", "Restaurants", "Uncategorized"]
        );

        let cash_flow = db.cash_flow(&march(), &filters).unwrap();
        assert_eq!(cash_flow.income, 3000.0);
        assert_eq!(cash_flow.expenses, 267.85);
        assert_eq!(cash_flow.net, 2732.15);
        assert_eq!(cash_flow.expense_breakdown.len(), 4);
    }

    #[test]
    fn test_aggregates_honor_account_filter() {
        let (db, _, _) = seeded();
        let filters = FilterSet {
            account: Some("rewards".into()),
            ..Default::default()
        };

        let expenses = db.expenses(&march(), &filters).unwrap();
        assert_eq!(expenses.total, 168.6);
        assert_eq!(db.income(&march(), &filters).unwrap().total, 0.0);
    }
}
