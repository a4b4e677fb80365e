//! CSV import for transactions and holdings
//!
//! Columns are located by header name (case-insensitive), so exports with
//! extra or reordered columns load as long as the required ones are present.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use csv::{ReaderBuilder, StringRecord};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::io::Read;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::models::{Holding, NewTransaction, TransactionKind};

/// Convert a CSV record to a JSON object using headers as keys
fn record_to_json(headers: &StringRecord, record: &StringRecord) -> String {
    let mut map = serde_json::Map::new();
    for (i, header) in headers.iter().enumerate() {
        if let Some(value) = record.get(i) {
            map.insert(header.to_string(), Value::String(value.to_string()));
        }
    }
    json!(map).to_string()
}

/// Header name → column index lookup
struct Columns {
    headers: Vec<String>,
}

impl Columns {
    fn new(headers: &StringRecord) -> Self {
        Self {
            headers: headers.iter().map(|h| h.trim().to_lowercase()).collect(),
        }
    }

    fn index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    fn require(&self, name: &str) -> Result<usize> {
        self.index(name)
            .ok_or_else(|| Error::Import(format!("Missing required column: {}", name)))
    }
}

/// Non-empty trimmed field
fn field(record: &StringRecord, idx: Option<usize>) -> Option<&str> {
    idx.and_then(|i| record.get(i))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Parse a transaction CSV
///
/// Required headers: `date`, `merchant`, `amount`. Optional: `time`,
/// `description`, `category`, `kind`, `ticker`, `pending`. Amounts follow the
/// ledger convention (positive = money out); income, dividend and sell rows
/// are stored negative whatever sign the file uses. Unparsable rows are
/// skipped with a warning.
pub fn parse_csv<R: Read>(reader: R) -> Result<Vec<NewTransaction>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let columns = Columns::new(&headers);
    let date_col = columns.require("date")?;
    let merchant_col = columns.require("merchant")?;
    let amount_col = columns.require("amount")?;
    let time_col = columns.index("time");
    let description_col = columns.index("description");
    let category_col = columns.index("category");
    let kind_col = columns.index("kind");
    let ticker_col = columns.index("ticker");
    let pending_col = columns.index("pending");

    let mut transactions = Vec::new();
    let mut skipped = 0;

    for (ordinal, result) in rdr.records().enumerate() {
        let record = result?;
        // 1-based data row, header excluded
        let row = ordinal + 1;

        let parsed = (|| -> Result<NewTransaction> {
            let date = parse_date(
                field(&record, Some(date_col))
                    .ok_or_else(|| Error::Import("Missing date".into()))?,
            )?;
            let time = field(&record, time_col).map(parse_time).transpose()?;
            let merchant = field(&record, Some(merchant_col))
                .ok_or_else(|| Error::Import("Missing merchant".into()))?
                .to_string();
            let amount = parse_amount(
                field(&record, Some(amount_col))
                    .ok_or_else(|| Error::Import("Missing amount".into()))?,
            )?;
            let kind: TransactionKind = field(&record, kind_col)
                .unwrap_or_default()
                .parse()
                .map_err(Error::Import)?;
            let amount = match kind {
                TransactionKind::Income | TransactionKind::Dividend | TransactionKind::Sell => {
                    -amount.abs()
                }
                _ => amount,
            };
            let pending = field(&record, pending_col)
                .map(parse_flag)
                .transpose()?
                .unwrap_or(false);

            Ok(NewTransaction {
                date,
                timestamp: time.map(|t| NaiveDateTime::new(date, t)),
                description: field(&record, description_col)
                    .unwrap_or(&merchant)
                    .to_string(),
                import_hash: generate_hash(&date, time.as_ref(), &merchant, amount, row),
                merchant,
                amount,
                category: field(&record, category_col).map(String::from),
                kind,
                ticker: field(&record, ticker_col).map(|t| t.to_uppercase()),
                pending,
                original_data: Some(record_to_json(&headers, &record)),
            })
        })();

        match parsed {
            Ok(tx) => transactions.push(tx),
            Err(e) => {
                warn!("Skipping row {}: {}", row, e);
                skipped += 1;
            }
        }
    }

    info!(
        "Parsed {} transactions ({} rows skipped)",
        transactions.len(),
        skipped
    );
    Ok(transactions)
}

/// Parse a holdings CSV into positions for `account_id`
///
/// Headers: `ticker`, `quantity`, `market_value` required; `name`,
/// `asset_class` (default "equity") and `cost_basis` (default the market
/// value) optional.
pub fn parse_holdings_csv<R: Read>(reader: R, account_id: i64) -> Result<Vec<Holding>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let columns = Columns::new(rdr.headers()?);
    let ticker_col = columns.require("ticker")?;
    let quantity_col = columns.require("quantity")?;
    let value_col = columns.require("market_value")?;
    let name_col = columns.index("name");
    let class_col = columns.index("asset_class");
    let cost_col = columns.index("cost_basis");

    let mut holdings = Vec::new();
    for (ordinal, result) in rdr.records().enumerate() {
        let record = result?;

        let Some(ticker) = field(&record, Some(ticker_col)) else {
            warn!("Skipping holdings row {}: missing ticker", ordinal + 1);
            continue;
        };

        let quantity = parse_amount(field(&record, Some(quantity_col)).unwrap_or("0"))?;
        let market_value = parse_amount(field(&record, Some(value_col)).unwrap_or("0"))?;
        let cost_basis = field(&record, cost_col)
            .map(parse_amount)
            .transpose()?
            .unwrap_or(market_value);

        holdings.push(Holding {
            account_id,
            ticker: ticker.to_uppercase(),
            name: field(&record, name_col).map(String::from),
            asset_class: field(&record, class_col)
                .unwrap_or("equity")
                .to_lowercase(),
            quantity,
            cost_basis,
            market_value,
        });
    }

    debug!("Parsed {} holdings", holdings.len());
    Ok(holdings)
}

/// Dedupe hash over the identifying fields plus the row ordinal
///
/// The ordinal keeps two identical purchases in one file distinct, while a
/// re-import of the same file hashes identically.
fn generate_hash(
    date: &NaiveDate,
    time: Option<&NaiveTime>,
    merchant: &str,
    amount: f64,
    row: usize,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(date.to_string().as_bytes());
    if let Some(time) = time {
        hasher.update(time.format("%H:%M:%S").to_string().as_bytes());
    }
    hasher.update(merchant.as_bytes());
    hasher.update(amount.to_be_bytes());
    hasher.update((row as u64).to_be_bytes());
    hex::encode(hasher.finalize())
}

/// Parse a date string in various common formats
fn parse_date(s: &str) -> Result<NaiveDate> {
    let s = s.trim();

    let formats = [
        "%Y-%m-%d", // 2024-01-15
        "%m/%d/%Y", // 01/15/2024
        "%m/%d/%y", // 01/15/24
        "%m-%d-%Y", // 01-15-2024
    ];

    for fmt in formats {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(date);
        }
    }

    Err(Error::Import(format!("Unable to parse date: {}", s)))
}

/// Parse a time of day (24-hour, or 12-hour with AM/PM)
fn parse_time(s: &str) -> Result<NaiveTime> {
    let s = s.trim();
    let upper = s.to_uppercase();

    for fmt in ["%H:%M", "%H:%M:%S"] {
        if let Ok(time) = NaiveTime::parse_from_str(s, fmt) {
            return Ok(time);
        }
    }
    for fmt in ["%I:%M %p", "%I:%M%p"] {
        if let Ok(time) = NaiveTime::parse_from_str(&upper, fmt) {
            return Ok(time);
        }
    }

    Err(Error::Import(format!("Unable to parse time: {}", s)))
}

/// Parse an amount string, handling currency symbols and commas
fn parse_amount(s: &str) -> Result<f64> {
    let cleaned: String = s
        .trim()
        .replace(['$', ',', ' '], "")
        .replace('(', "-")
        .replace(')', "");

    cleaned
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| Error::Import(format!("Unable to parse amount: {}", s)))
}

fn parse_flag(s: &str) -> Result<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "yes" | "y" | "1" | "pending" => Ok(true),
        "false" | "no" | "n" | "0" | "posted" | "cleared" => Ok(false),
        _ => Err(Error::Import(format!("Unable to parse pending flag: {}", s))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("01/15/2024").unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
        );
        assert_eq!(
            parse_date("2024-01-15").unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
        );
        assert!(parse_date("yesterday").is_err());
    }

    #[test]
    fn test_parse_time() {
        assert_eq!(
            parse_time("12:48").unwrap(),
            NaiveTime::from_hms_opt(12, 48, 0).unwrap()
        );
        assert_eq!(
            parse_time("1:05 pm").unwrap(),
            NaiveTime::from_hms_opt(13, 5, 0).unwrap()
        );
        assert!(parse_time("25:00").is_err());
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("$1,234.56").unwrap(), 1234.56);
        assert_eq!(parse_amount("-123.45").unwrap(), -123.45);
        assert_eq!(parse_amount("(100.00)").unwrap(), -100.00);
        assert!(parse_amount("NaN").is_err());
    }

    #[test]
    fn test_parse_csv() {
        let csv = r#"Date,Time,Merchant,Amount,Category,Kind,Pending
2024-03-04,12:48,King Soopers,12.43,Groceries,,
2024-03-04,,Employer Inc,"$3,000.00",,income,
03/05/2024,19:30,Chipotle,14.00,Restaurants,expense,yes"#;

        let transactions = parse_csv(csv.as_bytes()).unwrap();
        assert_eq!(transactions.len(), 3);

        let soopers = &transactions[0];
        assert_eq!(soopers.merchant, "King Soopers");
        assert_eq!(soopers.description, "King Soopers");
        assert_eq!(soopers.kind, TransactionKind::Expense);
        assert_eq!(
            soopers.timestamp.unwrap().time(),
            NaiveTime::from_hms_opt(12, 48, 0).unwrap()
        );
        assert_eq!(soopers.category.as_deref(), Some("Groceries"));
        assert!(soopers.original_data.as_ref().unwrap().contains("King Soopers"));

        // Money in is stored negative
        assert_eq!(transactions[1].amount, -3000.0);
        assert_eq!(transactions[1].kind, TransactionKind::Income);
        assert!(transactions[1].timestamp.is_none());

        assert!(transactions[2].pending);
    }

    #[test]
    fn test_identical_rows_hash_distinctly_but_reimport_matches() {
        let csv = "date,merchant,amount\n2024-03-04,Chipotle,12.50\n2024-03-04,Chipotle,12.50\n";

        let first = parse_csv(csv.as_bytes()).unwrap();
        assert_ne!(first[0].import_hash, first[1].import_hash);
        assert_eq!(first[0].import_hash.len(), 64);

        let again = parse_csv(csv.as_bytes()).unwrap();
        assert_eq!(first[0].import_hash, again[0].import_hash);
    }

    #[test]
    fn test_bad_rows_are_skipped() {
        let csv = "date,merchant,amount,kind\n\
                   2024-03-04,Chipotle,12.50,\n\
                   not-a-date,Chipotle,12.50,\n\
                   2024-03-05,Chipotle,abc,\n\
                   2024-03-06,Chipotle,9.00,lottery\n";

        let transactions = parse_csv(csv.as_bytes()).unwrap();
        assert_eq!(transactions.len(), 1);
    }

    #[test]
    fn test_missing_required_column() {
        let csv = "date,description,amount\n2024-03-04,Lunch,12.50\n";
        let err = parse_csv(csv.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("merchant"));
    }

    #[test]
    fn test_parse_holdings_csv() {
        let csv = "Ticker,Name,Asset_Class,Quantity,Cost_Basis,Market_Value\n\
                   vti,Total Market,Equity,10,\"2,000.00\",2500\n\
                   BND,,bond,5,,480\n\
                   ,Orphan,equity,1,1,1\n";

        let holdings = parse_holdings_csv(csv.as_bytes(), 7).unwrap();
        assert_eq!(holdings.len(), 2);
        assert_eq!(holdings[0].ticker, "VTI");
        assert_eq!(holdings[0].asset_class, "equity");
        assert_eq!(holdings[0].cost_basis, 2000.0);
        assert_eq!(holdings[1].cost_basis, 480.0);
        assert_eq!(holdings[1].account_id, 7);
    }
}
