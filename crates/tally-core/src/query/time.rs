//! Time phrase resolution and per-intent default windows
//!
//! Every formula is computed from the caller-supplied reference instant;
//! nothing here reads the wall clock.

use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use tracing::debug;

use crate::error::Result;
use crate::models::{Intent, TimeRange};

/// Days in the trailing window used for merchant, transaction and performance queries
const RECENT_DAYS: i64 = 30;
const LUNCH_DAYS: i64 = 60;
const DIVIDEND_DAYS: i64 = 365;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phrase {
    LastNDays,
    LastNWeeks,
    LastNMonths,
    Today,
    Yesterday,
    ThisWeek,
    LastWeek,
    ThisMonth,
    LastMonth,
    ThisYear,
    LastYear,
}

/// Ordered phrase table; the first phrase found in the text wins
#[derive(Debug, Clone)]
pub struct TimePhraseTable {
    phrases: Vec<(Regex, Phrase)>,
}

impl TimePhraseTable {
    pub fn new() -> Result<Self> {
        let table = [
            (r"\b(?:last|past)\s+(\d+)\s+days?\b", Phrase::LastNDays),
            (r"\b(?:last|past)\s+(\d+)\s+weeks?\b", Phrase::LastNWeeks),
            (r"\b(?:last|past)\s+(\d+)\s+months?\b", Phrase::LastNMonths),
            (r"\btoday\b", Phrase::Today),
            (r"\byesterday\b", Phrase::Yesterday),
            (r"\bthis\s+week\b", Phrase::ThisWeek),
            (r"\blast\s+week\b", Phrase::LastWeek),
            (r"\bthis\s+month\b", Phrase::ThisMonth),
            (r"\blast\s+month\b", Phrase::LastMonth),
            (r"\b(?:this\s+year|year\s+to\s+date|ytd)\b", Phrase::ThisYear),
            (r"\blast\s+year\b", Phrase::LastYear),
        ];

        let phrases = table
            .into_iter()
            .map(|(pattern, phrase)| Ok((Regex::new(pattern)?, phrase)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { phrases })
    }

    /// Resolve the first matching phrase in normalized text against `now`
    pub fn resolve(&self, text: &str, now: NaiveDateTime) -> Option<TimeRange> {
        for (regex, phrase) in &self.phrases {
            let Some(caps) = regex.captures(text) else {
                continue;
            };
            let count = caps.get(1).and_then(|m| m.as_str().parse::<u32>().ok());
            match resolve_phrase(*phrase, count, now) {
                Some(range) => {
                    debug!("Time phrase {:?} resolved to {}", phrase, range);
                    return Some(range);
                }
                None => {
                    debug!("Time phrase {:?} matched but could not be resolved", phrase);
                }
            }
        }
        None
    }
}

fn resolve_phrase(phrase: Phrase, count: Option<u32>, now: NaiveDateTime) -> Option<TimeRange> {
    let today = now.date();
    let (start, end) = match phrase {
        Phrase::LastNDays => (now.checked_sub_signed(Duration::try_days(count? as i64)?)?, now),
        Phrase::LastNWeeks => (
            now.checked_sub_signed(Duration::try_weeks(count? as i64)?)?,
            now,
        ),
        Phrase::LastNMonths => {
            let start = first_of_month(today).checked_sub_months(Months::new(count?))?;
            (start_of_day(start), now)
        }
        Phrase::Today => (start_of_day(today), now),
        Phrase::Yesterday => {
            let yesterday = today.pred_opt()?;
            (start_of_day(yesterday), end_of_day(yesterday))
        }
        Phrase::ThisWeek => (start_of_day(monday_of(today)), now),
        Phrase::LastWeek => {
            let this_monday = monday_of(today);
            let last_monday = this_monday.checked_sub_signed(Duration::days(7))?;
            (start_of_day(last_monday), end_of_day(this_monday.pred_opt()?))
        }
        Phrase::ThisMonth => (start_of_day(first_of_month(today)), now),
        Phrase::LastMonth => {
            let last_day = first_of_month(today).pred_opt()?;
            (start_of_day(first_of_month(last_day)), end_of_day(last_day))
        }
        Phrase::ThisYear => (start_of_day(NaiveDate::from_ymd_opt(today.year(), 1, 1)?), now),
        Phrase::LastYear => {
            let year = today.year() - 1;
            (
                start_of_day(NaiveDate::from_ymd_opt(year, 1, 1)?),
                end_of_day(NaiveDate::from_ymd_opt(year, 12, 31)?),
            )
        }
    };
    TimeRange::new(start, end).ok()
}

/// The window applied when a query names no time phrase
///
/// | Intent | Window |
/// |---|---|
/// | Income, Expense, CategorySpending, CashFlow | 1st of current month 00:00 to now |
/// | MerchantSpending, Transactions, Performance | last 30 days |
/// | LunchSpending | last 60 days |
/// | Dividend | last 365 days |
/// | NetWorth, Allocation, Holdings, Unrecognized | the instant `now` |
pub fn default_range(intent: Intent, now: NaiveDateTime) -> TimeRange {
    match intent {
        Intent::Income | Intent::Expense | Intent::CategorySpending | Intent::CashFlow => {
            month_to_date(now)
        }
        Intent::MerchantSpending | Intent::Transactions | Intent::Performance => {
            trailing_days(now, RECENT_DAYS)
        }
        Intent::LunchSpending => trailing_days(now, LUNCH_DAYS),
        Intent::Dividend => trailing_days(now, DIVIDEND_DAYS),
        Intent::NetWorth | Intent::Allocation | Intent::Holdings | Intent::Unrecognized => {
            TimeRange::instant(now)
        }
    }
}

fn month_to_date(now: NaiveDateTime) -> TimeRange {
    let start = start_of_day(first_of_month(now.date()));
    TimeRange::new(start, now).unwrap_or_else(|_| TimeRange::instant(now))
}

fn trailing_days(now: NaiveDateTime, days: i64) -> TimeRange {
    now.checked_sub_signed(Duration::days(days))
        .and_then(|start| TimeRange::new(start, now).ok())
        .unwrap_or_else(|| TimeRange::instant(now))
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

fn monday_of(date: NaiveDate) -> NaiveDate {
    let offset = date.weekday().num_days_from_monday() as i64;
    date.checked_sub_signed(Duration::days(offset))
        .unwrap_or(date)
}

fn start_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

fn end_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_hms_opt(23, 59, 59)
        .unwrap_or_else(|| start_of_day(date))
}
