//! Natural-language query pipeline
//!
//! ```text
//! raw text + now
//!   -> normalize
//!   -> IntentClassifier        (which intent?)
//!   -> ParameterExtractor      (time range, category, merchant, account, amount)
//!   -> QueryContext            (immutable, fully resolved)
//!   -> QueryRouter             (collaborator calls, lunch scoring)
//!   -> QueryResult
//! ```
//!
//! [`QueryEngine`] is the entry point; the pieces are public so they can be
//! tested and reused on their own.

mod classifier;
mod engine;
mod extract;
mod router;
mod time;

pub use classifier::{Classification, IntentClassifier, IntentRule, Suggestion};
pub use engine::QueryEngine;
pub use extract::ParameterExtractor;
pub use router::QueryRouter;
pub use time::{default_range, TimePhraseTable};

use serde::{Deserialize, Serialize};

use crate::lunch::ConfidenceResult;
use crate::models::{
    AggregateDetails, BreakdownEntry, FilterSet, Intent, TimeRange, TimeRangeSource,
    TransactionRecord,
};

/// Lowercase, unify quotes, drop sentence punctuation and collapse whitespace.
///
/// Characters that carry meaning inside tokens (`$`, `&`, `'`, `-`, and commas
/// or periods inside numbers) are kept.
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let chars: Vec<char> = lowered.chars().collect();
    let mut out = String::with_capacity(lowered.len());

    for (i, &c) in chars.iter().enumerate() {
        let next_is_digit = chars.get(i + 1).is_some_and(|n| n.is_ascii_digit());
        let prev_is_alnum = i > 0 && chars[i - 1].is_alphanumeric();
        let mapped = match c {
            '\u{2018}' | '\u{2019}' | '`' => '\'',
            '?' | '!' | ';' | ':' | '"' | '\u{201c}' | '\u{201d}' | '(' | ')' => ' ',
            // "1,000" keeps its comma; only a sentence-final period is dropped
            ',' if next_is_digit && prev_is_alnum => ',',
            ',' => ' ',
            '.' if is_trailing(&chars[i + 1..]) => ' ',
            c if c.is_whitespace() => ' ',
            c => c,
        };
        out.push(mapped);
    }

    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_trailing(rest: &[char]) -> bool {
    rest.iter()
        .all(|c| c.is_whitespace() || matches!(c, '.' | '?' | '!'))
}

/// A fully-resolved query, ready for routing
///
/// Built only by [`QueryEngine::parse`]; read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryContext {
    query: String,
    intent: Intent,
    time_range: TimeRange,
    time_range_source: TimeRangeSource,
    filters: FilterSet,
    suggestions: Vec<Suggestion>,
}

impl QueryContext {
    pub(crate) fn new(
        query: String,
        intent: Intent,
        time_range: TimeRange,
        time_range_source: TimeRangeSource,
        filters: FilterSet,
        suggestions: Vec<Suggestion>,
    ) -> Self {
        Self {
            query,
            intent,
            time_range,
            time_range_source,
            filters,
            suggestions,
        }
    }

    /// The raw query as the caller supplied it
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn intent(&self) -> Intent {
        self.intent
    }

    pub fn time_range(&self) -> &TimeRange {
        &self.time_range
    }

    pub fn time_range_source(&self) -> TimeRangeSource {
        self.time_range_source
    }

    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    pub fn suggestions(&self) -> &[Suggestion] {
        &self.suggestions
    }
}

/// A transaction in a result, with its lunch confidence when scored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryTransaction {
    #[serde(flatten)]
    pub transaction: TransactionRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<ConfidenceResult>,
}

/// Structured answer to a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub query: String,
    pub intent: Intent,
    pub time_range: TimeRange,
    pub time_range_source: TimeRangeSource,
    pub filters: FilterSet,
    pub total: f64,
    /// Ordered by total descending, then label
    pub breakdown: Vec<BreakdownEntry>,
    pub transactions: Vec<QueryTransaction>,
    /// Lunch queries only
    pub uncertain_transactions: Vec<QueryTransaction>,
    pub uncertain_total: f64,
    /// Unrecognized queries only
    pub suggestions: Vec<Suggestion>,
    /// The analytics aggregate, unmodified (aggregate intents only)
    pub details: Option<AggregateDetails>,
}

impl QueryResult {
    /// An empty result for a context; the router fills in what applies
    pub(crate) fn empty(ctx: &QueryContext) -> Self {
        Self {
            query: ctx.query.clone(),
            intent: ctx.intent,
            time_range: ctx.time_range,
            time_range_source: ctx.time_range_source,
            filters: ctx.filters.clone(),
            total: 0.0,
            breakdown: Vec::new(),
            transactions: Vec::new(),
            uncertain_transactions: Vec::new(),
            uncertain_total: 0.0,
            suggestions: Vec::new(),
            details: None,
        }
    }
}

/// Round a currency amount to cents
pub(crate) fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
