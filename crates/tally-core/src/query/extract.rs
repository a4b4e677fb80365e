//! Parameter extraction: time range, category, merchant, account, amount
//!
//! Each extraction is independent and returns `None` instead of failing, so a
//! malformed phrase never blocks the others.

use chrono::NaiveDateTime;
use regex::Regex;
use tracing::debug;

use crate::config::QueryConfig;
use crate::error::Result;
use crate::models::{AmountOperator, AmountThreshold, TimeRange};

use super::time::TimePhraseTable;

/// Words that end a merchant capture ("at costco last month")
const MERCHANT_BOUNDARIES: &[&str] = &[
    "in", "on", "for", "during", "last", "this", "past", "over", "under", "above", "below",
    "since", "today", "yesterday", "with", "and",
];

const LEADING_ARTICLES: &[&str] = &["the", "a", "an", "my"];

/// A number followed by one of these is a duration, not an amount
const TIME_UNITS: &[&str] = &[
    "day", "days", "week", "weeks", "month", "months", "year", "years",
];

#[derive(Debug, Clone)]
struct CategoryMatcher {
    /// One regex per category, in registration order
    patterns: Vec<(String, Regex)>,
}

impl CategoryMatcher {
    fn new(config: &QueryConfig) -> Result<Self> {
        let mut patterns = Vec::with_capacity(config.categories.len());
        for category in &config.categories {
            let mut terms: Vec<&str> = category.terms().filter(|t| !t.is_empty()).collect();
            // Longest first so "grocery store" wins over "grocery" at the same position
            terms.sort_by_key(|t| std::cmp::Reverse(t.len()));
            let alternation = terms
                .iter()
                .map(|t| regex::escape(t))
                .collect::<Vec<_>>()
                .join("|");
            let regex = Regex::new(&format!(r"(?i)\b(?:{})s?\b", alternation))?;
            patterns.push((category.name.clone(), regex));
        }
        Ok(Self { patterns })
    }

    fn resolve(&self, text: &str) -> Option<String> {
        // (registration index, start, end)
        let matches: Vec<(usize, usize, usize)> = self
            .patterns
            .iter()
            .enumerate()
            .flat_map(|(idx, (_, regex))| {
                regex
                    .find_iter(text)
                    .map(move |m| (idx, m.start(), m.end()))
            })
            .collect();

        let survivors = matches.iter().filter(|(_, start, end)| {
            !matches.iter().any(|(_, o_start, o_end)| {
                o_start <= start && end <= o_end && (o_end - o_start) > (end - start)
            })
        });

        survivors
            .min_by_key(|(idx, _, _)| *idx)
            .map(|(idx, _, _)| self.patterns[*idx].0.clone())
    }
}

/// Extracts query parameters from normalized text
///
/// Immutable after construction; safe to share across threads.
#[derive(Debug, Clone)]
pub struct ParameterExtractor {
    config: QueryConfig,
    time_phrases: TimePhraseTable,
    categories: CategoryMatcher,
    merchant_anchor: Regex,
    known_merchants: Option<Regex>,
    spending_term: Regex,
    account_named: Regex,
    account_suffixed: Regex,
    account_keyword: Regex,
    amount_before: Vec<(Regex, AmountOperator)>,
    amount_after: Vec<(Regex, AmountOperator)>,
}

impl ParameterExtractor {
    pub fn new(config: &QueryConfig) -> Result<Self> {
        let mut merchants: Vec<&str> = config
            .lunch_merchants
            .iter()
            .chain(&config.grocery_stores)
            .chain(&config.gas_stations)
            .map(|m| m.trim())
            .filter(|m| !m.is_empty())
            .collect();
        merchants.sort_by_key(|m| std::cmp::Reverse(m.len()));
        let known_merchants = if merchants.is_empty() {
            None
        } else {
            let alternation = merchants
                .iter()
                .map(|m| regex::escape(m))
                .collect::<Vec<_>>()
                .join("|");
            Some(Regex::new(&format!(
                r"(?:^|[^\w])({})(?:[^\w]|$)",
                alternation
            ))?)
        };

        let number = r"(\$?\s*[\d.,]*\d[\d.,]*)(?:\s+([a-z]+))?";

        Ok(Self {
            config: config.clone(),
            time_phrases: TimePhraseTable::new()?,
            categories: CategoryMatcher::new(config)?,
            merchant_anchor: Regex::new(r"\b(?:at|from)\s+")?,
            known_merchants,
            spending_term: Regex::new(
                r"\b(?:(?:spent|spend|spending)\s+on|how\s+much\s+for)\s+(?:my\s+|the\s+)?([\w'&-]+)",
            )?,
            account_named: Regex::new(r#"\bin\s+account\s+'?([\w'-]+)"#)?,
            account_suffixed: Regex::new(
                r"\b(?:from|in|on)\s+(?:my\s+|the\s+)?([\w'-]+)\s+account\b",
            )?,
            account_keyword: Regex::new(r"\b(?:in|from)\s+(?:my\s+|the\s+)?([\w'-]+)\b")?,
            amount_before: vec![
                (
                    Regex::new(&format!(
                        r"\b(?:over|above|more\s+than|greater\s+than|exceeding)\s+{}",
                        number
                    ))?,
                    AmountOperator::GreaterThan,
                ),
                (
                    Regex::new(&format!(
                        r"\b(?:under|below|less\s+than|fewer\s+than)\s+{}",
                        number
                    ))?,
                    AmountOperator::LessThan,
                ),
            ],
            amount_after: vec![
                (
                    Regex::new(r"(\$?[\d.,]*\d[\d.,]*)\s+or\s+more\b")?,
                    AmountOperator::GreaterThan,
                ),
                (
                    Regex::new(r"(\$?[\d.,]*\d[\d.,]*)\s+or\s+less\b")?,
                    AmountOperator::LessThan,
                ),
            ],
        })
    }

    /// Time range named by the text, if any
    pub fn time_range(&self, text: &str, now: NaiveDateTime) -> Option<TimeRange> {
        self.time_phrases.resolve(text, now)
    }

    /// Canonical category named by the text
    ///
    /// Whole-word, case-insensitive. A match strictly inside a longer match is
    /// discarded; otherwise the category registered first wins.
    pub fn category(&self, text: &str) -> Option<String> {
        let category = self.categories.resolve(text);
        if let Some(ref c) = category {
            debug!("Resolved category '{}'", c);
        }
        category
    }

    /// Raw term after "spend on" / "how much for", for categories outside the alias table
    pub fn spending_term(&self, text: &str) -> Option<String> {
        let term = self.spending_term.captures(text)?.get(1)?.as_str();
        if self.config.is_stop_word(term) {
            return None;
        }
        Some(term.to_string())
    }

    /// Merchant named after "at" / "from", or a curated merchant name
    ///
    /// `category` is the category resolved for the same query; a capture that is
    /// just one of its aliases is not a merchant.
    pub fn merchant(&self, text: &str, category: Option<&str>) -> Option<String> {
        for anchor in self.merchant_anchor.find_iter(text) {
            if let Some(merchant) = self.merchant_after(&text[anchor.end()..], category) {
                debug!("Extracted merchant '{}'", merchant);
                return Some(merchant);
            }
        }

        let known = self
            .known_merchants
            .as_ref()?
            .captures(text)?
            .get(1)?
            .as_str()
            .to_string();
        debug!("Found known merchant '{}'", known);
        Some(known)
    }

    fn merchant_after(&self, rest: &str, category: Option<&str>) -> Option<String> {
        let mut words: Vec<&str> = rest
            .split_whitespace()
            .take_while(|w| !MERCHANT_BOUNDARIES.contains(w))
            .collect();

        while words
            .first()
            .is_some_and(|w| LEADING_ARTICLES.contains(w))
        {
            words.remove(0);
        }

        if words.is_empty() {
            return None;
        }
        // "from my checking account" is an account scope
        if words.iter().any(|w| *w == "account" || *w == "accounts") {
            return None;
        }
        if words[0].starts_with('$') || words[0].chars().all(|c| c.is_ascii_digit()) {
            return None;
        }

        let candidate = words.join(" ");
        if self.config.is_stop_word(&candidate) || self.config.is_account_keyword(&candidate) {
            return None;
        }
        if let Some(name) = category {
            let is_alias = self
                .config
                .category(name)
                .is_some_and(|c| c.is_term(&candidate));
            if is_alias {
                debug!("Rejected merchant '{}': alias of category {}", candidate, name);
                return None;
            }
        }
        Some(candidate)
    }

    /// Account scope: "in account x", "from my x account", "in savings"
    pub fn account(&self, text: &str) -> Option<String> {
        if let Some(caps) = self.account_named.captures(text) {
            let name = caps[1].trim_matches('\'');
            if !self.config.is_stop_word(name) {
                return Some(name.to_string());
            }
        }

        for caps in self.account_suffixed.captures_iter(text) {
            let name = &caps[1];
            if !self.config.is_stop_word(name) {
                return Some(name.to_string());
            }
        }

        self.account_keyword
            .captures_iter(text)
            .map(|caps| caps[1].to_string())
            .find(|word| self.config.is_account_keyword(word))
    }

    /// Amount comparison such as "over $50" or "$20 or less"
    pub fn amount(&self, text: &str) -> Option<AmountThreshold> {
        for (regex, operator) in &self.amount_before {
            for caps in regex.captures_iter(text) {
                let followed_by = caps.get(2).map(|m| m.as_str());
                if followed_by.is_some_and(|w| TIME_UNITS.contains(&w)) {
                    continue;
                }
                return threshold(*operator, &caps[1]);
            }
        }

        for (regex, operator) in &self.amount_after {
            if let Some(caps) = regex.captures(text) {
                return threshold(*operator, &caps[1]);
            }
        }

        None
    }
}

fn threshold(operator: AmountOperator, literal: &str) -> Option<AmountThreshold> {
    match parse_amount(literal) {
        Some(amount) => Some(AmountThreshold { operator, amount }),
        None => {
            debug!("Ignoring unparsable amount '{}'", literal);
            None
        }
    }
}

/// Parse "$1,250.50" style literals; `None` for anything malformed
pub(crate) fn parse_amount(literal: &str) -> Option<f64> {
    let cleaned: String = literal
        .trim()
        .trim_start_matches('$')
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',')
        .collect();
    let cleaned = cleaned.trim_end_matches('.');
    if cleaned.is_empty() {
        return None;
    }
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
}
