//! Intent classification by ordered, tiered rule matching
//!
//! Rules are data: an ordered list of [`IntentRule`]s, most specific first.
//! The first rule with a matching pattern decides the intent. When nothing
//! matches, the query is Unrecognized and the rules whose keywords overlap
//! the query most are offered as suggestions.

use std::collections::HashSet;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::QueryConfig;
use crate::error::Result;
use crate::models::Intent;

#[derive(Debug, Clone)]
enum Pattern {
    /// Matches on its own
    Plain(Regex),
    /// Matches only if capture group 1 is not a stop word
    Capture(Regex),
    /// Like `Capture`, but a category term is not a merchant either
    MerchantCapture(Regex),
    /// Matches only if capture group 1 is a category term
    CategoryCapture(Regex),
}

/// One entry in the ordered rule list
#[derive(Debug, Clone)]
pub struct IntentRule {
    /// 1 = most specific
    pub tier: u8,
    pub intent: Intent,
    patterns: Vec<Pattern>,
    /// Tokens used to rank suggestions for unrecognized queries
    pub keywords: &'static [&'static str],
    /// Example query shown as a suggestion
    pub example: &'static str,
}

impl IntentRule {
    fn matches(&self, text: &str, config: &QueryConfig) -> bool {
        self.patterns.iter().any(|pattern| match pattern {
            Pattern::Plain(regex) => regex.is_match(text),
            Pattern::Capture(regex) => captured_any(regex, text, |word| {
                !config.is_stop_word(word)
            }),
            Pattern::MerchantCapture(regex) => captured_any(regex, text, |word| {
                !config.is_stop_word(word) && !config.is_category_term(word)
            }),
            Pattern::CategoryCapture(regex) => {
                captured_any(regex, text, |word| config.is_category_term(word))
            }
        })
    }

    fn keyword_overlap(&self, tokens: &HashSet<&str>) -> usize {
        self.keywords
            .iter()
            .filter(|k| tokens.contains(*k))
            .count()
    }
}

/// A "did you mean" entry for an unrecognized query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub intent: Intent,
    pub example: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub intent: Intent,
    /// Empty unless the intent is Unrecognized
    pub suggestions: Vec<Suggestion>,
}

#[derive(Debug, Clone)]
pub struct IntentClassifier {
    rules: Vec<IntentRule>,
    config: QueryConfig,
}

fn captured_any(regex: &Regex, text: &str, accept: impl Fn(&str) -> bool) -> bool {
    regex
        .captures_iter(text)
        .any(|caps| caps.get(1).is_some_and(|m| accept(m.as_str())))
}

fn compile<S: AsRef<str>>(
    patterns: &[S],
    wrap: fn(Regex) -> Pattern,
) -> Result<Vec<Pattern>> {
    patterns
        .iter()
        .map(|p| Ok(wrap(Regex::new(p.as_ref())?)))
        .collect()
}

fn plain<S: AsRef<str>>(patterns: &[S]) -> Result<Vec<Pattern>> {
    compile(patterns, Pattern::Plain)
}

fn capture<S: AsRef<str>>(patterns: &[S]) -> Result<Vec<Pattern>> {
    compile(patterns, Pattern::Capture)
}

/// `\b(?:a|b|c)s?\s+(?:suffixes)\b` over escaped names, longest first
fn names_followed_by(names: &[String], suffixes: &str) -> Result<Option<Pattern>> {
    let mut names: Vec<&str> = names
        .iter()
        .map(|n| n.trim())
        .filter(|n| !n.is_empty())
        .collect();
    if names.is_empty() {
        return Ok(None);
    }
    names.sort_by_key(|n| std::cmp::Reverse(n.len()));
    let alternation = names
        .iter()
        .map(|n| regex::escape(n))
        .collect::<Vec<_>>()
        .join("|");
    let regex = Regex::new(&format!(r"\b(?:{})s?\s+(?:{})\b", alternation, suffixes))?;
    Ok(Some(Pattern::Plain(regex)))
}

const WORD: &str = r"([\w'&-]+)";

impl IntentClassifier {
    pub fn new(config: &QueryConfig) -> Result<Self> {
        let rules = build_rules(config)?;
        Ok(Self {
            rules,
            config: config.clone(),
        })
    }

    pub fn rules(&self) -> &[IntentRule] {
        &self.rules
    }

    /// Classify normalized text
    pub fn classify(&self, text: &str) -> Classification {
        if let Some(rule) = self.rules.iter().find(|r| r.matches(text, &self.config)) {
            debug!(
                "Query '{}' matched tier {} rule for {}",
                text, rule.tier, rule.intent
            );
            return Classification {
                intent: rule.intent,
                suggestions: Vec::new(),
            };
        }

        let suggestions = self.suggest(text);
        debug!(
            "Query '{}' matched no rule, {} suggestions",
            text,
            suggestions.len()
        );
        Classification {
            intent: Intent::Unrecognized,
            suggestions,
        }
    }

    /// Rank rules by distinct-token overlap with their keywords
    fn suggest(&self, text: &str) -> Vec<Suggestion> {
        let tokens: HashSet<&str> = text
            .split(|c: char| !(c.is_alphanumeric() || c == '&' || c == '\''))
            .filter(|t| !t.is_empty())
            .collect();

        let mut ranked: Vec<(usize, usize, &IntentRule)> = self
            .rules
            .iter()
            .enumerate()
            .map(|(order, rule)| (rule.keyword_overlap(&tokens), order, rule))
            .filter(|(overlap, _, _)| *overlap > 0)
            .collect();
        ranked.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

        let mut seen = HashSet::new();
        ranked
            .into_iter()
            .filter(|(_, _, rule)| seen.insert(rule.intent))
            .take(self.config.suggestion_limit)
            .map(|(_, _, rule)| Suggestion {
                intent: rule.intent,
                example: rule.example.to_string(),
            })
            .collect()
    }
}

fn build_rules(config: &QueryConfig) -> Result<Vec<IntentRule>> {
    let merchant_names: Vec<String> = config
        .lunch_merchants
        .iter()
        .chain(&config.grocery_stores)
        .chain(&config.gas_stations)
        .cloned()
        .collect();
    let category_terms: Vec<String> = config
        .categories
        .iter()
        .flat_map(|c| c.terms().map(String::from).collect::<Vec<_>>())
        .collect();

    let at_place = [
        format!(r"\b(?:spent|spend|spending)\s+at\s+(?:the\s+|a\s+)?{}", WORD),
        format!(r"\btransactions\s+at\s+(?:the\s+|a\s+)?{}", WORD),
        format!(r"\bhow\s+much\s+at\s+(?:the\s+|a\s+)?{}", WORD),
        format!(r"\bpurchases\s+(?:from|at)\s+(?:the\s+|a\s+)?{}", WORD),
    ];

    // "spent at the bar" names a category, not a merchant
    let mut merchant_patterns = compile(&at_place, Pattern::MerchantCapture)?;
    merchant_patterns.extend(names_followed_by(
        &merchant_names,
        "spending|expenses|costs|purchases|transactions",
    )?);

    let mut category_patterns = capture(&[
        format!(
            r"\b(?:spent|spend|spending)\s+on\s+(?:my\s+|the\s+)?{}",
            WORD
        ),
        format!(r"\bhow\s+much\s+for\s+(?:my\s+|the\s+)?{}", WORD),
    ])?;
    category_patterns.extend(names_followed_by(
        &category_terms,
        "spending|expenses|costs",
    )?);
    category_patterns.extend(compile(&at_place, Pattern::CategoryCapture)?);

    Ok(vec![
        IntentRule {
            tier: 1,
            intent: Intent::LunchSpending,
            patterns: plain(&[r"\blunch(?:es)?\b"])?,
            keywords: &["lunch", "lunches", "meal", "meals", "eat", "eating", "takeout"],
            example: "How much did I spend on lunch last month?",
        },
        IntentRule {
            tier: 1,
            intent: Intent::MerchantSpending,
            patterns: merchant_patterns,
            keywords: &["merchant", "store", "shop", "purchases", "bought", "vendor"],
            example: "How much did I spend at Costco this year?",
        },
        IntentRule {
            tier: 1,
            intent: Intent::CategorySpending,
            patterns: category_patterns,
            keywords: &["category", "categories", "groceries", "beer", "gas", "bills"],
            example: "How much did I spend on groceries this month?",
        },
        IntentRule {
            tier: 2,
            intent: Intent::Dividend,
            patterns: plain(&[r"\bdividends?\b"])?,
            keywords: &["dividend", "dividends", "payout", "payouts", "yield", "distributions"],
            example: "How much did I earn in dividends this year?",
        },
        IntentRule {
            tier: 2,
            intent: Intent::CashFlow,
            patterns: plain(&[
                r"\bcash\s*flow\b",
                r"\bincome\s+(?:vs\.?|versus)\s+expenses\b",
                r"\bmoney\s+in\s+(?:vs\.?|versus)\s+out\b",
                r"\bprofit\s+and\s+loss\b",
                r"\bp&l\b",
                r"\bearnings\s+(?:vs\.?|versus)\s+spending\b",
            ])?,
            keywords: &["cash", "flow", "vs", "versus", "saved", "save", "surplus"],
            example: "What was my cash flow last month?",
        },
        IntentRule {
            tier: 3,
            intent: Intent::Income,
            patterns: plain(&[
                r"\bincome\b",
                r"\bsalary\b",
                r"\bpaystubs?\b",
                r"\bpaychecks?\b",
                r"\bearnings\b",
                r"\bhow\s+much\s+did\s+i\s+earn\b",
                r"\bhow\s+much\s+do\s+i\s+make\b",
                r"\brevenue\b",
                r"\bpayroll\b",
            ])?,
            keywords: &["income", "earn", "earned", "paid", "pay", "salary", "wages", "make"],
            example: "What was my income this month?",
        },
        IntentRule {
            tier: 3,
            intent: Intent::Expense,
            patterns: plain(&[
                r"\bexpenses?\b",
                r"\bspending\b",
                r"\bspent\b",
                r"\bspend\b",
                r"\bcosts\b",
                r"\boutgoings\b",
                r"\boutflows?\b",
            ])?,
            keywords: &["expense", "expenses", "spend", "spent", "spending", "cost", "money"],
            example: "What were my expenses last month?",
        },
        IntentRule {
            tier: 3,
            intent: Intent::NetWorth,
            patterns: plain(&[
                r"\bnet\s+worth\b",
                r"\bhow\s+much\s+am\s+i\s+worth\b",
                r"\btotal\s+value\b",
                r"\bportfolio\s+value\b",
                r"\bassets\b",
            ])?,
            keywords: &["worth", "net", "assets", "wealth", "value", "total", "balance"],
            example: "What is my net worth?",
        },
        IntentRule {
            tier: 3,
            intent: Intent::Performance,
            patterns: plain(&[
                r"\bperformance\b",
                r"\bperforming\b",
                r"\bhow\s+did\s+(?:my\s+)?portfolio\s+do\b",
                r"\breturns?\b",
                r"\bgains?\b",
                r"\bloss(?:es)?\b",
                r"\bprofit\b",
                r"\bhow\s+much\s+did\s+i\s+(?:make|lose)\b",
            ])?,
            keywords: &["portfolio", "perform", "doing", "up", "down", "invested", "market"],
            example: "How is my portfolio performing?",
        },
        IntentRule {
            tier: 3,
            intent: Intent::Holdings,
            patterns: plain(&[
                r"\bholdings\b",
                r"\bstocks\b",
                r"\bsecurities\b",
                r"\bpositions\b",
                r"\bwhat\s+do\s+i\s+own\b",
                r"\binvestments\b",
            ])?,
            keywords: &["own", "holding", "stock", "shares", "position", "ticker", "fund"],
            example: "What are my top holdings?",
        },
        IntentRule {
            tier: 3,
            intent: Intent::Allocation,
            patterns: plain(&[
                r"\ballocation\b",
                r"\ballocated\b",
                r"\bbreakdown\b",
                r"\bdistribution\b",
                r"\bdiversifi(?:ed|cation)\b",
                r"\bwhat\s+am\s+i\s+invested\s+in\b",
                r"\basset\s+mix\b",
            ])?,
            keywords: &["asset", "class", "mix", "split", "bonds", "equities", "diversify"],
            example: "What is my asset allocation?",
        },
        IntentRule {
            tier: 3,
            intent: Intent::Transactions,
            patterns: plain(&[
                r"\btransactions\b",
                r"\btrades\b",
                r"\bactivity\b",
                r"\bwhat\s+did\s+i\s+(?:buy|sell)\b",
                r"\bpurchases\b",
            ])?,
            keywords: &["transaction", "recent", "history", "charges", "list", "show", "buy"],
            example: "Show my transactions from last week",
        },
    ])
}
