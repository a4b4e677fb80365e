//! Lunch detection: multi-factor confidence scoring for single transactions
//!
//! A transaction starts at a neutral baseline and collects one signed
//! contribution from each of four independent buckets: time of day, merchant
//! identity, amount magnitude and assigned category. The clamped sum decides
//! whether the transaction is counted as lunch, surfaced as uncertain, or
//! dropped.

use chrono::{NaiveTime, Timelike};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::QueryConfig;
use crate::error::Result;
use crate::models::TransactionRecord;

/// Starting score before any contribution
pub const BASELINE: i32 = 50;
/// Scores at or above this are counted as lunch
pub const INCLUDE_THRESHOLD: u8 = 60;
/// Scores at or above this (and below include) are uncertain
pub const UNCERTAIN_THRESHOLD: u8 = 40;

const LUNCH_TIME_DELTA: i32 = 30;
const NEAR_LUNCH_DELTA: i32 = 10;
const OUTSIDE_LUNCH_DELTA: i32 = -20;
const LUNCH_MERCHANT_DELTA: i32 = 40;
const GROCERY_SMALL_DELTA: i32 = 20;
const GAS_SMALL_DELTA: i32 = 25;
const UNKNOWN_MERCHANT_DELTA: i32 = -10;
const TYPICAL_AMOUNT_DELTA: i32 = 15;
const MODERATE_AMOUNT_DELTA: i32 = 5;
const LARGE_AMOUNT_DELTA: i32 = -30;
const FOOD_CATEGORY_DELTA: i32 = 10;
const LARGE_GROCERY_DELTA: i32 = -20;

/// Which bucket a contribution came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Factor {
    TimeOfDay,
    Merchant,
    Amount,
    Category,
}

impl Factor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TimeOfDay => "time_of_day",
            Self::Merchant => "merchant",
            Self::Amount => "amount",
            Self::Category => "category",
        }
    }
}

impl std::fmt::Display for Factor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Store types that sell lunch only incidentally
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    Grocery,
    GasStation,
}

impl std::fmt::Display for StoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Grocery => write!(f, "grocery store"),
            Self::GasStation => write!(f, "gas station"),
        }
    }
}

/// Why a contribution was applied. Carries its data so callers can re-render it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reason {
    LunchTime { time: NaiveTime },
    NearLunchTime { time: NaiveTime },
    OutsideLunchHours { time: NaiveTime },
    NoTimeData,
    KnownLunchMerchant,
    SmallStorePurchase { store: StoreKind, amount: f64 },
    LargeStorePurchase { store: StoreKind, amount: f64 },
    UnknownMerchant,
    TypicalLunchAmount { amount: f64 },
    ModerateAmount { amount: f64 },
    LargeAmount { amount: f64 },
    FoodCategory { category: String },
    LargeGroceryPurchase { amount: f64 },
}

impl std::fmt::Display for Reason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LunchTime { time } => write!(f, "lunch time ({})", time.format("%H:%M")),
            Self::NearLunchTime { time } => {
                write!(f, "near lunch hours ({})", time.format("%H:%M"))
            }
            Self::OutsideLunchHours { time } => {
                write!(f, "outside lunch hours ({})", time.format("%H:%M"))
            }
            Self::NoTimeData => write!(f, "no time data available"),
            Self::KnownLunchMerchant => write!(f, "known lunch merchant"),
            Self::SmallStorePurchase { store, amount } => {
                write!(f, "{}, small amount (${:.2})", store, amount)
            }
            Self::LargeStorePurchase { store, amount } => {
                write!(f, "{}, large amount (${:.2}), likely not lunch", store, amount)
            }
            Self::UnknownMerchant => write!(f, "unknown merchant type"),
            Self::TypicalLunchAmount { amount } => {
                write!(f, "typical lunch amount (${:.2})", amount)
            }
            Self::ModerateAmount { amount } => write!(f, "moderate amount (${:.2})", amount),
            Self::LargeAmount { amount } => {
                write!(f, "large amount (${:.2}), unlikely to be lunch", amount)
            }
            Self::FoodCategory { category } => write!(f, "restaurant/food category ({})", category),
            Self::LargeGroceryPurchase { amount } => {
                write!(f, "large grocery purchase (${:.2}), excluded", amount)
            }
        }
    }
}

/// One signed, explained adjustment to a confidence score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreContribution {
    pub factor: Factor,
    pub delta: i32,
    pub reason: Reason,
}

/// Inclusion decision derived from a score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceTier {
    Include,
    Uncertain,
    Exclude,
}

impl ConfidenceTier {
    pub fn from_score(score: u8) -> Self {
        if score >= INCLUDE_THRESHOLD {
            Self::Include
        } else if score >= UNCERTAIN_THRESHOLD {
            Self::Uncertain
        } else {
            Self::Exclude
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Include => "include",
            Self::Uncertain => "uncertain",
            Self::Exclude => "exclude",
        }
    }
}

impl std::fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceResult {
    /// Clamped to 0..=100
    pub score: u8,
    pub tier: ConfidenceTier,
    /// In bucket order: time, merchant, amount, category
    pub contributions: Vec<ScoreContribution>,
}

impl ConfidenceResult {
    pub fn reasons(&self) -> Vec<String> {
        self.contributions
            .iter()
            .map(|c| c.reason.to_string())
            .collect()
    }
}

/// Whole-word, case-insensitive matcher over a curated name list
#[derive(Debug, Clone)]
struct NameList {
    pattern: Option<Regex>,
}

impl NameList {
    fn new(names: &[String]) -> Result<Self> {
        let alternatives: Vec<String> = names
            .iter()
            .map(|n| n.trim())
            .filter(|n| !n.is_empty())
            .map(regex::escape)
            .collect();
        if alternatives.is_empty() {
            return Ok(Self { pattern: None });
        }
        // Names may start or end with punctuation ("7-eleven", "moe's"), so
        // boundaries are "not preceded/followed by a word character".
        let pattern = Regex::new(&format!(
            r"(?i)(?:^|[^\w])(?:{})(?:[^\w]|$)",
            alternatives.join("|")
        ))?;
        Ok(Self {
            pattern: Some(pattern),
        })
    }

    fn contains(&self, merchant: &str) -> bool {
        self.pattern
            .as_ref()
            .is_some_and(|p| p.is_match(merchant))
    }
}

/// Scores transactions for "is this lunch?"
///
/// Immutable after construction; safe to share across threads.
#[derive(Debug, Clone)]
pub struct LunchScorer {
    lunch_merchants: NameList,
    grocery_stores: NameList,
    gas_stations: NameList,
    config: QueryConfig,
}

impl LunchScorer {
    pub fn new(config: &QueryConfig) -> Result<Self> {
        Ok(Self {
            lunch_merchants: NameList::new(&config.lunch_merchants)?,
            grocery_stores: NameList::new(&config.grocery_stores)?,
            gas_stations: NameList::new(&config.gas_stations)?,
            config: config.clone(),
        })
    }

    /// Score a transaction. Pure: identical input yields identical output.
    pub fn score(&self, txn: &TransactionRecord) -> ConfidenceResult {
        let amount = txn.amount.abs();
        let mut contributions = Vec::with_capacity(4);

        contributions.push(self.time_contribution(txn.timestamp.map(|t| t.time())));

        contributions.push(self.merchant_contribution(&txn.merchant, amount));

        contributions.push(self.amount_contribution(amount));

        if let Some(c) = self.category_contribution(txn.category.as_deref(), amount) {
            contributions.push(c);
        }

        let total: i32 = contributions.iter().map(|c| c.delta).sum();
        let score = (BASELINE + total).clamp(0, 100) as u8;
        let tier = ConfidenceTier::from_score(score);

        debug!(
            "Lunch score for '{}' ${:.2}: {} ({})",
            txn.merchant, amount, score, tier
        );

        ConfidenceResult {
            score,
            tier,
            contributions,
        }
    }

    fn time_contribution(&self, time: Option<NaiveTime>) -> ScoreContribution {
        let Some(time) = time else {
            return ScoreContribution {
                factor: Factor::TimeOfDay,
                delta: 0,
                reason: Reason::NoTimeData,
            };
        };

        let hour = time.hour();
        let (delta, reason) = if self.config.lunch.lunch_hours.contains(hour) {
            (LUNCH_TIME_DELTA, Reason::LunchTime { time })
        } else if self
            .config
            .lunch
            .near_lunch_hours
            .iter()
            .any(|w| w.contains(hour))
        {
            (NEAR_LUNCH_DELTA, Reason::NearLunchTime { time })
        } else {
            (OUTSIDE_LUNCH_DELTA, Reason::OutsideLunchHours { time })
        };

        ScoreContribution {
            factor: Factor::TimeOfDay,
            delta,
            reason,
        }
    }

    fn merchant_contribution(&self, merchant: &str, amount: f64) -> ScoreContribution {
        // Priority: lunch merchant > grocery > gas station > unknown
        let (delta, reason) = if self.lunch_merchants.contains(merchant) {
            (LUNCH_MERCHANT_DELTA, Reason::KnownLunchMerchant)
        } else if self.grocery_stores.contains(merchant) {
            self.store_delta(
                StoreKind::Grocery,
                amount,
                self.config.lunch.grocery_max_amount,
                GROCERY_SMALL_DELTA,
            )
        } else if self.gas_stations.contains(merchant) {
            self.store_delta(
                StoreKind::GasStation,
                amount,
                self.config.lunch.gas_food_max_amount,
                GAS_SMALL_DELTA,
            )
        } else {
            (UNKNOWN_MERCHANT_DELTA, Reason::UnknownMerchant)
        };

        ScoreContribution {
            factor: Factor::Merchant,
            delta,
            reason,
        }
    }

    fn store_delta(
        &self,
        store: StoreKind,
        amount: f64,
        max_amount: f64,
        small_delta: i32,
    ) -> (i32, Reason) {
        if amount <= max_amount {
            (small_delta, Reason::SmallStorePurchase { store, amount })
        } else {
            (
                UNKNOWN_MERCHANT_DELTA,
                Reason::LargeStorePurchase { store, amount },
            )
        }
    }

    fn amount_contribution(&self, amount: f64) -> ScoreContribution {
        let (delta, reason) = if amount <= self.config.lunch.typical_max_amount {
            (TYPICAL_AMOUNT_DELTA, Reason::TypicalLunchAmount { amount })
        } else if amount <= self.config.lunch.moderate_max_amount {
            (MODERATE_AMOUNT_DELTA, Reason::ModerateAmount { amount })
        } else {
            (LARGE_AMOUNT_DELTA, Reason::LargeAmount { amount })
        };

        ScoreContribution {
            factor: Factor::Amount,
            delta,
            reason,
        }
    }

    fn category_contribution(
        &self,
        category: Option<&str>,
        amount: f64,
    ) -> Option<ScoreContribution> {
        let category = category?.trim();

        if self.config.is_food_category(category) {
            return Some(ScoreContribution {
                factor: Factor::Category,
                delta: FOOD_CATEGORY_DELTA,
                reason: Reason::FoodCategory {
                    category: category.to_lowercase(),
                },
            });
        }

        if self.config.is_grocery_category(category)
            && amount > self.config.lunch.grocery_max_amount
        {
            return Some(ScoreContribution {
                factor: Factor::Category,
                delta: LARGE_GROCERY_DELTA,
                reason: Reason::LargeGroceryPurchase { amount },
            });
        }

        None
    }
}
