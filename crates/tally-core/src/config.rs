//! Query configuration: category aliases, merchant lists and lunch thresholds
//!
//! Everything the classifier, extractor and lunch scorer treat as curated data
//! lives here so deployments and tests can substitute their own tables.
//!
//! ## Configuration Resolution
//!
//! Config is loaded with a two-layer resolution:
//! 1. Check for an explicit path, or the override in the data dir
//!    (~/.local/share/tally/config/query.toml)
//! 2. Fall back to embedded defaults (compiled into binary)
//!
//! Sections and keys missing from an override keep their built-in values.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Embedded default config (compiled into binary)
pub const DEFAULT_CONFIG: &str = include_str!("../../../config/query.toml");

const DEFAULT_STOP_WORDS: &[&str] = &[
    "my", "the", "a", "an", "all", "show", "list", "recent", "what", "how", "total", "me", "i",
    "much", "it", "this", "that", "these", "those", "any",
];

const DEFAULT_ACCOUNT_KEYWORDS: &[&str] = &[
    "checking",
    "savings",
    "brokerage",
    "credit",
    "ira",
    "401k",
    "roth",
];

const DEFAULT_CATEGORIES: &[(&str, &[&str])] = &[
    (
        "beer",
        &["beer", "alcohol", "bar", "brewery", "pub", "liquor", "wine", "drinks"],
    ),
    (
        "restaurants",
        &["restaurant", "dining", "food", "eat", "cafe", "coffee", "lunch", "dinner"],
    ),
    ("gas", &["gas", "fuel", "gasoline", "petrol", "filling station"]),
    (
        "groceries",
        &["grocery", "supermarket", "food store", "grocery store"],
    ),
    (
        "bills",
        &["bill", "utility", "electric", "water", "internet", "phone", "cable"],
    ),
    (
        "entertainment",
        &["entertainment", "movie", "theater", "concert", "streaming"],
    ),
    ("shopping", &["shopping", "retail", "store", "amazon", "online"]),
    (
        "transport",
        &["transport", "uber", "lyft", "taxi", "transit", "bus", "train"],
    ),
    (
        "health",
        &["health", "medical", "doctor", "pharmacy", "gym", "fitness"],
    ),
];

const DEFAULT_LUNCH_MERCHANTS: &[&str] = &[
    "chipotle",
    "firehouse",
    "taco bell",
    "subway",
    "panera",
    "jimmy johns",
    "potbelly",
    "qdoba",
    "moe's",
    "panda express",
    "pita pit",
    "which wich",
    "jersey mike's",
    "firehouse subs",
    "blaze pizza",
    "mod pizza",
    "papa johns",
    "domino's",
    "pizza hut",
    "mcdonald's",
    "burger king",
    "wendy's",
];

const DEFAULT_GROCERY_STORES: &[&str] = &[
    "king soupers",
    "albertsons",
    "safeway",
    "kroger",
    "walmart",
    "target",
    "whole foods",
    "trader joe's",
    "aldi",
    "costco",
    "publix",
    "giant eagle",
    "wegmans",
    "stop & shop",
];

const DEFAULT_GAS_STATIONS: &[&str] = &[
    "shell",
    "exxon",
    "bp",
    "chevron",
    "7-eleven",
    "wawa",
    "sheetz",
    "speedway",
    "circle k",
    "arco",
    "mobil",
    "phillips 66",
];

const DEFAULT_FOOD_CATEGORIES: &[&str] =
    &["restaurants", "restaurant", "food", "dining", "fast food"];

const DEFAULT_GROCERY_CATEGORIES: &[&str] = &["groceries", "grocery", "supermarket"];

/// A canonical category and the tokens that resolve to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryAliases {
    pub name: String,
    pub aliases: Vec<String>,
}

impl CategoryAliases {
    /// The canonical name followed by every alias
    pub fn terms(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }

    /// Whether `term` is the canonical name or one of its aliases (singular or plural)
    pub fn is_term(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        let singular = term.strip_suffix('s').unwrap_or(&term);
        self.terms()
            .any(|t| t.eq_ignore_ascii_case(&term) || t.eq_ignore_ascii_case(singular))
    }
}

/// Half-open window of hours of the day: `start <= hour < end`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourWindow {
    pub start: u32,
    pub end: u32,
}

impl HourWindow {
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, hour: u32) -> bool {
        hour >= self.start && hour < self.end
    }
}

/// Numeric inputs to the lunch scorer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LunchThresholds {
    pub lunch_hours: HourWindow,
    pub near_lunch_hours: Vec<HourWindow>,
    pub grocery_max_amount: f64,
    pub gas_food_max_amount: f64,
    pub typical_max_amount: f64,
    pub moderate_max_amount: f64,
}

impl Default for LunchThresholds {
    fn default() -> Self {
        Self {
            lunch_hours: HourWindow::new(11, 14),
            near_lunch_hours: vec![HourWindow::new(8, 10), HourWindow::new(15, 16)],
            grocery_max_amount: 15.0,
            gas_food_max_amount: 15.0,
            typical_max_amount: 20.0,
            moderate_max_amount: 25.0,
        }
    }
}

/// Curated data shared (read-only) by the classifier, extractor and scorer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Categories in registration order (earlier wins ties)
    pub categories: Vec<CategoryAliases>,
    pub lunch_merchants: Vec<String>,
    pub grocery_stores: Vec<String>,
    pub gas_stations: Vec<String>,
    pub food_categories: Vec<String>,
    pub grocery_categories: Vec<String>,
    pub account_keywords: Vec<String>,
    pub stop_words: Vec<String>,
    pub suggestion_limit: usize,
    pub include_pending: bool,
    pub lunch: LunchThresholds,
}

fn owned(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            categories: DEFAULT_CATEGORIES
                .iter()
                .map(|(name, aliases)| CategoryAliases {
                    name: name.to_string(),
                    aliases: owned(aliases),
                })
                .collect(),
            lunch_merchants: owned(DEFAULT_LUNCH_MERCHANTS),
            grocery_stores: owned(DEFAULT_GROCERY_STORES),
            gas_stations: owned(DEFAULT_GAS_STATIONS),
            food_categories: owned(DEFAULT_FOOD_CATEGORIES),
            grocery_categories: owned(DEFAULT_GROCERY_CATEGORIES),
            account_keywords: owned(DEFAULT_ACCOUNT_KEYWORDS),
            stop_words: owned(DEFAULT_STOP_WORDS),
            suggestion_limit: 3,
            include_pending: true,
            lunch: LunchThresholds::default(),
        }
    }
}

impl QueryConfig {
    /// Load config from the default override location, falling back to embedded defaults
    pub fn load() -> Result<Self> {
        Self::resolve(None)
    }

    /// Load config from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Resolve config: explicit path, then the data-dir override, then embedded
    ///
    /// An explicit path must exist; only the implicit override may be absent.
    pub fn resolve(override_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = override_path {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "Config file {} does not exist",
                    path.display()
                )));
            }
            debug!("Loading query config from {}", path.display());
            return Self::load_from(path);
        }

        if let Some(default_path) = default_config_path() {
            if default_path.exists() {
                debug!("Loading query config from {}", default_path.display());
                return Self::load_from(&default_path);
            }
        }

        Self::from_toml(DEFAULT_CONFIG)
    }

    /// Parse TOML, merging present sections over the compiled defaults
    pub fn from_toml(content: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;

        let mut config = Self::default();

        if let Some(query) = raw.query {
            if let Some(limit) = query.suggestion_limit {
                config.suggestion_limit = limit;
            }
            if let Some(pending) = query.include_pending {
                config.include_pending = pending;
            }
            if let Some(words) = query.stop_words {
                config.stop_words = lowercase_all(words);
            }
            if let Some(keywords) = query.account_keywords {
                config.account_keywords = lowercase_all(keywords);
            }
        }

        if let Some(categories) = raw.categories {
            config.categories = categories
                .into_iter()
                .map(|c| CategoryAliases {
                    name: c.name.trim().to_lowercase(),
                    aliases: lowercase_all(c.aliases.unwrap_or_default()),
                })
                .collect();
        }

        if let Some(merchants) = raw.merchants {
            if let Some(lunch) = merchants.lunch {
                config.lunch_merchants = lowercase_all(lunch);
            }
            if let Some(grocery) = merchants.grocery {
                config.grocery_stores = lowercase_all(grocery);
            }
            if let Some(gas) = merchants.gas {
                config.gas_stations = lowercase_all(gas);
            }
        }

        if let Some(groups) = raw.category_groups {
            if let Some(food) = groups.food {
                config.food_categories = lowercase_all(food);
            }
            if let Some(grocery) = groups.grocery {
                config.grocery_categories = lowercase_all(grocery);
            }
        }

        if let Some(lunch) = raw.lunch {
            if let Some([start, end]) = lunch.lunch_hours {
                config.lunch.lunch_hours = HourWindow::new(start, end);
            }
            if let Some(windows) = lunch.near_lunch_hours {
                config.lunch.near_lunch_hours = windows
                    .into_iter()
                    .map(|[start, end]| HourWindow::new(start, end))
                    .collect();
            }
            if let Some(v) = lunch.grocery_max_amount {
                config.lunch.grocery_max_amount = v;
            }
            if let Some(v) = lunch.gas_food_max_amount {
                config.lunch.gas_food_max_amount = v;
            }
            if let Some(v) = lunch.typical_max_amount {
                config.lunch.typical_max_amount = v;
            }
            if let Some(v) = lunch.moderate_max_amount {
                config.lunch.moderate_max_amount = v;
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject tables the classifier and scorer cannot work with
    pub fn validate(&self) -> Result<()> {
        for category in &self.categories {
            if category.name.is_empty() {
                return Err(Error::Config("Category name must not be empty".into()));
            }
            if category.aliases.iter().any(|a| a.trim().is_empty()) {
                return Err(Error::Config(format!(
                    "Category '{}' has an empty alias",
                    category.name
                )));
            }
        }

        let windows =
            std::iter::once(&self.lunch.lunch_hours).chain(self.lunch.near_lunch_hours.iter());
        for window in windows {
            if window.start >= window.end || window.end > 24 {
                return Err(Error::Config(format!(
                    "Invalid hour window [{}, {})",
                    window.start, window.end
                )));
            }
        }

        let thresholds = [
            ("grocery_max_amount", self.lunch.grocery_max_amount),
            ("gas_food_max_amount", self.lunch.gas_food_max_amount),
            ("typical_max_amount", self.lunch.typical_max_amount),
            ("moderate_max_amount", self.lunch.moderate_max_amount),
        ];
        for (name, value) in thresholds {
            if value.is_nan() || value <= 0.0 {
                return Err(Error::Config(format!("{} must be positive", name)));
            }
        }
        if self.lunch.moderate_max_amount < self.lunch.typical_max_amount {
            return Err(Error::Config(
                "moderate_max_amount must not be below typical_max_amount".into(),
            ));
        }

        Ok(())
    }

    /// Look up a canonical category by name
    pub fn category(&self, name: &str) -> Option<&CategoryAliases> {
        self.categories
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Whether `term` names any category, by canonical name or alias
    pub fn is_category_term(&self, term: &str) -> bool {
        self.categories.iter().any(|c| c.is_term(term))
    }

    pub fn is_stop_word(&self, word: &str) -> bool {
        let word = word.trim();
        self.stop_words.iter().any(|w| w.eq_ignore_ascii_case(word))
    }

    pub fn is_account_keyword(&self, word: &str) -> bool {
        let word = word.trim();
        self.account_keywords
            .iter()
            .any(|k| k.eq_ignore_ascii_case(word))
    }

    pub fn is_food_category(&self, category: &str) -> bool {
        let category = category.trim();
        self.food_categories
            .iter()
            .any(|c| c.eq_ignore_ascii_case(category))
    }

    pub fn is_grocery_category(&self, category: &str) -> bool {
        let category = category.trim();
        self.grocery_categories
            .iter()
            .any(|c| c.eq_ignore_ascii_case(category))
    }

    /// Serialize back to TOML (for `tally config show`)
    pub fn to_toml(&self) -> Result<String> {
        let raw = RawConfig::from(self);
        toml::to_string_pretty(&raw)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("tally").join("config").join("query.toml"))
}

fn lowercase_all(list: Vec<String>) -> Vec<String> {
    list.into_iter()
        .map(|s| s.trim().to_lowercase())
        .collect()
}

/// Raw config structure for TOML parsing
#[derive(Debug, Default, Deserialize, Serialize)]
struct RawConfig {
    query: Option<RawQuery>,
    categories: Option<Vec<RawCategory>>,
    merchants: Option<RawMerchants>,
    category_groups: Option<RawCategoryGroups>,
    lunch: Option<RawLunch>,
}

#[derive(Debug, Deserialize, Serialize)]
struct RawQuery {
    suggestion_limit: Option<usize>,
    include_pending: Option<bool>,
    stop_words: Option<Vec<String>>,
    account_keywords: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Serialize)]
struct RawCategory {
    name: String,
    aliases: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Serialize)]
struct RawMerchants {
    lunch: Option<Vec<String>>,
    grocery: Option<Vec<String>>,
    gas: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Serialize)]
struct RawCategoryGroups {
    food: Option<Vec<String>>,
    grocery: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Serialize)]
struct RawLunch {
    lunch_hours: Option<[u32; 2]>,
    near_lunch_hours: Option<Vec<[u32; 2]>>,
    grocery_max_amount: Option<f64>,
    gas_food_max_amount: Option<f64>,
    typical_max_amount: Option<f64>,
    moderate_max_amount: Option<f64>,
}

impl From<&QueryConfig> for RawConfig {
    fn from(config: &QueryConfig) -> Self {
        Self {
            query: Some(RawQuery {
                suggestion_limit: Some(config.suggestion_limit),
                include_pending: Some(config.include_pending),
                stop_words: Some(config.stop_words.clone()),
                account_keywords: Some(config.account_keywords.clone()),
            }),
            categories: Some(
                config
                    .categories
                    .iter()
                    .map(|c| RawCategory {
                        name: c.name.clone(),
                        aliases: Some(c.aliases.clone()),
                    })
                    .collect(),
            ),
            merchants: Some(RawMerchants {
                lunch: Some(config.lunch_merchants.clone()),
                grocery: Some(config.grocery_stores.clone()),
                gas: Some(config.gas_stations.clone()),
            }),
            category_groups: Some(RawCategoryGroups {
                food: Some(config.food_categories.clone()),
                grocery: Some(config.grocery_categories.clone()),
            }),
            lunch: Some(RawLunch {
                lunch_hours: Some([config.lunch.lunch_hours.start, config.lunch.lunch_hours.end]),
                near_lunch_hours: Some(
                    config
                        .lunch
                        .near_lunch_hours
                        .iter()
                        .map(|w| [w.start, w.end])
                        .collect(),
                ),
                grocery_max_amount: Some(config.lunch.grocery_max_amount),
                gas_food_max_amount: Some(config.lunch.gas_food_max_amount),
                typical_max_amount: Some(config.lunch.typical_max_amount),
                moderate_max_amount: Some(config.lunch.moderate_max_amount),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_embedded_config_matches_compiled_defaults() {
        let config = QueryConfig::from_toml(DEFAULT_CONFIG).unwrap();
        assert_eq!(config, QueryConfig::default());
    }

    #[test]
    fn test_partial_override_keeps_defaults() {
        let config = QueryConfig::from_toml(
            r#"
[query]
suggestion_limit = 5

[lunch]
typical_max_amount = 18.0
"#,
        )
        .unwrap();

        assert_eq!(config.suggestion_limit, 5);
        assert_eq!(config.lunch.typical_max_amount, 18.0);
        assert_eq!(config.lunch.moderate_max_amount, 25.0);
        assert_eq!(config.categories.len(), 9);
        assert!(config.include_pending);
    }

    #[test]
    fn test_categories_keep_registration_order() {
        let config = QueryConfig::from_toml(
            r#"
[[categories]]
name = "Zoo"
aliases = ["Animals"]

[[categories]]
name = "apples"
"#,
        )
        .unwrap();

        let names: Vec<_> = config.categories.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["zoo", "apples"]);
        assert_eq!(config.categories[0].aliases, vec!["animals"]);
        assert!(config.categories[1].aliases.is_empty());
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = QueryConfig::from_toml("[query\nsuggestion_limit = ").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_validate_rejects_bad_windows_and_thresholds() {
        let inverted = QueryConfig::from_toml("[lunch]\nlunch_hours = [14, 11]\n");
        assert!(inverted.is_err());

        let negative = QueryConfig::from_toml("[lunch]\ngrocery_max_amount = -1.0\n");
        assert!(negative.is_err());

        let empty_name = QueryConfig::from_toml("[[categories]]\nname = \"  \"\n");
        assert!(empty_name.is_err());
    }

    #[test]
    fn test_category_terms_and_plurals() {
        let config = QueryConfig::default();
        let beer = config.category("BEER").unwrap();
        assert!(beer.is_term("drinks"));
        assert!(beer.is_term("Beers"));
        assert!(beer.is_term("bar"));
        assert!(!beer.is_term("coffee"));
    }

    #[test]
    fn test_category_groups() {
        let config = QueryConfig::default();
        assert!(config.is_food_category("Restaurant"));
        assert!(config.is_grocery_category("groceries"));
        assert!(!config.is_food_category("gas"));

        assert!(config.is_category_term("Bars"));
        assert!(config.is_category_term("groceries"));
        assert!(!config.is_category_term("costco"));
    }

    #[test]
    fn test_load_from_file_and_missing_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[query]\ninclude_pending = false").unwrap();

        let config = QueryConfig::load_from(file.path()).unwrap();
        assert!(!config.include_pending);

        let resolved = QueryConfig::resolve(Some(file.path())).unwrap();
        assert!(!resolved.include_pending);

        let missing = PathBuf::from("/nonexistent/tally/query.toml");
        assert!(matches!(
            QueryConfig::resolve(Some(&missing)),
            Err(Error::Config(_))
        ));
        assert!(QueryConfig::load_from(&missing).is_err());
    }

    #[test]
    fn test_to_toml_round_trips() {
        let config = QueryConfig::default();
        let text = config.to_toml().unwrap();
        assert_eq!(QueryConfig::from_toml(&text).unwrap(), config);
    }
}
