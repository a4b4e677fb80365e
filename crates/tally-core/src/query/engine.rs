//! Query engine facade

use chrono::NaiveDateTime;
use tracing::debug;

use crate::collaborators::{Analytics, TransactionRepository};
use crate::config::QueryConfig;
use crate::error::Result;
use crate::lunch::LunchScorer;
use crate::models::{FilterSet, Intent, TimeRangeSource};

use super::time::default_range;
use super::{normalize, IntentClassifier, ParameterExtractor, QueryContext, QueryResult, QueryRouter};

/// Turns free text into a [`QueryContext`] and runs it
///
/// Built once from a [`QueryConfig`]; every method takes `&self` and the
/// reference instant explicitly.
#[derive(Debug, Clone)]
pub struct QueryEngine {
    config: QueryConfig,
    classifier: IntentClassifier,
    extractor: ParameterExtractor,
    scorer: LunchScorer,
}

impl QueryEngine {
    pub fn new(config: QueryConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            classifier: IntentClassifier::new(&config)?,
            extractor: ParameterExtractor::new(&config)?,
            scorer: LunchScorer::new(&config)?,
            config,
        })
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    pub fn classifier(&self) -> &IntentClassifier {
        &self.classifier
    }

    pub fn extractor(&self) -> &ParameterExtractor {
        &self.extractor
    }

    pub fn scorer(&self) -> &LunchScorer {
        &self.scorer
    }

    /// Resolve a raw query into an immutable context
    ///
    /// `account_override` always wins over an account named in the text.
    pub fn parse(
        &self,
        query: &str,
        now: NaiveDateTime,
        account_override: Option<&str>,
    ) -> QueryContext {
        let text = normalize(query);
        let classification = self.classifier.classify(&text);
        let intent = classification.intent;

        let (time_range, time_range_source) = match self.extractor.time_range(&text, now) {
            Some(range) => (range, TimeRangeSource::Explicit),
            None => (default_range(intent, now), TimeRangeSource::Default),
        };

        let account = account_override
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .or_else(|| self.extractor.account(&text));

        // "dividends from fidelity" must not become a merchant filter on the dividend sum
        let filters = if intent.uses_transaction_filters() {
            let category = self.extractor.category(&text);
            let keyword = if intent == Intent::CategorySpending && category.is_none() {
                self.extractor.spending_term(&text)
            } else {
                None
            };
            FilterSet {
                merchant: self.extractor.merchant(&text, category.as_deref()),
                category,
                account,
                amount: self.extractor.amount(&text),
                keyword,
            }
        } else {
            FilterSet {
                account,
                ..FilterSet::default()
            }
        };

        debug!(
            "Parsed '{}' as {} over {} ({:?}), filters {:?}",
            query, intent, time_range, time_range_source, filters
        );

        QueryContext::new(
            query.to_string(),
            intent,
            time_range,
            time_range_source,
            filters,
            classification.suggestions,
        )
    }

    /// Run a resolved context against the collaborators
    pub fn execute(
        &self,
        ctx: &QueryContext,
        analytics: &dyn Analytics,
        repository: &dyn TransactionRepository,
    ) -> Result<QueryResult> {
        QueryRouter::new(analytics, repository, &self.scorer)
            .include_pending(self.config.include_pending)
            .execute(ctx)
    }

    /// Parse and execute in one step
    pub fn ask(
        &self,
        query: &str,
        now: NaiveDateTime,
        account_override: Option<&str>,
        analytics: &dyn Analytics,
        repository: &dyn TransactionRepository,
    ) -> Result<QueryResult> {
        let ctx = self.parse(query, now, account_override);
        self.execute(&ctx, analytics, repository)
    }
}
