use std::{
    borrow::Cow,
    collections::{hash_map::Entry, HashMap, HashSet},
    sync::Arc,
};

use log::info;
use serde::{Deserialize, Serialize};

use crate::{
    data::log_item::LogId,
    relevance::{
        container::{Aspect, Rating, RelContainer},
        RelevanceError,
    },
};

/// One row of a crowd relevance judgment export.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JudgmentRow {
    pub worker_id: String,
    pub trust: f64,
    pub log_id: LogId,
    /// The query of the SERP the judged document was shown on.
    pub query: String,
    /// Encoded grade, e.g. `D2` or `R-1`.
    pub grade: String,
}

/// Collects the judgments of trustworthy raters per log id.
#[derive(Debug, Default)]
pub struct RelevanceAggregator {
    spammers: HashSet<String>,
    use_trust: bool,
    judgments: HashMap<LogId, RelContainer>,
    queries: HashMap<LogId, String>,
}

impl RelevanceAggregator {
    /// Creates an aggregator ignoring all rows of the `spammers`.
    ///
    /// Without `use_trust` every rating gets the same weight.
    pub fn new(spammers: impl IntoIterator<Item = String>, use_trust: bool) -> Self {
        let spammers = spammers.into_iter().collect::<HashSet<_>>();
        info!("{} spammers", spammers.len());
        Self {
            spammers,
            use_trust,
            ..Self::default()
        }
    }

    /// Adds a direct (snippet) relevance judgment.
    pub fn add_d(&mut self, row: &JudgmentRow) -> Result<(), RelevanceError> {
        self.add(Aspect::D, row)
    }

    /// Adds a result (document) relevance judgment.
    pub fn add_r(&mut self, row: &JudgmentRow) -> Result<(), RelevanceError> {
        self.add(Aspect::R, row)
    }

    fn add(&mut self, aspect: Aspect, row: &JudgmentRow) -> Result<(), RelevanceError> {
        if self.spammers.contains(&row.worker_id) {
            return Ok(());
        }

        match self.queries.entry(row.log_id.clone()) {
            Entry::Occupied(entry) if entry.get() != &row.query => {
                return Err(RelevanceError::ConflictingQuery {
                    log_id: row.log_id.to_string(),
                    first: entry.get().clone(),
                    second: row.query.clone(),
                });
            }
            Entry::Occupied(_) => {}
            Entry::Vacant(entry) => {
                entry.insert(row.query.clone());
            }
        }

        let trust = if self.use_trust { row.trust } else { 1. };
        self.judgments
            .entry(row.log_id.clone())
            .or_default()
            .add_rating(aspect, &row.grade, trust);
        Ok(())
    }

    pub fn finish(self) -> Judgments {
        let judgments = Judgments {
            containers: self.judgments,
            queries: self.queries,
        };
        info!(
            "{} items with complete relevance",
            judgments.complete_items()
        );
        info!(
            "{} queries with at least one completely judged document",
            judgments.queries_with_complete_item()
        );
        judgments
    }
}

/// Aggregated relevance ratings keyed by log id.
#[derive(Clone, Debug, Default)]
pub struct Judgments {
    containers: HashMap<LogId, RelContainer>,
    queries: HashMap<LogId, String>,
}

impl Judgments {
    pub fn get(&self, log_id: &LogId) -> Option<&RelContainer> {
        self.containers.get(log_id)
    }

    /// Number of items with both a direct and a result relevance rating.
    pub fn complete_items(&self) -> usize {
        self.containers
            .values()
            .filter(|rel| rel.is_complete())
            .count()
    }

    /// Number of distinct queries with at least one completely judged item.
    pub fn queries_with_complete_item(&self) -> usize {
        self.containers
            .iter()
            .filter(|(_, rel)| rel.is_complete())
            .filter_map(|(log_id, _)| self.queries.get(log_id))
            .collect::<HashSet<_>>()
            .len()
    }
}

/// Access to the relevance ratings of log items.
pub trait RelevanceSource {
    /// The ratings of the item, an empty container if it was never judged.
    fn ratings(&self, log_id: &LogId) -> Cow<'_, RelContainer>;
}

impl RelevanceSource for Judgments {
    fn ratings(&self, log_id: &LogId) -> Cow<'_, RelContainer> {
        self.get(log_id)
            .map_or_else(|| Cow::Owned(RelContainer::default()), Cow::Borrowed)
    }
}

/// Interprets the log id itself as a TREC relevance mark.
///
/// Used to replay click models over rankings judged in TREC style. Unparsable ids are unjudged.
#[derive(Clone, Copy, Debug, Default)]
pub struct GradeAsRelevance;

impl RelevanceSource for GradeAsRelevance {
    fn ratings(&self, log_id: &LogId) -> Cow<'_, RelContainer> {
        let mut rel = RelContainer::default();
        if let Ok(mark) = log_id.0.parse::<i64>() {
            // -2 marks spam documents, treated as irrelevant
            let grade = if mark == -2 { 0 } else { mark };
            if grade >= 0 {
                rel.rs.push(Rating::new(grade as usize, 1.));
            }
        }
        Cow::Owned(rel)
    }
}

impl<T> RelevanceSource for &T
where
    T: RelevanceSource + ?Sized,
{
    fn ratings(&self, log_id: &LogId) -> Cow<'_, RelContainer> {
        (**self).ratings(log_id)
    }
}

impl<T> RelevanceSource for Arc<T>
where
    T: RelevanceSource + ?Sized,
{
    fn ratings(&self, log_id: &LogId) -> Cow<'_, RelContainer> {
        (**self).ratings(log_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(worker_id: &str, log_id: &str, query: &str, grade: &str) -> JudgmentRow {
        JudgmentRow {
            worker_id: worker_id.into(),
            trust: 0.5,
            log_id: log_id.into(),
            query: query.into(),
            grade: grade.into(),
        }
    }

    #[test]
    fn test_spammers_are_ignored() {
        let mut aggregator = RelevanceAggregator::new(vec!["spam".to_owned()], true);
        aggregator.add_d(&row("w1", "l_0", "q", "D2")).unwrap();
        aggregator.add_d(&row("spam", "l_0", "q", "D0")).unwrap();
        aggregator.add_r(&row("spam", "l_0", "q", "R0")).unwrap();
        let judgments = aggregator.finish();

        let rel = judgments.ratings(&"l_0".into());
        assert_eq!(rel.ds, vec![Rating::new(2, 0.5)]);
        assert!(rel.rs.is_empty());
        assert_eq!(judgments.complete_items(), 0);
    }

    #[test]
    fn test_trust_can_be_disabled() {
        let mut aggregator = RelevanceAggregator::new(Vec::new(), false);
        aggregator.add_r(&row("w1", "l_0", "q", "R1")).unwrap();
        assert_eq!(
            aggregator.finish().ratings(&"l_0".into()).rs,
            vec![Rating::new(1, 1.)]
        );
    }

    #[test]
    fn test_conflicting_query() {
        let mut aggregator = RelevanceAggregator::new(Vec::new(), true);
        aggregator.add_d(&row("w1", "l_0", "q1", "D1")).unwrap();
        assert!(matches!(
            aggregator.add_r(&row("w2", "l_0", "q2", "R1")),
            Err(RelevanceError::ConflictingQuery { .. })
        ));
    }

    #[test]
    fn test_complete_items_and_queries() {
        let mut aggregator = RelevanceAggregator::new(Vec::new(), true);
        for (log_id, query) in &[("a_0", "q1"), ("a_1", "q1"), ("b_0", "q2")] {
            aggregator.add_d(&row("w1", log_id, query, "D1")).unwrap();
            aggregator.add_r(&row("w1", log_id, query, "R2")).unwrap();
        }
        aggregator.add_d(&row("w1", "c_0", "q3", "D1")).unwrap();
        aggregator.add_r(&row("w1", "c_0", "q3", "R-1")).unwrap();
        let judgments = aggregator.finish();

        assert_eq!(judgments.complete_items(), 3);
        assert_eq!(judgments.queries_with_complete_item(), 2);
    }

    #[test]
    fn test_missing_items_are_unjudged() {
        let judgments = Judgments::default();
        assert_eq!(*judgments.ratings(&"nope".into()), RelContainer::default());
    }

    #[test]
    fn test_grade_as_relevance() {
        assert_eq!(
            GradeAsRelevance.ratings(&"3".into()).rs,
            vec![Rating::new(3, 1.)]
        );
        assert_eq!(
            GradeAsRelevance.ratings(&"-2".into()).rs,
            vec![Rating::new(0, 1.)]
        );
        assert!(GradeAsRelevance.ratings(&"x".into()).rs.is_empty());
        assert!(GradeAsRelevance.ratings(&"1".into()).ds.is_empty());
    }
}
