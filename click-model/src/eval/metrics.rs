use std::collections::HashMap;

use itertools::Itertools;
use lazy_static::lazy_static;

use crate::{
    data::{
        log_item::LogItem,
        snippet::{Snippet, SnippetLayout},
    },
    error::Error,
    eval::EvalError,
    model::{ubm_expected_utility, UserModel, UBM_RELS},
};

/// Highest TREC relevance mark.
pub const MAX_MARK: usize = 3;
/// Number of ranks scored by the metrics.
pub const RANK_DEPTH: usize = 10;

lazy_static! {
    /// A SERP of identical plain snippets used to replay click models as metrics.
    pub static ref FAKE_SERP: Vec<Snippet> = (0..RANK_DEPTH)
        .map(|_| {
            Snippet::new(
                vec!["g"],
                SnippetLayout {
                    offset_parent: "372".into(),
                    offset_left: 16,
                    offset_top: 842,
                    width: 496,
                    height: 147,
                },
            )
        })
        .collect();
}

/// A TREC relevance grade.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Grade(usize);

impl Grade {
    /// Converts a TREC mark, spam (`-2`) counts as irrelevant.
    pub fn from_mark(mark: i64) -> Result<Self, EvalError> {
        let grade = if mark == -2 { 0 } else { mark };
        if (0..=MAX_MARK as i64).contains(&grade) {
            Ok(Self(grade as usize))
        } else {
            Err(EvalError::InvalidMark(mark))
        }
    }

    pub fn value(self) -> usize {
        self.0
    }

    /// The normalized DCG gain `(2^g - 1) / 2^MAX_MARK`.
    pub fn dcg_gain(self) -> f64 {
        (2f64.powi(self.0 as i32) - 1.) / 2f64.powi(MAX_MARK as i32)
    }

    /// The published UBM attractiveness of the grade.
    pub fn ubm_attraction(self) -> f64 {
        UBM_RELS[self.0]
    }
}

/// Grades of the documents for a single intent, missing documents are irrelevant.
pub type DocRelevance = HashMap<String, Grade>;

fn grade(rels: &DocRelevance, doc: &str) -> Grade {
    rels.get(doc).copied().unwrap_or_default()
}

/// Relevance of the documents per intent of a query.
pub type QueryRelevance = HashMap<String, DocRelevance>;

/// Relevance judgments per query.
pub type Qrels = HashMap<String, QueryRelevance>;

/// The ranked documents of a system for a query.
pub type Ranking = (String, Vec<String>);

/// Parses TREC qrels lines `query_id intent_id doc_id mark`.
pub fn parse_qrels(qrels: &str) -> Result<Qrels, EvalError> {
    let mut parsed = Qrels::new();
    for line in qrels.lines().filter(|line| !line.trim().is_empty()) {
        let malformed = || EvalError::MalformedLine(line.to_owned());
        let (query, intent, doc, mark) = line
            .split_whitespace()
            .collect_tuple()
            .ok_or_else(malformed)?;
        let mark = mark.parse().map_err(|_| malformed())?;
        parsed
            .entry(query.to_owned())
            .or_default()
            .entry(intent.to_owned())
            .or_default()
            .insert(doc.to_owned(), Grade::from_mark(mark)?);
    }
    Ok(parsed)
}

/// Parses a TREC run, the document id is the third column.
///
/// Consecutive lines of the same query form one ranking.
pub fn parse_run(run: &str) -> Result<Vec<Ranking>, EvalError> {
    let lines = run
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let mut columns = line.split_whitespace();
            match (columns.next(), columns.nth(1)) {
                (Some(query), Some(doc)) => Ok((query, doc)),
                _ => Err(EvalError::MalformedLine(line.to_owned())),
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    let groups = lines.into_iter().group_by(|(query, _)| *query);
    let rankings = groups
        .into_iter()
        .map(|(query, docs)| {
            (
                query.to_owned(),
                docs.map(|(_, doc)| doc.to_owned()).collect(),
            )
        })
        .collect();
    Ok(rankings)
}

/// A ranking metric for a single intent.
pub trait Metric {
    fn score(&self, rels: &DocRelevance, docs: &[String]) -> Result<f64, Error>;
}

/// Averages the metric over all intents of the query with equal weights.
///
/// A query without intents scores `0`.
pub fn intent_aware<M>(metric: &M, rels: &QueryRelevance, docs: &[String]) -> Result<f64, Error>
where
    M: Metric + ?Sized,
{
    if rels.is_empty() {
        return Ok(0.);
    }
    let sum = rels
        .values()
        .map(|rels| metric.score(rels, docs))
        .sum::<Result<f64, _>>()?;
    Ok(sum / rels.len() as f64)
}

/// Per query scores of a run, queries without judgments score `0`.
pub fn evaluate_system<M>(metric: &M, qrels: &Qrels, run: &[Ranking]) -> Result<Vec<f64>, Error>
where
    M: Metric + ?Sized,
{
    let empty = QueryRelevance::new();
    run.iter()
        .map(|(query, docs)| intent_aware(metric, qrels.get(query).unwrap_or(&empty), docs))
        .collect()
}

fn top_grades(rels: &DocRelevance, docs: &[String]) -> Vec<Grade> {
    docs.iter()
        .take(RANK_DEPTH)
        .map(|doc| grade(rels, doc))
        .collect()
}

/// Discounted cumulative gain over the top ranks.
#[derive(Clone, Copy, Debug, Default)]
pub struct DcgMetric;

impl Metric for DcgMetric {
    fn score(&self, rels: &DocRelevance, docs: &[String]) -> Result<f64, Error> {
        Ok(top_grades(rels, docs)
            .into_iter()
            .enumerate()
            .map(|(k, grade)| grade.dcg_gain() / (k as f64 + 2.).log2())
            .sum())
    }
}

/// Expected utility under the UBM browsing process with published parameters.
#[derive(Clone, Copy, Debug, Default)]
pub struct UubmMetric;

impl Metric for UubmMetric {
    fn score(&self, rels: &DocRelevance, docs: &[String]) -> Result<f64, Error> {
        let grades = top_grades(rels, docs);
        let alphas = grades.iter().map(|g| g.ubm_attraction()).collect_vec();
        let gains = grades.iter().map(|g| g.dcg_gain()).collect_vec();
        Ok(ubm_expected_utility(&alphas, &gains))
    }
}

/// Replays a fitted click model over [`FAKE_SERP`] and reports its predicted utility.
///
/// The log items of the replayed session are identified by the grades of the documents, so the
/// model is expected to read its relevance from a [`GradeAsRelevance`] source.
///
/// [`GradeAsRelevance`]: crate::relevance::GradeAsRelevance
pub struct ModelMetric<M>
where
    M: UserModel,
{
    model: M,
    params: M::Params,
}

impl<M> ModelMetric<M>
where
    M: UserModel,
{
    pub fn new(model: M, params: M::Params) -> Self {
        Self { model, params }
    }
}

impl<M> Metric for ModelMetric<M>
where
    M: UserModel,
{
    fn score(&self, rels: &DocRelevance, docs: &[String]) -> Result<f64, Error> {
        let session = top_grades(rels, docs)
            .into_iter()
            .map(|grade| LogItem::new(grade.value().to_string(), Vec::new()))
            .collect_vec();
        self.model
            .utility(&self.params, &session, &FAKE_SERP[..session.len()])
    }
}
