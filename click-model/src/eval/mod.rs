//! Offline evaluation of ranking metrics and click models.
//!
//! Metrics score the rankings of several systems against TREC style relevance judgments. The
//! metrics themselves are compared by their discriminative power and by the agreement of the
//! system orderings they induce.

mod comparison;
mod kendall;
mod metrics;
mod significance;

use displaydoc::Display;
use thiserror::Error;

pub use self::{
    comparison::{compare, pearson, shuffle_split, ModelReport},
    kendall::{kendall_tau, KendallTable},
    metrics::{
        evaluate_system,
        intent_aware,
        parse_qrels,
        parse_run,
        DcgMetric,
        DocRelevance,
        Grade,
        Metric,
        ModelMetric,
        QueryRelevance,
        Qrels,
        Ranking,
        UubmMetric,
        FAKE_SERP,
        MAX_MARK,
        RANK_DEPTH,
    },
    significance::{asl, discriminative_power, SIGNIFICANCE_LEVEL},
};

/// Potential errors of the evaluation.
#[derive(Clone, Debug, Display, Error, PartialEq)]
pub enum EvalError {
    /// Invalid relevance mark {0}, expected -2 or a grade between 0 and 3
    InvalidMark(i64),
    /// Malformed line: {0}
    MalformedLine(String),
    /// Paired samples differ in length: {0} and {1}
    LengthMismatch(usize, usize),
    /// Invalid test fraction {0}, expected a value strictly between 0 and 1
    TestFraction(f64),
}
