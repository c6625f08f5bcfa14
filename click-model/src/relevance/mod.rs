//! Crowd relevance judgments and their summaries.

mod agreement;
mod aggregator;
mod container;

use displaydoc::Display;
use thiserror::Error;

pub use self::{
    aggregator::{GradeAsRelevance, JudgmentRow, Judgments, RelevanceAggregator, RelevanceSource},
    agreement::{cohen_kappa, krippendorff_alpha, DistanceMetric},
    container::{
        parse_relevance_rating,
        rel_avg,
        rel_dist,
        rel_most_common,
        Aspect,
        Rating,
        RelContainer,
    },
};

/// Errors of the relevance aggregation.
#[derive(Debug, Display, Error)]
pub enum RelevanceError {
    /// The log id {log_id} maps to two different queries: [{first}] and [{second}]
    ConflictingQuery {
        log_id: String,
        first: String,
        second: String,
    },
}
