//! User browsing models over a SERP.
//!
//! Every model can be trained on sessions, evaluates the log-likelihood of an observed session
//! and predicts a SERP level utility.

pub mod cas;
pub mod cascade;
mod dcg;
mod random;
mod uubm;

use ndarray::Array1;

use crate::{
    data::{log_item::LogItem, session::SerpSession, snippet::Snippet},
    error::Error,
    relevance::{rel_most_common, RelevanceSource},
};

pub(crate) use self::uubm::ubm_expected_utility;
pub use self::{
    dcg::DcgModel,
    random::{RandomParams, RandomSatModel},
    uubm::{UubmModel, UBM_GAMMAS, UBM_RELS},
};

/// Log-likelihood of an observed session.
///
/// Components a model doesn't define are `NaN`.
#[derive(Clone, Debug, PartialEq)]
pub struct LogLikelihood {
    /// Joint log-likelihood of the clicks and the satisfaction label.
    pub full: f64,
    /// Log-likelihood of the click pattern alone.
    pub clicks: f64,
    /// Log-likelihood of the satisfaction label alone.
    pub sat: f64,
    /// Gradient of `full` w.r.t. the parameters, only if it was requested.
    pub gradient: Option<Array1<f64>>,
}

impl LogLikelihood {
    /// A log-likelihood without gradient.
    pub fn new(full: f64, clicks: f64, sat: f64) -> Self {
        Self {
            full,
            clicks,
            sat,
            gradient: None,
        }
    }
}

/// A model of user behaviour on a SERP.
pub trait UserModel {
    /// The fitted parameters.
    type Params;

    /// Fits the model parameters to the sessions.
    fn train(&self, data: &[SerpSession]) -> Result<Self::Params, Error>;

    /// Log-likelihood of the observed `session` on the `serp` with satisfaction label `sat`.
    ///
    /// The gradient is only computed if `with_gradient` is set. Models which are not
    /// differentiable never return a gradient.
    fn log_likelihood(
        &self,
        params: &Self::Params,
        session: &[LogItem],
        serp: &[Snippet],
        sat: bool,
        with_gradient: bool,
    ) -> Result<LogLikelihood, Error>;

    /// Predicted utility of the SERP.
    fn utility(
        &self,
        params: &Self::Params,
        session: &[LogItem],
        serp: &[Snippet],
    ) -> Result<f64, Error>;
}

fn check_serp(session: &[LogItem], serp: &[Snippet]) -> Result<(), Error> {
    if session.len() == serp.len() {
        Ok(())
    } else {
        Err(Error::SerpMismatch {
            log_items: session.len(),
            snippets: serp.len(),
        })
    }
}

/// The most common result relevance grade of every item of the session.
fn most_common_grades(relevance: &impl RelevanceSource, session: &[LogItem]) -> Vec<usize> {
    session
        .iter()
        .map(|item| rel_most_common(&relevance.ratings(&item.id).rs))
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use test_utils::serp::{serps, Doc};

    use crate::{
        data::{
            action::{Action, ActionKind},
            log_item::LogItem,
            session::SerpSession,
            snippet::Snippet,
        },
        relevance::{JudgmentRow, Judgments, RelevanceAggregator},
    };

    fn log_item(doc: &Doc) -> LogItem {
        let actions = if doc.click {
            vec![Action::new(ActionKind::Click, 1000)]
        } else {
            Vec::new()
        };
        let mut item = LogItem::new(doc.log_id, actions);
        item.fixation = doc.fixation;
        item
    }

    fn snippet(doc: &Doc) -> Snippet {
        Snippet::new(doc.classes.iter().copied(), doc.layout.parse().unwrap())
    }

    /// The synthetic sessions of the test fixtures.
    pub(crate) fn sessions() -> Vec<SerpSession> {
        serps()
            .iter()
            .map(|serp| SerpSession {
                query: serp.query.into(),
                session: serp.docs.iter().map(log_item).collect(),
                serp: serp.docs.iter().map(snippet).collect(),
                sat: serp.sat,
            })
            .collect()
    }

    /// The relevance judgments of the test fixtures.
    pub(crate) fn judgments() -> Judgments {
        let mut aggregator = RelevanceAggregator::new(Vec::new(), true);
        for serp in serps().iter() {
            for doc in serp.docs.iter() {
                let row = |grade: &str| JudgmentRow {
                    worker_id: "w".into(),
                    trust: 0.9,
                    log_id: doc.log_id.into(),
                    query: serp.query.into(),
                    grade: grade.into(),
                };
                aggregator.add_d(&row(doc.d)).unwrap();
                aggregator.add_r(&row(doc.r)).unwrap();
            }
        }
        aggregator.finish()
    }
}
