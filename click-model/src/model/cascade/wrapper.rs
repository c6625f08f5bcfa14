use std::marker::PhantomData;

use crate::{
    data::{log_item::LogItem, session::SerpSession, snippet::Snippet},
    error::Error,
    model::{
        cascade::{CascadeModel, CascadeResult},
        check_serp,
        most_common_grades,
        LogLikelihood,
        UserModel,
    },
    relevance::RelevanceSource,
    utils::{log_bernoulli, sigmoid},
};

/// Adapts a cascade click model to sessions.
///
/// Documents are identified by their most common result relevance grade, the satisfaction
/// probability is derived from the click probabilities weighted by those grades.
#[derive(Clone, Debug)]
pub struct PyClickModel<M, R> {
    relevance: R,
    model: PhantomData<M>,
}

impl<M, R> PyClickModel<M, R>
where
    M: CascadeModel + Default,
    R: RelevanceSource,
{
    pub fn new(relevance: R) -> Self {
        Self {
            relevance,
            model: PhantomData,
        }
    }

    fn cascade_session(&self, session: &[LogItem]) -> Vec<CascadeResult> {
        session
            .iter()
            .zip(most_common_grades(&self.relevance, session))
            .map(|(item, doc)| CascadeResult {
                doc,
                click: item.click(),
            })
            .collect()
    }
}

fn dot(grades: &[usize], probs: &[f64]) -> f64 {
    grades
        .iter()
        .zip(probs)
        .map(|(&grade, p)| grade as f64 * p)
        .sum()
}

impl<M, R> UserModel for PyClickModel<M, R>
where
    M: CascadeModel + Default,
    R: RelevanceSource,
{
    type Params = M;

    fn train(&self, data: &[SerpSession]) -> Result<Self::Params, Error> {
        if data.is_empty() {
            return Err(Error::EmptyDataset);
        }
        let sessions = data
            .iter()
            .map(|d| self.cascade_session(&d.session))
            .collect::<Vec<_>>();
        let mut model = M::default();
        model.train(&sessions);
        Ok(model)
    }

    fn log_likelihood(
        &self,
        params: &Self::Params,
        session: &[LogItem],
        serp: &[Snippet],
        sat: bool,
        _with_gradient: bool,
    ) -> Result<LogLikelihood, Error> {
        check_serp(session, serp)?;

        let click_probs = params.conditional_click_probs(&self.cascade_session(session));
        let clicks = click_probs.iter().map(|p| p.ln()).sum::<f64>();

        let grades = most_common_grades(&self.relevance, session);
        let sat = log_bernoulli(sigmoid(dot(&grades, &click_probs)), sat);
        Ok(LogLikelihood::new(clicks + sat, clicks, sat))
    }

    fn utility(
        &self,
        params: &Self::Params,
        session: &[LogItem],
        _serp: &[Snippet],
    ) -> Result<f64, Error> {
        let click_probs = params.full_click_probs(&self.cascade_session(session));
        let grades = most_common_grades(&self.relevance, session);
        Ok(dot(&grades, &click_probs))
    }
}
