use crate::{
    data::{log_item::LogItem, session::SerpSession, snippet::Snippet},
    error::Error,
    model::{check_serp, most_common_grades, LogLikelihood, UserModel},
    relevance::RelevanceSource,
    utils::{log_bernoulli, sigmoid},
};

/// Interprets the DCG rank discount as click probability and the DCG score as utility.
#[derive(Clone, Debug)]
pub struct DcgModel<R> {
    relevance: R,
}

impl<R: RelevanceSource> DcgModel<R> {
    pub fn new(relevance: R) -> Self {
        Self { relevance }
    }

    fn discount(rank: usize) -> f64 {
        1. / (2. + rank as f64).log2()
    }

    fn dcg(&self, session: &[LogItem]) -> f64 {
        most_common_grades(&self.relevance, session)
            .into_iter()
            .enumerate()
            .map(|(rank, grade)| (2f64.powi(grade as i32) - 1.) * Self::discount(rank))
            .sum()
    }
}

impl<R: RelevanceSource> UserModel for DcgModel<R> {
    type Params = ();

    fn train(&self, _data: &[SerpSession]) -> Result<Self::Params, Error> {
        Ok(())
    }

    fn log_likelihood(
        &self,
        _params: &Self::Params,
        session: &[LogItem],
        serp: &[Snippet],
        sat: bool,
        _with_gradient: bool,
    ) -> Result<LogLikelihood, Error> {
        check_serp(session, serp)?;

        let mut clicks = 0.;
        for (rank, item) in session.iter().enumerate() {
            let discount = Self::discount(rank);
            #[allow(clippy::float_cmp)]
            let certain_click = discount == 1.;
            if certain_click && !item.click() {
                clicks = f64::NEG_INFINITY;
                break;
            }
            clicks += log_bernoulli(discount, item.click());
        }

        let sat = log_bernoulli(sigmoid(self.dcg(session)), sat);
        Ok(LogLikelihood::new(clicks + sat, clicks, sat))
    }

    fn utility(
        &self,
        _params: &Self::Params,
        session: &[LogItem],
        _serp: &[Snippet],
    ) -> Result<f64, Error> {
        Ok(self.dcg(session))
    }
}
