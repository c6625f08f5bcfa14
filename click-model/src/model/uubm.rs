use lazy_static::lazy_static;

use crate::{
    data::{log_item::LogItem, session::SerpSession, snippet::Snippet},
    error::Error,
    model::{check_serp, most_common_grades, LogLikelihood, UserModel},
    relevance::RelevanceSource,
    utils::log_bernoulli,
};

/// Published UBM continuation probabilities, one row per diagonal.
///
/// See Chuklin, A., Serdyukov, P., & de Rijke, M. (2013). Click model-based information retrieval
/// metrics. In SIGIR (pp. 493--502).
const RAW_GAMMAS: [[f64; 10]; 10] = [
    [0.0000, 0.0000, 0.0000, 0.0000, 0.0000, 0.0000, 0.0000, 0.0000, 0.0000, 1.0000],
    [0.0000, 0.0000, 0.0000, 0.0000, 0.0000, 0.0000, 0.0000, 0.0000, 0.6980, 0.0029],
    [0.0000, 0.0000, 0.0000, 0.0000, 0.0000, 0.0000, 0.0000, 0.6483, 0.0023, 0.0106],
    [0.0000, 0.0000, 0.0000, 0.0000, 0.0000, 0.0000, 0.5461, 0.0032, 0.0082, 0.0263],
    [0.0000, 0.0000, 0.0000, 0.0000, 0.0000, 0.5747, 0.0042, 0.0101, 0.0215, 0.0305],
    [0.0000, 0.0000, 0.0000, 0.0000, 0.4816, 0.0067, 0.0179, 0.0280, 0.0303, 0.0599],
    [0.0000, 0.0000, 0.0000, 0.5670, 0.0099, 0.0248, 0.0476, 0.0434, 0.0620, 0.0917],
    [0.0000, 0.0000, 0.5410, 0.0187, 0.0426, 0.0716, 0.0713, 0.0826, 0.0813, 0.1518],
    [0.0000, 0.8951, 0.0331, 0.0794, 0.1242, 0.1210, 0.1449, 0.1268, 0.1559, 0.1901],
    [0.9921, 0.1199, 0.2395, 0.3230, 0.3004, 0.3107, 0.3018, 0.3212, 0.3221, 0.4149],
];

/// Number of ranks covered by the published UBM parameters.
pub(crate) const UBM_DEPTH: usize = 10;

lazy_static! {
    /// Continuation probabilities indexed by `[rank][previous click rank + 1]`.
    pub static ref UBM_GAMMAS: [[f64; UBM_DEPTH]; UBM_DEPTH] = {
        let mut gammas = [[0.; UBM_DEPTH]; UBM_DEPTH];
        for (rank, row) in gammas.iter_mut().enumerate() {
            for (prev, gamma) in row.iter_mut().enumerate().take(rank + 1) {
                *gamma = RAW_GAMMAS[UBM_DEPTH - 1 - rank + prev][rank];
            }
        }
        gammas
    };
}

/// Attractiveness per result relevance grade: irrelevant, relevant, useful, vital.
pub const UBM_RELS: [f64; 4] = [0.491912, 0.570803, 0.695883, 0.931482];

/// Expected utility of a ranking under the UBM browsing process with the published parameters.
///
/// Only the first [`UBM_DEPTH`] results are considered, `alphas` and `gains` are per rank.
pub(crate) fn ubm_expected_utility(alphas: &[f64], gains: &[f64]) -> f64 {
    let depth = alphas.len().min(gains.len()).min(UBM_DEPTH);
    // probability of a click at each rank, index 0 is the virtual click before the first result
    let mut p_click = Vec::with_capacity(depth + 1);
    p_click.push(1.);
    let mut utility = 0.;
    for rank in 0..depth {
        let p = alphas[rank]
            * (0..=rank)
                .map(|j| {
                    let no_click_in_between = (j..rank)
                        .map(|k| 1. - alphas[k] * UBM_GAMMAS[k][j])
                        .product::<f64>();
                    p_click[j] * UBM_GAMMAS[rank][j] * no_click_in_between
                })
                .sum::<f64>();
        p_click.push(p);
        utility += p * gains[rank];
    }
    utility
}

/// The UBM metric of Chuklin et al. as a click model with fixed parameters.
#[derive(Clone, Debug)]
pub struct UubmModel<R> {
    relevance: R,
}

impl<R: RelevanceSource> UubmModel<R> {
    pub fn new(relevance: R) -> Self {
        Self { relevance }
    }
}

impl<R: RelevanceSource> UserModel for UubmModel<R> {
    type Params = ();

    fn train(&self, _data: &[SerpSession]) -> Result<Self::Params, Error> {
        Ok(())
    }

    /// Only the click component over the first ten results is defined.
    fn log_likelihood(
        &self,
        _params: &Self::Params,
        session: &[LogItem],
        serp: &[Snippet],
        _sat: bool,
        _with_gradient: bool,
    ) -> Result<LogLikelihood, Error> {
        check_serp(session, serp)?;

        let grades = most_common_grades(&self.relevance, session);
        let mut prev_click = None;
        let mut clicks = 0.;
        for (rank, (item, grade)) in session.iter().zip(grades).take(UBM_DEPTH).enumerate() {
            let gamma = UBM_GAMMAS[rank][prev_click.map_or(0, |prev| prev + 1)];
            let p_click = UBM_RELS[grade.min(UBM_RELS.len() - 1)] * gamma;
            if item.click() {
                prev_click = Some(rank);
            }
            clicks += log_bernoulli(p_click, item.click());
        }

        Ok(LogLikelihood::new(f64::NAN, clicks, f64::NAN))
    }

    fn utility(
        &self,
        _params: &Self::Params,
        session: &[LogItem],
        _serp: &[Snippet],
    ) -> Result<f64, Error> {
        let grades = most_common_grades(&self.relevance, session);
        let alphas = grades
            .iter()
            .map(|&grade| UBM_RELS[grade.min(UBM_RELS.len() - 1)])
            .collect::<Vec<_>>();
        let gains = grades.iter().map(|&grade| grade as f64).collect::<Vec<_>>();
        Ok(ubm_expected_utility(&alphas, &gains))
    }
}
