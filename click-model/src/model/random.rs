use serde::{Deserialize, Serialize};

use crate::{
    data::{log_item::LogItem, session::SerpSession, snippet::Snippet},
    error::Error,
    model::{LogLikelihood, UserModel},
    utils::log_bernoulli,
};

/// Click and satisfaction probabilities independent of the SERP.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RandomParams {
    pub p_click: f64,
    pub p_sat: f64,
}

/// Baseline model with the empirical click and satisfaction rates.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomSatModel;

impl UserModel for RandomSatModel {
    type Params = RandomParams;

    fn train(&self, data: &[SerpSession]) -> Result<Self::Params, Error> {
        let num_results = data.iter().map(|d| d.session.len()).sum::<usize>();
        if data.is_empty() || num_results == 0 {
            return Err(Error::EmptyDataset);
        }

        let num_sat = data.iter().filter(|d| d.sat).count();
        let num_clicked = data
            .iter()
            .flat_map(|d| &d.session)
            .filter(|item| item.click())
            .count();
        Ok(RandomParams {
            p_click: num_clicked as f64 / num_results as f64,
            p_sat: num_sat as f64 / data.len() as f64,
        })
    }

    fn log_likelihood(
        &self,
        params: &Self::Params,
        session: &[LogItem],
        _serp: &[Snippet],
        sat: bool,
        _with_gradient: bool,
    ) -> Result<LogLikelihood, Error> {
        let clicks = session
            .iter()
            .map(|item| log_bernoulli(params.p_click, item.click()))
            .sum::<f64>();
        let sat = log_bernoulli(params.p_sat, sat);
        Ok(LogLikelihood::new(clicks + sat, clicks, sat))
    }

    fn utility(
        &self,
        params: &Self::Params,
        _session: &[LogItem],
        _serp: &[Snippet],
    ) -> Result<f64, Error> {
        Ok(params.p_sat)
    }
}

#[cfg(test)]
mod tests {
    use test_utils::assert_approx_eq;

    use super::*;
    use crate::model::tests::sessions;

    #[test]
    fn test_empirical_rates() {
        let params = RandomSatModel.train(&sessions()).unwrap();
        assert_approx_eq!(f64, params.p_click, 3. / 15.);
        assert_approx_eq!(f64, params.p_sat, 2. / 3.);
    }

    #[test]
    fn test_log_likelihood() {
        let data = sessions();
        let params = RandomSatModel.train(&data).unwrap();
        let ll = RandomSatModel
            .log_likelihood(&params, &data[1].session, &data[1].serp, false, true)
            .unwrap();

        assert_approx_eq!(f64, ll.clicks, 0.2f64.ln() + 4. * 0.8f64.ln(), epsilon = 1e-12);
        assert_approx_eq!(f64, ll.sat, (1. / 3f64).ln(), epsilon = 1e-12);
        assert_approx_eq!(f64, ll.full, ll.clicks + ll.sat);
        assert!(ll.gradient.is_none());
        assert_approx_eq!(
            f64,
            RandomSatModel.utility(&params, &data[1].session, &data[1].serp).unwrap(),
            2. / 3.
        );
    }

    #[test]
    fn test_empty_dataset() {
        assert!(matches!(
            RandomSatModel.train(&[]),
            Err(Error::EmptyDataset)
        ));
    }
}
