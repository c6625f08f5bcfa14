//! The CAS click model: Cascade, Attractiveness and Satisfaction.
//!
//! A snippet is examined with probability `eps = sigmoid(w_e . f_e)` and, once examined,
//! clicked with probability `alpha = sigmoid(w_a . f_a)`. The user is satisfied with
//! probability `sigmoid(tau_0 + U)`, where the utility `U` collects the direct relevance of
//! examined snippets and the result relevance of clicked ones.

mod config;
mod features;
mod params;

use log::{debug, info};
use ndarray::{Array1, ArrayView1};

use crate::{
    data::{log_item::LogItem, session::SerpSession, snippet::Snippet},
    error::Error,
    model::{check_serp, LogLikelihood, UserModel},
    optimizer::{Lbfgsb, Objective},
    relevance::RelevanceSource,
    utils::{log_sigmoid, sigmoid},
};

use self::{
    features::{session_features, ItemFeatures},
    params::GradientAccumulator,
};

pub use self::{
    config::{CasConfig, ConfigError},
    features::{
        NUM_CLASSES,
        NUM_FEATURES_ALPHA,
        NUM_FEATURES_EPSILON,
        NUM_GEOMETRY_FEATURES,
        NUM_TAU_D,
        NUM_TAU_R,
    },
    params::{CasParams, NUM_PARAMS},
};

/// The CAS model over a source of relevance ratings.
#[derive(Clone, Debug)]
pub struct CasModel<R> {
    config: CasConfig,
    relevance: R,
}

impl<R> CasModel<R>
where
    R: RelevanceSource,
{
    pub fn new(config: CasConfig, relevance: R) -> Self {
        Self { config, relevance }
    }

    pub fn config(&self) -> &CasConfig {
        &self.config
    }

    fn features(
        &self,
        session: &[LogItem],
        serp: &[Snippet],
    ) -> Result<Vec<ItemFeatures>, Error> {
        check_serp(session, serp)?;
        session_features(&self.config, &self.relevance, session, serp)
    }
}

/// Log-likelihood of a session and its gradient.
fn session_log_likelihood(
    config: &CasConfig,
    theta: &CasParams,
    features: &[ItemFeatures],
    session: &[LogItem],
    sat: bool,
) -> (LogLikelihood, GradientAccumulator) {
    let mut full = 0.;
    let mut clicks = 0.;
    let mut gradient = GradientAccumulator::default();
    // the utility and its gradient
    let mut utility = 0.;
    let mut d_utility = GradientAccumulator::default();

    for (f, item) in features.iter().zip(session) {
        let z_e = theta.w_e().dot(&f.exam);
        let z_a = theta.w_a().dot(&f.attr);
        let eps = sigmoid(z_e);
        let alpha = sigmoid(z_a);
        let tau_d = theta.tau_d().dot(&f.d);
        let click = item.click();

        if item.fixation {
            full += log_sigmoid(z_e);
            gradient.w_e.scaled_add(1. - eps, &f.exam);
            utility += tau_d;
            d_utility.tau_d += &f.d;

            if click {
                let ll = log_sigmoid(z_a);
                full += ll;
                clicks += log_sigmoid(z_e) + ll;
                gradient.w_a.scaled_add(1. - alpha, &f.attr);
            } else {
                full += log_sigmoid(-z_a);
                clicks += (-eps * alpha).ln_1p();
                gradient.w_a.scaled_add(-alpha, &f.attr);
            }
        } else {
            utility += eps * tau_d;
            d_utility.tau_d.scaled_add(eps, &f.d);
            d_utility.w_e.scaled_add(tau_d * eps * (1. - eps), &f.exam);

            if click {
                let ll = log_sigmoid(z_e) + log_sigmoid(z_a);
                full += ll;
                clicks += ll;
                gradient.w_e.scaled_add(1. - eps, &f.exam);
                gradient.w_a.scaled_add(1. - alpha, &f.attr);
            } else {
                let p_click = eps * alpha;
                let ll = (-p_click).ln_1p();
                full += ll;
                clicks += ll;
                // d/dz ln(1 - eps * alpha) = (1 - sigmoid(z)) * k
                let k = p_click / (p_click - 1.);
                gradient.w_e.scaled_add((1. - eps) * k, &f.exam);
                gradient.w_a.scaled_add((1. - alpha) * k, &f.attr);
            }
        }

        if click {
            utility += theta.tau_r().dot(&f.r);
            d_utility.tau_r += &f.r;
        }
    }

    let weight = config.sat_term_weight();
    let logit = theta.tau_0() + utility;
    let sat_ll = log_sigmoid(if sat { logit } else { -logit });
    full += weight * sat_ll;

    let p_sat = sigmoid(logit);
    d_utility.tau_0 = 1.;
    gradient.scaled_add(weight * if sat { 1. - p_sat } else { -p_sat }, &d_utility);

    (LogLikelihood::new(full, clicks, sat_ll), gradient)
}

/// Expected utility of a SERP under the model.
fn expected_utility(config: &CasConfig, theta: &CasParams, features: &[ItemFeatures]) -> f64 {
    features
        .iter()
        .map(|f| {
            let eps = sigmoid(theta.w_e().dot(&f.exam));
            let alpha = sigmoid(theta.w_a().dot(&f.attr));
            if config.uses_sat() {
                eps * (theta.tau_d().dot(&f.d) + alpha * theta.tau_r().dot(&f.r))
            } else {
                eps * (f.d_grade as f64 + alpha * f.r_grade as f64)
            }
        })
        .sum()
}

/// Logs the fitted parameters block by block.
pub fn describe(theta: &CasParams) {
    debug!("examination: {}", theta.w_e());
    debug!("attraction: {}", theta.w_a());
    debug!("satisfaction intercept: {}", theta.tau_0());
    debug!("satisfaction D: {}", theta.tau_d());
    debug!("satisfaction R: {}", theta.tau_r());
}

/// The regularized negative mean log-likelihood of the training sessions.
struct CasObjective<'a> {
    config: &'a CasConfig,
    sessions: Vec<(&'a SerpSession, Vec<ItemFeatures>)>,
    reg_weight: Array1<f64>,
}

impl<'a> CasObjective<'a> {
    fn new<R>(model: &'a CasModel<R>, data: &'a [SerpSession]) -> Result<Self, Error>
    where
        R: RelevanceSource,
    {
        let sessions = data
            .iter()
            .map(|d| Ok((d, model.features(&d.session, &d.serp)?)))
            .collect::<Result<Vec<_>, Error>>()?;
        Ok(Self {
            config: &model.config,
            sessions,
            reg_weight: CasParams::regularization_weight(&model.config),
        })
    }
}

impl<'a> Objective for CasObjective<'a> {
    type Error = Error;

    fn cost(&self, x: ArrayView1<f64>) -> Result<f64, Error> {
        self.cost_and_gradient(x).map(|(cost, _)| cost)
    }

    fn gradient(&self, x: ArrayView1<f64>) -> Result<Array1<f64>, Error> {
        self.cost_and_gradient(x).map(|(_, gradient)| gradient)
    }

    fn cost_and_gradient(&self, x: ArrayView1<f64>) -> Result<(f64, Array1<f64>), Error> {
        let theta = CasParams::new(x.to_owned())?;
        let mut ll = 0.;
        let mut gradient = GradientAccumulator::default();
        for (session, features) in &self.sessions {
            let (session_ll, session_gradient) = session_log_likelihood(
                self.config,
                &theta,
                features,
                &session.session,
                session.sat,
            );
            ll += session_ll.full;
            gradient.scaled_add(1., &session_gradient);
        }

        let n = self.sessions.len() as f64;
        let reg = self.config.reg_coeff() / n;
        let weighted = &self.reg_weight * &x;
        let cost = -ll / n + 0.5 * reg * weighted.dot(&x);
        let mut gradient = gradient.into_array() / -n;
        gradient.scaled_add(reg, &weighted);
        Ok((cost, gradient))
    }
}

impl<R> UserModel for CasModel<R>
where
    R: RelevanceSource,
{
    type Params = CasParams;

    fn train(&self, data: &[SerpSession]) -> Result<Self::Params, Error> {
        if data.is_empty() {
            return Err(Error::EmptyDataset);
        }
        let objective = CasObjective::new(self, data)?;
        let result = Lbfgsb::default()
            .with_max_iterations(self.config.max_iterations())
            .minimize(
                &objective,
                CasParams::initial_guess().into(),
                &CasParams::bounds(),
            )?;
        info!(
            "Trained CAS on {} sessions: cost {:.6} after {} iterations",
            data.len(),
            result.fun,
            result.iterations,
        );

        let theta = CasParams::new(result.x)?;
        describe(&theta);
        Ok(theta)
    }

    fn log_likelihood(
        &self,
        params: &Self::Params,
        session: &[LogItem],
        serp: &[Snippet],
        sat: bool,
        with_gradient: bool,
    ) -> Result<LogLikelihood, Error> {
        let features = self.features(session, serp)?;
        let (mut ll, gradient) =
            session_log_likelihood(&self.config, params, &features, session, sat);
        if with_gradient {
            ll.gradient = Some(gradient.into_array());
        }
        Ok(ll)
    }

    fn utility(
        &self,
        params: &Self::Params,
        session: &[LogItem],
        serp: &[Snippet],
    ) -> Result<f64, Error> {
        let features = self.features(session, serp)?;
        Ok(expected_utility(&self.config, params, &features))
    }
}
