use log::info;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::Serialize;

use crate::{
    data::session::SerpSession,
    error::Error,
    eval::EvalError,
    model::UserModel,
    utils::avg,
};

/// Splits `n` shuffled indices into train and test indices.
///
/// The test part gets `ceil(test_fraction * n)` indices.
pub fn shuffle_split(
    n: usize,
    test_fraction: f64,
    seed: u64,
) -> Result<(Vec<usize>, Vec<usize>), EvalError> {
    if !(test_fraction > 0. && test_fraction < 1.) {
        return Err(EvalError::TestFraction(test_fraction));
    }

    let mut indices = (0..n).collect::<Vec<_>>();
    indices.shuffle(&mut StdRng::seed_from_u64(seed));
    let num_test = ((test_fraction * n as f64).ceil() as usize).min(n);
    let train = indices.split_off(num_test);
    Ok((train, indices))
}

/// Pearson correlation coefficient, `NaN` if either sample is constant.
pub fn pearson(x: &[f64], y: &[f64]) -> Result<f64, EvalError> {
    if x.len() != y.len() {
        return Err(EvalError::LengthMismatch(x.len(), y.len()));
    }
    let x_mean = avg(x.iter().copied());
    let y_mean = avg(y.iter().copied());
    let (cov, x_var, y_var) = x.iter().zip(y).fold(
        (0., 0., 0.),
        |(cov, x_var, y_var), (x, y)| {
            let dx = x - x_mean;
            let dy = y - y_mean;
            (cov + dx * dy, x_var + dx * dx, y_var + dy * dy)
        },
    );
    let denominator = (x_var * y_var).sqrt();
    if denominator == 0. {
        Ok(f64::NAN)
    } else {
        Ok((cov / denominator).max(-1.).min(1.))
    }
}

/// Held-out performance of a click model.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ModelReport {
    /// Mean joint log-likelihood.
    pub full: f64,
    /// Mean click log-likelihood.
    pub clicks: f64,
    /// Mean satisfaction log-likelihood.
    pub sat: f64,
    /// Correlation of the predicted utility with the satisfaction labels.
    pub sat_pearson: f64,
}

/// Trains the model on `train` and evaluates it on `test`.
pub fn compare<M>(
    model: &M,
    train: &[SerpSession],
    test: &[SerpSession],
) -> Result<ModelReport, Error>
where
    M: UserModel,
{
    let params = model.train(train)?;

    let mut lls = Vec::with_capacity(test.len());
    let mut utilities = Vec::with_capacity(test.len());
    for d in test {
        lls.push(model.log_likelihood(&params, &d.session, &d.serp, d.sat, false)?);
        utilities.push(model.utility(&params, &d.session, &d.serp)?);
    }
    let sats = test
        .iter()
        .map(|d| if d.sat { 1. } else { 0. })
        .collect::<Vec<_>>();

    let report = ModelReport {
        full: avg(lls.iter().map(|ll| ll.full)),
        clicks: avg(lls.iter().map(|ll| ll.clicks)),
        sat: avg(lls.iter().map(|ll| ll.sat)),
        sat_pearson: pearson(&sats, &utilities)?,
    };
    info!(
        "Evaluated on {} sessions after training on {}: {:?}",
        test.len(),
        train.len(),
        report,
    );
    Ok(report)
}
