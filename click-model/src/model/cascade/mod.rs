//! Classic cascade-family click models trained with expectation maximization.

mod pbm;
mod ubm;
mod wrapper;

use std::iter;

use ndarray::Array2;

use crate::io::ParamStoreError;

pub use self::{pbm::Pbm, ubm::Ubm, wrapper::PyClickModel};

/// Number of EM iterations.
pub(crate) const EM_ITERATIONS: usize = 50;
/// Initial value of every probability, also used for unseen documents and ranks.
pub(crate) const INIT_PROB: f64 = 0.5;

/// A search result as seen by a cascade model.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CascadeResult {
    pub doc: usize,
    pub click: bool,
}

/// A click model over ranked lists of documents.
pub trait CascadeModel {
    /// Estimates the parameters from the sessions.
    fn train(&mut self, sessions: &[Vec<CascadeResult>]);

    /// Probability of the observed click or skip at every rank given the clicks above it.
    fn conditional_click_probs(&self, session: &[CascadeResult]) -> Vec<f64>;

    /// Probability of a click at every rank, marginalized over the clicks above it.
    fn full_click_probs(&self, session: &[CascadeResult]) -> Vec<f64>;
}

/// Running mean of posterior probabilities.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Posterior {
    sum: f64,
    count: usize,
}

impl Posterior {
    pub(crate) fn add(&mut self, p: f64) {
        self.sum += p;
        self.count += 1;
    }

    pub(crate) fn mean(&self) -> f64 {
        if self.count == 0 {
            INIT_PROB
        } else {
            self.sum / self.count as f64
        }
    }
}

/// Posterior probabilities of attraction and examination of a skipped result.
pub(crate) fn skip_posteriors(attraction: f64, examination: f64) -> (f64, f64) {
    let p_skip = 1. - attraction * examination;
    (
        (1. - examination) * attraction / p_skip,
        examination * (1. - attraction) / p_skip,
    )
}

/// Flattens keyed probabilities into rows `[key.., probability]` ordered by key.
pub(crate) fn keyed_to_array<const N: usize>(
    probs: impl Iterator<Item = ([usize; N], f64)>,
) -> Array2<f64> {
    let mut rows = probs.collect::<Vec<_>>();
    rows.sort_unstable_by_key(|(key, _)| *key);
    let data = rows
        .iter()
        .flat_map(|(key, p)| key.iter().map(|&k| k as f64).chain(iter::once(*p)))
        .collect::<Vec<_>>();
    // every row has N + 1 entries
    Array2::from_shape_vec((rows.len(), N + 1), data).unwrap_or_else(|_| unreachable!())
}

/// Inverse of [`keyed_to_array()`].
pub(crate) fn array_to_keyed<const N: usize>(
    array: Array2<f64>,
) -> Result<Vec<([usize; N], f64)>, ParamStoreError> {
    if array.ncols() != N + 1 {
        return Err(ParamStoreError::UnexpectedShape {
            got: array.ncols(),
            expected: N + 1,
        });
    }
    Ok(array
        .outer_iter()
        .map(|row| {
            let mut key = [0; N];
            key.iter_mut()
                .zip(row.iter())
                .for_each(|(k, v)| *k = *v as usize);
            (key, row[N])
        })
        .collect())
}
