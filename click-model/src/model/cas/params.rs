use std::iter;

use derive_more::{Deref, Into};
use ndarray::{s, Array1, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::{
    error::Error,
    io::ParamStore,
    model::cas::{
        config::CasConfig,
        features::{
            CLASS_OFFSET,
            GEOMETRY_OFFSET,
            NUM_FEATURES_ALPHA,
            NUM_FEATURES_EPSILON,
            NUM_TAU_D,
            NUM_TAU_R,
            RANK_FEATURE,
        },
    },
    optimizer::Bound,
};

pub(crate) const ALPHA_OFFSET: usize = NUM_FEATURES_EPSILON;
pub(crate) const TAU_0_OFFSET: usize = ALPHA_OFFSET + NUM_FEATURES_ALPHA;
pub(crate) const TAU_D_OFFSET: usize = TAU_0_OFFSET + 1;
pub(crate) const TAU_R_OFFSET: usize = TAU_D_OFFSET + NUM_TAU_D;
/// Length of the CAS parameter vector.
pub const NUM_PARAMS: usize = TAU_R_OFFSET + NUM_TAU_R;

/// The flat CAS parameter vector `theta`.
///
/// It is partitioned into the examination weights `w_e`, the attraction weights `w_a`, the
/// satisfaction intercept `tau_0` and the satisfaction weights per direct and result relevance
/// grade `tau_d` and `tau_r`.
#[derive(Clone, Debug, Deref, Into, PartialEq, Serialize, Deserialize)]
pub struct CasParams(Array1<f64>);

impl CasParams {
    /// Wraps a parameter vector.
    ///
    /// # Errors
    /// Fails if the vector doesn't have [`NUM_PARAMS`] entries.
    pub fn new(theta: Array1<f64>) -> Result<Self, Error> {
        if theta.len() == NUM_PARAMS {
            Ok(Self(theta))
        } else {
            Err(Error::ParamsLength {
                expected: NUM_PARAMS,
                got: theta.len(),
            })
        }
    }

    /// The initial guess of the optimization.
    ///
    /// Examination starts high and decreasing with rank, only top relevance attracts and only
    /// top grades satisfy.
    pub fn initial_guess() -> Self {
        let mut w_e = Array1::ones(NUM_FEATURES_EPSILON);
        w_e[RANK_FEATURE] = -1.;

        let mut w_a = Array1::from_elem(NUM_FEATURES_ALPHA, -1.);
        w_a[0] = 1.;
        w_a[NUM_FEATURES_ALPHA - 1] = 1.;

        let mut tau_d = Array1::from_elem(NUM_TAU_D, -1.);
        tau_d[NUM_TAU_D - 1] = 1.;
        let mut tau_r = Array1::from_elem(NUM_TAU_R, -1.);
        tau_r[NUM_TAU_R - 1] = 1.;

        Self::concatenate(w_e.view(), w_a.view(), 1., tau_d.view(), tau_r.view())
    }

    fn concatenate(
        w_e: ArrayView1<f64>,
        w_a: ArrayView1<f64>,
        tau_0: f64,
        tau_d: ArrayView1<f64>,
        tau_r: ArrayView1<f64>,
    ) -> Self {
        let theta = w_e
            .iter()
            .chain(w_a.iter())
            .chain(iter::once(&tau_0))
            .chain(tau_d.iter())
            .chain(tau_r.iter())
            .copied()
            .collect::<Array1<f64>>();
        debug_assert_eq!(theta.len(), NUM_PARAMS);
        Self(theta)
    }

    /// The box constraints encoding the domain priors.
    ///
    /// Examination can't grow with the rank, the top result relevance grade can't decrease
    /// attraction and the top grades can't decrease satisfaction.
    pub fn bounds() -> Vec<Bound> {
        let mut bounds = vec![Bound::NONE; NUM_PARAMS];
        bounds[RANK_FEATURE] = Bound::at_most(0.);
        bounds[TAU_0_OFFSET - 1] = Bound::at_least(0.);
        bounds[TAU_R_OFFSET - 1] = Bound::at_least(0.);
        bounds[NUM_PARAMS - 1] = Bound::at_least(0.);
        bounds
    }

    /// Per coefficient weights of the L2 regularization.
    ///
    /// Intercepts are never regularized, neither are disabled features.
    pub fn regularization_weight(config: &CasConfig) -> Array1<f64> {
        let mut w_e = if config.trec_style() {
            let mut w_e = Array1::zeros(NUM_FEATURES_EPSILON);
            w_e[RANK_FEATURE] = 1.;
            w_e
        } else {
            let mut w_e = Array1::ones(NUM_FEATURES_EPSILON);
            if !config.use_class() {
                w_e.slice_mut(s![CLASS_OFFSET..GEOMETRY_OFFSET]).fill(0.);
            }
            if !config.use_geometry() {
                w_e.slice_mut(s![GEOMETRY_OFFSET..]).fill(0.);
            }
            w_e
        };
        let mut w_a = Array1::ones(NUM_FEATURES_ALPHA);

        let tau = if config.uses_sat() { 0.1 } else { 0. };
        let tau_d = Array1::from_elem(NUM_TAU_D, tau);
        let tau_r = Array1::from_elem(NUM_TAU_R, tau);

        w_e[0] = 0.;
        w_a[0] = 0.;
        Self::concatenate(w_e.view(), w_a.view(), 0., tau_d.view(), tau_r.view()).0
    }

    pub fn w_e(&self) -> ArrayView1<f64> {
        self.0.slice(s![..ALPHA_OFFSET])
    }

    pub fn w_a(&self) -> ArrayView1<f64> {
        self.0.slice(s![ALPHA_OFFSET..TAU_0_OFFSET])
    }

    pub fn tau_0(&self) -> f64 {
        self.0[TAU_0_OFFSET]
    }

    pub fn tau_d(&self) -> ArrayView1<f64> {
        self.0.slice(s![TAU_D_OFFSET..TAU_R_OFFSET])
    }

    pub fn tau_r(&self) -> ArrayView1<f64> {
        self.0.slice(s![TAU_R_OFFSET..])
    }

    /// Stores the parameters under the given name.
    pub fn save(&self, store: &mut ParamStore, name: &str) {
        store.insert(name, self.0.clone());
    }

    /// Loads the parameters stored under the given name.
    ///
    /// # Errors
    /// Fails if they are missing or don't have [`NUM_PARAMS`] entries.
    pub fn load(store: &mut ParamStore, name: &str) -> Result<Self, Error> {
        Self::new(store.take(name)?)
    }
}

/// Gradient w.r.t. the blocks of the parameter vector.
#[derive(Clone, Debug)]
pub(crate) struct GradientAccumulator {
    pub(crate) w_e: Array1<f64>,
    pub(crate) w_a: Array1<f64>,
    pub(crate) tau_0: f64,
    pub(crate) tau_d: Array1<f64>,
    pub(crate) tau_r: Array1<f64>,
}

impl Default for GradientAccumulator {
    fn default() -> Self {
        Self {
            w_e: Array1::zeros(NUM_FEATURES_EPSILON),
            w_a: Array1::zeros(NUM_FEATURES_ALPHA),
            tau_0: 0.,
            tau_d: Array1::zeros(NUM_TAU_D),
            tau_r: Array1::zeros(NUM_TAU_R),
        }
    }
}

impl GradientAccumulator {
    /// Adds `scale` times the other gradient.
    pub(crate) fn scaled_add(&mut self, scale: f64, other: &Self) {
        self.w_e.scaled_add(scale, &other.w_e);
        self.w_a.scaled_add(scale, &other.w_a);
        self.tau_0 += scale * other.tau_0;
        self.tau_d.scaled_add(scale, &other.tau_d);
        self.tau_r.scaled_add(scale, &other.tau_r);
    }

    pub(crate) fn into_array(self) -> Array1<f64> {
        CasParams::concatenate(
            self.w_e.view(),
            self.w_a.view(),
            self.tau_0,
            self.tau_d.view(),
            self.tau_r.view(),
        )
        .0
    }
}
