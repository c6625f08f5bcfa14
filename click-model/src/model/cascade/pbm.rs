use std::collections::HashMap;

use log::debug;
use ndarray::Array1;

use crate::{
    error::Error,
    io::ParamStore,
    model::cascade::{
        array_to_keyed,
        keyed_to_array,
        skip_posteriors,
        CascadeModel,
        CascadeResult,
        Posterior,
        EM_ITERATIONS,
        INIT_PROB,
    },
};

/// Position-based model: a click happens iff the rank is examined and the document attracts.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Pbm {
    attraction: HashMap<usize, f64>,
    examination: Vec<f64>,
}

impl Pbm {
    pub fn attraction(&self, doc: usize) -> f64 {
        self.attraction.get(&doc).copied().unwrap_or(INIT_PROB)
    }

    pub fn examination(&self, rank: usize) -> f64 {
        self.examination.get(rank).copied().unwrap_or(INIT_PROB)
    }

    /// Stores the fitted probabilities in the scope `name`.
    pub fn save(&self, store: &mut ParamStore, name: &str) {
        let mut scope = store.with_scope(name);
        let attraction = self.attraction.iter().map(|(&doc, &p)| ([doc], p));
        scope.insert("attraction", keyed_to_array(attraction));
        scope.insert("examination", Array1::from(self.examination.clone()));
    }

    /// Loads the probabilities stored in the scope `name`.
    pub fn load(store: &mut ParamStore, name: &str) -> Result<Self, Error> {
        let mut scope = store.with_scope(name);
        let attraction = array_to_keyed::<1>(scope.take("attraction")?)?
            .into_iter()
            .map(|([doc], p)| (doc, p))
            .collect();
        let examination: Array1<f64> = scope.take("examination")?;
        Ok(Self {
            attraction,
            examination: examination.to_vec(),
        })
    }
}

impl CascadeModel for Pbm {
    fn train(&mut self, sessions: &[Vec<CascadeResult>]) {
        let depth = sessions.iter().map(Vec::len).max().unwrap_or(0);
        self.attraction.clear();
        self.examination = vec![INIT_PROB; depth];

        for _ in 0..EM_ITERATIONS {
            let mut attraction = HashMap::<usize, Posterior>::new();
            let mut examination = vec![Posterior::default(); depth];
            for session in sessions {
                for (rank, result) in session.iter().enumerate() {
                    let (a, e) = if result.click {
                        (1., 1.)
                    } else {
                        skip_posteriors(self.attraction(result.doc), self.examination(rank))
                    };
                    attraction.entry(result.doc).or_default().add(a);
                    examination[rank].add(e);
                }
            }
            self.attraction = attraction
                .into_iter()
                .map(|(doc, posterior)| (doc, posterior.mean()))
                .collect();
            self.examination = examination.iter().map(Posterior::mean).collect();
        }
        debug!("PBM examination: {:?}", self.examination);
    }

    fn conditional_click_probs(&self, session: &[CascadeResult]) -> Vec<f64> {
        // clicks are independent given the parameters
        session
            .iter()
            .zip(self.full_click_probs(session))
            .map(|(result, p)| if result.click { p } else { 1. - p })
            .collect()
    }

    fn full_click_probs(&self, session: &[CascadeResult]) -> Vec<f64> {
        session
            .iter()
            .enumerate()
            .map(|(rank, result)| self.attraction(result.doc) * self.examination(rank))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use test_utils::assert_approx_eq;

    use super::*;
    use crate::{io::ParamStoreError, model::cascade::tests::sessions};

    #[test]
    fn test_em_separates_documents() {
        let mut pbm = Pbm::default();
        pbm.train(&sessions());

        assert!(pbm.attraction(1) > 0.9);
        assert!(pbm.attraction(0) < 0.1);
        assert!(pbm.attraction(2) > pbm.attraction(0));
        assert_approx_eq!(f64, pbm.attraction(42), INIT_PROB);
        assert!(pbm.examination(0) > 0. && pbm.examination(0) <= 1.);
    }

    #[test]
    fn test_save_and_load() {
        let mut pbm = Pbm::default();
        pbm.train(&sessions());
        let mut store = ParamStore::default();
        pbm.save(&mut store, "pbm");

        let mut keys = store.keys().collect::<Vec<_>>();
        keys.sort_unstable();
        assert_eq!(keys, ["pbm/attraction", "pbm/examination"]);

        let mut store = ParamStore::from_bytes(&store.to_bytes().unwrap()).unwrap();
        assert_eq!(Pbm::load(&mut store, "pbm").unwrap(), pbm);
        assert!(matches!(
            Pbm::load(&mut store, "pbm"),
            Err(Error::Params(ParamStoreError::MissingParameters { .. }))
        ));
    }

    #[test]
    fn test_load_rejects_malformed_attraction() {
        let mut store = ParamStore::default();
        let mut scope = store.with_scope("pbm");
        scope.insert("attraction", ndarray::Array2::<f64>::zeros((2, 3)));
        scope.insert("examination", Array1::<f64>::zeros(2));
        assert!(matches!(
            Pbm::load(&mut store, "pbm"),
            Err(Error::Params(ParamStoreError::UnexpectedShape {
                got: 3,
                expected: 2
            }))
        ));
    }

    #[test]
    fn test_click_probs() {
        let mut pbm = Pbm::default();
        pbm.train(&sessions());
        let session = [
            CascadeResult { doc: 1, click: true },
            CascadeResult { doc: 0, click: false },
        ];
        let full = pbm.full_click_probs(&session);
        let conditional = pbm.conditional_click_probs(&session);

        assert_approx_eq!(f64, conditional[0], full[0]);
        assert_approx_eq!(f64, conditional[1], 1. - full[1]);
        assert_approx_eq!(f64, full[1], pbm.attraction(0) * pbm.examination(1));
    }
}
