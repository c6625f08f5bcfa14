use std::collections::HashMap;

use log::debug;

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

/// User browsing model: the examination of a rank depends on the rank of the previous click.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Ubm {
    attraction: HashMap<usize, f64>,
    /// Keyed by `(rank, previous click rank + 1)`, `0` meaning no previous click.
    examination: HashMap<(usize, usize), f64>,
}

impl Ubm {
    pub fn attraction(&self, doc: usize) -> f64 {
        self.attraction.get(&doc).copied().unwrap_or(INIT_PROB)
    }

    pub fn examination(&self, rank: usize, prev_click: Option<usize>) -> f64 {
        self.examination
            .get(&(rank, Self::prev_index(prev_click)))
            .copied()
            .unwrap_or(INIT_PROB)
    }

    fn prev_index(prev_click: Option<usize>) -> usize {
        prev_click.map_or(0, |prev| prev + 1)
    }

    /// Stores the fitted probabilities in the scope `name`.
    pub fn save(&self, store: &mut ParamStore, name: &str) {
        let mut scope = store.with_scope(name);
        let attraction = self.attraction.iter().map(|(&doc, &p)| ([doc], p));
        scope.insert("attraction", keyed_to_array(attraction));
        let examination = self
            .examination
            .iter()
            .map(|(&(rank, prev), &p)| ([rank, prev], p));
        scope.insert("examination", keyed_to_array(examination));
    }

    /// Loads the probabilities stored in the scope `name`.
    pub fn load(store: &mut ParamStore, name: &str) -> Result<Self, Error> {
        let mut scope = store.with_scope(name);
        let attraction = array_to_keyed::<1>(scope.take("attraction")?)?
            .into_iter()
            .map(|([doc], p)| (doc, p))
            .collect();
        let examination = array_to_keyed::<2>(scope.take("examination")?)?
            .into_iter()
            .map(|([rank, prev], p)| ((rank, prev), p))
            .collect();
        Ok(Self {
            attraction,
            examination,
        })
    }
}

impl CascadeModel for Ubm {
    fn train(&mut self, sessions: &[Vec<CascadeResult>]) {
        self.attraction.clear();
        self.examination.clear();

        for _ in 0..EM_ITERATIONS {
            let mut attraction = HashMap::<usize, Posterior>::new();
            let mut examination = HashMap::<(usize, usize), Posterior>::new();
            for session in sessions {
                let mut prev_click = None;
                for (rank, result) in session.iter().enumerate() {
                    let (a, e) = if result.click {
                        (1., 1.)
                    } else {
                        skip_posteriors(
                            self.attraction(result.doc),
                            self.examination(rank, prev_click),
                        )
                    };
                    attraction.entry(result.doc).or_default().add(a);
                    examination
                        .entry((rank, Self::prev_index(prev_click)))
                        .or_default()
                        .add(e);
                    if result.click {
                        prev_click = Some(rank);
                    }
                }
            }
            self.attraction = attraction
                .into_iter()
                .map(|(doc, posterior)| (doc, posterior.mean()))
                .collect();
            self.examination = examination
                .into_iter()
                .map(|(key, posterior)| (key, posterior.mean()))
                .collect();
        }
        debug!("UBM examination: {:?}", self.examination);
    }

    fn conditional_click_probs(&self, session: &[CascadeResult]) -> Vec<f64> {
        let mut prev_click = None;
        session
            .iter()
            .enumerate()
            .map(|(rank, result)| {
                let p = self.attraction(result.doc) * self.examination(rank, prev_click);
                if result.click {
                    prev_click = Some(rank);
                    p
                } else {
                    1. - p
                }
            })
            .collect()
    }

    fn full_click_probs(&self, session: &[CascadeResult]) -> Vec<f64> {
        // distribution of the rank of the last click so far, index 0 is "no click yet"
        let mut last_click = vec![1.];
        session
            .iter()
            .enumerate()
            .map(|(rank, result)| {
                let attraction = self.attraction(result.doc);
                let mut p_click = 0.;
                for (prev_index, p_last) in last_click.iter_mut().enumerate() {
                    let prev_click = prev_index.checked_sub(1);
                    let p = *p_last * attraction * self.examination(rank, prev_click);
                    p_click += p;
                    *p_last -= p;
                }
                last_click.push(p_click);
                p_click
            })
            .collect()
    }
}
