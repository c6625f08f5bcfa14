//! Inter-rater agreement of crowd workers.
//!
//! Every worker is represented by a map from the judged units to the assigned value, units a
//! worker did not judge are simply absent.

use std::{
    collections::{HashMap, HashSet},
    hash::Hash,
};

use itertools::Itertools;

use crate::utils::frac;

/// Mean pairwise Cohen's kappa.
///
/// Units judged by only one worker of a pair are counted in a dummy "missing" category which
/// enters the chance agreement but not the observed agreement. Pairs of workers without any
/// common unit are skipped. Returns `None` if no pair of workers overlaps.
pub fn cohen_kappa<K, V>(workers: &[HashMap<K, V>]) -> Option<f64>
where
    K: Eq + Hash,
    V: Eq + Hash,
{
    let (sum, count) = workers
        .iter()
        .tuple_combinations()
        .filter_map(|(w1, w2)| pairwise_kappa(w1, w2))
        .fold((0., 0usize), |(sum, count), kappa| (sum + kappa, count + 1));

    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

fn pairwise_kappa<K, V>(w1: &HashMap<K, V>, w2: &HashMap<K, V>) -> Option<f64>
where
    K: Eq + Hash,
    V: Eq + Hash,
{
    // confusion matrix, `None` is the dummy category
    let mut confusion = HashMap::<(Option<&V>, Option<&V>), usize>::new();
    for (unit, a1) in w1 {
        *confusion.entry((Some(a1), w2.get(unit))).or_default() += 1;
    }
    for (unit, a2) in w2 {
        if !w1.contains_key(unit) {
            *confusion.entry((None, Some(a2))).or_default() += 1;
        }
    }

    let overlapping = confusion
        .iter()
        .filter(|((a1, a2), _)| a1.is_some() && a2.is_some())
        .map(|(_, count)| count)
        .sum::<usize>();
    if overlapping == 0 {
        return None;
    }

    let categories = confusion
        .keys()
        .flat_map(|&(a1, a2)| a1.into_iter().chain(a2))
        .collect::<HashSet<_>>();
    let total = confusion.values().sum::<usize>() as f64;

    let agreeing = categories
        .iter()
        .filter_map(|&category| confusion.get(&(Some(category), Some(category))))
        .sum::<usize>();
    let p_a = agreeing as f64 / overlapping as f64;

    let p_e = categories
        .iter()
        .map(|&category| {
            let (first, second) = confusion.iter().fold(
                (0, 0),
                |(first, second), (&(a1, a2), &count)| {
                    (
                        first + if a1 == Some(category) { count } else { 0 },
                        second + if a2 == Some(category) { count } else { 0 },
                    )
                },
            );
            (first * second) as f64
        })
        .sum::<f64>()
        / (total * total);

    #[allow(clippy::float_cmp)]
    let kappa = if p_a != p_e {
        (p_a - p_e) / (1. - p_e)
    } else if p_a == 1. {
        1.
    } else {
        0.
    };
    Some(kappa)
}

/// Distance between two values in Krippendorff's alpha.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DistanceMetric {
    /// Unordered categories.
    Nominal,
    /// Squared difference.
    Interval,
    /// Squared relative difference.
    Ratio,
}

impl DistanceMetric {
    fn distance(self, a: f64, b: f64) -> f64 {
        match self {
            DistanceMetric::Nominal => {
                #[allow(clippy::float_cmp)]
                let differ = a != b;
                differ as u8 as f64
            }
            DistanceMetric::Interval => (a - b).powi(2),
            DistanceMetric::Ratio => frac(a - b, a + b).powi(2),
        }
    }
}

/// Krippendorff's alpha of the workers' values.
///
/// Only units with at least two values are pairable. Returns `None` if there are no pairable
/// values at all.
pub fn krippendorff_alpha<K>(workers: &[HashMap<K, f64>], metric: DistanceMetric) -> Option<f64>
where
    K: Eq + Hash,
{
    let mut units = HashMap::<&K, Vec<f64>>::new();
    for worker in workers {
        for (unit, &value) in worker {
            units.entry(unit).or_default().push(value);
        }
    }
    let units = units
        .into_iter()
        .filter_map(|(_, values)| (values.len() > 1).then(|| values))
        .collect::<Vec<_>>();

    let n = units.iter().map(Vec::len).sum::<usize>();
    if n == 0 {
        return None;
    }

    let sum_distances = |g1: &[f64], g2: &[f64]| {
        g1.iter()
            .cartesian_product(g2)
            .map(|(&a, &b)| metric.distance(a, b))
            .sum::<f64>()
    };

    let observed = units
        .iter()
        .map(|values| sum_distances(values, values) / (values.len() - 1) as f64)
        .sum::<f64>()
        / n as f64;
    if observed == 0. {
        return Some(1.);
    }

    let expected = units
        .iter()
        .cartesian_product(&units)
        .map(|(g1, g2)| sum_distances(g1, g2))
        .sum::<f64>()
        / (n * (n - 1)) as f64;

    Some(1. - observed / expected)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use test_utils::assert_approx_eq;

    use super::*;

    fn worker<V: Copy>(values: &[(u32, V)]) -> HashMap<u32, V> {
        values.iter().copied().collect()
    }

    /// Parses a row of values with `*` for missing ones.
    fn parse_worker(row: &str) -> HashMap<u32, f64> {
        row.split_whitespace()
            .enumerate()
            .filter(|(_, value)| *value != "*")
            .map(|(unit, value)| (unit as u32, value.parse().unwrap()))
            .collect()
    }

    fn wikipedia_example() -> Vec<HashMap<u32, f64>> {
        vec![
            parse_worker("*  *  *  *  *  3  4  1  2  1  1  3  3  *  3"),
            parse_worker("1  *  2  1  3  3  4  3  *  *  *  *  *  *  *"),
            parse_worker("*  *  2  1  3  4  4  *  2  1  1  3  3  *  4"),
        ]
    }

    #[test]
    fn test_kappa_identical_raters() {
        let w = worker(&[(0, 1), (1, 2), (2, 1), (3, 0)]);
        assert_approx_eq!(f64, cohen_kappa(&[w.clone(), w]).unwrap(), 1.);
    }

    #[test]
    fn test_kappa_single_category_agreement() {
        let w = worker(&[(0, 1), (1, 1)]);
        assert_approx_eq!(f64, cohen_kappa(&[w.clone(), w]).unwrap(), 1.);
    }

    #[test]
    fn test_kappa_is_symmetric() {
        let w1 = worker(&[(0, 1), (1, 2), (2, 1), (3, 0), (4, 2)]);
        let w2 = worker(&[(0, 1), (1, 1), (2, 1), (3, 0), (5, 2)]);
        let w3 = worker(&[(1, 2), (2, 0), (3, 0), (4, 2), (5, 2)]);

        let forward = cohen_kappa(&[w1.clone(), w2.clone(), w3.clone()]).unwrap();
        let backward = cohen_kappa(&[w3, w2, w1]).unwrap();
        assert_approx_eq!(f64, forward, backward, epsilon = 1e-12);
        assert!(forward <= 1.);
    }

    #[test]
    fn test_kappa_with_missing_values() {
        let w1 = worker(&[(0, 1), (1, 0), (2, 1)]);
        let w2 = worker(&[(0, 1), (1, 1), (3, 0)]);
        // p_a = 1/2, p_e = (1 * 1 + 2 * 2) / 16
        assert_approx_eq!(
            f64,
            cohen_kappa(&[w1, w2]).unwrap(),
            (0.5 - 5. / 16.) / (1. - 5. / 16.),
            ulps = 4,
        );
    }

    #[test]
    fn test_kappa_without_overlap() {
        let w1 = worker(&[(0, 1), (1, 0)]);
        let w2 = worker(&[(2, 1), (3, 1)]);
        let w3 = worker(&[(0, 1), (1, 0)]);
        assert_eq!(cohen_kappa(&[w1.clone(), w2.clone()]), None);
        // only the (w1, w3) pair is comparable
        assert_approx_eq!(f64, cohen_kappa(&[w1, w2, w3]).unwrap(), 1.);
    }

    #[rstest]
    #[case(DistanceMetric::Nominal, 0.691358024691358)]
    #[case(DistanceMetric::Interval, 0.8108448928121059)]
    #[case(DistanceMetric::Ratio, 0.8089436707842474)]
    fn test_alpha_wikipedia_example(#[case] metric: DistanceMetric, #[case] expected: f64) {
        let alpha = krippendorff_alpha(&wikipedia_example(), metric).unwrap();
        assert_approx_eq!(f64, alpha, expected, epsilon = 1e-12);

        let mut reversed = wikipedia_example();
        reversed.reverse();
        let alpha_reversed = krippendorff_alpha(&reversed, metric).unwrap();
        assert_approx_eq!(f64, alpha, alpha_reversed, epsilon = 1e-12);
    }

    #[test]
    fn test_alpha_identical_raters() {
        let w = worker(&[(0, 1.), (1, 2.), (2, 3.)]);
        assert_eq!(
            krippendorff_alpha(&[w.clone(), w], DistanceMetric::Interval),
            Some(1.)
        );
    }

    #[test]
    fn test_alpha_without_pairable_values() {
        let w1 = worker(&[(0, 1.)]);
        let w2 = worker(&[(1, 1.)]);
        assert_eq!(krippendorff_alpha(&[w1, w2], DistanceMetric::Nominal), None);
        assert_eq!(
            krippendorff_alpha::<u32>(&[], DistanceMetric::Nominal),
            None
        );
    }
}
