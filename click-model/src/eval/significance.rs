use std::sync::mpsc::{self, Sender};

use log::debug;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    eval::EvalError,
    utils::{avg, frac},
};

/// ASL below which two systems are considered different.
pub const SIGNIFICANCE_LEVEL: f64 = 0.05;

/// The paired t statistic, `frac` avoids a division by zero for constant samples.
fn t_statistic(sample: &[f64]) -> f64 {
    let n = sample.len() as f64;
    let mean = avg(sample.iter().copied());
    let sigma = sample
        .iter()
        .map(|a| (a - mean).powi(2) / (n - 1.))
        .sum::<f64>()
        .sqrt();
    frac(mean, sigma) * n.sqrt()
}

/// Achieved significance level of the difference between the paired scores `x` and `y`.
///
/// The paired t statistic of the differences is compared against `nsamples` bootstrap
/// resamples of the mean shifted differences. Less than two pairs or no samples yield `1`.
///
/// See Sakai, T. (2006). Evaluating evaluation metrics based on the bootstrap. In SIGIR.
pub fn asl(x: &[f64], y: &[f64], nsamples: usize, rng: &mut impl Rng) -> Result<f64, EvalError> {
    if x.len() != y.len() {
        return Err(EvalError::LengthMismatch(x.len(), y.len()));
    }
    let n = x.len();
    if n < 2 || nsamples == 0 {
        return Ok(1.);
    }

    let z = x.iter().zip(y).map(|(x, y)| x - y).collect::<Vec<_>>();
    let t_z = t_statistic(&z).abs();
    let z_mean = avg(z.iter().copied());
    let w = z.iter().map(|z| z - z_mean).collect::<Vec<_>>();

    let mut sample = vec![0.; n];
    let count = (0..nsamples)
        .filter(|_| {
            sample
                .iter_mut()
                .for_each(|s| *s = w[rng.gen_range(0..n)]);
            t_statistic(&sample).abs() >= t_z
        })
        .count();
    Ok(count as f64 / nsamples as f64)
}

/// Share of system pairs a metric separates significantly.
fn metric_power(
    systems: &[Vec<f64>],
    nsamples: usize,
    rng: &mut impl Rng,
) -> Result<f64, EvalError> {
    let mut differ = 0;
    let mut count = 0;
    for (i, s1) in systems.iter().enumerate() {
        for s2 in &systems[i + 1..] {
            if s1 == s2 {
                continue;
            }
            if asl(s1, s2, nsamples, rng)? < SIGNIFICANCE_LEVEL {
                differ += 1;
            }
            count += 1;
        }
    }
    Ok(frac(differ as f64, count as f64))
}

/// Discriminative power of each metric.
///
/// `metrics[m][s][q]` is the score of system `s` on query `q` under metric `m`, the queries must
/// be in the same order for all systems. Every metric gets its own random generator seeded with
/// `seed + m`, so the results don't depend on the scheduling of the metrics.
pub fn discriminative_power(
    metrics: &[Vec<Vec<f64>>],
    nsamples: usize,
    seed: u64,
) -> Result<Vec<f64>, EvalError> {
    let (sender, receiver) = mpsc::channel();
    let task = |index: usize, systems: &[Vec<f64>], sender: Sender<_>| {
        let mut rng = StdRng::seed_from_u64(seed.wrapping_add(index as u64));
        let power = metric_power(systems, nsamples, &mut rng);
        // the receiver is alive until all senders are dropped
        let _ = sender.send((index, power));
    };

    #[cfg(not(feature = "multithreaded"))]
    for (index, systems) in metrics.iter().enumerate() {
        task(index, systems, sender.clone());
    }
    #[cfg(feature = "multithreaded")]
    {
        let task = &task;
        rayon::scope(|scope| {
            for (index, systems) in metrics.iter().enumerate() {
                let sender = sender.clone();
                scope.spawn(move |_| task(index, systems, sender));
            }
        });
    }
    drop(sender);

    let mut powers = vec![0.; metrics.len()];
    for (index, power) in receiver {
        powers[index] = power?;
        debug!("discriminative power of metric {}: {}", index, powers[index]);
    }
    Ok(powers)
}

#[cfg(test)]
mod tests {
    use test_utils::assert_approx_eq;

    use super::*;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[test]
    fn test_asl_of_identical_systems() {
        let x = [0.1, 0.5, 0.3, 0.9, 0.4];
        assert_eq!(asl(&x, &x, 1000, &mut rng()).unwrap(), 1.);
    }

    #[test]
    fn test_asl_edge_cases() {
        assert_eq!(asl(&[1.], &[0.], 1000, &mut rng()).unwrap(), 1.);
        assert_eq!(asl(&[1., 2.], &[0., 0.], 0, &mut rng()).unwrap(), 1.);
        assert_eq!(
            asl(&[1., 2.], &[0.], 10, &mut rng()),
            Err(EvalError::LengthMismatch(2, 1))
        );
    }

    #[test]
    fn test_asl_of_consistent_difference() {
        let x = (0..30).map(|i| 0.5 + 0.01 * (i % 7) as f64).collect::<Vec<_>>();
        let y = x
            .iter()
            .enumerate()
            .map(|(i, x)| x - 0.2 - 0.01 * (i % 3) as f64)
            .collect::<Vec<_>>();
        assert!(asl(&x, &y, 1000, &mut rng()).unwrap() < SIGNIFICANCE_LEVEL);
    }

    #[test]
    fn test_asl_of_noise() {
        let x = [0.1, 0.9, 0.2, 0.8, 0.3, 0.7];
        let y = [0.9, 0.1, 0.8, 0.2, 0.7, 0.3];
        assert!(asl(&x, &y, 1000, &mut rng()).unwrap() > SIGNIFICANCE_LEVEL);
    }

    #[test]
    fn test_discriminative_power() {
        let base = (0..20).map(|i| (i % 5) as f64 / 10.).collect::<Vec<_>>();
        let better = base.iter().map(|x| x + 0.5).collect::<Vec<_>>();
        let noisy = base
            .iter()
            .enumerate()
            .map(|(i, x)| if i % 2 == 0 { x + 0.3 } else { x - 0.3 })
            .collect::<Vec<_>>();

        let separating = vec![base.clone(), better];
        let identical = vec![base.clone(), base.clone()];
        let confused = vec![base, noisy];
        let powers =
            discriminative_power(&[separating, identical, confused, Vec::new()], 500, 7).unwrap();

        assert_approx_eq!(f64, powers, [1., 0., 0., 0.]);
    }

    #[test]
    fn test_discriminative_power_is_reproducible() {
        let systems = vec![
            vec![0.1, 0.4, 0.35, 0.8, 0.2],
            vec![0.2, 0.3, 0.5, 0.7, 0.4],
            vec![0.9, 0.1, 0.3, 0.5, 0.6],
        ];
        let metrics = [systems.clone(), systems];
        let first = discriminative_power(&metrics, 200, 3).unwrap();
        let second = discriminative_power(&metrics, 200, 3).unwrap();
        assert_eq!(first, second);
    }
}
