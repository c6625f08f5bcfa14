//! Box constrained minimization with a projected limited-memory BFGS.

use std::collections::VecDeque;

use log::{debug, warn};
use ndarray::{Array1, ArrayView1};

/// A differentiable function to minimize.
pub trait Objective {
    type Error;

    /// The value at `x`.
    fn cost(&self, x: ArrayView1<f64>) -> Result<f64, Self::Error>;

    /// The gradient at `x`.
    fn gradient(&self, x: ArrayView1<f64>) -> Result<Array1<f64>, Self::Error>;

    /// Value and gradient at `x`, override this if both share most of the work.
    fn cost_and_gradient(&self, x: ArrayView1<f64>) -> Result<(f64, Array1<f64>), Self::Error> {
        Ok((self.cost(x)?, self.gradient(x)?))
    }
}

/// Closed interval bounds of a single coefficient, `None` is unbounded.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Bound {
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

impl Bound {
    pub const NONE: Self = Self {
        lower: None,
        upper: None,
    };

    pub fn at_least(lower: f64) -> Self {
        Self {
            lower: Some(lower),
            upper: None,
        }
    }

    pub fn at_most(upper: f64) -> Self {
        Self {
            lower: None,
            upper: Some(upper),
        }
    }

    pub fn between(lower: f64, upper: f64) -> Self {
        Self {
            lower: Some(lower),
            upper: Some(upper),
        }
    }

    /// Clamps the value into the bounds.
    pub fn project(&self, x: f64) -> f64 {
        let x = self.lower.map_or(x, |lower| x.max(lower));
        self.upper.map_or(x, |upper| x.min(upper))
    }

    /// True if moving against the gradient leaves the bounds.
    fn blocks(&self, x: f64, gradient: f64) -> bool {
        (gradient > 0. && self.lower.map_or(false, |lower| x <= lower))
            || (gradient < 0. && self.upper.map_or(false, |upper| x >= upper))
    }
}

/// The outcome of a minimization.
#[derive(Clone, Debug)]
pub struct OptimizationResult {
    /// The best point found.
    pub x: Array1<f64>,
    /// The cost at `x`.
    pub fun: f64,
    pub iterations: usize,
    /// False if the iteration cap was hit or no descent was possible.
    pub converged: bool,
}

/// Curvature pair of the inverse Hessian approximation.
struct Correction {
    s: Array1<f64>,
    y: Array1<f64>,
    rho: f64,
}

/// Projected L-BFGS with box bounds.
#[derive(Clone, Debug)]
pub struct Lbfgsb {
    max_iterations: usize,
    memory: usize,
    pgtol: f64,
    ftol: f64,
}

impl Default for Lbfgsb {
    fn default() -> Self {
        Self {
            max_iterations: 15000,
            memory: 10,
            pgtol: 1e-5,
            ftol: 2.220_446_049_250_313e-9,
        }
    }
}

const ARMIJO: f64 = 1e-4;
const MAX_LINE_SEARCH_STEPS: usize = 20;

impl Lbfgsb {
    pub fn with_max_iterations(self, max_iterations: usize) -> Self {
        Self {
            max_iterations,
            ..self
        }
    }

    /// Sets the number of stored curvature pairs, at least one is kept.
    pub fn with_memory(self, memory: usize) -> Self {
        Self {
            memory: memory.max(1),
            ..self
        }
    }

    /// Sets the tolerance of the projected gradient infinity norm.
    pub fn with_pgtol(self, pgtol: f64) -> Self {
        Self { pgtol, ..self }
    }

    /// Sets the tolerance of the relative cost decrease.
    pub fn with_ftol(self, ftol: f64) -> Self {
        Self { ftol, ..self }
    }

    /// Minimizes the objective within the bounds, starting at the projection of `x0`.
    ///
    /// Coefficients without an entry in `bounds` are unbounded. Hitting the iteration cap is
    /// not an error, the best point is returned and marked as not converged.
    pub fn minimize<O>(
        &self,
        objective: &O,
        x0: Array1<f64>,
        bounds: &[Bound],
    ) -> Result<OptimizationResult, O::Error>
    where
        O: Objective,
    {
        let bound = |i: usize| bounds.get(i).copied().unwrap_or_default();
        let project = |mut x: Array1<f64>| {
            x.indexed_iter_mut()
                .for_each(|(i, x)| *x = bound(i).project(*x));
            x
        };
        let free_mask = |x: &Array1<f64>, g: &Array1<f64>| {
            Array1::from_shape_fn(x.len(), |i| {
                if bound(i).blocks(x[i], g[i]) {
                    0.
                } else {
                    1.
                }
            })
        };

        let mut x = project(x0);
        let (mut fun, mut gradient) = objective.cost_and_gradient(x.view())?;
        let mut history = VecDeque::<Correction>::with_capacity(self.memory);
        let mut iterations = 0;
        let mut converged = false;

        if !fun.is_finite() {
            warn!("The cost of the initial point is not finite");
            return Ok(OptimizationResult {
                x,
                fun,
                iterations,
                converged,
            });
        }

        while iterations < self.max_iterations {
            let projected_gradient = x
                .iter()
                .zip(gradient.iter())
                .enumerate()
                .map(|(i, (&x, &g))| (bound(i).project(x - g) - x).abs())
                .fold(0., f64::max);
            if projected_gradient <= self.pgtol {
                converged = true;
                break;
            }

            let mask = free_mask(&x, &gradient);
            let mut direction = -two_loop(&history, &gradient * &mask) * &mask;
            let mut slope = gradient.dot(&direction);
            if !(slope < 0.) {
                history.clear();
                direction = -&gradient * &mask;
                slope = gradient.dot(&direction);
                if !(slope < 0.) {
                    break;
                }
            }

            let mut step = if history.is_empty() {
                (1. / direction.dot(&direction).sqrt()).min(1.)
            } else {
                1.
            };
            let mut accepted = None;
            for _ in 0..MAX_LINE_SEARCH_STEPS {
                let candidate = project(&x + &(step * &direction));
                let (candidate_fun, candidate_gradient) =
                    objective.cost_and_gradient(candidate.view())?;
                let decrease = gradient.dot(&(&candidate - &x));
                if candidate_fun.is_finite()
                    && candidate_fun < fun
                    && candidate_fun <= fun + ARMIJO * decrease
                {
                    accepted = Some((candidate, candidate_fun, candidate_gradient));
                    break;
                }
                step *= 0.5;
            }
            let (next, next_fun, next_gradient) = match accepted {
                Some(accepted) => accepted,
                None if !history.is_empty() => {
                    debug!("Line search failed, restarting from steepest descent");
                    history.clear();
                    continue;
                }
                None => break,
            };
            iterations += 1;

            let s = &next - &x;
            let y = &next_gradient - &gradient;
            let sy = s.dot(&y);
            if sy > f64::EPSILON * y.dot(&y) {
                if history.len() == self.memory {
                    history.pop_front();
                }
                history.push_back(Correction { s, y, rho: 1. / sy });
            }

            let relative_decrease = (fun - next_fun) / fun.abs().max(next_fun.abs()).max(1.);
            x = next;
            fun = next_fun;
            gradient = next_gradient;
            if relative_decrease <= self.ftol {
                converged = true;
                break;
            }
        }

        if !converged {
            warn!(
                "Optimization stopped without convergence after {} iterations",
                iterations,
            );
        }
        debug!("Optimization finished with cost {} after {} iterations", fun, iterations);
        Ok(OptimizationResult {
            x,
            fun,
            iterations,
            converged,
        })
    }
}

/// Applies the inverse Hessian approximation to `q`.
fn two_loop(history: &VecDeque<Correction>, mut q: Array1<f64>) -> Array1<f64> {
    let mut alphas = Vec::with_capacity(history.len());
    for correction in history.iter().rev() {
        let alpha = correction.rho * correction.s.dot(&q);
        q.scaled_add(-alpha, &correction.y);
        alphas.push(alpha);
    }
    if let Some(last) = history.back() {
        q *= last.s.dot(&last.y) / last.y.dot(&last.y);
    }
    for (correction, alpha) in history.iter().zip(alphas.into_iter().rev()) {
        let beta = correction.rho * correction.y.dot(&q);
        q.scaled_add(alpha - beta, &correction.s);
    }
    q
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use ndarray::arr1;
    use test_utils::assert_approx_eq;

    use super::*;

    /// `0.5 * sum(scale * (x - center)^2)`
    struct Quadratic {
        center: Array1<f64>,
        scale: Array1<f64>,
    }

    impl Objective for Quadratic {
        type Error = Infallible;

        fn cost(&self, x: ArrayView1<f64>) -> Result<f64, Infallible> {
            let diff = &x - &self.center;
            Ok(0.5 * (&self.scale * &diff).dot(&diff))
        }

        fn gradient(&self, x: ArrayView1<f64>) -> Result<Array1<f64>, Infallible> {
            Ok(&self.scale * &(&x - &self.center))
        }
    }

    /// `x - ln(x)`, undefined for non-positive `x`.
    struct LogBarrier;

    impl Objective for LogBarrier {
        type Error = Infallible;

        fn cost(&self, x: ArrayView1<f64>) -> Result<f64, Infallible> {
            Ok(x[0] - x[0].ln())
        }

        fn gradient(&self, x: ArrayView1<f64>) -> Result<Array1<f64>, Infallible> {
            Ok(arr1(&[1. - 1. / x[0]]))
        }
    }

    struct Failing;

    impl Objective for Failing {
        type Error = &'static str;

        fn cost(&self, _x: ArrayView1<f64>) -> Result<f64, Self::Error> {
            Err("failed")
        }

        fn gradient(&self, _x: ArrayView1<f64>) -> Result<Array1<f64>, Self::Error> {
            Err("failed")
        }
    }

    #[test]
    fn test_bound_projection() {
        assert_eq!(Bound::NONE.project(-3.), -3.);
        assert_eq!(Bound::at_least(0.).project(-3.), 0.);
        assert_eq!(Bound::at_most(0.).project(3.), 0.);
        assert_eq!(Bound::between(-1., 1.).project(0.5), 0.5);
        assert_eq!(Bound::default(), Bound::NONE);
    }

    #[test]
    fn test_unbounded_quadratic() {
        let objective = Quadratic {
            center: arr1(&[1., -2.]),
            scale: arr1(&[1., 100.]),
        };
        let result = Lbfgsb::default()
            .minimize(&objective, arr1(&[5., 5.]), &[])
            .unwrap();
        assert!(result.converged);
        assert_approx_eq!(f64, result.x, [1., -2.], epsilon = 1e-4);
    }

    #[test]
    fn test_bounded_quadratic() {
        let objective = Quadratic {
            center: arr1(&[1., -2., 3.]),
            scale: arr1(&[1., 1., 1.]),
        };
        let bounds = [Bound::NONE, Bound::at_least(0.), Bound::at_most(1.)];
        let result = Lbfgsb::default()
            .minimize(&objective, arr1(&[0., 0., 0.]), &bounds)
            .unwrap();
        assert!(result.converged);
        assert_approx_eq!(f64, result.x, [1., 0., 1.], epsilon = 1e-4);
        assert_approx_eq!(f64, result.fun, 4., epsilon = 1e-6);
    }

    #[test]
    fn test_infeasible_start_is_projected() {
        let objective = Quadratic {
            center: arr1(&[0.]),
            scale: arr1(&[1.]),
        };
        let result = Lbfgsb::default()
            .with_max_iterations(0)
            .minimize(&objective, arr1(&[-5.]), &[Bound::between(1., 2.)])
            .unwrap();
        assert_eq!(result.x, arr1(&[1.]));
        assert_eq!(result.iterations, 0);
    }

    #[test]
    fn test_non_finite_costs_are_rejected() {
        let result = Lbfgsb::default()
            .minimize(&LogBarrier, arr1(&[3.]), &[])
            .unwrap();
        assert!(result.x[0] > 0.);
        assert_approx_eq!(f64, result.x, [1.], epsilon = 1e-4);
    }

    #[test]
    fn test_iteration_cap() {
        let objective = Quadratic {
            center: arr1(&[0., 0.]),
            scale: arr1(&[1., 100.]),
        };
        let result = Lbfgsb::default()
            .with_max_iterations(1)
            .minimize(&objective, arr1(&[1., 1.]), &[])
            .unwrap();
        assert!(!result.converged);
        assert_eq!(result.iterations, 1);
        assert!(result.fun < objective.cost(arr1(&[1., 1.]).view()).unwrap());
    }

    #[test]
    fn test_errors_are_propagated() {
        assert_eq!(
            Lbfgsb::default()
                .minimize(&Failing, arr1(&[0.]), &[])
                .unwrap_err(),
            "failed",
        );
    }
}
