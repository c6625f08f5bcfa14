use std::fmt;

use itertools::Itertools;

use crate::eval::EvalError;

/// Kendall rank correlation with the tau-b correction for ties.
///
/// `NaN` if either input is constant or there are less than two values.
pub fn kendall_tau(x: &[f64], y: &[f64]) -> Result<f64, EvalError> {
    if x.len() != y.len() {
        return Err(EvalError::LengthMismatch(x.len(), y.len()));
    }

    let (mut concordant, mut discordant, mut ties_x, mut ties_y) = (0i64, 0i64, 0i64, 0i64);
    for ((x1, y1), (x2, y2)) in x.iter().zip(y).tuple_combinations() {
        let dx = x1 - x2;
        let dy = y1 - y2;
        if dx == 0. {
            ties_x += 1;
        }
        if dy == 0. {
            ties_y += 1;
        }
        if dx * dy > 0. {
            concordant += 1;
        } else if dx * dy < 0. {
            discordant += 1;
        }
    }

    let n = x.len() as i64;
    let pairs = n * (n - 1) / 2;
    let denominator = (((pairs - ties_x) * (pairs - ties_y)) as f64).sqrt();
    if denominator == 0. {
        Ok(f64::NAN)
    } else {
        Ok((concordant - discordant) as f64 / denominator)
    }
}

/// Pairwise Kendall tau between the system orderings of several metrics.
///
/// Renders as a LaTeX table, correlations of at least 0.9 are set in bold.
#[derive(Clone, Debug)]
pub struct KendallTable {
    names: Vec<String>,
    /// `taus[i][j - i - 1]` correlates metric `i` with metric `j > i`.
    taus: Vec<Vec<f64>>,
}

const STRONG_CORRELATION: f64 = 0.9;

impl KendallTable {
    /// Correlates the mean system scores of every pair of metrics.
    pub fn new(metrics: &[(String, Vec<f64>)]) -> Result<Self, EvalError> {
        let taus = metrics
            .iter()
            .enumerate()
            .map(|(i, (_, x))| {
                metrics[i + 1..]
                    .iter()
                    .map(|(_, y)| kendall_tau(x, y))
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;
        let names = metrics.iter().map(|(name, _)| name.clone()).collect();
        Ok(Self { names, taus })
    }

    pub fn tau(&self, i: usize, j: usize) -> Option<f64> {
        let (i, j) = if i < j { (i, j) } else { (j, i) };
        self.taus.get(i)?.get(j.checked_sub(i + 1)?).copied()
    }
}

/// Renders the upper triangle as a LaTeX `tabular`.
///
/// A `NaN` correlation, e.g. with a constant metric, is not below the threshold and is therefore
/// set in bold as `\textbf{NaN}`.
impl fmt::Display for KendallTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\\begin{{tabular}}{{{}}}", "c".repeat(self.names.len()))?;
        writeln!(f, "\\toprule")?;
        let header = std::iter::once("").chain(self.names.iter().skip(1).map(String::as_str));
        writeln!(f, "{}\t\\\\", header.format("\t&\t"))?;
        writeln!(f, "\\midrule")?;
        for (i, name) in self.names.iter().enumerate().take(self.names.len().saturating_sub(1)) {
            let cells = std::iter::once(name.clone())
                .chain((0..i).map(|_| "---".to_owned()))
                .chain(self.taus[i].iter().map(|&tau| {
                    if tau < STRONG_CORRELATION {
                        format!("{:.3}", tau)
                    } else {
                        format!("\\textbf{{{:.3}}}", tau)
                    }
                }));
            writeln!(f, "{}\t\\\\", cells.format("\t&\t"))?;
        }
        writeln!(f, "\\bottomrule")?;
        write!(f, "\\end{{tabular}}")
    }
}

#[cfg(test)]
mod tests {
    use test_utils::assert_approx_eq;

    use super::*;

    #[test]
    fn test_kendall_tau_extremes() {
        let x = [1., 2., 3., 4.];
        assert_approx_eq!(f64, kendall_tau(&x, &[10., 20., 30., 40.]).unwrap(), 1.);
        assert_approx_eq!(f64, kendall_tau(&x, &[4., 3., 2., 1.]).unwrap(), -1.);
        assert!(kendall_tau(&x, &[1., 1., 1., 1.]).unwrap().is_nan());
        assert!(kendall_tau(&[1.], &[1.]).unwrap().is_nan());
        assert!(kendall_tau(&x, &[1.]).is_err());
    }

    #[test]
    fn test_kendall_tau_b_with_ties() {
        // scipy.stats.kendalltau([1, 2, 2, 3], [1, 3, 2, 4])
        let tau = kendall_tau(&[1., 2., 2., 3.], &[1., 3., 2., 4.]).unwrap();
        assert_approx_eq!(f64, tau, 5. / 30f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_latex_table() {
        let metrics = [
            ("DCG".to_owned(), vec![0.1, 0.2, 0.3]),
            ("uUBM".to_owned(), vec![0.2, 0.3, 0.4]),
            ("CAST".to_owned(), vec![0.3, 0.1, 0.2]),
        ];
        let table = KendallTable::new(&metrics).unwrap();
        assert_approx_eq!(f64, table.tau(0, 1).unwrap(), 1.);
        assert_approx_eq!(f64, table.tau(2, 0).unwrap(), -1. / 3., epsilon = 1e-12);
        assert!(table.tau(1, 1).is_none());

        let expected = "\\begin{tabular}{ccc}\n\
                        \\toprule\n\
                        \t&\tuUBM\t&\tCAST\t\\\\\n\
                        \\midrule\n\
                        DCG\t&\t\\textbf{1.000}\t&\t-0.333\t\\\\\n\
                        uUBM\t&\t---\t&\t-0.333\t\\\\\n\
                        \\bottomrule\n\
                        \\end{tabular}";
        assert_eq!(table.to_string(), expected);
    }

    #[test]
    fn test_constant_metric_renders_bold_nan() {
        let metrics = [
            ("A".to_owned(), vec![0.1, 0.2, 0.3]),
            ("B".to_owned(), vec![0.5, 0.5, 0.5]),
        ];
        let table = KendallTable::new(&metrics).unwrap();
        assert!(table.tau(0, 1).unwrap().is_nan());
        assert!(table
            .to_string()
            .contains("A\t&\t\\textbf{NaN}\t\\\\\n"));
    }
}
