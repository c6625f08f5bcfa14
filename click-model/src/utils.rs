/// The logistic function, evaluated without overflow for large negative inputs.
pub(crate) fn sigmoid(x: f64) -> f64 {
    if x > 0. {
        1. / (1. + (-x).exp())
    } else {
        (x - x.exp().ln_1p()).exp()
    }
}

/// `ln(sigmoid(x))`, stable for inputs of large magnitude.
pub(crate) fn log_sigmoid(x: f64) -> f64 {
    if x > 0. {
        -(-x).exp().ln_1p()
    } else {
        x - x.exp().ln_1p()
    }
}

/// Log-probability of a Bernoulli outcome with success probability `p`.
pub(crate) fn log_bernoulli(p: f64, outcome: bool) -> f64 {
    if outcome {
        p.ln()
    } else {
        (-p).ln_1p()
    }
}

/// Mean of the values, `0` for an empty input.
pub(crate) fn avg(values: impl IntoIterator<Item = f64>) -> f64 {
    let (sum, n) = values
        .into_iter()
        .fold((0., 0usize), |(sum, n), x| (sum + x, n + 1));
    if n == 0 {
        0.
    } else {
        sum / n as f64
    }
}

/// Ratio where a zero numerator always wins: `0 / y = 0` and `x / 0 = inf` otherwise.
pub(crate) fn frac(x: f64, y: f64) -> f64 {
    if x == 0. {
        0.
    } else if y == 0. {
        f64::INFINITY
    } else {
        x / y
    }
}
