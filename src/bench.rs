//! The fixed benchmark suite: ten named targets evaluated over the same
//! `[-3,3]` step-`0.2` grid used by the parameter fitter, each turned into
//! an efficiency score `1/(1+mse)`.

use crate::dsl::Node;
use crate::fit::{build_grid, mse};

/// Benchmark order is fixed by §4.7 step 10.
pub const BENCH_NAMES: [&str; 10] = [
    "sin+x", "cos", "gauss", "cubic", "abs", "piecewise", "tanh", "sigmoid", "sin2x", "log1p",
];

fn target(name: &str, x: f64) -> f64 {
    match name {
        "sin+x" => x.sin() + 0.5 * x,
        "cos" => x.cos(),
        "gauss" => (-x * x / 2.0).exp(),
        "cubic" => 0.1 * x.powi(3),
        "abs" => x.abs(),
        "piecewise" => {
            if x < 0.0 {
                -x
            } else {
                x * x
            }
        }
        "tanh" => x.tanh(),
        "sigmoid" => 1.0 / (1.0 + (-x).exp()),
        "sin2x" => (2.0 * x).sin(),
        "log1p" => (1.0 + x.abs()).ln(),
        _ => 0.0,
    }
}

/// The first benchmark's grid, used by the parameter fitter (§4.6).
pub fn first_bench_grid() -> Vec<(f64, f64)> {
    build_grid(|x| target(BENCH_NAMES[0], x))
}

/// `eff = 1/(1+mse)` for `expr` against each of the ten fixed benchmarks, in
/// order.
pub fn bench_vector(expr: &Node, params: &[f64]) -> [f64; 10] {
    let mut out = [0.0f64; 10];
    for (i, name) in BENCH_NAMES.iter().enumerate() {
        let grid = build_grid(|x| target(name, x));
        let m = mse(expr, params, &grid);
        out[i] = 1.0 / (1.0 + m);
    }
    out
}

/// S6: the arithmetic mean of entries `>= min_eff`, ignoring non-finite
/// values. Zero if nothing qualifies.
pub fn bench_validation_score(bench_eff: &[f64; 10], min_eff: f64) -> f64 {
    let accepted: Vec<f64> = bench_eff
        .iter()
        .copied()
        .filter(|v| v.is_finite() && *v >= min_eff)
        .collect();
    if accepted.is_empty() {
        return 0.0;
    }
    accepted.iter().sum::<f64>() / accepted.len() as f64
}
