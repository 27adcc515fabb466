//! Quasiconvex Programming Tour
//!
//! Solves a few problems that break the DCP rules but follow DQCP rules:
//!
//! minimize    ceil(x)               subject to  12 <= x <= 17
//! maximize    x * y                 subject to  x <= 12, y <= 6, x, y >= 0
//! minimize    -sqrt(x) / y          subject to  exp(x) <= y
//!
//! Run with `RUST_LOG=cvxqcp=debug` to watch the compile cache and the bisection.

use cvxqcp::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_target(false).init();

    println!("=== Quasiconvex Programming Tour ===\n");

    // Rounding: ceil is quasilinear, so the problem is DQCP but not DCP.
    let x = variable(());
    let mut rounding = Problem::minimize(ceil(&x))
        .subject_to([x.geq(12.0), x.leq(17.0)])
        .build();
    println!("minimize ceil(x), 12 <= x <= 17");
    println!("  DCP: {}  DQCP: {}", rounding.is_dcp(), rounding.is_dqcp());
    if let Err(err) = rounding.solve() {
        println!("  solve() refuses: {}", err);
    }
    let solution = rounding.solve_qcp()?;
    report(&solution);
    println!("  x = {:.4}\n", solution.try_value(&x)?);

    // Products of nonnegative variables are quasiconcave.
    let x = nonneg_variable(());
    let y = nonneg_variable(());
    println!("maximize x * y, x <= 12, y <= 6");
    let solution = Problem::maximize(&x * &y)
        .subject_to([x.leq(12.0), y.leq(6.0)])
        .solve_qcp()?;
    report(&solution);
    println!(
        "  x = {:.4}, y = {:.4}\n",
        solution.try_value(&x)?,
        solution.try_value(&y)?
    );

    // A ratio with a known-sign denominator, searched inside caller bounds.
    let x = variable(());
    let y = nonneg_variable(());
    println!("minimize -sqrt(x) / y, exp(x) <= y");
    let options = SolveOptions::new().qcp(true).low(-1.0).high(0.0);
    let solution = Problem::minimize(-sqrt(&x) / &y)
        .subject_to([exp(&x).leq(y.clone())])
        .solve_with(options)?;
    report(&solution);
    println!(
        "  x = {:.4}, y = {:.4}",
        solution.try_value(&x)?,
        solution.try_value(&y)?
    );
    println!("  expected value: {:.4}", -1.0 / (2.0 * std::f64::consts::E).sqrt());

    // Parameters rebind without recompiling.
    let x = variable(());
    let p = parameter(());
    let mut shifted = Problem::minimize(ceil(&x)).subject_to([x.geq(p.clone())]).build();
    println!("\nminimize ceil(x), x >= p");
    for bound in [2.5, 7.25, 10.0] {
        let bindings = ParamBindings::new().with(&p, bound)?;
        let solution = shifted.solve_with_params(&bindings, &SolveOptions::new().qcp(true))?;
        println!("  p = {:>5.2}: value {:.4}", bound, solution.value.unwrap_or(f64::NAN));
    }
    let stats = shifted.cache_stats();
    println!("  compiles: {}, cache hits: {}", stats.compiles, stats.hits);

    Ok(())
}

fn report(solution: &Solution) {
    println!("  Status: {:?}", solution.status);
    match solution.value {
        Some(v) => println!("  Optimal value: {:.4}", v),
        None => println!("  Optimal value: n/a"),
    }
    if let Some(iters) = solution.bisection_iterations {
        println!("  Bisection iterations: {}", iters);
    }
}
