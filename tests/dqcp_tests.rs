//! End-to-end tests for quasiconvex problems solved by bisection.

use approx::assert_abs_diff_eq;
use cvxqcp::prelude::*;

/// Tolerance for values that bisection pins down exactly (integer-valued objectives).
const EXACT: f64 = 1e-3;
/// Tolerance for values reached by continuous bisection.
const LOOSE: f64 = 5e-2;

fn value(solution: &Solution) -> f64 {
    solution.value.expect("solution has no value")
}

// ============================================================================
// Rounding atoms
// ============================================================================

#[test]
fn test_ceil_with_and_without_interval() {
    let x = variable(());
    let mut problem = Problem::minimize(ceil(&x))
        .subject_to([x.geq(12.0), x.leq(17.0)])
        .build();
    assert!(problem.is_dqcp());
    assert!(!problem.is_dcp());

    let intervals = [
        (Some(12.0), Some(17.0)),
        (None, None),
        (None, Some(17.0)),
        (Some(12.0), None),
        (Some(0.0), Some(100.0)),
    ];
    for (low, high) in intervals {
        let mut options = SolveOptions::new().qcp(true);
        options.low = low;
        options.high = high;
        let solution = problem.solve_with(options).unwrap();
        assert_eq!(solution.status, SolveStatus::Optimal);
        assert_abs_diff_eq!(value(&solution), 12.0, epsilon = EXACT);
        assert_abs_diff_eq!(solution.try_value(&x).unwrap(), 12.0, epsilon = EXACT);
    }
    // Every solve reused the one compiled program.
    assert_eq!(problem.cache_stats().compiles, 1);
}

#[test]
fn test_maximize_ceil_with_interval() {
    let x = variable(());
    let solution = Problem::maximize(ceil(&x))
        .subject_to([x.geq(12.0), x.leq(17.0)])
        .solve_with(SolveOptions::new().qcp(true).low(12.0).high(17.0))
        .unwrap();
    assert_abs_diff_eq!(value(&solution), 17.0, epsilon = EXACT);
    assert!(solution.try_value(&x).unwrap() > 16.0);
}

#[test]
fn test_composition_of_rounding() {
    let x = variable(());
    let y = variable(());
    let constraints = [x.geq(12.0), x.leq(17.0), y.geq(17.4)];

    let nested = [
        max2(&ceil(&ceil(&x)), &ceil(&ceil(&y))),
        max2(&floor(&ceil(&x)), &floor(&ceil(&y))),
    ];
    for objective in nested {
        let mut problem = Problem::minimize(objective).subject_to(constraints.clone()).build();
        assert!(problem.is_dqcp());
        let solution = problem.solve_qcp().unwrap();
        assert_abs_diff_eq!(value(&solution), 18.0, epsilon = EXACT);
        let xv = solution.try_value(&x).unwrap();
        assert!(xv > 11.9 && xv < 17.1);
        assert!(solution.try_value(&y).unwrap() > 17.3);
    }
}

#[test]
fn test_floor() {
    let x = variable(());
    let expr = floor(&x);
    assert!(expr.is_quasiconvex() && expr.is_quasiconcave());
    assert!(!expr.is_convex() && !expr.is_concave());

    let solution = Problem::minimize(expr)
        .subject_to([x.geq(11.8), x.leq(17.0)])
        .solve_qcp()
        .unwrap();
    assert_abs_diff_eq!(value(&solution), 11.0, epsilon = EXACT);
    assert!(solution.try_value(&x).unwrap() > 11.7);
}

#[test]
fn test_add_constant() {
    let x = variable(());
    let solution = Problem::minimize(ceil(&x) + 5.0)
        .subject_to([x.geq(2.0)])
        .solve_qcp()
        .unwrap();
    assert_abs_diff_eq!(value(&solution), 7.0, epsilon = EXACT);
    assert_abs_diff_eq!(solution.try_value(&x).unwrap(), 2.0, epsilon = EXACT);
}

#[test]
fn test_scaling_by_constants() {
    let cases: Vec<(Problem, f64)> = {
        let x = variable(());
        let bound = || [x.geq(10.0)];
        vec![
            (Problem::minimize(0.5 * ceil(&x)).subject_to(bound()).build(), 5.0),
            (Problem::minimize(ceil(&x) * 0.5).subject_to(bound()).build(), 5.0),
            (Problem::maximize(-0.5 * ceil(&x)).subject_to(bound()).build(), -5.0),
            (Problem::maximize(ceil(&x) * -0.5).subject_to(bound()).build(), -5.0),
            (Problem::minimize(ceil(&x) / 0.5).subject_to(bound()).build(), 20.0),
            (Problem::maximize(ceil(&x) / -0.5).subject_to(bound()).build(), -20.0),
        ]
    };
    for (mut problem, expected) in cases {
        let solution = problem.solve_qcp().unwrap();
        assert_abs_diff_eq!(value(&solution), expected, epsilon = LOOSE);
    }
}

#[test]
fn test_min_entries_of_ceil() {
    let x = variable(2);
    let mut problem = Problem::maximize(min_entries(&ceil(&x)))
        .subject_to([
            index(&x, 0).geq(11.9),
            index(&x, 0).leq(15.8),
            index(&x, 1).geq(17.4),
        ])
        .build();
    assert!(problem.is_dqcp());
    let solution = problem.solve_qcp().unwrap();
    assert_abs_diff_eq!(value(&solution), 16.0, epsilon = EXACT);
    let xv = solution.vector(&x).unwrap();
    assert!(xv[0] > 14.9 && xv[0] < 16.0);
    assert!(xv[1] > 17.3);
}

// ============================================================================
// Products and ratios
// ============================================================================

#[test]
fn test_multiply_nonneg() {
    let x = nonneg_variable(());
    let y = nonneg_variable(());
    let expr = &x * &y;
    assert!(expr.is_quasiconcave());
    assert!(!expr.is_quasiconvex());
    assert!(!expr.is_dcp());

    let solution = Problem::maximize(expr)
        .subject_to([x.leq(12.0), y.leq(6.0)])
        .solve_qcp()
        .unwrap();
    assert_abs_diff_eq!(value(&solution), 72.0, epsilon = LOOSE);
    assert_abs_diff_eq!(solution.try_value(&x).unwrap(), 12.0, epsilon = 0.1);
    assert_abs_diff_eq!(solution.try_value(&y).unwrap(), 6.0, epsilon = 0.1);
}

#[test]
fn test_multiply_nonpos() {
    let x = nonpos_variable(());
    let y = nonpos_variable(());
    let expr = &x * &y;
    assert!(expr.is_quasiconcave());
    assert!(!expr.is_quasiconvex());

    let solution = Problem::maximize(expr)
        .subject_to([x.geq(-12.0), y.geq(-6.0)])
        .solve_qcp()
        .unwrap();
    assert_abs_diff_eq!(value(&solution), 72.0, epsilon = LOOSE);
    assert_abs_diff_eq!(solution.try_value(&x).unwrap(), -12.0, epsilon = 0.1);
    assert_abs_diff_eq!(solution.try_value(&y).unwrap(), -6.0, epsilon = 0.1);
}

#[test]
fn test_multiply_opposite_signs() {
    let x = nonneg_variable(());
    let y = nonpos_variable(());
    for expr in [&x * &y, &y * &x] {
        assert!(expr.is_quasiconvex());
        assert!(!expr.is_quasiconcave());
        let solution = Problem::minimize(expr)
            .subject_to([x.leq(7.0), y.geq(-6.0)])
            .solve_qcp()
            .unwrap();
        assert_abs_diff_eq!(value(&solution), -42.0, epsilon = LOOSE);
        assert_abs_diff_eq!(solution.try_value(&x).unwrap(), 7.0, epsilon = 0.1);
        assert_abs_diff_eq!(solution.try_value(&y).unwrap(), -6.0, epsilon = 0.1);
    }
}

#[test]
fn test_concave_multiply() {
    let x = nonneg_variable(());
    let y = nonneg_variable(());
    let products = [
        (sqrt(&x) * sqrt(&y), 6.0),
        ((sqrt(&x) + 2.0) * (sqrt(&y) + 4.0), 28.0),
    ];
    for (expr, expected) in products {
        assert!(expr.is_quasiconcave());
        assert!(!expr.is_quasiconvex());
        let solution = Problem::maximize(expr)
            .subject_to([x.leq(4.0), y.leq(9.0)])
            .solve_qcp()
            .unwrap();
        assert_abs_diff_eq!(value(&solution), expected, epsilon = LOOSE);
        assert_abs_diff_eq!(solution.try_value(&x).unwrap(), 4.0, epsilon = 0.1);
        assert_abs_diff_eq!(solution.try_value(&y).unwrap(), 9.0, epsilon = 0.1);
    }
}

#[test]
fn test_geometric_mean_product() {
    // The feasible set at the optimal level is the single point (4, 9), where the solver
    // stalls; bisection has to keep the last certified level instead of failing.
    let x = nonneg_variable(());
    let y = nonneg_variable(());
    let solution = Problem::maximize(sqrt(&x) * sqrt(&y))
        .subject_to([x.leq(4.0), y.leq(9.0)])
        .solve_qcp()
        .unwrap();
    assert_eq!(solution.status, SolveStatus::Optimal);
    assert_abs_diff_eq!(value(&solution), 6.0, epsilon = 1e-2);
}

#[test]
fn test_ratio() {
    let x = variable(());
    let y = nonneg_variable(());
    let expr = &x / &y;
    assert!(expr.is_quasilinear());
    let solution = Problem::minimize(expr)
        .subject_to([x.equals(12.0), y.leq(6.0)])
        .solve_qcp()
        .unwrap();
    assert_abs_diff_eq!(value(&solution), 2.0, epsilon = LOOSE);
    assert_abs_diff_eq!(solution.try_value(&y).unwrap(), 6.0, epsilon = 0.1);

    let x = variable(());
    let y = nonpos_variable(());
    let solution = Problem::maximize(&x / &y)
        .subject_to([x.equals(12.0), y.geq(-6.0)])
        .solve_qcp()
        .unwrap();
    assert_abs_diff_eq!(value(&solution), -2.0, epsilon = LOOSE);
    assert_abs_diff_eq!(solution.try_value(&y).unwrap(), -6.0, epsilon = 0.1);
}

#[test]
fn test_lin_frac_constraint() {
    let x = nonneg_variable(2);
    let a = constant_matrix(&[1.0, 3.0, 2.0, 4.0], 2, 2);
    let c = constant_matrix(&[2.0, 6.0, 4.0, 8.0], 2, 2);
    let b = constant_vec(vec![0.0, 1.0]);
    let d = constant_vec(vec![0.0, 1.0]);
    let frac = lin_frac(&(matmul(&a, &x) + &b), &(matmul(&c, &x) + &d));
    assert!(frac.is_quasilinear());

    let mut problem = Problem::minimize(sum(&x))
        .subject_to([x.geq(0.0), frac.leq(1.0)])
        .build();
    assert!(problem.is_dqcp());
    let solution = problem.solve_qcp().unwrap();
    assert_abs_diff_eq!(value(&solution), 0.0, epsilon = LOOSE);
    for v in solution.vector(&x).unwrap().iter() {
        assert_abs_diff_eq!(*v, 0.0, epsilon = 2e-3);
    }
}

#[test]
fn test_concave_fraction() {
    let x = nonneg_variable(());
    let frac = sqrt(&x) / exp(&x);
    assert!(frac.is_quasiconcave());
    assert!(!frac.is_quasiconvex());

    let solution = Problem::maximize(frac).solve_qcp().unwrap();
    assert_abs_diff_eq!(value(&solution), 0.428, epsilon = LOOSE);
    assert_abs_diff_eq!(solution.try_value(&x).unwrap(), 0.5, epsilon = 0.1);
}

#[test]
fn test_max_entries_of_ratios() {
    let x = nonneg_variable(2);
    let ratio = (1.0 - 2.0 * sqrt(&x) + &x) / &x;
    let mut problem = Problem::minimize(max_entries(&ratio))
        .subject_to([index(&x, 0).leq(0.5), index(&x, 1).leq(0.9)])
        .build();
    assert!(problem.is_dqcp());
    let solution = problem.solve_qcp().unwrap();
    assert_abs_diff_eq!(value(&solution), 0.1715, epsilon = LOOSE);
}

#[test]
fn test_reciprocal_and_abs() {
    let x = nonneg_variable(());
    let solution = Problem::minimize(1.0 / &x).solve_qcp().unwrap();
    assert_abs_diff_eq!(value(&solution), 0.0, epsilon = EXACT);

    let solution = Problem::minimize(abs(&(1.0 / &x))).solve_qcp().unwrap();
    assert_abs_diff_eq!(value(&solution), 0.0, epsilon = EXACT);

    let x = nonpos_variable(());
    let solution = Problem::minimize(abs(&(1.0 / &x))).solve_qcp().unwrap();
    assert_abs_diff_eq!(value(&solution), 0.0, epsilon = EXACT);
}

#[test]
fn test_scalar_sum() {
    let x = nonneg_variable(());
    let solution = Problem::minimize(sum(&(1.0 / &x))).solve_qcp().unwrap();
    assert_abs_diff_eq!(value(&solution), 0.0, epsilon = EXACT);
}

// ============================================================================
// length, sign, dist_ratio
// ============================================================================

#[test]
fn test_length() {
    let x = variable(5);
    let expr = length(&x);
    assert!(expr.is_quasiconvex());
    assert!(!expr.is_quasiconcave());

    let solution = Problem::minimize(expr)
        .subject_to([index(&x, 0).equals(2.0), index(&x, 1).equals(1.0)])
        .solve_qcp()
        .unwrap();
    assert_abs_diff_eq!(value(&solution), 2.0, epsilon = EXACT);
    let expected = [2.0, 1.0, 0.0, 0.0, 0.0];
    for (v, e) in solution.vector(&x).unwrap().iter().zip(expected) {
        assert_abs_diff_eq!(*v, e, epsilon = 1e-5);
    }
}

#[test]
fn test_sparse_least_squares_fit() {
    // Shortest x whose fit to b = A x_star stays within a mean squared error of 1e-3.
    // A is well conditioned, so the fit pins every nonzero of x_star and the trailing
    // zeros are the only entries that can be dropped.
    let n = 10;
    let mut entries = vec![0.0; n * n];
    for i in 0..n {
        entries[i * n + i] = 2.0;
        if i + 1 < n {
            entries[i * n + i + 1] = 0.5;
        }
    }
    let a = constant_matrix(&entries, n, n);
    let x_star = [1.0, -2.0, 1.5, 3.0, -1.0, 2.0, -2.5, 1.0, 0.0, 0.0];
    let b: Vec<f64> = (0..n)
        .map(|i| (0..n).map(|j| entries[i * n + j] * x_star[j]).sum())
        .collect();
    let b = constant_vec(b);
    let epsilon = 1e-3;

    let x = variable(n);
    let mut problem = Problem::minimize(length(&x))
        .subject_to([sum_squares(&(matmul(&a, &x) - &b)).leq(n as f64 * epsilon)])
        .build();
    assert!(problem.is_dqcp());
    assert!(!problem.is_dcp());
    let solution = problem.solve_qcp().unwrap();
    assert_abs_diff_eq!(value(&solution), 8.0, epsilon = EXACT);
    let xv = solution.vector(&x).unwrap();
    for (v, e) in xv.iter().zip(x_star) {
        assert_abs_diff_eq!(*v, e, epsilon = 0.1);
    }
}

#[test]
fn test_length_monotonicity() {
    let x = variable(5);
    assert!(length(&abs(&x)).is_dqcp());
    assert!(!length(&(abs(&x) - 1.0)).is_dqcp());
    assert!(length(&(-abs(&x))).is_dqcp());
}

#[test]
fn test_infeasible_length() {
    let x = variable(2);
    let solution = Problem::minimize(length(&x))
        .subject_to([x.equals(-1.0), ceil(&x).geq(1.0)])
        .solve_qcp()
        .unwrap();
    assert!(solution.status.is_infeasible());
    assert_eq!(solution.value, Some(f64::INFINITY));
}

#[test]
fn test_sign() {
    let x = variable(());
    let solution = Problem::minimize(sign(&x))
        .subject_to([x.geq(-2.0), x.leq(-0.5)])
        .solve_qcp()
        .unwrap();
    assert_abs_diff_eq!(value(&solution), -1.0, epsilon = EXACT);
    assert!(solution.try_value(&x).unwrap() <= 0.0);

    let solution = Problem::maximize(sign(&x))
        .subject_to([x.geq(1.0), x.leq(2.0)])
        .solve_qcp()
        .unwrap();
    assert_abs_diff_eq!(value(&solution), 1.0, epsilon = EXACT);
    assert!(solution.try_value(&x).unwrap() > 0.0);
}

#[test]
fn test_sign_of_zero() {
    // sign(0) is 0, so the origin never reaches level 1 or -1.
    let x = variable(());
    let solution = Problem::maximize(sign(&x))
        .subject_to([x.leq(0.0)])
        .solve_qcp()
        .unwrap();
    assert_abs_diff_eq!(value(&solution), 0.0, epsilon = EXACT);
    assert_abs_diff_eq!(solution.try_value(&x).unwrap(), 0.0, epsilon = 1e-6);

    let solution = Problem::minimize(sign(&x))
        .subject_to([x.geq(0.0)])
        .solve_qcp()
        .unwrap();
    assert_abs_diff_eq!(value(&solution), 0.0, epsilon = EXACT);
}

#[test]
fn test_sum_of_signs_is_not_dqcp() {
    let x = variable(2);
    let mut problem = Problem::minimize(sum_squares(&(&x - 1.0)))
        .subject_to([sum(&sign(&x)).leq(1.0)])
        .build();
    assert!(!problem.is_dqcp());
    let err = problem.solve_qcp().unwrap_err();
    assert!(matches!(err, CvxError::NotDqcp(_)));
    // Rejected before anything was compiled.
    assert_eq!(problem.cache_stats().compiles, 0);
}

#[test]
fn test_sum_of_quasiconcave_is_not_dqcp() {
    let t = nonneg_variable(5);
    assert!(!sum(&(power(&t, 2.0) / &t)).is_dqcp());
}

#[test]
fn test_dist_ratio() {
    let x = variable(2);
    let solution = Problem::minimize(dist_ratio(&x, &[1.0, 1.0], &[0.0, 0.0]))
        .subject_to([x.leq(0.8)])
        .solve_qcp()
        .unwrap();
    assert_abs_diff_eq!(value(&solution), 0.25, epsilon = 5e-3);
    for v in solution.vector(&x).unwrap().iter() {
        assert_abs_diff_eq!(*v, 0.8, epsilon = 1e-2);
    }
}

// ============================================================================
// Constraints through monotone inverses
// ============================================================================

#[test]
fn test_unsatisfiable_inverse_constraints() {
    let x = variable(());
    let xp = nonneg_variable(());
    let constraints = [
        exp(&ceil(&x)).leq(-5.0),
        inv_pos(&ceil(&xp)).leq(-5.0),
        logistic(&ceil(&xp)).leq(-5.0),
    ];
    for c in constraints {
        let solution = Problem::minimize(constant(0.0))
            .subject_to([c])
            .solve_qcp()
            .unwrap();
        assert_eq!(solution.status, SolveStatus::Infeasible);
    }
}

#[test]
fn test_vacuous_inverse_constraints() {
    let x = variable(());
    let xp = nonneg_variable(());
    let constraints = [
        exp(&ceil(&x)).geq(-5.0),
        inv_pos(&ceil(&x)).geq(-5.0),
        logistic(&ceil(&xp)).geq(-5.0),
    ];
    for c in constraints {
        let solution = Problem::minimize(constant(0.0))
            .subject_to([c])
            .solve_qcp()
            .unwrap();
        assert_eq!(solution.status, SolveStatus::Optimal);
    }
}

// ============================================================================
// Bounds, parameters and search control
// ============================================================================

#[test]
fn test_flipped_caller_bounds() {
    let x = nonneg_variable(());
    let mut problem = Problem::maximize(ceil(&x)).subject_to([x.leq(1.0)]).build();
    let bounds = [(Some(0.0), Some(0.5)), (Some(0.0), None), (None, Some(0.5))];
    for (low, high) in bounds {
        let mut options = SolveOptions::new().qcp(true);
        options.low = low;
        options.high = high;
        let solution = problem.solve_with(options).unwrap();
        assert_eq!(solution.status, SolveStatus::Optimal);
        let xv = solution.try_value(&x).unwrap();
        assert!((-1e-8..=1.0 + 1e-6).contains(&xv));
    }
}

#[test]
fn test_parametric_sqrt() {
    let x = variable(());
    let solution = Problem::minimize(sqrt(&x))
        .subject_to([x.leq(2.0), x.geq(1.0)])
        .solve_qcp()
        .unwrap();
    assert_abs_diff_eq!(value(&solution), 1.0, epsilon = 1e-2);
    assert_abs_diff_eq!(solution.try_value(&x).unwrap(), 1.0, epsilon = 1e-2);
    assert!(solution.duals.is_none());
    assert!(solution.residuals.unwrap().iter().all(|r| *r < 1e-5));
}

#[test]
fn test_parameters_rebind_without_recompiling() {
    let x = variable(());
    let p = parameter(());
    let mut problem = Problem::minimize(ceil(&x)).subject_to([x.geq(p.clone())]).build();
    let options = SolveOptions::new().qcp(true);

    for (bound, expected) in [(12.0, 12.0), (13.5, 14.0), (-2.5, -2.0)] {
        let bindings = ParamBindings::new().with(&p, bound).unwrap();
        let solution = problem.solve_with_params(&bindings, &options).unwrap();
        assert_abs_diff_eq!(value(&solution), expected, epsilon = EXACT);
    }
    assert_eq!(problem.cache_stats(), CacheStats { compiles: 1, hits: 2 });
}

#[test]
fn test_matches_convex_reformulation() {
    // ceil is increasing, so minimizing ceil(x) is ceil of minimizing x.
    let x = variable(());
    let constraints = [x.geq(12.3), x.leq(17.0)];
    let convex = Problem::minimize(x.clone())
        .subject_to(constraints.clone())
        .solve()
        .unwrap();
    let quasi = Problem::minimize(ceil(&x))
        .subject_to(constraints)
        .solve_qcp()
        .unwrap();
    assert_abs_diff_eq!(value(&quasi), value(&convex).ceil(), epsilon = EXACT);
}

#[test]
fn test_not_dcp_suggests_qcp() {
    let x = variable(());
    let err = Problem::minimize(ceil(&x))
        .subject_to([x.geq(12.0)])
        .solve()
        .unwrap_err();
    match err {
        CvxError::NotDcp(message) => assert!(message.contains("DQCP")),
        other => panic!("expected NotDcp, got {:?}", other),
    }
}

#[test]
fn test_qcp_on_dcp_problem_solves_directly() {
    let x = variable(());
    let solution = Problem::minimize(x.clone())
        .subject_to([x.geq(3.0)])
        .solve_qcp()
        .unwrap();
    assert_abs_diff_eq!(value(&solution), 3.0, epsilon = 1e-6);
    assert!(solution.bisection_iterations.is_none());
    assert!(solution.duals.is_some());
}

#[test]
fn test_max_iters() {
    let x = variable(());
    let err = Problem::minimize(sqrt(&x))
        .subject_to([x.leq(2.0), x.geq(1.0)])
        .solve_with(SolveOptions::new().qcp(true).low(0.0).high(10.0).max_iters(1))
        .unwrap_err();
    assert!(matches!(err, CvxError::BisectionMaxIters { .. }));
    assert_eq!(err.to_string(), "Max iters hit during bisection.");
}
