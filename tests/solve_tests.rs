//! Solve tests for convex problems.
//!
//! Test cases are defined as data and run programmatically.

use approx::assert_relative_eq;
use cvxqcp::prelude::*;

/// Tolerance for comparing floating point results
const TOL: f64 = 1e-4;

/// A test case definition
struct TestCase {
    name: &'static str,
    /// Function that builds the problem and returns (problem, expected_value)
    build: fn() -> (Problem, f64),
}

/// All minimize test cases
fn minimize_test_cases() -> Vec<TestCase> {
    vec![
        // ========== Linear Programs ==========
        TestCase {
            name: "sum_nonneg_constraint",
            build: || {
                // minimize sum(x) s.t. x >= 1, x in R^5
                let x = variable(5);
                let prob = Problem::minimize(sum(&x)).subject_to([x.geq(1.0)]).build();
                (prob, 5.0)
            },
        },
        TestCase {
            name: "sum_equality_constraint",
            build: || {
                // minimize sum(x) s.t. x == 2, x in R^3
                let x = variable(3);
                let prob = Problem::minimize(sum(&x)).subject_to([x.equals(2.0)]).build();
                (prob, 6.0)
            },
        },
        TestCase {
            name: "sum_upper_bound",
            build: || {
                // minimize -sum(x) s.t. x <= 3, x in R^4
                let x = variable(4);
                let prob = Problem::minimize(-1.0 * sum(&x))
                    .subject_to([x.leq(3.0)])
                    .build();
                (prob, -12.0)
            },
        },
        TestCase {
            name: "weighted_sum",
            build: || {
                // minimize 2x + 3y s.t. x >= 1, y >= 2
                let x = variable(());
                let y = variable(());
                let prob = Problem::minimize(2.0 * &x + 3.0 * &y)
                    .subject_to([x.geq(1.0), y.geq(2.0)])
                    .build();
                (prob, 8.0)
            },
        },
        TestCase {
            name: "row_vector_matmul",
            build: || {
                // minimize c @ x s.t. x >= 1 with c = [1, 2, 3]
                let x = variable(3);
                let c = constant_matrix(&[1.0, 2.0, 3.0], 1, 3);
                let prob = Problem::minimize(sum(&matmul(&c, &x)))
                    .subject_to([x.geq(1.0)])
                    .build();
                (prob, 6.0)
            },
        },
        // ========== Norms (SOCP) ==========
        TestCase {
            name: "norm2_equality",
            build: || {
                // minimize ||x||_2 s.t. sum(x) = 5, x in R^5
                let x = variable(5);
                let prob = Problem::minimize(norm2(&x))
                    .subject_to([sum(&x).equals(5.0)])
                    .build();
                (prob, 5.0_f64.sqrt())
            },
        },
        TestCase {
            name: "norm2_zero",
            build: || {
                // minimize ||x||_2 + 1 s.t. x == 0
                let x = variable(3);
                let prob = Problem::minimize(norm2(&x) + 1.0)
                    .subject_to([x.equals(0.0)])
                    .build();
                (prob, 1.0)
            },
        },
        // ========== Quadratic (QP) ==========
        TestCase {
            name: "sum_squares_equality",
            build: || {
                // minimize ||x||_2^2 s.t. sum(x) = 2
                let x = variable(2);
                let prob = Problem::minimize(sum_squares(&x))
                    .subject_to([sum(&x).equals(2.0)])
                    .build();
                (prob, 2.0)
            },
        },
        TestCase {
            name: "sum_squares_shifted",
            build: || {
                // minimize ||x - 1||^2 + sum(x), optimum at x = 0.5
                let x = variable(3);
                let prob = Problem::minimize(sum_squares(&(&x - 1.0)) + sum(&x)).build();
                (prob, 3.0 * 0.25 + 1.5)
            },
        },
        // ========== Element-wise convex ==========
        TestCase {
            name: "abs_equality",
            build: || {
                // minimize sum(|x|) s.t. x == [-1, 2, -3]
                let x = variable(3);
                let prob = Problem::minimize(sum(&abs(&x)))
                    .subject_to([x.equals(constant_vec(vec![-1.0, 2.0, -3.0]))])
                    .build();
                (prob, 6.0)
            },
        },
        TestCase {
            name: "pos_nonneg",
            build: || {
                // minimize sum(pos(x)) s.t. x >= -2, sum(x) = 1
                let x = variable(2);
                let prob = Problem::minimize(sum(&pos(&x)))
                    .subject_to([x.geq(-2.0), sum(&x).equals(1.0)])
                    .build();
                (prob, 1.0)
            },
        },
        TestCase {
            name: "neg_part_balanced",
            build: || {
                // minimize sum(neg_part(x)) s.t. sum(x) = 0
                let x = variable(3);
                let prob = Problem::minimize(sum(&neg_part(&x)))
                    .subject_to([sum(&x).equals(0.0)])
                    .build();
                (prob, 0.0)
            },
        },
        // ========== Maximum ==========
        TestCase {
            name: "maximum_bound",
            build: || {
                // minimize max(x, y) s.t. x >= 1, y >= 2
                let x = variable(());
                let y = variable(());
                let prob = Problem::minimize(max2(&x, &y))
                    .subject_to([x.geq(1.0), y.geq(2.0)])
                    .build();
                (prob, 2.0)
            },
        },
        TestCase {
            name: "max_entries_spread",
            build: || {
                // minimize max_entries(x) s.t. sum(x) = 3
                let x = variable(3);
                let prob = Problem::minimize(max_entries(&x))
                    .subject_to([sum(&x).equals(3.0)])
                    .build();
                (prob, 1.0)
            },
        },
        // ========== Exponential and power cones ==========
        TestCase {
            name: "exp_lower_bound",
            build: || {
                let x = variable(());
                let prob = Problem::minimize(exp(&x)).subject_to([x.geq(0.0)]).build();
                (prob, 1.0)
            },
        },
        TestCase {
            name: "logistic_at_zero",
            build: || {
                let x = variable(());
                let prob = Problem::minimize(logistic(&x)).subject_to([x.geq(0.0)]).build();
                (prob, 2.0_f64.ln())
            },
        },
        TestCase {
            name: "inv_pos_upper_bound",
            build: || {
                let x = variable(());
                let prob = Problem::minimize(inv_pos(&x)).subject_to([x.leq(2.0)]).build();
                (prob, 0.5)
            },
        },
        // ========== Multiple constraints ==========
        TestCase {
            name: "box_constraints",
            build: || {
                let x = variable(3);
                let prob = Problem::minimize(sum(&x))
                    .subject_to([x.geq(1.0), x.leq(2.0)])
                    .build();
                (prob, 3.0)
            },
        },
    ]
}

/// All maximize test cases
fn maximize_test_cases() -> Vec<TestCase> {
    vec![
        TestCase {
            name: "maximize_sum_upper_bound",
            build: || {
                let x = variable(3);
                let prob = Problem::maximize(sum(&x)).subject_to([x.leq(2.0)]).build();
                (prob, 6.0)
            },
        },
        TestCase {
            name: "maximize_minimum",
            build: || {
                let x = variable(());
                let y = variable(());
                let prob = Problem::maximize(min2(&x, &y))
                    .subject_to([x.leq(3.0), y.leq(2.0)])
                    .build();
                (prob, 2.0)
            },
        },
        TestCase {
            name: "maximize_neg_norm",
            build: || {
                let x = variable(2);
                let prob = Problem::maximize(-1.0 * norm2(&x))
                    .subject_to([sum(&x).equals(0.0)])
                    .build();
                (prob, 0.0)
            },
        },
        TestCase {
            name: "maximize_log",
            build: || {
                let x = variable(());
                let prob = Problem::maximize(log(&x)).subject_to([x.leq(2.0)]).build();
                (prob, 2.0_f64.ln())
            },
        },
        TestCase {
            name: "maximize_sqrt",
            build: || {
                let x = variable(());
                let prob = Problem::maximize(sqrt(&x)).subject_to([x.leq(4.0)]).build();
                (prob, 2.0)
            },
        },
        TestCase {
            name: "maximize_min_entries",
            build: || {
                let x = variable(3);
                let prob = Problem::maximize(min_entries(&x))
                    .subject_to([x.leq(constant_vec(vec![1.0, 2.0, 3.0]))])
                    .build();
                (prob, 1.0)
            },
        },
    ]
}

/// Test cases expected to be infeasible
fn infeasible_test_cases() -> Vec<(&'static str, Problem)> {
    vec![
        ("infeasible_bounds", {
            let x = variable(3);
            Problem::minimize(sum(&x))
                .subject_to([x.geq(1.0), x.leq(0.0)])
                .build()
        }),
        ("infeasible_equality", {
            let x = variable(());
            Problem::minimize(x.clone())
                .subject_to([x.equals(1.0), x.equals(2.0)])
                .build()
        }),
    ]
}

/// Test cases expected to be unbounded
fn unbounded_test_cases() -> Vec<(&'static str, Problem, f64)> {
    vec![
        ("unbounded_below", {
            let x = variable(3);
            Problem::minimize(sum(&x)).subject_to([x.leq(1.0)]).build()
        }, f64::NEG_INFINITY),
        ("unbounded_above", {
            let x = variable(3);
            Problem::maximize(sum(&x)).subject_to([x.geq(1.0)]).build()
        }, f64::INFINITY),
    ]
}

// ============================================================================
// Test runner
// ============================================================================

fn run_cases(cases: Vec<TestCase>) {
    for case in cases {
        let (mut prob, expected) = (case.build)();

        assert!(prob.is_dcp(), "Problem '{}' should be DCP", case.name);

        let result = prob.solve();
        assert!(result.is_ok(), "Problem '{}' should solve: {:?}", case.name, result.err());

        let solution = result.unwrap();
        assert_eq!(
            solution.status,
            SolveStatus::Optimal,
            "Problem '{}' should be optimal, got {:?}",
            case.name,
            solution.status
        );

        let value = solution.value.expect("should have value");
        let rel_err = (value - expected).abs() / (1.0 + expected.abs());
        assert!(
            rel_err < TOL,
            "Problem '{}': expected {}, got {} (rel_err={})",
            case.name,
            expected,
            value,
            rel_err
        );
    }
}

#[test]
fn test_minimize_atoms() {
    run_cases(minimize_test_cases());
}

#[test]
fn test_maximize_atoms() {
    run_cases(maximize_test_cases());
}

#[test]
fn test_infeasible() {
    for (name, mut prob) in infeasible_test_cases() {
        let solution = prob.solve().unwrap_or_else(|e| panic!("'{}' failed: {}", name, e));
        assert!(
            solution.status.is_infeasible(),
            "Problem '{}' should be infeasible, got {:?}",
            name,
            solution.status
        );
        assert_eq!(solution.value, Some(f64::INFINITY));
        assert!(solution.primal.is_none());
    }
}

#[test]
fn test_unbounded() {
    for (name, mut prob, expected) in unbounded_test_cases() {
        let solution = prob.solve().unwrap_or_else(|e| panic!("'{}' failed: {}", name, e));
        assert_eq!(
            solution.status,
            SolveStatus::Unbounded,
            "Problem '{}' should be unbounded",
            name
        );
        assert_eq!(solution.value, Some(expected));
    }
}

// ============================================================================
// Primal, dual and residual recovery
// ============================================================================

#[test]
fn test_primal_values() {
    let x = variable(3);
    let solution = Problem::minimize(sum(&x))
        .subject_to([x.geq(2.0)])
        .solve()
        .expect("should solve");

    let values = solution.vector(&x).unwrap();
    for v in values.iter() {
        assert_relative_eq!(*v, 2.0, epsilon = TOL);
    }
    assert_relative_eq!(solution.eval_scalar(&sum(&x)).unwrap(), 6.0, epsilon = TOL);
}

#[test]
fn test_duals_per_constraint() {
    // minimize x + 2y s.t. x >= 1 (dual 1), y >= 1 (dual 2), x + y <= 10 (inactive)
    let x = variable(());
    let y = variable(());
    let solution = Problem::minimize(&x + 2.0 * &y)
        .subject_to([x.geq(1.0), y.geq(1.0), (&x + &y).leq(10.0)])
        .solve()
        .unwrap();

    let duals: Vec<f64> = (0..3)
        .map(|i| solution.constraint_dual(i).expect("dual")[0])
        .collect();
    assert_relative_eq!(duals[0], 1.0, epsilon = 1e-4);
    assert_relative_eq!(duals[1], 2.0, epsilon = 1e-4);
    assert_relative_eq!(duals[2], 0.0, epsilon = 1e-4);

    let residuals = solution.residuals.unwrap();
    assert!(residuals.iter().all(|r| *r < 1e-6));
}

#[test]
fn test_not_dcp_error() {
    let x = variable(3);
    let err = Problem::maximize(norm2(&x)).solve().unwrap_err();
    match err {
        CvxError::NotDcp(message) => assert!(message.contains("concave")),
        other => panic!("expected NotDcp, got {:?}", other),
    }
}

// ============================================================================
// Parameters and the compiled-problem cache
// ============================================================================

#[test]
fn test_parameter_resolve_reuses_compilation() {
    // minimize ||x - p||^2 over x >= 0
    let x = variable(2);
    let p = parameter(2);
    let mut problem = Problem::minimize(sum_squares(&(&x - &p)))
        .subject_to([x.geq(0.0)])
        .build();
    let fingerprint = problem.fingerprint();

    let options = SolveOptions::default();
    let first = ParamBindings::new().with(&p, vec![1.0, -1.0]).unwrap();
    let solution = problem.solve_with_params(&first, &options).unwrap();
    assert_relative_eq!(solution.value.unwrap(), 1.0, epsilon = 1e-4);

    let second = ParamBindings::new().with(&p, vec![2.0, 3.0]).unwrap();
    let solution = problem.solve_with_params(&second, &options).unwrap();
    assert_relative_eq!(solution.value.unwrap(), 0.0, epsilon = 1e-4);
    let values = solution.vector(&x).unwrap();
    assert_relative_eq!(values[0], 2.0, epsilon = 1e-3);
    assert_relative_eq!(values[1], 3.0, epsilon = 1e-3);

    assert_eq!(problem.fingerprint(), fingerprint);
    assert_eq!(problem.cache_stats(), CacheStats { compiles: 1, hits: 1 });
}

#[test]
fn test_structural_change_recompiles() {
    let x = variable(());
    let mut problem = Problem::minimize(x.clone()).subject_to([x.geq(1.0)]).build();
    problem.solve().unwrap();

    problem.set_objective(Objective::Maximize(std::sync::Arc::new(-1.0 * &x)));
    let solution = problem.solve().unwrap();
    assert_relative_eq!(solution.value.unwrap(), -1.0, epsilon = 1e-6);
    assert_eq!(problem.cache_stats().compiles, 2);

    problem.clear_constraints();
    let solution = problem.solve().unwrap();
    assert_eq!(solution.status, SolveStatus::Unbounded);
    assert_eq!(problem.cache_stats().compiles, 3);
}

#[test]
fn test_problem_data() {
    let x = variable(2);
    let p = parameter(());
    let mut problem = Problem::minimize(sum(&x)).subject_to([x.geq(p.clone())]).build();
    let bindings = ParamBindings::new().with(&p, 4.0).unwrap();
    match problem.problem_data(&bindings).unwrap() {
        cvxqcp::solver::Binding::Ready(stuffed) => {
            assert_eq!(stuffed.num_vars(), 2);
            assert_eq!(stuffed.cone_dims.nonneg, 2);
            assert_eq!(stuffed.b, vec![-4.0, -4.0]);
        }
        cvxqcp::solver::Binding::Infeasible(reason) => panic!("unexpected: {}", reason),
    }
}
